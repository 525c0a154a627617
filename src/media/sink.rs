//! sink.rs
//! Video sinks. One sink per recording session; opened on the Idle → Recording
//! edge and finished on Recording → Idle.

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    sync::Arc,
};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::media::frame::Frame;
use crate::utils::error::SinkError;

pub trait MediaSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SinkError>;

    /// Flushes and closes the artifact.
    fn finish(self: Box<Self>) -> Result<(), SinkError>;
}

pub trait SinkFactory: Send {
    fn open(&self, path: &Path, frame_size: (u32, u32), fps: u32)
        -> Result<Box<dyn MediaSink>, SinkError>;
}

/// Encodes H.264 MP4 by piping raw RGB24 frames into ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSinkFactory;

impl SinkFactory for FfmpegSinkFactory {
    fn open(
        &self,
        path: &Path,
        frame_size: (u32, u32),
        fps: u32,
    ) -> Result<Box<dyn MediaSink>, SinkError> {
        let (w, h) = frame_size;
        let open_err = |source| SinkError::Open {
            path: path.display().to_string(),
            source,
        };

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", w, h),
                "-r",
                &fps.to_string(),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(open_err)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            open_err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "encoder stdin not piped"))
        })?;

        Ok(Box::new(FfmpegSink {
            child: Some(child),
            stdin: Some(stdin),
            path: path.to_path_buf(),
        }))
    }
}

struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    path: PathBuf,
}

impl MediaSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SinkError> {
        match self.stdin.as_mut() {
            Some(stdin) => Ok(stdin.write_all(frame.as_raw())?),
            None => Err(SinkError::Write(std::io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn finish(mut self: Box<Self>) -> Result<(), SinkError> {
        // closing stdin lets the encoder write the trailer
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if status.success() {
            debug!("[Sink] finished {}", self.path.display());
            Ok(())
        } else {
            Err(SinkError::Encoder(status.to_string()))
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("[Sink] {} dropped without finish, waiting for encoder", self.path.display());
            let _ = child.wait();
        }
    }
}

/// What an in-memory sink factory has seen.
#[derive(Debug, Default, Clone)]
pub struct SinkLog {
    pub opened: Vec<PathBuf>,
    pub frames_written: usize,
    pub finished: usize,
}

impl SinkLog {
    /// Sessions opened but not yet finished.
    pub fn open_sessions(&self) -> usize {
        self.opened.len() - self.finished
    }
}

/// Sink factory that only counts; used where no encoder is available.
#[derive(Clone, Default)]
pub struct MemorySinkFactory {
    log: Arc<Mutex<SinkLog>>,
    fail_open: Arc<Mutex<bool>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> SinkLog {
        self.log.lock().clone()
    }

    pub fn set_fail_open(&self, fail: bool) {
        *self.fail_open.lock() = fail;
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open(&self, path: &Path, _: (u32, u32), _: u32) -> Result<Box<dyn MediaSink>, SinkError> {
        if *self.fail_open.lock() {
            return Err(SinkError::Open {
                path: path.display().to_string(),
                source: std::io::ErrorKind::PermissionDenied.into(),
            });
        }
        self.log.lock().opened.push(path.to_path_buf());
        Ok(Box::new(MemorySink {
            log: self.log.clone(),
        }))
    }
}

struct MemorySink {
    log: Arc<Mutex<SinkLog>>,
}

impl MediaSink for MemorySink {
    fn write_frame(&mut self, _: &Frame) -> Result<(), SinkError> {
        self.log.lock().frames_written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), SinkError> {
        self.log.lock().finished += 1;
        Ok(())
    }
}
