//! capture.rs
//! Frame sources for the sensing loop.
//!
//! - `PipeCapture`: camera frames as raw RGB24 from an ffmpeg child process
//! - `ChannelSource`: frames pushed over a crossbeam channel (synthetic feeds, tests)

use std::{
    io::{BufReader, ErrorKind, Read},
    process::{Child, ChildStdout, Command, Stdio},
};

use crossbeam::channel::Receiver;
use log::{debug, info};

use crate::media::frame::Frame;
use crate::utils::error::CaptureError;

pub trait FrameSource {
    /// Blocks until the next frame is available. Any error is terminal.
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    fn frame_size(&self) -> (u32, u32);

    fn release(&mut self) {}
}

pub struct PipeCapture {
    child: Option<Child>,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    /// First frame, read during `open` to prove the device delivers.
    pending: Option<Frame>,
}

impl PipeCapture {
    /// Starts ffmpeg on a v4l2 device and waits for its first frame. A device
    /// that is missing or busy fails here, never inside the sensing loop.
    pub fn open(device: &str, width: u32, height: u32, fps: u32) -> Result<Self, CaptureError> {
        let mut command = Command::new("ffmpeg");
        command.args([
            "-loglevel",
            "error",
            "-f",
            "v4l2",
            "-framerate",
            &fps.to_string(),
            "-video_size",
            &format!("{}x{}", width, height),
            "-i",
            device,
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-",
        ]);
        let capture = Self::spawn(command, device, width, height)?;
        info!("[Capture] opened {} at {}x{} @ {} fps", device, width, height, fps);
        Ok(capture)
    }

    /// Runs any producer of raw RGB24 frames on stdout.
    pub fn spawn(mut command: Command, label: &str, width: u32, height: u32) -> Result<Self, CaptureError> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| CaptureError::Unavailable(format!("{}: {}", label, e)))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::Unavailable("capture stdout not piped".to_string()));
        };

        let mut capture = Self {
            child: Some(child),
            stdout: BufReader::new(stdout),
            width,
            height,
            pending: None,
        };
        match capture.read_raw() {
            Ok(frame) => {
                capture.pending = Some(frame);
                Ok(capture)
            }
            Err(e) => {
                capture.release();
                Err(CaptureError::Unavailable(format!("{}: no frames ({})", label, e)))
            }
        }
    }

    fn read_raw(&mut self) -> Result<Frame, CaptureError> {
        let mut buf = vec![0u8; (self.width * self.height * 3) as usize];
        self.stdout.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => CaptureError::Closed,
            _ => CaptureError::Read(e),
        })?;
        Frame::from_raw(self.width, self.height, buf).ok_or(CaptureError::Closed)
    }
}

impl FrameSource for PipeCapture {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        match self.pending.take() {
            Some(frame) => Ok(frame),
            None => self.read_raw(),
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("[Capture] released");
        }
    }
}

impl Drop for PipeCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Source fed by another thread. Closing the sender ends the feed.
pub struct ChannelSource {
    rx: Receiver<Frame>,
    size: (u32, u32),
}

impl ChannelSource {
    pub fn new(rx: Receiver<Frame>, size: (u32, u32)) -> Self {
        Self { rx, size }
    }
}

impl FrameSource for ChannelSource {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        self.rx.recv().map_err(|_| CaptureError::Closed)
    }

    fn frame_size(&self) -> (u32, u32) {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;

    #[test]
    fn channel_source_reads_until_closed() {
        let (tx, rx) = bounded(2);
        let mut src = ChannelSource::new(rx, (4, 4));
        tx.send(Frame::new(4, 4)).unwrap();
        drop(tx);

        assert_eq!(src.read_frame().unwrap().dimensions(), (4, 4));
        assert!(matches!(src.read_frame(), Err(CaptureError::Closed)));
    }

    fn shell(script: &str) -> Command {
        let mut c = Command::new("sh");
        c.args(["-c", script]);
        c
    }

    #[test]
    fn producer_that_exits_without_frames_is_unavailable() {
        // ffmpeg behaves like this when the v4l2 device does not exist
        let result = PipeCapture::spawn(shell("exit 1"), "/dev/video9", 4, 4);
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
    }

    #[test]
    fn truncated_first_frame_is_unavailable() {
        let result = PipeCapture::spawn(shell("head -c 20 /dev/zero"), "short", 4, 4);
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
    }

    #[test]
    fn first_frame_is_kept_for_the_loop() {
        // two 4x4 RGB24 frames, then end of stream
        let mut src = PipeCapture::spawn(shell("head -c 96 /dev/zero"), "zeros", 4, 4).unwrap();
        assert_eq!(src.read_frame().unwrap().dimensions(), (4, 4));
        assert_eq!(src.read_frame().unwrap().dimensions(), (4, 4));
        assert!(matches!(src.read_frame(), Err(CaptureError::Closed)));
        src.release();
    }
}
