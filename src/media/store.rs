//! store.rs
//! Media artifacts on disk: timestamp naming, snapshot persistence, and
//! name-to-path resolution for the media endpoints.
//!
//! Artifacts are written once and never modified; cleanup is external.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use image::ImageFormat;

use crate::media::frame::Frame;
use crate::utils::error::MediaError;

pub const STAMP_FORMAT: &str = "%Y_%m_%d--%H_%M_%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Photo => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Photo => "Image",
            MediaKind::Video => "Video",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    photo_dir: PathBuf,
    video_dir: PathBuf,
}

impl MediaStore {
    pub fn new(photo_dir: impl Into<PathBuf>, video_dir: impl Into<PathBuf>) -> Self {
        Self {
            photo_dir: photo_dir.into(),
            video_dir: video_dir.into(),
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), MediaError> {
        for dir in [&self.photo_dir, &self.video_dir] {
            fs::create_dir_all(dir).map_err(|source| MediaError::Directory {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn dir(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Photo => &self.photo_dir,
            MediaKind::Video => &self.video_dir,
        }
    }

    pub fn file_name(kind: MediaKind, stamp: &str) -> String {
        format!("{}.{}", stamp, kind.extension())
    }

    pub fn path_for(&self, kind: MediaKind, file_name: &str) -> PathBuf {
        self.dir(kind).join(file_name)
    }

    /// Writes `frame` as `<stamp>.jpg` and returns the file name. A name already
    /// taken within the same second gets a `_<n>` suffix; photos are never replaced.
    pub fn save_snapshot(&self, frame: &Frame, stamp: &str) -> Result<String, MediaError> {
        let name = self.unused_name(MediaKind::Photo, stamp);
        frame.save_with_format(self.path_for(MediaKind::Photo, &name), ImageFormat::Jpeg)?;
        Ok(name)
    }

    fn unused_name(&self, kind: MediaKind, stamp: &str) -> String {
        let name = Self::file_name(kind, stamp);
        if !self.path_for(kind, &name).exists() {
            return name;
        }
        (1u32..)
            .map(|n| Self::file_name(kind, &format!("{}_{}", stamp, n)))
            .find(|name| !self.path_for(kind, name).exists())
            .unwrap_or(name)
    }

    /// Looks `name` up inside the directory for `kind`. Names that could
    /// escape the directory resolve to nothing.
    pub fn resolve(&self, kind: MediaKind, name: &str) -> Option<PathBuf> {
        if !is_plain_name(name) {
            return None;
        }
        let path = self.path_for(kind, name);
        path.is_file().then_some(path)
    }
}

pub fn stamp(at: DateTime<Local>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

pub fn stamp_now() -> String {
    stamp(Local::now())
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\', '\0'])
}
