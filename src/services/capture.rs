//! Frame source: the current image of a scan target.
//!
//! The OS capture primitive lives outside this crate. [`SnapshotSource`] consumes the
//! snapshots an external capturer writes to disk (one file per window, plus an optional
//! full-desktop snapshot) and exposes them through the [`FrameSource`] capability.

use crate::models::{CaptureSettings, ScanTarget, WindowHandle};
use camino::{Utf8Path, Utf8PathBuf};
use image::{GrayImage, imageops};
use indexmap::IndexMap;
use std::io;
use thiserror::Error;

/// An 8-bit grayscale frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: GrayImage,
}

impl Frame {
    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    /// Build a frame from row-major luma bytes; `None` if the length doesn't match.
    pub fn from_luma(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, pixels).map(Self::from_gray)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }
}

/// Result of one capture attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture {
    Frame(Frame),
    /// The target exists but has nothing to show right now (minimized, zero-sized,
    /// snapshot mid-write). Expected; the caller backs off and retries.
    Unavailable,
}

/// Faults that end a scan session.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Capability: produce the current frame of a target.
///
/// Implementations must report a minimized or momentarily blank target as
/// [`Capture::Unavailable`] and a destroyed one through [`is_capturable`](Self::is_capturable),
/// never as an error.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource: Send + Sync {
    /// Whether the target still exists and can be captured at all.
    fn is_capturable(&self, target: &ScanTarget) -> bool;

    fn capture(&self, target: &ScanTarget) -> Result<Capture, CaptureError>;
}

/// Frame source backed by snapshot files.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    windows: IndexMap<WindowHandle, Utf8PathBuf>,
    desktop: Option<Utf8PathBuf>,
}

impl SnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `capture` section of the settings file.
    ///
    /// Window keys that don't parse as a handle are skipped with a warning.
    pub fn from_settings(settings: &CaptureSettings) -> Self {
        let mut source = Self::new();
        for (key, path) in &settings.windows {
            match key.parse::<WindowHandle>() {
                Ok(handle) => source.register_window(handle, path.clone()),
                Err(e) => tracing::warn!("Ignoring window entry '{}': {}", key, e),
            }
        }
        if let Some(desktop) = &settings.desktop_snapshot {
            source.set_desktop(desktop.clone());
        }
        source
    }

    pub fn register_window(&mut self, handle: WindowHandle, path: impl Into<Utf8PathBuf>) {
        self.windows.insert(handle, path.into());
    }

    pub fn set_desktop(&mut self, path: impl Into<Utf8PathBuf>) {
        self.desktop = Some(path.into());
    }

    /// Registered windows in configuration order.
    pub fn windows(&self) -> impl Iterator<Item = (WindowHandle, &Utf8Path)> {
        self.windows.iter().map(|(h, p)| (*h, p.as_path()))
    }

    fn snapshot_path(&self, target: &ScanTarget) -> Option<&Utf8Path> {
        match target {
            ScanTarget::Window { handle } => self.windows.get(handle).map(|p| p.as_path()),
            ScanTarget::DesktopCenter { .. } => self.desktop.as_deref(),
        }
    }

    fn load_gray(path: &Utf8Path) -> Result<Option<GrayImage>, CaptureError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CaptureError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        match image::load_from_memory(&bytes) {
            Ok(img) => Ok(Some(img.to_luma8())),
            Err(e) => {
                // Usually a snapshot caught mid-write
                tracing::debug!("Unreadable snapshot {}: {}", path, e);
                Ok(None)
            }
        }
    }
}

impl FrameSource for SnapshotSource {
    fn is_capturable(&self, target: &ScanTarget) -> bool {
        if let ScanTarget::DesktopCenter { width, height } = target {
            if *width == 0 || *height == 0 {
                return false;
            }
        }
        self.snapshot_path(target).is_some_and(|p| p.exists())
    }

    fn capture(&self, target: &ScanTarget) -> Result<Capture, CaptureError> {
        let Some(path) = self.snapshot_path(target) else {
            return Ok(Capture::Unavailable);
        };
        let Some(gray) = Self::load_gray(path)? else {
            return Ok(Capture::Unavailable);
        };
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(Capture::Unavailable);
        }

        let frame = match target {
            ScanTarget::Window { .. } => gray,
            ScanTarget::DesktopCenter { width, height } => {
                let w = (*width).min(gray.width());
                let h = (*height).min(gray.height());
                let x = (gray.width() - w) / 2;
                let y = (gray.height() - h) / 2;
                imageops::crop_imm(&gray, x, y, w, h).to_image()
            }
        };

        Ok(Capture::Frame(Frame::from_gray(frame)))
    }
}
