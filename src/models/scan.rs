use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use super::account::GameId;

/// Opaque reference to an OS window (an HWND on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl FromStr for WindowHandle {
    type Err = std::num::ParseIntError;

    /// Accepts decimal (`132456`) or hex (`0x2056C`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).map(WindowHandle),
            None => s.parse::<u64>().map(WindowHandle),
        }
    }
}

/// The capture region for one scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanTarget {
    /// The client area of a specific window.
    Window { handle: WindowHandle },
    /// A centered `width` x `height` region of the primary desktop.
    DesktopCenter { width: u32, height: u32 },
}

impl ScanTarget {
    pub fn window(handle: WindowHandle) -> Self {
        ScanTarget::Window { handle }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTarget::Window { handle } => write!(f, "window {}", handle),
            ScanTarget::DesktopCenter { width, height } => {
                write!(f, "desktop center {}x{}", width, height)
            }
        }
    }
}

/// Parameters of a scan session, supplied to `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub target: ScanTarget,
    pub game: GameId,
    /// Name of the account in the account store.
    pub account: String,
}

/// Lifecycle phase of the scan engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl ScanPhase {
    /// True while a session loop exists (running or winding down).
    pub fn is_active(self) -> bool {
        !matches!(self, ScanPhase::Idle)
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Running => "running",
            ScanPhase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Engine state. One per engine instance, mutated only by the engine.
///
/// `settings` describes the active (or most recent) session; match fields survive the
/// session so a status query after it ends still shows the last ticket.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pub phase: ScanPhase,
    pub settings: Option<ScanSettings>,
    pub last_ticket: Option<String>,
    pub last_match_at: Option<Instant>,
    pub last_match_time: Option<DateTime<Local>>,
    pub last_fps: f64,
}
