//! Scan engine - owns the single active scan session.
//!
//! [`ScanEngine`] is the only mutator of scan state. Control surfaces call
//! [`start`](ScanEngine::start) / [`stop`](ScanEngine::stop) from any thread, read
//! [`status`](ScanEngine::status), and observe progress through
//! [`subscribe`](ScanEngine::subscribe).
//!
//! # Session lifecycle
//!
//! ```text
//! Idle --start--> Running --stop--> Stopping --loop exits--> Idle
//!                    |                                         ^
//!                    +---- capture fault / target lost --------+
//! ```
//!
//! The session loop runs as a task on a [`ScanRuntime`]; capture, decode and login are
//! blocking calls offloaded to that runtime's blocking pool.

pub mod controller;
pub mod runtime;
mod worker;

pub use crate::state::ControlError;
pub use controller::{ScanEngine, ScanServices, ScanStatus};
pub use runtime::ScanRuntime;
