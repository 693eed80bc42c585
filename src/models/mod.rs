//! Data models for the MagicMimi scanner.
//!
//! This module contains the core data structures shared by the engine and its collaborators:
//! - [`Account`]: A stored account credential, referenced by name, never mutated by the engine
//! - [`GameId`]: Which title's login endpoints a ticket is claimed against
//! - [`ScanTarget`] / [`WindowHandle`]: What region of the screen a scan captures
//! - [`ScanSettings`]: Everything a scan session needs, validated before it starts
//! - [`ScanState`] / [`ScanPhase`]: The engine's lifecycle state, owned by [`StateManager`](crate::state::StateManager)
//! - [`AppConfig`]: API endpoints, scan timings and capture backend settings loaded from `Settings.yaml`
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Config and account structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: ScanState is wrapped in `RwLock` by [`StateManager`](crate::state::StateManager) and handed out as snapshots
//! - **Immutable during a session**: Settings and the resolved account are captured at `start` and never change

pub mod account;
pub mod config;
pub mod scan;

pub use account::{Account, AccountStore, GameId};
pub use config::{ApiSettings, AppConfig, CaptureSettings, RegionSize, ScanTimings};
pub use scan::{ScanPhase, ScanSettings, ScanState, ScanTarget, WindowHandle};
