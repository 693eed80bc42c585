// MagicMimi - Screen-scanning QR ticket grabber for game client logins
//
// This is the library crate containing the scan engine, its capabilities and the
// configuration layer. The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod engine;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{ControlError, ScanEngine, ScanRuntime, ScanServices, ScanStatus};
pub use events::{Event, EventSink, LogEntry, LogLevel};
pub use models::{Account, AccountStore, AppConfig, GameId, ScanSettings, ScanTarget};
pub use state::StateManager;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
