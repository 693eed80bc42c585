// State management module
//
// This module provides the StateManager which owns the engine's ScanState behind a
// RwLock. Only the engine mutates it; status readers take cheap snapshots and tolerate
// values that are one iteration stale.

use crate::models::{ScanPhase, ScanSettings, ScanState, ScanTarget};
use chrono::Local;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;
use thiserror::Error;

/// Reasons a control request is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("a scan is already running")]
    AlreadyRunning,

    #[error("no scan is running")]
    NotRunning,

    #[error("account '{0}' not found")]
    UnknownAccount(String),

    #[error("target {0} cannot be captured")]
    InvalidTarget(ScanTarget),
}

/// Thread-safe owner of [`ScanState`].
///
/// Transitions that must be atomic with their precondition check (`Idle → Running`,
/// `Running → Stopping`) happen under a single write lock.
///
/// # Usage
///
/// - [`read()`](Self::read) / [`snapshot()`](Self::snapshot) for status queries
/// - [`begin()`](Self::begin), [`request_stop()`](Self::request_stop), [`finish()`](Self::finish) for lifecycle
/// - [`record_match()`](Self::record_match), [`record_fps()`](Self::record_fps) from the session loop
pub struct StateManager {
    state: RwLock<ScanState>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ScanState::default()),
        }
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> ScanState {
        self.read(|s| s.clone())
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.phase.is_active());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ScanState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn update<F, R>(&self, update_fn: F) -> R
    where
        F: FnOnce(&mut ScanState) -> R,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        update_fn(&mut state)
    }

    pub fn phase(&self) -> ScanPhase {
        self.read(|s| s.phase)
    }

    /// `Idle → Running` for a new session.
    ///
    /// Settings must already be validated by the caller; only the phase is checked here.
    pub fn begin(&self, settings: &ScanSettings) -> Result<(), ControlError> {
        self.update(|state| {
            if state.phase.is_active() {
                return Err(ControlError::AlreadyRunning);
            }

            state.phase = ScanPhase::Running;
            state.settings = Some(settings.clone());
            state.last_ticket = None;
            state.last_match_at = None;
            state.last_match_time = None;
            state.last_fps = 0.0;
            tracing::debug!("Scan phase: idle -> running");
            Ok(())
        })
    }

    /// `Running → Stopping`.
    pub fn request_stop(&self) -> Result<(), ControlError> {
        self.update(|state| match state.phase {
            ScanPhase::Running => {
                state.phase = ScanPhase::Stopping;
                tracing::debug!("Scan phase: running -> stopping");
                Ok(())
            }
            ScanPhase::Idle | ScanPhase::Stopping => Err(ControlError::NotRunning),
        })
    }

    /// Any phase → `Idle`; called once by the session loop as it exits.
    pub fn finish(&self) {
        self.update(|state| {
            tracing::debug!("Scan phase: {} -> idle", state.phase);
            state.phase = ScanPhase::Idle;
            state.last_fps = 0.0;
        });
    }

    /// Remember the ticket the session just raced.
    pub fn record_match(&self, ticket: &str, at: Instant) {
        self.update(|state| {
            state.last_ticket = Some(ticket.to_string());
            state.last_match_at = Some(at);
            state.last_match_time = Some(Local::now());
        });
    }

    pub fn record_fps(&self, fps: f64) {
        self.update(|state| state.last_fps = fps);
    }

    /// True once a stop has been requested for the current session.
    pub fn stop_requested(&self) -> bool {
        self.read(|s| s.phase == ScanPhase::Stopping)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
