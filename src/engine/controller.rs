// Scan Engine - Start/stop control surface over the session loop
//
// This module contains the ScanEngine which coordinates between:
// - StateManager (Idle / Running / Stopping)
// - EventSink (logs, FPS samples, claim outcomes)
// - The capabilities (frame source, decoder, login client, account store)
// - ScanRuntime (where the session loop and blocking calls run)
//
// It handles:
// - Validating and starting a session atomically with the state transition
// - Requesting a cooperative stop through the session's watch channel
// - Status snapshots for control surfaces

use crate::engine::ScanRuntime;
use crate::engine::worker::Session;
use crate::events::{Event, EventSink, LogEntry};
use crate::metrics::ScanMetrics;
use crate::models::{AccountStore, GameId, ScanPhase, ScanSettings, ScanTarget, ScanTimings};
use crate::services::{FrameSource, LoginClient, PayloadDecoder, TicketExtractor};
use crate::state::{ControlError, StateManager};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// The three blocking capabilities a session drives.
#[derive(Clone)]
pub struct ScanServices {
    pub frames: Arc<dyn FrameSource>,
    pub decoder: Arc<dyn PayloadDecoder>,
    pub login: Arc<dyn LoginClient>,
}

impl ScanServices {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        decoder: Arc<dyn PayloadDecoder>,
        login: Arc<dyn LoginClient>,
    ) -> Self {
        Self {
            frames,
            decoder,
            login,
        }
    }
}

/// Point-in-time view of the engine for control surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    pub game: Option<GameId>,
    pub target: Option<ScanTarget>,
    pub account: Option<String>,
    pub last_ticket: Option<String>,
    pub last_match_time: Option<DateTime<Local>>,
    pub fps: f64,
}

/// Channels of the session currently (or most recently) running.
#[derive(Default)]
struct SessionSlot {
    cancel_tx: Option<watch::Sender<bool>>,
    /// Flips to true once the loop has wound down
    done_rx: Option<watch::Receiver<bool>>,
}

/// Scan engine: at most one session at a time, started and stopped from any thread.
///
/// All methods take `&self`; wrap the engine in an `Arc` to share it between a control
/// surface and an event observer.
///
/// # Example
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let engine = ScanEngine::new(
///     ScanRuntime::new(runtime.handle().clone()),
///     ScanServices::new(frames, decoder, login),
///     accounts,
///     ScanTimings::default(),
/// );
///
/// let mut events = engine.subscribe();
/// engine.start(ScanSettings { target, game: GameId::Genshin, account: "main".into() })?;
/// // ...
/// engine.stop()?;
/// ```
pub struct ScanEngine {
    runtime: ScanRuntime,
    services: ScanServices,
    accounts: Arc<dyn AccountStore>,
    timings: ScanTimings,
    extractor: Arc<TicketExtractor>,
    state: Arc<StateManager>,
    events: Arc<EventSink>,
    metrics: Mutex<Arc<ScanMetrics>>,

    /// Held across start and stop so a stop can never miss the cancel sender of a
    /// session that is still being spawned
    session: Mutex<SessionSlot>,
}

impl ScanEngine {
    pub fn new(
        runtime: ScanRuntime,
        services: ScanServices,
        accounts: Arc<dyn AccountStore>,
        timings: ScanTimings,
    ) -> Self {
        tracing::debug!(
            "Scan engine created (interval {}ms, dedup cooldown {}ms)",
            timings.interval_ms,
            timings.dedup_cooldown_ms
        );
        Self {
            runtime,
            services,
            accounts,
            timings,
            extractor: Arc::new(TicketExtractor::new()),
            state: Arc::new(StateManager::new()),
            events: Arc::new(EventSink::new()),
            metrics: Mutex::new(Arc::new(ScanMetrics::new())),
            session: Mutex::new(SessionSlot::default()),
        }
    }

    /// Start a scan session.
    ///
    /// Rejected without side effects when a session is already active, the account
    /// name is unknown, or the target cannot be captured. The account is resolved
    /// once here and the session keeps that snapshot until it ends.
    ///
    /// Validation runs outside the state lock, so status reads never wait on the frame
    /// source. The session slot lock serializes concurrent starts.
    pub fn start(&self, settings: ScanSettings) -> Result<(), ControlError> {
        let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        if self.state.phase().is_active() {
            return Err(ControlError::AlreadyRunning);
        }
        let account = self
            .accounts
            .get(&settings.account)
            .ok_or_else(|| ControlError::UnknownAccount(settings.account.clone()))?;
        if !self.services.frames.is_capturable(&settings.target) {
            return Err(ControlError::InvalidTarget(settings.target));
        }

        self.state.begin(&settings)?;

        let metrics = Arc::new(ScanMetrics::new());
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&metrics);

        self.events.info(format!(
            "Scan started: {} on {} as '{}'",
            settings.game.display_name(),
            settings.target,
            settings.account
        ));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let session = Session {
            runtime: self.runtime.clone(),
            services: self.services.clone(),
            extractor: Arc::clone(&self.extractor),
            state: Arc::clone(&self.state),
            events: Arc::clone(&self.events),
            metrics,
            settings,
            account,
            timings: self.timings,
        };
        self.runtime.spawn(session.run(cancel_rx, done_tx));

        slot.cancel_tx = Some(cancel_tx);
        slot.done_rx = Some(done_rx);
        Ok(())
    }

    /// Request the running session to stop.
    ///
    /// Returns once the request is recorded; the loop exits at its next cancellation
    /// point. An in-flight login attempt is allowed to finish. Use
    /// [`wait_idle()`](Self::wait_idle) to wait for the loop itself.
    pub fn stop(&self) -> Result<(), ControlError> {
        let slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        self.state.request_stop()?;
        tracing::info!("Stop requested");
        if let Some(cancel_tx) = slot.cancel_tx.as_ref() {
            let _ = cancel_tx.send(true);
        }
        Ok(())
    }

    pub fn status(&self) -> ScanStatus {
        self.state.read(|s| ScanStatus {
            phase: s.phase,
            game: s.settings.as_ref().map(|cfg| cfg.game),
            target: s.settings.as_ref().map(|cfg| cfg.target),
            account: s.settings.as_ref().map(|cfg| cfg.account.clone()),
            last_ticket: s.last_ticket.clone(),
            last_match_time: s.last_match_time,
            fps: s.last_fps,
        })
    }

    pub fn phase(&self) -> ScanPhase {
        self.state.phase()
    }

    pub fn is_running(&self) -> bool {
        self.state.phase().is_active()
    }

    /// Subscribe to engine events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// The bounded history of user-facing log lines, oldest first.
    pub fn recent_logs(&self) -> Vec<LogEntry> {
        self.events.recent_logs()
    }

    /// Counters of the current or most recent session.
    pub fn metrics(&self) -> Arc<ScanMetrics> {
        Arc::clone(&self.metrics.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Wait until the current session loop (if any) has exited.
    ///
    /// Cancel-safe, and any number of callers may wait at once.
    pub async fn wait_idle(&self) {
        let done_rx = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .done_rx
            .clone();

        let Some(mut done_rx) = done_rx else {
            return;
        };
        if done_rx.wait_for(|done| *done).await.is_err() {
            // The loop task was dropped (panic or runtime shutdown) before winding down
            tracing::error!("Scan session ended without winding down");
            self.state.finish();
        }
    }

    /// Stop any running session and wait up to `timeout` for it to exit.
    ///
    /// Returns true when the engine is idle afterwards.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        match self.stop() {
            Ok(()) => tracing::info!("Shutting down active scan session"),
            Err(ControlError::NotRunning) => {}
            Err(e) => tracing::warn!("Stop during shutdown failed: {}", e),
        }

        if tokio::time::timeout(timeout, self.wait_idle()).await.is_err() {
            tracing::warn!(
                "Scan session did not stop within {:.1}s",
                timeout.as_secs_f64()
            );
            return false;
        }
        !self.is_running()
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        let slot = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(cancel_tx) = slot.cancel_tx.take() {
            let _ = cancel_tx.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, WindowHandle};
    use crate::services::capture::MockFrameSource;
    use crate::services::decoder::MockPayloadDecoder;
    use crate::services::login::MockLoginClient;
    use crate::services::Capture;
    use indexmap::IndexMap;
    use std::sync::{OnceLock, mpsc};

    fn accounts() -> Arc<dyn AccountStore> {
        let mut store = IndexMap::new();
        store.insert(
            "main".to_string(),
            Account::new("100012345", "cookie_token=abc"),
        );
        Arc::new(store)
    }

    fn timings() -> ScanTimings {
        ScanTimings {
            interval_ms: 5,
            unavailable_backoff_ms: 5,
            success_cooldown_ms: 5,
            dedup_cooldown_ms: 5_000,
        }
    }

    fn engine_with(frames: MockFrameSource) -> ScanEngine {
        let mut decoder = MockPayloadDecoder::new();
        decoder.expect_decode().returning(|_| Vec::new());
        let mut login = MockLoginClient::new();
        login.expect_attempt().never();

        ScanEngine::new(
            ScanRuntime::current(),
            ScanServices::new(Arc::new(frames), Arc::new(decoder), Arc::new(login)),
            accounts(),
            timings(),
        )
    }

    fn idle_window_source() -> MockFrameSource {
        let mut frames = MockFrameSource::new();
        frames
            .expect_is_capturable()
            .returning(|target| *target == ScanTarget::window(WindowHandle(1)));
        frames.expect_capture().returning(|_| Ok(Capture::Unavailable));
        frames
    }

    fn settings(account: &str, handle: u64) -> ScanSettings {
        ScanSettings {
            target: ScanTarget::window(WindowHandle(handle)),
            game: GameId::StarRail,
            account: account.to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_and_stop() {
        let engine = engine_with(idle_window_source());

        engine.start(settings("main", 1)).unwrap();
        assert!(engine.is_running());

        let status = engine.status();
        assert_eq!(status.phase, ScanPhase::Running);
        assert_eq!(status.game, Some(GameId::StarRail));
        assert_eq!(status.account.as_deref(), Some("main"));

        engine.stop().unwrap();
        engine.wait_idle().await;
        assert_eq!(engine.phase(), ScanPhase::Idle);

        let last = engine.recent_logs().pop().unwrap();
        assert_eq!(last.message, "Scan stopped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_start_is_rejected() {
        let engine = engine_with(idle_window_source());
        engine.start(settings("main", 1)).unwrap();

        assert_eq!(
            engine.start(settings("main", 1)),
            Err(ControlError::AlreadyRunning)
        );
        assert!(engine.shutdown(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_account() {
        let engine = engine_with(idle_window_source());
        assert_eq!(
            engine.start(settings("nobody", 1)),
            Err(ControlError::UnknownAccount("nobody".to_string()))
        );
        assert_eq!(engine.phase(), ScanPhase::Idle);
        assert!(engine.recent_logs().is_empty());
    }

    #[tokio::test]
    async fn test_start_rejects_uncapturable_target() {
        let engine = engine_with(idle_window_source());
        assert_eq!(
            engine.start(settings("main", 99)),
            Err(ControlError::InvalidTarget(ScanTarget::window(WindowHandle(99))))
        );
        assert_eq!(engine.phase(), ScanPhase::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_readable_while_target_is_checked() {
        let state_cell: Arc<OnceLock<Arc<StateManager>>> = Arc::new(OnceLock::new());
        let cell = Arc::clone(&state_cell);

        let mut frames = MockFrameSource::new();
        frames.expect_is_capturable().returning(move |_| {
            // A reader on another thread must get through while the target is checked
            let state = Arc::clone(cell.get().expect("state registered"));
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(state.phase());
            });
            rx.recv_timeout(Duration::from_secs(1)).is_ok()
        });
        frames.expect_capture().returning(|_| Ok(Capture::Unavailable));

        let engine = engine_with(frames);
        assert!(state_cell.set(Arc::clone(&engine.state)).is_ok());

        engine.start(settings("main", 1)).unwrap();
        assert!(engine.is_running());
        assert!(engine.shutdown(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_rejected() {
        let engine = engine_with(idle_window_source());
        assert_eq!(engine.stop(), Err(ControlError::NotRunning));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_after_stop() {
        let engine = engine_with(idle_window_source());

        engine.start(settings("main", 1)).unwrap();
        assert!(engine.shutdown(Duration::from_secs(2)).await);

        engine.start(settings("main", 1)).unwrap();
        assert!(engine.is_running());
        assert!(engine.shutdown(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_shutdown_when_idle() {
        let engine = engine_with(idle_window_source());
        assert!(engine.shutdown(Duration::from_millis(10)).await);
    }
}
