// Session loop - capture, decode, extract, dedup, claim, repeat
//
// One `Session` exists per started scan. It owns a private `DedupGate`, a snapshot of
// the account it claims for, and the receiving end of the session's cancellation
// channel. It exits on stop request, on a capture fault, or when the target disappears,
// and in every case leaves the engine Idle with a final "stopped" log and FPS 0.

use crate::engine::ScanRuntime;
use crate::engine::controller::ScanServices;
use crate::events::EventSink;
use crate::metrics::ScanMetrics;
use crate::models::{Account, ScanSettings, ScanTimings};
use crate::services::{Admission, Capture, DedupGate, Outcome, TicketExtractor};
use crate::state::StateManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionExit {
    Stopped,
    TargetLost,
    Fault(String),
}

/// What one iteration did, which decides how long to pause afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Scanned,
    Unavailable,
    Claimed,
}

pub(crate) struct Session {
    pub(crate) runtime: ScanRuntime,
    pub(crate) services: ScanServices,
    pub(crate) extractor: Arc<TicketExtractor>,
    pub(crate) state: Arc<StateManager>,
    pub(crate) events: Arc<EventSink>,
    pub(crate) metrics: Arc<ScanMetrics>,
    pub(crate) settings: ScanSettings,
    pub(crate) account: Account,
    pub(crate) timings: ScanTimings,
}

impl Session {
    /// Drive the loop until it exits. The caller must already have moved the state
    /// to Running; this always moves it back to Idle and then flips `done`.
    pub(crate) async fn run(self, mut cancel: watch::Receiver<bool>, done: watch::Sender<bool>) {
        tracing::info!(
            "Session loop started: game={}, target={}, account={}",
            self.settings.game,
            self.settings.target,
            self.account.masked_uid()
        );

        let mut gate = DedupGate::new(self.timings.dedup_cooldown());

        let exit = loop {
            if self.cancelled(&cancel) {
                break SessionExit::Stopped;
            }

            let started = Instant::now();
            let step = match self.iterate(&mut gate).await {
                Ok(step) => step,
                Err(exit) => break exit,
            };

            let pause = match step {
                Step::Unavailable => self.timings.unavailable_backoff(),
                Step::Scanned | Step::Claimed => {
                    let elapsed = started.elapsed();
                    self.sample_fps(elapsed);
                    if step == Step::Claimed {
                        self.timings.success_cooldown()
                    } else {
                        self.timings.interval().saturating_sub(elapsed)
                    }
                }
            };

            if pause_or_cancel(&mut cancel, pause).await {
                break SessionExit::Stopped;
            }
        };

        self.wind_down(exit);
        done.send_replace(true);
    }

    fn cancelled(&self, cancel: &watch::Receiver<bool>) -> bool {
        *cancel.borrow() || self.state.stop_requested()
    }

    async fn iterate(&self, gate: &mut DedupGate) -> Result<Step, SessionExit> {
        let frames = Arc::clone(&self.services.frames);
        let target = self.settings.target;
        let captured = self
            .runtime
            .run_blocking(move || {
                if !frames.is_capturable(&target) {
                    return Ok(None);
                }
                frames.capture(&target).map(Some)
            })
            .await
            .map_err(|e| SessionExit::Fault(format!("capture task failed: {}", e)))?;

        let frame = match captured {
            Ok(Some(Capture::Frame(frame))) => frame,
            Ok(Some(Capture::Unavailable)) => {
                self.metrics.record_unavailable();
                tracing::trace!("Target {} unavailable, backing off", self.settings.target);
                return Ok(Step::Unavailable);
            }
            Ok(None) => return Err(SessionExit::TargetLost),
            Err(e) => return Err(SessionExit::Fault(e.to_string())),
        };
        self.metrics.record_frame();

        let decoder = Arc::clone(&self.services.decoder);
        let payloads = self
            .runtime
            .run_blocking(move || decoder.decode(&frame))
            .await
            .map_err(|e| SessionExit::Fault(format!("decode task failed: {}", e)))?;
        self.metrics.record_payloads(payloads.len());

        for payload in &payloads {
            let Some(ticket) = self.extractor.extract(payload) else {
                self.metrics.record_ignored_payload();
                tracing::debug!("Ignoring QR payload without ticket");
                continue;
            };

            let now = Instant::now();
            if gate.admit(ticket, now) == Admission::Suppressed {
                self.metrics.record_suppressed();
                tracing::debug!("Ticket {} seen within cooldown, skipping", ticket);
                continue;
            }

            self.metrics.record_admitted();
            self.state.record_match(ticket, now);
            self.events.success(format!(
                "Valid {} QR code found, claiming ticket",
                self.settings.game.display_name()
            ));

            let outcome = self.claim(ticket.to_string()).await?;
            return Ok(if outcome.success {
                Step::Claimed
            } else {
                Step::Scanned
            });
        }

        Ok(Step::Scanned)
    }

    /// Race one login and report it. Runs to completion even if a stop arrives meanwhile.
    async fn claim(&self, ticket: String) -> Result<Outcome, SessionExit> {
        let login = Arc::clone(&self.services.login);
        let game = self.settings.game;
        let account = self.account.clone();
        let started = Instant::now();

        let outcome = self
            .runtime
            .run_blocking(move || login.attempt(&ticket, game, &account))
            .await
            .map_err(|e| SessionExit::Fault(format!("login task failed: {}", e)))?;

        self.metrics.record_login(outcome.success, started.elapsed());
        self.events.outcome(outcome.success, outcome.message.clone());
        if outcome.success {
            self.events.success(format!(
                "Ticket claimed: account {}, game {}",
                self.account.masked_uid(),
                game.display_name()
            ));
        } else {
            self.events
                .error(format!("Ticket claim failed: {}", outcome.message));
        }

        Ok(outcome)
    }

    fn sample_fps(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            let fps = 1.0 / secs;
            self.state.record_fps(fps);
            self.events.fps(fps);
        }
    }

    fn wind_down(&self, exit: SessionExit) {
        match &exit {
            SessionExit::Stopped => tracing::debug!("Session loop observed stop request"),
            SessionExit::TargetLost => self.events.error(format!(
                "Target {} can no longer be captured, stopping scan",
                self.settings.target
            )),
            SessionExit::Fault(reason) => {
                self.events.error(format!("Scan aborted: {}", reason));
            }
        }

        self.metrics.log_summary();
        self.events.info("Scan stopped");
        self.events.fps(0.0);
        self.state.finish();
    }
}

/// Sleep for `duration` unless cancellation arrives first. Returns true when cancelled.
///
/// A dropped sender counts as cancellation, so a session never outlives its engine.
async fn pause_or_cancel(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *cancel.borrow() {
        return true;
    }
    if duration.is_zero() {
        return false;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
    }
}
