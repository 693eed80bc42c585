use std::time::{Duration, Instant};

/// Verdict of the dedup gate for one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Suppressed,
}

/// Suppresses re-processing of the ticket the session just raced.
///
/// The same QR code stays on screen across several capture iterations, so a repeat of the
/// last admitted ticket inside `cooldown` is dropped. A different ticket is always
/// admitted immediately. State lives for one scan session only.
#[derive(Debug, Clone)]
pub struct DedupGate {
    cooldown: Duration,
    last: Option<(String, Instant)>,
}

impl DedupGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    /// Decide whether `ticket` seen at `now` should be raced.
    ///
    /// Only an accepted ticket updates the gate's memory.
    pub fn admit(&mut self, ticket: &str, now: Instant) -> Admission {
        if let Some((last_ticket, last_time)) = &self.last {
            if last_ticket == ticket && now.saturating_duration_since(*last_time) < self.cooldown {
                return Admission::Suppressed;
            }
        }

        self.last = Some((ticket.to_string(), now));
        Admission::Accepted
    }

    pub fn last_ticket(&self) -> Option<&str> {
        self.last.as_ref().map(|(t, _)| t.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(5);

    #[test]
    fn test_first_ticket_accepted() {
        let mut gate = DedupGate::new(COOLDOWN);
        assert_eq!(gate.admit("ab12", Instant::now()), Admission::Accepted);
        assert_eq!(gate.last_ticket(), Some("ab12"));
    }

    #[test]
    fn test_repeat_within_cooldown_suppressed() {
        let mut gate = DedupGate::new(COOLDOWN);
        let t0 = Instant::now();
        gate.admit("ab12", t0);

        assert_eq!(
            gate.admit("ab12", t0 + Duration::from_millis(4999)),
            Admission::Suppressed
        );
    }

    #[test]
    fn test_repeat_at_cooldown_boundary_accepted() {
        let mut gate = DedupGate::new(COOLDOWN);
        let t0 = Instant::now();
        gate.admit("ab12", t0);

        assert_eq!(gate.admit("ab12", t0 + COOLDOWN), Admission::Accepted);
    }

    #[test]
    fn test_suppression_does_not_refresh_window() {
        let mut gate = DedupGate::new(COOLDOWN);
        let t0 = Instant::now();
        gate.admit("ab12", t0);
        gate.admit("ab12", t0 + Duration::from_secs(4));

        // Window still measured from t0
        assert_eq!(
            gate.admit("ab12", t0 + Duration::from_secs(5)),
            Admission::Accepted
        );
    }

    #[test]
    fn test_different_ticket_accepted_immediately() {
        let mut gate = DedupGate::new(COOLDOWN);
        let t0 = Instant::now();
        gate.admit("ab12", t0);

        assert_eq!(gate.admit("cd34", t0), Admission::Accepted);
        // The rotated ticket is now the one being suppressed
        assert_eq!(gate.admit("cd34", t0), Admission::Suppressed);
        assert_eq!(gate.admit("ab12", t0), Admission::Accepted);
    }
}
