//! Debounced redraw scheduling.
//!
//! Single-character typing at the end of the line requests a debounced redraw: the deadline
//! is (re)armed and the draw happens once input goes quiet. Any immediate redraw cancels the
//! pending deadline since it already shows the latest state. Only one deadline exists at a
//! time; requesting again replaces it, so a stale deadline never fires.

use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl RedrawScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the deadline at `now + delay`.
    pub fn request(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True (and disarmed) once `now` has reached the deadline.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_replaces_pending_deadline() {
        let mut s = RedrawScheduler::new(Duration::from_millis(16));
        let t0 = Instant::now();
        s.request(t0);
        s.request(t0 + Duration::from_millis(10));
        assert_eq!(s.deadline(), Some(t0 + Duration::from_millis(26)));
        assert!(!s.take_due(t0 + Duration::from_millis(20)));
        assert!(s.take_due(t0 + Duration::from_millis(26)));
        assert!(!s.is_pending());
    }

    #[test]
    fn cancel_prevents_firing() {
        let mut s = RedrawScheduler::default();
        let t0 = Instant::now();
        s.request(t0);
        s.cancel();
        assert!(!s.take_due(t0 + Duration::from_secs(1)));
    }
}
