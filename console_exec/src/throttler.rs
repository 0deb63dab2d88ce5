//! # Command throttler
//!
//! Decides, for each candidate command, whether it should actually be put on
//! the wire. Two gates must both pass:
//!
//! - at least the minimum interval has elapsed since the last transmitted
//!   command, bounding the outbound rate
//! - the candidate differs from the last transmitted command after wire
//!   quantisation, suppressing redundant repeats
//!
//! The main loop ticks at the same cadence independently of input events, so
//! a held, unchanging input is still sent exactly once, and
//! [`Throttler::reset`] forces a fresh send of current state after the
//! channel is re-established.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::{Duration, Instant};

use comms_if::cmd::Command;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Rate limiter and deduplicator for the outbound command stream.
pub struct Throttler {
    min_interval: Duration,

    last_sent: Option<Command>,

    last_send_time: Option<Instant>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Throttler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
            last_send_time: None,
        }
    }

    /// Pure decision function: should `candidate` be transmitted at `now`?
    ///
    /// Does not update any state, see [`Throttler::offer`].
    pub fn should_send(&self, candidate: &Command, now: Instant) -> bool {
        if candidate.is_empty() {
            return false;
        }

        let interval_ok = match self.last_send_time {
            Some(t) => now.saturating_duration_since(t) >= self.min_interval,
            None => true,
        };

        let changed = match &self.last_sent {
            Some(last) => !candidate.wire_eq(last),
            None => true,
        };

        interval_ok && changed
    }

    /// Offer a candidate for transmission.
    ///
    /// Returns the command to transmit if both gates pass, updating the
    /// internal last-sent state, or `None` if the candidate is suppressed.
    pub fn offer(&mut self, candidate: Command, now: Instant) -> Option<Command> {
        if !self.should_send(&candidate, now) {
            return None;
        }

        self.last_sent = Some(candidate);
        self.last_send_time = Some(now);

        Some(candidate)
    }

    /// Forget the last-sent state so the next offer is transmitted
    /// regardless of redundancy.
    ///
    /// Called on connection establishment so the vehicle receives the
    /// current state even if it matches what was sent before the drop.
    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_send_time = None;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(40);

    #[test]
    fn test_first_offer_sends() {
        let mut t = Throttler::new(INTERVAL);
        let now = Instant::now();

        assert!(t.offer(Command::motion(0.0, 0), now).is_some());
    }

    #[test]
    fn test_identical_repeat_suppressed() {
        let mut t = Throttler::new(INTERVAL);
        let now = Instant::now();

        assert!(t.offer(Command::motion(90.0, 40), now).is_some());

        // Same payload well after the interval has passed
        let later = now + Duration::from_secs(10);
        assert!(t.offer(Command::motion(90.0, 40), later).is_none());

        // Sub-quantisation jitter is still the same payload
        assert!(t.offer(Command::motion(90.04, 40), later).is_none());
    }

    #[test]
    fn test_changed_payload_within_interval_suppressed() {
        let mut t = Throttler::new(INTERVAL);
        let now = Instant::now();

        assert!(t.offer(Command::motion(0.0, 0), now).is_some());

        // Different payload but too soon
        let soon = now + Duration::from_millis(10);
        assert!(t.offer(Command::motion(45.0, 20), soon).is_none());

        // Same payload once the interval elapses is sent
        let later = now + INTERVAL;
        assert!(t.offer(Command::motion(45.0, 20), later).is_some());
    }

    #[test]
    fn test_no_two_identical_sends_close_together() {
        let mut t = Throttler::new(INTERVAL);
        let mut now = Instant::now();
        let mut last: Option<(Command, Instant)> = None;

        // Offer a changing then repeating stream at 5 ms spacing
        for i in 0..100u32 {
            let cmd = Command::motion((i / 20) as f64, 10);

            if let Some(sent) = t.offer(cmd, now) {
                if let Some((prev_cmd, prev_t)) = last {
                    let close = now.duration_since(prev_t) < INTERVAL;
                    assert!(!(sent.wire_eq(&prev_cmd) && close));
                }
                last = Some((sent, now));
            }

            now += Duration::from_millis(5);
        }
    }

    #[test]
    fn test_empty_command_never_sent() {
        let mut t = Throttler::new(INTERVAL);
        assert!(t.offer(Command::default(), Instant::now()).is_none());
    }

    #[test]
    fn test_reset_allows_resend() {
        let mut t = Throttler::new(INTERVAL);
        let now = Instant::now();

        assert!(t.offer(Command::motion(0.0, 0), now).is_some());

        let later = now + Duration::from_secs(1);
        assert!(t.offer(Command::motion(0.0, 0), later).is_none());

        // After a reconnect the same state must go out again
        t.reset();
        assert!(t.offer(Command::motion(0.0, 0), later).is_some());
    }
}
