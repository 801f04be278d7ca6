//! In-flight motion tracking.
//!
//! The controller exposes no "is moving" signal, so a move is tracked from the
//! moment a command is issued until a terminal status arrives, an obstruction
//! forces a stop, or the safety timer gives up on it.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Travel time assumed until the device reports its own.
pub const DEFAULT_TRAVEL_TIME_SECS: u32 = 20;

/// Slack added to the travel time before the safety timer fires.
pub const SAFETY_MARGIN_SECS: u32 = 5;

/// Bookkeeping for the single move a door may have in flight.
///
/// Every begin or clear bumps `generation`, so a timer armed for an earlier
/// move can tell it has been superseded even if it fires before cancellation
/// reaches it.
#[derive(Debug)]
pub struct MotionSession {
    in_motion: bool,
    generation: u64,
    timer: Option<CancellationToken>,
    travel_time_secs: u32,
}

impl MotionSession {
    pub fn new() -> Self {
        Self {
            in_motion: false,
            generation: 0,
            timer: None,
            travel_time_secs: DEFAULT_TRAVEL_TIME_SECS,
        }
    }

    pub fn is_active(&self) -> bool {
        self.in_motion
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn travel_time_secs(&self) -> u32 {
        self.travel_time_secs
    }

    /// Store a travel time reported by the device, clamped to at least one second.
    ///
    /// Only affects timers armed afterwards.
    pub fn set_travel_time_secs(&mut self, secs: i64) -> u32 {
        self.travel_time_secs = secs.clamp(1, i64::from(u32::MAX)) as u32;
        self.travel_time_secs
    }

    /// How long the safety timer for a new move should run.
    pub fn safety_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.travel_time_secs) + u64::from(SAFETY_MARGIN_SECS))
    }

    /// Start a new move and return its generation.
    pub fn begin(&mut self) -> u64 {
        self.cancel_timer();
        self.in_motion = true;
        self.generation += 1;
        self.generation
    }

    /// Attach the safety timer for `generation`.
    ///
    /// Returns false (and cancels `token`) when that move already ended, so a
    /// late acknowledgement never leaves a timer behind.
    pub fn arm(&mut self, generation: u64, token: CancellationToken) -> bool {
        if !self.in_motion || self.generation != generation {
            token.cancel();
            return false;
        }
        self.cancel_timer();
        self.timer = Some(token);
        true
    }

    /// End the move, whatever its generation. Returns whether one was active.
    pub fn clear(&mut self) -> bool {
        self.cancel_timer();
        let was_active = self.in_motion;
        if was_active {
            self.in_motion = false;
            self.generation += 1;
        }
        was_active
    }

    /// Undo `begin` after the command for `generation` was rejected.
    pub fn rollback(&mut self, generation: u64) -> bool {
        if self.in_motion && self.generation == generation {
            self.clear()
        } else {
            false
        }
    }

    /// Safety timer for `generation` elapsed. Clears the flag only if that move is still current.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.in_motion && self.generation == generation {
            self.timer = None;
            self.in_motion = false;
            self.generation += 1;
            true
        } else {
            false
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
    }
}

impl Default for MotionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MotionSession {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_clear() {
        let mut session = MotionSession::new();
        assert!(!session.is_active());

        let generation = session.begin();
        assert!(session.is_active());
        assert!(session.arm(generation, CancellationToken::new()));
        assert!(session.has_timer());

        assert!(session.clear());
        assert!(!session.is_active());
        assert!(!session.has_timer());

        // Clearing twice is harmless
        assert!(!session.clear());
    }

    #[test]
    fn test_rearming_cancels_previous_timer() {
        let mut session = MotionSession::new();
        let generation = session.begin();
        let first = CancellationToken::new();
        let second = CancellationToken::new();

        assert!(session.arm(generation, first.clone()));
        assert!(session.arm(generation, second.clone()));
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut session = MotionSession::new();
        let old = session.begin();
        session.clear();
        let current = session.begin();

        // Late arm for the old move is refused and its token cancelled
        let late = CancellationToken::new();
        assert!(!session.arm(old, late.clone()));
        assert!(late.is_cancelled());

        // Expiry or rollback of the old move leaves the current one alone
        assert!(!session.expire(old));
        assert!(!session.rollback(old));
        assert!(session.is_active());

        assert!(session.expire(current));
        assert!(!session.is_active());
    }

    #[test]
    fn test_travel_time_clamped() {
        let mut session = MotionSession::new();
        assert_eq!(session.travel_time_secs(), DEFAULT_TRAVEL_TIME_SECS);
        assert_eq!(session.safety_timeout(), Duration::from_secs(25));

        assert_eq!(session.set_travel_time_secs(35), 35);
        assert_eq!(session.safety_timeout(), Duration::from_secs(40));

        assert_eq!(session.set_travel_time_secs(0), 1);
        assert_eq!(session.set_travel_time_secs(-12), 1);
    }

    #[test]
    fn test_drop_cancels_timer() {
        let token = CancellationToken::new();
        {
            let mut session = MotionSession::new();
            let generation = session.begin();
            session.arm(generation, token.clone());
        }
        assert!(token.is_cancelled());
    }
}
