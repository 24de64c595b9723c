//! Injectable platform clock: real wall-clock, fixed (tests), and replay
//! (advance on each envelope's `ingested_at`) implementations of the same
//! capability trait, per spec §9.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Capability trait for reading the platform clock. Pass `&dyn
/// PlatformClock` through constructors rather than reaching for a global;
/// `FixedClock`/`ReplayClock` still use an interior `RwLock` because
/// tests and replay need to mutate the current time after construction.
pub trait PlatformClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl PlatformClock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock fixed to a single instant, only advanced explicitly. Used in
/// unit tests that need deterministic `ingested_at` values.
pub struct FixedClock {
    current: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(at),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.write() = at;
    }
}

impl PlatformClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read()
    }
}

/// A clock that advances to each envelope's `ingested_at` as replay
/// consumes it, so replayed batches reproduce the timestamps they were
/// originally admitted with instead of stamping the replay's wall-clock
/// time.
pub struct ReplayClock {
    current: RwLock<DateTime<Utc>>,
}

impl ReplayClock {
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(at),
        }
    }

    /// Advance the clock to `at` if it is later than the current value.
    /// Replay is expected to walk envelopes in `created_at` order; this
    /// guards against a clock moving backwards on out-of-order replay
    /// input.
    pub fn advance_to(&self, at: DateTime<Utc>) {
        let mut current = self.current.write();
        if at > *current {
            *current = at;
        }
    }
}

impl PlatformClock for ReplayClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_does_not_move_on_its_own() {
        let t0 = Utc::now();
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);
        assert_eq!(clock.now(), t0);
    }

    #[test]
    fn replay_clock_advances_forward_only() {
        let t0 = Utc::now();
        let clock = ReplayClock::starting_at(t0);
        let later = t0 + chrono::Duration::seconds(5);
        clock.advance_to(later);
        assert_eq!(clock.now(), later);

        let earlier = t0 - chrono::Duration::seconds(5);
        clock.advance_to(earlier);
        assert_eq!(clock.now(), later, "must not move backwards");
    }
}
