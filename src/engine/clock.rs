//! DUALLOG - Logical Clock
//! Hands out strictly increasing scores shared by both logs.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Score;

/// Monotonic score generator.
///
/// Seeded from the wall clock once, then advanced by a fixed `step` per
/// call. `next` is a single `fetch_add`, so concurrent callers never see
/// the same value.
#[derive(Debug)]
pub struct LogicalClock {
    seed: Score,
    step: i64,
    next: AtomicI64,
}

impl LogicalClock {
    /// Start at `seed` and advance by `step`.
    pub fn new(seed: Score, step: i64) -> Self {
        debug_assert!(step > 0, "clock step must be positive");
        Self {
            seed,
            step,
            next: AtomicI64::new(seed),
        }
    }

    /// Start at the current wall-clock time in nanoseconds.
    pub fn starting_now(step: i64) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self::new(i64::try_from(nanos).unwrap_or(i64::MAX / 2), step)
    }

    /// Take the next score.
    pub fn next(&self) -> Score {
        self.next.fetch_add(self.step, Ordering::Relaxed)
    }

    /// Score the clock was started at.
    pub fn seed(&self) -> Score {
        self.seed
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// Score the next call to [`LogicalClock::next`] would return.
    pub fn peek(&self) -> Score {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_advances_by_step() {
        let clock = LogicalClock::new(100, 10);
        assert_eq!(clock.next(), 100);
        assert_eq!(clock.next(), 110);
        assert_eq!(clock.peek(), 120);
        assert_eq!(clock.seed(), 100);
    }

    #[test]
    fn test_seeded_from_wall_clock() {
        let clock = LogicalClock::starting_now(10_000);
        // Any time after 2020 in nanoseconds.
        assert!(clock.seed() > 1_577_836_800_000_000_000);
    }

    #[test]
    fn test_concurrent_scores_are_distinct() {
        let clock = Arc::new(LogicalClock::new(0, 1));
        let mut handles = vec![];

        for _ in 0..8 {
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                (0..1000).map(|_| clock.next()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for score in handle.join().unwrap() {
                assert!(seen.insert(score), "score {} handed out twice", score);
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}
