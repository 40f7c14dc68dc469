// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::Period;
use core::sync::atomic::{AtomicU64, Ordering};

const NANOS_PER_SEC: u64 = 1_000_000_000;

fn wall_clock_ns() -> u64 {
    let mut ts: libc::timespec = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    (ts.tv_sec as u64) * NANOS_PER_SEC + ts.tv_nsec as u64
}

/// Wall-clock gate enforcing the minimum interval between accepted samples.
///
/// Answers yes at most once per period, records the acceptance time only when
/// it does (a refusal has no side effects), and accepts every trigger when
/// the period is zero. The first trigger after construction always passes.
///
/// The comparison is wall-clock based and tolerates coarse clock granularity;
/// it does not require a monotonic source. After a backward clock jump the
/// gate stays quiet until the clock catches back up, which under-samples but
/// never bursts.
pub struct TickGate {
    last_ns: AtomicU64,
    period_secs: AtomicU64,
}

impl TickGate {
    pub fn new(period: Period) -> Self {
        TickGate {
            last_ns: AtomicU64::new(0),
            period_secs: AtomicU64::new(period.as_secs()),
        }
    }

    /// The common (refusing) case is one clock read and a compare.
    pub fn should_sample(&self) -> bool {
        self.check(wall_clock_ns())
    }

    fn check(&self, now: u64) -> bool {
        let period_ns = self.period_secs.load(Ordering::Relaxed) * NANOS_PER_SEC;
        if now.saturating_sub(self.last_ns.load(Ordering::Relaxed)) >= period_ns {
            self.last_ns.store(now, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Takes effect at the next trigger.
    pub fn set_period(&self, period: Period) {
        self.period_secs.store(period.as_secs(), Ordering::Relaxed);
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = NANOS_PER_SEC;

    fn gate(secs: u64) -> TickGate {
        TickGate::new(Period::from_secs(secs).unwrap())
    }

    #[test]
    fn zero_period_accepts_every_trigger() {
        let gate = gate(0);
        for now in [1, 2, 2, 5, 1_000_000 * SEC] {
            assert!(gate.check(now));
        }
    }

    #[test]
    fn accepts_at_most_once_per_window() {
        let gate = gate(10);
        assert!(gate.check(100 * SEC));
        // Every trigger strictly inside the window is refused.
        assert!(!gate.check(100 * SEC + 1));
        assert!(!gate.check(105 * SEC));
        assert!(!gate.check(110 * SEC - 1));
        // The boundary reopens the gate, and a new window starts there.
        assert!(gate.check(110 * SEC));
        assert!(!gate.check(119 * SEC));
        assert!(gate.check(121 * SEC));
    }

    #[test]
    fn refusal_leaves_the_window_anchored() {
        // Refused triggers must not push the next acceptance further out.
        let gate = gate(10);
        assert!(gate.check(50 * SEC));
        for now in 0..9 {
            assert!(!gate.check((51 + now) * SEC));
        }
        assert!(gate.check(60 * SEC));
    }

    #[test]
    fn first_trigger_always_passes() {
        // Any realistic wall-clock reading exceeds the largest period.
        let now = wall_clock_ns();
        assert!(gate(10).check(now));
        assert!(gate(crate::config::MAX_PERIOD_SECS).check(now));
    }

    #[test]
    fn backward_clock_jump_stays_quiet() {
        let gate = gate(10);
        assert!(gate.check(100 * SEC));
        assert!(!gate.check(95 * SEC));
        assert!(gate.check(110 * SEC));
    }

    #[test]
    fn period_change_applies_to_the_next_trigger() {
        let gate = gate(10);
        assert!(gate.check(100 * SEC));
        assert!(!gate.check(103 * SEC));
        gate.set_period(Period::from_secs(2).unwrap());
        assert!(gate.check(103 * SEC));
    }

    #[test]
    fn wall_clock_is_sane() {
        // CLOCK_REALTIME is far past the epoch on any host running tests.
        assert!(wall_clock_ns() > 1_000_000_000 * SEC);
    }
}
