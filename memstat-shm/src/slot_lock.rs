// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::hint;
use core::sync::atomic::{AtomicU32, Ordering};

const WRITER: u32 = 1 << 31;

/// A word-sized shared/exclusive spinlock that lives inside a shared memory
/// region and is usable from every process mapping it.
///
/// The state word holds a writer bit and a reader count. The writer side is a
/// single compare-and-swap that never waits: a producer that loses the race
/// skips its turn instead of stalling. The reader side blocks, but callers
/// only hold the lock for a bounded bulk copy, so the wait is brief.
#[repr(transparent)]
pub struct SlotLock(AtomicU32);

impl SlotLock {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Single exclusive attempt. Fails if any reader or writer holds the
    /// lock; never spins.
    pub fn try_lock_exclusive(&self) -> bool {
        self.0
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn unlock_exclusive(&self) {
        self.0.store(0, Ordering::Release);
    }

    /// Blocking shared acquire. Spins while a writer holds the lock; any
    /// number of readers may hold it at once.
    pub fn lock_shared(&self) {
        let mut state = self.0.load(Ordering::Relaxed);
        loop {
            if state & WRITER != 0 {
                hint::spin_loop();
                state = self.0.load(Ordering::Relaxed);
                continue;
            }
            match self.0.compare_exchange_weak(
                state,
                state + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(found) => state = found,
            }
        }
    }

    pub fn unlock_shared(&self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}

impl Default for SlotLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SlotLock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn exclusive_excludes_exclusive() {
        let lock = SlotLock::new();
        assert!(lock.try_lock_exclusive());
        assert!(!lock.try_lock_exclusive());
        lock.unlock_exclusive();
        assert!(lock.try_lock_exclusive());
        lock.unlock_exclusive();
    }

    #[test]
    fn shared_excludes_exclusive_but_not_shared() {
        let lock = SlotLock::new();
        lock.lock_shared();
        lock.lock_shared();
        assert!(!lock.try_lock_exclusive());
        lock.unlock_shared();
        assert!(!lock.try_lock_exclusive());
        lock.unlock_shared();
        assert!(lock.try_lock_exclusive());
        lock.unlock_exclusive();
    }

    #[test]
    fn exclusive_attempt_returns_immediately_under_reader() {
        // The writer side must not wait out a reader, only report contention.
        let lock = SlotLock::new();
        lock.lock_shared();
        for _ in 0..100 {
            assert!(!lock.try_lock_exclusive());
        }
        lock.unlock_shared();
    }

    #[test]
    fn reader_waits_out_writer() {
        let lock = Arc::new(SlotLock::new());
        let released = Arc::new(AtomicBool::new(false));
        assert!(lock.try_lock_exclusive());

        let reader = {
            let lock = Arc::clone(&lock);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                lock.lock_shared();
                // The writer must have released before we got the lock.
                assert!(released.load(Ordering::SeqCst));
                lock.unlock_shared();
            })
        };

        thread::sleep(Duration::from_millis(20));
        released.store(true, Ordering::SeqCst);
        lock.unlock_exclusive();
        reader.join().unwrap();
    }
}
