// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::Period;
use crate::error::CollectorError;
use crate::reader::InstanceIter;
use crate::tick::TickGate;
use crate::tree::AllocatorTree;
use crate::walk::PreOrder;
use memstat_shm::{ContextEntry, StatsArena};

/// What one trigger did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleOutcome {
    /// A snapshot with this many entries was published.
    Sampled { entries: usize },
    /// The gate refused: the sampling period has not elapsed.
    Throttled,
    /// A reader held the slot. The sample is skipped (no retry loop, no
    /// wait) and the next natural trigger tries again.
    Busy,
}

/// The publishing side of one worker.
///
/// Holds explicit per-process context (the assigned slot, the owner id, the
/// gate) rather than ambient globals, so several independent samplers can
/// coexist in one process. The host triggers [`sample`](Self::sample) at its
/// own opportune points, e.g. around a unit of work; the sampler is purely
/// reactive and keeps no notion of when it runs.
pub struct Sampler {
    arena: StatsArena,
    slot: usize,
    owner: i32,
    gate: TickGate,
    claimed: bool,
}

impl Sampler {
    /// `slot` is the worker's dense arena index, assigned once for its
    /// lifetime; `owner` is the id readers will see, conventionally the
    /// process id.
    ///
    /// # Panics
    /// Panics if `slot` is out of range for the arena.
    pub fn new(arena: StatsArena, slot: usize, owner: i32, period: Period) -> Self {
        assert!(slot < arena.slot_count(), "slot index out of range");
        Self {
            arena,
            slot,
            owner,
            gate: TickGate::new(period),
            claimed: false,
        }
    }

    /// One trigger. Never blocks and never fails; the worst outcome is a
    /// skipped sample.
    ///
    /// The first trigger claims this worker's slot for the rest of the
    /// sampler's life (released again by [`release`](Self::release) or drop).
    /// After the gate agrees, the tree is flattened pre-order into the slot
    /// under a single non-blocking exclusive lock acquire; trees with more
    /// nodes than the slot holds publish a truncated prefix.
    pub fn sample<T: AllocatorTree + ?Sized>(&mut self, tree: &T) -> SampleOutcome {
        if !self.claimed {
            self.claimed = true;
            tracing::debug!(slot = self.slot, owner = self.owner, "claimed arena slot");
        }
        if !self.gate.should_sample() {
            return SampleOutcome::Throttled;
        }
        let Some(mut guard) = self.arena.try_begin_sample(self.slot, self.owner) else {
            return SampleOutcome::Busy;
        };
        for (node, depth) in PreOrder::new(tree) {
            let entry = ContextEntry::new(tree.name(node), depth, tree.counters(node));
            if !guard.push(entry) {
                break;
            }
        }
        SampleOutcome::Sampled {
            entries: guard.len(),
        }
    }

    /// Takes effect at the next trigger.
    pub fn set_period(&self, period: Period) {
        self.gate.set_period(period);
    }

    pub fn period_secs(&self) -> u64 {
        self.gate.period_secs()
    }

    /// Whether this worker has claimed its slot, i.e. has been triggered at
    /// least once.
    pub fn is_active(&self) -> bool {
        self.claimed
    }

    /// Instance-wide listing over every occupied slot, this worker's
    /// included. Fails if sampling was never enabled for this process.
    pub fn instance_stats(&self) -> Result<InstanceIter<'_>, CollectorError> {
        if !self.claimed {
            return Err(CollectorError::NotActive);
        }
        Ok(InstanceIter::over_arena(&self.arena))
    }

    /// Best-effort vacate of this worker's slot: a single unlocked atomic
    /// store, safe to call from exit paths where the rest of the process is
    /// already in an arbitrary state of teardown. A reader racing this sees
    /// a stale-but-self-consistent snapshot or a vacant slot. Idempotent;
    /// also runs on drop.
    pub fn release(&mut self) {
        if self.claimed {
            self.claimed = false;
            self.arena.release_slot(self.slot);
            tracing::debug!(slot = self.slot, "released arena slot");
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.release();
    }
}
