// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::tree::AllocatorTree;
use crate::walk::PreOrder;
use memstat_shm::{ContextCounters, SlotSnapshot, StatsArena};
use serde::{Deserialize, Serialize};

/// One row of the local listing: a context of the calling process's own live
/// tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRow {
    pub name: String,
    pub depth: u32,
    pub counters: ContextCounters,
}

/// One row of the instance-wide listing: a published context of some
/// worker's latest snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatRow {
    pub owner: i32,
    pub name: String,
    pub depth: u32,
    pub counters: ContextCounters,
}

/// Lazy listing of the calling process's own live allocator tree.
///
/// Bypasses the arena entirely: no other process mutates this process's
/// tree, so no lock is taken, and names are not bounded the way published
/// entries are.
pub fn local_stats<T: AllocatorTree + ?Sized>(tree: &T) -> impl Iterator<Item = StatRow> + '_ {
    PreOrder::new(tree).map(move |(node, depth)| StatRow {
        name: tree.name(node).to_owned(),
        depth,
        counters: tree.counters(node),
    })
}

/// Two-level iteration over every occupied slot of an arena.
///
/// Advancing past the current private copy scans forward through the slot
/// array: each candidate is locked shared (blocking, but only for the length
/// of a bulk copy), vacant slots are skipped, and the first occupied slot is
/// copied wholesale and unlocked before any row is yielded. Rows then come
/// out of the private copy with no lock held, so a worker overwriting its
/// live slot cannot disturb rows already being consumed.
///
/// Rows appear in slot scan order, then in capture order within one slot.
/// Each copy is consistent for its slot only; the aggregate is a snapshot of
/// snapshots taken at slightly different moments.
pub struct InstanceIter<'a> {
    arena: &'a StatsArena,
    next_slot: usize,
    copy: SlotSnapshot,
    cursor: usize,
}

impl<'a> InstanceIter<'a> {
    /// Any process that mapped the region may enumerate it; workers usually
    /// go through [`Sampler::instance_stats`](crate::Sampler::instance_stats)
    /// instead, which also checks that collection is active.
    pub fn over_arena(arena: &'a StatsArena) -> Self {
        Self {
            arena,
            next_slot: 0,
            copy: SlotSnapshot::new(),
            cursor: 0,
        }
    }

    fn advance_slot(&mut self) -> bool {
        while self.next_slot < self.arena.slot_count() {
            let index = self.next_slot;
            self.next_slot += 1;
            if self.arena.copy_slot(index, &mut self.copy) {
                self.cursor = 0;
                return true;
            }
        }
        false
    }
}

impl Iterator for InstanceIter<'_> {
    type Item = InstanceStatRow;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cursor < self.copy.entries().len() {
                let entry = self.copy.entries()[self.cursor];
                self.cursor += 1;
                return Some(InstanceStatRow {
                    owner: self.copy.owner(),
                    name: entry.name().to_owned(),
                    depth: entry.depth(),
                    counters: entry.counters(),
                });
            }
            if !self.advance_slot() {
                return None;
            }
        }
    }
}
