// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::slot_lock::SlotLock;
use core::cell::UnsafeCell;
use core::sync::atomic::AtomicI32;

/// Maximum bytes of an allocator-context name stored per entry; longer names
/// are truncated at a UTF-8 character boundary.
pub const NAME_MAX: usize = 63;

/// Entries one slot can hold. A tree with more nodes publishes a prefix; this
/// is a capacity bound, not an error.
pub const SLOT_CAP: usize = 1024;

/// Owner id of a vacant slot.
pub const OWNER_NONE: i32 = -1;

/// Usage counters of a single allocator context, exclusive of descendants.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContextCounters {
    pub blocks: u64,
    pub free_chunks: u64,
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// One flattened allocator-context record: a bounded name, the depth below
/// the tree root, and the context's counters. Entries are written wholesale
/// under the slot's exclusive lock and never patched in place.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ContextEntry {
    name: [u8; NAME_MAX],
    name_len: u8,
    depth: u32,
    counters: ContextCounters,
}

impl ContextEntry {
    pub fn new(name: &str, depth: u32, counters: ContextCounters) -> Self {
        let len = truncated_len(name, NAME_MAX);
        let mut buf = [0u8; NAME_MAX];
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        ContextEntry {
            name: buf,
            name_len: len as u8,
            depth,
            counters,
        }
    }

    pub fn name(&self) -> &str {
        // Entries are only ever built from &str, truncated on a character
        // boundary, so the stored bytes are valid UTF-8.
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn counters(&self) -> ContextCounters {
        self.counters
    }
}

/// Largest prefix length of `name` that fits in `max` bytes and ends on a
/// character boundary.
fn truncated_len(name: &str, max: usize) -> usize {
    if name.len() <= max {
        return name.len();
    }
    let mut len = max;
    while len > 0 && !name.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// The lock-protected payload of a slot.
#[repr(C)]
pub(crate) struct SlotBody {
    pub(crate) entry_count: u32,
    pub(crate) entries: [ContextEntry; SLOT_CAP],
}

/// One worker's reserved region within the arena.
///
/// `owner` is atomic because vacating a slot on worker exit is a single
/// unlocked store (the worker may be mid-teardown and must not touch the
/// lock). Everything in `body` is only accessed under `lock`.
#[repr(C)]
pub(crate) struct WorkerSlot {
    pub(crate) lock: SlotLock,
    pub(crate) owner: AtomicI32,
    pub(crate) body: UnsafeCell<SlotBody>,
}

/// A private copy of one occupied slot, filled under a shared lock and then
/// read without any lock. The buffer is reusable across slots so a full scan
/// allocates once.
pub struct SlotSnapshot {
    owner: i32,
    entries: Vec<ContextEntry>,
}

impl SlotSnapshot {
    pub fn new() -> Self {
        Self {
            owner: OWNER_NONE,
            entries: Vec::with_capacity(SLOT_CAP),
        }
    }

    pub fn owner(&self) -> i32 {
        self.owner
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub(crate) fn fill(&mut self, owner: i32, entries: &[ContextEntry]) {
        self.owner = owner;
        self.entries.clear();
        self.entries.extend_from_slice(entries);
    }
}

impl Default for SlotSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_roundtrip() {
        let counters = ContextCounters {
            blocks: 3,
            free_chunks: 1,
            total_bytes: 8192,
            free_bytes: 512,
        };
        let entry = ContextEntry::new("TopMemoryContext", 0, counters);
        assert_eq!(entry.name(), "TopMemoryContext");
        assert_eq!(entry.depth(), 0);
        assert_eq!(entry.counters(), counters);
    }

    #[test]
    fn long_names_truncate_to_bound() {
        let long = "x".repeat(200);
        let entry = ContextEntry::new(&long, 2, ContextCounters::default());
        assert_eq!(entry.name().len(), NAME_MAX);
        assert!(long.starts_with(entry.name()));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 62 ASCII bytes followed by a 3-byte character: the cut at 63 lands
        // mid-character and must back off.
        let name = format!("{}日", "a".repeat(62));
        let entry = ContextEntry::new(&name, 0, ContextCounters::default());
        assert_eq!(entry.name(), "a".repeat(62));
    }

    #[test]
    fn zeroed_entry_reads_as_empty() {
        // Slots come from a zero-initialized region; all-zero bytes must be
        // a valid, empty entry.
        let entry: ContextEntry = unsafe { core::mem::zeroed() };
        assert_eq!(entry.name(), "");
        assert_eq!(entry.depth(), 0);
        assert_eq!(entry.counters(), ContextCounters::default());
    }
}
