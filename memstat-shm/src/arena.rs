// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::slot::{ContextEntry, SlotSnapshot, WorkerSlot, OWNER_NONE, SLOT_CAP};
use crate::slot_lock::SlotLock;
use core::mem;
use core::ptr::NonNull;
use core::sync::atomic::Ordering;
use std::io;

const ARENA_MAGIC: u32 = 0x4d53_5441; // "MSTA"
const ARENA_VERSION: u32 = 1;

/// Size of the header sub-region (magic + version + slot count + padding).
const HEADER_SIZE: usize = 64;

#[repr(C)]
struct ArenaHeader {
    magic: u32,
    version: u32,
    nslots: u32,
}

const SLOT_SIZE: usize = mem::size_of::<WorkerSlot>();

// Compile-time checks.
const _: () = assert!(
    mem::size_of::<ArenaHeader>() <= HEADER_SIZE,
    "arena header exceeds its sub-region"
);
const _: () = assert!(
    HEADER_SIZE % mem::align_of::<WorkerSlot>() == 0,
    "slot array is not properly aligned after the header"
);
const _: () = assert!(
    SLOT_SIZE % mem::align_of::<WorkerSlot>() == 0,
    "slot stride breaks slot alignment"
);

/// The fixed array of worker slots living inside a caller-provided shared
/// memory region.
///
/// The arena is sized exactly once, before any worker exists, from the
/// maximum number of workers the process group may ever run concurrently
/// ([`StatsArena::region_size`]). It is never grown, shrunk, or freed before
/// process-group shutdown.
///
/// This type does not own the region. The caller is responsible for keeping
/// the mapping alive (and eventually unmapping it) for as long as the arena
/// and anything derived from it are in use.
#[derive(Clone)]
pub struct StatsArena {
    base: NonNull<u8>,
    nslots: usize,
}

// SAFETY: the underlying memory is a shared mapping. All mutation goes
// through each slot's lock or its atomic owner word; the arena header is
// written once during init, before the value is shared.
unsafe impl Send for StatsArena {}
unsafe impl Sync for StatsArena {}

impl StatsArena {
    /// Bytes required for an arena of `nslots` slots. A pure function of the
    /// configured maximum worker count, for the startup-time allocation.
    pub fn region_size(nslots: usize) -> usize {
        HEADER_SIZE + nslots * SLOT_SIZE
    }

    /// Initialize a new arena in the given region.
    ///
    /// Every slot starts vacant. Runs exactly once per process group, before
    /// any worker samples; workers and observers use [`attach`](Self::attach).
    ///
    /// # Safety
    /// - `region` must point to a valid, zero-initialized, writable memory region of at least
    ///   [`region_size(nslots)`](Self::region_size) bytes (e.g. a fresh `MAP_SHARED` mapping).
    /// - The region must remain valid and mapped for the lifetime of the returned arena and every
    ///   clone or attachment of it.
    /// - No other process may concurrently initialize or attach the same region.
    pub unsafe fn init(region: NonNull<[u8]>, nslots: usize) -> io::Result<Self> {
        if nslots == 0 || nslots > u32::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "slot count out of range",
            ));
        }
        if region.len() < Self::region_size(nslots) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region too small for StatsArena",
            ));
        }
        let base = NonNull::new(region.as_ptr() as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "null region pointer"))?;

        let arena = Self { base, nslots };
        for i in 0..nslots {
            arena.slot(i).owner.store(OWNER_NONE, Ordering::Relaxed);
        }
        // Header last: an attacher that races init sees the magic only after
        // the slots are ready.
        let header = ArenaHeader {
            magic: ARENA_MAGIC,
            version: ARENA_VERSION,
            nslots: nslots as u32,
        };
        core::ptr::write(base.as_ptr() as *mut ArenaHeader, header);
        Ok(arena)
    }

    /// Attach to a region some process already initialized, validating the
    /// header against the region size.
    ///
    /// # Safety
    /// - `region` must point to a valid mapping of a region previously set up by
    ///   [`init`](Self::init) and still mapped by its owner.
    /// - The region must remain valid and mapped for the lifetime of the returned arena.
    pub unsafe fn attach(region: NonNull<[u8]>) -> io::Result<Self> {
        if region.len() < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region too small for StatsArena",
            ));
        }
        let base = NonNull::new(region.as_ptr() as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "null region pointer"))?;
        let header = &*(base.as_ptr() as *const ArenaHeader);
        if header.magic != ARENA_MAGIC || header.version != ARENA_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "region does not hold a telemetry arena",
            ));
        }
        let nslots = header.nslots as usize;
        if region.len() < Self::region_size(nslots) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "region shorter than its arena header claims",
            ));
        }
        Ok(Self { base, nslots })
    }

    pub fn slot_count(&self) -> usize {
        self.nslots
    }

    fn slot(&self, index: usize) -> &WorkerSlot {
        assert!(index < self.nslots, "slot index out of range");
        // SAFETY: the layout is pinned by region_size and the compile-time
        // asserts; init/attach validated that the region covers every slot.
        unsafe { &*(self.base.as_ptr().add(HEADER_SIZE + index * SLOT_SIZE) as *const WorkerSlot) }
    }

    /// The occupant's owner id, or `None` for a vacant slot. Racy by nature;
    /// readers that need a consistent answer check again under the shared
    /// lock via [`copy_slot`](Self::copy_slot).
    pub fn owner(&self, index: usize) -> Option<i32> {
        let owner = self.slot(index).owner.load(Ordering::Acquire);
        (owner != OWNER_NONE).then_some(owner)
    }

    /// Producer entry point: a single non-blocking exclusive acquire of the
    /// slot's lock. `None` means a reader is mid-copy and this sample is
    /// skipped; the caller retries at its next natural trigger.
    ///
    /// On success the slot is marked owned by `owner`, the previous snapshot
    /// is discarded, and the returned guard appends entries until capacity.
    pub fn try_begin_sample(&self, index: usize, owner: i32) -> Option<SampleGuard<'_>> {
        let slot = self.slot(index);
        if !slot.lock.try_lock_exclusive() {
            return None;
        }
        slot.owner.store(owner, Ordering::Release);
        // SAFETY: the exclusive lock is held for the guard's lifetime.
        unsafe {
            (*slot.body.get()).entry_count = 0;
        }
        Some(SampleGuard { slot })
    }

    /// Consumer entry point: acquire the slot's lock shared (blocking, but
    /// only for the duration of a bulk copy), copy the occupant's snapshot
    /// into `snapshot`, and release. Returns `false` for a vacant slot,
    /// leaving `snapshot` untouched.
    pub fn copy_slot(&self, index: usize, snapshot: &mut SlotSnapshot) -> bool {
        let slot = self.slot(index);
        slot.lock.lock_shared();
        let owner = slot.owner.load(Ordering::Acquire);
        if owner == OWNER_NONE {
            slot.lock.unlock_shared();
            return false;
        }
        // SAFETY: the shared lock excludes the writer, and entries beyond
        // entry_count are never exposed.
        unsafe {
            let body = &*slot.body.get();
            let count = (body.entry_count as usize).min(SLOT_CAP);
            snapshot.fill(owner, &body.entries[..count]);
        }
        slot.lock.unlock_shared();
        true
    }

    /// Vacate a slot without touching its lock: a single atomic store of the
    /// owner sentinel.
    ///
    /// This is the terminal write of an exiting worker, which may be in an
    /// arbitrarily torn-down state. A reader racing this sees either a
    /// stale-but-self-consistent snapshot or a vacant slot, never a torn
    /// record.
    pub fn release_slot(&self, index: usize) {
        self.slot(index).owner.store(OWNER_NONE, Ordering::Release);
    }

    /// Direct access to a slot's lock, for hosts that coordinate with the
    /// arena outside the sample/copy protocol.
    pub fn lock(&self, index: usize) -> &SlotLock {
        &self.slot(index).lock
    }
}

/// RAII writer over one slot; holds the exclusive lock until drop.
pub struct SampleGuard<'a> {
    slot: &'a WorkerSlot,
}

impl SampleGuard<'_> {
    /// Append one entry. Returns `false` once the slot is full; the snapshot
    /// is then a truncated prefix of the walk, by design a capacity bound and
    /// not an error.
    pub fn push(&mut self, entry: ContextEntry) -> bool {
        // SAFETY: the exclusive lock is held for the guard's lifetime.
        unsafe {
            let body = &mut *self.slot.body.get();
            let count = body.entry_count as usize;
            if count >= SLOT_CAP {
                return false;
            }
            body.entries[count] = entry;
            body.entry_count = count as u32 + 1;
            true
        }
    }

    pub fn len(&self) -> usize {
        // SAFETY: the exclusive lock is held for the guard's lifetime.
        unsafe { (*self.slot.body.get()).entry_count as usize }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SampleGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock.unlock_exclusive();
    }
}
