// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared-memory telemetry arena for per-worker allocator statistics.
//!
//! A process group allocates one fixed-size shared region at startup and every
//! worker publishes flattened snapshots of its allocator tree into its own
//! slot. Any process mapping the region can enumerate the published snapshots
//! without stalling the producers.
//!
//! # Layout
//!
//! The region is statically partitioned into a header and a dense slot array:
//!
//! ```text
//! +--------+-----------+-----------+-----+-----------+
//! | Header | Slot 0    | Slot 1    | ... | Slot N-1  |
//! +--------+-----------+-----------+-----+-----------+
//! ```
//!
//! - **Header**: magic, layout version, slot count.
//! - **Slot**: a shared/exclusive spinlock, the owner id (atomic, sentinel
//!   when vacant), an entry count, and a fixed array of [`ContextEntry`]
//!   records.
//!
//! Slot index is a dense per-worker identity assigned for the worker's
//! lifetime; it is an upper bound, not a live count, and vacant slots are
//! skipped by readers.
//!
//! # Thread / Process Safety
//!
//! - A slot's owning worker writes its payload under a **non-blocking
//!   exclusive** lock acquire; contention skips the write.
//! - Readers take the lock **shared** just long enough for a bulk copy into a
//!   private buffer, then iterate the copy lock-free.
//! - Vacating a slot on worker exit is a single unlocked atomic store of the
//!   owner sentinel, tolerated by readers as either a stale-but-consistent
//!   snapshot or a vacant slot, never a torn record.

mod arena;
mod mem_handle;
mod slot;
mod slot_lock;

pub use arena::{SampleGuard, StatsArena};
pub use mem_handle::{FileBackedHandle, MappedMem, MemoryHandle, NamedShmHandle, ShmHandle};
pub use slot::{ContextCounters, ContextEntry, SlotSnapshot, NAME_MAX, OWNER_NONE, SLOT_CAP};
pub use slot_lock::SlotLock;
