// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rate-limited sampling of hierarchical allocator statistics into a shared
//! telemetry arena, and the read-out surfaces over it.
//!
//! The host wires three things together:
//!
//! - an [`AllocatorTree`] implementation over its live allocator state (or
//!   the vector-backed [`ContextTree`] provided here);
//! - a [`Sampler`] per worker, invoked from the host's own trigger point
//!   (e.g. around a unit of work). It claims the worker's arena slot on the
//!   first trigger, rate-limits itself with a wall-clock [`Period`], and
//!   publishes a flattened pre-order snapshot under a non-blocking exclusive
//!   lock, releasing the slot again on drop;
//! - the listings: [`local_stats`] walks the calling process's own live tree
//!   lock-free, and [`Sampler::instance_stats`] (or
//!   [`InstanceIter::over_arena`] for observer processes) enumerates every
//!   occupied slot via short shared-lock copies.
//!
//! Each slot holds only the latest snapshot. An instance-wide listing is a
//! snapshot of snapshots: per-slot consistent, with no single instant across
//! the whole arena, in exchange for never stalling producers.

mod config;
mod error;
mod reader;
mod sampler;
mod tick;
mod tree;
mod walk;

pub use config::{parse_env, Period, DEFAULT_PERIOD_SECS, MAX_PERIOD_SECS};
pub use error::CollectorError;
pub use reader::{local_stats, InstanceIter, InstanceStatRow, StatRow};
pub use sampler::{SampleOutcome, Sampler};
pub use tick::TickGate;
pub use tree::{AllocatorTree, ContextTree, NodeId};
pub use walk::PreOrder;

pub use memstat_shm::{ContextCounters, ContextEntry, StatsArena, NAME_MAX, SLOT_CAP};
