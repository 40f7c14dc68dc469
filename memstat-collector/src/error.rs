// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::MAX_PERIOD_SECS;

/// Errors surfaced by the collection API.
///
/// Deliberately short: capacity truncation, write contention, and vacant
/// slots are accepted behaviors, not errors (see
/// [`SampleOutcome`](crate::SampleOutcome) and the listing iterators), and
/// nothing in this crate is fatal to the host process. The worst outcome
/// anywhere is a missing or stale sample.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// An instance-wide listing was requested by a process that never claimed
    /// a slot, i.e. sampling was never enabled for this process group.
    #[error(
        "memory statistics collection is not active; \
         enable sampling for this process group and trigger it at least once"
    )]
    NotActive,
    /// A sampling period outside the accepted range, rejected at
    /// configuration time.
    #[error("sampling period of {0} seconds is out of range (0 to {MAX_PERIOD_SECS})")]
    PeriodOutOfRange(u64),
}
