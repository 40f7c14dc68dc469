// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::CollectorError;
use serde::{Deserialize, Serialize};

/// Default sampling period, in seconds.
pub const DEFAULT_PERIOD_SECS: u64 = 10;

/// Upper bound of the sampling period: 31 days.
pub const MAX_PERIOD_SECS: u64 = 60 * 60 * 24 * 31;

/// A validated sampling period. Zero means "sample on every trigger"; the
/// range check happens here, at configuration time, never in the gate.
/// Runtime-adjustable via [`Sampler::set_period`](crate::Sampler::set_period).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Period(u64);

impl Period {
    pub fn from_secs(secs: u64) -> Result<Self, CollectorError> {
        if secs > MAX_PERIOD_SECS {
            return Err(CollectorError::PeriodOutOfRange(secs));
        }
        Ok(Period(secs))
    }

    pub fn as_secs(self) -> u64 {
        self.0
    }
}

impl Default for Period {
    fn default() -> Self {
        Period(DEFAULT_PERIOD_SECS)
    }
}

impl TryFrom<u64> for Period {
    type Error = CollectorError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Period::from_secs(secs)
    }
}

impl From<Period> for u64 {
    fn from(period: Period) -> u64 {
        period.0
    }
}

pub mod parse_env {
    use super::Period;
    use std::env;

    /// Reads a sampling period from the environment. Unset, unparsable, and
    /// out-of-range values all fall through to `None`.
    pub fn period(name: &str) -> Option<Period> {
        Period::from_secs(env::var(name).ok()?.parse().ok()?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_full_range() {
        assert_eq!(Period::from_secs(0).unwrap().as_secs(), 0);
        assert_eq!(Period::from_secs(10).unwrap().as_secs(), 10);
        assert_eq!(
            Period::from_secs(MAX_PERIOD_SECS).unwrap().as_secs(),
            2_678_400
        );
    }

    #[test]
    fn rejects_beyond_31_days() {
        assert!(Period::from_secs(MAX_PERIOD_SECS + 1).is_err());
        assert!(Period::from_secs(u64::MAX).is_err());
    }

    #[test]
    fn default_is_ten_seconds() {
        assert_eq!(Period::default().as_secs(), DEFAULT_PERIOD_SECS);
    }

    #[test]
    fn parse_env_falls_through_on_bad_values() {
        let name = "MEMSTAT_TEST_PERIOD";
        env_guard(name, None);
        assert_eq!(parse_env::period(name), None);

        env_guard(name, Some("15"));
        assert_eq!(parse_env::period(name), Period::from_secs(15).ok());

        env_guard(name, Some("not-a-number"));
        assert_eq!(parse_env::period(name), None);

        env_guard(name, Some("99999999999"));
        assert_eq!(parse_env::period(name), None);

        env_guard(name, None);
    }

    fn env_guard(name: &str, value: Option<&str>) {
        match value {
            Some(value) => std::env::set_var(name, value),
            None => std::env::remove_var(name),
        }
    }
}
