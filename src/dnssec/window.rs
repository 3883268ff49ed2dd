use std::time::Duration;

use chrono::{DateTime, Utc};

use super::errors::SignError;
use crate::error::ConfigError;

/// Inception and expiration of a signature, in seconds since the epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidityWindow {
    inception: u32,
    expiration: u32,
}

impl ValidityWindow {
    /// Returns `None` unless `inception < expiration`
    pub fn new(inception: u32, expiration: u32) -> Option<Self> {
        (inception < expiration).then_some(Self {
            inception,
            expiration,
        })
    }

    pub fn inception(&self) -> u32 {
        self.inception
    }

    pub fn expiration(&self) -> u32 {
        self.expiration
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.expiration - self.inception))
    }

    pub fn contains(&self, timestamp: u32) -> bool {
        self.inception <= timestamp && timestamp <= self.expiration
    }
}

/// How signature windows are derived from the clock.
///
/// Inception is the reference time rounded down to `granularity` so that
/// requests close together share one window and produce the same RRSIG
/// timestamps; expiration is inception plus `validity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPolicy {
    validity: u32,
    granularity: u32,
}

impl ValidityPolicy {
    pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(3600);
    pub const DEFAULT_GRANULARITY: Duration = Duration::from_secs(3600);

    /// Both durations are used in whole seconds. The validity must cover at
    /// least one granularity step, otherwise the reference time could fall
    /// after the expiration.
    pub fn new(validity: Duration, granularity: Duration) -> Result<Self, ConfigError> {
        let validity = u32::try_from(validity.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValidity(format!(
                    "must be between 1 and {} seconds, got {:?}",
                    u32::MAX,
                    validity
                ))
            })?;
        let granularity = u32::try_from(granularity.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidGranularity(format!(
                    "must be between 1 and {} seconds, got {:?}",
                    u32::MAX,
                    granularity
                ))
            })?;
        if validity < granularity {
            return Err(ConfigError::InvalidValidity(format!(
                "validity of {}s is shorter than the inception granularity of {}s",
                validity, granularity
            )));
        }

        Ok(Self {
            validity,
            granularity,
        })
    }

    pub fn validity(&self) -> Duration {
        Duration::from_secs(u64::from(self.validity))
    }

    pub fn granularity(&self) -> Duration {
        Duration::from_secs(u64::from(self.granularity))
    }

    /// Window for a signature made at `reference`
    pub fn window_at(&self, reference: DateTime<Utc>) -> Result<ValidityWindow, SignError> {
        let secs = reference.timestamp();
        let out_of_range = || SignError::ClockOutOfRange(secs);

        let now = u64::try_from(secs).map_err(|_| out_of_range())?;
        let inception = now - now % u64::from(self.granularity);
        let expiration = inception + u64::from(self.validity);

        let inception = u32::try_from(inception).map_err(|_| out_of_range())?;
        let expiration = u32::try_from(expiration).map_err(|_| out_of_range())?;
        ValidityWindow::new(inception, expiration).ok_or_else(out_of_range)
    }

    pub fn current_window(&self) -> Result<ValidityWindow, SignError> {
        self.window_at(Utc::now())
    }
}

impl Default for ValidityPolicy {
    fn default() -> Self {
        Self {
            validity: Self::DEFAULT_VALIDITY.as_secs() as u32,
            granularity: Self::DEFAULT_GRANULARITY.as_secs() as u32,
        }
    }
}
