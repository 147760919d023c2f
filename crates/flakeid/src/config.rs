use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    error::{Error, Result},
    generator::elapsed_since_epoch,
    time::{CUSTOM_EPOCH, system_time_to_millis},
};

/// The parameters a [`Generator`] is built from.
///
/// This is a plain value: applications load it however they like (the
/// `serde` feature derives `Serialize`/`Deserialize`, with the epoch stored as
/// signed Unix milliseconds) and hand it to [`Generator::from_config`].
///
/// [`Generator`]: crate::Generator
/// [`Generator::from_config`]: crate::Generator::from_config
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeneratorConfig {
    /// Node identifier embedded in every ID, `0..=255`.
    pub node_id: u64,
    /// Zero point of the timestamp field.
    #[cfg_attr(feature = "serde", serde(with = "crate::time::as_unix_millis"))]
    pub epoch: SystemTime,
}

impl Default for GeneratorConfig {
    /// Node `0` with the [`CUSTOM_EPOCH`] (2025-01-01 UTC).
    fn default() -> Self {
        Self {
            node_id: 0,
            epoch: UNIX_EPOCH + CUSTOM_EPOCH,
        }
    }
}

/// A configuration that passed [`GeneratorConfig::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Validated {
    pub(crate) node_id: u8,
    pub(crate) epoch_millis: i64,
}

impl GeneratorConfig {
    pub const fn new(node_id: u64, epoch: SystemTime) -> Self {
        Self { node_id, epoch }
    }

    /// Returns the epoch as signed Unix milliseconds.
    pub fn epoch_millis(&self) -> i64 {
        system_time_to_millis(self.epoch)
    }

    /// Checks the configuration against a clock reading taken now.
    ///
    /// The checks run in a fixed order and the first failure wins:
    ///
    /// 1. node ID above 255 → [`Error::InvalidNode`]
    /// 2. epoch at `UNIX_EPOCH` → [`Error::EpochZero`]
    /// 3. epoch after `now_millis` → [`Error::EpochInFuture`]
    /// 4. epoch more than `2^41 - 1` ms before `now_millis` →
    ///    [`Error::EpochTooOld`]
    ///
    /// # Errors
    ///
    /// Returns the first failing check as listed above.
    pub fn validate(&self, now_millis: i64) -> Result<()> {
        self.validated(now_millis).map(|_| ())
    }

    pub(crate) fn validated(&self, now_millis: i64) -> Result<Validated> {
        let node_id = u8::try_from(self.node_id).map_err(|_| Error::InvalidNode {
            node_id: self.node_id,
        })?;

        if self.epoch == UNIX_EPOCH {
            return Err(Error::EpochZero);
        }

        let epoch_millis = self.epoch_millis();
        if epoch_millis > now_millis {
            return Err(Error::EpochInFuture {
                epoch_millis,
                now_millis,
            });
        }

        elapsed_since_epoch(now_millis, epoch_millis)?;
        Ok(Validated {
            node_id,
            epoch_millis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        id::{MAX_NODE_ID, MAX_TIMESTAMP},
        time::millis_to_system_time as epoch_at,
    };

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn default_is_valid_today() {
        let config = GeneratorConfig::default();
        assert_eq!(config.epoch_millis(), 1_735_689_600_000);
        assert_eq!(config.validate(NOW), Ok(()));
    }

    #[test]
    fn node_id_out_of_range() {
        let config = GeneratorConfig::new(MAX_NODE_ID + 1, epoch_at(NOW - 1));
        assert_eq!(
            config.validate(NOW),
            Err(Error::InvalidNode { node_id: 256 })
        );
        let config = GeneratorConfig::new(u64::MAX, epoch_at(NOW - 1));
        assert!(matches!(
            config.validate(NOW),
            Err(Error::InvalidNode { .. })
        ));
    }

    #[test]
    fn node_id_is_checked_first() {
        let config = GeneratorConfig::new(1_000, UNIX_EPOCH);
        assert!(matches!(
            config.validate(NOW),
            Err(Error::InvalidNode { .. })
        ));
    }

    #[test]
    fn zero_epoch() {
        let config = GeneratorConfig::new(0, UNIX_EPOCH);
        assert_eq!(config.validate(NOW), Err(Error::EpochZero));
    }

    #[test]
    fn future_epoch() {
        let config = GeneratorConfig::new(0, epoch_at(NOW + 1));
        assert_eq!(
            config.validate(NOW),
            Err(Error::EpochInFuture {
                epoch_millis: NOW + 1,
                now_millis: NOW,
            })
        );
    }

    #[test]
    fn epoch_equal_to_now_is_accepted() {
        let config = GeneratorConfig::new(MAX_NODE_ID, epoch_at(NOW));
        let validated = config.validated(NOW).unwrap();
        assert_eq!(validated.node_id, 255);
        assert_eq!(validated.epoch_millis, NOW);
    }

    #[test]
    fn epoch_age_boundary() {
        let oldest = NOW - MAX_TIMESTAMP as i64;
        assert_eq!(GeneratorConfig::new(0, epoch_at(oldest)).validate(NOW), Ok(()));
        assert_eq!(
            GeneratorConfig::new(0, epoch_at(oldest - 1)).validate(NOW),
            Err(Error::EpochTooOld)
        );
    }

    #[test]
    fn pre_unix_epoch_is_too_old() {
        // 1954-01-01 UTC
        let config = GeneratorConfig::new(5, epoch_at(-504_921_600_000));
        assert_eq!(config.validate(NOW), Err(Error::EpochTooOld));
    }

    #[test]
    fn pre_unix_epoch_within_range_is_accepted() {
        // 1960-01-01 UTC
        let config = GeneratorConfig::new(5, epoch_at(-315_619_200_000));
        let validated = config.validated(NOW).unwrap();
        assert_eq!(validated.node_id, 5);
        assert_eq!(validated.epoch_millis, -315_619_200_000);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let config = GeneratorConfig::new(7, epoch_at(NOW));
        let json = serde_json::to_string(&config).unwrap();
        let back: GeneratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip_pre_unix_epoch() {
        // 1960-01-01 UTC, old but still within the timestamp range
        let config = GeneratorConfig::new(1, epoch_at(-315_619_200_000));
        assert_eq!(config.validate(NOW), Ok(()));

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"node_id":1,"epoch":-315619200000}"#);
        let back: GeneratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.epoch_millis(), -315_619_200_000);
    }
}
