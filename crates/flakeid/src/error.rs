use crate::id::{MAX_NODE_ID, MAX_TIMESTAMP};

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `flakeid` can emit.
///
/// Every failure is returned to the caller; nothing is logged or swallowed
/// internally. Variants are distinguishable by kind so callers can branch on
/// them with `matches!` instead of inspecting messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The node identifier does not fit in the 8-bit node field.
    #[error("invalid node id {node_id}; must be 0 <= id <= {max}", max = MAX_NODE_ID)]
    InvalidNode {
        /// The rejected node identifier.
        node_id: u64,
    },

    /// The epoch was left at its zero value ([`std::time::UNIX_EPOCH`]).
    #[error("the epoch cannot be a zero value")]
    EpochZero,

    /// The epoch is later than the current millisecond.
    #[error("the epoch ({epoch_millis}ms) cannot be later than the current millisecond ({now_millis}ms)")]
    EpochInFuture {
        /// Epoch in Unix milliseconds.
        epoch_millis: i64,
        /// Clock reading at validation time, in Unix milliseconds.
        now_millis: i64,
    },

    /// More than `2^41 - 1` milliseconds (~69.7 years) separate the epoch from
    /// the current time.
    ///
    /// Raised at construction, and by any allocation once the generator has
    /// outlived its timestamp field. The generator can produce no further IDs;
    /// build a new one with a more recent epoch.
    #[error("the epoch is more than {max}ms (~69 years) away from the current time", max = MAX_TIMESTAMP)]
    EpochTooOld,

    /// The clock reported a time earlier than the last allocation.
    ///
    /// This is transient: the caller may retry once the clock catches up.
    #[error("clock moved backward: last allocation at {last_millis}ms, clock now at {now_millis}ms")]
    ClockMovedBackward {
        /// Unix milliseconds of the last successful allocation.
        last_millis: i64,
        /// The offending clock reading.
        now_millis: i64,
    },

    /// The generator has been closed.
    #[error("generator is closed")]
    GeneratorClosed,

    /// The process-wide generator is active with a different configuration.
    #[error(
        "the global generator is active with node id {active_node_id} and epoch {active_epoch_millis}ms; close it before reconfiguring"
    )]
    ConfigMismatch {
        /// Node identifier of the generator currently installed.
        active_node_id: u8,
        /// Epoch of the generator currently installed, in Unix milliseconds.
        active_epoch_millis: i64,
    },

    /// A packed value sets bit 63, which no generator ever produces.
    #[error("snowflake id {raw} sets the reserved top bit")]
    ReservedBitSet {
        /// The rejected raw value.
        raw: u64,
    },

    /// The process-wide generator was used before [`crate::global::init`].
    #[error("the global generator has not been initialized")]
    Uninitialized,

    /// A thread panicked while holding the generator lock.
    ///
    /// When the `parking-lot` feature is enabled, mutexes do **not** poison,
    /// so this variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("the generator lock was poisoned")]
    LockPoisoned,
}

impl Error {
    /// Returns `true` if the same call may succeed later on the same
    /// generator.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ClockMovedBackward { .. })
    }
}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_backward_clock_is_retryable() {
        let backward = Error::ClockMovedBackward {
            last_millis: 10,
            now_millis: 9,
        };
        assert!(backward.is_retryable());
        assert!(!Error::GeneratorClosed.is_retryable());
        assert!(!Error::EpochTooOld.is_retryable());
        assert!(!Error::InvalidNode { node_id: 256 }.is_retryable());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let err = Error::InvalidNode { node_id: 300 };
        assert_eq!(
            err.to_string(),
            "invalid node id 300; must be 0 <= id <= 255"
        );
        let err = Error::ClockMovedBackward {
            last_millis: 1_042,
            now_millis: 1_041,
        };
        assert!(err.to_string().contains("1042ms"));
        let err = Error::ConfigMismatch {
            active_node_id: 3,
            active_epoch_millis: 1_704_067_200_000,
        };
        assert_eq!(
            err.to_string(),
            "the global generator is active with node id 3 and epoch 1704067200000ms; \
             close it before reconfiguring"
        );
    }
}
