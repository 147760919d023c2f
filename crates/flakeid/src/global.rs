//! Process-wide generator.
//!
//! Most applications should own a [`Generator`] and pass it to whoever needs
//! it. This module is for code that genuinely needs global access. The slot
//! moves through the same states as a generator:
//!
//! ```text
//! Uninitialized --init()--> Active --close()--> Closed --init()--> Active
//! ```
//!
//! While a generator is active, [`init`] with the same configuration returns
//! it, and [`init`] with a different one fails with
//! [`Error::ConfigMismatch`] instead of silently handing back a generator
//! built from other parameters. Reconfiguring means closing first.
//!
//! # Example
//!
//! ```
//! use std::time::UNIX_EPOCH;
//! use flakeid::{CUSTOM_EPOCH, global};
//!
//! let epoch = UNIX_EPOCH + CUSTOM_EPOCH;
//! global::init(1, epoch)?;
//!
//! let id = global::next_id()?;
//! assert_eq!(id.node_id(), 1);
//!
//! global::close();
//! assert!(global::next_id().is_err());
//!
//! // A closed slot can be configured again
//! global::init(2, epoch)?;
//! assert_eq!(global::next_id()?.node_id(), 2);
//! # global::close();
//! # Ok::<(), flakeid::Error>(())
//! ```

#![cfg_attr(docsrs, doc(cfg(feature = "global")))]

use std::{sync::Arc, time::SystemTime};

use crate::{
    config::GeneratorConfig,
    error::{Error, Result},
    generator::{Generator, Mutex},
    id::SnowflakeId,
};

static GLOBAL: Mutex<Option<Arc<Generator>>> = Mutex::new(None);

/// Installs the process-wide generator, or returns it if it is already
/// active with the same node ID and epoch.
///
/// # Errors
///
/// - [`Error::ConfigMismatch`] if an active generator uses a different
///   configuration
/// - any construction error from [`Generator::new`]
pub fn init(node_id: u64, epoch: SystemTime) -> Result<Arc<Generator>> {
    init_with_config(GeneratorConfig::new(node_id, epoch))
}

/// Like [`init`], taking a [`GeneratorConfig`].
///
/// # Errors
///
/// See [`init`].
pub fn init_with_config(config: GeneratorConfig) -> Result<Arc<Generator>> {
    let mut slot = {
        #[cfg(feature = "parking-lot")]
        {
            GLOBAL.lock()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            GLOBAL.lock()?
        }
    };

    if let Some(active) = slot.as_ref().filter(|generator| !generator.is_closed()) {
        if active.config() == config {
            return Ok(Arc::clone(active));
        }
        return Err(Error::ConfigMismatch {
            active_node_id: active.node_id(),
            active_epoch_millis: active.epoch_millis(),
        });
    }

    let generator = Arc::new(Generator::from_config(config)?);
    *slot = Some(Arc::clone(&generator));
    Ok(generator)
}

/// Returns the process-wide generator, which may be closed.
///
/// # Errors
///
/// [`Error::Uninitialized`] if [`init`] never succeeded.
pub fn get() -> Result<Arc<Generator>> {
    let slot = {
        #[cfg(feature = "parking-lot")]
        {
            GLOBAL.lock()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            GLOBAL.lock()?
        }
    };
    slot.as_ref().map(Arc::clone).ok_or(Error::Uninitialized)
}

/// Generates the next ID from the process-wide generator.
///
/// # Errors
///
/// [`Error::Uninitialized`] before the first [`init`], otherwise anything
/// [`Generator::next_id`] returns.
pub fn next_id() -> Result<SnowflakeId> {
    get()?.next_id()
}

/// Closes the process-wide generator, if any. Idempotent.
///
/// Handles obtained earlier through [`init`] or [`get`] observe the closure.
pub fn close() {
    let slot = {
        #[cfg(feature = "parking-lot")]
        {
            GLOBAL.lock()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            // The slot only ever holds a whole `Option`, so a poisoned guard
            // is still consistent
            GLOBAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    };
    if let Some(generator) = slot.as_ref() {
        generator.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::millis_to_system_time;

    // The slot is process-wide, so the whole lifecycle runs in one test.
    #[test]
    fn lifecycle() {
        let epoch = millis_to_system_time(1_704_067_200_000);
        let other_epoch = millis_to_system_time(1_704_067_200_001);

        // A rejected configuration leaves the slot uninitialized
        assert_eq!(init(256, epoch).unwrap_err(), Error::InvalidNode { node_id: 256 });
        assert_eq!(next_id(), Err(Error::Uninitialized));
        assert_eq!(get().unwrap_err(), Error::Uninitialized);
        close();

        let first = init(3, epoch).unwrap();
        let again = init(3, epoch).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(Arc::ptr_eq(&first, &get().unwrap()));

        let active = Error::ConfigMismatch {
            active_node_id: 3,
            active_epoch_millis: 1_704_067_200_000,
        };
        assert_eq!(init(4, epoch).unwrap_err(), active);
        // An epoch-only mismatch reports the active epoch
        let err = init(3, other_epoch).unwrap_err();
        assert_eq!(err, active);
        assert!(err.to_string().contains("1704067200000ms"));

        let a = next_id().unwrap();
        let b = first.next_id().unwrap();
        assert!(a < b);
        assert_eq!(a.node_id(), 3);

        close();
        close();
        assert!(first.is_closed());
        assert_eq!(next_id(), Err(Error::GeneratorClosed));
        assert_eq!(first.next_id(), Err(Error::GeneratorClosed));

        let second = init(4, other_epoch).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(next_id().unwrap().node_id(), 4);
        assert!(first.is_closed());

        close();
    }
}
