use core::cmp::Ordering as CmpOrdering;

use portable_atomic::{AtomicBool, Ordering};

use crate::{
    error::{Error, Result},
    id::{MAX_SEQUENCE, MAX_TIMESTAMP},
    time::TimeSource,
};

/// Returns the milliseconds elapsed between `epoch_millis` and `now_millis`
/// if they fit the 41-bit timestamp field.
///
/// A reading before the epoch is treated like an out-of-range one: both mean
/// the timestamp field cannot represent the current time.
pub(crate) fn elapsed_since_epoch(now_millis: i64, epoch_millis: i64) -> Result<u64> {
    now_millis
        .checked_sub(epoch_millis)
        .and_then(|delta| u64::try_from(delta).ok())
        .filter(|&delta| delta <= MAX_TIMESTAMP)
        .ok_or(Error::EpochTooOld)
}

/// The `(timestamp, sequence)` pair chosen for one allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) timestamp: u64,
    pub(crate) sequence: u16,
}

/// Mutable allocator state. Always accessed under the generator's lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SequenceState {
    /// Unix milliseconds of the last allocation, `None` before the first one.
    last_millis: Option<i64>,
    sequence: u16,
}

impl SequenceState {
    pub(crate) const fn new() -> Self {
        Self {
            last_millis: None,
            sequence: 0,
        }
    }

    pub(crate) fn from_parts(last_millis: Option<i64>, sequence: u16) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let max = MAX_SEQUENCE as u16;
        Self {
            last_millis,
            sequence: sequence.min(max),
        }
    }

    /// Hands out the next slot for the current millisecond.
    ///
    /// Within one millisecond the sequence counts up from zero. Once all
    /// `2^14` values are used, the call spins until the clock moves past the
    /// exhausted millisecond, bailing out with [`Error::GeneratorClosed`] if
    /// `closed` is raised meanwhile. A reading earlier than the last
    /// allocation fails with [`Error::ClockMovedBackward`] so that no slot
    /// is ever reused or handed out of order.
    pub(crate) fn allocate<T>(
        &mut self,
        epoch_millis: i64,
        time: &T,
        closed: &AtomicBool,
    ) -> Result<Slot>
    where
        T: TimeSource + ?Sized,
    {
        let mut now = time.unix_millis();

        loop {
            let timestamp = elapsed_since_epoch(now, epoch_millis)?;

            let Some(last) = self.last_millis else {
                return Ok(self.rollover_to(now, timestamp));
            };

            match now.cmp(&last) {
                CmpOrdering::Greater => return Ok(self.rollover_to(now, timestamp)),
                CmpOrdering::Equal => {
                    if u64::from(self.sequence) < MAX_SEQUENCE {
                        self.sequence += 1;
                        return Ok(Slot {
                            timestamp,
                            sequence: self.sequence,
                        });
                    }
                    // Re-validated against the epoch on the next pass
                    now = Self::cold_wait_past(last, time, closed)?;
                }
                CmpOrdering::Less => return Err(Self::cold_clock_behind(last, now)),
            }
        }
    }

    fn rollover_to(&mut self, now: i64, timestamp: u64) -> Slot {
        self.last_millis = Some(now);
        self.sequence = 0;
        Slot {
            timestamp,
            sequence: 0,
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_wait_past<T>(last: i64, time: &T, closed: &AtomicBool) -> Result<i64>
    where
        T: TimeSource + ?Sized,
    {
        loop {
            if closed.load(Ordering::Acquire) {
                return Err(Error::GeneratorClosed);
            }
            let now = time.unix_millis();
            if now > last {
                return Ok(now);
            }
            core::hint::spin_loop();
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(last_millis: i64, now_millis: i64) -> Error {
        debug_assert!(now_millis < last_millis);
        Error::ClockMovedBackward {
            last_millis,
            now_millis,
        }
    }
}

impl Default for SequenceState {
    fn default() -> Self {
        Self::new()
    }
}
