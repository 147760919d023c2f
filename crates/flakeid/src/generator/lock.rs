use core::fmt;
use std::time::SystemTime;

use portable_atomic::{AtomicBool, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    config::GeneratorConfig,
    error::{Error, Result},
    generator::{Mutex, SequenceState},
    id::SnowflakeId,
    time::{SystemClock, TimeSource, millis_to_system_time},
};

/// A lock-based Snowflake ID generator, safe to share across threads.
///
/// The per-millisecond sequence state lives behind a mutex held for the
/// whole allocation, so every caller observes one linear order: IDs returned
/// by the same generator are strictly increasing no matter which thread asked
/// for them.
///
/// Generators are caller-owned. Share one by reference, through an
/// [`Arc`](std::sync::Arc), or via the process-wide slot in
/// [`crate::global`], and call [`Generator::close`] when done.
///
/// ## Lifecycle
///
/// ```text
/// Uninitialized --new()--> Active --close()--> Closed
/// ```
///
/// `Closed` is terminal: every later [`Generator::next_id`] fails with
/// [`Error::GeneratorClosed`].
///
/// # Example
///
/// ```
/// use std::time::UNIX_EPOCH;
/// use flakeid::{CUSTOM_EPOCH, Error, Generator};
///
/// let generator = Generator::new(3, UNIX_EPOCH + CUSTOM_EPOCH)?;
///
/// let a = generator.next_id()?;
/// let b = generator.next_id()?;
/// assert!(a < b);
/// assert_eq!(a.node_id(), 3);
///
/// generator.close();
/// assert_eq!(generator.next_id(), Err(Error::GeneratorClosed));
/// # Ok::<(), Error>(())
/// ```
pub struct Generator<T = SystemClock>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    pub(crate) state: crossbeam_utils::CachePadded<Mutex<SequenceState>>,
    #[cfg(not(feature = "cache-padded"))]
    pub(crate) state: Mutex<SequenceState>,
    closed: AtomicBool,
    node_id: u8,
    epoch: SystemTime,
    epoch_millis: i64,
    time: T,
}

impl Generator<SystemClock> {
    /// Creates a generator that reads the system wall clock.
    ///
    /// # Errors
    ///
    /// Fails with the first violated construction rule, checked in this
    /// order: [`Error::InvalidNode`], [`Error::EpochZero`],
    /// [`Error::EpochInFuture`], [`Error::EpochTooOld`].
    pub fn new(node_id: u64, epoch: SystemTime) -> Result<Self> {
        Self::with_clock(node_id, epoch, SystemClock)
    }

    /// Creates a generator from a [`GeneratorConfig`], reading the system
    /// wall clock.
    ///
    /// # Errors
    ///
    /// See [`Generator::new`].
    pub fn from_config(config: GeneratorConfig) -> Result<Self> {
        Self::from_config_with_clock(config, SystemClock)
    }
}

impl<T> Generator<T>
where
    T: TimeSource,
{
    /// Creates a generator that reads time from `time`.
    ///
    /// The epoch is validated against a single reading of `time` taken now.
    ///
    /// # Errors
    ///
    /// See [`Generator::new`].
    pub fn with_clock(node_id: u64, epoch: SystemTime, time: T) -> Result<Self> {
        Self::from_config_with_clock(GeneratorConfig::new(node_id, epoch), time)
    }

    /// Creates a generator from a [`GeneratorConfig`] and a custom clock.
    ///
    /// # Errors
    ///
    /// See [`Generator::new`].
    pub fn from_config_with_clock(config: GeneratorConfig, time: T) -> Result<Self> {
        let validated = config.validated(time.unix_millis())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            node_id = validated.node_id,
            epoch_millis = validated.epoch_millis,
            "snowflake generator created"
        );

        Ok(Self::build(
            validated.node_id,
            config.epoch,
            validated.epoch_millis,
            SequenceState::new(),
            time,
        ))
    }

    /// Creates a generator from explicit component values, **without any
    /// validation**.
    ///
    /// This constructor is primarily useful for advanced use cases such as
    /// restoring allocator state persisted by the application, or driving the
    /// generator into edge cases in tests.
    ///
    /// # Parameters
    /// - `node_id`: node identifier embedded in every ID
    /// - `epoch_millis`: the epoch in Unix milliseconds
    /// - `last_millis`: Unix milliseconds of the last allocation, if any
    /// - `sequence`: sequence number used by that allocation; values above
    ///   `2^14 - 1` are clamped
    /// - `time`: the clock to read
    ///
    /// # ⚠️ Note
    /// An epoch that is in the future or too old is not rejected here; the
    /// first [`Self::next_id`] reports it instead. Prefer [`Self::with_clock`].
    pub fn from_components(
        node_id: u8,
        epoch_millis: i64,
        last_millis: Option<i64>,
        sequence: u16,
        time: T,
    ) -> Self {
        Self::build(
            node_id,
            millis_to_system_time(epoch_millis),
            epoch_millis,
            SequenceState::from_parts(last_millis, sequence),
            time,
        )
    }

    fn build(
        node_id: u8,
        epoch: SystemTime,
        epoch_millis: i64,
        state: SequenceState,
        time: T,
    ) -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(state)),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(state),
            closed: AtomicBool::new(false),
            node_id,
            epoch,
            epoch_millis,
            time,
        }
    }

    /// Generates the next ID.
    ///
    /// Blocks only while the 16,384 sequence numbers of the current
    /// millisecond are exhausted, spinning until the clock ticks over.
    ///
    /// # Errors
    ///
    /// - [`Error::GeneratorClosed`]: [`Self::close`] has been called
    /// - [`Error::ClockMovedBackward`]: the clock reads earlier than the last
    ///   allocation; retry once it catches up
    /// - [`Error::EpochTooOld`]: the 41-bit timestamp field is exhausted
    /// - [`Error::LockPoisoned`]: another thread panicked while holding the
    ///   lock (std mutex only)
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self), fields(node_id = self.node_id))
    )]
    pub fn next_id(&self) -> Result<SnowflakeId> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::GeneratorClosed);
        }

        let mut state = {
            #[cfg(feature = "parking-lot")]
            {
                self.state.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.state.lock()?
            }
        };

        // `close` may have finished while we were queued on the lock
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::GeneratorClosed);
        }

        let slot = state.allocate(self.epoch_millis, &self.time, &self.closed)?;
        Ok(SnowflakeId::from_components(
            slot.timestamp,
            u64::from(self.node_id),
            u64::from(slot.sequence),
        ))
    }

    /// Closes the generator. Idempotent.
    ///
    /// Once this returns, no allocation can succeed: calls that were already
    /// inside the critical section have finished, calls queued on the lock
    /// or spinning on an exhausted millisecond fail with
    /// [`Error::GeneratorClosed`], and so does every later call.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(node_id = self.node_id))
    )]
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            #[cfg(feature = "tracing")]
            tracing::debug!("snowflake generator closed");
        }

        // Wait out the allocation currently holding the lock, if any. A
        // repeated close does this too, so it never returns while the first
        // close is still draining.
        drop(self.state.lock());
    }

    /// Returns `true` once [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub const fn node_id(&self) -> u8 {
        self.node_id
    }

    pub const fn epoch(&self) -> SystemTime {
        self.epoch
    }

    /// Returns the epoch as signed Unix milliseconds.
    pub const fn epoch_millis(&self) -> i64 {
        self.epoch_millis
    }

    /// Returns the configuration this generator was built from.
    pub fn config(&self) -> GeneratorConfig {
        GeneratorConfig::new(u64::from(self.node_id), self.epoch)
    }
}

impl<T> fmt::Debug for Generator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("node_id", &self.node_id)
            .field("epoch_millis", &self.epoch_millis)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
