use portable_atomic::{AtomicU64, Ordering};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Custom epoch: Wednesday, January 1, 2025 00:00:00 UTC
pub const CUSTOM_EPOCH: Duration = Duration::from_millis(1_735_689_600_000);

/// Converts a [`SystemTime`] into signed milliseconds relative to the Unix
/// epoch.
///
/// Times before 1970 map to negative values. Values beyond the `i64` range
/// saturate.
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
    }
}

/// Converts signed Unix milliseconds back into a [`SystemTime`].
pub fn millis_to_system_time(millis: i64) -> SystemTime {
    let magnitude = Duration::from_millis(millis.unsigned_abs());
    if millis >= 0 {
        UNIX_EPOCH + magnitude
    } else {
        UNIX_EPOCH - magnitude
    }
}

/// Serde adapter storing a [`SystemTime`] as signed Unix milliseconds.
///
/// Unlike serde's own `SystemTime` impl this accepts times before 1970.
/// Precision below one millisecond is dropped.
///
/// ```
/// # #[cfg(feature = "serde")]
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Settings {
///     #[serde(with = "flakeid::as_unix_millis")]
///     epoch: std::time::SystemTime,
/// }
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
#[cfg(feature = "serde")]
pub mod as_unix_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::SystemTime;

    /// Serialize a [`SystemTime`] as signed Unix milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::system_time_to_millis(*time).serialize(s)
    }

    /// Deserialize a [`SystemTime`] from signed Unix milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying deserializer fails.
    pub fn deserialize<'de, D>(d: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = <i64 as Deserialize>::deserialize(d)?;
        Ok(super::millis_to_system_time(millis))
    }
}

/// A source of wall-clock time in milliseconds since the Unix epoch (UTC).
///
/// This abstraction allows you to plug in the system clock, a monotonic
/// timer, or a mocked time source in tests. Generators never assume the
/// readings are monotonic: a reading earlier than a previous one is reported
/// as [`Error::ClockMovedBackward`].
///
/// # Example
///
/// ```
/// use flakeid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn unix_millis(&self) -> i64 {
///         1_735_689_600_000
///     }
/// }
///
/// assert_eq!(FixedTime.unix_millis(), 1_735_689_600_000);
/// ```
///
/// [`Error::ClockMovedBackward`]: crate::Error::ClockMovedBackward
pub trait TimeSource {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn unix_millis(&self) -> i64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn unix_millis(&self) -> i64 {
        (**self).unix_millis()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn unix_millis(&self) -> i64 {
        (**self).unix_millis()
    }
}

/// The operating system's wall clock.
///
/// Every reading is a `SystemTime::now()` call, so NTP corrections and manual
/// adjustments show through, including backward steps.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn unix_millis(&self) -> i64 {
        system_time_to_millis(SystemTime::now())
    }
}

/// Shared ticker state, updated once per millisecond.
#[derive(Debug)]
struct SharedTickerInner {
    elapsed: AtomicU64,
}

/// A clock anchored to the wall clock once, then advanced by a monotonic
/// timer.
///
/// At construction the clock records `SystemTime::now()` and an [`Instant`].
/// A background thread publishes the milliseconds elapsed since that instant
/// into a shared atomic, so readings never go backward even if the system
/// clock is stepped, and the hot path avoids a syscall. The ticker thread
/// exits once every clone of the clock has been dropped.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    inner: Arc<SharedTickerInner>,
    anchor_millis: i64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Starts a new clock and its ticker thread.
    ///
    /// # Example
    ///
    /// ```
    /// use flakeid::{MonotonicClock, SystemClock, TimeSource};
    ///
    /// let clock = MonotonicClock::new();
    /// let first = clock.unix_millis();
    /// std::thread::sleep(std::time::Duration::from_millis(5));
    ///
    /// // The ticker may lag a millisecond behind, but never goes backward.
    /// assert!(clock.unix_millis() >= first);
    /// assert!((SystemClock.unix_millis() - clock.unix_millis()).abs() < 1_000);
    /// ```
    pub fn new() -> Self {
        let start = Instant::now();
        let anchor_millis = system_time_to_millis(SystemTime::now());

        let inner = Arc::new(SharedTickerInner {
            elapsed: AtomicU64::new(0),
        });

        let weak_inner = Arc::downgrade(&inner);
        thread::spawn(move || {
            let mut tick = 0;

            loop {
                let Some(inner_ref) = weak_inner.upgrade() else {
                    break;
                };

                // Absolute target time of the next tick
                let target = start + Duration::from_millis(tick);

                let now = Instant::now();
                if now < target {
                    thread::sleep(target - now);
                }

                // Recompute from the start so oversleeping never accumulates
                let now_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                inner_ref.elapsed.store(now_ms, Ordering::Release);

                tick = now_ms + 1;
            }
        });

        Self {
            inner,
            anchor_millis,
        }
    }
}

impl TimeSource for MonotonicClock {
    fn unix_millis(&self) -> i64 {
        let elapsed = self.inner.elapsed.load(Ordering::Acquire);
        self.anchor_millis
            .saturating_add(i64::try_from(elapsed).unwrap_or(i64::MAX))
    }
}
