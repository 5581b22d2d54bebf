// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// Time as unsigned 64-bit ms since unix epoch. Cache timestamps never need more than this.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SimpleTime {
    unix_millis: u64,
}

impl SimpleTime {
    #[inline(always)]
    pub const fn from_unix_millis(unix_millis: u64) -> Self {
        Self { unix_millis }
    }

    #[inline(always)]
    pub const fn as_epoch_millis(&self) -> u64 {
        self.unix_millis
    }

    /// Current time as per the system clock
    pub fn now() -> Self {
        let duration_since_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default(); // a clock set before 1970 gets a zero
        Self::from_unix_millis(u64::try_from(duration_since_epoch.as_millis()).unwrap_or(u64::MAX))
    }

    /// Duration since some earlier time with millisecond precision, or zero if result was negative
    #[inline(always)]
    pub fn duration_since(&self, earlier: Self) -> Duration {
        self.unix_millis
            .checked_sub(earlier.unix_millis)
            .map(Duration::from_millis)
            .unwrap_or_default()
    }

    /// This time shifted forward, saturating at the end of representable time.
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self::from_unix_millis(self.unix_millis.saturating_add(millis))
    }
}

impl Debug for SimpleTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimpleTime({}ms)", self.unix_millis)
    }
}

/// Source of "now" for every cache in the crate.
pub trait Clock: Send + Sync {
    fn now(&self) -> SimpleTime;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SimpleTime {
        SimpleTime::now()
    }
}

/// A clock that only moves when told to. Used to drive TTL expiry in tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    unix_millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start: SimpleTime) -> Self {
        Self {
            unix_millis: AtomicU64::new(start.as_epoch_millis()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.unix_millis.fetch_add(millis, Ordering::AcqRel);
    }

    pub fn set(&self, time: SimpleTime) {
        self.unix_millis.store(time.as_epoch_millis(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SimpleTime {
        SimpleTime::from_unix_millis(self.unix_millis.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_since_is_never_negative() {
        let earlier = SimpleTime::from_unix_millis(1_000);
        let later = SimpleTime::from_unix_millis(1_500);
        assert_eq!(later.duration_since(earlier), Duration::from_millis(500));
        assert_eq!(earlier.duration_since(later), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(SimpleTime::from_unix_millis(10));
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now().as_epoch_millis(), 2_010);
        clock.set(SimpleTime::from_unix_millis(5));
        assert_eq!(clock.now().as_epoch_millis(), 5);
    }

    #[test]
    fn test_saturating_add() {
        let end = SimpleTime::from_unix_millis(u64::MAX - 1);
        assert_eq!(end.saturating_add(Duration::from_secs(1)).as_epoch_millis(), u64::MAX);
    }
}
