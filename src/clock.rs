use std::fmt::Debug;
use std::time::Duration;
use std::time::Instant;

use chrono::Days;
use chrono::NaiveDate;
use parking_lot::RwLock;

const SECS_PER_DAY: u64 = 86_400;

/// Source of time for memo expiry and of the calendar date records are derived against.
pub trait Clock: Debug + Send + Sync + 'static {
    /// Monotonic instant used to judge cache freshness.
    fn now(&self) -> Instant;

    /// The calendar date expiry offsets are applied to.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock that only moves when told to. Both readings advance together: every full day of [`advance`]d time moves
/// [`today`] by one day.
///
/// [`advance`]: ManualClock::advance
/// [`today`]: Clock::today
#[derive(Debug)]
pub struct ManualClock {
    origin:     Instant,
    start_date: NaiveDate,
    elapsed:    RwLock<Duration>,
}

impl ManualClock {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            origin: Instant::now(),
            start_date,
            elapsed: RwLock::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.write() += by;
    }

    pub fn advance_days(&self, days: u64) {
        self.advance(Duration::from_secs(days * SECS_PER_DAY));
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.read()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn today(&self) -> NaiveDate {
        let days = self.elapsed().as_secs() / SECS_PER_DAY;
        self.start_date
            .checked_add_days(Days::new(days))
            .unwrap_or(NaiveDate::MAX)
    }
}
