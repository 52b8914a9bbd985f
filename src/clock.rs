use time::{Date, OffsetDateTime};

/// Source of "now" for every shift/leave status decision.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    /// Calendar date (UTC) of `now`.
    fn today(&self) -> Date {
        self.now().date()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
pub use fixed::FixedClock;
