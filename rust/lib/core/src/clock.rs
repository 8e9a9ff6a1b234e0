use chrono::NaiveDate;

/// Source of "today" for date-relative rules.
///
/// Status derivation and time-window filters compare calendar dates
/// against today; services take a `Clock` so tests can pin the date.
pub trait Clock: Send + Sync + 'static {
    /// Today's calendar date in the local time zone.
    fn today(&self) -> NaiveDate;
}

/// The machine's local calendar date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock pinned to a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
