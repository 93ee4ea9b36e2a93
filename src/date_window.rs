use chrono::{Days, NaiveDate};

use crate::error::ConfigError;

/// Inclusive range of calendar dates walked one day at a time, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window covering `end - days ..= end`, so `days + 1` dates in total.
    pub fn ending_on(end: NaiveDate, days: u64) -> Result<Self, ConfigError> {
        let start = end
            .checked_sub_days(Days::new(days))
            .ok_or(ConfigError::Window { days, end })?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of dates in the window.
    pub fn len(&self) -> u64 {
        // start <= end, so this is never negative
        (self.end - self.start).num_days() as u64 + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}
