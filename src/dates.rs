//! Inclusive date ranges with a fixed day step.

use crate::error::CrawlError;
use crate::models::EditionDate;
use chrono::{Days, NaiveDate};

/// Iterator over `start..=end`, advancing `step_days` at a time.
#[derive(Debug, Clone)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
    step: Days,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate, step_days: u64) -> Result<Self, CrawlError> {
        if step_days == 0 {
            return Err(CrawlError::InvalidDateRange(
                "step must be at least one day".into(),
            ));
        }
        if start > end {
            return Err(CrawlError::InvalidDateRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self {
            next: Some(start),
            end,
            step: Days::new(step_days),
        })
    }
}

impl Iterator for DateRange {
    type Item = EditionDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|d| *d <= self.end)?;
        self.next = current.checked_add_days(self.step);
        Some(EditionDate::new(current))
    }
}
