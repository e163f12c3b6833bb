//! Daily and weekly resource-change counters.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Lines-of-code and file-change totals for the current day and ISO week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounters {
    pub daily_loc: u64,
    pub weekly_loc: u64,
    pub daily_files: u64,
    pub weekly_files: u64,
    day: NaiveDate,
    iso_week: (i32, u32),
}

impl ResourceCounters {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            daily_loc: 0,
            weekly_loc: 0,
            daily_files: 0,
            weekly_files: 0,
            day: today,
            iso_week: week_key(today),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Reset the daily counters on a date change and the weekly counters on
    /// an ISO-week change. Returns `(daily_reset, weekly_reset)`.
    pub fn roll(&mut self, today: NaiveDate) -> (bool, bool) {
        let daily = today != self.day;
        if daily {
            self.daily_loc = 0;
            self.daily_files = 0;
            self.day = today;
        }

        let week = week_key(today);
        let weekly = week != self.iso_week;
        if weekly {
            self.weekly_loc = 0;
            self.weekly_files = 0;
            self.iso_week = week;
        }

        (daily, weekly)
    }

    pub fn record(&mut self, loc: u64, files: u64) {
        self.daily_loc = self.daily_loc.saturating_add(loc);
        self.weekly_loc = self.weekly_loc.saturating_add(loc);
        self.daily_files = self.daily_files.saturating_add(files);
        self.weekly_files = self.weekly_files.saturating_add(files);
    }
}

fn week_key(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// Exponential moving average; the first sample seeds the average directly.
pub fn ema(previous: Option<f64>, sample: f64, alpha: f64) -> f64 {
    match previous {
        None => sample,
        Some(avg) => alpha * sample + (1.0 - alpha) * avg,
    }
}
