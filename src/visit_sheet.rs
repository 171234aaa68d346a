//! Visit times from field-sheet text
//!
//! Field sheets record `Time-in HH:MM` and `Time-out HH:MM` in local time
//! and a visit date, usually labelled `Date:` or `Visit Date:`. The text is
//! expected to be already extracted from the sheet.

use crate::error::{QaqcError, Result};
use crate::models::VisitWindow;
use chrono::{Duration, NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

struct Patterns {
    time_in: Regex,
    time_out: Regex,
    labelled_iso: Regex,
    labelled_us: Regex,
    iso: Regex,
    us: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        time_in: Regex::new(r"(?i)Time-in\s*:?\s*(\d{1,2}:\d{2})")
            .expect("time-in pattern is valid"),
        time_out: Regex::new(r"(?i)Time-out\s*:?\s*(\d{1,2}:\d{2})")
            .expect("time-out pattern is valid"),
        labelled_iso: Regex::new(r"(?i)(?:Visit Date|Date)\s*:?\s*(\d{4}-\d{2}-\d{2})")
            .expect("labelled date pattern is valid"),
        labelled_us: Regex::new(r"(?i)(?:Visit Date|Date)\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4})")
            .expect("labelled date pattern is valid"),
        iso: Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("date pattern is valid"),
        us: Regex::new(r"(\d{1,2}/\d{1,2}/\d{2,4})").expect("date pattern is valid"),
    })
}

/// Times and date found on a field sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSheetTimes {
    pub time_in: Option<NaiveTime>,
    pub time_out: Option<NaiveTime>,
    pub date: Option<NaiveDate>,
}

impl FieldSheetTimes {
    /// Search sheet text for visit times and date
    ///
    /// A labelled date wins over any other date in the text; ISO dates win
    /// over `M/D/Y` dates at the same level.
    pub fn parse(text: &str) -> Self {
        let p = patterns();
        let time = |re: &Regex| {
            re.captures(text)
                .and_then(|c| NaiveTime::parse_from_str(&c[1], "%H:%M").ok())
        };

        let date = [&p.labelled_iso, &p.labelled_us, &p.iso, &p.us]
            .into_iter()
            .find_map(|re| re.captures(text).and_then(|c| parse_sheet_date(&c[1])));

        let times = Self {
            time_in: time(&p.time_in),
            time_out: time(&p.time_out),
            date,
        };
        debug!("Field sheet times: {:?}", times);
        times
    }

    /// Visit window on the sheet date, or on `fallback_date` when the sheet
    /// has none
    ///
    /// `utc_shift_hours` is added to both times, e.g. `7` for sheets written
    /// at UTC-7.
    pub fn window(
        &self,
        fallback_date: NaiveDate,
        utc_shift_hours: Option<i64>,
    ) -> Result<VisitWindow> {
        let (Some(time_in), Some(time_out)) = (self.time_in, self.time_out) else {
            return Err(QaqcError::configuration(
                "Field sheet does not contain both Time-in and Time-out",
            ));
        };

        let date = self.date.unwrap_or(fallback_date);
        let shift = Duration::hours(utc_shift_hours.unwrap_or(0));
        VisitWindow::new(date.and_time(time_in) + shift, date.and_time(time_out) + shift)
    }
}

fn parse_sheet_date(value: &str) -> Option<NaiveDate> {
    if value.contains('-') {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d").ok();
    }
    let year_digits = value.rsplit('/').next().map_or(0, str::len);
    let format = if year_digits == 4 { "%m/%d/%Y" } else { "%m/%d/%y" };
    NaiveDate::parse_from_str(value, format).ok()
}
