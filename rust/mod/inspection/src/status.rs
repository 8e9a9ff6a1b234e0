//! Status derivation.
//!
//! Rule order, first match wins:
//!
//! 1. progress is 100 → `Completed`, whatever the deadline says;
//! 2. no deadline, or one that does not parse → `InProgress`;
//! 3. today's calendar date after the deadline's → `Delayed`,
//!    otherwise `InProgress`.
//!
//! Only calendar dates are compared, so a record due today stays in
//! progress for the whole day.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::{InspectionRecord, QualityItem, Status};

/// Clamp a raw progress value into 0–100.
pub fn clamp_progress(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}

/// Derive the lifecycle status of one record.
pub fn derive_status(progress: i64, target: Option<NaiveDate>, today: NaiveDate) -> Status {
    if clamp_progress(progress) == 100 {
        return Status::Completed;
    }
    match target {
        Some(deadline) if today > deadline => Status::Delayed,
        _ => Status::InProgress,
    }
}

/// [`derive_status`] over an unvalidated deadline string. Never fails:
/// empty or unparseable input counts as no deadline.
pub fn derive_status_raw(progress: i64, target: Option<&str>, today: NaiveDate) -> Status {
    derive_status(progress, target.and_then(parse_calendar_date), today)
}

/// Date-time layouts without an offset, tried in order.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse the calendar date out of a date or date-time string.
///
/// Accepts `YYYY-MM-DD`, ISO 8601 date-times with or without an offset
/// (`T` or space separated) and RFC 2822 (`Tue, 30 Sep 2025 00:00:00 GMT`,
/// which is how the backend serializes SQL dates). The date is taken as
/// written; no time-zone conversion is applied.
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    None
}

// ---------------------------------------------------------------------------
// Tracked
// ---------------------------------------------------------------------------

/// A record whose status can be derived.
pub trait Tracked {
    /// Progress percentage.
    fn progress(&self) -> i64;

    /// The action deadline, if any.
    fn deadline(&self) -> Option<NaiveDate>;

    /// Status as of `today`.
    fn status_on(&self, today: NaiveDate) -> Status {
        derive_status(self.progress(), self.deadline(), today)
    }
}

impl<T: Tracked + ?Sized> Tracked for &T {
    fn progress(&self) -> i64 {
        (**self).progress()
    }

    fn deadline(&self) -> Option<NaiveDate> {
        (**self).deadline()
    }
}

impl Tracked for InspectionRecord {
    fn progress(&self) -> i64 {
        i64::from(self.progress_percentage)
    }

    fn deadline(&self) -> Option<NaiveDate> {
        self.target_date
    }
}

impl Tracked for QualityItem {
    fn progress(&self) -> i64 {
        i64::from(self.progress_percentage)
    }

    fn deadline(&self) -> Option<NaiveDate> {
        self.end_date
    }
}

/// A record paired with the status derived for it.
///
/// Serializes as the record's own fields plus `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classified<R> {
    #[serde(flatten)]
    pub record: R,
    pub status: Status,
}

/// Tag every record with its status as of `today`, keeping input order.
///
/// Pass `&records` to classify by reference without cloning.
pub fn classify<R, I>(records: I, today: NaiveDate) -> Vec<Classified<R>>
where
    R: Tracked,
    I: IntoIterator<Item = R>,
{
    records
        .into_iter()
        .map(|record| {
            let status = record.status_on(today);
            Classified { record, status }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
    }

    fn days(n: i64) -> NaiveDate {
        today() + chrono::Duration::days(n)
    }

    #[test]
    fn completed_wins_over_any_deadline() {
        for target in [Some(days(-400)), Some(days(-1)), Some(today()), Some(days(30)), None] {
            assert_eq!(derive_status(100, target, today()), Status::Completed);
        }
        for raw in [Some("2020-01-01"), Some("not a date"), Some(""), None] {
            assert_eq!(derive_status_raw(100, raw, today()), Status::Completed);
        }
    }

    #[test]
    fn missing_or_bad_deadline_is_in_progress() {
        for progress in [0, 1, 50, 99] {
            assert_eq!(derive_status(progress, None, today()), Status::InProgress);
            for raw in [None, Some(""), Some("   "), Some("내일"), Some("2025-13-45")] {
                assert_eq!(derive_status_raw(progress, raw, today()), Status::InProgress);
            }
        }
    }

    #[test]
    fn deadline_boundaries() {
        assert_eq!(derive_status(50, Some(days(-1)), today()), Status::Delayed);
        assert_eq!(derive_status(50, Some(today()), today()), Status::InProgress);
        assert_eq!(derive_status(50, Some(days(1)), today()), Status::InProgress);
    }

    #[test]
    fn time_of_day_is_ignored() {
        // Due today, late in the day or early, is not delayed.
        assert_eq!(
            derive_status_raw(10, Some("2025-09-15T23:59:59"), today()),
            Status::InProgress
        );
        assert_eq!(
            derive_status_raw(10, Some("2025-09-15 00:00:00"), today()),
            Status::InProgress
        );
        assert_eq!(
            derive_status_raw(10, Some("2025-09-14T23:59:59Z"), today()),
            Status::Delayed
        );
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(clamp_progress(-5), 0);
        assert_eq!(clamp_progress(250), 100);
        assert_eq!(derive_status(150, Some(days(-1)), today()), Status::Completed);
        assert_eq!(derive_status(-10, Some(days(-1)), today()), Status::Delayed);
    }

    #[test]
    fn calendar_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 9, 30);
        assert_eq!(parse_calendar_date("2025-09-30"), expected);
        assert_eq!(parse_calendar_date(" 2025-09-30 "), expected);
        assert_eq!(parse_calendar_date("2025-09-30T08:15:00"), expected);
        assert_eq!(parse_calendar_date("2025-09-30T08:15:00.123"), expected);
        assert_eq!(parse_calendar_date("2025-09-30T08:15"), expected);
        assert_eq!(parse_calendar_date("2025-09-30T08:15:00+09:00"), expected);
        assert_eq!(parse_calendar_date("2025-09-30 08:15:00"), expected);
        assert_eq!(parse_calendar_date("Tue, 30 Sep 2025 00:00:00 GMT"), expected);
        assert_eq!(parse_calendar_date("30/09/2025"), None);
        assert_eq!(parse_calendar_date(""), None);
    }

    #[test]
    fn classify_keeps_order() {
        let items = [
            QualityItem {
                id: "1".into(),
                owner: "kim".into(),
                company: "삼성전자".into(),
                title: "색상 균일도".into(),
                category: None,
                start_date: None,
                end_date: Some(days(-10)),
                progress_percentage: 75,
            },
            QualityItem {
                id: "2".into(),
                owner: "lee".into(),
                company: "현대모비스".into(),
                title: "소음 감소".into(),
                category: None,
                start_date: None,
                end_date: Some(days(-10)),
                progress_percentage: 100,
            },
        ];
        let tagged = classify(&items, today());
        assert_eq!(tagged.len(), 2);
        assert_eq!(tagged[0].record.id, "1");
        assert_eq!(tagged[0].status, Status::Delayed);
        assert_eq!(tagged[1].status, Status::Completed);
    }
}
