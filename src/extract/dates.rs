//! Source-specific date parsing
//!
//! The board prints three different formats: full article timestamps
//! (`Sun Apr 13 14:05:20 2025`), year-less listing dates (` 4/13`) and
//! year-less push times (`04/13 14:07`). Everything is naive board-local time.

use chrono::{Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const ARTICLE_DATETIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Parses an article header timestamp such as `Sun Apr 13 14:05:20 2025`
///
/// Runs of whitespace (the board pads single-digit days) are collapsed first.
pub fn parse_article_datetime(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, ARTICLE_DATETIME_FORMAT).ok()
}

/// Parses a listing date such as ` 4/13`
///
/// The year is the one of `today`, unless that would put the date in the
/// future, in which case it belongs to the previous year.
pub fn parse_listing_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (month, day) = parse_month_day(raw.trim())?;

    NaiveDate::from_ymd_opt(today.year(), month, day)
        .filter(|date| *date <= today)
        .or_else(|| NaiveDate::from_ymd_opt(today.year() - 1, month, day))
}

/// Resolves a push time (`MM/DD` and `HH:MM`) against the article timestamp
///
/// Pushes inherit the article's year. A push that would then predate the
/// article by more than a day was written after a new year began.
pub fn resolve_push_time(date: &str, time: &str, article: NaiveDateTime) -> Option<NaiveDateTime> {
    let (month, day) = parse_month_day(date)?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").ok()?;

    let candidate = NaiveDate::from_ymd_opt(article.year(), month, day)?.and_time(time);
    let earliest = article.date().checked_sub_days(Days::new(1))?.and_time(NaiveTime::MIN);
    if candidate >= earliest {
        return Some(candidate);
    }

    NaiveDate::from_ymd_opt(article.year() + 1, month, day).map(|date| date.and_time(time))
}

fn parse_month_day(raw: &str) -> Option<(u32, u32)> {
    let (month, day) = raw.split_once('/')?;
    let month = month.trim().parse().ok()?;
    let day = day.trim().parse().ok()?;
    Some((month, day))
}

/// Midnight `days` days before `today`
pub fn cutoff_from_days(today: NaiveDate, days: u32) -> NaiveDateTime {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Today's date in the board's local time zone
pub fn board_today(utc_offset_minutes: i32) -> NaiveDate {
    match FixedOffset::east_opt(utc_offset_minutes * 60) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}
