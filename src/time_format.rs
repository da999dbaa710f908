/// Duration and date formatting for the bubble, calendar and form
use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatOptions {
    /// `H:MM` instead of decimal hours
    pub hhmm: bool,
    pub show_seconds: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            hhmm: true,
            show_seconds: true,
        }
    }
}

/// Format a duration as `H:MM[:SS]` or as decimal hours (`1.02`)
pub fn format_duration(seconds: u64, options: FormatOptions) -> String {
    if !options.hhmm {
        // Hundredths of an hour, ties rounded up
        let hundredths = (u128::from(seconds) * 100 + 1800) / 3600;
        return format!("{}.{:02}", hundredths / 100, hundredths % 100);
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if options.show_seconds {
        format!("{}:{:02}:{:02}", hours, minutes, seconds % 60)
    } else {
        format!("{}:{:02}", hours, minutes)
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Monday and Sunday of the week containing `day`
pub fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+):([0-5]?\d)$").expect("valid regex"))
}

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d*)(?:[.,](\d+))?$").expect("valid regex"))
}

fn units_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(\d+(?:[.,]\d+)?)\s*h)?\s*(?:(\d+)\s*m(?:in)?)?$").expect("valid regex")
    })
}

fn decimal_hours(text: &str) -> Option<u64> {
    let hours: f64 = text.replace(',', ".").parse().ok()?;
    let seconds = (hours * 3600.0).round();
    if seconds.is_finite() && seconds < u64::MAX as f64 {
        Some(seconds as u64)
    } else {
        None
    }
}

fn hours_and_minutes(hours: u64, minutes: u64) -> Option<u64> {
    hours.checked_mul(3600)?.checked_add(minutes.checked_mul(60)?)
}

/// Parse the hours input of the form into seconds.
///
/// Accepts `1:30`, `1.5`, `1,5`, `1h 30m`, `45m` and `90min`. Surrounding
/// parentheses (the non-billable marker) are ignored. Blank input is zero,
/// anything unrecognised or too large to count is `None`.
pub fn parse_duration(input: &str) -> Option<u64> {
    let text = input.trim().trim_start_matches('(').trim_end_matches(')').trim();
    if text.is_empty() {
        return Some(0);
    }

    if let Some(caps) = clock_pattern().captures(text) {
        let hours: u64 = caps[1].parse().ok()?;
        let minutes: u64 = caps[2].parse().ok()?;
        return hours_and_minutes(hours, minutes);
    }

    if decimal_pattern().is_match(text) {
        return decimal_hours(text);
    }

    let caps = units_pattern().captures(text)?;
    let hours = caps.get(1).map(|m| decimal_hours(m.as_str())).unwrap_or(Some(0))?;
    let minutes: u64 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if caps.get(1).is_none() && caps.get(2).is_none() {
        return None;
    }
    hours.checked_add(minutes.checked_mul(60)?)
}
