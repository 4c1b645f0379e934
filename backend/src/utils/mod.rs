//! # Utilities Module
//!
//! Date handling shared by the availability engine, the booking service
//! and the stores, plus a few formatting helpers.
//!
//! ## Stay Ranges
//!
//! A stay is a half-open range of calendar days: `[check-in, checkout)`.
//! The guest sleeps the nights of every day in the range and leaves on
//! the checkout day, which is free for the next guest.
//!
//! ```text
//!   Jan 1   Jan 2   Jan 3   Jan 4   Jan 5
//!   [===============)                       stay A: 2 nights
//!                   [===============)       stay B: touches A, no overlap
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Half-open range of days `[start, end)` with `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl StayRange {
    /// Returns `None` unless `end` is strictly after `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    /// Parse both ends with [`parse_stay_date`].
    pub fn parse(from: &str, till: &str) -> Option<Self> {
        Self::new(parse_stay_date(from)?, parse_stay_date(till)?)
    }

    /// The one-night range starting on `day`.
    pub fn single_day(day: NaiveDate) -> Option<Self> {
        Self::new(day, day.succ_opt()?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whole nights in the stay, always at least one.
    pub fn nights(&self) -> u32 {
        (self.end - self.start).num_days() as u32
    }

    /// `[a,b)` and `[c,d)` overlap iff `a < d` and `c < b`.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Parse a stay date.
///
/// Accepts `YYYY-MM-DD` and the ISO timestamp forms older rows were
/// written with (`2025-01-01T00:00:00`, `2025-01-01 00:00:00.000`,
/// RFC 3339); the time part is dropped.
pub fn parse_stay_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Canonical text form used when writing stay dates.
pub fn format_stay_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Format a whole-rupee amount with Indian digit grouping.
///
/// ## Examples
///
/// ```rust,ignore
/// assert_eq!(format_inr(2000), "₹2,000");
/// assert_eq!(format_inr(1250000), "₹12,50,000");
/// ```
pub fn format_inr(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let sign = if amount < 0 { "-" } else { "" };

    if digits.len() <= 3 {
        return format!("{}₹{}", sign, digits);
    }

    // Last three digits form one group, the rest group in pairs
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();

    format!("{}₹{},{}", sign, groups.join(","), tail)
}

/// Truncate a string to a maximum length.
///
/// Useful for logging gateway response bodies.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_stay_range_rejects_empty_and_reversed() {
        assert!(StayRange::new(day("2025-01-01"), day("2025-01-01")).is_none());
        assert!(StayRange::new(day("2025-01-03"), day("2025-01-01")).is_none());
        assert_eq!(StayRange::parse("2025-01-01", "2025-01-03").unwrap().nights(), 2);
    }

    #[test]
    fn test_touching_ranges_do_not_overlap() {
        let a = StayRange::parse("2025-01-01", "2025-01-03").unwrap();
        let b = StayRange::parse("2025-01-03", "2025-01-05").unwrap();
        let c = StayRange::parse("2025-01-02", "2025-01-04").unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_parse_stay_date_forms() {
        assert_eq!(parse_stay_date("2025-02-10"), Some(day("2025-02-10")));
        assert_eq!(parse_stay_date("2025-02-10T14:30:00"), Some(day("2025-02-10")));
        assert_eq!(parse_stay_date("2025-02-10 14:30:00.250"), Some(day("2025-02-10")));
        assert_eq!(parse_stay_date("2025-02-10T14:30:00+05:30"), Some(day("2025-02-10")));
        assert_eq!(parse_stay_date("10/02/2025"), None);
        assert_eq!(parse_stay_date(""), None);
    }

    #[test]
    fn test_single_day_range() {
        let r = StayRange::single_day(day("2024-02-28")).unwrap();
        assert_eq!(r.end(), day("2024-02-29"));
        assert_eq!(r.nights(), 1);
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(0), "₹0");
        assert_eq!(format_inr(500), "₹500");
        assert_eq!(format_inr(2000), "₹2,000");
        assert_eq!(format_inr(1250000), "₹12,50,000");
        assert_eq!(format_inr(-1500), "-₹1,500");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_string("abcdefghijklmnop", 10), "abcdefg...");
    }
}
