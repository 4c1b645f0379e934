//! # Availability Engine
//!
//! Answers "how many beds of this homestay are free for these nights?".
//!
//! ## How Beds Are Counted
//!
//! ```text
//! query:            [Jan 2 ─────────── Jan 5)
//! booking A (2):  [Jan 1 ──── Jan 3)              overlaps → +2
//! booking B (1):                      [Jan 5 ── Jan 7)   touches → +0
//! booking C (3):        [Jan 3 ─ Jan 4)           overlaps → +3
//!                                                 booked   =  5
//! ```
//!
//! Only `paid` and `confirmed` bookings hold beds. A booking whose dates
//! cannot be parsed is skipped and logged; one bad row must never take
//! availability down for the whole homestay.
//!
//! ## Store Failures
//!
//! [`AvailabilityEngine::booked_beds`] follows the display contract: a
//! failed lookup counts as zero booked beds. Anything that is about to
//! commit beds uses the `try_` variants instead, which surface the
//! failure so it can be told apart from "nothing booked".

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::{BookingRecord, BookingStore, DatabaseError, HomestayRecord};
use crate::utils::StayRange;

/// A parsed booking that holds beds.
#[derive(Debug, Clone, Copy)]
struct CommittedStay {
    range: StayRange,
    beds: u32,
}

/// Keep bookings that hold beds and have usable dates.
fn committed_stays(bookings: &[BookingRecord]) -> Vec<CommittedStay> {
    bookings
        .iter()
        .filter(|b| b.booking_status().map(|s| s.holds_beds()).unwrap_or(false))
        .filter_map(|b| match StayRange::parse(&b.from_date, &b.till_date) {
            Some(range) => Some(CommittedStay { range, beds: b.beds() }),
            None => {
                warn!(
                    "Skipping booking {} with unusable dates ({:?} .. {:?})",
                    b.id, b.from_date, b.till_date
                );
                None
            }
        })
        .collect()
}

fn sum_overlapping(stays: &[CommittedStay], range: &StayRange) -> u32 {
    stays
        .iter()
        .filter(|s| s.range.overlaps(range))
        .fold(0u32, |acc, s| acc.saturating_add(s.beds))
}

/// Beds committed by `bookings` on any night of `range`.
pub fn booked_beds_in(bookings: &[BookingRecord], range: &StayRange) -> u32 {
    sum_overlapping(&committed_stays(bookings), range)
}

/// Free beds given a capacity and a booked count; never negative.
pub fn available(total_beds: u32, booked: u32) -> u32 {
    total_beds.saturating_sub(booked)
}

/// One day of an availability calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub available: u32,
    pub total: u32,
    pub is_fully_booked: bool,
    pub booked: u32,
}

/// Day-by-day availability over a fixed window.
///
/// Built from one snapshot of the homestay's bookings. Iterating is lazy
/// and can be repeated; every pass yields the same days.
#[derive(Debug, Clone)]
pub struct AvailabilityCalendar {
    stays: Vec<CommittedStay>,
    total_beds: u32,
    from: NaiveDate,
    num_days: u32,
}

impl AvailabilityCalendar {
    pub fn new(bookings: &[BookingRecord], total_beds: u32, from: NaiveDate, num_days: u32) -> Self {
        Self {
            stays: committed_stays(bookings),
            total_beds,
            from,
            num_days,
        }
    }

    /// Iterate over the window from its first day.
    pub fn days(&self) -> CalendarDays<'_> {
        CalendarDays { calendar: self, offset: 0 }
    }
}

impl<'a> IntoIterator for &'a AvailabilityCalendar {
    type Item = DayAvailability;
    type IntoIter = CalendarDays<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.days()
    }
}

/// Iterator over the days of an [`AvailabilityCalendar`].
pub struct CalendarDays<'a> {
    calendar: &'a AvailabilityCalendar,
    offset: u32,
}

impl Iterator for CalendarDays<'_> {
    type Item = DayAvailability;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.calendar.num_days {
            return None;
        }

        let date = self
            .calendar
            .from
            .checked_add_days(Days::new(u64::from(self.offset)))?;
        let night = StayRange::single_day(date)?;
        self.offset += 1;

        let booked = sum_overlapping(&self.calendar.stays, &night);
        let free = available(self.calendar.total_beds, booked);

        Some(DayAvailability {
            date,
            available: free,
            total: self.calendar.total_beds,
            is_fully_booked: free == 0,
            booked,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.calendar.num_days.saturating_sub(self.offset) as usize;
        (0, Some(left))
    }
}

/// Computes booked and free beds from the booking store.
///
/// Holds no state between calls; every answer comes from a fresh read.
#[derive(Clone)]
pub struct AvailabilityEngine {
    bookings: Arc<dyn BookingStore>,
}

impl AvailabilityEngine {
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }

    /// Beds already committed on any night of `range`, or the store error.
    pub async fn try_booked_beds(
        &self,
        homestay_id: i64,
        range: &StayRange,
    ) -> Result<u32, DatabaseError> {
        let bookings = self.bookings.find_committed(homestay_id).await?;
        let booked = booked_beds_in(&bookings, range);
        debug!(
            "Homestay {}: {} bed(s) booked in [{}, {})",
            homestay_id,
            booked,
            range.start(),
            range.end()
        );
        Ok(booked)
    }

    /// Beds already committed on any night of `range`.
    ///
    /// A failed lookup is logged and counts as zero.
    pub async fn booked_beds(&self, homestay_id: i64, range: &StayRange) -> u32 {
        match self.try_booked_beds(homestay_id, range).await {
            Ok(booked) => booked,
            Err(e) => {
                warn!("Booked-bed lookup failed for homestay {}: {}", homestay_id, e);
                0
            }
        }
    }

    /// `max(0, total − booked)` for the range.
    pub async fn available_beds(&self, homestay: &HomestayRecord, range: &StayRange) -> u32 {
        available(homestay.total_beds(), self.booked_beds(homestay.id, range).await)
    }

    /// Like [`available_beds`](Self::available_beds) but surfaces store failures.
    pub async fn try_available_beds(
        &self,
        homestay: &HomestayRecord,
        range: &StayRange,
    ) -> Result<u32, DatabaseError> {
        let booked = self.try_booked_beds(homestay.id, range).await?;
        Ok(available(homestay.total_beds(), booked))
    }

    /// Availability for `num_days` single nights starting at `from`.
    pub async fn calendar(
        &self,
        homestay: &HomestayRecord,
        from: NaiveDate,
        num_days: u32,
    ) -> AvailabilityCalendar {
        let bookings = match self.bookings.find_committed(homestay.id).await {
            Ok(bookings) => bookings,
            Err(e) => {
                warn!("Calendar lookup failed for homestay {}: {}", homestay.id, e);
                Vec::new()
            }
        };
        AvailabilityCalendar::new(&bookings, homestay.total_beds(), from, num_days)
    }
}
