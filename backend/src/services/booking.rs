//! # Booking Service
//!
//! Staging and confirming bookings, plus the read paths over them.
//!
//! ## Flow
//!
//! ```text
//! 1. Guest picks dates and beds
//!                ↓
//! 2. stage()   validate dates, beds, free capacity → StagedBooking
//!                ↓                                  (nothing stored)
//! 3. Guest reviews, client posts the staged record back
//!                ↓
//! 4. confirm() recompute nights + total from authoritative inputs,
//!              insert under the capacity lock      → BookingRecord
//! ```
//!
//! The staged record is only a carrier for the guest's choices. Its
//! nights, price and total are never trusted at confirmation.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{
    BookingRecord, BookingStatus, BookingStore, CapacityInsert, DatabaseError, HomestayRecord, HomestayStore,
    NewBooking, RequesterIdentity,
};
use crate::models::BookingView;
use crate::utils::StayRange;

use super::availability::AvailabilityEngine;

/// Errors that can occur while staging, confirming or reading bookings.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// A stay date was not supplied.
    #[error("Both check-in and checkout dates are required")]
    MissingDates,

    /// Dates did not parse or checkout is not after check-in.
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// Fewer than one bed requested.
    #[error("At least one bed must be booked (requested {0})")]
    InvalidBedCount(i64),

    /// Not enough free beds for the whole stay.
    #[error("Only {available} bed(s) available for the selected dates. Homestay has {total} total beds.")]
    InsufficientAvailability { available: u32, total: u32 },

    /// The homestay does not exist.
    #[error("Homestay not found: {0}")]
    UnitNotFound(i64),

    /// The booking does not exist.
    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// `nights × beds × price` does not fit an amount.
    #[error("Booking total is too large ({nights} night(s) × {beds} bed(s))")]
    AmountTooLarge { nights: u32, beds: u32 },

    /// The booking could not be written.
    #[error("Could not save booking: {0}")]
    BookingPersistFailed(String),

    /// A read the decision depends on failed.
    #[error("Booking store unavailable: {0}")]
    StoreUnavailable(String),
}

impl BookingError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::MissingDates => "MISSING_DATES",
            BookingError::InvalidDateRange(_) => "INVALID_DATE_RANGE",
            BookingError::InvalidBedCount(_) => "INVALID_BED_COUNT",
            BookingError::InsufficientAvailability { .. } => "INSUFFICIENT_AVAILABILITY",
            BookingError::UnitNotFound(_) => "HOMESTAY_NOT_FOUND",
            BookingError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            BookingError::AmountTooLarge { .. } => "AMOUNT_TOO_LARGE",
            BookingError::BookingPersistFailed(_) => "BOOKING_PERSIST_FAILED",
            BookingError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<DatabaseError> for BookingError {
    fn from(e: DatabaseError) -> Self {
        BookingError::StoreUnavailable(e.to_string())
    }
}

/// Parse a stay and check that checkout is after check-in.
pub fn stay_range(from_date: &str, till_date: &str) -> Result<StayRange, BookingError> {
    StayRange::parse(from_date, till_date).ok_or_else(|| {
        BookingError::InvalidDateRange(format!(
            "checkout ({}) must be a date after check-in ({})",
            till_date, from_date
        ))
    })
}

/// Whole nights between check-in and checkout.
///
/// ## Example
///
/// ```rust,ignore
/// assert_eq!(nights("2025-01-01", "2025-01-03")?, 2);
/// assert!(nights("2025-01-01", "2025-01-01").is_err());
/// ```
pub fn nights(from_date: &str, till_date: &str) -> Result<u32, BookingError> {
    stay_range(from_date, till_date).map(|r| r.nights())
}

/// `nights × beds × price`, in whole rupees. `None` on overflow.
pub fn price_booking(nights: u32, beds: u32, price_per_bed_per_night: u32) -> Option<i64> {
    i64::from(nights)
        .checked_mul(i64::from(beds))?
        .checked_mul(i64::from(price_per_bed_per_night))
}

/// A validated booking that has not been stored.
///
/// ## Example JSON
///
/// ```json
/// {
///     "homestayId": 3,
///     "fromDate": "2025-01-01",
///     "tillDate": "2025-01-03",
///     "beds": 2,
///     "nights": 2,
///     "pricePerBedPerNight": 500,
///     "totalAmount": 2000,
///     "availableBeds": 4
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StagedBooking {
    pub homestay_id: i64,
    pub from_date: String,
    pub till_date: String,
    pub beds: u32,

    // Informational only; recomputed at confirmation.
    #[serde(default)]
    pub nights: u32,
    #[serde(default)]
    pub price_per_bed_per_night: u32,
    #[serde(default)]
    pub total_amount: i64,
    #[serde(default)]
    pub available_beds: u32,
}

/// Stages and confirms bookings.
///
/// ## Usage
///
/// ```rust,ignore
/// let service = BookingService::new(homestays, bookings, 500);
///
/// let staged = service.stage(3, Some("2025-01-01"), Some("2025-01-03"), 2).await?;
/// let booking = service.confirm(&staged, &requester).await?;
/// ```
#[derive(Clone)]
pub struct BookingService {
    homestays: Arc<dyn HomestayStore>,
    bookings: Arc<dyn BookingStore>,
    availability: AvailabilityEngine,

    /// Authoritative nightly rate per bed.
    price_per_bed_per_night: u32,
}

impl BookingService {
    pub fn new(
        homestays: Arc<dyn HomestayStore>,
        bookings: Arc<dyn BookingStore>,
        price_per_bed_per_night: u32,
    ) -> Self {
        let availability = AvailabilityEngine::new(bookings.clone());
        Self {
            homestays,
            bookings,
            availability,
            price_per_bed_per_night,
        }
    }

    fn total_for(&self, nights: u32, beds: u32) -> Result<i64, BookingError> {
        price_booking(nights, beds, self.price_per_bed_per_night)
            .ok_or(BookingError::AmountTooLarge { nights, beds })
    }

    async fn load_homestay(&self, homestay_id: i64) -> Result<HomestayRecord, BookingError> {
        self.homestays
            .get_homestay(homestay_id)
            .await?
            .ok_or(BookingError::UnitNotFound(homestay_id))
    }

    // ==========================================
    // STAGING AND CONFIRMATION
    // ==========================================

    /// Validate a booking request and price it, without storing anything.
    ///
    /// ## Errors
    ///
    /// - `MissingDates` if either date is absent or blank
    /// - `InvalidDateRange` if the dates do not parse or are not increasing
    /// - `InvalidBedCount` if fewer than one bed is requested
    /// - `InsufficientAvailability` with the current free count
    /// - `StoreUnavailable` if availability could not be read
    pub async fn stage(
        &self,
        homestay_id: i64,
        from_date: Option<&str>,
        till_date: Option<&str>,
        beds: i64,
    ) -> Result<StagedBooking, BookingError> {
        let (from_date, till_date) = match (from_date, till_date) {
            (Some(f), Some(t)) if !f.trim().is_empty() && !t.trim().is_empty() => {
                (f.trim(), t.trim())
            }
            _ => return Err(BookingError::MissingDates),
        };

        let range = stay_range(from_date, till_date)?;
        if beds < 1 {
            return Err(BookingError::InvalidBedCount(beds));
        }

        let homestay = self.load_homestay(homestay_id).await?;
        let total = homestay.total_beds();
        let free = self.availability.try_available_beds(&homestay, &range).await?;

        // Anything above u32 is more than any homestay holds
        let beds = u32::try_from(beds).unwrap_or(u32::MAX);
        if beds > free {
            info!(
                "Staging rejected for homestay {}: {} bed(s) requested, {} free",
                homestay_id, beds, free
            );
            return Err(BookingError::InsufficientAvailability { available: free, total });
        }

        let nights = range.nights();
        let total_amount = self.total_for(nights, beds)?;
        let staged = StagedBooking {
            homestay_id,
            from_date: from_date.to_string(),
            till_date: till_date.to_string(),
            beds,
            nights,
            price_per_bed_per_night: self.price_per_bed_per_night,
            total_amount,
            available_beds: free,
        };

        debug!("Staged booking: {:?}", staged);
        Ok(staged)
    }

    /// Store a staged booking as `paid`.
    ///
    /// Nights and the total are derived again from the staged dates and
    /// the configured rate. The insert re-checks capacity atomically, so
    /// a bed taken since staging yields `InsufficientAvailability`.
    ///
    /// Whatever the outcome, the caller should drop the staged record.
    pub async fn confirm(
        &self,
        staged: &StagedBooking,
        requester: &RequesterIdentity,
    ) -> Result<BookingRecord, BookingError> {
        let range = stay_range(&staged.from_date, &staged.till_date)?;
        if staged.beds < 1 {
            return Err(BookingError::InvalidBedCount(i64::from(staged.beds)));
        }

        let homestay = self.load_homestay(staged.homestay_id).await?;
        let total_amount = self.total_for(range.nights(), staged.beds)?;
        if total_amount != staged.total_amount {
            warn!(
                "Staged total {} for homestay {} differs from recomputed {}; using recomputed",
                staged.total_amount, staged.homestay_id, total_amount
            );
        }

        let booking = NewBooking {
            homestay_id: homestay.id,
            stay: range,
            beds_booked: staged.beds,
            total_amount,
            status: BookingStatus::Paid,
            payment_reference: Some(demo_payment_reference()),
            user_id: requester.user_id.clone(),
            user_phone: requester.phone.clone(),
            user_email: requester.email.clone(),
            user_name: requester.name.clone(),
        };

        match self.bookings.insert_within_capacity(&booking).await {
            Ok(CapacityInsert::Inserted(record)) => {
                info!(
                    "✅ Booking {} confirmed: homestay {}, {} bed(s), {} night(s), total {}",
                    record.id, record.homestay_id, staged.beds, range.nights(), total_amount
                );
                Ok(record)
            }
            Ok(CapacityInsert::Full { available, total }) => {
                info!(
                    "Confirmation lost the race for homestay {}: {} free, {} requested",
                    homestay.id, available, staged.beds
                );
                Err(BookingError::InsufficientAvailability { available, total })
            }
            Err(DatabaseError::NotFound(_)) => Err(BookingError::UnitNotFound(homestay.id)),
            Err(e) => {
                error!("Failed to persist booking for homestay {}: {}", homestay.id, e);
                Err(BookingError::BookingPersistFailed(e.to_string()))
            }
        }
    }

    // ==========================================
    // BOOKING QUERIES
    // ==========================================

    /// Bookings of one requester, earliest stay first.
    ///
    /// A requester with no email, phone or name has no bookings.
    pub async fn list_for_requester(
        &self,
        requester: &RequesterIdentity,
    ) -> Result<Vec<BookingView>, BookingError> {
        let Some(key) = requester.lookup_key() else {
            return Ok(Vec::new());
        };

        let bookings = self.bookings.find_for_requester(&key).await?;
        self.with_homestays(bookings).await
    }

    /// One booking, for the receipt page.
    pub async fn get_booking(&self, id: &str) -> Result<BookingView, BookingError> {
        let uuid = Uuid::parse_str(id.trim())
            .map_err(|_| BookingError::BookingNotFound(id.to_string()))?;

        let booking = self
            .bookings
            .find_booking(uuid)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(id.to_string()))?;

        let homestay = match self.homestays.get_homestay(booking.homestay_id).await {
            Ok(h) => h,
            Err(e) => {
                warn!("Homestay lookup for receipt {} failed: {}", id, e);
                None
            }
        };

        Ok(BookingView::new(booking, homestay.as_ref()))
    }

    /// Every booking, latest stay first.
    pub async fn list_all(&self) -> Result<Vec<BookingView>, BookingError> {
        let bookings = self.bookings.list_bookings().await?;
        self.with_homestays(bookings).await
    }

    async fn with_homestays(
        &self,
        bookings: Vec<BookingRecord>,
    ) -> Result<Vec<BookingView>, BookingError> {
        let homestays: HashMap<i64, HomestayRecord> = self
            .homestays
            .list_homestays()
            .await?
            .into_iter()
            .map(|h| (h.id, h))
            .collect();

        Ok(bookings
            .into_iter()
            .map(|b| {
                let homestay = homestays.get(&b.homestay_id);
                BookingView::new(b, homestay)
            })
            .collect())
    }
}

/// Reference recorded for the demo payment step.
fn demo_payment_reference() -> String {
    let digits: u32 = rand::rng().random_range(100_000..=999_999);
    format!("DEMO-{}", digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{HomestayUpdate, MemoryStore, NewHomestay};
    use crate::services::availability::tests::booking;

    async fn setup(beds: i32) -> (Arc<MemoryStore>, BookingService, HomestayRecord) {
        let store = Arc::new(MemoryStore::new());
        let homestay = store
            .create_homestay(&NewHomestay {
                owner: "Meera".into(),
                rooms: 2,
                beds,
                price: 800,
                ..Default::default()
            })
            .await
            .unwrap();
        let service = BookingService::new(store.clone(), store.clone(), 500);
        (store, service, homestay)
    }

    fn guest(email: &str) -> RequesterIdentity {
        RequesterIdentity {
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_price_two_nights_two_beds() {
        assert_eq!(price_booking(2, 2, 500), Some(2000));
        assert_eq!(price_booking(1, 1, 500), Some(500));
        assert_eq!(price_booking(30, 10, u32::MAX), Some(300 * i64::from(u32::MAX)));
        assert_eq!(price_booking(u32::MAX, u32::MAX, u32::MAX), None);
    }

    #[test]
    fn test_nights() {
        assert_eq!(nights("2025-01-01", "2025-01-03").unwrap(), 2);
        assert_eq!(nights("2024-02-28", "2024-03-01").unwrap(), 2);
        assert!(matches!(
            nights("2025-01-01", "2025-01-01"),
            Err(BookingError::InvalidDateRange(_))
        ));
        assert!(matches!(
            nights("2025-01-05", "2025-01-01"),
            Err(BookingError::InvalidDateRange(_))
        ));
        assert!(matches!(nights("soon", "2025-01-01"), Err(BookingError::InvalidDateRange(_))));
    }

    #[tokio::test]
    async fn test_stage_prices_from_config() {
        let (_store, service, homestay) = setup(4).await;
        let staged = service
            .stage(homestay.id, Some("2025-01-01"), Some("2025-01-03"), 2)
            .await
            .unwrap();
        assert_eq!(staged.nights, 2);
        assert_eq!(staged.beds, 2);
        assert_eq!(staged.total_amount, 2000);
        assert_eq!(staged.available_beds, 4);
    }

    #[tokio::test]
    async fn test_stage_validation_errors() {
        let (_store, service, homestay) = setup(4).await;

        let missing = service.stage(homestay.id, Some("2025-01-01"), None, 1).await;
        assert!(matches!(missing, Err(BookingError::MissingDates)));

        let blank = service.stage(homestay.id, Some(" "), Some("2025-01-02"), 1).await;
        assert!(matches!(blank, Err(BookingError::MissingDates)));

        let same_day = service
            .stage(homestay.id, Some("2025-01-01"), Some("2025-01-01"), 1)
            .await;
        assert!(matches!(same_day, Err(BookingError::InvalidDateRange(_))));

        let no_beds = service
            .stage(homestay.id, Some("2025-01-01"), Some("2025-01-02"), 0)
            .await;
        assert!(matches!(no_beds, Err(BookingError::InvalidBedCount(0))));

        let unknown = service
            .stage(homestay.id + 100, Some("2025-01-01"), Some("2025-01-02"), 1)
            .await;
        assert!(matches!(unknown, Err(BookingError::UnitNotFound(_))));
    }

    #[tokio::test]
    async fn test_stage_three_beds_when_two_free() {
        let (store, service, homestay) = setup(4).await;
        let mut existing = booking("2025-01-01", "2025-01-05", 2, "paid");
        existing.homestay_id = homestay.id;
        store.seed_booking(existing).await;

        let err = service
            .stage(homestay.id, Some("2025-01-02"), Some("2025-01-04"), 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InsufficientAvailability { available: 2, total: 4 }
        ));
        assert!(err.to_string().contains("Only 2 bed(s)"));
    }

    #[tokio::test]
    async fn test_stage_surfaces_store_failure() {
        let (store, service, homestay) = setup(4).await;
        store.set_unavailable(true);
        let err = service
            .stage(homestay.id, Some("2025-01-02"), Some("2025-01-04"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_confirm_recomputes_total() {
        let (_store, service, homestay) = setup(4).await;
        let mut staged = service
            .stage(homestay.id, Some("2025-01-01"), Some("2025-01-03"), 2)
            .await
            .unwrap();
        staged.total_amount = 1;
        staged.nights = 9;
        staged.price_per_bed_per_night = 1;

        let record = service.confirm(&staged, &guest("a@example.com")).await.unwrap();
        assert_eq!(record.total_amount, 2000);
        assert_eq!(record.nights, 2);
        assert_eq!(record.status, "paid");
        assert_eq!(record.beds_booked, Some(2));
        let reference = record.payment_reference.unwrap();
        assert!(reference.starts_with("DEMO-"));
        assert_eq!(reference.len(), "DEMO-".len() + 6);
    }

    #[tokio::test]
    async fn test_confirm_rechecks_capacity() {
        let (_store, service, homestay) = setup(3).await;
        let first = service
            .stage(homestay.id, Some("2025-02-01"), Some("2025-02-03"), 2)
            .await
            .unwrap();
        let second = service
            .stage(homestay.id, Some("2025-02-02"), Some("2025-02-04"), 2)
            .await
            .unwrap();

        service.confirm(&first, &guest("a@example.com")).await.unwrap();
        let err = service.confirm(&second, &guest("b@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InsufficientAvailability { available: 1, total: 3 }
        ));
    }

    #[tokio::test]
    async fn test_confirm_uses_capacity_at_insert_time() {
        let (store, service, homestay) = setup(4).await;
        let staged = service
            .stage(homestay.id, Some("2025-02-01"), Some("2025-02-03"), 3)
            .await
            .unwrap();

        store
            .update_homestay(homestay.id, &HomestayUpdate { beds: Some(2), ..Default::default() })
            .await
            .unwrap();

        let err = service.confirm(&staged, &guest("a@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InsufficientAvailability { available: 2, total: 2 }
        ));
        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_total_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let homestay = store
            .create_homestay(&NewHomestay {
                owner: "Meera".into(),
                beds: i32::MAX,
                ..Default::default()
            })
            .await
            .unwrap();
        let service = BookingService::new(store.clone(), store.clone(), u32::MAX);

        let err = service
            .stage(homestay.id, Some("2025-01-01"), Some("9999-01-01"), i64::from(i32::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::AmountTooLarge { .. }));
        assert_eq!(err.code(), "AMOUNT_TOO_LARGE");
    }

    /// Reads succeed, every insert fails.
    struct RejectingInserts(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl BookingStore for RejectingInserts {
        async fn find_committed(&self, homestay_id: i64) -> Result<Vec<BookingRecord>, DatabaseError> {
            self.0.find_committed(homestay_id).await
        }

        async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, DatabaseError> {
            self.0.find_booking(id).await
        }

        async fn find_for_requester(
            &self,
            key: &crate::db::RequesterKey,
        ) -> Result<Vec<BookingRecord>, DatabaseError> {
            self.0.find_for_requester(key).await
        }

        async fn list_bookings(&self) -> Result<Vec<BookingRecord>, DatabaseError> {
            self.0.list_bookings().await
        }

        async fn insert_within_capacity(
            &self,
            _booking: &NewBooking,
        ) -> Result<CapacityInsert, DatabaseError> {
            Err(DatabaseError::Timeout(std::time::Duration::from_secs(5)))
        }
    }

    #[tokio::test]
    async fn test_confirm_persist_failure() {
        let (store, _service, homestay) = setup(3).await;
        let service = BookingService::new(
            store.clone(),
            Arc::new(RejectingInserts(store.clone())),
            500,
        );
        let staged = service
            .stage(homestay.id, Some("2025-02-01"), Some("2025-02-03"), 1)
            .await
            .unwrap();
        let err = service.confirm(&staged, &guest("a@example.com")).await.unwrap_err();
        assert!(matches!(err, BookingError::BookingPersistFailed(_)));
        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_store_down_before_insert() {
        let (store, service, homestay) = setup(3).await;
        let staged = service
            .stage(homestay.id, Some("2025-02-01"), Some("2025-02-03"), 1)
            .await
            .unwrap();
        store.set_unavailable(true);
        let err = service.confirm(&staged, &guest("a@example.com")).await.unwrap_err();
        assert!(matches!(err, BookingError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_requester_listing_and_receipt() {
        let (_store, service, homestay) = setup(6).await;
        for (from, till) in [("2025-03-10", "2025-03-12"), ("2025-03-01", "2025-03-02")] {
            let staged = service.stage(homestay.id, Some(from), Some(till), 1).await.unwrap();
            service.confirm(&staged, &guest("a@example.com")).await.unwrap();
        }
        let staged = service
            .stage(homestay.id, Some("2025-03-05"), Some("2025-03-06"), 1)
            .await
            .unwrap();
        let other = service.confirm(&staged, &guest("b@example.com")).await.unwrap();

        let mine = service.list_for_requester(&guest("a@example.com")).await.unwrap();
        let dates: Vec<&str> = mine.iter().map(|v| v.booking.from_date.as_str()).collect();
        assert_eq!(dates, vec!["2025-03-01", "2025-03-10"]);
        assert_eq!(mine[0].homestay.as_ref().unwrap().owner, "Meera");

        let nobody = service.list_for_requester(&RequesterIdentity::default()).await.unwrap();
        assert!(nobody.is_empty());

        let receipt = service.get_booking(&other.id.to_string()).await.unwrap();
        assert_eq!(receipt.booking.user_email.as_deref(), Some("b@example.com"));
        assert_eq!(receipt.formatted_amount, "₹500");

        let all = service.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].booking.from_date, "2025-03-10");

        assert!(matches!(
            service.get_booking("not-a-uuid").await,
            Err(BookingError::BookingNotFound(_))
        ));
    }
}
