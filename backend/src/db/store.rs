//! # Store Traits
//!
//! Services never talk to PostgreSQL directly. They hold these traits,
//! implemented by [`Database`](super::Database) for production and by
//! [`MemoryStore`](super::memory::MemoryStore) for demos and tests.
//!
//! ```text
//!   AvailabilityEngine ─┐
//!   BookingService ─────┼──► BookingStore / HomestayStore / PaymentStore
//!   PaymentService ─────┘              │
//!                              ┌───────┴────────┐
//!                              ▼                ▼
//!                          Database        MemoryStore
//! ```
//!
//! Every Postgres-backed call is bounded by the configured store timeout.

use async_trait::async_trait;
use uuid::Uuid;

use super::models::*;
use super::{queries, Database, DatabaseError};

/// Read and admin access to homestays.
#[async_trait]
pub trait HomestayStore: Send + Sync {
    async fn get_homestay(&self, id: i64) -> Result<Option<HomestayRecord>, DatabaseError>;

    async fn list_homestays(&self) -> Result<Vec<HomestayRecord>, DatabaseError>;

    async fn create_homestay(&self, homestay: &NewHomestay) -> Result<HomestayRecord, DatabaseError>;

    /// Returns `None` when the homestay does not exist.
    async fn update_homestay(
        &self,
        id: i64,
        update: &HomestayUpdate,
    ) -> Result<Option<HomestayRecord>, DatabaseError>;

    /// Returns whether a row was deleted.
    async fn delete_homestay(&self, id: i64) -> Result<bool, DatabaseError>;
}

/// Booking persistence.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// All bookings of a homestay whose status holds beds (`paid`, `confirmed`).
    async fn find_committed(&self, homestay_id: i64) -> Result<Vec<BookingRecord>, DatabaseError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, DatabaseError>;

    /// Bookings matching the requester's lookup key, earliest stay first.
    async fn find_for_requester(
        &self,
        key: &RequesterKey,
    ) -> Result<Vec<BookingRecord>, DatabaseError>;

    /// Every booking, latest stay first.
    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, DatabaseError>;

    /// Insert a booking only if the homestay still has room for it.
    ///
    /// The capacity check and the insert happen atomically with respect
    /// to other calls for the same homestay, so two confirmations racing
    /// for the last bed cannot both win. Capacity is read from the
    /// homestay inside that same critical section.
    async fn insert_within_capacity(
        &self,
        booking: &NewBooking,
    ) -> Result<CapacityInsert, DatabaseError>;
}

/// Payment records and out-of-band confirmations.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Record a freshly created gateway order as `PENDING`.
    async fn insert_pending_payment(&self, order_id: &str, amount: i64) -> Result<(), DatabaseError>;

    async fn find_payment(&self, order_id: &str) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// Move a payment into a terminal status unless it already is terminal.
    ///
    /// Creates the row when the webhook beats the order insert. The
    /// conditional write is a single atomic statement.
    async fn settle_payment(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<SettleOutcome, DatabaseError>;

    async fn record_utr(&self, booking_id: &str, utr: &str) -> Result<PaymentConfirmation, DatabaseError>;
}

/// Liveness probe for the health endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> bool;
}

// ============================================
// POSTGRES IMPLEMENTATIONS
// ============================================

#[async_trait]
impl HomestayStore for Database {
    async fn get_homestay(&self, id: i64) -> Result<Option<HomestayRecord>, DatabaseError> {
        self.bounded(queries::get_homestay(self.pool(), id)).await
    }

    async fn list_homestays(&self) -> Result<Vec<HomestayRecord>, DatabaseError> {
        self.bounded(queries::list_homestays(self.pool())).await
    }

    async fn create_homestay(&self, homestay: &NewHomestay) -> Result<HomestayRecord, DatabaseError> {
        self.bounded(queries::create_homestay(self.pool(), homestay)).await
    }

    async fn update_homestay(
        &self,
        id: i64,
        update: &HomestayUpdate,
    ) -> Result<Option<HomestayRecord>, DatabaseError> {
        self.bounded(queries::update_homestay(self.pool(), id, update)).await
    }

    async fn delete_homestay(&self, id: i64) -> Result<bool, DatabaseError> {
        self.bounded(queries::delete_homestay(self.pool(), id)).await
    }
}

#[async_trait]
impl BookingStore for Database {
    async fn find_committed(&self, homestay_id: i64) -> Result<Vec<BookingRecord>, DatabaseError> {
        self.bounded(queries::get_committed_bookings(self.pool(), homestay_id)).await
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, DatabaseError> {
        self.bounded(queries::get_booking_by_id(self.pool(), id)).await
    }

    async fn find_for_requester(
        &self,
        key: &RequesterKey,
    ) -> Result<Vec<BookingRecord>, DatabaseError> {
        self.bounded(queries::get_bookings_for_requester(self.pool(), key)).await
    }

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, DatabaseError> {
        self.bounded(queries::list_bookings(self.pool())).await
    }

    async fn insert_within_capacity(
        &self,
        booking: &NewBooking,
    ) -> Result<CapacityInsert, DatabaseError> {
        self.bounded(queries::insert_booking_within_capacity(self.pool(), booking))
            .await
    }
}

#[async_trait]
impl PaymentStore for Database {
    async fn insert_pending_payment(&self, order_id: &str, amount: i64) -> Result<(), DatabaseError> {
        self.bounded(queries::insert_pending_payment(self.pool(), order_id, amount)).await
    }

    async fn find_payment(&self, order_id: &str) -> Result<Option<PaymentRecord>, DatabaseError> {
        self.bounded(queries::get_payment(self.pool(), order_id)).await
    }

    async fn settle_payment(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<SettleOutcome, DatabaseError> {
        self.bounded(queries::settle_payment(self.pool(), order_id, status)).await
    }

    async fn record_utr(&self, booking_id: &str, utr: &str) -> Result<PaymentConfirmation, DatabaseError> {
        self.bounded(queries::create_payment_confirmation(self.pool(), booking_id, utr)).await
    }
}

#[async_trait]
impl HealthProbe for Database {
    async fn ping(&self) -> bool {
        self.bounded(queries::ping(self.pool())).await.is_ok()
    }
}
