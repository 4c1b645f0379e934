//! # Database Models
//!
//! This module defines the data structures that map to database tables.
//! Each struct represents a row in a table.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `homestays` | Bookable units and their bed capacity |
//! | `bookings` | Stays committed against a homestay |
//! | `payments` | Gateway orders and their settlement status |
//! | `payment_confirmations` | UTR references entered by guests |
//!
//! ## Relationship Diagram
//!
//! ```text
//! ┌─────────────┐       ┌──────────────────┐
//! │  homestays  │──────<│     bookings     │
//! │             │       │                  │
//! │ id (PK)     │       │ homestay_id (FK) │
//! │ beds        │       │ from/till date   │
//! │ ...         │       │ beds_booked      │
//! └─────────────┘       └──────────────────┘
//!
//! ┌─────────────┐
//! │  payments   │   correlated to bookings by order id only,
//! │ order_id PK │   no foreign key
//! └─────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::StayRange;

/// A homestay row.
///
/// `beds` is the bed capacity the availability engine works against.
/// Everything else is descriptive and only shown to guests.
///
/// ## Note on Types
///
/// We use `i32` instead of `u32` because PostgreSQL doesn't have
/// unsigned integers. Capacity is clamped at zero when read by services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomestayRecord {
    pub id: i64,
    pub owner: String,
    pub rooms: i32,
    pub beds: i32,
    pub floor: Option<String>,
    pub description: Option<String>,
    /// Display price set by the admin.
    pub price: i32,
    pub contact: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HomestayRecord {
    /// Bed capacity, never negative.
    pub fn total_beds(&self) -> u32 {
        self.beds.max(0) as u32
    }
}

/// Fields for a new homestay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHomestay {
    pub owner: String,
    pub rooms: i32,
    pub beds: i32,
    pub floor: Option<String>,
    pub description: Option<String>,
    pub price: i32,
    pub contact: Option<String>,
    pub image: Option<String>,
}

/// Partial homestay update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomestayUpdate {
    pub owner: Option<String>,
    pub rooms: Option<i32>,
    pub beds: Option<i32>,
    pub floor: Option<String>,
    pub description: Option<String>,
    pub price: Option<i32>,
    pub contact: Option<String>,
    pub image: Option<String>,
}

impl HomestayUpdate {
    /// Apply this update on top of an existing record.
    ///
    /// Empty strings count as "not provided", which is how the admin
    /// form submits untouched fields.
    pub fn apply_to(&self, record: &mut HomestayRecord) {
        fn text(field: &Option<String>) -> Option<String> {
            field.as_ref().filter(|v| !v.trim().is_empty()).cloned()
        }

        if let Some(owner) = text(&self.owner) {
            record.owner = owner;
        }
        if let Some(rooms) = self.rooms {
            record.rooms = rooms;
        }
        if let Some(beds) = self.beds {
            record.beds = beds;
        }
        if let Some(floor) = text(&self.floor) {
            record.floor = Some(floor);
        }
        if let Some(description) = text(&self.description) {
            record.description = Some(description);
        }
        if let Some(price) = self.price {
            record.price = price;
        }
        if let Some(contact) = text(&self.contact) {
            record.contact = Some(contact);
        }
        if let Some(image) = text(&self.image) {
            record.image = Some(image);
        }
    }
}

/// Booking status as stored in the `bookings.status` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
    Confirmed,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "paid" => Some(BookingStatus::Paid),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" | "canceled" => Some(BookingStatus::Cancelled),
            "failed" => Some(BookingStatus::Failed),
            _ => None,
        }
    }

    /// Only paid and confirmed stays hold beds.
    pub fn holds_beds(&self) -> bool {
        matches!(self, BookingStatus::Paid | BookingStatus::Confirmed)
    }
}

/// A booking row.
///
/// Stay dates are kept as ISO text, exactly as they were written. Rows
/// imported from the old hosted store may carry full timestamps or
/// garbage, so parsing is left to the availability engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: Uuid,
    pub homestay_id: i64,
    pub from_date: String,
    /// Checkout day, exclusive.
    pub till_date: String,
    pub nights: i32,
    /// Legacy rows may lack a bed count; those hold one bed.
    pub beds_booked: Option<i32>,
    pub total_amount: i64,
    pub status: String,
    pub payment_reference: Option<String>,
    pub user_id: Option<String>,
    pub user_phone: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingRecord {
    /// Beds this booking commits.
    pub fn beds(&self) -> u32 {
        self.beds_booked.unwrap_or(1).max(0) as u32
    }

    /// Parsed status; unknown values hold no beds.
    pub fn booking_status(&self) -> Option<BookingStatus> {
        BookingStatus::parse(&self.status)
    }
}

/// Fields for a booking about to be persisted.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub homestay_id: i64,
    pub stay: StayRange,
    pub beds_booked: u32,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub payment_reference: Option<String>,
    pub user_id: Option<String>,
    pub user_phone: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl NewBooking {
    /// The row this booking becomes once stored.
    pub fn to_record(&self, id: Uuid, created_at: DateTime<Utc>) -> BookingRecord {
        BookingRecord {
            id,
            homestay_id: self.homestay_id,
            from_date: crate::utils::format_stay_date(self.stay.start()),
            till_date: crate::utils::format_stay_date(self.stay.end()),
            nights: self.stay.nights() as i32,
            beds_booked: Some(self.beds_booked as i32),
            total_amount: self.total_amount,
            status: self.status.as_str().to_string(),
            payment_reference: self.payment_reference.clone(),
            user_id: self.user_id.clone(),
            user_phone: self.user_phone.clone(),
            user_email: self.user_email.clone(),
            user_name: self.user_name.clone(),
            created_at,
        }
    }
}

/// Payment status as stored in the `payments.status` column.
///
/// `Pending` moves to exactly one of the terminal states and never back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(PaymentStatus::Pending),
            "SUCCESS" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

/// A payment row, keyed by the caller-chosen order id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub order_id: String,
    /// Unknown when a webhook arrives before the order row was written.
    pub amount: Option<i64>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a conditional terminal write on a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// This call moved the payment into the terminal state.
    Applied,
    /// The payment was already terminal; nothing changed.
    AlreadyTerminal,
}

/// Result of a capacity-checked booking insert.
#[derive(Debug, Clone)]
pub enum CapacityInsert {
    Inserted(BookingRecord),
    /// Not enough free beds at write time. `total` is the capacity read
    /// under the same lock.
    Full { available: u32, total: u32 },
}

/// Who is booking. Opaque to the core; used for listing "my bookings".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterIdentity {
    pub user_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// The single column used to find a requester's bookings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequesterKey {
    Email(String),
    Phone(String),
    Name(String),
}

impl RequesterIdentity {
    /// Email wins, then phone, then name.
    pub fn lookup_key(&self) -> Option<RequesterKey> {
        fn present(v: &Option<String>) -> Option<String> {
            v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        present(&self.email)
            .map(RequesterKey::Email)
            .or_else(|| present(&self.phone).map(RequesterKey::Phone))
            .or_else(|| present(&self.name).map(RequesterKey::Name))
    }
}

/// UTR reference a guest entered after paying over UPI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub booking_id: String,
    pub utr: String,
    pub created_at: DateTime<Utc>,
}
