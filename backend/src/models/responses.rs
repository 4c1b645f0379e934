//! # API Response Models
//!
//! Structures for outgoing API response bodies.
//! All responses are wrapped in a standard format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{BookingRecord, HomestayRecord};
use crate::services::availability::DayAvailability;
use crate::utils::format_inr;

/// Standard API response wrapper.
///
/// All API responses follow this format:
///
/// ## Success Response
///
/// ```json
/// {
///     "success": true,
///     "data": { ... },
///     "error": null
/// }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "success": false,
///     "data": null,
///     "error": {
///         "code": "INSUFFICIENT_AVAILABILITY",
///         "message": "Only 2 bed(s) available for the selected dates"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (null on error).
    pub data: Option<T>,

    /// Error information (null on success).
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// API error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code (e.g., "INVALID_DATE_RANGE").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// The homestay facts shown next to a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomestaySummary {
    pub id: i64,
    pub owner: String,
    pub rooms: i32,
    pub beds: i32,
    pub price: i32,
    pub contact: Option<String>,
}

impl From<&HomestayRecord> for HomestaySummary {
    fn from(h: &HomestayRecord) -> Self {
        Self {
            id: h.id,
            owner: h.owner.clone(),
            rooms: h.rooms,
            beds: h.beds,
            price: h.price,
            contact: h.contact.clone(),
        }
    }
}

/// A booking together with its homestay.
///
/// ## Example Response
///
/// ```json
/// {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "homestayId": 3,
///     "fromDate": "2025-01-01",
///     "tillDate": "2025-01-03",
///     "nights": 2,
///     "bedsBooked": 2,
///     "totalAmount": 2000,
///     "formattedAmount": "₹2,000",
///     "status": "paid",
///     "paymentReference": "DEMO-123456",
///     "homestay": { "id": 3, "owner": "Ravi", "rooms": 2, "beds": 4, "price": 500 }
/// }
/// ```
///
/// `homestay` is null when the homestay has since been removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: BookingRecord,

    pub formatted_amount: String,

    pub homestay: Option<HomestaySummary>,
}

impl BookingView {
    pub fn new(booking: BookingRecord, homestay: Option<&HomestayRecord>) -> Self {
        Self {
            formatted_amount: format_inr(booking.total_amount),
            homestay: homestay.map(HomestaySummary::from),
            booking,
        }
    }
}

/// Homestay detail with its upcoming availability.
///
/// Returned by `GET /homestays/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomestayDetailResponse {
    pub homestay: HomestayRecord,

    /// One entry per night, starting today.
    pub calendar: Vec<DayAvailability>,
}

/// Availability calendar.
///
/// Returned by `GET /homestays/{id}/availability`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub homestay_id: i64,
    pub from: NaiveDate,
    pub days: Vec<DayAvailability>,
}

/// Free beds over a stay.
///
/// Returned by `GET /homestays/{id}/beds`
///
/// ## Example Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "homestayId": 3,
///         "fromDate": "2025-01-01",
///         "tillDate": "2025-01-03",
///         "nights": 2,
///         "totalBeds": 4,
///         "availableBeds": 2
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableBedsResponse {
    pub homestay_id: i64,
    pub from_date: NaiveDate,
    pub till_date: NaiveDate,
    pub nights: u32,
    pub total_beds: u32,
    pub available_beds: u32,
}

/// Gateway order created.
///
/// Returned by `POST /payments/create-order`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,

    /// Token the hosted checkout is opened with.
    pub payment_session_id: String,

    /// False when the pending payment row could not be written. The
    /// order exists at the gateway either way.
    pub payment_recorded: bool,
}

/// Webhook acknowledgement.
///
/// ## Example Response
///
/// ```json
/// { "ok": true, "ignored": false, "duplicate": false, "status": "SUCCESS" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAckResponse {
    pub ok: bool,
    pub ignored: bool,
    pub duplicate: bool,

    /// The status this delivery applied, if any.
    pub status: Option<String>,
}

/// UPI deep link for a payment.
///
/// Returned by `GET /pay/{payment_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpiLinkResponse {
    pub payment_id: String,
    pub amount: String,
    pub upi_link: String,
    pub payee_vpa: String,
    pub payee_name: String,
}

/// Admin overview.
///
/// Returned by `GET /admin/dashboard`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboardResponse {
    pub homestays: Vec<HomestayRecord>,

    /// Latest stay first.
    pub bookings: Vec<BookingView>,
}

/// Homestay removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub id: i64,
    pub deleted: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status: "healthy" or "unhealthy".
    pub status: String,

    /// Store connection status.
    pub database: bool,

    /// Whether gateway credentials are configured.
    pub gateway_configured: bool,

    /// Service version.
    pub version: String,

    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}
