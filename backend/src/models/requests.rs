//! # API Request Models
//!
//! Structures for incoming API request bodies and query strings.
//! Each struct represents the expected JSON body for an endpoint.

use serde::{Deserialize, Serialize};

use crate::db::RequesterIdentity;
use crate::services::StagedBooking;

/// Request to stage a booking.
///
/// ## Example JSON
///
/// ```json
/// {
///     "homestayId": 3,
///     "fromDate": "2025-01-01",
///     "tillDate": "2025-01-03",
///     "beds": 2
/// }
/// ```
///
/// Dates are optional here so that a missing date is reported as
/// `MISSING_DATES` rather than a JSON parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageBookingRequest {
    #[serde(alias = "homestay_id")]
    pub homestay_id: i64,

    #[serde(default, alias = "from_date")]
    pub from_date: Option<String>,

    /// Checkout day, exclusive.
    #[serde(default, alias = "till_date")]
    pub till_date: Option<String>,

    /// Defaults to one bed.
    #[serde(default = "default_beds")]
    pub beds: i64,
}

fn default_beds() -> i64 {
    1
}

/// Request to confirm a previously staged booking.
///
/// The caller sends back the staged record it received from
/// `POST /bookings/stage`. Only its homestay, dates and bed count are
/// used; nights and the total are recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBookingRequest {
    pub staged: StagedBooking,

    #[serde(default)]
    pub requester: RequesterIdentity,
}

/// Query parameters for "my bookings".
///
/// ## Example URL
///
/// ```text
/// GET /bookings?email=guest@example.com
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingLookupQuery {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
}

impl From<BookingLookupQuery> for RequesterIdentity {
    fn from(query: BookingLookupQuery) -> Self {
        RequesterIdentity {
            user_id: None,
            phone: query.phone,
            email: query.email,
            name: query.name,
        }
    }
}

/// Query parameters for the availability calendar.
///
/// ## Example URL
///
/// ```text
/// GET /homestays/3/availability?from=2025-01-01&days=14
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    /// First day; today when absent.
    pub from: Option<String>,

    /// Number of days. Default: 30, Max: 366
    pub days: Option<u32>,
}

/// Query parameters for free beds over a stay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedsQuery {
    pub from: String,
    pub till: String,
}

/// Request to create a gateway order.
///
/// ## Example JSON
///
/// ```json
/// {
///     "order_id": "order_1712345",
///     "amount": 2000,
///     "customer_id": "guest-42",
///     "phone": "9876543210"
/// }
/// ```
///
/// ## Notes
///
/// - `amount` is in whole rupees and must be positive
/// - camelCase field names are accepted as well
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default, alias = "orderId")]
    pub order_id: String,

    #[serde(default)]
    pub amount: i64,

    #[serde(default, alias = "customerId")]
    pub customer_id: String,

    #[serde(default, alias = "customerPhone")]
    pub phone: String,

    /// Overrides the configured return URL.
    #[serde(default, alias = "returnUrl")]
    pub return_url: Option<String>,
}

/// Query parameters for a UPI payment link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpiLinkQuery {
    /// Amount in rupees; 1500 when absent.
    pub amount: Option<String>,
}

/// Request carrying a UTR reference for a UPI payment.
///
/// ## Example JSON
///
/// ```json
/// { "utr": "412345678901" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtrConfirmationRequest {
    #[serde(default)]
    pub utr: String,
}
