//! # API Request Handlers
//!
//! This module contains the handler functions for each API endpoint.
//! Each handler:
//! 1. Extracts request data
//! 2. Validates input
//! 3. Calls the appropriate service
//! 4. Returns a formatted response
//!
//! ## Error Handling
//!
//! All errors are caught and returned as JSON:
//!
//! ```json
//! {
//!     "success": false,
//!     "error": {
//!         "code": "INSUFFICIENT_AVAILABILITY",
//!         "message": "Only 2 bed(s) available for the selected dates. Homestay has 4 total beds."
//!     }
//! }
//! ```
//!
//! | Error | Status |
//! |-------|--------|
//! | validation, bad signature, bad payload | 400 |
//! | missing admin token | 401 |
//! | unknown homestay / booking / payment | 404 |
//! | not enough beds | 409 |
//! | gateway failure | 502 |
//! | store failure | 500 / 503 |

use std::sync::Arc;
use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Local, NaiveDate};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::AppState;
use crate::db::{HomestayRecord, HomestayUpdate, NewHomestay, RequesterIdentity};
use crate::models::{
    AdminDashboardResponse,
    ApiResponse,
    AvailabilityQuery,
    AvailabilityResponse,
    AvailableBedsResponse,
    BedsQuery,
    BookingLookupQuery,
    ConfirmBookingRequest,
    CreateOrderRequest,
    CreateOrderResponse,
    DeletedResponse,
    HealthResponse,
    HomestayDetailResponse,
    StageBookingRequest,
    UpiLinkQuery,
    UtrConfirmationRequest,
    WebhookAckResponse,
};
use crate::services::booking::stay_range;
use crate::services::{BookingError, GatewayError, PaymentError, WebhookAck};
use crate::utils::parse_stay_date;

/// Days shown on the homestay detail page.
const DETAIL_CALENDAR_DAYS: u32 = 30;

/// Upper bound for `?days=` on the availability calendar.
const MAX_CALENDAR_DAYS: u32 = 366;

/// Header carrying the webhook signature.
const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Older gateway integrations send the signature under this name.
const LEGACY_SIGNATURE_HEADER: &str = "x-cf-signature";

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

// ============================================
// ERROR MAPPING
// ============================================

fn error_response(status: StatusCode, code: &str, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::<()>::error(code, message))
}

fn booking_error_response(e: BookingError) -> HttpResponse {
    let status = match &e {
        BookingError::MissingDates
        | BookingError::InvalidDateRange(_)
        | BookingError::InvalidBedCount(_)
        | BookingError::AmountTooLarge { .. } => StatusCode::BAD_REQUEST,
        BookingError::InsufficientAvailability { .. } => StatusCode::CONFLICT,
        BookingError::UnitNotFound(_) | BookingError::BookingNotFound(_) => StatusCode::NOT_FOUND,
        BookingError::BookingPersistFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BookingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        error!("Booking request failed: {}", e);
    }
    error_response(status, e.code(), &e.to_string())
}

fn payment_error_response(e: PaymentError) -> HttpResponse {
    let status = match &e {
        PaymentError::InvalidRequest(_)
        | PaymentError::InvalidSignature
        | PaymentError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        PaymentError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::GatewayError(GatewayError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
        PaymentError::GatewayError(_) => StatusCode::BAD_GATEWAY,
        // Non-2xx so the gateway redelivers the webhook
        PaymentError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Payment request failed: {}", e);
    }
    error_response(status, e.code(), &e.to_string())
}

fn store_unavailable(e: impl std::fmt::Display) -> HttpResponse {
    error!("Store call failed: {}", e);
    error_response(StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", &e.to_string())
}

/// Extractor error handler: malformed JSON, query or path input gets the
/// same envelope as every other error.
pub fn invalid_request<E>(err: E, req: &HttpRequest) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    warn!("Malformed request to {}: {}", req.path(), err);
    let response = error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", &err.to_string());
    InternalError::from_response(err, response).into()
}

/// Load a homestay or build the 404 / 503 response.
async fn load_homestay(state: &AppState, id: i64) -> Result<HomestayRecord, HttpResponse> {
    match state.homestays.get_homestay(id).await {
        Ok(Some(homestay)) => Ok(homestay),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            "HOMESTAY_NOT_FOUND",
            &format!("Homestay not found: {}", id),
        )),
        Err(e) => Err(store_unavailable(e)),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ============================================
// GENERAL
// ============================================

/// API information endpoint (root).
///
/// ## Endpoint
///
/// `GET /`
pub async fn api_info() -> HttpResponse {
    let info = json!({
        "name": "Homestay Booking API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Homestay availability, bookings and payments",
        "endpoints": {
            "health": { "method": "GET", "path": "/health" },
            "homestays": {
                "list": { "method": "GET", "path": "/homestays" },
                "detail": { "method": "GET", "path": "/homestays/{id}" },
                "availability": { "method": "GET", "path": "/homestays/{id}/availability?from&days" },
                "beds": { "method": "GET", "path": "/homestays/{id}/beds?from&till" }
            },
            "bookings": {
                "stage": { "method": "POST", "path": "/bookings/stage" },
                "confirm": { "method": "POST", "path": "/bookings/confirm" },
                "mine": { "method": "GET", "path": "/bookings?email|phone|name" },
                "receipt": { "method": "GET", "path": "/bookings/{id}" }
            },
            "payments": {
                "createOrder": { "method": "POST", "path": "/payments/create-order" },
                "webhook": { "method": "POST", "path": "/payments/cashfree-webhook" },
                "status": { "method": "GET", "path": "/payments/{order_id}" },
                "upi": { "method": "GET", "path": "/pay/{payment_id}?amount" },
                "utr": { "method": "POST", "path": "/confirm/{booking_id}" }
            }
        }
    });

    HttpResponse::Ok().json(ApiResponse::success(info))
}

/// Health check endpoint.
///
/// ## Endpoint
///
/// `GET /health`
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "status": "healthy",
///         "database": true,
///         "gatewayConfigured": true,
///         "version": "0.1.0",
///         "timestamp": "2025-12-08T12:00:00Z"
///     }
/// }
/// ```
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let db_healthy = state.probe.ping().await;

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        database: db_healthy,
        gateway_configured: state.config.gateway_configured(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    HttpResponse::build(status_code).json(ApiResponse::success(response))
}

// ============================================
// HOMESTAYS
// ============================================

/// List all homestays.
///
/// ## Endpoint
///
/// `GET /homestays`
pub async fn list_homestays(state: web::Data<Arc<AppState>>) -> HttpResponse {
    match state.homestays.list_homestays().await {
        Ok(homestays) => HttpResponse::Ok().json(ApiResponse::success(homestays)),
        Err(e) => store_unavailable(e),
    }
}

/// Homestay detail with the next 30 days of availability.
///
/// ## Endpoint
///
/// `GET /homestays/{id}`
pub async fn get_homestay(
    state: web::Data<Arc<AppState>>,
    path: web::Path<i64>,
) -> HttpResponse {
    let homestay = match load_homestay(&state, path.into_inner()).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    let calendar = state
        .availability
        .calendar(&homestay, today(), DETAIL_CALENDAR_DAYS)
        .await;

    HttpResponse::Ok().json(ApiResponse::success(HomestayDetailResponse {
        calendar: calendar.days().collect(),
        homestay,
    }))
}

/// Day-by-day availability.
///
/// ## Endpoint
///
/// `GET /homestays/{id}/availability?from=2025-01-01&days=14`
///
/// `from` defaults to today, `days` to 30 (at most 366).
pub async fn homestay_availability(
    state: web::Data<Arc<AppState>>,
    path: web::Path<i64>,
    query: web::Query<AvailabilityQuery>,
) -> HttpResponse {
    let from = match query.from.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => today(),
        Some(raw) => match parse_stay_date(raw) {
            Some(day) => day,
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "INVALID_DATE",
                    &format!("Invalid date: {}", raw),
                )
            }
        },
    };

    let days = query.days.unwrap_or(DETAIL_CALENDAR_DAYS);
    if days > MAX_CALENDAR_DAYS {
        return error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            &format!("days must be at most {}", MAX_CALENDAR_DAYS),
        );
    }

    let homestay = match load_homestay(&state, path.into_inner()).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    let calendar = state.availability.calendar(&homestay, from, days).await;

    HttpResponse::Ok().json(ApiResponse::success(AvailabilityResponse {
        homestay_id: homestay.id,
        from,
        days: calendar.days().collect(),
    }))
}

/// Free beds for a stay.
///
/// ## Endpoint
///
/// `GET /homestays/{id}/beds?from=2025-01-01&till=2025-01-03`
pub async fn available_beds(
    state: web::Data<Arc<AppState>>,
    path: web::Path<i64>,
    query: web::Query<BedsQuery>,
) -> HttpResponse {
    let range = match stay_range(&query.from, &query.till) {
        Ok(r) => r,
        Err(e) => return booking_error_response(e),
    };

    let homestay = match load_homestay(&state, path.into_inner()).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    let available = state.availability.available_beds(&homestay, &range).await;

    HttpResponse::Ok().json(ApiResponse::success(AvailableBedsResponse {
        homestay_id: homestay.id,
        from_date: range.start(),
        till_date: range.end(),
        nights: range.nights(),
        total_beds: homestay.total_beds(),
        available_beds: available,
    }))
}

// ============================================
// BOOKINGS
// ============================================

/// Validate and price a booking without storing it.
///
/// ## Endpoint
///
/// `POST /bookings/stage`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/bookings/stage \
///   -H "Content-Type: application/json" \
///   -d '{"homestayId": 1, "fromDate": "2025-01-01", "tillDate": "2025-01-03", "beds": 2}'
/// ```
///
/// The response body's `data` is the staged booking to send to
/// `/bookings/confirm`.
pub async fn stage_booking(
    state: web::Data<Arc<AppState>>,
    body: web::Json<StageBookingRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    match state
        .bookings
        .stage(
            request.homestay_id,
            request.from_date.as_deref(),
            request.till_date.as_deref(),
            request.beds,
        )
        .await
    {
        Ok(staged) => HttpResponse::Ok().json(ApiResponse::success(staged)),
        Err(e) => booking_error_response(e),
    }
}

/// Persist a staged booking.
///
/// ## Endpoint
///
/// `POST /bookings/confirm`
///
/// ```json
/// {
///     "staged": { "homestayId": 1, "fromDate": "2025-01-01", "tillDate": "2025-01-03", "beds": 2 },
///     "requester": { "email": "guest@example.com", "name": "Asha" }
/// }
/// ```
pub async fn confirm_booking(
    state: web::Data<Arc<AppState>>,
    body: web::Json<ConfirmBookingRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    match state.bookings.confirm(&request.staged, &request.requester).await {
        Ok(booking) => {
            info!("Booking {} confirmed via API", booking.id);
            HttpResponse::Ok().json(ApiResponse::success(booking))
        }
        Err(e) => booking_error_response(e),
    }
}

/// A requester's bookings.
///
/// ## Endpoint
///
/// `GET /bookings?email=guest@example.com`
///
/// Email wins over phone, phone over name.
pub async fn my_bookings(
    state: web::Data<Arc<AppState>>,
    query: web::Query<BookingLookupQuery>,
) -> HttpResponse {
    let requester: RequesterIdentity = query.into_inner().into();

    match state.bookings.list_for_requester(&requester).await {
        Ok(bookings) => HttpResponse::Ok().json(ApiResponse::success(bookings)),
        Err(e) => booking_error_response(e),
    }
}

/// Booking receipt.
///
/// ## Endpoint
///
/// `GET /bookings/{id}`
pub async fn get_booking(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> HttpResponse {
    match state.bookings.get_booking(&path).await {
        Ok(view) => HttpResponse::Ok().json(ApiResponse::success(view)),
        Err(e) => booking_error_response(e),
    }
}

// ============================================
// PAYMENTS
// ============================================

/// Open a gateway order.
///
/// ## Endpoint
///
/// `POST /payments/create-order`
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/payments/create-order \
///   -H "Content-Type: application/json" \
///   -d '{"order_id": "order_1", "amount": 2000, "customer_id": "guest-42", "phone": "9876543210"}'
/// ```
pub async fn create_order(
    state: web::Data<Arc<AppState>>,
    body: web::Json<CreateOrderRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    match state
        .payments
        .create_order(
            &request.order_id,
            request.amount,
            &request.customer_id,
            &request.phone,
            request.return_url.as_deref(),
        )
        .await
    {
        Ok(order) => HttpResponse::Ok().json(ApiResponse::success(CreateOrderResponse {
            order_id: order.order_id,
            payment_session_id: order.payment_session_id,
            payment_recorded: order.payment_recorded,
        })),
        Err(e) => payment_error_response(e),
    }
}

/// Gateway webhook.
///
/// ## Endpoint
///
/// `POST /payments/cashfree-webhook`
///
/// The body is taken as raw bytes; the signature in `x-webhook-signature`
/// (or `x-cf-signature`) covers exactly those bytes.
pub async fn cashfree_webhook(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .or_else(|| req.headers().get(LEGACY_SIGNATURE_HEADER))
        .and_then(|v| v.to_str().ok());

    match state.payments.receive_webhook(&body, signature).await {
        Ok(ack) => {
            let response = match ack {
                WebhookAck::Applied(status) => WebhookAckResponse {
                    ok: true,
                    ignored: false,
                    duplicate: false,
                    status: Some(status.as_str().to_string()),
                },
                WebhookAck::Duplicate => WebhookAckResponse {
                    ok: true,
                    ignored: false,
                    duplicate: true,
                    status: None,
                },
                WebhookAck::Ignored => WebhookAckResponse {
                    ok: true,
                    ignored: true,
                    duplicate: false,
                    status: None,
                },
            };
            HttpResponse::Ok().json(ApiResponse::success(response))
        }
        Err(e) => payment_error_response(e),
    }
}

/// Payment status.
///
/// ## Endpoint
///
/// `GET /payments/{order_id}`
pub async fn payment_status(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> HttpResponse {
    match state.payments.payment_status(&path).await {
        Ok(record) => HttpResponse::Ok().json(ApiResponse::success(record)),
        Err(e) => payment_error_response(e),
    }
}

/// UPI deep link for a payment.
///
/// ## Endpoint
///
/// `GET /pay/{payment_id}?amount=1500`
pub async fn upi_link(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<UpiLinkQuery>,
) -> HttpResponse {
    match state.payments.upi_link(&path, query.amount.as_deref()) {
        Ok(link) => HttpResponse::Ok().json(ApiResponse::success(link)),
        Err(e) => payment_error_response(e),
    }
}

/// Record the UTR of a UPI payment.
///
/// ## Endpoint
///
/// `POST /confirm/{booking_id}`
pub async fn confirm_utr(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UtrConfirmationRequest>,
) -> HttpResponse {
    match state.payments.record_utr(&path, &body.utr).await {
        Ok(confirmation) => HttpResponse::Ok().json(ApiResponse::success(confirmation)),
        Err(e) => payment_error_response(e),
    }
}

// ============================================
// ADMIN
// ============================================

/// Check the `x-admin-token` header against `ADMIN_TOKEN`.
fn require_admin(req: &HttpRequest, state: &AppState) -> Result<(), HttpResponse> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "ADMIN_DISABLED",
            "Admin endpoints are disabled",
        ));
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided.is_empty() || provided.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1 {
        warn!("Rejected admin request to {}", req.path());
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Missing or invalid admin token",
        ));
    }

    Ok(())
}

fn validate_beds(beds: Option<i32>) -> Result<(), HttpResponse> {
    match beds {
        Some(b) if b < 0 => Err(error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            "beds must not be negative",
        )),
        _ => Ok(()),
    }
}

/// Admin overview.
///
/// ## Endpoint
///
/// `GET /admin/dashboard`
pub async fn admin_dashboard(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let homestays = match state.homestays.list_homestays().await {
        Ok(h) => h,
        Err(e) => return store_unavailable(e),
    };

    match state.bookings.list_all().await {
        Ok(bookings) => HttpResponse::Ok().json(ApiResponse::success(AdminDashboardResponse {
            homestays,
            bookings,
        })),
        Err(e) => booking_error_response(e),
    }
}

/// Create a homestay.
///
/// ## Endpoint
///
/// `POST /admin/homestays`
pub async fn admin_create_homestay(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    body: web::Json<NewHomestay>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let homestay = body.into_inner();
    if homestay.owner.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", "owner is required");
    }
    if let Err(response) = validate_beds(Some(homestay.beds)) {
        return response;
    }

    match state.homestays.create_homestay(&homestay).await {
        Ok(created) => {
            info!("🏠 Homestay {} created ({} beds)", created.id, created.beds);
            HttpResponse::Ok().json(ApiResponse::success(created))
        }
        Err(e) => store_unavailable(e),
    }
}

/// Partially update a homestay. Absent or empty fields are kept.
///
/// ## Endpoint
///
/// `PUT /admin/homestays/{id}`
pub async fn admin_update_homestay(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<HomestayUpdate>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let update = body.into_inner();
    if let Err(response) = validate_beds(update.beds) {
        return response;
    }

    let id = path.into_inner();
    match state.homestays.update_homestay(id, &update).await {
        Ok(Some(updated)) => {
            info!("Homestay {} updated", id);
            HttpResponse::Ok().json(ApiResponse::success(updated))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "HOMESTAY_NOT_FOUND",
            &format!("Homestay not found: {}", id),
        ),
        Err(e) => store_unavailable(e),
    }
}

/// Delete a homestay.
///
/// ## Endpoint
///
/// `DELETE /admin/homestays/{id}`
pub async fn admin_delete_homestay(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let id = path.into_inner();
    match state.homestays.delete_homestay(id).await {
        Ok(true) => {
            info!("Homestay {} deleted", id);
            HttpResponse::Ok().json(ApiResponse::success(DeletedResponse { id, deleted: true }))
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            "HOMESTAY_NOT_FOUND",
            &format!("Homestay not found: {}", id),
        ),
        Err(e) => store_unavailable(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::db::MemoryStore;
    use crate::services::payments::sign_payload;
    use crate::services::payments::tests::{test_config, StubGateway, SECRET};
    use actix_web::{test, App};
    use serde_json::Value;

    const ADMIN: &str = "admin-secret";

    fn state_with(store: Arc<MemoryStore>) -> Arc<AppState> {
        let mut config = test_config();
        config.admin_token = Some(ADMIN.to_string());
        Arc::new(AppState::build(config, store, Arc::new(StubGateway::default())))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .configure(configure_routes),
            )
            .await
        };
    }

    async fn seed_homestay(store: &MemoryStore, beds: i32) -> i64 {
        use crate::db::HomestayStore;
        store
            .create_homestay(&NewHomestay {
                owner: "Anand".into(),
                rooms: 2,
                beds,
                price: 500,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    #[actix_web::test]
    async fn test_health_reports_store_state() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(store.clone());
        let app = app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        store.set_unavailable(true);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_stage_confirm_and_list() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_homestay(&store, 4).await;
        let state = state_with(store);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/bookings/stage")
            .set_json(json!({ "homestayId": id, "fromDate": "2025-01-01", "tillDate": "2025-01-03", "beds": 2 }))
            .to_request();
        let staged: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(staged["success"], true);
        assert_eq!(staged["data"]["totalAmount"], 2000);

        let req = test::TestRequest::post()
            .uri("/bookings/confirm")
            .set_json(json!({ "staged": staged["data"], "requester": { "email": "a@example.com" } }))
            .to_request();
        let confirmed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(confirmed["data"]["status"], "paid");
        let booking_id = confirmed["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri("/bookings?email=a@example.com").to_request();
        let mine: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(mine["data"].as_array().unwrap().len(), 1);
        assert_eq!(mine["data"][0]["homestay"]["owner"], "Anand");

        let req = test::TestRequest::get().uri(&format!("/bookings/{}", booking_id)).to_request();
        let receipt: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt["data"]["formattedAmount"], "₹2,000");

        let req = test::TestRequest::get()
            .uri(&format!("/homestays/{}/beds?from=2025-01-02&till=2025-01-05", id))
            .to_request();
        let beds: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(beds["data"]["availableBeds"], 2);
        assert_eq!(beds["data"]["nights"], 3);
    }

    #[actix_web::test]
    async fn test_stage_errors_map_to_statuses() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_homestay(&store, 2).await;
        let state = state_with(store);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/bookings/stage")
            .set_json(json!({ "homestayId": id, "fromDate": "2025-01-01", "tillDate": "2025-01-03", "beds": 3 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INSUFFICIENT_AVAILABILITY");

        let req = test::TestRequest::post()
            .uri("/bookings/stage")
            .set_json(json!({ "homestayId": id, "fromDate": "2025-01-01" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "MISSING_DATES");

        let req = test::TestRequest::post()
            .uri("/bookings/stage")
            .set_json(json!({ "homestayId": id + 9, "fromDate": "2025-01-01", "tillDate": "2025-01-02" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_malformed_input_gets_error_envelope() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_homestay(&store, 2).await;
        let state = state_with(store);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/bookings/stage")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"homestayId\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");

        let req = test::TestRequest::get()
            .uri(&format!("/homestays/{}/availability?days=lots", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");

        let req = test::TestRequest::get().uri("/homestays/abc/beds?from=2025-01-01&till=2025-01-02").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[actix_web::test]
    async fn test_availability_calendar_bounds() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_homestay(&store, 3).await;
        let state = state_with(store);
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri(&format!("/homestays/{}/availability?from=2025-06-01&days=7", id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let days = body["data"]["days"].as_array().unwrap();
        assert_eq!(days.len(), 7);
        assert_eq!(days[0]["date"], "2025-06-01");
        assert_eq!(days[0]["isFullyBooked"], false);

        let req = test::TestRequest::get()
            .uri(&format!("/homestays/{}/availability?days=400", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri(&format!("/homestays/{}", id)).to_request();
        let detail: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(detail["data"]["calendar"].as_array().unwrap().len(), 30);
    }

    #[actix_web::test]
    async fn test_webhook_signature_and_idempotency() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(store);
        let app = app!(state);

        let body = r#"{"type":"PAYMENT_SUCCESS_WEBHOOK","data":{"order":{"order_id":"order_1"}}}"#;

        let req = test::TestRequest::post()
            .uri("/payments/cashfree-webhook")
            .insert_header(("x-webhook-signature", "forged"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let sig = sign_payload(SECRET, body.as_bytes()).unwrap();
        let req = test::TestRequest::post()
            .uri("/payments/cashfree-webhook")
            .insert_header(("x-cf-signature", sig.clone()))
            .set_payload(body)
            .to_request();
        let first: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(first["data"]["status"], "SUCCESS");

        let req = test::TestRequest::post()
            .uri("/payments/cashfree-webhook")
            .insert_header(("x-webhook-signature", sig))
            .set_payload(body)
            .to_request();
        let second: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(second["data"]["duplicate"], true);

        let req = test::TestRequest::get().uri("/payments/order_1").to_request();
        let status: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["data"]["status"], "SUCCESS");
    }

    #[actix_web::test]
    async fn test_create_order_and_upi() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/payments/create-order")
            .set_json(json!({ "order_id": "order_2", "amount": 1500, "customer_id": "g1", "phone": "98765" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created["data"]["paymentSessionId"], "session_order_2");
        assert_eq!(created["data"]["paymentRecorded"], true);

        let req = test::TestRequest::post()
            .uri("/payments/create-order")
            .set_json(json!({ "order_id": "order_3", "amount": 0, "customer_id": "g1", "phone": "98765" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/pay/77?amount=250").to_request();
        let link: Value = test::call_and_read_body_json(&app, req).await;
        assert!(link["data"]["upiLink"].as_str().unwrap().starts_with("upi://pay?pa="));

        let req = test::TestRequest::post()
            .uri("/confirm/77")
            .set_json(json!({ "utr": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_admin_requires_token() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(store);
        let app = app!(state);

        let req = test::TestRequest::get().uri("/admin/dashboard").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/admin/dashboard")
            .insert_header(("x-admin-token", "wrong"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_admin_homestay_crud() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(store);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/admin/homestays")
            .insert_header(("x-admin-token", ADMIN))
            .set_json(json!({ "owner": "Kavya", "rooms": 3, "beds": 6, "price": 700, "contact": "999" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/admin/homestays/{}", id))
            .insert_header(("x-admin-token", ADMIN))
            .set_json(json!({ "owner": "", "beds": 8 }))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated["data"]["owner"], "Kavya");
        assert_eq!(updated["data"]["beds"], 8);
        assert_eq!(updated["data"]["contact"], "999");

        let req = test::TestRequest::get()
            .uri("/admin/dashboard")
            .insert_header(("x-admin-token", ADMIN))
            .to_request();
        let dashboard: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(dashboard["data"]["homestays"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/admin/homestays/{}", id))
            .insert_header(("x-admin-token", ADMIN))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::delete()
            .uri(&format!("/admin/homestays/{}", id))
            .insert_header(("x-admin-token", ADMIN))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
