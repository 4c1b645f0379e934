//! # API Route Configuration
//!
//! This module sets up all the HTTP routes for the API.

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::web;

use super::handlers;

/// Configure all API routes.
///
/// This function is called from main.rs to set up
/// all the endpoint routes.
///
/// ## Route Structure
///
/// ```text
/// /
/// ├── /health                         GET - Health check
/// ├── /homestays                      GET - List homestays
/// │   ├── /{id}                       GET - Detail + 30-day calendar
/// │   ├── /{id}/availability          GET - Calendar (?from&days)
/// │   └── /{id}/beds                  GET - Free beds (?from&till)
/// ├── /bookings                       GET - My bookings (?email|phone|name)
/// │   ├── /stage                      POST - Validate and price
/// │   ├── /confirm                    POST - Persist staged booking
/// │   └── /{id}                       GET - Receipt
/// ├── /payments
/// │   ├── /create-order               POST - Open gateway order
/// │   ├── /cashfree-webhook           POST - Gateway webhook
/// │   └── /{order_id}                 GET - Payment status
/// ├── /pay/{payment_id}               GET - UPI link
/// ├── /confirm/{booking_id}           POST - Record UTR
/// └── /admin                          (x-admin-token)
///     ├── /dashboard                  GET
///     └── /homestays                  POST
///         └── /{id}                   PUT, DELETE
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Extractor failures use the JSON error envelope
        .app_data(
            web::JsonConfig::default()
                .error_handler(handlers::invalid_request::<JsonPayloadError>),
        )
        .app_data(
            web::QueryConfig::default()
                .error_handler(handlers::invalid_request::<QueryPayloadError>),
        )
        .app_data(
            web::PathConfig::default()
                .error_handler(handlers::invalid_request::<PathError>),
        )

        // Root endpoint - API information
        .route("/", web::get().to(handlers::api_info))

        // Health check endpoint
        .route("/health", web::get().to(handlers::health_check))

        // Homestay browsing
        .service(
            web::scope("/homestays")
                .route("", web::get().to(handlers::list_homestays))
                .route("/{id}", web::get().to(handlers::get_homestay))
                .route(
                    "/{id}/availability",
                    web::get().to(handlers::homestay_availability),
                )
                .route("/{id}/beds", web::get().to(handlers::available_beds))
        )

        // Booking flow
        .service(
            web::scope("/bookings")
                .route("", web::get().to(handlers::my_bookings))
                .route("/stage", web::post().to(handlers::stage_booking))
                .route("/confirm", web::post().to(handlers::confirm_booking))
                .route("/{id}", web::get().to(handlers::get_booking))
        )

        // Gateway payments
        .service(
            web::scope("/payments")
                .route("/create-order", web::post().to(handlers::create_order))
                .route("/cashfree-webhook", web::post().to(handlers::cashfree_webhook))
                .route("/{order_id}", web::get().to(handlers::payment_status))
        )

        // Manual UPI path
        .route("/pay/{payment_id}", web::get().to(handlers::upi_link))
        .route("/confirm/{booking_id}", web::post().to(handlers::confirm_utr))

        // Admin panel
        .service(
            web::scope("/admin")
                .route("/dashboard", web::get().to(handlers::admin_dashboard))
                .route("/homestays", web::post().to(handlers::admin_create_homestay))
                .route("/homestays/{id}", web::put().to(handlers::admin_update_homestay))
                .route("/homestays/{id}", web::delete().to(handlers::admin_delete_homestay))
        );
}
