//! # REST API Module
//!
//! This module defines all HTTP endpoints for the homestay booking API.
//!
//! ## Endpoint Overview
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/homestays` | List homestays |
//! | GET | `/homestays/:id` | Homestay with 30-day calendar |
//! | GET | `/homestays/:id/availability` | Availability calendar |
//! | GET | `/homestays/:id/beds` | Free beds for a stay |
//! | POST | `/bookings/stage` | Validate and price a booking |
//! | POST | `/bookings/confirm` | Persist a staged booking |
//! | GET | `/bookings` | A requester's bookings |
//! | GET | `/bookings/:id` | Booking receipt |
//! | POST | `/payments/create-order` | Open a gateway order |
//! | POST | `/payments/cashfree-webhook` | Gateway webhook |
//! | GET | `/payments/:order_id` | Payment status |
//! | GET | `/pay/:payment_id` | UPI deep link |
//! | POST | `/confirm/:booking_id` | Record a UTR |
//! | GET | `/admin/dashboard` | Admin overview |
//! | POST/PUT/DELETE | `/admin/homestays[/:id]` | Manage homestays |
//! | GET | `/health` | Health check |
//!
//! ## Request/Response Format
//!
//! All requests and responses use JSON:
//!
//! ```json
//! // Success response
//! {
//!     "success": true,
//!     "data": { ... }
//! }
//!
//! // Error response
//! {
//!     "success": false,
//!     "error": {
//!         "code": "ERROR_CODE",
//!         "message": "Human readable message"
//!     }
//! }
//! ```

pub mod routes;
pub mod handlers;

pub use routes::configure_routes;
