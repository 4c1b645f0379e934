//! # Services Module
//!
//! This module contains the core business logic services for the
//! homestay backend. Each service handles a specific domain.
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `AvailabilityEngine` | Booked and free beds, availability calendars |
//! | `BookingService` | Staging, pricing and confirming bookings |
//! | `PaymentService` | Gateway orders, webhook reconciliation, UPI |
//! | `CashfreeGateway` | HTTP client for the payment gateway |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SERVICES LAYER                            │
//! │                                                                  │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐    │
//! │  │      BookingService      │   │      PaymentService      │    │
//! │  │  • stage()  • confirm()  │   │  • create_order()        │    │
//! │  │  • list_for_requester()  │   │  • receive_webhook()     │    │
//! │  └────────────┬─────────────┘   └────────────┬─────────────┘    │
//! │               ▼                              ▼                  │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐    │
//! │  │    AvailabilityEngine    │   │      PaymentGateway      │    │
//! │  │  overlap + bed counting  │   │   (Cashfree over HTTP)   │    │
//! │  └──────────────────────────┘   └──────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod availability;
pub mod booking;
pub mod gateway;
pub mod payments;

pub use availability::AvailabilityEngine;
pub use booking::{BookingError, BookingService, StagedBooking};
pub use gateway::{CashfreeGateway, GatewayError, PaymentGateway};
pub use payments::{PaymentError, PaymentService, WebhookAck};
