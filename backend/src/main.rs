//! # Homestay Booking Backend Service
//!
//! This is the main entry point for the backend service of a homestay
//! booking site. It provides:
//!
//! - REST API for browsing homestays and their bed availability
//! - Booking staging and confirmation with capacity checks
//! - Payment gateway orders and signed webhook reconciliation
//! - Admin endpoints for managing homestays
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BACKEND SERVICE                           │
//! │                                                                  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                   REST API (Actix)                         │  │
//! │  │  /homestays   /bookings   /payments   /pay   /admin        │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                          │                                       │
//! │  ┌───────────────────────┴───────────────────────────────────┐  │
//! │  │                    SERVICE LAYER                           │  │
//! │  │  ┌──────────────┐ ┌──────────────┐ ┌──────────────────┐   │  │
//! │  │  │Availability  │ │BookingService│ │PaymentService    │   │  │
//! │  │  └──────────────┘ └──────────────┘ └──────────────────┘   │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                          │                       │               │
//! │  ┌───────────────────────┴─────────┐     ┌───────┴──────┐       │
//! │  │  Store traits                   │     │   Cashfree   │       │
//! │  │  PostgreSQL  |  in-memory       │     │   PG API     │       │
//! │  └─────────────────────────────────┘     └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! 1. Copy `.env.example` to `.env` and configure
//! 2. Either point `DATABASE_URL` at PostgreSQL (migrations run at
//!    startup) or set `STORE_BACKEND=memory`
//! 3. Start the server: `cargo run`
//!
//! ## Environment Variables
//!
//! See `.env.example` for all configuration.

use std::sync::Arc;
use actix_web::{web, App, HttpServer, middleware};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod config;
mod db;
mod models;
mod services;
mod utils;

use config::{AppConfig, StoreBackend};
use db::{BookingStore, Database, HealthProbe, HomestayStore, MemoryStore, PaymentStore};
use services::{AvailabilityEngine, BookingService, CashfreeGateway, PaymentGateway, PaymentService};

/// Application state shared across all handlers.
///
/// Services hold the store through trait objects, so the same state
/// works over PostgreSQL or the in-memory store.
///
/// ## Why Arc?
/// `Arc` (Atomic Reference Counting) allows us to share ownership
/// of these resources across multiple threads safely.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Homestay reads and admin writes
    pub homestays: Arc<dyn HomestayStore>,

    /// Store liveness for `/health`
    pub probe: Arc<dyn HealthProbe>,

    /// Bed counting and calendars
    pub availability: AvailabilityEngine,

    /// Booking staging and confirmation
    pub bookings: BookingService,

    /// Orders, webhooks and UPI
    pub payments: PaymentService,
}

impl AppState {
    /// Wire every service to one store and one gateway.
    pub fn build<S>(config: AppConfig, store: Arc<S>, gateway: Arc<dyn PaymentGateway>) -> Self
    where
        S: HomestayStore + BookingStore + PaymentStore + HealthProbe + 'static,
    {
        let homestays: Arc<dyn HomestayStore> = store.clone();
        let bookings: Arc<dyn BookingStore> = store.clone();
        let payments: Arc<dyn PaymentStore> = store.clone();
        let probe: Arc<dyn HealthProbe> = store;

        Self {
            availability: AvailabilityEngine::new(bookings.clone()),
            bookings: BookingService::new(
                homestays.clone(),
                bookings,
                config.price_per_bed_per_night,
            ),
            payments: PaymentService::new(payments, gateway, &config),
            homestays,
            probe,
            config,
        }
    }
}

/// Main entry point for the backend service.
///
/// This function:
/// 1. Initializes logging
/// 2. Loads configuration from environment
/// 3. Opens the store (PostgreSQL or in-memory)
/// 4. Builds the services
/// 5. Launches the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Initialize Logging
    // =========================================
    // RUST_LOG controls verbosity, e.g. RUST_LOG=homestay_backend=debug
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("🚀 Starting Homestay Booking Backend Service");

    // =========================================
    // STEP 2: Load Configuration
    // =========================================
    dotenvy::dotenv().ok(); // It's okay if .env doesn't exist

    let config = AppConfig::from_env()
        .expect("Failed to load configuration");

    info!("📋 Configuration loaded");
    info!("   Store backend: {:?}", config.store_backend);
    info!("   Price per bed per night: {}", utils::format_inr(config.price_per_bed_per_night.into()));
    if !config.gateway_configured() {
        warn!("   Payment gateway credentials missing; order creation and webhooks will be rejected");
    }
    if config.admin_token.is_none() {
        warn!("   ADMIN_TOKEN not set; admin endpoints are disabled");
    }

    // =========================================
    // STEP 3: Initialize Gateway Client
    // =========================================
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        CashfreeGateway::new(&config).expect("Failed to build payment gateway client"),
    );

    // =========================================
    // STEP 4: Initialize Store and Services
    // =========================================
    let app_state = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .clone()
                .expect("DATABASE_URL is required for the postgres backend");

            let db = Database::connect(&database_url, config.store_timeout)
                .await
                .expect("Failed to connect to database");

            info!("🗄️  Database connected");

            // Run migrations to ensure schema is up to date
            db.run_migrations()
                .await
                .expect("Failed to run migrations");

            info!("📦 Database migrations complete");

            AppState::build(config.clone(), Arc::new(db), gateway)
        }
        StoreBackend::Memory => {
            warn!("🧪 Using in-memory store; all data is lost on restart");
            AppState::build(config.clone(), Arc::new(MemoryStore::new()), gateway)
        }
    };
    let app_state = Arc::new(app_state);

    info!("🔧 Services initialized");

    // =========================================
    // STEP 5: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    info!("🌐 Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            // Attach shared application state
            .app_data(web::Data::new(app_state.clone()))

            // Add logging middleware
            .wrap(middleware::Logger::default())

            // Configure API routes
            .configure(api::configure_routes)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
