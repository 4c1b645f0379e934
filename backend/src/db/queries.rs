//! # Database Queries
//!
//! This module contains all the SQL queries for interacting with the database.
//! Each function performs a specific database operation.
//!
//! ## Query Organization
//!
//! Queries are grouped by the table they operate on:
//! - `homestay_*` - Homestay table operations
//! - `booking_*` - Booking table operations
//! - `payment_*` - Payment table operations
//! - `payment_confirmations` - UTR references
//!
//! ## Error Handling
//!
//! All queries return `Result<T, DatabaseError>`. Common errors:
//! - `NotFound` - Record doesn't exist
//! - `QueryError` - SQL execution failed

use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use tracing::{debug, info};

use super::models::*;
use super::DatabaseError;
use crate::services::availability::{available, booked_beds_in};
use crate::utils::format_stay_date;

const HOMESTAY_COLUMNS: &str =
    "id, owner, rooms, beds, floor, description, price, contact, image, created_at";

const BOOKING_COLUMNS: &str = r#"
    id, homestay_id, from_date, till_date, nights, beds_booked,
    total_amount, status, payment_reference,
    user_id, user_phone, user_email, user_name, created_at
"#;

// ============================================
// HELPER FUNCTIONS
// ============================================

/// Helper to convert a database row to HomestayRecord
fn row_to_homestay(row: &Row) -> HomestayRecord {
    HomestayRecord {
        id: row.get("id"),
        owner: row.get("owner"),
        rooms: row.get("rooms"),
        beds: row.get("beds"),
        floor: row.get("floor"),
        description: row.get("description"),
        price: row.get("price"),
        contact: row.get("contact"),
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}

/// Helper to convert a database row to BookingRecord
fn row_to_booking(row: &Row) -> BookingRecord {
    BookingRecord {
        id: row.get("id"),
        homestay_id: row.get("homestay_id"),
        from_date: row.get("from_date"),
        till_date: row.get("till_date"),
        nights: row.get("nights"),
        beds_booked: row.get("beds_booked"),
        total_amount: row.get("total_amount"),
        status: row.get("status"),
        payment_reference: row.get("payment_reference"),
        user_id: row.get("user_id"),
        user_phone: row.get("user_phone"),
        user_email: row.get("user_email"),
        user_name: row.get("user_name"),
        created_at: row.get("created_at"),
    }
}

/// Helper to convert a database row to PaymentRecord
fn row_to_payment(row: &Row) -> PaymentRecord {
    PaymentRecord {
        order_id: row.get("order_id"),
        amount: row.get("amount"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Trivial round trip used for connection checks and health probes.
pub async fn ping(pool: &Pool) -> Result<(), DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client.execute("SELECT 1", &[]).await?;
    Ok(())
}

// ============================================
// HOMESTAY QUERIES
// ============================================

/// Get a homestay by id.
pub async fn get_homestay(
    pool: &Pool,
    id: i64,
) -> Result<Option<HomestayRecord>, DatabaseError> {
    debug!("Fetching homestay: {}", id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client.query_opt(
        &format!("SELECT {} FROM homestays WHERE id = $1", HOMESTAY_COLUMNS),
        &[&id],
    ).await?;

    Ok(row.as_ref().map(row_to_homestay))
}

/// Get all homestays, oldest first.
pub async fn list_homestays(pool: &Pool) -> Result<Vec<HomestayRecord>, DatabaseError> {
    debug!("Fetching all homestays");

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!("SELECT {} FROM homestays ORDER BY id ASC", HOMESTAY_COLUMNS),
        &[],
    ).await?;

    Ok(rows.iter().map(row_to_homestay).collect())
}

/// Create a homestay.
pub async fn create_homestay(
    pool: &Pool,
    homestay: &NewHomestay,
) -> Result<HomestayRecord, DatabaseError> {
    info!("Creating homestay for owner: {}", homestay.owner);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client.query_one(
        &format!(
            r#"
            INSERT INTO homestays (owner, rooms, beds, floor, description, price, contact, image, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING {}
            "#,
            HOMESTAY_COLUMNS
        ),
        &[
            &homestay.owner,
            &homestay.rooms,
            &homestay.beds,
            &homestay.floor,
            &homestay.description,
            &homestay.price,
            &homestay.contact,
            &homestay.image,
        ],
    ).await?;

    Ok(row_to_homestay(&row))
}

/// Apply a partial update. Missing and blank values keep the stored ones.
pub async fn update_homestay(
    pool: &Pool,
    id: i64,
    update: &HomestayUpdate,
) -> Result<Option<HomestayRecord>, DatabaseError> {
    info!("Updating homestay: {}", id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client.query_opt(
        &format!(
            r#"
            UPDATE homestays SET
                owner = COALESCE(NULLIF($2::TEXT, ''), owner),
                rooms = COALESCE($3, rooms),
                beds = COALESCE($4, beds),
                floor = COALESCE(NULLIF($5::TEXT, ''), floor),
                description = COALESCE(NULLIF($6::TEXT, ''), description),
                price = COALESCE($7, price),
                contact = COALESCE(NULLIF($8::TEXT, ''), contact),
                image = COALESCE(NULLIF($9::TEXT, ''), image)
            WHERE id = $1
            RETURNING {}
            "#,
            HOMESTAY_COLUMNS
        ),
        &[
            &id,
            &update.owner,
            &update.rooms,
            &update.beds,
            &update.floor,
            &update.description,
            &update.price,
            &update.contact,
            &update.image,
        ],
    ).await?;

    Ok(row.as_ref().map(row_to_homestay))
}

/// Delete a homestay. Its bookings go with it.
pub async fn delete_homestay(pool: &Pool, id: i64) -> Result<bool, DatabaseError> {
    info!("Deleting homestay: {}", id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.execute("DELETE FROM homestays WHERE id = $1", &[&id]).await?;

    Ok(rows > 0)
}

// ============================================
// BOOKING QUERIES
// ============================================

/// Get the bookings of a homestay that hold beds.
pub async fn get_committed_bookings(
    pool: &Pool,
    homestay_id: i64,
) -> Result<Vec<BookingRecord>, DatabaseError> {
    debug!("Fetching committed bookings for homestay: {}", homestay_id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE homestay_id = $1
              AND LOWER(status) IN ('paid', 'confirmed')
            "#,
            BOOKING_COLUMNS
        ),
        &[&homestay_id],
    ).await?;

    Ok(rows.iter().map(row_to_booking).collect())
}

/// Get a booking by id.
pub async fn get_booking_by_id(
    pool: &Pool,
    id: Uuid,
) -> Result<Option<BookingRecord>, DatabaseError> {
    debug!("Fetching booking: {}", id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client.query_opt(
        &format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS),
        &[&id],
    ).await?;

    Ok(row.as_ref().map(row_to_booking))
}

/// Get a requester's bookings, earliest stay first.
pub async fn get_bookings_for_requester(
    pool: &Pool,
    key: &RequesterKey,
) -> Result<Vec<BookingRecord>, DatabaseError> {
    let (column, value) = match key {
        RequesterKey::Email(v) => ("user_email", v),
        RequesterKey::Phone(v) => ("user_phone", v),
        RequesterKey::Name(v) => ("user_name", v),
    };
    debug!("Fetching bookings by {}", column);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!(
            "SELECT {} FROM bookings WHERE {} = $1 ORDER BY from_date ASC",
            BOOKING_COLUMNS, column
        ),
        &[value],
    ).await?;

    Ok(rows.iter().map(row_to_booking).collect())
}

/// Get every booking, latest stay first.
pub async fn list_bookings(pool: &Pool) -> Result<Vec<BookingRecord>, DatabaseError> {
    debug!("Fetching all bookings");

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!("SELECT {} FROM bookings ORDER BY from_date DESC", BOOKING_COLUMNS),
        &[],
    ).await?;

    Ok(rows.iter().map(row_to_booking).collect())
}

/// Insert a booking if the homestay still has enough free beds.
///
/// ## Flow
///
/// ```text
/// BEGIN
///   SELECT beds FROM homestays WHERE id = $1 FOR UPDATE  -- serialize per homestay
///   SELECT committed bookings                            -- recount under the lock
///   free >= requested ? INSERT : return Full
/// COMMIT
/// ```
pub async fn insert_booking_within_capacity(
    pool: &Pool,
    booking: &NewBooking,
) -> Result<CapacityInsert, DatabaseError> {
    info!(
        "Inserting booking for homestay {} ({} beds, {} to {})",
        booking.homestay_id,
        booking.beds_booked,
        booking.stay.start(),
        booking.stay.end()
    );

    let mut client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let tx = client.transaction().await?;

    let locked = tx.query_opt(
        "SELECT beds FROM homestays WHERE id = $1 FOR UPDATE",
        &[&booking.homestay_id],
    ).await?;
    let total_beds = match locked {
        Some(row) => row.get::<_, i32>("beds").max(0) as u32,
        None => {
            return Err(DatabaseError::NotFound(format!(
                "Homestay not found: {}",
                booking.homestay_id
            )))
        }
    };

    let rows = tx.query(
        &format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE homestay_id = $1
              AND LOWER(status) IN ('paid', 'confirmed')
            "#,
            BOOKING_COLUMNS
        ),
        &[&booking.homestay_id],
    ).await?;
    let existing: Vec<BookingRecord> = rows.iter().map(row_to_booking).collect();

    let free = available(total_beds, booked_beds_in(&existing, &booking.stay));
    if booking.beds_booked > free {
        debug!("Homestay {} has only {} free beds, rolling back", booking.homestay_id, free);
        return Ok(CapacityInsert::Full { available: free, total: total_beds });
    }

    let row = tx.query_one(
        &format!(
            r#"
            INSERT INTO bookings (
                id, homestay_id, from_date, till_date, nights, beds_booked,
                total_amount, status, payment_reference,
                user_id, user_phone, user_email, user_name, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW())
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ),
        &[
            &Uuid::new_v4(),
            &booking.homestay_id,
            &format_stay_date(booking.stay.start()),
            &format_stay_date(booking.stay.end()),
            &(booking.stay.nights() as i32),
            &Some(booking.beds_booked as i32),
            &booking.total_amount,
            &booking.status.as_str(),
            &booking.payment_reference,
            &booking.user_id,
            &booking.user_phone,
            &booking.user_email,
            &booking.user_name,
        ],
    ).await?;

    tx.commit().await?;

    Ok(CapacityInsert::Inserted(row_to_booking(&row)))
}

// ============================================
// PAYMENT QUERIES
// ============================================

/// Record a gateway order as pending.
///
/// A webhook may already have created the row; its status is kept and
/// only a missing amount is filled in.
pub async fn insert_pending_payment(
    pool: &Pool,
    order_id: &str,
    amount: i64,
) -> Result<(), DatabaseError> {
    info!("Recording pending payment: {} ({})", order_id, amount);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client.execute(
        r#"
        INSERT INTO payments (order_id, amount, status, created_at, updated_at)
        VALUES ($1, $2, 'PENDING', NOW(), NOW())
        ON CONFLICT (order_id) DO UPDATE SET
            amount = COALESCE(payments.amount, EXCLUDED.amount)
        "#,
        &[&order_id, &amount],
    ).await?;

    Ok(())
}

/// Get a payment by order id.
pub async fn get_payment(
    pool: &Pool,
    order_id: &str,
) -> Result<Option<PaymentRecord>, DatabaseError> {
    debug!("Fetching payment: {}", order_id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client.query_opt(
        r#"
        SELECT order_id, amount, status, created_at, updated_at
        FROM payments
        WHERE order_id = $1
        "#,
        &[&order_id],
    ).await?;

    Ok(row.as_ref().map(row_to_payment))
}

/// Move a payment into a terminal status, once.
///
/// The `WHERE` on the conflict branch makes this a single conditional
/// write: a row that is already `SUCCESS` or `FAILED` is left untouched
/// and no row is reported as affected.
pub async fn settle_payment(
    pool: &Pool,
    order_id: &str,
    status: PaymentStatus,
) -> Result<SettleOutcome, DatabaseError> {
    info!("Settling payment {} as {}", order_id, status.as_str());

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let affected = client.execute(
        r#"
        INSERT INTO payments (order_id, status, created_at, updated_at)
        VALUES ($1, $2, NOW(), NOW())
        ON CONFLICT (order_id) DO UPDATE SET
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        WHERE payments.status NOT IN ('SUCCESS', 'FAILED')
        "#,
        &[&order_id, &status.as_str()],
    ).await?;

    if affected == 0 {
        Ok(SettleOutcome::AlreadyTerminal)
    } else {
        Ok(SettleOutcome::Applied)
    }
}

/// Store a UTR reference entered by a guest.
pub async fn create_payment_confirmation(
    pool: &Pool,
    booking_id: &str,
    utr: &str,
) -> Result<PaymentConfirmation, DatabaseError> {
    info!("Recording UTR for booking: {}", booking_id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client.query_one(
        r#"
        INSERT INTO payment_confirmations (booking_id, utr, created_at)
        VALUES ($1, $2, NOW())
        RETURNING booking_id, utr, created_at
        "#,
        &[&booking_id, &utr],
    ).await?;

    Ok(PaymentConfirmation {
        booking_id: row.get("booking_id"),
        utr: row.get("utr"),
        created_at: row.get("created_at"),
    })
}
