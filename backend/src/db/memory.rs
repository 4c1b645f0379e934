//! # In-Memory Store
//!
//! Process-local implementation of the store traits. Selected with
//! `STORE_BACKEND=memory` for demos without PostgreSQL, and used by the
//! tests. Each table sits behind one async mutex, so the conditional
//! writes (`insert_within_capacity`, `settle_payment`) are atomic in the
//! same way the SQL statements are.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::*;
use super::store::{BookingStore, HealthProbe, HomestayStore, PaymentStore};
use super::DatabaseError;
use crate::services::availability::{available, booked_beds_in};

#[derive(Default)]
struct Tables {
    next_homestay_id: i64,
    homestays: Vec<HomestayRecord>,
    bookings: Vec<BookingRecord>,
    payments: HashMap<String, PaymentRecord>,
    confirmations: Vec<PaymentConfirmation>,
}

/// Store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the database were down.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a booking row as-is, bypassing all checks.
    #[cfg(test)]
    pub async fn seed_booking(&self, booking: BookingRecord) {
        self.tables.lock().await.bookings.push(booking);
    }

    fn check_available(&self) -> Result<(), DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DatabaseError::ConnectionError("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HomestayStore for MemoryStore {
    async fn get_homestay(&self, id: i64) -> Result<Option<HomestayRecord>, DatabaseError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables.homestays.iter().find(|h| h.id == id).cloned())
    }

    async fn list_homestays(&self) -> Result<Vec<HomestayRecord>, DatabaseError> {
        self.check_available()?;
        Ok(self.tables.lock().await.homestays.clone())
    }

    async fn create_homestay(&self, homestay: &NewHomestay) -> Result<HomestayRecord, DatabaseError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables.next_homestay_id += 1;
        let record = HomestayRecord {
            id: tables.next_homestay_id,
            owner: homestay.owner.clone(),
            rooms: homestay.rooms,
            beds: homestay.beds,
            floor: homestay.floor.clone(),
            description: homestay.description.clone(),
            price: homestay.price,
            contact: homestay.contact.clone(),
            image: homestay.image.clone(),
            created_at: Utc::now(),
        };
        tables.homestays.push(record.clone());
        Ok(record)
    }

    async fn update_homestay(
        &self,
        id: i64,
        update: &HomestayUpdate,
    ) -> Result<Option<HomestayRecord>, DatabaseError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        Ok(tables.homestays.iter_mut().find(|h| h.id == id).map(|record| {
            update.apply_to(record);
            record.clone()
        }))
    }

    async fn delete_homestay(&self, id: i64) -> Result<bool, DatabaseError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let before = tables.homestays.len();
        tables.homestays.retain(|h| h.id != id);
        let deleted = tables.homestays.len() != before;
        if deleted {
            // Mirrors ON DELETE CASCADE on bookings.homestay_id
            tables.bookings.retain(|b| b.homestay_id != id);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_committed(&self, homestay_id: i64) -> Result<Vec<BookingRecord>, DatabaseError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .filter(|b| b.homestay_id == homestay_id)
            .filter(|b| b.booking_status().map(|s| s.holds_beds()).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, DatabaseError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn find_for_requester(
        &self,
        key: &RequesterKey,
    ) -> Result<Vec<BookingRecord>, DatabaseError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut found: Vec<BookingRecord> = tables
            .bookings
            .iter()
            .filter(|b| match key {
                RequesterKey::Email(email) => b.user_email.as_deref() == Some(email.as_str()),
                RequesterKey::Phone(phone) => b.user_phone.as_deref() == Some(phone.as_str()),
                RequesterKey::Name(name) => b.user_name.as_deref() == Some(name.as_str()),
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.from_date.cmp(&b.from_date));
        Ok(found)
    }

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, DatabaseError> {
        self.check_available()?;
        let mut all = self.tables.lock().await.bookings.clone();
        all.sort_by(|a, b| b.from_date.cmp(&a.from_date));
        Ok(all)
    }

    async fn insert_within_capacity(
        &self,
        booking: &NewBooking,
    ) -> Result<CapacityInsert, DatabaseError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        let total_beds = match tables.homestays.iter().find(|h| h.id == booking.homestay_id) {
            Some(homestay) => homestay.total_beds(),
            None => {
                return Err(DatabaseError::NotFound(format!(
                    "Homestay not found: {}",
                    booking.homestay_id
                )))
            }
        };

        let existing: Vec<BookingRecord> = tables
            .bookings
            .iter()
            .filter(|b| b.homestay_id == booking.homestay_id)
            .cloned()
            .collect();
        let free = available(total_beds, booked_beds_in(&existing, &booking.stay));
        if booking.beds_booked > free {
            return Ok(CapacityInsert::Full { available: free, total: total_beds });
        }

        let record = booking.to_record(Uuid::new_v4(), Utc::now());
        tables.bookings.push(record.clone());
        Ok(CapacityInsert::Inserted(record))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_pending_payment(&self, order_id: &str, amount: i64) -> Result<(), DatabaseError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        tables
            .payments
            .entry(order_id.to_string())
            .and_modify(|p| {
                if p.amount.is_none() {
                    p.amount = Some(amount);
                }
            })
            .or_insert_with(|| PaymentRecord {
                order_id: order_id.to_string(),
                amount: Some(amount),
                status: PaymentStatus::Pending.as_str().to_string(),
                created_at: Some(now),
                updated_at: Some(now),
            });
        Ok(())
    }

    async fn find_payment(&self, order_id: &str) -> Result<Option<PaymentRecord>, DatabaseError> {
        self.check_available()?;
        Ok(self.tables.lock().await.payments.get(order_id).cloned())
    }

    async fn settle_payment(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<SettleOutcome, DatabaseError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        match tables.payments.get_mut(order_id) {
            Some(existing) => {
                let terminal = PaymentStatus::parse(&existing.status)
                    .map(|s| s.is_terminal())
                    .unwrap_or(false);
                if terminal {
                    return Ok(SettleOutcome::AlreadyTerminal);
                }
                existing.status = status.as_str().to_string();
                existing.updated_at = Some(now);
            }
            None => {
                tables.payments.insert(
                    order_id.to_string(),
                    PaymentRecord {
                        order_id: order_id.to_string(),
                        amount: None,
                        status: status.as_str().to_string(),
                        created_at: Some(now),
                        updated_at: Some(now),
                    },
                );
            }
        }
        Ok(SettleOutcome::Applied)
    }

    async fn record_utr(&self, booking_id: &str, utr: &str) -> Result<PaymentConfirmation, DatabaseError> {
        self.check_available()?;
        let confirmation = PaymentConfirmation {
            booking_id: booking_id.to_string(),
            utr: utr.to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.confirmations.push(confirmation.clone());
        Ok(confirmation)
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> bool {
        self.check_available().is_ok()
    }
}
