use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rento_core::booking::{Booking, NewBooking, PartyRole, StatusChange};
use rento_core::ledger::{LedgerEntry, LedgerUpdate, NewLedgerEntry, TransactionType};
use rento_core::listing::{Listing, Profile};
use rento_core::repository::{
    BookingRepository, LedgerRepository, ListingRepository, ProfileRepository,
};
use rento_core::{CoreError, CoreResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    listings: HashMap<Uuid, Listing>,
    profiles: HashMap<Uuid, Profile>,
    bookings: HashMap<Uuid, Booking>,
    /// Insertion order doubles as creation order
    ledger: Vec<LedgerEntry>,
}

/// Process-local implementation of every repository, for development and tests.
///
/// All writes go through one lock, so the overlap check in `insert_booking`
/// and the status check in `apply_status_change` are atomic with their writes.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_listing(&self, listing: Listing) {
        self.tables.write().await.listings.insert(listing.id, listing);
    }

    pub async fn put_profile(&self, profile: Profile) {
        self.tables.write().await.profiles.insert(profile.id, profile);
    }

    /// Every ledger entry for a booking, oldest first
    pub async fn entries_for_booking(&self, booking_id: Uuid) -> Vec<LedgerEntry> {
        self.tables
            .read()
            .await
            .ledger
            .iter()
            .filter(|entry| entry.booking_id == booking_id)
            .cloned()
            .collect()
    }
}

fn overlapping_ids(
    bookings: &HashMap<Uuid, Booking>,
    listing_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Uuid> {
    bookings
        .values()
        .filter(|b| b.listing_id == listing_id && b.status.is_blocking() && b.overlaps(start, end))
        .map(|b| b.id)
        .collect()
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn find_bookable(&self, id: Uuid) -> CoreResult<Option<Listing>> {
        let tables = self.tables.read().await;
        Ok(tables.listings.get(&id).filter(|l| l.is_bookable()).cloned())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn find_profile(&self, id: Uuid) -> CoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn find_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid, role: Option<PartyRole>) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| match role {
                Some(PartyRole::Renter) => b.renter_id == user_id,
                Some(PartyRole::Owner) => b.owner_id == user_id,
                None => b.is_party(user_id),
            })
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn find_overlapping(
        &self,
        listing_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(overlapping_ids(&tables.bookings, listing_id, start, end))
    }

    async fn insert_booking(&self, booking: &NewBooking) -> CoreResult<Booking> {
        let mut tables = self.tables.write().await;
        if !overlapping_ids(&tables.bookings, booking.listing_id, booking.start_time, booking.end_time)
            .is_empty()
        {
            return Err(CoreError::Conflict(
                "Listing is not available for the selected dates".into(),
            ));
        }
        if tables.bookings.contains_key(&booking.id) {
            return Err(CoreError::Conflict("Booking already exists".into()));
        }

        let stored = Booking::from_new(booking, Utc::now());
        tables.bookings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn apply_status_change(&self, id: Uuid, change: &StatusChange) -> CoreResult<Booking> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Booking not found".into()))?;

        if booking.status != change.from {
            return Err(CoreError::Conflict(
                "Booking status changed concurrently, please retry".into(),
            ));
        }
        change.apply(booking);
        Ok(booking.clone())
    }

    async fn mark_payment_authorized(&self, id: Uuid) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(booking) = tables.bookings.get_mut(&id) {
            booking.payment_authorized = true;
            booking.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn insert_entry(&self, entry: &NewLedgerEntry) -> CoreResult<LedgerEntry> {
        let stored = LedgerEntry::from_new(entry, Utc::now());
        self.tables.write().await.ledger.push(stored.clone());
        Ok(stored)
    }

    async fn find_entry(&self, id: Uuid) -> CoreResult<Option<LedgerEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.ledger.iter().find(|e| e.id == id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> CoreResult<Option<LedgerEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .rev()
            .find(|e| e.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn latest_pre_auth(&self, booking_id: Uuid) -> CoreResult<Option<LedgerEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .rev()
            .find(|e| {
                e.booking_id == booking_id
                    && e.kind == TransactionType::PreAuth
                    && e.external_id.is_some()
            })
            .cloned())
    }

    async fn update_by_external_id(
        &self,
        external_id: &str,
        update: &LedgerUpdate,
    ) -> CoreResult<Option<LedgerEntry>> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut latest = None;
        for entry in tables
            .ledger
            .iter_mut()
            .filter(|e| e.external_id.as_deref() == Some(external_id))
        {
            update.apply(entry, now);
            latest = Some(entry.clone());
        }
        Ok(latest)
    }
}
