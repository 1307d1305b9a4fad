use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, NewBooking, PartyRole, StatusChange};
use crate::ledger::{LedgerEntry, LedgerUpdate, NewLedgerEntry};
use crate::listing::{Listing, Profile};
use crate::CoreResult;

/// Read access to listings
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Active, non-deleted listing by id
    async fn find_bookable(&self, id: Uuid) -> CoreResult<Option<Listing>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_profile(&self, id: Uuid) -> CoreResult<Option<Profile>>;
}

/// Booking persistence. Rows are never deleted.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Bookings where the user is renter or owner, newest first
    async fn list_for_user(&self, user_id: Uuid, role: Option<PartyRole>) -> CoreResult<Vec<Booking>>;

    /// Ids of blocking bookings on the listing whose interval intersects `[start, end)`
    async fn find_overlapping(
        &self,
        listing_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Uuid>>;

    /// Insert in `requested` status. Must fail with `CoreError::Conflict` when a
    /// blocking booking on the same listing overlaps, even under concurrent inserts.
    async fn insert_booking(&self, booking: &NewBooking) -> CoreResult<Booking>;

    /// Apply a status change only if the booking is still in `change.from`;
    /// otherwise `CoreError::Conflict`.
    async fn apply_status_change(&self, id: Uuid, change: &StatusChange) -> CoreResult<Booking>;

    async fn mark_payment_authorized(&self, id: Uuid) -> CoreResult<()>;
}

/// Append-mostly ledger of gateway operations
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn insert_entry(&self, entry: &NewLedgerEntry) -> CoreResult<LedgerEntry>;

    async fn find_entry(&self, id: Uuid) -> CoreResult<Option<LedgerEntry>>;

    async fn find_by_external_id(&self, external_id: &str) -> CoreResult<Option<LedgerEntry>>;

    /// Most recently created `pre_auth` entry carrying an external id
    async fn latest_pre_auth(&self, booking_id: Uuid) -> CoreResult<Option<LedgerEntry>>;

    async fn update_by_external_id(
        &self,
        external_id: &str,
        update: &LedgerUpdate,
    ) -> CoreResult<Option<LedgerEntry>>;
}
