use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the rental lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Approved,
    Declined,
    AutoDeclined,
    Active,
    Completed,
    Cancelled,
    Disputed,
    Resolved,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 9] = [
        BookingStatus::Requested,
        BookingStatus::Approved,
        BookingStatus::Declined,
        BookingStatus::AutoDeclined,
        BookingStatus::Active,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Disputed,
        BookingStatus::Resolved,
    ];

    /// Statuses that keep the listing occupied for their interval.
    pub const BLOCKING: [BookingStatus; 3] = [
        BookingStatus::Requested,
        BookingStatus::Approved,
        BookingStatus::Active,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Approved => "approved",
            BookingStatus::Declined => "declined",
            BookingStatus::AutoDeclined => "auto_declined",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Disputed => "disputed",
            BookingStatus::Resolved => "resolved",
        }
    }

    pub fn is_blocking(&self) -> bool {
        Self::BLOCKING.contains(self)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown booking status '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    #[default]
    Pickup,
    Delivery,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::Delivery => "delivery",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(DeliveryMethod::Pickup),
            "delivery" => Ok(DeliveryMethod::Delivery),
            other => Err(format!("unknown delivery method '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionPlan {
    #[default]
    None,
    Basic,
    Premium,
}

impl ProtectionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionPlan::None => "none",
            ProtectionPlan::Basic => "basic",
            ProtectionPlan::Premium => "premium",
        }
    }
}

impl FromStr for ProtectionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ProtectionPlan::None),
            "basic" => Ok(ProtectionPlan::Basic),
            "premium" => Ok(ProtectionPlan::Premium),
            other => Err(format!("unknown protection plan '{}'", other)),
        }
    }
}

/// Which side of a booking a user is on, for filtered listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Renter,
    Owner,
}

/// One rental agreement between a renter and an owner for a listing.
///
/// Monetary fields are integer minor units copied in at creation time and
/// never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub subtotal: i64,
    pub service_fee: i64,
    pub delivery_fee: i64,
    pub protection_fee: i64,
    pub deposit_amount: i64,
    pub total_renter_pays: i64,
    pub owner_payout: i64,
    pub currency: String,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,
    pub protection_plan: ProtectionPlan,
    pub payment_authorized: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.renter_id == user_id || self.owner_id == user_id
    }

    /// `[start, end)` intersects the other interval.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// Materialize a stored row from an insert request.
    pub fn from_new(new: &NewBooking, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            listing_id: new.listing_id,
            renter_id: new.renter_id,
            owner_id: new.owner_id,
            start_time: new.start_time,
            end_time: new.end_time,
            status: BookingStatus::Requested,
            subtotal: new.subtotal,
            service_fee: new.service_fee,
            delivery_fee: new.delivery_fee,
            protection_fee: new.protection_fee,
            deposit_amount: new.deposit_amount,
            total_renter_pays: new.total_renter_pays,
            owner_payout: new.owner_payout,
            currency: new.currency.clone(),
            delivery_method: new.delivery_method,
            delivery_address: new.delivery_address.clone(),
            protection_plan: new.protection_plan,
            payment_authorized: false,
            approved_at: None,
            declined_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Insert payload for a booking in `requested` status.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub subtotal: i64,
    pub service_fee: i64,
    pub delivery_fee: i64,
    pub protection_fee: i64,
    pub deposit_amount: i64,
    pub total_renter_pays: i64,
    pub owner_payout: i64,
    pub currency: String,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,
    pub protection_plan: ProtectionPlan,
}

/// A validated status mutation. Stores apply it only while the booking is
/// still in `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub reason: Option<String>,
}

impl StatusChange {
    pub fn new(from: BookingStatus, to: BookingStatus) -> Self {
        Self {
            from,
            to,
            at: Utc::now(),
            actor_id: None,
            reason: None,
        }
    }

    pub fn cancelled_by(mut self, actor_id: Uuid, reason: Option<String>) -> Self {
        self.actor_id = Some(actor_id);
        self.reason = reason;
        self
    }

    /// Copy the change onto a booking, stamping the timestamp column that
    /// belongs to the target status.
    pub fn apply(&self, booking: &mut Booking) {
        booking.status = self.to;
        booking.updated_at = self.at;
        match self.to {
            BookingStatus::Approved => booking.approved_at = Some(self.at),
            BookingStatus::Declined | BookingStatus::AutoDeclined => {
                booking.declined_at = Some(self.at)
            }
            BookingStatus::Active => booking.started_at = Some(self.at),
            BookingStatus::Completed => booking.completed_at = Some(self.at),
            BookingStatus::Cancelled => {
                booking.cancelled_at = Some(self.at);
                booking.cancelled_by = self.actor_id;
                booking.cancellation_reason = self.reason.clone();
            }
            _ => {}
        }
    }
}
