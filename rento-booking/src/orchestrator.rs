use chrono::{DateTime, Utc};
use rento_catalog::{PricingEngine, PricingInput};
use rento_core::booking::{
    Booking, BookingStatus, DeliveryMethod, NewBooking, PartyRole, ProtectionPlan, StatusChange,
};
use rento_core::events::EventSink;
use rento_core::ledger::{
    LedgerEntry, LedgerUpdate, NewLedgerEntry, TransactionStatus, TransactionType,
};
use rento_core::listing::Profile;
use rento_core::payment::{GatewayError, PaymentGateway, PreAuthRequest, RefundResult, TransactionCheck};
use rento_core::repository::{
    BookingRepository, LedgerRepository, ListingRepository, ProfileRepository,
};
use rento_core::{CoreError, CoreResult};
use rento_shared::{BookingTransitionedEvent, Masked, PaymentOperation, PaymentReconciliationEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::machine::{validate_transition, Actor};

/// Callback `status` value meaning the renter completed the hold
const CALLBACK_APPROVED: &str = "APPROVED";

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub listing_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub protection_plan: ProtectionPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedBooking {
    pub booking: Booking,
    /// Empty when the gateway could not open a hold
    pub checkout_url: String,
}

/// The persistence seams the orchestrator reads and writes through.
#[derive(Clone)]
pub struct Repositories {
    pub listings: Arc<dyn ListingRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
}

impl Repositories {
    /// All four seams backed by one store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ListingRepository + ProfileRepository + BookingRepository + LedgerRepository + 'static,
    {
        Self {
            listings: store.clone(),
            profiles: store.clone(),
            bookings: store.clone(),
            ledger: store,
        }
    }
}

/// What to do with an existing pre-authorization when a booking moves on
#[derive(Debug, Clone, Copy)]
enum Settlement {
    Capture,
    Release,
    Refund,
}

impl Settlement {
    fn operation(self) -> PaymentOperation {
        match self {
            Settlement::Capture => PaymentOperation::Capture,
            Settlement::Release => PaymentOperation::Cancel,
            Settlement::Refund => PaymentOperation::Refund,
        }
    }

    fn ledger_status(self) -> TransactionStatus {
        match self {
            Settlement::Capture => TransactionStatus::Completed,
            Settlement::Release => TransactionStatus::Cancelled,
            Settlement::Refund => TransactionStatus::Refunded,
        }
    }
}

/// Sequences booking state changes with their payment side effects.
///
/// Gateway failures during a state change are logged and published as
/// reconciliation events; they never undo or block the change itself.
pub struct BookingOrchestrator {
    repos: Repositories,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventSink>,
    pricing: PricingEngine,
    gateway_timeout: Duration,
}

impl BookingOrchestrator {
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventSink>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            repos,
            gateway,
            events,
            pricing,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub async fn create(&self, renter_id: Uuid, req: CreateBookingRequest) -> CoreResult<CreatedBooking> {
        if req.start_time >= req.end_time {
            return Err(CoreError::Validation("end_time must be after start_time".into()));
        }

        let listing = self
            .repos
            .listings
            .find_bookable(req.listing_id)
            .await?
            .ok_or_else(|| {
                warn!(listing_id = %req.listing_id, renter_id = %renter_id, "Booking failed - listing not found");
                CoreError::NotFound("Listing not found or not available".into())
            })?;

        if listing.owner_id == renter_id {
            return Err(CoreError::Validation("You cannot book your own listing".into()));
        }

        let conflicts = self
            .repos
            .bookings
            .find_overlapping(listing.id, req.start_time, req.end_time)
            .await?;
        if !conflicts.is_empty() {
            warn!(
                listing_id = %listing.id,
                renter_id = %renter_id,
                conflict_count = conflicts.len(),
                "Booking failed - date conflict"
            );
            return Err(CoreError::Conflict(
                "Listing is not available for the selected dates".into(),
            ));
        }

        let pricing = self.pricing.quote(&PricingInput::from_rate_card(
            req.start_time,
            req.end_time,
            &listing.rate_card,
            req.delivery_method,
            listing.delivery_available,
            req.protection_plan,
        ));

        let booking = self
            .repos
            .bookings
            .insert_booking(&NewBooking {
                id: Uuid::new_v4(),
                listing_id: listing.id,
                renter_id,
                owner_id: listing.owner_id,
                start_time: req.start_time,
                end_time: req.end_time,
                subtotal: pricing.subtotal,
                service_fee: pricing.service_fee,
                delivery_fee: pricing.delivery_fee,
                protection_fee: pricing.protection_fee,
                deposit_amount: pricing.deposit_amount,
                total_renter_pays: pricing.total_renter_pays,
                owner_payout: pricing.owner_payout,
                currency: listing.rate_card.currency.clone(),
                delivery_method: req.delivery_method,
                delivery_address: req.delivery_address,
                protection_plan: req.protection_plan,
            })
            .await?;

        let renter = self.profile_or_none(renter_id).await;
        let owner = self.profile_or_none(listing.owner_id).await;
        let checkout_url = self.open_pre_auth(&booking, &listing.title, renter, owner).await;

        info!(
            booking_id = %booking.id,
            listing_id = %booking.listing_id,
            renter_id = %renter_id,
            owner_id = %booking.owner_id,
            total = booking.total_renter_pays,
            currency = %booking.currency,
            has_checkout_url = !checkout_url.is_empty(),
            "Booking created"
        );

        Ok(CreatedBooking { booking, checkout_url })
    }

    pub async fn approve(&self, booking_id: Uuid, actor_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        let actor = Actor::User(actor_id);
        validate_transition(booking.status, BookingStatus::Approved, actor, &booking)?;
        let hold = self.repos.ledger.latest_pre_auth(booking.id).await?;

        let updated = self
            .commit(&booking, StatusChange::new(booking.status, BookingStatus::Approved), actor)
            .await?;
        self.settle(&booking, hold, Settlement::Capture).await;

        info!(booking_id = %booking_id, owner_id = %actor_id, total = booking.total_renter_pays, "Booking approved");
        Ok(updated)
    }

    pub async fn decline(&self, booking_id: Uuid, actor_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        let actor = Actor::User(actor_id);
        validate_transition(booking.status, BookingStatus::Declined, actor, &booking)?;
        let hold = self.repos.ledger.latest_pre_auth(booking.id).await?;

        let updated = self
            .commit(&booking, StatusChange::new(booking.status, BookingStatus::Declined), actor)
            .await?;
        self.settle(&booking, hold, Settlement::Release).await;

        info!(booking_id = %booking_id, owner_id = %actor_id, "Booking declined");
        Ok(updated)
    }

    pub async fn cancel(&self, booking_id: Uuid, actor_id: Uuid, reason: Option<String>) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        let actor = Actor::User(actor_id);
        validate_transition(booking.status, BookingStatus::Cancelled, actor, &booking)?;
        let hold = self.repos.ledger.latest_pre_auth(booking.id).await?;

        let change = StatusChange::new(booking.status, BookingStatus::Cancelled)
            .cancelled_by(actor_id, reason.clone());
        let updated = self.commit(&booking, change, actor).await?;

        // Funds were captured on approval once the rental is running
        let settlement = if booking.status == BookingStatus::Active {
            Settlement::Refund
        } else {
            Settlement::Release
        };
        self.settle(&booking, hold, settlement).await;

        info!(
            booking_id = %booking_id,
            cancelled_by = %actor_id,
            previous_status = %booking.status,
            reason = reason.as_deref().unwrap_or(""),
            "Booking cancelled"
        );
        Ok(updated)
    }

    /// Hand-over happened. Only an approved booking can start, and only one
    /// of its parties (or the system) can start it.
    pub async fn activate(&self, booking_id: Uuid, actor: Actor) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        if let Some(user_id) = actor.user_id() {
            if !booking.is_party(user_id) {
                warn!(booking_id = %booking_id, user_id = %user_id, "Activation refused - not a party");
                return Err(CoreError::Forbidden(
                    "Only the renter or the owner can activate this booking".into(),
                ));
            }
        }
        if booking.status != BookingStatus::Approved {
            return Err(CoreError::Validation("Can only activate approved bookings".into()));
        }

        let updated = self
            .commit(&booking, StatusChange::new(BookingStatus::Approved, BookingStatus::Active), actor)
            .await?;

        info!(booking_id = %booking_id, total = booking.total_renter_pays, "Booking activated");
        Ok(updated)
    }

    /// Return happened. Payment was captured at approval, so nothing is charged here.
    pub async fn complete(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        validate_transition(booking.status, BookingStatus::Completed, Actor::System, &booking)?;

        let updated = self
            .commit(
                &booking,
                StatusChange::new(booking.status, BookingStatus::Completed),
                Actor::System,
            )
            .await?;

        info!(
            booking_id = %booking_id,
            renter_id = %booking.renter_id,
            owner_id = %booking.owner_id,
            "Booking completed"
        );
        Ok(updated)
    }

    /// Reconcile a signed gateway callback. Returns the updated ledger entry,
    /// or `None` when the transaction id is not one of ours.
    pub async fn handle_callback(&self, payload: &Map<String, Value>) -> CoreResult<Option<LedgerEntry>> {
        if !self.gateway.verify_callback_signature(payload) {
            warn!("Rejected payment callback with invalid hash");
            return Err(CoreError::Validation("Invalid hash".into()));
        }

        let tran_id = payload
            .get("tran_id")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Validation("Missing tran_id".into()))?;
        let gateway_status = match payload.get("status") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let approved = gateway_status == CALLBACK_APPROVED;

        let Some(entry) = self.repos.ledger.find_by_external_id(tran_id).await? else {
            warn!(tran_id = %tran_id, "Payment callback for unknown transaction");
            return Ok(None);
        };

        let status = if approved {
            TransactionStatus::Authorized
        } else {
            TransactionStatus::Failed
        };
        let update = LedgerUpdate::from_callback(status, &gateway_status, Value::Object(payload.clone()));
        let updated = self.repos.ledger.update_by_external_id(tran_id, &update).await?;

        if approved {
            self.repos.bookings.mark_payment_authorized(entry.booking_id).await?;
        }

        info!(
            booking_id = %entry.booking_id,
            tran_id = %tran_id,
            status = %status,
            "Payment callback processed"
        );
        Ok(updated)
    }

    pub async fn get(&self, booking_id: Uuid, actor_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.is_party(actor_id) {
            return Err(CoreError::Forbidden("You can only view your own bookings".into()));
        }
        Ok(booking)
    }

    pub async fn list_for_user(&self, actor_id: Uuid, role: Option<PartyRole>) -> CoreResult<Vec<Booking>> {
        self.repos.bookings.list_for_user(actor_id, role).await
    }

    /// Live gateway status for one ledger entry. Gateway failures propagate.
    pub async fn payment_status(&self, entry_id: Uuid, actor_id: Uuid) -> CoreResult<TransactionCheck> {
        let (entry, booking) = self.load_entry(entry_id).await?;
        if !booking.is_party(actor_id) {
            return Err(CoreError::Forbidden(
                "You can only view payments for your own bookings".into(),
            ));
        }
        let external_id = entry
            .external_id
            .ok_or_else(|| CoreError::NotFound("Transaction not found".into()))?;

        Ok(self.guarded(self.gateway.check_transaction(&external_id)).await?)
    }

    /// Refund a captured charge on the owner's request. Gateway failures propagate.
    pub async fn refund(&self, entry_id: Uuid, actor_id: Uuid) -> CoreResult<RefundResult> {
        let (entry, booking) = self.load_entry(entry_id).await?;
        if booking.owner_id != actor_id {
            return Err(CoreError::Forbidden(
                "Only the listing owner can refund this payment".into(),
            ));
        }
        if entry.status != TransactionStatus::Completed {
            return Err(CoreError::Validation("Transaction cannot be refunded".into()));
        }
        let external_id = entry
            .external_id
            .ok_or_else(|| CoreError::NotFound("Transaction not found".into()))?;

        let result = self.guarded(self.gateway.refund_payment(&external_id)).await?;
        self.repos
            .ledger
            .update_by_external_id(
                &external_id,
                &LedgerUpdate::processed(TransactionStatus::Refunded, Some(result.gateway_status.clone())),
            )
            .await?;

        info!(booking_id = %booking.id, tran_id = %external_id, "Payment refunded on request");
        Ok(result)
    }

    async fn load(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.repos
            .bookings
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found".into()))
    }

    async fn load_entry(&self, entry_id: Uuid) -> CoreResult<(LedgerEntry, Booking)> {
        let entry = self
            .repos
            .ledger
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Transaction not found".into()))?;
        let booking = self.load(entry.booking_id).await?;
        Ok((entry, booking))
    }

    async fn profile_or_none(&self, user_id: Uuid) -> Option<Profile> {
        match self.repos.profiles.find_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user_id, "Profile lookup failed: {}", e);
                None
            }
        }
    }

    async fn commit(&self, booking: &Booking, change: StatusChange, actor: Actor) -> CoreResult<Booking> {
        let updated = self.repos.bookings.apply_status_change(booking.id, &change).await?;
        self.events
            .booking_transitioned(&BookingTransitionedEvent {
                booking_id: booking.id,
                from: change.from.to_string(),
                to: change.to.to_string(),
                actor_id: actor.user_id(),
                timestamp: change.at.timestamp(),
            })
            .await;
        Ok(updated)
    }

    /// Bound every gateway call by the configured timeout.
    async fn guarded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.gateway_timeout)),
        }
    }

    /// Log a swallowed payment failure and hand it to reconciliation.
    async fn reconcile_later(
        &self,
        booking_id: Uuid,
        operation: PaymentOperation,
        external_id: Option<String>,
        reason: String,
    ) {
        error!(
            booking_id = %booking_id,
            operation = %operation,
            external_id = external_id.as_deref().unwrap_or(""),
            "Payment {} failed: {}",
            operation,
            reason
        );
        self.events
            .reconciliation_required(&PaymentReconciliationEvent::new(
                booking_id,
                operation,
                external_id,
                reason,
            ))
            .await;
    }

    /// Open a hold for a freshly inserted booking. Returns the checkout
    /// reference, or an empty string when the gateway did not cooperate.
    async fn open_pre_auth(
        &self,
        booking: &Booking,
        listing_title: &str,
        renter: Option<Profile>,
        owner: Option<Profile>,
    ) -> String {
        let (first_name, last_name) = match &renter {
            Some(profile) => profile.split_name(),
            None => ("User".to_string(), "User".to_string()),
        };
        let renter_email = renter
            .as_ref()
            .and_then(|p| p.email.clone())
            .unwrap_or_else(|| Masked::new(String::new()));
        let renter_phone = renter
            .and_then(|p| p.phone)
            .unwrap_or_else(|| Masked::new(String::new()));
        let beneficiary = owner
            .and_then(|p| p.payway_beneficiary_id)
            .unwrap_or_else(|| Masked::new(String::new()));

        let request = PreAuthRequest {
            booking_id: booking.id,
            listing_title: listing_title.to_string(),
            renter_first_name: first_name,
            renter_last_name: last_name,
            renter_email,
            renter_phone,
            owner_id: booking.owner_id,
            owner_beneficiary_id: beneficiary,
            amount: booking.total_renter_pays,
            owner_payout: booking.owner_payout,
            currency: booking.currency.clone(),
        };

        let result = match self.guarded(self.gateway.create_pre_auth(&request)).await {
            Ok(result) => result,
            Err(e) => {
                self.reconcile_later(booking.id, PaymentOperation::PreAuth, None, e.to_string())
                    .await;
                return String::new();
            }
        };

        let entry = NewLedgerEntry {
            booking_id: booking.id,
            kind: TransactionType::PreAuth,
            status: TransactionStatus::Pending,
            amount: booking.total_renter_pays,
            currency: booking.currency.clone(),
            external_id: Some(result.external_transaction_id.clone()),
        };
        if let Err(e) = self.repos.ledger.insert_entry(&entry).await {
            self.reconcile_later(
                booking.id,
                PaymentOperation::PreAuth,
                Some(result.external_transaction_id),
                format!("hold opened but ledger insert failed: {}", e),
            )
            .await;
        } else {
            info!(
                booking_id = %booking.id,
                tran_id = %result.external_transaction_id,
                amount = booking.total_renter_pays,
                "Payment pre-auth initiated"
            );
        }

        result.checkout_reference
    }

    /// Capture, release or refund the hold read before the status change.
    /// Runs after the change is committed, so every failure is swallowed
    /// into a reconciliation event.
    async fn settle(&self, booking: &Booking, hold: Option<LedgerEntry>, settlement: Settlement) {
        let Some(external_id) = hold.and_then(|entry| entry.external_id) else {
            return;
        };

        let outcome = match settlement {
            Settlement::Capture => self
                .guarded(self.gateway.capture_with_payout(&external_id))
                .await
                .map(|r| r.gateway_status),
            Settlement::Release => self
                .guarded(self.gateway.cancel_pre_auth(&external_id))
                .await
                .map(|r| r.gateway_status),
            Settlement::Refund => self
                .guarded(self.gateway.refund_payment(&external_id))
                .await
                .map(|r| r.gateway_status),
        };

        let operation = settlement.operation();
        let gateway_status = match outcome {
            Ok(status) => status,
            Err(e) => {
                self.reconcile_later(booking.id, operation, Some(external_id), e.to_string())
                    .await;
                return;
            }
        };

        let update = LedgerUpdate::processed(settlement.ledger_status(), Some(gateway_status));
        if let Err(e) = self.repos.ledger.update_by_external_id(&external_id, &update).await {
            self.reconcile_later(
                booking.id,
                operation,
                Some(external_id),
                format!("gateway succeeded but ledger update failed: {}", e),
            )
            .await;
            return;
        }

        info!(booking_id = %booking.id, tran_id = %external_id, operation = %operation, "Payment settled");
    }
}
