use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rento_booking::{Actor, BookingOrchestrator, CreateBookingRequest, Repositories};
use rento_catalog::PricingEngine;
use rento_core::booking::{BookingStatus, DeliveryMethod, PartyRole, ProtectionPlan};
use rento_core::events::EventSink;
use rento_core::ledger::{
    LedgerEntry, LedgerUpdate, NewLedgerEntry, TransactionStatus, TransactionType,
};
use rento_core::listing::{Listing, ListingStatus, Profile, RateCard};
use rento_core::payment::{
    CancelResult, CaptureResult, GatewayError, PaymentGateway, PreAuthRequest, PreAuthResult,
    RefundResult, TransactionCheck,
};
use rento_core::repository::{BookingRepository, LedgerRepository};
use rento_core::CoreError;
use rento_gateway::signing::{callback_signing_string, sign, verify_callback};
use rento_shared::{BookingTransitionedEvent, Masked, PaymentOperation, PaymentReconciliationEvent};
use rento_store::MemoryStore;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const API_KEY: &str = "callback-key";

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Succeed,
    Fail,
    Hang,
}

/// Gateway double that records every call and behaves as scripted.
struct ScriptedGateway {
    mode: Mode,
    calls: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl ScriptedGateway {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, call: String) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(call);
        match self.mode {
            Mode::Succeed => Ok(()),
            Mode::Fail => Err(GatewayError::Http {
                status: 503,
                body: "unavailable".into(),
            }),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn create_pre_auth(&self, request: &PreAuthRequest) -> Result<PreAuthResult, GatewayError> {
        self.run(format!("pre_auth:{}", request.amount)).await?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(PreAuthResult {
            external_transaction_id: format!("RNT{}", n),
            checkout_reference: format!("https://checkout.test/RNT{}", n),
        })
    }

    async fn capture_with_payout(&self, external_id: &str) -> Result<CaptureResult, GatewayError> {
        self.run(format!("capture:{}", external_id)).await?;
        Ok(CaptureResult {
            grand_total: Decimal::new(1120, 2),
            gateway_status: "COMPLETED".into(),
        })
    }

    async fn cancel_pre_auth(&self, external_id: &str) -> Result<CancelResult, GatewayError> {
        self.run(format!("cancel:{}", external_id)).await?;
        Ok(CancelResult {
            gateway_status: "CANCELLED".into(),
        })
    }

    async fn refund_payment(&self, external_id: &str) -> Result<RefundResult, GatewayError> {
        self.run(format!("refund:{}", external_id)).await?;
        Ok(RefundResult {
            total_refunded: Decimal::new(1120, 2),
            gateway_status: "REFUNDED".into(),
        })
    }

    async fn check_transaction(&self, external_id: &str) -> Result<TransactionCheck, GatewayError> {
        self.run(format!("check:{}", external_id)).await?;
        Ok(TransactionCheck {
            payment_status: "APPROVED".into(),
            amount: Decimal::new(1120, 2),
            currency: "USD".into(),
        })
    }

    fn verify_callback_signature(&self, payload: &Map<String, Value>) -> bool {
        verify_callback(API_KEY, payload)
    }
}

#[derive(Default)]
struct RecordingSink {
    reconciliations: Mutex<Vec<PaymentReconciliationEvent>>,
    transitions: Mutex<Vec<BookingTransitionedEvent>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn reconciliation_required(&self, event: &PaymentReconciliationEvent) {
        self.reconciliations.lock().unwrap().push(event.clone());
    }

    async fn booking_transitioned(&self, event: &BookingTransitionedEvent) {
        self.transitions.lock().unwrap().push(event.clone());
    }
}

/// Ledger whose hold lookup is down; everything else reaches the store.
struct FlakyLedger {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl LedgerRepository for FlakyLedger {
    async fn insert_entry(&self, entry: &NewLedgerEntry) -> Result<LedgerEntry, CoreError> {
        self.inner.insert_entry(entry).await
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, CoreError> {
        self.inner.find_entry(id).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<LedgerEntry>, CoreError> {
        self.inner.find_by_external_id(external_id).await
    }

    async fn latest_pre_auth(&self, _booking_id: Uuid) -> Result<Option<LedgerEntry>, CoreError> {
        Err(CoreError::Database("connection reset".into()))
    }

    async fn update_by_external_id(
        &self,
        external_id: &str,
        update: &LedgerUpdate,
    ) -> Result<Option<LedgerEntry>, CoreError> {
        self.inner.update_by_external_id(external_id, update).await
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    gateway: Arc<ScriptedGateway>,
    sink: Arc<RecordingSink>,
    orchestrator: BookingOrchestrator,
    listing_id: Uuid,
    owner: Uuid,
    renter: Uuid,
}

async fn harness(mode: Mode) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let owner = Uuid::new_v4();
    let renter = Uuid::new_v4();
    let listing_id = Uuid::new_v4();

    store
        .put_profile(Profile {
            id: owner,
            display_name: Some("Owner Person".into()),
            email: None,
            phone: None,
            payway_beneficiary_id: Some(Masked::new("BEN-1".into())),
        })
        .await;
    store
        .put_profile(Profile {
            id: renter,
            display_name: Some("Dara Sok".into()),
            email: Some(Masked::new("dara@example.com".into())),
            phone: Some(Masked::new("012345678".into())),
            payway_beneficiary_id: None,
        })
        .await;
    store
        .put_listing(Listing {
            id: listing_id,
            owner_id: owner,
            title: "Canon R5".into(),
            status: ListingStatus::Active,
            rate_card: RateCard {
                price_hourly: None,
                price_daily: 1000,
                price_weekly: None,
                deposit_amount: 0,
                delivery_fee: 300,
                currency: "USD".into(),
            },
            delivery_available: false,
            deleted_at: None,
        })
        .await;

    let gateway = ScriptedGateway::new(mode);
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = BookingOrchestrator::new(
        Repositories::shared(store.clone()),
        gateway.clone(),
        sink.clone(),
        PricingEngine::default(),
    )
    .with_gateway_timeout(Duration::from_millis(100));

    Harness {
        store,
        gateway,
        sink,
        orchestrator,
        listing_id,
        owner,
        renter,
    }
}

fn one_day(listing_id: Uuid, offset_days: i64) -> CreateBookingRequest {
    let start = Utc::now() + ChronoDuration::days(offset_days);
    CreateBookingRequest {
        listing_id,
        start_time: start,
        end_time: start + ChronoDuration::hours(24),
        delivery_method: DeliveryMethod::Pickup,
        delivery_address: None,
        protection_plan: ProtectionPlan::None,
    }
}

fn signed_callback(tran_id: &str, status: &str) -> Map<String, Value> {
    let mut payload = json!({"tran_id": tran_id, "status": status, "apv": "123456"})
        .as_object()
        .cloned()
        .unwrap();
    let hash = sign(API_KEY, &callback_signing_string(&payload));
    payload.insert("hash".into(), Value::String(hash));
    payload
}

#[tokio::test]
async fn test_create_prices_and_opens_hold() {
    let h = harness(Mode::Succeed).await;

    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let booking = &created.booking;

    assert_eq!(booking.status, BookingStatus::Requested);
    assert!(!booking.payment_authorized);
    assert_eq!(booking.subtotal, 1000);
    assert_eq!(booking.service_fee, 120);
    assert_eq!(booking.total_renter_pays, 1120);
    assert_eq!(booking.owner_payout, 940);
    assert_eq!(booking.owner_id, h.owner);
    assert_eq!(created.checkout_url, "https://checkout.test/RNT0");

    let entries = h.store.entries_for_booking(booking.id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, TransactionType::PreAuth);
    assert_eq!(entries[0].status, TransactionStatus::Pending);
    assert_eq!(entries[0].amount, 1120);
    assert_eq!(entries[0].external_id.as_deref(), Some("RNT0"));
    assert_eq!(h.gateway.calls(), vec!["pre_auth:1120"]);
}

#[tokio::test]
async fn test_delivery_fee_only_when_listing_delivers() {
    let h = harness(Mode::Succeed).await;
    let mut req = one_day(h.listing_id, 1);
    req.delivery_method = DeliveryMethod::Delivery;

    let created = h.orchestrator.create(h.renter, req).await.unwrap();
    assert_eq!(created.booking.delivery_fee, 0);
    assert_eq!(created.booking.delivery_method, DeliveryMethod::Delivery);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let h = harness(Mode::Succeed).await;

    let mut inverted = one_day(h.listing_id, 1);
    inverted.end_time = inverted.start_time;
    assert!(matches!(
        h.orchestrator.create(h.renter, inverted).await,
        Err(CoreError::Validation(_))
    ));

    assert!(matches!(
        h.orchestrator.create(h.renter, one_day(Uuid::new_v4(), 1)).await,
        Err(CoreError::NotFound(_))
    ));

    assert!(matches!(
        h.orchestrator.create(h.owner, one_day(h.listing_id, 1)).await,
        Err(CoreError::Validation(_))
    ));
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_overlapping_create_conflicts() {
    let h = harness(Mode::Succeed).await;
    h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    let mut overlapping = one_day(h.listing_id, 1);
    overlapping.start_time = overlapping.start_time + ChronoDuration::hours(6);
    overlapping.end_time = overlapping.end_time + ChronoDuration::hours(6);

    let other_renter = Uuid::new_v4();
    assert!(matches!(
        h.orchestrator.create(other_renter, overlapping).await,
        Err(CoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_gateway_failure_on_create_keeps_booking() {
    let h = harness(Mode::Fail).await;

    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    assert_eq!(created.checkout_url, "");
    assert!(h.store.find_booking(created.booking.id).await.unwrap().is_some());
    assert!(h.store.entries_for_booking(created.booking.id).await.is_empty());

    let events = h.sink.reconciliations.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, PaymentOperation::PreAuth);
    assert_eq!(events[0].booking_id, created.booking.id);
}

#[tokio::test]
async fn test_approve_captures_and_completes_ledger() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    let approved = h.orchestrator.approve(created.booking.id, h.owner).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Approved);
    assert!(approved.approved_at.is_some());

    let entry = h.store.latest_pre_auth(created.booking.id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Completed);
    assert_eq!(entry.gateway_status.as_deref(), Some("COMPLETED"));
    assert!(entry.processed_at.is_some());
    assert!(h.gateway.calls().contains(&"capture:RNT0".to_string()));

    let transitions = h.sink.transitions.lock().unwrap().clone();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].from, "requested");
    assert_eq!(transitions[0].to, "approved");
    assert_eq!(transitions[0].actor_id, Some(h.owner));
}

#[tokio::test]
async fn test_renter_cannot_approve() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    assert!(matches!(
        h.orchestrator.approve(created.booking.id, h.renter).await,
        Err(CoreError::Forbidden(_))
    ));
    let booking = h.store.find_booking(created.booking.id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Requested);
    assert!(!h.gateway.calls().iter().any(|c| c.starts_with("capture")));
}

#[tokio::test]
async fn test_capture_failure_does_not_block_approval() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    // Same store, gateway now down
    let failing = ScriptedGateway::new(Mode::Fail);
    let orchestrator = BookingOrchestrator::new(
        Repositories::shared(h.store.clone()),
        failing.clone(),
        h.sink.clone(),
        PricingEngine::default(),
    );

    let approved = orchestrator.approve(created.booking.id, h.owner).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Approved);

    let entry = h.store.latest_pre_auth(created.booking.id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Pending);

    let events = h.sink.reconciliations.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, PaymentOperation::Capture);
    assert_eq!(events[0].external_id.as_deref(), Some("RNT0"));
}

#[tokio::test]
async fn test_ledger_read_failure_leaves_booking_untouched() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let id = created.booking.id;

    let mut repos = Repositories::shared(h.store.clone());
    repos.ledger = Arc::new(FlakyLedger {
        inner: h.store.clone(),
    });
    let orchestrator = BookingOrchestrator::new(
        repos,
        h.gateway.clone(),
        h.sink.clone(),
        PricingEngine::default(),
    );

    assert!(matches!(
        orchestrator.approve(id, h.owner).await,
        Err(CoreError::Database(_))
    ));
    assert!(matches!(
        orchestrator.decline(id, h.owner).await,
        Err(CoreError::Database(_))
    ));
    assert!(matches!(
        orchestrator.cancel(id, h.renter, None).await,
        Err(CoreError::Database(_))
    ));

    let booking = h.store.find_booking(id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Requested);
    assert_eq!(h.gateway.calls(), vec!["pre_auth:1120"]);
    assert!(h.sink.reconciliations.lock().unwrap().is_empty());
    assert!(h.sink.transitions.lock().unwrap().is_empty());

    // Ledger back: the same approval goes through and captures
    let approved = h.orchestrator.approve(id, h.owner).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Approved);
    let entry = h.store.latest_pre_auth(id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Completed);
    assert!(h.gateway.calls().contains(&"capture:RNT0".to_string()));
}

#[tokio::test]
async fn test_gateway_timeout_is_swallowed() {
    let h = harness(Mode::Hang).await;

    let started = std::time::Instant::now();
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(created.checkout_url, "");

    let events = h.sink.reconciliations.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert!(events[0].reason.contains("timed out"));
}

#[tokio::test]
async fn test_decline_releases_hold() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    let declined = h.orchestrator.decline(created.booking.id, h.owner).await.unwrap();
    assert_eq!(declined.status, BookingStatus::Declined);
    assert!(declined.declined_at.is_some());

    let entry = h.store.latest_pre_auth(created.booking.id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Cancelled);
    assert!(h.gateway.calls().contains(&"cancel:RNT0".to_string()));
}

#[tokio::test]
async fn test_cancel_requested_releases_hold() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    let cancelled = h
        .orchestrator
        .cancel(created.booking.id, h.renter, Some("plans changed".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(h.renter));
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("plans changed"));

    let entry = h.store.latest_pre_auth(created.booking.id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_active_refunds() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let id = created.booking.id;

    h.orchestrator.approve(id, h.owner).await.unwrap();
    h.orchestrator.activate(id, Actor::User(h.owner)).await.unwrap();
    let cancelled = h.orchestrator.cancel(id, h.owner, None).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let entry = h.store.latest_pre_auth(id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Refunded);
    let calls = h.gateway.calls();
    assert!(calls.contains(&"refund:RNT0".to_string()));
    assert!(!calls.contains(&"cancel:RNT0".to_string()));
}

#[tokio::test]
async fn test_stranger_cannot_cancel() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    assert!(matches!(
        h.orchestrator.cancel(created.booking.id, Uuid::new_v4(), None).await,
        Err(CoreError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_activate_and_complete() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let id = created.booking.id;

    assert!(matches!(
        h.orchestrator.activate(id, Actor::User(h.owner)).await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        h.orchestrator.complete(id).await,
        Err(CoreError::InvalidTransition { .. })
    ));

    h.orchestrator.approve(id, h.owner).await.unwrap();
    let active = h.orchestrator.activate(id, Actor::User(h.owner)).await.unwrap();
    assert_eq!(active.status, BookingStatus::Active);
    assert!(active.started_at.is_some());

    let calls_before = h.gateway.calls().len();
    let completed = h.orchestrator.complete(id).await.unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(h.gateway.calls().len(), calls_before);

    // Terminal
    assert!(matches!(
        h.orchestrator.cancel(id, h.renter, None).await,
        Err(CoreError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_only_parties_can_activate() {
    let h = harness(Mode::Succeed).await;
    let first = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let second = h.orchestrator.create(h.renter, one_day(h.listing_id, 5)).await.unwrap();
    h.orchestrator.approve(first.booking.id, h.owner).await.unwrap();
    h.orchestrator.approve(second.booking.id, h.owner).await.unwrap();

    assert!(matches!(
        h.orchestrator.activate(first.booking.id, Actor::User(Uuid::new_v4())).await,
        Err(CoreError::Forbidden(_))
    ));
    let booking = h.store.find_booking(first.booking.id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Approved);

    let by_renter = h
        .orchestrator
        .activate(first.booking.id, Actor::User(h.renter))
        .await
        .unwrap();
    assert_eq!(by_renter.status, BookingStatus::Active);

    let by_system = h.orchestrator.activate(second.booking.id, Actor::System).await.unwrap();
    assert_eq!(by_system.status, BookingStatus::Active);
}

#[tokio::test]
async fn test_settlement_uses_latest_pre_auth() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    // Re-authorization after the first hold lapsed
    h.store
        .insert_entry(&NewLedgerEntry {
            booking_id: created.booking.id,
            kind: TransactionType::PreAuth,
            status: TransactionStatus::Pending,
            amount: 1120,
            currency: "USD".into(),
            external_id: Some("RNT-reauth".into()),
        })
        .await
        .unwrap();

    h.orchestrator.approve(created.booking.id, h.owner).await.unwrap();
    let calls = h.gateway.calls();
    assert!(calls.contains(&"capture:RNT-reauth".to_string()));
    assert!(!calls.contains(&"capture:RNT0".to_string()));
}

#[tokio::test]
async fn test_callback_authorizes_payment() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    let entry = h
        .orchestrator
        .handle_callback(&signed_callback("RNT0", "APPROVED"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, TransactionStatus::Authorized);
    assert_eq!(entry.gateway_status.as_deref(), Some("APPROVED"));
    assert_eq!(entry.metadata["payway_callback"]["apv"], "123456");

    let booking = h.store.find_booking(created.booking.id).await.unwrap().unwrap();
    assert!(booking.payment_authorized);
}

#[tokio::test]
async fn test_callback_failure_status_marks_failed() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    let entry = h
        .orchestrator
        .handle_callback(&signed_callback("RNT0", "DECLINED"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, TransactionStatus::Failed);

    let booking = h.store.find_booking(created.booking.id).await.unwrap().unwrap();
    assert!(!booking.payment_authorized);
}

#[tokio::test]
async fn test_callback_rejects_forged_hash() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();

    let mut forged = signed_callback("RNT0", "DECLINED");
    forged.insert("status".into(), json!("APPROVED"));

    match h.orchestrator.handle_callback(&forged).await {
        Err(CoreError::Validation(msg)) => assert_eq!(msg, "Invalid hash"),
        other => panic!("expected validation error, got {:?}", other),
    }
    let entry = h.store.latest_pre_auth(created.booking.id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_callback_for_unknown_transaction_is_ignored() {
    let h = harness(Mode::Succeed).await;
    let result = h
        .orchestrator
        .handle_callback(&signed_callback("RNT-unknown", "APPROVED"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_get_and_list_respect_parties() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let id = created.booking.id;

    assert_eq!(h.orchestrator.get(id, h.renter).await.unwrap().id, id);
    assert_eq!(h.orchestrator.get(id, h.owner).await.unwrap().id, id);
    assert!(matches!(
        h.orchestrator.get(id, Uuid::new_v4()).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        h.orchestrator.get(Uuid::new_v4(), h.renter).await,
        Err(CoreError::NotFound(_))
    ));

    assert_eq!(h.orchestrator.list_for_user(h.renter, None).await.unwrap().len(), 1);
    assert_eq!(
        h.orchestrator
            .list_for_user(h.renter, Some(PartyRole::Owner))
            .await
            .unwrap()
            .len(),
        0
    );
}

#[tokio::test]
async fn test_payment_status_and_refund() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let entry_id = h.store.entries_for_booking(created.booking.id).await[0].id;

    let check = h.orchestrator.payment_status(entry_id, h.renter).await.unwrap();
    assert_eq!(check.payment_status, "APPROVED");
    assert!(matches!(
        h.orchestrator.payment_status(entry_id, Uuid::new_v4()).await,
        Err(CoreError::Forbidden(_))
    ));

    // Still pending: nothing to refund yet
    assert!(matches!(
        h.orchestrator.refund(entry_id, h.owner).await,
        Err(CoreError::Validation(_))
    ));

    h.orchestrator.approve(created.booking.id, h.owner).await.unwrap();
    assert!(matches!(
        h.orchestrator.refund(entry_id, h.renter).await,
        Err(CoreError::Forbidden(_))
    ));

    let refund = h.orchestrator.refund(entry_id, h.owner).await.unwrap();
    assert_eq!(refund.gateway_status, "REFUNDED");
    let entry = h.store.find_entry(entry_id).await.unwrap().unwrap();
    assert_eq!(entry.status, TransactionStatus::Refunded);
}

#[tokio::test]
async fn test_direct_payment_calls_propagate_gateway_errors() {
    let h = harness(Mode::Succeed).await;
    let created = h.orchestrator.create(h.renter, one_day(h.listing_id, 1)).await.unwrap();
    let entry_id = h.store.entries_for_booking(created.booking.id).await[0].id;

    let orchestrator = BookingOrchestrator::new(
        Repositories::shared(h.store.clone()),
        ScriptedGateway::new(Mode::Fail),
        h.sink.clone(),
        PricingEngine::default(),
    );
    assert!(matches!(
        orchestrator.payment_status(entry_id, h.renter).await,
        Err(CoreError::ExternalService(_))
    ));
    assert!(matches!(
        orchestrator.payment_status(Uuid::new_v4(), h.renter).await,
        Err(CoreError::NotFound(_))
    ));
}
