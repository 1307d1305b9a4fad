use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rento_core::booking::{Booking, BookingStatus, NewBooking, PartyRole, StatusChange};
use rento_core::repository::BookingRepository;
use rento_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{map_sqlx_error, parse_column};

const BOOKING_COLUMNS: &str = r#"
    id, listing_id, renter_id, owner_id, start_time, end_time, status,
    subtotal, service_fee, delivery_fee, protection_fee, deposit_amount,
    total_renter_pays, owner_payout, currency, delivery_method, delivery_address,
    protection_plan, payment_authorized, approved_at, declined_at, cancelled_at,
    cancelled_by, cancellation_reason, started_at, completed_at, created_at, updated_at
"#;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    listing_id: Uuid,
    renter_id: Uuid,
    owner_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    subtotal: i64,
    service_fee: i64,
    delivery_fee: i64,
    protection_fee: i64,
    deposit_amount: i64,
    total_renter_pays: i64,
    owner_payout: i64,
    currency: String,
    delivery_method: String,
    delivery_address: Option<String>,
    protection_plan: String,
    payment_authorized: bool,
    approved_at: Option<DateTime<Utc>>,
    declined_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<Uuid>,
    cancellation_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            listing_id: row.listing_id,
            renter_id: row.renter_id,
            owner_id: row.owner_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status: parse_column("status", &row.status)?,
            subtotal: row.subtotal,
            service_fee: row.service_fee,
            delivery_fee: row.delivery_fee,
            protection_fee: row.protection_fee,
            deposit_amount: row.deposit_amount,
            total_renter_pays: row.total_renter_pays,
            owner_payout: row.owner_payout,
            currency: row.currency,
            delivery_method: parse_column("delivery_method", &row.delivery_method)?,
            delivery_address: row.delivery_address,
            protection_plan: parse_column("protection_plan", &row.protection_plan)?,
            payment_authorized: row.payment_authorized,
            approved_at: row.approved_at,
            declined_at: row.declined_at,
            cancelled_at: row.cancelled_at,
            cancelled_by: row.cancelled_by,
            cancellation_reason: row.cancellation_reason,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn blocking_statuses() -> Vec<String> {
    BookingStatus::BLOCKING
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn find_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid, role: Option<PartyRole>) -> CoreResult<Vec<Booking>> {
        let filter = match role {
            Some(PartyRole::Renter) => "renter_id = $1",
            Some(PartyRole::Owner) => "owner_id = $1",
            None => "(renter_id = $1 OR owner_id = $1)",
        };
        let sql = format!(
            "SELECT {} FROM bookings WHERE {} ORDER BY created_at DESC",
            BOOKING_COLUMNS, filter
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn find_overlapping(
        &self,
        listing_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM bookings
            WHERE listing_id = $1
              AND status = ANY($2)
              AND start_time < $4
              AND end_time > $3
            "#,
        )
        .bind(listing_id)
        .bind(blocking_statuses())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_booking(&self, booking: &NewBooking) -> CoreResult<Booking> {
        // bookings_no_overlap rejects concurrent overlapping inserts with 23P01
        let sql = format!(
            r#"
            INSERT INTO bookings (
                id, listing_id, renter_id, owner_id, start_time, end_time, status,
                subtotal, service_fee, delivery_fee, protection_fee, deposit_amount,
                total_renter_pays, owner_payout, currency, delivery_method,
                delivery_address, protection_plan
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'requested', $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking.id)
            .bind(booking.listing_id)
            .bind(booking.renter_id)
            .bind(booking.owner_id)
            .bind(booking.start_time)
            .bind(booking.end_time)
            .bind(booking.subtotal)
            .bind(booking.service_fee)
            .bind(booking.delivery_fee)
            .bind(booking.protection_fee)
            .bind(booking.deposit_amount)
            .bind(booking.total_renter_pays)
            .bind(booking.owner_payout)
            .bind(&booking.currency)
            .bind(booking.delivery_method.as_str())
            .bind(&booking.delivery_address)
            .bind(booking.protection_plan.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Booking::try_from(row)
    }

    async fn apply_status_change(&self, id: Uuid, change: &StatusChange) -> CoreResult<Booking> {
        let sql = format!(
            r#"
            UPDATE bookings SET
                status = $2,
                updated_at = $4,
                approved_at = CASE WHEN $2 = 'approved' THEN $4 ELSE approved_at END,
                declined_at = CASE WHEN $2 IN ('declined', 'auto_declined') THEN $4 ELSE declined_at END,
                started_at = CASE WHEN $2 = 'active' THEN $4 ELSE started_at END,
                completed_at = CASE WHEN $2 = 'completed' THEN $4 ELSE completed_at END,
                cancelled_at = CASE WHEN $2 = 'cancelled' THEN $4 ELSE cancelled_at END,
                cancelled_by = CASE WHEN $2 = 'cancelled' THEN $5 ELSE cancelled_by END,
                cancellation_reason = CASE WHEN $2 = 'cancelled' THEN $6 ELSE cancellation_reason END
            WHERE id = $1 AND status = $3
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(change.to.as_str())
            .bind(change.from.as_str())
            .bind(change.at)
            .bind(change.actor_id)
            .bind(&change.reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Booking::try_from(row),
            None => match self.find_booking(id).await? {
                Some(_) => Err(CoreError::Conflict(
                    "Booking status changed concurrently, please retry".into(),
                )),
                None => Err(CoreError::NotFound("Booking not found".into())),
            },
        }
    }

    async fn mark_payment_authorized(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE bookings SET payment_authorized = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
