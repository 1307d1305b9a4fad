use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rento_core::listing::{Listing, Profile, RateCard};
use rento_core::repository::{ListingRepository, ProfileRepository};
use rento_core::{CoreError, CoreResult};
use rento_shared::Masked;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{map_sqlx_error, parse_column};

/// Listings and profiles are owned by other services; this side only reads them.
pub struct PgListingRepository {
    pool: PgPool,
}

impl PgListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    status: String,
    price_hourly: Option<i64>,
    price_daily: i64,
    price_weekly: Option<i64>,
    deposit_amount: i64,
    delivery_fee: i64,
    currency: String,
    delivery_available: bool,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = CoreError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        Ok(Listing {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            status: parse_column("status", &row.status)?,
            rate_card: RateCard {
                price_hourly: row.price_hourly,
                price_daily: row.price_daily,
                price_weekly: row.price_weekly,
                deposit_amount: row.deposit_amount,
                delivery_fee: row.delivery_fee,
                currency: row.currency,
            },
            delivery_available: row.delivery_available,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    display_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    payway_beneficiary_id: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            display_name: row.display_name,
            email: row.email.map(Masked::new),
            phone: row.phone.map(Masked::new),
            payway_beneficiary_id: row.payway_beneficiary_id.map(Masked::new),
        }
    }
}

#[async_trait]
impl ListingRepository for PgListingRepository {
    async fn find_bookable(&self, id: Uuid) -> CoreResult<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT id, owner_id, title, status, price_hourly, price_daily, price_weekly,
                   deposit_amount, delivery_fee, currency, delivery_available, deleted_at
            FROM listings
            WHERE id = $1 AND status = 'active' AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        row.map(Listing::try_from).transpose()
    }
}

#[async_trait]
impl ProfileRepository for PgListingRepository {
    async fn find_profile(&self, id: Uuid) -> CoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, display_name, email, phone, payway_beneficiary_id FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Profile::from))
    }
}
