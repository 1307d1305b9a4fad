use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rento_core::ledger::{LedgerEntry, LedgerUpdate, NewLedgerEntry, TransactionType};
use rento_core::repository::LedgerRepository;
use rento_core::{CoreError, CoreResult};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{map_sqlx_error, parse_column};

const ENTRY_COLUMNS: &str = r#"
    id, booking_id, type, status, amount, currency, external_id,
    gateway_status, metadata, processed_at, created_at, updated_at
"#;

pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    booking_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    status: String,
    amount: i64,
    currency: String,
    external_id: Option<String>,
    gateway_status: Option<String>,
    metadata: Value,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = CoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id,
            booking_id: row.booking_id,
            kind: parse_column("type", &row.kind)?,
            status: parse_column("status", &row.status)?,
            amount: row.amount,
            currency: row.currency,
            external_id: row.external_id,
            gateway_status: row.gateway_status,
            metadata: row.metadata,
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn insert_entry(&self, entry: &NewLedgerEntry) -> CoreResult<LedgerEntry> {
        let sql = format!(
            r#"
            INSERT INTO transactions (id, booking_id, type, status, amount, currency, external_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(entry.booking_id)
            .bind(entry.kind.as_str())
            .bind(entry.status.as_str())
            .bind(entry.amount)
            .bind(&entry.currency)
            .bind(&entry.external_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        LedgerEntry::try_from(row)
    }

    async fn find_entry(&self, id: Uuid) -> CoreResult<Option<LedgerEntry>> {
        let sql = format!("SELECT {} FROM transactions WHERE id = $1", ENTRY_COLUMNS);
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(LedgerEntry::try_from).transpose()
    }

    async fn find_by_external_id(&self, external_id: &str) -> CoreResult<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE external_id = $1 ORDER BY created_at DESC LIMIT 1",
            ENTRY_COLUMNS
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(LedgerEntry::try_from).transpose()
    }

    async fn latest_pre_auth(&self, booking_id: Uuid) -> CoreResult<Option<LedgerEntry>> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE booking_id = $1 AND type = $2 AND external_id IS NOT NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            ENTRY_COLUMNS
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(booking_id)
            .bind(TransactionType::PreAuth.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(LedgerEntry::try_from).transpose()
    }

    async fn update_by_external_id(
        &self,
        external_id: &str,
        update: &LedgerUpdate,
    ) -> CoreResult<Option<LedgerEntry>> {
        let sql = format!(
            r#"
            UPDATE transactions SET
                status = $2,
                gateway_status = COALESCE($3, gateway_status),
                metadata = COALESCE($4, metadata),
                processed_at = COALESCE($5, processed_at),
                updated_at = NOW()
            WHERE external_id = $1
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );
        let rows = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(external_id)
            .bind(update.status.as_str())
            .bind(&update.gateway_status)
            .bind(&update.metadata)
            .bind(update.processed_at)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .max_by_key(|row| row.created_at)
            .map(LedgerEntry::try_from)
            .transpose()
    }
}
