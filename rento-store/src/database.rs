use rento_core::CoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

/// SQLSTATE raised by the bookings exclusion constraint
const EXCLUSION_VIOLATION: &str = "23P01";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Translate driver errors into the domain taxonomy. Constraint violations
/// that mean "someone else got there first" become `Conflict`.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(EXCLUSION_VIOLATION) => {
                return CoreError::Conflict("Listing is not available for the selected dates".into())
            }
            Some(UNIQUE_VIOLATION) => return CoreError::Conflict(db_err.message().to_string()),
            _ => {}
        }
    }
    tracing::error!("database error: {}", err);
    CoreError::Database(err.to_string())
}

/// Decode a text column into one of the domain enums.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, CoreError>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| CoreError::Database(format!("bad {} column: {}", column, e)))
}
