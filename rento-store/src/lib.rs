pub mod app_config;
pub mod booking_repo;
pub mod database;
#[cfg(feature = "kafka")]
pub mod events;
pub mod ledger_repo;
pub mod listing_repo;
pub mod memory;
pub mod rate_limit;
pub mod redis_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
#[cfg(feature = "kafka")]
pub use events::KafkaEventSink;
pub use ledger_repo::PgLedgerRepository;
pub use listing_repo::PgListingRepository;
pub use memory::MemoryStore;
pub use rate_limit::MemoryRateLimitStore;
pub use redis_repo::RedisRateLimitStore;
