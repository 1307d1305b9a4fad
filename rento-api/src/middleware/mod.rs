pub mod auth;
pub mod rate_limit;

pub use auth::{identify, AuthUser, JwtIdentityProvider};
pub use rate_limit::rate_limit;
