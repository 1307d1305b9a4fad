pub mod pricing;

pub use pricing::{calculate_pricing, PricingBreakdown, PricingConfig, PricingEngine, PricingInput};
