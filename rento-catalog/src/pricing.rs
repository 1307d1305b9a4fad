use chrono::{DateTime, Utc};
use rento_core::booking::{DeliveryMethod, ProtectionPlan};
use rento_core::listing::RateCard;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE_FEE_BPS: u32 = 1200;
pub const BASIC_PROTECTION_BPS: u32 = 500;
pub const PREMIUM_PROTECTION_BPS: u32 = 1000;
/// Platform commission withheld from the owner's share of the subtotal
pub const PLATFORM_COMMISSION_BPS: u32 = 600;

/// Rentals shorter than this use the hourly price, when one is set
const HOURLY_RATE_MAX_HOURS: i64 = 8;
/// Weekly pricing is considered from this many days on
const WEEKLY_RATE_MIN_DAYS: i64 = 5;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingInput {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price_hourly: Option<i64>,
    pub price_daily: i64,
    pub price_weekly: Option<i64>,
    pub deposit_amount: i64,
    pub delivery_method: DeliveryMethod,
    pub delivery_fee: i64,
    pub protection_plan: ProtectionPlan,
}

impl PricingInput {
    /// Build from a listing's rate card. `delivery_offered` is whether the
    /// listing delivers at all; when it doesn't, the fee is zero whatever the
    /// renter picked.
    pub fn from_rate_card(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        rate_card: &RateCard,
        delivery_method: DeliveryMethod,
        delivery_offered: bool,
        protection_plan: ProtectionPlan,
    ) -> Self {
        let delivery_fee = if delivery_offered && delivery_method == DeliveryMethod::Delivery {
            rate_card.delivery_fee
        } else {
            0
        };

        Self {
            start_time,
            end_time,
            price_hourly: rate_card.price_hourly,
            price_daily: rate_card.price_daily,
            price_weekly: rate_card.price_weekly,
            deposit_amount: rate_card.deposit_amount,
            delivery_method,
            delivery_fee,
            protection_plan,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingBreakdown {
    pub subtotal: i64,
    pub service_fee: i64,
    pub delivery_fee: i64,
    pub protection_fee: i64,
    /// Held, not charged; counted in the renter total but never paid out
    pub deposit_amount: i64,
    pub total_renter_pays: i64,
    pub owner_payout: i64,
    pub rental_days: i64,
    pub rental_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub service_fee_bps: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            service_fee_bps: DEFAULT_SERVICE_FEE_BPS,
        }
    }
}

/// Thin holder for the configured service fee rate
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn quote(&self, input: &PricingInput) -> PricingBreakdown {
        calculate_pricing(input, self.config.service_fee_bps)
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

/// `amount * bps / 10_000`, rounded half-up.
pub fn apply_bps(amount: i64, bps: u32) -> i64 {
    let scaled = amount as i128 * bps as i128;
    ((scaled + 5_000).div_euclid(10_000)) as i64
}

/// Price a rental interval. Pure; the caller guarantees `end_time > start_time`.
///
/// Amounts are integer minor units and percentages are basis points. Each fee
/// is rounded half-up on its own, never on the aggregate, so the breakdown
/// always sums exactly to its total.
pub fn calculate_pricing(input: &PricingInput, service_fee_bps: u32) -> PricingBreakdown {
    let millis = (input.end_time - input.start_time).num_milliseconds().max(0);
    let hours = (millis + MILLIS_PER_HOUR - 1) / MILLIS_PER_HOUR;
    let days = (hours + 23) / 24;
    let weeks = days / 7;
    let remaining_days = days % 7;

    let hourly = input.price_hourly.filter(|p| *p > 0);
    let weekly = input.price_weekly.filter(|p| *p > 0);

    let subtotal = match (hourly, weekly) {
        (Some(hourly), _) if hours < HOURLY_RATE_MAX_HOURS => hourly * hours,
        (_, Some(weekly)) if days >= WEEKLY_RATE_MIN_DAYS => {
            let daily_total = days * input.price_daily;
            let weekly_total = if days >= 7 {
                weeks * weekly + remaining_days * input.price_daily
            } else {
                // A flat week can undercut 5 or 6 single days
                weekly
            };
            weekly_total.min(daily_total)
        }
        _ => input.price_daily * days,
    };

    let service_fee = apply_bps(subtotal, service_fee_bps);
    let delivery_fee = match input.delivery_method {
        DeliveryMethod::Delivery => input.delivery_fee,
        DeliveryMethod::Pickup => 0,
    };
    let protection_fee = match input.protection_plan {
        ProtectionPlan::None => 0,
        ProtectionPlan::Basic => apply_bps(subtotal, BASIC_PROTECTION_BPS),
        ProtectionPlan::Premium => apply_bps(subtotal, PREMIUM_PROTECTION_BPS),
    };

    let total_renter_pays =
        subtotal + service_fee + delivery_fee + protection_fee + input.deposit_amount;
    let owner_payout = subtotal - apply_bps(subtotal, PLATFORM_COMMISSION_BPS);

    PricingBreakdown {
        subtotal,
        service_fee,
        delivery_fee,
        protection_fee,
        deposit_amount: input.deposit_amount,
        total_renter_pays,
        owner_payout,
        rental_days: days,
        rental_hours: hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn input(duration: Duration, hourly: Option<i64>, daily: i64, weekly: Option<i64>) -> PricingInput {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        PricingInput {
            start_time: start,
            end_time: start + duration,
            price_hourly: hourly,
            price_daily: daily,
            price_weekly: weekly,
            deposit_amount: 0,
            delivery_method: DeliveryMethod::Pickup,
            delivery_fee: 0,
            protection_plan: ProtectionPlan::None,
        }
    }

    fn quote(input: &PricingInput) -> PricingBreakdown {
        calculate_pricing(input, DEFAULT_SERVICE_FEE_BPS)
    }

    #[test]
    fn test_single_day() {
        let result = quote(&input(Duration::hours(24), None, 1000, None));
        assert_eq!(result.subtotal, 1000);
        assert_eq!(result.service_fee, 120);
        assert_eq!(result.total_renter_pays, 1120);
        assert_eq!(result.owner_payout, 940);
        assert_eq!(result.rental_days, 1);
        assert_eq!(result.rental_hours, 24);
    }

    #[test]
    fn test_short_rental_uses_hourly_rate() {
        let result = quote(&input(Duration::hours(5), Some(200), 1000, None));
        assert_eq!(result.subtotal, 1000);
        assert_eq!(result.rental_hours, 5);
    }

    #[test]
    fn test_partial_hour_rounds_up() {
        let result = quote(&input(Duration::minutes(61), Some(200), 1000, None));
        assert_eq!(result.rental_hours, 2);
        assert_eq!(result.subtotal, 400);
    }

    #[test]
    fn test_eight_hours_or_more_uses_daily_rate() {
        let result = quote(&input(Duration::hours(10), Some(200), 1000, None));
        assert_eq!(result.subtotal, 1000);
        assert_eq!(result.rental_days, 1);
    }

    #[test]
    fn test_zero_hourly_price_counts_as_unset() {
        let result = quote(&input(Duration::hours(3), Some(0), 1000, None));
        assert_eq!(result.subtotal, 1000);
    }

    #[test]
    fn test_full_week_beats_daily() {
        let result = quote(&input(Duration::days(7), None, 1000, Some(6000)));
        assert_eq!(result.subtotal, 6000);
    }

    #[test]
    fn test_week_plus_remaining_days() {
        let result = quote(&input(Duration::days(10), None, 1000, Some(6000)));
        assert_eq!(result.subtotal, 9000);
        assert_eq!(result.rental_days, 10);
    }

    #[test]
    fn test_five_days_compares_flat_week() {
        // Flat week 4500 undercuts 5 x 1000
        let result = quote(&input(Duration::days(5), None, 1000, Some(4500)));
        assert_eq!(result.subtotal, 4500);

        // Daily wins when the week is dearer
        let result = quote(&input(Duration::days(6), None, 1000, Some(8000)));
        assert_eq!(result.subtotal, 6000);
    }

    #[test]
    fn test_weekly_ignored_below_five_days() {
        let result = quote(&input(Duration::days(4), None, 1000, Some(2000)));
        assert_eq!(result.subtotal, 4000);
    }

    #[test]
    fn test_protection_plans() {
        let mut req = input(Duration::hours(24), None, 1000, None);
        req.protection_plan = ProtectionPlan::Premium;
        assert_eq!(quote(&req).protection_fee, 100);

        req.protection_plan = ProtectionPlan::Basic;
        assert_eq!(quote(&req).protection_fee, 50);
    }

    #[test]
    fn test_rounding_is_half_up() {
        // 5% of 10 is 0.5, 5% of 30 is 1.5
        let mut req = input(Duration::hours(1), Some(10), 1000, None);
        req.protection_plan = ProtectionPlan::Basic;
        assert_eq!(quote(&req).protection_fee, 1);

        req.price_hourly = Some(30);
        assert_eq!(quote(&req).protection_fee, 2);

        // 12% of 1004 is 120.48
        let req = input(Duration::hours(24), None, 1004, None);
        assert_eq!(quote(&req).service_fee, 120);
    }

    #[test]
    fn test_delivery_fee_only_for_delivery() {
        let mut req = input(Duration::hours(24), None, 1000, None);
        req.delivery_fee = 300;
        assert_eq!(quote(&req).delivery_fee, 0);

        req.delivery_method = DeliveryMethod::Delivery;
        let result = quote(&req);
        assert_eq!(result.delivery_fee, 300);
        assert_eq!(result.total_renter_pays, 1420);
        // Owner payout ignores renter-side fees
        assert_eq!(result.owner_payout, 940);
    }

    #[test]
    fn test_deposit_in_total_not_payout() {
        let mut req = input(Duration::hours(24), None, 1000, None);
        req.deposit_amount = 5000;
        let result = quote(&req);
        assert_eq!(result.deposit_amount, 5000);
        assert_eq!(result.total_renter_pays, 6120);
        assert_eq!(result.owner_payout, 940);
    }

    #[test]
    fn test_total_always_sums_components() {
        let plans = [ProtectionPlan::None, ProtectionPlan::Basic, ProtectionPlan::Premium];
        for hours in [1_i64, 3, 7, 9, 23, 25, 48, 120, 167, 169, 240, 1000] {
            for plan in plans {
                let mut req = input(Duration::hours(hours), Some(137), 1333, Some(7777));
                req.protection_plan = plan;
                req.delivery_method = DeliveryMethod::Delivery;
                req.delivery_fee = 250;
                req.deposit_amount = 999;
                let r = quote(&req);
                assert_eq!(
                    r.total_renter_pays,
                    r.subtotal + r.service_fee + r.delivery_fee + r.protection_fee + r.deposit_amount
                );
            }
        }
    }

    #[test]
    fn test_rate_card_without_delivery_zeroes_fee() {
        let card = RateCard {
            price_hourly: None,
            price_daily: 1000,
            price_weekly: None,
            deposit_amount: 0,
            delivery_fee: 300,
            currency: "USD".into(),
        };
        let start = Utc::now();
        let req = PricingInput::from_rate_card(
            start,
            start + Duration::days(1),
            &card,
            DeliveryMethod::Delivery,
            false,
            ProtectionPlan::None,
        );
        assert_eq!(req.delivery_fee, 0);

        let engine = PricingEngine::default();
        assert_eq!(engine.quote(&req).total_renter_pays, 1120);
    }
}
