use chrono::{DateTime, Utc};
use rento_shared::Masked;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Active => "active",
            ListingStatus::Paused => "paused",
            ListingStatus::Archived => "archived",
        }
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ListingStatus::Draft),
            "active" => Ok(ListingStatus::Active),
            "paused" => Ok(ListingStatus::Paused),
            "archived" => Ok(ListingStatus::Archived),
            other => Err(format!("unknown listing status '{}'", other)),
        }
    }
}

/// Prices in minor currency units. Only the daily price is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateCard {
    pub price_hourly: Option<i64>,
    pub price_daily: i64,
    pub price_weekly: Option<i64>,
    pub deposit_amount: i64,
    pub delivery_fee: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub status: ListingStatus,
    #[serde(flatten)]
    pub rate_card: RateCard,
    pub delivery_available: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn is_bookable(&self) -> bool {
        self.status == ListingStatus::Active && self.deleted_at.is_none()
    }
}

/// The slice of a user profile the payment flow needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub email: Option<Masked<String>>,
    pub phone: Option<Masked<String>>,
    pub payway_beneficiary_id: Option<Masked<String>>,
}

impl Profile {
    /// First word of the display name, and the rest. Falls back to "User" for
    /// either half, which is what the gateway checkout form expects.
    pub fn split_name(&self) -> (String, String) {
        let name = self.display_name.as_deref().unwrap_or("").trim();
        let mut parts = name.split_whitespace();
        let first = parts.next().unwrap_or("User").to_string();
        let rest = parts.collect::<Vec<_>>().join(" ");
        let last = if rest.is_empty() { "User".to_string() } else { rest };
        (first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: Option<&str>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            display_name: name.map(str::to_string),
            email: None,
            phone: None,
            payway_beneficiary_id: None,
        }
    }

    #[test]
    fn test_split_name() {
        assert_eq!(profile(Some("Sok Dara Chan")).split_name(), ("Sok".into(), "Dara Chan".into()));
        assert_eq!(profile(Some("Sok")).split_name(), ("Sok".into(), "User".into()));
        assert_eq!(profile(None).split_name(), ("User".into(), "User".into()));
    }

    #[test]
    fn test_deleted_listing_is_not_bookable() {
        let mut listing = Listing {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Camera".into(),
            status: ListingStatus::Active,
            rate_card: RateCard {
                price_hourly: None,
                price_daily: 1000,
                price_weekly: None,
                deposit_amount: 0,
                delivery_fee: 0,
                currency: "USD".into(),
            },
            delivery_available: false,
            deleted_at: None,
        };
        assert!(listing.is_bookable());
        listing.deleted_at = Some(Utc::now());
        assert!(!listing.is_bookable());
        listing.deleted_at = None;
        listing.status = ListingStatus::Paused;
        assert!(!listing.is_bookable());
    }
}
