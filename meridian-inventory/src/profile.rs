use crate::booking::Booking;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// What a tier entitles the member to when a cabin upgrade is on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeEntitlement {
    Complimentary,
    Paid,
    NotOffered,
}

impl LoyaltyTier {
    pub fn upgrade_entitlement(&self) -> UpgradeEntitlement {
        match self {
            Self::Platinum | Self::Gold => UpgradeEntitlement::Complimentary,
            Self::Silver => UpgradeEntitlement::Paid,
            Self::Bronze => UpgradeEntitlement::NotOffered,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Platinum => "Platinum",
        }
    }
}

/// One line in a profile's append-only activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// The customer whose session this is.
///
/// `upcoming_flights` is a projection of the booking set (status not
/// cancelled, owned by this customer). It is recomputed by the store after
/// every mutation and must never be edited directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub customer_id: String,
    pub name: String,
    pub email: String,
    pub tier: LoyaltyTier,
    pub loyalty_points: i64,
    pub upcoming_flights: Vec<Booking>,
    #[serde(default)]
    pub preferences: HashMap<String, String>,
    pub activity_log: Vec<ActivityEntry>,
}

impl UserProfile {
    pub fn new(
        customer_id: &str,
        name: &str,
        email: &str,
        tier: LoyaltyTier,
        loyalty_points: i64,
    ) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            tier,
            loyalty_points,
            upcoming_flights: Vec::new(),
            preferences: HashMap::new(),
            activity_log: Vec::new(),
        }
    }

    pub fn log_activity(&mut self, description: impl Into<String>) {
        self.activity_log.push(ActivityEntry {
            timestamp: Utc::now(),
            description: description.into(),
        });
    }
}
