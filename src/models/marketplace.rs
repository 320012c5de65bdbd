// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketplace identity: subscription tier and ad quota accounting.

use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Length of a paid subscription period started by an upgrade.
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

/// Wire value for an unlimited quota.
const UNLIMITED_SENTINEL: i64 = -1;

/// Subscription level governing the ad-posting quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    /// Fixed tier → quota table.
    pub const fn ad_quota(self) -> AdQuota {
        match self {
            SubscriptionTier::Free => AdQuota::Limited(20),
            SubscriptionTier::Basic => AdQuota::Limited(100),
            SubscriptionTier::Premium => AdQuota::Limited(500),
            SubscriptionTier::Enterprise => AdQuota::Unlimited,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "basic" => Ok(SubscriptionTier::Basic),
            "premium" => Ok(SubscriptionTier::Premium),
            "enterprise" => Ok(SubscriptionTier::Enterprise),
            other => Err(AuthError::Validation(format!(
                "unknown subscription tier: {}",
                other
            ))),
        }
    }
}

/// Number of ads a tier may post.
///
/// Persisted as an integer where `-1` means unlimited, matching the
/// documents written by earlier front-end versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum AdQuota {
    Limited(u32),
    Unlimited,
}

impl AdQuota {
    pub const fn is_unlimited(self) -> bool {
        matches!(self, AdQuota::Unlimited)
    }

    /// Whether one more ad fits after `used` ads.
    pub const fn allows(self, used: u32) -> bool {
        match self {
            AdQuota::Limited(limit) => used < limit,
            AdQuota::Unlimited => true,
        }
    }
}

impl From<i64> for AdQuota {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            AdQuota::Unlimited
        } else {
            AdQuota::Limited(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }
}

impl From<AdQuota> for i64 {
    fn from(quota: AdQuota) -> Self {
        match quota {
            AdQuota::Limited(limit) => i64::from(limit),
            AdQuota::Unlimited => UNLIMITED_SENTINEL,
        }
    }
}

/// Pending password reset: only the token digest is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetTicket {
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
}

/// Marketplace user record, as stored in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceUser {
    pub id: String,
    /// Unique, compared case-sensitively
    pub username: String,
    /// Salted PBKDF2 hash (see `services::password`)
    pub password_hash: String,
    /// Derived from the username unless supplied; never verified
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    #[serde(default)]
    pub ads_used: u32,
    #[serde(default = "default_quota")]
    pub ads_quota: AdQuota,
    #[serde(default)]
    pub subscription_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_ticket: Option<ResetTicket>,
}

fn default_quota() -> AdQuota {
    SubscriptionTier::Free.ad_quota()
}

impl MarketplaceUser {
    /// Domain used for derived addresses.
    pub const DERIVED_EMAIL_DOMAIN: &'static str = "users.bazaar.local";

    pub fn derived_email(username: &str) -> String {
        format!("{}@{}", username.to_lowercase(), Self::DERIVED_EMAIL_DOMAIN)
    }

    pub fn can_create_ad(&self) -> bool {
        self.ads_quota.allows(self.ads_used)
    }

    /// Count one posted ad. Fails once a limited quota is used up.
    pub fn record_ad(&mut self) -> Result<u32, AuthError> {
        if let AdQuota::Limited(quota) = self.ads_quota {
            if self.ads_used >= quota {
                return Err(AuthError::QuotaExceeded {
                    used: self.ads_used,
                    quota,
                });
            }
        }
        self.ads_used = self.ads_used.saturating_add(1);
        Ok(self.ads_used)
    }

    /// Recompute tier-derived fields. Returns true if anything changed.
    pub fn refresh_quota(&mut self) -> bool {
        let quota = self.subscription_tier.ad_quota();
        let changed = quota != self.ads_quota;
        self.ads_quota = quota;
        changed
    }

    /// Move to `tier` and start a new subscription period at `now`.
    ///
    /// Rejected when the new quota is already below the ads posted, since
    /// the used count may never exceed a limited quota.
    pub fn apply_tier(&mut self, tier: SubscriptionTier, now: DateTime<Utc>) -> Result<(), AuthError> {
        let quota = tier.ad_quota();
        if let AdQuota::Limited(limit) = quota {
            if self.ads_used > limit {
                return Err(AuthError::Validation(format!(
                    "{} ads already posted, {} allows {}",
                    self.ads_used, tier, limit
                )));
            }
        }
        self.subscription_tier = tier;
        self.ads_quota = quota;
        self.subscription_end = Some(now + Duration::days(SUBSCRIPTION_PERIOD_DAYS));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(tier: SubscriptionTier) -> MarketplaceUser {
        MarketplaceUser {
            id: "u1".to_string(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            email: MarketplaceUser::derived_email("alice"),
            is_admin: false,
            subscription_tier: tier,
            ads_used: 0,
            ads_quota: tier.ad_quota(),
            subscription_end: None,
            created_at: Utc::now(),
            reset_ticket: None,
        }
    }

    #[test]
    fn test_quota_table() {
        assert_eq!(SubscriptionTier::Free.ad_quota(), AdQuota::Limited(20));
        assert_eq!(SubscriptionTier::Basic.ad_quota(), AdQuota::Limited(100));
        assert_eq!(SubscriptionTier::Premium.ad_quota(), AdQuota::Limited(500));
        assert_eq!(SubscriptionTier::Enterprise.ad_quota(), AdQuota::Unlimited);
    }

    #[test]
    fn test_quota_sentinel_wire_format() {
        assert_eq!(serde_json::to_string(&AdQuota::Unlimited).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&AdQuota::Limited(20)).unwrap(), "20");
        let parsed: AdQuota = serde_json::from_str("-1").unwrap();
        assert!(parsed.is_unlimited());
    }

    #[test]
    fn test_record_ad_stops_at_quota() {
        let mut user = make_user(SubscriptionTier::Free);
        for n in 1..=20 {
            assert!(user.can_create_ad());
            assert_eq!(user.record_ad().unwrap(), n);
        }
        assert!(!user.can_create_ad());
        assert!(matches!(
            user.record_ad(),
            Err(AuthError::QuotaExceeded { used: 20, quota: 20 })
        ));
        assert_eq!(user.ads_used, 20);
    }

    #[test]
    fn test_enterprise_always_allows() {
        let mut user = make_user(SubscriptionTier::Enterprise);
        user.ads_used = 10_000;
        assert!(user.can_create_ad());
        assert_eq!(user.record_ad().unwrap(), 10_001);
    }

    #[test]
    fn test_apply_tier_sets_period_and_quota() {
        let mut user = make_user(SubscriptionTier::Free);
        let now = Utc::now();
        user.apply_tier(SubscriptionTier::Premium, now).unwrap();
        assert_eq!(user.ads_quota, AdQuota::Limited(500));
        assert_eq!(user.subscription_end, Some(now + Duration::days(30)));
    }

    #[test]
    fn test_downgrade_below_usage_rejected() {
        let mut user = make_user(SubscriptionTier::Premium);
        user.ads_used = 150;
        let result = user.apply_tier(SubscriptionTier::Basic, Utc::now());
        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert_eq!(user.subscription_tier, SubscriptionTier::Premium);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("Premium".parse::<SubscriptionTier>().unwrap(), SubscriptionTier::Premium);
        assert!("gold".parse::<SubscriptionTier>().is_err());
    }

    #[test]
    fn test_refresh_quota_repairs_stale_value() {
        let mut user = make_user(SubscriptionTier::Basic);
        user.ads_quota = AdQuota::Limited(20);
        assert!(user.refresh_quota());
        assert_eq!(user.ads_quota, AdQuota::Limited(100));
        assert!(!user.refresh_quota());
    }
}
