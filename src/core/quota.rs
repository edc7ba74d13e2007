//! Daily message quota
//!
//! Consulted only for a successful, non-sentinel reply. Metered-tier users
//! get `DAILY_MESSAGE_CEILING` charged completions per rolling day, tracked
//! by an expiring counter keyed on (user, calendar day). The window runs 24h
//! from the counter's first write, not to a calendar-day boundary.

use crate::infrastructure::entities::SubscriptionTier;
use crate::infrastructure::traits::CacheStore;
use chrono::{NaiveDate, Utc};
use std::time::Duration;

pub const DAILY_MESSAGE_CEILING: i64 = 5;
pub const USAGE_COUNTER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Exceeded,
}

pub fn usage_key(user_id: i64, day: NaiveDate) -> String {
    format!("usage:{}:{}", user_id, day.format("%Y-%m-%d"))
}

/// Charges one completion against the user's daily ceiling.
///
/// The read and the increment are two separate store calls, so two
/// completions racing for the last slot can both pass the check and push the
/// count past the ceiling by a small margin.
pub async fn charge(
    cache: &dyn CacheStore,
    user_id: i64,
    tier: SubscriptionTier,
) -> Result<QuotaDecision, ()> {
    if tier == SubscriptionTier::Pro {
        return Ok(QuotaDecision::Allowed);
    }

    let key = usage_key(user_id, Utc::now().date_naive());

    let used = cache.get_counter(&key).await?;
    if used >= DAILY_MESSAGE_CEILING {
        return Ok(QuotaDecision::Exceeded);
    }

    cache.incr(&key, USAGE_COUNTER_TTL).await?;
    Ok(QuotaDecision::Allowed)
}
