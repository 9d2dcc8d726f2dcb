//! Request-side limits: the threshold limiter that produces alerts, and the
//! tiered daily quota.

mod limiter;
mod quota;

pub use limiter::{
    RATE_LIMIT_KEY_PREFIX, RateLimitDecision, RateLimitRule, RequestContext, ThresholdLimiter,
};
pub use quota::{DailyQuota, QUOTA_KEY_PREFIX, QuotaConfig, QuotaStatus, SubscriptionTier};
