//! The alert engine and the components it composes.

mod alert_engine;
mod cooldown;
mod history;
mod policy_cache;

pub use alert_engine::{AlertEngine, AlertEngineBuildError, AlertEngineBuilder, AlertOutcome};
pub use cooldown::{COOLDOWN_KEY_PREFIX, CooldownClaim, CooldownTracker};
pub use history::{HISTORY_KEY_PREFIX, HistoryRecorder};
pub use policy_cache::PolicyCache;
