use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    models::AlertPolicy,
    persistence::{error::PersistenceError, traits::PolicyStore},
};

/// A [`PolicyStore`] serving a fixed list, counting fetches and failing on
/// demand.
#[derive(Clone, Default)]
pub struct StaticPolicyStore {
    policies: Arc<Mutex<Vec<AlertPolicy>>>,
    fetches: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl StaticPolicyStore {
    /// Creates a store serving `policies`.
    pub fn new(policies: Vec<AlertPolicy>) -> Self {
        Self { policies: Arc::new(Mutex::new(policies)), ..Default::default() }
    }

    /// Replaces the served policies.
    pub fn set_policies(&self, policies: Vec<AlertPolicy>) {
        *self.policies.lock().unwrap() = policies;
    }

    /// Makes subsequent fetches fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyStore for StaticPolicyStore {
    async fn fetch_enabled_policies(&self) -> Result<Vec<AlertPolicy>, PersistenceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::ConnectionError("policy store unavailable".into()));
        }
        let policies = self.policies.lock().unwrap();
        Ok(policies.iter().filter(|p| p.enabled).cloned().collect())
    }
}
