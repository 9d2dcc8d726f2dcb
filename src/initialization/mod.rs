//! This module provides the `InitializationService` responsible for wiring
//! the stores, channels, alert engine and limiters from an [`AppConfig`] at
//! startup.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    channels::{ChannelError, ChannelRegistry},
    clock::{Clock, SystemClock},
    config::{AppConfig, ConfigLoader, ConfigValidationError, LoaderError},
    engine::{AlertEngine, AlertEngineBuildError},
    http_client::HttpClientPool,
    models::{AlertPolicy, channel::ChannelConfigError},
    persistence::{
        InMemoryKeyValueStore, RedisKeyValueStore, RedisStoreConfig, SqlitePolicyStore,
        error::PersistenceError, traits::KeyValueStore,
    },
    rate_limit::{DailyQuota, ThresholdLimiter},
};

/// Errors that can occur during initialization.
#[derive(Debug, Error)]
pub enum InitializationError {
    /// The static default policies could not be loaded.
    #[error("Failed to load default policies from file: {0}")]
    DefaultPolicyLoadError(#[from] LoaderError),

    /// A static default policy is invalid.
    #[error("Invalid default policy: {0}")]
    InvalidDefaultPolicy(String),

    /// A history bound or rate limit rule is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// The channel configuration is invalid.
    #[error("Invalid channel configuration: {0}")]
    ChannelConfigError(#[from] ChannelConfigError),

    /// A channel could not be constructed.
    #[error("Failed to build notification channels: {0}")]
    ChannelError(#[from] ChannelError),

    /// A store could not be opened.
    #[error("Failed to open store: {0}")]
    StoreError(#[from] PersistenceError),

    /// The engine could not be assembled.
    #[error("Failed to build alert engine: {0}")]
    EngineError(#[from] AlertEngineBuildError),
}

/// Everything a running instance needs.
pub struct Services {
    /// The alert engine.
    pub engine: Arc<AlertEngine>,
    /// The policy source of truth, for administrative commands.
    pub policy_store: Arc<SqlitePolicyStore>,
    /// The store backing cooldowns, history and counters.
    pub kv_store: Arc<dyn KeyValueStore>,
    /// Threshold limiter feeding the engine.
    pub limiter: ThresholdLimiter,
    /// Daily quota per subscription tier.
    pub quota: DailyQuota,
}

/// A service responsible for initializing application state at startup.
pub struct InitializationService {
    config: AppConfig,
    clock: Arc<dyn Clock>,
}

impl InitializationService {
    /// Creates a new `InitializationService`.
    pub fn new(config: AppConfig) -> Self {
        Self { config, clock: Arc::new(SystemClock) }
    }

    /// Replaces the time source handed to every component.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Opens the stores and assembles the engine and limiters.
    pub async fn run(&self) -> Result<Services, InitializationError> {
        let defaults = self.load_default_policies()?;

        self.config.validate()?;
        self.config.channels.validate()?;

        let kv_store = self.open_kv_store().await?;

        tracing::debug!(database_url = %self.config.database_url, "Initializing policy store...");
        let policy_store = Arc::new(SqlitePolicyStore::new(&self.config.database_url).await?);
        policy_store.run_migrations().await?;

        let client_pool = HttpClientPool::new();
        let registry = ChannelRegistry::from_config(&self.config.channels, &client_pool).await?;

        let engine = Arc::new(
            AlertEngine::builder()
                .policy_store(policy_store.clone())
                .kv_store(kv_store.clone())
                .channels(registry)
                .default_policies(defaults)
                .policy_cache_ttl(self.config.policy_cache_ttl)
                .default_cooldown(self.config.default_cooldown)
                .history(self.config.history.clone())
                .clock(self.clock.clone())
                .build()?,
        );

        let limiter = ThresholdLimiter::new(
            self.config.rate_limits.clone(),
            kv_store.clone(),
            Some(engine.clone()),
        );
        let quota = DailyQuota::new(kv_store.clone(), self.config.quota.clone(), self.clock.clone());

        tracing::info!(rate_limit_rules = self.config.rate_limits.len(), "Alert engine initialized.");
        Ok(Services { engine, policy_store, kv_store, limiter, quota })
    }

    pub(crate) fn load_default_policies(&self) -> Result<Vec<AlertPolicy>, InitializationError> {
        let path = &self.config.default_policies_path;
        let policies: Vec<AlertPolicy> =
            ConfigLoader::new(path.clone()).load_optional("default_policies")?;

        if let Some(blank) = policies.iter().position(|p| p.route_group.trim().is_empty()) {
            return Err(InitializationError::InvalidDefaultPolicy(format!(
                "entry {blank} has an empty route_group"
            )));
        }

        tracing::info!(path = %path.display(), count = policies.len(), "Loaded default policies.");
        Ok(policies)
    }

    async fn open_kv_store(&self) -> Result<Arc<dyn KeyValueStore>, InitializationError> {
        match &self.config.redis_url {
            Some(url) => {
                tracing::debug!("Connecting to Redis...");
                let store = RedisKeyValueStore::new(RedisStoreConfig::new(url.clone())).await?;
                Ok(Arc::new(store))
            }
            None => {
                tracing::warn!("No redis_url configured, using the in-process store.");
                Ok(Arc::new(InMemoryKeyValueStore::new(self.clock.clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write, time::Duration};

    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::HistoryConfig,
        engine::AlertOutcome,
        models::{AlertEvent, Severity, channel::EmailConfig},
        rate_limit::{RequestContext, RateLimitRule},
    };

    fn write_policies(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("policies.yaml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_wires_in_memory_services_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_policies(
            &dir,
            "default_policies:\n  - route_group: login\n    severity: high\n    channels: [websocket]\n",
        );
        let config = AppConfig::builder()
            .default_policies_path(path)
            .rate_limits(vec![RateLimitRule::new("login", 2, Duration::from_secs(60))])
            .build();

        let services = InitializationService::new(config).run().await.unwrap();

        let policy = services.engine.policy_cache().get_policy("login").await.unwrap();
        assert_eq!(policy.severity, Severity::High);

        let outcome = services.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
        assert!(matches!(outcome, AlertOutcome::Dispatched(_)));

        let decision =
            services.limiter.check("login", "ip-1", &RequestContext::default()).await.unwrap();
        assert!(decision.allowed);
        assert!(services.policy_store.list_policies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_policies_file_yields_no_defaults() {
        let dir = TempDir::new().unwrap();
        let config =
            AppConfig::builder().default_policies_path(dir.path().join("policies.yaml")).build();
        let service = InitializationService::new(config);
        assert!(service.load_default_policies().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_route_group_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_policies(&dir, "default_policies:\n  - route_group: ' '\n");
        let config = AppConfig::builder().default_policies_path(path).build();
        let result = InitializationService::new(config).run().await;
        assert!(matches!(result, Err(InitializationError::InvalidDefaultPolicy(_))));
    }

    #[tokio::test]
    async fn test_invalid_channel_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let channels = crate::models::channel::ChannelsConfig {
            email: Some(EmailConfig {
                smtp_host: "localhost".into(),
                smtp_port: 25,
                username: None,
                password: None,
                starttls: false,
                from: "alerts@example.com".into(),
                to: vec![],
                message: None,
            }),
            ..Default::default()
        };
        let config = AppConfig::builder()
            .default_policies_path(dir.path().join("policies.yaml"))
            .channels(channels)
            .build();

        let result = InitializationService::new(config).run().await;
        assert!(matches!(
            result,
            Err(InitializationError::ChannelConfigError(ChannelConfigError::EmptyEmailRecipients))
        ));
    }

    #[tokio::test]
    async fn test_zero_history_bound_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::builder()
            .default_policies_path(dir.path().join("policies.yaml"))
            .history(HistoryConfig { max_entries: 0, ..Default::default() })
            .build();

        let result = InitializationService::new(config).run().await;
        assert!(matches!(
            result,
            Err(InitializationError::InvalidConfig(ConfigValidationError::ZeroHistoryEntries))
        ));
    }
}
