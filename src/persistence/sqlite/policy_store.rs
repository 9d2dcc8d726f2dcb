//! Policy CRUD and the [`PolicyStore`] implementation for
//! [`SqlitePolicyStore`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    models::{AlertPolicy, ChannelKind, Severity},
    persistence::{error::PersistenceError, sqlite::SqlitePolicyStore, traits::PolicyStore},
};

#[derive(sqlx::FromRow)]
struct PolicyRow {
    route_group: String,
    enabled: bool,
    severity: String,
    cooldown_ms: Option<i64>,
    channels: String,
}

impl TryFrom<PolicyRow> for AlertPolicy {
    type Error = PersistenceError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        let severity = row
            .severity
            .parse::<Severity>()
            .map_err(PersistenceError::SerializationError)?;
        let channels: BTreeSet<ChannelKind> = serde_json::from_str(&row.channels)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let cooldown_ms = row
            .cooldown_ms
            .map(|ms| {
                u64::try_from(ms).map_err(|_| {
                    PersistenceError::SerializationError(format!(
                        "negative cooldown for '{}'",
                        row.route_group
                    ))
                })
            })
            .transpose()?;
        Ok(AlertPolicy { route_group: row.route_group, enabled: row.enabled, severity, cooldown_ms, channels })
    }
}

impl SqlitePolicyStore {
    /// Inserts `policy`, replacing any existing policy for the same group.
    #[tracing::instrument(skip(self, policy), fields(route_group = %policy.route_group), level = "debug")]
    pub async fn upsert_policy(&self, policy: &AlertPolicy) -> Result<(), PersistenceError> {
        let channels = serde_json::to_string(&policy.channels)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let cooldown_ms = policy
            .cooldown_ms
            .map(i64::try_from)
            .transpose()
            .map_err(|_| PersistenceError::InvalidInput("cooldown_ms out of range".into()))?;
        let updated_at = Utc::now().to_rfc3339();

        self.execute_query_with_error_handling(
            "upsert policy",
            sqlx::query(
                "INSERT INTO alert_policies (route_group, enabled, severity, cooldown_ms, channels, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(route_group) DO UPDATE SET \
                 enabled = excluded.enabled, severity = excluded.severity, \
                 cooldown_ms = excluded.cooldown_ms, channels = excluded.channels, \
                 updated_at = excluded.updated_at",
            )
            .bind(&policy.route_group)
            .bind(policy.enabled)
            .bind(policy.severity.as_str())
            .bind(cooldown_ms)
            .bind(channels)
            .bind(updated_at)
            .execute(&self.pool),
        )
        .await?;

        tracing::debug!("Policy stored.");
        Ok(())
    }

    /// Deletes the policy for `route_group`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn delete_policy(&self, route_group: &str) -> Result<(), PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "delete policy",
                sqlx::query("DELETE FROM alert_policies WHERE route_group = ?")
                    .bind(route_group)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(route_group.to_string()));
        }
        Ok(())
    }

    /// Lists every policy, enabled or not, ordered by group.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn list_policies(&self) -> Result<Vec<AlertPolicy>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "list policies",
                sqlx::query_as::<_, PolicyRow>(
                    "SELECT route_group, enabled, severity, cooldown_ms, channels \
                     FROM alert_policies ORDER BY route_group",
                )
                .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(AlertPolicy::try_from).collect()
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn fetch_enabled_policies(&self) -> Result<Vec<AlertPolicy>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "fetch enabled policies",
                sqlx::query_as::<_, PolicyRow>(
                    "SELECT route_group, enabled, severity, cooldown_ms, channels \
                     FROM alert_policies WHERE enabled = 1",
                )
                .fetch_all(&self.pool),
            )
            .await?;

        let mut policies = Vec::with_capacity(rows.len());
        for row in rows {
            let route_group = row.route_group.clone();
            match AlertPolicy::try_from(row) {
                Ok(policy) => policies.push(policy),
                Err(e) => {
                    tracing::warn!(route_group, error = %e, "Skipping malformed policy row.")
                }
            }
        }
        Ok(policies)
    }
}
