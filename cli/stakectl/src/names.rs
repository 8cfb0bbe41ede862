//! Validator display-name lookup.
//!
//! Names are cosmetic. A failed lookup is logged and the session carries on
//! with whatever names the snapshot had.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use stakeplan_allocation::Allocation;
use stakeplan_id::VoteAccount;
use tracing::{debug, warn};

use crate::error::CliError;

/// Resolves vote accounts to display names.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Names for whichever of `accounts` the resolver knows.
    async fn resolve(
        &self,
        accounts: &[VoteAccount],
    ) -> Result<BTreeMap<VoteAccount, String>, CliError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NameEntry {
    vote_account: String,
    #[serde(default)]
    name: Option<String>,
}

/// Reads a JSON list of `{ "voteAccount": ..., "name": ... }` entries.
#[derive(Debug, Clone)]
pub struct HttpNameResolver {
    client: reqwest::Client,
    url: String,
}

impl HttpNameResolver {
    pub fn new(url: &str, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl NameResolver for HttpNameResolver {
    async fn resolve(
        &self,
        accounts: &[VoteAccount],
    ) -> Result<BTreeMap<VoteAccount, String>, CliError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CliError::Http {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let entries: Vec<NameEntry> = response
            .json()
            .await
            .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to parse names: {}", e)))?;

        let mut names = BTreeMap::new();
        for entry in entries {
            let Some(name) = entry.name.filter(|n| !n.trim().is_empty()) else {
                continue;
            };
            // Entries for other networks or malformed rows are skipped.
            let Ok(account) = entry.vote_account.parse::<VoteAccount>() else {
                continue;
            };
            if accounts.contains(&account) {
                names.insert(account, name.trim().to_string());
            }
        }
        Ok(names)
    }
}

/// Attach resolved names to the allocation. Returns how many were applied.
pub async fn apply_names(allocation: &mut Allocation, resolver: &dyn NameResolver) -> usize {
    let accounts: Vec<VoteAccount> = allocation
        .records()
        .iter()
        .map(|r| r.identity().clone())
        .collect();

    let names = match resolver.resolve(&accounts).await {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "validator name lookup failed, continuing without names");
            return 0;
        }
    };

    let mut applied = 0;
    for (account, name) in names {
        if allocation.set_display_name(&account, Some(name)).is_ok() {
            applied += 1;
        }
    }
    debug!(applied, "validator names applied");
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakeplan_allocation::{Reserve, ValidatorRecord};
    use stakeplan_id::ReserveAccount;

    struct StaticNames(BTreeMap<VoteAccount, String>);

    #[async_trait]
    impl NameResolver for StaticNames {
        async fn resolve(
            &self,
            _accounts: &[VoteAccount],
        ) -> Result<BTreeMap<VoteAccount, String>, CliError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenNames;

    #[async_trait]
    impl NameResolver for BrokenNames {
        async fn resolve(
            &self,
            _accounts: &[VoteAccount],
        ) -> Result<BTreeMap<VoteAccount, String>, CliError> {
            Err(CliError::Other(anyhow::anyhow!("offline")))
        }
    }

    fn allocation() -> Allocation {
        Allocation::load(
            Reserve::new(ReserveAccount::from_bytes(&[200; 32]), 0.0),
            vec![
                ValidatorRecord::existing(VoteAccount::from_bytes(&[1; 32]), 5.0, 0.0)
                    .with_display_name("Snapshot name"),
                ValidatorRecord::existing(VoteAccount::from_bytes(&[2; 32]), 5.0, 0.0),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolved_names_replace_snapshot_names() {
        let mut state = allocation();
        let names = BTreeMap::from([
            (VoteAccount::from_bytes(&[2; 32]), "Second".to_string()),
            (VoteAccount::from_bytes(&[9; 32]), "Stranger".to_string()),
        ]);

        let applied = apply_names(&mut state, &StaticNames(names)).await;
        assert_eq!(applied, 1);
        assert_eq!(state.get(0).unwrap().display_name(), Some("Snapshot name"));
        assert_eq!(state.get(1).unwrap().display_name(), Some("Second"));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_fatal() {
        let mut state = allocation();
        let before = state.clone();
        assert_eq!(apply_names(&mut state, &BrokenNames).await, 0);
        assert_eq!(state, before);
    }
}
