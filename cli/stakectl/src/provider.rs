//! Snapshot providers.
//!
//! A provider produces one [`Snapshot`] per session. Successful fetches are
//! written to a per-pool cache so a later session can still start when the
//! provider is unreachable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use stakeplan_allocation::Snapshot;
use stakeplan_id::PoolAddress;
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Source of pool snapshots.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the current snapshot.
    async fn fetch(&self) -> Result<Snapshot, CliError>;

    /// Human-readable origin for messages.
    fn describe(&self) -> String;
}

/// Fetches `GET {base_url}/pools/{pool}/snapshot`.
#[derive(Debug, Clone)]
pub struct HttpSnapshotProvider {
    client: reqwest::Client,
    base_url: String,
    pool: PoolAddress,
}

impl HttpSnapshotProvider {
    pub fn new(
        base_url: &str,
        pool: PoolAddress,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            pool,
        })
    }

    fn url(&self) -> String {
        format!("{}/pools/{}/snapshot", self.base_url, self.pool)
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn fetch(&self) -> Result<Snapshot, CliError> {
        let url = self.url();
        debug!(%url, "fetching snapshot");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CliError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let mut snapshot: Snapshot = response
            .json()
            .await
            .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to parse snapshot: {}", e)))?;

        if snapshot.pool_address.is_none() {
            snapshot.pool_address = Some(self.pool.clone());
        }
        if snapshot.fetched_at.is_none() {
            snapshot.fetched_at = Some(Utc::now());
        }
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        self.url()
    }
}

/// Reads a snapshot previously saved with `stakeplan snapshot --save`.
#[derive(Debug, Clone)]
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotProvider for FileSnapshotProvider {
    async fn fetch(&self) -> Result<Snapshot, CliError> {
        read_snapshot(&self.path)
            .map_err(|e| CliError::snapshot_unavailable(self.describe(), format!("{:#}", e)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
}

/// Write a snapshot as pretty JSON.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let contents = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}

/// Last-known snapshot per pool.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, pool: &PoolAddress) -> PathBuf {
        self.dir.join(format!("{}.json", pool))
    }

    pub fn load(&self, pool: &PoolAddress) -> Option<Snapshot> {
        let path = self.path(pool);
        if !path.exists() {
            return None;
        }
        match read_snapshot(&path) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "ignoring unreadable cached snapshot");
                None
            }
        }
    }

    pub fn store(&self, pool: &PoolAddress, snapshot: &Snapshot) -> anyhow::Result<()> {
        write_snapshot(&self.path(pool), snapshot)
    }
}

/// Where a session's snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    Live,
    Cached,
}

#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub origin: SnapshotOrigin,
}

/// Fetch a snapshot, falling back to the cache when the provider fails.
///
/// A live snapshot refreshes the cache. Without a live snapshot or a cached
/// one the call fails and no session can start.
pub async fn load_snapshot(
    provider: &dyn SnapshotProvider,
    cache: Option<(&SnapshotCache, &PoolAddress)>,
) -> Result<LoadedSnapshot, CliError> {
    match provider.fetch().await {
        Ok(snapshot) => {
            info!(
                origin = %provider.describe(),
                validators = snapshot.validators.len(),
                "snapshot loaded"
            );
            if let Some((cache, pool)) = cache {
                if let Err(e) = cache.store(pool, &snapshot) {
                    warn!(error = %format!("{:#}", e), "failed to cache snapshot");
                }
            }
            Ok(LoadedSnapshot {
                snapshot,
                origin: SnapshotOrigin::Live,
            })
        }
        Err(fetch_err) => {
            let cached = cache.and_then(|(cache, pool)| cache.load(pool));
            match cached {
                Some(snapshot) => {
                    warn!(
                        origin = %provider.describe(),
                        error = %fetch_err,
                        "snapshot provider failed, using cached snapshot"
                    );
                    Ok(LoadedSnapshot {
                        snapshot,
                        origin: SnapshotOrigin::Cached,
                    })
                }
                None => Err(match fetch_err {
                    err @ CliError::SnapshotUnavailable { .. } => err,
                    other => CliError::snapshot_unavailable(provider.describe(), other),
                }),
            }
        }
    }
}
