// ABOUTME: Deploy lock to prevent concurrent deployments of the same app.
// ABOUTME: Uses atomic creation in a LockStore with holder info stored as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::cluster::LockStore;
use crate::diagnostics::{Diagnostics, Warning};
use crate::types::{AppName, Version};

use super::DeployError;
use super::guard::Guard;

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub app: String,
    /// Version being deployed by the holder.
    pub version: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(app: &AppName, version: &Version) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            app: app.to_string(),
            version: version.to_string(),
        }
    }

    /// Whether the lock is at least `ttl` old.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now() - self.started_at;
        chrono::Duration::from_std(ttl).is_ok_and(|ttl| age >= ttl)
    }
}

/// A held deploy lock. Release it with `release()` or use `with_lock()`.
pub struct DeployLock<'a, L: LockStore + ?Sized> {
    store: &'a L,
    app: AppName,
}

impl<L: LockStore + ?Sized> std::fmt::Debug for DeployLock<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock").field("app", &self.app).finish()
    }
}

impl<'a, L: LockStore + ?Sized> DeployLock<'a, L> {
    /// Acquire the deploy lock for `app`.
    ///
    /// Creation is atomic in the store. An existing lock is broken when it is
    /// stale, unreadable, or `force` is set; otherwise `LockHeld` is returned.
    pub async fn acquire(
        store: &'a L,
        app: &AppName,
        version: &Version,
        force: bool,
        ttl: Duration,
    ) -> Result<Self, DeployError> {
        let info = LockInfo::new(app, version);
        let record = serde_json::to_string(&info)
            .map_err(|e| DeployError::Lock(format!("failed to serialize lock: {e}")))?;

        if Self::try_create(store, app, &record).await? {
            return Ok(Self::held(store, app));
        }

        if !Self::should_break(store, app, force, ttl).await? {
            return Err(Self::held_error(store, app).await);
        }

        tracing::debug!(app = %app, "removing stale or forced deploy lock");
        store
            .delete_lock(app)
            .await
            .map_err(|e| DeployError::Lock(format!("failed to break lock: {e}")))?;

        if !Self::try_create(store, app, &record).await? {
            return Err(DeployError::Lock(
                "lock acquired by another process during break".to_string(),
            ));
        }

        Ok(Self::held(store, app))
    }

    fn held(store: &'a L, app: &AppName) -> Self {
        tracing::debug!(app = %app, "deploy lock acquired");
        Self {
            store,
            app: app.clone(),
        }
    }

    async fn try_create(store: &L, app: &AppName, record: &str) -> Result<bool, DeployError> {
        store
            .try_create_lock(app, record)
            .await
            .map_err(|e| DeployError::Lock(format!("failed to acquire lock: {e}")))
    }

    async fn read_existing(store: &L, app: &AppName) -> Result<Option<LockInfo>, DeployError> {
        let raw = store
            .read_lock(app)
            .await
            .map_err(|e| DeployError::Lock(format!("failed to read lock info: {e}")))?;
        Ok(raw.and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    /// Check if an existing lock should be broken (stale, forced, or corrupted).
    async fn should_break(
        store: &L,
        app: &AppName,
        force: bool,
        ttl: Duration,
    ) -> Result<bool, DeployError> {
        match Self::read_existing(store, app).await? {
            Some(existing) if force => {
                tracing::warn!(
                    holder = %existing.holder,
                    pid = existing.pid,
                    since = %existing.started_at,
                    "breaking deploy lock (forced)"
                );
                Ok(true)
            }
            Some(existing) if existing.is_stale(ttl) => {
                tracing::warn!(
                    holder = %existing.holder,
                    pid = existing.pid,
                    since = %existing.started_at,
                    "auto-breaking stale deploy lock"
                );
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                tracing::warn!(app = %app, "deploy lock unreadable, breaking it");
                Ok(true)
            }
        }
    }

    async fn held_error(store: &L, app: &AppName) -> DeployError {
        match Self::read_existing(store, app).await {
            Ok(Some(existing)) => DeployError::LockHeld {
                holder: existing.holder,
                pid: existing.pid,
                started_at: existing.started_at,
            },
            _ => DeployError::Lock("lock held by another process".to_string()),
        }
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), DeployError> {
        self.store
            .delete_lock(&self.app)
            .await
            .map_err(|e| DeployError::Lock(format!("failed to release lock: {e}")))
    }

    /// Run `work` while holding the lock. Acquisition is bounded by `guard`,
    /// so a cancelled or expired attempt never takes the lock. The lock is
    /// released whatever the outcome; a failed release is recorded in `diag`.
    #[allow(clippy::too_many_arguments)]
    pub async fn with_lock<T, E, F>(
        store: &'a L,
        app: &AppName,
        version: &Version,
        force: bool,
        ttl: Duration,
        guard: &Guard,
        diag: &mut Diagnostics,
        work: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<DeployError>,
    {
        let lock = guard
            .call("lock acquire", Self::acquire(store, app, version, force, ttl))
            .await?;
        let result = work.await;

        if let Err(e) = guard.cleanup("lock release", lock.release()).await {
            diag.warn(Warning::lock_release(e.to_string()));
        }

        result
    }
}
