//! Store generation lifecycle.
//!
//! [`StoreLifecycle`] owns the single live [`VectorStore`] generation.
//! Readers and writers obtain the handle through
//! [`current`](StoreLifecycle::current) and hold their clone for the
//! duration of one operation; [`reset`](StoreLifecycle::reset) is the
//! only way the store is structurally replaced.
//!
//! Reset walks `Active → Resetting → Recreating → Active`. The swap in
//! and out of `Active` happens under a brief write lock; the deletion
//! work runs outside it. Deletion uses a bounded retry policy (a fixed
//! number of standard removal attempts with linear backoff, then one
//! forceful OS-level recursive delete) because lingering file handles
//! from a prior generation can hold the storage directory hostage for a
//! short while. If every attempt fails the manager stays non-Active:
//! `reset` returns `StoreResetFailed` and every later `current` call
//! returns `StoreUnavailable` until the process is restarted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::store::{StoreFactory, VectorStore};

/// Lifecycle states. There is no re-enterable failed state: a failed
/// reset parks the manager in `Unavailable` for the rest of its life.
enum LifecycleState {
    Active(Arc<dyn VectorStore>),
    Resetting,
    Recreating,
    Unavailable,
}

/// Bounded retry policy for reclaiming the store's on-disk state.
#[derive(Debug, Clone)]
pub struct ResetPolicy {
    /// Standard removal attempts before the forceful fallback.
    pub max_attempts: u32,
    /// Base backoff between attempts; attempt `n` waits `backoff * n`.
    pub backoff: Duration,
    /// How long to wait for in-flight readers to drop their handles
    /// before files are reclaimed.
    pub drain_timeout: Duration,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            drain_timeout: Duration::from_secs(2),
        }
    }
}

/// Removal mechanism seam. The default implementation uses the
/// filesystem plus the platform shell command as last resort; tests
/// substitute removers that simulate contention.
#[async_trait]
pub trait StorageRemover: Send + Sync {
    /// One standard removal attempt. Must treat a missing path as
    /// success.
    async fn remove(&self, path: &Path) -> std::io::Result<()>;

    /// Last-resort forceful removal (OS-level recursive delete).
    async fn force_remove(&self, path: &Path) -> std::io::Result<()>;
}

/// Default remover: `remove_dir_all`, then the platform's recursive
/// delete command.
pub struct OsRemover;

#[async_trait]
impl StorageRemover for OsRemover {
    async fn remove(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn force_remove(&self, path: &Path) -> std::io::Result<()> {
        let status = if cfg!(windows) {
            tokio::process::Command::new("cmd")
                .args(["/C", "rmdir", "/s", "/q"])
                .arg(path)
                .status()
                .await?
        } else {
            tokio::process::Command::new("rm")
                .arg("-rf")
                .arg(path)
                .status()
                .await?
        };

        if !status.success() || path.exists() {
            return Err(std::io::Error::other(format!(
                "forceful removal of {} failed",
                path.display()
            )));
        }
        Ok(())
    }
}

/// Owns the live store generation and its replacement protocol.
pub struct StoreLifecycle {
    factory: Box<dyn StoreFactory>,
    state: RwLock<LifecycleState>,
    reset_guard: Mutex<()>,
    policy: ResetPolicy,
    remover: Box<dyn StorageRemover>,
}

impl StoreLifecycle {
    /// Open the initial generation with the default policy and remover.
    pub async fn open(factory: Box<dyn StoreFactory>) -> Result<Self, EngineError> {
        Self::open_with(factory, ResetPolicy::default(), Box::new(OsRemover)).await
    }

    /// Open with an explicit policy and remover (test seam).
    pub async fn open_with(
        factory: Box<dyn StoreFactory>,
        policy: ResetPolicy,
        remover: Box<dyn StorageRemover>,
    ) -> Result<Self, EngineError> {
        let generation = factory.open().await.map_err(EngineError::Store)?;
        Ok(Self {
            factory,
            state: RwLock::new(LifecycleState::Active(generation)),
            reset_guard: Mutex::new(()),
            policy,
            remover,
        })
    }

    /// Clone of the live generation handle.
    ///
    /// `StoreUnavailable` while a reset is in progress or after one has
    /// failed. Callers that obtained a handle before a reset began
    /// finish their operation against the old generation.
    pub async fn current(&self) -> Result<Arc<dyn VectorStore>, EngineError> {
        match &*self.state.read().await {
            LifecycleState::Active(generation) => Ok(generation.clone()),
            _ => Err(EngineError::StoreUnavailable),
        }
    }

    /// Whether an active generation exists.
    pub async fn is_ready(&self) -> bool {
        matches!(&*self.state.read().await, LifecycleState::Active(_))
    }

    /// Persisted entry count of the live generation.
    pub async fn count(&self) -> Result<u64, EngineError> {
        let generation = self.current().await?;
        generation.count().await.map_err(EngineError::Store)
    }

    /// Delete everything and replace the generation with a fresh, empty
    /// one. Guarantees `count() == 0` immediately after success.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let _guard = self.reset_guard.lock().await;

        // Swap the generation out; readers arriving from here on see
        // StoreUnavailable until the fresh generation is installed.
        let old = {
            let mut state = self.state.write().await;
            match std::mem::replace(&mut *state, LifecycleState::Resetting) {
                LifecycleState::Active(generation) => generation,
                other => {
                    *state = other;
                    return Err(EngineError::StoreUnavailable);
                }
            }
        };

        info!("store reset started");

        // Empty the persisted entries through the live handle, then
        // release its resources. For file-backed stores the directory
        // removal below is authoritative, so a delete_all failure is
        // only fatal when there are no files to fall back on.
        let emptied = old.delete_all().await;
        if let Err(e) = &emptied {
            warn!(error = %e, "delete_all on live generation failed");
        }
        old.close().await;
        self.drain(&old).await;
        drop(old);

        if let Some(path) = self.factory.storage_path() {
            let path = path.to_path_buf();
            if let Err(e) = self.remove_with_retry(&path).await {
                *self.state.write().await = LifecycleState::Unavailable;
                return Err(e);
            }
        } else if emptied.is_err() {
            *self.state.write().await = LifecycleState::Unavailable;
            return Err(EngineError::StoreResetFailed { attempts: 1 });
        }

        *self.state.write().await = LifecycleState::Recreating;

        let fresh = match self.factory.open().await {
            Ok(generation) => generation,
            Err(e) => {
                error!(error = %e, "recreating store generation failed");
                *self.state.write().await = LifecycleState::Unavailable;
                return Err(EngineError::StoreResetFailed {
                    attempts: self.policy.max_attempts,
                });
            }
        };

        match fresh.count().await {
            Ok(0) => {}
            Ok(n) => {
                error!(count = n, "fresh generation is not empty");
                *self.state.write().await = LifecycleState::Unavailable;
                return Err(EngineError::StoreResetFailed {
                    attempts: self.policy.max_attempts,
                });
            }
            Err(e) => {
                error!(error = %e, "fresh generation is unusable");
                *self.state.write().await = LifecycleState::Unavailable;
                return Err(EngineError::StoreResetFailed {
                    attempts: self.policy.max_attempts,
                });
            }
        }

        *self.state.write().await = LifecycleState::Active(fresh);
        info!("store reset complete");
        Ok(())
    }

    /// Wait (bounded) for in-flight readers to drop their clones of the
    /// old generation before its files are reclaimed.
    async fn drain(&self, old: &Arc<dyn VectorStore>) {
        let deadline = Instant::now() + self.policy.drain_timeout;
        while Arc::strong_count(old) > 1 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        if Arc::strong_count(old) > 1 {
            warn!("proceeding with reset while readers still hold the old generation");
        }
    }

    async fn remove_with_retry(&self, path: &Path) -> Result<(), EngineError> {
        for attempt in 1..=self.policy.max_attempts {
            match self.remover.remove(path).await {
                Ok(()) => {
                    info!(attempt, "store storage removed");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "store removal attempt failed"
                    );
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.backoff * attempt).await;
                    }
                }
            }
        }

        warn!("standard removal exhausted, attempting forceful removal");
        match self.remover.force_remove(path).await {
            Ok(()) => {
                info!("store storage removed by forceful fallback");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "forceful removal failed");
                Err(EngineError::StoreResetFailed {
                    attempts: self.policy.max_attempts + 1,
                })
            }
        }
    }
}
