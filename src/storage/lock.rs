//! Cross-process lock files for document stores
//!
//! A lock is a sibling file `<store>.lock` created with create-if-absent
//! semantics and holding its creation timestamp. A lock older than the
//! staleness threshold is treated as abandoned and reclaimed.

use crate::config::OutputConfig;
use crate::storage::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Timing policy for lock acquisition
#[derive(Debug, Clone)]
pub struct LockSettings {
    /// A lock older than this is forcibly reclaimed
    pub stale_after: Duration,

    /// Wait between attempts while another holder has the lock
    pub poll_interval: Duration,

    /// Give up after waiting this long
    pub acquire_timeout: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            acquire_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&OutputConfig> for LockSettings {
    fn from(config: &OutputConfig) -> Self {
        Self {
            stale_after: Duration::from_millis(config.lock_stale_ms),
            poll_interval: Duration::from_millis(config.lock_poll_ms),
            acquire_timeout: Duration::from_millis(config.lock_timeout_ms),
        }
    }
}

/// Returns the lock file path guarding `target`
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// A held store lock
///
/// Released explicitly with [`StoreLock::release`]; dropping an unreleased
/// lock removes the file synchronously so error paths never leave it behind.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    released: bool,
}

impl StoreLock {
    /// Acquires the lock guarding `target`
    ///
    /// # Returns
    ///
    /// * `Ok(StoreLock)` - The lock file was created by this call
    /// * `Err(StoreError::LockTimeout)` - A live lock was held for longer than the timeout
    /// * `Err(StoreError::Io)` - The lock file could not be created
    pub async fn acquire(target: &Path, settings: &LockSettings) -> StoreResult<Self> {
        let path = lock_path_for(target);
        let started = Instant::now();

        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let lock = Self {
                        path: path.clone(),
                        released: false,
                    };
                    file.write_all(Utc::now().to_rfc3339().as_bytes()).await?;
                    file.flush().await?;
                    tracing::trace!("Acquired lock {}", path.display());
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            match lock_age(&path).await {
                // Holder released it between our attempts
                None => continue,
                Some(age) if age > settings.stale_after => {
                    tracing::warn!(
                        "Reclaiming stale lock {} (age {:?})",
                        path.display(),
                        age
                    );
                    match fs::remove_file(&path).await {
                        Ok(()) => continue,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Some(_) => {}
            }

            if started.elapsed() >= settings.acquire_timeout {
                return Err(StoreError::LockTimeout { path });
            }

            tracing::trace!("Waiting for lock {}", path.display());
            tokio::time::sleep(settings.poll_interval).await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the lock file
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to remove lock {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Age of an existing lock, from its recorded timestamp or its mtime
///
/// Returns `None` if the lock file no longer exists.
async fn lock_age(path: &Path) -> Option<Duration> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(_) => String::new(),
    };

    if let Ok(created) = DateTime::parse_from_rfc3339(content.trim()) {
        let age = Utc::now().signed_duration_since(created.with_timezone(&Utc));
        return Some(age.to_std().unwrap_or(Duration::ZERO));
    }

    // Being written right now, or written by something else: fall back to mtime
    let modified = fs::metadata(path).await.ok()?.modified().ok()?;
    Some(modified.elapsed().unwrap_or(Duration::ZERO))
}
