//! Debounced per-source persistence
//!
//! Each source owns a slot with an in-memory page cache, the set of URLs not
//! yet flushed, and a flush phase:
//!
//! ```text
//! Idle --save--> Scheduled --debounce elapsed--> Flushing --> Idle
//!                    ^                               |
//!                    +------ saves arrived meanwhile-+
//! ```
//!
//! Saves made while a flush is scheduled or running attach to it; at most
//! one timer task exists per source.

use crate::config::OutputConfig;
use crate::storage::json_store::JsonStore;
use crate::storage::lock::LockSettings;
use crate::storage::schema::StoreSource;
use crate::storage::similarity::{SimilarityCheck, WordOverlap};
use crate::storage::traits::PageSink;
use crate::storage::{PageRecord, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Where and how the pipeline writes
#[derive(Debug, Clone)]
pub struct PersistenceSettings {
    pub data_dir: PathBuf,
    pub debounce: Duration,
    pub lock: LockSettings,
}

impl From<&OutputConfig> for PersistenceSettings {
    fn from(config: &OutputConfig) -> Self {
        Self {
            data_dir: PathBuf::from(&config.data_dir),
            debounce: Duration::from_millis(config.debounce_ms),
            lock: LockSettings::from(config),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushPhase {
    Idle,
    Scheduled,
    Flushing,
}

struct SourceSlot {
    source: StoreSource,
    store: Arc<JsonStore>,
    /// Serializes flushes of this source within the process
    write_guard: Arc<tokio::sync::Mutex<()>>,
    cache: HashMap<String, PageRecord>,
    pending: BTreeSet<String>,
    phase: FlushPhase,
    flushes: u64,
}

struct PipelineInner {
    settings: PersistenceSettings,
    similarity: Arc<dyn SimilarityCheck>,
    slots: Mutex<HashMap<String, SourceSlot>>,
}

/// Buffers pages per source and merges them into the source's store
///
/// Cloning is cheap; clones share the same buffers.
#[derive(Clone)]
pub struct PersistencePipeline {
    inner: Arc<PipelineInner>,
}

impl PersistencePipeline {
    pub fn new(settings: PersistenceSettings) -> Self {
        Self::with_similarity(settings, Arc::new(WordOverlap::default()))
    }

    pub fn with_similarity(
        settings: PersistenceSettings,
        similarity: Arc<dyn SimilarityCheck>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                settings,
                similarity,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn settings(&self) -> &PersistenceSettings {
        &self.inner.settings
    }

    /// The store file a source's pages are written to
    pub fn store_for(&self, source_name: &str) -> JsonStore {
        JsonStore::for_source(
            &self.inner.settings.data_dir,
            source_name,
            self.inner.settings.lock.clone(),
        )
    }

    /// Number of flushes that wrote (or tried to write) a batch for `source_name`
    pub fn flush_count(&self, source_name: &str) -> u64 {
        self.inner
            .lock_slots()
            .get(source_name)
            .map(|slot| slot.flushes)
            .unwrap_or(0)
    }

    /// Number of URLs buffered but not yet persisted for `source_name`
    pub fn pending_count(&self, source_name: &str) -> usize {
        self.inner
            .lock_slots()
            .get(source_name)
            .map(|slot| slot.pending.len())
            .unwrap_or(0)
    }
}

impl PipelineInner {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, SourceSlot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Timer task for one source; exits once the source has nothing pending
    async fn run_flush_cycle(self: Arc<Self>, key: String) {
        loop {
            tokio::time::sleep(self.settings.debounce).await;

            if let Some(slot) = self.lock_slots().get_mut(&key) {
                slot.phase = FlushPhase::Flushing;
            }

            let result = self.flush_source(&key).await;

            let again = {
                let mut slots = self.lock_slots();
                match slots.get_mut(&key) {
                    Some(slot) if result.is_ok() && !slot.pending.is_empty() => {
                        slot.phase = FlushPhase::Scheduled;
                        true
                    }
                    Some(slot) => {
                        slot.phase = FlushPhase::Idle;
                        false
                    }
                    None => false,
                }
            };

            if !again {
                return;
            }
        }
    }

    /// Merges every pending page of one source into its store
    ///
    /// A failed merge is retried once. If that also fails, the pages stay
    /// pending and everything buffered for the source is written to an
    /// emergency snapshot.
    async fn flush_source(&self, key: &str) -> StoreResult<()> {
        let Some((source, store, guard)) = self
            .lock_slots()
            .get(key)
            .map(|slot| (slot.source.clone(), slot.store.clone(), slot.write_guard.clone()))
        else {
            return Ok(());
        };

        let _write = guard.lock().await;

        let batch: Vec<(String, PageRecord)> = {
            let mut slots = self.lock_slots();
            let Some(slot) = slots.get_mut(key) else {
                return Ok(());
            };
            let batch: Vec<_> = slot
                .pending
                .iter()
                .filter_map(|url| slot.cache.get(url).map(|page| (url.clone(), page.clone())))
                .collect();
            if !batch.is_empty() {
                slot.flushes += 1;
            }
            batch
        };

        if batch.is_empty() {
            return Ok(());
        }

        let similarity = self.similarity.as_ref();
        let result = match store.merge(&source, &batch, similarity).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::warn!("Flush of {} failed, retrying once: {}", source.name, e);
                store.merge(&source, &batch, similarity).await
            }
        };

        match result {
            Ok(report) => {
                let mut slots = self.lock_slots();
                if let Some(slot) = slots.get_mut(key) {
                    for (url, page) in &batch {
                        // A newer save for the same URL stays pending
                        if slot.cache.get(url) == Some(page) {
                            slot.pending.remove(url);
                        }
                    }
                }
                tracing::debug!(
                    "Flushed {} pages for {} ({} written, {} unchanged, {} similar)",
                    batch.len(),
                    source.name,
                    report.written,
                    report.unchanged,
                    report.similar
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to persist pages for {}: {}", source.name, e);
                let snapshot: BTreeMap<String, PageRecord> = self
                    .lock_slots()
                    .get(key)
                    .map(|slot| {
                        slot.cache
                            .iter()
                            .map(|(url, page)| (url.clone(), page.clone()))
                            .collect()
                    })
                    .unwrap_or_default();

                match store.write_emergency_backup(&source, snapshot).await {
                    Ok(path) => tracing::warn!(
                        "Wrote emergency backup for {} to {}",
                        source.name,
                        path.display()
                    ),
                    Err(backup_err) => tracing::error!(
                        "Emergency backup for {} also failed: {}",
                        source.name,
                        backup_err
                    ),
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PageSink for PersistencePipeline {
    fn save_page(&self, source: &StoreSource, url: &str, page: PageRecord) {
        let schedule = {
            let mut slots = self.inner.lock_slots();
            let slot = slots.entry(source.name.clone()).or_insert_with(|| SourceSlot {
                source: source.clone(),
                store: Arc::new(self.store_for(&source.name)),
                write_guard: Arc::new(tokio::sync::Mutex::new(())),
                cache: HashMap::new(),
                pending: BTreeSet::new(),
                phase: FlushPhase::Idle,
                flushes: 0,
            });

            slot.cache.insert(url.to_string(), page);
            slot.pending.insert(url.to_string());

            if slot.phase == FlushPhase::Idle {
                slot.phase = FlushPhase::Scheduled;
                true
            } else {
                false
            }
        };

        if schedule {
            tracing::trace!("Scheduling flush for {}", source.name);
            tokio::spawn(self.inner.clone().run_flush_cycle(source.name.clone()));
        }
    }

    async fn flush_all(&self) -> StoreResult<()> {
        let keys: Vec<String> = self.inner.lock_slots().keys().cloned().collect();

        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.inner.flush_source(&key).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::similarity::NeverSimilar;
    use tempfile::TempDir;

    fn settings(dir: &TempDir, debounce_ms: u64) -> PersistenceSettings {
        PersistenceSettings {
            data_dir: dir.path().to_path_buf(),
            debounce: Duration::from_millis(debounce_ms),
            lock: LockSettings::default(),
        }
    }

    fn header(name: &str) -> StoreSource {
        StoreSource {
            name: name.to_string(),
            url: "https://x.test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_flush_all_without_saves() {
        let dir = TempDir::new().unwrap();
        let pipeline = PersistencePipeline::new(settings(&dir, 10));
        pipeline.flush_all().await.unwrap();
        assert_eq!(pipeline.flush_count("docs"), 0);
    }

    #[tokio::test]
    async fn test_flush_all_writes_pending_pages() {
        let dir = TempDir::new().unwrap();
        // Long debounce so only flush_all writes
        let pipeline = PersistencePipeline::with_similarity(
            settings(&dir, 60_000),
            Arc::new(NeverSimilar),
        );

        pipeline.save_page(&header("docs"), "https://x.test/a", PageRecord::new("A", "alpha"));
        pipeline.save_page(&header("docs"), "https://x.test/b", PageRecord::new("B", "beta"));
        assert_eq!(pipeline.pending_count("docs"), 2);

        pipeline.flush_all().await.unwrap();
        assert_eq!(pipeline.pending_count("docs"), 0);
        assert_eq!(pipeline.flush_count("docs"), 1);

        let store = pipeline.store_for("docs").load().await.unwrap().unwrap();
        assert_eq!(store.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_sources_use_separate_stores() {
        let dir = TempDir::new().unwrap();
        let pipeline = PersistencePipeline::new(settings(&dir, 60_000));

        pipeline.save_page(&header("alpha"), "https://x.test/a", PageRecord::new("A", "one"));
        pipeline.save_page(&header("beta"), "https://y.test/a", PageRecord::new("A", "two"));
        pipeline.flush_all().await.unwrap();

        assert!(dir.path().join("alpha.json").exists());
        assert!(dir.path().join("beta.json").exists());
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_pages_pending() {
        let dir = TempDir::new().unwrap();
        let pipeline = PersistencePipeline::new(settings(&dir, 60_000));
        // A directory where the store file should be makes every write fail
        std::fs::create_dir(dir.path().join("docs.json")).unwrap();

        pipeline.save_page(&header("docs"), "https://x.test/a", PageRecord::new("A", "alpha"));
        assert!(pipeline.flush_all().await.is_err());
        assert_eq!(pipeline.pending_count("docs"), 1);

        let emergency = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with("docs.emergency-"));
        assert!(emergency);
    }
}
