//! JSON document store files
//!
//! Every write happens under the store's lock file, merges into whatever is
//! already on disk, and replaces the file with an atomic rename so readers
//! never observe a partial store.

use crate::storage::lock::{LockSettings, StoreLock};
use crate::storage::schema::{parse_store, serialize_store, DocumentStore, ParsedStore, StoreSource};
use crate::storage::similarity::SimilarityCheck;
use crate::storage::{PageRecord, StoreResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// What a merge did to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Pages inserted or overwritten
    pub written: usize,

    /// Pages already stored with identical data
    pub unchanged: usize,

    /// Pages skipped as near-duplicates of another stored page
    pub similar: usize,

    /// Error placeholders that would have replaced a real page
    pub preserved: usize,

    /// Whether the store file was rewritten
    pub wrote_file: bool,

    /// Where an unreadable previous file was copied, if it was
    pub corrupt_backup: Option<PathBuf>,
}

/// One source's document store file
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    lock: LockSettings,
}

impl JsonStore {
    pub fn new(path: PathBuf, lock: LockSettings) -> Self {
        Self { path, lock }
    }

    /// Store for a source inside `data_dir`, named after the source
    pub fn for_source(data_dir: &Path, source_name: &str, lock: LockSettings) -> Self {
        Self::new(
            data_dir.join(format!("{}.json", store_slug(source_name))),
            lock,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the store without recovery
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No store file exists yet
    /// * `Ok(Some(store))` - The file is in canonical shape
    /// * `Err(StoreError::Json)` - The file is not a canonical store
    pub async fn load(&self) -> StoreResult<Option<DocumentStore>> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Merges a batch of pages into the store file
    ///
    /// # Merge Rules
    ///
    /// 1. Pages identical to the stored entry are left alone
    /// 2. An error placeholder never replaces a real page
    /// 3. A page similar to a page stored under another URL is skipped
    /// 4. Everything else is inserted or overwritten; unrelated keys are kept
    ///
    /// If nothing changed and the file was already canonical, it is not
    /// rewritten.
    pub async fn merge(
        &self,
        source: &StoreSource,
        batch: &[(String, PageRecord)],
        similarity: &dyn SimilarityCheck,
    ) -> StoreResult<MergeReport> {
        self.ensure_parent().await?;

        let lock = StoreLock::acquire(&self.path, &self.lock).await?;
        let result = self.merge_locked(source, batch, similarity).await;
        lock.release().await;
        result
    }

    async fn merge_locked(
        &self,
        source: &StoreSource,
        batch: &[(String, PageRecord)],
        similarity: &dyn SimilarityCheck,
    ) -> StoreResult<MergeReport> {
        let mut report = MergeReport::default();
        let mut store = self.load_for_merge(source, &mut report).await?;

        for (url, page) in batch {
            if let Some(existing) = store.pages.get(url) {
                if existing == page {
                    report.unchanged += 1;
                    continue;
                }
                if page.is_error_page_for(url) && !existing.is_error_page_for(url) {
                    tracing::debug!("Keeping previously crawled content for {}", url);
                    report.preserved += 1;
                    continue;
                }
            }

            let duplicate_of = store
                .pages
                .iter()
                .find(|(key, existing)| *key != url && similarity.is_similar(existing, page))
                .map(|(key, _)| key.clone());
            if let Some(other) = duplicate_of {
                tracing::debug!("Skipping {}: near-duplicate of {}", url, other);
                report.similar += 1;
                continue;
            }

            store.pages.insert(url.clone(), page.clone());
            report.written += 1;
        }

        if report.written == 0 && report.corrupt_backup.is_none() {
            tracing::debug!(
                "No changes for {} ({} unchanged, {} similar)",
                self.path.display(),
                report.unchanged,
                report.similar
            );
            return Ok(report);
        }

        store.last_updated = Utc::now();
        let json = serialize_store(&store);
        self.write_atomic(json.as_bytes()).await?;
        report.wrote_file = true;

        tracing::debug!(
            "Wrote {} pages to {} ({} total)",
            report.written,
            self.path.display(),
            store.pages.len()
        );
        Ok(report)
    }

    /// Reads the existing store, recovering from damage
    async fn load_for_merge(
        &self,
        source: &StoreSource,
        report: &mut MergeReport,
    ) -> StoreResult<DocumentStore> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(DocumentStore::empty(source.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let parsed = match String::from_utf8(bytes) {
            Ok(text) => parse_store(&text, source),
            Err(e) => ParsedStore::Unreadable(e.to_string()),
        };

        match parsed {
            ParsedStore::Canonical(store) => Ok(store),
            ParsedStore::Salvaged { store, dropped } => {
                let backup = self.backup_corrupt().await?;
                tracing::warn!(
                    "Store {} was not in canonical shape; kept {} pages, dropped {} (backup at {})",
                    self.path.display(),
                    store.pages.len(),
                    dropped,
                    backup.display()
                );
                report.corrupt_backup = Some(backup);
                Ok(store)
            }
            ParsedStore::Unreadable(reason) => {
                let backup = self.backup_corrupt().await?;
                tracing::warn!(
                    "Store {} is unreadable ({}); starting fresh (backup at {})",
                    self.path.display(),
                    reason,
                    backup.display()
                );
                report.corrupt_backup = Some(backup);
                Ok(DocumentStore::empty(source.clone()))
            }
        }
    }

    async fn backup_corrupt(&self) -> StoreResult<PathBuf> {
        let backup = sibling(&self.path, &format!("corrupt-{}", timestamp()));
        fs::copy(&self.path, &backup).await?;
        Ok(backup)
    }

    /// Writes to `<store>.tmp` and renames it over the store
    ///
    /// The previous file is copied to `<store>.bak` until the rename succeeds.
    async fn write_atomic(&self, bytes: &[u8]) -> StoreResult<()> {
        let tmp = sibling(&self.path, "tmp");
        let bak = sibling(&self.path, "bak");

        if let Err(e) = write_synced(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        let had_original = fs::metadata(&self.path).await.is_ok();
        if had_original {
            fs::copy(&self.path, &bak).await?;
        }

        // rename replaces the target in one step, so the old store stays
        // readable until the new one is in place
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if had_original {
            let _ = fs::remove_file(&bak).await;
        }
        Ok(())
    }

    /// Writes a timestamped snapshot of `pages` next to the store
    ///
    /// Used when a flush fails, so buffered pages exist somewhere on disk.
    pub async fn write_emergency_backup(
        &self,
        source: &StoreSource,
        pages: BTreeMap<String, PageRecord>,
    ) -> StoreResult<PathBuf> {
        self.ensure_parent().await?;
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| store_slug(&source.name));
        let path = self
            .path
            .with_file_name(format!("{}.emergency-{}.json", stem, timestamp()));

        let store = DocumentStore {
            source: source.clone(),
            last_updated: Utc::now(),
            pages,
        };
        write_synced(&path, serialize_store(&store).as_bytes()).await?;
        Ok(path)
    }

    /// Moves an existing store aside so the next flush starts empty
    ///
    /// # Returns
    ///
    /// Where the old store was moved, or `None` if there was no store
    pub async fn reset(&self) -> StoreResult<Option<PathBuf>> {
        if fs::metadata(&self.path).await.is_err() {
            return Ok(None);
        }

        let lock = StoreLock::acquire(&self.path, &self.lock).await?;
        let moved = sibling(&self.path, &format!("reset-{}", timestamp()));
        let result = fs::rename(&self.path, &moved).await;
        lock.release().await;
        result?;
        Ok(Some(moved))
    }

    async fn ensure_parent(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}

/// File-name-safe form of a source name
///
/// # Examples
///
/// ```
/// use docsweep::storage::store_slug;
///
/// assert_eq!(store_slug("React Docs"), "react-docs");
/// assert_eq!(store_slug("node.js"), "node-js");
/// ```
pub fn store_slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "source".to_string()
    } else {
        slug
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn timestamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::similarity::{NeverSimilar, WordOverlap};
    use tempfile::TempDir;

    fn header() -> StoreSource {
        StoreSource {
            name: "docs".to_string(),
            url: "https://x.test".to_string(),
        }
    }

    fn store_in(dir: &TempDir) -> JsonStore {
        JsonStore::for_source(dir.path(), "docs", LockSettings::default())
    }

    fn page(url: &str, title: &str, content: &str) -> (String, PageRecord) {
        (url.to_string(), PageRecord::new(title, content))
    }

    #[test]
    fn test_sibling_paths() {
        let path = Path::new("/data/docs.json");
        assert_eq!(sibling(path, "tmp"), PathBuf::from("/data/docs.json.tmp"));
        assert_eq!(sibling(path, "bak"), PathBuf::from("/data/docs.json.bak"));
    }

    #[test]
    fn test_store_slug_fallback() {
        assert_eq!(store_slug("***"), "source");
    }

    #[tokio::test]
    async fn test_merge_creates_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let report = store
            .merge(&header(), &[page("https://x.test/a", "A", "alpha")], &NeverSimilar)
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert!(report.wrote_file);

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.source, header());
        assert_eq!(loaded.pages["https://x.test/a"].title, "A");
        assert!(!sibling(store.path(), "tmp").exists());
        assert!(!sibling(store.path(), "bak").exists());
        assert!(!sibling(store.path(), "lock").exists());
    }

    #[tokio::test]
    async fn test_unchanged_merge_skips_write() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let batch = [page("https://x.test/a", "A", "alpha")];

        store.merge(&header(), &batch, &NeverSimilar).await.unwrap();
        let before = std::fs::metadata(store.path()).unwrap().modified().unwrap();

        let report = store.merge(&header(), &batch, &NeverSimilar).await.unwrap();
        assert_eq!(report.unchanged, 1);
        assert!(!report.wrote_file);
        let after = std::fs::metadata(store.path()).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_error_page_does_not_replace_content() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .merge(&header(), &[page("https://x.test/a", "A", "alpha")], &NeverSimilar)
            .await
            .unwrap();

        let failure = (
            "https://x.test/a".to_string(),
            PageRecord::error_page("https://x.test/a", "timeout"),
        );
        let report = store.merge(&header(), &[failure], &NeverSimilar).await.unwrap();
        assert_eq!(report.preserved, 1);

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pages["https://x.test/a"].title, "A");
    }

    #[tokio::test]
    async fn test_similar_page_under_new_url_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let body = "Install the package with your manager and import the provider component";

        let report = store
            .merge(
                &header(),
                &[
                    page("https://x.test/install", "Install", body),
                    page("https://x.test/install-copy", "Install", body),
                ],
                &WordOverlap::default(),
            )
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.similar, 1);

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pages.len(), 1);
    }

    #[tokio::test]
    async fn test_same_url_update_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let body = "Install the package with your manager and import the provider component";
        store
            .merge(&header(), &[page("https://x.test/a", "A", body)], &WordOverlap::default())
            .await
            .unwrap();

        let updated = body.replace("manager", "toolchain");
        store
            .merge(&header(), &[page("https://x.test/a", "A", &updated)], &WordOverlap::default())
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pages["https://x.test/a"].content, updated);
    }

    #[tokio::test]
    async fn test_unreadable_store_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        let report = store
            .merge(&header(), &[page("https://x.test/a", "A", "alpha")], &NeverSimilar)
            .await
            .unwrap();

        let backup = report.corrupt_backup.expect("backup path");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pages.len(), 1);
    }

    #[tokio::test]
    async fn test_salvaged_store_is_rewritten_once() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"source":{"name":"docs","url":"https://x.test"},"lastUpdated":12345,
               "pages":{"https://x.test/a":{"title":"A","content":"alpha"}}}"#,
        )
        .unwrap();

        let batch = [page("https://x.test/a", "A", "alpha")];
        let first = store.merge(&header(), &batch, &NeverSimilar).await.unwrap();
        assert_eq!(first.unchanged, 1);
        assert!(first.corrupt_backup.is_some());
        assert!(first.wrote_file);

        for _ in 0..2 {
            let again = store.merge(&header(), &batch, &NeverSimilar).await.unwrap();
            assert!(again.corrupt_backup.is_none());
            assert!(!again.wrote_file);
        }

        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains(".corrupt-")
            })
            .count();
        assert_eq!(backups, 1);

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pages["https://x.test/a"].content, "alpha");
    }

    #[tokio::test]
    async fn test_emergency_backup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut pages = BTreeMap::new();
        pages.insert("https://x.test/a".to_string(), PageRecord::new("A", "alpha"));

        let path = store.write_emergency_backup(&header(), pages).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("docs.emergency-"));
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: DocumentStore = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.pages.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_moves_store_aside() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.reset().await.unwrap(), None);

        store
            .merge(&header(), &[page("https://x.test/a", "A", "alpha")], &NeverSimilar)
            .await
            .unwrap();
        let moved = store.reset().await.unwrap().unwrap();
        assert!(moved.exists());
        assert!(!store.path().exists());
    }
}
