//! Document store file shape
//!
//! One JSON file per source, read by the downstream search component:
//!
//! ```json
//! { "source": {"name": "docs", "url": "https://x.test/a"},
//!   "lastUpdated": "2024-01-01T00:00:00Z",
//!   "pages": { "https://x.test/a": {"title": "A", "content": "..."} } }
//! ```

use crate::storage::PageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `source` header of a document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSource {
    pub name: String,
    pub url: String,
}

/// The on-disk document store of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStore {
    pub source: StoreSource,
    pub last_updated: DateTime<Utc>,
    pub pages: BTreeMap<String, PageRecord>,
}

impl DocumentStore {
    pub fn empty(source: StoreSource) -> Self {
        Self {
            source,
            last_updated: Utc::now(),
            pages: BTreeMap::new(),
        }
    }

    /// Number of pages that are crawl-failure placeholders
    pub fn error_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|(url, page)| page.is_error_page_for(url))
            .count()
    }
}

/// Outcome of reading an existing store file
#[derive(Debug)]
pub enum ParsedStore {
    /// The file matched the canonical shape
    Canonical(DocumentStore),

    /// The file was a JSON object with a `pages` object, but not canonical;
    /// the well-formed pages were kept
    Salvaged { store: DocumentStore, dropped: usize },

    /// Nothing usable could be read
    Unreadable(String),
}

/// Parses store file contents
///
/// Only the canonical shape is supported. A document that fails canonical
/// parsing but still has a `pages` object keeps every entry that is a valid
/// `{title, content}` pair; anything else is unreadable.
pub fn parse_store(text: &str, fallback_source: &StoreSource) -> ParsedStore {
    let canonical_err = match serde_json::from_str::<DocumentStore>(text) {
        Ok(store) => return ParsedStore::Canonical(store),
        Err(e) => e,
    };

    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return ParsedStore::Unreadable(e.to_string()),
    };

    let Some(pages) = value.get("pages").and_then(|p| p.as_object()) else {
        return ParsedStore::Unreadable(canonical_err.to_string());
    };

    let source = value
        .get("source")
        .and_then(|s| serde_json::from_value::<StoreSource>(s.clone()).ok())
        .unwrap_or_else(|| fallback_source.clone());

    let mut store = DocumentStore::empty(source);
    let mut dropped = 0;
    for (url, page) in pages {
        match serde_json::from_value::<PageRecord>(page.clone()) {
            Ok(record) => {
                store.pages.insert(url.clone(), record);
            }
            Err(_) => dropped += 1,
        }
    }

    ParsedStore::Salvaged { store, dropped }
}

/// Serializes a store, never failing
///
/// Falls back to dropping pages that cannot be serialized on their own, and
/// as a last resort to an empty store with the same header.
pub fn serialize_store(store: &DocumentStore) -> String {
    match serde_json::to_string_pretty(store) {
        Ok(json) => return json,
        Err(e) => tracing::warn!(
            "Failed to serialize store for {}, retrying without bad pages: {}",
            store.source.name,
            e
        ),
    }

    let mut filtered = store.clone();
    filtered.pages.retain(|url, page| match serde_json::to_value(page) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Dropping unserializable page {}: {}", url, e);
            false
        }
    });

    match serde_json::to_string_pretty(&filtered) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(
                "Writing empty store for {} after serialization failure: {}",
                store.source.name,
                e
            );
            serde_json::json!({
                "source": { "name": store.source.name, "url": store.source.url },
                "lastUpdated": store.last_updated.to_rfc3339(),
                "pages": {},
            })
            .to_string()
        }
    }
}
