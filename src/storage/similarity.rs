//! Near-duplicate detection for pages entering a document store

use crate::storage::PageRecord;
use std::collections::HashSet;

/// Decides whether a candidate page duplicates one already stored
pub trait SimilarityCheck: Send + Sync {
    fn is_similar(&self, existing: &PageRecord, candidate: &PageRecord) -> bool;
}

/// Word-overlap heuristic
///
/// Two pages are similar when their titles are identical and their contents
/// have nearly the same word count and share most significant words.
#[derive(Debug, Clone)]
pub struct WordOverlap {
    /// Tokens shorter than this are not significant
    pub min_word_len: usize,

    /// Required share of significant words, relative to the larger set
    pub overlap_threshold: f64,

    /// Allowed relative difference in total word count
    pub word_count_tolerance: f64,
}

impl Default for WordOverlap {
    fn default() -> Self {
        Self {
            min_word_len: 4,
            overlap_threshold: 0.7,
            word_count_tolerance: 0.1,
        }
    }
}

impl WordOverlap {
    /// Compares two page bodies
    ///
    /// # Examples
    ///
    /// ```
    /// use docsweep::storage::WordOverlap;
    ///
    /// let check = WordOverlap::default();
    /// assert!(check.content_similar(
    ///     "install the package then configure your project settings",
    ///     "install the package then configure your project options",
    /// ));
    /// assert!(!check.content_similar("install the package", "a completely different page about routing"));
    /// ```
    pub fn content_similar(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }

        let count_a = a.split_whitespace().count();
        let count_b = b.split_whitespace().count();
        if count_a == 0 || count_b == 0 {
            return count_a == count_b;
        }

        let larger = count_a.max(count_b) as f64;
        let diff = (count_a as f64 - count_b as f64).abs();
        if diff / larger > self.word_count_tolerance {
            return false;
        }

        let words_a = self.significant_words(a);
        let words_b = self.significant_words(b);
        let larger_set = words_a.len().max(words_b.len());
        if larger_set == 0 {
            return true;
        }

        let shared = words_a.intersection(&words_b).count();
        shared as f64 / larger_set as f64 >= self.overlap_threshold
    }

    fn significant_words(&self, text: &str) -> HashSet<String> {
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.chars().count() >= self.min_word_len)
            .collect()
    }
}

impl SimilarityCheck for WordOverlap {
    fn is_similar(&self, existing: &PageRecord, candidate: &PageRecord) -> bool {
        existing.title == candidate.title && self.content_similar(&existing.content, &candidate.content)
    }
}

/// Treats every page as distinct
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSimilar;

impl SimilarityCheck for NeverSimilar {
    fn is_similar(&self, _existing: &PageRecord, _candidate: &PageRecord) -> bool {
        false
    }
}
