//! Catalog resolver for transaction types and categories
//!
//! Each taxonomy is scanned once per process into two lookup tables
//! (by canonical id, by lower-cased name) and never refreshed; a restart
//! is the only invalidation path. Free-text input is scored against every
//! known name with a normalized edit distance so the caller can decide
//! whether to auto-correct or surface alternatives.

use crate::datastore::DocumentStore;
use crate::error::AgentError;
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// One canonical taxonomy entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

/// A catalog entry scored against a free-text query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    pub id: String,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Types,
    Categories,
}

impl CatalogKind {
    pub fn collection(&self) -> &'static str {
        match self {
            CatalogKind::Types => "transactionTypes",
            CatalogKind::Categories => "transactionCategories",
        }
    }
}

/// Lookup tables for one taxonomy, immutable once built
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl Catalog {
    pub fn from_documents(documents: &[serde_json::Value]) -> Self {
        let mut entries = Vec::with_capacity(documents.len());
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for doc in documents {
            let id = doc
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let name = doc
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .trim()
                .to_string();

            if id.is_empty() || name.is_empty() {
                continue;
            }

            by_id.insert(id.clone(), name.clone());
            by_name.insert(name.to_lowercase(), name.clone());
            entries.push(CatalogEntry { id, name });
        }

        Self {
            entries,
            by_id,
            by_name,
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical name for an id, or None if the id is unknown.
    /// Callers fall back to their raw input; this is not an error.
    pub fn resolve_id(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(|s| s.as_str())
    }

    /// Canonical name for an exact (case-insensitive) name match.
    pub fn canonical_name(&self, raw: &str) -> Option<&str> {
        self.by_name.get(&raw.to_lowercase()).map(|s| s.as_str())
    }

    /// Score the query against every known name, best first.
    pub fn rank(&self, query: &str) -> Vec<ScoredEntry> {
        let needle = normalize_name(query);
        let mut scored: Vec<ScoredEntry> = self
            .entries
            .iter()
            .map(|entry| ScoredEntry {
                id: entry.id.clone(),
                name: entry.name.clone(),
                score: similarity(&needle, &normalize_name(&entry.name)),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// Best-scoring entry for the query, if the catalog is non-empty.
    pub fn best_match(&self, query: &str) -> Option<ScoredEntry> {
        self.rank(query).into_iter().next()
    }
}

/// Process-wide catalog caches, built once and read for the life of the
/// process. Two concurrent cold builds may race; both produce the same
/// tables and OnceCell keeps exactly one.
pub struct CatalogCache {
    store: Arc<dyn DocumentStore>,
    types: OnceCell<Catalog>,
    categories: OnceCell<Catalog>,
}

impl CatalogCache {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            types: OnceCell::new(),
            categories: OnceCell::new(),
        }
    }

    pub async fn types(&self) -> Result<&Catalog> {
        self.load(CatalogKind::Types, &self.types).await
    }

    pub async fn categories(&self) -> Result<&Catalog> {
        self.load(CatalogKind::Categories, &self.categories).await
    }

    pub async fn catalog(&self, kind: CatalogKind) -> Result<&Catalog> {
        match kind {
            CatalogKind::Types => self.types().await,
            CatalogKind::Categories => self.categories().await,
        }
    }

    async fn load<'a>(&'a self, kind: CatalogKind, cell: &'a OnceCell<Catalog>) -> Result<&'a Catalog> {
        cell.get_or_try_init(|| async move {
            let documents = self
                .store
                .list_collection(kind.collection())
                .await
                .map_err(|e| {
                    AgentError::CatalogError(format!(
                        "Failed to load {}: {}",
                        kind.collection(),
                        e
                    ))
                })?;

            let catalog = Catalog::from_documents(&documents);
            info!(
                collection = kind.collection(),
                entries = catalog.len(),
                "Catalog loaded"
            );
            Ok(catalog)
        })
        .await
    }
}

//
// ================= Name Scoring =================
//

/// Case-fold and strip Latin diacritics so "Educación" matches "educacion".
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Normalized similarity in [0, 1]: 1 minus edit distance over the longer
/// length. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - (levenshtein_distance(a, b) as f64 / longest as f64)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() {
        return b.chars().count();
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let b_chars = b.chars().collect::<Vec<_>>();
    let mut previous = (0..=b_chars.len()).collect::<Vec<_>>();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, left) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, right) in b_chars.iter().enumerate() {
            let substitution_cost = if left == *right { 0 } else { 1 };
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            let substitution = previous[j] + substitution_cost;
            current[j + 1] = deletion.min(insertion).min(substitution);
        }
        previous.clone_from_slice(&current);
    }

    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::InMemoryDocumentStore;
    use serde_json::json;

    fn sample_catalog() -> Catalog {
        Catalog::from_documents(&[
            json!({"id": "1", "name": "Comida"}),
            json!({"id": "2", "name": "Transporte"}),
            json!({"id": "3", "name": "Educación"}),
        ])
    }

    #[test]
    fn test_resolve_id() {
        let catalog = sample_catalog();
        assert_eq!(catalog.resolve_id("2"), Some("Transporte"));
        assert_eq!(catalog.resolve_id("99"), None);
    }

    #[test]
    fn test_canonical_name_is_case_insensitive() {
        let catalog = sample_catalog();
        assert_eq!(catalog.canonical_name("comida"), Some("Comida"));
        assert_eq!(catalog.canonical_name("COMIDA"), Some("Comida"));
    }

    #[test]
    fn test_fuzzy_match_tolerates_typos_and_accents() {
        let catalog = sample_catalog();
        let best = catalog.best_match("educacion").unwrap();
        assert_eq!(best.name, "Educación");
        assert!(best.score >= 0.8);

        let best = catalog.best_match("comda").unwrap();
        assert_eq!(best.name, "Comida");
    }

    #[test]
    fn test_ranking_is_idempotent() {
        let catalog = sample_catalog();
        let first = catalog.rank("transporte publico");
        let second = catalog.rank("transporte publico");
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.score, b.score);
        }
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[tokio::test]
    async fn test_cache_builds_once() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .insert("transactionTypes", "1", json!({"id": "1", "name": "Gasto"}))
            .await;

        let cache = CatalogCache::new(store.clone());
        let first = cache.types().await.unwrap().len();

        // New entries after the first build are invisible until restart
        store
            .insert("transactionTypes", "2", json!({"id": "2", "name": "Ingreso"}))
            .await;
        let second = cache.types().await.unwrap().len();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }
}
