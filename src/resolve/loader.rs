//! Document loading: the injected loader and the single-flight cache
//!
//! The cache keys one `tokio::sync::OnceCell` per absolute document URI.
//! Concurrent fetches of one URI wait on the same cell, so the loader runs
//! once. Loader and parse failures are memoized like successes; a timed-out
//! or cancelled load leaves the cell empty so the next caller loads again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use url::Url;

use crate::error::{LoadError, ResolutionCause};
use crate::schema::{parse::parse_value, Document, SchemaDialect};

/// Injected I/O boundary: fetch the raw bytes behind a document URI
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, uri: &Url) -> Result<Vec<u8>, LoadError>;
}

// =============================================================================
// Memory Loader
// =============================================================================

/// Loader over an in-memory URI → bytes table
#[derive(Debug, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(uri, contents);
        self
    }

    /// Sleep before answering each load
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&mut self, uri: &str, contents: impl Into<Vec<u8>>) {
        self.documents.insert(uri.to_string(), contents.into());
    }

    /// Number of `load` calls observed so far
    pub fn load_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for MemoryLoader {
    async fn load(&self, uri: &Url) -> Result<Vec<u8>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.documents
            .get(uri.as_str())
            .cloned()
            .ok_or_else(|| LoadError::NotFound(uri.to_string()))
    }
}

// =============================================================================
// Single-flight Cache
// =============================================================================

/// Definitive outcome of loading one URI
type LoadOutcome = Result<Arc<Document>, ResolutionCause>;

/// Memoized, coalescing document cache keyed by absolute URI
pub struct DocumentCache {
    loader: Arc<dyn DocumentLoader>,
    dialect: SchemaDialect,
    timeout: Option<Duration>,
    cells: Mutex<HashMap<Url, Arc<OnceCell<LoadOutcome>>>>,
}

impl DocumentCache {
    /// `dialect` applies to documents that do not declare their own
    pub fn new(loader: Arc<dyn DocumentLoader>, dialect: SchemaDialect) -> Self {
        Self {
            loader,
            dialect,
            timeout: None,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Bound each individual load
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fetch and parse `uri`, sharing one load among all concurrent callers
    pub async fn fetch(&self, uri: &Url) -> LoadOutcome {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            cells.entry(uri.clone()).or_default().clone()
        };

        if cell.initialized() {
            tracing::debug!(uri = %uri, "document cache hit");
        }

        let outcome = cell
            .get_or_try_init(|| self.load_once(uri))
            .await
            .map_err(ResolutionCause::Load)?;
        outcome.clone()
    }

    /// Whether a definitive outcome is cached for `uri`
    pub fn contains(&self, uri: &Url) -> bool {
        let cells = self.cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cells.get(uri).is_some_and(|cell| cell.initialized())
    }

    /// `Err` only for outcomes that must not be memoized (timeouts)
    async fn load_once(&self, uri: &Url) -> Result<LoadOutcome, LoadError> {
        tracing::debug!(uri = %uri, "loading external document");

        let loaded = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.loader.load(uri))
                .await
                .map_err(|_| LoadError::Timeout(limit))?,
            None => self.loader.load(uri).await,
        };

        let outcome = match loaded {
            Ok(bytes) => self.parse(uri, &bytes),
            Err(err) => {
                tracing::warn!(uri = %uri, error = %err, "document load failed");
                Err(ResolutionCause::Load(err))
            }
        };
        Ok(outcome)
    }

    fn parse(&self, uri: &Url, bytes: &[u8]) -> LoadOutcome {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ResolutionCause::Parse(e.into()))?;
        let dialect = SchemaDialect::detect(&value).unwrap_or(self.dialect);
        parse_value(&value, uri.as_str(), dialect)
            .map(Arc::new)
            .map_err(ResolutionCause::Parse)
    }
}

impl std::fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("dialect", &self.dialect)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_load() {
        let loader = Arc::new(
            MemoryLoader::new()
                .with_document("file:///common.json", r#"{"definitions":{"Id":{"type":"string"}}}"#)
                .with_delay(Duration::from_millis(20)),
        );
        let cache = Arc::new(DocumentCache::new(loader.clone(), SchemaDialect::Draft7));
        let target = uri("file:///common.json");

        let (a, b, c) = tokio::join!(cache.fetch(&target), cache.fetch(&target), cache.fetch(&target));
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(loader.load_count(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn test_failures_are_memoized() {
        let loader = Arc::new(MemoryLoader::new());
        let cache = DocumentCache::new(loader.clone(), SchemaDialect::Draft7);
        let missing = uri("file:///missing.json");

        let first = cache.fetch(&missing).await.unwrap_err();
        let second = cache.fetch(&missing).await.unwrap_err();

        assert_eq!(first, second);
        assert!(matches!(first, ResolutionCause::Load(LoadError::NotFound(_))));
        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_leaves_cell_reusable() {
        let slow = Arc::new(
            MemoryLoader::new()
                .with_document("file:///slow.json", "{}")
                .with_delay(Duration::from_millis(200)),
        );
        let cache = DocumentCache::new(slow.clone(), SchemaDialect::Draft7)
            .with_timeout(Duration::from_millis(10));
        let target = uri("file:///slow.json");

        let err = cache.fetch(&target).await.unwrap_err();
        assert!(matches!(err, ResolutionCause::Load(LoadError::Timeout(_))));
        assert!(!cache.contains(&target));

        // A second attempt is a fresh load, not a wait on a dead entry.
        let _ = cache.fetch(&target).await;
        assert_eq!(slow.load_count(), 2);
    }

    #[test]
    fn test_parse_failure_is_reported() {
        let loader = Arc::new(MemoryLoader::new().with_document("file:///bad.json", r#"{"type": 5}"#));
        let cache = DocumentCache::new(loader, SchemaDialect::Draft7);

        let result = tokio_test::block_on(cache.fetch(&uri("file:///bad.json")));
        assert!(matches!(result, Err(ResolutionCause::Parse(_))));
    }
}
