//! Artifact resolution: the single entry point callers use.
//!
//! [`Loader`] owns the HTTP client and the lazily opened store, and
//! encapsulates every caching/network decision so callers never reason about
//! chunking. The dominant path after the first run is an artifact-namespace
//! hit with zero network calls.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};
use url::Url;

use wasmcache_fetch::{http_client, load_manifest};
use wasmcache_shared::{EntryMeta, FetchConfig, LoaderError, Result};
use wasmcache_storage::{Namespace, Store};

use crate::assembler::assemble;

// ---------------------------------------------------------------------------
// LoadProgress
// ---------------------------------------------------------------------------

/// Progress and completion callbacks for one resolution.
///
/// `artifact_ready` fires exactly once per successful `resolve`, on the
/// cache-hit path as well as after a fresh assembly, so consumers can react
/// to load completion without polling the cache.
pub trait LoadProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each chunk payload is accounted for during assembly.
    fn chunk_fetched(&self, name: &str, current: usize, total: usize);
    /// Called once the artifact payload is available.
    fn artifact_ready(&self, name: &str, size: usize);
    /// Called when post-assembly chunk cleanup fails (non-fatal).
    fn cleanup_failed(&self, chunks: &[String], error: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl LoadProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn chunk_fetched(&self, _name: &str, _current: usize, _total: usize) {}
    fn artifact_ready(&self, _name: &str, _size: usize) {}
    fn cleanup_failed(&self, _chunks: &[String], _error: &str) {}
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Resolves named artifacts against the durable cache, assembling from
/// chunked network resources on a miss.
pub struct Loader {
    base: Url,
    db_path: PathBuf,
    config: FetchConfig,
    client: Client,
    store: OnceCell<Arc<Store>>,
}

impl Loader {
    /// Create a loader for artifacts served under `base`, caching into the
    /// database at `db_path`. The store is opened lazily on first use.
    pub fn new(base: Url, db_path: PathBuf, config: FetchConfig) -> Result<Self> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self {
            base,
            db_path,
            config,
            client,
            store: OnceCell::new(),
        })
    }

    /// Open the backing store at most once per loader. A failed open is not
    /// memoized; the next operation retries it.
    async fn store(&self) -> Result<&Arc<Store>> {
        self.store
            .get_or_try_init(|| async {
                let store = Store::open(&self.db_path).await?;
                Ok(Arc::new(store))
            })
            .await
    }

    /// Resolve `name` to its complete binary payload.
    ///
    /// Cache hit: returns the stored payload with zero network calls.
    /// Cache miss: fetches the manifest, assembles all chunks, persists the
    /// artifact, and returns the assembled payload. Two concurrent resolves
    /// for the same name may both assemble; both write identical bytes and
    /// the last write wins.
    #[instrument(skip_all, fields(artifact = name))]
    pub async fn resolve(&self, name: &str, progress: &dyn LoadProgress) -> Result<Vec<u8>> {
        let store = self.store().await?;

        if let Some(cached) = store.get(Namespace::Artifacts, name).await? {
            debug!(artifact = name, size = cached.len(), "artifact cache hit");
            progress.artifact_ready(name, cached.len());
            return Ok(cached);
        }

        progress.phase("Fetching manifest");
        let manifest = load_manifest(&self.client, &self.base).await?;
        if manifest.filename != name {
            warn!(
                requested = name,
                target = %manifest.filename,
                "manifest target differs from requested artifact"
            );
        }

        progress.phase("Fetching chunks");
        let payload = assemble(
            &self.client,
            &self.base,
            &manifest,
            store,
            self.config.concurrency,
            progress,
        )
        .await?;

        progress.artifact_ready(&manifest.filename, payload.len());
        Ok(payload)
    }

    /// Direct cache inspection: is a complete artifact stored under `name`?
    pub async fn has_cached_artifact(&self, name: &str) -> Result<bool> {
        self.store().await?.contains(Namespace::Artifacts, name).await
    }

    /// Export a previously resolved artifact as a flat byte buffer.
    ///
    /// Fails with [`LoaderError::ArtifactNotFound`] if `name` was never
    /// successfully resolved — export performs no network or store mutation.
    pub async fn to_buffer(&self, name: &str) -> Result<Vec<u8>> {
        let store = self.store().await?;
        store
            .get(Namespace::Artifacts, name)
            .await?
            .ok_or_else(|| LoaderError::artifact_not_found(name))
    }

    /// Drop a cached artifact so the next `resolve` re-fetches it.
    /// Returns whether an entry existed.
    pub async fn evict(&self, name: &str) -> Result<bool> {
        self.store().await?.delete(Namespace::Artifacts, name).await
    }

    /// Metadata for all cached artifacts.
    pub async fn cached_artifacts(&self) -> Result<Vec<EntryMeta>> {
        self.store().await?.list(Namespace::Artifacts).await
    }

    /// Metadata for chunks left over from interrupted assemblies.
    pub async fn pending_chunks(&self) -> Result<Vec<EntryMeta>> {
        self.store().await?.list(Namespace::Chunks).await
    }
}
