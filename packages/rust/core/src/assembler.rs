//! Concurrent chunk assembly.
//!
//! Fetches every chunk a manifest lists, concatenates the payloads in
//! manifest order, persists the result as one artifact, and evicts the
//! now-redundant chunks.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use url::Url;

use wasmcache_fetch::fetch_chunk;
use wasmcache_shared::{ChunkManifest, LoaderError, Result};
use wasmcache_storage::{Namespace, Store};

use crate::resolver::LoadProgress;

/// Fetch all chunks of `manifest` concurrently and assemble the artifact.
///
/// All-or-nothing: if any chunk fetch fails, the failure is returned and no
/// artifact is written. Chunks that did complete stay in the chunk namespace
/// and are reused by the next attempt. On success the artifact is stored
/// under `manifest.filename` and every manifest-listed chunk is deleted;
/// cleanup failure is logged and reported via `progress`, never returned.
#[instrument(skip_all, fields(artifact = %manifest.filename, chunks = manifest.chunks.len()))]
pub async fn assemble(
    client: &Client,
    base: &Url,
    manifest: &ChunkManifest,
    store: &Arc<Store>,
    concurrency: u32,
    progress: &dyn LoadProgress,
) -> Result<Vec<u8>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1) as usize));

    let mut handles = Vec::with_capacity(manifest.chunks.len());
    for name in &manifest.chunks {
        let client = client.clone();
        let base = base.clone();
        let store = Arc::clone(store);
        let sem = Arc::clone(&semaphore);
        let name = name.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem
                .acquire()
                .await
                .map_err(|e| LoaderError::Internal(format!("semaphore closed: {e}")))?;
            fetch_chunk(&client, &base, &name, &store).await
        }));
    }

    // Await in manifest index order so concatenation never depends on
    // completion order.
    let total = handles.len();
    let mut parts: Vec<Vec<u8>> = Vec::with_capacity(total);
    for (idx, (handle, name)) in handles.into_iter().zip(&manifest.chunks).enumerate() {
        let payload = handle.await.map_err(|e| {
            LoaderError::Internal(format!("chunk task for '{name}' failed: {e}"))
        })??;
        progress.chunk_fetched(name, idx + 1, total);
        parts.push(payload);
    }

    let total_size: usize = parts.iter().map(Vec::len).sum();
    let mut payload = Vec::with_capacity(total_size);
    for part in &parts {
        payload.extend_from_slice(part);
    }

    info!(chunks = total, total_size, "assembled artifact");

    store
        .put(Namespace::Artifacts, &manifest.filename, &payload)
        .await?;

    // The chunks are redundant once the artifact is durable.
    if let Err(e) = store.delete_many(Namespace::Chunks, &manifest.chunks).await {
        warn!(artifact = %manifest.filename, error = %e, "chunk cleanup failed");
        progress.cleanup_failed(&manifest.chunks, &e.to_string());
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::resolver::SilentProgress;
    use wasmcache_fetch::http_client;

    async fn test_store() -> Arc<Store> {
        let tmp = std::env::temp_dir().join(format!("wc_asm_test_{}.db", Uuid::now_v7()));
        Arc::new(Store::open(&tmp).await.expect("open test db"))
    }

    async fn mount_chunk(server: &MockServer, name: &str, body: Vec<u8>, delay_ms: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/assets/chunks/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(body)
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn concatenates_in_manifest_order_not_completion_order() {
        let server = MockServer::start().await;
        // The first manifest entry completes last, the last completes first.
        mount_chunk(&server, "c2", vec![0xB2], 150).await;
        mount_chunk(&server, "c0", vec![0xC0], 50).await;
        mount_chunk(&server, "c1", vec![0xA1], 0).await;

        let store = test_store().await;
        let client = http_client(5).unwrap();
        let base = Url::parse(&format!("{}/assets", server.uri())).unwrap();
        let manifest = ChunkManifest {
            filename: "core.wasm".into(),
            chunks: vec!["c2".into(), "c0".into(), "c1".into()],
        };

        let payload = assemble(&client, &base, &manifest, &store, 4, &SilentProgress)
            .await
            .expect("assemble");

        assert_eq!(payload, vec![0xB2, 0xC0, 0xA1]);
    }

    #[tokio::test]
    async fn persists_artifact_and_deletes_chunks() {
        let server = MockServer::start().await;
        mount_chunk(&server, "a.bin", vec![0x01, 0x02], 0).await;
        mount_chunk(&server, "b.bin", vec![0x03, 0x04], 0).await;

        let store = test_store().await;
        let client = http_client(5).unwrap();
        let base = Url::parse(&format!("{}/assets", server.uri())).unwrap();
        let manifest = ChunkManifest {
            filename: "core.wasm".into(),
            chunks: vec!["a.bin".into(), "b.bin".into()],
        };

        let payload = assemble(&client, &base, &manifest, &store, 4, &SilentProgress)
            .await
            .expect("assemble");
        assert_eq!(payload, vec![0x01, 0x02, 0x03, 0x04]);

        // Artifact readable under the manifest target name
        let stored = store.get(Namespace::Artifacts, "core.wasm").await.unwrap();
        assert_eq!(stored, Some(vec![0x01, 0x02, 0x03, 0x04]));

        // Every manifest chunk evicted
        assert!(store.list(Namespace::Chunks).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_chunk_failure_aborts_without_artifact() {
        let server = MockServer::start().await;
        mount_chunk(&server, "a.bin", vec![0x01], 0).await;
        Mock::given(method("GET"))
            .and(path("/assets/chunks/b.bin"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = test_store().await;
        let client = http_client(5).unwrap();
        let base = Url::parse(&format!("{}/assets", server.uri())).unwrap();
        let manifest = ChunkManifest {
            filename: "core.wasm".into(),
            chunks: vec!["a.bin".into(), "b.bin".into()],
        };

        let err = assemble(&client, &base, &manifest, &store, 4, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("b.bin"));

        // No partial artifact was written
        assert!(
            !store
                .contains(Namespace::Artifacts, "core.wasm")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn empty_manifest_yields_empty_artifact() {
        let server = MockServer::start().await;
        let store = test_store().await;
        let client = http_client(5).unwrap();
        let base = Url::parse(&format!("{}/assets", server.uri())).unwrap();
        let manifest = ChunkManifest {
            filename: "core.wasm".into(),
            chunks: vec![],
        };

        let payload = assemble(&client, &base, &manifest, &store, 4, &SilentProgress)
            .await
            .expect("assemble");
        assert!(payload.is_empty());
        assert_eq!(
            store.get(Namespace::Artifacts, "core.wasm").await.unwrap(),
            Some(vec![])
        );
    }
}
