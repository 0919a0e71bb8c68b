//! Store-first chunk retrieval.

use reqwest::Client;
use tracing::debug;
use url::Url;

use wasmcache_shared::{LoaderError, Result};
use wasmcache_storage::{Namespace, Store};

use crate::chunk_url;

/// Retrieve the chunk `name`, consulting the store before the network.
///
/// A cached chunk is returned as-is (no freshness check, no TTL). On a miss
/// the chunk is fetched from `{base}/chunks/{name}`, written back into the
/// chunk namespace, and returned.
///
/// Safe to call concurrently for distinct names. Concurrent calls for the
/// same name may fetch twice; the write-back is an idempotent upsert, so the
/// store still ends up with exactly one copy.
pub async fn fetch_chunk(
    client: &Client,
    base: &Url,
    name: &str,
    store: &Store,
) -> Result<Vec<u8>> {
    if let Some(cached) = store.get(Namespace::Chunks, name).await? {
        debug!(chunk = name, size = cached.len(), "using cached chunk");
        return Ok(cached);
    }

    let url = chunk_url(base, name)?;
    debug!(chunk = name, %url, "fetching chunk");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| LoaderError::Network(format!("chunk '{name}': {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoaderError::Network(format!("chunk '{name}': HTTP {status}")));
    }

    let payload = response
        .bytes()
        .await
        .map_err(|e| LoaderError::Network(format!("chunk '{name}': body read failed: {e}")))?
        .to_vec();

    store.put(Namespace::Chunks, name, &payload).await?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::http_client;

    async fn test_store() -> Store {
        let tmp = std::env::temp_dir().join(format!("wc_fetch_test_{}.db", Uuid::now_v7()));
        Store::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn fetches_and_writes_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/chunks/a.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x01, 0x02]))
            .mount(&server)
            .await;

        let store = test_store().await;
        let client = http_client(5).unwrap();
        let base = Url::parse(&format!("{}/assets", server.uri())).unwrap();

        let payload = fetch_chunk(&client, &base, "a.bin", &store)
            .await
            .expect("fetch chunk");
        assert_eq!(payload, vec![0x01, 0x02]);

        // Written back into the chunk namespace
        let cached = store.get(Namespace::Chunks, "a.bin").await.unwrap();
        assert_eq!(cached, Some(vec![0x01, 0x02]));
    }

    #[tokio::test]
    async fn cached_chunk_skips_network() {
        let server = MockServer::start().await;
        // Expect exactly one request; the second call must hit the store.
        Mock::given(method("GET"))
            .and(path("/assets/chunks/a.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xAB]))
            .expect(1)
            .mount(&server)
            .await;

        let store = test_store().await;
        let client = http_client(5).unwrap();
        let base = Url::parse(&format!("{}/assets", server.uri())).unwrap();

        let first = fetch_chunk(&client, &base, "a.bin", &store).await.unwrap();
        let second = fetch_chunk(&client, &base, "a.bin", &store).await.unwrap();
        assert_eq!(first, second);

        server.verify().await;
    }

    #[tokio::test]
    async fn non_success_status_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/chunks/a.bin"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = test_store().await;
        let client = http_client(5).unwrap();
        let base = Url::parse(&format!("{}/assets", server.uri())).unwrap();

        let err = fetch_chunk(&client, &base, "a.bin", &store)
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Network(_)));
        assert!(err.to_string().contains("a.bin"));

        // Nothing written back on failure
        assert!(!store.contains(Namespace::Chunks, "a.bin").await.unwrap());
    }
}
