//! Manifest retrieval.
//!
//! The manifest is a small JSON descriptor listing the ordered chunk names
//! for one artifact. It is fetched fresh on every cache miss — never cached —
//! so it always reflects the currently deployed chunk layout.

use reqwest::Client;
use tracing::debug;
use url::Url;

use wasmcache_shared::{ChunkManifest, LoaderError, Result};

use crate::manifest_url;

/// Fetch and validate the chunk manifest below `base`.
pub async fn load_manifest(client: &Client, base: &Url) -> Result<ChunkManifest> {
    let url = manifest_url(base)?;
    debug!(%url, "fetching manifest");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| LoaderError::Network(format!("manifest: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoaderError::Network(format!("manifest: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| LoaderError::Network(format!("manifest: body read failed: {e}")))?;

    let manifest: ChunkManifest = serde_json::from_str(&body)
        .map_err(|e| LoaderError::manifest_parse(format!("invalid manifest body: {e}")))?;
    manifest.validate()?;

    debug!(
        artifact = %manifest.filename,
        chunks = manifest.chunks.len(),
        "manifest loaded"
    );
    Ok(manifest)
}
