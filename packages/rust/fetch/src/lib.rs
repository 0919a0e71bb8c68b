//! Network retrieval for manifests and chunks.
//!
//! This crate provides:
//! - [`http_client`] — shared `reqwest` client construction
//! - [`manifest`] — one-shot manifest retrieval and validation
//! - [`chunk`] — store-first chunk retrieval with network fallback

pub mod chunk;
pub mod manifest;

use std::time::Duration;

use reqwest::Client;
use url::Url;

use wasmcache_shared::{LoaderError, Result};

pub use chunk::fetch_chunk;
pub use manifest::load_manifest;

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("wasmcache/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used for all manifest and chunk retrievals.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LoaderError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join a relative resource path onto a base location.
///
/// `Url::join` drops the final path segment unless the base ends with a
/// slash, so `/assets` and `/assets/` must resolve identically here.
pub fn resource_url(base: &Url, rel: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(rel)
        .map_err(|e| LoaderError::Internal(format!("invalid resource path '{rel}': {e}")))
}

/// URL of a named chunk below `base`.
pub fn chunk_url(base: &Url, name: &str) -> Result<Url> {
    resource_url(base, &format!("chunks/{name}"))
}

/// URL of the chunk manifest below `base`.
pub fn manifest_url(base: &Url) -> Result<Url> {
    resource_url(base, wasmcache_shared::MANIFEST_PATH)
}
