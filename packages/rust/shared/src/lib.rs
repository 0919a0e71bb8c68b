//! Shared types, error model, and configuration for wasmcache.
//!
//! This crate is the foundation depended on by all other wasmcache crates.
//! It provides:
//! - [`LoaderError`] — the unified error type
//! - Domain types ([`ChunkManifest`], [`EntryMeta`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CACHE_DB_NAME, DefaultsConfig, FetchConfig, SourceEntry, cache_db_path,
    config_dir, config_file_path, find_source, init_config, load_config, load_config_from,
    resolve_cache_dir,
};
pub use error::{LoaderError, Result};
pub use types::{ChunkManifest, EntryMeta, MANIFEST_PATH};
