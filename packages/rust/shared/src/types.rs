//! Core domain types for chunked artifact loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};

/// Fixed path of the chunk manifest below an artifact's base location.
pub const MANIFEST_PATH: &str = "chunks/manifest.json";

// ---------------------------------------------------------------------------
// ChunkManifest
// ---------------------------------------------------------------------------

/// The `chunks/manifest.json` structure describing one chunked artifact.
///
/// The order of [`ChunkManifest::chunks`] defines concatenation order during
/// assembly. Manifests are never persisted; they are re-fetched from the
/// network on every cache miss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Logical name the assembled artifact is stored under.
    pub filename: String,
    /// Ordered chunk names composing the artifact.
    pub chunks: Vec<String>,
}

impl ChunkManifest {
    /// Check structural invariants: a non-empty target name and unique,
    /// non-empty chunk names. An empty chunk list is accepted (it yields an
    /// empty artifact) but worth flagging.
    pub fn validate(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(LoaderError::manifest_parse("manifest has empty filename"));
        }

        let mut seen = std::collections::HashSet::new();
        for name in &self.chunks {
            if name.trim().is_empty() {
                return Err(LoaderError::manifest_parse(format!(
                    "manifest for '{}' contains an empty chunk name",
                    self.filename
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(LoaderError::manifest_parse(format!(
                    "manifest for '{}' lists chunk '{name}' more than once",
                    self.filename
                )));
            }
        }

        if self.chunks.is_empty() {
            tracing::warn!(artifact = %self.filename, "manifest lists no chunks");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EntryMeta
// ---------------------------------------------------------------------------

/// Metadata for one stored entry (artifact or chunk), without its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Entry name (unique within its namespace).
    pub name: String,
    /// Payload size in bytes.
    pub size: usize,
    /// SHA-256 hash of the payload (lowercase hex).
    pub content_hash: String,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_deserializes() {
        let json = r#"{"filename": "core.wasm", "chunks": ["a.bin", "b.bin"]}"#;
        let manifest: ChunkManifest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(manifest.filename, "core.wasm");
        assert_eq!(manifest.chunks, vec!["a.bin", "b.bin"]);
        manifest.validate().expect("valid manifest");
    }

    #[test]
    fn manifest_rejects_empty_filename() {
        let manifest = ChunkManifest {
            filename: "  ".into(),
            chunks: vec!["a.bin".into()],
        };
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, LoaderError::ManifestParse { .. }));
    }

    #[test]
    fn manifest_rejects_duplicate_chunks() {
        let manifest = ChunkManifest {
            filename: "core.wasm".into(),
            chunks: vec!["a.bin".into(), "b.bin".into(), "a.bin".into()],
        };
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn manifest_rejects_empty_chunk_name() {
        let manifest = ChunkManifest {
            filename: "core.wasm".into(),
            chunks: vec!["a.bin".into(), "".into()],
        };
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn manifest_allows_empty_chunk_list() {
        let manifest = ChunkManifest {
            filename: "core.wasm".into(),
            chunks: vec![],
        };
        manifest.validate().expect("empty chunk list is accepted");
    }

    #[test]
    fn entry_meta_serialization() {
        let meta = EntryMeta {
            name: "core.wasm".into(),
            size: 4,
            content_hash: "9f64a747e1b97f131fabb6b447296c9b6f0201e79fb3c5356e6c77e89b6a806a"
                .into(),
            stored_at: Utc::now(),
        };
        let json = serde_json::to_string(&meta).expect("serialize");
        let parsed: EntryMeta = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.name, "core.wasm");
        assert_eq!(parsed.size, 4);
    }
}
