// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Whole-document key/value storage.
//!
//! Every write replaces the full document for a key. The file backend writes
//! to a uniquely named temporary file, syncs it, then renames it over the
//! target, so a crash mid-write leaves the previous document intact.

use crate::error::AuthError;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const DOCUMENT_EXTENSION: &str = "json";

#[derive(Clone)]
enum Backend {
    File { root: PathBuf },
    Memory(Arc<DashMap<String, String>>),
}

/// Document store handle. Cheap to clone; clones share the same documents.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Backend,
}

impl DocumentStore {
    /// Open (creating if needed) a file-backed store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AuthError::Storage(format!("Failed to create {}: {}", root.display(), e))
        })?;

        tracing::info!(path = %root.display(), "Opened identity document store");

        Ok(Self {
            backend: Backend::File { root },
        })
    }

    /// Create an in-memory store (tests, ephemeral sessions).
    pub fn new_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
        }
    }

    /// Load and decode the document stored under `key`.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AuthError> {
        let raw = match &self.backend {
            Backend::Memory(docs) => docs.get(key).map(|doc| doc.value().clone()),
            Backend::File { root } => {
                let path = document_path(root, key)?;
                match tokio::fs::read_to_string(&path).await {
                    Ok(contents) => Some(contents),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => {
                        return Err(AuthError::Storage(format!(
                            "Failed to read {}: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
        };

        raw.map(|contents| {
            serde_json::from_str(&contents)
                .map_err(|e| AuthError::Storage(format!("Corrupt document {}: {}", key, e)))
        })
        .transpose()
    }

    /// Replace the whole document stored under `key`.
    pub async fn replace<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AuthError> {
        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| AuthError::Storage(format!("Failed to encode {}: {}", key, e)))?;

        match &self.backend {
            Backend::Memory(docs) => {
                docs.insert(key.to_string(), contents);
            }
            Backend::File { root } => {
                let path = document_path(root, key)?;
                write_atomically(&path, contents.as_bytes()).await?;
            }
        }

        tracing::debug!(key, "Document replaced");
        Ok(())
    }

    /// Remove the document under `key`. Missing documents are not an error.
    pub async fn remove(&self, key: &str) -> Result<(), AuthError> {
        match &self.backend {
            Backend::Memory(docs) => {
                docs.remove(key);
            }
            Backend::File { root } => {
                let path = document_path(root, key)?;
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(AuthError::Storage(format!(
                            "Failed to remove {}: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

/// Map a key to its file, rejecting anything that could escape the root.
fn document_path(root: &Path, key: &str) -> Result<PathBuf, AuthError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(AuthError::Storage(format!("Invalid storage key: {:?}", key)));
    }
    Ok(root.join(format!("{}.{}", key, DOCUMENT_EXTENSION)))
}

async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), AuthError> {
    let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    let storage_err =
        |what: &str, e: std::io::Error| AuthError::Storage(format!("{} {}: {}", what, path.display(), e));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| storage_err("Failed to create temp file for", e))?;
        file.write_all(contents)
            .await
            .map_err(|e| storage_err("Failed to write", e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_err("Failed to sync", e))?;
        drop(file);
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| storage_err("Failed to replace", e))
    }
    .await;

    if result.is_err() {
        // Best effort; the previous document is still in place.
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        names: Vec<String>,
    }

    #[tokio::test]
    async fn memory_store_replace_and_remove() {
        let store = DocumentStore::new_memory();
        assert_eq!(store.load::<Doc>("docs").await.unwrap(), None);

        let doc = Doc {
            names: vec!["a".to_string()],
        };
        store.replace("docs", &doc).await.unwrap();
        assert_eq!(store.load::<Doc>("docs").await.unwrap(), Some(doc));

        store.remove("docs").await.unwrap();
        store.remove("docs").await.unwrap();
        assert_eq!(store.load::<Doc>("docs").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_reopen_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).await.unwrap();

        store
            .replace("docs", &Doc { names: vec!["first".to_string()] })
            .await
            .unwrap();
        store
            .replace("docs", &Doc { names: vec!["second".to_string()] })
            .await
            .unwrap();

        let reopened = DocumentStore::open(dir.path()).await.unwrap();
        let doc: Doc = reopened.load("docs").await.unwrap().unwrap();
        assert_eq!(doc.names, vec!["second"]);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["docs.json"]);
    }

    #[tokio::test]
    async fn corrupt_document_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("docs.json"), "{not json").unwrap();
        let store = DocumentStore::open(dir.path()).await.unwrap();

        let result = store.load::<Doc>("docs").await;
        assert!(matches!(result, Err(AuthError::Storage(_))));
    }

    #[test]
    fn keys_cannot_escape_root() {
        let root = Path::new("/tmp/store");
        assert!(document_path(root, "../etc/passwd").is_err());
        assert!(document_path(root, "").is_err());
        assert_eq!(
            document_path(root, "blog_users").unwrap(),
            root.join("blog_users.json")
        );
    }
}
