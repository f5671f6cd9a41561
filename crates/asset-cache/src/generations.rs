//! Cache substrate: named generations of cached responses
//!
//! A generation is a named map from request identity (method + URL) to a
//! captured response. [`CacheStorage`] is the contract the asset cache is
//! written against; [`MemoryCacheStorage`] keeps generations in memory and
//! [`SledCacheStorage`] keeps one sled tree per generation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

use crate::http::{Request, Response};

/// Cache error types
#[derive(Debug, Error)]
pub enum CacheError {
    /// Sled database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Named, versioned cache generations
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if it does not exist
    async fn open(&self, name: &str) -> Result<()>;

    /// Check whether a generation exists
    async fn has(&self, name: &str) -> Result<bool>;

    /// Names of every existing generation
    async fn keys(&self) -> Result<Vec<String>>;

    /// Delete a generation; returns `false` if it did not exist
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Look up the response cached for `request` in one generation
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>>;

    /// Store one response, creating the generation if needed
    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()>;

    /// Store several responses in one step
    ///
    /// Either every entry becomes visible or none does.
    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> Result<()>;
}

type Generation = HashMap<String, Response>;

/// In-memory cache storage
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStorage {
    generations: Arc<RwLock<BTreeMap<String, Generation>>>,
}

impl MemoryCacheStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a generation (0 if it does not exist)
    pub fn entry_count(&self, name: &str) -> usize {
        self.generations.read().get(name).map(HashMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.generations.write().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.generations.read().contains_key(name))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.generations.read().keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.generations.write().remove(name).is_some())
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        Ok(self
            .generations
            .read()
            .get(name)
            .and_then(|generation| generation.get(&request.cache_key()))
            .cloned())
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()> {
        self.generations
            .write()
            .entry(name.to_string())
            .or_default()
            .insert(request.cache_key(), response);
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        let mut generations = self.generations.write();
        let generation = generations.entry(name.to_string()).or_default();
        for (request, response) in entries {
            generation.insert(request.cache_key(), response);
        }
        Ok(())
    }
}

/// Prefix of sled trees holding generations
const TREE_PREFIX: &str = "generation:";

/// Cache storage persisted in sled, one tree per generation
#[derive(Clone)]
pub struct SledCacheStorage {
    db: sled::Db,
}

impl SledCacheStorage {
    /// Open (or create) a database at `path`
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::Config::new().path(path).use_compression(false).open()?;
        Ok(Self { db })
    }

    /// Create a temporary database (for testing)
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn tree_name(name: &str) -> String {
        format!("{}{}", TREE_PREFIX, name)
    }

    fn has_tree(&self, name: &str) -> bool {
        let tree_name = Self::tree_name(name);
        self.db
            .tree_names()
            .iter()
            .any(|existing| &existing[..] == tree_name.as_bytes())
    }
}

#[async_trait]
impl CacheStorage for SledCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.db.open_tree(Self::tree_name(name))?;
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.has_tree(name))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for tree_name in self.db.tree_names() {
            if let Ok(tree_name) = std::str::from_utf8(&tree_name) {
                if let Some(name) = tree_name.strip_prefix(TREE_PREFIX) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.db.drop_tree(Self::tree_name(name))?)
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        if !self.has_tree(name) {
            return Ok(None);
        }

        let tree = self.db.open_tree(Self::tree_name(name))?;
        match tree.get(request.cache_key().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<()> {
        let tree = self.db.open_tree(Self::tree_name(name))?;
        let bytes = serde_json::to_vec(&response)?;
        tree.insert(request.cache_key().as_bytes(), bytes)?;
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (request, response) in &entries {
            batch.insert(request.cache_key().as_bytes(), serde_json::to_vec(response)?);
        }

        let tree = self.db.open_tree(Self::tree_name(name))?;
        tree.apply_batch(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    async fn exercise(storage: &dyn CacheStorage) {
        assert!(storage.keys().await.unwrap().is_empty());

        let index = Request::get("/index.html");
        let css = Request::get("/css/app.css");
        storage
            .put_all(
                "text-dev-v1",
                vec![
                    (index.clone(), Response::new(200, "<html>v1</html>")),
                    (css.clone(), Response::new(200, "body {}").header("Content-Type", "text/css")),
                ],
            )
            .await
            .unwrap();

        assert!(storage.has("text-dev-v1").await.unwrap());
        let hit = storage.match_request("text-dev-v1", &css).await.unwrap().unwrap();
        assert_eq!(hit.body, b"body {}".to_vec());
        assert_eq!(hit.header_value("content-type"), Some("text/css"));

        // Method is part of the identity.
        let head = Request::new(Method::Head, "/index.html");
        assert!(storage.match_request("text-dev-v1", &head).await.unwrap().is_none());

        // Generations are independent.
        storage.open("text-dev-v2").await.unwrap();
        assert!(storage.match_request("text-dev-v2", &index).await.unwrap().is_none());
        storage
            .put("text-dev-v2", &index, Response::new(200, "<html>v2</html>"))
            .await
            .unwrap();
        assert_eq!(
            storage.match_request("text-dev-v1", &index).await.unwrap().unwrap().body,
            b"<html>v1</html>".to_vec()
        );

        assert_eq!(storage.keys().await.unwrap(), vec!["text-dev-v1", "text-dev-v2"]);

        assert!(storage.delete("text-dev-v1").await.unwrap());
        assert!(!storage.delete("text-dev-v1").await.unwrap());
        assert!(!storage.has("text-dev-v1").await.unwrap());
        assert!(storage.match_request("text-dev-v1", &index).await.unwrap().is_none());
        assert_eq!(storage.keys().await.unwrap(), vec!["text-dev-v2"]);
    }

    #[tokio::test]
    async fn test_memory_storage_contract() {
        exercise(&MemoryCacheStorage::new()).await;
    }

    #[tokio::test]
    async fn test_sled_storage_contract() {
        exercise(&SledCacheStorage::temporary().unwrap()).await;
    }

    #[tokio::test]
    async fn test_match_in_missing_generation_does_not_create_it() {
        let storage = SledCacheStorage::temporary().unwrap();
        let found = storage
            .match_request("never-created", &Request::get("/index.html"))
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(!storage.has("never-created").await.unwrap());
    }

    #[tokio::test]
    async fn test_sled_storage_persists_generations() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("assets.db");

        {
            let storage = SledCacheStorage::open_path(&path).unwrap();
            storage
                .put("text-dev-v1", &Request::get("/index.html"), Response::new(200, "hi"))
                .await
                .unwrap();
            storage.db.flush().unwrap();
        }

        let storage = SledCacheStorage::open_path(&path).unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["text-dev-v1"]);
        let hit = storage
            .match_request("text-dev-v1", &Request::get("/index.html"))
            .await
            .unwrap();
        assert_eq!(hit, Some(Response::new(200, "hi")));
    }

    #[test]
    fn test_entry_count() {
        let storage = MemoryCacheStorage::new();
        assert_eq!(storage.entry_count("missing"), 0);
    }
}
