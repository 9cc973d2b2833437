use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::time::Instant;

use scrawl_system::{GameError, LobbyState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        GameError::Persistence(err.to_string())
    }
}

/// Keyed storage for lobby records. The coordinator writes through after
/// every mutation and stays agnostic to which backend is behind this.
#[async_trait]
pub trait LobbyStore: Send + Sync {
    async fn save(&self, code: &str, state: &LobbyState) -> Result<(), StoreError>;
    async fn get(&self, code: &str) -> Result<Option<LobbyState>, StoreError>;
    async fn delete(&self, code: &str) -> Result<(), StoreError>;
    async fn exists(&self, code: &str) -> Result<bool, StoreError>;
}

/// Cache-style backend. With a TTL, records auto-expire; expiry is lazy,
/// checked whenever a record is touched.
pub struct MemoryStore {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<String, (Option<Instant>, LobbyState)>>,
}

impl MemoryStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl LobbyStore for MemoryStore {
    async fn save(&self, code: &str, state: &LobbyState) -> Result<(), StoreError> {
        let expires = self.ttl.map(|ttl| Instant::now() + ttl);
        let mut entries = self.entries.lock().await;
        entries.insert(code.to_owned(), (expires, state.clone()));
        Ok(())
    }

    async fn get(&self, code: &str) -> Result<Option<LobbyState>, StoreError> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(code) {
            Some((Some(expires), _)) => *expires <= Instant::now(),
            Some((None, _)) => false,
            None => return Ok(None),
        };
        if expired {
            entries.remove(code);
            return Ok(None);
        }
        Ok(entries.get(code).map(|(_, state)| state.clone()))
    }

    async fn delete(&self, code: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.remove(code);
        Ok(())
    }

    async fn exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.get(code).await?.is_some())
    }
}

/// Durable backend: one JSON document per lobby under a data directory.
/// Nothing expires; leftover records need manual cleanup.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, code: &str) -> PathBuf {
        // codes are validated uppercase alphanumerics, safe as file names
        self.dir.join(format!("{}.json", code))
    }
}

#[async_trait]
impl LobbyStore for FileStore {
    async fn save(&self, code: &str, state: &LobbyState) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let encoded = serde_json::to_vec(state)?;
        fs::write(self.path(code), encoded).await?;
        Ok(())
    }

    async fn get(&self, code: &str) -> Result<Option<LobbyState>, StoreError> {
        match fs::read(self.path(code)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, code: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(code)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, code: &str) -> Result<bool, StoreError> {
        match fs::metadata(self.path(code)).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
