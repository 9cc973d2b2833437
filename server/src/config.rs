use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{FileStore, LobbyStore, MemoryStore};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory { ttl: Duration },
    File { dir: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub storage: StorageConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let storage = match env::var("STORAGE").as_deref() {
            Ok("file") => StorageConfig::File {
                dir: env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./lobbies")),
            },
            _ => StorageConfig::Memory {
                ttl: Duration::from_secs(
                    env::var("LOBBY_TTL_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(DEFAULT_TTL_SECS),
                ),
            },
        };
        Self {
            bind_addr,
            port,
            storage,
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn build_store(&self) -> Arc<dyn LobbyStore> {
        match &self.storage {
            StorageConfig::Memory { ttl } => {
                log::info!("using in-memory storage, ttl {:?}", ttl);
                Arc::new(MemoryStore::new(Some(*ttl)))
            }
            StorageConfig::File { dir } => {
                log::info!("using file storage at {}", dir.display());
                Arc::new(FileStore::new(dir.clone()))
            }
        }
    }
}
