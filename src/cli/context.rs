use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;
use tokio::task;

use cardbridge::config::{BridgeConfig, LoadedConfig};
use cardbridge_acl_engine::AclEngine;
use cardbridge_acs_store::SqliteAcsStore;
use cardbridge_core_types::SystemClock;

pub struct CliContext {
    config: Arc<BridgeConfig>,
    config_path: Option<PathBuf>,
    store: OnceCell<Arc<SqliteAcsStore>>,
    engine: OnceCell<AclEngine>,
}

impl CliContext {
    pub fn new(loaded: LoadedConfig) -> Self {
        Self {
            config: Arc::new(loaded.config),
            config_path: loaded.path,
            store: OnceCell::new(),
            engine: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Opens the configured database, creating it and any missing tables on first use.
    pub async fn store(&self) -> Result<Arc<SqliteAcsStore>> {
        self.store
            .get_or_try_init(|| async {
                let path = self.config.store.path.clone();
                let store = task::spawn_blocking(move || open_store(&path))
                    .await
                    .context("store task failed")??;
                Ok::<_, anyhow::Error>(Arc::new(store))
            })
            .await
            .map(Arc::clone)
    }

    pub async fn engine(&self) -> Result<AclEngine> {
        self.engine
            .get_or_try_init(|| async {
                let store = self.store().await?;
                let config = self.config.engine.clone();
                let engine = task::spawn_blocking(move || {
                    AclEngine::connect(store, Arc::new(SystemClock), config)
                })
                .await
                .context("engine task failed")?
                .context("Failed to start the acl engine")?;
                Ok::<_, anyhow::Error>(engine)
            })
            .await
            .cloned()
    }
}

fn open_store(path: &Path) -> Result<SqliteAcsStore> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = SqliteAcsStore::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    store
        .install_schema()
        .context("Failed to install the legacy schema")?;
    Ok(store)
}
