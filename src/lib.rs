pub mod analytics;
pub mod bookmarks;
pub mod bridge;
pub mod db;
pub mod events;
pub mod history;
pub mod productivity;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod settings_commands;
pub mod storage;
pub mod utils;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use db::Database;
use events::EventBus;
use productivity::ProductivityController;
use session::SessionController;
use settings::{AppSettings, SettingsStore};
use storage::Storage;

const DEFAULT_DATA_DIR: &str = "./testarena-data";

/// Everything a command needs. One per process.
pub struct AppState {
    pub storage: Storage,
    pub settings: SettingsStore,
    pub events: EventBus,
    pub session: SessionController,
    pub productivity: ProductivityController,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Opens (or creates) the database and settings file under `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let database = Database::new(data_dir.join("testarena.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        Self::assemble(database, settings, data_dir.to_path_buf()).await
    }

    /// State backed by a private in-memory database. Backups still land in
    /// `data_dir`.
    pub async fn in_memory(data_dir: &Path, settings: AppSettings) -> Result<Self> {
        let database = Database::in_memory()?;
        Self::assemble(database, SettingsStore::ephemeral(settings), data_dir.to_path_buf()).await
    }

    async fn assemble(database: Database, settings: SettingsStore, data_dir: PathBuf) -> Result<Self> {
        let config = settings.get();
        let storage = Storage::new(database);
        let events = EventBus::new();

        let session = SessionController::new(storage.clone(), events.clone(), config.heartbeat_every_secs);
        let productivity = ProductivityController::load(
            storage.clone(),
            events.clone(),
            Duration::from_millis(config.autosave_debounce_ms),
        )
        .await?;

        Ok(Self {
            storage,
            settings,
            events,
            session,
            productivity,
            data_dir,
        })
    }

    /// Ends a running test and writes out pending productivity state.
    pub async fn shutdown(&self) {
        if self.session.snapshot().await.is_some() {
            if let Err(err) = self.session.cancel().await {
                log::warn!("failed to cancel test session on shutdown: {err:?}");
            }
        }
        self.productivity.shutdown().await;
    }
}

async fn serve(data_dir: PathBuf) -> Result<()> {
    let state = AppState::open(&data_dir).await?;

    if let Some(resumed) = state.productivity.initialize().await? {
        log::info!("Resumed focus session with {}s left", resumed.remaining_secs);
    }

    let served = bridge::serve(&state).await;
    state.shutdown().await;
    served
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Test Arena starting up...");

    let data_dir = std::env::var_os("TESTARENA_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(serve(data_dir))
}
