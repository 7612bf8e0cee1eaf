use std::path::PathBuf;

use testarena_lib::{settings::AppSettings, AppState};

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("testarena-it-{}", uuid::Uuid::new_v4()))
}

pub async fn app() -> AppState {
    AppState::in_memory(&scratch_dir(), AppSettings::default())
        .await
        .unwrap()
}
