pub mod autosave;
pub mod backup;
pub mod commands;
pub mod gateway;
pub mod keys;

pub use autosave::AutoSaver;
pub use backup::{BackupDocument, BackupInfo, RestoreOutcome};
pub use gateway::Storage;
pub use keys::StorageKey;
