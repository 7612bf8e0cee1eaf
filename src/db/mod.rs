mod connection;
mod migrations;
pub mod repositories;

pub use connection::{Database, StoreLocation};
pub use repositories::kv::KvWrite;
