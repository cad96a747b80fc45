pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use db::{create_pool, MemoryRecordStore, PgRecordStore, RecordStore};
pub use error::{DedupError, DedupResult};
pub use service::DeduplicationFacade;
