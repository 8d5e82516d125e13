pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod config;
pub mod database;
pub mod error;
pub mod storage;
pub mod tuple;

pub use config::DatabaseConfig;
pub use database::{Database, Transaction};
pub use error::DbError;
