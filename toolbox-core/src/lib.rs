//! Ledger Toolbox Core - shared plumbing for the migration tools
//!
//! This crate provides:
//! - TOML configuration with defaults and validation
//! - Logging initialisation
//! - Progress reporting
//! - The relational store client used by the migration pipeline

pub mod config;
pub mod logging;
pub mod progress;
pub mod store;

pub use config::{
    AggregateViewSettings, MigrationSettings, MongoSettings, PostgresSettings, TableSettings,
    ToolboxConfig, DEFAULT_CONFIG_FILE,
};
pub use logging::{init_logging, LoggingConfig};
pub use progress::{ConsoleProgress, NoopProgress, ProgressReporter, RecordingProgress};
pub use store::{AggregateRow, MemoryStore, PgStore, RelationalStore, StoreError, ViewRef};
