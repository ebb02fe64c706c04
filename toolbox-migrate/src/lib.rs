//! Ledger Migration Library
//!
//! Rewrites single-line INSERT dumps of the ledger tables into a script that
//! can be replayed safely: DELETEs scoped to the affected customers first,
//! then the INSERTs in foreign-key order, with the schema normalized and
//! legacy columns stripped. Also generates the matching document-store
//! updates and runs scripts against Postgres.

pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod instructions;
pub mod migration;
pub mod paths;
pub mod plan;
pub mod sql;
pub mod sql_file;

pub use diagnostics::MigrationDiagnostics;
pub use error::{InstructionError, RewriteError};
pub use executor::{ExecutionOutcome, SqlExecutor};
pub use instructions::{InstructionGenerator, InstructionScript};
pub use migration::{
    LineOutcome, MigrationEngine, MigrationOptions, MigrationOutcome, MigrationOutput, Phase,
};
pub use plan::{TablePlan, TableRule};
pub use sql::{
    is_insert_line, normalize_schema, remove_field_from_line, split_sql_list, unquote,
    InsertStatement, RowFilter,
};
pub use sql_file::{filter_lines, remove_field_from_file, replace_text, FilterOutcome, ReplaceOutcome};

/// Migration result type
pub type Result<T> = anyhow::Result<T>;
