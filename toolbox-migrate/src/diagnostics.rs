//! Run diagnostics
//!
//! Lines the pipeline drops (non-INSERT text, malformed INSERTs, unknown
//! tables, filtered rows) are counted here instead of disappearing silently.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Counters for one rewrite run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationDiagnostics {
    pub total_lines: usize,
    pub insert_lines: usize,
    pub affected_keys: usize,
    pub delete_statements: usize,
    /// Rows written per destination table
    pub emitted: BTreeMap<String, usize>,
    /// Rows excluded by the key filter
    pub filtered_out: usize,
    /// Blank lines, comments and other non-INSERT statements
    pub dropped_non_insert: usize,
    /// INSERT lines that failed to parse
    pub dropped_malformed: usize,
    /// Emitted rows whose source had more columns than values
    pub misaligned_rows: usize,
    /// Rows whose table is not in the plan, per table name
    pub dropped_unknown_table: BTreeMap<String, usize>,
    /// CRC32 of the rewritten output
    pub output_checksum: u32,
}

impl MigrationDiagnostics {
    pub fn emitted_rows(&self) -> usize {
        self.emitted.values().sum()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_malformed + self.dropped_unknown_table.values().sum::<usize>()
    }

    pub(crate) fn record_unknown_table(&mut self, table: &str) {
        *self.dropped_unknown_table.entry(table.to_string()).or_insert(0) += 1;
    }

    /// Log a summary, warning about anything dropped
    pub fn log_summary(&self) {
        info!(
            "Processed {} lines: {} INSERT, {} rows emitted, {} DELETE statements for {} keys",
            self.total_lines,
            self.insert_lines,
            self.emitted_rows(),
            self.delete_statements,
            self.affected_keys
        );

        if self.filtered_out > 0 {
            info!("  Filtered out by key: {}", self.filtered_out);
        }
        if self.dropped_non_insert > 0 {
            info!("  Non-INSERT lines dropped: {}", self.dropped_non_insert);
        }
        if self.misaligned_rows > 0 {
            warn!("  Rows with missing values kept: {}", self.misaligned_rows);
        }
        if self.dropped_malformed > 0 {
            warn!("  Malformed INSERT lines dropped: {}", self.dropped_malformed);
        }
        for (table, count) in &self.dropped_unknown_table {
            warn!("  Rows for unknown table '{}' dropped: {}", table, count);
        }
    }

    /// Print the report
    pub fn print(&self) {
        println!("\n=== Migration Report ===");
        println!("Total lines: {}", self.total_lines);
        println!("INSERT lines: {}", self.insert_lines);
        println!("Affected keys: {}", self.affected_keys);
        println!("DELETE statements: {}", self.delete_statements);
        println!("Rows emitted:");
        for (table, count) in &self.emitted {
            println!("  {}: {}", table, count);
        }
        println!("Filtered out: {}", self.filtered_out);
        println!("Dropped non-INSERT lines: {}", self.dropped_non_insert);
        println!("Dropped malformed lines: {}", self.dropped_malformed);
        println!("Rows with missing values: {}", self.misaligned_rows);
        if !self.dropped_unknown_table.is_empty() {
            println!("Dropped rows for unknown tables:");
            for (table, count) in &self.dropped_unknown_table {
                println!("  {}: {}", table, count);
            }
        }
        println!("Output checksum: 0x{:08x}", self.output_checksum);
        println!("========================\n");
    }
}
