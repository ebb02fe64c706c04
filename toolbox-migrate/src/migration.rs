//! Migration engine that rewrites an INSERT dump into an ordered script
//!
//! The run has three phases:
//! 1. Scanning: collect every key value present in the file
//! 2. Bucketing: filter, normalize and strip each INSERT, then bucket it
//!    by destination table
//! 3. Emitting: one DELETE per table for the whole key set, then the
//!    buckets in insert order
//!
//! DELETE statements cover every key in the file, not only the rows that
//! survive the filter, so re-running a narrowed migration stays safe.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use toolbox_core::{MigrationSettings, ProgressReporter};

use crate::diagnostics::MigrationDiagnostics;
use crate::error::RewriteError;
use crate::paths::{read_sql_file, sibling_path};
use crate::plan::TablePlan;
use crate::sql::{is_insert_line, normalize_schema, InsertStatement, RowFilter};

const PROGRESS_STEP: usize = 1000;

/// Pipeline phase, used in progress messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Bucketing,
    Emitting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Scanning => write!(f, "Scanning keys"),
            Phase::Bucketing => write!(f, "Rewriting statements"),
            Phase::Emitting => write!(f, "Emitting script"),
        }
    }
}

/// Rewrite settings
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub key_column: String,
    pub target_schema: String,
    pub strip_fields: Vec<String>,
    pub plan: TablePlan,
}

impl MigrationOptions {
    pub fn from_settings(settings: &MigrationSettings) -> Self {
        Self {
            key_column: settings.key_column.clone(),
            target_schema: settings.target_schema.clone(),
            strip_fields: settings.strip_fields.clone(),
            plan: TablePlan::from_settings(&settings.tables),
        }
    }
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self::from_settings(&MigrationSettings::default())
    }
}

/// What happened to one input line during bucketing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Rewritten and placed in a bucket. `mismatch` holds the column and
    /// value counts when the source row had more columns than values.
    Bucketed {
        bucket: usize,
        statement: String,
        mismatch: Option<(usize, usize)>,
    },
    /// Excluded by the key filter
    Filtered,
    /// Table not in the plan
    UnknownTable(String),
    /// Not an INSERT line
    NotInsert,
}

/// In-memory result of a rewrite
#[derive(Debug, Clone, Default)]
pub struct MigrationOutput {
    /// DELETE statements followed by INSERT statements
    pub statements: Vec<String>,
    pub affected_keys: BTreeSet<String>,
    pub diagnostics: MigrationDiagnostics,
}

/// Result of rewriting a file
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub output_path: PathBuf,
    pub affected_keys: BTreeSet<String>,
    pub diagnostics: MigrationDiagnostics,
}

/// Main migration engine
pub struct MigrationEngine {
    options: MigrationOptions,
    filter: RowFilter,
}

impl MigrationEngine {
    /// Create an engine; an empty `filter_ids` keeps every row
    pub fn new<I, S>(options: MigrationOptions, filter_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = RowFilter::new(&options.key_column, filter_ids);
        Self { options, filter }
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Scanning phase: every key value present in an INSERT line
    pub fn collect_keys<S: AsRef<str>>(&self, lines: &[S]) -> BTreeSet<String> {
        lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| is_insert_line(line))
            .filter_map(InsertStatement::parse)
            .filter_map(|stmt| {
                stmt.key_value(&self.options.key_column)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
            })
            .collect()
    }

    /// Bucketing phase for a single line
    pub fn rewrite_line(&self, line: &str) -> Result<LineOutcome, RewriteError> {
        if !is_insert_line(line) {
            return Ok(LineOutcome::NotInsert);
        }

        let parsed = InsertStatement::parse(line).ok_or(RewriteError::Malformed)?;
        if !self.filter.should_keep(&parsed) {
            return Ok(LineOutcome::Filtered);
        }

        let normalized = normalize_schema(line, &self.options.target_schema);
        let mut stmt = InsertStatement::parse(&normalized).ok_or(RewriteError::Malformed)?;
        let mismatch = (!stmt.is_aligned()).then(|| (stmt.columns().len(), stmt.values().len()));

        for field in &self.options.strip_fields {
            stmt.remove_column(field);
        }

        let table = stmt.table_name();
        match self.options.plan.classify(&table) {
            Some(bucket) => Ok(LineOutcome::Bucketed {
                bucket,
                statement: stmt.serialize(),
                mismatch,
            }),
            None => Ok(LineOutcome::UnknownTable(table)),
        }
    }

    /// DELETE statements for the key set, in delete order
    pub fn delete_statements(&self, keys: &BTreeSet<String>) -> Vec<String> {
        if keys.is_empty() {
            return Vec::new();
        }

        // keys already carry SQL escaping from the dump, so they are re-quoted as-is
        let ids = keys
            .iter()
            .map(|key| format!("'{}'", key))
            .collect::<Vec<_>>()
            .join(",");

        let plan = &self.options.plan;
        plan.delete_order()
            .into_iter()
            .map(|i| {
                format!(
                    "DELETE FROM {}.{} WHERE {} IN ({});",
                    self.options.target_schema,
                    plan.rules()[i].name,
                    self.options.key_column,
                    ids
                )
            })
            .collect()
    }

    /// Run all three phases over an in-memory line buffer
    pub fn rewrite_lines<S: AsRef<str>>(
        &self,
        lines: &[S],
        progress: &mut dyn ProgressReporter,
    ) -> MigrationOutput {
        let total = lines.len();
        let mut diagnostics = MigrationDiagnostics {
            total_lines: total,
            ..Default::default()
        };

        progress.start(total as u64, &Phase::Scanning.to_string());
        let affected_keys = self.collect_keys(lines);
        progress.advance(total as u64, &format!("{} keys found", affected_keys.len()));
        progress.finish();
        debug!("Collected {} affected keys", affected_keys.len());

        let plan = &self.options.plan;
        let mut buckets: Vec<Vec<String>> = vec![Vec::new(); plan.len()];

        progress.start(total as u64, &Phase::Bucketing.to_string());
        for (i, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            if is_insert_line(line) {
                diagnostics.insert_lines += 1;
            }

            match self.rewrite_line(line) {
                Ok(LineOutcome::Bucketed {
                    bucket,
                    statement,
                    mismatch,
                }) => {
                    if let Some((columns, values)) = mismatch {
                        warn!(
                            "Line {}: {} columns but {} values, row kept",
                            i + 1,
                            columns,
                            values
                        );
                        diagnostics.misaligned_rows += 1;
                    }
                    buckets[bucket].push(statement);
                }
                Ok(LineOutcome::Filtered) => diagnostics.filtered_out += 1,
                Ok(LineOutcome::UnknownTable(table)) => {
                    debug!("Line {}: table '{}' is not migrated", i + 1, table);
                    diagnostics.record_unknown_table(&table);
                }
                Ok(LineOutcome::NotInsert) => diagnostics.dropped_non_insert += 1,
                Err(e) => {
                    warn!("Line {} dropped: {}", i + 1, e);
                    diagnostics.dropped_malformed += 1;
                }
            }

            let processed = i + 1;
            if processed % PROGRESS_STEP == 0 || processed == total {
                progress.advance(
                    processed as u64,
                    &format!("Processed {} of {} lines", processed, total),
                );
            }
        }
        progress.finish();

        let mut statements = self.delete_statements(&affected_keys);
        diagnostics.delete_statements = statements.len();
        diagnostics.affected_keys = affected_keys.len();

        for index in plan.insert_order() {
            let rows = std::mem::take(&mut buckets[index]);
            diagnostics
                .emitted
                .insert(plan.rules()[index].name.clone(), rows.len());
            statements.extend(rows);
        }

        let mut hasher = crc32fast::Hasher::new();
        for statement in &statements {
            hasher.update(statement.as_bytes());
            hasher.update(b"\n");
        }
        diagnostics.output_checksum = hasher.finalize();

        MigrationOutput {
            statements,
            affected_keys,
            diagnostics,
        }
    }

    /// Rewrite `path` into `<stem>_formatado<ext>` next to it
    pub fn process_file(
        &self,
        path: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> Result<MigrationOutcome> {
        info!("Processing migration file: {}", path.display());

        let content = read_sql_file(path)?;
        let lines: Vec<&str> = content.lines().collect();

        if self.filter.is_active() {
            info!("Row filter active on column '{}'", self.filter.key_column());
        }

        let output = self.rewrite_lines(&lines, progress);

        let output_path = sibling_path(path, "_formatado", None);
        progress.start(output.statements.len() as u64, &Phase::Emitting.to_string());
        let mut rendered = output.statements.join("\n");
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        std::fs::write(&output_path, rendered)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        progress.advance(output.statements.len() as u64, "done");
        progress.finish();

        output.diagnostics.log_summary();
        info!("Rewritten script written to {}", output_path.display());

        Ok(MigrationOutcome {
            output_path,
            affected_keys: output.affected_keys,
            diagnostics: output.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbox_core::NoopProgress;

    fn engine(filter: &[&str]) -> MigrationEngine {
        MigrationEngine::new(MigrationOptions::default(), filter.iter().copied())
    }

    #[test]
    fn test_collect_keys_ignores_filter_and_blanks() {
        let lines = [
            "INSERT INTO a.transaction (id, ledger_customer_id) VALUES (1, '2')",
            "INSERT INTO a.accrual (id, ledger_customer_id) VALUES (1, '1')",
            "INSERT INTO a.accrual (id, ledger_customer_id) VALUES (2, '')",
            "INSERT INTO a.accrual (id) VALUES (3)",
            "SELECT 1;",
        ];
        let keys = engine(&["999"]).collect_keys(&lines);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), ["1", "2"]);
    }

    #[test]
    fn test_rewrite_line_outcomes() {
        let engine = engine(&[]);
        assert_eq!(engine.rewrite_line("").unwrap(), LineOutcome::NotInsert);
        assert_eq!(
            engine.rewrite_line("INSERT INTO x.member (id) VALUES (1)").unwrap(),
            LineOutcome::UnknownTable("member".to_string())
        );
        assert_eq!(
            engine.rewrite_line("INSERT INTO x.accrual VALUES (1)"),
            Err(RewriteError::Malformed)
        );
        assert_eq!(
            engine.rewrite_line("INSERT INTO x.accrual (a, b) VALUES (1)").unwrap(),
            LineOutcome::Bucketed {
                bucket: 1,
                statement: "INSERT INTO public.accrual (a, b) VALUES (1)".to_string(),
                mismatch: Some((2, 1)),
            }
        );
    }

    #[test]
    fn test_rewrite_line_strips_configured_fields() {
        let outcome = engine(&[])
            .rewrite_line(
                "INSERT INTO old.redemption (id, item_number, legacy_redemption_id, qty) VALUES (1, 'X', 9, 2);",
            )
            .unwrap();
        assert_eq!(
            outcome,
            LineOutcome::Bucketed {
                bucket: 2,
                statement: "INSERT INTO public.redemption (id, qty) VALUES (1, 2);".to_string(),
                mismatch: None,
            }
        );
    }

    #[test]
    fn test_row_with_missing_value_is_kept() {
        let output = engine(&[]).rewrite_lines(
            &["INSERT INTO s.redemption (id, ledger_customer_id, item_number) VALUES (1, '5')"],
            &mut NoopProgress,
        );
        assert_eq!(
            output.statements.last().map(String::as_str),
            Some("INSERT INTO public.redemption (id, ledger_customer_id) VALUES (1, '5')")
        );
        assert_eq!(output.diagnostics.misaligned_rows, 1);
        assert_eq!(output.diagnostics.dropped_malformed, 0);
        assert_eq!(output.diagnostics.emitted["redemption"], 1);
    }

    #[test]
    fn test_process_file_skips_byte_order_mark() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("dump.sql");
        std::fs::write(
            &input,
            "\u{feff}INSERT INTO s.transaction (id, ledger_customer_id) VALUES (1, '123')\n\
             INSERT INTO s.accrual (id, ledger_customer_id) VALUES (2, '456')\n",
        )
        .unwrap();

        let outcome = engine(&[]).process_file(&input, &mut NoopProgress).unwrap();
        let output = std::fs::read_to_string(&outcome.output_path).unwrap();

        assert_eq!(outcome.affected_keys.len(), 2);
        assert_eq!(outcome.diagnostics.dropped_non_insert, 0);
        assert!(output.contains("IN ('123','456');"));
        assert!(output.contains("INSERT INTO public.transaction (id, ledger_customer_id) VALUES (1, '123')"));
    }

    #[test]
    fn test_delete_statements_sorted_keys() {
        let keys: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            engine(&[]).delete_statements(&keys),
            vec![
                "DELETE FROM public.redemption WHERE ledger_customer_id IN ('a','b');",
                "DELETE FROM public.accrual WHERE ledger_customer_id IN ('a','b');",
                "DELETE FROM public.transaction WHERE ledger_customer_id IN ('a','b');",
            ]
        );
    }

    #[test]
    fn test_no_keys_no_deletes() {
        let output = engine(&[]).rewrite_lines(
            &["INSERT INTO s.transaction (id) VALUES (1)"],
            &mut NoopProgress,
        );
        assert_eq!(output.statements, vec!["INSERT INTO public.transaction (id) VALUES (1)"]);
        assert_eq!(output.diagnostics.delete_statements, 0);
    }

    #[test]
    fn test_bucket_order_preserves_encounter_order() {
        let lines = [
            "INSERT INTO s.redemption (id, ledger_customer_id) VALUES (1, '7')",
            "INSERT INTO s.transaction (id, ledger_customer_id) VALUES (1, '7')",
            "INSERT INTO s.accrual (id, ledger_customer_id) VALUES (1, '7')",
            "INSERT INTO s.transaction (id, ledger_customer_id) VALUES (2, '7')",
        ];
        let output = engine(&[]).rewrite_lines(&lines, &mut NoopProgress);
        let inserts = &output.statements[3..];
        assert_eq!(
            inserts,
            &[
                "INSERT INTO public.transaction (id, ledger_customer_id) VALUES (1, '7')",
                "INSERT INTO public.transaction (id, ledger_customer_id) VALUES (2, '7')",
                "INSERT INTO public.accrual (id, ledger_customer_id) VALUES (1, '7')",
                "INSERT INTO public.redemption (id, ledger_customer_id) VALUES (1, '7')",
            ]
        );
        assert_eq!(output.diagnostics.emitted["transaction"], 2);
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let lines = ["INSERT INTO s.accrual (id, ledger_customer_id) VALUES (1, '7')"];
        let first = engine(&[]).rewrite_lines(&lines, &mut NoopProgress);
        let second = engine(&[]).rewrite_lines(&lines, &mut NoopProgress);
        assert_ne!(first.diagnostics.output_checksum, 0);
        assert_eq!(first.diagnostics.output_checksum, second.diagnostics.output_checksum);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Scanning.to_string(), "Scanning keys");
        assert_eq!(Phase::Emitting.to_string(), "Emitting script");
    }
}
