//! Line-by-line SQL script execution
//!
//! Every non-blank, non-comment line is sent to the store as one statement.
//! A failing statement is written to the execution log and the run goes on;
//! the caller decides what a non-clean run means.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use toolbox_core::{ProgressReporter, RelationalStore};

use crate::paths::{read_sql_file, sibling_path};

/// Result of executing a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// No statement failed
    pub success: bool,
    pub log_path: PathBuf,
    pub executed: usize,
    pub failed: usize,
    /// Blank and `--` comment lines
    pub skipped: usize,
}

/// Executes SQL files against a relational store
pub struct SqlExecutor<'a> {
    store: &'a dyn RelationalStore,
}

impl<'a> SqlExecutor<'a> {
    pub fn new(store: &'a dyn RelationalStore) -> Self {
        Self { store }
    }

    /// Run every statement in `path`, logging failures to
    /// `<stem>_execution_log_<yyyyMMddHHmmss>.txt`
    pub async fn execute_file(
        &self,
        path: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> Result<ExecutionOutcome> {
        let content = read_sql_file(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();

        let timestamp = Local::now().format("%Y%m%d%H%M%S");
        let log_path = sibling_path(path, &format!("_execution_log_{}", timestamp), Some("txt"));

        info!("Executing {} lines from {}", total, path.display());
        progress.start(total as u64, "Executing SQL statements");

        let mut log = String::new();
        let mut executed = 0usize;
        let mut failed = 0usize;
        let mut skipped = 0usize;

        for (i, line) in lines.iter().enumerate() {
            let line_number = i + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with("--") {
                skipped += 1;
            } else {
                match self.store.execute(line).await {
                    Ok(_) => executed += 1,
                    Err(e) => {
                        failed += 1;
                        error!("Line {} failed: {}", line_number, e);
                        log.push_str(&format!(
                            "Line {}: {}\nError: {}\n{}\n",
                            line_number,
                            line,
                            e,
                            "-".repeat(80)
                        ));
                    }
                }
            }

            progress.advance(
                line_number as u64,
                &format!("Processed {} of {} lines, {} failed", line_number, total, failed),
            );
        }
        progress.finish();

        std::fs::write(&log_path, log)
            .with_context(|| format!("Failed to write execution log: {}", log_path.display()))?;

        if failed == 0 {
            info!("Executed {} statements without errors", executed);
        } else {
            error!(
                "{} of {} statements failed, see {}",
                failed,
                executed + failed,
                log_path.display()
            );
        }

        Ok(ExecutionOutcome {
            success: failed == 0,
            log_path,
            executed,
            failed,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use toolbox_core::{MemoryStore, NoopProgress};

    fn write_script(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("script_formatado.sql");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_clean_run() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            &dir,
            "-- header\n\nDELETE FROM public.accrual WHERE ledger_customer_id IN ('1');\nINSERT INTO public.accrual (id) VALUES (1);\n",
        );
        let store = MemoryStore::new();

        let outcome = SqlExecutor::new(&store)
            .execute_file(&path, &mut NoopProgress)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.executed, 2);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(store.executed().len(), 2);
        assert_eq!(std::fs::read_to_string(&outcome.log_path).unwrap(), "");

        let name = outcome.log_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("script_formatado_execution_log_"));
        assert!(name.ends_with(".txt"));
    }

    #[tokio::test]
    async fn test_failures_are_logged_and_do_not_abort() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            &dir,
            "INSERT INTO public.accrual (id) VALUES (1);\nINSERT INTO broken (id) VALUES (2);\nINSERT INTO public.accrual (id) VALUES (3);\n",
        );
        let store = MemoryStore::new().failing_on("broken");

        let outcome = SqlExecutor::new(&store)
            .execute_file(&path, &mut NoopProgress)
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.executed, 2);
        assert_eq!(outcome.failed, 1);

        let log = std::fs::read_to_string(&outcome.log_path).unwrap();
        assert!(log.starts_with("Line 2: INSERT INTO broken (id) VALUES (2);\nError: "));
        assert!(log.ends_with(&format!("{}\n", "-".repeat(80))));
    }

    #[tokio::test]
    async fn test_byte_order_mark_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "\u{feff}INSERT INTO public.accrual (id) VALUES (1);\n");
        let store = MemoryStore::new().failing_on("\u{feff}");

        let outcome = SqlExecutor::new(&store)
            .execute_file(&path, &mut NoopProgress)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(store.executed(), vec!["INSERT INTO public.accrual (id) VALUES (1);"]);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        let result = SqlExecutor::new(&store)
            .execute_file(&dir.path().join("nope.sql"), &mut NoopProgress)
            .await;
        assert!(result.is_err());
    }
}
