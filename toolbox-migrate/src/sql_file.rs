//! Line-oriented file tools: field removal, line filtering, text replacement
//!
//! Each tool reads the whole input, writes a sibling output file and never
//! modifies the input.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use toolbox_core::ProgressReporter;

use crate::paths::{read_sql_file, sibling_path};
use crate::sql::remove_field_from_line;

/// Result of [`filter_lines`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub output_path: PathBuf,
    pub total_lines: usize,
    pub matched_lines: usize,
}

/// Result of [`replace_text`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub output_path: PathBuf,
    pub total_lines: usize,
    /// Lines containing at least one match
    pub changed_lines: usize,
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    Ok(read_sql_file(path)?.lines().map(str::to_string).collect())
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file: {}", path.display()))
}

/// Remove `field` from every line, writing `<stem>_removed_<field><ext>`
pub fn remove_field_from_file(
    path: &Path,
    field: &str,
    progress: &mut dyn ProgressReporter,
) -> Result<PathBuf> {
    let field = field.trim();
    if field.is_empty() {
        anyhow::bail!("Field name cannot be empty");
    }

    let lines = read_lines(path)?;
    let total = lines.len();
    let output_path = sibling_path(path, &format!("_removed_{}", field), None);

    progress.start(total as u64, &format!("Removing field '{}'", field));
    let mut output = Vec::with_capacity(total);
    let mut changed = 0usize;
    for (i, line) in lines.iter().enumerate() {
        let rewritten = remove_field_from_line(line, field);
        if rewritten != line.as_str() {
            changed += 1;
        }
        output.push(rewritten.into_owned());
        progress.advance((i + 1) as u64, &format!("Processed {} of {} lines", i + 1, total));
    }
    progress.finish();

    write_lines(&output_path, &output)?;
    info!(
        "Removed field '{}' from {} of {} lines: {}",
        field,
        changed,
        total,
        output_path.display()
    );
    Ok(output_path)
}

/// Keep lines containing any of `needles` (case-insensitive), writing
/// `<stem>_filtrado<ext>`
pub fn filter_lines<S: AsRef<str>>(
    path: &Path,
    needles: &[S],
    progress: &mut dyn ProgressReporter,
) -> Result<FilterOutcome> {
    let needles: Vec<String> = needles
        .iter()
        .map(|n| n.as_ref().trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();
    if needles.is_empty() {
        anyhow::bail!("At least one non-empty search string is required");
    }

    let lines = read_lines(path)?;
    let total = lines.len();
    let output_path = sibling_path(path, "_filtrado", None);

    progress.start(total as u64, "Filtering lines");
    let mut kept = Vec::new();
    for (i, line) in lines.into_iter().enumerate() {
        let lowered = line.to_lowercase();
        if needles.iter().any(|n| lowered.contains(n.as_str())) {
            kept.push(line);
        }
        progress.advance(
            (i + 1) as u64,
            &format!("Processed {} of {} lines, {} matched", i + 1, total, kept.len()),
        );
    }
    progress.finish();

    write_lines(&output_path, &kept)?;
    debug!("Filter needles: {:?}", needles);
    info!("Kept {} of {} lines: {}", kept.len(), total, output_path.display());

    Ok(FilterOutcome {
        output_path,
        total_lines: total,
        matched_lines: kept.len(),
    })
}

/// Replace every occurrence of `search` (case-sensitive), writing
/// `<stem>_replaced<ext>`
pub fn replace_text(
    path: &Path,
    search: &str,
    replacement: &str,
    progress: &mut dyn ProgressReporter,
) -> Result<ReplaceOutcome> {
    if search.is_empty() {
        anyhow::bail!("Search text cannot be empty");
    }

    let lines = read_lines(path)?;
    let total = lines.len();
    let output_path = sibling_path(path, "_replaced", None);

    progress.start(total as u64, "Replacing text");
    let mut changed_lines = 0usize;
    let mut output = Vec::with_capacity(total);
    for (i, line) in lines.into_iter().enumerate() {
        if line.contains(search) {
            changed_lines += 1;
            output.push(line.replace(search, replacement));
        } else {
            output.push(line);
        }
        progress.advance(
            (i + 1) as u64,
            &format!("Processed {} of {} lines, {} replaced", i + 1, total, changed_lines),
        );
    }
    progress.finish();

    write_lines(&output_path, &output)?;
    info!(
        "Replaced text on {} of {} lines: {}",
        changed_lines,
        total,
        output_path.display()
    );

    Ok(ReplaceOutcome {
        output_path,
        total_lines: total,
        changed_lines,
    })
}
