//! Column removal

use regex::Regex;
use std::borrow::Cow;

use super::statement::{is_insert_line, InsertStatement};

impl InsertStatement {
    /// Remove `column` and its value.
    ///
    /// The column list drives the edit: the value at the same position is
    /// removed only if it exists. Returns `false` when the column is absent,
    /// which makes repeated removal a no-op.
    pub fn remove_column(&mut self, column: &str) -> bool {
        let Some(index) = self.column_index(column) else {
            return false;
        };

        self.columns.remove(index);
        if index < self.values.len() {
            self.values.remove(index);
        }
        self.edited = true;
        true
    }
}

/// Remove a field from any SQL line.
///
/// INSERT lines go through [`InsertStatement::remove_column`]; an INSERT that
/// does not parse, or lacks the column, is returned unchanged. Other lines
/// get a best-effort removal of `field = value` pairs and bare mentions of
/// the field, followed by comma cleanup.
pub fn remove_field_from_line<'a>(line: &'a str, field: &str) -> Cow<'a, str> {
    if is_insert_line(line) {
        return match InsertStatement::parse(line) {
            Some(mut stmt) => {
                if stmt.remove_column(field) {
                    Cow::Owned(stmt.serialize())
                } else {
                    Cow::Borrowed(line)
                }
            }
            None => Cow::Borrowed(line),
        };
    }

    remove_field_assignments(line, field)
}

fn remove_field_assignments<'a>(line: &'a str, field: &str) -> Cow<'a, str> {
    let field = regex::escape(field);
    let patterns = [
        format!(r"(?i)\b{field}\s*=\s*'[^']*'"),
        format!(r"(?i)\b{field}\s*=\s*[^,)]+"),
        format!(r"(?i)\b{field}\b"),
    ];

    let mut result = Cow::Borrowed(line);
    for pattern in &patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if re.is_match(&result) {
            result = Cow::Owned(re.replace_all(&result, "").into_owned());
        }
    }

    if let Cow::Owned(text) = &result {
        let cleaned = cleanup_commas(text);
        return Cow::Owned(cleaned);
    }
    result
}

fn cleanup_commas(text: &str) -> String {
    let cleanups = [(r",\s*,", ","), (r",\s*\)", ")"), (r"\(\s*,", "(")];

    let mut text = text.to_string();
    for (pattern, replacement) in cleanups {
        if let Ok(re) = Regex::new(pattern) {
            text = re.replace_all(&text, replacement).into_owned();
        }
    }
    text
}
