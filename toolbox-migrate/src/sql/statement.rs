//! Single-line INSERT statement model

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use super::tokenizer::split_sql_list;

static INSERT_SHAPE: OnceLock<Regex> = OnceLock::new();
static INSERT_KEYWORD: OnceLock<Regex> = OnceLock::new();

fn insert_shape() -> &'static Regex {
    INSERT_SHAPE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<prefix>\s*INSERT\s+INTO\s+(?P<table>[^(]+?)\s*\()(?P<columns>.*?)(?P<between>\)\s*VALUES\s*\()(?P<values>.*)\)(?P<suffix>\s*;?\s*)$",
        )
        .expect("INSERT shape pattern is valid")
    })
}

fn insert_keyword() -> &'static Regex {
    INSERT_KEYWORD.get_or_init(|| {
        Regex::new(r"(?i)^\s*INSERT\s+INTO\b").expect("INSERT keyword pattern is valid")
    })
}

/// Whether a raw line starts like an INSERT statement.
///
/// This only classifies the line; [`InsertStatement::parse`] may still
/// reject it when the column/value shape is missing.
pub fn is_insert_line(line: &str) -> bool {
    insert_keyword().is_match(line)
}

/// Strip one layer of surrounding single quotes
pub fn unquote(value: &str) -> &str {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// A parsed `INSERT INTO <table> (<cols>) VALUES (<vals>)` line.
///
/// Values keep their literal SQL form, quotes included. The text around the
/// two lists is captured verbatim so an unedited statement serializes back
/// to exactly the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub(crate) prefix: String,
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) values: Vec<String>,
    pub(crate) between: String,
    pub(crate) suffix: String,
    raw_columns: String,
    raw_values: String,
    pub(crate) edited: bool,
}

impl InsertStatement {
    /// Parse a line; `None` means the line is not a recognizable INSERT and
    /// should be treated as opaque.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = insert_shape().captures(line)?;

        let raw_columns = caps["columns"].to_string();
        let raw_values = caps["values"].to_string();

        Some(Self {
            prefix: caps["prefix"].to_string(),
            table: caps["table"].trim().to_string(),
            columns: split_sql_list(&raw_columns),
            values: split_sql_list(&raw_values),
            between: caps["between"].to_string(),
            suffix: caps["suffix"].to_string(),
            raw_columns,
            raw_values,
            edited: false,
        })
    }

    /// Qualified table name as written, e.g. `tenantA.transaction`
    pub fn qualified_name(&self) -> &str {
        &self.table
    }

    /// Unqualified, unquoted, lower-case table name
    pub fn table_name(&self) -> String {
        let name = self.table.rsplit('.').next().unwrap_or(&self.table);
        name.trim().trim_matches('"').to_lowercase()
    }

    /// Schema qualifier, if any
    pub fn schema(&self) -> Option<&str> {
        self.table.rsplit_once('.').map(|(schema, _)| schema.trim())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Whether every column has exactly one value
    pub fn is_aligned(&self) -> bool {
        self.columns.len() == self.values.len()
    }

    /// Position of a column, compared case-insensitively
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(column))
    }

    /// Value of `column` with one layer of single quotes removed
    pub fn key_value(&self, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.values.get(index).map(|v| unquote(v))
    }

    /// Render the statement back to a single line
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.edited {
            write!(
                f,
                "{}{}{}{}){}",
                self.prefix,
                self.columns.join(", "),
                self.between,
                self.values.join(", "),
                self.suffix
            )
        } else {
            write!(
                f,
                "{}{}{}{}){}",
                self.prefix, self.raw_columns, self.between, self.raw_values, self.suffix
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "INSERT INTO tenantA.transaction (id, ledger_customer_id, points) VALUES (1, '123', 10.5);";

    #[test]
    fn test_parse_basic_statement() {
        let stmt = InsertStatement::parse(LINE).unwrap();
        assert_eq!(stmt.qualified_name(), "tenantA.transaction");
        assert_eq!(stmt.table_name(), "transaction");
        assert_eq!(stmt.schema(), Some("tenantA"));
        assert_eq!(stmt.columns(), &["id", "ledger_customer_id", "points"]);
        assert_eq!(stmt.values(), &["1", "'123'", "10.5"]);
        assert!(stmt.is_aligned());
    }

    #[test]
    fn test_round_trip_is_byte_exact() {
        let lines = [
            LINE,
            "INSERT INTO public.redemption (id, item_number, qty) VALUES (1, 'X', 2)",
            "  insert into \"public\".\"accrual\"(id,points)  values(7,  3) ;  ",
            "INSERT INTO accrual (a) VALUES ((1 + 2))",
        ];
        for line in lines {
            let stmt = InsertStatement::parse(line).unwrap();
            assert_eq!(stmt.serialize(), line);
        }
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let stmt = InsertStatement::parse("insert into s.t (a) values ('x')").unwrap();
        assert_eq!(stmt.table_name(), "t");
        assert_eq!(stmt.key_value("A"), Some("x"));
    }

    #[test]
    fn test_quoted_table_name() {
        let stmt =
            InsertStatement::parse("INSERT INTO \"ledger\".\"Transaction\" (id) VALUES (1)").unwrap();
        assert_eq!(stmt.table_name(), "transaction");
        assert_eq!(stmt.schema(), Some("\"ledger\""));
    }

    #[test]
    fn test_not_an_insert() {
        assert!(InsertStatement::parse("").is_none());
        assert!(InsertStatement::parse("-- comment").is_none());
        assert!(InsertStatement::parse("DELETE FROM public.accrual;").is_none());
        assert!(InsertStatement::parse("INSERT INTO public.accrual SELECT * FROM x").is_none());
        assert!(InsertStatement::parse("INSERT INTO t (a) VALUES (1); -- trailing").is_none());
    }

    #[test]
    fn test_is_insert_line() {
        assert!(is_insert_line("  INSERT  INTO x"));
        assert!(is_insert_line("insert into x"));
        assert!(!is_insert_line("INSERTED INTO x"));
        assert!(!is_insert_line("UPDATE x SET a = 1"));
    }

    #[test]
    fn test_key_value_strips_one_quote_layer() {
        let stmt = InsertStatement::parse(
            "INSERT INTO s.t (ledger_customer_id, n) VALUES ('''123''', 5)",
        )
        .unwrap();
        assert_eq!(stmt.key_value("ledger_customer_id"), Some("''123''"));
        assert_eq!(stmt.key_value("n"), Some("5"));
        assert_eq!(stmt.key_value("missing"), None);
    }

    #[test]
    fn test_key_value_without_matching_value() {
        let stmt = InsertStatement::parse("INSERT INTO s.t (a, ledger_customer_id) VALUES (1)").unwrap();
        assert!(!stmt.is_aligned());
        assert_eq!(stmt.key_value("ledger_customer_id"), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("abc"), "abc");
        assert_eq!(unquote("'"), "'");
        assert_eq!(unquote("''"), "");
    }
}
