//! Row filtering on the key column

use std::collections::HashSet;

use super::statement::InsertStatement;

/// Keeps rows whose key column value is in an allow-set.
///
/// An empty allow-set means no filtering was requested and every row is
/// kept. A row without the key column is excluded.
#[derive(Debug, Clone)]
pub struct RowFilter {
    key_column: String,
    allowed: HashSet<String>,
}

impl RowFilter {
    pub fn new<I, S>(key_column: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_column: key_column.to_string(),
            allowed: allowed
                .into_iter()
                .map(|k| {
                    let k: String = k.into();
                    k.trim().to_string()
                })
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Filter that keeps everything
    pub fn bypass(key_column: &str) -> Self {
        Self::new(key_column, Vec::<String>::new())
    }

    pub fn is_active(&self) -> bool {
        !self.allowed.is_empty()
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn should_keep(&self, statement: &InsertStatement) -> bool {
        if !self.is_active() {
            return true;
        }

        statement
            .key_value(&self.key_column)
            .is_some_and(|key| self.allowed.contains(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(line: &str) -> InsertStatement {
        InsertStatement::parse(line).unwrap()
    }

    #[test]
    fn test_empty_allow_set_keeps_everything() {
        let filter = RowFilter::bypass("ledger_customer_id");
        assert!(!filter.is_active());
        assert!(filter.should_keep(&stmt("INSERT INTO s.t (a) VALUES (1)")));
        assert!(filter.should_keep(&stmt("INSERT INTO s.t (ledger_customer_id) VALUES ('9')")));
    }

    #[test]
    fn test_membership_on_unquoted_value() {
        let filter = RowFilter::new("ledger_customer_id", ["123", "456"]);
        assert!(filter.should_keep(&stmt(
            "INSERT INTO s.t (id, ledger_customer_id) VALUES (1, '123')"
        )));
        assert!(filter.should_keep(&stmt(
            "INSERT INTO s.t (id, LEDGER_CUSTOMER_ID) VALUES (1, 456)"
        )));
        assert!(!filter.should_keep(&stmt(
            "INSERT INTO s.t (id, ledger_customer_id) VALUES (1, '789')"
        )));
    }

    #[test]
    fn test_missing_key_column_is_excluded() {
        let filter = RowFilter::new("ledger_customer_id", ["123"]);
        assert!(!filter.should_keep(&stmt("INSERT INTO s.t (id) VALUES (123)")));
    }

    #[test]
    fn test_blank_ids_do_not_activate_filter() {
        let filter = RowFilter::new("ledger_customer_id", [" ", ""]);
        assert!(!filter.is_active());
    }
}
