//! Destination tables and their execution order
//!
//! Inserts run parents first (`transaction` before the `accrual` and
//! `redemption` rows that reference it); deletes run in the opposite
//! direction. Both orders are data so a new table is one more entry.

use toolbox_core::TableSettings;

/// One known destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRule {
    pub name: String,
    pub delete_rank: u32,
    pub insert_rank: u32,
}

impl From<&TableSettings> for TableRule {
    fn from(settings: &TableSettings) -> Self {
        Self {
            name: settings.name.to_lowercase(),
            delete_rank: settings.delete_rank,
            insert_rank: settings.insert_rank,
        }
    }
}

/// Closed set of destination tables
#[derive(Debug, Clone)]
pub struct TablePlan {
    rules: Vec<TableRule>,
}

impl TablePlan {
    pub fn new(rules: Vec<TableRule>) -> Self {
        Self { rules }
    }

    pub fn from_settings(tables: &[TableSettings]) -> Self {
        Self::new(tables.iter().map(TableRule::from).collect())
    }

    /// Bucket index of a table name, matched case-insensitively
    pub fn classify(&self, table_name: &str) -> Option<usize> {
        self.rules
            .iter()
            .position(|rule| rule.name.eq_ignore_ascii_case(table_name))
    }

    pub fn rules(&self) -> &[TableRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Bucket indices in delete order (children first)
    pub fn delete_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.rules.len()).collect();
        order.sort_by_key(|&i| self.rules[i].delete_rank);
        order
    }

    /// Bucket indices in insert order (parents first)
    pub fn insert_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.rules.len()).collect();
        order.sort_by_key(|&i| self.rules[i].insert_rank);
        order
    }
}

impl Default for TablePlan {
    fn default() -> Self {
        Self::new(vec![
            TableRule { name: "transaction".to_string(), delete_rank: 2, insert_rank: 0 },
            TableRule { name: "accrual".to_string(), delete_rank: 1, insert_rank: 1 },
            TableRule { name: "redemption".to_string(), delete_rank: 0, insert_rank: 2 },
        ])
    }
}
