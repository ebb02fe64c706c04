//! Document-store update instructions
//!
//! After the relational side has been rewritten, the per-customer point
//! totals in the document store are stale. This module reads the refreshed
//! totals from the aggregate view and renders one `updateOne` call per
//! target collection and customer, to be reviewed and run by an operator.

use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use toolbox_core::{AggregateRow, AggregateViewSettings, MongoSettings, RelationalStore};

use crate::error::InstructionError;
use crate::paths::sibling_path;

/// Generated script plus what went into it
#[derive(Debug, Clone, Default)]
pub struct InstructionScript {
    pub script: String,
    pub rows: Vec<AggregateRow>,
    /// Affected keys the view had no row for
    pub missing_keys: Vec<String>,
}

impl InstructionScript {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds update scripts from the aggregate view
pub struct InstructionGenerator {
    mongo: MongoSettings,
    view: AggregateViewSettings,
}

impl InstructionGenerator {
    pub fn new(mongo: MongoSettings, view: AggregateViewSettings) -> Self {
        Self { mongo, view }
    }

    /// Create the aggregate view if the catalog does not have it.
    ///
    /// Returns `true` when the view was created by this call.
    pub async fn ensure_view(&self, store: &dyn RelationalStore) -> Result<bool, InstructionError> {
        if store.view_exists(&self.view.schema, &self.view.name).await? {
            debug!("Aggregate view {}.{} already exists", self.view.schema, self.view.name);
            return Ok(false);
        }

        info!("Creating aggregate view {}.{}", self.view.schema, self.view.name);
        store.execute(&self.view.create_statement()).await?;
        Ok(true)
    }

    /// Query the view for `keys` and render the update script
    pub async fn generate(
        &self,
        store: &dyn RelationalStore,
        keys: &BTreeSet<String>,
    ) -> Result<InstructionScript, InstructionError> {
        if keys.is_empty() {
            info!("No affected keys, nothing to generate");
            return Ok(InstructionScript::default());
        }

        self.ensure_view(store).await?;

        let keys: Vec<String> = keys.iter().cloned().collect();
        let rows = store.query_aggregate(&self.view.view_ref(), &keys).await?;

        let found: HashSet<&str> = rows.iter().map(|row| row.key.as_str()).collect();
        let missing_keys: Vec<String> = keys
            .iter()
            .filter(|key| !found.contains(key.as_str()))
            .cloned()
            .collect();
        for key in &missing_keys {
            warn!("Key '{}' has no row in {}", key, self.view.view_ref().qualified_name());
        }

        let mut script = String::new();
        for row in &rows {
            for collection in self.collections() {
                script.push_str(&self.render_update(collection, row));
                script.push('\n');
            }
        }

        info!(
            "Generated updates for {} of {} keys across {} collections",
            rows.len(),
            keys.len(),
            self.collections().len()
        );

        Ok(InstructionScript {
            script,
            rows,
            missing_keys,
        })
    }

    /// Write the script next to `source` as `<stem>_mongo_instructions.js`
    pub fn write_script(
        &self,
        source: &Path,
        script: &InstructionScript,
    ) -> Result<PathBuf, InstructionError> {
        let path = sibling_path(source, "_mongo_instructions", Some("js"));

        let mut content = format!(
            "// Point balance updates for {} customers\n// Source: {}\n// Generated: {}\n\n",
            script.rows.len(),
            source.display(),
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        content.push_str(&script.script);

        std::fs::write(&path, content)?;
        info!("Instruction script written to {}", path.display());
        Ok(path)
    }

    fn collections(&self) -> [&str; 2] {
        [
            self.mongo.ledger_collection.as_str(),
            self.mongo.balance_collection.as_str(),
        ]
    }

    fn render_update(&self, collection: &str, row: &AggregateRow) -> String {
        format!(
            "db.getCollection({}).updateOne({{ {}: {} }}, {{ \"$set\": {{ {}: {}, {}: 0 }} }});",
            json_string(collection),
            json_string(&self.mongo.identity_field),
            json_string(&row.identity),
            json_string(&self.mongo.points_field),
            row.total,
            json_string(&self.mongo.blocked_points_field),
        )
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
