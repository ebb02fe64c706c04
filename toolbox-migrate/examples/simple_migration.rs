//! Simple migration example
//!
//! Rewrites a small dump, replays it against the in-memory store and prints
//! the document-store instructions, all without a database.

use anyhow::Result;
use tempfile::TempDir;
use toolbox_core::{AggregateViewSettings, MemoryStore, MongoSettings, NoopProgress};
use toolbox_migrate::{InstructionGenerator, MigrationEngine, MigrationOptions, SqlExecutor};

const DUMP: &str = "\
-- exported from tenantA
INSERT INTO tenantA.redemption (id, ledger_customer_id, item_number, points) VALUES (9, '123', 'SKU-1', 20);
INSERT INTO tenantA.accrual (id, ledger_customer_id, points) VALUES (4, '123', 50);
INSERT INTO tenantA.transaction (id, ledger_customer_id, kind) VALUES (1, '123', 'purchase');
INSERT INTO tenantA.transaction (id, ledger_customer_id, kind) VALUES (2, '456', 'purchase');
";

#[tokio::main]
async fn main() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("tenantA_dump.sql");
    std::fs::write(&input, DUMP)?;
    println!("Created sample dump: {}", input.display());

    // Only customer 123 is migrated; DELETEs still cover every id in the dump
    let engine = MigrationEngine::new(MigrationOptions::default(), ["123"]);
    let outcome = engine.process_file(&input, &mut NoopProgress)?;
    outcome.diagnostics.print();

    println!("Rewritten script ({}):", outcome.output_path.display());
    for line in std::fs::read_to_string(&outcome.output_path)?.lines() {
        println!("  {}", line);
    }

    let store = MemoryStore::new()
        .with_row("123", "111.222.333-44", 30.0)
        .with_row("456", "555.666.777-88", 0.0);

    println!("\nReplaying against the in-memory store...");
    let execution = SqlExecutor::new(&store)
        .execute_file(&outcome.output_path, &mut NoopProgress)
        .await?;
    println!(
        "  executed: {}, failed: {}, log: {}",
        execution.executed,
        execution.failed,
        execution.log_path.display()
    );

    println!("\nGenerating document-store instructions...");
    let generator =
        InstructionGenerator::new(MongoSettings::default(), AggregateViewSettings::default());
    let script = generator.generate(&store, &outcome.affected_keys).await?;
    let path = generator.write_script(&input, &script)?;
    print!("{}", script.script);
    println!("Written to {}", path.display());

    Ok(())
}
