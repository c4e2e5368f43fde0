//! Demo driver: exercises the whole storage stack end to end.

use anyhow::{Context, Result};
use clap::Parser;
use heapdb::access::{deserialize_row, serialize_row, DataType, RecordId, Value};
use heapdb::catalog::{Column, Schema};
use heapdb::database::Database;
use std::path::PathBuf;

/// heapdb demo - a paged, table-oriented record store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./heapdb_data")]
    data_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let schema = Schema::new(vec![
        Column {
            name: "id".to_string(),
            data_type: DataType::Int,
            max_length: 0,
            nullable: false,
        },
        Column {
            name: "name".to_string(),
            data_type: DataType::String,
            max_length: 50,
            nullable: false,
        },
        Column {
            name: "age".to_string(),
            data_type: DataType::Int,
            max_length: 0,
            nullable: true,
        },
    ]);

    // Start from a clean slate so the demo can be re-run.
    if args.data_dir.exists() {
        std::fs::remove_dir_all(&args.data_dir).context("Failed to clear data directory")?;
    }

    let db = Database::new();
    db.open(&args.data_dir)
        .with_context(|| format!("Failed to open storage at {}", args.data_dir.display()))?;

    db.create_table("users", schema.clone())
        .context("Failed to create table")?;
    println!("✅ Table 'users' created");

    let rows = vec![
        vec![Value::Int(1), Value::String("Alice".to_string()), Value::Int(25)],
        vec![Value::Int(2), Value::String("Bob".to_string()), Value::Int(30)],
        vec![Value::Int(3), Value::String("Charlie".to_string()), Value::Null],
        vec![Value::Int(4), Value::String("Diana".to_string()), Value::Int(28)],
    ];

    let mut ids = Vec::new();
    for row in &rows {
        let data = serialize_row(&schema, row).context("Failed to serialize row")?;
        let id = db.insert("users", &data).context("Failed to insert")?;
        ids.push(id);
        println!("✅ Inserted record {}", id);
    }

    println!("\n📖 Reading records:");
    for &id in &ids {
        let data = db.get("users", id)?;
        let values = deserialize_row(&schema, &data)?;
        println!("  {} -> {:?}", id, values);
    }

    println!("\n✏️  Updating record {}:", ids[1]);
    let updated = serialize_row(
        &schema,
        &[Value::Int(2), Value::String("Bob".to_string()), Value::Int(31)],
    )?;
    db.update("users", ids[1], &updated)
        .context("Failed to update")?;
    let values = deserialize_row(&schema, &db.get("users", ids[1])?)?;
    println!("  {} -> {:?}", ids[1], values);

    println!("\n🗑️  Deleting record {}:", ids[2]);
    db.delete_record("users", ids[2])
        .context("Failed to delete")?;
    match db.get("users", ids[2]) {
        Err(err) => println!("  confirmed gone: {}", err),
        Ok(_) => anyhow::bail!("deleted record is still readable"),
    }

    println!("\n🔍 Scanning all records:");
    for data in db.scan("users", None)? {
        println!("  {:?}", deserialize_row(&schema, &data)?);
    }

    db.flush().context("Failed to flush")?;
    db.close().context("Failed to close")?;
    println!("\n💾 Flushed and closed - reopening to verify persistence");

    let db = Database::new();
    db.open(&args.data_dir)?;
    println!("📖 Records after reopen:");
    for data in db.scan("users", None)? {
        println!("  {:?}", deserialize_row(&schema, &data)?);
    }
    let next = db.insert(
        "users",
        &serialize_row(
            &schema,
            &[Value::Int(5), Value::String("Eve".to_string()), Value::Null],
        )?,
    )?;
    println!("  next issued ID: {} (expected {})", next, RecordId(5));
    db.close()?;

    println!("\nDemo completed successfully");
    Ok(())
}
