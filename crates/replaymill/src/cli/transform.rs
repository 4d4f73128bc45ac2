//! Transform command - build the cleaned warehouse table from raw Parquet.
//!
//! Downstream metric queries expect `events_clean` with numeric elo, a
//! tri-state win flag and per-case elapsed seconds. Win stays raw in the
//! ingested table; the coercion happens here, at the warehouse boundary.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

/// Arguments for the transform command
#[derive(Debug)]
pub struct TransformArgs {
    /// DuckDB database file to (re)build tables in
    pub warehouse: PathBuf,
    /// Raw Parquet event table produced by `ingest`
    pub events: PathBuf,
}

const EVENTS_CLEAN_SQL: &str = r#"
CREATE TABLE events_clean AS
SELECT
    event_id,
    match_id,
    player_id,
    map_type,
    civilization,
    civilization_category,
    strategy,

    TRY_CAST(elo AS DOUBLE) AS elo,

    CASE
        WHEN LOWER(CAST(win AS VARCHAR)) IN ('1','true') THEN 1
        WHEN LOWER(CAST(win AS VARCHAR)) IN ('0','false') THEN 0
        ELSE NULL
    END AS win,

    activity,
    TRY_CAST(amount AS INTEGER) AS amount,

    ts AS event_time,
    EXTRACT(EPOCH FROM (ts - MIN(ts) OVER (PARTITION BY case_id))) AS seconds_since_start,

    TRY_CAST("@@index" AS INTEGER) AS event_index,
    TRY_CAST("@@case_index" AS INTEGER) AS case_index

FROM bronze
WHERE activity IS NOT NULL
AND match_id IS NOT NULL
AND player_id IS NOT NULL
"#;

/// Execute the transform command
pub fn run(args: TransformArgs) -> Result<()> {
    if !args.events.exists() {
        anyhow::bail!(
            "Raw event table not found: {} (run `replaymill ingest` first)",
            args.events.display()
        );
    }
    if let Some(parent) = args.warehouse.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create warehouse directory: {}", parent.display())
            })?;
        }
    }

    let conn = duckdb::Connection::open(&args.warehouse)
        .with_context(|| format!("Failed to open warehouse: {}", args.warehouse.display()))?;

    conn.execute_batch("DROP TABLE IF EXISTS bronze")?;
    conn.execute_batch(&format!(
        "CREATE TABLE bronze AS SELECT * FROM '{}'",
        args.events.display()
    ))?;

    conn.execute_batch("DROP TABLE IF EXISTS events_clean")?;
    conn.execute_batch(EVENTS_CLEAN_SQL)?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_events_player ON events_clean(player_id);
         CREATE INDEX IF NOT EXISTS idx_events_match ON events_clean(match_id);",
    )?;

    let rows: i64 = conn.query_row("SELECT COUNT(*) FROM events_clean", [], |row| row.get(0))?;
    info!(
        warehouse = %args.warehouse.display(),
        rows,
        "events_clean rebuilt"
    );
    println!("Wrote events_clean ({rows} rows) into {}", args.warehouse.display());

    Ok(())
}
