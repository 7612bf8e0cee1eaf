use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema steps in order; step `n` brings the store to `user_version` n + 1.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read store schema version")?;
    Ok(version.max(0) as usize)
}

/// Brings the key-value store up to the newest schema in one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    let target = MIGRATIONS.len();

    if current > target {
        bail!("store schema v{current} was written by a newer build (this build knows v{target})");
    }
    if current == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open schema transaction")?;
    for (name, sql) in &MIGRATIONS[current..] {
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply {name}"))?;
    }
    tx.pragma_update(None, "user_version", target as i64)
        .context("failed to record store schema version")?;
    tx.commit().context("failed to commit schema changes")?;

    log::info!("store schema upgraded from v{current} to v{target}");
    Ok(())
}
