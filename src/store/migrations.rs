use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order; entry `n` brings the store to `user_version` `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read store schema version")?;
    usize::try_from(version).with_context(|| format!("invalid store schema version {version}"))
}

/// Bring the kv schema up to date inside a single transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let from = schema_version(conn)?;
    let target = MIGRATIONS.len();

    if from > target {
        bail!("store schema {from} is newer than this build understands ({target})");
    }
    if from == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (name, script) in &MIGRATIONS[from..] {
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply {name}"))?;
    }
    tx.pragma_update(None, "user_version", target as i64)
        .context("failed to record store schema version")?;
    tx.commit().context("failed to commit store migrations")
}
