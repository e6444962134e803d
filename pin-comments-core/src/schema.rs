/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every cache open (before checking the version),
/// using `IF NOT EXISTS` so it is safe to run multiple times.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the v1 local cache schema.
///
/// A single key-value table. Keys carry the caller's namespace prefix, so any
/// number of independent instances can share one cache file.
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key         TEXT    PRIMARY KEY,
        value       TEXT    NOT NULL,
        updated_at  INTEGER NOT NULL
    ) STRICT;
";

/// Cache migrations in ascending version order.
const MIGRATIONS: &[(i64, &str)] = &[(1, SCHEMA_V1_SQL)];

/// Brings the cache schema up to the newest version in [`MIGRATIONS`].
///
/// Each pending step runs in its own immediate transaction together with its
/// `schema_version` row, so a crash leaves the cache at a whole version.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the DDL fails or the version row cannot be read.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;
    let applied: Option<i64> =
        db.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))?;
    let applied = applied.unwrap_or(0);

    for &(version, ddl) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(ddl)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
        tracing::debug!(version, "applied cache migration");
    }
    Ok(())
}

/// Renders the SQL an operator runs against their own database to create the
/// remote comment table.
///
/// The policy grants open access to every row: the system has no
/// authorization model of its own. This text is shown during setup and never
/// executed by this crate.
pub fn setup_sql(table: &str) -> String {
    format!(
        "-- Run this in your database's SQL editor

create table if not exists {table} (
  id text primary key,
  x numeric not null,
  y numeric not null,
  text text not null,
  page text not null default '/',
  author text,
  replies jsonb default '[]'::jsonb,
  created_at timestamptz not null default now()
);

alter table {table} enable row level security;

create policy \"Allow public access\"
  on {table} for all
  using (true)
  with check (true);"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let mut db = rusqlite::Connection::open_in_memory().unwrap();
        migrate(&mut db).unwrap();
        migrate(&mut db).unwrap();
        let rows: i64 = db
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1, "version row written once");
    }

    #[test]
    fn setup_sql_names_the_table_everywhere() {
        let sql = setup_sql("team_notes");
        assert!(sql.contains("create table if not exists team_notes ("));
        assert!(sql.contains("alter table team_notes enable row level security;"));
        assert!(sql.contains("on team_notes for all"));
        assert!(!sql.contains("pin_comments"));
    }
}
