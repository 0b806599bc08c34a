use crate::run_date::RunDate;
use crate::traffic::TrafficTable;
use rusqlite::{Connection, Result};
use std::path::Path;

/// Opens (or creates) the traffic statistics database at the given path.
///
/// When a secret is given the database is encrypted with it; the key must
/// be the first statement on the connection. Opening an encrypted database
/// without the right key fails here, on the first schema read.
/// Creates the table and index if they don't already exist.
pub fn open_or_create(path: &Path, secret: Option<&str>) -> Result<Connection> {
    let conn = Connection::open(path)?;

    if let Some(key) = secret {
        conn.pragma(None, "key", key, |_row| Ok(()))?;
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS mirror_traffic (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            date       TEXT NOT NULL,
            project    TEXT NOT NULL,
            up         INTEGER NOT NULL,
            down       INTEGER NOT NULL,
            recorded   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_mirror_traffic_date ON mirror_traffic(date);",
    )?;

    Ok(conn)
}

/// Insert one row per project for `date`. Returns the number of rows written.
///
/// Rows are inserted one at a time outside a transaction, and never merged
/// with rows already stored for the same date.
pub fn insert_traffic(conn: &Connection, date: &RunDate, table: &TrafficTable) -> Result<usize> {
    let date = date.iso();
    let mut stmt =
        conn.prepare("INSERT INTO mirror_traffic (date, project, up, down) VALUES (?1, ?2, ?3, ?4)")?;

    let mut written = 0;
    for (project, counters) in table.iter() {
        let up = stored_count(project, "up", counters.up);
        let down = stored_count(project, "down", counters.down);
        stmt.execute(rusqlite::params![date, project, up, down])?;
        written += 1;
    }
    Ok(written)
}

/// SQLite integers are signed 64-bit; larger counts are clamped to `i64::MAX`.
fn stored_count(project: &str, field: &str, value: u64) -> i64 {
    i64::try_from(value).unwrap_or_else(|_| {
        tracing::warn!(project, field, value, "counter exceeds storable range, clamping");
        i64::MAX
    })
}

/// A row from the mirror_traffic table.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRow {
    pub date: String,
    pub project: String,
    pub up: u64,
    pub down: u64,
}

/// Rows stored for `date`, in insertion order.
#[cfg(test)]
pub fn rows_for_date(conn: &Connection, date: &RunDate) -> Result<Vec<TrafficRow>> {
    let mut stmt = conn.prepare(
        "SELECT date, project, up, down FROM mirror_traffic WHERE date = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![date.iso()], map_row)?;
    rows.collect()
}

#[cfg(test)]
fn map_row(row: &rusqlite::Row) -> Result<TrafficRow> {
    Ok(TrafficRow {
        date: row.get(0)?,
        project: row.get(1)?,
        up: row.get(2)?,
        down: row.get(3)?,
    })
}
