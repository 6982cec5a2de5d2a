use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (teams and table catalog)");
        conn.execute_batch(
            "
            CREATE TABLE Teams (
                Id          INTEGER PRIMARY KEY AUTOINCREMENT,
                TeamName    TEXT NOT NULL,
                TablePrefix TEXT NOT NULL UNIQUE,
                CreatedAt   TEXT NOT NULL
            );

            CREATE TABLE Tables (
                Id                INTEGER PRIMARY KEY AUTOINCREMENT,
                TeamId            INTEGER NOT NULL REFERENCES Teams(Id),
                TeamName          TEXT NOT NULL,
                TableName         TEXT NOT NULL,
                TableLabel        TEXT NOT NULL,
                FieldNames        TEXT NOT NULL DEFAULT '',
                FieldTypes        TEXT NOT NULL DEFAULT '',
                TableState        INTEGER NOT NULL DEFAULT 0,
                TablePrivacyModel INTEGER NOT NULL DEFAULT 0,
                TableViewMode     INTEGER NOT NULL DEFAULT 0,
                CreatedUserName   TEXT NOT NULL,
                CreatedAt         TEXT NOT NULL,
                UpdatedUserName   TEXT NOT NULL,
                UpdatedAt         TEXT NOT NULL,
                UNIQUE(TeamId, TableName)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
