use crate::Database;
use crate::models::{SubscriberRow, TABLE_COLUMNS, TeamRow, table_from_row};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tabula_engine::TableDefinition;
use tabula_engine::naming::{TableNameMapper, table_prefix};
use tracing::info;

impl Database {
    // -- Teams --

    /// Register a team and its subscriber relation.
    pub fn create_team(&self, team_name: &str) -> Result<TeamRow> {
        let prefix = table_prefix(team_name);
        let now = Utc::now();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO Teams (TeamName, TablePrefix, CreatedAt) VALUES (?1, ?2, ?3)",
                params![team_name, prefix, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    Id        INTEGER PRIMARY KEY AUTOINCREMENT,
                    TeamId    INTEGER NOT NULL,
                    Email     TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    CreatedAt TEXT NOT NULL
                );",
                TableNameMapper::new(&prefix).subscribers()
            ))?;
            tx.commit()?;

            info!("Created team {} ({}) with prefix '{}'", team_name, id, prefix);
            Ok(TeamRow {
                id,
                team_name: team_name.to_string(),
                table_prefix: prefix.clone(),
                created_at: now,
            })
        })
    }

    pub fn get_team(&self, id: i64) -> Result<Option<TeamRow>> {
        self.with_conn(|conn| {
            let team = conn
                .query_row(
                    "SELECT Id, TeamName, TablePrefix, CreatedAt FROM Teams WHERE Id = ?1",
                    [id],
                    |row| {
                        Ok(TeamRow {
                            id: row.get(0)?,
                            team_name: row.get(1)?,
                            table_prefix: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(team)
        })
    }

    // -- Subscribers --

    pub fn create_subscriber(&self, prefix: &str, team_id: i64, email: &str) -> Result<i64> {
        let table = TableNameMapper::new(prefix).subscribers();
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("INSERT INTO \"{}\" (TeamId, Email, CreatedAt) VALUES (?1, ?2, ?3)", table),
                params![team_id, email, Utc::now()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_subscriber_by_email(&self, prefix: &str, email: &str) -> Result<Option<SubscriberRow>> {
        let table = TableNameMapper::new(prefix).subscribers();
        self.with_conn(|conn| {
            let subscriber = conn
                .query_row(
                    &format!(
                        "SELECT Id, TeamId, Email, CreatedAt FROM \"{}\" WHERE Email = ?1",
                        table
                    ),
                    [email],
                    |row| {
                        Ok(SubscriberRow {
                            id: row.get(0)?,
                            team_id: row.get(1)?,
                            email: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(subscriber)
        })
    }

    // -- Table catalog --

    /// One page of a team's table definitions, deleted ones included, plus the total.
    pub fn list_tables(&self, team_id: i64, skip: u64, take: u64) -> Result<(Vec<TableDefinition>, u64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(Id) FROM Tables WHERE TeamId = ?1",
                [team_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM Tables WHERE TeamId = ?1 ORDER BY Id LIMIT ?2 OFFSET ?3",
                TABLE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![team_id, take as i64, skip as i64], table_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Every non-deleted table of a team.
    pub fn list_live_tables(&self, team_id: i64) -> Result<Vec<TableDefinition>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM Tables WHERE TeamId = ?1 AND TableState <> 2 ORDER BY Id",
                TABLE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([team_id], table_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_table(&self, id: i64) -> Result<Option<TableDefinition>> {
        self.with_conn(|conn| query_table(conn, "Id = ?1", params![id]))
    }

    /// Lookup by normalized name; the stored name is always lowercase.
    pub fn get_table_by_name(&self, team_id: i64, table_name: &str) -> Result<Option<TableDefinition>> {
        let name = table_name.to_lowercase();
        self.with_conn(|conn| query_table(conn, "TeamId = ?1 AND TableName = ?2", params![team_id, name]))
    }

    pub fn insert_table(&self, table: &TableDefinition) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO Tables (TeamId, TeamName, TableName, TableLabel, FieldNames, FieldTypes,
                    TableState, TablePrivacyModel, TableViewMode,
                    CreatedUserName, CreatedAt, UpdatedUserName, UpdatedAt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    table.team_id,
                    table.team_name,
                    table.table_name,
                    table.table_label,
                    table.field_names,
                    table.field_types,
                    table.table_state.as_i64(),
                    table.table_privacy_model.as_i64(),
                    table.table_view_mode,
                    table.created_user_name,
                    table.created_at,
                    table.updated_user_name,
                    table.updated_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Overwrite the mutable columns of a definition. Returns false if the id is gone.
    pub fn update_table(&self, table: &TableDefinition) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE Tables SET TableLabel = ?1, FieldNames = ?2, FieldTypes = ?3,
                    TableState = ?4, TablePrivacyModel = ?5, TableViewMode = ?6,
                    UpdatedUserName = ?7, UpdatedAt = ?8
                 WHERE Id = ?9",
                params![
                    table.table_label,
                    table.field_names,
                    table.field_types,
                    table.table_state.as_i64(),
                    table.table_privacy_model.as_i64(),
                    table.table_view_mode,
                    table.updated_user_name,
                    table.updated_at,
                    table.id,
                ],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_table(
    conn: &Connection,
    predicate: &str,
    params: impl rusqlite::Params,
) -> Result<Option<TableDefinition>> {
    let sql = format!("SELECT {} FROM Tables WHERE {}", TABLE_COLUMNS, predicate);
    let table = conn.query_row(&sql, params, table_from_row).optional()?;
    Ok(table)
}
