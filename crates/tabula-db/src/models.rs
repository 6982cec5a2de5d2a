//! Database row types for the collaborator relations. Table definitions and
//! generic records map straight onto the engine's types.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use tabula_engine::{PrivacyLevel, TableDefinition, TableState};

#[derive(Debug, Clone)]
pub struct TeamRow {
    pub id: i64,
    pub team_name: String,
    pub table_prefix: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SubscriberRow {
    pub id: i64,
    pub team_id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) const TABLE_COLUMNS: &str = "Id, TeamId, TeamName, TableName, TableLabel, FieldNames, \
     FieldTypes, TableState, TablePrivacyModel, TableViewMode, CreatedUserName, CreatedAt, \
     UpdatedUserName, UpdatedAt";

/// Map a `Tables` row selected with [`TABLE_COLUMNS`].
pub(crate) fn table_from_row(row: &Row<'_>) -> rusqlite::Result<TableDefinition> {
    let state: i64 = row.get(7)?;
    let privacy: i64 = row.get(8)?;
    Ok(TableDefinition {
        id: row.get(0)?,
        team_id: row.get(1)?,
        team_name: row.get(2)?,
        table_name: row.get(3)?,
        table_label: row.get(4)?,
        field_names: row.get(5)?,
        field_types: row.get(6)?,
        table_state: TableState::try_from(state)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Integer, Box::new(e)))?,
        table_privacy_model: PrivacyLevel::try_from(privacy)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Integer, Box::new(e)))?,
        table_view_mode: row.get(9)?,
        created_user_name: row.get(10)?,
        created_at: row.get(11)?,
        updated_user_name: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
