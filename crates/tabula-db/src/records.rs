//! Storage of generic rows in per-team physical tables, and the paged query
//! executor that runs the fragments built by `tabula_engine::query`.

use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tabula_engine::GenericRecord;
use tabula_engine::privacy::RowScope;
use tabula_engine::query::{FilterQuery, FilterValue};
use tabula_engine::record::{parse_slot_column, slot_columns};
use tabula_engine::schema::FieldType;
use tracing::{debug, info};

/// Result of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// The row exists but its `UpdatedAt` no longer matches.
    Conflict,
    Missing,
}

/// One page worth of query inputs.
#[derive(Debug, Clone)]
pub struct RecordQuery<'a> {
    /// Column list from `build_select`, `*` for everything.
    pub select: &'a str,
    pub filter: &'a FilterQuery,
    pub scope: RowScope,
    pub skip: u64,
    pub take: u64,
}

/// Columns written on insert, in bind order.
fn data_columns() -> Vec<String> {
    let mut columns: Vec<String> = ["TeamId", "SubscriberId", "TeamName", "TableName"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend(slot_columns());
    columns.extend(
        ["CreatedUserName", "CreatedAt", "UpdatedUserName", "UpdatedAt"]
            .iter()
            .map(|c| c.to_string()),
    );
    columns
}

fn slot_values(record: &GenericRecord) -> Vec<&dyn ToSql> {
    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(15);
    for slot in &record.slots {
        values.push(&slot.string_value);
        values.push(&slot.number_value);
        values.push(&slot.date_time_value);
    }
    values
}

impl Database {
    /// Create the physical table backing a team table if it does not exist yet.
    pub fn create_record_table(&self, physical: &str) -> Result<()> {
        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                Id           INTEGER PRIMARY KEY AUTOINCREMENT,
                TeamId       INTEGER NOT NULL,
                SubscriberId INTEGER,
                TeamName     TEXT NOT NULL,
                TableName    TEXT NOT NULL,",
            physical
        );
        for column in slot_columns() {
            let decl = match parse_slot_column(&column).map(|(_, ty)| ty) {
                Some(FieldType::Number) => "INTEGER",
                Some(FieldType::DateTime) => "TEXT NOT NULL DEFAULT '1970-01-01 00:00:00+00:00'",
                _ => "TEXT NOT NULL DEFAULT ''",
            };
            ddl.push_str(&format!("\n                {} {},", column, decl));
        }
        ddl.push_str(
            "
                CreatedUserName TEXT NOT NULL,
                CreatedAt       TEXT NOT NULL,
                UpdatedUserName TEXT NOT NULL,
                UpdatedAt       TEXT NOT NULL
            );",
        );

        self.with_conn_mut(|conn| {
            conn.execute_batch(&ddl)?;
            Ok(())
        })?;
        info!("Ensured record table {}", physical);
        Ok(())
    }

    pub fn insert_record(&self, physical: &str, record: &GenericRecord) -> Result<i64> {
        let columns = data_columns();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            physical,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(columns.len());
        values.push(&record.team_id);
        values.push(&record.subscriber_id);
        values.push(&record.team_name);
        values.push(&record.table_name);
        values.extend(slot_values(record));
        values.push(&record.created_user_name);
        values.push(&record.created_at);
        values.push(&record.updated_user_name);
        values.push(&record.updated_at);

        self.with_conn_mut(|conn| {
            conn.execute(&sql, values.as_slice())?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_record(&self, physical: &str, id: i64) -> Result<Option<GenericRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\" WHERE Id = ?1", physical))?;
            let columns = column_names(&stmt);
            let record = stmt
                .query_row([id], |row| record_from_row(row, &columns))
                .optional()?;
            Ok(record)
        })
    }

    /// Write slot values and the update audit pair, conditioned on the row
    /// still carrying `expected_updated_at`.
    pub fn update_record(
        &self,
        physical: &str,
        record: &GenericRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        let mut assignments: Vec<String> = slot_columns()
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect();
        let n = assignments.len();
        assignments.push(format!("UpdatedUserName = ?{}", n + 1));
        assignments.push(format!("UpdatedAt = ?{}", n + 2));
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE Id = ?{} AND UpdatedAt = ?{}",
            physical,
            assignments.join(", "),
            n + 3,
            n + 4
        );

        let mut values = slot_values(record);
        values.push(&record.updated_user_name);
        values.push(&record.updated_at);
        values.push(&record.id);
        values.push(&expected_updated_at);

        self.with_conn_mut(|conn| {
            let changed = conn.execute(&sql, values.as_slice())?;
            if changed > 0 {
                return Ok(UpdateOutcome::Updated);
            }
            let exists = record_exists(conn, physical, record.id)?;
            debug!(id = record.id, exists, "conditional update matched no row");
            Ok(if exists {
                UpdateOutcome::Conflict
            } else {
                UpdateOutcome::Missing
            })
        })
    }

    /// Returns false if no row had that id.
    pub fn delete_record(&self, physical: &str, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(&format!("DELETE FROM \"{}\" WHERE Id = ?1", physical), [id])?;
            Ok(changed > 0)
        })
    }

    /// Count and fetch one page. Both statements share the same WHERE clause
    /// and bound parameters; rows come back in `Id` order.
    pub fn query_records(&self, physical: &str, query: &RecordQuery<'_>) -> Result<(Vec<GenericRecord>, u64)> {
        let mut predicate = String::from("WHERE 1=1");
        match query.scope {
            RowScope::All => {}
            RowScope::TeamRows => predicate.push_str(" AND SubscriberId IS NULL"),
            RowScope::SubmittedBy(subscriber_id) => {
                predicate.push_str(&format!(" AND SubscriberId = {}", subscriber_id))
            }
        }
        if !query.filter.is_empty() {
            predicate.push(' ');
            predicate.push_str(&query.filter.sql());
        }

        let names: Vec<String> = query.filter.params.iter().map(|(n, _)| format!("@{}", n)).collect();
        let named: Vec<(&str, &dyn ToSql)> = names
            .iter()
            .zip(&query.filter.params)
            .map(|(name, (_, value))| (name.as_str(), filter_param(value)))
            .collect();

        let count_sql = format!("SELECT COUNT(Id) FROM \"{}\" {}", physical, predicate);
        let page_sql = format!(
            "SELECT {} FROM \"{}\" {} ORDER BY Id LIMIT {} OFFSET {}",
            query.select, physical, predicate, query.take, query.skip
        );
        debug!(sql = %page_sql, "paged record query");

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(&count_sql, named.as_slice(), |r| r.get(0))?;

            let mut stmt = conn.prepare(&page_sql)?;
            let columns = column_names(&stmt);
            let rows = stmt
                .query_map(named.as_slice(), |row| record_from_row(row, &columns))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }
}

fn filter_param(value: &FilterValue) -> &dyn ToSql {
    match value {
        FilterValue::Text(text) => text,
        FilterValue::DateTime(at) => at,
    }
}

fn record_exists(conn: &Connection, physical: &str, id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM \"{}\" WHERE Id = ?1", physical),
            params![id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

/// Map a row by column name, so narrowed selects leave the rest at defaults.
fn record_from_row(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<GenericRecord> {
    let mut record = GenericRecord::default();
    for (i, column) in columns.iter().enumerate() {
        match column.as_str() {
            "Id" => record.id = row.get(i)?,
            "TeamId" => record.team_id = row.get(i)?,
            "SubscriberId" => record.subscriber_id = row.get(i)?,
            "TeamName" => record.team_name = row.get(i)?,
            "TableName" => record.table_name = row.get(i)?,
            "CreatedUserName" => record.created_user_name = row.get(i)?,
            "CreatedAt" => record.created_at = row.get(i)?,
            "UpdatedUserName" => record.updated_user_name = row.get(i)?,
            "UpdatedAt" => record.updated_at = row.get(i)?,
            other => match parse_slot_column(other) {
                Some((idx, FieldType::String)) => record.slots[idx].string_value = row.get(i)?,
                Some((idx, FieldType::Number)) => record.slots[idx].number_value = row.get(i)?,
                Some((idx, FieldType::DateTime)) => record.slots[idx].date_time_value = row.get(i)?,
                None => {}
            },
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{definition, open_temp};
    use chrono::{Duration, TimeZone};
    use tabula_engine::query::build_filter;
    use tabula_engine::schema::resolve;

    fn record(id_hint: &str, priority: Option<i64>, subscriber_id: Option<i64>) -> GenericRecord {
        let now = Utc::now();
        let mut r = GenericRecord {
            team_id: 1,
            team_name: "Acme".into(),
            table_name: "tasks".into(),
            subscriber_id,
            created_user_name: "alice".into(),
            created_at: now,
            updated_user_name: "alice".into(),
            updated_at: now,
            ..GenericRecord::default()
        };
        r.slots[0].string_value = id_hint.into();
        r.slots[1].number_value = priority;
        r
    }

    fn seeded() -> (tempfile::TempDir, Database) {
        let (dir, db) = open_temp();
        db.create_record_table("acme_tasks").unwrap();
        db.insert_record("acme_tasks", &record("one", Some(1), None)).unwrap();
        db.insert_record("acme_tasks", &record("two", Some(2), Some(10))).unwrap();
        db.insert_record("acme_tasks", &record("three", Some(3), Some(11))).unwrap();
        db.insert_record("acme_tasks", &record("four", None, Some(10))).unwrap();
        (dir, db)
    }

    fn everything() -> FilterQuery {
        FilterQuery::default()
    }

    fn page<'a>(filter: &'a FilterQuery, select: &'a str, scope: RowScope) -> RecordQuery<'a> {
        RecordQuery {
            select,
            filter,
            scope,
            skip: 0,
            take: 10,
        }
    }

    #[test]
    fn insert_and_get() {
        let (_dir, db) = open_temp();
        db.create_record_table("acme_tasks").unwrap();
        let original = record("write docs", None, Some(3));
        let id = db.insert_record("acme_tasks", &original).unwrap();

        let loaded = db.get_record("acme_tasks", id).unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.slots, original.slots);
        assert_eq!(loaded.slots[1].number_value, None);
        assert_eq!(loaded.subscriber_id, Some(3));
        assert_eq!(loaded.updated_at, original.updated_at);
        assert!(db.get_record("acme_tasks", id + 1).unwrap().is_none());
    }

    #[test]
    fn create_record_table_is_idempotent() {
        let (_dir, db) = open_temp();
        db.create_record_table("acme_tasks").unwrap();
        db.create_record_table("acme_tasks").unwrap();
    }

    #[test]
    fn query_pages_in_id_order() {
        let (_dir, db) = seeded();
        let filter = everything();
        let mut q = page(&filter, "*", RowScope::All);
        q.skip = 1;
        q.take = 2;

        let (rows, total) = db.query_records("acme_tasks", &q).unwrap();
        assert_eq!(total, 4);
        let names: Vec<&str> = rows.iter().map(|r| r.slots[0].string_value.as_str()).collect();
        assert_eq!(names, vec!["two", "three"]);
    }

    #[test]
    fn query_applies_filter_params() {
        let (_dir, db) = seeded();
        let team = db.create_team("Acme").unwrap();
        let schema = resolve(&definition(&team, "tasks", "TaskName,Priority", "string,number")).unwrap();

        let filter = build_filter(&schema, Some(r#"Priority[ge]"1""#)).unwrap();
        let (rows, total) = db.query_records("acme_tasks", &page(&filter, "*", RowScope::All)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].slots[0].string_value, "two");

        let filter = build_filter(&schema, Some(r#"TaskName[like]"t%",Priority[lt]"3""#)).unwrap();
        let (rows, _) = db.query_records("acme_tasks", &page(&filter, "*", RowScope::All)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slots[0].string_value, "two");
    }

    #[test]
    fn query_scopes_to_subscriber() {
        let (_dir, db) = seeded();
        let filter = everything();
        let (rows, total) = db
            .query_records("acme_tasks", &page(&filter, "*", RowScope::SubmittedBy(10)))
            .unwrap();
        assert_eq!(total, 2);
        assert!(rows.iter().all(|r| r.subscriber_id == Some(10)));

        let (rows, total) = db
            .query_records("acme_tasks", &page(&filter, "*", RowScope::TeamRows))
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].slots[0].string_value, "one");
    }

    #[test]
    fn query_compares_datetime_slots_as_timestamps() {
        let (_dir, db) = open_temp();
        let team = db.create_team("Acme").unwrap();
        let schema = resolve(&definition(&team, "tasks", "TaskName,Priority,Due", "string,number,datetime")).unwrap();
        db.create_record_table("acme_tasks").unwrap();

        let mut morning = record("morning", Some(1), None);
        morning.slots[2].date_time_value = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
        db.insert_record("acme_tasks", &morning).unwrap();
        let mut earlier = record("earlier", Some(2), None);
        earlier.slots[2].date_time_value = Utc.with_ymd_and_hms(2024, 5, 31, 23, 0, 0).unwrap();
        db.insert_record("acme_tasks", &earlier).unwrap();

        let total = |f: &str| {
            let filter = build_filter(&schema, Some(f)).unwrap();
            db.query_records("acme_tasks", &page(&filter, "*", RowScope::All)).unwrap().1
        };
        // values as the API writes them back out
        assert_eq!(total(r#"Due[eq]"2024-06-01T09:30:00Z""#), 1);
        assert_eq!(total(r#"Due[eq]"2024-06-01T11:30:00+02:00""#), 1);
        assert_eq!(total(r#"Due[lt]"2024-06-01T00:00:00Z""#), 1);
        assert_eq!(total(r#"Due[ge]"2024-06-01T00:00:00Z""#), 1);
        assert_eq!(total(r#"Due[lt]"2024-06-01T09:30:01Z""#), 2);
    }

    #[test]
    fn narrowed_select_leaves_defaults() {
        let (_dir, db) = seeded();
        let filter = everything();
        let (rows, _) = db
            .query_records("acme_tasks", &page(&filter, "Id, Field2NumberValue", RowScope::All))
            .unwrap();
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].slots[1].number_value, Some(1));
        assert_eq!(rows[0].slots[0].string_value, "");
        assert_eq!(rows[0].created_user_name, "");
    }

    #[test]
    fn conditional_update() {
        let (_dir, db) = seeded();
        let mut row = db.get_record("acme_tasks", 2).unwrap().unwrap();
        let seen = row.updated_at;

        row.slots[0].string_value = "two!".into();
        row.updated_user_name = "bob".into();
        row.updated_at = seen + Duration::seconds(1);
        assert_eq!(db.update_record("acme_tasks", &row, seen).unwrap(), UpdateOutcome::Updated);

        let stored = db.get_record("acme_tasks", 2).unwrap().unwrap();
        assert_eq!(stored.slots[0].string_value, "two!");
        assert_eq!(stored.updated_user_name, "bob");
        assert_eq!(stored.created_user_name, "alice");

        // a second writer still holding the old timestamp loses
        assert_eq!(db.update_record("acme_tasks", &row, seen).unwrap(), UpdateOutcome::Conflict);

        row.id = 99;
        assert_eq!(db.update_record("acme_tasks", &row, seen).unwrap(), UpdateOutcome::Missing);
    }

    #[test]
    fn delete_reports_missing() {
        let (_dir, db) = seeded();
        assert!(db.delete_record("acme_tasks", 1).unwrap());
        assert!(!db.delete_record("acme_tasks", 1).unwrap());
        assert!(db.get_record("acme_tasks", 1).unwrap().is_none());
    }
}
