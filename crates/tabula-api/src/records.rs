//! Record operations behind the `/data`, `/readers` and `/forms` endpoints.
//!
//! Everything here is synchronous and runs inside `run_blocking`.

use chrono::Utc;
use serde_json::{Map, Value};
use tabula_db::{Database, RecordQuery, UpdateOutcome};
use tabula_engine::naming::TableNameMapper;
use tabula_engine::paging::PagedResponse;
use tabula_engine::privacy::{self, Caller};
use tabula_engine::query::{build_filter, build_select, parse_select};
use tabula_engine::record::{to_generic, to_logical, to_logical_with_system};
use tabula_engine::{
    CallerContext, FieldSchema, FieldType, FieldValue, GenericRecord, LogicalRecord, Result,
    TableDefinition, TableError,
};
use tabula_types::{DataTemplate, ListQuery};
use tracing::info;

/// A live table with its resolved schema and physical location.
pub struct LoadedTable {
    pub definition: TableDefinition,
    pub schema: FieldSchema,
    pub physical: String,
}

type Projection = fn(&GenericRecord, &FieldSchema) -> LogicalRecord;

/// Deleted tables are reported as missing.
pub fn load_table(db: &Database, team_id: i64, names: &TableNameMapper, table_name: &str) -> Result<LoadedTable> {
    let definition = db
        .get_table_by_name(team_id, table_name)?
        .filter(|t| !t.is_deleted())
        .ok_or_else(|| TableError::TableNotFound(table_name.to_string()))?;
    let schema = definition.resolve()?;
    let physical = names.records(&definition.table_name);
    Ok(LoadedTable {
        definition,
        schema,
        physical,
    })
}

fn page(
    db: &Database,
    table: &LoadedTable,
    query: &ListQuery,
    caller: Caller,
    project: Projection,
) -> Result<PagedResponse<LogicalRecord>> {
    let request = query.page_request();
    let select = build_select(&table.schema, query.select.as_deref())?;
    let filter = build_filter(&table.schema, query.filter.as_deref())?;

    let (rows, total) = db.query_records(
        &table.physical,
        &RecordQuery {
            select: &select,
            filter: &filter,
            scope: privacy::row_scope(caller),
            skip: request.skip(),
            take: request.take(),
        },
    )?;

    let mut wanted = parse_select(query.select.as_deref());
    if !wanted.is_empty() && !wanted.iter().any(|s| s.eq_ignore_ascii_case("Id")) {
        wanted.insert(0, "Id".to_string());
    }
    let data = rows
        .iter()
        .map(|row| project(row, &table.schema).project(&wanted))
        .collect();

    Ok(PagedResponse::new(&request, total, data))
}

fn fetch(db: &Database, table: &LoadedTable, id: i64) -> Result<GenericRecord> {
    db.get_record(&table.physical, id)?
        .ok_or(TableError::RecordNotFound(id))
}

/// Fetch a row and apply the row-level gate.
fn fetch_visible(db: &Database, table: &LoadedTable, id: i64, caller: Caller) -> Result<GenericRecord> {
    let record = fetch(db, table, id)?;
    privacy::require_row(&record, caller)?;
    Ok(record)
}

fn insert(db: &Database, table: &LoadedTable, input: &Map<String, Value>, ctx: &CallerContext) -> Result<GenericRecord> {
    let mut record = to_generic(None, &table.schema, input, ctx)?;
    record.id = db.insert_record(&table.physical, &record)?;
    Ok(record)
}

fn require_subscriber(ctx: &CallerContext) -> Result<()> {
    if ctx.is_subscriber() {
        Ok(())
    } else {
        Err(TableError::Unauthorized("forms are for subscribers".into()))
    }
}

// -- Team data --

pub fn list_records(db: &Database, ctx: &CallerContext, table_name: &str, query: &ListQuery) -> Result<PagedResponse<LogicalRecord>> {
    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_read(&table.definition, ctx.caller())?;
    let response = page(db, &table, query, ctx.caller(), to_logical)?;
    Ok(response.with_fields(table.schema.fields().to_vec()))
}

pub fn get_record(db: &Database, ctx: &CallerContext, table_name: &str, id: i64) -> Result<LogicalRecord> {
    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_read(&table.definition, ctx.caller())?;
    let record = fetch_visible(db, &table, id, ctx.caller())?;
    Ok(to_logical(&record, &table.schema))
}

pub fn create_record(db: &Database, ctx: &CallerContext, table_name: &str, input: &Map<String, Value>) -> Result<LogicalRecord> {
    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_write(&table.definition, ctx.caller())?;
    let record = insert(db, &table, input, ctx)?;
    Ok(to_logical(&record, &table.schema))
}

/// The body must carry the same `Id` as the path.
pub fn update_record(
    db: &Database,
    ctx: &CallerContext,
    table_name: &str,
    id: i64,
    input: &Map<String, Value>,
) -> Result<LogicalRecord> {
    if input.get("Id").and_then(Value::as_i64) != Some(id) {
        return Err(TableError::BadInput(format!("body Id does not match record {}", id)));
    }

    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_write(&table.definition, ctx.caller())?;
    let existing = fetch_visible(db, &table, id, ctx.caller())?;
    let seen = existing.updated_at;

    let updated = to_generic(Some(existing), &table.schema, input, ctx)?;
    match db.update_record(&table.physical, &updated, seen)? {
        UpdateOutcome::Updated => Ok(to_logical(&updated, &table.schema)),
        UpdateOutcome::Conflict => Err(TableError::ConcurrencyConflict(id)),
        UpdateOutcome::Missing => Err(TableError::RecordNotFound(id)),
    }
}

pub fn delete_record(db: &Database, ctx: &CallerContext, table_name: &str, id: i64) -> Result<()> {
    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_write(&table.definition, ctx.caller())?;
    fetch_visible(db, &table, id, ctx.caller())?;
    if !db.delete_record(&table.physical, id)? {
        return Err(TableError::RecordNotFound(id));
    }
    info!("Deleted record {} from {}", id, table.physical);
    Ok(())
}

/// One sample record per live table: numbers 0, datetimes now, strings their type name.
pub fn templates(db: &Database, ctx: &CallerContext) -> Result<Vec<DataTemplate>> {
    let now = Utc::now();
    let mut out = Vec::new();
    for definition in db.list_live_tables(ctx.team_id)? {
        let schema = definition.resolve()?;
        let mut data = LogicalRecord::new();
        for field in schema.fields() {
            let sample = match field.field_type {
                FieldType::Number => FieldValue::Number(0),
                FieldType::DateTime => FieldValue::DateTime(now),
                FieldType::String => FieldValue::String(field.field_type.to_string()),
            };
            data.insert(&field.field_name, sample);
        }
        out.push(DataTemplate {
            table_name: definition.table_name,
            table_label: definition.table_label,
            data,
        });
    }
    Ok(out)
}

// -- Public readers --

fn load_for_reader(db: &Database, team_id: i64, table_name: &str) -> Result<LoadedTable> {
    let team = db
        .get_team(team_id)?
        .ok_or_else(|| TableError::TableNotFound(table_name.to_string()))?;
    let table = load_table(db, team.id, &TableNameMapper::new(&team.table_prefix), table_name)?;
    privacy::require_read(&table.definition, Caller::Reader)?;
    Ok(table)
}

pub fn read_records(db: &Database, team_id: i64, table_name: &str, query: &ListQuery) -> Result<PagedResponse<LogicalRecord>> {
    let table = load_for_reader(db, team_id, table_name)?;
    page(db, &table, query, Caller::Reader, to_logical_with_system)
}

pub fn read_record(db: &Database, team_id: i64, table_name: &str, id: i64) -> Result<LogicalRecord> {
    let table = load_for_reader(db, team_id, table_name)?;
    let record = fetch_visible(db, &table, id, Caller::Reader)?;
    Ok(to_logical_with_system(&record, &table.schema))
}

// -- Subscriber forms --

pub fn submit_form(db: &Database, ctx: &CallerContext, table_name: &str, input: &Map<String, Value>) -> Result<LogicalRecord> {
    require_subscriber(ctx)?;
    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_write(&table.definition, ctx.caller())?;
    let record = insert(db, &table, input, ctx)?;
    Ok(to_logical_with_system(&record, &table.schema))
}

pub fn list_forms(db: &Database, ctx: &CallerContext, table_name: &str, query: &ListQuery) -> Result<PagedResponse<LogicalRecord>> {
    require_subscriber(ctx)?;
    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_read(&table.definition, ctx.caller())?;
    page(db, &table, query, ctx.caller(), to_logical_with_system)
}

pub fn get_form(db: &Database, ctx: &CallerContext, table_name: &str, id: i64) -> Result<LogicalRecord> {
    require_subscriber(ctx)?;
    let table = load_table(db, ctx.team_id, &ctx.names(), table_name)?;
    privacy::require_read(&table.definition, ctx.caller())?;
    let record = fetch_visible(db, &table, id, ctx.caller())?;
    Ok(to_logical_with_system(&record, &table.schema))
}
