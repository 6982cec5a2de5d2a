use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::context::CallerContext;
use crate::error::{Result, TableError};
use crate::schema::{FieldSchema, FieldType, MAX_FIELDS};

/// Physical slots per generic row.
pub const SLOT_COUNT: usize = MAX_FIELDS;

/// One physical slot: a column per field type. Only the column matching the
/// declared type of the field mapped onto the slot is meaningful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    pub string_value: String,
    pub number_value: Option<i64>,
    pub date_time_value: DateTime<Utc>,
}

impl Slot {
    /// Read the slot as the given type. A null number reads as 0.
    pub fn get(&self, field_type: FieldType) -> FieldValue {
        match field_type {
            FieldType::String => FieldValue::String(self.string_value.clone()),
            FieldType::Number => FieldValue::Number(self.number_value.unwrap_or(0)),
            FieldType::DateTime => FieldValue::DateTime(self.date_time_value),
        }
    }
}

/// Fixed physical row shared by every team table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericRecord {
    pub id: i64,
    pub team_id: i64,
    pub team_name: String,
    pub table_name: String,
    pub subscriber_id: Option<i64>,
    pub slots: [Slot; SLOT_COUNT],
    pub created_user_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_user_name: String,
    pub updated_at: DateTime<Utc>,
}

/// Physical column name of slot `index` (0-based) for a type, e.g. `Field2NumberValue`.
pub fn slot_column(index: usize, field_type: FieldType) -> String {
    format!("Field{}{}", index + 1, field_type.column_suffix())
}

/// Inverse of [`slot_column`].
pub fn parse_slot_column(column: &str) -> Option<(usize, FieldType)> {
    let rest = column.strip_prefix("Field")?;
    let digit = rest.chars().next()?.to_digit(10)? as usize;
    if digit == 0 || digit > SLOT_COUNT {
        return None;
    }
    let field_type = match &rest[1..] {
        "StringValue" => FieldType::String,
        "NumberValue" => FieldType::Number,
        "DateTimeValue" => FieldType::DateTime,
        _ => return None,
    };
    Some((digit - 1, field_type))
}

/// Every slot column, slot by slot, in (string, number, datetime) order.
pub fn slot_columns() -> Vec<String> {
    (0..SLOT_COUNT)
        .flat_map(|i| {
            [FieldType::String, FieldType::Number, FieldType::DateTime]
                .into_iter()
                .map(move |ty| slot_column(i, ty))
        })
        .collect()
}

// -- Logical records --

/// A typed value of one logical field.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Number(i64),
    DateTime(DateTime<Utc>),
}

/// Named, typed view of one generic row. Keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalRecord {
    fields: Vec<(String, FieldValue)>,
}

impl LogicalRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn insert(&mut self, name: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Keep only the selected fields (case-insensitive). An empty selection keeps everything.
    pub fn project(mut self, select: &[String]) -> Self {
        if !select.is_empty() {
            self.fields
                .retain(|(name, _)| select.iter().any(|s| s.eq_ignore_ascii_case(name)));
        }
        self
    }

    /// JSON object form, suitable as write input.
    pub fn to_input(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(name, value)| {
                let json = match value {
                    FieldValue::String(s) => Value::String(s.clone()),
                    FieldValue::Number(n) => Value::from(*n),
                    FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
                };
                (name.clone(), json)
            })
            .collect()
    }
}

impl Serialize for LogicalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// -- Mapping --

/// Project a generic row into its logical shape: `Id`, declared fields, audit fields.
pub fn to_logical(record: &GenericRecord, schema: &FieldSchema) -> LogicalRecord {
    let mut out = LogicalRecord::new();
    out.insert("Id", FieldValue::Number(record.id));
    insert_declared(&mut out, record, schema);
    insert_audit(&mut out, record);
    out
}

/// Like [`to_logical`], with the `TeamId`/`SubscriberId`/`TeamName` system
/// fields after `Id`. Used by the reader and subscriber form projections.
pub fn to_logical_with_system(record: &GenericRecord, schema: &FieldSchema) -> LogicalRecord {
    let mut out = LogicalRecord::new();
    out.insert("Id", FieldValue::Number(record.id));
    out.insert("TeamId", FieldValue::Number(record.team_id));
    out.insert("SubscriberId", FieldValue::Number(record.subscriber_id.unwrap_or(0)));
    out.insert("TeamName", FieldValue::String(record.team_name.clone()));
    insert_declared(&mut out, record, schema);
    insert_audit(&mut out, record);
    out
}

fn insert_declared(out: &mut LogicalRecord, record: &GenericRecord, schema: &FieldSchema) {
    for (slot, field) in record.slots.iter().zip(schema.declared()) {
        out.insert(&field.field_name, slot.get(field.field_type));
    }
}

fn insert_audit(out: &mut LogicalRecord, record: &GenericRecord) {
    out.insert("CreatedUserName", FieldValue::String(record.created_user_name.clone()));
    out.insert("CreatedAt", FieldValue::DateTime(record.created_at));
    out.insert("UpdatedUserName", FieldValue::String(record.updated_user_name.clone()));
    out.insert("UpdatedAt", FieldValue::DateTime(record.updated_at));
}

/// Map untyped input onto a generic row.
///
/// With `existing` the row is updated in place: only keys present in `input`
/// touch their slots and only the update audit pair changes. Without it a new
/// row is stamped from the caller's team and identity.
pub fn to_generic(
    existing: Option<GenericRecord>,
    schema: &FieldSchema,
    input: &Map<String, Value>,
    caller: &CallerContext,
) -> Result<GenericRecord> {
    to_generic_at(existing, schema, input, caller, Utc::now())
}

pub fn to_generic_at(
    existing: Option<GenericRecord>,
    schema: &FieldSchema,
    input: &Map<String, Value>,
    caller: &CallerContext,
    now: DateTime<Utc>,
) -> Result<GenericRecord> {
    let mut record = match existing {
        Some(mut record) => {
            record.updated_user_name = caller.user_name.clone();
            record.updated_at = now;
            record
        }
        None => GenericRecord {
            team_id: caller.team_id,
            team_name: caller.team_name.clone(),
            table_name: schema.table_name().to_string(),
            subscriber_id: caller.subscriber_id(),
            created_user_name: caller.user_name.clone(),
            created_at: now,
            updated_user_name: caller.user_name.clone(),
            updated_at: now,
            ..GenericRecord::default()
        },
    };

    for (slot, field) in record.slots.iter_mut().zip(schema.declared()) {
        let Some(value) = input.get(&field.field_name) else {
            continue;
        };
        match field.field_type {
            FieldType::String => slot.string_value = coerce_string(value),
            FieldType::Number => slot.number_value = coerce_number(&field.field_name, value)?,
            FieldType::DateTime => {
                slot.date_time_value = coerce_datetime(&field.field_name, value)?
            }
        }
    }

    Ok(record)
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_number(field: &str, value: &Value) -> Result<Option<i64>> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| is_integral_i64(*f)).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| TableError::BadInput(format!("field '{}' expects a number, got {}", field, value)))
}

/// Whole floats that fit an i64 without saturating.
fn is_integral_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn coerce_datetime(field: &str, value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::Null => Ok(DateTime::default()),
        Value::String(s) => parse_datetime(s).ok_or_else(|| {
            TableError::BadInput(format!("field '{}' expects a datetime, got '{}'", field, s))
        }),
        other => Err(TableError::BadInput(format!(
            "field '{}' expects a datetime, got {}",
            field, other
        ))),
    }
}

/// RFC 3339, or a naive date/datetime taken as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ndt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}
