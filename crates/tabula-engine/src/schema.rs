use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};

/// A table holds at most this many declared fields, one per physical slot.
pub const MAX_FIELDS: usize = 5;

/// Columns every physical record table carries besides the slots.
/// Filters and selects may reference these by name.
pub const SYSTEM_COLUMNS: &[&str] = &[
    "Id",
    "TeamId",
    "SubscriberId",
    "TeamName",
    "TableName",
    "CreatedUserName",
    "CreatedAt",
    "UpdatedUserName",
    "UpdatedAt",
];

const MAX_TABLE_NAME_LEN: usize = 64;

/// Would collide with other per-team physical tables.
const RESERVED_TABLE_NAMES: &[&str] = &["subscribers"];

// -- Field types --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    DateTime,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::DateTime => "datetime",
        }
    }

    /// Suffix of the slot column holding values of this type.
    pub fn column_suffix(self) -> &'static str {
        match self {
            Self::String => "StringValue",
            Self::Number => "NumberValue",
            Self::DateTime => "DateTimeValue",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "datetime" => Ok(Self::DateTime),
            other => Err(TableError::InvalidTable(format!("unknown field type '{}'", other))),
        }
    }
}

// -- Table metadata --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableState {
    #[default]
    TableCreated,
    TableEditing,
    TableDeleted,
}

impl TableState {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::TableCreated => 0,
            Self::TableEditing => 1,
            Self::TableDeleted => 2,
        }
    }
}

impl TryFrom<i64> for TableState {
    type Error = TableError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::TableCreated),
            1 => Ok(Self::TableEditing),
            2 => Ok(Self::TableDeleted),
            other => Err(TableError::BadInput(format!("unknown table state {}", other))),
        }
    }
}

/// Who may see a table's rows. Serialized as its numeric level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PrivacyLevel {
    /// Owning team only.
    #[default]
    Private,
    /// Anyone through the reader endpoints.
    PublicRead,
    /// Subscribers of the owning team, each scoped to their own rows.
    Subscriber,
}

impl PrivacyLevel {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Private => 0,
            Self::PublicRead => 1,
            Self::Subscriber => 2,
        }
    }
}

impl TryFrom<i64> for PrivacyLevel {
    type Error = TableError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Private),
            1 => Ok(Self::PublicRead),
            2 => Ok(Self::Subscriber),
            other => Err(TableError::BadInput(format!("unknown privacy level {}", other))),
        }
    }
}

impl From<PrivacyLevel> for i64 {
    fn from(level: PrivacyLevel) -> Self {
        level.as_i64()
    }
}

/// Team-scoped description of a virtual table.
///
/// `field_names` and `field_types` are parallel comma separated lists; the
/// n-th declared field is stored in physical slot n.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub id: i64,
    pub team_id: i64,
    pub team_name: String,
    pub table_name: String,
    pub table_label: String,
    pub field_names: String,
    pub field_types: String,
    pub table_state: TableState,
    pub table_privacy_model: PrivacyLevel,
    /// Opaque to the engine; consumed by front-end widgets.
    pub table_view_mode: i64,
    pub created_user_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_user_name: String,
    pub updated_at: DateTime<Utc>,
}

impl TableDefinition {
    pub fn is_deleted(&self) -> bool {
        self.table_state == TableState::TableDeleted
    }

    pub fn resolve(&self) -> Result<FieldSchema> {
        resolve(self)
    }
}

// -- Field definitions --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub field_name: String,
    pub field_type: FieldType,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            field_name: name.to_string(),
            field_type,
        }
    }
}

/// Resolved field list of one table: `Id`, the declared fields in order,
/// then the four audit fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    table_name: String,
    fields: Vec<FieldDefinition>,
    declared: usize,
}

impl FieldSchema {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Declared fields only, in slot order.
    pub fn declared(&self) -> &[FieldDefinition] {
        &self.fields[1..1 + self.declared]
    }

    /// Slot position and type of a declared field, matched case-insensitively.
    pub fn position(&self, name: &str) -> Option<(usize, &FieldDefinition)> {
        self.declared()
            .iter()
            .enumerate()
            .find(|(_, f)| f.field_name.eq_ignore_ascii_case(name))
    }

    /// Canonical spelling of a system column, matched case-insensitively.
    pub fn system_column(name: &str) -> Option<&'static str> {
        SYSTEM_COLUMNS
            .iter()
            .copied()
            .find(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Parse a table definition into its ordered field schema.
pub fn resolve(table: &TableDefinition) -> Result<FieldSchema> {
    let names = split_list(&table.field_names);
    let types = split_list(&table.field_types);

    if names.len() != types.len() {
        return Err(TableError::InvalidTable(format!(
            "{}: {} field names but {} field types",
            table.table_name,
            names.len(),
            types.len()
        )));
    }
    if names.len() > MAX_FIELDS {
        return Err(TableError::InvalidTable(format!(
            "{}: {} fields declared, at most {} allowed",
            table.table_name,
            names.len(),
            MAX_FIELDS
        )));
    }

    let mut fields = Vec::with_capacity(names.len() + 5);
    fields.push(FieldDefinition::new("Id", FieldType::Number));
    for (name, ty) in names.iter().zip(&types) {
        fields.push(FieldDefinition::new(name, ty.parse()?));
    }
    fields.push(FieldDefinition::new("CreatedUserName", FieldType::String));
    fields.push(FieldDefinition::new("CreatedAt", FieldType::DateTime));
    fields.push(FieldDefinition::new("UpdatedUserName", FieldType::String));
    fields.push(FieldDefinition::new("UpdatedAt", FieldType::DateTime));

    Ok(FieldSchema {
        table_name: table.table_name.clone(),
        fields,
        declared: names.len(),
    })
}

/// Normalize a display label into a table name: spaces dropped, lowercased.
pub fn normalize_table_name(label: &str) -> String {
    label.replace(' ', "").to_lowercase()
}

/// Creation-time checks. Names that pass are safe to splice into SQL as
/// identifiers, which the query builder relies on.
pub fn validate_definition(table_name: &str, field_names: &str, field_types: &str) -> Result<()> {
    if table_name.is_empty()
        || table_name.len() > MAX_TABLE_NAME_LEN
        || !table_name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(TableError::BadInput(format!(
            "table name '{}' must be 1-{} characters of a-z, 0-9 or _",
            table_name, MAX_TABLE_NAME_LEN
        )));
    }
    if RESERVED_TABLE_NAMES.contains(&table_name) {
        return Err(TableError::BadInput(format!("table name '{}' is reserved", table_name)));
    }

    let names = split_list(field_names);
    let types = split_list(field_types);
    if names.len() != types.len() || names.len() > MAX_FIELDS {
        return Err(TableError::InvalidTable(format!(
            "{}: expected matching name/type lists of at most {} fields",
            table_name, MAX_FIELDS
        )));
    }
    for ty in &types {
        ty.parse::<FieldType>()?;
    }

    for (i, name) in names.iter().enumerate() {
        if !is_identifier(name) {
            return Err(TableError::BadInput(format!("invalid field name '{}'", name)));
        }
        if FieldSchema::system_column(name).is_some() {
            return Err(TableError::BadInput(format!("field name '{}' is reserved", name)));
        }
        if names[..i].iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return Err(TableError::BadInput(format!("duplicate field name '{}'", name)));
        }
    }

    Ok(())
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_list(s: &str) -> Vec<&str> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    s.split(',').map(str::trim).collect()
}

#[cfg(test)]
pub(crate) fn test_table(field_names: &str, field_types: &str) -> TableDefinition {
    TableDefinition {
        id: 1,
        team_id: 7,
        team_name: "Acme".into(),
        table_name: "tasks".into(),
        table_label: "Tasks".into(),
        field_names: field_names.into(),
        field_types: field_types.into(),
        table_state: TableState::TableCreated,
        table_privacy_model: PrivacyLevel::Private,
        table_view_mode: 0,
        created_user_name: "admin".into(),
        created_at: DateTime::default(),
        updated_user_name: "admin".into(),
        updated_at: DateTime::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(schema: &FieldSchema) -> Vec<&str> {
        schema.fields().iter().map(|f| f.field_name.as_str()).collect()
    }

    #[test]
    fn resolve_wraps_declared_fields() {
        let table = test_table("TaskName,Priority,Due", "string,number,datetime");
        let schema = resolve(&table).unwrap();

        assert_eq!(schema.fields().len(), 3 + 5);
        assert_eq!(
            names(&schema),
            vec![
                "Id",
                "TaskName",
                "Priority",
                "Due",
                "CreatedUserName",
                "CreatedAt",
                "UpdatedUserName",
                "UpdatedAt"
            ]
        );
        assert_eq!(schema.fields()[0].field_type, FieldType::Number);
        assert_eq!(schema.declared()[2].field_type, FieldType::DateTime);
        assert_eq!(schema.fields()[5].field_type, FieldType::DateTime);
    }

    #[test]
    fn resolve_rejects_arity_mismatch() {
        let table = test_table("a,b", "string");
        assert!(matches!(resolve(&table), Err(TableError::InvalidTable(_))));
    }

    #[test]
    fn resolve_rejects_too_many_fields() {
        let table = test_table("a,b,c,d,e,f", "string,string,string,string,string,string");
        assert!(matches!(resolve(&table), Err(TableError::InvalidTable(_))));
    }

    #[test]
    fn resolve_rejects_unknown_type() {
        let table = test_table("a", "blob");
        assert!(matches!(resolve(&table), Err(TableError::InvalidTable(_))));
    }

    #[test]
    fn resolve_empty_table_has_only_system_fields() {
        let schema = resolve(&test_table("", "")).unwrap();
        assert_eq!(schema.fields().len(), 5);
        assert!(schema.declared().is_empty());
    }

    #[test]
    fn resolve_trims_and_ignores_type_case() {
        let schema = resolve(&test_table("Name , Age", " String,NUMBER ")).unwrap();
        assert_eq!(schema.declared()[0].field_name, "Name");
        assert_eq!(schema.declared()[1].field_type, FieldType::Number);
    }

    #[test]
    fn position_is_case_insensitive() {
        let schema = resolve(&test_table("TaskName,Priority", "string,number")).unwrap();
        let (idx, field) = schema.position("priority").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(field.field_name, "Priority");
        assert!(schema.position("Id").is_none());
        assert_eq!(FieldSchema::system_column("createdat"), Some("CreatedAt"));
    }

    #[test]
    fn normalize_strips_spaces() {
        assert_eq!(normalize_table_name("My Task List"), "mytasklist");
    }

    #[test]
    fn validate_catches_unsafe_names() {
        assert!(validate_definition("tasks", "Name,Age", "string,number").is_ok());
        assert!(validate_definition("tasks;drop", "Name", "string").is_err());
        assert!(validate_definition("subscribers", "Name", "string").is_err());
        assert!(validate_definition("tasks", "Na me", "string").is_err());
        assert!(validate_definition("tasks", "Id", "number").is_err());
        assert!(validate_definition("tasks", "a,A", "string,string").is_err());
        assert!(matches!(
            validate_definition("tasks", "a,b", "string"),
            Err(TableError::InvalidTable(_))
        ));
    }

    #[test]
    fn privacy_level_serializes_as_number() {
        let json = serde_json::to_string(&PrivacyLevel::Subscriber).unwrap();
        assert_eq!(json, "2");
        let level: PrivacyLevel = serde_json::from_str("1").unwrap();
        assert_eq!(level, PrivacyLevel::PublicRead);
        assert!(serde_json::from_str::<PrivacyLevel>("9").is_err());
    }
}
