//! Translates logical select and filter expressions into SQL fragments over
//! the physical slot columns.
//!
//! Filters have the form `Name[op]"value",Other[op]"value"`. Values never
//! reach the SQL text; each becomes a named parameter `@Name`.

use chrono::{DateTime, Utc};

use crate::error::{Result, TableError};
use crate::record::{parse_datetime, parse_slot_column, slot_column};
use crate::schema::{FieldSchema, FieldType, is_identifier};

/// Comparison operators accepted inside `[...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Like,
    /// Spelled `ge`, emits a strict `>`.
    Ge,
    Lt,
}

impl FilterOp {
    /// Unrecognized operators fall back to equality.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ne" => Self::Ne,
            "like" => Self::Like,
            "ge" => Self::Ge,
            "lt" => Self::Lt,
            _ => Self::Eq,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Like => "LIKE",
            Self::Ge => ">",
            Self::Lt => "<",
        }
    }
}

/// A bound filter value. Datetime columns compare as timestamps, so their
/// values are parsed up front instead of being bound as client text.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    DateTime(DateTime<Utc>),
}

/// Synthesized WHERE fragment plus its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterQuery {
    /// Each clause starts with `AND `, ready to append after `WHERE 1=1`.
    pub clauses: Vec<String>,
    /// `(name, value)` pairs; `name` is bound as `@name`.
    pub params: Vec<(String, FilterValue)>,
}

impl FilterQuery {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn sql(&self) -> String {
        self.clauses.join(" ")
    }

    fn set_param(&mut self, name: &str, value: FilterValue) {
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((name.to_string(), value)),
        }
    }
}

/// Physical column for a logical name: declared fields map to their slot,
/// system columns to their canonical spelling.
pub fn column_for(schema: &FieldSchema, name: &str) -> Option<(String, String)> {
    if let Some((index, field)) = schema.position(name) {
        return Some((slot_column(index, field.field_type), field.field_name.clone()));
    }
    FieldSchema::system_column(name).map(|c| (c.to_string(), c.to_string()))
}

fn is_datetime_column(column: &str) -> bool {
    matches!(column, "CreatedAt" | "UpdatedAt")
        || matches!(parse_slot_column(column), Some((_, FieldType::DateTime)))
}

/// Split a comma separated select list into trimmed, non-empty names.
pub fn parse_select(select: Option<&str>) -> Vec<String> {
    select
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Column list for a SELECT. Blank selects every column; otherwise `Id` is
/// always included so rows can be addressed.
pub fn build_select(schema: &FieldSchema, select: Option<&str>) -> Result<String> {
    let names = parse_select(select);
    if names.is_empty() {
        return Ok("*".to_string());
    }

    let mut columns = vec!["Id".to_string()];
    for name in &names {
        let column = match column_for(schema, name) {
            Some((column, _)) => column,
            None if is_identifier(name) => name.clone(),
            None => return Err(TableError::BadInput(format!("invalid select field '{}'", name))),
        };
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    Ok(columns.join(", "))
}

/// Parse a filter expression. Clauses naming unknown fields or missing the
/// `[op]` brackets are skipped.
///
/// Parameters are keyed by field, so repeating a field binds every one of
/// its clauses to the last value given for it.
///
/// Values for datetime columns must parse as a datetime, except under
/// `like`, which matches the stored text.
pub fn build_filter(schema: &FieldSchema, filter: Option<&str>) -> Result<FilterQuery> {
    let mut query = FilterQuery::default();
    let Some(filter) = filter else {
        return Ok(query);
    };

    for clause in filter.split(',') {
        let (Some(open), Some(close)) = (clause.find('['), clause.find(']')) else {
            continue;
        };
        if close < open {
            continue;
        }

        let name = clause[..open].trim();
        let Some((column, canonical)) = column_for(schema, name) else {
            tracing::debug!(field = name, "dropping filter on unknown field");
            continue;
        };
        let op = FilterOp::parse(&clause[open + 1..close]);
        let raw = clause[close + 1..].trim_start().replace('"', "");
        let value = if op != FilterOp::Like && is_datetime_column(&column) {
            let parsed = parse_datetime(&raw).ok_or_else(|| {
                TableError::BadInput(format!("filter on '{}' expects a datetime, got '{}'", canonical, raw))
            })?;
            FilterValue::DateTime(parsed)
        } else {
            FilterValue::Text(raw)
        };

        query
            .clauses
            .push(format!("AND {} {} @{}", column, op.as_sql(), canonical));
        query.set_param(&canonical, value);
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::schema::{resolve, test_table};

    fn text(s: &str) -> FilterValue {
        FilterValue::Text(s.to_string())
    }

    fn tasks() -> FieldSchema {
        resolve(&test_table("TaskName,Priority,Due", "string,number,datetime")).unwrap()
    }

    #[test]
    fn filter_maps_fields_to_slots() {
        let q = build_filter(&tasks(), Some(r#"TaskName[eq]"Foo",Priority[ge]"2""#)).unwrap();
        assert_eq!(
            q.clauses,
            vec![
                "AND Field1StringValue = @TaskName",
                "AND Field2NumberValue > @Priority"
            ]
        );
        assert_eq!(
            q.params,
            vec![
                ("TaskName".to_string(), text("Foo")),
                ("Priority".to_string(), text("2"))
            ]
        );
        assert_eq!(
            q.sql(),
            "AND Field1StringValue = @TaskName AND Field2NumberValue > @Priority"
        );
    }

    #[test]
    fn filter_operators() {
        let schema = tasks();
        let sql = |f: &str| build_filter(&schema, Some(f)).unwrap().sql();
        assert_eq!(sql(r#"TaskName[ne]"a""#), "AND Field1StringValue <> @TaskName");
        assert_eq!(sql(r#"TaskName[like]"%a%""#), "AND Field1StringValue LIKE @TaskName");
        assert_eq!(sql(r#"Due[lt]"2024-01-01""#), "AND Field3DateTimeValue < @Due");
        assert_eq!(sql(r#"Priority[zz]"1""#), "AND Field2NumberValue = @Priority");
    }

    #[test]
    fn filter_skips_unknown_and_malformed() {
        let q = build_filter(&tasks(), Some(r#"Nope[eq]"x",TaskName"y",Priority[eq]"1""#)).unwrap();
        assert_eq!(q.clauses, vec!["AND Field2NumberValue = @Priority"]);
        assert_eq!(q.params.len(), 1);
        assert!(build_filter(&tasks(), None).unwrap().is_empty());
        assert!(build_filter(&tasks(), Some("")).unwrap().is_empty());
    }

    #[test]
    fn filter_on_system_columns_and_case() {
        let q = build_filter(&tasks(), Some(r#" priority[eq] "5",createduserName[eq]"bob""#)).unwrap();
        assert_eq!(
            q.clauses,
            vec![
                "AND Field2NumberValue = @Priority",
                "AND CreatedUserName = @CreatedUserName"
            ]
        );
        assert_eq!(q.params[0].1, text("5"));
    }

    #[test]
    fn filter_never_embeds_values() {
        let q = build_filter(&tasks(), Some(r#"TaskName[eq]"x' OR 1=1 --""#)).unwrap();
        assert_eq!(q.sql(), "AND Field1StringValue = @TaskName");
        assert_eq!(q.params[0].1, text("x' OR 1=1 --"));
    }

    #[test]
    fn repeated_field_keeps_last_value() {
        let q = build_filter(&tasks(), Some(r#"Priority[ge]"1",Priority[lt]"5""#)).unwrap();
        assert_eq!(q.clauses.len(), 2);
        assert_eq!(q.params, vec![("Priority".to_string(), text("5"))]);
    }

    #[test]
    fn datetime_filters_bind_parsed_values() {
        let q = build_filter(&tasks(), Some(r#"Due[lt]"2024-06-01T09:30:00Z",updatedat[ge]"2024-01-01""#))
            .unwrap();
        assert_eq!(q.sql(), "AND Field3DateTimeValue < @Due AND UpdatedAt > @UpdatedAt");
        assert_eq!(
            q.params,
            vec![
                (
                    "Due".to_string(),
                    FilterValue::DateTime(Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap())
                ),
                (
                    "UpdatedAt".to_string(),
                    FilterValue::DateTime(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
                ),
            ]
        );

        let like = build_filter(&tasks(), Some(r#"Due[like]"2024-06%""#)).unwrap();
        assert_eq!(like.params[0].1, text("2024-06%"));
    }

    #[test]
    fn unparseable_datetime_filter_is_rejected() {
        let err = build_filter(&tasks(), Some(r#"Due[eq]"soon""#)).unwrap_err();
        assert!(matches!(err, TableError::BadInput(msg) if msg.contains("Due")));
    }

    #[test]
    fn select_maps_and_includes_id() {
        let schema = tasks();
        assert_eq!(build_select(&schema, None).unwrap(), "*");
        assert_eq!(build_select(&schema, Some("  ")).unwrap(), "*");
        assert_eq!(
            build_select(&schema, Some("taskname, Due")).unwrap(),
            "Id, Field1StringValue, Field3DateTimeValue"
        );
        assert_eq!(
            build_select(&schema, Some("Id,CreatedAt,Extra")).unwrap(),
            "Id, CreatedAt, Extra"
        );
        assert!(build_select(&schema, Some("TaskName; DROP TABLE x")).is_err());
    }
}
