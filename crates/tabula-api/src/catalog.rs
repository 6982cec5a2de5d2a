//! Table definition lifecycle. Team users only.

use chrono::Utc;
use tabula_db::Database;
use tabula_engine::naming::TableNameMapper;
use tabula_engine::paging::{PageRequest, PagedResponse};
use tabula_engine::schema::{normalize_table_name, validate_definition};
use tabula_engine::{CallerContext, PrivacyLevel, Result, TableDefinition, TableError, TableState};
use tabula_types::{CreateTableRequest, UpdateTableRequest};
use tracing::info;

fn require_team_user(ctx: &CallerContext) -> Result<()> {
    if ctx.is_subscriber() {
        return Err(TableError::Unauthorized("table management requires a team user".into()));
    }
    Ok(())
}

/// Team a request acts on. Only super admins may name another team.
fn target_team(ctx: &CallerContext, requested: Option<i64>) -> Result<i64> {
    match requested {
        Some(team_id) if team_id != ctx.team_id && !ctx.is_super_admin() => Err(
            TableError::Unauthorized(format!("team {} does not match caller", team_id)),
        ),
        Some(team_id) => Ok(team_id),
        None => Ok(ctx.team_id),
    }
}

pub fn list_tables(db: &Database, ctx: &CallerContext, request: &PageRequest) -> Result<PagedResponse<TableDefinition>> {
    require_team_user(ctx)?;
    let (tables, total) = db.list_tables(ctx.team_id, request.skip(), request.take())?;
    Ok(PagedResponse::new(request, total, tables))
}

pub fn get_table(db: &Database, ctx: &CallerContext, id: i64) -> Result<TableDefinition> {
    require_team_user(ctx)?;
    let table = db
        .get_table(id)?
        .ok_or_else(|| TableError::TableNotFound(id.to_string()))?;
    target_team(ctx, Some(table.team_id))?;
    Ok(table)
}

/// Create a table, or bring a deleted one with the same name back into editing.
pub fn create_table(db: &Database, ctx: &CallerContext, req: &CreateTableRequest) -> Result<TableDefinition> {
    require_team_user(ctx)?;
    let team_id = target_team(ctx, req.team_id)?;
    let team = db
        .get_team(team_id)?
        .ok_or_else(|| TableError::BadInput(format!("unknown team {}", team_id)))?;

    let table_name = normalize_table_name(&req.table_label);
    validate_definition(&table_name, &req.field_names, &req.field_types)?;
    let now = Utc::now();

    let table = match db.get_table_by_name(team.id, &table_name)? {
        Some(existing) if !existing.is_deleted() => {
            return Err(TableError::Conflict(format!("table '{}' already exists", table_name)));
        }
        Some(mut existing) => {
            existing.table_label = req.table_label.clone();
            existing.field_names = req.field_names.clone();
            existing.field_types = req.field_types.clone();
            existing.table_state = TableState::TableEditing;
            existing.updated_user_name = ctx.user_name.clone();
            existing.updated_at = now;
            db.update_table(&existing)?;
            info!("Resurrected table {} for team {}", table_name, team.id);
            existing
        }
        None => {
            let mut table = TableDefinition {
                id: 0,
                team_id: team.id,
                team_name: team.team_name.clone(),
                table_name: table_name.clone(),
                table_label: req.table_label.clone(),
                field_names: req.field_names.clone(),
                field_types: req.field_types.clone(),
                table_state: TableState::TableCreated,
                table_privacy_model: PrivacyLevel::Private,
                table_view_mode: 0,
                created_user_name: ctx.user_name.clone(),
                created_at: now,
                updated_user_name: ctx.user_name.clone(),
                updated_at: now,
            };
            table.id = db.insert_table(&table)?;
            info!("Created table {} for team {}", table_name, team.id);
            table
        }
    };

    db.create_record_table(&TableNameMapper::new(&team.table_prefix).records(&table.table_name))?;
    Ok(table)
}

/// Apply the fields present in the request; the rest keep their stored value.
pub fn update_table(db: &Database, ctx: &CallerContext, id: i64, req: &UpdateTableRequest) -> Result<TableDefinition> {
    if req.id != id {
        return Err(TableError::BadInput(format!("body id does not match table {}", id)));
    }
    let mut table = get_table(db, ctx, id)?;
    target_team(ctx, req.team_id)?;

    if let Some(names) = &req.field_names {
        table.field_names = names.clone();
    }
    if let Some(types) = &req.field_types {
        table.field_types = types.clone();
    }
    if let Some(state) = req.table_state {
        table.table_state = TableState::try_from(state)?;
    }
    if let Some(privacy) = req.table_privacy_model {
        table.table_privacy_model = privacy;
    }
    if let Some(view_mode) = req.table_view_mode {
        table.table_view_mode = view_mode;
    }
    validate_definition(&table.table_name, &table.field_names, &table.field_types)?;

    table.updated_user_name = ctx.user_name.clone();
    table.updated_at = Utc::now();
    if !db.update_table(&table)? {
        return Err(TableError::TableNotFound(id.to_string()));
    }
    Ok(table)
}

/// Soft delete: rows stay, the table becomes invisible to record operations.
pub fn delete_table(db: &Database, ctx: &CallerContext, id: i64) -> Result<()> {
    let mut table = get_table(db, ctx, id)?;
    table.table_state = TableState::TableDeleted;
    table.updated_user_name = ctx.user_name.clone();
    table.updated_at = Utc::now();
    if !db.update_table(&table)? {
        return Err(TableError::TableNotFound(id.to_string()));
    }
    info!("Deleted table {} ({})", table.table_name, id);
    Ok(())
}
