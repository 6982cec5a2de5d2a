use crate::error::{Result, TableError};
use crate::record::GenericRecord;
use crate::schema::{PrivacyLevel, TableDefinition};

/// Identity as seen by the privacy gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Anonymous caller of the public reader endpoints.
    Reader,
    TeamUser { team_id: i64, super_admin: bool },
    Subscriber { team_id: i64, subscriber_id: i64 },
}

fn owns(table: &TableDefinition, team_id: i64, super_admin: bool) -> bool {
    super_admin || table.team_id == team_id
}

/// Table-level read check.
pub fn authorize_read(table: &TableDefinition, caller: Caller) -> bool {
    let level = table.table_privacy_model;
    match caller {
        Caller::TeamUser { team_id, super_admin } => owns(table, team_id, super_admin),
        Caller::Reader => level >= PrivacyLevel::PublicRead,
        Caller::Subscriber { team_id, .. } => {
            level >= PrivacyLevel::Subscriber && table.team_id == team_id
        }
    }
}

/// Table-level write check. Readers never write.
pub fn authorize_write(table: &TableDefinition, caller: Caller) -> bool {
    match caller {
        Caller::TeamUser { team_id, super_admin } => owns(table, team_id, super_admin),
        Caller::Reader => false,
        Caller::Subscriber { team_id, .. } => {
            table.table_privacy_model >= PrivacyLevel::Subscriber && table.team_id == team_id
        }
    }
}

/// Row-level check. Subscribers only ever see rows they submitted; readers
/// never see subscriber submissions.
pub fn authorize_row(record: &GenericRecord, caller: Caller) -> bool {
    match caller {
        Caller::TeamUser { team_id, super_admin } => super_admin || record.team_id == team_id,
        Caller::Reader => record.subscriber_id.is_none(),
        Caller::Subscriber { subscriber_id, .. } => record.subscriber_id == Some(subscriber_id),
    }
}

/// Rows a listing may return, the query-side form of [`authorize_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    All,
    /// Rows without a submitting subscriber.
    TeamRows,
    SubmittedBy(i64),
}

pub fn row_scope(caller: Caller) -> RowScope {
    match caller {
        Caller::TeamUser { .. } => RowScope::All,
        Caller::Reader => RowScope::TeamRows,
        Caller::Subscriber { subscriber_id, .. } => RowScope::SubmittedBy(subscriber_id),
    }
}

pub fn require_read(table: &TableDefinition, caller: Caller) -> Result<()> {
    if authorize_read(table, caller) {
        Ok(())
    } else {
        Err(TableError::Unauthorized(format!("read access to '{}' denied", table.table_name)))
    }
}

pub fn require_write(table: &TableDefinition, caller: Caller) -> Result<()> {
    if authorize_write(table, caller) {
        Ok(())
    } else {
        Err(TableError::Unauthorized(format!("write access to '{}' denied", table.table_name)))
    }
}

pub fn require_row(record: &GenericRecord, caller: Caller) -> Result<()> {
    if authorize_row(record, caller) {
        Ok(())
    } else {
        Err(TableError::Unauthorized(format!("record {} belongs to another owner", record.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_table;

    fn table(level: PrivacyLevel) -> TableDefinition {
        let mut t = test_table("Name", "string");
        t.table_privacy_model = level;
        t
    }

    const TEAM: Caller = Caller::TeamUser { team_id: 7, super_admin: false };
    const OTHER_TEAM: Caller = Caller::TeamUser { team_id: 8, super_admin: false };
    const ADMIN: Caller = Caller::TeamUser { team_id: 8, super_admin: true };
    const SUB_A: Caller = Caller::Subscriber { team_id: 7, subscriber_id: 1 };
    const SUB_B: Caller = Caller::Subscriber { team_id: 7, subscriber_id: 2 };

    #[test]
    fn private_table_is_team_only() {
        let t = table(PrivacyLevel::Private);
        assert!(authorize_read(&t, TEAM));
        assert!(authorize_read(&t, ADMIN));
        assert!(!authorize_read(&t, OTHER_TEAM));
        assert!(!authorize_read(&t, Caller::Reader));
        assert!(!authorize_read(&t, SUB_A));
    }

    #[test]
    fn public_read_opens_readers_only() {
        let t = table(PrivacyLevel::PublicRead);
        assert!(authorize_read(&t, Caller::Reader));
        assert!(!authorize_write(&t, Caller::Reader));
        assert!(!authorize_read(&t, SUB_A));
        assert!(!authorize_write(&t, OTHER_TEAM));
    }

    #[test]
    fn subscriber_table_scopes_rows() {
        let t = table(PrivacyLevel::Subscriber);
        assert!(authorize_read(&t, SUB_A));
        assert!(authorize_write(&t, SUB_B));
        assert!(!authorize_read(&t, Caller::Subscriber { team_id: 9, subscriber_id: 1 }));

        let row = GenericRecord {
            id: 5,
            team_id: 7,
            subscriber_id: Some(1),
            ..GenericRecord::default()
        };
        assert!(authorize_row(&row, SUB_A));
        assert!(!authorize_row(&row, SUB_B));
        assert!(authorize_row(&row, TEAM));
        assert!(!authorize_row(&row, OTHER_TEAM));
        assert!(matches!(require_row(&row, SUB_B), Err(TableError::Unauthorized(_))));
    }

    #[test]
    fn readers_never_see_submissions() {
        let submitted = GenericRecord {
            id: 5,
            team_id: 7,
            subscriber_id: Some(1),
            ..GenericRecord::default()
        };
        let team_row = GenericRecord {
            subscriber_id: None,
            ..submitted.clone()
        };
        assert!(!authorize_row(&submitted, Caller::Reader));
        assert!(authorize_row(&team_row, Caller::Reader));

        assert_eq!(row_scope(Caller::Reader), RowScope::TeamRows);
        assert_eq!(row_scope(SUB_A), RowScope::SubmittedBy(1));
        assert_eq!(row_scope(ADMIN), RowScope::All);
    }

    #[test]
    fn require_maps_to_unauthorized() {
        let t = table(PrivacyLevel::Private);
        assert!(require_read(&t, TEAM).is_ok());
        assert!(matches!(require_write(&t, Caller::Reader), Err(TableError::Unauthorized(_))));
    }
}
