use crate::naming::TableNameMapper;
use crate::privacy::Caller;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerKind {
    TeamUser { super_admin: bool },
    Subscriber { subscriber_id: i64 },
}

/// An already authenticated caller. Built once at the API boundary and
/// passed explicitly to every operation.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub team_id: i64,
    pub team_name: String,
    pub table_prefix: String,
    /// User name for team users, email for subscribers. Stamped into audit fields.
    pub user_name: String,
    pub kind: CallerKind,
}

impl CallerContext {
    pub fn caller(&self) -> Caller {
        match self.kind {
            CallerKind::TeamUser { super_admin } => Caller::TeamUser {
                team_id: self.team_id,
                super_admin,
            },
            CallerKind::Subscriber { subscriber_id } => Caller::Subscriber {
                team_id: self.team_id,
                subscriber_id,
            },
        }
    }

    pub fn subscriber_id(&self) -> Option<i64> {
        match self.kind {
            CallerKind::Subscriber { subscriber_id } => Some(subscriber_id),
            CallerKind::TeamUser { .. } => None,
        }
    }

    pub fn is_subscriber(&self) -> bool {
        self.subscriber_id().is_some()
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self.kind, CallerKind::TeamUser { super_admin: true })
    }

    pub fn names(&self) -> TableNameMapper {
        TableNameMapper::new(&self.table_prefix)
    }
}
