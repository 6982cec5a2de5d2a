/// Longest table prefix derived from a team name.
const MAX_PREFIX_LEN: usize = 20;

/// Kinds of per-team physical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind<'a> {
    /// Generic record storage for one team table.
    Records(&'a str),
    Subscribers,
}

/// Physical table name for a team entity: `{prefix}_{name}`.
pub fn physical_name(prefix: &str, kind: EntityKind<'_>) -> String {
    match kind {
        EntityKind::Records(table_name) => format!("{}_{}", prefix, table_name),
        EntityKind::Subscribers => format!("{}_subscribers", prefix),
    }
}

/// Derive a team's table prefix from its name: lowercased, stripped to
/// `[a-z0-9_]`, at most 20 characters.
pub fn table_prefix(team_name: &str) -> String {
    team_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .take(MAX_PREFIX_LEN)
        .collect()
}

/// Physical names for one team, bound to its prefix for the life of a request.
#[derive(Debug, Clone)]
pub struct TableNameMapper {
    prefix: String,
}

impl TableNameMapper {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn records(&self, table_name: &str) -> String {
        physical_name(&self.prefix, EntityKind::Records(table_name))
    }

    pub fn subscribers(&self) -> String {
        physical_name(&self.prefix, EntityKind::Subscribers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_from_team_name() {
        assert_eq!(table_prefix("Acme Corp"), "acmecorp");
        assert_eq!(table_prefix("Bob's \"Cafe\"; --"), "bobscafe");
        assert_eq!(table_prefix("A Very Long Team Name Indeed Yes"), "averylongteamnameind");
    }

    #[test]
    fn mapper_composes_names() {
        let names = TableNameMapper::new("acme");
        assert_eq!(names.records("tasks"), "acme_tasks");
        assert_eq!(names.subscribers(), "acme_subscribers");
        assert_eq!(names.records("tasks"), physical_name("acme", EntityKind::Records("tasks")));
    }
}
