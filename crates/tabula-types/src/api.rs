use serde::{Deserialize, Serialize};
use tabula_engine::{LogicalRecord, PrivacyLevel};
use tabula_engine::paging::PageRequest;

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    User,
    Subscriber,
}

/// Bearer token claims. `sub` is the user name for team users and the email
/// address for subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub team_id: i64,
    pub user_type: UserType,
    #[serde(default)]
    pub super_admin: bool,
    pub exp: usize,
}

// -- Record listings --

/// Query string of every paged listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub select: Option<String>,
    pub filter: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Sample record of one table, as listed by `GET /data`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTemplate {
    pub table_name: String,
    pub table_label: String,
    pub data: LogicalRecord,
}

// -- Table catalog --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTableRequest {
    /// Only honoured for super admins; defaults to the caller's team.
    pub team_id: Option<i64>,
    pub table_label: String,
    #[serde(default)]
    pub field_names: String,
    #[serde(default)]
    pub field_types: String,
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTableRequest {
    pub id: i64,
    pub team_id: Option<i64>,
    pub field_names: Option<String>,
    pub field_types: Option<String>,
    /// 0 created, 1 editing, 2 deleted.
    pub table_state: Option<i64>,
    pub table_privacy_model: Option<PrivacyLevel>,
    pub table_view_mode: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_default_super_admin() {
        let claims: Claims = serde_json::from_str(
            r#"{"sub":"alice","team_id":1,"user_type":"User","exp":10}"#,
        )
        .unwrap();
        assert!(!claims.super_admin);
        assert_eq!(claims.user_type, UserType::User);
    }

    #[test]
    fn update_request_is_partial() {
        let req: UpdateTableRequest =
            serde_json::from_str(r#"{"id":3,"tablePrivacyModel":2}"#).unwrap();
        assert_eq!(req.id, 3);
        assert_eq!(req.table_privacy_model, Some(PrivacyLevel::Subscriber));
        assert!(req.field_names.is_none());
        assert!(serde_json::from_str::<UpdateTableRequest>(r#"{"id":3,"bogus":1}"#).is_err());
    }
}
