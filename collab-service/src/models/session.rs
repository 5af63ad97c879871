use serde::{Deserialize, Serialize};

/// Identifies one cached session slot.
///
/// `document_id` is only set when sessions are scoped per (user, document).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub document_id: Option<String>,
}

impl SessionKey {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            document_id: None,
        }
    }

    pub fn for_user_document(user_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            document_id: Some(document_id.into()),
        }
    }

    /// Primary key the slot is stored under.
    pub fn storage_key(&self) -> String {
        match &self.document_id {
            Some(document_id) => format!("{}#{}", self.user_id, document_id),
            None => self.user_id.clone(),
        }
    }
}

/// The most recently used pad-service session for one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSession {
    #[serde(rename = "_id")]
    pub key: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub remote_session_id: String,
    pub remote_group_id: String,
    /// Absolute expiry in epoch seconds, as sent to the pad service.
    pub valid_until: i64,
}

impl UserSession {
    pub fn new(
        key: &SessionKey,
        remote_session_id: impl Into<String>,
        remote_group_id: impl Into<String>,
        valid_until: i64,
    ) -> Self {
        Self {
            key: key.storage_key(),
            user_id: key.user_id.clone(),
            document_id: key.document_id.clone(),
            remote_session_id: remote_session_id.into(),
            remote_group_id: remote_group_id.into(),
            valid_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_distinguishes_scopes() {
        assert_eq!(SessionKey::for_user("u1").storage_key(), "u1");
        assert_eq!(SessionKey::for_user_document("u1", "d9").storage_key(), "u1#d9");
    }

    #[test]
    fn test_session_carries_slot_fields() {
        let key = SessionKey::for_user_document("u1", "d9");
        let session = UserSession::new(&key, "s.1", "g.1", 100);
        assert_eq!(session.key, "u1#d9");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.document_id.as_deref(), Some("d9"));
    }
}
