use serde::{Deserialize, Serialize};

/// Read model of a document owned by the content service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
}

/// Read model of a user from the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(alias = "fullName")]
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

/// What a client needs to open a pad: where to go, whether it is read-only,
/// and the session value to present as a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDescriptor {
    pub target_url: String,
    pub read_only: bool,
    pub session_token: String,
}

/// A pad edit reported by the pad service, resolved to local ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadEdit {
    pub user_id: String,
    pub document_id: String,
}
