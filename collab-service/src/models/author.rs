use serde::{Deserialize, Serialize};

/// Maps a local user onto the author identity the pad service knows them by.
///
/// Written once on first use and never changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorIdentity {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub remote_author_id: String,
}

impl AuthorIdentity {
    pub fn new(user_id: impl Into<String>, remote_author_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            remote_author_id: remote_author_id.into(),
        }
    }
}
