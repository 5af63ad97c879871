use serde::{Deserialize, Serialize};

/// Separator between the group and pad name in a group-pad id (`g.abc$notes`).
pub const GROUP_PAD_SEPARATOR: char = '$';

/// Maps a local document onto its pad-service group and pad.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRoom {
    #[serde(rename = "_id")]
    pub document_id: String,
    pub remote_group_id: String,
    pub remote_group_pad_id: String,
    /// Filled lazily on the first read-only access; permanent once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_read_only_id: Option<String>,
}

impl DocumentRoom {
    /// Build a room from a freshly created pad. The group id is taken from the
    /// pad id when it carries one, otherwise from the group the pad was
    /// created in.
    pub fn new(
        document_id: impl Into<String>,
        created_group_id: &str,
        remote_group_pad_id: impl Into<String>,
    ) -> Self {
        let remote_group_pad_id = remote_group_pad_id.into();
        let remote_group_id = group_id_from_pad_id(&remote_group_pad_id)
            .unwrap_or(created_group_id)
            .to_string();

        Self {
            document_id: document_id.into(),
            remote_group_id,
            remote_group_pad_id,
            remote_read_only_id: None,
        }
    }
}

/// Group segment of a composite group-pad id, if it has one.
pub fn group_id_from_pad_id(pad_id: &str) -> Option<&str> {
    pad_id
        .split_once(GROUP_PAD_SEPARATOR)
        .map(|(group, _)| group)
        .filter(|group| !group.is_empty())
}
