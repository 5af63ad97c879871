use crate::models::{AccessDescriptor, PadEdit};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
pub struct CollabSessionResponse {
    pub url: String,
    pub read_only: bool,
}

impl From<&AccessDescriptor> for CollabSessionResponse {
    fn from(access: &AccessDescriptor) -> Self {
        Self {
            url: access.target_url.clone(),
            read_only: access.read_only,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TemplateRequest {
    #[validate(length(min = 1))]
    pub parent_document_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub group_pad_id: String,
}

/// Edit notification posted by the pad service.
#[derive(Debug, Deserialize, Validate)]
pub struct PadUpdateEvent {
    pub api_key: String,
    #[validate(length(min = 1))]
    pub author_id: String,
    #[validate(length(min = 1))]
    pub pad_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PadUpdateResponse {
    pub user_id: String,
    pub document_id: String,
}

impl From<PadEdit> for PadUpdateResponse {
    fn from(edit: PadEdit) -> Self {
        Self {
            user_id: edit.user_id,
            document_id: edit.document_id,
        }
    }
}

/// Session lookup posted by the pad service.
#[derive(Debug, Deserialize, Validate)]
pub struct SessionHolderRequest {
    pub api_key: String,
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionHolderResponse {
    pub user_id: String,
}
