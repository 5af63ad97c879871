use crate::dtos::{TemplateRequest, TemplateResponse};
use crate::middleware::UserId;
use crate::models::Permission;
use crate::services::BrokerError;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

/// Create a document's room pre-filled with the content of another
/// document's pad.
pub async fn create_from_template(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    user_id: UserId,
    Json(req): Json<TemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let user = state
        .users
        .find_user(&user_id.0)
        .await?
        .ok_or_else(|| BrokerError::NotFound(format!("user {}", user_id.0)))?;
    let document = state
        .documents
        .find_document(&document_id)
        .await?
        .ok_or_else(|| BrokerError::NotFound(format!("document {}", document_id)))?;
    let parent = state
        .documents
        .find_document(&req.parent_document_id)
        .await?
        .ok_or_else(|| {
            BrokerError::NotFound(format!("document {}", req.parent_document_id))
        })?;

    state
        .gate
        .check_permission(&parent, &user, Permission::Read)
        .await?;
    state
        .gate
        .check_permission(&document, &user, Permission::Write)
        .await?;

    let group_pad_id = state
        .broker
        .create_room_from_template(&document, &parent.id)
        .await?;

    tracing::info!(
        document_id = %document.id,
        parent_document_id = %parent.id,
        "Created room from template"
    );

    Ok((StatusCode::CREATED, Json(TemplateResponse { group_pad_id })))
}
