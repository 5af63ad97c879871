use crate::config::CookieConfig;
use crate::dtos::CollabSessionResponse;
use crate::middleware::UserId;
use crate::services::BrokerError;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

/// Open (or resume) a collaborative editing session on a document.
pub async fn create_collab_session(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .users
        .find_user(&user_id.0)
        .await?
        .ok_or_else(|| BrokerError::NotFound(format!("user {}", user_id.0)))?;
    let document = state.documents.find_document(&document_id).await?;

    let access = state
        .broker
        .acquire_editing_access(document.as_ref(), &user)
        .await?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&state.cookie, &access.session_token))],
        Json(CollabSessionResponse::from(&access)),
    ))
}

/// `Set-Cookie` value carrying the pad-service session.
pub fn session_cookie(cookie: &CookieConfig, session_token: &str) -> String {
    let mut value = format!("{}={}; Path=/", cookie.name, session_token);
    if let Some(domain) = &cookie.domain {
        value.push_str("; Domain=");
        value.push_str(domain);
    }
    value
}
