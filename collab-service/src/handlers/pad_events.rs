use crate::dtos::{PadUpdateEvent, PadUpdateResponse, SessionHolderRequest, SessionHolderResponse};
use crate::services::BrokerError;
use crate::startup::AppState;
use axum::{extract::State, Json};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use subtle::ConstantTimeEq;
use validator::Validate;

fn verify_api_key(state: &AppState, api_key: &str) -> Result<(), AppError> {
    let expected = state.pad_api_key.expose_secret().as_bytes();
    if bool::from(api_key.as_bytes().ct_eq(expected)) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(anyhow::anyhow!("Invalid api key")))
    }
}

/// Edit callback from the pad service: attribute the edit to a local user
/// and document.
pub async fn pad_update(
    State(state): State<AppState>,
    Json(event): Json<PadUpdateEvent>,
) -> Result<Json<PadUpdateResponse>, AppError> {
    if let Err(err) = verify_api_key(&state, &event.api_key) {
        tracing::warn!(pad_id = %event.pad_id, "Rejected pad event with wrong api key");
        return Err(err);
    }
    event.validate()?;

    let edit = state
        .broker
        .resolve_pad_edit(&event.author_id, &event.pad_id)
        .await?;
    state.activity.record_edit(&edit).await?;

    tracing::debug!(
        user_id = %edit.user_id,
        document_id = %edit.document_id,
        "Recorded pad edit"
    );

    Ok(Json(PadUpdateResponse::from(edit)))
}

/// Pad-service plugin lookup: which local user a pad session belongs to.
/// An unknown session is treated as an invalid credential.
pub async fn session_holder(
    State(state): State<AppState>,
    Json(req): Json<SessionHolderRequest>,
) -> Result<Json<SessionHolderResponse>, AppError> {
    if let Err(err) = verify_api_key(&state, &req.api_key) {
        tracing::warn!("Rejected session lookup with wrong api key");
        return Err(err);
    }
    req.validate()?;

    let user_id = match state.broker.session_holder(&req.session_id).await {
        Ok(user_id) => user_id,
        Err(BrokerError::NotFound(_)) => {
            return Err(AppError::Unauthorized(anyhow::anyhow!("sessionID is invalid")));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Json(SessionHolderResponse { user_id }))
}
