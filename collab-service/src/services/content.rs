//! HTTP adapter for the content service that owns documents, users and
//! permissions.

use super::broker::{ActivitySink, DocumentCatalog, PermissionGate, UserDirectory};
use super::BrokerError;
use crate::models::{Document, PadEdit, Permission, User};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use service_core::observability::TracedClientExt;
use std::time::Duration;

const CONTENT_SERVICE: &str = "content-service";

#[derive(Clone)]
pub struct ContentServiceClient {
    client: Client,
    base_url: String,
}

impl ContentServiceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, BrokerError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .traced_get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| unavailable(format!("undecodable response from {}: {}", path, e))),
            _ => Err(unexpected_status(path, response).await),
        }
    }
}

fn transport_error(err: reqwest::Error) -> BrokerError {
    tracing::warn!(error = %err, "Content service unreachable");
    unavailable(format!("transport failure: {}", err))
}

fn unavailable(message: String) -> BrokerError {
    BrokerError::RemoteService {
        operation: CONTENT_SERVICE,
        message,
    }
}

async fn unexpected_status(path: &str, response: Response) -> BrokerError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(path, status = %status, "Unexpected content service response");
    unavailable(format!("HTTP {} from {}: {}", status, path, body))
}

#[async_trait]
impl PermissionGate for ContentServiceClient {
    async fn check_permission(
        &self,
        document: &Document,
        user: &User,
        permission: Permission,
    ) -> Result<(), BrokerError> {
        let path = format!(
            "/documents/{}/permissions/{}",
            document.id,
            permission.as_str()
        );
        let response = self
            .client
            .traced_get(&format!("{}{}", self.base_url, path))
            .header("X-User-ID", &user.id)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::FORBIDDEN => Err(BrokerError::PermissionDenied(format!(
                "{} on document {}",
                permission.as_str(),
                document.id
            ))),
            StatusCode::NOT_FOUND => {
                Err(BrokerError::NotFound(format!("document {}", document.id)))
            }
            _ => Err(unexpected_status(&path, response).await),
        }
    }
}

#[async_trait]
impl DocumentCatalog for ContentServiceClient {
    async fn find_document(&self, document_id: &str) -> Result<Option<Document>, BrokerError> {
        self.get_optional(&format!("/documents/{}", document_id)).await
    }
}

#[async_trait]
impl UserDirectory for ContentServiceClient {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, BrokerError> {
        self.get_optional(&format!("/users/{}", user_id)).await
    }
}

#[async_trait]
impl ActivitySink for ContentServiceClient {
    async fn record_edit(&self, edit: &PadEdit) -> Result<(), BrokerError> {
        let path = format!("/documents/{}/touch", edit.document_id);
        let response = self
            .client
            .traced_post(&format!("{}{}", self.base_url, path))
            .json(&json!({ "user_id": edit.user_id }))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                Err(BrokerError::NotFound(format!("document {}", edit.document_id)))
            }
            _ => Err(unexpected_status(&path, response).await),
        }
    }
}
