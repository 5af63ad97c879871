//! Etherpad HTTP API client.
//!
//! Every call is a form-encoded POST to `{endpoint}/api/{version}/{method}`
//! carrying the shared `apikey`.

use super::{
    CollabRemote, Envelope, RemoteError, RemoteOutcome, RenewalCheck, SessionInfo, CREATE_AUTHOR,
    CREATE_GROUP, CREATE_GROUP_PAD, CREATE_SESSION, GET_READ_ONLY_ID, GET_SESSION_INFO, GET_TEXT,
    SET_HTML,
};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::time::Duration;

/// Longest response excerpt carried into an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct AuthorData {
    #[serde(rename = "authorID")]
    author_id: String,
}

#[derive(Debug, Deserialize)]
struct GroupData {
    #[serde(rename = "groupID")]
    group_id: String,
}

#[derive(Debug, Deserialize)]
struct PadData {
    #[serde(rename = "padID")]
    pad_id: String,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    #[serde(rename = "sessionID")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ReadOnlyData {
    #[serde(rename = "readOnlyID")]
    read_only_id: String,
}

#[derive(Debug, Deserialize)]
struct TextData {
    text: String,
}

/// Typed client for the pad service.
#[derive(Clone)]
pub struct EtherpadClient {
    client: Client,
    config: RemoteConfig,
    renewal: RenewalCheck,
}

impl EtherpadClient {
    pub fn new(config: RemoteConfig, renewal: RenewalCheck) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            renewal,
        })
    }

    fn api_url(&self, operation: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.config.endpoint, self.config.api_version, operation
        )
    }

    /// Issue one API call and decode its envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        params: &[(&str, &str)],
    ) -> Result<RemoteOutcome<Option<T>>, RemoteError> {
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
        form.push(("apikey", self.config.api_key.expose_secret().as_str()));
        form.extend_from_slice(params);

        let result = self.send(operation, &form).await;

        let outcome = match &result {
            Ok(RemoteOutcome::Success(_)) => "success",
            Ok(RemoteOutcome::Negative(_)) => "negative",
            Err(_) => "error",
        };
        counter!(
            "collab_remote_calls_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);

        if let Err(e) = &result {
            tracing::warn!(operation, error = %e.message, "Pad service call failed");
        }

        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        form: &[(&str, &str)],
    ) -> Result<RemoteOutcome<Option<T>>, RemoteError> {
        let response = self
            .client
            .traced_post(&self.api_url(operation))
            .form(form)
            .send()
            .await
            .map_err(|e| RemoteError::new(operation, format!("transport failure: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::new(operation, format!("failed to read response: {}", e)))?;

        tracing::debug!(operation, status = %status, "Pad service response");

        if !status.is_success() {
            return Err(RemoteError::new(
                operation,
                format!("HTTP {}: {}", status, excerpt(&body)),
            ));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            RemoteError::new(operation, format!("undecodable response: {}", e))
        })?;

        envelope.into_outcome(operation)
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl CollabRemote for EtherpadClient {
    fn renewal(&self) -> RenewalCheck {
        self.renewal
    }

    async fn create_author(&self, display_name: &str) -> Result<String, RemoteError> {
        let data: AuthorData = self
            .call(CREATE_AUTHOR, &[("name", display_name)])
            .await?
            .into_required(CREATE_AUTHOR)?;
        tracing::info!(author_id = %data.author_id, "Created pad author");
        Ok(data.author_id)
    }

    async fn create_group(&self) -> Result<String, RemoteError> {
        let data: GroupData = self
            .call(CREATE_GROUP, &[])
            .await?
            .into_required(CREATE_GROUP)?;
        tracing::info!(group_id = %data.group_id, "Created pad group");
        Ok(data.group_id)
    }

    async fn create_group_pad(
        &self,
        group_id: &str,
        pad_name: &str,
    ) -> Result<String, RemoteError> {
        let data: PadData = self
            .call(
                CREATE_GROUP_PAD,
                &[("groupID", group_id), ("padName", pad_name)],
            )
            .await?
            .into_required(CREATE_GROUP_PAD)?;
        tracing::info!(pad_id = %data.pad_id, "Created group pad");
        Ok(data.pad_id)
    }

    async fn create_session(
        &self,
        group_id: &str,
        author_id: &str,
        valid_until: i64,
    ) -> Result<String, RemoteError> {
        let valid_until = valid_until.to_string();
        let data: SessionData = self
            .call(
                CREATE_SESSION,
                &[
                    ("groupID", group_id),
                    ("authorID", author_id),
                    ("validUntil", valid_until.as_str()),
                ],
            )
            .await?
            .into_required(CREATE_SESSION)?;
        Ok(data.session_id)
    }

    async fn session_info(&self, session_id: &str) -> Result<Option<SessionInfo>, RemoteError> {
        self.call(GET_SESSION_INFO, &[("sessionID", session_id)])
            .await?
            .into_optional(GET_SESSION_INFO)
    }

    async fn get_read_only_id(&self, group_pad_id: &str) -> Result<Option<String>, RemoteError> {
        let data: Option<ReadOnlyData> = self
            .call(GET_READ_ONLY_ID, &[("padID", group_pad_id)])
            .await?
            .into_optional(GET_READ_ONLY_ID)?;
        Ok(data.map(|d| d.read_only_id))
    }

    async fn set_html(&self, pad_id: &str, html: &str) -> Result<(), RemoteError> {
        let document = format!(
            "<!DOCTYPE html><html><head><title></title></head><body>{}</body></html>",
            html
        );
        match self
            .call::<serde_json::Value>(SET_HTML, &[("padID", pad_id), ("html", document.as_str())])
            .await?
        {
            RemoteOutcome::Success(_) => Ok(()),
            RemoteOutcome::Negative(message) => Err(RemoteError::new(SET_HTML, message)),
        }
    }

    async fn get_text(&self, pad_id: &str) -> Result<String, RemoteError> {
        let data: TextData = self
            .call(GET_TEXT, &[("padID", pad_id)])
            .await?
            .into_required(GET_TEXT)?;
        Ok(data.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn client(endpoint: &str) -> EtherpadClient {
        EtherpadClient::new(
            RemoteConfig {
                endpoint: endpoint.to_string(),
                external_endpoint: endpoint.to_string(),
                api_key: Secret::new("key".to_string()),
                api_version: "1.2.13".to_string(),
                timeout_secs: 5,
            },
            RenewalCheck {
                threshold_secs: 10_800,
                require_group_match: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_api_url_includes_version() {
        assert_eq!(
            client("http://pad:9001").api_url(CREATE_GROUP),
            "http://pad:9001/api/1.2.13/createGroup"
        );
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(excerpt(&long).chars().count(), MAX_ERROR_BODY);
        assert_eq!(excerpt("short"), "short");
    }
}
