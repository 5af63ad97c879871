//! Pad service API abstraction.
//!
//! The pad service speaks a form-encoded RPC API whose responses are always a
//! `{code, message, data}` envelope, usually inside a `200 OK`. `code 0` is
//! success, `code 1` is a domain negative such as "padID does not exist", and
//! anything else is a failure. [`Envelope::into_outcome`] turns that into a
//! [`RemoteOutcome`] so callers can tell a legitimate "not found" apart from a
//! broken call at the type level.

pub mod etherpad;
pub mod mock;

use crate::config::SessionPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub const CREATE_AUTHOR: &str = "createAuthor";
pub const CREATE_GROUP: &str = "createGroup";
pub const CREATE_GROUP_PAD: &str = "createGroupPad";
pub const CREATE_SESSION: &str = "createSession";
pub const GET_SESSION_INFO: &str = "getSessionInfo";
pub const GET_READ_ONLY_ID: &str = "getReadOnlyID";
pub const SET_HTML: &str = "setHTML";
pub const GET_TEXT: &str = "getText";

/// Envelope code for success.
pub const CODE_OK: i64 = 0;
/// Envelope code for a domain negative ("does not exist").
pub const CODE_NEGATIVE: i64 = 1;

/// A failed pad service call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct RemoteError {
    pub operation: &'static str,
    pub message: String,
}

impl RemoteError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Result of a call that reached the pad service and was understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome<T> {
    Success(T),
    /// The service answered with `code 1`; carries its message.
    Negative(String),
}

/// Raw response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_outcome(
        self,
        operation: &'static str,
    ) -> Result<RemoteOutcome<Option<T>>, RemoteError> {
        match self.code {
            CODE_OK => Ok(RemoteOutcome::Success(self.data)),
            CODE_NEGATIVE => Ok(RemoteOutcome::Negative(self.message)),
            other => Err(RemoteError::new(
                operation,
                format!("code {}: {}", other, self.message),
            )),
        }
    }
}

impl<T> RemoteOutcome<Option<T>> {
    /// Demand a payload: a negative or an empty success is an error.
    pub fn into_required(self, operation: &'static str) -> Result<T, RemoteError> {
        match self {
            RemoteOutcome::Success(Some(data)) => Ok(data),
            RemoteOutcome::Success(None) => {
                Err(RemoteError::new(operation, "response carried no data"))
            }
            RemoteOutcome::Negative(message) => Err(RemoteError::new(operation, message)),
        }
    }

    /// A negative becomes `None`; an empty success is still an error.
    pub fn into_optional(self, operation: &'static str) -> Result<Option<T>, RemoteError> {
        match self {
            RemoteOutcome::Success(Some(data)) => Ok(Some(data)),
            RemoteOutcome::Success(None) => {
                Err(RemoteError::new(operation, "response carried no data"))
            }
            RemoteOutcome::Negative(_) => Ok(None),
        }
    }
}

/// Session details as reported by `getSessionInfo`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    #[serde(rename = "authorID")]
    pub author_id: String,
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "validUntil")]
    pub valid_until: i64,
}

/// Decides whether a live remote session is still worth handing out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalCheck {
    pub threshold_secs: i64,
    pub require_group_match: bool,
}

impl RenewalCheck {
    pub fn accepts(&self, info: &SessionInfo, now: i64, group_id: &str) -> bool {
        if self.require_group_match && info.group_id != group_id {
            return false;
        }
        info.valid_until - now >= self.threshold_secs
    }
}

impl From<&SessionPolicy> for RenewalCheck {
    fn from(policy: &SessionPolicy) -> Self {
        Self {
            threshold_secs: policy.renewal_threshold_secs,
            require_group_match: policy.require_group_match,
        }
    }
}

/// Operations the broker needs from the pad service.
#[async_trait]
pub trait CollabRemote: Send + Sync {
    async fn create_author(&self, display_name: &str) -> Result<String, RemoteError>;

    async fn create_group(&self) -> Result<String, RemoteError>;

    /// Returns the composite group-pad id (`<groupID>$<padName>`).
    async fn create_group_pad(&self, group_id: &str, pad_name: &str)
        -> Result<String, RemoteError>;

    async fn create_session(
        &self,
        group_id: &str,
        author_id: &str,
        valid_until: i64,
    ) -> Result<String, RemoteError>;

    /// `None` when the service does not know the session.
    async fn session_info(&self, session_id: &str) -> Result<Option<SessionInfo>, RemoteError>;

    /// Rule applied by [`CollabRemote::check_session_valid`].
    fn renewal(&self) -> RenewalCheck;

    /// True iff the session exists remotely and passes the renewal check.
    async fn check_session_valid(
        &self,
        now: i64,
        session_id: &str,
        group_id: &str,
    ) -> Result<bool, RemoteError> {
        let renewal = self.renewal();
        Ok(self
            .session_info(session_id)
            .await?
            .map(|info| renewal.accepts(&info, now, group_id))
            .unwrap_or(false))
    }

    /// `None` when the service does not know the pad.
    async fn get_read_only_id(&self, group_pad_id: &str) -> Result<Option<String>, RemoteError>;

    async fn set_html(&self, pad_id: &str, html: &str) -> Result<(), RemoteError>;

    async fn get_text(&self, pad_id: &str) -> Result<String, RemoteError>;
}
