//! Editing access orchestration.
//!
//! `CollabBroker` is the entry point the HTTP layer talks to. It gates on the
//! document permissions, makes sure the author, room and session exist on the
//! pad service, and tells the client where to go.

use super::authors::AuthorIdentityCache;
use super::remote::CollabRemote;
use super::rooms::DocumentRoomCache;
use super::sessions::{scope_for, Clock, SessionCache, SessionScope, SystemClock};
use super::store::{AuthorStore, RoomStore, SessionStore};
use super::BrokerError;
use crate::config::SessionPolicy;
use crate::models::{AccessDescriptor, Document, PadEdit, Permission, User};
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;

/// Document permission checks owned by the content service.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// `Ok(())` when granted, `PermissionDenied` when not.
    async fn check_permission(
        &self,
        document: &Document,
        user: &User,
        permission: Permission,
    ) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn find_document(&self, document_id: &str) -> Result<Option<Document>, BrokerError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, BrokerError>;
}

/// Receives pad edits reported back by the pad service.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record_edit(&self, edit: &PadEdit) -> Result<(), BrokerError>;
}

pub struct CollabBroker {
    authors: AuthorIdentityCache,
    rooms: DocumentRoomCache,
    sessions: SessionCache,
    gate: Arc<dyn PermissionGate>,
    scope: Arc<dyn SessionScope>,
    clock: Arc<dyn Clock>,
    external_endpoint: String,
}

impl CollabBroker {
    pub fn new<S>(
        store: Arc<S>,
        remote: Arc<dyn CollabRemote>,
        gate: Arc<dyn PermissionGate>,
        policy: SessionPolicy,
        external_endpoint: impl Into<String>,
    ) -> Self
    where
        S: AuthorStore + RoomStore + SessionStore + 'static,
    {
        let author_store: Arc<dyn AuthorStore> = store.clone();
        let room_store: Arc<dyn RoomStore> = store.clone();
        let session_store: Arc<dyn SessionStore> = store;

        Self {
            authors: AuthorIdentityCache::new(author_store, remote.clone()),
            rooms: DocumentRoomCache::new(room_store, remote.clone()),
            scope: scope_for(policy.scope),
            sessions: SessionCache::new(session_store, remote, policy),
            gate,
            clock: Arc::new(SystemClock),
            external_endpoint: external_endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scope(mut self, scope: Arc<dyn SessionScope>) -> Self {
        self.scope = scope;
        self
    }

    #[tracing::instrument(
        skip(self, document, user),
        fields(document_id = document.map(|d| d.id.as_str()), user_id = %user.id)
    )]
    pub async fn acquire_editing_access(
        &self,
        document: Option<&Document>,
        user: &User,
    ) -> Result<AccessDescriptor, BrokerError> {
        let document =
            document.ok_or_else(|| BrokerError::NotFound("document".to_string()))?;

        self.gate
            .check_permission(document, user, Permission::Read)
            .await?;

        let read_only = match self
            .gate
            .check_permission(document, user, Permission::Write)
            .await
        {
            Ok(()) => false,
            Err(BrokerError::PermissionDenied(_)) => true,
            Err(e) => return Err(e),
        };

        let author_id = self
            .authors
            .get_or_create_author(&user.id, &user.full_name)
            .await?;
        let (group_id, pad_id) = self
            .rooms
            .get_or_create_room(&document.id, &document.title)
            .await?;

        let pad_path = if read_only {
            self.rooms.get_or_create_read_only_token(&document.id).await?
        } else {
            pad_id
        };

        let key = self.scope.key(user, document);
        let session_token = self
            .sessions
            .acquire_session(&key, &author_id, &group_id, self.clock.now())
            .await?;

        let mode = if read_only { "read_only" } else { "edit" };
        counter!("collab_access_total", "mode" => mode).increment(1);
        tracing::info!(read_only, "Granted collaborative access");

        Ok(AccessDescriptor {
            target_url: format!("{}/p/{}", self.external_endpoint, pad_path),
            read_only,
            session_token,
        })
    }

    /// Create `new_document`'s room seeded with the text of the parent's pad.
    /// Returns the new group-pad id.
    pub async fn create_room_from_template(
        &self,
        new_document: &Document,
        parent_document_id: &str,
    ) -> Result<String, BrokerError> {
        let text = self.rooms.room_text(parent_document_id).await?;
        let room = self
            .rooms
            .create_room_with_content(&new_document.id, &new_document.title, &text)
            .await?;
        Ok(room.remote_group_pad_id)
    }

    /// Map a pad-service edit notification back to local ids.
    pub async fn resolve_pad_edit(
        &self,
        remote_author_id: &str,
        pad_id: &str,
    ) -> Result<PadEdit, BrokerError> {
        let user_id = self.authors.user_for_author(remote_author_id).await?;
        let document_id = self.rooms.document_for_pad(pad_id).await?;
        Ok(PadEdit {
            user_id,
            document_id,
        })
    }

    pub async fn session_holder(&self, remote_session_id: &str) -> Result<String, BrokerError> {
        self.sessions.session_holder(remote_session_id).await
    }
}
