//! In-process store for tests and single-node development.

use super::{AuthorStore, CollabStore, RoomStore, SessionStore};
use crate::models::{AuthorIdentity, DocumentRoom, SessionKey, UserSession};
use crate::services::BrokerError;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryStore {
    authors: DashMap<String, AuthorIdentity>,
    rooms: DashMap<String, DocumentRoom>,
    sessions: DashMap<String, UserSession>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author_count(&self) -> usize {
        self.authors.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl AuthorStore for MemoryStore {
    async fn find_author(&self, user_id: &str) -> Result<Option<AuthorIdentity>, BrokerError> {
        Ok(self.authors.get(user_id).map(|a| a.value().clone()))
    }

    async fn insert_author_if_absent(
        &self,
        author: AuthorIdentity,
    ) -> Result<AuthorIdentity, BrokerError> {
        let stored = self
            .authors
            .entry(author.user_id.clone())
            .or_insert(author);
        Ok(stored.value().clone())
    }

    async fn find_author_by_remote_id(
        &self,
        remote_author_id: &str,
    ) -> Result<Option<AuthorIdentity>, BrokerError> {
        Ok(self
            .authors
            .iter()
            .find(|a| a.remote_author_id == remote_author_id)
            .map(|a| a.value().clone()))
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn find_room(&self, document_id: &str) -> Result<Option<DocumentRoom>, BrokerError> {
        Ok(self.rooms.get(document_id).map(|r| r.value().clone()))
    }

    async fn insert_room_if_absent(&self, room: DocumentRoom) -> Result<DocumentRoom, BrokerError> {
        let stored = self.rooms.entry(room.document_id.clone()).or_insert(room);
        Ok(stored.value().clone())
    }

    async fn set_read_only_id_if_absent(
        &self,
        document_id: &str,
        remote_read_only_id: &str,
    ) -> Result<DocumentRoom, BrokerError> {
        let mut room = self
            .rooms
            .get_mut(document_id)
            .ok_or_else(|| BrokerError::NotFound(format!("room for document {}", document_id)))?;
        if room.remote_read_only_id.is_none() {
            room.remote_read_only_id = Some(remote_read_only_id.to_string());
        }
        Ok(room.value().clone())
    }

    async fn find_room_by_pad_id(
        &self,
        remote_group_pad_id: &str,
    ) -> Result<Option<DocumentRoom>, BrokerError> {
        Ok(self
            .rooms
            .iter()
            .find(|r| r.remote_group_pad_id == remote_group_pad_id)
            .map(|r| r.value().clone()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session(&self, key: &SessionKey) -> Result<Option<UserSession>, BrokerError> {
        Ok(self
            .sessions
            .get(&key.storage_key())
            .map(|s| s.value().clone()))
    }

    async fn upsert_session(&self, session: UserSession) -> Result<(), BrokerError> {
        self.sessions.insert(session.key.clone(), session);
        Ok(())
    }

    async fn find_session_by_remote_id(
        &self,
        remote_session_id: &str,
    ) -> Result<Option<UserSession>, BrokerError> {
        Ok(self
            .sessions
            .iter()
            .find(|s| s.remote_session_id == remote_session_id)
            .map(|s| s.value().clone()))
    }
}

#[async_trait]
impl CollabStore for MemoryStore {
    async fn health_check(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
