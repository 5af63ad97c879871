//! Persistence for the three broker caches.
//!
//! Author identities and rooms are write-once: the insert methods return the
//! record that actually ended up stored, which may be another writer's.
//! Sessions are last-writer-wins.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::CollabDb;

use super::BrokerError;
use crate::models::{AuthorIdentity, DocumentRoom, SessionKey, UserSession};
use async_trait::async_trait;

#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn find_author(&self, user_id: &str) -> Result<Option<AuthorIdentity>, BrokerError>;

    /// Store `author` unless the user already has one; returns the stored record.
    async fn insert_author_if_absent(
        &self,
        author: AuthorIdentity,
    ) -> Result<AuthorIdentity, BrokerError>;

    async fn find_author_by_remote_id(
        &self,
        remote_author_id: &str,
    ) -> Result<Option<AuthorIdentity>, BrokerError>;
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn find_room(&self, document_id: &str) -> Result<Option<DocumentRoom>, BrokerError>;

    /// Store `room` unless the document already has one; returns the stored record.
    async fn insert_room_if_absent(&self, room: DocumentRoom) -> Result<DocumentRoom, BrokerError>;

    /// Set the read-only id only if it is still unset; returns the stored room.
    async fn set_read_only_id_if_absent(
        &self,
        document_id: &str,
        remote_read_only_id: &str,
    ) -> Result<DocumentRoom, BrokerError>;

    async fn find_room_by_pad_id(
        &self,
        remote_group_pad_id: &str,
    ) -> Result<Option<DocumentRoom>, BrokerError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session(&self, key: &SessionKey) -> Result<Option<UserSession>, BrokerError>;

    async fn upsert_session(&self, session: UserSession) -> Result<(), BrokerError>;

    async fn find_session_by_remote_id(
        &self,
        remote_session_id: &str,
    ) -> Result<Option<UserSession>, BrokerError>;
}

/// All three stores plus a liveness check, as one backend.
#[async_trait]
pub trait CollabStore: AuthorStore + RoomStore + SessionStore {
    async fn health_check(&self) -> Result<(), BrokerError>;
}
