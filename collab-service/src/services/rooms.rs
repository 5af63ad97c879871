//! Local document to pad-service group/pad mapping.

use super::locks::KeyedLocks;
use super::remote::CollabRemote;
use super::store::RoomStore;
use super::BrokerError;
use crate::models::DocumentRoom;
use std::sync::Arc;
use uuid::Uuid;

/// Longest pad name derived from a document title.
const MAX_PAD_NAME_CHARS: usize = 50;

/// Characters the pad service reserves inside pad ids or URLs.
const RESERVED_PAD_CHARS: [char; 6] = ['$', '/', '?', '#', '&', '%'];

pub struct DocumentRoomCache {
    store: Arc<dyn RoomStore>,
    remote: Arc<dyn CollabRemote>,
    locks: KeyedLocks,
}

impl DocumentRoomCache {
    pub fn new(store: Arc<dyn RoomStore>, remote: Arc<dyn CollabRemote>) -> Self {
        Self {
            store,
            remote,
            locks: KeyedLocks::new(),
        }
    }

    /// `(group_id, group_pad_id)` for the document, creating both on first use.
    pub async fn get_or_create_room(
        &self,
        document_id: &str,
        title: &str,
    ) -> Result<(String, String), BrokerError> {
        let room = self.ensure_room(document_id, title, None).await?;
        Ok((room.remote_group_id, room.remote_group_pad_id))
    }

    /// Create the room and seed its pad with `html`. An existing room is
    /// returned untouched. The room is only stored once its pad is seeded.
    pub async fn create_room_with_content(
        &self,
        document_id: &str,
        title: &str,
        html: &str,
    ) -> Result<DocumentRoom, BrokerError> {
        self.ensure_room(document_id, title, Some(html)).await
    }

    /// Read-only id for the document's pad, fetched on first request.
    pub async fn get_or_create_read_only_token(
        &self,
        document_id: &str,
    ) -> Result<String, BrokerError> {
        let room = self.require_room(document_id).await?;
        if let Some(read_only_id) = room.remote_read_only_id {
            return Ok(read_only_id);
        }

        let read_only_id = self
            .remote
            .get_read_only_id(&room.remote_group_pad_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(
                    document_id,
                    pad_id = %room.remote_group_pad_id,
                    "Pad service does not know the room's pad"
                );
                BrokerError::Validation("remote service has no pad for this room".to_string())
            })?;

        let stored = self
            .store
            .set_read_only_id_if_absent(document_id, &read_only_id)
            .await?;

        stored
            .remote_read_only_id
            .ok_or_else(|| BrokerError::Storage(anyhow::anyhow!("read-only id was not stored")))
    }

    /// Plain text of the document's pad.
    pub async fn room_text(&self, document_id: &str) -> Result<String, BrokerError> {
        let room = self.require_room(document_id).await?;
        Ok(self.remote.get_text(&room.remote_group_pad_id).await?)
    }

    /// Document behind a group-pad id.
    pub async fn document_for_pad(&self, group_pad_id: &str) -> Result<String, BrokerError> {
        self.store
            .find_room_by_pad_id(group_pad_id)
            .await?
            .map(|room| room.document_id)
            .ok_or_else(|| BrokerError::NotFound(format!("pad {}", group_pad_id)))
    }

    async fn require_room(&self, document_id: &str) -> Result<DocumentRoom, BrokerError> {
        self.store
            .find_room(document_id)
            .await?
            .ok_or_else(|| BrokerError::NotFound(format!("room for document {}", document_id)))
    }

    /// Stored room for the document. A new pad gets `seed` before the room
    /// is persisted, so a failed seed leaves nothing behind to retry against.
    async fn ensure_room(
        &self,
        document_id: &str,
        title: &str,
        seed: Option<&str>,
    ) -> Result<DocumentRoom, BrokerError> {
        if let Some(room) = self.store.find_room(document_id).await? {
            return Ok(room);
        }

        let _guard = self.locks.lock(document_id).await;
        if let Some(room) = self.store.find_room(document_id).await? {
            return Ok(room);
        }

        let group_id = self.remote.create_group().await?;
        let pad_id = self
            .remote
            .create_group_pad(&group_id, &pad_name(title))
            .await?;

        if let Some(html) = seed {
            self.remote.set_html(&pad_id, html).await?;
            tracing::info!(document_id, pad_id = %pad_id, "Seeded pad content");
        }

        let candidate = DocumentRoom::new(document_id, &group_id, pad_id);
        let stored = self.store.insert_room_if_absent(candidate.clone()).await?;

        if stored == candidate {
            tracing::info!(
                document_id,
                group_id = %stored.remote_group_id,
                pad_id = %stored.remote_group_pad_id,
                "Created document room"
            );
        } else {
            tracing::warn!(
                document_id,
                orphaned_pad_id = %candidate.remote_group_pad_id,
                "Room created concurrently elsewhere, keeping stored room"
            );
        }

        Ok(stored)
    }
}

/// Pad name for a document title.
pub fn pad_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control() && !RESERVED_PAD_CHARS.contains(c))
        .collect();
    let name: String = cleaned.trim().chars().take(MAX_PAD_NAME_CHARS).collect();
    let name = name.trim_end().to_string();

    if name.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        name
    }
}
