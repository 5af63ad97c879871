//! MongoDB-backed store.
//!
//! Records are keyed by their natural id in `_id`, so "insert if absent" is a
//! single upsert with `$setOnInsert` and never a read followed by a write.

use super::{AuthorStore, CollabStore, RoomStore, SessionStore};
use crate::models::{AuthorIdentity, DocumentRoom, SessionKey, UserSession};
use crate::services::BrokerError;
use async_trait::async_trait;
use mongodb::{
    bson::{doc, to_document, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, IndexOptions, ReplaceOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct CollabDb {
    client: MongoClient,
    db: Database,
}

impl CollabDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for collab-service");

        create_index(&self.authors(), "remote_author_id", "remote_author_id_idx", true).await?;
        create_index(&self.rooms(), "remote_group_pad_id", "remote_group_pad_id_idx", true)
            .await?;
        create_index(&self.sessions(), "remote_session_id", "remote_session_id_idx", false)
            .await?;
        create_index(&self.sessions(), "user_id", "user_id_idx", false).await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn authors(&self) -> Collection<AuthorIdentity> {
        self.db.collection("author_identities")
    }

    pub fn rooms(&self) -> Collection<DocumentRoom> {
        self.db.collection("document_rooms")
    }

    pub fn sessions(&self) -> Collection<UserSession> {
        self.db.collection("user_sessions")
    }
}

async fn create_index<T>(
    collection: &Collection<T>,
    field: &str,
    name: &str,
    unique: bool,
) -> Result<(), AppError>
where
    T: Send + Sync,
{
    let mut keys = Document::new();
    keys.insert(field, 1);

    let index = IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(unique)
                .build(),
        )
        .build();

    collection.create_index(index, None).await.map_err(|e| {
        tracing::error!("Failed to create {} index: {}", name, e);
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    })?;
    Ok(())
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Upsert `record` under `id` without touching an existing document, and
/// return whatever is stored afterwards.
async fn insert_if_absent<T>(
    collection: &Collection<T>,
    id: &str,
    record: &T,
) -> Result<T, BrokerError>
where
    T: serde::Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    let mut fields: Document = to_document(record)?;
    fields.remove("_id");

    let options = FindOneAndUpdateOptions::builder()
        .upsert(true)
        .return_document(ReturnDocument::After)
        .build();

    let stored = match collection
        .find_one_and_update(doc! { "_id": id }, doc! { "$setOnInsert": fields }, options)
        .await
    {
        Ok(stored) => stored,
        // Two concurrent upserts on the same _id: the loser reads the winner.
        Err(e) if is_duplicate_key(&e) => {
            tracing::debug!(id, "Lost insert race, reading existing record");
            None
        }
        Err(e) => return Err(e.into()),
    };

    match stored {
        Some(record) => Ok(record),
        None => collection
            .find_one(doc! { "_id": id }, None)
            .await?
            .ok_or_else(|| {
                BrokerError::Storage(anyhow::anyhow!("record {} vanished after upsert", id))
            }),
    }
}

#[async_trait]
impl AuthorStore for CollabDb {
    async fn find_author(&self, user_id: &str) -> Result<Option<AuthorIdentity>, BrokerError> {
        Ok(self.authors().find_one(doc! { "_id": user_id }, None).await?)
    }

    async fn insert_author_if_absent(
        &self,
        author: AuthorIdentity,
    ) -> Result<AuthorIdentity, BrokerError> {
        insert_if_absent(&self.authors(), &author.user_id, &author).await
    }

    async fn find_author_by_remote_id(
        &self,
        remote_author_id: &str,
    ) -> Result<Option<AuthorIdentity>, BrokerError> {
        Ok(self
            .authors()
            .find_one(doc! { "remote_author_id": remote_author_id }, None)
            .await?)
    }
}

#[async_trait]
impl RoomStore for CollabDb {
    async fn find_room(&self, document_id: &str) -> Result<Option<DocumentRoom>, BrokerError> {
        Ok(self.rooms().find_one(doc! { "_id": document_id }, None).await?)
    }

    async fn insert_room_if_absent(&self, room: DocumentRoom) -> Result<DocumentRoom, BrokerError> {
        insert_if_absent(&self.rooms(), &room.document_id, &room).await
    }

    async fn set_read_only_id_if_absent(
        &self,
        document_id: &str,
        remote_read_only_id: &str,
    ) -> Result<DocumentRoom, BrokerError> {
        // `null` also matches a missing field.
        self.rooms()
            .update_one(
                doc! { "_id": document_id, "remote_read_only_id": null },
                doc! { "$set": { "remote_read_only_id": remote_read_only_id } },
                None,
            )
            .await?;

        self.find_room(document_id)
            .await?
            .ok_or_else(|| BrokerError::NotFound(format!("room for document {}", document_id)))
    }

    async fn find_room_by_pad_id(
        &self,
        remote_group_pad_id: &str,
    ) -> Result<Option<DocumentRoom>, BrokerError> {
        Ok(self
            .rooms()
            .find_one(doc! { "remote_group_pad_id": remote_group_pad_id }, None)
            .await?)
    }
}

#[async_trait]
impl SessionStore for CollabDb {
    async fn find_session(&self, key: &SessionKey) -> Result<Option<UserSession>, BrokerError> {
        Ok(self
            .sessions()
            .find_one(doc! { "_id": key.storage_key() }, None)
            .await?)
    }

    async fn upsert_session(&self, session: UserSession) -> Result<(), BrokerError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.sessions()
            .replace_one(doc! { "_id": session.key.as_str() }, &session, options)
            .await?;
        Ok(())
    }

    async fn find_session_by_remote_id(
        &self,
        remote_session_id: &str,
    ) -> Result<Option<UserSession>, BrokerError> {
        Ok(self
            .sessions()
            .find_one(doc! { "remote_session_id": remote_session_id }, None)
            .await?)
    }
}

#[async_trait]
impl CollabStore for CollabDb {
    async fn health_check(&self) -> Result<(), BrokerError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                BrokerError::from(e)
            })?;
        Ok(())
    }
}
