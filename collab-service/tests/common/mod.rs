#![allow(dead_code)]

use collab_service::config::{CookieConfig, SessionPolicy};
use collab_service::models::{Document, PadEdit, Permission, SessionKey, User};
use collab_service::services::remote::mock::MockRemote;
use collab_service::services::store::SessionStore;
use collab_service::services::{
    ActivitySink, BrokerError, CollabBroker, DocumentCatalog, FixedClock, MemoryStore,
    PermissionGate, RenewalCheck, UserDirectory,
};
use collab_service::startup::AppState;
use secrecy::Secret;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const NOW: i64 = 1_700_000_000;
pub const PAD_HOST: &str = "https://pad.example.org";
pub const PAD_API_KEY: &str = "pad-api-key";

/// In-memory stand-in for the content service.
#[derive(Default)]
pub struct FakeContent {
    documents: Mutex<HashMap<String, Document>>,
    users: Mutex<HashMap<String, User>>,
    grants: Mutex<HashSet<(String, String, Permission)>>,
    unavailable: Mutex<bool>,
    edits: Mutex<Vec<PadEdit>>,
}

impl FakeContent {
    pub fn add_document(&self, id: &str, title: &str) -> Document {
        let document = Document {
            id: id.to_string(),
            title: title.to_string(),
        };
        self.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), document.clone());
        document
    }

    pub fn add_user(&self, id: &str, full_name: &str) -> User {
        let user = User {
            id: id.to_string(),
            full_name: full_name.to_string(),
        };
        self.users.lock().unwrap().insert(id.to_string(), user.clone());
        user
    }

    pub fn grant(&self, document_id: &str, user_id: &str, permission: Permission) {
        self.grants.lock().unwrap().insert((
            document_id.to_string(),
            user_id.to_string(),
            permission,
        ));
    }

    /// Make every permission check fail as if the content service were down.
    pub fn go_down(&self) {
        *self.unavailable.lock().unwrap() = true;
    }

    pub fn edits(&self) -> Vec<PadEdit> {
        self.edits.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PermissionGate for FakeContent {
    async fn check_permission(
        &self,
        document: &Document,
        user: &User,
        permission: Permission,
    ) -> Result<(), BrokerError> {
        if *self.unavailable.lock().unwrap() {
            return Err(BrokerError::RemoteService {
                operation: "content-service",
                message: "HTTP 503".to_string(),
            });
        }
        let granted = self.grants.lock().unwrap().contains(&(
            document.id.clone(),
            user.id.clone(),
            permission,
        ));
        if granted {
            Ok(())
        } else {
            Err(BrokerError::PermissionDenied(format!(
                "{} on {}",
                permission.as_str(),
                document.id
            )))
        }
    }
}

#[async_trait::async_trait]
impl DocumentCatalog for FakeContent {
    async fn find_document(&self, document_id: &str) -> Result<Option<Document>, BrokerError> {
        Ok(self.documents.lock().unwrap().get(document_id).cloned())
    }
}

#[async_trait::async_trait]
impl UserDirectory for FakeContent {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, BrokerError> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }
}

#[async_trait::async_trait]
impl ActivitySink for FakeContent {
    async fn record_edit(&self, edit: &PadEdit) -> Result<(), BrokerError> {
        self.edits.lock().unwrap().push(edit.clone());
        Ok(())
    }
}

pub struct TestBroker {
    pub broker: Arc<CollabBroker>,
    pub remote: Arc<MockRemote>,
    pub store: Arc<MemoryStore>,
    pub content: Arc<FakeContent>,
    pub clock: Arc<FixedClock>,
}

impl TestBroker {
    pub fn spawn() -> Self {
        Self::with_policy(SessionPolicy::default(), MockRemote::new)
    }

    pub fn with_policy(
        policy: SessionPolicy,
        remote: impl FnOnce(RenewalCheck) -> MockRemote,
    ) -> Self {
        let remote = Arc::new(remote(RenewalCheck::from(&policy)));
        let store = Arc::new(MemoryStore::new());
        let content = Arc::new(FakeContent::default());
        let clock = Arc::new(FixedClock::new(NOW));

        let broker = CollabBroker::new(
            store.clone(),
            remote.clone(),
            content.clone(),
            policy,
            PAD_HOST,
        )
        .with_clock(clock.clone());

        Self {
            broker: Arc::new(broker),
            remote,
            store,
            content,
            clock,
        }
    }

    /// Router state backed by this harness.
    pub fn state(&self) -> AppState {
        AppState {
            broker: self.broker.clone(),
            store: self.store.clone(),
            documents: self.content.clone(),
            users: self.content.clone(),
            gate: self.content.clone(),
            activity: self.content.clone(),
            cookie: CookieConfig {
                name: "sessionID".to_string(),
                domain: None,
            },
            pad_api_key: Secret::new(PAD_API_KEY.to_string()),
        }
    }

    /// Session currently cached for a user under the per-user scope.
    pub async fn session_id(&self, user_id: &str) -> String {
        self.store
            .find_session(&SessionKey::for_user(user_id))
            .await
            .unwrap()
            .expect("session cached")
            .remote_session_id
    }
}
