//! In-process pad service for tests and local runs.
//!
//! Mints ids the way the real service shapes them (`a.`, `g.`, `s.`, `r.`
//! prefixes; `group$pad` composites) and counts every call per operation.

use super::{
    CollabRemote, RemoteError, RenewalCheck, SessionInfo, CREATE_AUTHOR, CREATE_GROUP,
    CREATE_GROUP_PAD, CREATE_SESSION, GET_READ_ONLY_ID, GET_SESSION_INFO, GET_TEXT, SET_HTML,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    next_id: u64,
    calls: HashMap<&'static str, usize>,
    groups: HashSet<String>,
    pads: HashMap<String, MockPad>,
    sessions: HashMap<String, SessionInfo>,
    failing: HashSet<&'static str>,
}

#[derive(Default, Clone)]
struct MockPad {
    read_only_id: Option<String>,
    text: String,
}

impl MockState {
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}.{:04}", prefix, self.next_id)
    }
}

pub struct MockRemote {
    state: Mutex<MockState>,
    renewal: RenewalCheck,
    latency: Option<Duration>,
}

impl MockRemote {
    pub fn new(renewal: RenewalCheck) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            renewal,
            latency: None,
        }
    }

    /// Delay every call, to widen race windows in concurrency tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made to `operation` so far.
    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    /// Make every later call to `operation` fail with a service error.
    pub fn fail_on(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    /// Undo [`MockRemote::fail_on`] for `operation`.
    pub fn recover(&self, operation: &str) {
        self.lock().failing.remove(operation);
    }

    /// Register a session as if it had been created remotely.
    pub fn insert_session(&self, session_id: &str, info: SessionInfo) {
        self.lock().sessions.insert(session_id.to_string(), info);
    }

    /// Expire or drop a session on the remote side.
    pub fn remove_session(&self, session_id: &str) {
        self.lock().sessions.remove(session_id);
    }

    pub fn session(&self, session_id: &str) -> Option<SessionInfo> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Forget a pad, so read-only lookups answer "padID does not exist".
    pub fn forget_pad(&self, pad_id: &str) {
        self.lock().pads.remove(pad_id);
    }

    /// Current text of a pad.
    pub fn pad_text(&self, pad_id: &str) -> Option<String> {
        self.lock().pads.get(pad_id).map(|p| p.text.clone())
    }

    /// Seed a pad with text, creating it if needed.
    pub fn set_pad_text(&self, pad_id: &str, text: &str) {
        self.lock()
            .pads
            .entry(pad_id.to_string())
            .or_default()
            .text = text.to_string();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call, honour configured latency and failures, then run `f`.
    async fn record<T: Send>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut MockState) -> Result<T, RemoteError> + Send,
    ) -> Result<T, RemoteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.failing.contains(operation) {
            return Err(RemoteError::new(operation, "code 2: internal error"));
        }
        f(&mut *state)
    }
}

#[async_trait]
impl CollabRemote for MockRemote {
    fn renewal(&self) -> RenewalCheck {
        self.renewal
    }

    async fn create_author(&self, _display_name: &str) -> Result<String, RemoteError> {
        self.record(CREATE_AUTHOR, |state| Ok(state.mint("a"))).await
    }

    async fn create_group(&self) -> Result<String, RemoteError> {
        self.record(CREATE_GROUP, |state| {
            let group_id = state.mint("g");
            state.groups.insert(group_id.clone());
            Ok(group_id)
        })
        .await
    }

    async fn create_group_pad(
        &self,
        group_id: &str,
        pad_name: &str,
    ) -> Result<String, RemoteError> {
        self.record(CREATE_GROUP_PAD, |state| {
            if !state.groups.contains(group_id) {
                return Err(RemoteError::new(CREATE_GROUP_PAD, "groupID does not exist"));
            }
            let pad_id = format!("{}${}", group_id, pad_name);
            if state.pads.contains_key(&pad_id) {
                return Err(RemoteError::new(CREATE_GROUP_PAD, "padName does already exist"));
            }
            state.pads.insert(pad_id.clone(), MockPad::default());
            Ok(pad_id)
        })
        .await
    }

    async fn create_session(
        &self,
        group_id: &str,
        author_id: &str,
        valid_until: i64,
    ) -> Result<String, RemoteError> {
        self.record(CREATE_SESSION, |state| {
            let session_id = state.mint("s");
            state.sessions.insert(
                session_id.clone(),
                SessionInfo {
                    author_id: author_id.to_string(),
                    group_id: group_id.to_string(),
                    valid_until,
                },
            );
            Ok(session_id)
        })
        .await
    }

    async fn session_info(&self, session_id: &str) -> Result<Option<SessionInfo>, RemoteError> {
        self.record(GET_SESSION_INFO, |state| {
            Ok(state.sessions.get(session_id).cloned())
        })
        .await
    }

    async fn get_read_only_id(&self, group_pad_id: &str) -> Result<Option<String>, RemoteError> {
        self.record(GET_READ_ONLY_ID, |state| {
            if !state.pads.contains_key(group_pad_id) {
                return Ok(None);
            }
            let existing = state
                .pads
                .get(group_pad_id)
                .and_then(|p| p.read_only_id.clone());
            if existing.is_some() {
                return Ok(existing);
            }
            let read_only_id = state.mint("r");
            if let Some(pad) = state.pads.get_mut(group_pad_id) {
                pad.read_only_id = Some(read_only_id.clone());
            }
            Ok(Some(read_only_id))
        })
        .await
    }

    async fn set_html(&self, pad_id: &str, html: &str) -> Result<(), RemoteError> {
        self.record(SET_HTML, |state| match state.pads.get_mut(pad_id) {
            Some(pad) => {
                pad.text = html.to_string();
                Ok(())
            }
            None => Err(RemoteError::new(SET_HTML, "padID does not exist")),
        })
        .await
    }

    async fn get_text(&self, pad_id: &str) -> Result<String, RemoteError> {
        self.record(GET_TEXT, |state| {
            state
                .pads
                .get(pad_id)
                .map(|p| p.text.clone())
                .ok_or_else(|| RemoteError::new(GET_TEXT, "padID does not exist"))
        })
        .await
    }
}
