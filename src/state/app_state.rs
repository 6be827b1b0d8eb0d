// Application state management
// Run state, agent registry, and the shared store handle read by the views and written by the client

use crate::state::activity::{ActivityEntry, ActivityLog, DEFAULT_ACTIVITY_LINES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tracing::debug;

/// Agents seeded into every fresh registry, in display order
pub const KNOWN_AGENTS: [&str; 4] = [
    "Orchestrator",
    "Query Understanding Agent",
    "Document Retrieval Specialist",
    "Decision Making Agent",
];

/// Agent status enumeration
/// Mirrors the four lowercase status strings the backend emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent has not started on the current run
    Pending,
    /// Agent is working on the current run
    Processing,
    /// Agent finished its part of the run
    Complete,
    /// Agent reported a failure
    Error,
}

impl AgentStatus {
    /// Wire representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Processing => "processing",
            AgentStatus::Complete => "complete",
            AgentStatus::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and latest result snippet of one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    pub status: AgentStatus,
    /// Opaque text from the backend, empty until produced
    pub result: String,
}

impl AgentState {
    pub fn new(status: AgentStatus, result: impl Into<String>) -> Self {
        Self {
            status,
            result: result.into(),
        }
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new(AgentStatus::Pending, "")
    }
}

/// Agent name -> state, in insertion order
///
/// Seeded agents come first; names first seen at runtime are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRegistry {
    entries: Vec<(String, AgentState)>,
}

impl AgentRegistry {
    /// Registry with every known agent pending and no result
    pub fn initial() -> Self {
        Self {
            entries: KNOWN_AGENTS
                .iter()
                .map(|name| (name.to_string(), AgentState::default()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AgentState> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, state)| state)
    }

    /// Replace the entry for `name`, or append it if the name is new
    pub fn upsert(&mut self, name: &str, state: AgentState) {
        match self
            .entries
            .iter_mut()
            .find(|(entry_name, _)| entry_name == name)
        {
            Some((_, existing)) => *existing = state,
            None => self.entries.push((name.to_string(), state)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentState)> {
        self.entries
            .iter()
            .map(|(name, state)| (name.as_str(), state))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::initial()
    }
}

/// State of the current (or last) run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    /// The query that was submitted
    pub query: String,
    /// Final answer from the backend, once received
    pub final_answer: Option<String>,
    /// Per-agent progress
    pub agents: AgentRegistry,
    /// Error for the run, once one occurred
    pub error: Option<String>,
    /// Whether a run is in flight
    pub is_running: bool,
}

impl RunState {
    pub fn start_process(&mut self, query: &str) {
        self.query = query.to_string();
        self.final_answer = None;
        self.agents = AgentRegistry::initial();
        self.error = None;
        self.is_running = true;
    }

    pub fn update_agent(&mut self, name: &str, status: AgentStatus, result: &str) {
        self.agents.upsert(name, AgentState::new(status, result));
    }

    pub fn set_final_answer(&mut self, answer: &str) {
        self.final_answer = Some(answer.to_string());
        self.is_running = false;
    }

    pub fn set_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
        self.is_running = false;
    }
}

/// Connection state of the realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ChannelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelStatus::Disconnected => "Disconnected",
            ChannelStatus::Connecting => "Connecting",
            ChannelStatus::Connected => "Connected",
        }
    }
}

type Listener = Arc<dyn Fn(&RunState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

struct StoreInner {
    run: RwLock<RunState>,
    channel: RwLock<ChannelStatus>,
    activity: Mutex<ActivityLog>,
    listeners: Mutex<Listeners>,
}

/// Shared handle to the run state
///
/// Cloning the handle shares the same state. Every mutation notifies the
/// registered listeners with a snapshot of the new run state, after the
/// state lock has been released.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_activity_capacity(DEFAULT_ACTIVITY_LINES)
    }

    /// Create a store whose activity log keeps at most `max_lines` lines
    pub fn with_activity_capacity(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                run: RwLock::new(RunState::default()),
                channel: RwLock::new(ChannelStatus::default()),
                activity: Mutex::new(ActivityLog::new(max_lines)),
                listeners: Mutex::new(Listeners::default()),
            }),
        }
    }

    /// Consistent copy of the run state
    pub fn snapshot(&self) -> RunState {
        self.inner
            .run
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .run
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running
    }

    pub fn channel_status(&self) -> ChannelStatus {
        *self
            .inner
            .channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the registry and mark a new run as started
    pub fn start_process(&self, query: &str) {
        debug!(query = %query, "Starting run");
        self.mutate(|run| run.start_process(query));
        self.record(format!("Submitted query: \"{}\"", query));
    }

    /// Replace or create the entry for one agent
    pub fn update_agent(&self, name: &str, status: AgentStatus, result: &str) {
        debug!(agent = %name, status = %status, "Agent update");
        self.mutate(|run| run.update_agent(name, status, result));
        self.record(format!("{} -> {}", name, status));
    }

    pub fn set_final_answer(&self, answer: &str) {
        debug!(answer_len = answer.len(), "Final answer received");
        self.mutate(|run| run.set_final_answer(answer));
        self.record("Final answer received".to_string());
    }

    pub fn set_error(&self, message: &str) {
        debug!(error = %message, "Run failed");
        self.mutate(|run| run.set_error(message));
        self.record(format!("Error: {}", message));
    }

    pub fn set_channel_status(&self, status: ChannelStatus) {
        self.set_channel_status_if(status, || true);
    }

    /// Set the channel status only if `still_current` holds
    ///
    /// `still_current` is evaluated while the channel lock is held, so a
    /// writer that loses the check can never overwrite a later status.
    /// Returns whether the status was written.
    pub fn set_channel_status_if<F>(&self, status: ChannelStatus, still_current: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        {
            let mut channel = self
                .inner
                .channel
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !still_current() {
                return false;
            }
            if *channel == status {
                return true;
            }
            *channel = status;
        }
        self.record(format!("Realtime channel {}", status.label().to_lowercase()));
        true
    }

    /// Append a line to the activity log
    pub fn record(&self, line: String) {
        self.activity().push(line);
        self.notify();
    }

    /// Copy of the activity log entries, oldest first
    pub fn activity_entries(&self) -> Vec<ActivityEntry> {
        self.activity().entries().cloned().collect()
    }

    pub fn clear_activity(&self) {
        self.activity().clear();
        self.notify();
    }

    /// Register a listener called after every change
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RunState) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().entries.len()
    }

    fn mutate(&self, apply: impl FnOnce(&mut RunState)) {
        {
            let mut run = self
                .inner
                .run
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            apply(&mut run);
        }
        self.notify();
    }

    fn notify(&self) {
        // Listeners run outside every lock so they may read the store again
        let listeners: Vec<Listener> = self
            .listeners()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn activity(&self) -> MutexGuard<'_, ActivityLog> {
        self.inner
            .activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("run", &self.snapshot())
            .field("channel", &self.channel_status())
            .finish()
    }
}

/// Registration handle returned by [`Store::subscribe`]
///
/// Dropping it removes the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}
