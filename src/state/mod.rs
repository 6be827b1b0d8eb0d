// State management module
// Handles the run state, agent registry, store subscriptions, and the activity log

pub mod activity;
pub mod app_state;

pub use activity::{ActivityEntry, ActivityLog};
pub use app_state::{
    AgentRegistry, AgentState, AgentStatus, ChannelStatus, RunState, Store, Subscription,
    KNOWN_AGENTS,
};
