//! IntelliClaim dashboard
//!
//! Desktop client for the multi-agent insurance query backend: submit a
//! query, watch each agent's progress over the realtime channel, and read
//! the final answer. This library exposes the modules for testing; the GUI
//! binary is in `src/main.rs`.

pub mod client;
pub mod config;
pub mod error;
/// Run state, agent registry, and store subscriptions
pub mod state;
pub mod ui;
