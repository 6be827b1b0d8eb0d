//! Backend client
//!
//! HTTP submission, the Socket.IO realtime channel, and the wire types they share.

pub mod http;
pub mod protocol;
pub mod realtime;

pub use http::GENERIC_FAILURE_MESSAGE;
pub use protocol::{AgentUpdate, QueryOutcome, ServerEvent};
pub use realtime::RealtimeClient;
