//! Realtime client
//!
//! Owns the Socket.IO channel to the backend and the query submission call.
//! Inbound `agent_update` events are applied to the [`Store`] in the order
//! they arrive. The channel and the submission are independent: a failed
//! submission leaves the channel open, and a dropped channel does not cancel
//! an in-flight submission. Neither path retries.

use crate::client::http::{self, GENERIC_FAILURE_MESSAGE};
use crate::client::protocol::{
    EnginePacket, QueryOutcome, ServerEvent, SocketPacket, DEFAULT_NAMESPACE,
};
use crate::config::Config;
use crate::error::{ClientError, ProtocolError};
use crate::state::{ChannelStatus, Store};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

/// Handle to the running channel task
struct ChannelHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Client for the multi-agent backend
pub struct RealtimeClient {
    config: Config,
    store: Store,
    http: reqwest::Client,
    runtime: Handle,
    channel: Option<ChannelHandle>,
    /// Generation of the live channel; stale tasks must not publish status
    generation: Arc<AtomicU64>,
}

impl RealtimeClient {
    /// Create a client that spawns its tasks on `runtime`
    pub fn new(config: Config, store: Store, runtime: Handle) -> Result<Self, ClientError> {
        let http = http::build_client(&config.http)?;
        Ok(Self {
            config,
            store,
            http,
            runtime,
            channel: None,
            generation: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Whether `connect` has been called and not undone by `disconnect`
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Open the realtime channel, tearing down any existing one first
    ///
    /// Returns once the channel task is spawned; the store's channel status
    /// reports when the server accepts the connection.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let url = self.config.channel_url()?;
        self.disconnect();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let session = ChannelSession {
            store: self.store.clone(),
            generation,
            current: Arc::clone(&self.generation),
        };

        session.publish(ChannelStatus::Connecting);
        info!(url = %url, generation, "Opening realtime channel");

        let task = self.runtime.spawn(run_channel(url, session, shutdown_rx));
        self.channel = Some(ChannelHandle {
            shutdown: Some(shutdown_tx),
            task,
        });
        Ok(())
    }

    /// Close the realtime channel if one is open
    pub fn disconnect(&mut self) {
        self.close_channel();
    }

    /// Close the realtime channel and block until its task has sent the close
    /// frame, giving up after `limit`
    ///
    /// Must not be called from inside the runtime. Returns whether the task
    /// finished in time.
    pub fn disconnect_and_wait(&mut self, limit: Duration) -> bool {
        let Some(task) = self.close_channel() else {
            return true;
        };
        let finished = self
            .runtime
            .block_on(tokio::time::timeout(limit, task))
            .is_ok();
        if !finished {
            warn!(limit_ms = limit.as_millis() as u64, "Realtime channel did not close in time");
        }
        finished
    }

    fn close_channel(&mut self) -> Option<JoinHandle<()>> {
        let mut handle = self.channel.take()?;
        info!("Closing realtime channel");
        // Anything the old task publishes from here on is stale
        self.generation.fetch_add(1, Ordering::SeqCst);
        match handle.shutdown.take() {
            Some(shutdown) if !handle.task.is_finished() => {
                if shutdown.send(()).is_err() {
                    handle.task.abort();
                }
            }
            _ => {}
        }
        self.store.set_channel_status(ChannelStatus::Disconnected);
        Some(handle.task)
    }

    /// Start a run for `query`
    ///
    /// Resets the visible run state, then submits the query on the runtime.
    /// The returned task resolves once the store holds the terminal state.
    ///
    /// # Errors
    /// * `ClientError::NotConnected` if `connect` was never called
    /// * `ClientError::RunInProgress` if the previous run has not finished
    ///
    /// In both cases the store is left untouched.
    pub fn process_query(&self, query: &str) -> Result<JoinHandle<()>, ClientError> {
        if self.channel.is_none() {
            return Err(ClientError::NotConnected);
        }
        if self.store.is_running() {
            return Err(ClientError::RunInProgress);
        }
        let url = self.config.query_url()?;

        info!(query = %query, "Sending query to backend");
        self.store.start_process(query);

        let client = self.http.clone();
        let store = self.store.clone();
        let query = query.to_string();
        Ok(self.runtime.spawn(async move {
            match http::submit_query(&client, &url, &query).await {
                Ok(QueryOutcome::Answer(answer)) => store.set_final_answer(&answer),
                Ok(QueryOutcome::Rejected(message)) => {
                    warn!(error = %message, "Backend rejected query");
                    store.set_error(&message);
                }
                Err(e) => {
                    warn!(error = %e, "Query submission failed");
                    store.set_error(GENERIC_FAILURE_MESSAGE);
                }
            }
        }))
    }

    /// Probe the backend health endpoint once and log the result
    pub fn probe_health(&self) -> Result<JoinHandle<()>, ClientError> {
        let url = self.config.health_url()?;
        let client = self.http.clone();
        Ok(self.runtime.spawn(async move {
            match http::check_health(&client, &url).await {
                Ok(health) if health.is_ok() => info!(url = %url, "Backend is healthy"),
                Ok(health) => warn!(url = %url, status = %health.status, "Backend reports degraded health"),
                Err(e) => warn!(url = %url, error = %e, "Backend health check failed"),
            }
        }))
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// What the reader loop should do after a frame
#[derive(Debug, PartialEq)]
enum FrameAction {
    Continue,
    /// Handshake accepted: send `reply` and expect traffic within `keepalive`
    Open { reply: String, keepalive: Duration },
    Reply(String),
    Close,
}

/// State shared between the reader loop and the store
struct ChannelSession {
    store: Store,
    generation: u64,
    current: Arc<AtomicU64>,
}

impl ChannelSession {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn publish(&self, status: ChannelStatus) {
        self.store
            .set_channel_status_if(status, || self.is_current());
    }

    fn handle_frame(&self, frame: &str) -> Result<FrameAction, ProtocolError> {
        match EnginePacket::decode(frame)? {
            EnginePacket::Open(handshake) => {
                debug!(
                    sid = %handshake.sid,
                    ping_interval_ms = handshake.ping_interval,
                    ping_timeout_ms = handshake.ping_timeout,
                    "Engine.IO handshake"
                );
                Ok(FrameAction::Open {
                    reply: SocketPacket::connect(DEFAULT_NAMESPACE).into_frame(),
                    keepalive: Duration::from_millis(
                        handshake.ping_interval.saturating_add(handshake.ping_timeout),
                    ),
                })
            }
            EnginePacket::Ping(data) => Ok(FrameAction::Reply(EnginePacket::Pong(data).encode())),
            EnginePacket::Close => Ok(FrameAction::Close),
            EnginePacket::Message(payload) => self.handle_packet(SocketPacket::decode(&payload)?),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {
                Ok(FrameAction::Continue)
            }
        }
    }

    fn handle_packet(&self, packet: SocketPacket) -> Result<FrameAction, ProtocolError> {
        match packet {
            SocketPacket::Connect { .. } => {
                info!("Connected to backend realtime channel");
                self.publish(ChannelStatus::Connected);
                Ok(FrameAction::Continue)
            }
            SocketPacket::ConnectError { data, .. } => {
                warn!(details = ?data, "Backend refused realtime channel");
                Ok(FrameAction::Close)
            }
            SocketPacket::Disconnect { .. } => Ok(FrameAction::Close),
            SocketPacket::Event { data, .. } => {
                match ServerEvent::from_event_data(data)? {
                    ServerEvent::AgentUpdate(update) => {
                        debug!(agent = %update.agent, status = %update.status, "Agent update received");
                        self.store
                            .update_agent(&update.agent, update.status, &update.result);
                    }
                    ServerEvent::Other(name) => debug!(event = %name, "Ignoring unhandled event"),
                }
                Ok(FrameAction::Continue)
            }
            SocketPacket::Ack { .. } => Ok(FrameAction::Continue),
        }
    }
}

async fn run_channel(url: Url, session: ChannelSession, mut shutdown: oneshot::Receiver<()>) {
    let connected = tokio::select! {
        biased;
        _ = &mut shutdown => None,
        result = connect_async(url.as_str()) => Some(result),
    };
    let mut socket = match connected {
        Some(Ok((socket, _))) => socket,
        Some(Err(e)) => {
            warn!(url = %url, error = %e, "Realtime channel connection failed");
            session.publish(ChannelStatus::Disconnected);
            return;
        }
        None => return,
    };

    // The server pings every interval; silence past interval + timeout means
    // the connection is gone even if the socket never reports it
    let mut keepalive: Option<Duration> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                let _ = socket.send(Message::Text(EnginePacket::Close.encode())).await;
                let _ = socket.close(None).await;
                break;
            }
            _ = wait_until(deadline) => {
                warn!("Realtime channel keepalive timed out");
                break;
            }
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => match session.handle_frame(&text) {
                    Ok(FrameAction::Continue) => {}
                    Ok(FrameAction::Open { reply, keepalive: limit }) => {
                        keepalive = Some(limit);
                        if let Err(e) = socket.send(Message::Text(reply)).await {
                            warn!(error = %e, "Failed to write to realtime channel");
                            break;
                        }
                    }
                    Ok(FrameAction::Reply(reply)) => {
                        if let Err(e) = socket.send(Message::Text(reply)).await {
                            warn!(error = %e, "Failed to write to realtime channel");
                            break;
                        }
                    }
                    Ok(FrameAction::Close) => {
                        info!("Backend closed realtime channel");
                        let _ = socket.close(None).await;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, frame = %text, "Rejected realtime frame");
                        if session.is_current() {
                            session.store.record(format!("Rejected realtime message: {}", e));
                        }
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Realtime channel closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Realtime channel error");
                    break;
                }
            }
        }
        deadline = keepalive.map(|limit| Instant::now() + limit);
    }

    session.publish(ChannelStatus::Disconnected);
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AgentState, AgentStatus};

    fn session() -> ChannelSession {
        ChannelSession {
            store: Store::new(),
            generation: 1,
            current: Arc::new(AtomicU64::new(1)),
        }
    }

    #[test]
    fn test_handshake_is_answered_with_namespace_connect() {
        let session = session();
        let action = session
            .handle_frame(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
            .unwrap();
        assert_eq!(
            action,
            FrameAction::Open {
                reply: "40".to_string(),
                keepalive: Duration::from_millis(45_000),
            }
        );
        assert_eq!(session.store.channel_status(), ChannelStatus::Disconnected);

        assert_eq!(
            session.handle_frame(r#"40{"sid":"xyz"}"#).unwrap(),
            FrameAction::Continue
        );
        assert_eq!(session.store.channel_status(), ChannelStatus::Connected);
    }

    #[test]
    fn test_ping_is_answered_with_pong() {
        let session = session();
        assert_eq!(
            session.handle_frame("2").unwrap(),
            FrameAction::Reply("3".to_string())
        );
    }

    #[test]
    fn test_agent_updates_apply_in_order() {
        let session = session();
        session.store.start_process("q");
        for frame in [
            r#"42["agent_update",{"agent":"Orchestrator","status":"processing","result":""}]"#,
            r#"42["agent_update",{"agent":"Orchestrator","status":"complete","result":"Parsed query"}]"#,
            r#"42["agent_update",{"agent":"Document Retrieval Specialist","status":"processing","result":""}]"#,
        ] {
            assert_eq!(session.handle_frame(frame).unwrap(), FrameAction::Continue);
        }

        let run = session.store.snapshot();
        assert_eq!(
            run.agents.get("Orchestrator"),
            Some(&AgentState::new(AgentStatus::Complete, "Parsed query"))
        );
        assert_eq!(
            run.agents.get("Document Retrieval Specialist"),
            Some(&AgentState::new(AgentStatus::Processing, ""))
        );
        assert_eq!(
            run.agents.get("Decision Making Agent"),
            Some(&AgentState::default())
        );
    }

    #[test]
    fn test_malformed_update_leaves_registry_unchanged() {
        let session = session();
        session.store.start_process("q");
        let before = session.store.snapshot();

        let result = session.handle_frame(
            r#"42["agent_update",{"agent":"Orchestrator","status":"running","result":""}]"#,
        );

        assert!(result.is_err());
        assert_eq!(session.store.snapshot(), before);
    }

    #[test]
    fn test_server_disconnect_closes() {
        let session = session();
        assert_eq!(session.handle_frame("41").unwrap(), FrameAction::Close);
        assert_eq!(session.handle_frame("1").unwrap(), FrameAction::Close);
        assert_eq!(
            session.handle_frame(r#"44{"message":"Not authorized"}"#).unwrap(),
            FrameAction::Close
        );
    }

    #[test]
    fn test_stale_session_does_not_publish_status() {
        let session = session();
        session.current.store(2, Ordering::SeqCst);
        session.handle_frame(r#"40{"sid":"xyz"}"#).unwrap();
        assert_eq!(session.store.channel_status(), ChannelStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_process_query_requires_channel() {
        let store = Store::new();
        let config = Config::for_server("http://127.0.0.1:9").unwrap();
        let client = RealtimeClient::new(config, store.clone(), Handle::current()).unwrap();

        let result = client.process_query("knee surgery claim");

        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert!(!store.is_running());
        assert!(store.snapshot().query.is_empty());
    }
}
