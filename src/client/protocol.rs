//! Wire messages exchanged with the backend
//!
//! Two message families cross the boundary:
//! - the one-shot submission call (`QueryRequest` / `QueryResponse`)
//! - the realtime channel, which speaks Socket.IO over Engine.IO text frames
//!   and carries `agent_update` events
//!
//! Every inbound message is parsed into a typed value here; anything that
//! does not match is reported as a [`ProtocolError`].

use crate::error::ProtocolError;
use crate::state::AgentStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of per-agent progress updates
pub const AGENT_UPDATE_EVENT: &str = "agent_update";

/// Namespace the backend emits on
pub const DEFAULT_NAMESPACE: &str = "/";

/// Body of the query submission call
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
}

/// Raw body of the query submission response
///
/// The backend answers either `{"error": ...}` or `{"final_answer": ...}`;
/// on orchestration failure it sends both.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub final_answer: Option<String>,
}

/// Terminal result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The backend produced a final answer
    Answer(String),
    /// The backend reported a logical error
    Rejected(String),
}

impl QueryResponse {
    /// Resolve the response into a terminal outcome
    ///
    /// A non-empty `error` takes precedence over `final_answer`. Returns
    /// `None` when neither field is usable.
    pub fn into_outcome(self) -> Option<QueryOutcome> {
        match (self.error, self.final_answer) {
            (Some(error), _) if !error.is_empty() => Some(QueryOutcome::Rejected(error)),
            (_, Some(answer)) => Some(QueryOutcome::Answer(answer)),
            _ => None,
        }
    }
}

/// Body of the health endpoint
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Payload of an `agent_update` event
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AgentUpdate {
    pub agent: String,
    pub status: AgentStatus,
    pub result: String,
}

/// Event pushed by the backend over the realtime channel
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    AgentUpdate(AgentUpdate),
    /// Any event this client has no handler for
    Other(String),
}

impl ServerEvent {
    /// Decode the JSON array of a Socket.IO event: `["name", payload...]`
    pub fn from_event_data(data: Value) -> Result<Self, ProtocolError> {
        let Value::Array(mut items) = data else {
            return Err(ProtocolError::MalformedEvent(
                "event data is not an array".to_string(),
            ));
        };
        if items.is_empty() {
            return Err(ProtocolError::MalformedEvent("event data is empty".to_string()));
        }
        let name = match items.remove(0) {
            Value::String(name) => name,
            other => {
                return Err(ProtocolError::MalformedEvent(format!(
                    "event name is not a string: {}",
                    other
                )))
            }
        };

        if name != AGENT_UPDATE_EVENT {
            return Ok(ServerEvent::Other(name));
        }
        let payload = items.into_iter().next().ok_or_else(|| {
            ProtocolError::MalformedEvent(format!("{} event has no payload", AGENT_UPDATE_EVENT))
        })?;
        Ok(ServerEvent::AgentUpdate(serde_json::from_value(payload)?))
    }
}

/// Engine.IO open handshake
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Engine.IO v4 packet, one per websocket text frame
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    /// Carries one Socket.IO packet
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyFrame)?;
        let body = chars.as_str();
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::UnknownEnginePacket(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => format!(
                "0{}",
                serde_json::to_string(handshake).unwrap_or_else(|_| "{}".to_string())
            ),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO v5 packet carried inside an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        data: Value,
    },
    Ack {
        namespace: String,
        id: Option<u64>,
        data: Value,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// Request to join `namespace`
    pub fn connect(namespace: &str) -> Self {
        SocketPacket::Connect {
            namespace: namespace.to_string(),
            data: None,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Parse `<type>[/namespace,][ack id][json]`
    pub fn decode(packet: &str) -> Result<Self, ProtocolError> {
        let mut chars = packet.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyFrame)?;
        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::BinaryPacket);
        }
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            let (namespace, tail) = match rest.find(',') {
                Some(comma) => (&rest[..comma], &rest[comma + 1..]),
                None => (rest, ""),
            };
            rest = tail;
            namespace.to_string()
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            let id = rest[..digits].parse::<u64>().map_err(|_| {
                ProtocolError::MalformedEvent(format!("ack id out of range: {}", &rest[..digits]))
            })?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest)?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, data }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => Ok(SocketPacket::Event {
                namespace,
                id,
                data: data.ok_or_else(|| {
                    ProtocolError::MalformedEvent("event packet without data".to_string())
                })?,
            }),
            '3' => Ok(SocketPacket::Ack {
                namespace,
                id,
                data: data.unwrap_or(Value::Array(Vec::new())),
            }),
            '4' => Ok(SocketPacket::ConnectError { namespace, data }),
            other => Err(ProtocolError::UnknownSocketPacket(other)),
        }
    }

    pub fn encode(&self) -> String {
        let (kind, id, data) = match self {
            SocketPacket::Connect { data, .. } => ('0', None, data.as_ref()),
            SocketPacket::Disconnect { .. } => ('1', None, None),
            SocketPacket::Event { id, data, .. } => ('2', *id, Some(data)),
            SocketPacket::Ack { id, data, .. } => ('3', *id, Some(data)),
            SocketPacket::ConnectError { data, .. } => ('4', None, data.as_ref()),
        };

        let mut out = String::new();
        out.push(kind);
        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Wrap the packet in an Engine.IO message frame
    pub fn into_frame(self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_engine_open() {
        let frame = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        match EnginePacket::decode(frame).unwrap() {
            EnginePacket::Open(handshake) => {
                assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(handshake.ping_interval, 25000);
                assert_eq!(handshake.ping_timeout, 20000);
                assert_eq!(handshake.max_payload, Some(1_000_000));
            }
            other => panic!("expected open packet, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_engine_control_packets() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(
            EnginePacket::decode("2probe").unwrap(),
            EnginePacket::Ping("probe".to_string())
        );
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
        assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
        assert_eq!(EnginePacket::Pong("probe".to_string()).encode(), "3probe");
    }

    #[test]
    fn test_decode_engine_errors() {
        assert!(matches!(EnginePacket::decode(""), Err(ProtocolError::EmptyFrame)));
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(ProtocolError::UnknownEnginePacket('9'))
        ));
        assert!(matches!(
            EnginePacket::decode("0not-json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_connect_packet_encoding() {
        assert_eq!(SocketPacket::connect("/").into_frame(), "40");
        assert_eq!(SocketPacket::connect("/claims").into_frame(), "40/claims,");
    }

    #[test]
    fn test_decode_connect_ack() {
        let packet = SocketPacket::decode(r#"0{"sid":"abc"}"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Connect {
                namespace: "/".to_string(),
                data: Some(json!({"sid": "abc"})),
            }
        );
    }

    #[test]
    fn test_decode_agent_update_event() {
        let message = r#"2["agent_update",{"agent":"Orchestrator","status":"processing","result":"Query received."}]"#;
        let SocketPacket::Event { namespace, id, data } = SocketPacket::decode(message).unwrap() else {
            panic!("expected event packet");
        };
        assert_eq!(namespace, "/");
        assert_eq!(id, None);
        assert_eq!(
            ServerEvent::from_event_data(data).unwrap(),
            ServerEvent::AgentUpdate(AgentUpdate {
                agent: "Orchestrator".to_string(),
                status: AgentStatus::Processing,
                result: "Query received.".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_namespaced_event_with_ack_id() {
        let packet = SocketPacket::decode(r#"2/claims,12["tick",1]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/claims".to_string(),
                id: Some(12),
                data: json!(["tick", 1]),
            }
        );
    }

    #[test]
    fn test_unknown_event_is_passed_through() {
        let event = ServerEvent::from_event_data(json!(["heartbeat", {}])).unwrap();
        assert_eq!(event, ServerEvent::Other("heartbeat".to_string()));
    }

    #[test]
    fn test_malformed_agent_update_is_rejected() {
        let unknown_status = json!(["agent_update", {"agent": "Orchestrator", "status": "running", "result": ""}]);
        assert!(matches!(
            ServerEvent::from_event_data(unknown_status),
            Err(ProtocolError::Json(_))
        ));

        let missing_result = json!(["agent_update", {"agent": "Orchestrator", "status": "complete"}]);
        assert!(ServerEvent::from_event_data(missing_result).is_err());

        let no_payload = json!(["agent_update"]);
        assert!(matches!(
            ServerEvent::from_event_data(no_payload),
            Err(ProtocolError::MalformedEvent(_))
        ));

        assert!(ServerEvent::from_event_data(json!({"agent": "x"})).is_err());
    }

    #[test]
    fn test_socket_packet_errors() {
        assert!(matches!(SocketPacket::decode(""), Err(ProtocolError::EmptyFrame)));
        assert!(matches!(SocketPacket::decode("2"), Err(ProtocolError::MalformedEvent(_))));
        assert!(matches!(SocketPacket::decode("51-[]"), Err(ProtocolError::BinaryPacket)));
        assert!(matches!(
            SocketPacket::decode("8"),
            Err(ProtocolError::UnknownSocketPacket('8'))
        ));
    }

    #[test]
    fn test_query_response_outcome() {
        let answer: QueryResponse = serde_json::from_str(r#"{"final_answer":"Approved, $500"}"#).unwrap();
        assert_eq!(
            answer.into_outcome(),
            Some(QueryOutcome::Answer("Approved, $500".to_string()))
        );

        let both: QueryResponse =
            serde_json::from_str(r#"{"error":"boom","final_answer":"retry"}"#).unwrap();
        assert_eq!(both.into_outcome(), Some(QueryOutcome::Rejected("boom".to_string())));

        let empty_error: QueryResponse =
            serde_json::from_str(r#"{"error":"","final_answer":"ok"}"#).unwrap();
        assert_eq!(empty_error.into_outcome(), Some(QueryOutcome::Answer("ok".to_string())));

        let neither: QueryResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(neither.into_outcome(), None);
    }
}
