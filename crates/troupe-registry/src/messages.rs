//! Registry protocol messages, ids 900–907
//!
//! The structs are dispatched like any other actor message; the tagged
//! enums are their exact wire shape, one flat JSON object with a
//! `message_type` discriminator.

use serde::{Deserialize, Serialize};

use troupe_core::define_message;

/// Register an actor name → endpoint mapping (client → service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterActor {
    pub manager_id: String,
    pub actor_name: String,
    /// Endpoint where the actor's manager accepts inbound messages
    pub actor_endpoint: String,
}
define_message!(RegisterActor = 900);

/// Remove an actor from the directory (client → service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterActor {
    pub actor_name: String,
}
define_message!(UnregisterActor = 901);

/// Registration accepted (service → client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationOk {
    pub actor_name: String,
}
define_message!(RegistrationOk = 902);

/// Registration rejected (service → client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationFailed {
    pub actor_name: String,
    pub reason: String,
}
define_message!(RegistrationFailed = 903);

/// Resolve an actor name (client → service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupActor {
    pub actor_name: String,
}
define_message!(LookupActor = 904);

/// Lookup response (service → client)
///
/// `endpoint` is `None` when the name is unknown; `online` is `false` when
/// the owning manager has missed heartbeats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub actor_name: String,
    pub endpoint: Option<String>,
    pub online: bool,
}
define_message!(LookupResult = 905);

/// Manager liveness signal (client → service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub manager_id: String,
    pub timestamp_ms: u64,
}
define_message!(Heartbeat = 906);

/// Heartbeat acknowledgement (service → client)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatAck {}
define_message!(HeartbeatAck = 907);

/// Wire shape of client → service traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type")]
pub enum RegistryRequest {
    RegisterActor(RegisterActor),
    UnregisterActor(UnregisterActor),
    LookupActor(LookupActor),
    Heartbeat(Heartbeat),
}

/// Wire shape of service → client traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type")]
pub enum RegistryReply {
    RegistrationOk(RegistrationOk),
    RegistrationFailed(RegistrationFailed),
    LookupResult(LookupResult),
    HeartbeatAck(HeartbeatAck),
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::message::Message;

    #[test]
    fn test_protocol_ids() {
        assert_eq!(RegisterActor::MSG_ID, 900);
        assert_eq!(UnregisterActor::MSG_ID, 901);
        assert_eq!(RegistrationOk::MSG_ID, 902);
        assert_eq!(RegistrationFailed::MSG_ID, 903);
        assert_eq!(LookupActor::MSG_ID, 904);
        assert_eq!(LookupResult::MSG_ID, 905);
        assert_eq!(Heartbeat::MSG_ID, 906);
        assert_eq!(HeartbeatAck::MSG_ID, 907);
    }

    #[test]
    fn test_register_wire_format() {
        let request = RegistryRequest::RegisterActor(RegisterActor {
            manager_id: "PongManager".to_string(),
            actor_name: "pong".to_string(),
            actor_endpoint: "tcp://127.0.0.1:5001".to_string(),
        });

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message_type"], "RegisterActor");
        assert_eq!(value["manager_id"], "PongManager");
        assert_eq!(value["actor_name"], "pong");
        assert_eq!(value["actor_endpoint"], "tcp://127.0.0.1:5001");
    }

    #[test]
    fn test_lookup_wire_format() {
        let request = RegistryRequest::LookupActor(LookupActor {
            actor_name: "pong".to_string(),
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message_type"], "LookupActor");
        assert_eq!(value["actor_name"], "pong");
    }

    #[test]
    fn test_heartbeat_wire_format() {
        let request = RegistryRequest::Heartbeat(Heartbeat {
            manager_id: "PongManager".to_string(),
            timestamp_ms: 1234,
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message_type"], "Heartbeat");
        assert_eq!(value["manager_id"], "PongManager");
        assert_eq!(value["timestamp_ms"], 1234);
    }

    #[test]
    fn test_lookup_result_absent_is_null_endpoint() {
        let reply = RegistryReply::LookupResult(LookupResult {
            actor_name: "pong".to_string(),
            endpoint: None,
            online: false,
        });
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["message_type"], "LookupResult");
        assert!(value["endpoint"].is_null());
        assert_eq!(value["online"], false);
    }

    #[test]
    fn test_request_round_trip() {
        let json = r#"{"message_type":"RegisterActor","manager_id":"m1","actor_name":"pong","actor_endpoint":"tcp://h:1"}"#;
        let request: RegistryRequest = serde_json::from_str(json).unwrap();
        match request {
            RegistryRequest::RegisterActor(msg) => {
                assert_eq!(msg.manager_id, "m1");
                assert_eq!(msg.actor_name, "pong");
                assert_eq!(msg.actor_endpoint, "tcp://h:1");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_reply_round_trip() {
        let reply = RegistryReply::HeartbeatAck(HeartbeatAck {});
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"message_type":"HeartbeatAck"}"#);
        let back: RegistryReply = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, RegistryReply::HeartbeatAck(_)));
    }
}
