//! Wire envelope codec and the message-type registry
//!
//! Every inbound and outbound message crosses the wire as a JSON envelope:
//!
//! ```json
//! {
//!   "sender_actor":    "ping",
//!   "sender_endpoint": "tcp://127.0.0.1:5002",
//!   "receiver":        "pong",
//!   "message_type":    "Ping",
//!   "message":         { "count": 1 }
//! }
//! ```
//!
//! Readers ignore unknown extra keys for forward compatibility. Message
//! types must be registered (name ↔ payload schema) before the first
//! decode; the registry seals itself at that point and later registration
//! is a programming error.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use troupe_core::error::{Error, Result};
use troupe_core::message::Message;
use troupe_core::messages::{Continue, Reject, Shutdown, Start, Subscribe, Timeout};

/// On-the-wire form of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Name of the sending actor, when known
    #[serde(default)]
    pub sender_actor: Option<String>,
    /// Endpoint where the sender's manager can be reached, for replies
    #[serde(default)]
    pub sender_endpoint: Option<String>,
    /// Name of the target actor in the receiving process
    pub receiver: String,
    /// Registered wire name of the payload type
    pub message_type: String,
    /// Payload fields
    pub message: Value,
}

type DecodeFn = fn(&Value) -> Result<Box<dyn Message>>;
type EncodeFn = fn(&dyn Message) -> Result<Value>;

fn decode_as<M: Message + DeserializeOwned>(value: &Value) -> Result<Box<dyn Message>> {
    let msg: M = serde_json::from_value(value.clone())
        .map_err(|e| Error::transport(format!("payload decode: {}", e)))?;
    Ok(Box::new(msg))
}

fn encode_as<M: Message + Serialize>(msg: &dyn Message) -> Result<Value> {
    let msg = msg
        .as_any()
        .downcast_ref::<M>()
        .expect("wire registry entry points at another type");
    serde_json::to_value(msg).map_err(|e| Error::transport(format!("payload encode: {}", e)))
}

struct Tables {
    decoders: HashMap<String, DecodeFn>,
    encoders: HashMap<TypeId, (String, EncodeFn)>,
}

/// Name ↔ payload-schema registry.
///
/// Written during an explicit initialization phase, read-only once the
/// first envelope is decoded.
pub struct WireRegistry {
    tables: RwLock<Tables>,
    sealed: AtomicBool,
}

impl WireRegistry {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                decoders: HashMap::new(),
                encoders: HashMap::new(),
            }),
            sealed: AtomicBool::new(false),
        }
    }

    /// Register a message type under its wire name.
    ///
    /// # Panics
    ///
    /// Panics if called after the first decode; register every type during
    /// process startup.
    pub fn register<M>(&self, name: &str)
    where
        M: Message + Serialize + DeserializeOwned,
    {
        assert!(
            !self.sealed.load(Ordering::Acquire),
            "wire message '{}' registered after the first decode; register all types at startup",
            name
        );
        let mut tables = self.tables.write();
        tables.decoders.insert(name.to_string(), decode_as::<M>);
        tables
            .encoders
            .insert(TypeId::of::<M>(), (name.to_string(), encode_as::<M>));
    }

    /// Wire name of a registered message
    pub fn type_name(&self, msg: &dyn Message) -> Option<String> {
        let tables = self.tables.read();
        tables
            .encoders
            .get(&msg.as_any().type_id())
            .map(|(name, _)| name.clone())
    }

    /// Encode a message into envelope JSON
    pub fn encode_envelope(
        &self,
        receiver: &str,
        msg: &dyn Message,
        sender_actor: Option<&str>,
        sender_endpoint: Option<&str>,
    ) -> Result<String> {
        let tables = self.tables.read();
        let (name, encode) = tables
            .encoders
            .get(&msg.as_any().type_id())
            .ok_or_else(|| Error::unknown_message_type(format!("id {}", msg.msg_id())))?;

        let envelope = WireEnvelope {
            sender_actor: sender_actor.map(str::to_string),
            sender_endpoint: sender_endpoint.map(str::to_string),
            receiver: receiver.to_string(),
            message_type: name.clone(),
            message: encode(msg)?,
        };
        serde_json::to_string(&envelope)
            .map_err(|e| Error::transport(format!("envelope encode: {}", e)))
    }

    /// Decode the payload of an already-parsed envelope.
    ///
    /// Seals the registry: no further registration is accepted.
    pub fn decode_message(&self, envelope: &WireEnvelope) -> Result<Box<dyn Message>> {
        self.sealed.store(true, Ordering::Release);
        let tables = self.tables.read();
        let decode = tables
            .decoders
            .get(&envelope.message_type)
            .ok_or_else(|| Error::unknown_message_type(&envelope.message_type))?;
        decode(&envelope.message)
    }

    /// `true` once the first decode has happened
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl Default for WireRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse envelope JSON. Unknown extra keys are ignored.
pub fn decode_envelope(text: &str) -> Result<WireEnvelope> {
    serde_json::from_str(text).map_err(|e| Error::transport(format!("envelope decode: {}", e)))
}

/// Build the refusal for an envelope whose receiver is unknown
pub fn reject_for(envelope: &WireEnvelope) -> Reject {
    Reject {
        message_type: envelope.message_type.clone(),
        reason: format!("Unknown actor: {}", envelope.receiver),
        rejected_by: envelope.receiver.clone(),
    }
}

static GLOBAL: Lazy<WireRegistry> = Lazy::new(WireRegistry::new);
static BUILTINS: Once = Once::new();

fn register_builtins(registry: &WireRegistry) {
    registry.register::<Start>("Start");
    registry.register::<Shutdown>("Shutdown");
    registry.register::<Continue>("Continue");
    registry.register::<Subscribe>("Subscribe");
    registry.register::<Timeout>("Timeout");
    registry.register::<Reject>("Reject");
}

/// The process-wide registry, with control messages pre-registered
pub fn global() -> &'static WireRegistry {
    BUILTINS.call_once(|| register_builtins(&GLOBAL));
    &GLOBAL
}

/// Register a message type with the process-wide registry
pub fn register_wire_message<M>(name: &str)
where
    M: Message + Serialize + DeserializeOwned,
{
    global().register::<M>(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::define_message;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        count: i32,
    }
    define_message!(Ping = 100);

    fn test_registry() -> WireRegistry {
        let registry = WireRegistry::new();
        registry.register::<Ping>("Ping");
        registry.register::<Reject>("Reject");
        registry
    }

    #[test]
    fn test_envelope_round_trip() {
        let registry = test_registry();
        let json = registry
            .encode_envelope(
                "pong",
                &Ping { count: 3 },
                Some("ping"),
                Some("tcp://127.0.0.1:5002"),
            )
            .unwrap();

        let envelope = decode_envelope(&json).unwrap();
        assert_eq!(envelope.receiver, "pong");
        assert_eq!(envelope.message_type, "Ping");
        assert_eq!(envelope.sender_actor.as_deref(), Some("ping"));
        assert_eq!(
            envelope.sender_endpoint.as_deref(),
            Some("tcp://127.0.0.1:5002")
        );

        let msg = registry.decode_message(&envelope).unwrap();
        let ping = troupe_core::downcast_ref::<Ping>(msg.as_ref()).unwrap();
        assert_eq!(ping, &Ping { count: 3 });
    }

    #[test]
    fn test_anonymous_sender_round_trip() {
        let registry = test_registry();
        let json = registry
            .encode_envelope("pong", &Ping { count: 1 }, None, None)
            .unwrap();

        let envelope = decode_envelope(&json).unwrap();
        assert!(envelope.sender_actor.is_none());
        assert!(envelope.sender_endpoint.is_none());
    }

    #[test]
    fn test_unknown_extra_keys_ignored() {
        let json = r#"{
            "sender_actor": null,
            "sender_endpoint": null,
            "receiver": "pong",
            "message_type": "Ping",
            "message": {"count": 1, "future_field": true},
            "trace_id": "abc"
        }"#;
        let envelope = decode_envelope(json).unwrap();
        assert_eq!(envelope.receiver, "pong");

        let registry = test_registry();
        let msg = registry.decode_message(&envelope).unwrap();
        assert_eq!(
            troupe_core::downcast_ref::<Ping>(msg.as_ref()).unwrap().count,
            1
        );
    }

    #[test]
    fn test_unknown_message_type() {
        let registry = test_registry();
        let envelope = WireEnvelope {
            sender_actor: None,
            sender_endpoint: None,
            receiver: "pong".to_string(),
            message_type: "Mystery".to_string(),
            message: Value::Null,
        };
        let err = registry.decode_message(&envelope).unwrap_err();
        assert!(matches!(err, Error::UnknownMessageType { .. }));
    }

    #[test]
    fn test_unregistered_type_cannot_encode() {
        let registry = WireRegistry::new();
        let err = registry
            .encode_envelope("pong", &Ping { count: 1 }, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMessageType { .. }));
    }

    #[test]
    fn test_decode_seals_registry() {
        let registry = test_registry();
        assert!(!registry.is_sealed());

        let envelope = WireEnvelope {
            sender_actor: None,
            sender_endpoint: None,
            receiver: "pong".to_string(),
            message_type: "Ping".to_string(),
            message: serde_json::json!({"count": 1}),
        };
        registry.decode_message(&envelope).unwrap();
        assert!(registry.is_sealed());
    }

    #[test]
    #[should_panic(expected = "after the first decode")]
    fn test_register_after_seal_panics() {
        let registry = test_registry();
        let envelope = WireEnvelope {
            sender_actor: None,
            sender_endpoint: None,
            receiver: "pong".to_string(),
            message_type: "Ping".to_string(),
            message: serde_json::json!({"count": 1}),
        };
        registry.decode_message(&envelope).unwrap();

        #[derive(Serialize, Deserialize)]
        struct Late {}
        define_message!(Late = 101);
        registry.register::<Late>("Late");
    }

    #[test]
    fn test_reject_for_unknown_receiver() {
        let envelope = WireEnvelope {
            sender_actor: Some("ping".to_string()),
            sender_endpoint: Some("tcp://127.0.0.1:5002".to_string()),
            receiver: "nobody".to_string(),
            message_type: "Ping".to_string(),
            message: Value::Null,
        };
        let reject = reject_for(&envelope);
        assert_eq!(reject.message_type, "Ping");
        assert_eq!(reject.reason, "Unknown actor: nobody");
        assert_eq!(reject.rejected_by, "nobody");
    }
}
