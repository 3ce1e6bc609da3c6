//! Actor handles
//!
//! An [`ActorRef`] delivers a message to an actor whose location may be
//! local (same process), remote (another process behind a wire endpoint)
//! or foreign (behind a cross-language bridge). Sends are uniform and
//! fire-and-forget: transport failures are logged, never raised.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use troupe_core::message::{Message, MsgId};

use crate::mailbox::Mailbox;

/// Routing envelope owned by the mailbox slot.
///
/// Carries the message together with the metadata the runtime stamps on
/// enqueue; the `last` drain marker is produced by the pop side.
pub struct Envelope {
    pub msg: Box<dyn Message>,
    /// Who sent this, for replies. `None` for anonymous sends.
    pub sender: Option<ActorRef>,
    /// Name of the target the sender addressed
    pub destination: Option<Arc<str>>,
}

/// Outbound seam implemented by the wire transport adapter.
///
/// Lives here so the runtime can hold remote references without depending
/// on a concrete transport.
pub trait RemoteSender: Send + Sync {
    /// Encode and transmit `msg` to `receiver` at `endpoint`
    fn send_to(&self, endpoint: &str, receiver: &str, msg: Box<dyn Message>, from: Option<&ActorRef>);

    /// Endpoint stamped into envelopes so the far side can reply
    fn local_endpoint(&self) -> Option<String>;
}

/// Callback seam used by cross-language bridges
pub trait ForeignBridge: Send + Sync {
    /// Deliver `msg` to `target` in the foreign runtime
    fn send_foreign(&self, target: &str, sender: Option<&str>, msg_id: MsgId, msg: &dyn Message);
}

/// Polymorphic handle to an actor
#[derive(Clone)]
pub enum ActorRef {
    /// In-process actor reached through its mailbox
    Local {
        name: Arc<str>,
        mailbox: Arc<Mailbox<Envelope>>,
    },
    /// Actor in another process, reached through the wire adapter
    Remote {
        name: Arc<str>,
        endpoint: Arc<str>,
        sender: Arc<dyn RemoteSender>,
    },
    /// Actor behind a cross-language bridge
    Foreign {
        name: Arc<str>,
        sender_name: Option<Arc<str>>,
        bridge: Arc<dyn ForeignBridge>,
    },
}

impl ActorRef {
    /// Create a local reference
    pub fn local(name: Arc<str>, mailbox: Arc<Mailbox<Envelope>>) -> Self {
        Self::Local { name, mailbox }
    }

    /// Create a remote reference
    pub fn remote(name: &str, endpoint: &str, sender: Arc<dyn RemoteSender>) -> Self {
        Self::Remote {
            name: Arc::from(name),
            endpoint: Arc::from(endpoint),
            sender,
        }
    }

    /// Create a foreign reference
    pub fn foreign(name: &str, sender_name: Option<&str>, bridge: Arc<dyn ForeignBridge>) -> Self {
        Self::Foreign {
            name: Arc::from(name),
            sender_name: sender_name.map(Arc::from),
            bridge,
        }
    }

    /// Name of the target actor
    pub fn name(&self) -> &str {
        match self {
            Self::Local { name, .. } | Self::Remote { name, .. } | Self::Foreign { name, .. } => {
                name
            }
        }
    }

    /// Wire endpoint, for remote references
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Remote { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Deliver a message. Ownership of `msg` transfers to the callee side.
    ///
    /// `from` identifies the sender so the target can reply; pass `None`
    /// for anonymous sends. Fire-and-forget: delivery failures are logged.
    pub fn send(&self, msg: Box<dyn Message>, from: Option<&ActorRef>) {
        match self {
            Self::Local { name, mailbox } => {
                let envelope = Envelope {
                    msg,
                    sender: from.cloned(),
                    destination: Some(Arc::clone(name)),
                };
                if mailbox.push(envelope).is_err() {
                    debug!(actor = %name, "dropping message for terminated actor");
                }
            }
            Self::Remote {
                name,
                endpoint,
                sender,
            } => {
                sender.send_to(endpoint, name, msg, from);
            }
            Self::Foreign {
                name,
                sender_name,
                bridge,
            } => {
                let id = msg.msg_id();
                bridge.send_foreign(name, sender_name.as_deref(), id, msg.as_ref());
            }
        }
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { name, .. } => write!(f, "ActorRef::Local({})", name),
            Self::Remote { name, endpoint, .. } => {
                write!(f, "ActorRef::Remote({} @ {})", name, endpoint)
            }
            Self::Foreign { name, .. } => write!(f, "ActorRef::Foreign({})", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::define_message;

    struct Note {
        value: i32,
    }
    define_message!(Note = 42);

    #[test]
    fn test_local_send_stamps_routing() {
        let mailbox = Arc::new(Mailbox::new());
        let target = ActorRef::local(Arc::from("pong"), Arc::clone(&mailbox));
        let sender_box = Arc::new(Mailbox::new());
        let sender = ActorRef::local(Arc::from("ping"), sender_box);

        target.send(Box::new(Note { value: 1 }), Some(&sender));

        let (envelope, last) = mailbox.pop().unwrap();
        assert!(last);
        assert_eq!(envelope.sender.as_ref().unwrap().name(), "ping");
        assert_eq!(envelope.destination.as_deref(), Some("pong"));
        assert_eq!(envelope.msg.msg_id(), Note::MSG_ID);
    }

    #[test]
    fn test_foreign_send_invokes_bridge() {
        use parking_lot::Mutex;

        #[derive(Default)]
        struct CaptureBridge {
            calls: Mutex<Vec<(String, Option<String>, u16)>>,
        }

        impl ForeignBridge for CaptureBridge {
            fn send_foreign(
                &self,
                target: &str,
                sender: Option<&str>,
                msg_id: u16,
                _msg: &dyn Message,
            ) {
                self.calls.lock().push((
                    target.to_string(),
                    sender.map(str::to_string),
                    msg_id,
                ));
            }
        }

        let bridge = Arc::new(CaptureBridge::default());
        let target = ActorRef::foreign("cpp_pong", Some("rust_ping"), Arc::clone(&bridge) as Arc<dyn ForeignBridge>);

        target.send(Box::new(Note { value: 1 }), None);

        let calls = bridge.calls.lock();
        assert_eq!(
            calls[0],
            (
                "cpp_pong".to_string(),
                Some("rust_ping".to_string()),
                Note::MSG_ID
            )
        );
    }

    #[test]
    fn test_send_to_closed_mailbox_is_dropped() {
        let mailbox = Arc::new(Mailbox::new());
        let target = ActorRef::local(Arc::from("gone"), Arc::clone(&mailbox));
        mailbox.close();

        // Fire-and-forget: no panic, no error surfaced.
        target.send(Box::new(Note { value: 1 }), None);
        assert!(mailbox.pop().is_none());
    }
}
