//! Built-in control messages
//!
//! Ids are part of the protocol and never change. All control messages
//! derive serde so they can cross the wire unchanged.

use serde::{Deserialize, Serialize};

use crate::define_message;

/// Resume a paused activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Continue {}
define_message!(Continue = 1);

/// Orderly termination request
///
/// Posting this to a Manager tears down every managed actor; posting it to
/// an actor that registered a handler lets it clean up cooperatively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shutdown {}
define_message!(Shutdown = 5);

/// First message every managed actor receives, ahead of any user traffic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Start {}
define_message!(Start = 6);

/// Subscription request for actors that publish to interested parties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscribe {}
define_message!(Subscribe = 7);

/// Timer expiry; `data` identifies which timer fired
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeout {
    pub data: i64,
}
define_message!(Timeout = 8);

impl Timeout {
    pub fn new(data: i64) -> Self {
        Self { data }
    }
}

/// Receiver-side refusal of an inbound envelope.
///
/// Emitted by the transport bridge when the named receiver does not exist in
/// the target process, and sent best-effort back to the envelope's sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reject {
    /// Wire name of the message that was refused
    pub message_type: String,
    /// Human-readable refusal reason
    pub reason: String,
    /// The receiver name that could not be resolved
    pub rejected_by: String,
}
define_message!(Reject = 9);
