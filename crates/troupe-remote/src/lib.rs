//! Troupe Remote
//!
//! Wire transport adapter for the Troupe actor runtime. Outbound messages
//! are encoded as JSON envelopes and pushed over one long-lived socket per
//! remote endpoint; a receiver bridge binds the local endpoint and feeds
//! decoded messages into local mailboxes, so local and remote sends are
//! indistinguishable to user code.
//!
//! Register every message type that crosses the wire during startup:
//!
//! ```ignore
//! troupe_remote::register_wire_message::<Ping>("Ping");
//! troupe_remote::register_wire_message::<Pong>("Pong");
//! ```

pub mod receiver;
pub mod sender;
pub mod wire;

pub use receiver::{WireReceiver, WireReceiverHandle};
pub use sender::WireSender;
pub use wire::{decode_envelope, register_wire_message, WireEnvelope, WireRegistry};
