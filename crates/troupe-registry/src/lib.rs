//! Troupe Registry
//!
//! Cross-process name service for Troupe managers. A single directory
//! actor maps actor names to endpoints and tracks manager liveness by
//! heartbeats; the client side auto-registers managed actors, posts
//! heartbeats every two seconds and resolves names with bounded
//! synchronous RPCs.
//!
//! Protocol: JSON over REQ/REP, message ids 900–907.

pub mod client;
pub mod messages;
pub mod server;
pub mod service;

pub use client::RegistryClient;
pub use messages::{
    Heartbeat, HeartbeatAck, LookupActor, LookupResult, RegisterActor, RegistrationFailed,
    RegistrationOk, RegistryReply, RegistryRequest, UnregisterActor,
};
pub use server::RegistryServer;
pub use service::{ActorEntry, RegistryService};
