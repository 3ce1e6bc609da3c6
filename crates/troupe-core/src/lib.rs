//! Troupe Core
//!
//! Core types for the Troupe actor runtime: the message contract and its
//! numeric-id scheme, the built-in control messages, the shared error
//! taxonomy, protocol constants, registry configuration and the clock
//! abstraction used by liveness logic.
//!
//! The runtime itself lives in `troupe-runtime`; the wire adapter in
//! `troupe-remote`; the name service in `troupe-registry`.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod message;
pub mod messages;

pub use clock::{Clock, MockClock, WallClock};
pub use config::{HostConfig, ManagerConfig, RegistryConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use message::{downcast_ref, Message, MsgId};
pub use messages::{Continue, Reject, Shutdown, Start, Subscribe, Timeout};
