//! Troupe Runtime
//!
//! Low-latency in-process actor runtime: per-actor owned mailboxes, typed
//! dispatch with a fixed-width fast path, dedicated worker threads with CPU
//! pinning and real-time priorities, and a lifecycle Manager that
//! coordinates startup, shutdown and name resolution.
//!
//! ```no_run
//! use troupe_core::messages::Start;
//! use troupe_runtime::{handle_messages, ActorContext, Manager, ThreadConfig};
//!
//! struct Greeter;
//!
//! impl Greeter {
//!     fn on_start(&mut self, _msg: &Start, _ctx: &mut ActorContext) {
//!         println!("hello");
//!     }
//! }
//!
//! handle_messages!(Greeter, Start => on_start);
//!
//! let mut mgr = Manager::new("Example");
//! mgr.manage("greeter", Greeter, ThreadConfig::default()).unwrap();
//! mgr.init();
//! mgr.handle().terminate();
//! mgr.run();
//! mgr.end();
//! ```

pub mod actor;
pub mod actor_ref;
pub mod dispatch;
pub mod mailbox;
pub mod manager;
pub mod thread_bind;

pub use actor::{Actor, ActorContext};
pub use actor_ref::{ActorRef, Envelope, ForeignBridge, RemoteSender};
pub use dispatch::DispatchTable;
pub use mailbox::{Mailbox, MailboxClosed};
pub use manager::{Manager, ManagerHandle, NameService};
pub use thread_bind::{SchedPolicy, ThreadConfig};
