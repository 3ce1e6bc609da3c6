//! Actor trait, handler context and the worker loop
//!
//! Each actor owns one mailbox and runs on one dedicated worker thread.
//! Handlers are plain methods registered against message types at
//! construction; the worker loop pops, dispatches and frees one message at
//! a time until terminated.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use troupe_core::message::Message;

use crate::actor_ref::{ActorRef, Envelope};
use crate::dispatch::DispatchTable;
use crate::mailbox::Mailbox;

/// An entity with private state, one mailbox and a set of typed handlers
pub trait Actor: Send + 'static {
    /// Register message handlers; called once when the actor is managed.
    ///
    /// Use [`handle_messages!`](crate::handle_messages) instead of writing
    /// this by hand.
    fn register_handlers(table: &mut DispatchTable<Self>)
    where
        Self: Sized;

    /// Fallback for messages with no registered handler. No-op by default.
    fn process_message(&mut self, _msg: &dyn Message, _ctx: &mut ActorContext) {}

    /// Cleanup hook, invoked on the worker thread after the loop exits
    fn end(&mut self) {}
}

/// Wire an actor's handler methods to message types.
///
/// ```ignore
/// handle_messages!(PongActor,
///     Ping => on_ping,
/// );
/// ```
///
/// Each handler has the shape
/// `fn(&mut self, msg: &MessageType, ctx: &mut ActorContext)`.
#[macro_export]
macro_rules! handle_messages {
    ($actor:ty, $($msg:ty => $handler:ident),+ $(,)?) => {
        impl $crate::actor::Actor for $actor {
            fn register_handlers(table: &mut $crate::dispatch::DispatchTable<Self>) {
                $(
                    table.register::<$msg>(<$actor>::$handler);
                )+
            }
        }
    };
}

/// Per-message scratch handed to handlers
pub struct ActorContext {
    self_ref: Option<ActorRef>,
    reply_to: Option<ActorRef>,
    drain_marker: bool,
    stop_requested: bool,
    replies_dropped: Arc<AtomicU64>,
}

impl ActorContext {
    pub(crate) fn for_message(
        self_ref: ActorRef,
        reply_to: Option<ActorRef>,
        drain_marker: bool,
        replies_dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            self_ref: Some(self_ref),
            reply_to,
            drain_marker,
            stop_requested: false,
            replies_dropped,
        }
    }

    /// Context with a reply target but no owning worker.
    ///
    /// Used by request/reply front-ends that drive an actor's handlers from
    /// outside a worker loop, and by tests.
    pub fn with_reply(reply_to: ActorRef) -> Self {
        Self {
            self_ref: None,
            reply_to: Some(reply_to),
            drain_marker: false,
            stop_requested: false,
            replies_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Context with no sender and no owning worker
    pub fn detached() -> Self {
        Self {
            self_ref: None,
            reply_to: None,
            drain_marker: false,
            stop_requested: false,
            replies_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Forward `msg` to whoever sent the message being handled.
    ///
    /// When the sender is unknown the message is dropped and a counter
    /// increments; that is not an error.
    pub fn reply(&mut self, msg: Box<dyn Message>) {
        match &self.reply_to {
            Some(target) => target.send(msg, self.self_ref.as_ref()),
            None => {
                self.replies_dropped.fetch_add(1, Ordering::Relaxed);
                trace!("reply with no sender dropped");
            }
        }
    }

    /// The sender of the message being handled, if known
    pub fn sender(&self) -> Option<&ActorRef> {
        self.reply_to.as_ref()
    }

    /// Reference to the handling actor itself
    pub fn self_ref(&self) -> Option<&ActorRef> {
        self.self_ref.as_ref()
    }

    /// `true` when this message emptied the queue as it was popped.
    ///
    /// Used to coalesce work and to mark shutdown-drain boundaries.
    pub fn drain_marker(&self) -> bool {
        self.drain_marker
    }

    /// Ask the worker to exit after the current message
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Replies dropped because no sender was known
    pub fn replies_dropped(&self) -> u64 {
        self.replies_dropped.load(Ordering::Relaxed)
    }
}

/// Type-erased worker, so the Manager can hold a heterogeneous actor set
pub(crate) trait Worker: Send {
    fn run(&mut self);
}

/// An actor bound to its mailbox and dispatch table
pub(crate) struct ActorCell<A: Actor> {
    name: Arc<str>,
    actor: A,
    table: DispatchTable<A>,
    mailbox: Arc<Mailbox<Envelope>>,
    terminated: Arc<AtomicBool>,
    msg_count: Arc<AtomicU64>,
    replies_dropped: Arc<AtomicU64>,
}

impl<A: Actor> ActorCell<A> {
    pub(crate) fn new(
        name: Arc<str>,
        actor: A,
        mailbox: Arc<Mailbox<Envelope>>,
        terminated: Arc<AtomicBool>,
        msg_count: Arc<AtomicU64>,
        replies_dropped: Arc<AtomicU64>,
    ) -> Self {
        let mut table = DispatchTable::new();
        A::register_handlers(&mut table);

        Self {
            name,
            actor,
            table,
            mailbox,
            terminated,
            msg_count,
            replies_dropped,
        }
    }
}

impl<A: Actor> Worker for ActorCell<A> {
    fn run(&mut self) {
        let self_ref = ActorRef::local(Arc::clone(&self.name), Arc::clone(&self.mailbox));

        loop {
            if self.terminated.load(Ordering::Acquire) {
                break;
            }
            let Some((envelope, last)) = self.mailbox.pop() else {
                break;
            };
            let Envelope { msg, sender, .. } = envelope;

            let mut ctx = ActorContext::for_message(
                self_ref.clone(),
                sender,
                last,
                Arc::clone(&self.replies_dropped),
            );

            let handled = self.table.dispatch(&mut self.actor, msg.as_ref(), &mut ctx);
            if !handled {
                trace!(actor = %self.name, id = msg.msg_id(), "message fell through to fallback");
                self.actor.process_message(msg.as_ref(), &mut ctx);
            }
            drop(msg);

            self.msg_count.fetch_add(1, Ordering::Relaxed);
            if ctx.stop_requested() {
                self.terminated.store(true, Ordering::Release);
            }
        }

        self.actor.end();
    }
}
