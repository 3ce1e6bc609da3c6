//! Per-actor message dispatch
//!
//! Handlers are registered against concrete message types when the actor is
//! constructed and are immutable afterwards. Dispatch resolves an incoming
//! message in three steps: a dense cache indexed by numeric id, a negative
//! bitmap for ids known to have no handler, and a type-identity lookup that
//! warms one of the other two. Registry-protocol ids (900–999) sit outside
//! the fixed-width cache and always resolve by type identity.

use std::any::TypeId;
use std::collections::HashMap;

use troupe_core::constants::MSG_ID_CACHE_WIDTH;
use troupe_core::message::Message;

use crate::actor::ActorContext;

/// Sentinel for an empty cache slot
const HANDLER_NONE: u16 = u16::MAX;

type HandlerFn<A> = Box<dyn Fn(&mut A, &dyn Message, &mut ActorContext) + Send>;

/// Dense bitmap over the cached id range
struct IdBitmap {
    words: [u64; MSG_ID_CACHE_WIDTH / 64],
}

impl IdBitmap {
    fn new() -> Self {
        Self {
            words: [0; MSG_ID_CACHE_WIDTH / 64],
        }
    }

    fn get(&self, index: usize) -> bool {
        debug_assert!(index < MSG_ID_CACHE_WIDTH);
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    fn set(&mut self, index: usize) {
        debug_assert!(index < MSG_ID_CACHE_WIDTH);
        self.words[index / 64] |= 1 << (index % 64);
    }
}

/// Handler table owned by a single actor.
///
/// Not shared: the owning worker is the only thread that dispatches, which
/// is what makes the first-miss cache fill safe without synchronization.
pub struct DispatchTable<A> {
    handlers: Vec<HandlerFn<A>>,
    by_type: HashMap<TypeId, u16>,
    cache: Box<[u16; MSG_ID_CACHE_WIDTH]>,
    negative: IdBitmap,
}

impl<A: 'static> DispatchTable<A> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            by_type: HashMap::new(),
            cache: Box::new([HANDLER_NONE; MSG_ID_CACHE_WIDTH]),
            negative: IdBitmap::new(),
        }
    }

    /// Register a handler for a concrete message type.
    ///
    /// Registration happens during actor construction; the table is
    /// read-only once the worker starts, apart from cache warming.
    pub fn register<M: Message>(&mut self, handler: fn(&mut A, &M, &mut ActorContext)) {
        let type_id = TypeId::of::<M>();
        assert!(
            !self.by_type.contains_key(&type_id),
            "handler already registered for this message type"
        );
        let slot = self.handlers.len();
        assert!(slot < HANDLER_NONE as usize, "handler table full");

        self.handlers.push(Box::new(move |actor, msg, ctx| {
            let msg = msg
                .as_any()
                .downcast_ref::<M>()
                .expect("dispatch cache points at a handler for another type");
            handler(actor, msg, ctx);
        }));
        self.by_type.insert(type_id, slot as u16);
    }

    /// Route one message. Returns `true` iff a handler ran.
    pub fn dispatch(&mut self, actor: &mut A, msg: &dyn Message, ctx: &mut ActorContext) -> bool {
        let id = msg.msg_id() as usize;

        if id >= MSG_ID_CACHE_WIDTH {
            return match self.by_type.get(&msg.as_any().type_id()).copied() {
                Some(slot) => {
                    (self.handlers[slot as usize])(actor, msg, ctx);
                    true
                }
                None => false,
            };
        }

        let cached = self.cache[id];
        if cached != HANDLER_NONE {
            (self.handlers[cached as usize])(actor, msg, ctx);
            return true;
        }

        if self.negative.get(id) {
            return false;
        }

        match self.by_type.get(&msg.as_any().type_id()).copied() {
            Some(slot) => {
                debug_assert!(!self.negative.get(id), "cache and negative bitmap overlap");
                self.cache[id] = slot;
                (self.handlers[slot as usize])(actor, msg, ctx);
                true
            }
            None => {
                self.negative.set(id);
                false
            }
        }
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// `true` once a dispatch has warmed the cache slot for `id`
    pub fn is_cached(&self, id: usize) -> bool {
        debug_assert!(id < MSG_ID_CACHE_WIDTH);
        self.cache[id] != HANDLER_NONE
    }

    /// `true` once `id` is known to have no handler
    pub fn is_negative(&self, id: usize) -> bool {
        debug_assert!(id < MSG_ID_CACHE_WIDTH);
        self.negative.get(id)
    }
}

impl<A: 'static> Default for DispatchTable<A> {
    fn default() -> Self {
        Self::new()
    }
}
