//! Message contract
//!
//! Every message carries a stable numeric id. Application ids live below
//! [`MSG_ID_CACHE_WIDTH`](crate::constants::MSG_ID_CACHE_WIDTH) so the
//! per-actor dispatch cache can index by them directly; the registry
//! protocol owns [900, 999]. Routing metadata (sender, destination, the
//! `last` drain marker) travels in the runtime's mailbox envelope, not on
//! the message itself, so message types stay plain owned values.

use std::any::Any;

/// Stable numeric message id
pub type MsgId = u16;

/// Base contract for everything that can be sent to an actor.
///
/// Ownership transfers on enqueue: the sender gives up the boxed message and
/// the receiving worker drops it after dispatch.
pub trait Message: Any + Send {
    /// The type's stable numeric id
    fn msg_id(&self) -> MsgId;

    /// Upcast for handler-side downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Downcast a type-erased message to a concrete type.
pub fn downcast_ref<M: Message>(msg: &dyn Message) -> Option<&M> {
    msg.as_any().downcast_ref::<M>()
}

impl std::fmt::Debug for dyn Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Message")
            .field("msg_id", &self.msg_id())
            .finish()
    }
}

/// Implement [`Message`] for a type with a fixed numeric id.
///
/// The id must fall inside the application range `[0, 512)` or the registry
/// range `[900, 999]`; anything else fails to compile.
///
/// ```
/// use troupe_core::define_message;
///
/// struct Ping {
///     count: i32,
/// }
/// define_message!(Ping = 100);
/// ```
#[macro_export]
macro_rules! define_message {
    ($ty:ty = $id:expr) => {
        impl $ty {
            /// Stable wire id for this message type
            pub const MSG_ID: $crate::message::MsgId = $id;
        }

        impl $crate::message::Message for $ty {
            fn msg_id(&self) -> $crate::message::MsgId {
                Self::MSG_ID
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        const _: () = assert!(
            ($id as usize) < $crate::constants::MSG_ID_CACHE_WIDTH
                || (($id as u16) >= $crate::constants::MSG_ID_REGISTRY_MIN
                    && ($id as u16) <= $crate::constants::MSG_ID_REGISTRY_MAX),
            "message id outside the application and registry ranges"
        );
    };
}
