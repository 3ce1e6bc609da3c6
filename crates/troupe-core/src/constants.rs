//! Limits and protocol constants for Troupe
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Message Id Ranges
// =============================================================================

/// Width of the per-actor dispatch cache. Application message ids must be
/// below this value so they can index the cache directly.
pub const MSG_ID_CACHE_WIDTH: usize = 512;

/// First message id reserved for the registry protocol
pub const MSG_ID_REGISTRY_MIN: u16 = 900;

/// Last message id reserved for the registry protocol
pub const MSG_ID_REGISTRY_MAX: u16 = 999;

// =============================================================================
// Actor Limits
// =============================================================================

/// Maximum length of an actor name in bytes
pub const ACTOR_NAME_LENGTH_BYTES_MAX: usize = 64;

/// Capacity of the bounded mailbox ring (overflow is unbounded)
pub const MAILBOX_RING_CAPACITY_DEFAULT: usize = 64;

/// Maximum real-time scheduler priority accepted by the thread binder
pub const SCHED_PRIORITY_MAX: i32 = 99;

// =============================================================================
// Registry Protocol Timing
// =============================================================================

/// Interval between manager heartbeats (2 sec)
pub const HEARTBEAT_INTERVAL_MS: u64 = 2000;

/// Time without a heartbeat before a manager is reported offline (6 sec)
pub const HEARTBEAT_TIMEOUT_MS: u64 = 6000;

/// Interval between liveness sweeps on the registry service (1 sec)
pub const HEARTBEAT_CHECK_INTERVAL_MS: u64 = 1000;

/// Bound on synchronous registry RPCs (5 sec)
pub const REGISTRY_RPC_TIMEOUT_MS: u64 = 5000;

// =============================================================================
// Transport Timing
// =============================================================================

/// Receive poll timeout for bridge loops, so cancellation flags are observed
pub const WIRE_RECV_TIMEOUT_MS: u64 = 100;

// Compile-time assertions for constant validity
const _: () = {
    assert!(MSG_ID_CACHE_WIDTH <= MSG_ID_REGISTRY_MIN as usize);
    assert!(MSG_ID_REGISTRY_MIN < MSG_ID_REGISTRY_MAX);
    assert!(HEARTBEAT_TIMEOUT_MS > HEARTBEAT_INTERVAL_MS);
    assert!(HEARTBEAT_CHECK_INTERVAL_MS <= HEARTBEAT_TIMEOUT_MS);
    assert!(MAILBOX_RING_CAPACITY_DEFAULT > 0);
    assert!(SCHED_PRIORITY_MAX == 99);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_missed_heartbeats_mark_offline() {
        assert_eq!(HEARTBEAT_TIMEOUT_MS / HEARTBEAT_INTERVAL_MS, 3);
    }

    #[test]
    fn test_registry_ids_outside_cache() {
        assert!(MSG_ID_REGISTRY_MIN as usize >= MSG_ID_CACHE_WIDTH);
    }
}
