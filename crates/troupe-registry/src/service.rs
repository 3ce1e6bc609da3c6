//! Registry directory service
//!
//! A single actor holding the name → endpoint directory and per-manager
//! heartbeat records. All mutations happen on its worker; a periodic
//! `Timeout` self-message drives the liveness sweep. Entries of a manager
//! that misses heartbeats stay in the directory and report `online=false`
//! until heartbeats resume, so recovery needs no re-registration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use troupe_core::clock::Clock;
use troupe_core::config::RegistryConfig;
use troupe_core::constants::HEARTBEAT_TIMEOUT_MS;
use troupe_core::messages::Timeout;
use troupe_runtime::{handle_messages, ActorContext};

use crate::messages::{
    Heartbeat, HeartbeatAck, LookupActor, LookupResult, RegisterActor, RegistrationFailed,
    RegistrationOk, UnregisterActor,
};

/// Directory entry for one actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorEntry {
    pub endpoint: String,
    pub manager_id: String,
}

/// Central directory actor
pub struct RegistryService {
    /// actor_name → entry; names are unique across all managers
    registry: HashMap<String, ActorEntry>,
    /// manager_id → names it registered, so offline transitions are O(1)
    /// per actor
    manager_actors: HashMap<String, HashSet<String>>,
    /// manager_id → last heartbeat, monotonic ms
    heartbeats: HashMap<String, u64>,
    /// Managers already reported offline, so the sweep logs once
    offline: HashSet<String>,
    clock: Arc<dyn Clock>,
    heartbeat_timeout_ms: u64,
}

handle_messages!(RegistryService,
    RegisterActor => on_register,
    UnregisterActor => on_unregister,
    LookupActor => on_lookup,
    Heartbeat => on_heartbeat,
    Timeout => on_sweep,
);

impl RegistryService {
    /// Create a service with the default heartbeat timeout
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_timeout(clock, HEARTBEAT_TIMEOUT_MS)
    }

    /// Create a service with an explicit heartbeat timeout
    pub fn with_timeout(clock: Arc<dyn Clock>, heartbeat_timeout_ms: u64) -> Self {
        debug_assert!(heartbeat_timeout_ms > 0);
        Self {
            registry: HashMap::new(),
            manager_actors: HashMap::new(),
            heartbeats: HashMap::new(),
            offline: HashSet::new(),
            clock,
            heartbeat_timeout_ms,
        }
    }

    /// Create a service from a configuration file
    pub fn from_config(config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_timeout(clock, config.heartbeat_timeout().as_millis() as u64)
    }

    fn touch(&mut self, manager_id: &str) {
        self.heartbeats
            .insert(manager_id.to_string(), self.clock.monotonic_ms());
        if self.offline.remove(manager_id) {
            info!(manager = manager_id, "manager back online");
        }
    }

    /// `true` while the manager's last heartbeat is within the timeout
    pub fn is_manager_online(&self, manager_id: &str) -> bool {
        match self.heartbeats.get(manager_id) {
            Some(&last_seen) => {
                self.clock.monotonic_ms().saturating_sub(last_seen) <= self.heartbeat_timeout_ms
            }
            None => false,
        }
    }

    fn on_register(&mut self, msg: &RegisterActor, ctx: &mut ActorContext) {
        if let Some(existing) = self.registry.get(&msg.actor_name) {
            if existing.manager_id != msg.manager_id {
                warn!(
                    actor = %msg.actor_name,
                    owner = %existing.manager_id,
                    requester = %msg.manager_id,
                    "registration rejected"
                );
                ctx.reply(Box::new(RegistrationFailed {
                    actor_name: msg.actor_name.clone(),
                    reason: "name taken".to_string(),
                }));
                return;
            }
        }

        // Same-manager re-registration is an idempotent atomic replace.
        self.registry.insert(
            msg.actor_name.clone(),
            ActorEntry {
                endpoint: msg.actor_endpoint.clone(),
                manager_id: msg.manager_id.clone(),
            },
        );
        self.manager_actors
            .entry(msg.manager_id.clone())
            .or_default()
            .insert(msg.actor_name.clone());
        // Registration counts as a heartbeat.
        self.touch(&msg.manager_id);

        info!(actor = %msg.actor_name, manager = %msg.manager_id, endpoint = %msg.actor_endpoint, "registered");
        ctx.reply(Box::new(RegistrationOk {
            actor_name: msg.actor_name.clone(),
        }));
    }

    fn on_unregister(&mut self, msg: &UnregisterActor, ctx: &mut ActorContext) {
        if let Some(entry) = self.registry.remove(&msg.actor_name) {
            if let Some(names) = self.manager_actors.get_mut(&entry.manager_id) {
                names.remove(&msg.actor_name);
            }
            info!(actor = %msg.actor_name, "unregistered");
        }
        // Absence is not an error; the reply is the same either way.
        ctx.reply(Box::new(RegistrationOk {
            actor_name: msg.actor_name.clone(),
        }));
    }

    fn on_lookup(&mut self, msg: &LookupActor, ctx: &mut ActorContext) {
        let reply = match self.registry.get(&msg.actor_name) {
            None => LookupResult {
                actor_name: msg.actor_name.clone(),
                endpoint: None,
                online: false,
            },
            Some(entry) => LookupResult {
                actor_name: msg.actor_name.clone(),
                endpoint: Some(entry.endpoint.clone()),
                online: self.is_manager_online(&entry.manager_id),
            },
        };
        ctx.reply(Box::new(reply));
    }

    fn on_heartbeat(&mut self, msg: &Heartbeat, ctx: &mut ActorContext) {
        self.touch(&msg.manager_id);
        ctx.reply(Box::new(HeartbeatAck {}));
    }

    /// Liveness sweep. Stale managers are logged once; their entries stay
    /// in the directory and report `online=false` on lookup.
    fn on_sweep(&mut self, _msg: &Timeout, _ctx: &mut ActorContext) {
        let now = self.clock.monotonic_ms();
        for (manager_id, &last_seen) in &self.heartbeats {
            if now.saturating_sub(last_seen) > self.heartbeat_timeout_ms
                && !self.offline.contains(manager_id)
            {
                let actor_count = self
                    .manager_actors
                    .get(manager_id)
                    .map_or(0, HashSet::len);
                warn!(
                    manager = %manager_id,
                    actors = actor_count,
                    "manager missed heartbeats; its actors will report offline"
                );
                self.offline.insert(manager_id.clone());
            }
        }
    }

    /// All registered actor names
    pub fn actor_names(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    /// All manager ids that registered at least one actor
    pub fn manager_ids(&self) -> Vec<String> {
        self.manager_actors.keys().cloned().collect()
    }

    /// Directory entry for a name
    pub fn entry(&self, actor_name: &str) -> Option<&ActorEntry> {
        self.registry.get(actor_name)
    }
}
