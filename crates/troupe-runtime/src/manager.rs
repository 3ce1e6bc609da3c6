//! Actor lifecycle manager
//!
//! The Manager owns a set of actors and their worker threads. It binds each
//! actor to a mailbox at `manage` time, posts `Start` and spawns the workers
//! in `init`, processes its own control mailbox in `run`, and joins every
//! worker in `end`. When a name service is attached, managed actors are
//! auto-registered so other processes can find them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use troupe_core::constants::ACTOR_NAME_LENGTH_BYTES_MAX;
use troupe_core::error::{Error, Result};
use troupe_core::message::downcast_ref;
use troupe_core::messages::{Shutdown, Start};

use crate::actor::{Actor, ActorCell, Worker};
use crate::actor_ref::{ActorRef, Envelope, RemoteSender};
use crate::mailbox::Mailbox;
use crate::thread_bind::{bind_current_thread, ThreadConfig};

/// Synchronous facade over the registry, implemented by the registry client.
///
/// Defined here so the Manager can resolve names without depending on a
/// concrete registry transport.
pub trait NameService: Send + Sync {
    /// Register `actor_name` as reachable at `endpoint`
    fn register_actor(&self, actor_name: &str, endpoint: &str) -> Result<()>;

    /// Remove `actor_name` from the directory
    fn unregister_actor(&self, actor_name: &str) -> Result<()>;

    /// Resolve `actor_name` to an endpoint; errors if absent or offline
    fn lookup(&self, actor_name: &str) -> Result<String>;

    /// Resolve `actor_name` even when its manager is offline
    fn lookup_allow_offline(&self, actor_name: &str) -> Result<(String, bool)>;
}

struct RegistryBinding {
    service: Arc<dyn NameService>,
    local_endpoint: String,
    sender: Arc<dyn RemoteSender>,
}

struct ManagerShared {
    name_map: RwLock<HashMap<String, ActorRef>>,
    registry: RwLock<Option<RegistryBinding>>,
}

impl ManagerShared {
    fn get_actor_by_name(&self, name: &str) -> Result<ActorRef> {
        if let Some(actor_ref) = self.name_map.read().get(name) {
            return Ok(actor_ref.clone());
        }

        if let Some(binding) = self.registry.read().as_ref() {
            let endpoint = binding.service.lookup(name)?;
            return Ok(ActorRef::remote(name, &endpoint, Arc::clone(&binding.sender)));
        }

        Err(Error::actor_not_found(name))
    }
}

/// Cloneable handle for interacting with a running Manager
#[derive(Clone)]
pub struct ManagerHandle {
    manager_id: Arc<str>,
    mailbox: Arc<Mailbox<Envelope>>,
    shared: Arc<ManagerShared>,
}

impl ManagerHandle {
    /// Manager id, used as the registry heartbeat identity
    pub fn manager_id(&self) -> &str {
        &self.manager_id
    }

    /// Post `Shutdown` to the manager, triggering orderly teardown
    pub fn terminate(&self) {
        let target = ActorRef::local(Arc::clone(&self.manager_id), Arc::clone(&self.mailbox));
        target.send(Box::new(Shutdown {}), None);
    }

    /// Find an actor by name: local map first, then the registry.
    ///
    /// Local hits return a `Local` ref; registry hits return a `Remote` ref
    /// built from the discovered endpoint.
    pub fn get_actor_by_name(&self, name: &str) -> Result<ActorRef> {
        self.shared.get_actor_by_name(name)
    }

    /// Find a local actor by name, without consulting the registry
    pub fn get_local_actor(&self, name: &str) -> Option<ActorRef> {
        self.shared.name_map.read().get(name).cloned()
    }
}

struct Registration {
    name: Arc<str>,
    cell: Option<Box<dyn Worker>>,
    config: ThreadConfig,
    mailbox: Arc<Mailbox<Envelope>>,
    terminated: Arc<AtomicBool>,
    msg_count: Arc<AtomicU64>,
    replies_dropped: Arc<AtomicU64>,
}

/// Lifecycle controller for a group of actors in one process
pub struct Manager {
    manager_id: Arc<str>,
    actors: Vec<Registration>,
    threads: Vec<JoinHandle<()>>,
    mailbox: Arc<Mailbox<Envelope>>,
    terminated: AtomicBool,
    initialized: bool,
    shared: Arc<ManagerShared>,
}

impl Manager {
    /// Create a manager with the given id.
    ///
    /// The id identifies this process to the registry: heartbeats and
    /// registrations carry it.
    pub fn new(manager_id: &str) -> Self {
        Self {
            manager_id: Arc::from(manager_id),
            actors: Vec::new(),
            threads: Vec::new(),
            mailbox: Arc::new(Mailbox::new()),
            terminated: AtomicBool::new(false),
            initialized: false,
            shared: Arc::new(ManagerShared {
                name_map: RwLock::new(HashMap::new()),
                registry: RwLock::new(None),
            }),
        }
    }

    /// Handle for actors and other threads to interact with this manager
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            manager_id: Arc::clone(&self.manager_id),
            mailbox: Arc::clone(&self.mailbox),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Attach a name service so managed actors are auto-registered and
    /// `get_actor_by_name` can resolve remote names.
    ///
    /// Call before `manage` so every actor is registered. The service's
    /// heartbeat loop keeps this manager marked online; `sender` builds the
    /// remote refs returned by lookups, and `local_endpoint` is the address
    /// other processes use to reach actors managed here.
    pub fn set_registry(
        &mut self,
        service: Arc<dyn NameService>,
        local_endpoint: &str,
        sender: Arc<dyn RemoteSender>,
    ) {
        *self.shared.registry.write() = Some(RegistryBinding {
            service,
            local_endpoint: local_endpoint.to_string(),
            sender,
        });
    }

    /// Register an actor to be managed.
    ///
    /// Records the actor under `name`, binds it to a fresh mailbox and
    /// stores the thread binding hints. If a registry is attached the actor
    /// is registered synchronously; a registration failure is logged but
    /// does not prevent local management.
    pub fn manage<A: Actor>(
        &mut self,
        name: &str,
        actor: A,
        config: ThreadConfig,
    ) -> Result<ActorRef> {
        debug_assert!(!self.initialized, "manage() must be called before init()");

        if name.is_empty() || name.len() > ACTOR_NAME_LENGTH_BYTES_MAX {
            return Err(Error::invalid_configuration(
                "actor name",
                format!("length must be 1..={} bytes", ACTOR_NAME_LENGTH_BYTES_MAX),
            ));
        }
        if self.shared.name_map.read().contains_key(name) {
            return Err(Error::name_taken(name));
        }
        config.validate()?;

        let name: Arc<str> = Arc::from(name);
        let mailbox = Arc::new(Mailbox::new());
        let terminated = Arc::new(AtomicBool::new(false));
        let msg_count = Arc::new(AtomicU64::new(0));
        let replies_dropped = Arc::new(AtomicU64::new(0));

        let cell = ActorCell::new(
            Arc::clone(&name),
            actor,
            Arc::clone(&mailbox),
            Arc::clone(&terminated),
            Arc::clone(&msg_count),
            Arc::clone(&replies_dropped),
        );

        let actor_ref = ActorRef::local(Arc::clone(&name), Arc::clone(&mailbox));
        self.shared
            .name_map
            .write()
            .insert(name.to_string(), actor_ref.clone());

        self.actors.push(Registration {
            name: Arc::clone(&name),
            cell: Some(Box::new(cell)),
            config,
            mailbox,
            terminated,
            msg_count,
            replies_dropped,
        });

        if let Some(binding) = self.shared.registry.read().as_ref() {
            match binding
                .service
                .register_actor(&name, &binding.local_endpoint)
            {
                Ok(()) => info!(actor = %name, endpoint = %binding.local_endpoint, "registered with registry"),
                Err(err) => warn!(actor = %name, error = %err, "registry registration failed"),
            }
        }

        debug!(actor = %name, "actor managed");
        Ok(actor_ref)
    }

    /// Start all managed actors.
    ///
    /// Posts `Start` to every actor ahead of any user traffic, then spawns
    /// one worker thread per actor and applies its binding hints. Threads
    /// are never detached; `end` joins them.
    pub fn init(&mut self) {
        debug_assert!(!self.initialized, "init() called twice");
        self.initialized = true;

        for registration in &self.actors {
            let target = ActorRef::local(
                Arc::clone(&registration.name),
                Arc::clone(&registration.mailbox),
            );
            debug!(actor = %registration.name, "sending start");
            target.send(Box::new(Start {}), None);
        }

        for registration in &mut self.actors {
            let mut cell = registration
                .cell
                .take()
                .expect("worker already taken for this actor");
            let name = Arc::clone(&registration.name);
            let config = registration.config.clone();

            let handle = std::thread::Builder::new()
                .name(format!("actor-{}", name))
                .spawn(move || {
                    bind_current_thread(&name, &config);
                    cell.run();
                })
                .expect("failed to spawn actor worker thread");
            self.threads.push(handle);
        }

        // The manager is itself an actor: it gets a Start too.
        let own = ActorRef::local(Arc::clone(&self.manager_id), Arc::clone(&self.mailbox));
        own.send(Box::new(Start {}), None);

        info!(manager = %self.manager_id, actors = self.actors.len(), "manager initialized");
    }

    /// Process the manager's own mailbox until terminated.
    ///
    /// Blocks the calling thread. `Shutdown` (posted via
    /// [`ManagerHandle::terminate`] or from the wire) tears down every
    /// managed actor and returns.
    pub fn run(&mut self) {
        while !self.terminated.load(Ordering::Acquire) {
            let Some((envelope, _last)) = self.mailbox.pop() else {
                break;
            };
            let msg = envelope.msg;

            if downcast_ref::<Shutdown>(msg.as_ref()).is_some() {
                info!(manager = %self.manager_id, "shutdown received");
                self.shutdown_managed();
                self.terminated.store(true, Ordering::Release);
            } else if downcast_ref::<Start>(msg.as_ref()).is_some() {
                debug!(manager = %self.manager_id, "manager started");
            } else {
                debug!(manager = %self.manager_id, id = msg.msg_id(), "manager ignoring message");
            }
        }
    }

    /// Wait for all actor workers to finish
    pub fn end(&mut self) {
        for handle in self.threads.drain(..) {
            if let Err(err) = handle.join() {
                warn!(manager = %self.manager_id, "worker panicked: {:?}", err);
            }
        }
        info!(manager = %self.manager_id, "all workers joined");
    }

    fn shutdown_managed(&self) {
        let binding = self.shared.registry.read();
        for registration in &self.actors {
            if let Some(binding) = binding.as_ref() {
                if let Err(err) = binding.service.unregister_actor(&registration.name) {
                    debug!(actor = %registration.name, error = %err, "unregister failed");
                }
            }
            registration.terminated.store(true, Ordering::Release);
            registration.mailbox.close();
        }
        self.mailbox.close();
    }

    /// Find an actor by name: local map first, then the registry
    pub fn get_actor_by_name(&self, name: &str) -> Result<ActorRef> {
        self.shared.get_actor_by_name(name)
    }

    /// Find a local actor by name, without consulting the registry
    pub fn get_local_actor(&self, name: &str) -> Option<ActorRef> {
        self.shared.name_map.read().get(name).cloned()
    }

    /// Names of all managed actors
    pub fn managed_names(&self) -> Vec<String> {
        self.actors.iter().map(|r| r.name.to_string()).collect()
    }

    /// Total pending messages across all actors, for backpressure monitoring
    pub fn total_queue_length(&self) -> usize {
        self.actors.iter().map(|r| r.mailbox.len()).sum()
    }

    /// Pending message count per actor
    pub fn queue_lengths(&self) -> BTreeMap<String, usize> {
        self.actors
            .iter()
            .map(|r| (r.name.to_string(), r.mailbox.len()))
            .collect()
    }

    /// Processed message count per actor
    pub fn message_counts(&self) -> BTreeMap<String, u64> {
        self.actors
            .iter()
            .map(|r| (r.name.to_string(), r.msg_count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Replies dropped for lack of a sender, per actor
    pub fn replies_dropped(&self) -> BTreeMap<String, u64> {
        self.actors
            .iter()
            .map(|r| {
                (
                    r.name.to_string(),
                    r.replies_dropped.load(Ordering::Relaxed),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorContext;
    use crate::handle_messages;
    use troupe_core::define_message;
    use troupe_core::message::Message;

    struct Nudge {}
    define_message!(Nudge = 30);

    struct Idle {}
    handle_messages!(Idle, Start => on_start);

    impl Idle {
        fn on_start(&mut self, _msg: &Start, _ctx: &mut ActorContext) {}
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut mgr = Manager::new("TestManager");
        mgr.manage("idle", Idle {}, ThreadConfig::default()).unwrap();

        let err = mgr
            .manage("idle", Idle {}, ThreadConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::NameTaken { .. }));
    }

    #[test]
    fn test_lifecycle_init_terminate_end() {
        let mut mgr = Manager::new("TestManager");
        mgr.manage("idle", Idle {}, ThreadConfig::default()).unwrap();

        mgr.init();

        // Wait for the worker to process its Start before tearing down;
        // fast_terminate does not drain.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while mgr.message_counts()["idle"] < 1 {
            assert!(std::time::Instant::now() < deadline, "worker never started");
            std::thread::yield_now();
        }

        let handle = mgr.handle();
        handle.terminate();
        mgr.run();
        mgr.end();

        assert_eq!(mgr.message_counts()["idle"], 1); // the Start message
    }

    #[test]
    fn test_local_lookup() {
        let mut mgr = Manager::new("TestManager");
        let managed_ref = mgr.manage("idle", Idle {}, ThreadConfig::default()).unwrap();

        let found = mgr.get_actor_by_name("idle").unwrap();
        assert!(found.is_local());
        assert_eq!(found.name(), managed_ref.name());

        let err = mgr.get_actor_by_name("missing").unwrap_err();
        assert!(matches!(err, Error::ActorNotFound { .. }));
    }

    struct StubNameService;

    impl NameService for StubNameService {
        fn register_actor(&self, _actor_name: &str, _endpoint: &str) -> Result<()> {
            Ok(())
        }

        fn unregister_actor(&self, _actor_name: &str) -> Result<()> {
            Ok(())
        }

        fn lookup(&self, actor_name: &str) -> Result<String> {
            match actor_name {
                "pong" => Ok("tcp://127.0.0.1:5001".to_string()),
                _ => Err(Error::actor_not_found(actor_name)),
            }
        }

        fn lookup_allow_offline(&self, actor_name: &str) -> Result<(String, bool)> {
            self.lookup(actor_name).map(|ep| (ep, true))
        }
    }

    struct NullSender;

    impl RemoteSender for NullSender {
        fn send_to(
            &self,
            _endpoint: &str,
            _receiver: &str,
            _msg: Box<dyn Message>,
            _from: Option<&ActorRef>,
        ) {
        }

        fn local_endpoint(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_registry_lookup_builds_remote_ref() {
        let mut mgr = Manager::new("TestManager");
        mgr.set_registry(
            Arc::new(StubNameService),
            "tcp://127.0.0.1:5002",
            Arc::new(NullSender),
        );

        let found = mgr.get_actor_by_name("pong").unwrap();
        assert!(found.is_remote());
        assert_eq!(found.endpoint(), Some("tcp://127.0.0.1:5001"));

        let err = mgr.get_actor_by_name("missing").unwrap_err();
        assert!(matches!(err, Error::ActorNotFound { .. }));
    }

    #[test]
    fn test_queue_length_monitoring() {
        let mut mgr = Manager::new("TestManager");
        let idle_ref = mgr.manage("idle", Idle {}, ThreadConfig::default()).unwrap();

        idle_ref.send(Box::new(Nudge {}), None);
        idle_ref.send(Box::new(Nudge {}), None);

        assert_eq!(mgr.total_queue_length(), 2);
        assert_eq!(mgr.queue_lengths()["idle"], 2);
    }
}
