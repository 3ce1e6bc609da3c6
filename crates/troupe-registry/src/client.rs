//! Registry client
//!
//! Two isolated concerns: a background heartbeat loop that keeps this
//! manager marked online, and synchronous request/reply RPCs for
//! registration and lookup. Heartbeat transport errors are logged and
//! swallowed; RPCs surface typed errors with a bounded timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, error, warn};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use troupe_core::clock::{Clock, WallClock};
use troupe_core::constants::{HEARTBEAT_INTERVAL_MS, REGISTRY_RPC_TIMEOUT_MS};
use troupe_core::error::{Error, Result};
use troupe_runtime::NameService;

use crate::messages::{
    Heartbeat, LookupActor, RegisterActor, RegistryReply, RegistryRequest, UnregisterActor,
};

/// Client side of the registry protocol
pub struct RegistryClient {
    manager_id: String,
    registry_endpoint: String,
    runtime: Runtime,
    socket: Mutex<Option<ReqSocket>>,
    running: Arc<AtomicBool>,
    heartbeat_thread: Mutex<Option<JoinHandle<()>>>,
    clock: Arc<dyn Clock>,
    rpc_timeout: Duration,
}

impl RegistryClient {
    /// Create a client for `manager_id` talking to `registry_endpoint`
    pub fn new(manager_id: &str, registry_endpoint: &str) -> Result<Self> {
        let runtime =
            Runtime::new().map_err(|e| Error::transport(format!("tokio runtime: {}", e)))?;
        Ok(Self {
            manager_id: manager_id.to_string(),
            registry_endpoint: registry_endpoint.to_string(),
            runtime,
            socket: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            heartbeat_thread: Mutex::new(None),
            clock: Arc::new(WallClock::new()),
            rpc_timeout: Duration::from_millis(REGISTRY_RPC_TIMEOUT_MS),
        })
    }

    /// The manager identity carried in heartbeats and registrations
    pub fn manager_id(&self) -> &str {
        &self.manager_id
    }

    /// Start posting `Heartbeat` every two seconds until stopped.
    ///
    /// The loop owns a dedicated socket and reconnects after any transport
    /// error; failures never propagate to callers.
    pub fn start_heartbeat(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return; // already running
        }

        let manager_id = self.manager_id.clone();
        let endpoint = self.registry_endpoint.clone();
        let running = Arc::clone(&self.running);
        let clock = Arc::clone(&self.clock);

        let thread = std::thread::Builder::new()
            .name("registry-heartbeat".to_string())
            .spawn(move || heartbeat_loop(&manager_id, &endpoint, &running, clock.as_ref()))
            .expect("failed to spawn heartbeat thread");

        *self.heartbeat_thread.lock() = Some(thread);
    }

    /// Stop the heartbeat loop and join its thread
    pub fn stop_heartbeat(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.heartbeat_thread.lock().take() {
            let _ = thread.join();
        }
    }

    fn send_recv(&self, request: &RegistryRequest) -> Result<RegistryReply> {
        let json = serde_json::to_string(request)
            .map_err(|e| Error::transport(format!("request encode: {}", e)))?;

        let mut guard = self.socket.lock();
        if guard.is_none() {
            let endpoint = self.registry_endpoint.clone();
            let socket = self.runtime.block_on(async {
                let mut socket = ReqSocket::new();
                socket
                    .connect(&endpoint)
                    .await
                    .map_err(|e| Error::transport(format!("connect {}: {}", endpoint, e)))?;
                // Let the connection establish before the first request.
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<ReqSocket, Error>(socket)
            })?;
            *guard = Some(socket);
        }
        let socket = guard.as_mut().expect("socket just connected");

        let outcome = self.runtime.block_on(tokio::time::timeout(
            self.rpc_timeout,
            async {
                socket
                    .send(ZmqMessage::from(json))
                    .await
                    .map_err(|e| Error::transport(format!("send: {}", e)))?;
                let reply = socket
                    .recv()
                    .await
                    .map_err(|e| Error::transport(format!("recv: {}", e)))?;
                let bytes = reply.get(0).map(|b| b.to_vec()).unwrap_or_default();
                serde_json::from_slice::<RegistryReply>(&bytes)
                    .map_err(|e| Error::transport(format!("reply decode: {}", e)))
            },
        ));

        match outcome {
            Ok(result) => {
                if result.is_err() {
                    // The REQ state machine is broken; reconnect next call.
                    *guard = None;
                }
                result
            }
            Err(_elapsed) => {
                *guard = None;
                Err(Error::timeout(format!(
                    "no response from registry within {:?}",
                    self.rpc_timeout
                )))
            }
        }
    }

    /// Register `actor_name` as reachable at `endpoint`
    pub fn register(&self, actor_name: &str, endpoint: &str) -> Result<()> {
        let request = RegistryRequest::RegisterActor(RegisterActor {
            manager_id: self.manager_id.clone(),
            actor_name: actor_name.to_string(),
            actor_endpoint: endpoint.to_string(),
        });

        match self.send_recv(&request)? {
            RegistryReply::RegistrationOk(_) => Ok(()),
            RegistryReply::RegistrationFailed(failed) => {
                Err(Error::registration_failed(failed.actor_name, failed.reason))
            }
            other => Err(Error::transport(format!(
                "unexpected registration response: {:?}",
                other
            ))),
        }
    }

    /// Remove `actor_name` from the directory
    pub fn unregister(&self, actor_name: &str) -> Result<()> {
        let request = RegistryRequest::UnregisterActor(UnregisterActor {
            actor_name: actor_name.to_string(),
        });
        self.send_recv(&request).map(|_| ())
    }

    /// Resolve `actor_name` to an endpoint.
    ///
    /// Errors with `ActorNotFound` when the name is absent and
    /// `ActorOffline` when the owning manager has missed heartbeats.
    pub fn lookup(&self, actor_name: &str) -> Result<String> {
        let request = RegistryRequest::LookupActor(LookupActor {
            actor_name: actor_name.to_string(),
        });

        match self.send_recv(&request)? {
            RegistryReply::LookupResult(result) => match result.endpoint {
                None => Err(Error::actor_not_found(actor_name)),
                Some(endpoint) => {
                    if result.online {
                        Ok(endpoint)
                    } else {
                        Err(Error::actor_offline(actor_name))
                    }
                }
            },
            other => Err(Error::transport(format!(
                "unexpected lookup response: {:?}",
                other
            ))),
        }
    }

    /// Resolve `actor_name`, returning the endpoint and online flag even
    /// when the owning manager is offline. Use when attempting to reach a
    /// potentially recovering actor.
    pub fn lookup_allow_offline(&self, actor_name: &str) -> Result<(String, bool)> {
        let request = RegistryRequest::LookupActor(LookupActor {
            actor_name: actor_name.to_string(),
        });

        match self.send_recv(&request)? {
            RegistryReply::LookupResult(result) => match result.endpoint {
                None => Err(Error::actor_not_found(actor_name)),
                Some(endpoint) => Ok((endpoint, result.online)),
            },
            other => Err(Error::transport(format!(
                "unexpected lookup response: {:?}",
                other
            ))),
        }
    }
}

impl NameService for RegistryClient {
    fn register_actor(&self, actor_name: &str, endpoint: &str) -> Result<()> {
        self.register(actor_name, endpoint)
    }

    fn unregister_actor(&self, actor_name: &str) -> Result<()> {
        self.unregister(actor_name)
    }

    fn lookup(&self, actor_name: &str) -> Result<String> {
        RegistryClient::lookup(self, actor_name)
    }

    fn lookup_allow_offline(&self, actor_name: &str) -> Result<(String, bool)> {
        RegistryClient::lookup_allow_offline(self, actor_name)
    }
}

impl Drop for RegistryClient {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

fn heartbeat_loop(manager_id: &str, endpoint: &str, running: &AtomicBool, clock: &dyn Clock) {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "heartbeat loop could not create a runtime");
            return;
        }
    };

    runtime.block_on(async {
        let mut socket: Option<ReqSocket> = None;

        while running.load(Ordering::Acquire) {
            if socket.is_none() {
                let mut fresh = ReqSocket::new();
                match fresh.connect(endpoint).await {
                    Ok(_) => {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        socket = Some(fresh);
                    }
                    Err(err) => {
                        warn!(endpoint, error = %err, "heartbeat connect failed");
                    }
                }
            }

            if let Some(active) = socket.as_mut() {
                let request = RegistryRequest::Heartbeat(Heartbeat {
                    manager_id: manager_id.to_string(),
                    timestamp_ms: clock.now_ms(),
                });
                let sent = match serde_json::to_string(&request) {
                    Ok(json) => active.send(ZmqMessage::from(json)).await.is_ok(),
                    Err(_) => false,
                };
                let acked = sent
                    && tokio::time::timeout(
                        Duration::from_millis(REGISTRY_RPC_TIMEOUT_MS),
                        active.recv(),
                    )
                    .await
                    .map(|r| r.is_ok())
                    .unwrap_or(false);
                if !acked {
                    debug!(endpoint, "heartbeat missed; reconnecting");
                    socket = None;
                }
            }

            // Sleep in short slices so stop_heartbeat is prompt.
            let mut slept_ms = 0;
            while slept_ms < HEARTBEAT_INTERVAL_MS && running.load(Ordering::Acquire) {
                tokio::time::sleep(Duration::from_millis(100)).await;
                slept_ms += 100;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = RegistryClient::new("TestManager", "tcp://127.0.0.1:5555").unwrap();
        assert_eq!(client.manager_id(), "TestManager");
        assert_eq!(client.registry_endpoint, "tcp://127.0.0.1:5555");
    }

    #[test]
    fn test_stop_heartbeat_without_start_is_noop() {
        let client = RegistryClient::new("TestManager", "tcp://127.0.0.1:5555").unwrap();
        client.stop_heartbeat();
    }

    #[test]
    fn test_heartbeat_request_format() {
        let request = RegistryRequest::Heartbeat(Heartbeat {
            manager_id: "TestManager".to_string(),
            timestamp_ms: 42,
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message_type"], "Heartbeat");
        assert_eq!(value["manager_id"], "TestManager");
        assert!(value["timestamp_ms"].as_u64().unwrap() > 0);
    }
}
