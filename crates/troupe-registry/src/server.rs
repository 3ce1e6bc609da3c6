//! Registry server
//!
//! Binds a REP socket on the configured endpoint and runs the directory
//! actor under its own Manager. Each decoded request is forwarded into the
//! service mailbox with a short-lived reply slot; the correlated reply goes
//! back out on the socket. A periodic `Timeout` posted into the service
//! drives the liveness sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use zeromq::{RepSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use troupe_core::clock::{Clock, WallClock};
use troupe_core::config::RegistryConfig;
use troupe_core::constants::{REGISTRY_RPC_TIMEOUT_MS, WIRE_RECV_TIMEOUT_MS};
use troupe_core::downcast_ref;
use troupe_core::error::{Error, Result};
use troupe_core::messages::Timeout;
use troupe_runtime::{ActorRef, Envelope, Mailbox, Manager, ThreadConfig};

use crate::messages::{
    HeartbeatAck, LookupResult, RegistrationFailed, RegistrationOk, RegistryReply, RegistryRequest,
};
use crate::service::RegistryService;

/// REP front-end for the directory actor
pub struct RegistryServer {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
}

impl RegistryServer {
    /// Create a server from configuration, using the wall clock
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(WallClock::new()))
    }

    /// Create a server with an injected clock
    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag that stops the serve loop when cleared; hand it to a signal
    /// handler for graceful shutdown.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Bind the endpoint and serve until the shutdown flag clears.
    ///
    /// Returns an error if the endpoint cannot be bound.
    pub fn run(&self) -> Result<()> {
        let mut mgr = Manager::new("GlobalRegistry");
        let service = RegistryService::from_config(&self.config, Arc::clone(&self.clock));
        let service_ref = mgr.manage("GlobalRegistry", service, ThreadConfig::default())?;
        mgr.init();

        let runtime =
            Runtime::new().map_err(|e| Error::transport(format!("tokio runtime: {}", e)))?;
        let mut socket = RepSocket::new();
        runtime
            .block_on(socket.bind(&self.config.registry_endpoint))
            .map_err(|e| {
                Error::transport(format!("bind {}: {}", self.config.registry_endpoint, e))
            })?;
        info!(endpoint = %self.config.registry_endpoint, "registry listening");

        let poll = Duration::from_millis(WIRE_RECV_TIMEOUT_MS);
        let sweep_interval = self.config.heartbeat_check_interval();
        let mut last_sweep = Instant::now();

        while self.running.load(Ordering::Acquire) {
            match runtime.block_on(tokio::time::timeout(poll, socket.recv())) {
                Err(_elapsed) => {}
                Ok(Err(err)) => {
                    if self.running.load(Ordering::Acquire) {
                        error!(error = %err, "registry socket error");
                    }
                    break;
                }
                Ok(Ok(zmsg)) => {
                    let bytes = zmsg.get(0).map(|b| b.to_vec()).unwrap_or_default();
                    let reply_json = handle_request(&bytes, &service_ref);
                    if let Err(err) = runtime.block_on(socket.send(ZmqMessage::from(reply_json))) {
                        error!(error = %err, "registry reply failed");
                        break;
                    }
                }
            }

            if last_sweep.elapsed() >= sweep_interval {
                service_ref.send(Box::new(Timeout::new(0)), None);
                last_sweep = Instant::now();
            }
        }

        info!("registry shutting down");
        mgr.handle().terminate();
        mgr.run();
        mgr.end();
        Ok(())
    }
}

/// Decode one request, drive it through the service actor and serialize
/// the reply. Malformed input gets an error object so the REP socket can
/// always answer.
fn handle_request(bytes: &[u8], service_ref: &ActorRef) -> String {
    let request: RegistryRequest = match serde_json::from_slice(bytes) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "unparseable registry request");
            return error_json(&format!("unparseable request: {}", err));
        }
    };

    match dispatch_rpc(service_ref, request) {
        Some(reply) => {
            serde_json::to_string(&reply).unwrap_or_else(|err| error_json(&err.to_string()))
        }
        None => {
            warn!("registry service did not reply in time");
            error_json("registry service did not reply in time")
        }
    }
}

/// Forward a request into the service mailbox with a dedicated short-lived
/// reply slot, then wait for the correlated reply.
fn dispatch_rpc(service_ref: &ActorRef, request: RegistryRequest) -> Option<RegistryReply> {
    let slot: Arc<Mailbox<Envelope>> = Arc::new(Mailbox::with_capacity(1));
    let reply_ref = ActorRef::local(Arc::from("registry-rpc"), Arc::clone(&slot));

    let msg: Box<dyn troupe_core::Message> = match request {
        RegistryRequest::RegisterActor(msg) => Box::new(msg),
        RegistryRequest::UnregisterActor(msg) => Box::new(msg),
        RegistryRequest::LookupActor(msg) => Box::new(msg),
        RegistryRequest::Heartbeat(msg) => Box::new(msg),
    };
    service_ref.send(msg, Some(&reply_ref));

    let (envelope, _last) =
        slot.pop_timeout(Duration::from_millis(REGISTRY_RPC_TIMEOUT_MS))?;
    let reply = envelope.msg;

    if let Some(ok) = downcast_ref::<RegistrationOk>(reply.as_ref()) {
        Some(RegistryReply::RegistrationOk(ok.clone()))
    } else if let Some(failed) = downcast_ref::<RegistrationFailed>(reply.as_ref()) {
        Some(RegistryReply::RegistrationFailed(failed.clone()))
    } else if let Some(result) = downcast_ref::<LookupResult>(reply.as_ref()) {
        Some(RegistryReply::LookupResult(result.clone()))
    } else if let Some(ack) = downcast_ref::<HeartbeatAck>(reply.as_ref()) {
        Some(RegistryReply::HeartbeatAck(ack.clone()))
    } else {
        warn!(id = reply.msg_id(), "unexpected reply type from service");
        None
    }
}

fn error_json(detail: &str) -> String {
    serde_json::json!({ "error": detail }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::clock::MockClock;

    #[test]
    fn test_error_json_shape() {
        let json = error_json("boom");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"], "boom");
    }

    #[test]
    fn test_shutdown_flag_stops_run() {
        // Cleared before run(): the loop exits after the bind.
        let config = RegistryConfig {
            registry_endpoint: "tcp://127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let server = RegistryServer::with_clock(config, Arc::new(MockClock::new(0)));
        server.shutdown_flag().store(false, Ordering::Release);
        server.run().unwrap();
    }
}
