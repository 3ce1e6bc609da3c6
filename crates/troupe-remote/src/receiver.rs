//! Inbound wire bridge
//!
//! Binds a PULL socket on the local endpoint, decodes inbound envelopes,
//! resolves the receiver name to a local actor through the Manager, and
//! enqueues the message with the sender synthesized as a remote reference.
//! Unknown receivers and unknown message types elicit a best-effort
//! `Reject` back to the envelope's sender.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use zeromq::{PullSocket, Socket, SocketRecv};

use troupe_core::constants::WIRE_RECV_TIMEOUT_MS;
use troupe_core::messages::Reject;
use troupe_runtime::{ActorRef, ManagerHandle};

use crate::sender::WireSender;
use crate::wire;

/// PULL-socket bridge from the wire into local mailboxes
pub struct WireReceiver {
    bind_endpoint: String,
    manager: ManagerHandle,
    sender: Arc<WireSender>,
}

/// Join handle for a running receiver; stops the loop on drop
pub struct WireReceiverHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WireReceiver {
    /// Create a receiver that bridges `bind_endpoint` into the actors
    /// managed by `manager`. Replies and rejects go out through `sender`.
    pub fn new(bind_endpoint: &str, manager: ManagerHandle, sender: Arc<WireSender>) -> Self {
        Self {
            bind_endpoint: bind_endpoint.to_string(),
            manager,
            sender,
        }
    }

    /// Spawn the bridge thread
    pub fn start(self) -> WireReceiverHandle {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("wire-receiver".to_string())
            .spawn(move || self.run(flag))
            .expect("failed to spawn wire receiver thread");

        WireReceiverHandle {
            running,
            thread: Some(thread),
        }
    }

    fn run(self, running: Arc<AtomicBool>) {
        let runtime = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(error = %err, "wire receiver could not create a runtime");
                return;
            }
        };

        let mut socket = PullSocket::new();
        if let Err(err) = runtime.block_on(socket.bind(&self.bind_endpoint)) {
            error!(endpoint = %self.bind_endpoint, error = %err, "wire receiver bind failed");
            return;
        }
        info!(endpoint = %self.bind_endpoint, "wire receiver listening");

        // Bounded receive so the cancellation flag is observed promptly.
        let poll = Duration::from_millis(WIRE_RECV_TIMEOUT_MS);
        while running.load(Ordering::Acquire) {
            match runtime.block_on(tokio::time::timeout(poll, socket.recv())) {
                Err(_elapsed) => continue,
                Ok(Err(err)) => {
                    if running.load(Ordering::Acquire) {
                        error!(error = %err, "wire receiver socket error");
                    }
                    break;
                }
                Ok(Ok(zmsg)) => {
                    let bytes = zmsg.get(0).map(|b| b.to_vec()).unwrap_or_default();
                    match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle_inbound(text),
                        Err(_) => warn!("discarding non-UTF-8 frame"),
                    }
                }
            }
        }
        info!(endpoint = %self.bind_endpoint, "wire receiver stopped");
    }

    fn handle_inbound(&self, text: &str) {
        let envelope = match wire::decode_envelope(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "discarding undecodable envelope");
                return;
            }
        };

        // Synthesize the sender so the target can reply across the wire.
        let sender_ref: Option<ActorRef> =
            match (&envelope.sender_actor, &envelope.sender_endpoint) {
                (Some(actor), Some(endpoint)) => Some(self.sender.remote_ref(actor, endpoint)),
                _ => None,
            };

        let msg = match wire::global().decode_message(&envelope) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(message_type = %envelope.message_type, error = %err, "discarding inbound message");
                if let Some(sender_ref) = &sender_ref {
                    sender_ref.send(
                        Box::new(Reject {
                            message_type: envelope.message_type.clone(),
                            reason: err.to_string(),
                            rejected_by: envelope.receiver.clone(),
                        }),
                        None,
                    );
                }
                return;
            }
        };

        match self.manager.get_local_actor(&envelope.receiver) {
            Some(target) => target.send(msg, sender_ref.as_ref()),
            None => {
                warn!(receiver = %envelope.receiver, "unknown receiver");
                if let Some(sender_ref) = &sender_ref {
                    sender_ref.send(Box::new(wire::reject_for(&envelope)), None);
                }
            }
        }
    }
}

impl WireReceiverHandle {
    /// Stop the bridge and join its thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WireReceiverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
