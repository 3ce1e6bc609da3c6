//! Outbound wire sender
//!
//! Multiplexes outbound messages onto one long-lived PUSH socket per remote
//! endpoint. Sockets are created lazily and cached; the async socket
//! implementation is driven from synchronous threads through an owned tokio
//! runtime. Sends are fire-and-forget: failures are logged, never raised.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::warn;
use zeromq::{PushSocket, Socket, SocketSend, ZmqMessage};

use troupe_core::error::{Error, Result};
use troupe_core::message::Message;
use troupe_runtime::{ActorRef, RemoteSender};

use crate::wire;

/// PUSH-socket sender, one socket per remote endpoint
pub struct WireSender {
    runtime: Runtime,
    local_endpoint: Option<String>,
    sockets: Mutex<HashMap<String, PushSocket>>,
}

impl WireSender {
    /// Create a sender that stamps `local_endpoint` into outbound
    /// envelopes so remote sides can construct a reverse reference.
    pub fn new(local_endpoint: &str) -> Result<Self> {
        let runtime =
            Runtime::new().map_err(|e| Error::transport(format!("tokio runtime: {}", e)))?;
        Ok(Self {
            runtime,
            local_endpoint: Some(local_endpoint.to_string()),
            sockets: Mutex::new(HashMap::new()),
        })
    }

    /// Create a sender for processes that accept no inbound traffic
    pub fn send_only() -> Result<Self> {
        let runtime =
            Runtime::new().map_err(|e| Error::transport(format!("tokio runtime: {}", e)))?;
        Ok(Self {
            runtime,
            local_endpoint: None,
            sockets: Mutex::new(HashMap::new()),
        })
    }

    /// Build a remote reference that transmits through this sender
    pub fn remote_ref(self: &Arc<Self>, name: &str, endpoint: &str) -> ActorRef {
        ActorRef::remote(name, endpoint, Arc::clone(self) as Arc<dyn RemoteSender>)
    }

    fn transmit(&self, endpoint: &str, payload: String) -> Result<()> {
        let mut sockets = self.sockets.lock();

        if !sockets.contains_key(endpoint) {
            let socket = self.runtime.block_on(async {
                let mut socket = PushSocket::new();
                socket
                    .connect(endpoint)
                    .await
                    .map_err(|e| Error::transport(format!("connect {}: {}", endpoint, e)))?;
                Ok::<PushSocket, Error>(socket)
            })?;
            sockets.insert(endpoint.to_string(), socket);
        }

        let socket = sockets.get_mut(endpoint).expect("socket just inserted");
        self.runtime
            .block_on(socket.send(ZmqMessage::from(payload)))
            .map_err(|e| Error::transport(format!("send to {}: {}", endpoint, e)))
    }
}

impl RemoteSender for WireSender {
    fn send_to(
        &self,
        endpoint: &str,
        receiver: &str,
        msg: Box<dyn Message>,
        from: Option<&ActorRef>,
    ) {
        let sender_actor = from.map(|r| r.name().to_string());
        // A message forwarded on behalf of a remote sender keeps that
        // sender's endpoint, so replies go back to the origin.
        let sender_endpoint = match from {
            Some(ActorRef::Remote { endpoint, .. }) => Some(endpoint.to_string()),
            _ => self.local_endpoint.clone(),
        };

        let json = match wire::global().encode_envelope(
            receiver,
            msg.as_ref(),
            sender_actor.as_deref(),
            sender_endpoint.as_deref(),
        ) {
            Ok(json) => json,
            Err(err) => {
                warn!(receiver, error = %err, "dropping unencodable message");
                return;
            }
        };

        if let Err(err) = self.transmit(endpoint, json) {
            warn!(endpoint, receiver, error = %err, "wire send failed");
        }
    }

    fn local_endpoint(&self) -> Option<String> {
        self.local_endpoint.clone()
    }
}
