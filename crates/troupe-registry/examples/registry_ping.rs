//! Ping process: resolves `pong` through the registry and trades five
//! round trips with it.
//!
//! Start a registry and `registry_pong` first, then:
//!
//! ```sh
//! cargo run -p troupe-registry --example registry_ping [tcp://localhost:5555]
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use troupe_core::define_message;
use troupe_core::messages::Start;
use troupe_registry::RegistryClient;
use troupe_remote::{register_wire_message, WireReceiver, WireSender};
use troupe_runtime::{
    handle_messages, ActorContext, ActorRef, Manager, ManagerHandle, NameService, RemoteSender,
    ThreadConfig,
};

#[derive(Debug, Serialize, Deserialize)]
struct Ping {
    count: i32,
}
define_message!(Ping = 100);

#[derive(Debug, Serialize, Deserialize)]
struct Pong {
    count: i32,
}
define_message!(Pong = 101);

struct PingActor {
    pong_ref: ActorRef,
    handle: ManagerHandle,
}

handle_messages!(PingActor,
    Start => on_start,
    Pong => on_pong,
);

impl PingActor {
    fn on_start(&mut self, _msg: &Start, ctx: &mut ActorContext) {
        println!("PingActor: sending ping 1");
        self.pong_ref
            .send(Box::new(Ping { count: 1 }), ctx.self_ref());
    }

    fn on_pong(&mut self, msg: &Pong, ctx: &mut ActorContext) {
        println!("Received pong {}", msg.count);
        if msg.count >= 5 {
            println!("PingActor: ping-pong complete");
            self.handle.terminate();
        } else {
            self.pong_ref
                .send(Box::new(Ping { count: msg.count + 1 }), ctx.self_ref());
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let registry_endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://localhost:5555".to_string());
    let bind_endpoint = "tcp://0.0.0.0:5002";
    let local_endpoint = "tcp://127.0.0.1:5002";

    println!("=== Registry Ping Process (port 5002) ===");
    println!("Registry: {}", registry_endpoint);

    register_wire_message::<Ping>("Ping");
    register_wire_message::<Pong>("Pong");

    let client = Arc::new(
        RegistryClient::new("PingManager", &registry_endpoint).expect("registry client"),
    );
    client.start_heartbeat();

    let sender = Arc::new(WireSender::new(local_endpoint).expect("wire sender"));

    // Resolve pong through the registry, retrying while it comes up.
    let pong_endpoint = loop {
        match client.lookup("pong") {
            Ok(endpoint) => break endpoint,
            Err(err) => {
                println!("Waiting for 'pong': {}", err);
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    };
    println!("Resolved 'pong' at {}", pong_endpoint);
    let pong_ref = sender.remote_ref("pong", &pong_endpoint);

    let mut mgr = Manager::new("PingManager");
    mgr.set_registry(
        Arc::clone(&client) as Arc<dyn NameService>,
        local_endpoint,
        Arc::clone(&sender) as Arc<dyn RemoteSender>,
    );
    let handle = mgr.handle();
    mgr.manage("ping", PingActor { pong_ref, handle }, ThreadConfig::default())
        .expect("manage ping");

    let mut receiver_handle =
        WireReceiver::new(bind_endpoint, mgr.handle(), Arc::clone(&sender)).start();

    let handle = mgr.handle();
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        handle.terminate();
    })
    .expect("signal handler");

    mgr.init();
    mgr.run();
    receiver_handle.stop();
    mgr.end();
    client.stop_heartbeat();

    println!("=== Registry Ping Process Complete ===");
}
