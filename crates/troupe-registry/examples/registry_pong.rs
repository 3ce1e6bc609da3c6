//! Pong process: registers `pong` with the registry and answers pings
//! from remote processes.
//!
//! Start a registry first (`cargo run -p troupe-server`), then:
//!
//! ```sh
//! cargo run -p troupe-registry --example registry_pong [tcp://localhost:5555]
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use troupe_core::define_message;
use troupe_registry::RegistryClient;
use troupe_remote::{register_wire_message, WireReceiver, WireSender};
use troupe_runtime::{handle_messages, ActorContext, Manager, NameService, RemoteSender, ThreadConfig};

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

struct PongActor;

handle_messages!(PongActor, Ping => on_ping);

impl PongActor {
    fn on_ping(&mut self, msg: &Ping, ctx: &mut ActorContext) {
        println!("PongActor: received ping {} from remote", msg.count);
        ctx.reply(Box::new(Pong { count: msg.count }));
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
    let bind_endpoint = "tcp://0.0.0.0:5001";
    let local_endpoint = "tcp://127.0.0.1:5001";

    println!("=== Registry Pong Process (port 5001) ===");
    println!("Registry: {}", registry_endpoint);

    // Register message schemas before any envelope is decoded.
    register_wire_message::<Ping>("Ping");
    register_wire_message::<Pong>("Pong");

    let client = Arc::new(
        RegistryClient::new("PongManager", &registry_endpoint).expect("registry client"),
    );
    client.start_heartbeat();

    let sender = Arc::new(WireSender::new(local_endpoint).expect("wire sender"));

    let mut mgr = Manager::new("PongManager");
    mgr.set_registry(
        Arc::clone(&client) as Arc<dyn NameService>,
        local_endpoint,
        Arc::clone(&sender) as Arc<dyn RemoteSender>,
    );
    mgr.manage("pong", PongActor, ThreadConfig::default())
        .expect("manage pong");

    let mut receiver_handle =
        WireReceiver::new(bind_endpoint, mgr.handle(), Arc::clone(&sender)).start();

    let handle = mgr.handle();
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        handle.terminate();
    })
    .expect("signal handler");

    mgr.init();
    println!("Pong process ready, 'pong' registered with the registry");
    println!("Press Ctrl+C to stop");

    mgr.run();
    receiver_handle.stop();
    mgr.end();
    client.stop_heartbeat();

    println!("=== Registry Pong Process Complete ===");
}
