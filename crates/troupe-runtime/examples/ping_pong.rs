//! Local ping-pong: two actors under one Manager trade five round trips,
//! then terminate the process cleanly.
//!
//! ```sh
//! cargo run --example ping_pong
//! ```

use troupe_core::define_message;
use troupe_core::messages::Start;
use troupe_runtime::{handle_messages, ActorContext, ActorRef, Manager, ManagerHandle, ThreadConfig};

struct Ping {
    count: i32,
}
define_message!(Ping = 100);

struct Pong {
    count: i32,
}
define_message!(Pong = 101);

struct PongActor;

handle_messages!(PongActor, Ping => on_ping);

impl PongActor {
    fn on_ping(&mut self, msg: &Ping, ctx: &mut ActorContext) {
        println!("PongActor: received ping {}", msg.count);
        ctx.reply(Box::new(Pong { count: msg.count }));
    }
}

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
        println!("PingActor: starting, sending ping 1");
        self.pong_ref
            .send(Box::new(Ping { count: 1 }), ctx.self_ref());
    }

    fn on_pong(&mut self, msg: &Pong, ctx: &mut ActorContext) {
        println!("Received pong {}", msg.count);
        if msg.count >= 5 {
            println!("PingActor: done");
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

    let mut mgr = Manager::new("PingPongManager");
    let pong_ref = mgr
        .manage("pong", PongActor, ThreadConfig::default())
        .expect("manage pong");
    let handle = mgr.handle();
    mgr.manage("ping", PingActor { pong_ref, handle }, ThreadConfig::default())
        .expect("manage ping");

    mgr.init();
    mgr.run();
    mgr.end();
}
