//! Local ping-pong through a Manager: two actors, five round trips,
//! orderly shutdown.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

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
        ctx.reply(Box::new(Pong { count: msg.count }));
    }
}

struct PingActor {
    pong_ref: ActorRef,
    handle: ManagerHandle,
    final_count: Arc<AtomicI32>,
}

handle_messages!(PingActor,
    Start => on_start,
    Pong => on_pong,
);

impl PingActor {
    fn on_start(&mut self, _msg: &Start, ctx: &mut ActorContext) {
        self.pong_ref
            .send(Box::new(Ping { count: 1 }), ctx.self_ref());
    }

    fn on_pong(&mut self, msg: &Pong, ctx: &mut ActorContext) {
        if msg.count >= 5 {
            self.final_count.store(msg.count, Ordering::SeqCst);
            self.handle.terminate();
        } else {
            self.pong_ref
                .send(Box::new(Ping { count: msg.count + 1 }), ctx.self_ref());
        }
    }
}

#[test]
fn test_local_ping_pong_five_rounds() {
    let final_count = Arc::new(AtomicI32::new(0));

    let mut mgr = Manager::new("PingPongManager");
    let pong_ref = mgr
        .manage("pong", PongActor, ThreadConfig::default())
        .unwrap();
    mgr.manage(
        "ping",
        PingActor {
            pong_ref,
            handle: mgr.handle(),
            final_count: Arc::clone(&final_count),
        },
        ThreadConfig::default(),
    )
    .unwrap();

    mgr.init();
    mgr.run();
    mgr.end();

    assert_eq!(final_count.load(Ordering::SeqCst), 5);
}

#[test]
fn test_single_producer_ordering() {
    // Messages from one producer arrive in issue order, observed end to
    // end through a worker.
    use parking_lot::Mutex;

    struct Seq {
        n: u32,
    }
    define_message!(Seq = 102);

    #[derive(Default)]
    struct Collector {
        seen: Arc<Mutex<Vec<u32>>>,
        handle: Option<ManagerHandle>,
    }

    handle_messages!(Collector, Seq => on_seq);

    impl Collector {
        fn on_seq(&mut self, msg: &Seq, _ctx: &mut ActorContext) {
            self.seen.lock().push(msg.n);
            if msg.n == 99 {
                if let Some(handle) = &self.handle {
                    handle.terminate();
                }
            }
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut mgr = Manager::new("OrderManager");
    let handle = mgr.handle();
    let collector_ref = mgr
        .manage(
            "collector",
            Collector {
                seen: Arc::clone(&seen),
                handle: Some(handle),
            },
            ThreadConfig::default(),
        )
        .unwrap();
    mgr.init();

    for n in 0..=99 {
        collector_ref.send(Box::new(Seq { n }), None);
    }

    mgr.run();
    mgr.end();

    let seen = seen.lock();
    assert_eq!(seen.len(), 100);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}
