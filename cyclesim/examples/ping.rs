//! Example: request/response traffic between two clocked agents.
//!
//! This example demonstrates in particular:
//!
//! * ticking components that go idle when they have nothing to do,
//! * flow control and retries through a direct connection,
//! * replies built by swapping the source and destination of a request,
//! * event logging with the `tracing` crate.
//!
//! ```text
//!                ┌──────────┐   ping►    ┌──────────┐
//!                │          ├───────────►│          │
//!                │  Pinger  │            │  Ponger  │
//!                │          │◄───────────┤          │
//!                └──────────┘    ◄pong   └──────────┘
//! ```
//!
//! Run with `RUST_LOG=cyclesim=trace` to see every event, and pass
//! `--parallel` to use the parallel engine.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::info;
use tracing_subscriber::EnvFilter;

use cyclesim::engine::{EngineBuilder, ExecutionError};
use cyclesim::hooking::{EventLogger, Hookable};
use cyclesim::id::{IdGenerator, SequentialIdGenerator};
use cyclesim::ports::{Component, Connection, DirectConnection, Msg, MsgMeta, Port};
use cyclesim::ticking::{Ticker, TickingComponent};
use cyclesim::time::{Freq, VTimeInSec};

/// A request or a response.
struct PingMsg {
    meta: MsgMeta,
    seq: u64,
}

impl Msg for PingMsg {
    fn meta(&self) -> &MsgMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut MsgMeta {
        &mut self.meta
    }
}

/// Sends a fixed number of pings, with at most `window` pings in flight.
struct Pinger {
    port: Arc<Port<PingMsg>>,
    ids: Arc<SequentialIdGenerator>,
    window: u64,
    to_send: AtomicU64,
    in_flight: AtomicU64,
    latencies: Mutex<Vec<VTimeInSec>>,
    // Issue times, indexed by sequence number.
    issued: Mutex<Vec<VTimeInSec>>,
}

impl Pinger {
    fn new(
        owner: Weak<dyn Component>,
        ids: Arc<SequentialIdGenerator>,
        count: u64,
        window: u64,
    ) -> Self {
        Self {
            port: Port::new(owner, 4, "pinger.port"),
            ids,
            window,
            to_send: AtomicU64::new(count),
            in_flight: AtomicU64::new(0),
            latencies: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }
}

impl Ticker for Pinger {
    fn tick(&self, now: VTimeInSec) -> bool {
        let mut progress = false;

        // Collect a response.
        if let Some(pong) = self.port.retrieve_incoming(now) {
            let issued = self.issued.lock().unwrap()[pong.seq as usize];
            self.latencies.lock().unwrap().push(now - issued);
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            progress = true;
        }

        // Issue a request.
        let to_send = self.to_send.load(Ordering::Relaxed);
        if to_send != 0 && self.in_flight.load(Ordering::Relaxed) < self.window {
            let mut issued = self.issued.lock().unwrap();
            let mut ping = PingMsg {
                meta: MsgMeta::new(self.ids.generate(), self.port.as_remote(), now)
                    .with_traffic(64, 0),
                seq: issued.len() as u64,
            };

            if self.port.can_send(&mut ping).is_ok() && self.port.send(ping).is_ok() {
                issued.push(now);
                self.to_send.store(to_send - 1, Ordering::Relaxed);
                self.in_flight.fetch_add(1, Ordering::Relaxed);
                progress = true;
            }
        }

        progress
    }
}

/// Answers each ping with a pong after a fixed processing time.
struct Ponger {
    port: Arc<Port<PingMsg>>,
    processing_cycles: u32,
    // The ping being processed and the number of cycles left.
    current: Mutex<Option<(PingMsg, u32)>>,
}

impl Ponger {
    fn new(owner: Weak<dyn Component>, processing_cycles: u32) -> Self {
        Self {
            port: Port::new(owner, 4, "ponger.port"),
            processing_cycles,
            current: Mutex::new(None),
        }
    }
}

impl Ticker for Ponger {
    fn tick(&self, now: VTimeInSec) -> bool {
        let mut current = self.current.lock().unwrap();

        match current.take() {
            None => match self.port.retrieve_incoming(now) {
                Some(ping) => {
                    *current = Some((ping, self.processing_cycles));
                    true
                }
                None => false,
            },
            Some((ping, left)) if left > 1 => {
                *current = Some((ping, left - 1));
                true
            }
            Some((mut pong, _)) => {
                pong.meta_mut().swap_src_and_dst();
                pong.meta_mut().send_time = now;

                match self.port.send(pong) {
                    Ok(()) => true,
                    Err(err) => {
                        // Wait until the pinger frees up.
                        *current = Some((err.into_inner(), 0));
                        false
                    }
                }
            }
        }
    }
}

fn main() -> Result<(), ExecutionError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ---------------
    // Bench assembly.
    // ---------------

    const PING_COUNT: u64 = 100;
    const WINDOW: u64 = 3;
    const PROCESSING_CYCLES: u32 = 5;

    let mut builder = EngineBuilder::new();
    if std::env::args().any(|arg| arg == "--parallel") {
        builder = builder.parallel();
    }
    let engine = builder.build();
    engine.accept_hook(Arc::new(EventLogger::new()));

    let freq = Freq::new(1.0 * Freq::GHZ);
    let ids = Arc::new(SequentialIdGenerator::new());

    let pinger = TickingComponent::new_cyclic("pinger", engine.clone(), freq, |me| {
        Pinger::new(me.clone(), ids.clone(), PING_COUNT, WINDOW)
    });
    let ponger = TickingComponent::new_cyclic("ponger", engine.clone(), freq, |me| {
        Ponger::new(me.clone(), PROCESSING_CYCLES)
    });

    let link = DirectConnection::new("link");
    link.register(&pinger.ticker().port);
    link.register(&ponger.ticker().port);

    // ----------
    // Simulation.
    // ----------

    pinger.tick_now(0.0);
    engine.run()?;
    engine.finished();

    let latencies = pinger.ticker().latencies.lock().unwrap();
    assert_eq!(latencies.len() as u64, PING_COUNT);

    let mean = latencies.iter().sum::<VTimeInSec>() / latencies.len() as f64;
    info!(
        end_time = engine.now(),
        mean_latency = mean,
        "all pongs received"
    );
    println!(
        "{} pongs received at t={:.1}ns, mean latency {:.1}ns",
        latencies.len(),
        engine.now() * 1e9,
        mean * 1e9
    );

    Ok(())
}
