//! Ticking components that go idle and are woken up by their ports.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use cyclesim::engine::{Engine, ParallelEngine, SerialEngine};
use cyclesim::id::{IdGenerator, SequentialIdGenerator};
use cyclesim::ports::{Component, Connection, DirectConnection, Msg, MsgMeta, Port};
use cyclesim::ticking::{TickState, Ticker, TickingComponent};
use cyclesim::time::{Freq, VTimeInSec};

const PAR_NUM_WORKERS: usize = 4;
const PAR_NUM_QUEUES: usize = 3;

const NUM_PACKETS: u64 = 10;

struct Packet {
    meta: MsgMeta,
}

impl Msg for Packet {
    fn meta(&self) -> &MsgMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut MsgMeta {
        &mut self.meta
    }
}

/// Sends one packet per cycle and stalls when the destination is full.
struct Source {
    port: Arc<Port<Packet>>,
    ids: SequentialIdGenerator,
    remaining: AtomicU64,
    stalled: Mutex<Option<Packet>>,
    refusals: AtomicUsize,
}

impl Source {
    fn new(owner: Weak<dyn Component>) -> Self {
        Self {
            port: Port::new(owner, 1, "source.out"),
            ids: SequentialIdGenerator::new(),
            remaining: AtomicU64::new(NUM_PACKETS),
            stalled: Mutex::new(None),
            refusals: AtomicUsize::new(0),
        }
    }
}

impl Ticker for Source {
    fn tick(&self, now: VTimeInSec) -> bool {
        let mut stalled = self.stalled.lock().unwrap();

        let mut packet = match stalled.take() {
            Some(packet) => packet,
            None => {
                if self
                    .remaining
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                    .is_err()
                {
                    return false;
                }
                Packet {
                    meta: MsgMeta::new(self.ids.generate(), self.port.as_remote(), now),
                }
            }
        };
        packet.meta_mut().send_time = now;

        match self.port.send(packet) {
            Ok(()) => true,
            Err(err) => {
                self.refusals.fetch_add(1, Ordering::Relaxed);
                *stalled = Some(err.into_inner());

                false
            }
        }
    }
}

/// Takes two cycles to process each packet.
struct Sink {
    port: Arc<Port<Packet>>,
    processing: Mutex<Option<Packet>>,
    received: Mutex<Vec<u64>>,
    ticks: AtomicUsize,
}

impl Sink {
    fn new(owner: Weak<dyn Component>) -> Self {
        Self {
            port: Port::new(owner, 1, "sink.in"),
            processing: Mutex::new(None),
            received: Mutex::new(Vec::new()),
            ticks: AtomicUsize::new(0),
        }
    }
}

impl Ticker for Sink {
    fn tick(&self, now: VTimeInSec) -> bool {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut processing = self.processing.lock().unwrap();

        if let Some(packet) = processing.take() {
            self.received.lock().unwrap().push(packet.meta().id);

            return true;
        }
        match self.port.retrieve_incoming(now) {
            Some(packet) => {
                *processing = Some(packet);

                true
            }
            None => false,
        }
    }
}

fn producer_consumer(engine: Arc<dyn Engine>) {
    let freq = Freq::new(1.0 * Freq::GHZ);

    let source = TickingComponent::new_cyclic("source", engine.clone(), freq, |me| {
        Source::new(me.clone())
    });
    let sink = TickingComponent::new_cyclic("sink", engine.clone(), freq, |me| {
        Sink::new(me.clone())
    });

    let conn = DirectConnection::new("link");
    conn.register(&source.ticker().port);
    conn.register(&sink.ticker().port);

    source.tick_now(0.0);
    engine.run().unwrap();

    assert_eq!(
        *sink.ticker().received.lock().unwrap(),
        (0..NUM_PACKETS).collect::<Vec<_>>()
    );
    assert!(source.ticker().refusals.load(Ordering::Relaxed) > 0);
    assert!(source.ticker().stalled.lock().unwrap().is_none());

    // Both components went idle and nothing is left to simulate.
    assert_eq!(source.tick_scheduler().state(), TickState::Idle);
    assert_eq!(sink.tick_scheduler().state(), TickState::Idle);
    assert!(!engine.has_more_events());

    // The sink does not tick while it has nothing to do: two busy ticks per
    // packet, plus at most one idle tick per wake-up.
    let sink_ticks = sink.ticker().ticks.load(Ordering::Relaxed);
    assert!(sink_ticks >= 2 * NUM_PACKETS as usize);
    assert!(sink_ticks <= 3 * NUM_PACKETS as usize + 1);

    // Only a message wakes the sink up again.
    let now = engine.now();
    engine.run().unwrap();
    assert_eq!(engine.now(), now);

    let packet = Packet {
        meta: MsgMeta::new(NUM_PACKETS, source.ticker().port.as_remote(), now),
    };
    source.ticker().port.send(packet).unwrap();
    engine.run().unwrap();
    assert_eq!(sink.ticker().received.lock().unwrap().len(), NUM_PACKETS as usize + 1);
    assert_eq!(sink.tick_scheduler().state(), TickState::Idle);
}

#[test]
fn producer_consumer_serial() {
    producer_consumer(SerialEngine::new());
}

#[test]
fn producer_consumer_parallel() {
    producer_consumer(ParallelEngine::with_config(PAR_NUM_WORKERS, PAR_NUM_QUEUES));
}
