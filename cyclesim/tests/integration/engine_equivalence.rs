//! Serial and parallel engines produce the same results on workloads in
//! which no two events for the same handler share a time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use cyclesim::engine::{Engine, ParallelEngine, SerialEngine};
use cyclesim::event::{Event, HandleError, Handler};
use cyclesim::hooking::{HookCtx, HookPos, Hookable};
use cyclesim::time::VTimeInSec;

const NUM_WALKERS: usize = 16;
const NUM_STEPS: u64 = 50;

/// A deterministic pseudo-random delay, in half-seconds, for a given walker
/// and step. A zero delay reschedules the walker at the current time.
fn delay(walker: usize, step: u64) -> VTimeInSec {
    let mut z = (walker as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ step;
    z = (z ^ (z >> 29)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z ^= z >> 32;

    (z % 4) as f64 * 0.5
}

/// Reschedules itself after a pseudo-random delay and records its trajectory.
struct Walker {
    id: usize,
    me: Weak<Self>,
    engine: Arc<dyn Engine>,
    trace: Mutex<Vec<(VTimeInSec, u64, bool)>>,
}

impl Walker {
    fn new(id: usize, engine: Arc<dyn Engine>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id,
            me: me.clone(),
            engine,
            trace: Mutex::new(Vec::new()),
        })
    }
}

impl Handler for Walker {
    type Payload = u64;

    fn handle(&self, event: &Event<Self>) -> Result<(), HandleError> {
        let step = *event.payload();
        self.trace
            .lock()
            .unwrap()
            .push((event.time(), step, event.is_secondary()));

        if step + 1 < NUM_STEPS {
            let time = event.time() + delay(self.id, step);
            let me = self.me.upgrade().ok_or("walker dropped")?;
            let next = if step % 5 == 4 {
                Event::new_secondary(time, me, step + 1)
            } else {
                Event::new(time, me, step + 1)
            };
            self.engine.schedule(next.into());
        }

        Ok(())
    }
}

/// Runs all walkers to completion and returns their trajectories, the final
/// time and the number of handled events.
fn walk(engine: Arc<dyn Engine>) -> (Vec<Vec<(VTimeInSec, u64, bool)>>, VTimeInSec, usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    engine.accept_hook(Arc::new(move |ctx: &HookCtx<'_>| {
        if ctx.pos == HookPos::AfterEvent {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }));

    let walkers: Vec<_> = (0..NUM_WALKERS)
        .map(|id| Walker::new(id, engine.clone()))
        .collect();
    for walker in &walkers {
        engine.schedule(Event::new(0.0, walker.clone(), 0).into());
    }
    engine.run().unwrap();

    let traces = walkers
        .iter()
        .map(|w| w.trace.lock().unwrap().clone())
        .collect();

    (traces, engine.now(), count.load(Ordering::Relaxed))
}

#[test]
fn serial_parallel_equivalence() {
    let (serial_traces, serial_now, serial_count) = walk(SerialEngine::new());

    for (num_workers, num_queues) in [(1, 1), (2, 5), (4, 8)] {
        let (traces, now, count) = walk(ParallelEngine::with_config(num_workers, num_queues));

        assert_eq!(traces, serial_traces);
        assert_eq!(now, serial_now);
        assert_eq!(count, serial_count);
    }

    assert_eq!(serial_count, NUM_WALKERS * NUM_STEPS as usize);
    for trace in &serial_traces {
        assert!(trace.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}
