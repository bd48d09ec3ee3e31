//! Event ordering, pausing and time monotonicity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cyclesim::engine::{Engine, ParallelEngine, SerialEngine, SimulationEndHandler};
use cyclesim::event::{Event, HandleError, Handler};
use cyclesim::hooking::{HookCtx, HookPos, Hookable};
use cyclesim::time::VTimeInSec;

const PAR_NUM_WORKERS: usize = 4;
const PAR_NUM_QUEUES: usize = 3;

fn parallel_engine() -> Arc<dyn Engine> {
    ParallelEngine::with_config(PAR_NUM_WORKERS, PAR_NUM_QUEUES)
}

/// Pauses the engine each time it handles an event.
struct Pauser {
    engine: Arc<dyn Engine>,
    count: AtomicUsize,
}

impl Pauser {
    fn new(engine: Arc<dyn Engine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            count: AtomicUsize::new(0),
        })
    }
}

impl Handler for Pauser {
    type Payload = ();

    fn handle(&self, _event: &Event<Self>) -> Result<(), HandleError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.engine.pause();

        Ok(())
    }
}

/// Records the time of each handled event together with its payload.
#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<(VTimeInSec, u32)>>,
}

impl Handler for Recorder {
    type Payload = u32;

    fn handle(&self, event: &Event<Self>) -> Result<(), HandleError> {
        self.log
            .lock()
            .unwrap()
            .push((event.time(), *event.payload()));

        Ok(())
    }
}

fn pause_and_resume(engine: Arc<dyn Engine>) {
    let p0 = Pauser::new(engine.clone());
    let p1 = Pauser::new(engine.clone());
    let p2 = Pauser::new(engine.clone());

    engine.schedule(Event::new(0.0, p0.clone(), ()).into());
    engine.schedule(Event::new(10.0, p1.clone(), ()).into());
    engine.schedule(Event::new(10.0, p2.clone(), ()).into());

    let mut observed = Vec::new();
    for _ in 0..3 {
        engine.run().unwrap();
        observed.push(engine.now());
    }
    assert_eq!(observed, vec![0.0, 10.0, 10.0]);
    assert!(!engine.has_more_events());

    engine.schedule(Event::new(100.0, p0.clone(), ()).into());
    engine.run().unwrap();
    assert_eq!(engine.now(), 100.0);

    let total: usize = [&p0, &p1, &p2]
        .iter()
        .map(|p| p.count.load(Ordering::Relaxed))
        .sum();
    assert_eq!(total, 4);
}

fn primary_before_secondary(engine: Arc<dyn Engine>) {
    let primary = Arc::new(Recorder::default());
    let secondary = Arc::new(Recorder::default());
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = order.clone();
    engine.accept_hook(Arc::new(move |ctx: &HookCtx<'_>| {
        if ctx.pos == HookPos::AfterEvent {
            o.lock().unwrap().push(ctx.now);
        }
    }));

    engine.schedule(Event::new_secondary(1.0, secondary.clone(), 1).into());
    engine.schedule(Event::new(1.0, primary.clone(), 1).into());
    engine.schedule(Event::new_secondary(2.0, secondary.clone(), 2).into());
    engine.schedule(Event::new(2.0, primary.clone(), 2).into());
    engine.run().unwrap();

    // Each secondary event is handled after the primary event of the same
    // time, so both recorders see both times in order.
    assert_eq!(*primary.log.lock().unwrap(), vec![(1.0, 1), (2.0, 2)]);
    assert_eq!(*secondary.log.lock().unwrap(), vec![(1.0, 1), (2.0, 2)]);

    let order = order.lock().unwrap();
    assert_eq!(order.len(), 4);
    assert!(order.windows(2).all(|w| w[0] <= w[1]));
}

fn time_is_monotonic(engine: Arc<dyn Engine>) {
    const NUM_HANDLERS: usize = 10;

    let recorders: Vec<_> = (0..NUM_HANDLERS)
        .map(|_| Arc::new(Recorder::default()))
        .collect();
    let times = Arc::new(Mutex::new(Vec::new()));

    let t = times.clone();
    engine.accept_hook(Arc::new(move |ctx: &HookCtx<'_>| {
        if ctx.pos == HookPos::BeforeEvent {
            t.lock().unwrap().push(ctx.now);
        }
    }));

    // Scheduled in a scrambled order.
    for (i, recorder) in recorders.iter().enumerate() {
        for step in 0..5u32 {
            let time = ((i * 7 + step as usize * 3) % 11) as f64 + step as f64 * 11.0;
            engine.schedule(Event::new(time, recorder.clone(), step).into());
        }
    }
    engine.run().unwrap();

    let times = times.lock().unwrap();
    assert_eq!(times.len(), NUM_HANDLERS * 5);
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    for recorder in &recorders {
        let log = recorder.log.lock().unwrap();
        let steps: Vec<_> = log.iter().map(|(_, step)| *step).collect();
        assert_eq!(steps, vec![0, 1, 2, 3, 4]);
    }
}

fn schedule_in_the_past(engine: Arc<dyn Engine>) {
    let recorder = Arc::new(Recorder::default());

    engine.schedule(Event::new(10.0, recorder.clone(), 0).into());
    engine.run().unwrap();

    engine.schedule(Event::new(5.0, recorder, 1).into());
}

struct EndProbe {
    ends: Mutex<Vec<VTimeInSec>>,
}

impl SimulationEndHandler for EndProbe {
    fn handle_end(&self, now: VTimeInSec) {
        self.ends.lock().unwrap().push(now);
    }
}

fn end_handlers(engine: Arc<dyn Engine>) {
    let recorder = Arc::new(Recorder::default());
    let probe = Arc::new(EndProbe {
        ends: Mutex::new(Vec::new()),
    });
    engine.register_end_handler(probe.clone());

    engine.schedule(Event::new(3.5, recorder, 0).into());
    engine.run().unwrap();
    engine.finished();
    engine.finished();

    assert_eq!(*probe.ends.lock().unwrap(), vec![3.5]);
}

#[test]
fn pause_and_resume_serial() {
    pause_and_resume(SerialEngine::new());
}

#[test]
fn pause_and_resume_parallel() {
    pause_and_resume(parallel_engine());
}

#[test]
fn primary_before_secondary_serial() {
    primary_before_secondary(SerialEngine::new());
}

#[test]
fn primary_before_secondary_parallel() {
    primary_before_secondary(parallel_engine());
}

#[test]
fn time_is_monotonic_serial() {
    time_is_monotonic(SerialEngine::new());
}

#[test]
fn time_is_monotonic_parallel() {
    time_is_monotonic(parallel_engine());
}

#[test]
#[should_panic]
fn schedule_in_the_past_serial() {
    schedule_in_the_past(SerialEngine::new());
}

#[test]
#[should_panic]
fn schedule_in_the_past_parallel() {
    schedule_in_the_past(parallel_engine());
}

#[test]
fn end_handlers_serial() {
    end_handlers(SerialEngine::new());
}

#[test]
fn end_handlers_parallel() {
    end_handlers(parallel_engine());
}
