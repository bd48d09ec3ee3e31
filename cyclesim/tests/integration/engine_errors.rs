//! Handler error and panic reporting.

use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cyclesim::engine::{Engine, ExecutionError, ParallelEngine, SerialEngine};
use cyclesim::event::{Event, HandleError, Handler};

const PAR_NUM_WORKERS: usize = 4;
const PAR_NUM_QUEUES: usize = 3;

fn parallel_engine() -> Arc<dyn Engine> {
    ParallelEngine::with_config(PAR_NUM_WORKERS, PAR_NUM_QUEUES)
}

#[derive(Debug)]
struct Overheated(u32);

impl fmt::Display for Overheated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {} overheated", self.0)
    }
}

impl Error for Overheated {}

enum Action {
    Work,
    Fail,
    Panic,
}

struct Unit {
    id: u32,
    work_count: AtomicUsize,
}

impl Unit {
    fn new(id: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            work_count: AtomicUsize::new(0),
        })
    }
}

impl Handler for Unit {
    type Payload = Action;

    fn handle(&self, event: &Event<Self>) -> Result<(), HandleError> {
        match event.payload() {
            Action::Work => {
                self.work_count.fetch_add(1, Ordering::Relaxed);

                Ok(())
            }
            Action::Fail => Err(Box::new(Overheated(self.id))),
            Action::Panic => panic!("test message"),
        }
    }

    fn name(&self) -> &str {
        "unit"
    }
}

fn handler_error(engine: Arc<dyn Engine>) {
    let unit0 = Unit::new(0);
    let unit1 = Unit::new(1);

    engine.schedule(Event::new(1.0, unit0.clone(), Action::Work).into());
    engine.schedule(Event::new(2.0, unit0.clone(), Action::Fail).into());
    engine.schedule(Event::new(2.0, unit1.clone(), Action::Work).into());
    engine.schedule(Event::new(3.0, unit0.clone(), Action::Work).into());

    match engine.run() {
        Err(ExecutionError::HandlerFailed {
            handler,
            time,
            source,
        }) => {
            assert_eq!(handler, "unit");
            assert_eq!(time, 2.0);
            assert_eq!(source.to_string(), "unit 0 overheated");
        }
        Ok(()) => panic!("handler error not reported"),
    }
    assert_eq!(engine.now(), 2.0);
    assert!(engine.has_more_events());

    // The failed event was consumed, the others are still pending.
    engine.run().unwrap();
    assert_eq!(unit0.work_count.load(Ordering::Relaxed), 2);
    assert_eq!(unit1.work_count.load(Ordering::Relaxed), 1);
    assert_eq!(engine.now(), 3.0);
}

fn handler_panic(engine: Arc<dyn Engine>) {
    let unit0 = Unit::new(0);
    let unit1 = Unit::new(1);

    engine.schedule(Event::new(1.0, unit0.clone(), Action::Work).into());
    engine.schedule(Event::new(2.0, unit1.clone(), Action::Panic).into());
    engine.schedule(Event::new(3.0, unit0.clone(), Action::Work).into());

    let result = panic::catch_unwind(AssertUnwindSafe(|| engine.run()));
    match result {
        Err(payload) => {
            let msg = payload.downcast_ref::<&str>().unwrap();
            assert_eq!(*msg, "test message");
        }
        Ok(_) => panic!("handler panic not propagated"),
    }

    // Events after the panic were not handled.
    assert_eq!(unit0.work_count.load(Ordering::Relaxed), 1);
    assert_eq!(engine.now(), 2.0);
}

#[test]
fn handler_error_serial() {
    handler_error(SerialEngine::new());
}

#[test]
fn handler_error_parallel() {
    handler_error(parallel_engine());
}

#[test]
fn handler_panic_serial() {
    handler_panic(SerialEngine::new());
}

#[test]
fn handler_panic_parallel() {
    handler_panic(parallel_engine());
}

#[test]
fn concurrent_handler_errors_parallel() {
    let engine = parallel_engine();
    let units: Vec<_> = (0..4).map(Unit::new).collect();

    for unit in &units {
        engine.schedule(Event::new(1.0, unit.clone(), Action::Fail).into());
    }
    engine.schedule(Event::new(2.0, units[0].clone(), Action::Work).into());

    // A single error is returned and the whole round is consumed.
    assert!(engine.run().is_err());
    assert_eq!(engine.now(), 1.0);

    engine.run().unwrap();
    assert_eq!(units[0].work_count.load(Ordering::Relaxed), 1);
    assert!(!engine.has_more_events());
}
