//! Tests for deferred interception: requests queued against modules that
//! are not loaded yet, drained exactly once by the engine's load hook.

use std::{cell::RefCell, rc::Rc};

use graft::{
    ArgValues, Engine, Interceptor, Module, ModuleRegistry, NativeFunction, Outcome,
    RecordingTracer, TraceEvent, Value, Vm,
};
use pretty_assertions::assert_eq;

fn counting_square(calls: &Rc<RefCell<u32>>) -> NativeFunction {
    let calls = Rc::clone(calls);
    NativeFunction::new("square", move |args: &ArgValues| {
        *calls.borrow_mut() += 1;
        match args.positional.first() {
            Some(Value::Int(n)) => Ok(Value::Int(n * n)),
            _ => Ok(Value::None),
        }
    })
}

fn mathlib(calls: &Rc<RefCell<u32>>) -> Module {
    let mut module = Module::new("mathlib");
    module.insert("square", counting_square(calls));
    module
}

fn call_square(registry: &mut ModuleRegistry, n: i64) -> Value {
    registry
        .get_mut("mathlib")
        .unwrap()
        .call(&mut Vm::new(), "square", &ArgValues::positional([n.into()]))
        .unwrap()
}

fn veto_zero() -> Interceptor {
    Interceptor::result_aware(|args, _| {
        if matches!(args.positional.first(), Some(Value::Int(0))) {
            Ok(Outcome::halt("vetoed"))
        } else {
            Ok(Outcome::proceed())
        }
    })
}

/// A request against an unloaded module queues, then applies the moment
/// the module arrives through the load funnel.
#[test]
fn queued_request_applies_on_load() {
    let calls = Rc::new(RefCell::new(0));
    let mut registry = ModuleRegistry::new();
    let mut engine = Engine::new("deferred");

    engine.prefix(&mut registry, "mathlib", "square", veto_zero()).unwrap();
    assert_eq!(engine.pending_count("mathlib"), 1);
    assert!(!registry.contains("mathlib"));

    registry.load(mathlib(&calls));
    assert_eq!(engine.pending_count("mathlib"), 0);

    assert_eq!(call_square(&mut registry, 5), Value::Int(25));
    assert_eq!(call_square(&mut registry, 0), Value::from("vetoed"));
    assert_eq!(*calls.borrow(), 1);
}

/// A request against an already-loaded module applies immediately; nothing
/// is queued.
#[test]
fn loaded_module_gets_immediate_application() {
    let calls = Rc::new(RefCell::new(0));
    let mut registry = ModuleRegistry::new();
    let mut engine = Engine::new("deferred");

    registry.load(mathlib(&calls));
    engine.prefix(&mut registry, "mathlib", "square", veto_zero()).unwrap();
    assert_eq!(engine.pending_count("mathlib"), 0);

    assert_eq!(call_square(&mut registry, 0), Value::from("vetoed"));
}

/// Loading an unrelated module leaves other queues alone; loading the
/// target again does not re-apply a drained request.
#[test]
fn drain_is_exactly_once() {
    let calls = Rc::new(RefCell::new(0));
    let intercepted = Rc::new(RefCell::new(0u32));
    let mut registry = ModuleRegistry::new();
    let mut engine = Engine::new("deferred");

    let hits = Rc::clone(&intercepted);
    engine
        .prefix(
            &mut registry,
            "mathlib",
            "square",
            Interceptor::result_aware(move |_, _| {
                *hits.borrow_mut() += 1;
                Ok(Outcome::proceed())
            }),
        )
        .unwrap();

    registry.load(Module::new("unrelated"));
    assert_eq!(engine.pending_count("mathlib"), 1);

    registry.load(mathlib(&calls));
    assert_eq!(engine.pending_count("mathlib"), 0);

    // a reload introduces a fresh module; the drained request is gone, so
    // the fresh binding is unwrapped
    registry.load(mathlib(&calls));
    assert_eq!(call_square(&mut registry, 3), Value::Int(9));
    assert_eq!(*intercepted.borrow(), 0);
}

/// Several queued requests for one module all apply on its load, in
/// request order.
#[test]
fn multiple_queued_requests_all_apply() {
    let calls = Rc::new(RefCell::new(0));
    let mut registry = ModuleRegistry::new();
    let mut engine = Engine::new("deferred");

    engine.prefix(&mut registry, "mathlib", "square", veto_zero()).unwrap();
    engine
        .postfix(
            &mut registry,
            "mathlib",
            "square",
            Interceptor::result_aware(|_, result| match result {
                Some(Value::Int(n)) => Ok(Outcome::override_with(n + 1)),
                _ => Ok(Outcome::keep()),
            }),
        )
        .unwrap();
    assert_eq!(engine.pending_count("mathlib"), 2);

    registry.load(mathlib(&calls));
    assert_eq!(call_square(&mut registry, 5), Value::Int(26));
    // the postfix wraps outermost; it sees the vetoed answer and keeps it
    assert_eq!(call_square(&mut registry, 0), Value::from("vetoed"));
}

/// A queued request whose symbol is missing from the loaded module is
/// reported through the tracer and dropped; the load itself succeeds.
#[test]
fn failed_drain_is_traced_and_dropped() {
    let calls = Rc::new(RefCell::new(0));
    let tracer = RecordingTracer::new();
    let mut registry = ModuleRegistry::new();
    let mut engine = Engine::with_tracer("deferred", tracer.clone());

    engine.prefix(&mut registry, "mathlib", "cube", veto_zero()).unwrap();
    registry.load(mathlib(&calls));

    assert_eq!(engine.pending_count("mathlib"), 0);
    assert_eq!(
        tracer.events(),
        [
            TraceEvent::PatchQueued { module: "mathlib".to_owned(), symbol: "cube".to_owned() },
            TraceEvent::DrainFailed {
                module: "mathlib".to_owned(),
                symbol: "cube".to_owned(),
                error: "symbol 'cube' not found in module 'mathlib'".to_owned(),
            },
        ]
    );

    // module is usable despite the failed request
    assert_eq!(call_square(&mut registry, 4), Value::Int(16));
}

/// The tracer observes the full deferred lifecycle: queue, then drain.
#[test]
fn tracer_reports_queue_and_drain() {
    let calls = Rc::new(RefCell::new(0));
    let tracer = RecordingTracer::new();
    let mut registry = ModuleRegistry::new();
    let mut engine = Engine::with_tracer("deferred", tracer.clone());

    engine.prefix(&mut registry, "mathlib", "square", veto_zero()).unwrap();
    registry.load(mathlib(&calls));

    assert_eq!(
        tracer.events(),
        [
            TraceEvent::PatchQueued { module: "mathlib".to_owned(), symbol: "square".to_owned() },
            TraceEvent::PrefixApplied { module: "mathlib".to_owned(), symbol: "square".to_owned() },
            TraceEvent::PendingDrained { module: "mathlib".to_owned(), symbol: "square".to_owned() },
        ]
    );
}

/// Two engines with distinct names hook the registry independently and
/// each drains only its own queue.
#[test]
fn engines_with_distinct_names_coexist() {
    let calls = Rc::new(RefCell::new(0));
    let mut registry = ModuleRegistry::new();
    let mut veto_engine = Engine::new("veto");
    let mut bump_engine = Engine::new("bump");

    veto_engine.prefix(&mut registry, "mathlib", "square", veto_zero()).unwrap();
    bump_engine
        .postfix(
            &mut registry,
            "mathlib",
            "square",
            Interceptor::result_aware(|_, result| match result {
                Some(Value::Int(n)) => Ok(Outcome::override_with(n + 1)),
                _ => Ok(Outcome::keep()),
            }),
        )
        .unwrap();
    assert!(registry.is_subscribed("veto"));
    assert!(registry.is_subscribed("bump"));

    registry.load(mathlib(&calls));
    assert_eq!(veto_engine.pending_count("mathlib"), 0);
    assert_eq!(bump_engine.pending_count("mathlib"), 0);
    assert_eq!(call_square(&mut registry, 5), Value::Int(26));
}

/// A second engine reusing an existing hook name cannot install its hook,
/// so its queue is never drained.
#[test]
fn duplicate_engine_name_does_not_hook_twice() {
    let calls = Rc::new(RefCell::new(0));
    let mut registry = ModuleRegistry::new();
    let mut first = Engine::new("shared");
    let mut second = Engine::new("shared");

    first.prefix(&mut registry, "mathlib", "square", veto_zero()).unwrap();
    second.prefix(&mut registry, "mathlib", "square", veto_zero()).unwrap();

    registry.load(mathlib(&calls));
    assert_eq!(first.pending_count("mathlib"), 0);
    // the second engine's hook was refused, so its request stays queued
    assert_eq!(second.pending_count("mathlib"), 1);
}

/// Queueing itself never fails: the result is `Ok` whether the request
/// applied now or was deferred.
#[test]
fn enqueue_is_infallible() {
    let mut registry = ModuleRegistry::new();
    let mut engine = Engine::new("deferred");

    // even a request that can never apply (module may never load) queues fine
    engine.prefix(&mut registry, "ghost", "phantom", veto_zero()).unwrap();
    assert_eq!(engine.pending_count("ghost"), 1);
}
