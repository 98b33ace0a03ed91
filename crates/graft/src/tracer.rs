//! Patch-event tracing infrastructure.
//!
//! Provides a trait-based tracing system for the patching machinery with
//! zero-cost abstraction: with [`NoopTracer`] every hook compiles away via
//! monomorphization, since the engine carries its tracer as a type
//! parameter.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable patch log to stderr |
//! | [`RecordingTracer`] | Full event recording for post-mortem inspection |
//!
//! The engine and its load hook each hold a tracer, so implementations are
//! `Clone`; [`RecordingTracer`] clones share one event buffer so a test can
//! keep a handle while the engine's copy traces from inside the hook.

use std::{cell::RefCell, rc::Rc};

/// Trace event emitted by the patching machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A function was out-variable patched with the given capture list.
    Patched { function: String, captured: Vec<String> },
    /// A prefix interceptor was installed on a loaded module's symbol.
    PrefixApplied { module: String, symbol: String },
    /// A postfix interceptor was installed on a loaded module's symbol.
    PostfixApplied { module: String, symbol: String },
    /// An interception request was queued for a module not yet loaded.
    PatchQueued { module: String, symbol: String },
    /// A queued request was applied when its module became available.
    PendingDrained { module: String, symbol: String },
    /// A queued request could not be applied at load time and was dropped.
    DrainFailed { module: String, symbol: String, error: String },
}

/// Trait for patch-event tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`]
/// requires zero lines of code and compiles to zero instructions.
/// Implementations only override the hooks they care about.
pub trait PatchTracer: Clone {
    /// Called for every patch event, in the order events occur.
    #[inline]
    fn on_event(&mut self, _event: TraceEvent) {}
}

/// Zero-cost tracer that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl PatchTracer for NoopTracer {}

/// Tracer that prints each event to stderr, for interactive debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl PatchTracer for StderrTracer {
    fn on_event(&mut self, event: TraceEvent) {
        eprintln!("[graft] {event:?}");
    }
}

/// Tracer that records every event into a shared buffer.
///
/// Clones share the buffer, so tests keep one handle and hand another to
/// the engine. Single-threaded by design, matching the crate's execution
/// model.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Rc<RefCell<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    /// Creates a tracer with an empty event buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    /// Clears the recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl PatchTracer for RecordingTracer {
    fn on_event(&mut self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}
