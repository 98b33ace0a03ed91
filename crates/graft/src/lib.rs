#![doc = include_str!("../../../README.md")]

mod args;
mod bytecode;
mod errors;
mod function;
mod intercept;
mod module;
pub mod outvar;
mod registry;
pub mod tracer;
mod value;

pub use crate::{
    args::ArgValues,
    bytecode::{Code, CodeBuilder, JumpLabel, Op, Vm},
    errors::{PatchError, RunError},
    function::{Function, PatchInfo},
    intercept::{Engine, Interceptor, Outcome, RESULT_PARAM, Wrapper, elementary_postfix, elementary_prefix},
    module::{Callable, Module, NativeFunction},
    registry::{LoadObserver, ModuleRegistry},
    tracer::{NoopTracer, PatchTracer, RecordingTracer, StderrTracer, TraceEvent},
    value::Value,
};
