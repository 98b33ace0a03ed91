//! Prefix/postfix interception of module symbols.
//!
//! An [`Engine`] installs interceptors around named symbols: immediately
//! when the target module is already loaded, or queued and auto-applied by
//! the engine's load hook when the module later arrives through the
//! [`ModuleRegistry`](crate::registry::ModuleRegistry) funnel.
//!
//! Interceptors follow an explicit tagged contract ([`Interceptor`]) chosen
//! by the caller, never inferred from a signature. Installed wrappers
//! forward call arguments untouched and chain: re-wrapping wraps the
//! current binding, so prefixes nest outside-in and postfixes inside-out in
//! application order.

use std::{cell::RefCell, fmt, rc::Rc};

use ahash::AHashMap;

use crate::{
    args::ArgValues,
    bytecode::Vm,
    errors::{PatchError, RunError},
    function::Function,
    module::{Callable, Module},
    outvar,
    registry::{LoadObserver, ModuleRegistry},
    tracer::{NoopTracer, PatchTracer, TraceEvent},
    value::Value,
};

/// Parameter name a script interceptor must declare to take part in the
/// result-capture convention.
pub const RESULT_PARAM: &str = "_result";

/// What a result-aware interceptor decided.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Whether the wrapped callable should run (meaningful for prefixes).
    pub proceed: bool,
    /// Replacement result. `Some(v)` overrides even when `v` is falsy;
    /// `None` keeps the original (or, for a vetoing prefix, yields
    /// `Value::None`).
    pub result: Option<Value>,
}

impl Outcome {
    /// Let the wrapped callable run, keeping whatever result it produces.
    #[must_use]
    pub fn proceed() -> Self {
        Self { proceed: true, result: None }
    }

    /// Veto the wrapped callable and answer with `result` instead.
    #[must_use]
    pub fn halt(result: impl Into<Value>) -> Self {
        Self { proceed: false, result: Some(result.into()) }
    }

    /// Keep the original result (postfix observation).
    #[must_use]
    pub fn keep() -> Self {
        Self { proceed: true, result: None }
    }

    /// Override the result with `result`, falsy or not.
    #[must_use]
    pub fn override_with(result: impl Into<Value>) -> Self {
        Self { proceed: true, result: Some(result.into()) }
    }
}

type SimpleFn = Box<dyn FnMut(&ArgValues) -> Result<Value, RunError>>;
type ResultAwareFn = Box<dyn FnMut(&ArgValues, Option<Value>) -> Result<Outcome, RunError>>;

/// An interceptor, tagged by its calling convention.
///
/// The variant is the contract — there is no signature sniffing:
///
/// - `Simple` sees only the arguments. As a prefix its truthy return
///   proceeds and a falsy return short-circuits and is returned; as a
///   postfix its return value becomes the result.
/// - `ResultAware` additionally sees the result slot: `None` for a prefix
///   ("no result yet"), `Some(original)` for a postfix. Its [`Outcome`]
///   controls flow and result explicitly.
/// - `Def` is a script-level interceptor in the mini-language. It must
///   declare a [`RESULT_PARAM`] parameter; the engine out-variable-patches
///   it on that parameter and calls it as
///   `(args_tuple, kwargs_tuple, _result)`. Its direct return decides
///   whether a prefix proceeds, and the final value of `_result` supplies
///   the result.
pub enum Interceptor {
    Simple(SimpleFn),
    ResultAware(ResultAwareFn),
    Def(Function),
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(_) => f.write_str("Interceptor::Simple"),
            Self::ResultAware(_) => f.write_str("Interceptor::ResultAware"),
            Self::Def(func) => write!(f, "Interceptor::Def({})", func.name),
        }
    }
}

impl Interceptor {
    /// Creates a simple interceptor from a host closure.
    pub fn simple(f: impl FnMut(&ArgValues) -> Result<Value, RunError> + 'static) -> Self {
        Self::Simple(Box::new(f))
    }

    /// Creates a result-aware interceptor from a host closure.
    pub fn result_aware(f: impl FnMut(&ArgValues, Option<Value>) -> Result<Outcome, RunError> + 'static) -> Self {
        Self::ResultAware(Box::new(f))
    }

    /// Creates a script-level interceptor.
    #[must_use]
    pub fn def(function: Function) -> Self {
        Self::Def(function)
    }

    /// Validates the interceptor and performs the internal out-variable
    /// patch for `Def` variants. Runs once, at install time.
    fn prepare(&mut self, tracer: &mut impl PatchTracer) -> Result<(), PatchError> {
        let Self::Def(func) = self else { return Ok(()) };
        let is_result_param = func
            .code
            .local_slot(RESULT_PARAM)
            .is_some_and(|slot| (slot as usize) < func.code.param_count);
        if !is_result_param {
            return Err(PatchError::Configuration(format!(
                "script interceptor '{}' must declare a '{RESULT_PARAM}' parameter",
                func.name
            )));
        }
        outvar::patch(func, &[RESULT_PARAM])?;
        let captured = outvar::get_capture(func).expect("just patched").to_vec();
        tracer.on_event(TraceEvent::Patched { function: func.name.clone(), captured });
        Ok(())
    }

    /// Runs the interceptor and normalizes its decision into an [`Outcome`].
    ///
    /// `result` is `None` before the wrapped callable has run and
    /// `Some(original)` after it.
    fn evaluate(&mut self, vm: &mut Vm, args: &ArgValues, result: Option<Value>) -> Result<Outcome, RunError> {
        match self {
            Self::Simple(f) => {
                let ret = f(args)?;
                Ok(Outcome { proceed: ret.is_truthy(), result: Some(ret) })
            }
            Self::ResultAware(f) => f(args, result),
            Self::Def(func) => {
                // "no result yet" reaches the script as None, matching its
                // own notion of an empty result slot.
                let call_args = ArgValues::positional([
                    args.positional_tuple(),
                    args.keyword_tuple(),
                    result.unwrap_or(Value::None),
                ]);
                let ret = func.call(vm, &call_args)?;
                let captured = outvar::get_capture(func).expect("Def interceptor is patched at install");
                let result_idx = 1 + captured
                    .iter()
                    .position(|name| name == RESULT_PARAM)
                    .expect("Def interceptor captures _result");
                let Value::Tuple(mut items) = ret else {
                    unreachable!("patched interceptor returns a capture tuple")
                };
                let result_final = items.swap_remove(result_idx);
                let direct = items.swap_remove(0);
                Ok(Outcome { proceed: direct.is_truthy(), result: Some(result_final) })
            }
        }
    }
}

/// Flow behavior of an installed wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WrapKind {
    /// Interceptor runs first and may veto the wrapped callable.
    Prefix,
    /// Wrapped callable runs first; interceptor may override its result.
    Postfix,
    /// Interceptor observes the call; no flow control, result untouched.
    ObserveBefore,
    /// Interceptor observes the result; no flow control, result untouched.
    ObserveAfter,
}

/// The intercepted symbol installed in place of an original binding.
///
/// Holds the previous binding and the interceptor; the external call shape
/// is unchanged, so call sites are none the wiser.
#[derive(Debug)]
pub struct Wrapper {
    kind: WrapKind,
    interceptor: Interceptor,
    pub(crate) inner: Box<Callable>,
}

impl Wrapper {
    /// Runs the interception protocol for one invocation.
    pub(crate) fn call(&mut self, vm: &mut Vm, args: &ArgValues) -> Result<Value, RunError> {
        match self.kind {
            WrapKind::Prefix => {
                let outcome = self.interceptor.evaluate(vm, args, None)?;
                if outcome.proceed {
                    self.inner.call(vm, args)
                } else {
                    Ok(outcome.result.unwrap_or(Value::None))
                }
            }
            WrapKind::Postfix => {
                let result = self.inner.call(vm, args)?;
                let outcome = self.interceptor.evaluate(vm, args, Some(result.clone()))?;
                Ok(outcome.result.unwrap_or(result))
            }
            WrapKind::ObserveBefore => {
                self.interceptor.evaluate(vm, args, None)?;
                self.inner.call(vm, args)
            }
            WrapKind::ObserveAfter => {
                let result = self.inner.call(vm, args)?;
                self.interceptor.evaluate(vm, args, Some(result.clone()))?;
                Ok(result)
            }
        }
    }
}

/// Wraps `inner` so `hook` runs before every invocation.
///
/// A building block with no flow control: the hook observes the arguments
/// and the wrapped callable's result is always returned unchanged. Not
/// registry-integrated.
pub fn elementary_prefix(inner: Callable, mut hook: impl FnMut(&ArgValues) + 'static) -> Callable {
    let interceptor = Interceptor::result_aware(move |args, _| {
        hook(args);
        Ok(Outcome::keep())
    });
    Callable::Wrapped(Box::new(Wrapper {
        kind: WrapKind::ObserveBefore,
        interceptor,
        inner: Box::new(inner),
    }))
}

/// Wraps `inner` so `hook` runs after every invocation, seeing the result.
///
/// Like [`elementary_prefix`], observation only: the wrapped callable's
/// result is always returned unchanged.
pub fn elementary_postfix(inner: Callable, mut hook: impl FnMut(&ArgValues, &Value) + 'static) -> Callable {
    let interceptor = Interceptor::result_aware(move |args, result| {
        hook(args, result.as_ref().expect("postfix observer runs after the callable"));
        Ok(Outcome::keep())
    });
    Callable::Wrapped(Box::new(Wrapper {
        kind: WrapKind::ObserveAfter,
        interceptor,
        inner: Box::new(inner),
    }))
}

/// Which interception protocol a pending request installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchKind {
    Prefix,
    Postfix,
}

impl From<PatchKind> for WrapKind {
    fn from(kind: PatchKind) -> Self {
        match kind {
            PatchKind::Prefix => Self::Prefix,
            PatchKind::Postfix => Self::Postfix,
        }
    }
}

/// A queued interception request awaiting its module's availability.
///
/// Created when `prefix`/`postfix` targets a module that is not loaded yet;
/// consumed exactly once, the moment a matching load event fires.
#[derive(Debug)]
struct PendingPatch {
    kind: PatchKind,
    symbol: String,
    interceptor: Interceptor,
}

type PendingMap = AHashMap<String, Vec<PendingPatch>>;

/// Interception engine: immediate prefix/postfix application plus the
/// pending-patch registry drained by its load hook.
///
/// Each engine is constructed with a `name` that tags its hook in the
/// module registry, so several engine instances coexist without hooking the
/// load funnel twice. The pending registry is owned by this instance and
/// shared only with its own hook.
#[derive(Debug)]
pub struct Engine<Tr: PatchTracer = NoopTracer> {
    name: String,
    pending: Rc<RefCell<PendingMap>>,
    tracer: Tr,
}

impl Engine<NoopTracer> {
    /// Creates an engine with the given hook name and no tracing.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tracer(name, NoopTracer)
    }
}

impl<Tr: PatchTracer + 'static> Engine<Tr> {
    /// Creates an engine that reports patch events to `tracer`.
    ///
    /// The load hook receives a clone of the tracer, so shared-buffer
    /// tracers (e.g. `RecordingTracer`) observe drain events too.
    #[must_use]
    pub fn with_tracer(name: impl Into<String>, tracer: Tr) -> Self {
        Self { name: name.into(), pending: Rc::new(RefCell::new(PendingMap::new())), tracer }
    }

    /// The engine's hook name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs a prefix interceptor on `module_name::symbol`.
    ///
    /// Applies immediately when the module is loaded in `registry`
    /// (failing with [`PatchError::SymbolNotFound`] if the symbol is
    /// absent); otherwise queues the request for the engine's load hook.
    pub fn prefix(
        &mut self,
        registry: &mut ModuleRegistry,
        module_name: &str,
        symbol: &str,
        interceptor: Interceptor,
    ) -> Result<(), PatchError> {
        self.apply_or_enqueue(registry, module_name, symbol, PatchKind::Prefix, interceptor)
    }

    /// Installs a postfix interceptor on `module_name::symbol`.
    ///
    /// Resolution and queueing behave exactly like [`Engine::prefix`].
    pub fn postfix(
        &mut self,
        registry: &mut ModuleRegistry,
        module_name: &str,
        symbol: &str,
        interceptor: Interceptor,
    ) -> Result<(), PatchError> {
        self.apply_or_enqueue(registry, module_name, symbol, PatchKind::Postfix, interceptor)
    }

    /// Installs a prefix interceptor directly on a module the caller holds,
    /// bypassing the registry and the pending queue.
    pub fn prefix_in(&mut self, module: &mut Module, symbol: &str, interceptor: Interceptor) -> Result<(), PatchError> {
        apply(module, PatchKind::Prefix, symbol, interceptor, &mut self.tracer)
    }

    /// Installs a postfix interceptor directly on a module the caller holds.
    pub fn postfix_in(&mut self, module: &mut Module, symbol: &str, interceptor: Interceptor) -> Result<(), PatchError> {
        apply(module, PatchKind::Postfix, symbol, interceptor, &mut self.tracer)
    }

    /// Returns how many requests are queued for `module_name`.
    #[must_use]
    pub fn pending_count(&self, module_name: &str) -> usize {
        self.pending.borrow().get(module_name).map_or(0, Vec::len)
    }

    fn apply_or_enqueue(
        &mut self,
        registry: &mut ModuleRegistry,
        module_name: &str,
        symbol: &str,
        kind: PatchKind,
        interceptor: Interceptor,
    ) -> Result<(), PatchError> {
        self.ensure_hooked(registry);
        if let Some(module) = registry.get_mut(module_name) {
            apply(module, kind, symbol, interceptor, &mut self.tracer)
        } else {
            self.pending
                .borrow_mut()
                .entry(module_name.to_owned())
                .or_default()
                .push(PendingPatch { kind, symbol: symbol.to_owned(), interceptor });
            self.tracer.on_event(TraceEvent::PatchQueued {
                module: module_name.to_owned(),
                symbol: symbol.to_owned(),
            });
            Ok(())
        }
    }

    /// Subscribes this engine's load hook, once per engine name.
    fn ensure_hooked(&self, registry: &mut ModuleRegistry) {
        if !registry.is_subscribed(&self.name) {
            registry.subscribe(Box::new(EngineHook {
                name: self.name.clone(),
                pending: Rc::clone(&self.pending),
                tracer: self.tracer.clone(),
            }));
        }
    }
}

/// Installs `interceptor` around `module::symbol`, replacing the current
/// binding with a wrapper over it.
fn apply(
    module: &mut Module,
    kind: PatchKind,
    symbol: &str,
    mut interceptor: Interceptor,
    tracer: &mut impl PatchTracer,
) -> Result<(), PatchError> {
    if !module.contains(symbol) {
        return Err(PatchError::SymbolNotFound { module: module.name().to_owned(), symbol: symbol.to_owned() });
    }
    interceptor.prepare(tracer)?;
    module.rebind(symbol, |inner| {
        Callable::Wrapped(Box::new(Wrapper { kind: kind.into(), interceptor, inner: Box::new(inner) }))
    })?;
    tracer.on_event(match kind {
        PatchKind::Prefix => TraceEvent::PrefixApplied { module: module.name().to_owned(), symbol: symbol.to_owned() },
        PatchKind::Postfix => {
            TraceEvent::PostfixApplied { module: module.name().to_owned(), symbol: symbol.to_owned() }
        }
    });
    Ok(())
}

/// The engine's load observer: drains queued requests when their module
/// becomes available.
struct EngineHook<Tr: PatchTracer> {
    name: String,
    pending: Rc<RefCell<PendingMap>>,
    tracer: Tr,
}

impl<Tr: PatchTracer> LoadObserver for EngineHook<Tr> {
    fn name(&self) -> &str {
        &self.name
    }

    fn module_loaded(&mut self, module: &mut Module) {
        // Remove the whole entry list up front: a snapshot that guarantees
        // exactly-once application even if a drained interceptor queues new
        // requests for the same name.
        let Some(entries) = self.pending.borrow_mut().remove(module.name()) else {
            return;
        };
        for entry in entries {
            let PendingPatch { kind, symbol, interceptor } = entry;
            match apply(module, kind, &symbol, interceptor, &mut self.tracer) {
                Ok(()) => {
                    self.tracer
                        .on_event(TraceEvent::PendingDrained { module: module.name().to_owned(), symbol });
                }
                // A load must stay transparent to its loader, so a request
                // that no longer applies is reported and dropped.
                Err(err) => self.tracer.on_event(TraceEvent::DrainFailed {
                    module: module.name().to_owned(),
                    symbol,
                    error: err.to_string(),
                }),
            }
        }
    }
}
