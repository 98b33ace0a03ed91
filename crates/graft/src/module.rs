use std::fmt;

use indexmap::IndexMap;

use crate::{
    args::ArgValues,
    bytecode::Vm,
    errors::{PatchError, RunError},
    function::Function,
    intercept::Wrapper,
    value::Value,
};

/// Host-provided function backing a callable symbol.
///
/// The closure is boxed and mutable so hosts can install stateful hooks
/// (counters, recorders) without extra plumbing.
pub struct NativeFunction {
    /// Name used in error messages and repr.
    pub name: String,
    f: Box<dyn FnMut(&ArgValues) -> Result<Value, RunError>>,
}

impl NativeFunction {
    /// Creates a native function from a host closure.
    pub fn new(name: impl Into<String>, f: impl FnMut(&ArgValues) -> Result<Value, RunError> + 'static) -> Self {
        Self { name: name.into(), f: Box::new(f) }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A callable symbol bound inside a module.
///
/// Interception replaces a `Def` or `Native` binding with a `Wrapped`
/// variant holding the previous binding, so repeated interception builds a
/// chain and unwrapping is just a matter of reaching through `inner`.
#[derive(Debug)]
pub enum Callable {
    /// A mini-language function executed on the VM.
    Def(Function),
    /// A host-provided function.
    Native(NativeFunction),
    /// An intercepted symbol: interceptor plus the previous binding.
    Wrapped(Box<Wrapper>),
}

impl Callable {
    /// Invokes the callable with the given arguments.
    ///
    /// For wrapped symbols this runs the whole interception chain; the
    /// external call shape is identical for every variant.
    pub fn call(&mut self, vm: &mut Vm, args: &ArgValues) -> Result<Value, RunError> {
        match self {
            Self::Def(func) => func.call(vm, args),
            Self::Native(native) => (native.f)(args),
            Self::Wrapped(wrapper) => wrapper.call(vm, args),
        }
    }

    /// Returns the name of the underlying callable, reaching through any
    /// wrapper chain.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Def(func) => &func.name,
            Self::Native(native) => &native.name,
            Self::Wrapped(wrapper) => wrapper.inner.name(),
        }
    }

    /// Returns the mini-language function backing this callable, if any,
    /// reaching through any wrapper chain.
    #[must_use]
    pub fn as_def(&self) -> Option<&Function> {
        match self {
            Self::Def(func) => Some(func),
            Self::Native(_) => None,
            Self::Wrapped(wrapper) => wrapper.inner.as_def(),
        }
    }

    /// Placeholder used while a binding is being rewrapped in place.
    pub(crate) fn placeholder() -> Self {
        Self::Native(NativeFunction::new("<rebinding>", |_| {
            Err(RunError::type_error("symbol is being rebound"))
        }))
    }
}

impl From<Function> for Callable {
    fn from(func: Function) -> Self {
        Self::Def(func)
    }
}

impl From<NativeFunction> for Callable {
    fn from(native: NativeFunction) -> Self {
        Self::Native(native)
    }
}

/// A named module: an insertion-ordered symbol table of callables.
///
/// This is the namespace unit the interception engine targets. Wrapping a
/// symbol replaces its binding in place, preserving table order so loaders
/// and iteration observe an unchanged module shape.
#[derive(Debug, Default)]
pub struct Module {
    name: String,
    symbols: IndexMap<String, Callable>,
}

impl Module {
    /// Creates an empty module with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), symbols: IndexMap::new() }
    }

    /// The module's reported name, matched against pending patch queues.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds a symbol, replacing any existing binding with the same name.
    pub fn insert(&mut self, name: impl Into<String>, callable: impl Into<Callable>) {
        self.symbols.insert(name.into(), callable.into());
    }

    /// Looks up a symbol.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Callable> {
        self.symbols.get(name)
    }

    /// Looks up a symbol mutably (required for calling, since native
    /// closures and VM execution take `&mut`).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Callable> {
        self.symbols.get_mut(name)
    }

    /// Returns whether the module binds the named symbol.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Iterates symbol names in insertion order.
    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Convenience: looks up and calls a symbol in one step.
    pub fn call(&mut self, vm: &mut Vm, name: &str, args: &ArgValues) -> Result<Value, RunError> {
        match self.symbols.get_mut(name) {
            Some(callable) => callable.call(vm, args),
            None => Err(RunError::type_error(format!("'{name}' is not defined in module '{}'", self.name))),
        }
    }

    /// Replaces the named binding with a wrapper built from the current one.
    ///
    /// The binding is swapped out, passed to `wrap`, and the result swapped
    /// back in at the same table position. Fails with `SymbolNotFound` when
    /// the symbol is absent; the table is unchanged in that case. Callers
    /// must run any fallible validation before rebinding.
    pub fn rebind(&mut self, name: &str, wrap: impl FnOnce(Callable) -> Callable) -> Result<(), PatchError> {
        let Some(slot) = self.symbols.get_mut(name) else {
            return Err(PatchError::SymbolNotFound { module: self.name.clone(), symbol: name.to_owned() });
        };
        let current = std::mem::replace(slot, Callable::placeholder());
        *slot = wrap(current);
        Ok(())
    }
}
