use crate::{
    args::ArgValues,
    bytecode::{Code, Vm},
    errors::RunError,
    value::Value,
};

/// A defined function in the mini-language.
///
/// Contains everything needed to execute the function: the instruction-list
/// code object, default parameter values, and closure bindings. The
/// out-variable rewriter attaches its metadata directly to the function
/// through the `patch` field, so patch state travels with the callable and
/// its identity and call signature never change.
///
/// # Defaults Layout
///
/// Defaults cover the trailing parameters: with parameters `[a, b, c]` and
/// two defaults, `b` and `c` are defaulted. This matches the slot layout
/// documented on [`Code`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Function {
    /// The function name (used in error messages and trace events).
    pub name: String,
    /// The compiled instruction list and local layout.
    pub code: Code,
    /// Default values for the trailing parameters.
    pub defaults: Vec<Value>,
    /// Values captured from an enclosing environment, read via `LoadClosure`.
    pub closure: Vec<Value>,
    /// Out-variable patch metadata; `None` means not patched.
    pub patch: Option<PatchInfo>,
}

/// Metadata attached to an out-variable-patched function.
///
/// Exists exactly while the function is patched: an empty capture set means
/// "not patched" and is represented by the absence of this struct, never by
/// an empty `captured` list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatchInfo {
    /// Captured parameter names, most recently requested first. The return
    /// tuple is `(original_result, captured[0], captured[1], ...)`.
    pub captured: Vec<String>,
    /// A structurally independent copy of the pre-patch function: code,
    /// name, defaults, and closure bindings. Restoring it undoes the patch
    /// exactly.
    pub original: Box<Function>,
}

impl Function {
    /// Creates a function from its parts, unpatched.
    #[must_use]
    pub fn new(name: impl Into<String>, code: Code, defaults: Vec<Value>, closure: Vec<Value>) -> Self {
        debug_assert!(defaults.len() <= code.param_count, "more defaults than parameters");
        Self { name: name.into(), code, defaults, closure, patch: None }
    }

    /// Creates a structurally independent copy via a serialization
    /// round-trip, sharing no allocations with `self`.
    ///
    /// # Panics
    /// Panics if serialization fails, which should not happen for
    /// well-formed functions.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        let bytes = postcard::to_allocvec(self).expect("function serialization should not fail");
        postcard::from_bytes(&bytes).expect("function deserialization should not fail")
    }

    /// Binds call arguments to a fresh locals vector.
    ///
    /// Positional arguments fill parameter slots in order, keyword arguments
    /// bind by name, remaining parameters take their defaults, and all
    /// non-parameter locals start unbound.
    pub fn bind_args(&self, args: &ArgValues) -> Result<Vec<Value>, RunError> {
        let params = self.code.param_names();
        if args.positional.len() > params.len() {
            return Err(RunError::Arity {
                function: self.name.clone(),
                expected: params.len(),
                given: args.positional.len(),
            });
        }

        let mut locals = vec![Value::Undefined; self.code.locals_len()];
        for (slot, value) in args.positional.iter().enumerate() {
            locals[slot] = value.clone();
        }

        for (keyword, value) in &args.keyword {
            let Some(slot) = params.iter().position(|p| p == keyword) else {
                return Err(RunError::UnexpectedKeyword {
                    function: self.name.clone(),
                    keyword: keyword.clone(),
                });
            };
            if !matches!(locals[slot], Value::Undefined) {
                return Err(RunError::DuplicateArgument {
                    function: self.name.clone(),
                    parameter: keyword.clone(),
                });
            }
            locals[slot] = value.clone();
        }

        let first_defaulted = params.len() - self.defaults.len();
        for slot in 0..params.len() {
            if matches!(locals[slot], Value::Undefined) {
                if slot >= first_defaulted {
                    locals[slot] = self.defaults[slot - first_defaulted].clone();
                } else {
                    return Err(RunError::MissingArgument {
                        function: self.name.clone(),
                        parameter: params[slot].clone(),
                    });
                }
            }
        }

        Ok(locals)
    }

    /// Binds arguments and executes the function on the given VM.
    pub fn call(&self, vm: &mut Vm, args: &ArgValues) -> Result<Value, RunError> {
        let mut locals = self.bind_args(args)?;
        vm.run(&self.code, &mut locals, &self.closure)
    }
}
