//! Builder for assembling code objects by hand.
//!
//! `CodeBuilder` provides methods for declaring parameters and locals,
//! emitting instructions, pooling constants, and handling forward jumps with
//! patching. It is the front door for constructing [`Function`]s in tests
//! and host code, since this crate has no source-language compiler.

use super::{code::Code, op::Op};
use crate::{function::Function, value::Value};

/// A forward-jump placeholder returned by [`CodeBuilder::emit_jump`].
///
/// Resolve it with [`CodeBuilder::patch_jump`] once the target instruction
/// position is known.
#[derive(Debug, Clone, Copy)]
#[must_use = "an unpatched jump targets instruction 0"]
pub struct JumpLabel(usize);

/// Builder for assembling a [`Function`] instruction by instruction.
///
/// # Usage
///
/// ```
/// use graft::{CodeBuilder, Op};
///
/// let mut b = CodeBuilder::new("add");
/// let a = b.param("a");
/// let bb = b.param("b");
/// b.emit(Op::LoadLocal(a));
/// b.emit(Op::LoadLocal(bb));
/// b.emit(Op::Add);
/// b.emit(Op::Return);
/// let func = b.build();
/// ```
#[derive(Debug, Default)]
pub struct CodeBuilder {
    name: String,
    ops: Vec<Op>,
    consts: Vec<Value>,
    local_names: Vec<String>,
    param_count: usize,
    defaults: Vec<Value>,
    closure: Vec<Value>,
}

impl CodeBuilder {
    /// Creates a builder for a function with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Declares a required parameter, returning its local slot.
    ///
    /// # Panics
    /// Panics if called after a defaulted parameter or a plain local has
    /// been declared, since slot layout is params-first and defaults are
    /// trailing.
    pub fn param(&mut self, name: impl Into<String>) -> u16 {
        assert!(
            self.local_names.len() == self.param_count,
            "parameters must be declared before locals"
        );
        assert!(self.defaults.is_empty(), "required parameters must precede defaulted ones");
        self.param_count += 1;
        self.push_local(name)
    }

    /// Declares a parameter with a default value, returning its local slot.
    ///
    /// # Panics
    /// Panics if called after a plain local has been declared.
    pub fn param_with_default(&mut self, name: impl Into<String>, default: impl Into<Value>) -> u16 {
        assert!(
            self.local_names.len() == self.param_count,
            "parameters must be declared before locals"
        );
        self.param_count += 1;
        self.defaults.push(default.into());
        self.push_local(name)
    }

    /// Declares a plain (non-parameter) local, returning its slot.
    pub fn local(&mut self, name: impl Into<String>) -> u16 {
        self.push_local(name)
    }

    /// Appends a closure binding, returning its closure slot.
    pub fn closure_binding(&mut self, value: impl Into<Value>) -> u16 {
        self.closure.push(value.into());
        u16::try_from(self.closure.len() - 1).expect("closure slot fits in u16")
    }

    /// Emits a single instruction.
    pub fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Pools a constant and emits a `LoadConst` for it.
    ///
    /// Identical constants share a pool entry.
    pub fn load_const(&mut self, value: impl Into<Value>) {
        let value = value.into();
        let idx = self.consts.iter().position(|c| *c == value).unwrap_or_else(|| {
            self.consts.push(value);
            self.consts.len() - 1
        });
        self.emit(Op::LoadConst(u16::try_from(idx).expect("const index fits in u16")));
    }

    /// Emits a forward jump with an unresolved target.
    pub fn emit_jump(&mut self, op: Op) -> JumpLabel {
        debug_assert!(op.jump_target().is_some(), "emit_jump requires a jump instruction");
        let at = self.ops.len();
        self.emit(op.with_jump_target(0));
        JumpLabel(at)
    }

    /// Resolves a forward jump to point at the next instruction emitted.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = u16::try_from(self.ops.len()).expect("jump target fits in u16");
        self.ops[label.0] = self.ops[label.0].with_jump_target(target);
    }

    /// Returns the position the next emitted instruction will occupy.
    ///
    /// Useful as a backward-jump target for loops.
    #[must_use]
    pub fn next_position(&self) -> u16 {
        u16::try_from(self.ops.len()).expect("instruction index fits in u16")
    }

    /// Finishes the build, producing a callable [`Function`].
    #[must_use]
    pub fn build(self) -> Function {
        let code = Code {
            ops: self.ops,
            consts: self.consts,
            local_names: self.local_names,
            param_count: self.param_count,
        };
        Function::new(self.name, code, self.defaults, self.closure)
    }

    fn push_local(&mut self, name: impl Into<String>) -> u16 {
        let name = name.into();
        debug_assert!(
            !self.local_names.contains(&name),
            "duplicate local name '{name}'"
        );
        self.local_names.push(name);
        u16::try_from(self.local_names.len() - 1).expect("local slot fits in u16")
    }
}
