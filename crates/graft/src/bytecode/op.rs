/// A single instruction in the mini-language.
///
/// Operands are carried inline in the variant, so the instruction stream is
/// a plain `Vec<Op>` and positions are instruction indices. Jump targets are
/// absolute instruction indices into the owning [`Code`](super::Code)
/// object's op list; rewriting passes that insert instructions must remap
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize, serde::Deserialize)]
pub enum Op {
    /// Pushes constant-pool entry `0` onto the stack.
    LoadConst(u16),
    /// Pushes a copy of local slot `0`; fails on an unbound slot.
    LoadLocal(u16),
    /// Pops the stack into local slot `0`.
    StoreLocal(u16),
    /// Pushes a copy of closure slot `0`.
    LoadClosure(u16),
    /// Pops and discards the top of stack.
    Pop,
    /// Duplicates the top of stack.
    Dup,
    /// Pops two operands and pushes their sum (numeric add or string concat).
    Add,
    /// Pops two operands and pushes their difference.
    Sub,
    /// Pops two operands and pushes their product.
    Mul,
    /// Pops two operands and pushes their float quotient.
    Div,
    /// Pops two operands and pushes equality as a bool.
    Eq,
    /// Pops two operands and pushes inequality as a bool.
    Ne,
    /// Pops two operands and pushes `lhs < rhs`.
    Lt,
    /// Pops two operands and pushes `lhs <= rhs`.
    Le,
    /// Pops two operands and pushes `lhs > rhs`.
    Gt,
    /// Pops two operands and pushes `lhs >= rhs`.
    Ge,
    /// Pops the top of stack and pushes its boolean negation.
    Not,
    /// Unconditional jump to instruction index `0`.
    Jump(u16),
    /// Pops the top of stack; jumps to instruction index `0` when falsy.
    JumpIfFalse(u16),
    /// Pops `0` values and pushes a tuple of them in push order.
    BuildTuple(u16),
    /// Pops the top of stack and returns it from the callable.
    Return,
}

impl Op {
    /// Returns the jump target carried by this instruction, if any.
    #[must_use]
    pub fn jump_target(self) -> Option<u16> {
        match self {
            Self::Jump(target) | Self::JumpIfFalse(target) => Some(target),
            _ => None,
        }
    }

    /// Returns a copy of this instruction with its jump target replaced.
    ///
    /// # Panics
    /// Panics if the instruction carries no jump target.
    #[must_use]
    pub fn with_jump_target(self, target: u16) -> Self {
        match self {
            Self::Jump(_) => Self::Jump(target),
            Self::JumpIfFalse(_) => Self::JumpIfFalse(target),
            other => panic!("{other} carries no jump target"),
        }
    }
}
