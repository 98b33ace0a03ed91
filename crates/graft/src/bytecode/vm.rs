//! Stack machine executing a single code object.
//!
//! The VM runs one frame at a time: the mini-language has no intra-language
//! calls, so there is no frame stack and no suspension. Execution is fully
//! synchronous and every failure surfaces as a [`RunError`] to the caller.

use super::{code::Code, op::Op};
use crate::{errors::RunError, value::Value};

/// The mini-language virtual machine.
///
/// A `Vm` owns only its operand stack, which is reused across runs to avoid
/// repeated allocation. Locals are supplied by the caller (bound from call
/// arguments) and given back implicitly through out-variable captures.
#[derive(Debug, Default)]
pub struct Vm {
    stack: Vec<Value>,
}

impl Vm {
    /// Creates a VM with an empty operand stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes `code` against the given locals and closure bindings,
    /// returning the value produced by the first `Return` executed.
    ///
    /// `locals` must have exactly `code.locals_len()` entries; unbound slots
    /// hold `Value::Undefined` and fail with `RunError::UnboundLocal` when
    /// loaded.
    pub fn run(&mut self, code: &Code, locals: &mut [Value], closure: &[Value]) -> Result<Value, RunError> {
        debug_assert_eq!(locals.len(), code.locals_len(), "locals must match code layout");
        self.stack.clear();
        let mut ip = 0usize;

        while let Some(op) = code.ops.get(ip).copied() {
            ip += 1;
            match op {
                Op::LoadConst(idx) => self.stack.push(code.consts[idx as usize].clone()),
                Op::LoadLocal(slot) => {
                    let value = &locals[slot as usize];
                    if matches!(value, Value::Undefined) {
                        return Err(RunError::UnboundLocal { name: code.local_names[slot as usize].clone() });
                    }
                    self.stack.push(value.clone());
                }
                Op::StoreLocal(slot) => locals[slot as usize] = self.pop(),
                Op::LoadClosure(slot) => self.stack.push(closure[slot as usize].clone()),
                Op::Pop => {
                    self.pop();
                }
                Op::Dup => {
                    let top = self.stack.last().expect("Dup on empty stack").clone();
                    self.stack.push(top);
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.stack.push(binary_arith(op, lhs, rhs)?);
                }
                Op::Eq => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.stack.push(Value::Bool(lhs == rhs));
                }
                Op::Ne => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.stack.push(Value::Bool(lhs != rhs));
                }
                Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.stack.push(Value::Bool(compare(op, &lhs, &rhs)?));
                }
                Op::Not => {
                    let top = self.pop();
                    self.stack.push(Value::Bool(!top.is_truthy()));
                }
                Op::Jump(target) => ip = target as usize,
                Op::JumpIfFalse(target) => {
                    if !self.pop().is_truthy() {
                        ip = target as usize;
                    }
                }
                Op::BuildTuple(count) => {
                    let at = self.stack.len() - count as usize;
                    let items = self.stack.split_off(at);
                    self.stack.push(Value::Tuple(items));
                }
                Op::Return => return Ok(self.pop()),
            }
        }

        Err(RunError::MissingReturn { function: String::from("<code>") })
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }
}

/// Applies an arithmetic instruction to two operands.
///
/// Int/Int stays integral (with float division), mixed numeric promotes to
/// float, and `Add` concatenates strings. Everything else is a type error.
fn binary_arith(op: Op, lhs: Value, rhs: Value) -> Result<Value, RunError> {
    match (op, lhs, rhs) {
        (Op::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Op::Div, lhs, rhs) => match (as_float(&lhs), as_float(&rhs)) {
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Err(type_mismatch(op, &lhs, &rhs)),
        },
        (_, Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            Op::Add => a.wrapping_add(b),
            Op::Sub => a.wrapping_sub(b),
            Op::Mul => a.wrapping_mul(b),
            _ => unreachable!("non-arithmetic op in binary_arith"),
        })),
        (_, lhs, rhs) => match (as_float(&lhs), as_float(&rhs)) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                _ => unreachable!("non-arithmetic op in binary_arith"),
            })),
            _ => Err(type_mismatch(op, &lhs, &rhs)),
        },
    }
}

/// Applies an ordering comparison to two operands.
fn compare(op: Op, lhs: &Value, rhs: &Value) -> Result<bool, RunError> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => match (as_float(lhs), as_float(rhs)) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| RunError::type_error("ordering comparison with NaN"))?,
            _ => return Err(type_mismatch(op, lhs, rhs)),
        },
    };
    Ok(match op {
        Op::Lt => ordering.is_lt(),
        Op::Le => ordering.is_le(),
        Op::Gt => ordering.is_gt(),
        Op::Ge => ordering.is_ge(),
        _ => unreachable!("non-comparison op in compare"),
    })
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(*b)),
        _ => None,
    }
}

fn type_mismatch(op: Op, lhs: &Value, rhs: &Value) -> RunError {
    RunError::type_error(format!(
        "unsupported operand types for {op}: '{}' and '{}'",
        lhs.type_name(),
        rhs.type_name()
    ))
}
