//! Instruction-list representation and virtual machine.
//!
//! Callables in this crate carry their executable form as a flat list of
//! tagged [`Op`] variants rather than native code, which is what makes
//! in-place rewriting (out-variable capture) possible and reversible.
//!
//! # Module Structure
//!
//! - `op` - Tagged-variant instruction enum
//! - `code` - Code object containing instructions and metadata
//! - `builder` - CodeBuilder for emitting instructions
//! - `vm` - Stack machine executing a code object

pub use builder::{CodeBuilder, JumpLabel};
pub use code::Code;
pub use op::Op;
pub use vm::Vm;

mod builder;
mod code;
mod op;
mod vm;
