use super::op::Op;
use crate::value::Value;

/// A compiled code object: the instruction list plus everything needed to
/// execute and rewrite it.
///
/// # Local Layout
///
/// Local slots have a predictable layout that the rewriter relies on:
/// ```text
/// [params...][locals...]
/// ```
/// Slots `0..param_count` are the declared parameters in declaration order;
/// the remaining slots are plain locals. `local_names` covers both regions,
/// so any named local can be resolved to a slot for capture insertion.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Code {
    /// The instruction list.
    pub ops: Vec<Op>,
    /// Constants referenced by `LoadConst`.
    pub consts: Vec<Value>,
    /// Names of all local slots, parameters first.
    pub local_names: Vec<String>,
    /// Number of leading `local_names` entries that are parameters.
    pub param_count: usize,
}

impl Code {
    /// Resolves a local name to its slot index.
    #[must_use]
    pub fn local_slot(&self, name: &str) -> Option<u16> {
        self.local_names
            .iter()
            .position(|n| n == name)
            .map(|idx| u16::try_from(idx).expect("local slot fits in u16"))
    }

    /// Returns the declared parameter names, in declaration order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.local_names[..self.param_count]
    }

    /// Returns the number of local slots a frame for this code needs.
    #[must_use]
    pub fn locals_len(&self) -> usize {
        self.local_names.len()
    }
}
