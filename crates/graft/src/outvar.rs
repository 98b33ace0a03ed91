//! Out-variable rewriting.
//!
//! Rewrites a function's instruction sequence in place so that every return
//! point yields `(original_result, captured_param_1, ...)` instead of the
//! bare value. The rewrite is reversible: a structurally independent copy of
//! the pre-patch function is retained in the attached [`PatchInfo`] and
//! [`unpatch`] restores it exactly.
//!
//! The captured values are read at each return point as it executes, not
//! snapshotted once: a function with several returns reports the locals as
//! they stand on whichever path actually runs.

use crate::{
    bytecode::{Code, Op},
    errors::PatchError,
    function::{Function, PatchInfo},
};

/// Patches `func` to also return the final values of the named locals.
///
/// `names` are captured most-recently-requested first: patching an
/// already-patched function prepends the new names to the existing capture
/// list (dropping duplicates) and rewrites from the retained original, so
/// repeated patching equals one patch with the union of names.
///
/// An empty `names` is a successful no-op that leaves `func` untouched.
/// Unknown names fail with [`PatchError::UnknownParameter`] before any
/// mutation happens.
pub fn patch(func: &mut Function, names: &[&str]) -> Result<(), PatchError> {
    if names.is_empty() {
        return Ok(());
    }

    // Rewriting always starts from the pre-patch function so repeated
    // patches never stack capture prologues.
    let base = match &func.patch {
        Some(info) => info.original.deep_clone(),
        None => func.deep_clone(),
    };

    for name in names {
        if base.code.local_slot(name).is_none() {
            return Err(PatchError::UnknownParameter {
                function: base.name.clone(),
                parameter: (*name).to_owned(),
            });
        }
    }

    let mut captured: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !captured.iter().any(|c| c == name) {
            captured.push((*name).to_owned());
        }
    }
    if let Some(info) = &func.patch {
        for old in &info.captured {
            if !captured.contains(old) {
                captured.push(old.clone());
            }
        }
    }

    func.code = rewrite_returns(&base.code, &captured);
    func.defaults = base.defaults.clone();
    func.closure = base.closure.clone();
    func.patch = Some(PatchInfo { captured, original: Box::new(base) });
    Ok(())
}

/// Patches `func` to capture all of its declared parameters.
///
/// A function with no parameters is left untouched, mirroring the empty
/// capture-set no-op.
pub fn patch_all(func: &mut Function) -> Result<(), PatchError> {
    let names: Vec<String> = func
        .patch
        .as_ref()
        .map_or(&func.code, |info| &info.original.code)
        .param_names()
        .to_vec();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    patch(func, &names)
}

/// Restores the exact pre-patch function and discards the metadata.
///
/// Returns `false` (and leaves `func` untouched) when it is not patched.
pub fn unpatch(func: &mut Function) -> bool {
    match func.patch.take() {
        Some(info) => {
            *func = *info.original;
            true
        }
        None => false,
    }
}

/// Returns whether `func` currently carries an out-variable patch.
#[must_use]
pub fn is_patched(func: &Function) -> bool {
    func.patch.is_some()
}

/// Returns the patch metadata, or `None` when unpatched.
#[must_use]
pub fn get_info(func: &Function) -> Option<&PatchInfo> {
    func.patch.as_ref()
}

/// Returns the captured names (most recent first), or `None` when unpatched.
#[must_use]
pub fn get_capture(func: &Function) -> Option<&[String]> {
    func.patch.as_ref().map(|info| info.captured.as_slice())
}

/// Returns the retained pre-patch function, or `None` when unpatched.
#[must_use]
pub fn get_original(func: &Function) -> Option<&Function> {
    func.patch.as_ref().map(|info| info.original.as_ref())
}

/// Inserts the capture prologue before every `Return` in `code`.
///
/// Each return point gains one `LoadLocal` per captured name (capture-list
/// order) followed by `BuildTuple(n + 1)`, packing the original return value
/// first. Jump targets are remapped so a jump that targeted a return now
/// targets the start of its prologue and every path still captures.
fn rewrite_returns(code: &Code, captured: &[String]) -> Code {
    let slots: Vec<u16> = captured
        .iter()
        .map(|name| code.local_slot(name).expect("capture names validated against code"))
        .collect();

    // First pass: where each old instruction lands once prologues are added.
    let prologue_len = slots.len() + 1;
    let mut new_pos = Vec::with_capacity(code.ops.len());
    let mut pos: usize = 0;
    for op in &code.ops {
        new_pos.push(u16::try_from(pos).expect("rewritten code fits in u16 indices"));
        pos += if *op == Op::Return { 1 + prologue_len } else { 1 };
    }

    // Second pass: emit with prologues inserted and jumps remapped.
    let mut ops = Vec::with_capacity(pos);
    let tuple_len = u16::try_from(slots.len() + 1).expect("capture count fits in u16");
    for op in &code.ops {
        if let Some(target) = op.jump_target() {
            ops.push(op.with_jump_target(new_pos[target as usize]));
        } else if *op == Op::Return {
            for slot in &slots {
                ops.push(Op::LoadLocal(*slot));
            }
            ops.push(Op::BuildTuple(tuple_len));
            ops.push(Op::Return);
        } else {
            ops.push(*op);
        }
    }

    Code {
        ops,
        consts: code.consts.clone(),
        local_names: code.local_names.clone(),
        param_count: code.param_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CodeBuilder;

    fn identity_fn() -> Function {
        let mut b = CodeBuilder::new("ident");
        let x = b.param("x");
        b.emit(Op::LoadLocal(x));
        b.emit(Op::Return);
        b.build()
    }

    #[test]
    fn rewrite_inserts_prologue_before_each_return() {
        let func = identity_fn();
        let code = rewrite_returns(&func.code, &[String::from("x")]);
        assert_eq!(
            code.ops,
            vec![Op::LoadLocal(0), Op::LoadLocal(0), Op::BuildTuple(2), Op::Return]
        );
    }

    #[test]
    fn rewrite_remaps_jump_onto_return() {
        // JumpIfFalse targets the second Return; after rewriting it must
        // target that return's prologue so the jumping path still captures.
        let mut b = CodeBuilder::new("f");
        let x = b.param("x");
        b.emit(Op::LoadLocal(x));
        let label = b.emit_jump(Op::JumpIfFalse(0));
        b.load_const(1i64);
        b.emit(Op::Return);
        b.patch_jump(label);
        b.load_const(2i64);
        b.emit(Op::Return);
        let func = b.build();

        let code = rewrite_returns(&func.code, &[String::from("x")]);
        // Old layout: [LoadLocal, JumpIfFalse(4), LoadConst, Return, LoadConst, Return]
        // Each Return grows by 2 ops, so old index 4 lands at 6.
        assert_eq!(code.ops[1], Op::JumpIfFalse(6));
        assert_eq!(code.ops[6], Op::LoadConst(1));
    }

    #[test]
    fn unknown_name_is_rejected_without_mutation() {
        let mut func = identity_fn();
        let before = func.clone();
        let err = patch(&mut func, &["nope"]).unwrap_err();
        assert_eq!(
            err,
            PatchError::UnknownParameter { function: "ident".to_owned(), parameter: "nope".to_owned() }
        );
        assert_eq!(func, before);
    }

    #[test]
    fn empty_names_is_a_noop() {
        let mut func = identity_fn();
        let before = func.clone();
        patch(&mut func, &[]).unwrap();
        assert_eq!(func, before);
        assert!(!is_patched(&func));
    }

    #[test]
    fn accessors_absent_when_unpatched() {
        let func = identity_fn();
        assert!(!is_patched(&func));
        assert!(get_info(&func).is_none());
        assert!(get_capture(&func).is_none());
        assert!(get_original(&func).is_none());
    }

    #[test]
    fn repeated_patch_deduplicates_names() {
        let mut b = CodeBuilder::new("f");
        let a = b.param("a");
        b.param("b");
        b.emit(Op::LoadLocal(a));
        b.emit(Op::Return);
        let mut func = b.build();

        patch(&mut func, &["a"]).unwrap();
        patch(&mut func, &["b", "a"]).unwrap();
        assert_eq!(get_capture(&func).unwrap(), ["b", "a"]);
    }
}
