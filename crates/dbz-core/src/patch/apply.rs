//! Patch application.
//!
//! Operations run in authoring order against the current state of the
//! target. The first failing operation halts the patch: earlier mutations
//! stay in place and the remaining operations are reported as skipped.

use dbz_path::Path;

use super::types::{Op, OpOutcome, OpStatus, Patch, PatchError, PatchOutcome};
use crate::{DocError, Document, Number, Value};

fn invalid(path: &Path, reason: DocError) -> PatchError {
    PatchError::InvalidTarget {
        path: path.clone(),
        reason,
    }
}

/// Reads the value at `path`; the root reads as the whole document.
fn read_at(doc: &Document, path: &Path) -> Option<Value> {
    if path.is_root() {
        return Some(Value::Document(doc.clone()));
    }
    doc.get_path(path).cloned()
}

fn apply_add(doc: &mut Document, path: &Path, value: Value) -> Result<(), PatchError> {
    doc.set_path(path, value)
        .map(|_| ())
        .map_err(|e| invalid(path, e))
}

fn apply_remove(doc: &mut Document, path: &Path) -> Result<(), PatchError> {
    if path.is_root() {
        doc.clear();
        return Ok(());
    }
    doc.remove_path(path)
        .map(|_| ())
        .ok_or_else(|| PatchError::NotFound(path.clone()))
}

fn apply_replace(doc: &mut Document, path: &Path, value: Value) -> Result<(), PatchError> {
    if !path.is_root() && !doc.has_path(path) {
        return Err(PatchError::NotFound(path.clone()));
    }
    apply_add(doc, path, value)
}

fn apply_copy(doc: &mut Document, path: &Path, from: &Path) -> Result<(), PatchError> {
    let value = read_at(doc, from).ok_or_else(|| PatchError::NotFound(from.clone()))?;
    apply_add(doc, path, value)
}

fn apply_move(doc: &mut Document, path: &Path, from: &Path) -> Result<(), PatchError> {
    // A value cannot be moved into its own subtree.
    if path.is_descendant_of(from) || from.is_root() {
        return Err(PatchError::InvalidOp(format!("cannot move {from} into {path}")));
    }
    let value = doc
        .get_path(from)
        .cloned()
        .ok_or_else(|| PatchError::NotFound(from.clone()))?;
    if path == from {
        return Ok(());
    }
    doc.remove_path(from);
    apply_add(doc, path, value)
}

fn apply_increment(doc: &mut Document, path: &Path, by: &Number) -> Result<(), PatchError> {
    let current = match doc.get_path(path) {
        None if !path.is_root() => Number::Int(0),
        Some(v) if v.is_number() => v
            .as_number()
            .ok_or_else(|| PatchError::NotANumber(path.clone()))?,
        _ => return Err(PatchError::NotANumber(path.clone())),
    };
    apply_add(doc, path, Value::from(current.add(by)))
}

fn apply_require(doc: &Document, path: &Path, expected: &Value) -> Result<(), PatchError> {
    let actual = read_at(doc, path);
    match &actual {
        Some(v) if v.matches(expected) => Ok(()),
        _ => Err(PatchError::RequireFailed {
            path: path.clone(),
            expected: expected.clone(),
            actual,
        }),
    }
}

// ── Main apply function ───────────────────────────────────────────────────

/// Apply a single operation to the document (in-place mutation).
pub fn apply_op(doc: &mut Document, op: &Op) -> Result<(), PatchError> {
    match op {
        Op::Add { path, value } => apply_add(doc, path, value.clone()),
        Op::Remove { path } => apply_remove(doc, path),
        Op::Replace { path, value } => apply_replace(doc, path, value.clone()),
        Op::Move { path, from } => apply_move(doc, path, from),
        Op::Copy { path, from } => apply_copy(doc, path, from),
        Op::Increment { path, by } => apply_increment(doc, path, by),
        Op::Require { path, value } => apply_require(doc, path, value),
    }
}

/// Apply a sequence of operations, stopping at the first failure.
pub fn apply_ops(doc: &mut Document, ops: &[Op]) -> PatchOutcome {
    let mut outcome = PatchOutcome {
        ops: Vec::with_capacity(ops.len()),
    };
    let mut halted = false;
    for (index, op) in ops.iter().enumerate() {
        let status = if halted {
            OpStatus::Skipped
        } else {
            match apply_op(doc, op) {
                Ok(()) => OpStatus::Applied,
                Err(err) => {
                    log::debug!("op #{index} ({} {}) failed: {err}", op.op_name(), op.path());
                    halted = true;
                    OpStatus::Failed(err)
                }
            }
        };
        outcome.ops.push(OpOutcome {
            action: op.action(),
            path: op.path().clone(),
            status,
        });
    }
    outcome
}

impl<T> Patch<T> {
    /// Applies this patch to `doc`. The patch itself is never modified.
    pub fn apply(&self, doc: &mut Document) -> PatchOutcome {
        apply_ops(doc, &self.ops)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
