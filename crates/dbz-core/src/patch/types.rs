//! Core types for patches.

use dbz_path::Path;
use thiserror::Error;

use crate::{DocError, Number, Value};

// ── Error ─────────────────────────────────────────────────────────────────

/// Why a single operation could not be applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatchError {
    #[error("NOT_FOUND: {0}")]
    NotFound(Path),
    #[error("NOT_A_NUMBER: {0}")]
    NotANumber(Path),
    #[error(
        "REQUIRE_FAILED: {path} expected {expected}, found {}",
        .actual.as_ref().map_or_else(|| "nothing".to_string(), ToString::to_string)
    )]
    RequireFailed {
        path: Path,
        expected: Value,
        actual: Option<Value>,
    },
    #[error("INVALID_TARGET: {path}: {reason}")]
    InvalidTarget { path: Path, reason: DocError },
    #[error("INVALID_OP: {0}")]
    InvalidOp(String),
}

// ── Op enum ───────────────────────────────────────────────────────────────

/// The kind of an [`Op`], as written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Increment,
    Require,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Replace => "replace",
            Action::Move => "move",
            Action::Copy => "copy",
            Action::Increment => "increment",
            Action::Require => "require",
        }
    }

    pub fn from_str(s: &str) -> Result<Action, PatchError> {
        match s {
            "add" => Ok(Action::Add),
            "remove" => Ok(Action::Remove),
            "replace" => Ok(Action::Replace),
            "move" => Ok(Action::Move),
            "copy" => Ok(Action::Copy),
            "increment" => Ok(Action::Increment),
            "require" => Ok(Action::Require),
            other => Err(PatchError::InvalidOp(format!("unknown op: {other}"))),
        }
    }
}

/// One addressed change (or precondition) within a patch.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Add { path: Path, value: Value },
    Remove { path: Path },
    Replace { path: Path, value: Value },
    Move { path: Path, from: Path },
    Copy { path: Path, from: Path },
    Increment { path: Path, by: Number },
    Require { path: Path, value: Value },
}

impl Op {
    pub fn action(&self) -> Action {
        match self {
            Op::Add { .. } => Action::Add,
            Op::Remove { .. } => Action::Remove,
            Op::Replace { .. } => Action::Replace,
            Op::Move { .. } => Action::Move,
            Op::Copy { .. } => Action::Copy,
            Op::Increment { .. } => Action::Increment,
            Op::Require { .. } => Action::Require,
        }
    }

    pub fn op_name(&self) -> &'static str {
        self.action().as_str()
    }

    /// The path the operation writes to (or checks, for REQUIRE).
    pub fn path(&self) -> &Path {
        match self {
            Op::Add { path, .. }
            | Op::Remove { path }
            | Op::Replace { path, .. }
            | Op::Move { path, .. }
            | Op::Copy { path, .. }
            | Op::Increment { path, .. }
            | Op::Require { path, .. } => path,
        }
    }

    /// Source path of MOVE and COPY.
    pub fn from(&self) -> Option<&Path> {
        match self {
            Op::Move { from, .. } | Op::Copy { from, .. } => Some(from),
            _ => None,
        }
    }
}

// ── Patch ─────────────────────────────────────────────────────────────────

/// An ordered list of operations addressed to one target.
///
/// Patches are built with an [`Editor`](crate::patch::Editor) and never
/// change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch<T> {
    pub(crate) target: T,
    pub(crate) ops: Vec<Op>,
}

impl<T> Patch<T> {
    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// A patch with no operations only reads its target.
    pub fn is_read_request(&self) -> bool {
        self.ops.is_empty()
    }

    /// True for the single root REMOVE that deletes the whole target.
    pub fn is_deletion(&self) -> bool {
        matches!(self.ops.as_slice(), [Op::Remove { path }] if path.is_root())
    }
}

// ── Outcome types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OpStatus {
    Applied,
    Failed(PatchError),
    /// Not attempted because an earlier operation failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpOutcome {
    pub action: Action,
    pub path: Path,
    pub status: OpStatus,
}

/// Per-operation result of applying a patch, in authoring order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatchOutcome {
    pub ops: Vec<OpOutcome>,
}

impl PatchOutcome {
    pub fn is_success(&self) -> bool {
        self.ops.iter().all(|o| o.status == OpStatus::Applied)
    }

    /// The operation that halted the patch, if any.
    pub fn failed_op(&self) -> Option<&OpOutcome> {
        self.ops
            .iter()
            .find(|o| matches!(o.status, OpStatus::Failed(_)))
    }

    pub fn failure(&self) -> Option<&PatchError> {
        self.failed_op().and_then(|o| match &o.status {
            OpStatus::Failed(err) => Some(err),
            _ => None,
        })
    }

    pub fn applied(&self) -> usize {
        self.ops
            .iter()
            .filter(|o| o.status == OpStatus::Applied)
            .count()
    }

    pub fn into_result(self) -> Result<(), PatchError> {
        match self.ops.into_iter().find_map(|o| match o.status {
            OpStatus::Failed(err) => Some(err),
            _ => None,
        }) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
