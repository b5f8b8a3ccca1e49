//! Patches: ordered, addressed changes to a document.
//!
//! # Operations
//!
//! `add`, `remove`, `replace`, `move` and `copy` follow JSON Patch
//! (RFC 6902), except that `add` creates missing intermediate documents.
//! Two extensions:
//!
//! - `increment` adds a number to the value at a path, treating an absent
//!   value as zero.
//! - `require` is an optimistic-concurrency precondition: the patch halts
//!   unless the value at the path matches the expected value.

pub mod apply;
pub mod codec;
pub mod editor;
pub mod types;

pub use apply::{apply_op, apply_ops};
pub use editor::Editor;
pub use types::{Action, Op, OpOutcome, OpStatus, Patch, PatchError, PatchOutcome};
