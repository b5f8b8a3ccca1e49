//! Core logic behind the `dbz-patch` binary: apply a patch, written as a
//! JSON array of operations, to a JSON document.

use crate::codec::{self, CodecError};
use crate::patch::codec::op_from_document;
use crate::patch::{apply_ops, Op};

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CliError {
    Json(serde_json::Error),
    Codec(CodecError),
    Patch(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Json(e) => write!(f, "{e}"),
            CliError::Codec(e) => write!(f, "{e}"),
            CliError::Patch(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<CodecError> for CliError {
    fn from(e: CodecError) -> Self {
        CliError::Codec(e)
    }
}

// ── dbz-patch ─────────────────────────────────────────────────────────────

/// Result of [`apply_patch_json`].
#[derive(Debug)]
pub struct PatchReport {
    /// The document after every applied operation, pretty-printed.
    pub document: String,
    /// Why the patch halted, if it did.
    pub failure: Option<String>,
}

/// Parses a JSON array of operations such as
/// `[{"op":"add","path":"/b","value":2}]`.
pub fn parse_ops(ops_json: &str) -> Result<Vec<Op>, CliError> {
    let raw: serde_json::Value = serde_json::from_str(ops_json)?;
    let items = raw
        .as_array()
        .ok_or_else(|| CliError::Patch("patch must be a JSON array".to_string()))?;
    items
        .iter()
        .map(|item| {
            let doc = codec::from_json(item)?;
            op_from_document(&doc).map_err(|e| CliError::Patch(e.to_string()))
        })
        .collect()
}

/// Applies `ops_json` to `doc_json`.
///
/// A failing operation is not an error here: the report carries the
/// partially patched document together with the failure.
pub fn apply_patch_json(doc_json: &str, ops_json: &str) -> Result<PatchReport, CliError> {
    let mut doc = codec::read_str(doc_json)?;
    let ops = parse_ops(ops_json)?;
    let outcome = apply_ops(&mut doc, &ops);
    Ok(PatchReport {
        document: codec::write_pretty(&doc)?,
        failure: outcome.failure().map(ToString::to_string),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────
