//! Patch ↔ [`Document`] conversion.
//!
//! A patch travels as
//!
//! ```text
//! {"target": "db/contacts/default/1",
//!  "ops": [{"op": "add", "path": "/name", "value": "Sally"},
//!          {"op": "move", "from": "/a", "path": "/b"},
//!          {"op": "increment", "path": "/n", "by": 1}]}
//! ```
//!
//! A read patch has no `ops` field.

use dbz_path::Path;

use super::types::{Action, Op, Patch, PatchError};
use crate::identifier::Identifier;
use crate::{Array, Document, Value};

pub const TARGET: &str = "target";
pub const OPS: &str = "ops";

pub fn op_to_document(op: &Op) -> Document {
    let doc = Document::new().with("op", op.op_name());
    match op {
        Op::Add { path, value } | Op::Replace { path, value } | Op::Require { path, value } => doc
            .with("path", path.to_string())
            .with("value", value.clone()),
        Op::Remove { path } => doc.with("path", path.to_string()),
        Op::Move { path, from } | Op::Copy { path, from } => doc
            .with("from", from.to_string())
            .with("path", path.to_string()),
        Op::Increment { path, by } => doc
            .with("path", path.to_string())
            .with("by", Value::from(by.clone())),
    }
}

fn path_field(doc: &Document, name: &str) -> Result<Path, PatchError> {
    doc.get_str(name)
        .map(|text| Path::parse(text, true))
        .ok_or_else(|| PatchError::InvalidOp(format!("missing {name}")))
}

fn value_field(doc: &Document) -> Result<Value, PatchError> {
    doc.get("value")
        .cloned()
        .ok_or_else(|| PatchError::InvalidOp("missing value".to_string()))
}

pub fn op_from_document(doc: &Document) -> Result<Op, PatchError> {
    let name = doc
        .get_str("op")
        .ok_or_else(|| PatchError::InvalidOp("missing op".to_string()))?;
    let path = path_field(doc, "path")?;
    Ok(match Action::from_str(name)? {
        Action::Add => Op::Add {
            path,
            value: value_field(doc)?,
        },
        Action::Remove => Op::Remove { path },
        Action::Replace => Op::Replace {
            path,
            value: value_field(doc)?,
        },
        Action::Require => Op::Require {
            path,
            value: value_field(doc)?,
        },
        Action::Move => Op::Move {
            path,
            from: path_field(doc, "from")?,
        },
        Action::Copy => Op::Copy {
            path,
            from: path_field(doc, "from")?,
        },
        Action::Increment => Op::Increment {
            path,
            by: doc
                .get("by")
                .filter(|v| v.is_number())
                .and_then(Value::as_number)
                .ok_or_else(|| PatchError::InvalidOp("increment needs a numeric by".to_string()))?,
        },
    })
}

pub fn ops_to_array(ops: &[Op]) -> Array {
    ops.iter().map(op_to_document).collect()
}

pub fn ops_from_array(array: &Array) -> Result<Vec<Op>, PatchError> {
    array
        .iter()
        .map(|item| {
            item.as_document()
                .ok_or_else(|| PatchError::InvalidOp("op must be a document".to_string()))
                .and_then(op_from_document)
        })
        .collect()
}

impl<T: Identifier> Patch<T> {
    pub fn to_document(&self) -> Document {
        let doc = Document::new().with(TARGET, self.target.to_string());
        if self.ops.is_empty() {
            doc
        } else {
            doc.with(OPS, ops_to_array(&self.ops))
        }
    }

    pub fn from_document(doc: &Document) -> Result<Patch<T>, PatchError> {
        let target = doc
            .get_str(TARGET)
            .and_then(T::parse)
            .ok_or_else(|| PatchError::InvalidOp("missing or invalid target".to_string()))?;
        let ops = match doc.get(OPS) {
            None => Vec::new(),
            Some(Value::Array(array)) => ops_from_array(array)?,
            Some(_) => return Err(PatchError::InvalidOp("ops must be an array".to_string())),
        };
        Ok(Patch { target, ops })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{DatabaseId, EntityId};
    use crate::Number;

    #[test]
    fn op_shapes() {
        let op = Op::Move {
            path: Path::from("/b"),
            from: Path::from("/a~1x"),
        };
        let doc = op_to_document(&op);
        assert_eq!(doc.to_string(), r#"{"op":"move","from":"/a~1x","path":"/b"}"#);
        assert_eq!(op_from_document(&doc).unwrap(), op);
    }

    #[test]
    fn patch_document_roundtrip() {
        let id = DatabaseId::new("db").entity_type("contacts").entity("1");
        let patch = Patch::edit(id)
            .add("/name", "Sally")
            .increment("/n", Number::Long(2))
            .require("/v", Document::new().with("x", 1))
            .end();
        let doc = patch.to_document();
        assert_eq!(doc.get_str(TARGET), Some("db/contacts/default/1"));
        assert_eq!(Patch::<EntityId>::from_document(&doc).unwrap(), patch);
    }

    #[test]
    fn read_patch_has_no_ops() {
        let patch = Patch::read(DatabaseId::new("db"));
        let doc = patch.to_document();
        assert!(!doc.has(OPS));
        assert!(Patch::<DatabaseId>::from_document(&doc).unwrap().is_read_request());
    }

    #[test]
    fn malformed_ops() {
        let bad_op = Document::new().with("op", "explode").with("path", "/a");
        assert!(matches!(op_from_document(&bad_op), Err(PatchError::InvalidOp(_))));
        let no_value = Document::new().with("op", "add").with("path", "/a");
        assert!(op_from_document(&no_value).is_err());
        let bad_by = Document::new()
            .with("op", "increment")
            .with("path", "/a")
            .with("by", "1");
        assert!(op_from_document(&bad_by).is_err());
        let wrong_target = Document::new().with(TARGET, "db/contacts");
        assert!(Patch::<EntityId>::from_document(&wrong_target).is_err());
    }
}
