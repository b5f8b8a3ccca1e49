//! [`Editor`] — the builder that records operations into a [`Patch`].

use dbz_path::Path;

use super::types::{Op, Patch};
use crate::{Document, Number, Value};

/// Accumulates operations for one target.
///
/// ```
/// use dbz_core::identifier::DatabaseId;
/// use dbz_core::patch::Patch;
///
/// let db = DatabaseId::new("db");
/// let patch = Patch::edit(db.entity_type("contacts").entity("1"))
///     .require("/version", 3)
///     .add("/name", "Sally")
///     .increment("/version", 1)
///     .end();
/// assert_eq!(patch.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Editor<T> {
    target: T,
    ops: Vec<Op>,
}

impl<T> Editor<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            ops: Vec::new(),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    pub fn push_op(mut self, op: Op) -> Self {
        self.ops.push(op);
        self
    }

    pub fn add(self, path: impl Into<Path>, value: impl Into<Value>) -> Self {
        self.push_op(Op::Add {
            path: path.into(),
            value: value.into(),
        })
    }

    pub fn remove(self, path: impl Into<Path>) -> Self {
        self.push_op(Op::Remove { path: path.into() })
    }

    pub fn replace(self, path: impl Into<Path>, value: impl Into<Value>) -> Self {
        self.push_op(Op::Replace {
            path: path.into(),
            value: value.into(),
        })
    }

    pub fn copy(self, from: impl Into<Path>, path: impl Into<Path>) -> Self {
        self.push_op(Op::Copy {
            path: path.into(),
            from: from.into(),
        })
    }

    pub fn move_value(self, from: impl Into<Path>, path: impl Into<Path>) -> Self {
        self.push_op(Op::Move {
            path: path.into(),
            from: from.into(),
        })
    }

    pub fn increment(self, path: impl Into<Path>, by: impl Into<Number>) -> Self {
        self.push_op(Op::Increment {
            path: path.into(),
            by: by.into(),
        })
    }

    pub fn require(self, path: impl Into<Path>, value: impl Into<Value>) -> Self {
        self.push_op(Op::Require {
            path: path.into(),
            value: value.into(),
        })
    }

    pub fn end(self) -> Patch<T> {
        Patch {
            target: self.target,
            ops: self.ops,
        }
    }

    /// Like [`end`](Editor::end), but yields nothing when no operation was
    /// recorded.
    pub fn end_if_changed(self) -> Option<Patch<T>> {
        if self.ops.is_empty() {
            None
        } else {
            Some(self.end())
        }
    }
}

impl<T> Patch<T> {
    pub fn edit(target: T) -> Editor<T> {
        Editor::new(target)
    }

    /// A patch that only reads its target.
    pub fn read(target: T) -> Patch<T> {
        Patch {
            target,
            ops: Vec::new(),
        }
    }

    /// A patch that deletes its target entirely.
    pub fn remove_target(target: T) -> Patch<T> {
        Patch::edit(target).remove(Path::root()).end()
    }

    /// A patch that adds every top-level field of `content`.
    pub fn create(target: T, content: &Document) -> Patch<T> {
        content
            .fields()
            .fold(Patch::edit(target), |editor, (name, value)| {
                editor.add(Path::single(name), value.clone())
            })
            .end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::DatabaseId;
    use crate::patch::types::Action;

    #[test]
    fn end_if_changed_discards_empty() {
        let db = DatabaseId::new("db");
        assert!(Patch::edit(db.clone()).end_if_changed().is_none());
        assert!(Patch::edit(db).remove("/a").end_if_changed().is_some());
    }

    #[test]
    fn records_in_order() {
        let patch = Patch::edit(DatabaseId::new("db"))
            .add("/a", 1)
            .copy("/a", "/b")
            .move_value("/b", "/c")
            .replace("/a", 2)
            .remove("/c")
            .end();
        let actions: Vec<Action> = patch.ops().iter().map(|op| op.action()).collect();
        assert_eq!(
            actions,
            vec![
                Action::Add,
                Action::Copy,
                Action::Move,
                Action::Replace,
                Action::Remove
            ]
        );
        assert_eq!(patch.ops()[1].from(), Some(&Path::from("/a")));
    }

    #[test]
    fn special_patches() {
        let db = DatabaseId::new("db");
        assert!(Patch::read(db.clone()).is_read_request());
        let deletion = Patch::remove_target(db.clone());
        assert!(deletion.is_deletion());
        assert!(!deletion.is_read_request());

        let content = Document::new().with("x", 1).with("y", "two");
        let mut doc = Document::new();
        assert!(Patch::create(db, &content).apply(&mut doc).is_success());
        assert_eq!(doc, content);
    }
}
