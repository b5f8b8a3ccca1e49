//! [`Batch`] — an ordered list of patches dispatched together.

use std::fmt;

use crate::identifier::Identifier;
use crate::patch::{Editor, Patch, PatchError};
use crate::{Array, Document, Number, Value};
use dbz_path::Path;

pub const PATCHES: &str = "patches";

/// An immutable, ordered list of patches addressed by the same kind of
/// identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    patches: Vec<Patch<T>>,
}

impl<T> Batch<T> {
    pub fn builder() -> BatchBuilder<T> {
        BatchBuilder::new()
    }

    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn patch(&self, index: usize) -> Option<&Patch<T>> {
        self.patches.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Patch<T>> {
        self.patches.iter()
    }

    /// True when the batch is non-empty and every patch only reads.
    pub fn is_read_request(&self) -> bool {
        !self.patches.is_empty() && self.patches.iter().all(Patch::is_read_request)
    }
}

impl<T: Identifier> Batch<T> {
    /// True if every patch targets something inside `scope`.
    pub fn applies_to<S: Identifier>(&self, scope: &S) -> bool {
        self.patches.iter().all(|p| p.target().is_in(scope))
    }

    pub fn to_document(&self) -> Document {
        let patches: Array = self.patches.iter().map(Patch::to_document).collect();
        Document::new().with(PATCHES, patches)
    }

    pub fn from_document(doc: &Document) -> Result<Batch<T>, PatchError> {
        let array = doc
            .get_array(PATCHES)
            .ok_or_else(|| PatchError::InvalidOp("missing patches".to_string()))?;
        let patches = array
            .iter()
            .map(|item| {
                item.as_document()
                    .ok_or_else(|| PatchError::InvalidOp("patch must be a document".to_string()))
                    .and_then(Patch::<T>::from_document)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Batch { patches })
    }
}

impl<T> IntoIterator for Batch<T> {
    type Item = Patch<T>;
    type IntoIter = std::vec::IntoIter<Patch<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a Patch<T>;
    type IntoIter = std::slice::Iter<'a, Patch<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}

impl<T: fmt::Display> fmt::Display for Batch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Batch ({} patches)", self.patches.len())?;
        let len = self.patches.len();
        for (i, patch) in self.patches.iter().enumerate() {
            let connector = if i == len - 1 { "└─" } else { "├─" };
            write!(f, "\n{} {}", connector, patch.target())?;
            for op in patch.ops() {
                write!(f, " {} {}", op.op_name(), op.path())?;
            }
        }
        Ok(())
    }
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Accumulates patches; [`build`](BatchBuilder::build) hands them out and
/// leaves the builder empty for reuse.
///
/// ```
/// use dbz_core::batch::Batch;
/// use dbz_core::identifier::DatabaseId;
///
/// let contacts = DatabaseId::new("db").entity_type("contacts");
/// let mut builder = Batch::builder();
/// builder.edit(contacts.entity("1")).add("/name", "Sally").end();
/// builder.read(contacts.entity("2"));
/// builder.remove(contacts.entity("3"));
/// let batch = builder.build();
/// assert_eq!(batch.patch_count(), 3);
/// assert!(builder.build().is_empty());
/// ```
#[derive(Debug)]
pub struct BatchBuilder<T> {
    patches: Vec<Patch<T>>,
}

impl<T> Default for BatchBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BatchBuilder<T> {
    pub fn new() -> Self {
        Self {
            patches: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn patch(&mut self, patch: Patch<T>) -> &mut Self {
        self.patches.push(patch);
        self
    }

    pub fn read(&mut self, target: T) -> &mut Self {
        self.patch(Patch::read(target))
    }

    pub fn read_all(&mut self, targets: impl IntoIterator<Item = T>) -> &mut Self {
        for target in targets {
            self.read(target);
        }
        self
    }

    pub fn remove(&mut self, target: T) -> &mut Self {
        self.patch(Patch::remove_target(target))
    }

    pub fn create(&mut self, target: T, content: &Document) -> &mut Self {
        self.patch(Patch::create(target, content))
    }

    pub fn edit(&mut self, target: T) -> BatchEditor<'_, T> {
        BatchEditor {
            builder: self,
            editor: Editor::new(target),
        }
    }

    pub fn build(&mut self) -> Batch<T> {
        Batch {
            patches: std::mem::take(&mut self.patches),
        }
    }
}

/// An [`Editor`] whose patch lands in a [`BatchBuilder`].
pub struct BatchEditor<'a, T> {
    builder: &'a mut BatchBuilder<T>,
    editor: Editor<T>,
}

impl<'a, T> BatchEditor<'a, T> {
    fn map(self, f: impl FnOnce(Editor<T>) -> Editor<T>) -> Self {
        BatchEditor {
            builder: self.builder,
            editor: f(self.editor),
        }
    }

    pub fn add(self, path: impl Into<Path>, value: impl Into<Value>) -> Self {
        self.map(|e| e.add(path, value))
    }

    pub fn remove(self, path: impl Into<Path>) -> Self {
        self.map(|e| e.remove(path))
    }

    pub fn replace(self, path: impl Into<Path>, value: impl Into<Value>) -> Self {
        self.map(|e| e.replace(path, value))
    }

    pub fn copy(self, from: impl Into<Path>, path: impl Into<Path>) -> Self {
        self.map(|e| e.copy(from, path))
    }

    pub fn move_value(self, from: impl Into<Path>, path: impl Into<Path>) -> Self {
        self.map(|e| e.move_value(from, path))
    }

    pub fn increment(self, path: impl Into<Path>, by: impl Into<Number>) -> Self {
        self.map(|e| e.increment(path, by))
    }

    pub fn require(self, path: impl Into<Path>, value: impl Into<Value>) -> Self {
        self.map(|e| e.require(path, value))
    }

    /// Adds the patch to the builder, even if it has no operations.
    pub fn end(self) -> &'a mut BatchBuilder<T> {
        let builder = self.builder;
        builder.patch(self.editor.end())
    }

    /// Adds the patch only if it has operations.
    pub fn end_if_changed(self) -> Option<&'a mut BatchBuilder<T>> {
        let builder = self.builder;
        let patch = self.editor.end_if_changed()?;
        Some(builder.patch(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{DatabaseId, EntityId, EntityType};

    fn contacts() -> EntityType {
        DatabaseId::new("db").entity_type("contacts")
    }

    #[test]
    fn read_only_batches() {
        let mut builder = Batch::builder();
        builder.read_all([contacts().entity("1"), contacts().entity("2")]);
        assert!(builder.build().is_read_request());

        builder.remove(contacts().entity("1"));
        assert!(!builder.build().is_read_request());

        assert!(!Batch::<EntityId>::builder().build().is_read_request());
    }

    #[test]
    fn end_if_changed_adds_nothing() {
        let mut builder = Batch::builder();
        assert!(builder.edit(contacts().entity("1")).end_if_changed().is_none());
        assert!(builder.is_empty());
        if let Some(b) = builder.edit(contacts().entity("1")).add("/a", 1).end_if_changed() {
            b.read(contacts().entity("2"));
        }
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn scoping() {
        let mut builder = Batch::builder();
        builder.read(contacts().entity("1"));
        builder.read(DatabaseId::new("other").entity_type("contacts").entity("2"));
        let mixed = builder.build();
        assert!(!mixed.applies_to(&DatabaseId::new("db")));

        builder.read(contacts().entity("1"));
        builder.read(contacts().zone("eu").entity("2"));
        let single = builder.build();
        assert!(single.applies_to(&DatabaseId::new("db")));
        assert!(single.applies_to(&contacts()));
        assert!(!single.applies_to(&contacts().default_zone()));
    }

    #[test]
    fn document_roundtrip() {
        let mut builder = Batch::builder();
        builder
            .edit(contacts().entity("1"))
            .require("/v", 1)
            .increment("/v", 1)
            .end()
            .read(contacts().entity("2"));
        let batch = builder.build();
        let doc = batch.to_document();
        assert_eq!(doc.get_array(PATCHES).map(Array::len), Some(2));
        assert_eq!(Batch::<EntityId>::from_document(&doc).unwrap(), batch);
        assert!(Batch::<EntityId>::from_document(&Document::new()).is_err());
    }

    #[test]
    fn targets_with_separators_roundtrip() {
        let mut builder = Batch::builder();
        builder.read(contacts().entity("a/b"));
        builder.read(contacts().zone("x~y").entity("c"));
        let batch = builder.build();
        assert_eq!(Batch::<EntityId>::from_document(&batch.to_document()).unwrap(), batch);
    }
}
