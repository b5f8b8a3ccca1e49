//! The [`Document`] container and path navigation over nested values.

use std::cmp::Ordering;
use std::fmt;

use dbz_path::{parse_index, Path};
use indexmap::IndexMap;
use thiserror::Error;

use crate::{Array, Value};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocError {
    #[error("INDEX_OUT_OF_BOUNDS: {index} (size {size})")]
    IndexOutOfBounds { index: usize, size: usize },
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("INVALID_INDEX: {0}")]
    InvalidIndex(String),
    #[error("NOT_A_CONTAINER: {0}")]
    NotAContainer(String),
    #[error("ROOT_NOT_A_DOCUMENT")]
    RootNotADocument,
}

/// An ordered mapping from field name to [`Value`].
///
/// Fields keep their insertion order. Setting an existing field replaces
/// its value in place.
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Document {
        Document {
            fields: IndexMap::new(),
        }
    }

    /// Builder-style [`set`](Document::set).
    ///
    /// ```
    /// use dbz_core::Document;
    ///
    /// let doc = Document::new().with("name", "Sally").with("age", 31);
    /// assert_eq!(doc.get_i32("age"), Some(31));
    /// ```
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Document {
        self.set(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Sets a field and returns the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Removes a field, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    // ── Typed field access ───────────────────────────────────────────────

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(Value::as_i32)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_document(&self, name: &str) -> Option<&Document> {
        self.get(name).and_then(Value::as_document)
    }

    pub fn get_document_mut(&mut self, name: &str) -> Option<&mut Document> {
        self.get_mut(name).and_then(Value::as_document_mut)
    }

    pub fn get_array(&self, name: &str) -> Option<&Array> {
        self.get(name).and_then(Value::as_array)
    }

    // ── Path navigation ──────────────────────────────────────────────────

    /// Resolves `path` through nested documents and arrays.
    ///
    /// The root path addresses the document itself and has no value form,
    /// so it resolves to `None`.
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        let mut segments = path.iter();
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Document(d) => d.get(segment)?,
                Value::Array(a) => a.get(parse_index(segment)?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn has_path(&self, path: &Path) -> bool {
        self.get_path(path).is_some()
    }

    /// Sets the value at `path`, creating intermediate documents as needed.
    ///
    /// Against an array the final segment is an index (`-` appends).
    /// Setting the root replaces the whole document and requires a
    /// document value.
    ///
    /// ```
    /// use dbz_core::{Document, Value};
    /// use dbz_path::Path;
    ///
    /// let mut doc = Document::new();
    /// doc.set_path(&Path::from("/address/city"), "Springfield").unwrap();
    /// assert_eq!(
    ///     doc.get_path(&Path::from("/address/city")),
    ///     Some(&Value::from("Springfield"))
    /// );
    /// ```
    pub fn set_path(
        &mut self,
        path: &Path,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, DocError> {
        let value = value.into();
        let Some(last) = path.last_segment() else {
            return match value {
                Value::Document(doc) => Ok(Some(Value::Document(std::mem::replace(self, doc)))),
                _ => Err(DocError::RootNotADocument),
            };
        };
        self.parent_slot(path, true)?.put(last, value)
    }

    /// Removes and returns the value at `path`. The root cannot be removed
    /// this way; use [`clear`](Document::clear).
    pub fn remove_path(&mut self, path: &Path) -> Option<Value> {
        let last = path.last_segment()?;
        self.parent_slot(path, false).ok()?.take(last)
    }

    fn parent_slot(&mut self, path: &Path, create: bool) -> Result<Slot<'_>, DocError> {
        let depth = path.size().saturating_sub(1);
        let mut slot = Slot::Doc(self);
        for segment in path.iter().take(depth) {
            slot = slot.descend(segment, create)?;
        }
        Ok(slot)
    }
}

/// A mutable container reached while walking a path.
enum Slot<'a> {
    Doc(&'a mut Document),
    Arr(&'a mut Array),
}

impl<'a> Slot<'a> {
    fn descend(self, segment: &str, create: bool) -> Result<Slot<'a>, DocError> {
        let value = match self {
            Slot::Doc(d) if create => d
                .fields
                .entry(segment.to_string())
                .or_insert_with(|| Value::Document(Document::new())),
            Slot::Doc(d) => d
                .fields
                .get_mut(segment)
                .ok_or_else(|| DocError::NotFound(segment.to_string()))?,
            Slot::Arr(a) => {
                let index = array_index(a, segment)?;
                let size = a.len();
                if create && index == size {
                    a.push(Document::new());
                }
                a.get_mut(index)
                    .ok_or(DocError::IndexOutOfBounds { index, size })?
            }
        };
        match value {
            Value::Document(d) => Ok(Slot::Doc(d)),
            Value::Array(a) => Ok(Slot::Arr(a)),
            _ => Err(DocError::NotAContainer(segment.to_string())),
        }
    }

    fn put(self, segment: &str, value: Value) -> Result<Option<Value>, DocError> {
        match self {
            Slot::Doc(d) => Ok(d.set(segment, value)),
            Slot::Arr(a) => {
                let index = array_index(a, segment)?;
                a.set_value(index, value)
            }
        }
    }

    fn take(self, segment: &str) -> Option<Value> {
        match self {
            Slot::Doc(d) => d.remove(segment),
            Slot::Arr(a) => a.remove(parse_index(segment)?),
        }
    }
}

fn array_index(array: &Array, segment: &str) -> Result<usize, DocError> {
    if segment == "-" {
        return Ok(array.len());
    }
    parse_index(segment).ok_or_else(|| DocError::InvalidIndex(segment.to_string()))
}

// ── Structural equality and ordering ─────────────────────────────────────
//
// Field order is not significant: documents compare by their fields sorted
// by name.

impl Document {
    fn sorted_fields(&self) -> Vec<(&String, &Value)> {
        let mut fields: Vec<_> = self.fields.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Document) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, value)| other.fields.get(name) == Some(value))
    }
}

impl Eq for Document {}

impl Ord for Document {
    fn cmp(&self, other: &Document) -> Ordering {
        self.sorted_fields().cmp(&other.sorted_fields())
    }
}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Document) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Renders the document as compact JSON.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::codec::to_json(self))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Document {
        Document {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
