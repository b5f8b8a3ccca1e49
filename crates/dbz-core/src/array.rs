use std::cmp::Ordering;
use std::fmt;

use crate::{DocError, Value};

/// An ordered, index-addressable sequence of values.
#[derive(Debug, Clone, Default)]
pub struct Array {
    values: Vec<Value>,
}

impl Array {
    pub fn new() -> Array {
        Array { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Array {
        Array {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has(&self, index: usize) -> bool {
        index < self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    /// Appends a value.
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Array {
        self.values.push(value.into());
        self
    }

    /// Replaces the value at `index`, or appends when `index == len()`.
    ///
    /// Returns the replaced value, if any.
    ///
    /// ```
    /// use dbz_core::{Array, Value};
    ///
    /// let mut a = Array::new();
    /// a.set_value(0, "x").unwrap();
    /// assert_eq!(a.set_value(0, "y").unwrap(), Some(Value::from("x")));
    /// assert!(a.set_value(5, "z").is_err());
    /// ```
    pub fn set_value(
        &mut self,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, DocError> {
        let size = self.values.len();
        match index.cmp(&size) {
            Ordering::Less => Ok(Some(std::mem::replace(
                &mut self.values[index],
                value.into(),
            ))),
            Ordering::Equal => {
                self.values.push(value.into());
                Ok(None)
            }
            Ordering::Greater => Err(DocError::IndexOutOfBounds { index, size }),
        }
    }

    /// Inserts at `index`, shifting later values right.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<(), DocError> {
        let size = self.values.len();
        if index > size {
            return Err(DocError::IndexOutOfBounds { index, size });
        }
        self.values.insert(index, value.into());
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<Value> {
        if index < self.values.len() {
            Some(self.values.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}

/// Shorter arrays sort first; equal lengths compare element-wise.
impl Ord for Array {
    fn cmp(&self, other: &Array) -> Ordering {
        self.values
            .len()
            .cmp(&other.values.len())
            .then_with(|| self.values.cmp(&other.values))
    }
}

impl PartialOrd for Array {
    fn partial_cmp(&self, other: &Array) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Array) -> bool {
        self.values == other.values
    }
}

impl Eq for Array {}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::codec::array_to_json(self))
    }
}

impl From<Vec<Value>> for Array {
    fn from(values: Vec<Value>) -> Array {
        Array { values }
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Array {
        Array {
            values: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntoIterator for Array {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_bounds() {
        let mut a: Array = [1, 2].into_iter().collect();
        assert_eq!(a.set_value(1, 20).unwrap(), Some(Value::from(2)));
        assert_eq!(a.set_value(2, 30).unwrap(), None);
        assert_eq!(a.len(), 3);
        assert_eq!(
            a.set_value(4, 50),
            Err(DocError::IndexOutOfBounds { index: 4, size: 3 })
        );
    }

    #[test]
    fn remove_shifts() {
        let mut a: Array = ["a", "b", "c"].into_iter().collect();
        assert_eq!(a.remove(0), Some(Value::from("a")));
        assert_eq!(a.get(0), Some(&Value::from("b")));
        assert_eq!(a.remove(9), None);
    }

    #[test]
    fn ordering_is_length_first() {
        let short: Array = [9].into_iter().collect();
        let long: Array = [1, 1].into_iter().collect();
        assert!(short < long);
        let a: Array = [1, 2].into_iter().collect();
        let b: Array = [1, 3].into_iter().collect();
        assert!(a < b);
    }
}
