//! The [`Path`] type.
//!
//! Paths are immutable. Internally a path picks one of several
//! representations depending on how it was built (root, a single segment,
//! a flat list of segments, or a child appended to a shared parent), but
//! every representation behaves identically: equality, hashing and ordering
//! only look at the segment sequence.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::str::FromStr;
use std::sync::Arc;

use crate::{escape_segment, unescape_segment, PathError};

/// An immutable sequence of segments addressing a location in a document.
#[derive(Clone)]
pub struct Path(Repr);

#[derive(Clone)]
enum Repr {
    Root,
    Single(Arc<str>),
    Multi(Arc<[String]>),
    Child {
        parent: Arc<Path>,
        segment: Arc<str>,
        size: usize,
    },
}

impl Path {
    /// The root path, with no segments.
    pub const ROOT: Path = Path(Repr::Root);

    pub fn root() -> Path {
        Path::ROOT
    }

    /// Parses a textual path.
    ///
    /// Leading and trailing whitespace, control characters and `/` are
    /// trimmed before splitting on `/`. When `resolve_escapes` is set, every
    /// segment has `~1` turned into `/` and then `~0` turned into `~`.
    ///
    /// Because of the trimming, a path whose first or last segment is empty
    /// or starts or ends with whitespace does not survive a trip through
    /// its textual form:
    ///
    /// ```
    /// use dbz_path::Path;
    ///
    /// let path = Path::from_segments(["a", "b "]);
    /// assert_eq!(Path::parse(&path.to_string(), true), Path::from_segments(["a", "b"]));
    /// ```
    pub fn parse(text: &str, resolve_escapes: bool) -> Path {
        let trimmed =
            text.trim_matches(|c: char| c == '/' || c.is_whitespace() || c.is_control());
        if trimmed.is_empty() {
            return Path::ROOT;
        }
        let segments = trimmed.split('/').map(|segment| {
            if resolve_escapes {
                unescape_segment(segment)
            } else {
                segment.to_string()
            }
        });
        Path::from_segments(segments)
    }

    /// Builds a path from already-unescaped segments.
    pub fn from_segments<I, S>(segments: I) -> Path
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        match segments.len() {
            0 => Path::ROOT,
            1 => Path(Repr::Single(Arc::from(segments.remove(0)))),
            _ => Path(Repr::Multi(segments.into())),
        }
    }

    /// A path with exactly one segment.
    pub fn single(segment: impl Into<String>) -> Path {
        Path(Repr::Single(Arc::from(segment.into())))
    }

    pub fn size(&self) -> usize {
        match &self.0 {
            Repr::Root => 0,
            Repr::Single(_) => 1,
            Repr::Multi(segments) => segments.len(),
            Repr::Child { size, .. } => *size,
        }
    }

    pub fn is_root(&self) -> bool {
        self.size() == 0
    }

    pub fn is_single(&self) -> bool {
        self.size() == 1
    }

    pub fn is_multiple(&self) -> bool {
        self.size() > 1
    }

    /// Returns the segment at `index`, or `None` when out of range.
    pub fn segment(&self, index: usize) -> Option<&str> {
        match &self.0 {
            Repr::Root => None,
            Repr::Single(segment) => (index == 0).then_some(&**segment),
            Repr::Multi(segments) => segments.get(index).map(String::as_str),
            Repr::Child {
                parent,
                segment,
                size,
            } => {
                if index + 1 == *size {
                    Some(&**segment)
                } else {
                    parent.segment(index)
                }
            }
        }
    }

    /// Like [`Path::segment`], but reports the out-of-range index.
    pub fn try_segment(&self, index: usize) -> Result<&str, PathError> {
        self.segment(index).ok_or(PathError::InvalidSegmentIndex {
            index,
            size: self.size(),
        })
    }

    pub fn last_segment(&self) -> Option<&str> {
        match &self.0 {
            Repr::Child { segment, .. } => Some(&**segment),
            _ => self.size().checked_sub(1).and_then(|last| self.segment(last)),
        }
    }

    /// The path without its last segment. The root has no parent.
    pub fn parent(&self) -> Option<Path> {
        match &self.0 {
            Repr::Root => None,
            Repr::Single(_) => Some(Path::ROOT),
            Repr::Multi(segments) => {
                let keep = segments.len() - 1;
                Some(Path::from_segments(segments[..keep].iter().cloned()))
            }
            Repr::Child { parent, .. } => Some(Path::clone(parent)),
        }
    }

    /// The first `length` segments of this path.
    pub fn subpath(&self, length: usize) -> Result<Path, PathError> {
        let size = self.size();
        if length > size {
            return Err(PathError::InvalidSubpathLength { length, size });
        }
        if length == size {
            return Ok(self.clone());
        }
        if length == 0 {
            return Ok(Path::ROOT);
        }
        match &self.0 {
            Repr::Child { parent, .. } => parent.subpath(length),
            _ => Ok(Path::from_segments(self.iter().take(length))),
        }
    }

    /// Appends a relative path. Appending the root returns `self`, and
    /// appending to the root returns `relative`.
    pub fn append(&self, relative: &Path) -> Path {
        if relative.is_root() {
            return self.clone();
        }
        if self.is_root() {
            return relative.clone();
        }
        if relative.is_single() {
            if let Some(segment) = relative.last_segment() {
                return self.child(segment);
            }
        }
        Path::from_segments(self.iter().chain(relative.iter()))
    }

    /// A path with one more segment, sharing this path as its parent.
    pub fn child(&self, segment: impl Into<String>) -> Path {
        if self.is_root() {
            return Path::single(segment);
        }
        Path(Repr::Child {
            parent: Arc::new(self.clone()),
            segment: Arc::from(segment.into()),
            size: self.size() + 1,
        })
    }

    /// Returns true if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        prefix.size() <= self.size() && prefix.iter().zip(self.iter()).all(|(a, b)| a == b)
    }

    /// Returns true if `ancestor` is a strict ancestor of this path.
    pub fn is_descendant_of(&self, ancestor: &Path) -> bool {
        ancestor.size() < self.size() && self.starts_with(ancestor)
    }

    pub fn iter(&self) -> Segments<'_> {
        Segments {
            path: self,
            front: 0,
            back: self.size(),
        }
    }

    /// The escaped segments joined by `/`, without the leading slash.
    pub fn to_relative_path(&self) -> String {
        self.iter().map(escape_segment).collect::<Vec<_>>().join("/")
    }
}

impl Default for Path {
    fn default() -> Self {
        Path::ROOT
    }
}

/// Iterator over the segments of a [`Path`].
pub struct Segments<'a> {
    path: &'a Path,
    front: usize,
    back: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.front >= self.back {
            return None;
        }
        let segment = self.path.segment(self.front);
        self.front += 1;
        segment
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<'a> DoubleEndedIterator for Segments<'a> {
    fn next_back(&mut self) -> Option<&'a str> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.path.segment(self.back)
    }
}

impl ExactSizeIterator for Segments<'_> {}
impl FusedIterator for Segments<'_> {}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a str;
    type IntoIter = Segments<'a>;

    fn into_iter(self) -> Segments<'a> {
        self.iter()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Path) -> bool {
        self.size() == other.size() && self.iter().eq(other.iter())
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.size());
        for segment in self {
            segment.hash(state);
        }
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Path) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Path) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for segment in self {
            f.write_str("/")?;
            f.write_str(&escape_segment(segment))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl FromStr for Path {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Path, Infallible> {
        Ok(Path::parse(s, true))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Path {
        Path::parse(s, true)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Path {
        Path::parse(&s, true)
    }
}

impl From<&Path> for Path {
    fn from(p: &Path) -> Path {
        p.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        let root = Path::root();
        assert!(root.is_root());
        assert_eq!(root.size(), 0);
        assert_eq!(root.parent(), None);
        assert_eq!(root.segment(0), None);
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.to_relative_path(), "");
    }

    #[test]
    fn parse_picks_representation_by_length() {
        assert!(Path::parse("", true).is_root());
        assert!(Path::parse(" / ", true).is_root());
        assert!(Path::parse("/a", true).is_single());
        assert!(Path::parse("a/b/", true).is_multiple());
    }

    #[test]
    fn representations_compare_by_segments() {
        let flat = Path::parse("/a/b/c", true);
        let chained = Path::single("a").child("b").child("c");
        let appended = Path::single("a").append(&Path::parse("b/c", true));
        assert_eq!(flat, chained);
        assert_eq!(flat, appended);
        assert_eq!(chained.segment(0), Some("a"));
        assert_eq!(chained.segment(2), Some("c"));
        assert_eq!(chained.segment(3), None);
    }

    #[test]
    fn escapes_are_resolved_in_every_branch() {
        assert_eq!(Path::parse("/a~1b", true).segment(0), Some("a/b"));
        assert_eq!(Path::parse("/a~1b/c~0", true).segment(1), Some("c~"));
        assert_eq!(Path::parse("/a~1b", false).segment(0), Some("a~1b"));
    }

    #[test]
    fn subpath_and_parent() {
        let path = Path::parse("/a/b/c", true);
        assert_eq!(path.subpath(0).unwrap(), Path::ROOT);
        assert_eq!(path.subpath(1).unwrap(), Path::single("a"));
        assert_eq!(path.subpath(2).unwrap(), Path::parse("a/b", true));
        assert_eq!(path.subpath(3).unwrap(), path);
        assert_eq!(
            path.subpath(4),
            Err(PathError::InvalidSubpathLength { length: 4, size: 3 })
        );
        assert_eq!(path.parent(), Some(Path::parse("a/b", true)));

        let chained = Path::single("x").child("y");
        assert_eq!(chained.parent(), Some(Path::single("x")));
        assert_eq!(chained.subpath(1).unwrap(), Path::single("x"));
    }

    #[test]
    fn append_to_root_returns_operand() {
        let rel = Path::parse("a/b", true);
        assert_eq!(Path::root().append(&rel), rel);
        assert_eq!(rel.append(&Path::root()), rel);
    }

    #[test]
    fn prefix_checks() {
        let path = Path::parse("/a/b", true);
        assert!(path.starts_with(&Path::single("a")));
        assert!(path.starts_with(&path));
        assert!(!path.is_descendant_of(&path));
        assert!(path.is_descendant_of(&Path::root()));
        assert!(!Path::single("a").starts_with(&path));
    }

    #[test]
    fn reverse_iteration() {
        let path = Path::single("a").child("b").child("c");
        let reversed: Vec<&str> = path.iter().rev().collect();
        assert_eq!(reversed, vec!["c", "b", "a"]);
    }
}
