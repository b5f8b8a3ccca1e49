//! dbz-core — the document model and change-description engine.
//!
//! - [`Value`], [`Number`], [`Document`] and [`Array`]: semi-structured
//!   values with coercion, structural equality and a total order.
//! - [`identifier`]: hierarchical database / entity-type / zone / entity
//!   names with containment tests.
//! - [`patch`]: JSON-Patch-like operations extended with `increment` and
//!   `require`, built with an [`Editor`](patch::Editor) and applied with a
//!   per-operation outcome.
//! - [`batch`]: ordered lists of patches dispatched together.
//! - [`message`]: header conventions for the documents exchanged on the bus.
//! - [`codec`]: the JSON encoding of documents.
//!
//! # Example
//!
//! ```
//! use dbz_core::identifier::DatabaseId;
//! use dbz_core::patch::Patch;
//! use dbz_core::{Document, Value};
//!
//! let id = DatabaseId::new("db").entity_type("contacts").entity("1");
//! let patch = Patch::edit(id).add("/a", 1).add("/b", 2).end();
//!
//! let mut doc = Document::new();
//! assert!(patch.apply(&mut doc).is_success());
//! assert_eq!(doc.get("b"), Some(&Value::from(2)));
//! ```

mod array;
mod document;
mod number;
mod value;

pub mod batch;
pub mod cli;
pub mod codec;
pub mod identifier;
pub mod message;
pub mod patch;

pub use array::Array;
pub use document::{DocError, Document};
pub use number::Number;
pub use value::{Value, ValueType};

pub use dbz_path::Path;
