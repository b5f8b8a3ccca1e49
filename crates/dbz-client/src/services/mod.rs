//! The stream services that sit between clients and storage.

pub mod entity_batch;
pub mod entity_storage;
pub mod schema_storage;

pub use entity_batch::{split_batch, EntityBatchService};
pub use entity_storage::{process_patch, EntityStorageService};
pub use schema_storage::{process_schema_patch, SchemaOutput, SchemaStorageService};
