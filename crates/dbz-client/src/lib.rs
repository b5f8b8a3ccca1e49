//! dbz-client — request correlation, the stream services, and the client
//! facade of the dbz entity store.
//!
//! Clients submit batches on `entity-batches` and schema requests on
//! `schema-patches`. The [`services`] split batches, apply patches to their
//! stores and answer on `partial-responses`, where each client's
//! [`ResponseHandlers`](correlation::ResponseHandlers) reassembles the parts
//! of its own requests.
//!
//! The bus and the store are collaborators behind the [`bus::MessageBus`]
//! and [`store::DocumentStore`] traits; in-memory implementations of both
//! are included.

pub mod bus;
pub mod client;
pub mod config;
pub mod context;
pub mod correlation;
pub mod databases;
pub mod error;
pub mod node;
pub mod service;
pub mod services;
pub mod store;

pub use client::Client;
pub use context::ExecutionContext;
pub use error::{ClientError, ServiceError};
