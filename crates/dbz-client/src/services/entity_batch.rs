//! Splits entity batches into per-entity patch requests.

use std::sync::Arc;

use dbz_core::identifier::{EntityId, Identifier};
use dbz_core::message::{self, topic};
use dbz_core::Document;

use crate::bus::{Delivery, MessageHandler};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::service::{Lifecycle, NodeContext, Service, ServiceState};

/// Turns one batch request into `(key, message)` pairs for `entity-patches`.
///
/// The database of the first patch scopes the batch; patches outside it are
/// dropped. Each forwarded request carries the batch headers and its part
/// index among the forwarded patches.
pub fn split_batch(request: &Document) -> Vec<(String, Document)> {
    let batch = match message::batch::<EntityId>(request) {
        Ok(batch) => batch,
        Err(e) => {
            log::warn!("entity-batch: ignoring malformed batch: {e}");
            return Vec::new();
        }
    };
    let Some(db) = batch.patch(0).map(|p| p.target().database_id()) else {
        return Vec::new();
    };
    let (inside, outside): (Vec<_>, Vec<_>) =
        batch.iter().partition(|p| p.target().database_id() == db);
    for patch in &outside {
        log::warn!("entity-batch: skipping {} outside database {db}", patch.target());
    }
    let parts = inside.len() as u32;
    inside
        .into_iter()
        .enumerate()
        .map(|(i, patch)| {
            let mut msg = message::create_patch_request(request, patch);
            message::set_parts(&mut msg, i as u32 + 1, parts);
            (patch.target().to_string(), msg)
        })
        .collect()
}

pub struct EntityBatchService {
    config: ServiceConfig,
    lifecycle: Lifecycle,
}

impl EntityBatchService {
    pub fn new(config: ServiceConfig) -> EntityBatchService {
        EntityBatchService {
            config,
            lifecycle: Lifecycle::new("entity-batch"),
        }
    }
}

impl Default for EntityBatchService {
    fn default() -> Self {
        Self::new(ServiceConfig::new("entity-batch"))
    }
}

impl Service for EntityBatchService {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn start(&self, node: &NodeContext) -> Result<(), ServiceError> {
        self.lifecycle.start(node, |node| {
            let out = node.clone();
            let handler: MessageHandler = Arc::new(move |d: &Delivery<'_>| {
                for (key, msg) in split_batch(d.message) {
                    out.send(topic::ENTITY_PATCHES, &key, &msg);
                }
                true
            });
            node.subscribe(
                &self.config.group_id,
                &[topic::ENTITY_BATCHES],
                self.config.threads,
                handler,
            )
        })
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.lifecycle
            .stop(|node| node.unsubscribe(&self.config.group_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbz_core::batch::Batch;
    use dbz_core::identifier::DatabaseId;

    fn request(batch: &Batch<EntityId>) -> Document {
        let mut headers = Document::new();
        message::add_headers(&mut headers, "client-a", 9, "jane", 1);
        message::create_batch_request(&headers, batch)
    }

    #[test]
    fn splits_into_numbered_parts() {
        let contacts = DatabaseId::new("db").entity_type("contacts");
        let mut builder = Batch::builder();
        builder.read(contacts.entity("1"));
        builder.edit(contacts.entity("2")).add("/a", 1).end();
        builder.remove(contacts.entity("3"));
        let batch = builder.build();

        let out = split_batch(&request(&batch));
        assert_eq!(out.len(), 3);
        for (i, (key, msg)) in out.iter().enumerate() {
            let patch = message::patch::<EntityId>(msg).unwrap();
            assert_eq!(&patch, batch.patch(i).unwrap());
            assert_eq!(key, &patch.target().to_string());
            assert_eq!(message::parts(msg), (i as u32 + 1, 3));
            assert_eq!(message::client_id(msg), Some("client-a"));
            assert_eq!(message::request_id(msg).map(|id| id.number()), Some(9));
        }
    }

    #[test]
    fn drops_patches_outside_the_first_database() {
        let mut builder = Batch::builder();
        builder.read(DatabaseId::new("db").entity_type("t").entity("1"));
        builder.read(DatabaseId::new("other").entity_type("t").entity("2"));
        builder.read(DatabaseId::new("db").entity_type("t").entity("3"));
        let out = split_batch(&request(&builder.build()));
        let keys: Vec<_> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["db/t/default/1", "db/t/default/3"]);
        assert_eq!(message::parts(&out[1].1), (2, 2));
    }

    #[test]
    fn slashes_in_ids_are_keyed_escaped() {
        let t = DatabaseId::new("db").entity_type("t");
        let mut builder = Batch::builder();
        builder.read(t.entity("a/b"));
        builder.read(t.entity("c"));
        let out = split_batch(&request(&builder.build()));
        let keys: Vec<_> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["db/t/default/a~1b", "db/t/default/c"]);
        let first = message::patch::<EntityId>(&out[0].1).unwrap();
        assert_eq!(first.target().id(), "a/b");
    }

    #[test]
    fn empty_or_malformed_batches_produce_nothing() {
        assert!(split_batch(&request(&Batch::builder().build())).is_empty());
        assert!(split_batch(&Document::new()).is_empty());
    }
}
