//! Applies schema patches to database schemas and announces the changes.

use std::sync::Arc;

use dbz_core::identifier::DatabaseId;
use dbz_core::message::{self, topic, Status};
use dbz_core::Document;

use crate::bus::{Delivery, MessageHandler};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::service::{Lifecycle, NodeContext, Service, ServiceState};
use crate::store::DocumentStore;

/// What to publish after handling one `schema-patches` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaOutput {
    /// Key shared by both messages: the database id.
    pub key: String,
    /// For `schema-updates`, present only when the schema changed.
    pub update: Option<Document>,
    /// For `partial-responses`.
    pub response: Document,
}

pub fn process_schema_patch(
    store: &dyn DocumentStore,
    request: &Document,
) -> Option<SchemaOutput> {
    let patch = match message::patch::<DatabaseId>(request) {
        Ok(patch) => patch,
        Err(e) => {
            log::warn!("schema-storage: ignoring malformed request: {e}");
            return None;
        }
    };
    let key = patch.target().to_string();
    let before = store.get(&key);
    let mut response = message::create_response(request);
    message::add_id(&mut response, patch.target());

    if patch.is_read_request() {
        match before {
            Some(schema) => {
                message::set_status(&mut response, Status::Success);
                message::set_after(&mut response, schema);
            }
            None => message::set_status(&mut response, Status::DoesNotExist),
        }
        return Some(SchemaOutput {
            key,
            update: None,
            response,
        });
    }

    let mut schema = before.clone().unwrap_or_default();
    let outcome = patch.apply(&mut schema);
    // Operations before a failure stand, so a failed patch may still change
    // the schema.
    let changed = outcome.applied() > 0 && before.as_ref() != Some(&schema);
    let update = changed.then(|| {
        store.put(&key, schema.clone());
        let mut update = Document::new();
        message::copy_headers(request, &mut update);
        message::set_status(&mut update, Status::Success);
        message::add_id(&mut update, patch.target());
        message::set_after(&mut update, schema.clone());
        update
    });
    if let Some(existing) = before {
        message::set_before(&mut response, existing);
    }
    match outcome.failure() {
        None => {
            message::set_status(&mut response, Status::Success);
            message::set_after(&mut response, schema);
        }
        Some(failure) => {
            log::debug!("schema-storage: {key}: {failure}");
            message::set_failure(&mut response, &failure.to_string());
            message::set_status(&mut response, Status::PatchFailed);
            if changed {
                message::set_after(&mut response, schema);
            }
        }
    }
    Some(SchemaOutput {
        key,
        update,
        response,
    })
}

pub struct SchemaStorageService {
    config: ServiceConfig,
    store: Arc<dyn DocumentStore>,
    lifecycle: Lifecycle,
}

impl SchemaStorageService {
    pub fn new(config: ServiceConfig, store: Arc<dyn DocumentStore>) -> SchemaStorageService {
        SchemaStorageService {
            config,
            store,
            lifecycle: Lifecycle::new("schema-storage"),
        }
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> SchemaStorageService {
        Self::new(ServiceConfig::new("schema-storage"), store)
    }
}

impl Service for SchemaStorageService {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn start(&self, node: &NodeContext) -> Result<(), ServiceError> {
        self.lifecycle.start(node, |node| {
            let out = node.clone();
            let store = Arc::clone(&self.store);
            let handler: MessageHandler = Arc::new(move |d: &Delivery<'_>| {
                if let Some(output) = process_schema_patch(store.as_ref(), d.message) {
                    if let Some(update) = &output.update {
                        out.send(topic::SCHEMA_UPDATES, &output.key, update);
                    }
                    out.send(topic::PARTIAL_RESPONSES, &output.key, &output.response);
                }
                true
            });
            node.subscribe(
                &self.config.group_id,
                &[topic::SCHEMA_PATCHES],
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
    use crate::store::InMemoryStore;
    use dbz_core::patch::Patch;

    const DBID: &str = "my-db";

    fn request(patch: &Patch<DatabaseId>) -> Document {
        let mut headers = Document::new();
        message::add_headers(&mut headers, "some-unique-client", 1234, "jane.smith", 1);
        message::create_patch_request(&headers, patch)
    }

    #[test]
    fn create_publishes_update_and_response() {
        let store = InMemoryStore::new();
        let schema = Document::new().with("entityTypes", Document::new());
        let create = Patch::create(DatabaseId::new(DBID), &schema);
        let out = process_schema_patch(&store, &request(&create)).unwrap();
        assert_eq!(out.key, DBID);

        let update = out.update.unwrap();
        assert!(message::is_success(&update));
        assert_eq!(message::id(&update), Some(DBID));
        assert_eq!(message::after(&update), Some(&schema));
        assert_eq!(message::client_id(&update), Some("some-unique-client"));

        assert!(message::is_success(&out.response));
        assert_eq!(message::after(&out.response), Some(&schema));
        assert_eq!(store.get(DBID), Some(schema));
    }

    #[test]
    fn read_only_responds() {
        let store = InMemoryStore::new();
        let read = request(&Patch::read(DatabaseId::new(DBID)));
        let missing = process_schema_patch(&store, &read).unwrap();
        assert_eq!(message::status(&missing.response), Some(Status::DoesNotExist));

        let schema = Document::new().with("version", 1);
        store.put(DBID, schema.clone());
        let out = process_schema_patch(&store, &read).unwrap();
        assert!(out.update.is_none());
        assert_eq!(message::after(&out.response), Some(&schema));
    }

    #[test]
    fn unchanged_schema_is_not_announced() {
        let store = InMemoryStore::new();
        store.put(DBID, Document::new().with("version", 1));
        let same = Patch::edit(DatabaseId::new(DBID)).replace("/version", 1).end();
        let out = process_schema_patch(&store, &request(&same)).unwrap();
        assert!(out.update.is_none());
        assert!(message::is_success(&out.response));

        let failing = Patch::edit(DatabaseId::new(DBID)).remove("/missing").end();
        let out = process_schema_patch(&store, &request(&failing)).unwrap();
        assert!(out.update.is_none());
        assert_eq!(message::status(&out.response), Some(Status::PatchFailed));
    }

    #[test]
    fn failed_patch_announces_earlier_operations() {
        let store = InMemoryStore::new();
        let original = Document::new().with("version", 1);
        store.put(DBID, original.clone());
        let edit = Patch::edit(DatabaseId::new(DBID))
            .add("/owner", "jane")
            .require("/version", 2)
            .increment("/version", 1)
            .end();
        let out = process_schema_patch(&store, &request(&edit)).unwrap();
        assert_eq!(message::status(&out.response), Some(Status::PatchFailed));
        assert!(message::failure(&out.response).is_some());

        let expected = original.clone().with("owner", "jane");
        assert_eq!(store.get(DBID), Some(expected.clone()));
        assert_eq!(message::after(&out.response), Some(&expected));
        assert_eq!(message::before(&out.response), Some(&original));
        assert_eq!(out.update.as_ref().and_then(message::after), Some(&expected));
    }
}
