//! Applies entity patches to the entity store.

use std::sync::Arc;

use dbz_core::identifier::EntityId;
use dbz_core::message::{self, topic, Status};
use dbz_core::Document;

use crate::bus::{Delivery, MessageHandler};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::service::{Lifecycle, NodeContext, Service, ServiceState};
use crate::store::DocumentStore;

/// Handles one `entity-patches` request and returns the response part.
///
/// Reads and deletions of a missing entity answer `DOES_NOT_EXIST`; any
/// other patch against a missing entity starts from an empty document. A
/// failed patch keeps the operations applied before the failure: the
/// partially patched entity is stored and returned as `after`.
pub fn process_patch(store: &dyn DocumentStore, request: &Document) -> Option<Document> {
    let patch = match message::patch::<EntityId>(request) {
        Ok(patch) => patch,
        Err(e) => {
            log::warn!("entity-storage: ignoring malformed request: {e}");
            return None;
        }
    };
    let key = patch.target().to_string();
    let before = store.get(&key);
    let mut response = message::create_response(request);
    message::add_id(&mut response, patch.target());

    if patch.is_read_request() || patch.is_deletion() {
        let Some(existing) = before else {
            message::set_status(&mut response, Status::DoesNotExist);
            return Some(response);
        };
        if patch.is_deletion() {
            store.remove(&key);
            message::set_before(&mut response, existing);
        } else {
            message::set_after(&mut response, existing);
        }
        message::set_status(&mut response, Status::Success);
        return Some(response);
    }

    let mut entity = before.clone().unwrap_or_default();
    let outcome = patch.apply(&mut entity);
    if let Some(existing) = before {
        message::set_before(&mut response, existing);
    }
    match outcome.failure() {
        None => {
            store.put(&key, entity.clone());
            message::set_after(&mut response, entity);
            message::set_status(&mut response, Status::Success);
        }
        Some(failure) => {
            log::debug!("entity-storage: {key}: {failure}");
            if outcome.applied() > 0 {
                store.put(&key, entity.clone());
                message::set_after(&mut response, entity);
            }
            message::set_failure(&mut response, &failure.to_string());
            message::set_status(&mut response, Status::PatchFailed);
        }
    }
    Some(response)
}

pub struct EntityStorageService {
    config: ServiceConfig,
    store: Arc<dyn DocumentStore>,
    lifecycle: Lifecycle,
}

impl EntityStorageService {
    pub fn new(config: ServiceConfig, store: Arc<dyn DocumentStore>) -> EntityStorageService {
        EntityStorageService {
            config,
            store,
            lifecycle: Lifecycle::new("entity-storage"),
        }
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> EntityStorageService {
        Self::new(ServiceConfig::new("entity-storage"), store)
    }
}

/// Key for a response part: the database, so every part of one request
/// lands on the same partition.
pub(crate) fn response_key(response: &Document) -> String {
    message::database_id(response).map_or_else(String::new, |db| db.to_string())
}

impl Service for EntityStorageService {
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
                if let Some(response) = process_patch(store.as_ref(), d.message) {
                    out.send(topic::PARTIAL_RESPONSES, &response_key(&response), &response);
                }
                true
            });
            node.subscribe(
                &self.config.group_id,
                &[topic::ENTITY_PATCHES],
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
    use dbz_core::identifier::DatabaseId;
    use dbz_core::patch::Patch;
    use dbz_core::Value;

    fn id() -> EntityId {
        DatabaseId::new("db").entity_type("contacts").entity("1")
    }

    fn request(patch: &Patch<EntityId>) -> Document {
        let mut headers = Document::new();
        message::add_headers(&mut headers, "client-a", 3, "jane", 1);
        message::set_parts(&mut headers, 2, 4);
        message::create_patch_request(&headers, patch)
    }

    #[test]
    fn read_missing_entity() {
        let store = InMemoryStore::new();
        let response = process_patch(&store, &request(&Patch::read(id()))).unwrap();
        assert_eq!(message::status(&response), Some(Status::DoesNotExist));
        assert_eq!(message::id(&response), Some("db/contacts/default/1"));
        assert_eq!(message::parts(&response), (2, 4));
    }

    #[test]
    fn create_read_update_delete() {
        let store = InMemoryStore::new();
        let created = Document::new().with("name", "Sally");
        let response = process_patch(&store, &request(&Patch::create(id(), &created))).unwrap();
        assert!(message::is_success(&response));
        assert!(message::before(&response).is_none());
        assert_eq!(message::after(&response), Some(&created));

        let response = process_patch(&store, &request(&Patch::read(id()))).unwrap();
        assert_eq!(message::after(&response), Some(&created));

        let edit = Patch::edit(id()).increment("/visits", 2).end();
        let response = process_patch(&store, &request(&edit)).unwrap();
        assert_eq!(message::before(&response), Some(&created));
        assert_eq!(
            store.get(&id().to_string()).and_then(|d| d.get_i32("visits")),
            Some(2)
        );

        let response = process_patch(&store, &request(&Patch::remove_target(id()))).unwrap();
        assert!(message::is_success(&response));
        assert!(store.is_empty());
    }

    #[test]
    fn failed_patch_keeps_earlier_operations() {
        let store = InMemoryStore::new();
        let original = Document::new().with("v", 1);
        store.put(&id().to_string(), original.clone());
        let edit = Patch::edit(id())
            .add("/x", true)
            .require("/v", 2)
            .add("/y", true)
            .end();
        let response = process_patch(&store, &request(&edit)).unwrap();
        assert_eq!(message::status(&response), Some(Status::PatchFailed));
        assert!(message::failure(&response).unwrap().starts_with("REQUIRE_FAILED"));

        let stored = store.get(&id().to_string()).unwrap();
        assert!(stored.has("x"));
        assert!(!stored.has("y"));
        assert_eq!(message::after(&response), Some(&stored));
        assert_eq!(message::before(&response), Some(&original));
        assert_eq!(
            message::before(&response).and_then(|d| d.get("v")),
            Some(&Value::from(1))
        );
        assert_eq!(response_key(&response), "db");
    }

    #[test]
    fn patch_failing_first_leaves_missing_entity_absent() {
        let store = InMemoryStore::new();
        let edit = Patch::edit(id()).require("/v", 2).add("/x", true).end();
        let response = process_patch(&store, &request(&edit)).unwrap();
        assert_eq!(message::status(&response), Some(Status::PatchFailed));
        assert!(store.is_empty());
        assert!(message::after(&response).is_none());
    }
}
