//! The client's view of databases: cached schemas plus request submission.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dbz_core::batch::Batch;
use dbz_core::identifier::{DatabaseId, EntityId, Identifier};
use dbz_core::message::{self, topic, RequestId};
use dbz_core::patch::Patch;
use dbz_core::Document;
use parking_lot::RwLock;

use crate::bus::{Delivery, MessageHandler};
use crate::context::ExecutionContext;
use crate::correlation::{Failure, Handlers, Response, ResponseHandlers};
use crate::error::{ClientError, ServiceError};
use crate::service::{Lifecycle, NodeContext, Service, ServiceState};

/// A database whose schema this client has seen.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDatabase {
    id: DatabaseId,
    schema: Document,
}

impl ActiveDatabase {
    pub fn id(&self) -> &DatabaseId {
        &self.id
    }

    pub fn schema(&self) -> &Document {
        &self.schema
    }
}

type ActiveMap = Arc<RwLock<HashMap<DatabaseId, ActiveDatabase>>>;

fn remember(active: &ActiveMap, id: DatabaseId, schema: Document) -> ActiveDatabase {
    let db = ActiveDatabase { id, schema };
    active.write().insert(db.id.clone(), db.clone());
    db
}

fn dispatch(node: &NodeContext, topic: &str, key: &str, msg: &Document) -> Result<(), ClientError> {
    if node.send(topic, key, msg) {
        Ok(())
    } else {
        Err(ClientError::Dispatch {
            topic: topic.to_string(),
            key: key.to_string(),
        })
    }
}

fn group_id(node: &NodeContext) -> String {
    format!("databases-{}", node.id())
}

/// Tracks the schemas on `schema-updates` and submits requests on behalf of
/// connected databases.
pub struct Databases {
    active: ActiveMap,
    handlers: Arc<ResponseHandlers>,
    lifecycle: Lifecycle,
}

impl Databases {
    pub fn new(handlers: Arc<ResponseHandlers>) -> Databases {
        Databases {
            active: Arc::new(RwLock::new(HashMap::new())),
            handlers,
            lifecycle: Lifecycle::new("databases"),
        }
    }

    pub fn active(&self, id: &DatabaseId) -> Option<ActiveDatabase> {
        self.active.read().get(id).cloned()
    }

    /// Returns the database of `context`, reading its schema if it is not
    /// cached yet.
    pub fn connect(
        &self,
        context: &ExecutionContext,
        timeout: Duration,
    ) -> Result<ActiveDatabase, ClientError> {
        let db = context.database_id();
        self.lifecycle.when_running(|node| {
            if let Some(active) = self.active(db) {
                return Ok(active);
            }
            let key = db.to_string();
            let found = self.handlers.request_and_wait(
                context,
                timeout,
                |id| {
                    let mut request =
                        message::create_patch_request(&Document::new(), &Patch::read(db.clone()));
                    message::add_request_headers(&mut request, id, context.username());
                    dispatch(node, topic::SCHEMA_PATCHES, &key, &request)
                },
                |response| {
                    let part = response.first()?;
                    if !message::is_success(part) {
                        return None;
                    }
                    let schema = message::after(part)?.clone();
                    Some(remember(&self.active, db.clone(), schema))
                },
                |failure| log::warn!("database {db} is not available: {failure}"),
            )?;
            found.ok_or_else(|| ClientError::ConnectionUnavailable(key))
        })?
    }

    /// Submits `batch`; `handlers` receive one part per patch.
    pub fn submit_batch(
        &self,
        context: &ExecutionContext,
        batch: &Batch<EntityId>,
        handlers: Handlers,
    ) -> Result<RequestId, ClientError> {
        check_batch(context, batch)?;
        self.lifecycle.when_running(|node| {
            let id = self
                .handlers
                .register(context, batch.patch_count() as u32, handlers)?;
            if let Err(e) = self.send_batch(node, context, &id, batch) {
                self.handlers.cancel(&id);
                return Err(e);
            }
            Ok(id)
        })?
    }

    pub fn read_entities(
        &self,
        context: &ExecutionContext,
        ids: impl IntoIterator<Item = EntityId>,
        handlers: Handlers,
    ) -> Result<RequestId, ClientError> {
        let batch = Batch::builder().read_all(ids).build();
        self.submit_batch(context, &batch, handlers)
    }

    /// Submits `batch` and blocks until every part has arrived.
    pub fn submit_and_wait(
        &self,
        context: &ExecutionContext,
        batch: &Batch<EntityId>,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        check_batch(context, batch)?;
        let outcome = self.lifecycle.when_running(|node| {
            self.handlers
                .wait_for(context, batch.patch_count() as u32, timeout, |id| {
                    self.send_batch(node, context, id, batch)
                })
        })??;
        match outcome {
            Ok(response) => Ok(response),
            Err(Failure::TimedOut) => Err(ClientError::Timeout(format!(
                "batch of {} patches for {context}",
                batch.patch_count()
            ))),
            Err(Failure::NotAvailable) => Err(ClientError::ConnectionUnavailable(
                context.database_id().to_string(),
            )),
        }
    }

    fn send_batch(
        &self,
        node: &NodeContext,
        context: &ExecutionContext,
        id: &RequestId,
        batch: &Batch<EntityId>,
    ) -> Result<(), ClientError> {
        let mut request = message::create_batch_request(&Document::new(), batch);
        message::add_request_headers(&mut request, id, context.username());
        dispatch(node, topic::ENTITY_BATCHES, &id.to_string(), &request)
    }
}

fn check_batch(context: &ExecutionContext, batch: &Batch<EntityId>) -> Result<(), ClientError> {
    if batch.is_empty() {
        return Err(ClientError::Client("batch has no patches".to_string()));
    }
    if !batch.applies_to(context.database_id()) {
        return Err(ClientError::Client(format!(
            "batch has patches outside database {}",
            context.database_id()
        )));
    }
    if let Some(patch) = batch.iter().find(|p| !p.target().is_valid()) {
        return Err(ClientError::Client(format!(
            "patch target {:?} has an empty component",
            patch.target()
        )));
    }
    Ok(())
}

impl Service for Databases {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn start(&self, node: &NodeContext) -> Result<(), ServiceError> {
        self.lifecycle.start(node, |node| {
            let active = Arc::clone(&self.active);
            let handler: MessageHandler = Arc::new(move |d: &Delivery<'_>| {
                match (DatabaseId::parse(d.key), message::after(d.message)) {
                    (Some(id), Some(schema)) => {
                        log::debug!("schema of {id} updated");
                        remember(&active, id, schema.clone());
                    }
                    _ => log::warn!("ignoring schema update with key {:?}", d.key),
                }
                true
            });
            // A group unique to this node, so it sees every update.
            node.subscribe(&group_id(node), &[topic::SCHEMA_UPDATES], 1, handler)
        })
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.lifecycle.stop(|node| node.unsubscribe(&group_id(node)))?;
        self.active.write().clear();
        Ok(())
    }
}

// ── Database ──────────────────────────────────────────────────────────────

/// A connection to one database, on behalf of one user.
pub struct Database {
    databases: Arc<Databases>,
    context: ExecutionContext,
    timeout: Duration,
}

impl Database {
    pub(crate) fn new(
        databases: Arc<Databases>,
        context: ExecutionContext,
        timeout: Duration,
    ) -> Database {
        Database {
            databases,
            context,
            timeout,
        }
    }

    pub fn id(&self) -> &DatabaseId {
        self.context.database_id()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// The latest schema seen for this database.
    pub fn schema(&self) -> Option<Document> {
        self.databases.active(self.id()).map(|db| db.schema)
    }

    pub fn read_entities(
        &self,
        ids: impl IntoIterator<Item = EntityId>,
        handlers: Handlers,
    ) -> Result<RequestId, ClientError> {
        self.databases.read_entities(&self.context, ids, handlers)
    }

    pub fn submit_batch(
        &self,
        batch: &Batch<EntityId>,
        handlers: Handlers,
    ) -> Result<RequestId, ClientError> {
        self.databases.submit_batch(&self.context, batch, handlers)
    }

    pub fn submit_and_wait(&self, batch: &Batch<EntityId>) -> Result<Response, ClientError> {
        self.databases.submit_and_wait(&self.context, batch, self.timeout)
    }

    pub fn read_and_wait(
        &self,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Result<Response, ClientError> {
        let batch = Batch::builder().read_all(ids).build();
        self.submit_and_wait(&batch)
    }
}
