//! [`Client`] — the entry point for applications.

use std::sync::Arc;

use dbz_core::identifier::DatabaseId;

use crate::bus::MessageBus;
use crate::config::{ClientConfig, ConfigError};
use crate::context::ExecutionContext;
use crate::correlation::ResponseHandlers;
use crate::databases::{Database, Databases};
use crate::error::ClientError;
use crate::node::Node;
use crate::service::ServiceState;

/// A client node: the response accumulator plus the database tracker,
/// sharing one bus connection.
///
/// ```no_run
/// use std::sync::Arc;
/// use dbz_client::bus::InMemoryBus;
/// use dbz_client::config::ClientConfig;
/// use dbz_client::Client;
/// use dbz_core::identifier::DatabaseId;
///
/// let client = Client::new(ClientConfig::default(), Arc::new(InMemoryBus::default())).unwrap();
/// client.start().unwrap();
/// let db = client.connect(DatabaseId::new("crm"), "jane").unwrap();
/// let contact = db.id().entity_type("contacts").entity("1");
/// let response = db.read_and_wait([contact]).unwrap();
/// println!("{:?}", response.statuses());
/// client.shutdown();
/// ```
pub struct Client {
    config: ClientConfig,
    node: Node,
    responses: Arc<ResponseHandlers>,
    databases: Arc<Databases>,
}

impl Client {
    pub fn new(config: ClientConfig, bus: Arc<dyn MessageBus>) -> Result<Client, ConfigError> {
        config.validate()?;
        let node = Node::new(config.client_id.as_str(), bus);
        let responses = Arc::new(ResponseHandlers::new(&config));
        let databases = Arc::new(Databases::new(Arc::clone(&responses)));
        // Responses must stop after databases.
        node.add(databases.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        node.add(responses.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Client {
            config,
            node,
            responses,
            databases,
        })
    }

    pub fn id(&self) -> &str {
        self.node.id()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        self.node.state()
    }

    pub fn start(&self) -> Result<(), ClientError> {
        Ok(self.node.start()?)
    }

    /// Connects `username` to a database, waiting up to the connect timeout
    /// for its schema.
    pub fn connect(&self, id: DatabaseId, username: &str) -> Result<Database, ClientError> {
        let context = ExecutionContext::new(id, username);
        self.databases.connect(&context, self.config.connect_timeout())?;
        Ok(Database::new(
            Arc::clone(&self.databases),
            context,
            self.config.request_timeout(),
        ))
    }

    /// Number of requests awaiting responses.
    pub fn pending_requests(&self) -> usize {
        self.responses.pending_count()
    }

    pub fn shutdown(&self) {
        self.node.shutdown();
    }
}
