//! Service lifecycle.
//!
//! Every service moves through `Created → Starting → Running → Stopping →
//! Stopped` exactly once, driven by the [`Node`](crate::node::Node) that owns
//! it. While running, a service reaches the bus through the
//! [`NodeContext`] it was started with.

use std::sync::Arc;

use dbz_core::Document;
use parking_lot::Mutex;

use crate::bus::{MessageBus, MessageHandler};
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl ServiceState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ServiceState;

    fn start(&self, node: &NodeContext) -> Result<(), ServiceError>;

    /// Stopping a service that never started, or already stopped, succeeds.
    fn stop(&self) -> Result<(), ServiceError>;
}

// ── NodeContext ───────────────────────────────────────────────────────────

/// The node's identity and bus, as seen by its services.
#[derive(Clone)]
pub struct NodeContext {
    id: Arc<str>,
    bus: Arc<dyn MessageBus>,
}

impl NodeContext {
    pub fn new(id: impl Into<Arc<str>>, bus: Arc<dyn MessageBus>) -> NodeContext {
        NodeContext { id: id.into(), bus }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscribe(
        &self,
        group_id: &str,
        topics: &[&str],
        num_threads: usize,
        handler: MessageHandler,
    ) -> Result<(), ServiceError> {
        if self.bus.subscribe(group_id, topics, num_threads, handler) {
            Ok(())
        } else {
            Err(ServiceError::SubscribeFailed(group_id.to_string()))
        }
    }

    pub fn unsubscribe(&self, group_id: &str) {
        self.bus.unsubscribe(group_id);
    }

    pub fn send(&self, topic: &str, key: &str, message: &Document) -> bool {
        let sent = self.bus.send(topic, key, message);
        if !sent {
            log::warn!("{}: unable to send to {topic} with key {key}", self.id);
        }
        sent
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext").field("id", &self.id).finish()
    }
}

// ── Lifecycle ─────────────────────────────────────────────────────────────

struct Inner {
    state: ServiceState,
    node: Option<NodeContext>,
}

/// State machine shared by the service implementations.
pub struct Lifecycle {
    name: String,
    inner: Mutex<Inner>,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Lifecycle {
        Lifecycle {
            name: name.into(),
            inner: Mutex::new(Inner {
                state: ServiceState::Created,
                node: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ServiceState {
        self.inner.lock().state
    }

    fn transition(&self, from: ServiceState, to: ServiceState) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock();
        if inner.state != from {
            return Err(ServiceError::InvalidTransition {
                service: self.name.clone(),
                from: inner.state,
                to,
            });
        }
        inner.state = to;
        log::debug!("{}: {from:?} -> {to:?}", self.name);
        Ok(())
    }

    /// Runs `on_start` between `Starting` and `Running`. A failed start
    /// leaves the service `Stopped`.
    pub fn start(
        &self,
        node: &NodeContext,
        on_start: impl FnOnce(&NodeContext) -> Result<(), ServiceError>,
    ) -> Result<(), ServiceError> {
        self.transition(ServiceState::Created, ServiceState::Starting)?;
        match on_start(node) {
            Ok(()) => {
                let mut inner = self.inner.lock();
                inner.node = Some(node.clone());
                inner.state = ServiceState::Running;
                log::info!("{}: running on node {}", self.name, node.id());
                Ok(())
            }
            Err(e) => {
                self.inner.lock().state = ServiceState::Stopped;
                log::warn!("{}: failed to start: {e}", self.name);
                Err(e)
            }
        }
    }

    pub fn stop(&self, on_stop: impl FnOnce(&NodeContext)) -> Result<(), ServiceError> {
        let node = {
            let mut inner = self.inner.lock();
            match inner.state {
                ServiceState::Created | ServiceState::Stopped => {
                    inner.state = ServiceState::Stopped;
                    return Ok(());
                }
                ServiceState::Running => {
                    inner.state = ServiceState::Stopping;
                    inner.node.take()
                }
                from => {
                    return Err(ServiceError::InvalidTransition {
                        service: self.name.clone(),
                        from,
                        to: ServiceState::Stopping,
                    })
                }
            }
        };
        if let Some(node) = node {
            on_stop(&node);
        }
        self.transition(ServiceState::Stopping, ServiceState::Stopped)?;
        log::info!("{}: stopped", self.name);
        Ok(())
    }

    /// Calls `f` with the node if the service is running.
    pub fn when_running<R>(&self, f: impl FnOnce(&NodeContext) -> R) -> Result<R, ServiceError> {
        let node = {
            let inner = self.inner.lock();
            match (&inner.state, &inner.node) {
                (ServiceState::Running, Some(node)) => node.clone(),
                _ => return Err(ServiceError::NotRunning(self.name.clone())),
            }
        };
        Ok(f(&node))
    }
}
