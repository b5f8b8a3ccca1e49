//! [`Node`] supervises a set of services sharing one bus connection.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::MessageBus;
use crate::error::ServiceError;
use crate::service::{NodeContext, Service, ServiceState};

pub struct Node {
    context: NodeContext,
    services: Mutex<Vec<Arc<dyn Service>>>,
    state: Mutex<ServiceState>,
}

impl Node {
    pub fn new(id: impl Into<Arc<str>>, bus: Arc<dyn MessageBus>) -> Node {
        Node {
            context: NodeContext::new(id, bus),
            services: Mutex::new(Vec::new()),
            state: Mutex::new(ServiceState::Created),
        }
    }

    pub fn id(&self) -> &str {
        self.context.id()
    }

    pub fn context(&self) -> &NodeContext {
        &self.context
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Adds a service. Services start and stop in the order they were added;
    /// one added to a running node is started immediately.
    pub fn add(&self, service: Arc<dyn Service>) -> Result<(), ServiceError> {
        if self.state() == ServiceState::Running {
            service.start(&self.context)?;
        }
        self.services.lock().push(service);
        Ok(())
    }

    /// Starts every service. If one fails, those already started are stopped
    /// again and the error is returned.
    pub fn start(&self) -> Result<(), ServiceError> {
        {
            let mut state = self.state.lock();
            if *state != ServiceState::Created {
                return Err(ServiceError::InvalidTransition {
                    service: format!("node {}", self.id()),
                    from: *state,
                    to: ServiceState::Starting,
                });
            }
            *state = ServiceState::Starting;
        }
        let services = self.services.lock().clone();
        for (i, service) in services.iter().enumerate() {
            if let Err(e) = service.start(&self.context) {
                for started in &services[..i] {
                    let _ = started.stop();
                }
                *self.state.lock() = ServiceState::Stopped;
                return Err(e);
            }
        }
        *self.state.lock() = ServiceState::Running;
        log::info!("node {}: started {} services", self.id(), services.len());
        Ok(())
    }

    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if *state == ServiceState::Stopped {
                return;
            }
            *state = ServiceState::Stopping;
        }
        let services = self.services.lock().clone();
        for service in &services {
            if let Err(e) = service.stop() {
                log::warn!("node {}: {e}", self.id());
            }
        }
        *self.state.lock() = ServiceState::Stopped;
        log::info!("node {}: shut down", self.id());
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::service::Lifecycle;

    struct Recorder {
        lifecycle: Lifecycle,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &str, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Arc<Recorder> {
            Arc::new(Recorder {
                lifecycle: Lifecycle::new(name),
                fail,
                log: Arc::clone(log),
            })
        }
    }

    impl Service for Recorder {
        fn name(&self) -> &str {
            self.lifecycle.name()
        }

        fn state(&self) -> ServiceState {
            self.lifecycle.state()
        }

        fn start(&self, node: &NodeContext) -> Result<(), ServiceError> {
            self.lifecycle.start(node, |_| {
                if self.fail {
                    return Err(ServiceError::SubscribeFailed(self.name().to_string()));
                }
                self.log.lock().push(format!("start {}", self.name()));
                Ok(())
            })
        }

        fn stop(&self) -> Result<(), ServiceError> {
            self.lifecycle
                .stop(|_| self.log.lock().push(format!("stop {}", self.name())))
        }
    }

    #[test]
    fn starts_and_stops_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new("n", Arc::new(InMemoryBus::new(1)));
        let a = Recorder::new("a", false, &log);
        let b = Recorder::new("b", false, &log);
        node.add(a.clone()).unwrap();
        node.add(b.clone()).unwrap();
        node.start().unwrap();
        assert_eq!(node.state(), ServiceState::Running);
        node.shutdown();
        assert_eq!(*log.lock(), ["start a", "start b", "stop a", "stop b"]);
        assert_eq!(a.state(), ServiceState::Stopped);
        assert!(node.start().is_err());
    }

    #[test]
    fn failed_start_unwinds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new("n", Arc::new(InMemoryBus::new(1)));
        let a = Recorder::new("a", false, &log);
        node.add(a.clone()).unwrap();
        node.add(Recorder::new("b", true, &log)).unwrap();
        assert!(node.start().is_err());
        assert_eq!(*log.lock(), ["start a", "stop a"]);
        assert_eq!(node.state(), ServiceState::Stopped);
    }
}
