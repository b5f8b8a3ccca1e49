//! Request correlation and response accumulation.
//!
//! Each outstanding request is registered under a [`RequestId`] together
//! with the number of response parts it expects and the [`Handlers`] to
//! call. Parts arriving on `partial-responses` are collected until all are
//! present, then the response handler runs exactly once and the entry is
//! removed. Entries whose deadline passes are removed by the reaper and
//! their failure handler runs with [`Failure::TimedOut`]; shutting down
//! fails every remaining entry with [`Failure::NotAvailable`].
//!
//! Handlers are always invoked after the lock on the pending map has been
//! released.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use dbz_core::message::{self, topic, RequestId, Status};
use dbz_core::Document;
use parking_lot::Mutex;

use crate::bus::{Delivery, MessageHandler};
use crate::config::ClientConfig;
use crate::context::ExecutionContext;
use crate::error::{ClientError, ServiceError};
use crate::service::{Lifecycle, NodeContext, Service, ServiceState};

// ── Outcomes ──────────────────────────────────────────────────────────────

/// Why a request produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    TimedOut,
    NotAvailable,
}

impl Failure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Failure::TimedOut => "TIMED_OUT",
            Failure::NotAvailable => "NOT_AVAILABLE",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every part of a completed request, ordered by part index.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    id: RequestId,
    parts: Vec<Document>,
}

impl Response {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn parts(&self) -> &[Document] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Document> {
        self.parts
    }

    /// The first part, which is the whole response for single-part requests.
    pub fn first(&self) -> Option<&Document> {
        self.parts.first()
    }

    /// The status of each part, in part order.
    pub fn statuses(&self) -> Vec<Option<Status>> {
        self.parts.iter().map(message::status).collect()
    }

    /// True when every part reports success.
    pub fn is_success(&self) -> bool {
        self.parts.iter().all(message::is_success)
    }
}

type ResponseFn = Box<dyn FnOnce(Response) + Send>;
type FailureFn = Box<dyn FnOnce(Failure) + Send>;

/// The callbacks of one request. Once it is dispatched, exactly one of them
/// is called.
pub struct Handlers {
    on_response: ResponseFn,
    on_failure: FailureFn,
}

impl Handlers {
    pub fn new(
        on_response: impl FnOnce(Response) + Send + 'static,
        on_failure: impl FnOnce(Failure) + Send + 'static,
    ) -> Handlers {
        Handlers {
            on_response: Box::new(on_response),
            on_failure: Box::new(on_failure),
        }
    }

    /// Handlers that only care about a response; failures are logged.
    pub fn on_response(on_response: impl FnOnce(Response) + Send + 'static) -> Handlers {
        Handlers::new(on_response, |failure| {
            log::debug!("request failed: {failure}");
        })
    }

    /// Handlers that forward the outcome into a channel.
    pub fn channel(tx: Sender<Result<Response, Failure>>) -> Handlers {
        let failed = tx.clone();
        Handlers::new(
            move |response| {
                let _ = tx.send(Ok(response));
            },
            move |failure| {
                let _ = failed.send(Err(failure));
            },
        )
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handlers")
    }
}

// ── Pending requests ──────────────────────────────────────────────────────

struct Pending {
    context: ExecutionContext,
    expected_parts: u32,
    parts: BTreeMap<u32, Document>,
    deadline: Instant,
    handlers: Handlers,
}

struct Shared {
    client_id: Arc<str>,
    next_request: AtomicU64,
    default_timeout: Duration,
    running: Mutex<bool>,
    pending: Mutex<HashMap<RequestId, Pending>>,
}

impl Shared {
    fn register(
        &self,
        context: &ExecutionContext,
        expected_parts: u32,
        timeout: Duration,
        handlers: Handlers,
    ) -> Result<RequestId, ClientError> {
        // Holding `running` keeps shutdown from draining between the check
        // and the insert.
        let running = self.running.lock();
        if !*running {
            return Err(ClientError::NotRunning("response-handlers".to_string()));
        }
        let id = RequestId::new(
            Arc::clone(&self.client_id),
            self.next_request.fetch_add(1, Ordering::Relaxed),
        );
        let expected_parts = expected_parts.max(1);
        self.pending.lock().insert(
            id.clone(),
            Pending {
                context: context.clone(),
                expected_parts,
                parts: BTreeMap::new(),
                deadline: Instant::now() + timeout,
                handlers,
            },
        );
        log::debug!("{id}: registered for {context}, expecting {expected_parts} parts");
        Ok(id)
    }

    fn deliver(&self, msg: Document) -> bool {
        let Some(id) = message::request_id(&msg) else {
            log::debug!("ignoring response without request headers");
            return false;
        };
        if id.client_id() != &*self.client_id {
            return false;
        }
        let (part, _) = message::parts(&msg);
        let completed = {
            let mut pending = self.pending.lock();
            let Some(entry) = pending.get_mut(&id) else {
                log::debug!("{id}: ignoring part {part}, request is not pending");
                return false;
            };
            let numbered = msg.has(message::field::PART);
            let in_range = (1..=entry.expected_parts).contains(&part);
            if !in_range || (!numbered && entry.expected_parts > 1) {
                log::debug!("{id}: ignoring part {part} of {}", entry.expected_parts);
                return false;
            }
            if entry.parts.contains_key(&part) {
                log::debug!("{id}: ignoring duplicate part {part}");
                return false;
            }
            entry.parts.insert(part, msg);
            if entry.parts.len() < entry.expected_parts as usize {
                return true;
            }
            pending.remove(&id)
        };
        if let Some(entry) = completed {
            log::debug!("{id}: complete for {}", entry.context);
            (entry.handlers.on_response)(Response {
                id,
                parts: entry.parts.into_values().collect(),
            });
        }
        true
    }

    fn drain(&self, filter: impl Fn(&Pending) -> bool) -> Vec<(RequestId, Pending)> {
        let mut pending = self.pending.lock();
        let ids: Vec<RequestId> = pending
            .iter()
            .filter(|(_, p)| filter(p))
            .map(|(id, _)| id.clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| pending.remove(&id).map(|p| (id, p)))
            .collect()
    }

    fn expire(&self, now: Instant) -> usize {
        let expired = self.drain(|p| p.deadline <= now);
        let count = expired.len();
        for (id, entry) in expired {
            log::warn!(
                "{id}: timed out with {} of {} parts",
                entry.parts.len(),
                entry.expected_parts
            );
            (entry.handlers.on_failure)(Failure::TimedOut);
        }
        count
    }

    fn shutdown(&self) {
        *self.running.lock() = false;
        for (id, entry) in self.drain(|_| true) {
            log::debug!("{id}: abandoned at shutdown");
            (entry.handlers.on_failure)(Failure::NotAvailable);
        }
    }
}

// ── ResponseHandlers ──────────────────────────────────────────────────────

/// The response accumulator of one client.
///
/// As a [`Service`] it consumes `partial-responses` with the group
/// `responses-<client id>` and sweeps expired requests in the background.
pub struct ResponseHandlers {
    shared: Arc<Shared>,
    response_threads: usize,
    reaper_interval: Duration,
    reaper: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
    lifecycle: Lifecycle,
}

impl ResponseHandlers {
    pub fn new(config: &ClientConfig) -> ResponseHandlers {
        ResponseHandlers {
            shared: Arc::new(Shared {
                client_id: Arc::from(config.client_id.as_str()),
                next_request: AtomicU64::new(1),
                default_timeout: config.request_timeout(),
                running: Mutex::new(true),
                pending: Mutex::new(HashMap::new()),
            }),
            response_threads: config.response_threads,
            reaper_interval: config.reaper_interval(),
            reaper: Mutex::new(None),
            lifecycle: Lifecycle::new("response-handlers"),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    pub fn group_id(&self) -> String {
        format!("responses-{}", self.shared.client_id)
    }

    /// Number of requests still waiting for parts.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Registers a request using the configured request timeout.
    pub fn register(
        &self,
        context: &ExecutionContext,
        expected_parts: u32,
        handlers: Handlers,
    ) -> Result<RequestId, ClientError> {
        self.shared
            .register(context, expected_parts, self.shared.default_timeout, handlers)
    }

    pub fn register_with_timeout(
        &self,
        context: &ExecutionContext,
        expected_parts: u32,
        timeout: Duration,
        handlers: Handlers,
    ) -> Result<RequestId, ClientError> {
        self.shared.register(context, expected_parts, timeout, handlers)
    }

    /// Removes a pending request without calling its handlers.
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.shared.pending.lock().remove(id).is_some()
    }

    /// Accepts one response part. Returns `false` if the part was ignored:
    /// foreign, unknown, already completed, or a duplicate.
    pub fn deliver(&self, msg: Document) -> bool {
        self.shared.deliver(msg)
    }

    /// Fails every request whose deadline is at or before `now`.
    pub fn expire(&self, now: Instant) -> usize {
        self.shared.expire(now)
    }

    /// Registers a single-part request, runs `send_action` and blocks until
    /// the response arrives or `timeout` elapses.
    ///
    /// On a response, returns `result_mapper`'s value. On timeout or
    /// shutdown, `not_available` is called and `None` is returned. An error
    /// from `send_action` cancels the request and is returned as is.
    pub fn request_and_wait<R>(
        &self,
        context: &ExecutionContext,
        timeout: Duration,
        send_action: impl FnOnce(&RequestId) -> Result<(), ClientError>,
        result_mapper: impl FnOnce(Response) -> Option<R>,
        not_available: impl FnOnce(Failure),
    ) -> Result<Option<R>, ClientError> {
        match self.wait_for(context, 1, timeout, send_action)? {
            Ok(response) => Ok(result_mapper(response)),
            Err(failure) => {
                not_available(failure);
                Ok(None)
            }
        }
    }

    /// Like [`request_and_wait`](Self::request_and_wait) for any number of
    /// parts, returning the raw outcome.
    pub fn wait_for(
        &self,
        context: &ExecutionContext,
        expected_parts: u32,
        timeout: Duration,
        send_action: impl FnOnce(&RequestId) -> Result<(), ClientError>,
    ) -> Result<Result<Response, Failure>, ClientError> {
        let (tx, rx) = bounded(1);
        let id =
            self.register_with_timeout(context, expected_parts, timeout, Handlers::channel(tx))?;
        if let Err(e) = send_action(&id) {
            self.cancel(&id);
            return Err(e);
        }
        match rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(outcome),
            Err(RecvTimeoutError::Timeout) => {
                // The reaper may not have run yet.
                self.cancel(&id);
                log::warn!("{id}: no response within {timeout:?}");
                Ok(Err(Failure::TimedOut))
            }
            Err(RecvTimeoutError::Disconnected) => Ok(Err(Failure::NotAvailable)),
        }
    }

    fn start_reaper(&self) -> Result<(), ServiceError> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let interval = self.reaper_interval;
        let handle = std::thread::Builder::new()
            .name(format!("reaper-{}", shared.client_id))
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        shared.expire(Instant::now());
                    }
                    _ => break,
                }
            })
            .map_err(|e| ServiceError::NotRunning(format!("reaper: {e}")))?;
        *self.reaper.lock() = Some((stop_tx, handle));
        Ok(())
    }

    fn stop_reaper(&self) {
        if let Some((stop, handle)) = self.reaper.lock().take() {
            drop(stop);
            let _ = handle.join();
        }
    }
}

impl Service for ResponseHandlers {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn start(&self, node: &NodeContext) -> Result<(), ServiceError> {
        self.lifecycle.start(node, |node| {
            let shared = Arc::clone(&self.shared);
            let handler: MessageHandler = Arc::new(move |d: &Delivery<'_>| {
                if message::client_id(d.message) == Some(&*shared.client_id) {
                    shared.deliver(d.message.clone());
                }
                true
            });
            node.subscribe(
                &self.group_id(),
                &[topic::PARTIAL_RESPONSES],
                self.response_threads,
                handler,
            )?;
            self.start_reaper()
        })
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.lifecycle.stop(|node| {
            node.unsubscribe(&self.group_id());
            self.stop_reaper();
        })?;
        self.shared.shutdown();
        Ok(())
    }
}

impl Drop for ResponseHandlers {
    fn drop(&mut self) {
        self.stop_reaper();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbz_core::identifier::DatabaseId;

    fn config() -> ClientConfig {
        ClientConfig {
            client_id: "client-a".to_string(),
            ..ClientConfig::default()
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(DatabaseId::new("db"), "jane")
    }

    fn part(id: &RequestId, part: u32, parts: u32) -> Document {
        let mut msg = Document::new();
        message::add_headers(&mut msg, id.client_id(), id.number(), "jane", 0);
        message::set_parts(&mut msg, part, parts);
        message::set_status(&mut msg, Status::Success);
        msg
    }

    fn recording() -> (Handlers, crossbeam_channel::Receiver<Result<Response, Failure>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Handlers::channel(tx), rx)
    }

    #[test]
    fn request_numbers_increase() {
        let handlers = ResponseHandlers::new(&config());
        let a = handlers.register(&context(), 1, Handlers::on_response(|_| ())).unwrap();
        let b = handlers.register(&context(), 1, Handlers::on_response(|_| ())).unwrap();
        assert_eq!(a.client_id(), "client-a");
        assert!(b.number() > a.number());
        assert_eq!(handlers.pending_count(), 2);
    }

    #[test]
    fn all_parts_complete_exactly_once() {
        let handlers = ResponseHandlers::new(&config());
        let (h, rx) = recording();
        let id = handlers.register(&context(), 3, h).unwrap();
        assert!(handlers.deliver(part(&id, 2, 3)));
        assert!(handlers.deliver(part(&id, 1, 3)));
        assert!(!handlers.deliver(part(&id, 1, 3)));
        assert!(rx.try_recv().is_err());
        assert!(handlers.deliver(part(&id, 3, 3)));

        let response = rx.try_recv().unwrap().unwrap();
        assert_eq!(response.id(), &id);
        let order: Vec<_> = response.parts().iter().map(|p| message::parts(p).0).collect();
        assert_eq!(order, [1, 2, 3]);
        assert!(response.is_success());
        assert_eq!(response.statuses(), vec![Some(Status::Success); 3]);

        // Late duplicate after completion.
        assert!(!handlers.deliver(part(&id, 3, 3)));
        assert!(rx.try_recv().is_err());
        assert_eq!(handlers.pending_count(), 0);
    }

    #[test]
    fn parts_outside_the_expected_range_are_ignored() {
        let handlers = ResponseHandlers::new(&config());
        let (h, rx) = recording();
        let id = handlers.register(&context(), 2, h).unwrap();
        assert!(!handlers.deliver(part(&id, 0, 2)));
        assert!(!handlers.deliver(part(&id, 3, 2)));

        let mut unnumbered = Document::new();
        message::add_headers(&mut unnumbered, id.client_id(), id.number(), "jane", 0);
        assert!(!handlers.deliver(unnumbered));
        assert!(rx.try_recv().is_err());
        assert_eq!(handlers.pending_count(), 1);

        assert!(handlers.deliver(part(&id, 1, 2)));
        assert!(handlers.deliver(part(&id, 2, 2)));
        assert_eq!(rx.try_recv().unwrap().map(|r| r.parts().len()), Ok(2));
    }

    #[test]
    fn unnumbered_response_completes_single_part_request() {
        let handlers = ResponseHandlers::new(&config());
        let (h, rx) = recording();
        let id = handlers.register(&context(), 1, h).unwrap();
        let mut response = Document::new();
        message::add_headers(&mut response, id.client_id(), id.number(), "jane", 0);
        assert!(handlers.deliver(response));
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn missing_part_times_out() {
        let handlers = ResponseHandlers::new(&config());
        let (h, rx) = recording();
        let id = handlers
            .register_with_timeout(&context(), 3, Duration::from_millis(10), h)
            .unwrap();
        handlers.deliver(part(&id, 1, 3));
        handlers.deliver(part(&id, 2, 3));
        assert_eq!(handlers.expire(Instant::now()), 0);
        assert_eq!(handlers.expire(Instant::now() + Duration::from_secs(1)), 1);
        assert_eq!(rx.try_recv().unwrap(), Err(Failure::TimedOut));
        assert!(!handlers.deliver(part(&id, 3, 3)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn foreign_and_headerless_responses_are_ignored() {
        let handlers = ResponseHandlers::new(&config());
        let id = handlers.register(&context(), 1, Handlers::on_response(|_| ())).unwrap();
        let other = RequestId::new("client-b", id.number());
        assert!(!handlers.deliver(part(&other, 1, 1)));
        assert!(!handlers.deliver(Document::new()));
        assert_eq!(handlers.pending_count(), 1);
    }

    #[test]
    fn shutdown_fails_pending_and_rejects_new() {
        let handlers = ResponseHandlers::new(&config());
        let (h, rx) = recording();
        handlers.register(&context(), 2, h).unwrap();
        handlers.stop().unwrap();
        assert_eq!(rx.try_recv().unwrap(), Err(Failure::NotAvailable));
        assert!(matches!(
            handlers.register(&context(), 1, Handlers::on_response(|_| ())),
            Err(ClientError::NotRunning(_))
        ));
    }

    #[test]
    fn request_and_wait_returns_mapped_response() {
        let handlers = Arc::new(ResponseHandlers::new(&config()));
        let responder = Arc::clone(&handlers);
        let result = handlers
            .request_and_wait(
                &context(),
                Duration::from_secs(5),
                |id| {
                    let msg = part(id, 1, 1);
                    std::thread::spawn(move || responder.deliver(msg));
                    Ok(())
                },
                |response| message::request_id(response.first()?),
                |_| panic!("response expected"),
            )
            .unwrap();
        assert_eq!(result.map(|id| id.client_id().to_string()), Some("client-a".to_string()));
    }

    #[test]
    fn request_and_wait_times_out() {
        let handlers = ResponseHandlers::new(&config());
        let mut failure = None;
        let result: Option<()> = handlers
            .request_and_wait(
                &context(),
                Duration::from_millis(20),
                |_| Ok(()),
                |_| Some(()),
                |f| failure = Some(f),
            )
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(failure, Some(Failure::TimedOut));
        assert_eq!(handlers.pending_count(), 0);
    }

    #[test]
    fn failed_send_cancels() {
        let handlers = ResponseHandlers::new(&config());
        let result: Result<Option<()>, _> = handlers.request_and_wait(
            &context(),
            Duration::from_secs(5),
            |_| {
                Err(ClientError::Dispatch {
                    topic: "t".into(),
                    key: "k".into(),
                })
            },
            |_| Some(()),
            |_| (),
        );
        assert!(matches!(result, Err(ClientError::Dispatch { .. })));
        assert_eq!(handlers.pending_count(), 0);
    }
}
