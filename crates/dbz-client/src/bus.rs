//! The message bus collaborator and an in-process implementation.
//!
//! A bus carries documents on named topics. Each topic is split into
//! partitions by key, and within a partition delivery is ordered. Consumers
//! subscribe as a *group*: every group sees every message once, spread over
//! the group's worker threads by partition.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use dbz_core::{codec, Document};
use parking_lot::Mutex;

/// A message handed to a subscriber.
#[derive(Debug)]
pub struct Delivery<'a> {
    pub topic: &'a str,
    pub partition: u32,
    pub offset: u64,
    pub key: &'a str,
    pub message: &'a Document,
}

/// Consumes one delivery; returning `false` stops the worker that called it.
pub type MessageHandler = Arc<dyn Fn(&Delivery<'_>) -> bool + Send + Sync>;

pub trait MessageBus: Send + Sync {
    /// Starts `num_threads` workers consuming `topics` as `group_id`.
    /// Returns `false` if the group is already subscribed or the bus is closed.
    fn subscribe(
        &self,
        group_id: &str,
        topics: &[&str],
        num_threads: usize,
        handler: MessageHandler,
    ) -> bool;

    /// Stops the workers of `group_id`.
    fn unsubscribe(&self, group_id: &str);

    /// Appends `message` to `topic`. Returns `false` if it was not accepted.
    fn send(&self, topic: &str, key: &str, message: &Document) -> bool;
}

// ── In-memory bus ─────────────────────────────────────────────────────────

struct Record {
    key: Arc<str>,
    bytes: Arc<[u8]>,
}

struct Envelope {
    topic: Arc<str>,
    partition: u32,
    offset: u64,
    key: Arc<str>,
    bytes: Arc<[u8]>,
}

struct Group {
    topics: Vec<String>,
    workers: Vec<Sender<Envelope>>,
    handles: Vec<JoinHandle<()>>,
}

impl Group {
    fn dispatch(&self, envelope: Envelope) {
        let worker = envelope.partition as usize % self.workers.len();
        // A worker that stopped has dropped its receiver.
        let _ = self.workers[worker].send(envelope);
    }

    fn join(self) {
        drop(self.workers);
        let current = thread::current().id();
        for handle in self.handles {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

#[derive(Default)]
struct State {
    topics: HashMap<String, Vec<Vec<Record>>>,
    groups: HashMap<String, Group>,
    closed: bool,
}

/// A [`MessageBus`] that keeps every topic in memory.
///
/// Messages are stored encoded, so each delivery decodes a fresh document.
/// A new group starts from the earliest offset of each partition.
pub struct InMemoryBus {
    partitions: u32,
    state: Mutex<State>,
}

impl InMemoryBus {
    pub fn new(partitions: u32) -> InMemoryBus {
        InMemoryBus {
            partitions: partitions.max(1),
            state: Mutex::new(State::default()),
        }
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn partition_for(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as u32
    }

    /// Number of messages ever sent to `topic`.
    pub fn message_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .topics
            .get(topic)
            .map_or(0, |partitions| partitions.iter().map(Vec::len).sum())
    }

    /// The decoded messages of `topic` with their keys, partition by partition.
    pub fn messages(&self, topic: &str) -> Vec<(String, Document)> {
        let state = self.state.lock();
        let Some(partitions) = state.topics.get(topic) else {
            return Vec::new();
        };
        partitions
            .iter()
            .flatten()
            .filter_map(|r| codec::read(&r.bytes).ok().map(|doc| (r.key.to_string(), doc)))
            .collect()
    }

    /// Stops every group and rejects further traffic.
    pub fn shutdown(&self) {
        let groups: Vec<Group> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.groups.drain().map(|(_, g)| g).collect()
        };
        for group in groups {
            group.join();
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Drop for InMemoryBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(group: String, rx: Receiver<Envelope>, handler: MessageHandler) {
    for envelope in rx.iter() {
        let message = match codec::read(&envelope.bytes) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!(
                    "{group}: skipping undecodable message at {}/{}/{}: {e}",
                    envelope.topic,
                    envelope.partition,
                    envelope.offset
                );
                continue;
            }
        };
        let delivery = Delivery {
            topic: &envelope.topic,
            partition: envelope.partition,
            offset: envelope.offset,
            key: &envelope.key,
            message: &message,
        };
        if !handler(&delivery) {
            log::info!("{group}: handler requested stop");
            break;
        }
    }
}

impl MessageBus for InMemoryBus {
    fn subscribe(
        &self,
        group_id: &str,
        topics: &[&str],
        num_threads: usize,
        handler: MessageHandler,
    ) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.groups.contains_key(group_id) {
            return false;
        }
        let threads = num_threads.max(1);
        let mut workers = Vec::with_capacity(threads);
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let (tx, rx) = unbounded();
            let name = group_id.to_string();
            let handler = Arc::clone(&handler);
            let spawned = thread::Builder::new()
                .name(format!("{group_id}-{i}"))
                .spawn(move || run_worker(name, rx, handler));
            match spawned {
                Ok(handle) => {
                    workers.push(tx);
                    handles.push(handle);
                }
                Err(e) => {
                    log::warn!("{group_id}: unable to spawn worker: {e}");
                    Group {
                        topics: Vec::new(),
                        workers,
                        handles,
                    }
                    .join();
                    return false;
                }
            }
        }
        let group = Group {
            topics: topics.iter().map(|t| t.to_string()).collect(),
            workers,
            handles,
        };
        for topic in topics {
            let Some(partitions) = state.topics.get(*topic) else {
                continue;
            };
            let topic: Arc<str> = Arc::from(*topic);
            for (partition, records) in partitions.iter().enumerate() {
                for (offset, record) in records.iter().enumerate() {
                    group.dispatch(Envelope {
                        topic: Arc::clone(&topic),
                        partition: partition as u32,
                        offset: offset as u64,
                        key: Arc::clone(&record.key),
                        bytes: Arc::clone(&record.bytes),
                    });
                }
            }
        }
        log::debug!("{group_id}: subscribed to {topics:?} with {threads} workers");
        state.groups.insert(group_id.to_string(), group);
        true
    }

    fn unsubscribe(&self, group_id: &str) {
        let group = self.state.lock().groups.remove(group_id);
        if let Some(group) = group {
            group.join();
            log::debug!("{group_id}: unsubscribed");
        }
    }

    fn send(&self, topic: &str, key: &str, message: &Document) -> bool {
        let partition = self.partition_for(key);
        let bytes: Arc<[u8]> = codec::write(message).into();
        let key: Arc<str> = Arc::from(key);
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        let partitions = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| (0..self.partitions).map(|_| Vec::new()).collect());
        let records = &mut partitions[partition as usize];
        let offset = records.len() as u64;
        records.push(Record {
            key: Arc::clone(&key),
            bytes: Arc::clone(&bytes),
        });
        let topic_name: Arc<str> = Arc::from(topic);
        for group in state.groups.values() {
            if group.topics.iter().any(|t| t == topic) {
                group.dispatch(Envelope {
                    topic: Arc::clone(&topic_name),
                    partition,
                    offset,
                    key: Arc::clone(&key),
                    bytes: Arc::clone(&bytes),
                });
            }
        }
        true
    }
}
