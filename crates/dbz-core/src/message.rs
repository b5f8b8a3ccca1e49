//! The message envelope: header conventions layered on [`Document`].
//!
//! Every request and response on the bus is a document. The initiating side
//! stamps the headers ([`add_headers`]), fan-out stages copy them verbatim
//! ([`copy_headers`]) and the producing stage sets the status and the part
//! counters.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::batch::{Batch, PATCHES};
use crate::identifier::{DatabaseId, Identifier};
use crate::patch::{Patch, PatchError};
use crate::{Document, Value};

/// Reserved field names.
pub mod field {
    pub const CLIENT_ID: &str = "clientid";
    pub const REQUEST: &str = "request";
    pub const USER: &str = "user";
    pub const TIMESTAMP: &str = "timestamp";
    pub const STATUS: &str = "status";
    pub const PART: &str = "part";
    pub const PARTS: &str = "parts";
    pub const ID: &str = "id";
    pub const PATCH: &str = "patch";
    pub const BEFORE: &str = "before";
    pub const AFTER: &str = "after";
    pub const FAILURE: &str = "failure";

    /// Headers copied from a request to everything derived from it.
    pub const HEADERS: [&str; 4] = [CLIENT_ID, REQUEST, USER, TIMESTAMP];
}

/// Logical topic names.
pub mod topic {
    pub const ENTITY_BATCHES: &str = "entity-batches";
    pub const ENTITY_PATCHES: &str = "entity-patches";
    pub const SCHEMA_PATCHES: &str = "schema-patches";
    pub const SCHEMA_UPDATES: &str = "schema-updates";
    pub const PARTIAL_RESPONSES: &str = "partial-responses";
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("MISSING_HEADER: {0}")]
    MissingHeader(&'static str),
    #[error("MISSING_PAYLOAD: {0}")]
    MissingPayload(&'static str),
    #[error("INVALID_PATCH: {0}")]
    InvalidPatch(#[from] PatchError),
}

// ── Status ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    ClientStopped,
    DoesNotExist,
    PatchFailed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::ClientStopped => "CLIENT_STOPPED",
            Status::DoesNotExist => "DOES_NOT_EXIST",
            Status::PatchFailed => "PATCH_FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Status> {
        match s {
            "SUCCESS" => Some(Status::Success),
            "CLIENT_STOPPED" => Some(Status::ClientStopped),
            "DOES_NOT_EXIST" => Some(Status::DoesNotExist),
            "PATCH_FAILED" => Some(Status::PatchFailed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── RequestId ─────────────────────────────────────────────────────────────

/// Correlation key of a logical request: the issuing client plus a number
/// that increases with every request that client makes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    client_id: Arc<str>,
    number: u64,
}

impl RequestId {
    pub fn new(client_id: impl Into<Arc<str>>, number: u64) -> RequestId {
        RequestId {
            client_id: client_id.into(),
            number,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client_id, self.number)
    }
}

// ── Headers ───────────────────────────────────────────────────────────────

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

pub fn add_headers(msg: &mut Document, client_id: &str, request: u64, user: &str, timestamp: i64) {
    msg.set(field::CLIENT_ID, client_id);
    msg.set(field::REQUEST, Value::Long(i64::try_from(request).unwrap_or(i64::MAX)));
    msg.set(field::USER, user);
    msg.set(field::TIMESTAMP, Value::Long(timestamp));
}

/// Stamps `msg` with the headers of `id`, `user` and the current time.
pub fn add_request_headers(msg: &mut Document, id: &RequestId, user: &str) {
    add_headers(msg, id.client_id(), id.number(), user, now_millis());
}

pub fn copy_headers(from: &Document, to: &mut Document) {
    for name in field::HEADERS {
        if let Some(value) = from.get(name) {
            to.set(name, value.clone());
        }
    }
}

pub fn client_id(msg: &Document) -> Option<&str> {
    msg.get_str(field::CLIENT_ID)
}

pub fn user(msg: &Document) -> Option<&str> {
    msg.get_str(field::USER)
}

pub fn timestamp(msg: &Document) -> Option<i64> {
    msg.get_i64(field::TIMESTAMP)
}

pub fn request_id(msg: &Document) -> Option<RequestId> {
    let client = client_id(msg)?;
    let number = u64::try_from(msg.get_i64(field::REQUEST)?).ok()?;
    Some(RequestId::new(client, number))
}

pub fn set_status(msg: &mut Document, status: Status) {
    msg.set(field::STATUS, status.as_str());
}

pub fn status(msg: &Document) -> Option<Status> {
    msg.get_str(field::STATUS).and_then(Status::from_str)
}

pub fn is_success(msg: &Document) -> bool {
    status(msg) == Some(Status::Success)
}

pub fn set_parts(msg: &mut Document, part: u32, parts: u32) {
    msg.set(field::PART, Value::Long(i64::from(part)));
    msg.set(field::PARTS, Value::Long(i64::from(parts)));
}

/// The 1-based part index and part count, `(1, 1)` when absent.
pub fn parts(msg: &Document) -> (u32, u32) {
    let read = |name| {
        msg.get_i64(name)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1)
    };
    (read(field::PART), read(field::PARTS))
}

// ── Payloads ──────────────────────────────────────────────────────────────

/// A request for a single patch, carrying the headers of `headers`.
pub fn create_patch_request<T: Identifier>(headers: &Document, patch: &Patch<T>) -> Document {
    let mut msg = Document::new();
    copy_headers(headers, &mut msg);
    msg.set(field::PATCH, patch.to_document());
    msg
}

pub fn patch<T: Identifier>(msg: &Document) -> Result<Patch<T>, MessageError> {
    let doc = msg
        .get_document(field::PATCH)
        .ok_or(MessageError::MissingPayload(field::PATCH))?;
    Ok(Patch::from_document(doc)?)
}

/// A request for a whole batch, carrying the headers of `headers`.
pub fn create_batch_request<T: Identifier>(headers: &Document, batch: &Batch<T>) -> Document {
    let mut msg = batch.to_document();
    copy_headers(headers, &mut msg);
    msg
}

pub fn batch<T: Identifier>(msg: &Document) -> Result<Batch<T>, MessageError> {
    if !msg.has(PATCHES) {
        return Err(MessageError::MissingPayload(PATCHES));
    }
    Ok(Batch::from_document(msg)?)
}

/// An empty response to `request`: its headers and part counters.
pub fn create_response(request: &Document) -> Document {
    let mut response = Document::new();
    copy_headers(request, &mut response);
    let (part, parts) = parts(request);
    set_parts(&mut response, part, parts);
    response
}

pub fn add_id(msg: &mut Document, id: &impl Identifier) {
    msg.set(field::ID, id.to_string());
}

pub fn id(msg: &Document) -> Option<&str> {
    msg.get_str(field::ID)
}

/// The database a message concerns, from its `id` or its patch target.
pub fn database_id(msg: &Document) -> Option<DatabaseId> {
    let text = id(msg).or_else(|| {
        msg.get_document(field::PATCH)
            .and_then(|p| p.get_str(crate::patch::codec::TARGET))
    })?;
    DatabaseId::parse(text.split('/').next()?)
}

pub fn set_before(msg: &mut Document, doc: Document) {
    msg.set(field::BEFORE, doc);
}

pub fn before(msg: &Document) -> Option<&Document> {
    msg.get_document(field::BEFORE)
}

pub fn set_after(msg: &mut Document, doc: Document) {
    msg.set(field::AFTER, doc);
}

pub fn after(msg: &Document) -> Option<&Document> {
    msg.get_document(field::AFTER)
}

pub fn set_failure(msg: &mut Document, description: &str) {
    msg.set(field::FAILURE, description);
}

pub fn failure(msg: &Document) -> Option<&str> {
    msg.get_str(field::FAILURE)
}
