//! Unified message model.
//!
//! # Responsibilities
//! - Represent requests whose query-string and body parameters have been
//!   merged into one argument tree
//! - Represent responses with a buffered string content
//! - Enforce the destructive-read contract of the body resource
//!
//! # Design Decisions
//! - The constructor performs the model's own internal merge: arguments
//!   decoded from the URI query string combine with the supplied arguments,
//!   the supplied side winning on conflict
//! - The body is stream-backed OR string-backed, never both; stream access
//!   on a string-backed body fails while string access still succeeds

use std::collections::HashMap;
use std::io::Read;

use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{BridgeResult, TransformError};
use crate::model::args;

/// A single cookie as carried by the unified request's flat cookie list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of a unified message. A consumable, single-read resource.
pub enum UnifiedBody {
    /// Backed by a readable stream resource.
    Stream(Box<dyn Read + Send>),
    /// Backed by an in-memory string; no stream resource exists.
    Buffered(String),
    /// Already read once; any further read yields nothing.
    Consumed,
}

impl Default for UnifiedBody {
    fn default() -> Self {
        UnifiedBody::Buffered(String::new())
    }
}

impl std::fmt::Debug for UnifiedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnifiedBody::Stream(_) => f.write_str("UnifiedBody::Stream(..)"),
            UnifiedBody::Buffered(content) => {
                f.debug_tuple("UnifiedBody::Buffered").field(content).finish()
            }
            UnifiedBody::Consumed => f.write_str("UnifiedBody::Consumed"),
        }
    }
}

impl UnifiedBody {
    /// Take the underlying stream resource.
    ///
    /// Fails when the body was initialized from a string (no resource exists)
    /// or was already consumed. A string-backed body stays readable through
    /// [`UnifiedBody::take_content`] after a failed stream access.
    pub fn take_stream(&mut self) -> BridgeResult<Box<dyn Read + Send>> {
        match std::mem::replace(self, UnifiedBody::Consumed) {
            UnifiedBody::Stream(reader) => Ok(reader),
            UnifiedBody::Buffered(content) => {
                *self = UnifiedBody::Buffered(content);
                Err(TransformError::BodyUnavailable(
                    "body was initialized from a string, no stream resource exists".to_string(),
                ))
            }
            UnifiedBody::Consumed => Err(TransformError::BodyUnavailable(
                "body was already consumed".to_string(),
            )),
        }
    }

    /// Drain the body into a string. Destructive: the second call yields an
    /// empty string. Stream read errors degrade to whatever was read; this
    /// path must always produce a finite body.
    pub fn take_content(&mut self) -> String {
        match std::mem::replace(self, UnifiedBody::Consumed) {
            UnifiedBody::Stream(mut reader) => {
                let mut content = String::new();
                let _ = reader.read_to_string(&mut content);
                content
            }
            UnifiedBody::Buffered(content) => content,
            UnifiedBody::Consumed => String::new(),
        }
    }
}

/// HTTP request in the unified representation.
#[derive(Debug)]
pub struct UnifiedRequest {
    pub method: Method,
    pub uri: Url,
    /// Full protocol version string, e.g. `"HTTP/1.1"`.
    pub version: String,
    /// Ordered, case-insensitive, multi-value header collection.
    pub headers: HeaderMap,
    pub cookies: Vec<Cookie>,
    /// Opaque environment map, passed through transforms untouched.
    pub server_params: HashMap<String, String>,
    arguments: Map<String, Value>,
    body: UnifiedBody,
}

impl UnifiedRequest {
    /// Create a request with no arguments beyond those in the URI query.
    pub fn new(uri: Url, method: Method) -> Self {
        Self::create(uri, method, Map::new(), HashMap::new())
    }

    /// Create a request, merging query-string arguments with the supplied
    /// argument tree. Supplied arguments win on conflict.
    pub fn create(
        uri: Url,
        method: Method,
        arguments: Map<String, Value>,
        server_params: HashMap<String, String>,
    ) -> Self {
        let mut merged = uri
            .query()
            .map(args::parse_query_tree)
            .unwrap_or_default();
        args::merge_overrule(&mut merged, arguments);

        Self {
            method,
            uri,
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            server_params,
            arguments: merged,
            body: UnifiedBody::default(),
        }
    }

    /// The merged argument tree.
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    /// Remove and return the merged argument tree, leaving it empty.
    /// Disentanglement consumes the tree destructively through this.
    pub fn take_arguments(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.arguments)
    }

    /// Replace the body with buffered string content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.body = UnifiedBody::Buffered(content.into());
    }

    /// Replace the body with a stream resource.
    pub fn set_body_stream(&mut self, reader: Box<dyn Read + Send>) {
        self.body = UnifiedBody::Stream(reader);
    }

    pub fn body_mut(&mut self) -> &mut UnifiedBody {
        &mut self.body
    }
}

/// HTTP response in the unified representation.
#[derive(Debug)]
pub struct UnifiedResponse {
    pub status_code: u16,
    pub reason: String,
    /// Full protocol version string, e.g. `"HTTP/1.1"`.
    pub version: String,
    pub headers: HeaderMap,
    pub content: String,
}

impl UnifiedResponse {
    pub fn new() -> Self {
        Self {
            status_code: 200,
            reason: "OK".to_string(),
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            content: String::new(),
        }
    }

    pub fn set_status(&mut self, status_code: u16, reason: impl Into<String>) {
        self.status_code = status_code;
        self.reason = reason.into();
    }
}

impl Default for UnifiedResponse {
    fn default() -> Self {
        Self::new()
    }
}
