//! Generic request transformation.
//!
//! # Responsibilities
//! - Copy method, URI, protocol version, headers, and body between the two
//!   request representations
//! - Extract a structured body stream from a unified request, with a
//!   buffered-content fallback that never fails
//!
//! # Design Decisions
//! - Headers are copied name by name via `get_all`, preserving multiplicity
//!   and value order
//! - The protocol version is the substring after the last `/`; a version
//!   string without a separator is a fatal parse error

use std::sync::Arc;

use crate::error::{BridgeResult, TransformError};
use crate::model::factory::StreamFactory;
use crate::model::structured::{BodyStream, StructuredRequest};
use crate::model::unified::UnifiedRequest;
use crate::transform::uri;

/// Transformer for plain (non-server) requests.
pub struct RequestTransformer {
    streams: Arc<dyn StreamFactory>,
}

impl RequestTransformer {
    pub fn new(streams: Arc<dyn StreamFactory>) -> Self {
        Self { streams }
    }

    /// Transform a unified request into a structured request.
    ///
    /// Reads the unified body; the source must not be reused afterwards.
    pub fn to_structured(&self, request: &mut UnifiedRequest) -> BridgeResult<StructuredRequest> {
        tracing::debug!(method = %request.method, uri = %request.uri, "transforming unified request");

        let version = strip_version_prefix(&request.version)?;
        let body = self.stream_from_unified(request);

        let mut structured = StructuredRequest::new()
            .with_uri(uri::to_structured(&request.uri))
            .with_method(request.method.clone())
            .with_protocol_version(version)
            .with_body(body);

        for name in request.headers.keys() {
            for value in request.headers.get_all(name) {
                structured = structured.with_added_header(name.clone(), value.clone());
            }
        }

        Ok(structured)
    }

    /// Transform a structured request back into a unified request.
    pub fn to_unified(&self, request: StructuredRequest) -> BridgeResult<UnifiedRequest> {
        let unified_uri = uri::to_unified(request.uri())?;
        let mut request = request;
        let content = request.body_mut().contents();

        let mut unified = UnifiedRequest::new(unified_uri, request.method().clone());
        unified.set_content(content);
        unified.version = format!("HTTP/{}", request.protocol_version());
        for name in request.headers().keys() {
            for value in request.headers().get_all(name) {
                unified.headers.append(name.clone(), value.clone());
            }
        }

        Ok(unified)
    }

    /// Extract a body stream from a unified request.
    ///
    /// Prefers the stream resource; when it is unavailable (string-backed
    /// body, or already consumed) the buffered content is wrapped instead.
    /// The fallback never fails, so a finite body is always produced.
    pub fn stream_from_unified(&self, request: &mut UnifiedRequest) -> BodyStream {
        match request.body_mut().take_stream() {
            Ok(reader) => self.streams.from_reader(reader),
            Err(_) => self.streams.from_content(request.body_mut().take_content()),
        }
    }
}

/// `"HTTP/1.1"` -> `"1.1"`. No separator means no safe version to assume.
pub(crate) fn strip_version_prefix(version: &str) -> BridgeResult<String> {
    match version.rfind('/') {
        Some(idx) => Ok(version[idx + 1..].to_string()),
        None => Err(TransformError::MalformedVersion(version.to_string())),
    }
}
