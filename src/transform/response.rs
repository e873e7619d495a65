//! Response transformation.
//!
//! Independent of the request transformers: responses carry no argument
//! tree, so both directions are a plain message copy.

use std::sync::Arc;

use http::header::{HeaderName, CONTENT_TYPE};
use http::StatusCode;

use crate::error::{BridgeResult, TransformError};
use crate::model::factory::StreamFactory;
use crate::model::structured::StructuredResponse;
use crate::model::unified::UnifiedResponse;
use crate::transform::request::strip_version_prefix;

/// Transformer for response messages.
pub struct ResponseTransformer {
    streams: Arc<dyn StreamFactory>,
}

impl ResponseTransformer {
    pub fn new(streams: Arc<dyn StreamFactory>) -> Self {
        Self { streams }
    }

    /// Transform a unified response into a structured response.
    pub fn to_structured(&self, response: &UnifiedResponse) -> BridgeResult<StructuredResponse> {
        tracing::debug!(status = response.status_code, "transforming unified response");

        let status = StatusCode::from_u16(response.status_code)
            .map_err(|_| TransformError::InvalidStatus(response.status_code))?;
        let version = strip_version_prefix(&response.version)?;

        let mut structured = StructuredResponse::new()
            .with_body(self.streams.from_content(response.content.clone()))
            .with_status(status, response.reason.clone())
            .with_protocol_version(version);

        for name in response.headers.keys() {
            for value in response.headers.get_all(name) {
                structured = structured.with_added_header(name.clone(), value.clone());
            }
        }

        Ok(structured)
    }

    /// Transform a structured response back into a unified response.
    ///
    /// Headers the unified model treats as single-valued (content-type)
    /// keep their first value only. A deliberate narrowing, not data loss
    /// by accident.
    pub fn to_unified(&self, response: StructuredResponse) -> BridgeResult<UnifiedResponse> {
        let mut response = response;

        let mut unified = UnifiedResponse::new();
        unified.content = response.body_mut().contents();
        unified.version = format!("HTTP/{}", response.protocol_version());
        unified.set_status(response.status().as_u16(), response.reason());

        for name in response.headers().keys() {
            if is_single_valued(name) {
                if let Some(first) = response.headers().get(name) {
                    unified.headers.append(name.clone(), first.clone());
                }
            } else {
                for value in response.headers().get_all(name) {
                    unified.headers.append(name.clone(), value.clone());
                }
            }
        }

        Ok(unified)
    }
}

/// Headers the unified model stores as a single value.
fn is_single_valued(name: &HeaderName) -> bool {
    *name == CONTENT_TYPE
}
