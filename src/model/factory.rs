//! Pluggable constructors for structured-model artifacts.
//!
//! The bridge stays agnostic to the concrete structured-message
//! implementation: callers hand in factories at setup time instead of
//! naming implementation types.

use std::io::Read;

use crate::error::BridgeResult;
use crate::model::structured::BodyStream;
use crate::model::upload::{TempFileUpload, UploadDescriptor, UploadedFile};

/// Builds body streams for structured messages.
pub trait StreamFactory: Send + Sync {
    /// Wrap an already-open stream resource.
    fn from_reader(&self, reader: Box<dyn Read + Send>) -> BodyStream;

    /// Wrap buffered string content.
    fn from_content(&self, content: String) -> BodyStream;
}

/// Builds uploaded-file entities from upload descriptors.
pub trait UploadFactory: Send + Sync {
    fn from_descriptor(&self, descriptor: &UploadDescriptor)
        -> BridgeResult<Box<dyn UploadedFile>>;
}

/// Default stream factory backed by in-memory buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryStreams;

impl StreamFactory for InMemoryStreams {
    fn from_reader(&self, reader: Box<dyn Read + Send>) -> BodyStream {
        BodyStream::from_reader(reader)
    }

    fn from_content(&self, content: String) -> BodyStream {
        BodyStream::from_content(content)
    }
}

/// Default upload factory producing [`TempFileUpload`] entities, which keep
/// the temporary location and therefore support descriptor reconstruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempFileUploads;

impl UploadFactory for TempFileUploads {
    fn from_descriptor(
        &self,
        descriptor: &UploadDescriptor,
    ) -> BridgeResult<Box<dyn UploadedFile>> {
        Ok(Box::new(TempFileUpload::from_descriptor(descriptor)))
    }
}
