//! Bridge between unified and structured HTTP message models.
//!
//! The unified model pre-merges query-string and body parameters into one
//! argument tree; the structured model keeps query params, parsed body,
//! uploaded files, and cookies as separate fields. The transforms here
//! translate losslessly in both directions wherever the target structure
//! permits it, with the argument-disentanglement algorithm in
//! [`transform::server_request`] reconstructing the partitions a prior
//! merge destroyed.

pub mod error;
pub mod model;
pub mod transform;

pub use error::{BridgeResult, TransformError};
pub use model::factory::{InMemoryStreams, StreamFactory, TempFileUploads, UploadFactory};
pub use model::structured::{StructuredRequest, StructuredResponse, StructuredUri};
pub use model::unified::{Cookie, UnifiedRequest, UnifiedResponse};
pub use transform::{RequestTransformer, ResponseTransformer, ServerRequestTransformer};
