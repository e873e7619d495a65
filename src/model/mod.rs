//! Message model subsystem.
//!
//! # Data Flow
//! ```text
//! unified message (merged argument tree, flat cookies, one-shot body)
//!     → transform layer
//!     → structured message (query / body / files / cookies disjoint,
//!       immutable-with-builder)
//! and back.
//! ```
//!
//! # Design Decisions
//! - Argument trees are `serde_json` objects with key order preserved
//! - Header collections are `http::HeaderMap` on both sides, so header
//!   copies can never lose values or order
//! - Uploaded-file entities sit behind a trait; concrete implementations
//!   are supplied through the factories in [`factory`]

pub mod args;
pub mod factory;
pub mod structured;
pub mod unified;
pub mod upload;

pub use factory::{InMemoryStreams, StreamFactory, TempFileUploads, UploadFactory};
pub use structured::{BodyStream, StructuredRequest, StructuredResponse, StructuredUri};
pub use unified::{Cookie, UnifiedBody, UnifiedRequest, UnifiedResponse};
pub use upload::{TempFileUpload, UploadDescriptor, UploadNode, UploadedFile};
