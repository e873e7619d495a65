//! Transform subsystem.
//!
//! # Data Flow
//! ```text
//! UnifiedRequest
//!     → request.rs (method, URI, version, headers, body copy)
//!     → server_request.rs (argument disentanglement:
//!       query / body / files / cookies)
//!     → StructuredRequest
//!
//! UnifiedResponse ↔ response.rs ↔ StructuredResponse
//! uri.rs is the shared leaf both request paths use.
//! ```
//!
//! # Design Decisions
//! - ServerRequestTransformer embeds a RequestTransformer instead of
//!   inheriting from it; the shared copy lives in one place
//! - Every transform reads the source body at most once

pub mod request;
pub mod response;
pub mod server_request;
pub mod uri;

pub use request::RequestTransformer;
pub use response::ResponseTransformer;
pub use server_request::ServerRequestTransformer;
