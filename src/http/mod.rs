//! Minimal HTTP/1.1 plumbing for the upgrade endpoint
//!
//! The gateway speaks just enough HTTP to accept an upgrade request and
//! answer it: a request-head parser, a response writer, and the stateless
//! request validator.

pub mod request;
pub mod response;
pub mod validate;

pub use request::{HttpRequest, QueryString};
pub use response::HttpResponse;
pub use validate::{StreamRequest, ValidationError};
