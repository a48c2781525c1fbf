//! Common request and response types shared by the `sha256-hasher` service and its clients.

pub mod protocol;

pub use protocol::{ErrorResponse, HashRequest, HashResponse, HealthResponse};
