//! Consent service: record types, request signing and the HTTP client.

pub mod client;
pub mod jwt;
pub mod types;

pub use client::{ConsentApi, ConsentClient};
pub use jwt::{AuthzClaims, RequestSigner};
pub use types::*;
