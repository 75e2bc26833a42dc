//! Outbound HTTP for metric sources.

pub mod client;
pub mod credentials;

pub use client::{HttpClient, HttpClientConfig};
pub use credentials::Credentials;
