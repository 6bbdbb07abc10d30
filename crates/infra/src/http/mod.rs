//! HTTP access to the STS.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{HttpClient, HttpClientBuilder};
pub use error::HttpError;
pub use transport::HttpOidcTransport;
