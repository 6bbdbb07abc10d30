//! # Authlane Infrastructure
//!
//! Adapters implementing the `authlane-core` ports.
//!
//! This crate contains:
//! - The reqwest-backed STS transport with retries
//! - id-token signature verification with `jsonwebtoken`
//! - In-memory and JSON-file storage
//! - A channel bridge to a host webview
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `authlane-core`
//! - Contains all "impure" code (network, filesystem, global subscriber)

use std::sync::Arc;

use authlane_common::SystemClock;
use authlane_core::{AuthStorage, NavigationSurface, OidcPorts};
use authlane_domain::Result;

pub mod config;
pub mod errors;
pub mod http;
pub mod navigation;
pub mod observability;
pub mod storage;
pub mod verifier;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder, HttpError, HttpOidcTransport};
pub use navigation::{NavigationCommand, WebviewBridge};
pub use observability::init_logging;
pub use storage::{JsonFileStorage, MemoryStorage, StorageError};
pub use verifier::JsonWebTokenVerifier;

/// Ports over the production transport, verifier and system clock, with the
/// host's storage and navigation surface.
///
/// # Errors
/// When the HTTP client cannot be built.
pub fn production_ports(
    storage: Arc<dyn AuthStorage>,
    navigation: Arc<dyn NavigationSurface>,
) -> Result<OidcPorts> {
    Ok(OidcPorts {
        storage,
        transport: Arc::new(HttpOidcTransport::with_defaults()?),
        navigation,
        verifier: Arc::new(JsonWebTokenVerifier::new()),
        clock: Arc::new(SystemClock),
    })
}
