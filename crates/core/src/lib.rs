//! # Authlane Core
//!
//! Token lifecycle of an OpenID Connect relying party, with no
//! infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (storage, transport, navigation, signature checks)
//! - The shared session state and the renewal flag
//! - The callback pipeline that validates and persists tokens
//! - Silent renewal: periodic checks, forced refresh, frame completion
//!
//! ## Architecture Principles
//! - Only depends on `authlane-domain` and `authlane-common`
//! - No HTTP, filesystem or webview code
//! - All external effects go through the traits in [`ports`]

pub mod callback;
pub mod config_provider;
pub mod ports;
pub mod renewal;
pub mod reset;
pub mod service;
pub mod signing_keys;
pub mod state;
pub mod url;
pub mod user;
pub mod validation;
pub mod well_known;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use callback::{CallbackPipeline, CallbackStage, FlowsService};
pub use config_provider::ConfigurationProvider;
pub use ports::{AuthStorage, NavigationSurface, OidcTransport, TokenSignatureVerifier};
pub use renewal::{
    IntervalScheduler, PeriodicTokenCheck, RefreshSessionService, RenewCompletion,
    SilentRenewMessage, SilentRenewService, TickOutcome,
};
pub use service::{OidcPorts, OidcSecurityService};
pub use state::{AuthStateService, FlowsDataService};
