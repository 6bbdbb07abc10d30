//! Domain types and models
//!
//! Everything that flows between the callback pipeline, the renewal
//! strategies and the published authorization state.

pub mod auth_result;
pub mod auth_state;
pub mod callback;
pub mod jwt_keys;
pub mod params;
pub mod validation;
pub mod well_known;

pub use auth_result::AuthResult;
pub use auth_state::{AuthorizationResult, AuthorizedState, SessionTokens};
pub use callback::CallbackContext;
pub use jwt_keys::{JwtKey, JwtKeys};
pub use params::{CustomParamValue, CustomParams};
pub use validation::{StateValidationResult, ValidationResult};
pub use well_known::AuthWellKnownEndpoints;
