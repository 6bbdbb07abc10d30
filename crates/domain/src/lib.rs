//! # Authlane Domain
//!
//! Protocol data types for the Authlane OpenID Connect relying party.
//!
//! This crate contains:
//! - Authorization responses, callback contexts and validation results
//! - The published authorization state model
//! - Client configuration structures
//! - The error taxonomy shared by every layer
//!
//! ## Architecture
//! - No dependencies on other Authlane crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
