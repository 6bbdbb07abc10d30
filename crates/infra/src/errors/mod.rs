//! Infrastructure errors and their mapping onto [`authlane_domain::AuthError`].

pub mod conversions;

pub use conversions::InfraError;
