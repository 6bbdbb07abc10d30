//! Authorization response validation
//!
//! [`TokenValidationService`] holds the individual checks;
//! [`StateValidationService`] runs them in order over a callback context.

mod state_validation;
mod token_validation;

pub use state_validation::StateValidationService;
pub use token_validation::TokenValidationService;
