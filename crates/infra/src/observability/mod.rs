//! Logging initialisation for hosts embedding the relying party.

pub mod logging;

pub use logging::init_logging;
