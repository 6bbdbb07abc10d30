//! Configuration loading
//!
//! Loads [`authlane_domain::AppConfig`] from environment variables or files.

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use loader::{load, load_from_env, load_from_file, find_config_file};
