//! [`authlane_core::AuthStorage`] backends.

pub mod error;
pub mod file;
pub mod memory;

pub use error::StorageError;
pub use file::JsonFileStorage;
pub use memory::MemoryStorage;
