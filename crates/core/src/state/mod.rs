//! Token and session state store
//!
//! - [`StoragePersistence`]: typed access to the persisted slots
//! - [`AuthStateService`]: stored tokens, expiry checks and the published
//!   authorization state
//! - [`FlowsDataService`]: per-flow values and the renewal flag

mod auth_state;
mod flows_data;
mod persistence;

pub use auth_state::AuthStateService;
pub use flows_data::FlowsDataService;
pub use persistence::StoragePersistence;
