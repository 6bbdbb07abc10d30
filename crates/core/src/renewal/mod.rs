//! Token renewal
//!
//! - [`IntervalScheduler`]: fixed-period ticks with a single active check
//! - [`RenewalStrategy`]: refresh-token grant or hidden-frame redirect
//! - [`PeriodicTokenCheck`]: renews expired tokens on each tick
//! - [`RefreshSessionService`]: caller-driven renewal with timeout and retry
//! - [`SilentRenewService`]: completion of frame-based renewals

mod periodic;
mod refresh_session;
mod scheduler;
mod silent_renew;
mod strategy;

pub use periodic::{PeriodicTokenCheck, TickOutcome};
pub use refresh_session::RefreshSessionService;
pub use scheduler::{IntervalScheduler, Ticks};
pub use silent_renew::{RenewCompletion, SilentRenewMessage, SilentRenewService};
pub use strategy::{
    IframeRenewal, RefreshTokenRenewal, RenewGeneration, RenewalOutcome, RenewalStrategies,
    RenewalStrategy,
};
