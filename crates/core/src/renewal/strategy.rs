use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use authlane_domain::{CallbackContext, CustomParams, FlowType, Result};
use tracing::debug;

use crate::callback::FlowsService;
use crate::ports::NavigationSurface;
use crate::url::UrlService;

/// Counter identifying the latest frame-based renewal attempt.
///
/// Each attempt advances it; completions carrying an older value belong
/// to an abandoned attempt and are ignored.
#[derive(Debug, Clone, Default)]
pub struct RenewGeneration(Arc<AtomicU64>);

impl RenewGeneration {
    /// Start a new attempt and return its generation.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        generation != 0 && generation == self.current()
    }
}

/// What a strategy produced.
#[derive(Debug, Clone)]
pub enum RenewalOutcome {
    /// Tokens were exchanged and validated in-line.
    Completed(Box<CallbackContext>),
    /// The renew frame loaded; the result arrives through the silent-renew
    /// completion signal.
    Dispatched { generation: u64 },
}

/// Renewal through the refresh-token grant.
pub struct RefreshTokenRenewal {
    flows: Arc<FlowsService>,
}

impl RefreshTokenRenewal {
    pub fn new(flows: Arc<FlowsService>) -> Self {
        Self { flows }
    }

    /// # Errors
    /// `AuthError::TokenExchange` when no refresh token is stored or the
    /// token endpoint rejects the grant; any pipeline failure otherwise.
    pub async fn renew(&self, custom_params: &CustomParams) -> Result<CallbackContext> {
        debug!("refresh session with refresh token");
        self.flows.process_refresh_token(custom_params).await
    }
}

/// Renewal through the hidden frame.
pub struct IframeRenewal {
    url: Arc<UrlService>,
    navigation: Arc<dyn NavigationSurface>,
    generation: RenewGeneration,
}

impl IframeRenewal {
    pub fn new(
        url: Arc<UrlService>,
        navigation: Arc<dyn NavigationSurface>,
        generation: RenewGeneration,
    ) -> Self {
        Self { url, navigation, generation }
    }

    /// Start a new attempt, invalidating completions of earlier ones.
    pub fn next_generation(&self) -> u64 {
        self.generation.advance()
    }

    /// Point the renew frame at a fresh `prompt=none` authorize URL and wait
    /// for it to load. Returns the attempt's generation.
    ///
    /// # Errors
    /// `AuthError::IframeRenew` when no frame can be obtained, or the URL
    /// construction error.
    pub async fn renew(&self, custom_params: Option<&CustomParams>) -> Result<u64> {
        let generation = self.next_generation();
        self.dispatch(generation, custom_params).await?;
        Ok(generation)
    }

    /// Load the renew frame for an attempt whose generation was already
    /// taken with [`Self::next_generation`].
    pub async fn dispatch(
        &self,
        generation: u64,
        custom_params: Option<&CustomParams>,
    ) -> Result<()> {
        debug!(generation, "begin refresh session with renew frame");
        let url = self.url.get_refresh_session_silent_renew_url(custom_params).await?;
        self.navigation.load_silent_renew_frame(&url, generation).await?;
        debug!(generation, "renew frame loaded");
        Ok(())
    }
}

/// One of the two renewal strategies.
#[derive(Clone)]
pub enum RenewalStrategy {
    RefreshToken(Arc<RefreshTokenRenewal>),
    Iframe(Arc<IframeRenewal>),
}

impl RenewalStrategy {
    pub async fn renew(&self, custom_params: &CustomParams) -> Result<RenewalOutcome> {
        match self {
            Self::RefreshToken(strategy) => {
                let context = strategy.renew(custom_params).await?;
                Ok(RenewalOutcome::Completed(Box::new(context)))
            }
            Self::Iframe(strategy) => {
                let params = (!custom_params.is_empty()).then_some(custom_params);
                let generation = strategy.renew(params).await?;
                Ok(RenewalOutcome::Dispatched { generation })
            }
        }
    }

    /// Whether the renewal is finished when [`Self::renew`] returns.
    #[must_use]
    pub const fn completes_inline(&self) -> bool {
        matches!(self, Self::RefreshToken(_))
    }
}

/// Both strategies, selected by flow type.
#[derive(Clone)]
pub struct RenewalStrategies {
    refresh_token: Arc<RefreshTokenRenewal>,
    iframe: Arc<IframeRenewal>,
}

impl RenewalStrategies {
    pub fn new(refresh_token: Arc<RefreshTokenRenewal>, iframe: Arc<IframeRenewal>) -> Self {
        Self { refresh_token, iframe }
    }

    /// Refresh tokens for the code flow with refresh tokens, the renew frame
    /// for every other flow.
    #[must_use]
    pub fn select(&self, flow: FlowType) -> RenewalStrategy {
        match flow {
            FlowType::CodeFlowWithRefreshTokens => {
                RenewalStrategy::RefreshToken(Arc::clone(&self.refresh_token))
            }
            FlowType::CodeFlow | FlowType::ImplicitFlow => {
                RenewalStrategy::Iframe(Arc::clone(&self.iframe))
            }
        }
    }

    #[must_use]
    pub fn iframe(&self) -> &Arc<IframeRenewal> {
        &self.iframe
    }

    #[must_use]
    pub fn refresh_token(&self) -> &Arc<RefreshTokenRenewal> {
        &self.refresh_token
    }
}
