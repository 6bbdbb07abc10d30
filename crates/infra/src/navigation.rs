//! Channel bridge between the relying party and a host webview.
//!
//! The host owns the actual browser surface. It drains
//! [`NavigationCommand`]s from the receiver returned by
//! [`WebviewBridge::channel`], acknowledges frame loads through the
//! command's `loaded` sender and hands the renew frame's final redirect back
//! as a `SilentRenewMessage` carrying the command's `generation`.

use async_trait::async_trait;
use authlane_core::NavigationSurface;
use authlane_domain::{AuthError, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Work for the host surface.
#[derive(Debug)]
pub enum NavigationCommand {
    /// Point the hidden renew frame at `url` and report the load event
    LoadRenewFrame { url: String, generation: u64, loaded: oneshot::Sender<Result<()>> },
    /// Replace the current history entry
    ReplaceHistory { url: String },
    /// Navigate the top-level context
    Navigate { url: String },
}

/// [`NavigationSurface`] that forwards to a host over an mpsc channel.
#[derive(Debug, Clone)]
pub struct WebviewBridge {
    commands: mpsc::Sender<NavigationCommand>,
}

impl WebviewBridge {
    /// Create a bridge and the receiver the host drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NavigationCommand>) {
        let (commands, receiver) = mpsc::channel(capacity.max(1));
        (Self { commands }, receiver)
    }

    async fn send(&self, command: NavigationCommand) -> Result<()> {
        self.commands.send(command).await.map_err(|_| closed())
    }
}

fn closed() -> AuthError {
    AuthError::IframeRenew("navigation surface is closed".into())
}

#[async_trait]
impl NavigationSurface for WebviewBridge {
    async fn load_silent_renew_frame(&self, url: &str, generation: u64) -> Result<()> {
        let (loaded, on_load) = oneshot::channel();
        let command =
            NavigationCommand::LoadRenewFrame { url: url.to_string(), generation, loaded };
        self.send(command).await?;
        debug!(generation, "renew frame load requested");
        on_load.await.map_err(|_| AuthError::IframeRenew("renew frame load was abandoned".into()))?
    }

    fn replace_history_state(&self, url: &str) {
        let command = NavigationCommand::ReplaceHistory { url: url.to_string() };
        if let Err(err) = self.commands.try_send(command) {
            warn!(error = %err, "history replacement dropped");
        }
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.send(NavigationCommand::Navigate { url: url.to_string() })
            .await
            .map_err(|_| AuthError::Transport("navigation surface is closed".into()))
    }
}
