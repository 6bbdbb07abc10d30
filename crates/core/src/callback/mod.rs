//! Callback pipeline
//!
//! A raw authorization response becomes validated, stored tokens through
//! an ordered list of [`CallbackStage`]s. The driver stops at the first
//! failing stage; stages that publish their own failure state say so via
//! [`CallbackStage::resets_on_failure`], every other failure gets the
//! default reset from the driver.

mod flows;
mod requests;
mod stages;

use std::sync::Arc;

use async_trait::async_trait;
use authlane_domain::{CallbackContext, Result};
use tracing::{debug, warn};

pub use flows::{FlowsDependencies, FlowsService};
pub use requests::{CodeRequestStage, RefreshTokenRequestStage};
pub use stages::{
    ErrorCheckStage, KeyRetrievalStage, StateValidationStage, TokenPersistenceStage, UserDataStage,
};

use crate::reset::ResetAuthDataService;

/// One step of the callback pipeline.
#[async_trait]
pub trait CallbackStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transform the context or fail. Fields already set on the context
    /// must not be overwritten.
    async fn run(&self, context: CallbackContext) -> Result<CallbackContext>;

    /// Whether this stage resets authorization data itself before failing.
    fn resets_on_failure(&self) -> bool {
        false
    }
}

/// Ordered stage list with short-circuit on failure.
#[derive(Clone)]
pub struct CallbackPipeline {
    stages: Vec<Arc<dyn CallbackStage>>,
    reset: Arc<ResetAuthDataService>,
}

impl CallbackPipeline {
    pub fn new(stages: Vec<Arc<dyn CallbackStage>>, reset: Arc<ResetAuthDataService>) -> Self {
        Self { stages, reset }
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage in order.
    ///
    /// # Errors
    /// The first stage failure, after authorization data has been reset
    /// exactly once.
    pub async fn execute(&self, mut context: CallbackContext) -> Result<CallbackContext> {
        for stage in &self.stages {
            debug!(stage = stage.name(), "running callback stage");
            context = match stage.run(context).await {
                Ok(context) => context,
                Err(err) => {
                    warn!(stage = stage.name(), error = %err, "callback stage failed");
                    if !stage.resets_on_failure() {
                        self.reset.reset_authorization_data();
                    }
                    return Err(err);
                }
            };
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use authlane_common::MockClock;
    use authlane_domain::constants::storage_keys;
    use authlane_domain::{AuthError, OpenIdConfiguration};
    use parking_lot::Mutex;

    use super::*;
    use crate::config_provider::ConfigurationProvider;
    use crate::state::{AuthStateService, FlowsDataService, StoragePersistence};
    use crate::testing::{MockStorage, MockTransport};
    use crate::user::UserService;
    use crate::well_known::AuthWellKnownService;

    /// Records its run and optionally fails.
    struct ScriptedStage {
        name: &'static str,
        fails: bool,
        resets: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl CallbackStage for ScriptedStage {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, context: CallbackContext) -> Result<CallbackContext> {
            self.log.lock().push(self.name);
            if self.fails {
                return Err(AuthError::Internal(format!("{} failed", self.name)));
            }
            Ok(context)
        }

        fn resets_on_failure(&self) -> bool {
            self.resets
        }
    }

    fn reset_service(storage: &Arc<MockStorage>) -> Arc<ResetAuthDataService> {
        let persistence = StoragePersistence::new(storage.clone());
        let config = Arc::new(ConfigurationProvider::new(OpenIdConfiguration::default()));
        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(MockClock::at_unix(0));
        let well_known = Arc::new(AuthWellKnownService::new(
            persistence.clone(),
            transport.clone(),
            Arc::clone(&config),
        ));
        let auth_state =
            Arc::new(AuthStateService::new(persistence.clone(), Arc::clone(&config), clock));
        let flows_data = Arc::new(FlowsDataService::new(persistence.clone()));
        let user =
            Arc::new(UserService::new(persistence, Arc::clone(&config), well_known, transport));
        Arc::new(ResetAuthDataService::new(config, user, flows_data, auth_state))
    }

    type StageLog = Arc<Mutex<Vec<&'static str>>>;

    fn pipeline(
        script: &[(&'static str, bool, bool)],
    ) -> (CallbackPipeline, Arc<MockStorage>, StageLog) {
        let storage = Arc::new(MockStorage::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let stages = script
            .iter()
            .map(|&(name, fails, resets)| {
                let stage = ScriptedStage { name, fails, resets, log: Arc::clone(&log) };
                Arc::new(stage) as Arc<dyn CallbackStage>
            })
            .collect();
        (CallbackPipeline::new(stages, reset_service(&storage)), storage, log)
    }

    #[tokio::test]
    async fn all_stages_run_in_order() {
        let (pipeline, storage, log) =
            pipeline(&[("first", false, false), ("second", false, false)]);

        assert_eq!(pipeline.stage_names(), vec!["first", "second"]);
        pipeline.execute(CallbackContext::default()).await.unwrap();

        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert_eq!(storage.removals(storage_keys::AUTHZ_DATA), 0);
    }

    #[tokio::test]
    async fn first_failure_short_circuits_and_resets_once() {
        let (pipeline, storage, log) =
            pipeline(&[("first", false, false), ("second", true, false), ("third", false, false)]);

        let err = pipeline.execute(CallbackContext::default()).await.unwrap_err();

        assert_eq!(err, AuthError::Internal("second failed".into()));
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert_eq!(storage.removals(storage_keys::AUTHZ_DATA), 1);
    }

    #[tokio::test]
    async fn self_resetting_stage_is_not_reset_again() {
        let (pipeline, storage, _) = pipeline(&[("validation", true, true)]);

        pipeline.execute(CallbackContext::default()).await.unwrap_err();

        assert_eq!(storage.removals(storage_keys::AUTHZ_DATA), 0);
    }
}
