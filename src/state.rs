use std::sync::Arc;
use crate::domain::ports::{AuthRepository, EventRepository, RegistrationRepository, UserRepository};
use crate::domain::services::{auth_service::AuthService, registration_ledger::RegistrationLedger};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub user_repo: Arc<dyn UserRepository>,
    pub auth_repo: Arc<dyn AuthRepository>,
    pub event_repo: Arc<dyn EventRepository>,
    pub registration_repo: Arc<dyn RegistrationRepository>,
    pub auth_service: Arc<AuthService>,
    pub ledger: Arc<RegistrationLedger>,
}

impl AppState {
    /// Wires services over whichever store backend the repositories use.
    pub fn new(
        config: Config,
        user_repo: Arc<dyn UserRepository>,
        auth_repo: Arc<dyn AuthRepository>,
        event_repo: Arc<dyn EventRepository>,
        registration_repo: Arc<dyn RegistrationRepository>,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(user_repo.clone(), auth_repo.clone(), config.clone()));
        let ledger = Arc::new(RegistrationLedger::new(
            event_repo.clone(),
            registration_repo.clone(),
            config.store_timeout,
        ));

        Self { config, user_repo, auth_repo, event_repo, registration_repo, auth_service, ledger }
    }
}
