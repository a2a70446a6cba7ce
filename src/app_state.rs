use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::database::{self, Storage},
    services::{
        CapacityLedger, EventAdminService, LoggingNotifier, OrganizationResolver,
        RegistrationNotifier, RegistrationWorkflow, VolunteerDirectory,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Storage,
    pub resolver: Arc<OrganizationResolver>,
    pub ledger: CapacityLedger,
    pub registrations: Arc<RegistrationWorkflow>,
    pub events: Arc<EventAdminService>,
    pub volunteers: Arc<VolunteerDirectory>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let storage =
            database::connect(&config.database.url, config.database.max_connections).await?;
        Ok(Self::from_storage(
            config,
            storage,
            Arc::new(LoggingNotifier),
        ))
    }

    /// Wire every service over an already-connected storage backend
    pub fn from_storage(
        config: Config,
        storage: Storage,
        notifier: Arc<dyn RegistrationNotifier>,
    ) -> Self {
        let ledger = CapacityLedger::new(storage.volunteers.clone());
        Self {
            resolver: Arc::new(OrganizationResolver::new(storage.memberships.clone())),
            registrations: Arc::new(RegistrationWorkflow::new(
                storage.volunteers.clone(),
                ledger.clone(),
                notifier,
            )),
            events: Arc::new(EventAdminService::new(
                storage.volunteers.clone(),
                ledger.clone(),
            )),
            volunteers: Arc::new(VolunteerDirectory::new(storage.volunteers.clone())),
            ledger,
            storage,
            config,
        }
    }
}
