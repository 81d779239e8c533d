//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{HarvestService, LedgerService, MembershipService, NodeService};
use crate::application::OrchardStore;
use crate::config::Settings;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::traits::{
    CapacityYield, JsonStateRepository, MemberCollaborator, RealFileSystem,
    StateRepository,
};

/// Container holding all application services.
///
/// Every service shares the same store, so they see each other's commits.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    pub store: Arc<OrchardStore>,
    pub nodes: NodeService,
    pub memberships: MembershipService,
    pub ledgers: LedgerService,
    pub harvest: HarvestService,
}

impl ServiceContainer {
    /// Open the orchard named by `settings.state_file` with real implementations.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let repo = Arc::new(JsonStateRepository::new(
            settings.state_file.clone(),
            Arc::new(RealFileSystem),
        ));
        let store = OrchardStore::load(repo)?;
        Ok(Self::with_deps(settings, store, Arc::new(CapacityYield)))
    }

    /// Plant a new orchard at `settings.state_file`.
    pub fn initialize(settings: Settings) -> InfraResult<Self> {
        let repo = Arc::new(JsonStateRepository::new(
            settings.state_file.clone(),
            Arc::new(RealFileSystem),
        ));
        let store = OrchardStore::initialize(repo, &settings.genesis())?;
        Ok(Self::with_deps(settings, store, Arc::new(CapacityYield)))
    }

    /// Open or plant an orchard in any repository, e.g. an in-memory one.
    pub fn with_repository(
        settings: Settings,
        repo: Arc<dyn StateRepository>,
        collaborator: Arc<dyn MemberCollaborator>,
    ) -> InfraResult<Self> {
        let store = OrchardStore::open_or_plant(repo, &settings.genesis())?;
        Ok(Self::with_deps(settings, store, collaborator))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        store: OrchardStore,
        collaborator: Arc<dyn MemberCollaborator>,
    ) -> Self {
        let settings = Arc::new(settings);
        let store = Arc::new(store);

        Self {
            settings,
            nodes: NodeService::new(store.clone()),
            memberships: MembershipService::new(store.clone()),
            ledgers: LedgerService::new(store.clone()),
            harvest: HarvestService::new(store.clone(), collaborator),
            store,
        }
    }
}
