//! Transactional access to the orchard aggregate.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{DomainError, Genesis, MemberId, NodeId, Orchard, Snapshot};
use crate::infrastructure::traits::StateRepository;

/// Owns the live orchard and its repository.
///
/// Writers are serialized by the mutex. Each transaction works on a copy
/// which is persisted and only then installed.
pub struct OrchardStore {
    state: Mutex<Orchard>,
    repo: Arc<dyn StateRepository>,
}

impl OrchardStore {
    /// Plant a new orchard and save it. Fails if the repository already holds one.
    #[instrument(level = "debug", skip(repo))]
    pub fn initialize(repo: Arc<dyn StateRepository>, genesis: &Genesis) -> ApplicationResult<Self> {
        if repo.load().with_context("load orchard state")?.is_some() {
            return Err(ApplicationError::AlreadyInitialized(repo.location()));
        }
        let orchard = Orchard::genesis(genesis)?;
        repo.save(&Snapshot::from(&orchard))
            .with_context("save orchard state")?;
        info!(location = %repo.location(), "initialized orchard");
        Ok(Self {
            state: Mutex::new(orchard),
            repo,
        })
    }

    /// Load an existing orchard.
    pub fn load(repo: Arc<dyn StateRepository>) -> ApplicationResult<Self> {
        let snapshot = repo
            .load()
            .with_context("load orchard state")?
            .ok_or_else(|| ApplicationError::NotInitialized(repo.location()))?;
        let orchard = Orchard::try_from(snapshot)?;
        debug!(location = %repo.location(), nodes = orchard.tree().len(), "loaded orchard");
        Ok(Self {
            state: Mutex::new(orchard),
            repo,
        })
    }

    /// Load the saved orchard or plant a new one.
    pub fn open_or_plant(
        repo: Arc<dyn StateRepository>,
        genesis: &Genesis,
    ) -> ApplicationResult<Self> {
        if repo.load().with_context("load orchard state")?.is_some() {
            Self::load(repo)
        } else {
            Self::initialize(repo, genesis)
        }
    }

    pub fn location(&self) -> String {
        self.repo.location()
    }

    fn lock(&self) -> ApplicationResult<MutexGuard<'_, Orchard>> {
        self.state.lock().map_err(|_| ApplicationError::StatePoisoned)
    }

    /// Run a read-only query against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&Orchard) -> T) -> ApplicationResult<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Copy of the current state, for work that must not hold the lock.
    pub fn snapshot(&self) -> ApplicationResult<Orchard> {
        self.read(Orchard::clone)
    }

    /// Apply `f` as one unit of work.
    ///
    /// On `Err`, or when saving fails, the live state is unchanged.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Orchard) -> Result<T, DomainError>,
    ) -> ApplicationResult<T> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let value = f(&mut working)?;
        self.repo
            .save(&Snapshot::from(&working))
            .with_context("save orchard state")?;
        *guard = working;
        Ok(value)
    }

    /// Find a node by id or slug.
    pub fn resolve_node(&self, key: &str) -> ApplicationResult<NodeId> {
        self.read(|orchard| {
            if let Ok(uuid) = Uuid::parse_str(key) {
                let id = NodeId(uuid);
                if orchard.node(id).is_ok() {
                    return Ok(id);
                }
            }
            orchard
                .node_by_slug(key)
                .map(|n| n.id)
                .ok_or_else(|| ApplicationError::NotFound(format!("node {}", key)))
        })?
    }

    /// Find a member by id, email or exact name.
    pub fn resolve_member(&self, key: &str) -> ApplicationResult<MemberId> {
        self.read(|orchard| {
            if let Ok(uuid) = Uuid::parse_str(key) {
                let id = MemberId(uuid);
                if orchard.member(id).is_ok() {
                    return Ok(id);
                }
            }
            let matches: Vec<MemberId> = orchard
                .members()
                .filter(|m| m.name == key || m.email.as_deref() == Some(key))
                .map(|m| m.id)
                .collect();
            match matches.as_slice() {
                [id] => Ok(*id),
                [] => Err(ApplicationError::NotFound(format!("member {}", key))),
                _ => Err(ApplicationError::Ambiguous {
                    key: key.to_string(),
                    matches: matches.len(),
                }),
            }
        })?
    }
}
