//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod ledger;
pub mod membership;
pub mod orchard;
pub mod roles;
pub mod snapshot;

pub use arena::{HierarchyTree, TreeNode};
pub use builder::TreeBuilder;
pub use entities::*;
pub use error::{DenialReason, DomainError};
pub use ledger::LedgerBook;
pub use membership::MembershipRegistry;
pub use orchard::{Genesis, HarvestCredit, HarvestLine, Orchard};
pub use roles::RoleRegistry;
pub use snapshot::Snapshot;
