//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services share one `OrchardStore` and run every change as a transaction.

mod harvest;
mod ledger;
mod membership;
mod node;

pub use harvest::{BatchFailure, BatchReport, CancelFlag, HarvestService};
pub use ledger::LedgerService;
pub use membership::MembershipService;
pub use node::{NodeInfo, NodeService};
