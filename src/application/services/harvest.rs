//! Monthly harvest and engagement batches
//!
//! Both batches walk the subtree of a start node in pre-order. Only nodes in
//! status TREE do work, but the subtree below a non-TREE node is still
//! visited. Each node-period commits on its own and is marked, so a rerun of
//! the same period skips what was already done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::application::store::OrchardStore;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    BatchKind, DomainError, HarvestCredit, MemberId, NodeId, Orchard, Period, Role, Status,
};
use crate::infrastructure::traits::MemberCollaborator;

/// Shared stop signal for a running batch.
///
/// Checked before every node-period; committed node-periods stay committed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A node-period that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchFailure {
    /// Planning or committing the node-period was rejected
    Node { node: NodeId, error: DomainError },
    /// The collaborator refused one member's engagement
    Engagement {
        node: NodeId,
        member: MemberId,
        message: String,
    },
    /// The result could not be saved
    Persistence { node: NodeId, message: String },
}

impl BatchFailure {
    pub fn node(&self) -> NodeId {
        match self {
            BatchFailure::Node { node, .. }
            | BatchFailure::Engagement { node, .. }
            | BatchFailure::Persistence { node, .. } => *node,
        }
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub kind: BatchKind,
    pub period: Period,
    pub completed: Vec<NodeId>,
    /// Already done for this period by an earlier run
    pub skipped_done: Vec<NodeId>,
    /// Not in status TREE
    pub skipped_status: Vec<NodeId>,
    pub failures: Vec<BatchFailure>,
    /// Total moved from treasuries to members
    pub credited: i64,
    pub cancelled: bool,
}

impl BatchReport {
    fn new(kind: BatchKind, period: Period) -> Self {
        Self {
            kind,
            period,
            completed: Vec::new(),
            skipped_done: Vec::new(),
            skipped_status: Vec::new(),
            failures: Vec::new(),
            credited: 0,
            cancelled: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

enum HarvestPlan {
    Done,
    Dormant(Status),
    Credit(Vec<HarvestCredit>),
    Failed(DomainError),
}

enum EngagementPlan {
    Done,
    Dormant(Status),
    Engage(Vec<MemberId>),
    Failed(DomainError),
}

/// Runs the periodic batches over the hierarchy.
pub struct HarvestService {
    store: Arc<OrchardStore>,
    collaborator: Arc<dyn MemberCollaborator>,
}

impl HarvestService {
    pub fn new(store: Arc<OrchardStore>, collaborator: Arc<dyn MemberCollaborator>) -> Self {
        Self {
            store,
            collaborator,
        }
    }

    /// Nodes to visit below and including `start`, pre-order.
    fn visit_order(orchard: &Orchard, start: NodeId) -> ApplicationResult<Vec<NodeId>> {
        orchard.node(start)?;
        Ok(orchard
            .tree()
            .subtree(start)
            .into_iter()
            .filter(|id| *id == start || !orchard.is_root(*id))
            .collect())
    }

    /// Credit every member of every TREE node below `start` with the part of
    /// their guaranteed gain their own production did not cover.
    ///
    /// Plans are matched against the live state when they commit. A plan that
    /// no longer fits its node is reported as failed and left unmarked.
    #[instrument(level = "debug", skip(self, cancel))]
    pub fn harvest_time(
        &self,
        start: NodeId,
        period: Period,
        cancel: &CancelFlag,
    ) -> ApplicationResult<BatchReport> {
        let orchard = self.store.snapshot()?;
        let order = Self::visit_order(&orchard, start)?;

        // Subtrees are independent, so plans are computed in parallel
        let plans: Vec<(NodeId, HarvestPlan)> = order
            .par_iter()
            .map(|node| (*node, self.plan_harvest(&orchard, *node, period)))
            .collect();

        let mut report = BatchReport::new(BatchKind::Harvest, period);
        for (node, plan) in plans {
            if cancel.is_cancelled() {
                warn!(node = %node, "harvest cancelled");
                report.cancelled = true;
                break;
            }
            match plan {
                HarvestPlan::Done => report.skipped_done.push(node),
                HarvestPlan::Dormant(status) => {
                    debug!(node = %node, %status, "not harvesting");
                    report.skipped_status.push(node);
                }
                HarvestPlan::Failed(error) => {
                    warn!(node = %node, %error, "harvest planning failed");
                    report.failures.push(BatchFailure::Node { node, error });
                }
                HarvestPlan::Credit(credits) => {
                    let committed = self.store.transaction(|o| {
                        if o.is_marked(node, period, BatchKind::Harvest) {
                            return Ok(None);
                        }
                        o.credit_harvest(node, period, &credits).map(Some)
                    });
                    match committed {
                        Ok(Some(total)) => {
                            debug!(node = %node, total, "harvest committed");
                            report.credited = report.credited.saturating_add(total);
                            report.completed.push(node);
                        }
                        Ok(None) => report.skipped_done.push(node),
                        Err(e) => report.failures.push(failure(node, e)),
                    }
                }
            }
        }

        info!(
            %period,
            completed = report.completed.len(),
            failures = report.failures.len(),
            credited = report.credited,
            "harvest finished"
        );
        Ok(report)
    }

    fn plan_harvest(&self, orchard: &Orchard, node: NodeId, period: Period) -> HarvestPlan {
        if orchard.is_marked(node, period, BatchKind::Harvest) {
            return HarvestPlan::Done;
        }
        match orchard.status(node) {
            Ok(Status::Tree) => {}
            Ok(status) => return HarvestPlan::Dormant(status),
            Err(e) => return HarvestPlan::Failed(e),
        }
        let lines = match orchard.harvest_lines(node) {
            Ok(lines) => lines,
            Err(e) => return HarvestPlan::Failed(e),
        };
        let credits = lines
            .iter()
            .map(|line| {
                let produced = self.collaborator.harvest_from_production(
                    line.member,
                    node,
                    line.capacity.as_ref(),
                );
                HarvestCredit {
                    member: line.member,
                    produced,
                }
            })
            .collect();
        HarvestPlan::Credit(credits)
    }

    /// Ask the collaborator to record engagement for every member of every
    /// TREE node below `start`.
    ///
    /// A refused member is reported; the node-period is still marked done.
    #[instrument(level = "debug", skip(self, cancel))]
    pub fn engagement_time(
        &self,
        start: NodeId,
        period: Period,
        cancel: &CancelFlag,
    ) -> ApplicationResult<BatchReport> {
        let orchard = self.store.snapshot()?;
        let order = Self::visit_order(&orchard, start)?;
        let plans: Vec<(NodeId, EngagementPlan)> = order
            .iter()
            .map(|node| (*node, plan_engagement(&orchard, *node, period)))
            .collect();

        let mut report = BatchReport::new(BatchKind::Engagement, period);
        for (node, plan) in plans {
            if cancel.is_cancelled() {
                warn!(node = %node, "engagement cancelled");
                report.cancelled = true;
                break;
            }
            match plan {
                EngagementPlan::Done => report.skipped_done.push(node),
                EngagementPlan::Dormant(_) => report.skipped_status.push(node),
                EngagementPlan::Failed(error) => {
                    warn!(node = %node, %error, "engagement planning failed");
                    report.failures.push(BatchFailure::Node { node, error });
                }
                EngagementPlan::Engage(members) => {
                    // Re-check under the current state before calling out
                    if self
                        .store
                        .read(|o| o.is_marked(node, period, BatchKind::Engagement))?
                    {
                        report.skipped_done.push(node);
                        continue;
                    }
                    for member in members {
                        if let Err(message) = self.collaborator.record_engagement(member, node) {
                            warn!(node = %node, member = %member, %message, "engagement refused");
                            report.failures.push(BatchFailure::Engagement {
                                node,
                                member,
                                message,
                            });
                        }
                    }
                    match self.store.transaction(|o| {
                        o.node(node)?;
                        Ok(o.mark(node, period, BatchKind::Engagement))
                    }) {
                        Ok(_) => report.completed.push(node),
                        Err(e) => report.failures.push(failure(node, e)),
                    }
                }
            }
        }

        info!(
            %period,
            completed = report.completed.len(),
            failures = report.failures.len(),
            "engagement finished"
        );
        Ok(report)
    }

    /// Harvest the whole orchard.
    pub fn harvest_all(&self, period: Period, cancel: &CancelFlag) -> ApplicationResult<BatchReport> {
        let root = self.store.read(Orchard::root)?;
        self.harvest_time(root, period, cancel)
    }

    /// Engagement for the whole orchard.
    pub fn engage_all(&self, period: Period, cancel: &CancelFlag) -> ApplicationResult<BatchReport> {
        let root = self.store.read(Orchard::root)?;
        self.engagement_time(root, period, cancel)
    }
}

fn plan_engagement(orchard: &Orchard, node: NodeId, period: Period) -> EngagementPlan {
    if orchard.is_marked(node, period, BatchKind::Engagement) {
        return EngagementPlan::Done;
    }
    match orchard.status(node) {
        Ok(Status::Tree) => EngagementPlan::Engage(
            orchard
                .members_with_role(node, Role::Member)
                .into_iter()
                .collect(),
        ),
        Ok(status) => EngagementPlan::Dormant(status),
        Err(e) => EngagementPlan::Failed(e),
    }
}

fn failure(node: NodeId, error: ApplicationError) -> BatchFailure {
    match error {
        ApplicationError::Domain(error) => BatchFailure::Node { node, error },
        other => BatchFailure::Persistence {
            node,
            message: other.to_string(),
        },
    }
}
