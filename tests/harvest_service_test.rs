//! Tests for the monthly harvest and engagement batches
//!
//! Node layout used throughout:
//!
//! ```text
//! root
//! ├── upper (own resource "upper fruit")
//! │   └── lower (own resource "lower fruit")
//! └── side  (own resource "side fruit")
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use orchard::application::services::{BatchFailure, CancelFlag, HarvestService};
use orchard::application::OrchardStore;
use orchard::domain::{
    BatchKind, DomainError, MemberId, MembershipTerms, NodeId, NodeParams, Owner, Period,
    ProductionCapacity, Role,
};
use orchard::infrastructure::traits::{EngagementLog, InMemoryRepository, MemberCollaborator};
use orchard::infrastructure::ServiceContainer;
use orchard::util::testing::{in_memory_container, init_test_setup};

/// Collaborator whose members produce a fixed amount, whatever their capacity.
struct FixedYield(i64);

impl MemberCollaborator for FixedYield {
    fn harvest_from_production(
        &self,
        _member: MemberId,
        _node: NodeId,
        _capacity: Option<&ProductionCapacity>,
    ) -> i64 {
        self.0
    }

    fn record_engagement(&self, _member: MemberId, _node: NodeId) -> Result<(), String> {
        Ok(())
    }
}

/// Collaborator that produces different amounts per member.
struct PerMemberYield(BTreeMap<MemberId, i64>);

impl MemberCollaborator for PerMemberYield {
    fn harvest_from_production(
        &self,
        member: MemberId,
        _node: NodeId,
        _capacity: Option<&ProductionCapacity>,
    ) -> i64 {
        self.0.get(&member).copied().unwrap_or(0)
    }

    fn record_engagement(&self, _member: MemberId, _node: NodeId) -> Result<(), String> {
        Ok(())
    }
}

/// Collaborator that changes the orchard once, while production is being
/// reported, and reports no production itself.
struct ChangeDuringHarvest {
    store: Arc<OrchardStore>,
    change: Box<dyn Fn(&OrchardStore) + Send + Sync>,
    fired: AtomicBool,
}

impl ChangeDuringHarvest {
    fn new(store: Arc<OrchardStore>, change: impl Fn(&OrchardStore) + Send + Sync + 'static) -> Self {
        Self {
            store,
            change: Box::new(change),
            fired: AtomicBool::new(false),
        }
    }
}

impl MemberCollaborator for ChangeDuringHarvest {
    fn harvest_from_production(
        &self,
        _member: MemberId,
        _node: NodeId,
        _capacity: Option<&ProductionCapacity>,
    ) -> i64 {
        if !self.fired.swap(true, Ordering::SeqCst) {
            (self.change)(&self.store);
        }
        0
    }

    fn record_engagement(&self, _member: MemberId, _node: NodeId) -> Result<(), String> {
        Ok(())
    }
}

struct Grove {
    container: ServiceContainer,
    repo: Arc<InMemoryRepository>,
    root: NodeId,
    upper: NodeId,
    lower: NodeId,
    side: NodeId,
    founder: MemberId,
}

fn period() -> Period {
    Period::new(2026, 3).unwrap()
}

fn params(name: &str, gain: i64) -> NodeParams {
    NodeParams {
        resource_name: Some(format!("{} fruit", name)),
        monthly_fruit_basis: Some(100),
        memberships: vec![MembershipTerms {
            name: "standard".to_string(),
            monthly_fee: 0,
            monthly_gain: gain,
        }],
        ..NodeParams::named(name)
    }
}

fn grove(collaborator: Arc<dyn MemberCollaborator>) -> Grove {
    init_test_setup();
    let (container, repo) = in_memory_container(collaborator);
    let root = container.store.read(|o| o.root()).unwrap();
    let founder = container.memberships.register_member("Founder", None).unwrap();
    let nodes = &container.nodes;
    let upper = nodes.create_child(root, &params("upper", 100), founder).unwrap();
    let lower = nodes.create_child(upper, &params("lower", 100), founder).unwrap();
    let side = nodes.create_child(root, &params("side", 100), founder).unwrap();
    Grove {
        container,
        repo,
        root,
        upper,
        lower,
        side,
        founder,
    }
}

impl Grove {
    /// Register a member and let them join `node` with its standard offer.
    fn member_of(&self, name: &str, node: NodeId) -> MemberId {
        let member = self.container.memberships.register_member(name, None).unwrap();
        self.join(member, node);
        member
    }

    fn join(&self, member: MemberId, node: NodeId) {
        let offer = self.container.memberships.offered(node).unwrap()[0].id;
        self.container
            .memberships
            .join(member, node, offer, None)
            .unwrap();
    }

    fn grow(&self, node: NodeId) {
        self.container.nodes.set_status(node, true, true).unwrap();
    }

    fn balance(&self, owner: Owner, resource: &str) -> i64 {
        self.container.ledgers.balance(owner, resource).unwrap()
    }

    /// Sum of `resource` over member ledgers only.
    fn member_holdings(&self, resource: &str) -> i64 {
        self.container
            .memberships
            .members()
            .unwrap()
            .iter()
            .map(|m| self.balance(Owner::Member(m.id), resource))
            .sum()
    }
}

// ============================================================
// harvest_time()
// ============================================================

#[test]
fn given_member_producing_forty_when_harvest_then_sixty_paid_from_treasury() {
    // Arrange
    let g = grove(Arc::new(FixedYield(40)));
    let m = g.member_of("Mira", g.upper);
    g.grow(g.upper);

    // Act
    let report = g
        .container
        .harvest
        .harvest_time(g.upper, period(), &CancelFlag::new())
        .unwrap();

    // Assert
    assert!(report.is_clean(), "{:?}", report.failures);
    assert!(report.completed.contains(&g.upper));
    assert_eq!(report.credited, 60);
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 60);
    assert_eq!(g.balance(Owner::Node(g.upper), "upper fruit"), -60);
}

#[test]
fn given_production_above_gain_when_harvest_then_nothing_is_credited() {
    let g = grove(Arc::new(FixedYield(150)));
    let m = g.member_of("Mira", g.upper);
    g.grow(g.upper);

    let report = g.container.harvest.harvest_all(period(), &CancelFlag::new()).unwrap();

    assert_eq!(report.credited, 0);
    assert!(report.completed.contains(&g.upper));
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 0);
}

#[test]
fn given_non_tree_parent_when_harvest_then_its_members_untouched_but_tree_child_harvested() {
    // Arrange: upper stays a plant, lower grows
    let g = grove(Arc::new(FixedYield(0)));
    let at_upper = g.member_of("Uma", g.upper);
    let at_lower = g.member_of("Leo", g.lower);
    g.container.nodes.set_status(g.upper, true, false).unwrap();
    g.grow(g.lower);

    // Act
    let report = g.container.harvest.harvest_all(period(), &CancelFlag::new()).unwrap();

    // Assert
    assert!(report.skipped_status.contains(&g.upper));
    assert!(report.skipped_status.contains(&g.root));
    assert_eq!(report.completed, vec![g.lower]);
    assert_eq!(g.balance(Owner::Member(at_upper), "upper fruit"), 0);
    assert_eq!(g.balance(Owner::Member(at_lower), "lower fruit"), 100);
}

#[test]
fn given_harvest_of_subtree_when_summing_then_member_holdings_rise_by_credited_and_net_supply_is_kept() {
    // Arrange: members join first, their yields are known only afterwards
    let g = grove(Arc::new(PerMemberYield(BTreeMap::new())));
    let a = g.member_of("Ann", g.upper);
    let b = g.member_of("Ben", g.upper);
    let yields = BTreeMap::from([(a, 30), (b, 120)]);
    for node in [g.upper, g.lower, g.side] {
        g.grow(node);
    }
    let holdings_before = g.member_holdings("upper fruit");
    let supply_before = g.container.ledgers.total_supply("upper fruit").unwrap();

    // Act
    let harvest = HarvestService::new(
        g.container.store.clone(),
        Arc::new(PerMemberYield(yields)),
    );
    let report = harvest.harvest_time(g.upper, period(), &CancelFlag::new()).unwrap();

    // Assert
    assert_eq!(report.credited, 70);
    assert_eq!(g.member_holdings("upper fruit") - holdings_before, 70);
    assert_eq!(
        g.container.ledgers.total_supply("upper fruit").unwrap(),
        supply_before
    );
    assert_eq!(g.balance(Owner::Member(b), "upper fruit"), 0);
    assert!(
        !report.completed.contains(&g.side),
        "side is outside the started subtree"
    );
}

#[test]
fn given_completed_period_when_harvest_again_then_skipped_and_nothing_credited_twice() {
    // Arrange
    let g = grove(Arc::new(FixedYield(40)));
    let m = g.member_of("Mira", g.upper);
    g.grow(g.upper);
    let cancel = CancelFlag::new();
    g.container.harvest.harvest_all(period(), &cancel).unwrap();

    // Act
    let rerun = g.container.harvest.harvest_all(period(), &cancel).unwrap();

    // Assert
    assert!(rerun.skipped_done.contains(&g.upper));
    assert_eq!(rerun.credited, 0);
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 60);

    let next = g
        .container
        .harvest
        .harvest_all(Period::new(2026, 4).unwrap(), &cancel)
        .unwrap();
    assert_eq!(next.credited, 60);
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 120);
}

#[test]
fn given_member_role_without_membership_when_harvest_then_node_fails_and_siblings_continue() {
    // Arrange: the founder is admitted to upper without paying a membership
    let g = grove(Arc::new(FixedYield(0)));
    g.container.nodes.admit_member(g.upper, g.founder).unwrap();
    let m = g.member_of("Sid", g.side);
    for node in [g.upper, g.side] {
        g.grow(node);
    }

    // Act
    let report = g.container.harvest.harvest_all(period(), &CancelFlag::new()).unwrap();

    // Assert
    assert_eq!(
        report.failures,
        vec![BatchFailure::Node {
            node: g.upper,
            error: DomainError::MissingMembership {
                node: g.upper,
                member: g.founder
            }
        }]
    );
    assert!(report.completed.contains(&g.side));
    assert_eq!(g.balance(Owner::Member(m), "side fruit"), 100);
    assert!(!g
        .container
        .store
        .read(|o| o.is_marked(g.upper, period(), BatchKind::Harvest))
        .unwrap());
}

#[test]
fn given_cancelled_flag_when_harvest_then_nothing_is_committed() {
    let g = grove(Arc::new(FixedYield(0)));
    let m = g.member_of("Mira", g.upper);
    g.grow(g.upper);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = g.container.harvest.harvest_all(period(), &cancel).unwrap();

    assert!(report.cancelled);
    assert!(!report.is_clean());
    assert!(report.completed.is_empty());
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 0);
}

#[test]
fn given_failing_saves_when_harvest_then_persistence_failure_and_state_unchanged() {
    // Arrange
    let g = grove(Arc::new(FixedYield(0)));
    let m = g.member_of("Mira", g.upper);
    g.grow(g.upper);
    g.repo.set_fail_saves(true);

    // Act
    let report = g.container.harvest.harvest_all(period(), &CancelFlag::new()).unwrap();

    // Assert
    assert!(matches!(
        report.failures.as_slice(),
        [BatchFailure::Persistence { node, .. }] if *node == g.upper
    ));
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 0);

    g.repo.set_fail_saves(false);
    let retry = g.container.harvest.harvest_all(period(), &CancelFlag::new()).unwrap();
    assert_eq!(retry.completed, vec![g.upper]);
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 100);
}

#[test]
fn given_member_removed_while_harvest_runs_when_committing_then_member_is_not_paid() {
    // Arrange
    let g = grove(Arc::new(FixedYield(0)));
    let m = g.member_of("Mira", g.upper);
    g.grow(g.upper);
    let upper = g.upper;
    let harvest = HarvestService::new(
        g.container.store.clone(),
        Arc::new(ChangeDuringHarvest::new(g.container.store.clone(), move |store| {
            store.transaction(|o| o.remove_member(upper, m)).unwrap();
        })),
    );

    // Act
    let report = harvest
        .harvest_time(g.upper, period(), &CancelFlag::new())
        .unwrap();

    // Assert
    assert!(report.is_clean());
    assert_eq!(report.completed, vec![g.upper]);
    assert_eq!(report.credited, 0);
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 0);
    assert_eq!(g.balance(Owner::Node(g.upper), "upper fruit"), 0);
    assert!(!g
        .container
        .memberships
        .has_role(g.upper, m, Role::Member)
        .unwrap());
}

#[test]
fn given_member_joining_while_harvest_runs_when_committing_then_node_fails_and_rerun_pays_both() {
    // Arrange
    let g = grove(Arc::new(FixedYield(0)));
    let m = g.member_of("Mira", g.upper);
    let late = g.container.memberships.register_member("Lars", None).unwrap();
    let offer = g.container.memberships.offered(g.upper).unwrap()[0].id;
    g.grow(g.upper);
    let upper = g.upper;
    let harvest = HarvestService::new(
        g.container.store.clone(),
        Arc::new(ChangeDuringHarvest::new(g.container.store.clone(), move |store| {
            store
                .transaction(|o| {
                    o.validate_and_admit(late, upper, offer, None)?;
                    o.admit_member(upper, late)
                })
                .unwrap();
        })),
    );

    // Act
    let report = harvest
        .harvest_time(g.upper, period(), &CancelFlag::new())
        .unwrap();

    // Assert
    assert_eq!(
        report.failures,
        vec![BatchFailure::Node {
            node: g.upper,
            error: DomainError::HarvestOutdated(g.upper)
        }]
    );
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 0);
    assert!(!g
        .container
        .store
        .read(|o| o.is_marked(g.upper, period(), BatchKind::Harvest))
        .unwrap());

    let rerun = g
        .container
        .harvest
        .harvest_time(g.upper, period(), &CancelFlag::new())
        .unwrap();
    assert_eq!(rerun.completed, vec![g.upper]);
    assert_eq!(g.balance(Owner::Member(m), "upper fruit"), 100);
    assert_eq!(g.balance(Owner::Member(late), "upper fruit"), 100);
}

#[test]
fn given_unknown_start_node_when_harvest_then_node_not_found() {
    let g = grove(Arc::new(FixedYield(0)));

    let result = g
        .container
        .harvest
        .harvest_time(NodeId::generate(), period(), &CancelFlag::new());

    assert!(result.is_err());
}

// ============================================================
// engagement_time()
// ============================================================

#[test]
fn given_tree_node_when_engagement_then_each_member_recorded_once_per_period() {
    // Arrange
    let log = Arc::new(EngagementLog::new());
    let g = grove(log.clone());
    let a = g.member_of("Ann", g.side);
    let b = g.member_of("Ben", g.side);
    g.grow(g.side);

    // Act
    let report = g.container.harvest.engage_all(period(), &CancelFlag::new()).unwrap();
    let rerun = g.container.harvest.engage_all(period(), &CancelFlag::new()).unwrap();

    // Assert
    assert!(report.is_clean());
    assert_eq!(report.completed, vec![g.side]);
    let mut calls = log.calls();
    calls.sort();
    let mut expected = vec![(a, g.side), (b, g.side)];
    expected.sort();
    assert_eq!(calls, expected);
    assert!(rerun.skipped_done.contains(&g.side));
    assert_eq!(log.calls().len(), 2);
}

#[test]
fn given_refusing_member_when_engagement_then_reported_and_period_still_marked() {
    // Arrange
    let g = grove(Arc::new(FixedYield(0)));
    let a = g.member_of("Ann", g.side);
    let b = g.member_of("Ben", g.side);
    g.grow(g.side);
    let log = Arc::new(EngagementLog::refusing([b]));
    let engagement =
        HarvestService::new(g.container.store.clone(), log.clone());

    // Act
    let report = engagement
        .engagement_time(g.root, period(), &CancelFlag::new())
        .unwrap();

    // Assert
    assert_eq!(log.calls(), vec![(a, g.side)]);
    assert!(matches!(
        report.failures.as_slice(),
        [BatchFailure::Engagement { member, .. }] if *member == b
    ));
    assert!(g
        .container
        .store
        .read(|o| o.is_marked(g.side, period(), BatchKind::Engagement))
        .unwrap());
    assert!(g
        .container
        .memberships
        .has_role(g.side, a, Role::Member)
        .unwrap());
}
