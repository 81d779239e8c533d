//! The orchard aggregate: one consistent view of nodes, members and ledgers.
//!
//! Operations validate before they mutate, so an `Err` leaves the aggregate
//! as it was. The exception is `credit_harvest`, which pays member by member
//! and relies on `OrchardStore::transaction` to discard a partial payout.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::domain::arena::HierarchyTree;
use crate::domain::entities::{
    BatchKind, BatchMark, Ledger, Member, MemberId, Membership, MembershipCard, MembershipId,
    Node, NodeId, NodeParams, Owner, Period, ProductionCapacity, ResourceScope, ResourceType,
    ResourceTypeId, Role, RoleAssignment, Status,
};
use crate::domain::error::{DenialReason, DomainError};
use crate::domain::ledger::LedgerBook;
use crate::domain::membership::MembershipRegistry;
use crate::domain::roles::RoleRegistry;
use crate::util::text::slugify;

/// Settings for planting the root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    pub root_name: String,
    /// Name of the global base currency
    pub base_resource: String,
    /// Name of the root node's own resource
    pub root_resource: String,
    pub monthly_fruit_basis: i64,
    pub max_members: usize,
}

/// One member's entitlement on a node for a harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestLine {
    pub member: MemberId,
    pub capacity: Option<ProductionCapacity>,
    pub monthly_gain: i64,
}

impl HarvestLine {
    /// Part of the guaranteed gain the member's own production does not cover.
    ///
    /// Negative production counts as none.
    pub fn missing(&self, produced: i64) -> i64 {
        self.monthly_gain.saturating_sub(produced.max(0)).max(0)
    }
}

/// What a member produced this period, as reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestCredit {
    pub member: MemberId,
    pub produced: i64,
}

#[derive(Debug, Clone)]
pub struct Orchard {
    pub(crate) tree: HierarchyTree,
    pub(crate) root: NodeId,
    pub(crate) base_resource: ResourceTypeId,
    pub(crate) resource_types: BTreeMap<ResourceTypeId, ResourceType>,
    pub(crate) members: BTreeMap<MemberId, Member>,
    pub(crate) ledgers: LedgerBook,
    pub(crate) roles: RoleRegistry,
    pub(crate) memberships: MembershipRegistry,
    pub(crate) capacities: BTreeMap<(MemberId, ResourceTypeId), ProductionCapacity>,
    pub(crate) batches: BTreeSet<BatchMark>,
}

impl Orchard {
    /// Plant a new orchard: base currency, root node, root resource and treasury.
    pub fn genesis(genesis: &Genesis) -> Result<Self, DomainError> {
        let slug = valid_slug(&genesis.root_name)?;
        if genesis.base_resource.trim().is_empty() || genesis.root_resource.trim().is_empty() {
            return Err(DomainError::InvalidName(String::new()));
        }
        if genesis.base_resource.trim() == genesis.root_resource.trim() {
            return Err(DomainError::DuplicateResourceType(
                genesis.root_resource.clone(),
            ));
        }

        let root_id = NodeId::generate();
        let base = ResourceType {
            id: ResourceTypeId::generate(),
            name: genesis.base_resource.trim().to_string(),
            scope: ResourceScope::Global,
        };
        let own = ResourceType {
            id: ResourceTypeId::generate(),
            name: genesis.root_resource.trim().to_string(),
            scope: ResourceScope::Node(root_id),
        };
        let root = Node {
            id: root_id,
            name: genesis.root_name.trim().to_string(),
            slug,
            description: String::new(),
            video_url: None,
            manifested: false,
            growing: false,
            mother: None,
            monthly_fruit_basis: genesis.monthly_fruit_basis,
            max_members: genesis.max_members,
            resource_type: Some(own.id),
        };

        let mut tree = HierarchyTree::new();
        if !tree.insert_node(root) {
            return Err(DomainError::InvalidHierarchy(
                "cannot plant root node".to_string(),
            ));
        }
        let mut ledgers = LedgerBook::new();
        ledgers.open(Owner::Node(root_id));

        info!(root = %root_id, name = %genesis.root_name, "planted orchard");
        Ok(Self {
            tree,
            root: root_id,
            base_resource: base.id,
            resource_types: [(base.id, base), (own.id, own)].into_iter().collect(),
            members: BTreeMap::new(),
            ledgers,
            roles: RoleRegistry::new(),
            memberships: MembershipRegistry::new(),
            capacities: BTreeMap::new(),
            batches: BTreeSet::new(),
        })
    }

    // ============================================================
    // Lookups
    // ============================================================

    pub fn tree(&self) -> &HierarchyTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.tree.is_root(node)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, DomainError> {
        self.tree.get(id).ok_or(DomainError::NodeNotFound(id))
    }

    pub fn node_by_slug(&self, slug: &str) -> Option<&Node> {
        self.tree
            .iter()
            .map(|(_, n)| &n.data)
            .find(|n| n.slug == slug)
    }

    /// Nodes in pre-order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.tree.iter().map(|(_, n)| &n.data)
    }

    pub fn status(&self, node: NodeId) -> Result<Status, DomainError> {
        self.node(node).map(Node::status)
    }

    pub fn member(&self, id: MemberId) -> Result<&Member, DomainError> {
        self.members.get(&id).ok_or(DomainError::MemberNotFound(id))
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn base_resource(&self) -> ResourceTypeId {
        self.base_resource
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.resource_types.values()
    }

    pub fn resource_type(&self, id: ResourceTypeId) -> Option<&ResourceType> {
        self.resource_types.get(&id)
    }

    pub fn resource_type_by_name(&self, name: &str) -> Result<&ResourceType, DomainError> {
        self.resource_types
            .values()
            .find(|rt| rt.name == name)
            .ok_or_else(|| DomainError::ResourceTypeNotFound(name.to_string()))
    }

    /// The node's own resource type.
    pub fn own_resource(&self, node: NodeId) -> Result<ResourceTypeId, DomainError> {
        self.node(node)?
            .resource_type
            .ok_or(DomainError::MissingResourceType(node))
    }

    /// Resource in which fees and income of `node` are denominated.
    ///
    /// The base currency for the root, the parent's own resource otherwise.
    pub fn funding_type(&self, node: NodeId) -> Result<ResourceTypeId, DomainError> {
        self.node(node)?;
        if self.is_root(node) {
            return Ok(self.base_resource);
        }
        let parent = self
            .tree
            .parent(node)
            .ok_or_else(|| DomainError::InvalidHierarchy(format!("node {} has no parent", node)))?;
        self.own_resource(parent)
    }

    pub fn capacity(&self, member: MemberId, resource: ResourceTypeId) -> Option<&ProductionCapacity> {
        self.capacities.get(&(member, resource))
    }

    pub fn is_marked(&self, node: NodeId, period: Period, kind: BatchKind) -> bool {
        self.batches.contains(&BatchMark { node, period, kind })
    }

    // ============================================================
    // Ledgers
    // ============================================================

    pub fn ledgers(&self) -> &LedgerBook {
        &self.ledgers
    }

    pub fn balance(&self, owner: Owner, resource: ResourceTypeId) -> i64 {
        self.ledgers.balance(owner, resource)
    }

    fn check_owner(&self, owner: Owner) -> Result<(), DomainError> {
        match owner {
            Owner::Node(id) => self.node(id).map(|_| ()),
            Owner::Member(id) => self.member(id).map(|_| ()),
        }
    }

    /// Transfer between two existing ledgers.
    pub fn transfer(
        &mut self,
        from: Owner,
        to: Owner,
        resource: ResourceTypeId,
        amount: i64,
    ) -> Result<(), DomainError> {
        self.check_owner(from)?;
        self.check_owner(to)?;
        if !self.resource_types.contains_key(&resource) {
            return Err(DomainError::ResourceTypeNotFound(resource.to_string()));
        }
        self.ledgers.transfer(from, to, resource, amount)
    }

    // ============================================================
    // Members and memberships
    // ============================================================

    /// Register a member together with an empty ledger.
    pub fn register_member(
        &mut self,
        name: &str,
        email: Option<String>,
    ) -> Result<MemberId, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidName(name.to_string()));
        }
        let id = MemberId::generate();
        self.members.insert(
            id,
            Member {
                id,
                name: name.to_string(),
                email,
            },
        );
        self.ledgers.open(Owner::Member(id));
        debug!(member = %id, "registered member");
        Ok(id)
    }

    /// Offer a new membership on `node`.
    pub fn define_membership(
        &mut self,
        node: NodeId,
        name: &str,
        monthly_fee: i64,
        monthly_gain: i64,
    ) -> Result<MembershipId, DomainError> {
        self.node(node)?;
        let membership = build_membership(node, name, monthly_fee, monthly_gain)?;
        let id = membership.id;
        self.memberships.define(membership);
        Ok(id)
    }

    pub fn membership(&self, id: MembershipId) -> Result<&Membership, DomainError> {
        self.memberships
            .get(id)
            .ok_or(DomainError::MembershipNotFound(id))
    }

    pub fn memberships_offered(&self, node: NodeId) -> Vec<&Membership> {
        self.memberships.offered_by(node)
    }

    pub fn membership_for(&self, member: MemberId, node: NodeId) -> Option<&Membership> {
        self.memberships.membership_for(member, node)
    }

    pub fn card(&self, member: MemberId, node: NodeId) -> Option<&MembershipCard> {
        self.memberships.card(member, node)
    }

    /// Guaranteed monthly income from the member's top-level membership.
    pub fn monthly_income(&self, member: MemberId) -> i64 {
        self.membership_for(member, self.root)
            .map(|m| m.monthly_gain)
            .unwrap_or(0)
    }

    /// Fees of every other membership of `member` denominated in `funding`.
    pub fn other_commitments(
        &self,
        member: MemberId,
        funding: ResourceTypeId,
        excluding: NodeId,
    ) -> Result<i64, DomainError> {
        self.memberships
            .cards_of(member)
            .filter(|card| card.node != excluding)
            .filter(|card| self.funding_type(card.node).ok() == Some(funding))
            .filter_map(|card| self.memberships.get(card.membership))
            .try_fold(0i64, |sum, m| {
                sum.checked_add(m.monthly_fee)
                    .ok_or(DomainError::BalanceOverflow {
                        owner: Owner::Member(member),
                        resource: funding,
                    })
            })
    }

    /// Check that `member` can afford and sustain `membership`, then pay it.
    ///
    /// On denial every failed check is reported and nothing changes.
    pub fn validate_and_admit(
        &mut self,
        member: MemberId,
        node: NodeId,
        membership: MembershipId,
        payment_id: Option<String>,
    ) -> Result<(), DomainError> {
        self.member(member)?;
        let terms = self.membership(membership)?.clone();
        if terms.node != node {
            return Err(DomainError::MembershipNotFound(membership));
        }
        if self.card(member, node).is_some() {
            return Err(DomainError::DuplicateMembership { member, node });
        }

        let funding = self.funding_type(node)?;
        let available = self.balance(Owner::Member(member), funding);
        let income = if self.is_root(node) {
            terms.monthly_gain
        } else {
            self.monthly_income(member)
        };
        let committed = terms
            .monthly_fee
            .checked_add(self.other_commitments(member, funding, node)?)
            .ok_or(DomainError::BalanceOverflow {
                owner: Owner::Member(member),
                resource: funding,
            })?;

        let mut reasons = Vec::new();
        if available < terms.monthly_fee {
            reasons.push(DenialReason::InsufficientFunds {
                available,
                required: terms.monthly_fee,
            });
        }
        if income < committed {
            reasons.push(DenialReason::InsufficientEngagement { income, committed });
        }
        if !reasons.is_empty() {
            debug!(member = %member, node = %node, ?reasons, "admission denied");
            return Err(DomainError::AdmissionDenied(reasons));
        }

        self.ledgers.transfer(
            Owner::Member(member),
            Owner::Node(node),
            funding,
            terms.monthly_fee,
        )?;
        self.memberships.issue_card(MembershipCard {
            member,
            node,
            membership,
            payment_id,
        })?;
        info!(member = %member, node = %node, fee = terms.monthly_fee, "membership admitted");
        Ok(())
    }

    // ============================================================
    // Roles
    // ============================================================

    pub fn members_with_role(&self, node: NodeId, role: Role) -> BTreeSet<MemberId> {
        self.roles.members_with_role(node, role)
    }

    pub fn has_role(&self, node: NodeId, member: MemberId, role: Role) -> bool {
        self.roles.has_role(node, member, role)
    }

    pub fn roles_of(&self, node: NodeId, member: MemberId) -> Vec<Role> {
        self.roles.roles_of(node, member)
    }

    pub fn all_caretakers_are_members(&self, node: NodeId) -> bool {
        self.roles.all_caretakers_are_members(node)
    }

    /// A node accepts members once it offers a membership, its caretakers are
    /// members and it has its own resource.
    pub fn can_accept_members(&self, node: NodeId) -> bool {
        self.memberships.has_template(node)
            && self.all_caretakers_are_members(node)
            && self
                .tree
                .get(node)
                .map(|n| n.resource_type.is_some())
                .unwrap_or(false)
    }

    /// Take off every role `member` wears on `node`.
    pub fn cancel_membership(&mut self, node: NodeId, member: MemberId) -> Result<usize, DomainError> {
        self.node(node)?;
        Ok(self.roles.revoke_all(node, member))
    }

    fn role_assignment(
        &self,
        node: NodeId,
        member: MemberId,
        role: Role,
    ) -> Result<RoleAssignment, DomainError> {
        self.member(member)?;
        Ok(RoleAssignment { node, member, role })
    }

    // ============================================================
    // Node lifecycle
    // ============================================================

    /// Create a child of `parent` with `founder` as caretaker.
    ///
    /// All records are staged first and only installed once every step has
    /// succeeded, so a failure leaves no trace of the new node.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        params: &NodeParams,
        founder: MemberId,
    ) -> Result<NodeId, DomainError> {
        self.node(parent)?;
        let id = NodeId::generate();
        if let Some(mother) = params.mother.filter(|mother| *mother != parent) {
            return Err(DomainError::InvalidHierarchy(format!(
                "requested parent {} differs from {}",
                mother, parent
            )));
        }

        let slug = valid_slug(&params.name)?;
        if self.node_by_slug(&slug).is_some() {
            return Err(DomainError::DuplicateSlug(slug));
        }

        let resource = match params.resource_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                if self.resource_type_by_name(name).is_ok() {
                    return Err(DomainError::DuplicateResourceType(name.to_string()));
                }
                Some(ResourceType {
                    id: ResourceTypeId::generate(),
                    name: name.to_string(),
                    scope: ResourceScope::Node(id),
                })
            }
            _ => None,
        };

        let memberships = params
            .memberships
            .iter()
            .map(|t| build_membership(id, &t.name, t.monthly_fee, t.monthly_gain))
            .collect::<Result<Vec<_>, _>>()?;

        let node = Node {
            id,
            name: params.name.trim().to_string(),
            slug,
            description: params.description.clone(),
            video_url: params.video_url.clone(),
            manifested: false,
            growing: false,
            mother: Some(parent),
            monthly_fruit_basis: params.monthly_fruit_basis.unwrap_or(100),
            max_members: params.max_members.unwrap_or(1000),
            resource_type: resource.as_ref().map(|r| r.id),
        };

        let caretaker = self.role_assignment(id, founder, Role::Caretaker)?;

        // Install
        if !self.tree.insert_node(node) {
            return Err(DomainError::InvalidHierarchy(format!(
                "cannot attach node {} below {}",
                id, parent
            )));
        }
        self.ledgers.open(Owner::Node(id));
        if let Some(resource) = resource {
            self.resource_types.insert(resource.id, resource);
        }
        for membership in memberships {
            self.memberships.define(membership);
        }
        self.roles
            .assign(caretaker.node, caretaker.member, caretaker.role);

        info!(node = %id, parent = %parent, founder = %founder, "created child node");
        Ok(id)
    }

    /// Make `member` a member of `node`: role, production capacity and balance slot.
    pub fn admit_member(&mut self, node: NodeId, member: MemberId) -> Result<(), DomainError> {
        let record = self.node(node)?;
        let resource = record
            .resource_type
            .ok_or(DomainError::MissingResourceType(node))?;
        let basis = record.monthly_fruit_basis;
        let max = record.max_members;
        let assignment = self.role_assignment(node, member, Role::Member)?;

        let already = self.has_role(node, member, Role::Member);
        if !already && self.members_with_role(node, Role::Member).len() >= max {
            return Err(DomainError::NodeFull { node, max });
        }

        self.roles
            .assign(assignment.node, assignment.member, assignment.role);
        self.capacities
            .entry((member, resource))
            .or_insert(ProductionCapacity {
                owner: member,
                resource,
                monthly_yield: basis,
            });
        self.ledgers.ensure_slot(Owner::Member(member), resource);
        info!(node = %node, member = %member, "admitted member");
        Ok(())
    }

    /// Remove `member` from `node`: roles and the node's production capacity.
    ///
    /// Membership cards stay as historical records.
    pub fn remove_member(&mut self, node: NodeId, member: MemberId) -> Result<(), DomainError> {
        let resource = self.node(node)?.resource_type;
        self.member(member)?;
        self.roles.revoke_all(node, member);
        if let Some(resource) = resource {
            self.capacities.remove(&(member, resource));
        }
        info!(node = %node, member = %member, "removed member");
        Ok(())
    }

    /// Give a production capacity to every member of `node` lacking one.
    pub fn ensure_capacities(&mut self, node: NodeId) -> Result<Vec<MemberId>, DomainError> {
        let resource = self.own_resource(node)?;
        let basis = self.node(node)?.monthly_fruit_basis;
        let mut granted = Vec::new();
        for member in self.members_with_role(node, Role::Member) {
            if !self.capacities.contains_key(&(member, resource)) {
                self.capacities.insert(
                    (member, resource),
                    ProductionCapacity {
                        owner: member,
                        resource,
                        monthly_yield: basis,
                    },
                );
                granted.push(member);
            }
        }
        Ok(granted)
    }

    pub fn set_status(
        &mut self,
        node: NodeId,
        manifested: bool,
        growing: bool,
    ) -> Result<Status, DomainError> {
        let record = self.tree.get_mut(node).ok_or(DomainError::NodeNotFound(node))?;
        record.manifested = manifested;
        record.growing = growing;
        Ok(record.status())
    }

    /// Destroy `node` with its descendants, their roles, ledgers and batch marks.
    pub fn destroy_node(&mut self, node: NodeId) -> Result<Vec<NodeId>, DomainError> {
        self.node(node)?;
        if self.is_root(node) {
            return Err(DomainError::InvalidHierarchy(
                "the root node cannot be destroyed".to_string(),
            ));
        }
        let removed: Vec<NodeId> = self
            .tree
            .remove_subtree(node)
            .into_iter()
            .map(|n| n.id)
            .collect();
        for id in &removed {
            self.roles.remove_node(*id);
            self.ledgers.close(Owner::Node(*id));
        }
        self.batches.retain(|mark| !removed.contains(&mark.node));
        info!(node = %node, count = removed.len(), "destroyed subtree");
        Ok(removed)
    }

    // ============================================================
    // Batches
    // ============================================================

    /// What each member of `node` is entitled to this harvest.
    ///
    /// Fails when a member-role holder has no membership or the node has no
    /// resource of its own.
    pub fn harvest_lines(&self, node: NodeId) -> Result<Vec<HarvestLine>, DomainError> {
        let resource = self.own_resource(node)?;
        self.members_with_role(node, Role::Member)
            .into_iter()
            .map(|member| -> Result<HarvestLine, DomainError> {
                let membership = self
                    .membership_for(member, node)
                    .ok_or(DomainError::MissingMembership { node, member })?;
                Ok(HarvestLine {
                    member,
                    capacity: self.capacity(member, resource).cloned(),
                    monthly_gain: membership.monthly_gain,
                })
            })
            .collect()
    }

    /// Pay out a planned harvest from the node treasury and mark the node-period.
    ///
    /// The plan is matched against the node as it is now. A member who left
    /// since planning gets nothing, a changed gain applies to the recorded
    /// production. A new member or a status other than TREE makes the whole
    /// plan outdated and nothing is paid.
    ///
    /// Returns the total credited.
    pub fn credit_harvest(
        &mut self,
        node: NodeId,
        period: Period,
        credits: &[HarvestCredit],
    ) -> Result<i64, DomainError> {
        let resource = self.own_resource(node)?;
        if self.status(node)? != Status::Tree {
            return Err(DomainError::HarvestOutdated(node));
        }
        let lines: BTreeMap<MemberId, HarvestLine> = self
            .harvest_lines(node)?
            .into_iter()
            .map(|line| (line.member, line))
            .collect();
        if lines
            .keys()
            .any(|member| !credits.iter().any(|c| c.member == *member))
        {
            return Err(DomainError::HarvestOutdated(node));
        }

        let mut total: i64 = 0;
        for credit in credits {
            let line = match lines.get(&credit.member) {
                Some(line) => line,
                None => {
                    debug!(node = %node, member = %credit.member, "left before harvest commit");
                    continue;
                }
            };
            let missing = line.missing(credit.produced);
            self.ledgers.transfer(
                Owner::Node(node),
                Owner::Member(credit.member),
                resource,
                missing,
            )?;
            total = total
                .checked_add(missing)
                .ok_or(DomainError::BalanceOverflow {
                    owner: Owner::Node(node),
                    resource,
                })?;
        }
        self.mark(node, period, BatchKind::Harvest);
        Ok(total)
    }

    pub fn mark(&mut self, node: NodeId, period: Period, kind: BatchKind) -> bool {
        self.batches.insert(BatchMark { node, period, kind })
    }

    pub fn capacities(&self) -> impl Iterator<Item = &ProductionCapacity> {
        self.capacities.values()
    }

    pub fn ledger(&self, owner: Owner) -> Option<&Ledger> {
        self.ledgers.get(owner)
    }
}

fn valid_slug(name: &str) -> Result<String, DomainError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    Ok(slug)
}

fn build_membership(
    node: NodeId,
    name: &str,
    monthly_fee: i64,
    monthly_gain: i64,
) -> Result<Membership, DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    for amount in [monthly_fee, monthly_gain] {
        if amount < 0 {
            return Err(DomainError::NegativeAmount(amount));
        }
    }
    Ok(Membership {
        id: MembershipId::generate(),
        node,
        name: name.trim().to_string(),
        monthly_fee,
        monthly_gain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> Genesis {
        Genesis {
            root_name: "Root".to_string(),
            base_resource: "fruit".to_string(),
            root_resource: "root fruit".to_string(),
            monthly_fruit_basis: 100,
            max_members: 10,
        }
    }

    #[test]
    fn test_genesis_rejects_same_name_for_both_resources() {
        let result = Orchard::genesis(&Genesis {
            root_resource: "fruit".to_string(),
            ..genesis()
        });
        assert!(matches!(result, Err(DomainError::DuplicateResourceType(_))));
    }

    #[test]
    fn test_funding_type_is_base_for_root_and_parent_resource_below() {
        let mut orchard = Orchard::genesis(&genesis()).unwrap();
        let root = orchard.root();
        let founder = orchard.register_member("Ada", None).unwrap();
        let params = NodeParams {
            resource_name: Some("child fruit".to_string()),
            ..NodeParams::named("Child")
        };
        let child = orchard.create_child(root, &params, founder).unwrap();
        let grandchild = orchard
            .create_child(child, &NodeParams::named("Grandchild"), founder)
            .unwrap();

        assert_eq!(orchard.funding_type(root).unwrap(), orchard.base_resource());
        assert_eq!(
            orchard.funding_type(child).unwrap(),
            orchard.own_resource(root).unwrap()
        );
        assert_eq!(
            orchard.funding_type(grandchild).unwrap(),
            orchard.own_resource(child).unwrap()
        );
    }

    #[test]
    fn test_funding_type_fails_when_parent_has_no_resource() {
        let mut orchard = Orchard::genesis(&genesis()).unwrap();
        let root = orchard.root();
        let founder = orchard.register_member("Ada", None).unwrap();
        let bare = orchard
            .create_child(root, &NodeParams::named("Bare"), founder)
            .unwrap();
        let below = orchard
            .create_child(bare, &NodeParams::named("Below"), founder)
            .unwrap();

        assert_eq!(
            orchard.funding_type(below),
            Err(DomainError::MissingResourceType(bare))
        );
    }

    #[test]
    fn test_harvest_line_missing_never_negative() {
        let line = HarvestLine {
            member: MemberId::generate(),
            capacity: None,
            monthly_gain: 100,
        };
        assert_eq!(line.missing(40), 60);
        assert_eq!(line.missing(140), 0);
    }

    /// Root in TREE status with `ada` holding a membership of the given gain.
    fn harvesting_root(gain: i64) -> (Orchard, NodeId, MemberId) {
        let mut orchard = Orchard::genesis(&genesis()).unwrap();
        let root = orchard.root();
        let ada = orchard.register_member("Ada", None).unwrap();
        let offer = orchard.define_membership(root, "citizen", 0, gain).unwrap();
        orchard.validate_and_admit(ada, root, offer, None).unwrap();
        orchard.admit_member(root, ada).unwrap();
        orchard.set_status(root, true, true).unwrap();
        (orchard, root, ada)
    }

    #[test]
    fn test_credit_harvest_marks_node_period() {
        let (mut orchard, root, ada) = harvesting_root(25);
        let period = Period::new(2026, 5).unwrap();

        let total = orchard
            .credit_harvest(
                root,
                period,
                &[HarvestCredit {
                    member: ada,
                    produced: 10,
                }],
            )
            .unwrap();

        assert_eq!(total, 15);
        assert!(orchard.is_marked(root, period, BatchKind::Harvest));
        assert!(!orchard.is_marked(root, period, BatchKind::Engagement));
        let own = orchard.own_resource(root).unwrap();
        assert_eq!(orchard.balance(Owner::Member(ada), own), 15);
    }

    #[test]
    fn test_credit_harvest_skips_member_who_left_after_planning() {
        let (mut orchard, root, ada) = harvesting_root(25);
        let period = Period::new(2026, 5).unwrap();
        let credits = [HarvestCredit {
            member: ada,
            produced: 0,
        }];
        orchard.remove_member(root, ada).unwrap();

        let total = orchard.credit_harvest(root, period, &credits).unwrap();

        assert_eq!(total, 0);
        let own = orchard.own_resource(root).unwrap();
        assert_eq!(orchard.balance(Owner::Member(ada), own), 0);
        assert!(orchard.is_marked(root, period, BatchKind::Harvest));
    }

    #[test]
    fn test_credit_harvest_rejects_plan_missing_a_newcomer() {
        let (mut orchard, root, _ada) = harvesting_root(25);
        let period = Period::new(2026, 5).unwrap();

        let result = orchard.credit_harvest(root, period, &[]);

        assert_eq!(result, Err(DomainError::HarvestOutdated(root)));
        assert!(!orchard.is_marked(root, period, BatchKind::Harvest));
    }

    #[test]
    fn test_credit_harvest_ignores_negative_production() {
        let (mut orchard, root, ada) = harvesting_root(25);
        let period = Period::new(2026, 5).unwrap();

        let total = orchard
            .credit_harvest(
                root,
                period,
                &[HarvestCredit {
                    member: ada,
                    produced: i64::MIN,
                }],
            )
            .unwrap();

        assert_eq!(total, 25);
    }

    #[test]
    fn test_commitments_beyond_range_deny_admission_without_payment() {
        let mut orchard = Orchard::genesis(&genesis()).unwrap();
        let root = orchard.root();
        let founder = orchard.register_member("Founder", None).unwrap();
        let ada = orchard.register_member("Ada", None).unwrap();
        let citizen = orchard.define_membership(root, "citizen", 0, i64::MAX).unwrap();
        orchard.validate_and_admit(ada, root, citizen, None).unwrap();
        let first = orchard
            .create_child(root, &NodeParams::named("First"), founder)
            .unwrap();
        let second = orchard
            .create_child(root, &NodeParams::named("Second"), founder)
            .unwrap();
        let first_offer = orchard.define_membership(first, "all", i64::MAX, 0).unwrap();
        let second_offer = orchard.define_membership(second, "all", i64::MAX, 0).unwrap();
        let funding = orchard.own_resource(root).unwrap();
        orchard
            .transfer(Owner::Node(root), Owner::Member(ada), funding, i64::MAX)
            .unwrap();
        orchard.validate_and_admit(ada, first, first_offer, None).unwrap();
        orchard
            .transfer(Owner::Node(root), Owner::Member(ada), funding, 1)
            .unwrap();

        let result = orchard.validate_and_admit(ada, second, second_offer, None);

        assert_eq!(
            result,
            Err(DomainError::BalanceOverflow {
                owner: Owner::Member(ada),
                resource: funding
            })
        );
        assert_eq!(orchard.balance(Owner::Member(ada), funding), 1);
        assert!(orchard.card(ada, second).is_none());
    }

    #[test]
    fn test_create_child_accepts_mother_equal_to_parent() {
        let mut orchard = Orchard::genesis(&genesis()).unwrap();
        let root = orchard.root();
        let founder = orchard.register_member("Ada", None).unwrap();
        let params = NodeParams {
            mother: Some(root),
            ..NodeParams::named("Child")
        };

        let child = orchard.create_child(root, &params, founder).unwrap();

        assert_eq!(orchard.node(child).unwrap().mother, Some(root));
    }
}
