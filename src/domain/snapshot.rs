//! Flat, serializable shape of an orchard.

use serde::{Deserialize, Serialize};

use crate::domain::builder::TreeBuilder;
use crate::domain::entities::{
    BatchMark, Ledger, Member, Membership, MembershipCard, Node, NodeId, ProductionCapacity,
    ResourceScope, ResourceType, ResourceTypeId, RoleAssignment,
};
use crate::domain::error::DomainError;
use crate::domain::ledger::LedgerBook;
use crate::domain::membership::MembershipRegistry;
use crate::domain::orchard::Orchard;
use crate::domain::roles::RoleRegistry;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub root: NodeId,
    pub base_resource: ResourceTypeId,
    /// Nodes in pre-order, so child order survives a round trip
    pub nodes: Vec<Node>,
    pub resource_types: Vec<ResourceType>,
    pub members: Vec<Member>,
    pub ledgers: Vec<Ledger>,
    pub roles: Vec<RoleAssignment>,
    pub memberships: Vec<Membership>,
    pub cards: Vec<MembershipCard>,
    pub capacities: Vec<ProductionCapacity>,
    #[serde(default)]
    pub batches: Vec<BatchMark>,
}

impl From<&Orchard> for Snapshot {
    fn from(orchard: &Orchard) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            root: orchard.root,
            base_resource: orchard.base_resource,
            nodes: orchard.nodes().cloned().collect(),
            resource_types: orchard.resource_types.values().cloned().collect(),
            members: orchard.members.values().cloned().collect(),
            ledgers: orchard.ledgers.iter().cloned().collect(),
            roles: orchard.roles.iter().copied().collect(),
            memberships: orchard.memberships.memberships().cloned().collect(),
            cards: orchard.memberships.cards().cloned().collect(),
            capacities: orchard.capacities.values().cloned().collect(),
            batches: orchard.batches.iter().copied().collect(),
        }
    }
}

impl TryFrom<Snapshot> for Orchard {
    type Error = DomainError;

    /// Rebuild and validate an orchard from its flat records.
    fn try_from(snapshot: Snapshot) -> Result<Self, Self::Error> {
        let tree = TreeBuilder::new().build(snapshot.nodes)?;
        if tree.root() != Some(snapshot.root) {
            return Err(DomainError::InvalidHierarchy(format!(
                "snapshot root {} is not the root of the hierarchy",
                snapshot.root
            )));
        }

        let base_is_global = snapshot
            .resource_types
            .iter()
            .any(|rt| rt.id == snapshot.base_resource && rt.scope == ResourceScope::Global);
        if !base_is_global {
            return Err(DomainError::ResourceTypeNotFound(
                snapshot.base_resource.to_string(),
            ));
        }

        Ok(Orchard {
            tree,
            root: snapshot.root,
            base_resource: snapshot.base_resource,
            resource_types: snapshot
                .resource_types
                .into_iter()
                .map(|rt| (rt.id, rt))
                .collect(),
            members: snapshot.members.into_iter().map(|m| (m.id, m)).collect(),
            ledgers: LedgerBook::from_ledgers(snapshot.ledgers),
            roles: RoleRegistry::from_assignments(snapshot.roles),
            memberships: MembershipRegistry::from_records(snapshot.memberships, snapshot.cards),
            capacities: snapshot
                .capacities
                .into_iter()
                .map(|c| ((c.owner, c.resource), c))
                .collect(),
            batches: snapshot.batches.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NodeParams;
    use crate::domain::orchard::Genesis;

    fn genesis() -> Genesis {
        Genesis {
            root_name: "New Circle Movement".to_string(),
            base_resource: "fruit".to_string(),
            root_resource: "circle fruit".to_string(),
            monthly_fruit_basis: 100,
            max_members: 1000,
        }
    }

    #[test]
    fn test_round_trip_keeps_hierarchy_and_child_order() {
        let mut orchard = Orchard::genesis(&genesis()).unwrap();
        let founder = orchard.register_member("Ada", None).unwrap();
        let root = orchard.root();
        let first = orchard
            .create_child(root, &NodeParams::named("First"), founder)
            .unwrap();
        let second = orchard
            .create_child(root, &NodeParams::named("Second"), founder)
            .unwrap();

        let snapshot = Snapshot::from(&orchard);
        let restored = Orchard::try_from(snapshot.clone()).unwrap();

        assert_eq!(restored.tree().children(root), vec![first, second]);
        assert_eq!(Snapshot::from(&restored), snapshot);
    }

    #[test]
    fn test_self_parented_node_is_rejected() {
        let orchard = Orchard::genesis(&genesis()).unwrap();
        let mut snapshot = Snapshot::from(&orchard);
        let root = snapshot.root;
        snapshot.nodes[0].mother = Some(root);

        let err = Orchard::try_from(snapshot).unwrap_err();
        assert!(matches!(err, DomainError::InvalidHierarchy(_)));
    }
}
