//! Role tags worn by members on nodes.

use std::collections::BTreeSet;

use crate::domain::entities::{MemberId, NodeId, Role, RoleAssignment};

/// Set of role assignments. A (node, member, role) triple exists at most once.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    assignments: BTreeSet<RoleAssignment>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assignments(assignments: impl IntoIterator<Item = RoleAssignment>) -> Self {
        Self {
            assignments: assignments.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleAssignment> {
        self.assignments.iter()
    }

    /// Returns false when the member already wore that role.
    pub fn assign(&mut self, node: NodeId, member: MemberId, role: Role) -> bool {
        self.assignments.insert(RoleAssignment { node, member, role })
    }

    pub fn has_role(&self, node: NodeId, member: MemberId, role: Role) -> bool {
        self.assignments
            .contains(&RoleAssignment { node, member, role })
    }

    /// Members wearing `role` on `node`, in id order.
    pub fn members_with_role(&self, node: NodeId, role: Role) -> BTreeSet<MemberId> {
        self.assignments
            .iter()
            .filter(|a| a.node == node && a.role == role)
            .map(|a| a.member)
            .collect()
    }

    pub fn roles_of(&self, node: NodeId, member: MemberId) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|&role| self.has_role(node, member, role))
            .collect()
    }

    /// True iff every caretaker of `node` is also a member of it.
    pub fn all_caretakers_are_members(&self, node: NodeId) -> bool {
        let members = self.members_with_role(node, Role::Member);
        self.members_with_role(node, Role::Caretaker)
            .is_subset(&members)
    }

    /// Drop every role `member` wears on `node`. Returns how many were removed.
    pub fn revoke_all(&mut self, node: NodeId, member: MemberId) -> usize {
        let before = self.assignments.len();
        self.assignments
            .retain(|a| !(a.node == node && a.member == member));
        before - self.assignments.len()
    }

    /// Drop every assignment on `node`.
    pub fn remove_node(&mut self, node: NodeId) {
        self.assignments.retain(|a| a.node != node);
    }
}
