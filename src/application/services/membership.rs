//! Members, membership terms and admission

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::store::OrchardStore;
use crate::application::ApplicationResult;
use crate::domain::{Member, MemberId, Membership, MembershipId, NodeId, Role};

pub struct MembershipService {
    store: Arc<OrchardStore>,
}

impl MembershipService {
    pub fn new(store: Arc<OrchardStore>) -> Self {
        Self { store }
    }

    pub fn register_member(&self, name: &str, email: Option<String>) -> ApplicationResult<MemberId> {
        let id = self
            .store
            .transaction(|o| o.register_member(name, email))?;
        info!(member = %id, name, "member registered");
        Ok(id)
    }

    pub fn members(&self) -> ApplicationResult<Vec<Member>> {
        self.store.read(|o| o.members().cloned().collect())
    }

    /// Offer new membership terms on `node`.
    pub fn define(
        &self,
        node: NodeId,
        name: &str,
        monthly_fee: i64,
        monthly_gain: i64,
    ) -> ApplicationResult<MembershipId> {
        self.store
            .transaction(|o| o.define_membership(node, name, monthly_fee, monthly_gain))
    }

    pub fn offered(&self, node: NodeId) -> ApplicationResult<Vec<Membership>> {
        self.store.read(|o| -> ApplicationResult<Vec<Membership>> {
            o.node(node)?;
            Ok(o.memberships_offered(node).into_iter().cloned().collect())
        })?
    }

    /// Run the admission checks and, on success, pay the fee and issue the card.
    #[instrument(level = "debug", skip(self, payment_id))]
    pub fn validate_and_admit(
        &self,
        member: MemberId,
        node: NodeId,
        membership: MembershipId,
        payment_id: Option<String>,
    ) -> ApplicationResult<()> {
        self.store
            .transaction(|o| o.validate_and_admit(member, node, membership, payment_id))
    }

    /// Admission followed by the member role, as one unit.
    #[instrument(level = "debug", skip(self, payment_id))]
    pub fn join(
        &self,
        member: MemberId,
        node: NodeId,
        membership: MembershipId,
        payment_id: Option<String>,
    ) -> ApplicationResult<()> {
        self.store.transaction(|o| {
            o.validate_and_admit(member, node, membership, payment_id)?;
            o.admit_member(node, member)
        })
    }

    /// Drop every role `member` holds on `node`. The card is kept.
    pub fn cancel(&self, node: NodeId, member: MemberId) -> ApplicationResult<usize> {
        let revoked = self
            .store
            .transaction(|o| o.cancel_membership(node, member))?;
        info!(node = %node, member = %member, revoked, "membership cancelled");
        Ok(revoked)
    }

    pub fn membership_for(
        &self,
        member: MemberId,
        node: NodeId,
    ) -> ApplicationResult<Option<Membership>> {
        self.store
            .read(|o| o.membership_for(member, node).cloned())
    }

    pub fn can_accept_members(&self, node: NodeId) -> ApplicationResult<bool> {
        self.store.read(|o| o.can_accept_members(node))
    }

    pub fn members_with_role(
        &self,
        node: NodeId,
        role: Role,
    ) -> ApplicationResult<BTreeSet<MemberId>> {
        self.store.read(|o| o.members_with_role(node, role))
    }

    pub fn has_role(&self, node: NodeId, member: MemberId, role: Role) -> ApplicationResult<bool> {
        self.store.read(|o| o.has_role(node, member, role))
    }
}
