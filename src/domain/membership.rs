//! Membership terms offered by nodes and the cards members hold.

use std::collections::BTreeMap;

use crate::domain::entities::{MemberId, Membership, MembershipCard, MembershipId, NodeId};
use crate::domain::error::DomainError;

/// Memberships by id plus cards keyed by (member, node).
///
/// The card key enforces at most one card per member and node.
#[derive(Debug, Clone, Default)]
pub struct MembershipRegistry {
    memberships: BTreeMap<MembershipId, Membership>,
    cards: BTreeMap<(MemberId, NodeId), MembershipCard>,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        memberships: impl IntoIterator<Item = Membership>,
        cards: impl IntoIterator<Item = MembershipCard>,
    ) -> Self {
        Self {
            memberships: memberships.into_iter().map(|m| (m.id, m)).collect(),
            cards: cards.into_iter().map(|c| ((c.member, c.node), c)).collect(),
        }
    }

    pub fn memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships.values()
    }

    pub fn cards(&self) -> impl Iterator<Item = &MembershipCard> {
        self.cards.values()
    }

    pub fn define(&mut self, membership: Membership) {
        self.memberships.insert(membership.id, membership);
    }

    pub fn get(&self, id: MembershipId) -> Option<&Membership> {
        self.memberships.get(&id)
    }

    /// Memberships offered by `node`.
    pub fn offered_by(&self, node: NodeId) -> Vec<&Membership> {
        self.memberships
            .values()
            .filter(|m| m.node == node)
            .collect()
    }

    pub fn has_template(&self, node: NodeId) -> bool {
        self.memberships.values().any(|m| m.node == node)
    }

    pub fn card(&self, member: MemberId, node: NodeId) -> Option<&MembershipCard> {
        self.cards.get(&(member, node))
    }

    /// Cards held by `member`, in node order.
    pub fn cards_of(&self, member: MemberId) -> impl Iterator<Item = &MembershipCard> {
        self.cards
            .range((member, NodeId(uuid::Uuid::nil()))..)
            .take_while(move |((m, _), _)| *m == member)
            .map(|(_, card)| card)
    }

    /// The membership `member` holds on `node`, resolved through its card.
    pub fn membership_for(&self, member: MemberId, node: NodeId) -> Option<&Membership> {
        self.card(member, node)
            .and_then(|card| self.memberships.get(&card.membership))
    }

    /// Record a new card. Fails if the member already holds one for the node.
    pub fn issue_card(&mut self, card: MembershipCard) -> Result<(), DomainError> {
        let key = (card.member, card.node);
        if self.cards.contains_key(&key) {
            return Err(DomainError::DuplicateMembership {
                member: card.member,
                node: card.node,
            });
        }
        self.cards.insert(key, card);
        Ok(())
    }
}
