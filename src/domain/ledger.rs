//! Resource ledgers and the transfer primitive.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::entities::{Ledger, Owner, ResourceTypeId};
use crate::domain::error::DomainError;

/// All ledgers, keyed by owner.
#[derive(Debug, Clone, Default)]
pub struct LedgerBook {
    ledgers: BTreeMap<Owner, Ledger>,
}

impl LedgerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ledgers(ledgers: impl IntoIterator<Item = Ledger>) -> Self {
        Self {
            ledgers: ledgers.into_iter().map(|l| (l.owner, l)).collect(),
        }
    }

    /// Create an empty ledger for `owner` if it has none.
    pub fn open(&mut self, owner: Owner) -> &mut Ledger {
        self.ledgers
            .entry(owner)
            .or_insert_with(|| Ledger::new(owner))
    }

    pub fn close(&mut self, owner: Owner) -> Option<Ledger> {
        self.ledgers.remove(&owner)
    }

    pub fn get(&self, owner: Owner) -> Option<&Ledger> {
        self.ledgers.get(&owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ledger> {
        self.ledgers.values()
    }

    /// Balance of `owner` in `resource`, 0 when there is no slot.
    pub fn balance(&self, owner: Owner, resource: ResourceTypeId) -> i64 {
        self.ledgers
            .get(&owner)
            .map(|l| l.balance(resource))
            .unwrap_or(0)
    }

    /// Make sure a balance slot exists for `owner` in `resource`.
    pub fn ensure_slot(&mut self, owner: Owner, resource: ResourceTypeId) {
        self.open(owner).balances.entry(resource).or_insert(0);
    }

    /// Move `amount` of `resource` from one ledger to another.
    ///
    /// Either both balances change or neither does. Member ledgers may not go
    /// negative; node treasuries may, down to `i64::MIN`.
    pub fn transfer(
        &mut self,
        from: Owner,
        to: Owner,
        resource: ResourceTypeId,
        amount: i64,
    ) -> Result<(), DomainError> {
        if amount < 0 {
            return Err(DomainError::NegativeAmount(amount));
        }

        let overflow = |owner: Owner| DomainError::BalanceOverflow { owner, resource };
        let available = self.balance(from, resource);
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| overflow(from))?;
        if remaining < 0 && !from.may_overdraw() {
            return Err(DomainError::InsufficientBalance {
                owner: from,
                resource,
                available,
                requested: amount,
            });
        }
        let receiving = if from == to {
            remaining
        } else {
            self.balance(to, resource)
        };
        let received = receiving.checked_add(amount).ok_or_else(|| overflow(to))?;

        if remaining < 0 {
            warn!(
                owner = %from,
                balance = remaining,
                "treasury overdrawn"
            );
        }
        self.open(from).balances.insert(resource, remaining);
        self.open(to).balances.insert(resource, received);
        debug!(from = %from, to = %to, amount, "transfer");
        Ok(())
    }

    /// Sum of `resource` over every ledger.
    pub fn total_supply(&self, resource: ResourceTypeId) -> i128 {
        self.ledgers
            .values()
            .map(|l| i128::from(l.balance(resource)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{MemberId, NodeId};

    fn setup() -> (LedgerBook, Owner, Owner, ResourceTypeId) {
        let mut book = LedgerBook::new();
        let node = Owner::Node(NodeId::generate());
        let member = Owner::Member(MemberId::generate());
        let fruit = ResourceTypeId::generate();
        book.open(node);
        book.open(member);
        (book, node, member, fruit)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let (mut book, node, member, fruit) = setup();
        book.transfer(node, member, fruit, 40).unwrap();
        book.transfer(member, node, fruit, 15).unwrap();
        assert_eq!(book.balance(member, fruit), 25);
        assert_eq!(book.balance(node, fruit), -25);
        assert_eq!(book.total_supply(fruit), 0);
    }

    #[test]
    fn test_member_cannot_overdraw() {
        let (mut book, node, member, fruit) = setup();
        book.transfer(node, member, fruit, 10).unwrap();
        let err = book.transfer(member, node, fruit, 11).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientBalance {
                available: 10,
                requested: 11,
                ..
            }
        ));
        assert_eq!(book.balance(member, fruit), 10);
        assert_eq!(book.balance(node, fruit), -10);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let (mut book, node, member, fruit) = setup();
        assert_eq!(
            book.transfer(node, member, fruit, -1),
            Err(DomainError::NegativeAmount(-1))
        );
    }

    #[test]
    fn test_missing_slot_reads_zero() {
        let (mut book, _, member, fruit) = setup();
        assert_eq!(book.balance(member, fruit), 0);
        book.ensure_slot(member, fruit);
        assert_eq!(book.get(member).unwrap().balances.get(&fruit), Some(&0));
    }

    #[test]
    fn test_overdrawn_treasury_stops_at_range_limit() {
        let (mut book, node, member, fruit) = setup();
        let other = Owner::Member(MemberId::generate());
        book.transfer(node, member, fruit, i64::MAX).unwrap();

        let err = book.transfer(node, other, fruit, i64::MAX).unwrap_err();

        assert_eq!(
            err,
            DomainError::BalanceOverflow {
                owner: node,
                resource: fruit
            }
        );
        assert_eq!(book.balance(node, fruit), -i64::MAX);
        assert_eq!(book.balance(other, fruit), 0);
        assert_eq!(book.total_supply(fruit), 0);
    }

    #[test]
    fn test_full_recipient_is_not_credited() {
        let (mut book, node, member, fruit) = setup();
        book.transfer(node, member, fruit, i64::MAX).unwrap();
        let other = Owner::Node(NodeId::generate());

        let err = book.transfer(other, member, fruit, 1).unwrap_err();

        assert!(matches!(err, DomainError::BalanceOverflow { owner, .. } if owner == member));
        assert_eq!(book.balance(other, fruit), 0);
        assert_eq!(book.balance(member, fruit), i64::MAX);
    }

    #[test]
    fn test_transfer_to_self_keeps_balance() {
        let (mut book, node, member, fruit) = setup();
        book.transfer(node, member, fruit, 10).unwrap();
        book.transfer(member, member, fruit, 10).unwrap();
        assert_eq!(book.balance(member, fruit), 10);
    }
}
