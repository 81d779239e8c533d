//! Balances and transfers by resource name

use std::sync::Arc;

use tracing::info;

use crate::application::store::OrchardStore;
use crate::application::ApplicationResult;
use crate::domain::{Orchard, Owner};

pub struct LedgerService {
    store: Arc<OrchardStore>,
}

impl LedgerService {
    pub fn new(store: Arc<OrchardStore>) -> Self {
        Self { store }
    }

    pub fn balance(&self, owner: Owner, resource: &str) -> ApplicationResult<i64> {
        self.store.read(|o| -> ApplicationResult<i64> {
            let rt = o.resource_type_by_name(resource)?.id;
            Ok(o.balance(owner, rt))
        })?
    }

    /// Every balance slot of `owner`, by resource name.
    pub fn balances(&self, owner: Owner) -> ApplicationResult<Vec<(String, i64)>> {
        self.store.read(|o| {
            o.ledger(owner)
                .map(|ledger| {
                    ledger
                        .balances
                        .iter()
                        .filter_map(|(rt, amount)| {
                            o.resource_type(*rt).map(|r| (r.name.clone(), *amount))
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    pub fn transfer(
        &self,
        from: Owner,
        to: Owner,
        resource: &str,
        amount: i64,
    ) -> ApplicationResult<()> {
        self.store.transaction(|o| {
            let rt = o.resource_type_by_name(resource)?.id;
            o.transfer(from, to, rt, amount)
        })?;
        info!(from = %from, to = %to, resource, amount, "transferred");
        Ok(())
    }

    /// Net amount of `resource` over all ledgers.
    pub fn total_supply(&self, resource: &str) -> ApplicationResult<i128> {
        self.store.read(|o| -> ApplicationResult<i128> {
            let rt = o.resource_type_by_name(resource)?.id;
            Ok(o.ledgers().total_supply(rt))
        })?
    }

    pub fn base_resource_name(&self) -> ApplicationResult<String> {
        self.store.read(|o: &Orchard| {
            o.resource_type(o.base_resource())
                .map(|r| r.name.clone())
                .unwrap_or_default()
        })
    }
}
