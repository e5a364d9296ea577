use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use promostock_core::TenantId;
use promostock_events::EventEnvelope;
use promostock_inventory::{InventoryItemId, SizeId};
use promostock_promoters::PromoterId;

use super::ProjectionError;
use super::cursor::StreamCursors;
use super::item_catalog::decode_inventory_event;
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Units a promoter currently holds, per `(item, size)`.
///
/// Entries that drop to zero are removed, so an empty map means the promoter
/// holds nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromoterInventory {
    pub promoter_id: Option<PromoterId>,
    lines: BTreeMap<(InventoryItemId, SizeId), u64>,
}

impl PromoterInventory {
    pub fn held(&self, item_id: InventoryItemId, size_id: SizeId) -> u64 {
        self.lines.get(&(item_id, size_id)).copied().unwrap_or(0)
    }

    pub fn lines(&self) -> impl Iterator<Item = (InventoryItemId, SizeId, u64)> + '_ {
        self.lines.iter().map(|(&(i, s), &q)| (i, s, q))
    }

    pub fn total_units(&self) -> u64 {
        self.lines.values().fold(0u64, |acc, q| acc.saturating_add(*q))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn add(&mut self, item_id: InventoryItemId, size_id: SizeId, delta: i64) {
        let key = (item_id, size_id);
        let current = self.lines.get(&key).copied().unwrap_or(0);
        let next = current.saturating_add_signed(delta);
        if next == 0 {
            self.lines.remove(&key);
        } else {
            self.lines.insert(key, next);
        }
    }
}

/// Derived per-promoter inventory built from stock movements.
#[derive(Debug)]
pub struct PromoterHoldings<S = InMemoryTenantStore<PromoterId, PromoterInventory>>
where
    S: TenantStore<PromoterId, PromoterInventory>,
{
    store: S,
    cursors: StreamCursors,
}

impl PromoterHoldings {
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantStore::new())
    }
}

impl<S> PromoterHoldings<S>
where
    S: TenantStore<PromoterId, PromoterInventory>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn inventory(&self, tenant_id: TenantId, promoter_id: PromoterId) -> PromoterInventory {
        self.store
            .get(tenant_id, &promoter_id)
            .unwrap_or_else(|| PromoterInventory {
                promoter_id: Some(promoter_id),
                ..PromoterInventory::default()
            })
    }

    pub fn holds_stock(&self, tenant_id: TenantId, promoter_id: PromoterId) -> bool {
        !self.inventory(tenant_id, promoter_id).is_empty()
    }

    /// Apply an item-stream envelope. Catalog events only advance the cursor.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let tenant_id = envelope.tenant_id();

        self.cursors.advance(
            tenant_id,
            envelope.aggregate_id(),
            envelope.sequence_number(),
            || {
                let event = decode_inventory_event(envelope)?;
                let Some(movement) = event.stock_movement() else {
                    return Ok(());
                };
                let Some(promoter_id) = movement.promoter_id else {
                    return Ok(());
                };
                let delta = movement.holdings_delta();
                if delta == 0 {
                    return Ok(());
                }

                self.store.update(tenant_id, promoter_id, &mut |current| {
                    let mut inv = current.unwrap_or_else(|| PromoterInventory {
                        promoter_id: Some(promoter_id),
                        ..PromoterInventory::default()
                    });
                    inv.add(movement.item_id, movement.size_id, delta);
                    Some(inv)
                });
                Ok(())
            },
        )
    }

    pub fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projections::test_support::ItemStream;

    #[test]
    fn tracks_take_outs_returns_and_burns() {
        let holdings = PromoterHoldings::in_memory();
        let t = TenantId::new();
        let mut item = ItemStream::new(t, "Cap", &[("S", 10), ("M", 10)]);
        let (p1, p2) = (ItemStream::promoter(), ItemStream::promoter());

        for env in [
            item.created(),
            item.take_out(0, 4, p1),
            item.take_out(1, 2, p1),
            item.take_out(0, 3, p2),
            item.returned(0, 1, 0, p1),
            item.burn(1, 2, p1),
        ] {
            holdings.apply_envelope(&env).unwrap();
        }

        let inv = holdings.inventory(t, p1);
        assert_eq!(inv.held(item.item_id, item.size_id(0)), 3);
        assert_eq!(inv.held(item.item_id, item.size_id(1)), 0);
        assert_eq!(inv.lines().count(), 1);
        assert_eq!(holdings.inventory(t, p2).total_units(), 3);
    }

    #[test]
    fn forced_return_only_clears_what_was_held() {
        let holdings = PromoterHoldings::in_memory();
        let t = TenantId::new();
        let mut item = ItemStream::new(t, "Cap", &[("S", 10)]);
        let p = ItemStream::promoter();

        for env in [item.created(), item.take_out(0, 2, p), item.returned(0, 5, 3, p)] {
            holdings.apply_envelope(&env).unwrap();
        }

        assert!(!holdings.holds_stock(t, p));
        assert!(holdings.inventory(t, p).is_empty());
    }
}
