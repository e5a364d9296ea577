use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use promostock_brands::BrandId;
use promostock_core::{Aggregate, TenantId};
use promostock_events::{Event, EventEnvelope};
use promostock_inventory::{InventoryEvent, InventoryItem, InventoryItemId, ItemSize};

use super::ProjectionError;
use super::cursor::StreamCursors;
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Upper bound of results returned by [`ItemCatalog::search`].
pub const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub state: InventoryItem,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unit counters summed over every size of an item.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemTotals {
    pub original: u64,
    pub available: u64,
    pub in_circulation: u64,
    pub burned: u64,
}

impl ItemTotals {
    pub fn of(item: &InventoryItem) -> Self {
        item.sizes()
            .iter()
            .fold(ItemTotals::default(), |acc, s: &ItemSize| ItemTotals {
                original: acc.original.saturating_add(s.original_quantity()),
                available: acc.available.saturating_add(s.available_quantity()),
                in_circulation: acc.in_circulation.saturating_add(s.in_circulation()),
                burned: acc.burned.saturating_add(s.burned_quantity()),
            })
    }
}

impl ItemRecord {
    pub fn item_id(&self) -> InventoryItemId {
        self.state.id_typed()
    }

    pub fn totals(&self) -> ItemTotals {
        ItemTotals::of(&self.state)
    }

    /// Whether the item shows up under `brand_id`, as owner or through a link.
    pub fn belongs_to(&self, brand_id: BrandId) -> bool {
        self.state.brand_id() == Some(brand_id) || self.state.linked_brands().any(|b| b == brand_id)
    }

    fn matches(&self, needle: &str) -> bool {
        self.state.name().to_lowercase().contains(needle)
            || self.state.product_id().to_lowercase().contains(needle)
    }
}

/// An item as listed under one brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandItem {
    pub record: ItemRecord,
    /// Linked into the brand rather than owned by it.
    pub is_shared_instance: bool,
}

/// Item read model holding the folded aggregate state of every item.
#[derive(Debug)]
pub struct ItemCatalog<S = InMemoryTenantStore<InventoryItemId, ItemRecord>>
where
    S: TenantStore<InventoryItemId, ItemRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl ItemCatalog {
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantStore::new())
    }
}

impl<S> ItemCatalog<S>
where
    S: TenantStore<InventoryItemId, ItemRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Option<ItemRecord> {
        self.get_including_deleted(tenant_id, item_id)
            .filter(|r| !r.state.is_deleted())
    }

    /// Deleted items are still needed to label historical transactions.
    pub fn get_including_deleted(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Option<ItemRecord> {
        self.store.get(tenant_id, &item_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ItemRecord> {
        let mut items: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| !r.state.is_deleted())
            .collect();
        sort_by_name(&mut items, |r| r);
        items
    }

    /// Owned and linked items of a brand, by name.
    pub fn items_for_brand(&self, tenant_id: TenantId, brand_id: BrandId) -> Vec<BrandItem> {
        let mut items: Vec<_> = self
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.belongs_to(brand_id))
            .map(|record| BrandItem {
                is_shared_instance: record.state.brand_id() != Some(brand_id),
                record,
            })
            .collect();
        sort_by_name(&mut items, |i| &i.record);
        items
    }

    pub fn count_for_brand(&self, tenant_id: TenantId, brand_id: BrandId) -> usize {
        self.store
            .list(tenant_id)
            .iter()
            .filter(|r| !r.state.is_deleted() && r.belongs_to(brand_id))
            .count()
    }

    /// Case-insensitive match on name or product id; at most `limit` results.
    pub fn search(&self, tenant_id: TenantId, query: &str, limit: usize) -> Vec<ItemRecord> {
        let needle = query.trim().to_lowercase();
        self.list(tenant_id)
            .into_iter()
            .filter(|r| needle.is_empty() || r.matches(&needle))
            .take(limit.min(SEARCH_LIMIT))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event = decode_inventory_event(envelope)?;
                let item_id = event.item_id();
                let at = event.occurred_at();

                self.store.update(tenant_id, item_id, &mut |current| {
                    let mut record = current.unwrap_or_else(|| ItemRecord {
                        state: InventoryItem::empty(item_id),
                        created_at: at,
                        updated_at: at,
                    });
                    record.state.apply(&event);
                    record.updated_at = at;
                    Some(record)
                });
                Ok(())
            })
    }

    pub fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}

fn sort_by_name<T>(items: &mut [T], record: impl Fn(&T) -> &ItemRecord) {
    items.sort_by_cached_key(|i| record(i).state.name().to_lowercase());
}

/// Decode an inventory payload and check it belongs to the envelope's stream.
pub(crate) fn decode_inventory_event(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<InventoryEvent, ProjectionError> {
    let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    if event.tenant_id() != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if event.item_id().0 != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event item_id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(event)
}
