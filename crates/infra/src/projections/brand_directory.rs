use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use promostock_brands::{Brand, BrandEvent, BrandId};
use promostock_core::{Aggregate, TenantId};
use promostock_events::{Event, EventEnvelope};

use super::ProjectionError;
use super::cursor::StreamCursors;
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Current state of one brand as seen by queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandRecord {
    pub state: Brand,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BrandRecord {
    pub fn brand_id(&self) -> BrandId {
        self.state.id_typed()
    }
}

/// Brand list read model. Deleted brands stay in the store as tombstones but
/// are never returned.
#[derive(Debug)]
pub struct BrandDirectory<S = InMemoryTenantStore<BrandId, BrandRecord>>
where
    S: TenantStore<BrandId, BrandRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl BrandDirectory {
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantStore::new())
    }
}

impl<S> BrandDirectory<S>
where
    S: TenantStore<BrandId, BrandRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, brand_id: BrandId) -> Option<BrandRecord> {
        self.store
            .get(tenant_id, &brand_id)
            .filter(|r| !r.state.is_deleted())
    }

    /// Pinned first, then active, then by name (case-insensitive).
    pub fn list(&self, tenant_id: TenantId, include_inactive: bool) -> Vec<BrandRecord> {
        let mut brands: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| !r.state.is_deleted())
            .filter(|r| include_inactive || r.state.is_active())
            .collect();

        brands.sort_by(|a, b| {
            b.state
                .is_pinned()
                .cmp(&a.state.is_pinned())
                .then(b.state.is_active().cmp(&a.state.is_active()))
                .then_with(|| {
                    a.state
                        .name()
                        .to_lowercase()
                        .cmp(&b.state.name().to_lowercase())
                })
        });
        brands
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event: BrandEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                if event.tenant_id() != tenant_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event tenant_id does not match envelope tenant_id".to_string(),
                    ));
                }
                let brand_id = event.brand_id();
                if brand_id.0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event brand_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                let at = event.occurred_at();
                self.store.update(tenant_id, brand_id, &mut |current| {
                    let mut record = current.unwrap_or_else(|| BrandRecord {
                        state: Brand::empty(brand_id),
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
