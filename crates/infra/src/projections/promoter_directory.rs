use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use promostock_core::{Aggregate, TenantId};
use promostock_events::{Event, EventEnvelope};
use promostock_promoters::{Promoter, PromoterEvent, PromoterId};

use super::ProjectionError;
use super::cursor::StreamCursors;
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoterRecord {
    pub state: Promoter,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromoterRecord {
    pub fn promoter_id(&self) -> PromoterId {
        self.state.id_typed()
    }
}

#[derive(Debug)]
pub struct PromoterDirectory<S = InMemoryTenantStore<PromoterId, PromoterRecord>>
where
    S: TenantStore<PromoterId, PromoterRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl PromoterDirectory {
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantStore::new())
    }
}

impl<S> PromoterDirectory<S>
where
    S: TenantStore<PromoterId, PromoterRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, promoter_id: PromoterId) -> Option<PromoterRecord> {
        self.get_including_deleted(tenant_id, promoter_id)
            .filter(|r| !r.state.is_deleted())
    }

    pub fn get_including_deleted(
        &self,
        tenant_id: TenantId,
        promoter_id: PromoterId,
    ) -> Option<PromoterRecord> {
        self.store.get(tenant_id, &promoter_id)
    }

    /// Active promoters first, then by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<PromoterRecord> {
        let mut promoters: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| !r.state.is_deleted())
            .collect();
        promoters.sort_by_cached_key(|r| (!r.state.is_active(), r.state.name().to_lowercase()));
        promoters
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event: PromoterEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                if event.tenant_id() != tenant_id || event.promoter_id().0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "promoter event does not belong to the envelope stream".to_string(),
                    ));
                }

                let promoter_id = event.promoter_id();
                let at = event.occurred_at();
                self.store.update(tenant_id, promoter_id, &mut |current| {
                    let mut record = current.unwrap_or_else(|| PromoterRecord {
                        state: Promoter::empty(promoter_id),
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
