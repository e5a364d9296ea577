use serde::{Deserialize, Serialize};
use uuid::Uuid;

use promostock_core::{AggregateId, TenantId};

/// Tenant and stream metadata around an event payload.
///
/// `sequence_number` is the 1-based position in the aggregate stream and is
/// what projections use to drop duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Re-wrap a different payload under the same metadata (typed decode of a JSON envelope).
    pub fn map_payload<F>(self, f: impl FnOnce(E) -> F) -> EventEnvelope<F> {
        EventEnvelope {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_payload_keeps_stream_metadata() {
        let tenant = TenantId::new();
        let agg = AggregateId::new();
        let env = EventEnvelope::new(Uuid::now_v7(), tenant, agg, "inventory.item", 7, 21u32);
        let id = env.event_id();

        let mapped = env.map_payload(|n| n.to_string());
        assert_eq!(mapped.event_id(), id);
        assert_eq!(mapped.tenant_id(), tenant);
        assert_eq!(mapped.aggregate_id(), agg);
        assert_eq!(mapped.aggregate_type(), "inventory.item");
        assert_eq!(mapped.sequence_number(), 7);
        assert_eq!(mapped.payload(), "21");
    }

    #[test]
    fn serializes_with_flat_metadata() {
        let env = EventEnvelope::new(
            Uuid::nil(),
            TenantId::from_uuid(Uuid::nil()),
            AggregateId::from_uuid(Uuid::nil()),
            "brands.brand",
            1,
            serde_json::json!({"name": "Acme"}),
        );
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["aggregate_type"], "brands.brand");
        assert_eq!(v["sequence_number"], 1);
        assert_eq!(v["payload"]["name"], "Acme");
    }
}
