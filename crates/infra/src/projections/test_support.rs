//! Envelope builders shared by projection tests.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use promostock_brands::BrandId;
use promostock_core::{AggregateId, TenantId, UserId};
use promostock_events::EventEnvelope;
use promostock_inventory::{
    InventoryEvent, InventoryItemId, ItemCreated, ItemDeleted, ItemLinkedToBrand,
    ItemUnlinkedFromBrand, SizeId, SizeSpec, StockBurned, StockRestocked, StockReturned,
    StockTakenOut,
};
use promostock_promoters::{ContactDetails, PromoterCreated, PromoterEvent, PromoterId};

pub(crate) fn envelope<E: Serialize>(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    seq: u64,
    event: &E,
) -> EventEnvelope<JsonValue> {
    EventEnvelope::new(
        Uuid::now_v7(),
        tenant_id,
        aggregate_id,
        aggregate_type.to_string(),
        seq,
        serde_json::to_value(event).unwrap(),
    )
}

pub(crate) struct ItemStream {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub employee_id: UserId,
    pub name: String,
    pub product_id: String,
    pub sizes: Vec<SizeSpec>,
    /// Timestamp of the next event; each event moves it one minute on.
    pub clock: DateTime<Utc>,
    seq: u64,
}

impl ItemStream {
    pub fn new(tenant_id: TenantId, name: &str, sizes: &[(&str, u64)]) -> Self {
        Self {
            tenant_id,
            item_id: InventoryItemId::new(AggregateId::new()),
            brand_id: BrandId::new(AggregateId::new()),
            employee_id: UserId::new(),
            name: name.to_string(),
            product_id: format!("SKU-{}", Uuid::now_v7().simple()),
            sizes: sizes
                .iter()
                .map(|(label, quantity)| SizeSpec {
                    size_id: SizeId::new(),
                    label: label.to_string(),
                    quantity: *quantity,
                })
                .collect(),
            clock: Utc::now() - Duration::days(1),
            seq: 0,
        }
    }

    pub fn promoter() -> PromoterId {
        PromoterId::new(AggregateId::new())
    }

    pub fn size_id(&self, idx: usize) -> SizeId {
        self.sizes[idx].size_id
    }

    fn tick(&mut self) -> DateTime<Utc> {
        let at = self.clock;
        self.clock += Duration::minutes(1);
        at
    }

    fn next(&mut self, event: InventoryEvent) -> EventEnvelope<JsonValue> {
        self.seq += 1;
        envelope(
            self.tenant_id,
            self.item_id.0,
            promostock_inventory::AGGREGATE_TYPE,
            self.seq,
            &event,
        )
    }

    pub fn created(&mut self) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::ItemCreated(ItemCreated {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            brand_id: self.brand_id,
            name: self.name.clone(),
            product_id: self.product_id.clone(),
            image_url: None,
            sizes: self.sizes.clone(),
            occurred_at,
        });
        self.next(event)
    }

    pub fn take_out(&mut self, size: usize, quantity: u64, promoter_id: PromoterId) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::StockTakenOut(StockTakenOut {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            size_id: self.size_id(size),
            quantity,
            promoter_id,
            employee_id: self.employee_id,
            notes: None,
            occurred_at,
        });
        self.next(event)
    }

    pub fn returned(
        &mut self,
        size: usize,
        quantity: u64,
        unaccounted_quantity: u64,
        promoter_id: PromoterId,
    ) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::StockReturned(StockReturned {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            size_id: self.size_id(size),
            quantity,
            unaccounted_quantity,
            promoter_id,
            employee_id: self.employee_id,
            notes: None,
            occurred_at,
        });
        self.next(event)
    }

    pub fn burn(&mut self, size: usize, quantity: u64, promoter_id: PromoterId) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::StockBurned(StockBurned {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            size_id: self.size_id(size),
            quantity,
            promoter_id,
            employee_id: self.employee_id,
            notes: Some("lost at event".to_string()),
            occurred_at,
        });
        self.next(event)
    }

    pub fn restock(&mut self, size: usize, quantity: u64) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::StockRestocked(StockRestocked {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            size_id: self.size_id(size),
            quantity,
            employee_id: self.employee_id,
            notes: None,
            occurred_at,
        });
        self.next(event)
    }

    pub fn link(&mut self, brand_id: BrandId) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::ItemLinkedToBrand(ItemLinkedToBrand {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            brand_id,
            occurred_at,
        });
        self.next(event)
    }

    pub fn unlink(&mut self, brand_id: BrandId) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::ItemUnlinkedFromBrand(ItemUnlinkedFromBrand {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            brand_id,
            occurred_at,
        });
        self.next(event)
    }

    pub fn deleted(&mut self) -> EventEnvelope<JsonValue> {
        let occurred_at = self.tick();
        let event = InventoryEvent::ItemDeleted(ItemDeleted {
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            occurred_at,
        });
        self.next(event)
    }
}

pub(crate) fn promoter_created(
    tenant_id: TenantId,
    promoter_id: PromoterId,
    name: &str,
) -> EventEnvelope<JsonValue> {
    envelope(
        tenant_id,
        promoter_id.0,
        promostock_promoters::AGGREGATE_TYPE,
        1,
        &PromoterEvent::PromoterCreated(PromoterCreated {
            tenant_id,
            promoter_id,
            name: name.to_string(),
            contact: ContactDetails::default(),
            occurred_at: Utc::now(),
        }),
    )
}
