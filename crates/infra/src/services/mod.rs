//! Application services: command orchestration plus the cross-aggregate
//! checks that no single aggregate can make on its own (promoter activity on
//! take-out, holdings on promoter deactivation, remaining items on brand
//! deletion).
//!
//! Committed events are folded into the read models right away so a caller
//! reads its own writes. The bus worker delivers the same envelopes again;
//! per-stream cursors drop the duplicates.

mod brands;
mod items;
mod promoters;
mod stock;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use promostock_brands::{Brand, BrandCommand, BrandId};
use promostock_core::{AggregateRoot, TenantId};
use promostock_events::{EventEnvelope, InMemoryEventBus};
use promostock_inventory::{InventoryCommand, InventoryItem, InventoryItemId};
use promostock_promoters::{Promoter, PromoterCommand, PromoterId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{Pagination, ProjectionError, ProjectionSet, TransactionFilter, TransactionPage};

pub use brands::NewBrand;
pub use items::{NewItem, NewSize};
pub use promoters::NewPromoter;
pub use stock::{
    BatchAction, BatchFailure, BatchLine, BatchReport, BatchRequest, MovementOutcome,
    StockRequest,
};

pub type SharedEventStore = Arc<dyn EventStore>;
pub type SharedEventBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<SharedEventStore, SharedEventBus>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("promoter still holds {units} unit(s) of stock")]
    PromoterHoldsStock { units: u64 },

    #[error("promoter '{0}' is inactive")]
    PromoterInactive(String),

    #[error("brand still has {items} item(s)")]
    BrandHasItems { items: usize },

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl ServiceError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Dispatch(DispatchError::Validation(msg.into()))
    }

    pub(crate) fn not_found() -> Self {
        ServiceError::Dispatch(DispatchError::NotFound)
    }
}

impl From<promostock_core::DomainError> for ServiceError {
    fn from(value: promostock_core::DomainError) -> Self {
        ServiceError::Dispatch(value.into())
    }
}

/// Entry point of every operation of the service.
pub struct PromoStock {
    dispatcher: Dispatcher,
    projections: Arc<ProjectionSet>,
    max_page_size: usize,
}

impl std::fmt::Debug for PromoStock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromoStock")
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

impl PromoStock {
    pub fn new(store: SharedEventStore, bus: SharedEventBus, projections: Arc<ProjectionSet>) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            projections,
            max_page_size: crate::config::DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// In-memory store and bus with fresh read models.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(ProjectionSet::new()),
        )
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.dispatcher = self.dispatcher.with_max_retries(retries);
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn bus(&self) -> &SharedEventBus {
        self.dispatcher.bus()
    }

    pub fn projections(&self) -> &Arc<ProjectionSet> {
        &self.projections
    }

    /// Replay the whole event log into fresh read models.
    pub async fn rebuild_read_models(&self) -> Result<usize, ServiceError> {
        let events = self
            .dispatcher
            .store()
            .load_all()
            .await
            .map_err(DispatchError::from)?;
        let replayed = self
            .projections
            .rebuild(events.iter().map(StoredEvent::to_envelope))?;
        info!(events = replayed, "read models ready");
        Ok(replayed)
    }

    pub fn transaction_history(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> TransactionPage {
        let pagination = Pagination::new(page, page_size, self.max_page_size);
        self.projections.transaction_history(tenant_id, filter, pagination)
    }

    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(err) = self.projections.apply_envelope(&stored.to_envelope()) {
                // The bus worker delivers in commit order and fills the gap.
                debug!(error = %err, event_id = %stored.event_id, "deferred read model update");
            }
        }
    }

    async fn dispatch_brand(
        &self,
        tenant_id: TenantId,
        brand_id: BrandId,
        command: BrandCommand,
    ) -> Result<Brand, ServiceError> {
        let out = self
            .dispatcher
            .dispatch(tenant_id, brand_id.0, promostock_brands::AGGREGATE_TYPE, command, |_, id| {
                Brand::empty(BrandId::new(id))
            })
            .await?;
        self.project(&out.committed);
        Ok(out.state)
    }

    async fn dispatch_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        command: InventoryCommand,
    ) -> Result<Dispatched<InventoryItem>, ServiceError> {
        let out = self
            .dispatcher
            .dispatch(
                tenant_id,
                item_id.0,
                promostock_inventory::AGGREGATE_TYPE,
                command,
                |_, id| InventoryItem::empty(InventoryItemId::new(id)),
            )
            .await?;
        self.project(&out.committed);
        Ok(out)
    }

    async fn dispatch_promoter(
        &self,
        tenant_id: TenantId,
        promoter_id: PromoterId,
        command: PromoterCommand,
    ) -> Result<Promoter, ServiceError> {
        let out = self
            .dispatcher
            .dispatch(
                tenant_id,
                promoter_id.0,
                promostock_promoters::AGGREGATE_TYPE,
                command,
                |_, id| Promoter::empty(PromoterId::new(id)),
            )
            .await?;
        self.project(&out.committed);
        Ok(out.state)
    }

    /// Live (created, not deleted) brand straight from its stream.
    async fn live_brand(&self, tenant_id: TenantId, brand_id: BrandId) -> Result<Brand, ServiceError> {
        let brand = self
            .dispatcher
            .load(tenant_id, brand_id.0, |_, id| Brand::empty(BrandId::new(id)))
            .await?;
        if brand.version() == 0 || brand.is_deleted() {
            return Err(ServiceError::not_found());
        }
        Ok(brand)
    }

    async fn live_promoter(
        &self,
        tenant_id: TenantId,
        promoter_id: PromoterId,
    ) -> Result<Promoter, ServiceError> {
        let promoter = self
            .dispatcher
            .load(tenant_id, promoter_id.0, |_, id| Promoter::empty(PromoterId::new(id)))
            .await?;
        if promoter.version() == 0 || promoter.is_deleted() {
            return Err(ServiceError::not_found());
        }
        Ok(promoter)
    }

    async fn live_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<InventoryItem, ServiceError> {
        let item = self
            .dispatcher
            .load(tenant_id, item_id.0, |_, id| InventoryItem::empty(InventoryItemId::new(id)))
            .await?;
        if item.version() == 0 || item.is_deleted() {
            return Err(ServiceError::not_found());
        }
        Ok(item)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use promostock_core::UserId;
    use promostock_inventory::SizeId;

    pub(crate) struct World {
        pub svc: PromoStock,
        pub tenant_id: TenantId,
        pub employee: UserId,
        pub brand: BrandId,
    }

    pub(crate) async fn world() -> World {
        let svc = PromoStock::in_memory();
        let tenant_id = TenantId::new();
        let brand = svc
            .create_brand(
                tenant_id,
                NewBrand {
                    name: "Acme".to_string(),
                    logo_url: None,
                },
            )
            .await
            .unwrap()
            .id_typed();
        World {
            svc,
            tenant_id,
            employee: UserId::new(),
            brand,
        }
    }

    impl World {
        pub async fn item(&self, name: &str, sizes: &[(&str, u64)]) -> (InventoryItemId, Vec<SizeId>) {
            let item = self
                .svc
                .create_item(
                    self.tenant_id,
                    NewItem {
                        brand_id: self.brand,
                        name: name.to_string(),
                        product_id: None,
                        image_url: None,
                        sizes: sizes
                            .iter()
                            .map(|(label, quantity)| NewSize {
                                label: label.to_string(),
                                quantity: *quantity,
                            })
                            .collect(),
                        quantity: None,
                    },
                )
                .await
                .unwrap();
            let sizes = item.sizes().iter().map(|s| s.size_id()).collect();
            (item.id_typed(), sizes)
        }

        pub async fn promoter(&self, name: &str) -> PromoterId {
            self.svc
                .create_promoter(
                    self.tenant_id,
                    NewPromoter {
                        name: name.to_string(),
                        contact: Default::default(),
                    },
                )
                .await
                .unwrap()
                .id_typed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::world;
    use super::*;

    #[tokio::test]
    async fn rebuild_restores_read_models_from_the_log() {
        let w = world().await;
        let (item_id, sizes) = w.item("Cap", &[("S", 5)]).await;
        let promoter = w.promoter("Eve").await;
        w.svc
            .move_stock(
                w.tenant_id,
                w.employee,
                item_id,
                StockRequest::take_out(sizes[0], 2, promoter),
            )
            .await
            .unwrap();

        w.svc.projections().rebuild(Vec::new()).unwrap();
        assert!(w.svc.projections().items().get(w.tenant_id, item_id).is_none());

        assert_eq!(w.svc.rebuild_read_models().await.unwrap(), 4);
        let record = w.svc.projections().items().get(w.tenant_id, item_id).unwrap();
        assert_eq!(record.totals().in_circulation, 2);
        assert!(w.svc.projections().holdings().holds_stock(w.tenant_id, promoter));
    }
}
