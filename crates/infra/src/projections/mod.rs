//! Read models built from published events.
//!
//! Every projection is:
//! - **Rebuildable**: reconstructed from the full event log at startup
//! - **Tenant-isolated**: records are partitioned by tenant
//! - **Idempotent**: per-stream cursors make at-least-once delivery safe

mod cursor;
#[cfg(test)]
pub(crate) mod test_support;

pub mod brand_directory;
pub mod item_catalog;
pub mod promoter_directory;
pub mod promoter_holdings;
pub mod transaction_log;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use promostock_brands::BrandId;
use promostock_core::TenantId;
use promostock_events::EventEnvelope;
use promostock_inventory::{InventoryItem, InventoryItemId};
use promostock_promoters::PromoterId;

pub use brand_directory::{BrandDirectory, BrandRecord};
pub use item_catalog::{BrandItem, ItemCatalog, ItemRecord, ItemTotals, SEARCH_LIMIT};
pub use promoter_directory::{PromoterDirectory, PromoterRecord};
pub use promoter_holdings::{PromoterHoldings, PromoterInventory};
pub use transaction_log::{
    DEFAULT_PAGE_SIZE, Pagination, TransactionFilter, TransactionLog, TransactionLookup,
    TransactionPage, TransactionRecord, TransactionView,
};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection lock poisoned")]
    Poisoned,
}

/// All read models of the service, fed from one event stream.
#[derive(Debug)]
pub struct ProjectionSet {
    brands: BrandDirectory,
    items: ItemCatalog,
    promoters: PromoterDirectory,
    holdings: PromoterHoldings,
    transactions: TransactionLog,
}

impl Default for ProjectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionSet {
    pub fn new() -> Self {
        Self {
            brands: BrandDirectory::in_memory(),
            items: ItemCatalog::in_memory(),
            promoters: PromoterDirectory::in_memory(),
            holdings: PromoterHoldings::in_memory(),
            transactions: TransactionLog::in_memory(),
        }
    }

    pub fn brands(&self) -> &BrandDirectory {
        &self.brands
    }

    pub fn items(&self) -> &ItemCatalog {
        &self.items
    }

    pub fn promoters(&self) -> &PromoterDirectory {
        &self.promoters
    }

    pub fn holdings(&self) -> &PromoterHoldings {
        &self.holdings
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    /// Route an envelope to the read models of its aggregate type. Returns
    /// whether anything was applied (false for duplicates and unknown types).
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        match envelope.aggregate_type() {
            promostock_brands::AGGREGATE_TYPE => self.brands.apply_envelope(envelope),
            promostock_promoters::AGGREGATE_TYPE => self.promoters.apply_envelope(envelope),
            promostock_inventory::AGGREGATE_TYPE => {
                let applied = self.items.apply_envelope(envelope)?;
                self.holdings.apply_envelope(envelope)?;
                self.transactions.apply_envelope(envelope)?;
                Ok(applied)
            }
            other => {
                debug!(aggregate_type = other, "no projection for aggregate type");
                Ok(false)
            }
        }
    }

    /// Drop every read model and replay `envelopes` in commit order.
    pub fn rebuild(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<usize, ProjectionError> {
        self.brands.reset();
        self.items.reset();
        self.promoters.reset();
        self.holdings.reset();
        self.transactions.reset();

        let mut replayed = 0;
        for envelope in envelopes {
            self.apply_envelope(&envelope)?;
            replayed += 1;
        }
        info!(events = replayed, "read models rebuilt");
        Ok(replayed)
    }

    pub fn transaction_history(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> TransactionPage {
        self.transactions.query(tenant_id, filter, pagination, self)
    }
}

impl TransactionLookup for ProjectionSet {
    fn item(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Option<InventoryItem> {
        self.items
            .get_including_deleted(tenant_id, item_id)
            .map(|r| r.state)
    }

    fn brand_name(&self, tenant_id: TenantId, brand_id: BrandId) -> Option<String> {
        self.brands
            .get(tenant_id, brand_id)
            .map(|r| r.state.name().to_string())
    }

    fn promoter_name(&self, tenant_id: TenantId, promoter_id: PromoterId) -> Option<String> {
        self.promoters
            .get_including_deleted(tenant_id, promoter_id)
            .map(|r| r.state.name().to_string())
    }
}
