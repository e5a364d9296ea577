//! Transaction history read model.
//!
//! Every stock event becomes one immutable [`TransactionRecord`] keyed by its
//! event id. Queries filter, enrich and paginate newest first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use promostock_brands::BrandId;
use promostock_core::{TenantId, UserId};
use promostock_events::EventEnvelope;
use promostock_inventory::{InventoryItem, InventoryItemId, SizeId, TransactionType};
use promostock_promoters::PromoterId;

use super::ProjectionError;
use super::cursor::StreamCursors;
use super::item_catalog::decode_inventory_event;
use crate::read_model::{InMemoryTenantStore, TenantStore};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub transaction_id: Uuid,
    /// Arrival order, breaks ties between equal timestamps.
    pub position: u64,
    pub kind: TransactionType,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: u64,
    pub unaccounted_quantity: u64,
    pub promoter_id: Option<PromoterId>,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// A transaction row with display names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub item_id: InventoryItemId,
    pub item_name: Option<String>,
    pub product_id: Option<String>,
    pub brand_id: Option<BrandId>,
    pub brand_name: Option<String>,
    pub size_id: SizeId,
    pub size_label: Option<String>,
    pub quantity: u64,
    pub unaccounted_quantity: u64,
    pub promoter_id: Option<PromoterId>,
    pub promoter_name: Option<String>,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionView {
    fn matches_text(&self, needle: &str) -> bool {
        [
            self.item_name.as_deref(),
            self.product_id.as_deref(),
            self.promoter_name.as_deref(),
            self.notes.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Resolves names for enrichment; implemented over the other read models.
pub trait TransactionLookup {
    fn item(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Option<InventoryItem>;
    fn brand_name(&self, tenant_id: TenantId, brand_id: BrandId) -> Option<String>;
    fn promoter_name(&self, tenant_id: TenantId, promoter_id: PromoterId) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub kind: Option<TransactionType>,
    pub promoter_id: Option<PromoterId>,
    pub employee_id: Option<UserId>,
    pub item_id: Option<InventoryItemId>,
    /// Matches items owned by or linked into the brand.
    pub brand_id: Option<BrandId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub q: Option<String>,
}

impl TransactionFilter {
    fn accepts(&self, r: &TransactionRecord) -> bool {
        self.kind.is_none_or(|k| k == r.kind)
            && self.promoter_id.is_none_or(|p| r.promoter_id == Some(p))
            && self.employee_id.is_none_or(|e| e == r.employee_id)
            && self.item_id.is_none_or(|i| i == r.item_id)
            && self.from.is_none_or(|from| r.occurred_at >= from)
            && self.to.is_none_or(|to| r.occurred_at <= to)
    }
}

/// 1-based page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Pagination {
    /// Clamp caller input: page at least 1, page size in `1..=max_page_size`.
    pub fn new(page: Option<usize>, page_size: Option<usize>, max_page_size: usize) -> Self {
        let max = max_page_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionView>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug)]
pub struct TransactionLog<S = InMemoryTenantStore<Uuid, TransactionRecord>>
where
    S: TenantStore<Uuid, TransactionRecord>,
{
    store: S,
    cursors: StreamCursors,
    next_position: AtomicU64,
}

impl TransactionLog {
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantStore::new())
    }
}

impl<S> TransactionLog<S>
where
    S: TenantStore<Uuid, TransactionRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
            next_position: AtomicU64::new(1),
        }
    }

    pub fn get(&self, tenant_id: TenantId, transaction_id: Uuid) -> Option<TransactionRecord> {
        self.store.get(tenant_id, &transaction_id)
    }

    /// All records of a tenant, newest first.
    pub fn records(&self, tenant_id: TenantId) -> Vec<TransactionRecord> {
        let mut records = self.store.list(tenant_id);
        records.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then(b.position.cmp(&a.position))
        });
        records
    }

    pub fn query(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        pagination: Pagination,
        lookup: &dyn TransactionLookup,
    ) -> TransactionPage {
        let needle = filter
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let mut items: HashMap<InventoryItemId, Option<InventoryItem>> = HashMap::new();
        let mut matched = Vec::new();

        for record in self.records(tenant_id).into_iter().filter(|r| filter.accepts(r)) {
            let item = items
                .entry(record.item_id)
                .or_insert_with(|| lookup.item(tenant_id, record.item_id))
                .clone();

            if let Some(brand_id) = filter.brand_id {
                let in_brand = item.as_ref().is_some_and(|i| {
                    i.brand_id() == Some(brand_id) || i.linked_brands().any(|b| b == brand_id)
                });
                if !in_brand {
                    continue;
                }
            }

            let view = enrich(tenant_id, record, item.as_ref(), lookup);
            if needle.as_deref().is_some_and(|n| !view.matches_text(n)) {
                continue;
            }
            matched.push(view);
        }

        let total = matched.len();
        let Pagination { page, page_size } = pagination;
        let transactions = matched
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        TransactionPage {
            transactions,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
        }
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let tenant_id = envelope.tenant_id();

        self.cursors.advance(
            tenant_id,
            envelope.aggregate_id(),
            envelope.sequence_number(),
            || {
                let event = decode_inventory_event(envelope)?;
                let Some(m) = event.stock_movement() else {
                    return Ok(());
                };

                let transaction_id = envelope.event_id();
                self.store.upsert(
                    tenant_id,
                    transaction_id,
                    TransactionRecord {
                        transaction_id,
                        position: self.next_position.fetch_add(1, Ordering::Relaxed),
                        kind: m.kind,
                        item_id: m.item_id,
                        size_id: m.size_id,
                        quantity: m.quantity,
                        unaccounted_quantity: m.unaccounted_quantity,
                        promoter_id: m.promoter_id,
                        employee_id: m.employee_id,
                        notes: m.notes,
                        occurred_at: m.occurred_at,
                    },
                );
                Ok(())
            },
        )
    }

    pub fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
        self.next_position.store(1, Ordering::Relaxed);
    }
}

fn enrich(
    tenant_id: TenantId,
    r: TransactionRecord,
    item: Option<&InventoryItem>,
    lookup: &dyn TransactionLookup,
) -> TransactionView {
    let brand_id = item.and_then(InventoryItem::brand_id);
    TransactionView {
        id: r.transaction_id,
        kind: r.kind,
        item_id: r.item_id,
        item_name: item.map(|i| i.name().to_string()),
        product_id: item.map(|i| i.product_id().to_string()),
        brand_id,
        brand_name: brand_id.and_then(|b| lookup.brand_name(tenant_id, b)),
        size_id: r.size_id,
        size_label: item
            .and_then(|i| i.size(r.size_id))
            .map(|s| s.label().to_string()),
        quantity: r.quantity,
        unaccounted_quantity: r.unaccounted_quantity,
        promoter_id: r.promoter_id,
        promoter_name: r.promoter_id.and_then(|p| lookup.promoter_name(tenant_id, p)),
        employee_id: r.employee_id,
        notes: r.notes,
        timestamp: r.occurred_at,
    }
}
