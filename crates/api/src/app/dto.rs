use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use promostock_brands::{Brand, BrandId};
use promostock_core::{TenantId, UserId};
use promostock_infra::projections::{BrandRecord, ItemTotals, PromoterInventory, ProjectionSet};
use promostock_infra::services::{BatchAction, BatchLine, BatchReport, MovementOutcome, NewSize};
use promostock_inventory::{InventoryItem, InventoryItemId, ItemSize, SizeId, TransactionType};
use promostock_promoters::{ContactDetails, Promoter, PromoterId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BrandRequest {
    pub name: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
    /// Promoters only: deactivate even while holding stock.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetPinnedRequest {
    pub pinned: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListBrandsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct SizeRequest {
    pub label: String,
    pub quantity: u64,
}

impl From<SizeRequest> for NewSize {
    fn from(value: SizeRequest) -> Self {
        NewSize {
            label: value.label,
            quantity: value.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub brand_id: BrandId,
    pub name: String,
    pub product_id: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub sizes: Vec<SizeRequest>,
    /// Stock of the implicit single size when `sizes` is empty.
    pub quantity: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: String,
    pub product_id: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkBrandRequest {
    pub brand_id: BrandId,
}

#[derive(Debug, Deserialize)]
pub struct DeleteItemQuery {
    /// Brand the delete is issued from; defaults to the owner.
    pub brand_id: Option<BrandId>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub size_id: SizeId,
    pub quantity: i64,
    pub promoter_id: Option<PromoterId>,
    pub notes: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequestBody {
    pub action: BatchAction,
    pub promoter_id: PromoterId,
    pub notes: Option<String>,
    pub lines: Vec<BatchLine>,
}

#[derive(Debug, Deserialize)]
pub struct SelectedLine {
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
}

#[derive(Debug, Deserialize)]
pub struct SelectedReturnRequest {
    pub lines: Vec<SelectedLine>,
}

#[derive(Debug, Deserialize)]
pub struct PromoterRequest {
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromoterRequest {
    pub name: Option<String>,
    pub contact: Option<ContactDetails>,
}

/// Raw history query; parsed by [`crate::app::routes::transactions`].
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub promoter_id: Option<PromoterId>,
    pub employee_id: Option<UserId>,
    pub item_id: Option<InventoryItemId>,
    pub brand_id: Option<BrandId>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn brand_to_json(brand: &Brand) -> JsonValue {
    json!({
        "id": brand.id_typed(),
        "name": brand.name(),
        "logo_url": brand.logo_url(),
        "active": brand.is_active(),
        "pinned": brand.is_pinned(),
    })
}

pub fn brand_record_to_json(record: &BrandRecord, item_count: usize) -> JsonValue {
    let mut v = brand_to_json(&record.state);
    v["item_count"] = json!(item_count);
    v["created_at"] = json!(record.created_at);
    v["updated_at"] = json!(record.updated_at);
    v
}

fn size_to_json(size: &ItemSize) -> JsonValue {
    json!({
        "size_id": size.size_id(),
        "label": size.label(),
        "original_quantity": size.original_quantity(),
        "available_quantity": size.available_quantity(),
        "in_circulation": size.in_circulation(),
        "burned_quantity": size.burned_quantity(),
        "holdings": size
            .holdings()
            .map(|(promoter_id, quantity)| json!({ "promoter_id": promoter_id, "quantity": quantity }))
            .collect::<Vec<_>>(),
    })
}

pub fn item_to_json(item: &InventoryItem) -> JsonValue {
    json!({
        "id": item.id_typed(),
        "brand_id": item.brand_id(),
        "linked_brand_ids": item.linked_brands().collect::<Vec<_>>(),
        "name": item.name(),
        "product_id": item.product_id(),
        "image_url": item.image_url(),
        "active": item.is_active(),
        "sizes": item.sizes().iter().map(size_to_json).collect::<Vec<_>>(),
        "totals": ItemTotals::of(item),
    })
}

pub fn movement_to_json(outcome: &MovementOutcome) -> JsonValue {
    json!({
        "transaction_id": outcome.transaction_id,
        "item_id": outcome.item.id_typed(),
        "size": outcome.size().map(size_to_json),
        "totals": ItemTotals::of(&outcome.item),
    })
}

pub fn report_to_json(report: &BatchReport) -> JsonValue {
    serde_json::to_value(report).unwrap_or_else(|_| json!({}))
}

pub fn promoter_to_json(promoter: &Promoter) -> JsonValue {
    let contact = promoter.contact();
    json!({
        "id": promoter.id_typed(),
        "name": promoter.name(),
        "address": contact.address,
        "phone_number": contact.phone_number,
        "clothing_size": contact.clothing_size,
        "photo_url": contact.photo_url,
        "notes": contact.notes,
        "active": promoter.is_active(),
    })
}

/// Holdings enriched with item and size names.
pub fn inventory_to_json(
    projections: &ProjectionSet,
    tenant_id: TenantId,
    inventory: &PromoterInventory,
) -> JsonValue {
    let lines: Vec<_> = inventory
        .lines()
        .map(|(item_id, size_id, quantity)| {
            let item = projections.items().get_including_deleted(tenant_id, item_id);
            let item = item.as_ref().map(|r| &r.state);
            json!({
                "item_id": item_id,
                "item_name": item.map(|i| i.name()),
                "product_id": item.map(|i| i.product_id()),
                "size_id": size_id,
                "size_label": item.and_then(|i| i.size(size_id)).map(|s| s.label()),
                "quantity": quantity,
            })
        })
        .collect();

    json!({
        "promoter_id": inventory.promoter_id,
        "total_units": inventory.total_units(),
        "lines": lines,
    })
}
