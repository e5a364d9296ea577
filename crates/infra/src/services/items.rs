use chrono::Utc;
use uuid::Uuid;

use promostock_brands::BrandId;
use promostock_core::{AggregateId, TenantId};
use promostock_inventory::{
    AddSize, CreateItem, DEFAULT_SIZE_LABEL, DeleteItem, InventoryCommand, InventoryItem,
    InventoryItemId, LinkBrand, SetItemActive, SizeId, SizeSpec, UnlinkBrand, UpdateItemDetails,
};

use super::{PromoStock, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSize {
    pub label: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub brand_id: BrandId,
    pub name: String,
    /// Generated when absent.
    pub product_id: Option<String>,
    pub image_url: Option<String>,
    pub sizes: Vec<NewSize>,
    /// Stock of the implicit single size when `sizes` is empty.
    pub quantity: Option<u64>,
}

impl NewItem {
    fn size_specs(&self) -> Vec<SizeSpec> {
        if self.sizes.is_empty() {
            return vec![SizeSpec {
                size_id: SizeId::new(),
                label: DEFAULT_SIZE_LABEL.to_string(),
                quantity: self.quantity.unwrap_or(0),
            }];
        }
        self.sizes
            .iter()
            .map(|s| SizeSpec {
                size_id: SizeId::new(),
                label: s.label.clone(),
                quantity: s.quantity,
            })
            .collect()
    }
}

impl PromoStock {
    pub async fn create_item(&self, tenant_id: TenantId, item: NewItem) -> Result<InventoryItem, ServiceError> {
        self.live_brand(tenant_id, item.brand_id).await?;

        let item_id = InventoryItemId::new(AggregateId::new());
        let product_id = item
            .product_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        let command = InventoryCommand::CreateItem(CreateItem {
            tenant_id,
            item_id,
            brand_id: item.brand_id,
            sizes: item.size_specs(),
            name: item.name,
            product_id,
            image_url: item.image_url,
            occurred_at: Utc::now(),
        });
        Ok(self.dispatch_item(tenant_id, item_id, command).await?.state)
    }

    pub async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        name: String,
        product_id: String,
        image_url: Option<String>,
    ) -> Result<InventoryItem, ServiceError> {
        let command = InventoryCommand::UpdateItemDetails(UpdateItemDetails {
            tenant_id,
            item_id,
            name,
            product_id,
            image_url,
            occurred_at: Utc::now(),
        });
        Ok(self.dispatch_item(tenant_id, item_id, command).await?.state)
    }

    pub async fn set_item_active(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        active: bool,
    ) -> Result<InventoryItem, ServiceError> {
        let command = InventoryCommand::SetItemActive(SetItemActive {
            tenant_id,
            item_id,
            active,
            occurred_at: Utc::now(),
        });
        Ok(self.dispatch_item(tenant_id, item_id, command).await?.state)
    }

    pub async fn add_size(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        size: NewSize,
    ) -> Result<InventoryItem, ServiceError> {
        let command = InventoryCommand::AddSize(AddSize {
            tenant_id,
            item_id,
            size: SizeSpec {
                size_id: SizeId::new(),
                label: size.label,
                quantity: size.quantity,
            },
            occurred_at: Utc::now(),
        });
        Ok(self.dispatch_item(tenant_id, item_id, command).await?.state)
    }

    /// Share an existing item into another brand.
    pub async fn link_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        brand_id: BrandId,
    ) -> Result<InventoryItem, ServiceError> {
        self.live_brand(tenant_id, brand_id).await?;
        let command = InventoryCommand::LinkBrand(LinkBrand {
            tenant_id,
            item_id,
            brand_id,
            occurred_at: Utc::now(),
        });
        Ok(self.dispatch_item(tenant_id, item_id, command).await?.state)
    }

    pub async fn unlink_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        brand_id: BrandId,
    ) -> Result<InventoryItem, ServiceError> {
        let command = InventoryCommand::UnlinkBrand(UnlinkBrand {
            tenant_id,
            item_id,
            brand_id,
            occurred_at: Utc::now(),
        });
        Ok(self.dispatch_item(tenant_id, item_id, command).await?.state)
    }

    /// Delete as seen from `brand_id`: a linked brand only drops its link.
    pub async fn delete_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        brand_id: BrandId,
    ) -> Result<(), ServiceError> {
        let command = InventoryCommand::DeleteItem(DeleteItem {
            tenant_id,
            item_id,
            brand_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_item(tenant_id, item_id, command).await?;
        Ok(())
    }
}
