use chrono::Utc;

use promostock_brands::{
    Brand, BrandCommand, BrandId, CreateBrand, DeleteBrand, SetBrandActive, SetBrandPinned,
    UpdateBrand,
};
use promostock_core::{AggregateId, TenantId};

use super::{PromoStock, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBrand {
    pub name: String,
    pub logo_url: Option<String>,
}

impl PromoStock {
    pub async fn create_brand(&self, tenant_id: TenantId, brand: NewBrand) -> Result<Brand, ServiceError> {
        let brand_id = BrandId::new(AggregateId::new());
        self.dispatch_brand(
            tenant_id,
            brand_id,
            BrandCommand::CreateBrand(CreateBrand {
                tenant_id,
                brand_id,
                name: brand.name,
                logo_url: brand.logo_url,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn update_brand(
        &self,
        tenant_id: TenantId,
        brand_id: BrandId,
        brand: NewBrand,
    ) -> Result<Brand, ServiceError> {
        self.dispatch_brand(
            tenant_id,
            brand_id,
            BrandCommand::UpdateBrand(UpdateBrand {
                tenant_id,
                brand_id,
                name: brand.name,
                logo_url: brand.logo_url,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn set_brand_active(
        &self,
        tenant_id: TenantId,
        brand_id: BrandId,
        active: bool,
    ) -> Result<Brand, ServiceError> {
        self.dispatch_brand(
            tenant_id,
            brand_id,
            BrandCommand::SetBrandActive(SetBrandActive {
                tenant_id,
                brand_id,
                active,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn set_brand_pinned(
        &self,
        tenant_id: TenantId,
        brand_id: BrandId,
        pinned: bool,
    ) -> Result<Brand, ServiceError> {
        self.dispatch_brand(
            tenant_id,
            brand_id,
            BrandCommand::SetBrandPinned(SetBrandPinned {
                tenant_id,
                brand_id,
                pinned,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    /// Rejected while the brand owns or links any live item.
    pub async fn delete_brand(&self, tenant_id: TenantId, brand_id: BrandId) -> Result<(), ServiceError> {
        let items = self.projections.items().count_for_brand(tenant_id, brand_id);
        if items > 0 {
            return Err(ServiceError::BrandHasItems { items });
        }

        self.dispatch_brand(
            tenant_id,
            brand_id,
            BrandCommand::DeleteBrand(DeleteBrand {
                tenant_id,
                brand_id,
                occurred_at: Utc::now(),
            }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::world;
    use super::*;
    use crate::command_dispatcher::DispatchError;

    #[tokio::test]
    async fn brand_with_items_cannot_be_deleted() {
        let w = world().await;
        let (item_id, _) = w.item("Cap", &[("S", 1)]).await;

        let err = w.svc.delete_brand(w.tenant_id, w.brand).await.unwrap_err();
        assert!(matches!(err, ServiceError::BrandHasItems { items: 1 }));

        w.svc
            .delete_item(w.tenant_id, item_id, w.brand)
            .await
            .unwrap();
        w.svc.delete_brand(w.tenant_id, w.brand).await.unwrap();
        assert!(w.svc.projections().brands().get(w.tenant_id, w.brand).is_none());

        let err = w
            .svc
            .set_brand_pinned(w.tenant_id, w.brand, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::NotFound)));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let w = world().await;
        let err = w
            .svc
            .update_brand(
                w.tenant_id,
                w.brand,
                NewBrand {
                    name: "   ".to_string(),
                    logo_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::Validation(_))));
    }
}
