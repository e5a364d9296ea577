use chrono::Utc;

use promostock_core::{AggregateId, TenantId};
use promostock_promoters::{
    ContactDetails, CreatePromoter, DeletePromoter, Promoter, PromoterCommand, PromoterId,
    SetPromoterActive, UpdatePromoter,
};

use super::{PromoStock, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromoter {
    pub name: String,
    pub contact: ContactDetails,
}

impl PromoStock {
    pub async fn create_promoter(
        &self,
        tenant_id: TenantId,
        promoter: NewPromoter,
    ) -> Result<Promoter, ServiceError> {
        let promoter_id = PromoterId::new(AggregateId::new());
        self.dispatch_promoter(
            tenant_id,
            promoter_id,
            PromoterCommand::CreatePromoter(CreatePromoter {
                tenant_id,
                promoter_id,
                name: promoter.name,
                contact: promoter.contact,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn update_promoter(
        &self,
        tenant_id: TenantId,
        promoter_id: PromoterId,
        name: Option<String>,
        contact: Option<ContactDetails>,
    ) -> Result<Promoter, ServiceError> {
        self.dispatch_promoter(
            tenant_id,
            promoter_id,
            PromoterCommand::UpdatePromoter(UpdatePromoter {
                tenant_id,
                promoter_id,
                name,
                contact,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    /// Deactivating a promoter who still holds stock needs `force`.
    pub async fn set_promoter_active(
        &self,
        tenant_id: TenantId,
        promoter_id: PromoterId,
        active: bool,
        force: bool,
    ) -> Result<Promoter, ServiceError> {
        if !active && !force {
            self.ensure_holds_nothing(tenant_id, promoter_id)?;
        }

        self.dispatch_promoter(
            tenant_id,
            promoter_id,
            PromoterCommand::SetPromoterActive(SetPromoterActive {
                tenant_id,
                promoter_id,
                active,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn delete_promoter(
        &self,
        tenant_id: TenantId,
        promoter_id: PromoterId,
    ) -> Result<(), ServiceError> {
        self.ensure_holds_nothing(tenant_id, promoter_id)?;

        self.dispatch_promoter(
            tenant_id,
            promoter_id,
            PromoterCommand::DeletePromoter(DeletePromoter {
                tenant_id,
                promoter_id,
                occurred_at: Utc::now(),
            }),
        )
        .await?;
        Ok(())
    }

    fn ensure_holds_nothing(&self, tenant_id: TenantId, promoter_id: PromoterId) -> Result<(), ServiceError> {
        let units = self
            .projections
            .holdings()
            .inventory(tenant_id, promoter_id)
            .total_units();
        if units > 0 {
            return Err(ServiceError::PromoterHoldsStock { units });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::StockRequest;
    use super::super::fixtures::world;
    use super::*;

    #[tokio::test]
    async fn promoter_with_stock_needs_force_to_deactivate_and_cannot_be_deleted() {
        let w = world().await;
        let (item_id, sizes) = w.item("Cap", &[("S", 5)]).await;
        let p = w.promoter("Gina").await;

        w.svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::take_out(sizes[0], 2, p))
            .await
            .unwrap();

        let err = w
            .svc
            .set_promoter_active(w.tenant_id, p, false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PromoterHoldsStock { units: 2 }));

        let err = w.svc.delete_promoter(w.tenant_id, p).await.unwrap_err();
        assert!(matches!(err, ServiceError::PromoterHoldsStock { units: 2 }));

        let promoter = w
            .svc
            .set_promoter_active(w.tenant_id, p, false, true)
            .await
            .unwrap();
        assert!(!promoter.is_active());

        // Returns are still accepted from an inactive promoter.
        w.svc.return_all(w.tenant_id, w.employee, p).await.unwrap();
        w.svc.delete_promoter(w.tenant_id, p).await.unwrap();
        assert!(w.svc.projections().promoters().get(w.tenant_id, p).is_none());
    }

    #[tokio::test]
    async fn update_keeps_fields_that_are_not_given() {
        let w = world().await;
        let p = w.promoter("Hank").await;
        let contact = ContactDetails {
            phone_number: Some("555-0100".to_string()),
            ..Default::default()
        };

        w.svc
            .update_promoter(w.tenant_id, p, None, Some(contact))
            .await
            .unwrap();
        let promoter = w
            .svc
            .update_promoter(w.tenant_id, p, Some("Hank Hill".to_string()), None)
            .await
            .unwrap();

        assert_eq!(promoter.name(), "Hank Hill");
        assert_eq!(promoter.contact().phone_number.as_deref(), Some("555-0100"));
    }
}
