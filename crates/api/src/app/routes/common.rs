use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    response::Response,
};
use serde::de::DeserializeOwned;

use promostock_auth::Permission;
use promostock_brands::BrandId;
use promostock_core::AggregateId;
use promostock_inventory::InventoryItemId;
use promostock_promoters::PromoterId;

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

/// Handlers short-circuit with a ready error response.
pub type ApiResult = Result<Response, Response>;

/// JSON body whose rejections answer `400 validation_error` in the usual
/// `{error, message}` shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::bad_request("validation_error", rejection.body_text())),
        }
    }
}

/// Query string counterpart of [`ApiJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::bad_request("validation_error", rejection.body_text())),
        }
    }
}

pub fn guard(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &Permission,
) -> Result<(), Response> {
    crate::authz::require(tenant, principal, permission).map_err(errors::authz_error_to_response)
}

fn parse_aggregate_id(raw: &str, what: &'static str) -> Result<AggregateId, Response> {
    raw.parse()
        .map_err(|_| errors::bad_request("invalid_id", format!("invalid {what} id")))
}

pub fn brand_id(raw: &str) -> Result<BrandId, Response> {
    parse_aggregate_id(raw, "brand").map(BrandId::new)
}

pub fn item_id(raw: &str) -> Result<InventoryItemId, Response> {
    parse_aggregate_id(raw, "item").map(InventoryItemId::new)
}

pub fn promoter_id(raw: &str) -> Result<PromoterId, Response> {
    parse_aggregate_id(raw, "promoter").map(PromoterId::new)
}
