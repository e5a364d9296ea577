use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use promostock_auth::Permission;
use promostock_infra::projections::SEARCH_LIMIT;
use promostock_infra::services::{NewItem, StockRequest};
use promostock_inventory::TransactionType;

use crate::app::routes::common::{self, ApiJson, ApiQuery, ApiResult, guard};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_item))
        .route("/search", get(search_items))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/active", post(set_active))
        .route("/:id/sizes", post(add_size))
        .route("/:id/links", post(link_brand))
        .route("/:id/links/:brand_id", delete(unlink_brand))
        .route("/:id/take-out", post(take_out))
        .route("/:id/return", post(return_stock))
        .route("/:id/burn", post(burn))
        .route("/:id/restock", post(restock))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateItemRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::ITEMS_MANAGE)?;

    let item = services
        .stock()
        .create_item(
            tenant.tenant_id(),
            NewItem {
                brand_id: body.brand_id,
                name: body.name,
                product_id: body.product_id,
                image_url: body.image_url,
                sizes: body.sizes.into_iter().map(Into::into).collect(),
                quantity: body.quantity,
            },
        )
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(dto::item_to_json(&item))).into_response())
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let item_id = common::item_id(&id)?;
    let record = services
        .stock()
        .projections()
        .items()
        .get(tenant.tenant_id(), item_id)
        .ok_or_else(|| errors::not_found("item"))?;

    Ok(Json(dto::item_to_json(&record.state)).into_response())
}

/// Item picker for sharing: name or product id, at most [`SEARCH_LIMIT`] hits.
pub async fn search_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(query): ApiQuery<dto::SearchQuery>,
) -> impl IntoResponse {
    let hits: Vec<_> = services
        .stock()
        .projections()
        .items()
        .search(tenant.tenant_id(), &query.q, SEARCH_LIMIT)
        .iter()
        .map(|r| dto::item_to_json(&r.state))
        .collect();
    Json(hits)
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateItemRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::ITEMS_MANAGE)?;
    let item_id = common::item_id(&id)?;

    let item = services
        .stock()
        .update_item(tenant.tenant_id(), item_id, body.name, body.product_id, body.image_url)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::item_to_json(&item)).into_response())
}

pub async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SetActiveRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::ITEMS_MANAGE)?;
    let item_id = common::item_id(&id)?;

    let item = services
        .stock()
        .set_item_active(tenant.tenant_id(), item_id, body.active)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::item_to_json(&item)).into_response())
}

pub async fn add_size(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SizeRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::ITEMS_MANAGE)?;
    let item_id = common::item_id(&id)?;

    let item = services
        .stock()
        .add_size(tenant.tenant_id(), item_id, body.into())
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(dto::item_to_json(&item))).into_response())
}

pub async fn link_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::LinkBrandRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::ITEMS_MANAGE)?;
    let item_id = common::item_id(&id)?;

    let item = services
        .stock()
        .link_item(tenant.tenant_id(), item_id, body.brand_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::item_to_json(&item)).into_response())
}

pub async fn unlink_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, brand)): Path<(String, String)>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::ITEMS_MANAGE)?;
    let item_id = common::item_id(&id)?;
    let brand_id = common::brand_id(&brand)?;

    let item = services
        .stock()
        .unlink_item(tenant.tenant_id(), item_id, brand_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::item_to_json(&item)).into_response())
}

/// Deleting from a linked brand drops the link; from the owner it removes the item.
pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<dto::DeleteItemQuery>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::ITEMS_MANAGE)?;
    let item_id = common::item_id(&id)?;

    let brand_id = match query.brand_id {
        Some(b) => b,
        None => services
            .stock()
            .projections()
            .items()
            .get(tenant.tenant_id(), item_id)
            .and_then(|r| r.state.brand_id())
            .ok_or_else(|| errors::not_found("item"))?,
    };

    services
        .stock()
        .delete_item(tenant.tenant_id(), item_id, brand_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn take_out(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::MovementRequest>,
) -> ApiResult {
    movement(services, tenant, principal, &id, TransactionType::TakeOut, body).await
}

pub async fn return_stock(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::MovementRequest>,
) -> ApiResult {
    movement(services, tenant, principal, &id, TransactionType::Return, body).await
}

pub async fn burn(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::MovementRequest>,
) -> ApiResult {
    movement(services, tenant, principal, &id, TransactionType::Burn, body).await
}

pub async fn restock(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::MovementRequest>,
) -> ApiResult {
    movement(services, tenant, principal, &id, TransactionType::Restock, body).await
}

async fn movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    id: &str,
    kind: TransactionType,
    body: dto::MovementRequest,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::STOCK_MOVE)?;
    let item_id = common::item_id(id)?;

    let request = StockRequest {
        kind,
        size_id: body.size_id,
        quantity: body.quantity,
        promoter_id: body.promoter_id,
        notes: body.notes,
        force: body.force,
    };

    let outcome = services
        .stock()
        .move_stock(tenant.tenant_id(), principal.user_id(), item_id, request)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::movement_to_json(&outcome)).into_response())
}
