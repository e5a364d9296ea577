use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use promostock_auth::Permission;
use promostock_infra::services::NewBrand;

use crate::app::routes::common::{self, ApiJson, ApiQuery, ApiResult, guard};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_brands).post(create_brand))
        .route("/:id", get(get_brand).put(update_brand).delete(delete_brand))
        .route("/:id/active", post(set_active))
        .route("/:id/pinned", post(set_pinned))
        .route("/:id/items", get(brand_items))
}

pub async fn list_brands(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(query): ApiQuery<dto::ListBrandsQuery>,
) -> impl IntoResponse {
    let projections = services.stock().projections();
    let brands: Vec<_> = projections
        .brands()
        .list(tenant.tenant_id(), query.include_inactive)
        .iter()
        .map(|b| {
            let count = projections.items().count_for_brand(tenant.tenant_id(), b.brand_id());
            dto::brand_record_to_json(b, count)
        })
        .collect();
    Json(brands)
}

pub async fn create_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::BrandRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::BRANDS_MANAGE)?;

    let brand = services
        .stock()
        .create_brand(
            tenant.tenant_id(),
            NewBrand {
                name: body.name,
                logo_url: body.logo_url,
            },
        )
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(dto::brand_to_json(&brand))).into_response())
}

pub async fn get_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let brand_id = common::brand_id(&id)?;
    let projections = services.stock().projections();
    let record = projections
        .brands()
        .get(tenant.tenant_id(), brand_id)
        .ok_or_else(|| errors::not_found("brand"))?;
    let count = projections.items().count_for_brand(tenant.tenant_id(), brand_id);

    Ok(Json(dto::brand_record_to_json(&record, count)).into_response())
}

pub async fn update_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::BrandRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::BRANDS_MANAGE)?;
    let brand_id = common::brand_id(&id)?;

    let brand = services
        .stock()
        .update_brand(
            tenant.tenant_id(),
            brand_id,
            NewBrand {
                name: body.name,
                logo_url: body.logo_url,
            },
        )
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::brand_to_json(&brand)).into_response())
}

pub async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SetActiveRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::BRANDS_MANAGE)?;
    let brand_id = common::brand_id(&id)?;

    let brand = services
        .stock()
        .set_brand_active(tenant.tenant_id(), brand_id, body.active)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::brand_to_json(&brand)).into_response())
}

pub async fn set_pinned(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SetPinnedRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::BRANDS_MANAGE)?;
    let brand_id = common::brand_id(&id)?;

    let brand = services
        .stock()
        .set_brand_pinned(tenant.tenant_id(), brand_id, body.pinned)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::brand_to_json(&brand)).into_response())
}

pub async fn delete_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::BRANDS_MANAGE)?;
    let brand_id = common::brand_id(&id)?;

    services
        .stock()
        .delete_brand(tenant.tenant_id(), brand_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Owned and linked items; linked ones carry `is_shared_instance: true`.
pub async fn brand_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let brand_id = common::brand_id(&id)?;
    let projections = services.stock().projections();
    if projections.brands().get(tenant.tenant_id(), brand_id).is_none() {
        return Err(errors::not_found("brand"));
    }

    let items: Vec<_> = projections
        .items()
        .items_for_brand(tenant.tenant_id(), brand_id)
        .iter()
        .map(|entry| {
            let mut v = dto::item_to_json(&entry.record.state);
            v["is_shared_instance"] = serde_json::json!(entry.is_shared_instance);
            v
        })
        .collect();

    Ok(Json(items).into_response())
}
