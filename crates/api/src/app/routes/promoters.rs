use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use promostock_auth::Permission;
use promostock_infra::services::NewPromoter;

use crate::app::routes::common::{self, ApiJson, ApiQuery, ApiResult, guard};
use crate::app::routes::transactions;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_promoters).post(create_promoter))
        .route("/:id", get(get_promoter).put(update_promoter).delete(delete_promoter))
        .route("/:id/active", post(set_active))
        .route("/:id/inventory", get(inventory))
        .route("/:id/history", get(history))
        .route("/:id/return-all", post(return_all))
        .route("/:id/returns", post(return_selected))
}

pub async fn list_promoters(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> impl IntoResponse {
    let promoters: Vec<_> = services
        .stock()
        .projections()
        .promoters()
        .list(tenant.tenant_id())
        .iter()
        .map(|r| dto::promoter_to_json(&r.state))
        .collect();
    Json(promoters)
}

pub async fn create_promoter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::PromoterRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::PROMOTERS_MANAGE)?;

    let promoter = services
        .stock()
        .create_promoter(
            tenant.tenant_id(),
            NewPromoter {
                name: body.name,
                contact: body.contact,
            },
        )
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(dto::promoter_to_json(&promoter))).into_response())
}

pub async fn get_promoter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let promoter_id = common::promoter_id(&id)?;
    let record = services
        .stock()
        .projections()
        .promoters()
        .get(tenant.tenant_id(), promoter_id)
        .ok_or_else(|| errors::not_found("promoter"))?;

    Ok(Json(dto::promoter_to_json(&record.state)).into_response())
}

pub async fn update_promoter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdatePromoterRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::PROMOTERS_MANAGE)?;
    let promoter_id = common::promoter_id(&id)?;

    let promoter = services
        .stock()
        .update_promoter(tenant.tenant_id(), promoter_id, body.name, body.contact)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::promoter_to_json(&promoter)).into_response())
}

pub async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SetActiveRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::PROMOTERS_MANAGE)?;
    let promoter_id = common::promoter_id(&id)?;

    let promoter = services
        .stock()
        .set_promoter_active(tenant.tenant_id(), promoter_id, body.active, body.force)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::promoter_to_json(&promoter)).into_response())
}

pub async fn delete_promoter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::PROMOTERS_MANAGE)?;
    let promoter_id = common::promoter_id(&id)?;

    services
        .stock()
        .delete_promoter(tenant.tenant_id(), promoter_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let promoter_id = common::promoter_id(&id)?;
    let projections = services.stock().projections();
    if projections
        .promoters()
        .get(tenant.tenant_id(), promoter_id)
        .is_none()
    {
        return Err(errors::not_found("promoter"));
    }

    let inventory = projections.holdings().inventory(tenant.tenant_id(), promoter_id);
    Ok(Json(dto::inventory_to_json(projections, tenant.tenant_id(), &inventory)).into_response())
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<dto::HistoryQuery>,
) -> ApiResult {
    let promoter_id = common::promoter_id(&id)?;
    // Deleted promoters keep their history; unknown ids do not have one.
    if services
        .stock()
        .projections()
        .promoters()
        .get_including_deleted(tenant.tenant_id(), promoter_id)
        .is_none()
    {
        return Err(errors::not_found("promoter"));
    }

    transactions::history(
        &services,
        &tenant,
        dto::HistoryQuery {
            promoter_id: Some(promoter_id),
            ..query
        },
    )
}

pub async fn return_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::STOCK_MOVE)?;
    let promoter_id = common::promoter_id(&id)?;

    let report = services
        .stock()
        .return_all(tenant.tenant_id(), principal.user_id(), promoter_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::report_to_json(&report)).into_response())
}

pub async fn return_selected(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SelectedReturnRequest>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::STOCK_MOVE)?;
    let promoter_id = common::promoter_id(&id)?;
    let selection: Vec<_> = body.lines.iter().map(|l| (l.item_id, l.size_id)).collect();

    let report = services
        .stock()
        .return_selected(tenant.tenant_id(), principal.user_id(), promoter_id, &selection)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::report_to_json(&report)).into_response())
}
