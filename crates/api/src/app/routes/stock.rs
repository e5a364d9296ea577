use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::IntoResponse,
    routing::post,
};

use promostock_auth::Permission;
use promostock_infra::services::BatchRequest;

use crate::app::routes::common::{ApiJson, ApiResult, guard};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/batch", post(batch))
}

/// Mass edit. Always answers with a per-line report once the batch ran.
pub async fn batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::BatchRequestBody>,
) -> ApiResult {
    guard(&tenant, &principal, &Permission::STOCK_MOVE)?;

    let report = services
        .stock()
        .batch(
            tenant.tenant_id(),
            principal.user_id(),
            BatchRequest {
                action: body.action,
                promoter_id: body.promoter_id,
                notes: body.notes,
                lines: body.lines,
            },
        )
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(Json(dto::report_to_json(&report)).into_response())
}
