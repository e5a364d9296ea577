use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};

use promostock_infra::projections::TransactionFilter;

use crate::app::routes::common::{ApiQuery, ApiResult};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_transactions))
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(query): ApiQuery<dto::HistoryQuery>,
) -> ApiResult {
    history(&services, &tenant, query)
}

/// Shared by `/transactions` and `/promoters/:id/history`.
pub(crate) fn history(services: &AppServices, tenant: &TenantContext, query: dto::HistoryQuery) -> ApiResult {
    let filter = TransactionFilter {
        kind: query.kind,
        promoter_id: query.promoter_id,
        employee_id: query.employee_id,
        item_id: query.item_id,
        brand_id: query.brand_id,
        from: parse_time("from", query.from.as_deref())?,
        to: parse_time("to", query.to.as_deref())?,
        q: query.q.filter(|q| !q.trim().is_empty()),
    };

    let page = services
        .stock()
        .transaction_history(tenant.tenant_id(), &filter, query.page, query.page_size);

    Ok(Json(page).into_response())
}

fn parse_time(field: &'static str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, Response> {
    raw.map(|v| {
        DateTime::parse_from_rfc3339(v)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| errors::bad_request("invalid_timestamp", format!("{field}: {e}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_rfc3339() {
        assert!(matches!(parse_time("from", None), Ok(None)));
        let Ok(Some(t)) = parse_time("from", Some("2024-03-01T10:00:00+02:00")) else {
            panic!("valid timestamp rejected");
        };
        assert_eq!(t.to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert!(parse_time("to", Some("yesterday")).is_err());
    }
}
