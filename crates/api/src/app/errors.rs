use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use promostock_auth::AuthzError;
use promostock_infra::ServiceError;
use promostock_infra::command_dispatcher::DispatchError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Dispatch(e) => dispatch_error_to_response(e),
        ServiceError::PromoterHoldsStock { .. } => {
            json_error(StatusCode::CONFLICT, "promoter_holds_stock", err.to_string())
        }
        ServiceError::PromoterInactive(_) => {
            json_error(StatusCode::CONFLICT, "promoter_inactive", err.to_string())
        }
        ServiceError::BrandHasItems { .. } => {
            json_error(StatusCode::CONFLICT, "brand_has_items", err.to_string())
        }
        ServiceError::Projection(e) => {
            tracing::error!(error = %e, "read model failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "read_model_error", e.to_string())
        }
    }
}

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    let message = err.to_string();
    match err {
        DispatchError::Concurrency(_) => json_error(StatusCode::CONFLICT, "concurrency_conflict", message),
        DispatchError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DispatchError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        DispatchError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DispatchError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        DispatchError::InsufficientHoldings { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_holdings", message)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", message),
        DispatchError::TenantIsolation(_) => json_error(StatusCode::FORBIDDEN, "tenant_isolation", message),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DispatchError::Deserialize(_) | DispatchError::Store(_) => {
            tracing::error!(error = %message, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
        DispatchError::Publish(_) => json_error(StatusCode::BAD_GATEWAY, "publish_error", message),
    }
}

pub fn authz_error_to_response(err: AuthzError) -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn not_found(what: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn bad_request(code: &'static str, message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, code, message)
}
