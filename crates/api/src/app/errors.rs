use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use regauth_auth::{AuthzError, CatalogError, ErrorKind};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Authorization failures always carry an empty allowed list.
pub fn authz_error_to_response(err: &AuthzError) -> axum::response::Response {
    let (status, code) = match err.kind() {
        ErrorKind::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied"),
        ErrorKind::UnsupportedResourceType => (StatusCode::BAD_REQUEST, "unsupported_resource_type"),
        ErrorKind::InvalidRequest => (StatusCode::BAD_REQUEST, "invalid_request"),
        ErrorKind::IdentityNotFound => (StatusCode::FORBIDDEN, "identity_not_found"),
        ErrorKind::ProjectNotFound => (StatusCode::FORBIDDEN, "project_not_found"),
        ErrorKind::IdentityProviderUnavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "identity_provider_unavailable")
        }
        ErrorKind::CatalogUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "catalog_unavailable"),
        ErrorKind::TimedOut => (StatusCode::SERVICE_UNAVAILABLE, "timed_out"),
    };

    (
        status,
        axum::Json(json!({
            "error": code,
            "message": err.to_string(),
            "allowed": [],
        })),
    )
        .into_response()
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::Unavailable { .. } => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "catalog_unavailable",
            err.to_string(),
        ),
        CatalogError::InvalidRecord(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invalid_record", msg)
        }
    }
}

/// Parse a request field, mapping failures to a 400.
pub fn parse_field<T>(field: &'static str, raw: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse::<T>().map_err(|e| {
        json_error(StatusCode::BAD_REQUEST, "invalid_field", format!("{field}: {e}"))
    })
}
