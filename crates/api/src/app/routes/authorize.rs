use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use regauth_core::Username;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// `GET /authorize?account=&scope=`: the allowed subset of a token scope.
pub async fn authorize(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::AuthorizeQuery>,
) -> axum::response::Response {
    let (Some(account), Some(scope)) = (query.account, query.scope) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_parameter",
            "account and scope are required",
        );
    };
    let account: Username = match errors::parse_field("account", &account) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let principal = services.accounts().principal(account);
    match services.engine().authorize_scope(principal, &scope).await {
        Ok(decision) => Json(decision).into_response(),
        Err(e) => errors::authz_error_to_response(&e),
    }
}
