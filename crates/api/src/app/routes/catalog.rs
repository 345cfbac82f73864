use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use regauth_auth::Visibility;
use regauth_core::{ProjectName, RepositoryName};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn register_repository(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRepositoryRequest>,
) -> axum::response::Response {
    let name: RepositoryName = match errors::parse_field("name", &body.name) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let visibility: Visibility = match errors::parse_field("visibility", &body.visibility) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Err(e) = services.catalog().register_repository(&name, visibility).await {
        return errors::catalog_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "name": name,
            "visibility": visibility,
        })),
    )
        .into_response()
}

pub async fn list_relations(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::RelationsQuery>,
) -> axum::response::Response {
    let project: ProjectName = match errors::parse_field("project", &query.project) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog().relations_for_project(&project).await {
        Ok(relations) => Json(relations).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn link_relation(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RelationRequest>,
) -> axum::response::Response {
    let (project, repo) = match parse_relation(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog().link_project_repository(&project, &repo).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn unlink_relation(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RelationRequest>,
) -> axum::response::Response {
    let (project, repo) = match parse_relation(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog().unlink_project_repository(&project, &repo).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

fn parse_relation(
    body: &dto::RelationRequest,
) -> Result<(ProjectName, RepositoryName), axum::response::Response> {
    Ok((
        errors::parse_field("project", &body.project)?,
        errors::parse_field("repo", &body.repo)?,
    ))
}
