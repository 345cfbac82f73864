use axum::{
    Router,
    routing::{get, post},
};

pub mod authorize;
pub mod catalog;
pub mod system;

/// Router for the decision and catalog endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/authorize", get(authorize::authorize))
        .route("/repos", post(catalog::register_repository))
        .route(
            "/rels",
            get(catalog::list_relations)
                .post(catalog::link_relation)
                .delete(catalog::unlink_relation),
        )
}
