use serde::Deserialize;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub account: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRepositoryRequest {
    pub name: String,
    pub visibility: String,
}

#[derive(Debug, Deserialize)]
pub struct RelationsQuery {
    pub project: String,
}

#[derive(Debug, Deserialize)]
pub struct RelationRequest {
    pub project: String,
    pub repo: String,
}
