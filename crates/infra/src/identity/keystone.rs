//! Keystone v3 identity client.
//!
//! Only the two reads the authorizer needs are implemented: user lookup by
//! name within a domain, and project lookup by id. Requests authenticate with
//! the configured admin token in `X-Auth-Token`.
//!
//! Transport errors, non-success statuses and undecodable bodies all surface
//! as [`IdentityError::Unavailable`]. A 404 on a project lookup is `Ok(None)`.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::instrument;

use regauth_auth::{Identity, IdentityError, IdentityResolver, Project};
use regauth_core::{ProjectId, Username};

use crate::config::KeystoneConfig;

const AUTH_TOKEN_HEADER: &str = "x-auth-token";

#[derive(Debug, Clone)]
pub struct KeystoneClient {
    client: Client,
    base_url: Url,
    domain_id: String,
}

#[derive(Debug, Deserialize)]
struct ListUsersResponse {
    users: Vec<KeystoneUser>,
}

#[derive(Debug, Deserialize)]
struct KeystoneUser {
    id: String,
    name: String,
    #[serde(default)]
    default_project_id: Option<String>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ShowProjectResponse {
    project: KeystoneProject,
}

#[derive(Debug, Deserialize)]
struct KeystoneProject {
    id: String,
    name: String,
}

impl KeystoneClient {
    /// Build a client with the configured timeout and admin token.
    pub fn new(config: &KeystoneConfig) -> Result<Self, IdentityError> {
        let base_url = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| IdentityError::unavailable(format!("invalid keystone url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(IdentityError::unavailable("keystone url cannot be a base"));
        }

        let mut token = HeaderValue::from_str(config.admin_token.expose())
            .map_err(|_| IdentityError::unavailable("admin token is not a valid header value"))?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, token);

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| IdentityError::unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            domain_id: config.domain_id.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait::async_trait]
impl IdentityResolver for KeystoneClient {
    #[instrument(skip_all, fields(username = %username), err)]
    async fn find_identities(&self, username: &Username) -> Result<Vec<Identity>, IdentityError> {
        let response = self
            .client
            .get(self.endpoint(&["users"]))
            .query(&[("name", username.as_str()), ("domain_id", self.domain_id.as_str())])
            .send()
            .await
            .map_err(|e| IdentityError::unavailable(format!("user lookup failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::unavailable(format!(
                "user lookup returned status {status}"
            )));
        }

        let body: ListUsersResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::unavailable(format!("malformed user list: {e}")))?;

        let mut identities = Vec::with_capacity(body.users.len());
        for user in body.users {
            if !user.enabled {
                tracing::debug!(user_id = %user.id, "skipping disabled user");
                continue;
            }
            identities.push(into_identity(user)?);
        }
        Ok(identities)
    }

    #[instrument(skip_all, fields(project_id = %id), err)]
    async fn project(&self, id: &ProjectId) -> Result<Option<Project>, IdentityError> {
        let response = self
            .client
            .get(self.endpoint(&["projects", id.as_str()]))
            .send()
            .await
            .map_err(|e| IdentityError::unavailable(format!("project lookup failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(IdentityError::unavailable(format!(
                    "project lookup returned status {status}"
                )));
            }
            _ => {}
        }

        let body: ShowProjectResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::unavailable(format!("malformed project: {e}")))?;

        let project = body.project;
        Ok(Some(Project {
            id: project
                .id
                .parse()
                .map_err(|e| IdentityError::unavailable(format!("bad project id: {e}")))?,
            name: project
                .name
                .parse()
                .map_err(|e| IdentityError::unavailable(format!("bad project name: {e}")))?,
        }))
    }
}

fn into_identity(user: KeystoneUser) -> Result<Identity, IdentityError> {
    let username = user
        .name
        .parse()
        .map_err(|e| IdentityError::unavailable(format!("bad user name: {e}")))?;
    let default_project_id = user
        .default_project_id
        .filter(|p| !p.is_empty())
        .map(|p| p.parse())
        .transpose()
        .map_err(|e| IdentityError::unavailable(format!("bad default project id: {e}")))?;

    Ok(Identity {
        id: user.id,
        username,
        default_project_id,
    })
}
