use std::sync::Arc;

use regauth_api::app::{AppServices, build_app};
use regauth_infra::{AuthzConfig, InMemoryCatalog, InMemoryIdentityProvider};
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    catalog: Arc<InMemoryCatalog>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory collaborators, ephemeral port.
        let (services, catalog, identity) = AppServices::in_memory(&AuthzConfig::default());
        seed_identity(&identity);

        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            catalog,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn seed_identity(identity: &InMemoryIdentityProvider) {
    identity.add_project("p-a".parse().unwrap(), "team-a".parse().unwrap());
    identity.add_project("p-b".parse().unwrap(), "team-b".parse().unwrap());
    identity.add_user("alice".parse().unwrap(), Some("p-a".parse().unwrap()));
    identity.add_user("bob".parse().unwrap(), Some("p-b".parse().unwrap()));
    identity.add_user("drifter".parse().unwrap(), Some("p-gone".parse().unwrap()));
}

async fn authorize(
    client: &reqwest::Client,
    srv: &TestServer,
    account: &str,
    scope: &str,
) -> (StatusCode, Value) {
    let res = client
        .get(srv.url("/authorize"))
        .query(&[("account", account), ("scope", scope)])
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

fn allowed(body: &Value) -> Vec<&str> {
    body["allowed"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect()
}

async fn register(client: &reqwest::Client, srv: &TestServer, name: &str, visibility: &str) {
    let res = client
        .post(srv.url("/repos"))
        .json(&json!({ "name": name, "visibility": visibility }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

async fn link(client: &reqwest::Client, srv: &TestServer, project: &str, repo: &str) {
    let res = client
        .post(srv.url("/rels"))
        .json(&json!({ "project": project, "repo": repo }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn unregistered_repository_grants_nothing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = authorize(&client, &srv, "bob", "repository:someone/app:push,pull").await;
    assert_eq!(status, StatusCode::OK);
    assert!(allowed(&body).is_empty());
    assert_eq!(body["rule"], "unregistered_repository");
}

#[tokio::test]
async fn private_repository_follows_project_membership() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    register(&client, &srv, "team-a/app", "private").await;
    link(&client, &srv, "team-a", "team-a/app").await;

    let (status, body) = authorize(&client, &srv, "alice", "repository:team-a/app:pull,push").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(allowed(&body), vec!["pull", "push"]);
    assert_eq!(body["rule"], "project_member");

    let (status, body) = authorize(&client, &srv, "bob", "repository:team-a/app:pull").await;
    assert_eq!(status, StatusCode::OK);
    assert!(allowed(&body).is_empty());
    assert_eq!(body["rule"], "not_project_member");

    let (_, body) = authorize(&client, &srv, "admin", "repository:team-a/app:*").await;
    assert_eq!(allowed(&body), vec!["*"]);
}

#[tokio::test]
async fn public_repository_is_read_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    register(&client, &srv, "library/base", "public").await;

    let (status, body) = authorize(&client, &srv, "bob", "repository:library/base:pull").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(allowed(&body), vec!["pull"]);
    assert_eq!(body["rule"], "public_read");

    // A write anywhere in the request denies the whole request.
    let (status, body) = authorize(&client, &srv, "bob", "repository:library/base:pull,push").await;
    assert_eq!(status, StatusCode::OK);
    assert!(allowed(&body).is_empty());
    assert_eq!(body["rule"], "public_write_denied");
}

#[tokio::test]
async fn unlink_revokes_access_and_relations_are_listed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    register(&client, &srv, "team-a/app", "private").await;
    link(&client, &srv, "team-a", "team-a/app").await;
    link(&client, &srv, "team-a", "team-a/lib").await;

    let res = client
        .delete(srv.url("/rels"))
        .json(&json!({ "project": "team-a", "repo": "team-a/app" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (_, body) = authorize(&client, &srv, "alice", "repository:team-a/app:pull").await;
    assert!(allowed(&body).is_empty());

    let res = client
        .get(srv.url("/rels"))
        .query(&[("project", "team-a")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let relations: Value = res.json().await.unwrap();
    let relations = relations.as_array().unwrap();
    assert_eq!(relations.len(), 2);
    assert_eq!(relations[0]["repository"], "team-a/app");
    assert_eq!(relations[0]["status"], "non_existent");
    assert_eq!(relations[1]["status"], "exists");
}

#[tokio::test]
async fn registry_scope_requires_admin() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = authorize(&client, &srv, "alice", "registry:catalog:*").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission_denied");
    assert!(allowed(&body).is_empty());

    let (status, body) = authorize(&client, &srv, "admin", "registry:catalog:*").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(allowed(&body), vec!["*"]);
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = authorize(&client, &srv, "alice", "image:foo:pull").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_resource_type");

    let (status, body) = authorize(&client, &srv, "alice", "repository:Not Valid:pull").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let res = client
        .get(srv.url("/authorize"))
        .query(&[("account", "alice")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/repos"))
        .json(&json!({ "name": "app", "visibility": "internal" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_field");
}

#[tokio::test]
async fn collaborator_failures_fail_closed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    register(&client, &srv, "team-a/app", "private").await;

    srv.catalog.set_unavailable(true);
    let (status, body) = authorize(&client, &srv, "alice", "repository:team-a/app:pull").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "catalog_unavailable");
    assert!(allowed(&body).is_empty());

    let res = client
        .post(srv.url("/repos"))
        .json(&json!({ "name": "other", "visibility": "public" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    srv.catalog.set_unavailable(false);

    let (status, body) = authorize(&client, &srv, "drifter", "repository:team-a/app:pull").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "project_not_found");
    assert!(allowed(&body).is_empty());
}
