use castellan_api::{app::build_app, config::ApiConfig};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build the same router as prod, bound to an ephemeral port.
        let app = build_app(ApiConfig::with_secret(jwt_secret));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn register(client: &reqwest::Client, base: &str, email: &str, password: &str) -> Value {
    let res = client
        .post(format!("{base}/auth/register"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED, "registration failed");
    res.json().await.unwrap()
}

async fn login(client: &reqwest::Client, base: &str, email: &str, password: &str) -> String {
    let res = client
        .post(format!("{base}/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "login failed");
    let body: Value = res.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_and_introspect() {
    let server = TestServer::spawn("black-box-secret").await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    // First registered account becomes the administrator.
    let created = register(&client, base, "root@example.com", "correct horse").await;
    assert_eq!(created["user"]["role"], "administrator");

    let token = login(&client, base, "root@example.com", "correct horse").await;

    let me: Value = client
        .get(format!("{base}/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["authenticated"], true);
    assert_eq!(me["role"]["name"], "administrator");
    assert_eq!(me["role"]["bypasses_permission_checks"], true);

    // Anonymous introspection is the public half of the same endpoint.
    let anon: Value = client
        .get(format!("{base}/auth/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(anon["authenticated"], false);
}

#[tokio::test]
async fn lockout_after_repeated_failures() {
    let server = TestServer::spawn("black-box-secret").await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    register(&client, base, "root@example.com", "correct horse").await;
    register(&client, base, "carol@example.com", "battery staple").await;

    for _ in 0..4 {
        let res = client
            .post(format!("{base}/auth/login"))
            .json(&json!({ "email": "carol@example.com", "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_credentials");
    }

    // The fifth failure reports the lock transition in the same response.
    let res = client
        .post(format!("{base}/auth/login"))
        .json(&json!({ "email": "carol@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "account_locked");
    assert!(body["locked_until"].is_string());

    // While locked, even the correct password is stopped at the gate.
    let res = client
        .post(format!("{base}/auth/login"))
        .json(&json!({ "email": "carol@example.com", "password": "battery staple" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "account_locked");
}

#[tokio::test]
async fn override_grants_change_access_immediately() {
    let server = TestServer::spawn("black-box-secret").await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    register(&client, base, "root@example.com", "correct horse").await;
    let admin_token = login(&client, base, "root@example.com", "correct horse").await;

    let carol = register(&client, base, "carol@example.com", "battery staple").await;
    let carol_id = carol["user"]["id"].as_str().unwrap().to_string();
    let carol_token = login(&client, base, "carol@example.com", "battery staple").await;

    // The default member role cannot list users; the denial names the
    // missing permission and the caller's resolved set.
    let res = client
        .get(format!("{base}/admin/users"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");
    assert_eq!(body["missing_permissions"], json!(["users.read"]));
    assert!(body["resolved_permissions"].is_array());

    // The administrator passes on the bypass capability alone.
    let res = client
        .get(format!("{base}/admin/users"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Grant the override; the next request resolves it immediately.
    let res = client
        .post(format!("{base}/admin/users/{carol_id}/grants"))
        .bearer_auth(&admin_token)
        .json(&json!({ "permission": "users.read" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{base}/admin/users"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Revocation wins over the role and any grant, immediately.
    let res = client
        .post(format!("{base}/admin/users/{carol_id}/revocations"))
        .bearer_auth(&admin_token)
        .json(&json!({ "permission": "users.read" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{base}/admin/users"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn self_view_is_admitted_by_ownership() {
    let server = TestServer::spawn("black-box-secret").await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let root = register(&client, base, "root@example.com", "correct horse").await;
    let root_id = root["user"]["id"].as_str().unwrap().to_string();

    let carol = register(&client, base, "carol@example.com", "battery staple").await;
    let carol_id = carol["user"]["id"].as_str().unwrap().to_string();
    let carol_token = login(&client, base, "carol@example.com", "battery staple").await;

    // Own record: admitted by ownership without `users.read`.
    let res = client
        .get(format!("{base}/admin/users/{carol_id}"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Someone else's record: denied.
    let res = client
        .get(format!("{base}/admin/users/{root_id}"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_and_catalog_administration() {
    let server = TestServer::spawn("black-box-secret").await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    register(&client, base, "root@example.com", "correct horse").await;
    let admin_token = login(&client, base, "root@example.com", "correct horse").await;

    let carol = register(&client, base, "carol@example.com", "battery staple").await;
    let carol_id = carol["user"]["id"].as_str().unwrap().to_string();
    let carol_token = login(&client, base, "carol@example.com", "battery staple").await;

    // Define a permission and a role carrying it.
    let res = client
        .post(format!("{base}/admin/permissions"))
        .bearer_auth(&admin_token)
        .json(&json!({ "id": "reports.read", "description": "View reports" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{base}/admin/roles"))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "auditor", "permissions": ["reports.read", "posts.read"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let role: Value = res.json().await.unwrap();
    let role_id = role["role"]["id"].as_str().unwrap().to_string();

    // Reassign carol; her next request resolves the new role.
    let res = client
        .put(format!("{base}/admin/users/{carol_id}/role"))
        .bearer_auth(&admin_token)
        .json(&json!({ "role_id": role_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let me: Value = client
        .get(format!("{base}/auth/me"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["role"]["name"], "auditor");
    assert!(
        me["effective_permissions"]
            .as_array()
            .unwrap()
            .contains(&json!("reports.read"))
    );

    // The referenced permission cannot be deleted while the role carries it.
    let res = client
        .delete(format!("{base}/admin/permissions/reports.read"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Nor can the role be deleted while carol holds it.
    let res = client
        .delete(format!("{base}/admin/roles/{role_id}"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Catalog deletion is restricted to the administrator role; an auditor
    // with every permission would still be turned away by the role policy.
    let res = client
        .delete(format!("{base}/admin/permissions/reports.read"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_and_malformed_tokens_are_distinguished() {
    let server = TestServer::spawn("black-box-secret").await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    register(&client, base, "root@example.com", "correct horse").await;

    // Mint an already-expired token with the server's own secret.
    let expired = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": Uuid::now_v7(),
            "iat": 1_000_000,
            "exp": 1_000_600,
        }),
        &EncodingKey::from_secret(b"black-box-secret"),
    )
    .unwrap();

    let res = client
        .get(format!("{base}/admin/users"))
        .bearer_auth(&expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "token_expired");

    let res = client
        .get(format!("{base}/admin/users"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "token_invalid");

    let res = client.get(format!("{base}/admin/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "authentication_required");
}
