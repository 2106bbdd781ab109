use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use modelhub::config::Config;
use modelhub::server;

const ADMIN_EMAIL: &str = "admin@x.com";
const ADMIN_PASSWORD: &str = "root-pw";

struct TestServer {
    _tmp: TempDir,
    handle: JoinHandle<()>,
    base: String,
    http: Client,
}

impl Drop for TestServer {
    fn drop(&mut self) { self.handle.abort(); }
}

// Start the router on an ephemeral localhost port over a fresh data dir.
async fn start() -> TestServer {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = Config::for_data_dir(tmp.path(), "http-test-secret").with_admin(ADMIN_EMAIL, ADMIN_PASSWORD);
    let (state, _) = server::prepare(&cfg).expect("prepare state");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            eprintln!("server task error: {e:?}");
        }
    });
    TestServer { _tmp: tmp, handle, base: format!("http://127.0.0.1:{}", port), http: Client::new() }
}

impl TestServer {
    fn url(&self, path: &str) -> String { format!("{}{}", self.base, path) }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.http.post(self.url(path)).json(&body);
        if let Some(t) = token { req = req.bearer_auth(t); }
        let resp = req.send().await.expect("send");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.http.get(self.url(path));
        if let Some(t) = token { req = req.bearer_auth(t); }
        let resp = req.send().await.expect("send");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.http.delete(self.url(path));
        if let Some(t) = token { req = req.bearer_auth(t); }
        let resp = req.send().await.expect("send");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn signin(&self, email: &str, password: &str) -> String {
        let (status, body) = self.post("/signin", None, json!({"email": email, "password": password})).await;
        assert_eq!(status, StatusCode::CREATED, "signin {email}: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn login(&self, email: &str, password: &str) -> Value {
        let (status, body) = self.post("/login", None, json!({"email": email, "password": password})).await;
        assert_eq!(status, StatusCode::OK, "login {email}: {body}");
        body
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn liveness_and_home() {
    let srv = start().await;
    let text = srv.http.get(srv.url("/")).send().await.unwrap().text().await.unwrap();
    assert_eq!(text, "modelhub ok");
    let (status, body) = srv.get("/home", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn signin_returns_user_without_digest() {
    let srv = start().await;
    let (status, body) = srv.post("/signin", None, json!({"email": "A@X.com ", "password": "pw1"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["is_admin"], false);
    assert!(body["user"].get("password_digest").is_none());
    assert_eq!(body["token_type"], "bearer");

    let (status, body) = srv.post("/signin", None, json!({"email": "a@x.com", "password": "other"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "duplicate_email");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_and_token_routes() {
    let srv = start().await;
    srv.signin("a@x.com", "pw1").await;

    let body = srv.login("a@x.com", "pw1").await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["redirect_url"], "/dashboard");
    assert!(body["expires_at"].is_string());

    let (status, body) = srv.post("/token", None, json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect_url"], "/admin");

    let (status, wrong) = srv.post("/login", None, json!({"email": "a@x.com", "password": "nope"})).await;
    let (status2, unknown) = srv.post("/login", None, json!({"email": "z@x.com", "password": "pw1"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(status2, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong["code"], "invalid_credentials");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn protected_routes_need_a_valid_token() {
    let srv = start().await;
    let (status, body) = srv.get("/datasets", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = srv.get("/datasets", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = srv.post("/models", None, json!({"name": "m1"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_bodies_are_validation_errors() {
    let srv = start().await;
    let tok = srv.signin("a@x.com", "pw1").await;
    let (status, body) = srv.post("/datasets", Some(&tok), json!({"title": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = srv.post("/datasets", Some(&tok), json!({"name": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = srv.get("/datasets/abc", Some(&tok)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ownership_scenario_end_to_end() {
    let srv = start().await;
    let a = srv.signin("a@x.com", "pw1").await;
    let b = srv.signin("b@x.com", "pw2").await;
    let admin = srv.login(ADMIN_EMAIL, ADMIN_PASSWORD).await["access_token"].as_str().unwrap().to_string();

    let (status, m1) = srv.post("/models", Some(&a), json!({"name": "m1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(m1["user_is_admin"], false);
    let (_, d1) = srv.post("/datasets", Some(&a), json!({"name": "d1"})).await;

    let (status, t) = srv
        .post("/trainings", Some(&a), json!({"training_name": "run-1", "model_id": m1["id"], "dataset_id": d1["id"]}))
        .await;
    assert_eq!(status, StatusCode::OK, "{t}");
    assert_eq!(t["name"], "run-1");
    assert_eq!(t["model_name"], "m1");
    assert_eq!(t["dataset_name"], "d1");
    let p = t["precision"].as_f64().unwrap();
    let r = t["recall"].as_f64().unwrap();
    assert!((0.0..1.0).contains(&p) && (0.0..1.0).contains(&r));

    let (_, b_list) = srv.get("/trainings", Some(&b)).await;
    assert_eq!(b_list, json!([]));
    let (_, admin_list) = srv.get("/trainings", Some(&admin)).await;
    assert_eq!(admin_list.as_array().unwrap().len(), 1);
    let (_, a_list) = srv.get("/trainings", Some(&a)).await;
    assert_eq!(a_list, json!([t.clone()]));

    let tid = t["id"].as_i64().unwrap();
    let (status, body) = srv.get(&format!("/trainings/{}", tid), Some(&b)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], format!("Training with ID {} not found", tid));

    // b may not train on a's assets
    let (status, body) = srv
        .post("/trainings", Some(&b), json!({"name": "steal", "model_id": m1["id"], "dataset_id": d1["id"]}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], format!("Model with ID {} not found", m1["id"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_routes_scope_and_report() {
    let srv = start().await;
    let a = srv.signin("a@x.com", "pw1").await;
    let b = srv.signin("b@x.com", "pw2").await;
    let (_, d) = srv.post("/datasets", Some(&a), json!({"name": "d1"})).await;
    let id = d["id"].as_i64().unwrap();

    let (status, _) = srv.delete(&format!("/datasets/{}", id), Some(&b)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = srv.delete(&format!("/datasets/{}", id), Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("Dataset with ID {} deleted successfully", id));
    let (status, _) = srv.delete(&format!("/datasets/{}", id), Some(&a)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn admin_routes_reject_regular_users() {
    let srv = start().await;
    let a = srv.signin("a@x.com", "pw1").await;
    for path in ["/admin/users", "/admin/datasets", "/admin/models", "/admin/trainings"] {
        let (status, body) = srv.get(path, Some(&a)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
        assert_eq!(body["code"], "forbidden");
    }
    let (status, _) = srv.post("/admin/datasets", Some(&a), json!({"name": "x"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = srv.get("/admin/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn admin_manages_resources_and_users() {
    let srv = start().await;
    let a = srv.signin("a@x.com", "pw1").await;
    let admin = srv.login(ADMIN_EMAIL, ADMIN_PASSWORD).await["access_token"].as_str().unwrap().to_string();

    let (_, mine) = srv.post("/models", Some(&a), json!({"name": "m-a"})).await;
    let (status, theirs) = srv.post("/admin/models", Some(&admin), json!({"name": "m-admin"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(theirs["user_is_admin"], true);

    let (_, all) = srv.get("/admin/models", Some(&admin)).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    let (status, got) = srv.get(&format!("/admin/models/{}", mine["id"]), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(got["name"], "m-a");

    let (_, users) = srv.get("/admin/users", Some(&admin)).await;
    let emails: Vec<&str> = users.as_array().unwrap().iter().map(|u| u["email"].as_str().unwrap()).collect();
    assert_eq!(emails, vec![ADMIN_EMAIL, "a@x.com"]);
    assert!(users[0].get("password_digest").is_none());

    let (status, body) = srv.post("/admin/users/delete/a@x.com", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User a@x.com has been deleted");

    // the deleted account's token stops working at once
    let (status, _) = srv.get("/users/me", Some(&a)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = srv.delete("/admin/users/a@x.com", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // no cascade: the model survives its owner
    let (status, orphan) = srv.get(&format!("/admin/models/{}", mine["id"]), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orphan["user_is_admin"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn me_and_logout() {
    let srv = start().await;
    let a = srv.signin("a@x.com", "pw1").await;
    let (status, me) = srv.get("/users/me", Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");
    assert!(me.get("password_digest").is_none());

    let (status, body) = srv.post("/logout", Some(&a), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout successful");
    // stateless: the token remains valid until it expires
    let (status, _) = srv.get("/users/me", Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
}
