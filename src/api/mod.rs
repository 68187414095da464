//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod auth;
pub mod containers;
pub mod database;
pub mod health;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的 API 路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .merge(health::router())
        // Login / Session
        .merge(auth::router())
        // Containers
        .merge(containers::router())
        // PostgreSQL
        .merge(database::router())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{header, HeaderMap, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::{EnvConfig, PanelConfig};
    use crate::domain::database::RECORD_SEPARATOR;
    use crate::infra::fake::ScriptedExecutor;
    use crate::infra::CommandOutcome;
    use crate::services::password::hash_password_with;

    const PASSWORD: &str = "correct horse";
    const LISTING: &str = concat!(
        r#"{"ID":"aaa111aaa111aaa1","Names":"web1","Image":"nginx:alpine","State":"running","Ports":"0.0.0.0:8001->80/tcp"}"#,
        "\n",
    );

    struct Harness {
        app: Router,
        state: Arc<AppState>,
        executor: Arc<ScriptedExecutor>,
        _root: TempDir,
    }

    fn harness(admin_configured: bool) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let mut panel = PanelConfig::default();
        if admin_configured {
            panel.admin.password_hash = Some(hash_password_with(PASSWORD, 1));
        }
        let executor = Arc::new(ScriptedExecutor::new());
        executor.on(&["docker", "ps"], CommandOutcome::success(LISTING));

        let state = Arc::new(
            AppState::new(EnvConfig::for_root(root.path()), panel, executor.clone())
                .with_auth_failure_delay(Duration::ZERO),
        );
        Harness {
            app: router(state.clone()),
            state,
            executor,
            _root: root,
        }
    }

    fn request(method: Method, uri: &str, ip: &str, body: Option<Value>) -> Request<Body> {
        let addr: SocketAddr = format!("{}:40000", ip).parse().unwrap();
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .extension(ConnectInfo(addr))
            .header(header::USER_AGENT, "router-test");
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
        req.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        req
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    async fn login(h: &Harness, ip: &str, password: &str) -> (StatusCode, HeaderMap, Value) {
        send(
            &h.app,
            request(
                Method::POST,
                "/api/login",
                ip,
                Some(json!({"username": "admin", "password": password})),
            ),
        )
        .await
    }

    async fn token(h: &Harness) -> String {
        let (status, _, body) = login(h, "10.0.0.1", PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let h = harness(false);
        let (status, _, body) = send(&h.app, request(Method::GET, "/health", "10.0.0.1", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["containers_cached"], 0);
        assert!(h.executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_protected_route_requires_session() {
        let h = harness(true);
        let (status, _, body) =
            send(&h.app, request(Method::GET, "/api/containers", "10.0.0.1", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");
        assert_eq!(body["success"], false);

        let req = with_bearer(
            request(Method::GET, "/api/containers", "10.0.0.1", None),
            "forged",
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "session_expired");
        assert!(h.executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_login_and_list_containers() {
        let h = harness(true);
        let (status, headers, body) = login(&h, "10.0.0.1", PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], "admin");
        assert!(body["csrf_token"].as_str().is_some_and(|t| !t.is_empty()));
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("notacpanel_session="));
        assert!(cookie.contains("HttpOnly"));

        let token = body["token"].as_str().unwrap();
        let req = with_bearer(request(Method::GET, "/api/containers", "10.0.0.1", None), token);
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["containers"][0]["name"], "web1");
        assert_eq!(body["containers"][0]["status"], "running");
        assert_eq!(body["containers"][0]["parsed_ports"][0]["host_port"], 8001);
    }

    #[tokio::test]
    async fn test_cookie_session_and_logout() {
        let h = harness(true);
        let (_, headers, _) = login(&h, "10.0.0.1", PASSWORD).await;
        let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let mut req = request(Method::GET, "/api/session", "10.0.0.1", None);
        req.headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], "admin");

        let mut req = request(Method::POST, "/api/logout", "10.0.0.1", None);
        req.headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        let (status, headers, _) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
        assert!(h.state.sessions.is_empty().await);

        let mut req = request(Method::GET, "/api/session", "10.0.0.1", None);
        req.headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "session_expired");
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let h = harness(true);
        let (status, _, body) = send(
            &h.app,
            request(Method::POST, "/api/login", "10.0.0.1", Some(json!({"username": "admin"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username and password required");
    }

    #[tokio::test]
    async fn test_login_without_configured_admin() {
        let h = harness(false);
        let (status, _, body) = login(&h, "10.0.0.1", PASSWORD).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "configuration");
    }

    #[tokio::test]
    async fn test_invalid_credentials_do_not_reveal_factor() {
        let h = harness(true);
        let (status, _, wrong_password) = login(&h, "10.0.0.2", "nope").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, wrong_user) = send(
            &h.app,
            request(
                Method::POST,
                "/api/login",
                "10.0.0.2",
                Some(json!({"username": "root", "password": PASSWORD})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password, wrong_user);
        assert_eq!(h.state.lockouts.failures("10.0.0.2").await, Some(2));
    }

    #[tokio::test]
    async fn test_sixth_attempt_is_locked_out() {
        let h = harness(true);
        for _ in 0..5 {
            let (status, _, _) = login(&h, "1.2.3.4", "wrong").await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, _, body) = login(&h, "1.2.3.4", PASSWORD).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["kind"], "locked_out");
        assert_eq!(h.state.lockouts.failures("1.2.3.4").await, Some(5));
        assert!(h.state.sessions.is_empty().await);

        // 其他 IP 不受影响
        let (status, _, _) = login(&h, "5.6.7.8", PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_success_clears_failures_then_session_expires() {
        let h = harness(true);
        for _ in 0..2 {
            login(&h, "1.2.3.4", "wrong").await;
        }
        let (status, _, body) = login(&h, "1.2.3.4", PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.state.lockouts.failures("1.2.3.4").await, None);
        let token = body["token"].as_str().unwrap().to_string();

        let later = chrono::Utc::now() + chrono::Duration::hours(4) + chrono::Duration::minutes(1);
        assert!(h.state.sessions.validate_at(&token, later).await.is_none());

        let req = with_bearer(request(Method::GET, "/api/containers", "1.2.3.4", None), &token);
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "session_expired");
    }

    #[tokio::test]
    async fn test_create_container_validates_port() {
        let h = harness(true);
        let token = token(&h).await;

        let req = with_bearer(
            request(
                Method::POST,
                "/api/containers",
                "10.0.0.1",
                Some(json!({"name": "web9", "port": "eighty"})),
            ),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Port must be a valid number");

        let req = with_bearer(
            request(
                Method::POST,
                "/api/containers",
                "10.0.0.1",
                Some(json!({"name": "web9", "port": 70000})),
            ),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Port must be between 1 and 65535");
        assert_eq!(h.executor.count(&["docker", "run"]), 0);
    }

    #[tokio::test]
    async fn test_create_container_defaults() {
        let h = harness(true);
        h.executor.on(
            &["docker", "run"],
            CommandOutcome::success("0123456789abcdef0123456789abcdef\n"),
        );
        let token = token(&h).await;
        h.state.containers.list().await.unwrap();

        let req = with_bearer(
            request(
                Method::POST,
                "/api/containers",
                "10.0.0.1",
                Some(json!({"name": "  site2 "})),
            ),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Container \"site2\" created successfully");
        assert_eq!(body["container_id"], "0123456789ab");

        let run = h
            .executor
            .calls()
            .into_iter()
            .find(|c| c.argv[1] == "run")
            .unwrap();
        assert_eq!(run.argv.last().unwrap(), "nginx:alpine");
        assert!(run.argv.windows(2).any(|w| w == ["-p", "8002:80"]));
    }

    #[tokio::test]
    async fn test_remove_unknown_container_is_not_found() {
        let h = harness(true);
        let token = token(&h).await;
        h.state.containers.list().await.unwrap();

        let req = with_bearer(
            request(Method::DELETE, "/api/containers/ghost", "10.0.0.1", None),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
        assert_eq!(h.executor.count(&["docker", "rm"]), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported_verbatim() {
        let h = harness(true);
        h.executor.on(
            &["docker", "start"],
            CommandOutcome::failure(1, "Error response from daemon: No such container: web7\n"),
        );
        let token = token(&h).await;

        let req = with_bearer(
            request(Method::POST, "/api/containers/web7/start", "10.0.0.1", None),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "execution");
        assert_eq!(body["exit_code"], 1);
        assert_eq!(
            body["error"],
            "Error response from daemon: No such container: web7"
        );
    }

    #[tokio::test]
    async fn test_restart_container() {
        let h = harness(true);
        let token = token(&h).await;

        let req = with_bearer(
            request(Method::POST, "/api/containers/web1/restart", "10.0.0.1", None),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Container \"web1\" restarted successfully");
        assert_eq!(h.executor.count(&["docker", "restart", "web1"]), 1);
    }

    #[tokio::test]
    async fn test_postgres_execute() {
        let h = harness(true);
        h.executor.on(
            &["psql"],
            CommandOutcome::success(format!("n{}1\n", RECORD_SEPARATOR)),
        );
        let token = token(&h).await;

        let req = with_bearer(
            request(
                Method::POST,
                "/api/postgresql/execute",
                "10.0.0.1",
                Some(json!({"database": "notacpanel"})),
            ),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Database and query are required");

        let req = with_bearer(
            request(
                Method::POST,
                "/api/postgresql/execute",
                "10.0.0.1",
                Some(json!({"database": "notacpanel", "query": "SELECT 1 AS n"})),
            ),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["columns"], json!(["n"]));
        assert_eq!(body["row_count"], 1);
        assert_eq!(body["data"][0]["n"], "1");
    }

    #[tokio::test]
    async fn test_authenticated_request_extends_session() {
        let h = harness(true);
        let token = token(&h).await;
        let now = chrono::Utc::now();
        assert!(h.state.sessions.touch_at(&token, now - chrono::Duration::hours(3)).await);

        let req = with_bearer(request(Method::GET, "/api/session", "10.0.0.1", None), &token);
        let (status, _, _) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);

        // 未刷新时最后活动在 5 小时前，已超过 4 小时超时
        assert!(h
            .state
            .sessions
            .validate_at(&token, now + chrono::Duration::hours(2))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let h = harness(true);
        let token = token(&h).await;

        let mut req = request(Method::POST, "/api/login", "10.0.0.2", None);
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            "application/json".parse().unwrap(),
        );
        *req.body_mut() = Body::from("{\"username\": ");
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "validation");
        assert!(h.state.lockouts.failures("10.0.0.2").await.is_none());

        let req = with_bearer(
            request(
                Method::POST,
                "/api/containers",
                "10.0.0.1",
                Some(json!({"name": ["not", "a", "string"]})),
            ),
            &token,
        );
        let (status, _, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
        assert_eq!(h.executor.count(&["docker", "run"]), 0);
    }
}
