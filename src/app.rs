use std::net::SocketAddr;

use axum::{http::HeaderValue, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::PROJECT_NAME;
use crate::state::AppState;
use crate::{assist, auth, payments, subscriptions, users};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .route("/", get(root))
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(subscriptions::router())
                .merge(payments::router())
                .merge(assist::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

async fn root() -> Json<Value> {
    Json(json!({ "message": format!("Welcome to {PROJECT_NAME} API") }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
    use tower::ServiceExt;

    use super::*;

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    fn json_req(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut b = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().uri(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::empty()).unwrap()
    }

    async fn register_and_login(app: &Router, email: &str, password: &str) -> String {
        let (status, _) = call(
            app,
            json_req(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({ "email": email, "password": password }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let form = format!("username={email}&password={password}");
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_and_welcome() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, get_req("/api/v1/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));

        let (_, body) = call(&app, get_req("/", None)).await;
        assert_eq!(body["message"], "Welcome to Ultimate Code Assistant API");
    }

    #[tokio::test]
    async fn new_account_starts_without_plan() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "dev@example.com", "password1").await;

        let (status, me) = call(&app, get_req("/api/v1/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "dev@example.com");
        assert_eq!(me["subscription_plan"], "none");
        assert!(me.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let app = build_app(AppState::fake());
        register_and_login(&app, "dev@example.com", "password1").await;
        let (status, body) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({ "email": "DEV@example.com", "password": "password2" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn wrong_password_and_missing_token_are_unauthorized() {
        let app = build_app(AppState::fake());
        register_and_login(&app, "dev@example.com", "password1").await;

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=dev@example.com&password=nope"))
            .unwrap();
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(get_req("/api/v1/auth/me", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn free_plan_is_refused_explanation() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "dev@example.com", "password1").await;
        let (status, _) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/assist/explain-code",
                Some(&token),
                json!({ "code_block": "print(1)" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn card_payment_unlocks_pro_features() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "dev@example.com", "password1").await;
        let before = OffsetDateTime::now_utc();

        let (status, body) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/payments/subscribe/stripe",
                Some(&token),
                json!({ "plan_id": "pro", "payment_method_token": "pm_card_visa" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Successfully subscribed to Pro plan via stripe.");

        let (status, st) = call(&app, get_req("/api/v1/subscriptions/status", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(st["current_plan"], "pro");
        assert_eq!(st["is_active"], true);
        let exp = OffsetDateTime::parse(st["expires_at"].as_str().unwrap(), &Rfc3339).unwrap();
        assert!(exp >= before + Duration::days(30) - Duration::seconds(1));
        assert!(exp <= OffsetDateTime::now_utc() + Duration::days(30));

        let (status, out) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/assist/refactor-code",
                Some(&token),
                json!({ "code_block": "x  = 1", "refactor_goals": ["DRY"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["changes_summary"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_gateway_leaves_plan_unchanged() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "dev@example.com", "password1").await;
        let (status, _) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/payments/subscribe/barter",
                Some(&token),
                json!({ "plan_id": "basic", "payment_method_token": "tok_visa" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, st) = call(&app, get_req("/api/v1/subscriptions/status", Some(&token))).await;
        assert_eq!(st["current_plan"], "none");
        assert_eq!(st["is_active"], false);
    }

    #[tokio::test]
    async fn declined_payment_is_bad_request() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "dev@example.com", "password1").await;
        let (status, _) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/payments/subscribe/paypal",
                Some(&token),
                json!({ "plan_id": "basic", "payment_method_token": "bogus" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_keeps_access_until_expiry() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "dev@example.com", "password1").await;
        call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/payments/subscribe/crypto",
                Some(&token),
                json!({
                    "plan_id": "premium",
                    "payment_method_token": "CRYPTO_TX_1",
                    "is_yearly": true
                }),
            ),
        )
        .await;

        let (status, body) = call(
            &app,
            json_req(Method::POST, "/api/v1/subscriptions/cancel", Some(&token), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("cancelled"));

        let (_, st) = call(&app, get_req("/api/v1/subscriptions/status", Some(&token))).await;
        assert_eq!(st["current_plan"], "premium");
        assert_eq!(st["is_active"], true);
        assert_eq!(st["auto_renew"], false);
    }

    #[tokio::test]
    async fn plans_are_public() {
        let app = build_app(AppState::fake());
        let (status, plans) = call(&app, get_req("/api/v1/subscriptions/plans", None)).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = plans
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["basic", "premium", "pro"]);
    }

    #[tokio::test]
    async fn users_cannot_read_each_other() {
        let app = build_app(AppState::fake());
        let a = register_and_login(&app, "a@example.com", "password1").await;
        let b = register_and_login(&app, "b@example.com", "password1").await;

        let (_, me_b) = call(&app, get_req("/api/v1/auth/me", Some(&b))).await;
        let b_id = me_b["id"].as_i64().unwrap();
        let (status, _) = call(&app, get_req(&format!("/api/v1/users/{b_id}"), Some(&a))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, get_req(&format!("/api/v1/users/{b_id}"), Some(&b))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn basic_generation_stops_at_daily_limit() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "dev@example.com", "password1").await;
        let (status, _) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/payments/subscribe/stripe",
                Some(&token),
                json!({ "plan_id": "basic", "payment_method_token": "tok_visa" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let limit = crate::subscriptions::catalog::get(crate::subscriptions::plan::Plan::Basic)
            .code_generation_limit;
        let generate = || {
            json_req(
                Method::POST,
                "/api/v1/assist/generate-code",
                Some(&token),
                json!({ "prompt": "hello", "language": "python" }),
            )
        };
        for _ in 0..limit {
            let (status, _) = call(&app, generate()).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = call(&app, generate()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["detail"].as_str().unwrap().contains(&limit.to_string()));

        // Basic never reaches level-1 features, whatever the meter says.
        let (status, _) = call(
            &app,
            json_req(
                Method::POST,
                "/api/v1/assist/explain-code",
                Some(&token),
                json!({ "code_block": "print(1)" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
