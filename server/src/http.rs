use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{self, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use platform_authz::{AccessPolicy, gate::API_PREFIX, resource_categories};
use platform_db::DbPool;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    gate::{Identity, PATHNAME_HEADER, request_gate},
    graphql::{RequestUser, SchemaType},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
    pub policy: Arc<AccessPolicy>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "back-office server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    // Credentials cannot be combined with a wildcard origin.
    let (allow_origin, credentials) = if allowed.is_empty() {
        (AllowOrigin::any(), false)
    } else {
        (AllowOrigin::list(allowed), true)
    };
    CorsLayer::new()
        .allow_credentials(credentials)
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

/// Routes behind the request gate. The gate wraps the fallback too, so
/// unknown paths are denied before they reach a 404.
pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/login", get(login_page))
        .route("/dashboard/unauthorized", get(unauthorized_page))
        .route("/api/graphql", get(graphiql).post(graphql_handler))
        .route("/api/me", get(me_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(state.clone(), request_gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

async fn graphql_handler(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut req = request.into_inner();
    if let Some(Extension(identity)) = identity {
        req = req.data(RequestUser {
            id: identity.user_id,
        });
    }
    state.schema.execute(req).await.into()
}

#[derive(Serialize)]
struct MeResponse {
    id: Uuid,
    resources: Vec<&'static str>,
}

/// Caller id and the categories its current permissions unlock.
async fn me_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match platform_db::load_effective_permissions(&state.pool, identity.user_id).await {
        Ok(permissions) => Json(MeResponse {
            id: identity.user_id,
            resources: resource_categories(&permissions)
                .into_iter()
                .map(|resource| resource.as_str())
                .collect(),
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(user_id = %identity.user_id, error = %err, "permission lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal" })),
            )
                .into_response()
        }
    }
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/api/graphql").finish())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.pool.ping().await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

#[derive(Deserialize)]
struct LoginQuery {
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
}

async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    let callback = query.callback_url.unwrap_or_else(|| "/dashboard".into());
    Html(format!(
        "<!doctype html><title>Sign in</title><main data-callback=\"{}\">Sign in to continue</main>",
        escape_html(&callback)
    ))
}

async fn unauthorized_page() -> (StatusCode, Html<&'static str>) {
    (
        StatusCode::OK,
        Html("<!doctype html><title>Unauthorized</title><main>You do not have access to this page.</main>"),
    )
}

/// Dashboard pages render a shell; unknown API routes get a JSON 404.
async fn fallback_handler(uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path();
    if path.starts_with(API_PREFIX) {
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))
            .into_response();
    }
    if path == "/dashboard" || path.starts_with("/dashboard/") {
        let pathname = headers
            .get(&PATHNAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(path);
        return Html(format!(
            "<!doctype html><title>Dashboard</title><main data-pathname=\"{}\"></main>",
            escape_html(pathname)
        ))
        .into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install signal handler"),
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use platform_authn::{AuthConfig, issue_token};
    use platform_authz::{ApiAuthorization, catalog::ACTION_MANAGE};
    use platform_db::NewRole;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::graphql::{GraphqlData, build_schema};

    fn test_config(mode: ApiAuthorization) -> AppConfig {
        AppConfig {
            auth: AuthConfig::new("router-test-secret", 15).unwrap(),
            cors_allowed_origins: vec!["http://localhost:3000".into()],
            api_authorization: mode,
        }
    }

    async fn migrated_pool() -> DbPool {
        let pool = platform_db::connect_url("sqlite::memory:", false)
            .await
            .unwrap();
        Migrator::up(&pool, None).await.unwrap();
        platform_db::seed_catalog(&pool).await.unwrap();
        pool
    }

    fn app_state(pool: DbPool, mode: ApiAuthorization) -> AppState {
        let config = test_config(mode);
        let policy = Arc::new(AccessPolicy::standard().unwrap().with_api_mode(mode));
        let schema = build_schema(GraphqlData {
            pool: pool.clone(),
            policy: policy.clone(),
        });
        AppState {
            pool,
            schema,
            config: Arc::new(config),
            policy,
        }
    }

    async fn permission_id(pool: &DbPool, resource: &str) -> Uuid {
        platform_db::list_permissions(pool)
            .await
            .unwrap()
            .into_iter()
            .find(|row| row.resource == resource && row.action == ACTION_MANAGE)
            .map(|row| row.id)
            .unwrap()
    }

    async fn user_with_role(pool: &DbPool, email: &str, role: Option<Uuid>) -> Uuid {
        let user = platform_db::upsert_user(pool, email, None).await.unwrap();
        if let Some(role) = role {
            platform_db::assign_role(pool, user.id, role).await.unwrap();
        }
        user.id
    }

    async fn sales_role(pool: &DbPool) -> Uuid {
        let orders = permission_id(pool, "order_management").await;
        platform_db::create_role(
            pool,
            NewRole {
                name: "Sales".into(),
                display_name: "Sales desk".into(),
                description: None,
                permission_ids: vec![orders],
            },
        )
        .await
        .unwrap()
        .role
        .id
    }

    async fn super_admin_role(pool: &DbPool) -> Uuid {
        platform_db::list_roles(pool)
            .await
            .unwrap()
            .into_iter()
            .find(|record| record.role.name == "SUPER_ADMIN")
            .map(|record| record.role.id)
            .unwrap()
    }

    fn bearer(state: &AppState, user_id: Uuid) -> String {
        format!("Bearer {}", issue_token(user_id, &state.config.auth).unwrap())
    }

    async fn get(state: &AppState, path: &str, auth: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(path);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        build_router(state.clone())
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn graphql(state: &AppState, auth: &str, query: &str) -> Value {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/graphql")
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap();
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    fn error_code(body: &Value) -> &str {
        body["errors"][0]["extensions"]["code"]
            .as_str()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn health_is_public() {
        let state = app_state(migrated_pool().await, ApiAuthorization::Enforce);
        let response = get(&state, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["db_ok"], json!(true));
    }

    #[tokio::test]
    async fn anonymous_page_request_goes_to_sign_in() {
        let state = app_state(migrated_pool().await, ApiAuthorization::Enforce);
        let response = get(&state, "/dashboard/orders", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?callbackUrl=%2Fdashboard%2Forders");
    }

    #[tokio::test]
    async fn anonymous_api_request_is_rejected() {
        let state = app_state(migrated_pool().await, ApiAuthorization::Enforce);
        let response = get(&state, "/api/orders", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn user_without_roles_is_sent_to_unauthorized() {
        let pool = migrated_pool().await;
        let user = user_with_role(&pool, "nobody@example.com", None).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let response = get(&state, "/dashboard/orders", Some(&bearer(&state, user))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard/unauthorized");

        let audit = platform_db::recent_audit(&state.pool, 10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "ACCESS_DENIED");
        assert_eq!(audit[0].resource, "/dashboard/orders");
        assert_eq!(audit[0].user_id, Some(user));
    }

    #[tokio::test]
    async fn granted_page_reaches_the_handler_with_pathname() {
        let pool = migrated_pool().await;
        let role = sales_role(&pool).await;
        let user = user_with_role(&pool, "sales@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let response = get(&state, "/dashboard/orders", Some(&bearer(&state, user))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("data-pathname=\"/dashboard/orders\""));
    }

    #[tokio::test]
    async fn grant_for_one_area_does_not_open_another() {
        let pool = migrated_pool().await;
        let role = sales_role(&pool).await;
        let user = user_with_role(&pool, "sales@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let response = get(&state, "/dashboard/settings/users", Some(&bearer(&state, user))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard/unauthorized");
    }

    #[tokio::test]
    async fn no_check_pages_need_only_identity() {
        let pool = migrated_pool().await;
        let user = user_with_role(&pool, "nobody@example.com", None).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let response = get(&state, "/dashboard/messages", Some(&bearer(&state, user))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deactivated_users_are_treated_as_signed_out() {
        let pool = migrated_pool().await;
        let user = user_with_role(&pool, "gone@example.com", None).await;
        let state = app_state(pool, ApiAuthorization::Enforce);
        let auth = bearer(&state, user);
        assert_eq!(get(&state, "/dashboard", Some(&auth)).await.status(), StatusCode::OK);

        platform_db::set_user_active(&state.pool, user, false).await.unwrap();
        for path in [
            "/dashboard",
            "/dashboard/messages",
            "/dashboard/settings/change-password",
        ] {
            let response = get(&state, path, Some(&auth)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
            assert!(location(&response).starts_with("/login?callbackUrl="), "{path}");
        }
        let response = get(&state, "/api/me", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tokens_for_unknown_users_are_treated_as_signed_out() {
        let state = app_state(migrated_pool().await, ApiAuthorization::Enforce);
        let auth = bearer(&state, Uuid::new_v4());

        let response = get(&state, "/dashboard/messages", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?callbackUrl=%2Fdashboard%2Fmessages");

        let response = get(&state, "/api/graphql", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn trailing_slash_paths_match_their_page() {
        let pool = migrated_pool().await;
        let role = super_admin_role(&pool).await;
        let user = user_with_role(&pool, "root@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);
        let auth = bearer(&state, user);

        for path in ["/dashboard/", "/dashboard/messages/", "/dashboard/orders/"] {
            let response = get(&state, path, Some(&auth)).await;
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn session_cookie_is_accepted() {
        let pool = migrated_pool().await;
        let role = sales_role(&pool).await;
        let user = user_with_role(&pool, "sales@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);
        let token = issue_token(user, &state.config.auth).unwrap();

        let request = Request::builder()
            .uri("/dashboard/orders")
            .header(header::COOKIE, format!("crm_session={token}"))
            .body(Body::empty())
            .unwrap();
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn revocation_applies_to_the_next_request() {
        let pool = migrated_pool().await;
        let role = sales_role(&pool).await;
        let user = user_with_role(&pool, "sales@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);
        let auth = bearer(&state, user);

        assert_eq!(get(&state, "/dashboard/orders", Some(&auth)).await.status(), StatusCode::OK);
        assert!(platform_db::revoke_role(&state.pool, user, role).await.unwrap());
        let response = get(&state, "/dashboard/orders", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard/unauthorized");
    }

    #[tokio::test]
    async fn unmapped_pages_are_denied() {
        let pool = migrated_pool().await;
        let role = super_admin_role(&pool).await;
        let user = user_with_role(&pool, "root@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let response = get(&state, "/dashboard/not-a-page", Some(&bearer(&state, user))).await;
        assert_eq!(location(&response), "/dashboard/unauthorized");
    }

    #[tokio::test]
    async fn lookup_failure_denies() {
        // No migrations: every store query fails.
        let pool = platform_db::connect_url("sqlite::memory:", false)
            .await
            .unwrap();
        let state = app_state(pool, ApiAuthorization::Enforce);
        let auth = bearer(&state, Uuid::new_v4());

        for path in ["/dashboard/orders", "/dashboard/messages"] {
            let response = get(&state, path, Some(&auth)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(location(&response), "/dashboard/unauthorized", "{path}");
        }
        let response = get(&state, "/api/me", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn enforced_api_routes_check_the_api_table() {
        let pool = migrated_pool().await;
        let role = sales_role(&pool).await;
        let user = user_with_role(&pool, "sales@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);
        let auth = bearer(&state, user);

        let response = get(&state, "/api/roles", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        // Allowed by the gate, then no handler.
        let response = get(&state, "/api/orders", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = get(&state, "/api/unlisted", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn me_endpoint_lists_unlocked_categories() {
        let pool = migrated_pool().await;
        let role = sales_role(&pool).await;
        let user = user_with_role(&pool, "sales@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let response = get(&state, "/api/me", Some(&bearer(&state, user))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["id"], json!(user.to_string()));
        assert_eq!(body["resources"], json!(["order_management"]));
    }

    #[tokio::test]
    async fn deferred_api_routes_only_need_identity() {
        let pool = migrated_pool().await;
        let user = user_with_role(&pool, "nobody@example.com", None).await;
        let state = app_state(pool, ApiAuthorization::Defer);

        let response = get(&state, "/api/roles", Some(&bearer(&state, user))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn management_queries_require_system_management() {
        let pool = migrated_pool().await;
        let role = sales_role(&pool).await;
        let user = user_with_role(&pool, "sales@example.com", Some(role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let body = graphql(&state, &bearer(&state, user), "{ roles { name } }").await;
        assert_eq!(error_code(&body), "FORBIDDEN");

        let body = graphql(
            &state,
            &bearer(&state, user),
            r#"{ me { email resources } canAccess(path: "/dashboard/orders") }"#,
        )
        .await;
        assert!(body["errors"].is_null());
        assert_eq!(body["data"]["me"]["email"], json!("sales@example.com"));
        assert_eq!(body["data"]["me"]["resources"], json!(["order_management"]));
        assert_eq!(body["data"]["canAccess"], json!(true));
    }

    #[tokio::test]
    async fn assigned_roles_survive_a_delete_attempt() {
        let pool = migrated_pool().await;
        let admin_role = super_admin_role(&pool).await;
        let admin = user_with_role(&pool, "root@example.com", Some(admin_role)).await;
        let sales = sales_role(&pool).await;
        let seller = user_with_role(&pool, "x@example.com", Some(sales)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let delete = format!(r#"mutation {{ deleteRole(id: "{sales}") }}"#);
        let body = graphql(&state, &bearer(&state, admin), &delete).await;
        assert_eq!(error_code(&body), "CONFLICT");

        let response = get(&state, "/dashboard/orders", Some(&bearer(&state, seller))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let audit = platform_db::recent_audit(&state.pool, 10).await.unwrap();
        let attempt = audit
            .iter()
            .find(|entry| entry.action == "ROLE_DELETE")
            .unwrap();
        assert_eq!(attempt.status, "FAILED");
        assert_eq!(attempt.user_id, Some(admin));
    }

    #[tokio::test]
    async fn permission_catalog_is_labelled() {
        let pool = migrated_pool().await;
        let admin_role = super_admin_role(&pool).await;
        let admin = user_with_role(&pool, "root@example.com", Some(admin_role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);

        let body = graphql(
            &state,
            &bearer(&state, admin),
            "{ permissions { resource description displayName group detailed } }",
        )
        .await;
        let rows = body["data"]["permissions"].as_array().unwrap();
        let status = rows
            .iter()
            .find(|row| row["resource"] == json!("order_management:status_check"))
            .unwrap();
        assert_eq!(status["group"], json!("Order management"));
        assert_eq!(status["detailed"], json!(true));
        assert!(status["description"].is_string());
        assert!(status["displayName"].is_string());
    }

    #[tokio::test]
    async fn administrators_manage_roles_over_graphql() {
        let pool = migrated_pool().await;
        let admin_role = super_admin_role(&pool).await;
        let admin = user_with_role(&pool, "root@example.com", Some(admin_role)).await;
        let state = app_state(pool, ApiAuthorization::Enforce);
        let auth = bearer(&state, admin);

        let body = graphql(&state, &auth, "{ roles { name isSystem } }").await;
        let names = body["data"]["roles"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|role| role["name"].as_str())
            .collect::<Vec<_>>();
        assert!(names.contains(&"SUPER_ADMIN"));

        let body = graphql(
            &state,
            &auth,
            r#"mutation { createRole(input: { name: "AUDITOR", displayName: "Auditor" }) { id name } }"#,
        )
        .await;
        assert_eq!(body["data"]["createRole"]["name"], json!("AUDITOR"));

        let body = graphql(
            &state,
            &auth,
            r#"mutation { createRole(input: { name: "AUDITOR", displayName: "Again" }) { id } }"#,
        )
        .await;
        assert_eq!(error_code(&body), "CONFLICT");

        let delete_system = format!(r#"mutation {{ deleteRole(id: "{admin_role}") }}"#);
        let body = graphql(&state, &auth, &delete_system).await;
        assert_eq!(error_code(&body), "CONFLICT");

        let audit = platform_db::recent_audit(&state.pool, 10).await.unwrap();
        assert!(audit.iter().any(|entry| entry.action == "ROLE_CREATE"));
    }
}
