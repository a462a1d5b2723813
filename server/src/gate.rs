//! Request gate: authenticates the caller and applies the access policy
//! before any route handler runs.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use platform_authz::{
    Caller, Decision, PathClass, Permission, Resource, resource_categories,
    gate::{SIGN_IN_PATH, UNAUTHORIZED_PATH},
};
use platform_db::{
    AuditAction, AuditEntry, AuditStatus, find_active_user, load_effective_permissions, record_audit,
};
use serde_json::json;
use tracing::{debug, warn};
use url::form_urlencoded;
use uuid::Uuid;

use crate::http::AppState;

pub const PATHNAME_HEADER: HeaderName = HeaderName::from_static("x-pathname");

/// The authenticated caller, attached to request extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

/// Who the request belongs to once the token has been checked against the store.
enum Session {
    Anonymous,
    Active {
        user_id: Uuid,
        permissions: Vec<Permission>,
    },
    /// Token was valid but the store could not confirm the user.
    Unverified(Uuid),
}

impl Session {
    fn user_id(&self) -> Option<Uuid> {
        match self {
            Session::Anonymous => None,
            Session::Active { user_id, .. } | Session::Unverified(user_id) => Some(*user_id),
        }
    }

    fn permissions(&self) -> &[Permission] {
        match self {
            Session::Active { permissions, .. } => permissions,
            Session::Anonymous | Session::Unverified(_) => &[],
        }
    }
}

pub async fn request_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let pathname = request.uri().path().to_string();
    let token_user = platform_authn::authenticate(request.headers(), &state.config.auth);

    let session = match token_user {
        Some(user_id) if state.policy.classify(&pathname) != PathClass::Public => {
            resolve_session(&state, user_id, &pathname).await
        }
        _ => Session::Anonymous,
    };
    let decision = match &session {
        Session::Anonymous => state.policy.decide(&pathname, Caller::Anonymous),
        Session::Active { permissions, .. } => {
            state.policy.decide(&pathname, Caller::Authenticated(permissions))
        }
        Session::Unverified(_) => state.policy.refuse(&pathname),
    };
    let user_id = session.user_id();

    match decision {
        Decision::Allow => {
            if let Ok(value) = HeaderValue::from_str(&pathname) {
                request.headers_mut().insert(PATHNAME_HEADER, value);
            }
            if let Session::Active { user_id, .. } = session {
                request.extensions_mut().insert(Identity { user_id });
            }
            next.run(request).await
        }
        Decision::SignIn => Redirect::to(&sign_in_target(request.uri().path_and_query().map_or(
            pathname.as_str(),
            |pq| pq.as_str(),
        )))
        .into_response(),
        Decision::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response(),
        Decision::Deny => {
            let required = state.policy.pages().required_resources(&pathname);
            log_denial(&pathname, user_id, required, session.permissions());
            audit_denial(&state, &pathname, user_id, request.headers()).await;
            Redirect::to(UNAUTHORIZED_PATH).into_response()
        }
        Decision::Forbidden => {
            let required = state.policy.api().required_resources(&pathname);
            log_denial(&pathname, user_id, required, session.permissions());
            audit_denial(&state, &pathname, user_id, request.headers()).await;
            (StatusCode::FORBIDDEN, Json(json!({ "error": "forbidden" }))).into_response()
        }
    }
}

/// Unknown and deactivated users count as anonymous. Store failures leave the
/// session unverified so the request is refused.
async fn resolve_session(state: &AppState, user_id: Uuid, pathname: &str) -> Session {
    match find_active_user(&state.pool, user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            debug!(%user_id, "session user unknown or inactive");
            return Session::Anonymous;
        }
        Err(err) => {
            warn!(%user_id, error = %err, "session user lookup failed");
            return Session::Unverified(user_id);
        }
    }
    if !state.policy.needs_permissions(pathname) {
        return Session::Active {
            user_id,
            permissions: Vec::new(),
        };
    }
    match load_effective_permissions(&state.pool, user_id).await {
        Ok(permissions) => Session::Active {
            user_id,
            permissions,
        },
        Err(err) => {
            warn!(%user_id, error = %err, "permission lookup failed");
            Session::Unverified(user_id)
        }
    }
}

fn sign_in_target(callback: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(callback.as_bytes()).collect();
    format!("{SIGN_IN_PATH}?callbackUrl={encoded}")
}

fn log_denial(
    pathname: &str,
    user_id: Option<Uuid>,
    required: Option<&[Resource]>,
    permissions: &[Permission],
) {
    let required = required
        .unwrap_or_default()
        .iter()
        .map(|resource| resource.as_str())
        .collect::<Vec<_>>();
    let held = resource_categories(permissions)
        .into_iter()
        .map(|resource| resource.as_str())
        .collect::<Vec<_>>();
    warn!(
        path = pathname,
        user_id = ?user_id,
        required = ?required,
        held = ?held,
        "access denied"
    );
}

async fn audit_denial(state: &AppState, pathname: &str, user_id: Option<Uuid>, headers: &HeaderMap) {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let mut entry = AuditEntry::new(AuditAction::AccessDenied, pathname, AuditStatus::Denied)
        .client(ip_address, user_agent)
        .message("insufficient permissions");
    if let Some(user_id) = user_id {
        entry = entry.user(user_id);
    }
    if let Err(err) = record_audit(&state.pool, entry).await {
        warn!(error = %err, "failed to record access denial");
    }
}
