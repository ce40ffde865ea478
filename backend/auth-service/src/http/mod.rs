//! Router assembly and the middleware chain.
//!
//! Two surfaces share one service: `/api/app` for customers and
//! `/api/admin` for the dashboard. Public endpoints sit behind the
//! fixed-window rate limiter; protected endpoints run `require_auth`
//! first, then the surface's scope gate, then any per-route role and
//! permission gates. Layers added last run first, so the outermost
//! layer in each stack is the last `.layer` call.

pub mod admin_auth;
pub mod app_auth;
pub mod auth;
pub mod guards;
pub mod login;
pub mod password;
pub mod rate_limit;

use crate::{authz, AppState};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    let app_public = Router::new()
        .route("/register", post(app_auth::register))
        .route("/verify-otp", post(app_auth::verify_otp))
        .route("/request-new-otp", post(app_auth::request_new_otp))
        .route("/login", post(app_auth::login))
        .route("/forgot-password", post(password::forgot_password))
        .route("/reset-password", post(password::reset_password))
        .layer(middleware::from_fn_with_state(
            (state.clone(), rate_limit::PUBLIC_AUTH_LIMIT),
            rate_limit::fixed_window,
        ));

    let app_protected = Router::new()
        .route("/logout", post(app_auth::logout))
        .route("/me", get(app_auth::me))
        .route("/change-password", post(password::change_password))
        .layer(middleware::from_fn_with_state(
            (state.clone(), authz::SCOPE_APP),
            guards::require_scope,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let admin_public = Router::new()
        .route("/register", post(admin_auth::register))
        .route("/login", post(admin_auth::login))
        .route("/accept-invite", post(admin_auth::accept_invite))
        .layer(middleware::from_fn_with_state(
            (state.clone(), rate_limit::PUBLIC_AUTH_LIMIT),
            rate_limit::fixed_window,
        ));

    // invite-user additionally demands an admin-tier role and the
    // user.invite permission (or user.* via the wildcard rule).
    let invite = Router::new()
        .route("/invite-user", post(admin_auth::invite_user))
        .layer(middleware::from_fn_with_state(
            (state.clone(), &["user.invite"][..]),
            guards::require_permission,
        ))
        .layer(middleware::from_fn_with_state(
            (state.clone(), &["admin"][..]),
            guards::require_role,
        ));

    let admin_protected = Router::new()
        .route("/logout", post(app_auth::logout))
        .merge(invite)
        .layer(middleware::from_fn_with_state(
            (state.clone(), authz::SCOPE_DASHBOARD),
            guards::require_scope,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api/app", app_public.merge(app_protected))
        .nest("/api/admin", admin_public.merge(admin_protected))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if db_pool::health_check(&state.db).await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded" })),
        )
    }
}
