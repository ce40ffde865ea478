//! End-to-end flows over the real router against a live database.
//!
//! These tests need `DATABASE_URL` pointing at a PostgreSQL instance; when
//! it is absent or unreachable they print a notice and pass vacuously so
//! the suite stays green on machines without local infrastructure. Redis
//! is intentionally not used: the service must work store-only.

use auth_service::config::{
    EmailSettings, JwtSettings, OtpSettings, ServerSettings, Settings,
};
use auth_service::http::build_router;
use auth_service::security::tokens::TokenIssuer;
use auth_service::services::email::EmailService;
use auth_service::services::otp::OtpService;
use auth_service::AppState;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

async fn test_state() -> Option<Arc<AppState>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    };
    let db = match PgPoolOptions::new().max_connections(5).connect(&url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("skipping: database unreachable: {e}");
            return None;
        }
    };
    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        eprintln!("skipping: migrations failed: {e}");
        return None;
    }

    let settings = Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        jwt: JwtSettings {
            secret: "integration-test-secret".to_string(),
            access_ttl_secs: 3600,
            registration_ttl_secs: 900,
        },
        redis_url: None,
        otp: OtpSettings { ttl_secs: 300 },
        email: EmailSettings {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: "Shopedia <noreply@shopedia.dev>".to_string(),
            frontend_base_url: "https://shopedia.test".to_string(),
        },
        invite_ttl_secs: 86400,
        password_reset_ttl_secs: 900,
    };

    let email = EmailService::new(&settings.email).expect("email service");
    let tokens = TokenIssuer::new(
        &settings.jwt.secret,
        settings.jwt.access_ttl_secs,
        settings.jwt.registration_ttl_secs,
    );
    let otp = OtpService::new(db.clone(), None, email.clone(), settings.otp.ttl_secs);

    Some(Arc::new(AppState {
        db,
        redis: None,
        tokens,
        otp,
        email,
        settings,
    }))
}

fn unique_email() -> String {
    format!("user-{}@test.shopedia.dev", Uuid::new_v4().simple())
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    request(app, "POST", uri, Some(body), None).await
}

async fn post_authed(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    request(app, "POST", uri, Some(body), Some(token)).await
}

async fn get_authed(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    request(app, "GET", uri, None, Some(token)).await
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = builder
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// The OTP is delivered by email in production; tests read it straight
/// from the store.
async fn otp_for(db: &PgPool, email: &str) -> String {
    sqlx::query_scalar::<_, String>(
        "SELECT o.otp_code FROM otp_codes o \
         JOIN users u ON u.id = o.user_id \
         WHERE u.email = $1 AND o.is_used = FALSE \
         ORDER BY o.created_at DESC LIMIT 1",
    )
    .bind(email)
    .fetch_one(db)
    .await
    .expect("outstanding otp")
}

async fn register_and_verify(app: &Router, db: &PgPool, email: &str, password: &str) {
    let (status, body) = post_json(
        app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Test User", "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register: {body}");
    let register_token = body["register_access_token"].as_str().unwrap().to_string();

    let code = otp_for(db, email).await;
    let (status, body) = post_json(
        app,
        "/api/app/verify-otp",
        json!({ "register_access_token": register_token, "otp_code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify-otp: {body}");
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = post_json(
        app,
        "/api/app/login",
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login: {body}");
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
#[serial]
async fn registration_otp_login_me_flow() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "sup3r-secret").await;
    let token = login(&app, &email, "sup3r-secret").await;

    let (status, body) = get_authed(&app, "/api/app/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], email);
    assert!(body["roles"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r == "end_user"));
}

#[tokio::test]
#[serial]
async fn unverified_account_cannot_log_in() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    let (status, _) = post_json(
        &app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Pending", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post_json(
        &app,
        "/api/app/login",
        json!({ "email": email, "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn reregistering_pending_account_reuses_the_otp() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    let (status, _) = post_json(
        &app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Pending", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_code = otp_for(&state.db, &email).await;

    let (status, _) = post_json(
        &app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Pending", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(otp_for(&state.db, &email).await, first_code);
}

#[tokio::test]
#[serial]
async fn registering_a_verified_email_conflicts() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "sup3r-secret").await;

    let (status, _) = post_json(
        &app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Again", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn third_wrong_guess_exhausts_the_otp() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    let (status, body) = post_json(
        &app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Guesser", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let register_token = body["register_access_token"].as_str().unwrap().to_string();
    let code = otp_for(&state.db, &email).await;
    let wrong = if code == "000000" { "000001" } else { "000000" };

    for _ in 0..3 {
        let (status, _) = post_json(
            &app,
            "/api/app/verify-otp",
            json!({ "register_access_token": register_token, "otp_code": wrong }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The budget is spent; even the correct code is refused now.
    let (status, _) = post_json(
        &app,
        "/api/app/verify-otp",
        json!({ "register_access_token": register_token, "otp_code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
#[serial]
async fn second_login_supersedes_the_first_session() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "sup3r-secret").await;
    let first = login(&app, &email, "sup3r-secret").await;
    let second = login(&app, &email, "sup3r-secret").await;

    let (status, _) = get_authed(&app, "/api/app/me", &first).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = get_authed(&app, "/api/app/me", &second).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn logout_revokes_the_token_permanently() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "sup3r-secret").await;
    let token = login(&app, &email, "sup3r-secret").await;

    let (status, _) = post_authed(&app, "/api/app/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_authed(&app, "/api/app/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A later login must not resurrect the revoked token.
    let _fresh = login(&app, &email, "sup3r-secret").await;
    let (status, _) = get_authed(&app, "/api/app/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn app_token_is_rejected_by_dashboard_routes() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "sup3r-secret").await;
    let token = login(&app, &email, "sup3r-secret").await;

    let (status, _) = post_authed(&app, "/api/admin/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn registration_token_is_rejected_by_protected_routes() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    let (status, body) = post_json(
        &app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Pending", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let register_token = body["register_access_token"].as_str().unwrap();

    let (status, _) = get_authed(&app, "/api/app/me", register_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn change_password_forces_relogin() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "old-secret-1").await;
    let token = login(&app, &email, "old-secret-1").await;

    let (status, _) = post_authed(
        &app,
        "/api/app/change-password",
        &token,
        json!({ "old_password": "old-secret-1", "new_password": "new-secret-2" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_authed(&app, "/api/app/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        "/api/app/login",
        json!({ "email": email, "password": "old-secret-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, &email, "new-secret-2").await;
}

#[tokio::test]
#[serial]
async fn forgot_password_does_not_reveal_account_existence() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());

    let (status, body) = post_json(
        &app,
        "/api/app/forgot-password",
        json!({ "email": unique_email() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("If the address"));
}

#[tokio::test]
#[serial]
async fn password_reset_token_flow() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "old-secret-1").await;
    let token = login(&app, &email, "old-secret-1").await;

    let (status, _) =
        post_json(&app, "/api/app/forgot-password", json!({ "email": email })).await;
    assert_eq!(status, StatusCode::OK);

    let reset_token = sqlx::query_scalar::<_, Uuid>(
        "SELECT t.token FROM password_reset_tokens t \
         JOIN users u ON u.id = t.user_id \
         WHERE u.email = $1 AND t.is_used = FALSE \
         ORDER BY t.created_at DESC LIMIT 1",
    )
    .bind(&email)
    .fetch_one(&state.db)
    .await
    .expect("reset token");

    let (status, _) = post_json(
        &app,
        "/api/app/reset-password",
        json!({ "token": reset_token.to_string(), "new_password": "new-secret-2" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The live session died with the old password.
    let (status, _) = get_authed(&app, "/api/app/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, &email, "new-secret-2").await;

    // The token is single-use.
    let (status, _) = post_json(
        &app,
        "/api/app/reset-password",
        json!({ "token": reset_token.to_string(), "new_password": "another-3" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn admin_bootstrap_invite_and_accept() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let admin_email = unique_email();

    let (status, _) = post_json(
        &app,
        "/api/admin/register",
        json!({ "email": admin_email, "fullname": "Root", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_json(
        &app,
        "/api/admin/login",
        json!({ "email": admin_email, "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login: {body}");
    let admin_token = body["access_token"].as_str().unwrap().to_string();

    let admin_role_id =
        sqlx::query_scalar::<_, i64>("SELECT id FROM roles WHERE name = 'admin'")
            .fetch_one(&state.db)
            .await
            .expect("admin role");

    // super_admin passes the role and permission gates by override.
    let invitee_email = unique_email();
    let (status, body) = post_authed(
        &app,
        "/api/admin/invite-user",
        &admin_token,
        json!({ "email": invitee_email, "role_id": admin_role_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "invite: {body}");

    let invite_token = sqlx::query_scalar::<_, Uuid>(
        "SELECT t.token FROM invite_tokens t \
         JOIN users u ON u.id = t.user_id \
         WHERE u.email = $1 AND t.is_used = FALSE",
    )
    .bind(&invitee_email)
    .fetch_one(&state.db)
    .await
    .expect("invite token");

    let (status, _) = post_json(
        &app,
        "/api/admin/accept-invite",
        json!({ "invite_token": invite_token.to_string(), "password": "invited-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The invitee's admin role carries the dashboard scope.
    let (status, body) = post_json(
        &app,
        "/api/admin/login",
        json!({ "email": invitee_email, "password": "invited-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "invitee login: {body}");
    let invitee_token = body["access_token"].as_str().unwrap().to_string();

    // admin holds user.* which satisfies user.invite via the wildcard.
    let (status, body) = post_authed(
        &app,
        "/api/admin/invite-user",
        &invitee_token,
        json!({ "email": unique_email(), "role_id": admin_role_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "wildcard invite: {body}");
}

#[tokio::test]
#[serial]
async fn soft_deleted_role_loses_its_gates_immediately() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let admin_email = unique_email();

    let (status, _) = post_json(
        &app,
        "/api/admin/register",
        json!({ "email": admin_email, "fullname": "Root", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = post_json(
        &app,
        "/api/admin/login",
        json!({ "email": admin_email, "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let user_id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = $1")
        .bind(&admin_email)
        .fetch_one(&state.db)
        .await
        .unwrap();

    // A second dashboard role keeps the scope gate satisfied, so the role
    // gate is what gets exercised once super_admin goes away.
    let auditor_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO roles (name, scope) VALUES ($1, 'dashboard') RETURNING id",
    )
    .bind(format!("auditor-{}", Uuid::new_v4().simple()))
    .fetch_one(&state.db)
    .await
    .unwrap();
    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(auditor_id)
        .execute(&state.db)
        .await
        .unwrap();

    let admin_role_id =
        sqlx::query_scalar::<_, i64>("SELECT id FROM roles WHERE name = 'admin'")
            .fetch_one(&state.db)
            .await
            .unwrap();

    let (status, _) = post_authed(
        &app,
        "/api/admin/invite-user",
        &token,
        json!({ "email": unique_email(), "role_id": admin_role_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Revoke super_admin mid-session. The token still carries the role in
    // its claims, but the gates must consult the store, not the claims.
    sqlx::query("UPDATE roles SET deleted_at = NOW() WHERE name = 'super_admin'")
        .execute(&state.db)
        .await
        .unwrap();

    let (status, _) = post_authed(
        &app,
        "/api/admin/invite-user",
        &token,
        json!({ "email": unique_email(), "role_id": admin_role_id }),
    )
    .await;

    sqlx::query("UPDATE roles SET deleted_at = NULL WHERE name = 'super_admin'")
        .execute(&state.db)
        .await
        .unwrap();
    sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(auditor_id)
        .execute(&state.db)
        .await
        .unwrap();

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn cleanup_purges_expired_tombstones_without_reviving_tokens() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    register_and_verify(&app, &state.db, &email, "sup3r-secret").await;
    let token = login(&app, &email, "sup3r-secret").await;
    let (status, _) = post_authed(&app, "/api/app/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let user_id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.db)
        .await
        .unwrap();

    // Age the tombstone past the token's own lifetime.
    sqlx::query("UPDATE revoked_tokens SET expires_at = NOW() - INTERVAL '1 hour' WHERE user_id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await
        .unwrap();

    let purged = auth_service::db::token_revocation::cleanup_expired(&state.db)
        .await
        .unwrap();
    assert!(purged >= 1);

    let remaining = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM revoked_tokens WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(remaining, 0);

    // The tombstone is gone but the token stays unusable: logout also
    // cleared the session, so the JTI no longer matches anything.
    let (status, _) = get_authed(&app, "/api/app/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn expired_otp_fails_even_with_the_correct_code() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state.clone());
    let email = unique_email();

    let (status, body) = post_json(
        &app,
        "/api/app/register",
        json!({ "email": email, "fullname": "Slow", "password": "sup3r-secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let register_token = body["register_access_token"].as_str().unwrap().to_string();
    let code = otp_for(&state.db, &email).await;

    sqlx::query(
        "UPDATE otp_codes SET expires_at = NOW() - INTERVAL '1 minute' \
         WHERE user_id = (SELECT id FROM users WHERE email = $1)",
    )
    .bind(&email)
    .execute(&state.db)
    .await
    .unwrap();

    let (status, _) = post_json(
        &app,
        "/api/app/verify-otp",
        json!({ "register_access_token": register_token, "otp_code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn garbage_and_missing_tokens_are_unauthorized() {
    let Some(state) = test_state().await else { return };
    let app = build_router(state);

    let (status, _) = get_authed(&app, "/api/app/me", "not.a.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, "GET", "/api/app/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
