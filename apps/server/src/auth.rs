//! Provider authentication: password hashing, in-memory sessions and the
//! `/api/auth` routes.

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use clinic::{email_taken, find_login_user, provider_for_user, register_provider, username_taken, RegisterProviderInput};
use clinic_integrity::{Provider, User};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use tujali_shared::{HealthError, HealthResult};

pub const SESSION_COOKIE: &str = "tujali_session";
pub const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Passwords
// ============================================================================

pub fn hash_password(password: &str) -> HealthResult<String> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| HealthError::InternalError(format!("salt encoding failed: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HealthError::InternalError(format!("password hashing failed: {e}")))
}

/// `false` for a wrong password or an unreadable hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// The signed-in user, attached to every authenticated request
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub provider_id: Option<i64>,
    #[serde(skip)]
    expires_at: DateTime<Utc>,
}

impl AuthUser {
    /// Provider profile of the signed-in user
    pub fn provider_id(&self) -> ApiResult<i64> {
        self.provider_id
            .ok_or_else(|| ApiError::forbidden("A provider profile is required for this action"))
    }
}

/// Sessions keyed by the SHA-256 of their token
pub struct AuthSessions {
    sessions: DashMap<String, AuthUser>,
    lifetime: Duration,
}

fn token_key(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl AuthSessions {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Start a session and return its bearer token
    pub fn create(&self, user: &User, provider: Option<&Provider>, now: DateTime<Utc>) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token_key(&token),
            AuthUser {
                user_id: user.id,
                username: user.username.clone(),
                is_admin: user.is_admin,
                provider_id: provider.map(|p| p.id),
                expires_at: now + self.lifetime,
            },
        );
        token
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Option<AuthUser> {
        let key = token_key(token);
        let user = self.sessions.get(&key).map(|s| s.value().clone())?;
        if user.expires_at <= now {
            self.sessions.remove(&key);
            return None;
        }
        Some(user)
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(&token_key(token)).is_some()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, user| user.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Bearer token from `Authorization`, else the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

fn session_cookie(token: &str, max_age: i64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
    .map_err(|_| ApiError::internal("invalid session cookie"))
}

/// Middleware rejecting requests without a live session
pub async fn require_session(State(state): State<SharedState>, mut request: Request, next: Next) -> Response {
    let user = extract_session_token(request.headers()).and_then(|token| state.sessions.validate(&token, Utc::now()));
    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => {
            debug!(path = %request.uri().path(), "request without a valid session");
            ApiError::unauthorized("Authentication required").into_response()
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Routes reachable without a session
pub fn public_router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/check-username", get(check_username))
        .route("/api/auth/check-email", get(check_email))
}

/// Routes that run behind [`require_session`]
pub fn session_router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub specialization: String,
    pub license_number: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub location: Option<String>,
    pub consultation_fee: Option<f64>,
}

async fn register(
    State(state): State<SharedState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let (user, provider) = state
        .blocking(move |s| {
            let password_hash = hash_password(&request.password)?;
            register_provider(
                s.store(),
                RegisterProviderInput {
                    username: request.username,
                    email: request.email,
                    password_hash,
                    name: request.name,
                    specialization: request.specialization,
                    license_number: request.license_number,
                    languages: request.languages,
                    location: request.location,
                    consultation_fee: request.consultation_fee,
                },
            )
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user, "provider": provider })),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub username: Option<String>,
    pub email: Option<String>,
}

fn required(value: Option<String>, message: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

async fn check_username(
    State(state): State<SharedState>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<impl IntoResponse> {
    let username = required(query.username, "Username is required")?;
    let exists = state.blocking(move |s| username_taken(s.store(), &username)).await?;
    Ok(Json(json!({ "exists": exists })))
}

async fn check_email(
    State(state): State<SharedState>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<impl IntoResponse> {
    let email = required(query.email, "Email is required")?;
    let exists = state.blocking(move |s| email_taken(s.store(), &email)).await?;
    Ok(Json(json!({ "exists": exists })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub username: String,
    pub password: String,
}

async fn login(State(state): State<SharedState>, Json(request): Json<LoginRequest>) -> ApiResult<Response> {
    let login = request.username.clone();
    let found = state
        .blocking(move |s| {
            let Some(user) = find_login_user(s.store(), &request.username)? else {
                return Ok(None);
            };
            if !verify_password(&request.password, &user.password_hash) {
                return Ok(None);
            }
            let provider = provider_for_user(s.store(), user.id)?;
            Ok(Some((user, provider)))
        })
        .await?;

    let Some((user, provider)) = found else {
        warn!(login = %login, "failed login");
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    let token = state.sessions.create(&user, provider.as_ref(), Utc::now());
    info!(user_id = user.id, "user logged in");

    let cookie = session_cookie(&token, state.sessions.lifetime().num_seconds())?;
    let mut response = Json(json!({
        "success": true,
        "token": token,
        "user": user,
        "provider": provider,
    }))
    .into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = extract_session_token(&headers) {
        state.sessions.revoke(&token);
    }
    let mut response = Json(json!({ "success": true })).into_response();
    response.headers_mut().insert(header::SET_COOKIE, session_cookie("", 0)?);
    Ok(response)
}

async fn me(State(state): State<SharedState>, Extension(user): Extension<AuthUser>) -> ApiResult<Json<serde_json::Value>> {
    let user_id = user.user_id;
    let (account, provider) = state
        .blocking(move |s| Ok((clinic::get_user(s.store(), user_id)?, provider_for_user(s.store(), user_id)?)))
        .await?;
    Ok(Json(json!({ "success": true, "user": account, "provider": provider })))
}
