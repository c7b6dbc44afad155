//! Provider accounts and profiles.

use chrono::Utc;
use clinic_integrity::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use tujali_shared::{HealthError, HealthResult};

/// Input for registering a provider; the password is already hashed by the caller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterProviderInput {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub specialization: String,
    pub license_number: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub location: Option<String>,
    /// Defaults to [`DEFAULT_CONSULTATION_FEE`]
    pub consultation_fee: Option<f64>,
}

/// Create the login account and provider profile together
pub fn register_provider<S>(store: &S, input: RegisterProviderInput) -> HealthResult<(User, Provider)>
where
    S: ProviderStore + ?Sized,
{
    let now = Utc::now();
    let user = NewUser {
        username: input.username.trim().to_string(),
        email: input.email.trim().to_lowercase(),
        password_hash: input.password_hash,
        is_admin: false,
        created_at: now,
    };
    let provider = NewProvider {
        name: input.name.trim().to_string(),
        specialization: input.specialization.trim().to_string(),
        license_number: input.license_number.trim().to_string(),
        languages: input.languages,
        location: input.location,
        consultation_fee: input.consultation_fee.unwrap_or(DEFAULT_CONSULTATION_FEE),
        created_at: now,
    };

    let mut validation = validate_new_user(&user);
    validation.merge(validate_new_provider(&provider));
    validation.into_result()?;

    if store.find_user_by_username(&user.username)?.is_some() {
        return Err(HealthError::conflict("Username is already taken"));
    }
    if store.find_user_by_email(&user.email)?.is_some() {
        return Err(HealthError::conflict("Email is already registered"));
    }

    let (user, provider) = store.insert_provider_account(&user, &provider)?;
    info!(user_id = user.id, provider_id = provider.id, "provider registered");
    Ok((user, provider))
}

/// Create an administrator account without a provider profile.
///
/// Returns the existing user when the username is already present.
pub fn ensure_admin<S>(store: &S, username: &str, email: &str, password_hash: String) -> HealthResult<User>
where
    S: ProviderStore + ?Sized,
{
    if let Some(existing) = store.find_user_by_username(username)? {
        return Ok(existing);
    }
    let user = NewUser {
        username: username.trim().to_string(),
        email: email.trim().to_lowercase(),
        password_hash,
        is_admin: true,
        created_at: Utc::now(),
    };
    validate_new_user(&user).into_result()?;
    let user = store.insert_user(&user)?;
    info!(user_id = user.id, "admin account created");
    Ok(user)
}

/// Find the account a login name refers to; accepts a username or an email
pub fn find_login_user<S>(store: &S, login: &str) -> HealthResult<Option<User>>
where
    S: ProviderStore + ?Sized,
{
    let login = login.trim();
    if login.contains('@') {
        store.find_user_by_email(&login.to_lowercase())
    } else {
        store.find_user_by_username(login)
    }
}

/// Whether a username is already registered
pub fn username_taken<S>(store: &S, username: &str) -> HealthResult<bool>
where
    S: ProviderStore + ?Sized,
{
    Ok(store.find_user_by_username(username.trim())?.is_some())
}

/// Whether an email is already registered, ignoring case
pub fn email_taken<S>(store: &S, email: &str) -> HealthResult<bool>
where
    S: ProviderStore + ?Sized,
{
    Ok(store.find_user_by_email(&email.trim().to_lowercase())?.is_some())
}

pub fn get_user<S>(store: &S, id: i64) -> HealthResult<User>
where
    S: ProviderStore + ?Sized,
{
    store.get_user(id)?.ok_or_else(|| HealthError::not_found("User", id))
}

pub fn get_provider<S>(store: &S, id: i64) -> HealthResult<Provider>
where
    S: ProviderStore + ?Sized,
{
    store
        .get_provider(id)?
        .ok_or_else(|| HealthError::not_found("Provider", id))
}

pub fn provider_for_user<S>(store: &S, user_id: i64) -> HealthResult<Option<Provider>>
where
    S: ProviderStore + ?Sized,
{
    store.find_provider_by_user(user_id)
}

pub fn list_providers<S>(store: &S) -> HealthResult<Vec<Provider>>
where
    S: ProviderStore + ?Sized,
{
    store.list_providers()
}
