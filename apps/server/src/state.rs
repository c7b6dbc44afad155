//! Shared application state.

use crate::auth::{hash_password, AuthSessions};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use std::sync::Arc;
use symptoms::Categorizer;
use symptoms_integrity::OutbreakThresholds;
use tracing::info;
use tujali_shared::HealthResult;
use tujali_storage::{Database, Store};
use ussd::UssdService;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub ussd: UssdService,
    pub categorizer: Categorizer,
    pub thresholds: OutbreakThresholds,
    pub sessions: AuthSessions,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build state over any store from validated configuration
    pub fn new(store: Arc<dyn Store>, config: &AppConfig) -> HealthResult<Self> {
        config.symptoms.outbreak.validate()?;
        Ok(Self {
            store,
            ussd: UssdService::new(config.ussd.clone())?,
            categorizer: config.symptoms.categorizer()?,
            thresholds: config.symptoms.outbreak.clone(),
            sessions: AuthSessions::new(chrono::Duration::seconds(config.auth.session_lifetime_secs.max(60))),
        })
    }

    /// Open the configured database and seed the admin account
    pub fn open(config: &AppConfig) -> HealthResult<SharedState> {
        let database = Database::open(config.database.to_database_config())?;
        info!(path = %database.path().display(), "database opened");
        let state = Self::new(Arc::new(database), config)?;

        if let Some(admin) = &config.auth.admin {
            let hash = hash_password(&admin.password)?;
            clinic::ensure_admin(state.store.as_ref(), &admin.username, &admin.email, hash)?;
        }
        Ok(Arc::new(state))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Run store work off the async runtime
    pub async fn blocking<F, T>(self: &Arc<Self>, f: F) -> ApiResult<T>
    where
        F: FnOnce(&AppState) -> HealthResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
            .map_err(ApiError::from)
    }
}
