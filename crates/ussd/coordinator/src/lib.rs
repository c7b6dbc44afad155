//! USSD Coordinator
//!
//! The patient-facing USSD channel:
//! - The menu tree, built and validated once
//! - The interpreter that maps accumulated input to a screen or action
//! - Advisory session bookkeeping
//! - Terminal action handlers over a [`UssdBackend`]

pub mod backend;
pub mod handlers;
pub mod interpreter;
pub mod menu;
pub mod session;

pub use backend::*;
pub use handlers::*;
pub use interpreter::*;
pub use menu::*;
pub use session::*;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use tujali_shared::HealthResult;
use ussd_integrity::*;

/// Most providers a pick screen lists
pub const MAX_LISTED_PROVIDERS: usize = 8;

pub const NO_PROVIDERS_TEXT: &str = "No providers are available right now. Please try again later.";

/// [`Directory`] over the backend, as seen by one caller
struct CallerDirectory<'a, B: ?Sized> {
    backend: &'a B,
    phone_number: &'a str,
    today: NaiveDate,
    limit: usize,
}

impl<B> Directory for CallerDirectory<'_, B>
where
    B: UssdBackend + ?Sized,
{
    fn providers(&self, near: Option<&str>) -> HealthResult<Vec<ProviderChoice>> {
        self.backend.providers_near(near, self.limit)
    }

    fn taken_slots(&self, provider_id: i64, day_offset: i64) -> HealthResult<Vec<String>> {
        let date = self.today + Duration::days(day_offset);
        self.backend.taken_slots(provider_id, date, self.phone_number)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UssdSettings {
    /// Service codes this deployment answers
    pub service_codes: Vec<String>,
    /// Idle time before a session is purged
    pub session_ttl_secs: i64,
    /// Capped at [`MAX_LISTED_PROVIDERS`]
    pub provider_limit: usize,
}

impl Default for UssdSettings {
    fn default() -> Self {
        Self {
            service_codes: vec!["*384*123#".to_string()],
            session_ttl_secs: 180,
            provider_limit: MAX_LISTED_PROVIDERS,
        }
    }
}

pub struct UssdService {
    menu: MenuNode,
    settings: UssdSettings,
    sessions: SessionStore,
}

impl UssdService {
    pub fn new(mut settings: UssdSettings) -> HealthResult<Self> {
        let menu = build_menu();
        validate_menu_tree(&menu).into_result()?;
        settings.provider_limit = settings.provider_limit.clamp(1, MAX_LISTED_PROVIDERS);
        settings.session_ttl_secs = settings.session_ttl_secs.max(1);
        info!(
            service_codes = ?settings.service_codes,
            depth = menu.depth(),
            "USSD menu ready"
        );
        Ok(Self {
            menu,
            settings,
            sessions: SessionStore::new(),
        })
    }

    pub fn settings(&self) -> &UssdSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn menu(&self) -> &MenuNode {
        &self.menu
    }

    /// Answer one gateway round trip.
    ///
    /// `Err` means the request was rejected before traversal (missing
    /// fields or an unknown service code). Failures after that point are
    /// logged and answered with the generic failure screen.
    pub fn handle<B>(&self, backend: &B, request: &UssdRequest, now: DateTime<Utc>) -> HealthResult<UssdResponse>
    where
        B: UssdBackend + ?Sized,
    {
        validate_ussd_request(request, &self.settings.service_codes).into_result()?;
        let phone_number = request.phone_number.trim();
        debug!(session_id = %request.session_id, text = %request.text, "USSD request");

        let directory = CallerDirectory {
            backend,
            phone_number,
            today: now.date_naive(),
            limit: self.settings.provider_limit,
        };
        let walked = walk(&self.menu, &request.text, &directory);
        let response = match walked {
            Err(e) => {
                error!(session_id = %request.session_id, error = %e, "USSD menu failed");
                self.sessions.end(phone_number, &request.session_id);
                UssdResponse::failure()
            }
            Ok(Walk {
                path,
                outcome: Outcome::Prompt { node_id, screen, .. },
            }) => {
                self.sessions.record(request, path, &node_id, now);
                UssdResponse::Continue(screen)
            }
            Ok(Walk {
                outcome: Outcome::NoProviders { .. },
                ..
            }) => {
                self.sessions.end(phone_number, &request.session_id);
                UssdResponse::End(NO_PROVIDERS_TEXT.to_string())
            }
            Ok(Walk {
                outcome: Outcome::NoSlots { .. },
                ..
            }) => {
                self.sessions.end(phone_number, &request.session_id);
                UssdResponse::End(NO_SLOTS_TEXT.to_string())
            }
            Ok(Walk {
                outcome:
                    Outcome::Action {
                        node_id,
                        action,
                        selections,
                    },
                ..
            }) => {
                let result = run_action(backend, action, phone_number, &selections, now.date_naive());
                self.sessions.end(phone_number, &request.session_id);
                match result {
                    Ok(text) => {
                        info!(session_id = %request.session_id, node = %node_id, ?action, "USSD action completed");
                        UssdResponse::End(text)
                    }
                    Err(e) => {
                        error!(
                            session_id = %request.session_id,
                            node = %node_id,
                            ?action,
                            error = %e,
                            "USSD action failed"
                        );
                        UssdResponse::failure()
                    }
                }
            }
        };

        debug!(session_id = %request.session_id, response = %response.to_wire(), "USSD response");
        Ok(response)
    }

    /// Drop sessions idle past the configured TTL
    pub fn purge_sessions(&self, now: DateTime<Utc>) -> usize {
        self.sessions
            .purge_expired(now, Duration::seconds(self.settings.session_ttl_secs))
    }
}
