//! Shared scenario setup.

use chrono::{DateTime, TimeZone, Utc};
use clinic::{register_provider, RegisterProviderInput};
use clinic_integrity::Provider;
use symptoms::Categorizer;
use tujali_storage::Database;
use ussd::{StoreBackend, UssdService, UssdSettings};
use ussd_integrity::{UssdRequest, UssdResponse};

pub const SERVICE_CODE: &str = "*384*123#";

/// Store, categorizer and USSD service wired together
pub struct Clinic {
    pub db: Database,
    pub categorizer: Categorizer,
    pub ussd: UssdService,
}

impl Clinic {
    pub fn new() -> Self {
        Self::with_db(Database::open_in_memory().expect("in-memory database"))
    }

    pub fn with_db(db: Database) -> Self {
        Self {
            db,
            categorizer: Categorizer::default(),
            ussd: UssdService::new(UssdSettings::default()).expect("default USSD settings"),
        }
    }

    pub fn provider(&self, username: &str, name: &str, fee: f64) -> Provider {
        register_provider(
            &self.db,
            RegisterProviderInput {
                username: username.to_string(),
                email: format!("{}@tujali.health", username),
                password_hash: "$argon2id$v=19$fixture".to_string(),
                name: name.to_string(),
                specialization: "General Practice".to_string(),
                license_number: format!("KMPDC-{}", username),
                languages: vec!["en".to_string(), "sw".to_string()],
                location: Some("Kisumu".to_string()),
                consultation_fee: Some(fee),
            },
        )
        .expect("provider")
        .1
    }

    /// One gateway round trip at `now`
    pub fn dial_at(&self, phone: &str, session_id: &str, text: &str, now: DateTime<Utc>) -> UssdResponse {
        let request = UssdRequest {
            session_id: session_id.to_string(),
            service_code: SERVICE_CODE.to_string(),
            phone_number: phone.to_string(),
            text: text.to_string(),
        };
        let backend = StoreBackend::new(&self.db, &self.categorizer);
        self.ussd.handle(&backend, &request, now).expect("accepted request")
    }

    pub fn dial(&self, phone: &str, session_id: &str, text: &str) -> UssdResponse {
        self.dial_at(phone, session_id, text, Utc::now())
    }
}

impl Default for Clinic {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed weekday midday for date-dependent scenarios
pub fn midday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().expect("valid timestamp")
}
