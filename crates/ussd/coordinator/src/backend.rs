//! Data-layer operations the USSD actions need.

use crate::interpreter::ProviderChoice;
use chrono::NaiveDate;
use clinic::geo::providers_near;
use clinic::{
    book_for_phone, create_patient, get_or_create_patient, taken_slots, track_interaction, update_patient,
    upcoming_appointments, BookingDetails, CreatePatientInput,
};
use clinic_integrity::*;
use symptoms::{report_symptom, Categorizer, LoggedSymptom, ReportSymptomInput};
use symptoms_integrity::{ReportChannel, Severity, SymptomStore};
use tujali_shared::HealthResult;

/// Details captured by the registration branch
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub location: String,
}

/// Booking captured by the appointment branch
#[derive(Clone, Debug, PartialEq)]
pub struct Booking {
    pub provider_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub visit_type: VisitType,
}

pub trait UssdBackend {
    /// At most `limit` providers, nearest to `near` first when given
    fn providers_near(&self, near: Option<&str>, limit: usize) -> HealthResult<Vec<ProviderChoice>>;
    /// Start times on `date` held by patients other than the caller
    fn taken_slots(&self, provider_id: i64, date: NaiveDate, phone_number: &str) -> HealthResult<Vec<String>>;
    fn provider(&self, id: i64) -> HealthResult<Option<Provider>>;
    fn find_patient(&self, phone_number: &str) -> HealthResult<Option<Patient>>;

    /// Create the patient or update the existing one; `true` when created
    fn register_patient(&self, phone_number: &str, registration: Registration) -> HealthResult<(Patient, bool)>;
    fn log_symptom(&self, phone_number: &str, text: &str, severity: Severity) -> HealthResult<LoggedSymptom>;
    /// `Conflict` when another patient holds the slot by now
    fn book_appointment(&self, phone_number: &str, booking: Booking) -> HealthResult<Appointment>;
    fn upcoming_appointments(&self, patient_id: i64, today: NaiveDate, limit: usize) -> HealthResult<Vec<Appointment>>;
}

/// [`UssdBackend`] over the clinic and symptom stores
pub struct StoreBackend<'a, S: ?Sized> {
    store: &'a S,
    categorizer: &'a Categorizer,
}

impl<'a, S: ?Sized> StoreBackend<'a, S> {
    pub fn new(store: &'a S, categorizer: &'a Categorizer) -> Self {
        Self { store, categorizer }
    }
}

impl<S> UssdBackend for StoreBackend<'_, S>
where
    S: ClinicStore + SymptomStore + ?Sized,
{
    fn providers_near(&self, near: Option<&str>, limit: usize) -> HealthResult<Vec<ProviderChoice>> {
        let listed: Vec<(Provider, Option<f64>)> = match near {
            Some(near) => providers_near(self.store, near, limit)?
                .1
                .into_iter()
                .map(|n| (n.provider, n.distance_km))
                .collect(),
            None => self.store.list_providers()?.into_iter().take(limit).map(|p| (p, None)).collect(),
        };
        Ok(listed
            .into_iter()
            .map(|(p, distance_km)| ProviderChoice {
                id: p.id,
                name: p.name,
                specialization: p.specialization,
                distance_km,
            })
            .collect())
    }

    fn taken_slots(&self, provider_id: i64, date: NaiveDate, phone_number: &str) -> HealthResult<Vec<String>> {
        let caller = self.store.find_patient_by_phone(phone_number.trim())?.map(|p| p.id);
        taken_slots(self.store, provider_id, date, caller)
    }

    fn provider(&self, id: i64) -> HealthResult<Option<Provider>> {
        self.store.get_provider(id)
    }

    fn find_patient(&self, phone_number: &str) -> HealthResult<Option<Patient>> {
        self.store.find_patient_by_phone(phone_number.trim())
    }

    fn register_patient(&self, phone_number: &str, registration: Registration) -> HealthResult<(Patient, bool)> {
        match self.store.find_patient_by_phone(phone_number.trim())? {
            Some(existing) => {
                let update = PatientUpdate {
                    name: Some(registration.name),
                    age: Some(registration.age),
                    gender: Some(registration.gender),
                    location: Some(registration.location),
                    language: None,
                };
                Ok((update_patient(self.store, existing.id, update)?, false))
            }
            None => {
                let patient = create_patient(
                    self.store,
                    CreatePatientInput {
                        phone_number: phone_number.to_string(),
                        name: registration.name,
                        age: Some(registration.age),
                        gender: Some(registration.gender),
                        location: Some(registration.location),
                        language: None,
                    },
                )?;
                track_interaction(
                    self.store,
                    NewInteraction::now(patient.id, InteractionKind::Registration, "Registered via USSD"),
                );
                Ok((patient, true))
            }
        }
    }

    fn log_symptom(&self, phone_number: &str, text: &str, severity: Severity) -> HealthResult<LoggedSymptom> {
        let (patient, _) = get_or_create_patient(self.store, phone_number)?;
        report_symptom(
            self.store,
            self.categorizer,
            ReportSymptomInput {
                patient_id: Some(patient.id),
                content: text.to_string(),
                severity: Some(severity),
                location: patient.location.clone(),
                channel: ReportChannel::Ussd,
            },
        )
    }

    fn book_appointment(&self, phone_number: &str, booking: Booking) -> HealthResult<Appointment> {
        let details = BookingDetails {
            provider_id: booking.provider_id,
            date: booking.date,
            time: booking.time,
            visit_type: booking.visit_type,
            price: None,
            status: None,
            source: BookingSource::Ussd,
            notes: None,
        };
        Ok(book_for_phone(self.store, phone_number, details)?.appointment)
    }

    fn upcoming_appointments(&self, patient_id: i64, today: NaiveDate, limit: usize) -> HealthResult<Vec<Appointment>> {
        upcoming_appointments(self.store, patient_id, today, limit)
    }
}

