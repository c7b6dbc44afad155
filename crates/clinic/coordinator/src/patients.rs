//! Patient registry.

use chrono::Utc;
use clinic_integrity::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use tujali_shared::{HealthError, HealthResult, PaginatedResult, PaginationInput};

/// Input for registering a patient
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePatientInput {
    pub phone_number: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub location: Option<String>,
    /// Defaults to `en`
    pub language: Option<String>,
}

/// Create a patient; the phone number must not be registered yet
pub fn create_patient<S>(store: &S, input: CreatePatientInput) -> HealthResult<Patient>
where
    S: PatientStore + ?Sized,
{
    let new = new_patient(input)?;
    if store.find_patient_by_phone(&new.phone_number)?.is_some() {
        return Err(HealthError::conflict(format!(
            "A patient with phone number {} already exists",
            new.phone_number
        )));
    }

    let patient = store.insert_patient(&new)?;
    info!(patient_id = patient.id, "patient registered");
    Ok(patient)
}

/// Patient row from registration input, trimmed and validated
pub fn new_patient(input: CreatePatientInput) -> HealthResult<NewPatient> {
    let new = NewPatient {
        phone_number: input.phone_number.trim().to_string(),
        name: input.name.trim().to_string(),
        age: input.age,
        gender: input.gender,
        location: input.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
        language: input.language.unwrap_or_else(|| "en".to_string()),
        created_at: Utc::now(),
    };
    validate_new_patient(&new).into_result()?;
    Ok(new)
}

pub fn get_patient<S>(store: &S, id: i64) -> HealthResult<Patient>
where
    S: PatientStore + ?Sized,
{
    store
        .get_patient(id)?
        .ok_or_else(|| HealthError::not_found("Patient", id))
}

pub fn list_patients<S>(store: &S, pagination: &PaginationInput) -> HealthResult<PaginatedResult<Patient>>
where
    S: PatientStore + ?Sized,
{
    pagination.validate()?;
    Ok(pagination.paginate(store.list_patients()?))
}

pub fn find_patient_by_phone<S>(store: &S, phone_number: &str) -> HealthResult<Option<Patient>>
where
    S: PatientStore + ?Sized,
{
    store.find_patient_by_phone(phone_number.trim())
}

/// Placeholder name for patients first seen through the USSD channel
pub fn default_patient_name(phone_number: &str) -> String {
    let digits: Vec<char> = phone_number.chars().filter(|c| c.is_ascii_digit()).collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("Patient {}", tail)
}

/// Validated record for a number nobody has registered yet
pub fn placeholder_patient(phone_number: &str) -> HealthResult<NewPatient> {
    let phone_number = phone_number.trim();
    let new = NewPatient {
        phone_number: phone_number.to_string(),
        name: default_patient_name(phone_number),
        age: None,
        gender: None,
        location: None,
        language: "en".to_string(),
        created_at: Utc::now(),
    };
    validate_new_patient(&new).into_result()?;
    Ok(new)
}

/// Look a patient up by phone number, creating a placeholder record if none exists.
///
/// Returns the patient and whether it was created by this call.
pub fn get_or_create_patient<S>(store: &S, phone_number: &str) -> HealthResult<(Patient, bool)>
where
    S: PatientStore + ?Sized,
{
    let phone_number = phone_number.trim();
    if let Some(patient) = store.find_patient_by_phone(phone_number)? {
        return Ok((patient, false));
    }

    let new = placeholder_patient(phone_number)?;
    match store.insert_patient(&new) {
        Ok(patient) => {
            info!(patient_id = patient.id, "patient created from phone lookup");
            Ok((patient, true))
        }
        // Lost a race with a concurrent request for the same number
        Err(HealthError::Conflict(_)) => {
            debug!("patient inserted concurrently, re-reading");
            store
                .find_patient_by_phone(phone_number)?
                .map(|p| (p, false))
                .ok_or_else(|| HealthError::InternalError("patient vanished after conflict".to_string()))
        }
        Err(e) => Err(e),
    }
}

pub fn update_patient<S>(store: &S, id: i64, update: PatientUpdate) -> HealthResult<Patient>
where
    S: PatientStore + ?Sized,
{
    validate_patient_update(&update).into_result()?;
    if update.is_empty() {
        return get_patient(store, id);
    }
    store.update_patient(id, &update)
}

// ============================================================================
// Statistics
// ============================================================================

const TRACKED_LOCATIONS: [&str; 4] = ["Nairobi", "Mombasa", "Kisumu", "Nakuru"];

/// Registry breakdown for the admin dashboard
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatientStatistics {
    pub total: usize,
    pub by_location: BTreeMap<String, usize>,
    pub by_age_group: BTreeMap<String, usize>,
    pub by_gender: BTreeMap<String, usize>,
}

fn location_bucket(location: Option<&str>) -> &'static str {
    let location = location.unwrap_or_default().to_lowercase();
    TRACKED_LOCATIONS
        .iter()
        .find(|city| location.contains(&city.to_lowercase()))
        .copied()
        .unwrap_or("Other")
}

fn age_group(age: Option<u32>) -> &'static str {
    match age {
        None => "Unknown",
        Some(0..=18) => "0-18",
        Some(19..=30) => "19-30",
        Some(31..=45) => "31-45",
        Some(46..=60) => "46-60",
        Some(_) => "61+",
    }
}

pub fn patient_statistics<S>(store: &S) -> HealthResult<PatientStatistics>
where
    S: PatientStore + ?Sized,
{
    let patients = store.list_patients()?;

    let mut by_location: BTreeMap<String, usize> = TRACKED_LOCATIONS
        .iter()
        .chain(std::iter::once(&"Other"))
        .map(|l| (l.to_string(), 0))
        .collect();
    let mut by_age_group = BTreeMap::new();
    let mut by_gender = BTreeMap::new();

    for patient in &patients {
        *by_location
            .entry(location_bucket(patient.location.as_deref()).to_string())
            .or_insert(0) += 1;
        *by_age_group.entry(age_group(patient.age).to_string()).or_insert(0) += 1;
        let gender = patient.gender.map(|g| g.as_str()).unwrap_or("unknown");
        *by_gender.entry(gender.to_string()).or_insert(0) += 1;
    }

    Ok(PatientStatistics {
        total: patients.len(),
        by_location,
        by_age_group,
        by_gender,
    })
}
