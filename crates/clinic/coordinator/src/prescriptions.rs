//! Prescriptions issued by providers.

use crate::journey::track_interaction;
use chrono::Utc;
use clinic_integrity::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use tujali_shared::{HealthError, HealthResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePrescriptionInput {
    pub patient_id: i64,
    pub medications: Vec<Medication>,
    pub instructions: Option<String>,
    #[serde(default = "default_collection_method")]
    pub collection_method: CollectionMethod,
}

fn default_collection_method() -> CollectionMethod {
    CollectionMethod::PharmacyPickup
}

/// Issue a prescription from `provider_id` to a patient
pub fn create_prescription<S>(store: &S, provider_id: i64, input: CreatePrescriptionInput) -> HealthResult<Prescription>
where
    S: ClinicStore + ?Sized,
{
    let patient = store
        .get_patient(input.patient_id)?
        .ok_or_else(|| HealthError::not_found("Patient", input.patient_id))?;
    let new = NewPrescription {
        provider_id,
        patient_id: patient.id,
        medications: input.medications,
        instructions: input.instructions.filter(|i| !i.trim().is_empty()),
        collection_method: input.collection_method,
        created_at: Utc::now(),
    };
    validate_new_prescription(&new).into_result()?;

    let rx = store.insert_prescription(&new)?;
    info!(prescription_id = rx.id, patient_id = patient.id, "prescription created");

    let names: Vec<&str> = rx.medications.iter().map(|m| m.name.as_str()).collect();
    track_interaction(
        store,
        NewInteraction::now(
            patient.id,
            InteractionKind::Prescription,
            format!("Prescribed {}", names.join(", ")),
        )
        .with_metadata(json!({ "prescription_id": rx.id })),
    );
    Ok(rx)
}

pub fn get_prescription<S>(store: &S, id: i64) -> HealthResult<Prescription>
where
    S: RecordStore + ?Sized,
{
    store
        .get_prescription(id)?
        .ok_or_else(|| HealthError::not_found("Prescription", id))
}

pub fn list_provider_prescriptions<S>(store: &S, provider_id: i64) -> HealthResult<Vec<Prescription>>
where
    S: RecordStore + ?Sized,
{
    store.list_prescriptions(Some(provider_id), None)
}

pub fn list_patient_prescriptions<S>(store: &S, patient_id: i64) -> HealthResult<Vec<Prescription>>
where
    S: RecordStore + ?Sized,
{
    store.list_prescriptions(None, Some(patient_id))
}

pub fn update_prescription_status<S>(store: &S, id: i64, status: PrescriptionStatus) -> HealthResult<Prescription>
where
    S: RecordStore + ?Sized,
{
    let current = get_prescription(store, id)?;
    if current.status == status {
        return Ok(current);
    }
    if !current.status.can_transition_to(status) {
        return Err(HealthError::conflict(format!(
            "Prescription {} cannot move from {} to {}",
            id, current.status, status
        )));
    }
    let updated = store.set_prescription_status(id, status)?;
    info!(prescription_id = id, status = %status, "prescription status changed");
    Ok(updated)
}
