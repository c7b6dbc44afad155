//! Lab test orders and results.

use crate::journey::track_interaction;
use chrono::Utc;
use clinic_integrity::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use tujali_shared::{HealthError, HealthResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderLabTestInput {
    pub patient_id: i64,
    pub test_name: String,
    pub test_type: String,
    #[serde(default)]
    pub fee: f64,
    pub reference_range: Option<serde_json::Value>,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
    pub notes: Option<String>,
}

fn default_urgency() -> Urgency {
    Urgency::Routine
}

/// Order a lab test; the result starts `pending`
pub fn order_lab_test<S>(store: &S, provider_id: i64, input: OrderLabTestInput) -> HealthResult<LabResult>
where
    S: ClinicStore + ?Sized,
{
    let patient = store
        .get_patient(input.patient_id)?
        .ok_or_else(|| HealthError::not_found("Patient", input.patient_id))?;
    let new = NewLabResult {
        patient_id: patient.id,
        provider_id,
        test_name: input.test_name.trim().to_string(),
        test_type: input.test_type.trim().to_string(),
        fee: input.fee,
        reference_range: input.reference_range,
        urgency: input.urgency,
        notes: input.notes,
        test_date: Utc::now(),
    };
    validate_new_lab_result(&new).into_result()?;

    let lab = store.insert_lab_result(&new)?;
    info!(lab_id = lab.id, urgency = %lab.urgency, "lab test ordered");

    track_interaction(
        store,
        NewInteraction::now(patient.id, InteractionKind::LabResult, format!("Lab test ordered: {}", lab.test_name))
            .with_metadata(json!({ "lab_result_id": lab.id, "urgency": lab.urgency })),
    );
    Ok(lab)
}

pub fn get_lab_result<S>(store: &S, id: i64) -> HealthResult<LabResult>
where
    S: RecordStore + ?Sized,
{
    store
        .get_lab_result(id)?
        .ok_or_else(|| HealthError::not_found("Lab result", id))
}

pub fn list_patient_lab_results<S>(store: &S, patient_id: i64) -> HealthResult<Vec<LabResult>>
where
    S: RecordStore + ?Sized,
{
    store.list_lab_results(None, Some(patient_id))
}

pub fn list_provider_lab_results<S>(store: &S, provider_id: i64) -> HealthResult<Vec<LabResult>>
where
    S: RecordStore + ?Sized,
{
    store.list_lab_results(Some(provider_id), None)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnterLabResultsInput {
    pub results: serde_json::Value,
    #[serde(default)]
    pub is_abnormal: bool,
    pub notes: Option<String>,
}

/// Record results on a pending test, completing it
pub fn enter_lab_results<S>(store: &S, id: i64, input: EnterLabResultsInput) -> HealthResult<LabResult>
where
    S: RecordStore + ?Sized,
{
    let mut lab = get_lab_result(store, id)?;
    if lab.status != LabStatus::Pending {
        return Err(HealthError::conflict(format!("Lab result {} is already {}", id, lab.status)));
    }
    if input.results.is_null() {
        return Err(HealthError::validation("Results are required"));
    }

    lab.status = LabStatus::Completed;
    lab.results = Some(input.results);
    lab.is_abnormal = input.is_abnormal;
    if input.notes.is_some() {
        lab.notes = input.notes;
    }
    lab.result_date = Some(Utc::now());

    let lab = store.update_lab_result(&lab)?;
    info!(lab_id = id, abnormal = lab.is_abnormal, "lab results entered");
    Ok(lab)
}

/// Cancel a pending test
pub fn cancel_lab_test<S>(store: &S, id: i64) -> HealthResult<LabResult>
where
    S: RecordStore + ?Sized,
{
    let mut lab = get_lab_result(store, id)?;
    match lab.status {
        LabStatus::Cancelled => Ok(lab),
        LabStatus::Completed => Err(HealthError::conflict(format!("Lab result {} is already completed", id))),
        LabStatus::Pending => {
            lab.status = LabStatus::Cancelled;
            store.update_lab_result(&lab)
        }
    }
}
