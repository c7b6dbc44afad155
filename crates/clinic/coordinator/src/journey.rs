//! Interaction tracking and patient journeys.
//!
//! Interactions are an audit-style log of what a patient did through any
//! channel. Recording is best-effort: a failed write is logged and the
//! triggering operation still succeeds.

use chrono::{DateTime, Duration, Utc};
use clinic_integrity::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use tujali_shared::{HealthError, HealthResult};

/// Record an interaction, logging instead of failing
pub fn track_interaction<S>(store: &S, interaction: NewInteraction) -> Option<UserInteraction>
where
    S: InteractionStore + ?Sized,
{
    match store.insert_interaction(&interaction) {
        Ok(recorded) => Some(recorded),
        Err(e) => {
            warn!(
                patient_id = interaction.patient_id,
                kind = %interaction.kind,
                error = %e,
                "failed to record interaction"
            );
            None
        }
    }
}

/// Record an interaction for an existing patient, surfacing errors
pub fn record_interaction<S>(store: &S, interaction: NewInteraction) -> HealthResult<UserInteraction>
where
    S: PatientStore + InteractionStore + ?Sized,
{
    if store.get_patient(interaction.patient_id)?.is_none() {
        return Err(HealthError::not_found("Patient", interaction.patient_id));
    }
    if interaction.description.trim().is_empty() {
        return Err(HealthError::validation("Interaction description is required"));
    }
    store.insert_interaction(&interaction)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JourneyStatistics {
    pub total_interactions: usize,
    pub counts_by_kind: BTreeMap<String, usize>,
    pub first_interaction: Option<DateTime<Utc>>,
    pub last_interaction: Option<DateTime<Utc>>,
    /// Only computed once the patient has been registered for a week
    pub average_per_month: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatientJourney {
    pub patient: Patient,
    pub interactions_by_kind: BTreeMap<String, Vec<UserInteraction>>,
    /// Every interaction, oldest first
    pub timeline: Vec<UserInteraction>,
    pub statistics: JourneyStatistics,
}

const MIN_DAYS_FOR_AVERAGE: i64 = 7;
const DAYS_PER_MONTH: f64 = 30.0;

pub fn patient_journey<S>(store: &S, patient_id: i64, now: DateTime<Utc>) -> HealthResult<PatientJourney>
where
    S: PatientStore + InteractionStore + ?Sized,
{
    let patient = store
        .get_patient(patient_id)?
        .ok_or_else(|| HealthError::not_found("Patient", patient_id))?;

    let mut timeline = store.list_interactions(patient_id)?;
    timeline.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let mut interactions_by_kind: BTreeMap<String, Vec<UserInteraction>> = BTreeMap::new();
    for interaction in &timeline {
        interactions_by_kind
            .entry(interaction.kind.to_string())
            .or_default()
            .push(interaction.clone());
    }
    let counts_by_kind = interactions_by_kind
        .iter()
        .map(|(kind, list)| (kind.clone(), list.len()))
        .collect();

    let registered_for = now - patient.created_at;
    let average_per_month = if registered_for >= Duration::days(MIN_DAYS_FOR_AVERAGE) {
        let months = registered_for.num_days() as f64 / DAYS_PER_MONTH;
        Some(timeline.len() as f64 / months.max(1.0 / DAYS_PER_MONTH))
    } else {
        None
    };

    let statistics = JourneyStatistics {
        total_interactions: timeline.len(),
        counts_by_kind,
        first_interaction: timeline.first().map(|i| i.created_at),
        last_interaction: timeline.last().map(|i| i.created_at),
        average_per_month,
    };

    Ok(PatientJourney {
        patient,
        interactions_by_kind,
        timeline,
        statistics,
    })
}
