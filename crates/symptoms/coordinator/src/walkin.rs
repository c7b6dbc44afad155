//! Front-desk intake: a walk-in becomes a patient, an appointment and a
//! symptom report written together.

use crate::categorize::{parse_report_content, Categorizer};
use crate::reports::LoggedSymptom;
use chrono::{DateTime, NaiveDate, Utc};
use clinic::{new_patient, prepare_booking, BookingDetails, CreatePatientInput};
use clinic_integrity::{
    Appointment, AppointmentStatus, BookingSource, ClinicStore, Gender, InteractionKind, NewInteraction, Patient,
    PatientRef, VisitType,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use symptoms_integrity::*;
use tracing::info;
use tujali_shared::{validate_text, HealthResult, ValidationErrorCode};

const MAX_NOTES_CHARS: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalkInSchedule {
    /// Seen by the doctor on arrival
    SeeNow,
    Later { date: NaiveDate, time: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalkInInput {
    pub name: String,
    pub phone_number: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    /// Town the patient lives in
    pub location: Option<String>,
    pub schedule: WalkInSchedule,
    /// Defaults to `physical`
    #[serde(default)]
    pub visit_type: Option<VisitType>,
    pub chief_complaint: String,
    pub duration: SymptomDuration,
    pub severity: Severity,
    pub body_site: BodySite,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalkIn {
    pub patient: Patient,
    pub patient_created: bool,
    pub appointment: Appointment,
    pub symptom: LoggedSymptom,
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Mild => "Mild",
        Severity::Moderate => "Moderate",
        Severity::Severe => "Severe",
        Severity::Unknown => "Unknown",
    }
}

/// Report body in the `Chief Complaint:` line format the categorizer reads
pub fn intake_content(
    chief_complaint: &str,
    duration: SymptomDuration,
    severity: Severity,
    body_site: BodySite,
    additional_notes: Option<&str>,
) -> String {
    format!(
        "Chief Complaint: {}\nDuration: {}\nSeverity: {}\nLocation: {}\nAdditional Notes: {}",
        chief_complaint.trim(),
        duration.label(),
        severity_label(severity),
        body_site.label(),
        additional_notes.map(str::trim).unwrap_or_default(),
    )
}

fn validate_intake(input: &WalkInInput, today: NaiveDate) -> HealthResult<()> {
    let mut result = validate_text(&input.chief_complaint, "chief_complaint", 3, 300);
    if input.severity == Severity::Unknown {
        result.add_error("severity", "Choose how severe the symptoms are", ValidationErrorCode::Required);
    }
    if let Some(notes) = &input.additional_notes {
        if notes.chars().count() > MAX_NOTES_CHARS {
            result.add_error("additional_notes", "Additional notes cannot exceed 500 characters", ValidationErrorCode::TooLong);
        }
    }
    if let WalkInSchedule::Later { date, .. } = &input.schedule {
        if *date < today {
            result.add_error("date", "Appointment date cannot be in the past", ValidationErrorCode::OutOfRange);
        }
    }
    result.into_result()
}

/// Register a walk-in with `provider_id`.
///
/// A phone number that already belongs to a patient reuses that record.
/// Seeing the patient now books a completed appointment at `now`; a later
/// visit is booked pending and holds its slot like any other booking.
pub fn record_walk_in<S>(
    store: &S,
    categorizer: &Categorizer,
    provider_id: i64,
    input: WalkInInput,
    now: DateTime<Utc>,
) -> HealthResult<WalkIn>
where
    S: ClinicStore + IntakeStore + ?Sized,
{
    validate_intake(&input, now.date_naive())?;

    let patient = new_patient(CreatePatientInput {
        phone_number: input.phone_number,
        name: input.name,
        age: input.age,
        gender: input.gender,
        location: input.location,
        language: None,
    })?;

    let content = intake_content(
        &input.chief_complaint,
        input.duration,
        input.severity,
        input.body_site,
        input.additional_notes.as_deref(),
    );
    let (date, time, status, heading) = match input.schedule {
        WalkInSchedule::SeeNow => (
            now.date_naive(),
            now.format("%H:%M").to_string(),
            AppointmentStatus::Completed,
            "Walk-in patient.",
        ),
        WalkInSchedule::Later { date, time } => (date, time, AppointmentStatus::Pending, "Scheduled appointment."),
    };
    let seen_now = status == AppointmentStatus::Completed;

    let report = NewSymptomReport {
        patient_id: None,
        content: content.clone(),
        severity: input.severity,
        location: patient.location.clone(),
        channel: ReportChannel::WalkIn,
        reported_at: now,
    };
    validate_new_report(&report).into_result()?;

    let (provider, mut booking) = prepare_booking(
        store,
        PatientRef::Phone(patient),
        BookingDetails {
            provider_id,
            date,
            time,
            visit_type: input.visit_type.unwrap_or(VisitType::Physical),
            price: None,
            status: Some(status),
            source: BookingSource::WalkIn,
            notes: Some(format!("{}\n{}", heading, content)),
        },
    )?;
    booking.interaction = NewInteraction::now(0, InteractionKind::WalkIn, "Checked in as a walk-in").with_metadata(json!({
        "provider_id": provider.id,
        "seen_now": seen_now,
        "symptom_severity": input.severity,
        "symptom_location": input.body_site,
    }));

    let record = store.insert_walk_in(&NewWalkIn { booking, report })?;

    let symptom_text = parse_report_content(&record.report.content)
        .map(|p| p.symptom_text)
        .unwrap_or_else(|| input.chief_complaint.to_lowercase());
    let categorization = categorizer.categorize(&symptom_text);
    info!(
        patient_id = record.patient.id,
        appointment_id = record.appointment.id,
        report_id = record.report.id,
        provider_id = provider.id,
        category = %categorization.category,
        seen_now,
        "walk-in recorded"
    );

    Ok(WalkIn {
        patient: record.patient,
        patient_created: record.patient_created,
        appointment: record.appointment,
        symptom: LoggedSymptom {
            report: record.report,
            category: categorization.category,
            confidence: categorization.confidence,
        },
    })
}
