//! Appointment booking and status changes.

use crate::patients::placeholder_patient;
use chrono::{NaiveDate, Utc};
use clinic_integrity::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use tujali_shared::{HealthError, HealthResult};

/// Input for booking an appointment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateAppointmentInput {
    pub patient_id: i64,
    #[serde(flatten)]
    pub slot: BookingDetails,
}

/// What is booked, independent of who it is booked for
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingDetails {
    pub provider_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub visit_type: VisitType,
    /// Defaults to the provider's consultation fee
    pub price: Option<f64>,
    /// Defaults to `pending` for web bookings and `confirmed` for USSD
    pub status: Option<AppointmentStatus>,
    pub source: BookingSource,
    pub notes: Option<String>,
}

/// Book an appointment for an existing patient with an existing provider
pub fn create_appointment<S>(store: &S, input: CreateAppointmentInput) -> HealthResult<Appointment>
where
    S: ClinicStore + ?Sized,
{
    let patient = store
        .get_patient(input.patient_id)?
        .ok_or_else(|| HealthError::not_found("Patient", input.patient_id))?;
    Ok(book(store, PatientRef::Id(patient.id), input.slot)?.appointment)
}

/// Book for whoever holds `phone_number`, registering a placeholder patient
/// in the same transaction when the number is new
pub fn book_for_phone<S>(store: &S, phone_number: &str, details: BookingDetails) -> HealthResult<Booked>
where
    S: ClinicStore + ?Sized,
{
    let placeholder = placeholder_patient(phone_number)?;
    book(store, PatientRef::Phone(placeholder), details)
}

fn book<S>(store: &S, patient: PatientRef, details: BookingDetails) -> HealthResult<Booked>
where
    S: ClinicStore + ?Sized,
{
    let (provider, booking) = prepare_booking(store, patient, details)?;
    let booked = store.insert_booking(&booking)?;
    info!(
        appointment_id = booked.appointment.id,
        patient_id = booked.patient.id,
        provider_id = provider.id,
        source = %booked.appointment.source,
        patient_created = booked.patient_created,
        "appointment booked"
    );
    Ok(booked)
}

/// Validate a booking against its provider without writing anything
pub fn prepare_booking<S>(store: &S, patient: PatientRef, details: BookingDetails) -> HealthResult<(Provider, NewBooking)>
where
    S: ClinicStore + ?Sized,
{
    let provider = store
        .get_provider(details.provider_id)?
        .ok_or_else(|| HealthError::not_found("Provider", details.provider_id))?;
    let appointment = draft_appointment(&provider, details);
    validate_new_appointment(&appointment).into_result()?;

    let interaction = NewInteraction::now(
        appointment.patient_id,
        InteractionKind::Appointment,
        format!(
            "Booked {} appointment with {} on {} at {}",
            appointment.visit_type, provider.name, appointment.date, appointment.time
        ),
    )
    .with_metadata(json!({
        "provider_id": provider.id,
        "source": appointment.source,
    }));

    Ok((
        provider,
        NewBooking {
            patient,
            appointment,
            interaction,
        },
    ))
}

/// Appointment row for `provider` with defaults applied. The patient is
/// left for the store to fill in.
pub fn draft_appointment(provider: &Provider, details: BookingDetails) -> NewAppointment {
    let price = details.price.unwrap_or(provider.consultation_fee);
    let status = details.status.unwrap_or(match details.source {
        BookingSource::Ussd => AppointmentStatus::Confirmed,
        BookingSource::Web | BookingSource::WalkIn => AppointmentStatus::Pending,
    });
    NewAppointment {
        patient_id: 0,
        provider_id: provider.id,
        date: details.date,
        time: details.time.trim().to_string(),
        visit_type: details.visit_type,
        status,
        price,
        payment_status: if price > 0.0 {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Waived
        },
        source: details.source,
        notes: details.notes.filter(|n| !n.trim().is_empty()),
        created_at: Utc::now(),
    }
}

/// Start times held on `date` by open appointments of patients other than
/// `except_patient`
pub fn taken_slots<S>(store: &S, provider_id: i64, date: NaiveDate, except_patient: Option<i64>) -> HealthResult<Vec<String>>
where
    S: AppointmentStore + ?Sized,
{
    let filter = AppointmentFilter {
        provider_id: Some(provider_id),
        from_date: Some(date),
        ..Default::default()
    };
    Ok(store
        .list_appointments(&filter)?
        .into_iter()
        .take_while(|a| a.date == date)
        .filter(|a| a.holds_slot() && Some(a.patient_id) != except_patient)
        .map(|a| a.time)
        .collect())
}

pub fn get_appointment<S>(store: &S, id: i64) -> HealthResult<Appointment>
where
    S: AppointmentStore + ?Sized,
{
    store
        .get_appointment(id)?
        .ok_or_else(|| HealthError::not_found("Appointment", id))
}

pub fn list_appointments<S>(store: &S, filter: &AppointmentFilter) -> HealthResult<Vec<Appointment>>
where
    S: AppointmentStore + ?Sized,
{
    store.list_appointments(filter)
}

/// Open appointments on or after `today`, soonest first
pub fn upcoming_appointments<S>(store: &S, patient_id: i64, today: NaiveDate, limit: usize) -> HealthResult<Vec<Appointment>>
where
    S: AppointmentStore + ?Sized,
{
    let filter = AppointmentFilter {
        patient_id: Some(patient_id),
        from_date: Some(today),
        ..Default::default()
    };
    Ok(store
        .list_appointments(&filter)?
        .into_iter()
        .filter(|a| !a.status.is_final())
        .take(limit)
        .collect())
}

/// Input for a status change from the provider dashboard
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateAppointmentStatusInput {
    pub status: AppointmentStatus,
    pub payment_status: Option<PaymentStatus>,
}

pub fn update_appointment_status<S>(store: &S, id: i64, input: UpdateAppointmentStatusInput) -> HealthResult<Appointment>
where
    S: AppointmentStore + ?Sized,
{
    let current = get_appointment(store, id)?;
    if !current.status.can_transition_to(input.status) {
        return Err(HealthError::conflict(format!(
            "Appointment {} cannot move from {} to {}",
            id, current.status, input.status
        )));
    }

    let mut updated = if current.status == input.status {
        current
    } else {
        store.set_appointment_status(id, input.status)?
    };
    if let Some(payment_status) = input.payment_status {
        if payment_status != updated.payment_status {
            updated = store.set_appointment_payment_status(id, payment_status)?;
        }
    }

    info!(appointment_id = id, status = %updated.status, "appointment updated");
    Ok(updated)
}
