//! Terminal action handlers. Each returns the text of the closing screen.

use crate::backend::{Booking, Registration, UssdBackend};
use crate::interpreter::Selections;
use crate::menu::{health_tip, CANCELLED_TEXT, EMERGENCY_TEXT, EXIT_TEXT, SLOT_TAKEN_TEXT};
use chrono::{Duration, NaiveDate};
use clinic_integrity::{Gender, VisitType};
use symptoms_integrity::Severity;
use tracing::info;
use tujali_shared::{HealthError, HealthResult};
use ussd_integrity::{Param, TerminalAction, MAX_SCREEN_CHARS};

/// Appointments shown on the "My Appointments" screen
pub const LISTED_APPOINTMENTS: usize = 3;

pub fn run_action<B>(
    backend: &B,
    action: TerminalAction,
    phone_number: &str,
    selections: &Selections,
    today: NaiveDate,
) -> HealthResult<String>
where
    B: UssdBackend + ?Sized,
{
    let text = match action {
        TerminalAction::RegisterPatient => register(backend, phone_number, selections)?,
        TerminalAction::LogSymptom => log_symptom(backend, phone_number, selections)?,
        TerminalAction::BookAppointment => book(backend, phone_number, selections, today)?,
        TerminalAction::ListAppointments => list_appointments(backend, phone_number, today)?,
        TerminalAction::CancelBooking => CANCELLED_TEXT.to_string(),
        TerminalAction::HealthTip(topic) => health_tip(topic).to_string(),
        TerminalAction::Emergency => EMERGENCY_TEXT.to_string(),
        TerminalAction::Exit => EXIT_TEXT.to_string(),
    };
    Ok(fit_screen(text))
}

/// Trim to the carrier screen limit
pub fn fit_screen(text: String) -> String {
    if text.chars().count() <= MAX_SCREEN_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_SCREEN_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

fn register<B: UssdBackend + ?Sized>(backend: &B, phone_number: &str, selections: &Selections) -> HealthResult<String> {
    let registration = Registration {
        name: selections.require(Param::Name)?.to_string(),
        age: selections.parse(Param::Age)?,
        gender: selections.parse::<Gender>(Param::Gender)?,
        location: selections.require(Param::Location)?.to_string(),
    };
    let (patient, created) = backend.register_patient(phone_number, registration)?;
    info!(patient_id = patient.id, created, "patient registered over USSD");

    Ok(if created {
        format!("Thank you {}. You are now registered with Tujali Health.", patient.name)
    } else {
        format!("Thank you {}. Your details have been updated.", patient.name)
    })
}

fn log_symptom<B: UssdBackend + ?Sized>(backend: &B, phone_number: &str, selections: &Selections) -> HealthResult<String> {
    let text = selections.require(Param::SymptomText)?;
    let severity: Severity = selections.parse(Param::Severity)?;
    let logged = backend.log_symptom(phone_number, text, severity)?;

    let advice = match severity {
        Severity::Severe => "If it gets worse, choose Emergency Services or call 999.",
        _ => "A health worker will follow up with you.",
    };
    Ok(format!(
        "Thank you. Your {} symptom report (ref {}) has been recorded. {}",
        logged.report.severity, logged.report.id, advice
    ))
}

fn book<B: UssdBackend + ?Sized>(
    backend: &B,
    phone_number: &str,
    selections: &Selections,
    today: NaiveDate,
) -> HealthResult<String> {
    let provider_id: i64 = selections.parse(Param::ProviderId)?;
    let day_offset: i64 = selections.parse(Param::DayOffset)?;
    let visit_type: VisitType = selections.parse(Param::VisitType)?;
    let booking = Booking {
        provider_id,
        date: today + Duration::days(day_offset),
        time: selections.require(Param::Slot)?.to_string(),
        visit_type,
    };

    let provider = backend
        .provider(provider_id)?
        .ok_or_else(|| HealthError::not_found("Provider", provider_id))?;
    let appointment = match backend.book_appointment(phone_number, booking) {
        Ok(appointment) => appointment,
        Err(HealthError::Conflict(reason)) => {
            info!(provider_id, %reason, "slot taken before confirmation");
            return Ok(SLOT_TAKEN_TEXT.to_string());
        }
        Err(e) => return Err(e),
    };

    let place = match appointment.visit_type {
        VisitType::Physical => provider.location.unwrap_or_else(|| "Clinic visit".to_string()),
        VisitType::Teleconsult => "Teleconsultation".to_string(),
    };
    Ok(format!(
        "Appointment confirmed! Booking ID: {}\n{}\n{} at {}\n{}\nFee: KES {:.0}",
        appointment.id,
        provider.name,
        appointment.date.format("%d %b %Y"),
        appointment.time,
        place,
        appointment.price
    ))
}

fn list_appointments<B: UssdBackend + ?Sized>(backend: &B, phone_number: &str, today: NaiveDate) -> HealthResult<String> {
    let Some(patient) = backend.find_patient(phone_number)? else {
        return Ok(no_appointments());
    };
    let appointments = backend.upcoming_appointments(patient.id, today, LISTED_APPOINTMENTS)?;
    if appointments.is_empty() {
        return Ok(no_appointments());
    }

    let mut lines = vec!["Your appointments:".to_string()];
    for (i, appointment) in appointments.iter().enumerate() {
        let provider = backend
            .provider(appointment.provider_id)?
            .map(|p| p.name)
            .unwrap_or_else(|| "Provider".to_string());
        lines.push(format!(
            "{}. {} {} {}",
            i + 1,
            appointment.date.format("%d %b"),
            appointment.time,
            provider
        ));
    }
    Ok(lines.join("\n"))
}

fn no_appointments() -> String {
    "You have no upcoming appointments. Dial again and choose 1 to book.".to_string()
}
