//! Downloadable receipts for settled payments.

use crate::get_payment;
use chrono::{DateTime, NaiveDate, Utc};
use clinic_integrity::ClinicStore;
use payments_integrity::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use tujali_shared::{HealthError, HealthResult};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub number: String,
    pub payment_id: i64,
    pub patient_name: String,
    pub provider_name: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub amount: f64,
    pub currency: String,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_amount: f64,
    pub balance: f64,
    pub issued_at: DateTime<Utc>,
}

pub fn receipt_number(payment_id: i64) -> String {
    format!("TJ-{:06}", payment_id)
}

impl Receipt {
    /// Plain-text rendering served as the download
    pub fn render(&self) -> String {
        let mut lines = vec![
            "TUJALI HEALTH - PAYMENT RECEIPT".to_string(),
            format!("Receipt No: {}", self.number),
            format!("Issued: {}", self.issued_at.format("%Y-%m-%d %H:%M UTC")),
            String::new(),
            format!("Patient: {}", self.patient_name),
            format!("Provider: {}", self.provider_name),
            format!("Appointment: {} at {}", self.appointment_date, self.appointment_time),
            String::new(),
            format!("Amount: {} {:.2}", self.currency, self.amount),
            format!("Method: {}", self.method),
        ];
        if let Some(reference) = &self.reference {
            lines.push(format!("Reference: {}", reference));
        }
        if let Some(paid_at) = self.paid_at {
            lines.push(format!("Paid: {}", paid_at.format("%Y-%m-%d %H:%M UTC")));
        }
        lines.push(format!("Status: {}", self.status));
        if self.refunded_amount > 0.0 {
            lines.push(format!("Refunded: {} {:.2}", self.currency, self.refunded_amount));
            lines.push(format!("Balance: {} {:.2}", self.currency, self.balance));
        }
        lines.join("\n")
    }
}

/// Build the receipt for a settled payment and stamp it as sent.
///
/// Pending and failed payments have nothing to acknowledge and are a
/// conflict.
pub fn issue_receipt<S>(store: &S, payment_id: i64, now: DateTime<Utc>) -> HealthResult<Receipt>
where
    S: ClinicStore + PaymentStore + ?Sized,
{
    let payment = get_payment(store, payment_id)?;
    if !matches!(
        payment.status,
        PaymentStatus::Completed | PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
    ) {
        return Err(HealthError::conflict(format!(
            "Payment {} is {}, no receipt is available",
            payment.id, payment.status
        )));
    }

    let appointment = store
        .get_appointment(payment.appointment_id)?
        .ok_or_else(|| HealthError::not_found("Appointment", payment.appointment_id))?;
    let patient = store
        .get_patient(appointment.patient_id)?
        .ok_or_else(|| HealthError::not_found("Patient", appointment.patient_id))?;
    let provider = store
        .get_provider(appointment.provider_id)?
        .ok_or_else(|| HealthError::not_found("Provider", appointment.provider_id))?;
    let refunds = store.list_refunds(payment.id)?;

    let payment = store.mark_receipt_sent(payment.id, now)?;
    info!(payment_id = payment.id, "receipt issued");

    Ok(Receipt {
        number: receipt_number(payment.id),
        payment_id: payment.id,
        patient_name: patient.name,
        provider_name: provider.name,
        appointment_date: appointment.date,
        appointment_time: appointment.time,
        refunded_amount: refunded_total(&refunds),
        balance: remaining_balance(&payment, &refunds),
        amount: payment.amount,
        currency: payment.currency,
        method: payment.method,
        reference: payment.reference,
        status: payment.status,
        paid_at: payment.paid_at,
        issued_at: now,
    })
}

