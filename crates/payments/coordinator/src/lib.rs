//! Payments Coordinator
//!
//! Recording appointment payments, moving them through their statuses,
//! refunds against the remaining balance, receipts, and the revenue summary
//! shown on the admin dashboard.

use chrono::Utc;
use clinic::track_interaction;
use clinic_integrity::{AppointmentStatus, AppointmentStore, ClinicStore, InteractionKind, NewInteraction};
use payments_integrity::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};
use tujali_shared::{HealthError, HealthResult};

pub mod receipt;

pub use payments_integrity::{Payment, PaymentMethod, PaymentStatus, Refund};
pub use receipt::*;

/// Input for recording a payment against an appointment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePaymentInput {
    pub appointment_id: i64,
    /// Defaults to the appointment price
    pub amount: Option<f64>,
    pub phone_number: Option<String>,
    pub method: PaymentMethod,
    pub currency: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Record a `pending` payment for an open appointment
pub fn create_payment<S>(store: &S, input: CreatePaymentInput) -> HealthResult<Payment>
where
    S: ClinicStore + PaymentStore + ?Sized,
{
    let appointment = store
        .get_appointment(input.appointment_id)?
        .ok_or_else(|| HealthError::not_found("Appointment", input.appointment_id))?;
    if appointment.status == AppointmentStatus::Cancelled {
        return Err(HealthError::conflict(format!(
            "Appointment {} is cancelled",
            appointment.id
        )));
    }

    let new = NewPayment {
        appointment_id: appointment.id,
        amount: input.amount.unwrap_or(appointment.price),
        phone_number: input.phone_number.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        method: input.method,
        currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        reference: input.reference.filter(|r| !r.trim().is_empty()),
        notes: input.notes.filter(|n| !n.trim().is_empty()),
        created_at: Utc::now(),
    };
    validate_new_payment(&new).into_result()?;

    let payment = store.insert_payment(&new)?;
    info!(
        payment_id = payment.id,
        appointment_id = appointment.id,
        method = %payment.method,
        amount = payment.amount,
        "payment recorded"
    );

    track_interaction(
        store,
        NewInteraction::now(
            appointment.patient_id,
            InteractionKind::PaymentPending,
            format!("Payment of {} {:.2} started via {}", payment.currency, payment.amount, payment.method),
        )
        .with_metadata(json!({ "payment_id": payment.id, "appointment_id": appointment.id })),
    );
    Ok(payment)
}

pub fn get_payment<S>(store: &S, id: i64) -> HealthResult<Payment>
where
    S: PaymentStore + ?Sized,
{
    store
        .get_payment(id)?
        .ok_or_else(|| HealthError::not_found("Payment", id))
}

/// Newest first, optionally for a single appointment
pub fn list_payments<S>(store: &S, appointment_id: Option<i64>) -> HealthResult<Vec<Payment>>
where
    S: PaymentStore + ?Sized,
{
    store.list_payments(appointment_id)
}

/// A payment with its refund history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentDetails {
    pub payment: Payment,
    pub refunds: Vec<Refund>,
    pub refunded_amount: f64,
    pub remaining_balance: f64,
}

pub fn payment_details<S>(store: &S, id: i64) -> HealthResult<PaymentDetails>
where
    S: PaymentStore + ?Sized,
{
    let payment = get_payment(store, id)?;
    let refunds = store.list_refunds(id)?;
    Ok(PaymentDetails {
        refunded_amount: refunded_total(&refunds),
        remaining_balance: remaining_balance(&payment, &refunds),
        payment,
        refunds,
    })
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdatePaymentStatusInput {
    pub status: PaymentStatus,
    /// Gateway reference reported with the status change
    pub reference: Option<String>,
}

/// Move a payment to a new status and mirror it onto the appointment
pub fn update_payment_status<S>(store: &S, id: i64, input: UpdatePaymentStatusInput) -> HealthResult<Payment>
where
    S: ClinicStore + PaymentStore + ?Sized,
{
    let current = get_payment(store, id)?;
    if current.status == input.status {
        return Ok(current);
    }
    if !can_transition(current.status, input.status) {
        return Err(HealthError::conflict(format!(
            "Payment {} cannot move from {} to {}",
            id, current.status, input.status
        )));
    }

    let paid_at = (input.status == PaymentStatus::Completed).then(Utc::now);
    let payment = store.update_payment_status(id, input.status, paid_at)?;
    info!(payment_id = id, from = %current.status, to = %payment.status, "payment status changed");

    let Some(kind) = InteractionKind::for_payment(payment.status) else {
        return Ok(payment);
    };
    match store.get_appointment(payment.appointment_id)? {
        Some(appointment) => {
            let mut metadata = json!({ "payment_id": payment.id, "status": payment.status });
            if let Some(reference) = input.reference.filter(|r| !r.trim().is_empty()) {
                metadata["reference"] = json!(reference);
            }
            track_interaction(
                store,
                NewInteraction::now(
                    appointment.patient_id,
                    kind,
                    format!("Payment of {} {:.2} {}", payment.currency, payment.amount, payment.status),
                )
                .with_metadata(metadata),
            );
        }
        None => warn!(payment_id = id, "payment has no appointment; interaction skipped"),
    }
    Ok(payment)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefundInput {
    pub amount: f64,
    pub reason: String,
}

/// Refund part or all of a completed payment
pub fn refund_payment<S>(store: &S, id: i64, input: RefundInput, processed_by: Option<i64>) -> HealthResult<(Refund, Payment)>
where
    S: ClinicStore + PaymentStore + ?Sized,
{
    let new = NewRefund {
        payment_id: id,
        amount: input.amount,
        reason: input.reason.trim().to_string(),
        processed_by,
        processed_at: Utc::now(),
    };
    validate_new_refund(&new).into_result()?;
    get_payment(store, id)?;

    let (refund, payment) = store.apply_refund(&new)?;
    info!(
        payment_id = id,
        refund_id = refund.id,
        amount = refund.amount,
        status = %payment.status,
        "refund applied"
    );

    if let (Some(kind), Some(appointment)) = (
        InteractionKind::for_payment(payment.status),
        store.get_appointment(payment.appointment_id)?,
    ) {
        track_interaction(
            store,
            NewInteraction::now(
                appointment.patient_id,
                kind,
                format!("Refund of {} {:.2}: {}", payment.currency, refund.amount, refund.reason),
            )
            .with_metadata(json!({ "payment_id": payment.id, "refund_id": refund.id })),
        );
    }
    Ok((refund, payment))
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MethodTotals {
    pub count: usize,
    pub amount: f64,
    pub completed_amount: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentSummary {
    pub total_count: usize,
    pub pending_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub refunded_count: usize,
    pub pending_amount: f64,
    pub completed_amount: f64,
    pub refunded_amount: f64,
    pub total_revenue: f64,
    pub by_method: BTreeMap<String, MethodTotals>,
}

/// Revenue summary over every recorded payment.
///
/// Partially refunded payments count as completed; their refunds show up
/// in `refunded_amount`.
pub fn payment_summary<S>(store: &S) -> HealthResult<PaymentSummary>
where
    S: PaymentStore + ?Sized,
{
    let payments = store.list_payments(None)?;
    let mut summary = PaymentSummary::default();

    for payment in &payments {
        summary.total_count += 1;
        let settled = matches!(
            payment.status,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded
        );
        match payment.status {
            PaymentStatus::Pending => {
                summary.pending_count += 1;
                summary.pending_amount += payment.amount;
            }
            PaymentStatus::Failed => summary.failed_count += 1,
            PaymentStatus::Refunded => summary.refunded_count += 1,
            _ if settled => {
                summary.completed_count += 1;
                summary.completed_amount += payment.amount;
            }
            _ => {}
        }
        if matches!(payment.status, PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded) {
            summary.refunded_amount += refunded_total(&store.list_refunds(payment.id)?);
        }

        let totals = summary.by_method.entry(payment.method.to_string()).or_default();
        totals.count += 1;
        totals.amount += payment.amount;
        if settled {
            totals.completed_amount += payment.amount;
        }
    }

    summary.total_revenue = summary.completed_amount;
    Ok(summary)
}
