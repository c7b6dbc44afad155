//! Payments Integrity
//!
//! Entry types for appointment payments and refunds, the payment status
//! transition table and the refund balance rule. Payment statuses reuse
//! [`PaymentStatus`] so a payment and its appointment speak the same values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tujali_shared::{
    string_enum, validate_amount, validate_phone_number, HealthResult, ValidationErrorCode,
    ValidationResult,
};

pub use clinic_integrity::PaymentStatus;

pub const DEFAULT_CURRENCY: &str = "KES";

/// Amounts closer to zero than this count as settled
const BALANCE_EPSILON: f64 = 0.005;

string_enum! {
    pub enum PaymentMethod {
        Mpesa => "mpesa",
        Cash => "cash",
        Card => "card",
        Insurance => "insurance",
        BankTransfer => "bank_transfer",
    }
}

impl PaymentMethod {
    /// Lenient parse for summaries; unrecognised methods count as cash
    pub fn parse_or_cash(value: &str) -> Self {
        value.parse().unwrap_or(PaymentMethod::Cash)
    }
}

string_enum! {
    pub enum RefundStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Payment entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub appointment_id: i64,
    pub amount: f64,
    pub phone_number: Option<String>,
    pub method: PaymentMethod,
    pub currency: String,
    pub status: PaymentStatus,
    /// Gateway or receipt reference
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    /// First time a receipt was issued
    pub receipt_sent_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewPayment {
    pub appointment_id: i64,
    pub amount: f64,
    pub phone_number: Option<String>,
    pub method: PaymentMethod,
    pub currency: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Refund entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub id: i64,
    pub payment_id: i64,
    pub amount: f64,
    pub reason: String,
    pub status: RefundStatus,
    pub processed_by: Option<i64>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewRefund {
    pub payment_id: i64,
    pub amount: f64,
    pub reason: String,
    pub processed_by: Option<i64>,
    pub processed_at: DateTime<Utc>,
}

// ============================================================================
// Rules
// ============================================================================

/// Whether a status update may move a payment from `from` to `to`.
///
/// Refund states are only reachable through [`refund_outcome`]; an update to
/// the current status is accepted as a no-op.
pub fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (PaymentStatus::Pending, PaymentStatus::Completed)
            | (PaymentStatus::Pending, PaymentStatus::Failed)
            | (PaymentStatus::Failed, PaymentStatus::Pending)
    )
}

/// Sum of completed refunds
pub fn refunded_total(refunds: &[Refund]) -> f64 {
    refunds
        .iter()
        .filter(|r| r.status == RefundStatus::Completed)
        .map(|r| r.amount)
        .sum()
}

/// Amount still refundable on a payment
pub fn remaining_balance(payment: &Payment, refunds: &[Refund]) -> f64 {
    (payment.amount - refunded_total(refunds)).max(0.0)
}

/// Validate a refund against the payment and its prior refunds and return
/// the payment status the refund leaves behind.
pub fn refund_outcome(payment: &Payment, refunds: &[Refund], amount: f64) -> HealthResult<PaymentStatus> {
    if !matches!(
        payment.status,
        PaymentStatus::Completed | PaymentStatus::PartiallyRefunded
    ) {
        return Err(tujali_shared::HealthError::conflict(format!(
            "Only completed payments can be refunded (payment {} is {})",
            payment.id, payment.status
        )));
    }

    validate_amount(amount, "amount").into_result()?;

    let remaining = remaining_balance(payment, refunds);
    if amount > remaining + BALANCE_EPSILON {
        return Err(tujali_shared::HealthError::validation(format!(
            "Refund amount {:.2} exceeds remaining balance {:.2}",
            amount, remaining
        )));
    }

    if remaining - amount <= BALANCE_EPSILON {
        Ok(PaymentStatus::Refunded)
    } else {
        Ok(PaymentStatus::PartiallyRefunded)
    }
}

pub fn validate_new_payment(payment: &NewPayment) -> ValidationResult {
    let mut result = validate_amount(payment.amount, "amount");
    if let Some(phone) = &payment.phone_number {
        result.merge(validate_phone_number(phone));
    }
    if payment.method == PaymentMethod::Mpesa && payment.phone_number.is_none() {
        result.add_error(
            "phone_number",
            "M-Pesa payments need a phone number",
            ValidationErrorCode::Required,
        );
    }
    if payment.currency.len() != 3 || !payment.currency.chars().all(|c| c.is_ascii_uppercase()) {
        result.add_error("currency", "Currency must be a 3-letter code", ValidationErrorCode::InvalidFormat);
    }
    result
}

pub fn validate_new_refund(refund: &NewRefund) -> ValidationResult {
    let mut result = validate_amount(refund.amount, "amount");
    if refund.reason.trim().is_empty() {
        result.add_error("reason", "Refund reason is required", ValidationErrorCode::Required);
    }
    result
}

// ============================================================================
// Store interface
// ============================================================================

pub trait PaymentStore: Send + Sync {
    fn insert_payment(&self, payment: &NewPayment) -> HealthResult<Payment>;
    fn get_payment(&self, id: i64) -> HealthResult<Option<Payment>>;
    /// Newest first; `None` lists every payment
    fn list_payments(&self, appointment_id: Option<i64>) -> HealthResult<Vec<Payment>>;

    /// Set the payment status and mirror it onto the appointment in one transaction.
    /// `paid_at` is only written when the payment has none yet.
    fn update_payment_status(
        &self,
        id: i64,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> HealthResult<Payment>;

    /// Stamp the first receipt issue; later calls keep the original time
    fn mark_receipt_sent(&self, id: i64, sent_at: DateTime<Utc>) -> HealthResult<Payment>;

    fn list_refunds(&self, payment_id: i64) -> HealthResult<Vec<Refund>>;

    /// Record a completed refund in one transaction: re-check the balance
    /// with [`refund_outcome`], insert the refund, set the payment status and
    /// mark the appointment refunded when nothing remains.
    fn apply_refund(&self, refund: &NewRefund) -> HealthResult<(Refund, Payment)>;
}
