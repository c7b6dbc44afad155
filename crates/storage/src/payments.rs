//! Payment store implementation.

use crate::clinic::write_appointment_payment_status;
use crate::database::{optional, text_enum, Database, DatabaseError};
use chrono::{DateTime, Utc};
use payments_integrity::*;
use rusqlite::{params, Connection, Row};
use tujali_shared::HealthResult;

const PAYMENT_COLUMNS: &str =
    "id, appointment_id, amount, phone_number, method, currency, status, reference, notes, created_at, paid_at, receipt_sent_at";
const REFUND_COLUMNS: &str = "id, payment_id, amount, reason, status, processed_by, processed_at";

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        amount: row.get(2)?,
        phone_number: row.get(3)?,
        // Rows written by older tools may carry free-form methods
        method: PaymentMethod::parse_or_cash(&row.get::<_, String>(4)?),
        currency: row.get(5)?,
        status: text_enum(row, 6)?,
        reference: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        paid_at: row.get(10)?,
        receipt_sent_at: row.get(11)?,
    })
}

fn refund_from_row(row: &Row<'_>) -> rusqlite::Result<Refund> {
    Ok(Refund {
        id: row.get(0)?,
        payment_id: row.get(1)?,
        amount: row.get(2)?,
        reason: row.get(3)?,
        status: text_enum(row, 4)?,
        processed_by: row.get(5)?,
        processed_at: row.get(6)?,
    })
}

fn load_payment(conn: &Connection, id: i64) -> Result<Payment, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
        [id],
        payment_from_row,
    ))?
    .ok_or_else(|| DatabaseError::NotFound(format!("payment {}", id)))
}

fn load_refunds(conn: &Connection, payment_id: i64) -> Result<Vec<Refund>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payment_refunds WHERE payment_id = ?1 ORDER BY processed_at, id",
        REFUND_COLUMNS
    ))?;
    let rows = stmt.query_map([payment_id], refund_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

impl PaymentStore for Database {
    fn insert_payment(&self, payment: &NewPayment) -> HealthResult<Payment> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO payments (appointment_id, amount, phone_number, method, currency, status, reference, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    payment.appointment_id,
                    payment.amount,
                    payment.phone_number,
                    payment.method.as_str(),
                    payment.currency,
                    PaymentStatus::Pending.as_str(),
                    payment.reference,
                    payment.notes,
                    payment.created_at,
                ],
            )?;
            load_payment(tx, tx.last_insert_rowid())
        })
    }

    fn get_payment(&self, id: i64) -> HealthResult<Option<Payment>> {
        self.read(|conn| match load_payment(conn, id) {
            Ok(payment) => Ok(Some(payment)),
            Err(DatabaseError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        })
    }

    fn list_payments(&self, appointment_id: Option<i64>) -> HealthResult<Vec<Payment>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM payments WHERE (?1 IS NULL OR appointment_id = ?1) ORDER BY created_at DESC, id DESC",
                PAYMENT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![appointment_id], payment_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn update_payment_status(
        &self,
        id: i64,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> HealthResult<Payment> {
        self.write(|tx| {
            let payment = load_payment(tx, id)?;
            tx.execute(
                "UPDATE payments SET status = ?1, paid_at = COALESCE(paid_at, ?2) WHERE id = ?3",
                params![status.as_str(), paid_at, id],
            )?;
            write_appointment_payment_status(tx, payment.appointment_id, status)?;
            load_payment(tx, id)
        })
    }

    fn mark_receipt_sent(&self, id: i64, sent_at: DateTime<Utc>) -> HealthResult<Payment> {
        self.write(|tx| {
            tx.execute(
                "UPDATE payments SET receipt_sent_at = COALESCE(receipt_sent_at, ?1) WHERE id = ?2",
                params![sent_at, id],
            )?;
            load_payment(tx, id)
        })
    }

    fn list_refunds(&self, payment_id: i64) -> HealthResult<Vec<Refund>> {
        self.read(|conn| load_refunds(conn, payment_id))
    }

    fn apply_refund(&self, refund: &NewRefund) -> HealthResult<(Refund, Payment)> {
        self.write(|tx| {
            let payment = load_payment(tx, refund.payment_id)?;
            let prior = load_refunds(tx, refund.payment_id)?;
            let next_status = refund_outcome(&payment, &prior, refund.amount)?;

            tx.execute(
                "INSERT INTO payment_refunds (payment_id, amount, reason, status, processed_by, processed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    refund.payment_id,
                    refund.amount,
                    refund.reason,
                    RefundStatus::Completed.as_str(),
                    refund.processed_by,
                    refund.processed_at,
                ],
            )?;
            let refund_id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE payments SET status = ?1 WHERE id = ?2",
                params![next_status.as_str(), payment.id],
            )?;
            if next_status == PaymentStatus::Refunded {
                write_appointment_payment_status(tx, payment.appointment_id, PaymentStatus::Refunded)?;
            }

            let stored = tx.query_row(
                &format!("SELECT {} FROM payment_refunds WHERE id = ?1", REFUND_COLUMNS),
                [refund_id],
                refund_from_row,
            )?;
            Ok((stored, load_payment(tx, payment.id)?))
        })
    }
}
