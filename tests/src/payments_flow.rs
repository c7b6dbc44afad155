//! Payment Flow Tests
//!
//! Payments recorded against USSD bookings, their status changes mirrored
//! onto the appointment, refunds against the remaining balance, and the
//! revenue summary.

#[cfg(test)]
mod tests {
    use crate::fixtures::Clinic;
    use clinic::{get_appointment, update_appointment_status, UpdateAppointmentStatusInput};
    use clinic_integrity::*;
    use payments::*;
    use tujali_shared::{HealthError, HealthResult};

    /// Teleconsult with the first provider today, at the `slot`th time
    fn booked(clinic: &Clinic, phone: &str, slot: u8) -> Appointment {
        let text = clinic.dial(phone, "ATUid_book", &format!("1*Kisumu*2*1*1*{}*1", slot)).to_wire();
        assert!(text.starts_with("END Appointment confirmed!"), "{text}");
        let patient = clinic.db.find_patient_by_phone(phone).unwrap().unwrap();
        clinic
            .db
            .list_appointments(&AppointmentFilter {
                patient_id: Some(patient.id),
                ..Default::default()
            })
            .unwrap()
            .remove(0)
    }

    fn pay(clinic: &Clinic, appointment_id: i64, method: PaymentMethod, amount: Option<f64>) -> Payment {
        create_payment(
            &clinic.db,
            CreatePaymentInput {
                appointment_id,
                amount,
                phone_number: None,
                method,
                currency: None,
                reference: None,
                notes: None,
            },
        )
        .unwrap()
    }

    fn settle(clinic: &Clinic, id: i64, status: PaymentStatus) -> HealthResult<Payment> {
        update_payment_status(&clinic.db, id, UpdatePaymentStatusInput { status, reference: None })
    }

    #[test]
    fn test_teleconsult_payment_and_full_refund() {
        let clinic = Clinic::new();
        clinic.provider("chebet", "Dr. Chebet", 1200.0);
        let appointment = booked(&clinic, "+254711000301", 2);
        assert_eq!(appointment.visit_type, VisitType::Teleconsult);
        assert_eq!(appointment.price, 1200.0);

        let payment = pay(&clinic, appointment.id, PaymentMethod::Mpesa, None);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.currency, "KES");

        // A failed attempt can be retried
        settle(&clinic, payment.id, PaymentStatus::Failed).unwrap();
        assert_eq!(get_appointment(&clinic.db, appointment.id).unwrap().payment_status, PaymentStatus::Failed);
        settle(&clinic, payment.id, PaymentStatus::Pending).unwrap();
        let paid = settle(&clinic, payment.id, PaymentStatus::Completed).unwrap();
        assert!(paid.paid_at.is_some());
        assert_eq!(get_appointment(&clinic.db, appointment.id).unwrap().payment_status, PaymentStatus::Completed);

        let (first, after_first) = refund_payment(
            &clinic.db,
            payment.id,
            RefundInput {
                amount: 200.0,
                reason: "Call dropped".to_string(),
            },
            None,
        )
        .unwrap();
        assert_eq!(first.amount, 200.0);
        assert_eq!(after_first.status, PaymentStatus::PartiallyRefunded);

        let (_, after_second) = refund_payment(
            &clinic.db,
            payment.id,
            RefundInput {
                amount: 1000.0,
                reason: "Consultation not held".to_string(),
            },
            None,
        )
        .unwrap();
        assert_eq!(after_second.status, PaymentStatus::Refunded);
        assert_eq!(get_appointment(&clinic.db, appointment.id).unwrap().payment_status, PaymentStatus::Refunded);

        let details = payment_details(&clinic.db, payment.id).unwrap();
        assert_eq!(details.refunds.len(), 2);

        let summary = payment_summary(&clinic.db).unwrap();
        assert_eq!(summary.refunded_count, 1);
        assert_eq!(summary.refunded_amount, 1200.0);
        assert_eq!(summary.total_revenue, 0.0);
    }

    #[test]
    fn test_refund_rules() {
        let clinic = Clinic::new();
        clinic.provider("chebet", "Dr. Chebet", 900.0);
        let appointment = booked(&clinic, "+254711000302", 2);
        let payment = pay(&clinic, appointment.id, PaymentMethod::Cash, None);

        let refund = |amount: f64| {
            refund_payment(
                &clinic.db,
                payment.id,
                RefundInput {
                    amount,
                    reason: "Overcharged".to_string(),
                },
                None,
            )
        };
        // Not yet completed
        assert!(matches!(refund(100.0), Err(HealthError::Conflict(_))));

        settle(&clinic, payment.id, PaymentStatus::Completed).unwrap();
        assert!(matches!(refund(0.0), Err(HealthError::ValidationError(_))));
        assert!(matches!(refund(900.01), Err(HealthError::ValidationError(_))));
        assert!(refund(900.0).is_ok());
        assert!(matches!(refund(1.0), Err(HealthError::Conflict(_))));

        // Terminal payment statuses do not move
        assert!(matches!(
            settle(&clinic, payment.id, PaymentStatus::Pending),
            Err(HealthError::Conflict(_))
        ));
    }

    #[test]
    fn test_cancelled_appointment_takes_no_payment() {
        let clinic = Clinic::new();
        clinic.provider("chebet", "Dr. Chebet", 900.0);
        let appointment = booked(&clinic, "+254711000303", 2);
        update_appointment_status(
            &clinic.db,
            appointment.id,
            UpdateAppointmentStatusInput {
                status: AppointmentStatus::Cancelled,
                payment_status: None,
            },
        )
        .unwrap();

        let result = create_payment(
            &clinic.db,
            CreatePaymentInput {
                appointment_id: appointment.id,
                amount: None,
                phone_number: None,
                method: PaymentMethod::Card,
                currency: None,
                reference: None,
                notes: None,
            },
        );
        assert!(matches!(result, Err(HealthError::Conflict(_))));
        assert!(list_payments(&clinic.db, Some(appointment.id)).unwrap().is_empty());
    }

    #[test]
    fn test_summary_across_methods() {
        let clinic = Clinic::new();
        clinic.provider("chebet", "Dr. Chebet", 1000.0);
        let first = booked(&clinic, "+254711000304", 2);
        let second = booked(&clinic, "+254711000305", 3);

        let mpesa = pay(&clinic, first.id, PaymentMethod::Mpesa, None);
        settle(&clinic, mpesa.id, PaymentStatus::Completed).unwrap();
        let insurance = pay(&clinic, second.id, PaymentMethod::Insurance, Some(600.0));
        settle(&clinic, insurance.id, PaymentStatus::Completed).unwrap();
        refund_payment(
            &clinic.db,
            insurance.id,
            RefundInput {
                amount: 150.0,
                reason: "Copay adjustment".to_string(),
            },
            None,
        )
        .unwrap();
        pay(&clinic, second.id, PaymentMethod::Cash, Some(400.0));

        let summary = payment_summary(&clinic.db).unwrap();
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.completed_amount, 1600.0);
        assert_eq!(summary.total_revenue, 1600.0);
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.pending_amount, 400.0);
        assert_eq!(summary.refunded_amount, 150.0);
        assert_eq!(summary.by_method["insurance"].completed_amount, 600.0);
        assert_eq!(summary.by_method["cash"].completed_amount, 0.0);
        assert_eq!(summary.by_method["mpesa"].count, 1);
    }
}
