//! Patient Journey Tests
//!
//! A patient who only ever uses a feature phone, followed through
//! registration, a symptom report, a booking and payment, and the journey
//! view a provider sees afterwards.

#[cfg(test)]
mod tests {
    use crate::fixtures::Clinic;
    use chrono::{Duration, Utc};
    use clinic::{patient_journey, update_appointment_status, UpdateAppointmentStatusInput};
    use clinic_integrity::*;
    use payments::{create_payment, update_payment_status, CreatePaymentInput, UpdatePaymentStatusInput};
    use payments_integrity::{PaymentMethod, PaymentStatus};
    use symptoms_integrity::SymptomStore;

    const PHONE: &str = "+254712345678";

    #[test]
    fn test_feature_phone_journey() {
        let clinic = Clinic::new();
        let provider = clinic.provider("achieng", "Dr. Achieng", 700.0);

        let text = clinic.dial(PHONE, "ATUid_j1", "4*Amina Hassan*29*2*Garissa").to_wire();
        assert_eq!(text, "END Thank you Amina Hassan. You are now registered with Tujali Health.");

        let text = clinic.dial(PHONE, "ATUid_j2", "2*fever and chills*2").to_wire();
        assert!(text.starts_with("END Thank you. Your moderate symptom report"), "{text}");

        let text = clinic.dial(PHONE, "ATUid_j3", "1*Garissa*1*1*2*1*1").to_wire();
        assert!(text.contains("Fee: KES 700"), "{text}");
        assert!(text.contains("Kisumu"));

        let patient = clinic.db.find_patient_by_phone(PHONE).unwrap().unwrap();
        let appointment = clinic
            .db
            .list_appointments(&AppointmentFilter {
                patient_id: Some(patient.id),
                ..Default::default()
            })
            .unwrap()
            .remove(0);
        assert_eq!(appointment.provider_id, provider.id);
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(appointment.payment_status, PaymentStatus::Pending);

        let payment = create_payment(
            &clinic.db,
            CreatePaymentInput {
                appointment_id: appointment.id,
                amount: None,
                phone_number: Some(PHONE.to_string()),
                method: PaymentMethod::Mpesa,
                currency: None,
                reference: None,
                notes: None,
            },
        )
        .unwrap();
        assert_eq!(payment.amount, 700.0);
        update_payment_status(
            &clinic.db,
            payment.id,
            UpdatePaymentStatusInput {
                status: PaymentStatus::Completed,
                reference: Some("QK7H2XJ9PL".to_string()),
            },
        )
        .unwrap();
        let appointment = update_appointment_status(
            &clinic.db,
            appointment.id,
            UpdateAppointmentStatusInput {
                status: AppointmentStatus::Completed,
                payment_status: None,
            },
        )
        .unwrap();
        assert_eq!(appointment.payment_status, PaymentStatus::Completed);

        let journey = patient_journey(&clinic.db, patient.id, Utc::now()).unwrap();
        let kinds: Vec<InteractionKind> = journey.timeline.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InteractionKind::Registration,
                InteractionKind::Symptom,
                InteractionKind::Appointment,
                InteractionKind::PaymentPending,
                InteractionKind::PaymentCompleted,
            ]
        );
        assert_eq!(journey.timeline[1].description, "Reported symptom: fever and chills");
        assert_eq!(journey.timeline[4].metadata["reference"], "QK7H2XJ9PL");
        assert_eq!(journey.statistics.total_interactions, 5);
        // Registered moments ago
        assert_eq!(journey.statistics.average_per_month, None);

        let later = patient_journey(&clinic.db, patient.id, Utc::now() + Duration::days(60)).unwrap();
        let average = later.statistics.average_per_month.unwrap();
        assert!((average - 2.5).abs() < 0.1, "{average}");
    }

    #[test]
    fn test_symptom_before_registration_keeps_one_patient() {
        let clinic = Clinic::new();

        clinic.dial(PHONE, "ATUid_p1", "2*headache*1");
        let placeholder = clinic.db.find_patient_by_phone(PHONE).unwrap().unwrap();
        assert_eq!(placeholder.name, "Patient 5678");

        let text = clinic.dial(PHONE, "ATUid_p2", "4*Baraka Ochieng*41*1*Kisumu").text().to_string();
        assert!(text.contains("updated"), "{text}");

        let patient = clinic.db.find_patient_by_phone(PHONE).unwrap().unwrap();
        assert_eq!(patient.id, placeholder.id);
        assert_eq!(patient.name, "Baraka Ochieng");
        assert_eq!(patient.gender, Some(Gender::Male));
        assert_eq!(clinic.db.list_patient_reports(patient.id).unwrap().len(), 1);

        // Updating an existing patient is not a new registration
        let journey = patient_journey(&clinic.db, patient.id, Utc::now()).unwrap();
        assert!(!journey.interactions_by_kind.contains_key("registration"));
        assert_eq!(journey.statistics.counts_by_kind["symptom"], 1);
    }

    #[test]
    fn test_journey_for_unknown_patient() {
        let clinic = Clinic::new();
        assert!(matches!(
            patient_journey(&clinic.db, 404, Utc::now()),
            Err(tujali_shared::HealthError::NotFound(_))
        ));
    }
}
