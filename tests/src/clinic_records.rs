//! Clinic Record Tests
//!
//! Prescriptions, lab orders and provider inboxes for a patient who first
//! reached the clinic over USSD.

#[cfg(test)]
mod tests {
    use crate::fixtures::Clinic;
    use chrono::Utc;
    use clinic::*;
    use clinic_integrity::*;
    use serde_json::json;
    use tujali_shared::HealthError;

    const PHONE: &str = "+254733222111";

    fn registered(clinic: &Clinic) -> Patient {
        clinic.dial(PHONE, "ATUid_reg", "4*Wanjiku Mwangi*34*2*Nairobi");
        clinic.db.find_patient_by_phone(PHONE).unwrap().unwrap()
    }

    fn medication(name: &str, dosage: &str) -> Medication {
        Medication {
            name: name.to_string(),
            dosage: dosage.to_string(),
            frequency: "Twice daily".to_string(),
            duration: "5 days".to_string(),
        }
    }

    #[test]
    fn test_prescription_through_dispensing() {
        let clinic = Clinic::new();
        let provider = clinic.provider("otieno", "Dr. Otieno", 500.0);
        let patient = registered(&clinic);

        let rx = create_prescription(
            &clinic.db,
            provider.id,
            CreatePrescriptionInput {
                patient_id: patient.id,
                medications: vec![medication("Artemether-Lumefantrine", "80/480mg"), medication("Paracetamol", "1g")],
                instructions: Some("   ".to_string()),
                collection_method: CollectionMethod::HomeDelivery,
            },
        )
        .unwrap();
        assert_eq!(rx.instructions, None);
        assert_eq!(rx.status, PrescriptionStatus::Pending);

        for next in [PrescriptionStatus::Filled, PrescriptionStatus::Dispensed] {
            assert_eq!(update_prescription_status(&clinic.db, rx.id, next).unwrap().status, next);
        }
        // Same status again is a no-op
        assert!(update_prescription_status(&clinic.db, rx.id, PrescriptionStatus::Dispensed).is_ok());
        assert!(matches!(
            update_prescription_status(&clinic.db, rx.id, PrescriptionStatus::Pending),
            Err(HealthError::Conflict(_))
        ));

        let journey = patient_journey(&clinic.db, patient.id, Utc::now()).unwrap();
        let prescribed = &journey.interactions_by_kind["prescription"];
        assert_eq!(prescribed.len(), 1);
        assert_eq!(prescribed[0].description, "Prescribed Artemether-Lumefantrine, Paracetamol");
        assert_eq!(prescribed[0].metadata["prescription_id"], rx.id);
    }

    #[test]
    fn test_prescription_for_missing_patient() {
        let clinic = Clinic::new();
        let provider = clinic.provider("otieno", "Dr. Otieno", 500.0);
        let result = create_prescription(
            &clinic.db,
            provider.id,
            CreatePrescriptionInput {
                patient_id: 77,
                medications: vec![medication("Paracetamol", "1g")],
                instructions: None,
                collection_method: CollectionMethod::PharmacyPickup,
            },
        );
        assert!(matches!(result, Err(HealthError::NotFound(_))));
        assert!(list_provider_prescriptions(&clinic.db, provider.id).unwrap().is_empty());
    }

    #[test]
    fn test_lab_order_results_and_cancel() {
        let clinic = Clinic::new();
        let provider = clinic.provider("otieno", "Dr. Otieno", 500.0);
        let patient = registered(&clinic);

        let order = |name: &str| {
            order_lab_test(
                &clinic.db,
                provider.id,
                OrderLabTestInput {
                    patient_id: patient.id,
                    test_name: name.to_string(),
                    test_type: "blood".to_string(),
                    fee: 350.0,
                    reference_range: Some(json!({ "parasites": "none" })),
                    urgency: Urgency::Urgent,
                    notes: None,
                },
            )
            .unwrap()
        };
        let malaria = order("Malaria RDT");
        let hb = order("Haemoglobin");
        assert_eq!(malaria.status, LabStatus::Pending);

        let done = enter_lab_results(
            &clinic.db,
            malaria.id,
            EnterLabResultsInput {
                results: json!({ "parasites": "P. falciparum +" }),
                is_abnormal: true,
                notes: Some("Start ACT today".to_string()),
            },
        )
        .unwrap();
        assert_eq!(done.status, LabStatus::Completed);
        assert!(done.is_abnormal);
        assert!(done.result_date.is_some());
        assert!(matches!(cancel_lab_test(&clinic.db, malaria.id), Err(HealthError::Conflict(_))));

        let cancelled = cancel_lab_test(&clinic.db, hb.id).unwrap();
        assert_eq!(cancelled.status, LabStatus::Cancelled);
        assert!(matches!(
            enter_lab_results(
                &clinic.db,
                hb.id,
                EnterLabResultsInput {
                    results: json!({ "hb": 11.2 }),
                    is_abnormal: false,
                    notes: None,
                },
            ),
            Err(HealthError::Conflict(_))
        ));

        assert_eq!(list_patient_lab_results(&clinic.db, patient.id).unwrap().len(), 2);
        let journey = patient_journey(&clinic.db, patient.id, Utc::now()).unwrap();
        assert_eq!(journey.statistics.counts_by_kind["lab_result"], 2);
    }

    #[test]
    fn test_inbox_orders_conversations_and_counts_unread() {
        let clinic = Clinic::new();
        let provider = clinic.provider("otieno", "Dr. Otieno", 500.0);
        let first = registered(&clinic);
        let second = create_patient(
            &clinic.db,
            CreatePatientInput {
                phone_number: "+254733222999".to_string(),
                name: "Kipchoge Ruto".to_string(),
                age: Some(63),
                gender: Some(Gender::Male),
                location: Some("Eldoret".to_string()),
                language: Some("sw".to_string()),
            },
        )
        .unwrap();

        let send = |patient_id: i64, sender: SenderType, content: &str| {
            send_message(
                &clinic.db,
                SendMessageInput {
                    provider_id: provider.id,
                    patient_id,
                    content: content.to_string(),
                    sender,
                },
            )
            .unwrap()
        };
        send(first.id, SenderType::Patient, "My fever is back");
        send(first.id, SenderType::Patient, "It started last night");
        send(second.id, SenderType::Patient, "Can I refill my inhaler?");
        send(first.id, SenderType::Provider, "Please come in tomorrow");

        let inbox = conversation_list(&clinic.db, provider.id).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].patient_id, first.id);
        assert_eq!(inbox[0].last_message, "Please come in tomorrow");
        assert_eq!(inbox[0].unread_count, 2);
        assert_eq!(inbox[1].patient_name, "Kipchoge Ruto");
        assert_eq!(inbox[1].unread_count, 1);

        assert_eq!(mark_conversation_read(&clinic.db, provider.id, first.id).unwrap(), 2);
        let inbox = conversation_list(&clinic.db, provider.id).unwrap();
        assert_eq!(inbox[0].unread_count, 0);

        let thread = conversation(&clinic.db, provider.id, first.id).unwrap();
        let lines: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(lines, vec!["My fever is back", "It started last night", "Please come in tomorrow"]);

        let journey = patient_journey(&clinic.db, first.id, Utc::now()).unwrap();
        let messages: Vec<&str> = journey.interactions_by_kind["message"]
            .iter()
            .map(|i| i.description.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Sent a message to provider",
                "Sent a message to provider",
                "Received a message from provider",
            ]
        );
    }

    #[test]
    fn test_blank_message_rejected() {
        let clinic = Clinic::new();
        let provider = clinic.provider("otieno", "Dr. Otieno", 500.0);
        let patient = registered(&clinic);
        let result = send_message(
            &clinic.db,
            SendMessageInput {
                provider_id: provider.id,
                patient_id: patient.id,
                content: "   ".to_string(),
                sender: SenderType::Provider,
            },
        );
        assert!(matches!(result, Err(HealthError::ValidationError(_))));
        assert!(conversation_list(&clinic.db, provider.id).unwrap().is_empty());
    }
}
