//! Symptom Surveillance Tests
//!
//! Reports arriving through USSD, the web form and walk-ins, read back
//! through the dashboard and outbreak detection.

#[cfg(test)]
mod tests {
    use crate::fixtures::Clinic;
    use chrono::{Duration, Utc};
    use symptoms::*;
    use symptoms_integrity::*;

    fn web(clinic: &Clinic, content: &str) -> LoggedSymptom {
        report_symptom(
            &clinic.db,
            &clinic.categorizer,
            ReportSymptomInput {
                patient_id: None,
                content: content.to_string(),
                severity: None,
                location: None,
                channel: ReportChannel::Web,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_mixed_channels_feed_one_dashboard() {
        let clinic = Clinic::new();
        clinic.dial("+254720000001", "ATUid_c1", "4*Halima Noor*22*2*Mombasa");
        clinic.dial("+254720000001", "ATUid_c2", "2*cough with phlegm*2");
        clinic.dial("+254720000002", "ATUid_c3", "2*cough at night*1");
        web(&clinic, "Chief complaint: Cough and fever\nSeverity: severe");
        let walk_in = report_symptom(
            &clinic.db,
            &clinic.categorizer,
            ReportSymptomInput {
                patient_id: None,
                content: "stomach ache and diarrhea".to_string(),
                severity: Some(Severity::Moderate),
                location: Some("Kilifi".to_string()),
                channel: ReportChannel::WalkIn,
            },
        )
        .unwrap();
        assert_eq!(walk_in.category, SymptomCategory::Gastrointestinal);

        let dashboard =
            symptom_dashboard(&clinic.db, &clinic.categorizer, &OutbreakThresholds::default(), Utc::now()).unwrap();
        assert_eq!(dashboard.total_symptoms, 4);
        assert_eq!(dashboard.category_counts["respiratory"], 3);
        assert_eq!(dashboard.category_counts["gastrointestinal"], 1);
        assert_eq!(dashboard.category_counts["skin"], 0);
        assert_eq!(dashboard.severity_counts["severe"], 1);
        assert_eq!(dashboard.severity_counts["moderate"], 2);
        assert_eq!(dashboard.severity_counts["mild"], 1);

        // Only the registered USSD reporter has a location on file
        assert_eq!(dashboard.location_counts[0].label, UNSPECIFIED_LOCATION);
        assert_eq!(dashboard.location_counts[0].count, 2);
        assert!(dashboard
            .location_counts
            .iter()
            .any(|entry| entry.label == "Mombasa" && entry.count == 1));

        assert_eq!(dashboard.unique_symptoms, 4);
        assert!((dashboard.average_severity - 0.5).abs() < 1e-9);

        assert_eq!(dashboard.outbreak_signals.len(), 1);
        let signal = &dashboard.outbreak_signals[0];
        assert_eq!(signal.symptom, "cough");
        assert_eq!(signal.category, SymptomCategory::Respiratory);
        assert_eq!(signal.count, 3);
        assert_eq!(signal.severity, OutbreakLevel::Medium);

        assert!(dashboard
            .symptoms
            .windows(2)
            .all(|pair| pair[0].reported_at >= pair[1].reported_at));
    }

    #[test]
    fn test_outbreak_level_and_window() {
        let clinic = Clinic::new();
        for _ in 0..6 {
            web(&clinic, "fever and headache");
        }
        web(&clinic, "rash on arms");

        let analyzed = analyzed_reports(&clinic.db, &clinic.categorizer, None).unwrap();
        assert_eq!(analyzed.len(), 7);

        let thresholds = OutbreakThresholds::default();
        let signals = detect_outbreaks(&analyzed, Utc::now(), &thresholds);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symptom, "fever");
        assert_eq!(signals[0].count, 6);
        assert_eq!(signals[0].severity, OutbreakLevel::High);

        // Past the window nothing is flagged
        let later = Utc::now() + Duration::days(thresholds.window_days + 1);
        assert!(detect_outbreaks(&analyzed, later, &thresholds).is_empty());

        let strict = OutbreakThresholds {
            window_days: 7,
            min_count: 7,
            high_above: 10,
        };
        assert!(detect_outbreaks(&analyzed, Utc::now(), &strict).is_empty());
    }

    #[test]
    fn test_custom_keyword_table() {
        let table = KeywordTable::new(vec![
            CategoryKeywords {
                category: SymptomCategory::Fever,
                keywords: vec!["homa".to_string()],
            },
            CategoryKeywords {
                category: SymptomCategory::Respiratory,
                keywords: vec!["kikohozi".to_string()],
            },
        ])
        .unwrap();
        let categorizer = Categorizer::new(table, 2.0).unwrap();

        let clinic = Clinic {
            categorizer,
            ..Clinic::new()
        };
        clinic.dial("+254720000010", "ATUid_sw", "2*homa na kikohozi kali*3");

        let analyzed = analyzed_reports(&clinic.db, &clinic.categorizer, None).unwrap();
        assert_eq!(analyzed.len(), 1);
        // One match each; ties go to category rank, not table order
        assert_eq!(analyzed[0].category, SymptomCategory::Respiratory);
        assert!((analyzed[0].confidence - 0.5).abs() < 1e-9);
        assert_eq!(analyzed[0].normalized_name, "homa");
        assert_eq!(analyzed[0].severity, Severity::Severe);
    }

    #[test]
    fn test_unmatched_text_is_other() {
        let clinic = Clinic::new();
        let logged = web(&clinic, "feeling strange lately");
        assert_eq!(logged.category, SymptomCategory::Other);
        assert_eq!(logged.confidence, 0.0);
        // No patient, so nothing is tracked
        assert_eq!(logged.report.patient_id, None);
    }
}
