//! USSD Session Tests
//!
//! Carrier behaviour the channel has to tolerate: retransmitted and
//! out-of-order requests, several handsets at once, idle sessions, and a
//! restart between two sessions of the same patient.

#[cfg(test)]
mod tests {
    use crate::fixtures::{midday, Clinic};
    use chrono::Duration;
    use clinic_integrity::*;
    use proptest::prelude::*;
    use tujali_storage::{Database, DatabaseConfig};

    const PHONE: &str = "+254701999888";

    #[test]
    fn test_retransmitted_requests_render_the_same_screen() {
        let clinic = Clinic::new();
        clinic.provider("wafula", "Dr. Wafula", 650.0);
        let now = midday();

        let first = clinic.dial_at(PHONE, "ATUid_rt", "1*Kisumu*1", now);
        // The gateway resends an older step, then the newer one again
        let older = clinic.dial_at(PHONE, "ATUid_rt", "1*Kisumu", now + Duration::seconds(5));
        let again = clinic.dial_at(PHONE, "ATUid_rt", "1*Kisumu*1", now + Duration::seconds(9));
        assert_eq!(first, again);
        assert_ne!(first, older);
        assert!(first.text().contains("1. Dr. Wafula"));

        let session = clinic.ussd.sessions().get(PHONE, "ATUid_rt").unwrap();
        assert_eq!(session.node_id, "book.provider");
        assert_eq!(session.path, vec!["1".to_string(), "Kisumu".to_string(), "1".to_string()]);
        assert_eq!(session.first_seen, now);
        assert_eq!(session.last_seen, now + Duration::seconds(9));
    }

    #[test]
    fn test_handsets_do_not_share_sessions() {
        let clinic = Clinic::new();
        let now = midday();
        clinic.dial_at(PHONE, "ATUid_same", "4", now);
        clinic.dial_at("+254701999777", "ATUid_same", "2", now);
        assert_eq!(clinic.ussd.sessions().len(), 2);

        let mine = clinic.ussd.sessions().get(PHONE, "ATUid_same").unwrap();
        assert_eq!(mine.node_id, "register.name");

        clinic.dial_at(PHONE, "ATUid_same", "4*Neema Achieng*19*2*Busia", now);
        assert_eq!(clinic.ussd.sessions().len(), 1);
        assert!(clinic.ussd.sessions().get("+254701999777", "ATUid_same").is_some());
    }

    #[test]
    fn test_idle_sessions_are_purged() {
        let clinic = Clinic::new();
        let now = midday();
        let ttl = clinic.ussd.settings().session_ttl_secs;
        clinic.dial_at(PHONE, "ATUid_idle", "5", now);
        clinic.dial_at("+254701999777", "ATUid_busy", "5", now + Duration::seconds(ttl));

        assert_eq!(clinic.ussd.purge_sessions(now + Duration::seconds(ttl + 1)), 1);
        assert!(clinic.ussd.sessions().get(PHONE, "ATUid_idle").is_none());

        // Input is authoritative, so a purged session resumes where the handset is
        let resumed = clinic.dial_at(PHONE, "ATUid_idle", "5*2", now + Duration::seconds(ttl + 2));
        assert!(resumed.is_end());
    }

    #[test]
    fn test_patient_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tujali.db");

        {
            let clinic = Clinic::with_db(Database::open(DatabaseConfig::with_path(&path)).unwrap());
            clinic.provider("wafula", "Dr. Wafula", 650.0);
            clinic.dial(PHONE, "ATUid_before", "4*Salim Juma*45*1*Lamu");
            let text = clinic.dial(PHONE, "ATUid_book", "1*Lamu*1*1*2*3*1").to_wire();
            assert!(text.starts_with("END Appointment confirmed!"), "{text}");
        }

        let clinic = Clinic::with_db(Database::open(DatabaseConfig::with_path(&path)).unwrap());
        assert!(clinic.ussd.sessions().is_empty());

        let listing = clinic.dial(PHONE, "ATUid_after", "3");
        assert!(listing.text().starts_with("Your appointments:"), "{:?}", listing);
        assert!(listing.text().contains("Dr. Wafula"));

        let text = clinic.dial(PHONE, "ATUid_after2", "4*Salim Juma*46*1*Lamu").to_wire();
        assert!(text.contains("updated"), "{text}");
        let patient = clinic.db.find_patient_by_phone(PHONE).unwrap().unwrap();
        assert_eq!(patient.age, Some(46));
    }

    proptest! {
        #[test]
        fn test_any_keypad_input_gets_an_answer(text in "[0-9*]{0,24}") {
            let clinic = Clinic::new();
            clinic.provider("wafula", "Dr. Wafula", 650.0);
            let response = clinic.dial_at(PHONE, "ATUid_prop", &text, midday());
            let wire = response.to_wire();
            prop_assert!(wire.starts_with("CON ") || wire.starts_with("END "));
            if response.is_end() {
                prop_assert!(clinic.ussd.sessions().is_empty());
            }
        }
    }
}
