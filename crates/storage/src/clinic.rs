//! Clinic store implementations.

use crate::database::{json_column, opt_json_column, opt_text_enum, optional, text_enum, Database, DatabaseError};
use clinic_integrity::*;
use rusqlite::{params, Connection, Row};
use tujali_shared::{HealthError, HealthResult};

// ============================================================================
// Patients
// ============================================================================

const PATIENT_COLUMNS: &str = "id, phone_number, name, age, gender, location, language, created_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        name: row.get(2)?,
        age: row.get(3)?,
        gender: opt_text_enum(row, 4)?,
        location: row.get(5)?,
        language: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn load_patient(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} FROM patients WHERE id = ?1", PATIENT_COLUMNS),
        [id],
        patient_from_row,
    ))
}

fn load_patient_by_phone(conn: &Connection, phone_number: &str) -> Result<Option<Patient>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} FROM patients WHERE phone_number = ?1", PATIENT_COLUMNS),
        [phone_number.trim()],
        patient_from_row,
    ))
}

fn insert_patient_row(conn: &Connection, patient: &NewPatient) -> Result<Patient, DatabaseError> {
    conn.execute(
        "INSERT INTO patients (phone_number, name, age, gender, location, language, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient.phone_number.trim(),
            patient.name,
            patient.age,
            patient.gender.map(|g| g.as_str()),
            patient.location,
            patient.language,
            patient.created_at,
        ],
    )?;
    let id = conn.last_insert_rowid();
    load_patient(conn, id)?.ok_or_else(|| DatabaseError::NotFound(format!("patient {}", id)))
}

/// Resolve a booking's patient inside an open transaction, inserting it when
/// the phone number is new. The flag is true when a row was inserted.
pub(crate) fn resolve_patient(conn: &Connection, patient: &PatientRef) -> Result<(Patient, bool), DatabaseError> {
    match patient {
        PatientRef::Id(id) => load_patient(conn, *id)?
            .map(|p| (p, false))
            .ok_or_else(|| DatabaseError::NotFound(format!("patient {}", id))),
        PatientRef::Phone(new) => match load_patient_by_phone(conn, &new.phone_number)? {
            Some(existing) => Ok((existing, false)),
            None => Ok((insert_patient_row(conn, new)?, true)),
        },
    }
}

impl PatientStore for Database {
    fn insert_patient(&self, patient: &NewPatient) -> HealthResult<Patient> {
        self.write(|tx| insert_patient_row(tx, patient))
    }

    fn get_patient(&self, id: i64) -> HealthResult<Option<Patient>> {
        self.read(|conn| load_patient(conn, id))
    }

    fn find_patient_by_phone(&self, phone_number: &str) -> HealthResult<Option<Patient>> {
        self.read(|conn| load_patient_by_phone(conn, phone_number))
    }

    fn list_patients(&self) -> HealthResult<Vec<Patient>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM patients ORDER BY created_at DESC, id DESC",
                PATIENT_COLUMNS
            ))?;
            let rows = stmt.query_map([], patient_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn update_patient(&self, id: i64, update: &PatientUpdate) -> HealthResult<Patient> {
        self.write(|tx| {
            let mut patient =
                load_patient(tx, id)?.ok_or_else(|| DatabaseError::NotFound(format!("patient {}", id)))?;
            update.apply_to(&mut patient);
            tx.execute(
                "UPDATE patients SET name = ?1, age = ?2, gender = ?3, location = ?4, language = ?5 WHERE id = ?6",
                params![
                    patient.name,
                    patient.age,
                    patient.gender.map(|g| g.as_str()),
                    patient.location,
                    patient.language,
                    id,
                ],
            )?;
            Ok(patient)
        })
    }
}

// ============================================================================
// Users and providers
// ============================================================================

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at";
const PROVIDER_COLUMNS: &str =
    "id, user_id, name, specialization, license_number, languages, location, consultation_fee, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        specialization: row.get(3)?,
        license_number: row.get(4)?,
        languages: json_column(row, 5)?,
        location: row.get(6)?,
        consultation_fee: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn insert_user_row(conn: &Connection, user: &NewUser) -> Result<User, DatabaseError> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, is_admin, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.username, user.email.to_lowercase(), user.password_hash, user.is_admin, user.created_at],
    )?;
    let id = conn.last_insert_rowid();
    Ok(conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        user_from_row,
    )?)
}

impl ProviderStore for Database {
    fn insert_user(&self, user: &NewUser) -> HealthResult<User> {
        self.write(|tx| insert_user_row(tx, user))
    }

    fn get_user(&self, id: i64) -> HealthResult<Option<User>> {
        self.read(|conn| {
            optional(conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [id],
                user_from_row,
            ))
        })
    }

    fn find_user_by_username(&self, username: &str) -> HealthResult<Option<User>> {
        self.read(|conn| {
            optional(conn.query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                [username],
                user_from_row,
            ))
        })
    }

    fn find_user_by_email(&self, email: &str) -> HealthResult<Option<User>> {
        self.read(|conn| {
            optional(conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                [email.to_lowercase()],
                user_from_row,
            ))
        })
    }

    fn insert_provider_account(&self, user: &NewUser, provider: &NewProvider) -> HealthResult<(User, Provider)> {
        self.write(|tx| {
            let user = insert_user_row(tx, user)?;
            tx.execute(
                "INSERT INTO providers (user_id, name, specialization, license_number, languages, location, consultation_fee, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id,
                    provider.name,
                    provider.specialization,
                    provider.license_number,
                    serde_json::to_string(&provider.languages)?,
                    provider.location,
                    provider.consultation_fee,
                    provider.created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            let provider = tx.query_row(
                &format!("SELECT {} FROM providers WHERE id = ?1", PROVIDER_COLUMNS),
                [id],
                provider_from_row,
            )?;
            Ok((user, provider))
        })
    }

    fn get_provider(&self, id: i64) -> HealthResult<Option<Provider>> {
        self.read(|conn| {
            optional(conn.query_row(
                &format!("SELECT {} FROM providers WHERE id = ?1", PROVIDER_COLUMNS),
                [id],
                provider_from_row,
            ))
        })
    }

    fn find_provider_by_user(&self, user_id: i64) -> HealthResult<Option<Provider>> {
        self.read(|conn| {
            optional(conn.query_row(
                &format!("SELECT {} FROM providers WHERE user_id = ?1", PROVIDER_COLUMNS),
                [user_id],
                provider_from_row,
            ))
        })
    }

    fn list_providers(&self) -> HealthResult<Vec<Provider>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM providers ORDER BY id", PROVIDER_COLUMNS))?;
            let rows = stmt.query_map([], provider_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

// ============================================================================
// Appointments
// ============================================================================

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, provider_id, date, time, visit_type, status, price, payment_status, source, notes, created_at";

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        visit_type: text_enum(row, 5)?,
        status: text_enum(row, 6)?,
        price: row.get(7)?,
        payment_status: text_enum(row, 8)?,
        source: text_enum(row, 9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
    })
}

pub(crate) fn load_appointment(conn: &Connection, id: i64) -> Result<Option<Appointment>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLUMNS),
        [id],
        appointment_from_row,
    ))
}

/// Update an appointment's payment status inside an open transaction
pub(crate) fn write_appointment_payment_status(
    conn: &Connection,
    id: i64,
    payment_status: PaymentStatus,
) -> Result<Appointment, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET payment_status = ?1 WHERE id = ?2",
        params![payment_status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound(format!("appointment {}", id)));
    }
    load_appointment(conn, id)?.ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", id)))
}

/// Insert an appointment for `patient_id`, refusing a slot another
/// patient's open appointment already holds
fn insert_appointment_row(
    conn: &Connection,
    patient_id: i64,
    appointment: &NewAppointment,
) -> Result<Appointment, DatabaseError> {
    if !appointment.status.is_final() {
        let holders: i64 = conn.query_row(
            "SELECT COUNT(*) FROM appointments
             WHERE provider_id = ?1 AND date = ?2 AND time = ?3 AND patient_id != ?4
               AND status NOT IN ('completed', 'cancelled')",
            params![appointment.provider_id, appointment.date, appointment.time, patient_id],
            |row| row.get(0),
        )?;
        if holders > 0 {
            return Err(HealthError::conflict(format!(
                "Provider {} is already booked on {} at {}",
                appointment.provider_id, appointment.date, appointment.time
            ))
            .into());
        }
    }

    conn.execute(
        "INSERT INTO appointments (patient_id, provider_id, date, time, visit_type, status, price, payment_status, source, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            patient_id,
            appointment.provider_id,
            appointment.date,
            appointment.time,
            appointment.visit_type.as_str(),
            appointment.status.as_str(),
            appointment.price,
            appointment.payment_status.as_str(),
            appointment.source.as_str(),
            appointment.notes,
            appointment.created_at,
        ],
    )?;
    let id = conn.last_insert_rowid();
    load_appointment(conn, id)?.ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", id)))
}

/// Write a booking's patient, appointment and interaction inside an open
/// transaction. The interaction metadata gains the new `appointment_id`.
pub(crate) fn write_booking(conn: &Connection, booking: &NewBooking) -> Result<Booked, DatabaseError> {
    let (patient, patient_created) = resolve_patient(conn, &booking.patient)?;
    let appointment = insert_appointment_row(conn, patient.id, &booking.appointment)?;

    let mut interaction = booking.interaction.clone();
    interaction.patient_id = patient.id;
    if let Some(metadata) = interaction.metadata.as_object_mut() {
        metadata.insert("appointment_id".to_string(), appointment.id.into());
    }
    insert_interaction_row(conn, &interaction)?;

    Ok(Booked {
        patient,
        patient_created,
        appointment,
    })
}

impl AppointmentStore for Database {
    fn insert_booking(&self, booking: &NewBooking) -> HealthResult<Booked> {
        self.write(|tx| write_booking(tx, booking))
    }

    fn get_appointment(&self, id: i64) -> HealthResult<Option<Appointment>> {
        self.read(|conn| load_appointment(conn, id))
    }

    fn list_appointments(&self, filter: &AppointmentFilter) -> HealthResult<Vec<Appointment>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM appointments
                 WHERE (?1 IS NULL OR patient_id = ?1)
                   AND (?2 IS NULL OR provider_id = ?2)
                   AND (?3 IS NULL OR status = ?3)
                   AND (?4 IS NULL OR date >= ?4)
                 ORDER BY date, time, id",
                APPOINTMENT_COLUMNS
            ))?;
            let rows = stmt.query_map(
                params![
                    filter.patient_id,
                    filter.provider_id,
                    filter.status.map(|s| s.as_str()),
                    filter.from_date,
                ],
                appointment_from_row,
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn set_appointment_status(&self, id: i64, status: AppointmentStatus) -> HealthResult<Appointment> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE appointments SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            if changed == 0 {
                return Err(DatabaseError::NotFound(format!("appointment {}", id)));
            }
            load_appointment(tx, id)?.ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", id)))
        })
    }

    fn set_appointment_payment_status(&self, id: i64, payment_status: PaymentStatus) -> HealthResult<Appointment> {
        self.write(|tx| write_appointment_payment_status(tx, id, payment_status))
    }
}

// ============================================================================
// Prescriptions and lab results
// ============================================================================

const PRESCRIPTION_COLUMNS: &str =
    "id, provider_id, patient_id, medications, instructions, collection_method, status, created_at, updated_at";
const LAB_COLUMNS: &str = "id, patient_id, provider_id, test_name, test_type, fee, status, results, reference_range, is_abnormal, urgency, notes, test_date, result_date";

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        patient_id: row.get(2)?,
        medications: json_column(row, 3)?,
        instructions: row.get(4)?,
        collection_method: text_enum(row, 5)?,
        status: text_enum(row, 6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn lab_from_row(row: &Row<'_>) -> rusqlite::Result<LabResult> {
    Ok(LabResult {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        test_name: row.get(3)?,
        test_type: row.get(4)?,
        fee: row.get(5)?,
        status: text_enum(row, 6)?,
        results: opt_json_column(row, 7)?,
        reference_range: opt_json_column(row, 8)?,
        is_abnormal: row.get(9)?,
        urgency: text_enum(row, 10)?,
        notes: row.get(11)?,
        test_date: row.get(12)?,
        result_date: row.get(13)?,
    })
}

fn load_prescription(conn: &Connection, id: i64) -> Result<Option<Prescription>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} FROM prescriptions WHERE id = ?1", PRESCRIPTION_COLUMNS),
        [id],
        prescription_from_row,
    ))
}

fn load_lab(conn: &Connection, id: i64) -> Result<Option<LabResult>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} FROM lab_results WHERE id = ?1", LAB_COLUMNS),
        [id],
        lab_from_row,
    ))
}

fn json_text(value: &Option<serde_json::Value>) -> Result<Option<String>, DatabaseError> {
    Ok(value.as_ref().map(serde_json::to_string).transpose()?)
}

impl RecordStore for Database {
    fn insert_prescription(&self, rx: &NewPrescription) -> HealthResult<Prescription> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO prescriptions (provider_id, patient_id, medications, instructions, collection_method, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    rx.provider_id,
                    rx.patient_id,
                    serde_json::to_string(&rx.medications)?,
                    rx.instructions,
                    rx.collection_method.as_str(),
                    PrescriptionStatus::Pending.as_str(),
                    rx.created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            load_prescription(tx, id)?.ok_or_else(|| DatabaseError::NotFound(format!("prescription {}", id)))
        })
    }

    fn get_prescription(&self, id: i64) -> HealthResult<Option<Prescription>> {
        self.read(|conn| load_prescription(conn, id))
    }

    fn list_prescriptions(&self, provider_id: Option<i64>, patient_id: Option<i64>) -> HealthResult<Vec<Prescription>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM prescriptions
                 WHERE (?1 IS NULL OR provider_id = ?1) AND (?2 IS NULL OR patient_id = ?2)
                 ORDER BY created_at DESC, id DESC",
                PRESCRIPTION_COLUMNS
            ))?;
            let rows = stmt.query_map(params![provider_id, patient_id], prescription_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn set_prescription_status(&self, id: i64, status: PrescriptionStatus) -> HealthResult<Prescription> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE prescriptions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), chrono::Utc::now(), id],
            )?;
            if changed == 0 {
                return Err(DatabaseError::NotFound(format!("prescription {}", id)));
            }
            load_prescription(tx, id)?.ok_or_else(|| DatabaseError::NotFound(format!("prescription {}", id)))
        })
    }

    fn insert_lab_result(&self, lab: &NewLabResult) -> HealthResult<LabResult> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO lab_results (patient_id, provider_id, test_name, test_type, fee, status, reference_range, is_abnormal, urgency, notes, test_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10)",
                params![
                    lab.patient_id,
                    lab.provider_id,
                    lab.test_name,
                    lab.test_type,
                    lab.fee,
                    LabStatus::Pending.as_str(),
                    json_text(&lab.reference_range)?,
                    lab.urgency.as_str(),
                    lab.notes,
                    lab.test_date,
                ],
            )?;
            let id = tx.last_insert_rowid();
            load_lab(tx, id)?.ok_or_else(|| DatabaseError::NotFound(format!("lab result {}", id)))
        })
    }

    fn get_lab_result(&self, id: i64) -> HealthResult<Option<LabResult>> {
        self.read(|conn| load_lab(conn, id))
    }

    fn list_lab_results(&self, provider_id: Option<i64>, patient_id: Option<i64>) -> HealthResult<Vec<LabResult>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM lab_results
                 WHERE (?1 IS NULL OR provider_id = ?1) AND (?2 IS NULL OR patient_id = ?2)
                 ORDER BY test_date DESC, id DESC",
                LAB_COLUMNS
            ))?;
            let rows = stmt.query_map(params![provider_id, patient_id], lab_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn update_lab_result(&self, lab: &LabResult) -> HealthResult<LabResult> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE lab_results SET status = ?1, results = ?2, is_abnormal = ?3, notes = ?4, result_date = ?5 WHERE id = ?6",
                params![
                    lab.status.as_str(),
                    json_text(&lab.results)?,
                    lab.is_abnormal,
                    lab.notes,
                    lab.result_date,
                    lab.id,
                ],
            )?;
            if changed == 0 {
                return Err(DatabaseError::NotFound(format!("lab result {}", lab.id)));
            }
            load_lab(tx, lab.id)?.ok_or_else(|| DatabaseError::NotFound(format!("lab result {}", lab.id)))
        })
    }
}

// ============================================================================
// Messages and interactions
// ============================================================================

const MESSAGE_COLUMNS: &str = "id, provider_id, patient_id, content, sender, is_read, created_at";
const INTERACTION_COLUMNS: &str = "id, patient_id, interaction_type, description, metadata, created_at";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        patient_id: row.get(2)?,
        content: row.get(3)?,
        sender: text_enum(row, 4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<UserInteraction> {
    Ok(UserInteraction {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        kind: text_enum(row, 2)?,
        description: row.get(3)?,
        metadata: json_column(row, 4)?,
        created_at: row.get(5)?,
    })
}

impl MessageStore for Database {
    fn insert_message(&self, message: &NewMessage) -> HealthResult<Message> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO messages (provider_id, patient_id, content, sender, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    message.provider_id,
                    message.patient_id,
                    message.content,
                    message.sender.as_str(),
                    message.created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            Ok(tx.query_row(
                &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
                [id],
                message_from_row,
            )?)
        })
    }

    fn list_conversation(&self, provider_id: i64, patient_id: i64) -> HealthResult<Vec<Message>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE provider_id = ?1 AND patient_id = ?2 ORDER BY created_at, id",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt.query_map([provider_id, patient_id], message_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn list_provider_messages(&self, provider_id: i64) -> HealthResult<Vec<Message>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE provider_id = ?1 ORDER BY created_at DESC, id DESC",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt.query_map([provider_id], message_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn mark_read(&self, provider_id: i64, patient_id: i64, sender: SenderType) -> HealthResult<usize> {
        self.write(|tx| {
            Ok(tx.execute(
                "UPDATE messages SET is_read = 1
                 WHERE provider_id = ?1 AND patient_id = ?2 AND sender = ?3 AND is_read = 0",
                params![provider_id, patient_id, sender.as_str()],
            )?)
        })
    }
}

pub(crate) fn insert_interaction_row(
    conn: &Connection,
    interaction: &NewInteraction,
) -> Result<UserInteraction, DatabaseError> {
    conn.execute(
        "INSERT INTO user_interactions (patient_id, interaction_type, description, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            interaction.patient_id,
            interaction.kind.as_str(),
            interaction.description,
            serde_json::to_string(&interaction.metadata)?,
            interaction.created_at,
        ],
    )?;
    let id = conn.last_insert_rowid();
    Ok(conn.query_row(
        &format!("SELECT {} FROM user_interactions WHERE id = ?1", INTERACTION_COLUMNS),
        [id],
        interaction_from_row,
    )?)
}

impl InteractionStore for Database {
    fn insert_interaction(&self, interaction: &NewInteraction) -> HealthResult<UserInteraction> {
        self.write(|tx| insert_interaction_row(tx, interaction))
    }

    fn list_interactions(&self, patient_id: i64) -> HealthResult<Vec<UserInteraction>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM user_interactions WHERE patient_id = ?1 ORDER BY created_at, id",
                INTERACTION_COLUMNS
            ))?;
            let rows = stmt.query_map([patient_id], interaction_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
