//! Clinic Records Integrity
//!
//! Defines entry types for the clinic's administrative records:
//! patients, providers and their user accounts, appointments,
//! prescriptions, lab results, messages and the patient interaction log.
//!
//! Every entry has a `New*` form (what a caller asks to persist) and a
//! stored form carrying the assigned id. Validation runs on the `New*`
//! form before anything reaches a store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tujali_shared::{
    string_enum, validate_email, validate_phone_number, validate_range,
    validate_text, ValidationErrorCode, ValidationResult,
};

pub mod store;
pub use store::*;

// ============================================================================
// Patients
// ============================================================================

string_enum! {
    pub enum Gender {
        Male => "male",
        Female => "female",
        Other => "other",
    }
}

/// Patient entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: i64,
    /// Unique; the USSD channel identifies patients by it
    pub phone_number: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub location: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub phone_number: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub location: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the field unchanged
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub location: Option<String>,
    pub language: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.location.is_none()
            && self.language.is_none()
    }

    pub fn apply_to(&self, patient: &mut Patient) {
        if let Some(name) = &self.name {
            patient.name = name.clone();
        }
        if let Some(age) = self.age {
            patient.age = Some(age);
        }
        if let Some(gender) = self.gender {
            patient.gender = Some(gender);
        }
        if let Some(location) = &self.location {
            patient.location = Some(location.clone());
        }
        if let Some(language) = &self.language {
            patient.language = language.clone();
        }
    }
}

pub const MAX_PATIENT_AGE: u32 = 120;

pub fn validate_new_patient(patient: &NewPatient) -> ValidationResult {
    let mut result = validate_phone_number(&patient.phone_number);
    result.merge(validate_text(&patient.name, "name", 2, 100));
    if let Some(age) = patient.age {
        result.merge(validate_range(age as i64, 0, MAX_PATIENT_AGE as i64, "age"));
    }
    if let Some(location) = &patient.location {
        result.merge(validate_text(location, "location", 2, 100));
    }
    result
}

pub fn validate_patient_update(update: &PatientUpdate) -> ValidationResult {
    let mut result = ValidationResult::new();
    if let Some(name) = &update.name {
        result.merge(validate_text(name, "name", 2, 100));
    }
    if let Some(age) = update.age {
        result.merge(validate_range(age as i64, 0, MAX_PATIENT_AGE as i64, "age"));
    }
    if let Some(location) = &update.location {
        result.merge(validate_text(location, "location", 2, 100));
    }
    result
}

// ============================================================================
// Providers and user accounts
// ============================================================================

/// Provider login account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

pub fn validate_new_user(user: &NewUser) -> ValidationResult {
    let mut result = validate_text(&user.username, "username", 3, 50);
    if !user
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        result.add_error(
            "username",
            "Username can only contain letters, numbers, '.', '-' and '_'",
            ValidationErrorCode::InvalidCharacters,
        );
    }
    result.merge(validate_email(&user.email));
    if user.password_hash.is_empty() {
        result.add_error("password", "Password hash is required", ValidationErrorCode::Required);
    }
    result
}

/// Healthcare provider profile
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub specialization: String,
    pub license_number: String,
    pub languages: Vec<String>,
    pub location: Option<String>,
    /// Consultation fee in KES
    pub consultation_fee: f64,
    pub created_at: DateTime<Utc>,
}

/// Provider profile created together with its user account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewProvider {
    pub name: String,
    pub specialization: String,
    pub license_number: String,
    pub languages: Vec<String>,
    pub location: Option<String>,
    pub consultation_fee: f64,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_CONSULTATION_FEE: f64 = 500.0;

pub fn validate_new_provider(provider: &NewProvider) -> ValidationResult {
    let mut result = validate_text(&provider.name, "name", 2, 100);
    result.merge(validate_text(&provider.specialization, "specialization", 2, 100));
    result.merge(validate_text(&provider.license_number, "license_number", 3, 50));
    if provider.consultation_fee < 0.0 || provider.consultation_fee.is_nan() {
        result.add_error(
            "consultation_fee",
            "Consultation fee cannot be negative",
            ValidationErrorCode::OutOfRange,
        );
    }
    result
}

// ============================================================================
// Appointments
// ============================================================================

string_enum! {
    pub enum VisitType {
        Physical => "physical",
        Teleconsult => "teleconsult",
    }
}

string_enum! {
    pub enum AppointmentStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl AppointmentStatus {
    /// Completed and cancelled appointments are final
    pub fn is_final(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            AppointmentStatus::Pending => next != AppointmentStatus::Pending,
            AppointmentStatus::Confirmed => {
                matches!(next, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
            }
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => false,
        }
    }
}

string_enum! {
    /// Payment state as tracked on an appointment and on a payment
    pub enum PaymentStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
        PartiallyRefunded => "partially_refunded",
        /// Free appointment, nothing to collect
        Waived => "waived",
    }
}

string_enum! {
    pub enum BookingSource {
        Web => "web",
        Ussd => "ussd",
        /// Recorded at the front desk
        WalkIn => "walk_in",
    }
}

/// Appointment entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub date: NaiveDate,
    /// Slot start, `HH:MM`
    pub time: String,
    pub visit_type: VisitType,
    pub status: AppointmentStatus,
    pub price: f64,
    pub payment_status: PaymentStatus,
    pub source: BookingSource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether the appointment keeps its provider's slot taken
    pub fn holds_slot(&self) -> bool {
        !self.status.is_final()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub provider_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub visit_type: VisitType,
    pub status: AppointmentStatus,
    pub price: f64,
    pub payment_status: PaymentStatus,
    pub source: BookingSource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Query filter for appointment listings; empty matches everything
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentFilter {
    pub patient_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.provider_id.map_or(true, |id| appointment.provider_id == id)
            && self.status.map_or(true, |s| appointment.status == s)
            && self.from_date.map_or(true, |d| appointment.date >= d)
    }
}

/// Validate an `HH:MM` 24-hour clock time
pub fn validate_slot_time(time: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    let valid = match time.split_once(':') {
        Some((h, m)) if h.len() == 2 && m.len() == 2 => matches!(
            (h.parse::<u32>(), m.parse::<u32>()),
            (Ok(h), Ok(m)) if h < 24 && m < 60
        ),
        _ => false,
    };
    if !valid {
        result.add_error("time", "Time must be in HH:MM format", ValidationErrorCode::InvalidFormat);
    }
    result
}

pub fn validate_new_appointment(appointment: &NewAppointment) -> ValidationResult {
    let mut result = validate_slot_time(&appointment.time);
    if appointment.price < 0.0 || appointment.price.is_nan() {
        result.add_error("price", "Price cannot be negative", ValidationErrorCode::OutOfRange);
    }
    let seen_at_desk = appointment.source == BookingSource::WalkIn
        && appointment.status == AppointmentStatus::Completed;
    if appointment.status.is_final() && !seen_at_desk {
        result.add_error(
            "status",
            "A new appointment cannot start completed or cancelled",
            ValidationErrorCode::InvalidReference,
        );
    }
    if let Some(notes) = &appointment.notes {
        if notes.chars().count() > 1000 {
            result.add_error("notes", "Notes cannot exceed 1000 characters", ValidationErrorCode::TooLong);
        }
    }
    result
}

/// Patient a booking is written for
#[derive(Clone, Debug, PartialEq)]
pub enum PatientRef {
    Id(i64),
    /// Whoever holds the phone number, inserted as given when nobody does
    Phone(NewPatient),
}

/// An appointment written together with its patient and its journey entry.
/// The `patient_id` fields of `appointment` and `interaction` are replaced
/// by the resolved patient's id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBooking {
    pub patient: PatientRef,
    pub appointment: NewAppointment,
    pub interaction: NewInteraction,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Booked {
    pub patient: Patient,
    /// The patient row was inserted by this booking
    pub patient_created: bool,
    pub appointment: Appointment,
}

// ============================================================================
// Prescriptions
// ============================================================================

string_enum! {
    pub enum PrescriptionStatus {
        Pending => "pending",
        Filled => "filled",
        Dispensed => "dispensed",
        Cancelled => "cancelled",
    }
}

impl PrescriptionStatus {
    /// `pending -> filled -> dispensed`; cancellation only before dispensing
    pub fn can_transition_to(&self, next: PrescriptionStatus) -> bool {
        matches!(
            (self, next),
            (PrescriptionStatus::Pending, PrescriptionStatus::Filled)
                | (PrescriptionStatus::Filled, PrescriptionStatus::Dispensed)
                | (PrescriptionStatus::Pending, PrescriptionStatus::Cancelled)
                | (PrescriptionStatus::Filled, PrescriptionStatus::Cancelled)
        )
    }
}

string_enum! {
    pub enum CollectionMethod {
        PharmacyPickup => "pharmacy_pickup",
        HomeDelivery => "home_delivery",
    }
}

/// One medication line of a prescription
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

/// Prescription entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: i64,
    pub provider_id: i64,
    pub patient_id: i64,
    pub medications: Vec<Medication>,
    pub instructions: Option<String>,
    pub collection_method: CollectionMethod,
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewPrescription {
    pub provider_id: i64,
    pub patient_id: i64,
    pub medications: Vec<Medication>,
    pub instructions: Option<String>,
    pub collection_method: CollectionMethod,
    pub created_at: DateTime<Utc>,
}

pub fn validate_new_prescription(rx: &NewPrescription) -> ValidationResult {
    let mut result = ValidationResult::new();
    if rx.medications.is_empty() {
        result.add_error(
            "medications",
            "At least one medication is required",
            ValidationErrorCode::Required,
        );
    }
    for med in &rx.medications {
        if med.name.trim().is_empty() {
            result.add_error("medications.name", "Medication name is required", ValidationErrorCode::Required);
        }
        if med.dosage.trim().is_empty() {
            result.add_error("medications.dosage", "Dosage is required", ValidationErrorCode::Required);
        }
    }
    result
}

// ============================================================================
// Lab results
// ============================================================================

string_enum! {
    pub enum LabStatus {
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    pub enum Urgency {
        Routine => "routine",
        Urgent => "urgent",
        Stat => "stat",
    }
}

/// Lab test order and its result
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LabResult {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub test_name: String,
    pub test_type: String,
    pub fee: f64,
    pub status: LabStatus,
    pub results: Option<serde_json::Value>,
    pub reference_range: Option<serde_json::Value>,
    pub is_abnormal: bool,
    pub urgency: Urgency,
    pub notes: Option<String>,
    pub test_date: DateTime<Utc>,
    pub result_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewLabResult {
    pub patient_id: i64,
    pub provider_id: i64,
    pub test_name: String,
    pub test_type: String,
    pub fee: f64,
    pub reference_range: Option<serde_json::Value>,
    pub urgency: Urgency,
    pub notes: Option<String>,
    pub test_date: DateTime<Utc>,
}

pub fn validate_new_lab_result(lab: &NewLabResult) -> ValidationResult {
    let mut result = validate_text(&lab.test_name, "test_name", 2, 100);
    result.merge(validate_text(&lab.test_type, "test_type", 2, 50));
    if lab.fee < 0.0 || lab.fee.is_nan() {
        result.add_error("fee", "Fee cannot be negative", ValidationErrorCode::OutOfRange);
    }
    result
}

// ============================================================================
// Messages
// ============================================================================

string_enum! {
    pub enum SenderType {
        Patient => "patient",
        Provider => "provider",
    }
}

/// Message between a provider and a patient
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub provider_id: i64,
    pub patient_id: i64,
    pub content: String,
    pub sender: SenderType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewMessage {
    pub provider_id: i64,
    pub patient_id: i64,
    pub content: String,
    pub sender: SenderType,
    pub created_at: DateTime<Utc>,
}

pub fn validate_new_message(message: &NewMessage) -> ValidationResult {
    validate_text(&message.content, "content", 1, 2000)
}

// ============================================================================
// Interaction log
// ============================================================================

string_enum! {
    /// What a patient did; one entry per tracked action
    pub enum InteractionKind {
        Ussd => "ussd",
        Registration => "registration",
        Appointment => "appointment",
        Message => "message",
        Symptom => "symptom",
        HealthTip => "health_tip",
        Prescription => "prescription",
        LabResult => "lab_result",
        PaymentPending => "payment_pending",
        PaymentCompleted => "payment_completed",
        PaymentFailed => "payment_failed",
        PaymentRefunded => "payment_refunded",
        PaymentPartiallyRefunded => "payment_partially_refunded",
        WalkIn => "walk_in",
    }
}

impl InteractionKind {
    /// Interaction recorded when a payment moves to `status`
    pub fn for_payment(status: PaymentStatus) -> Option<Self> {
        match status {
            PaymentStatus::Pending => Some(InteractionKind::PaymentPending),
            PaymentStatus::Completed => Some(InteractionKind::PaymentCompleted),
            PaymentStatus::Failed => Some(InteractionKind::PaymentFailed),
            PaymentStatus::Refunded => Some(InteractionKind::PaymentRefunded),
            PaymentStatus::PartiallyRefunded => Some(InteractionKind::PaymentPartiallyRefunded),
            PaymentStatus::Waived => None,
        }
    }
}

/// Interaction log entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserInteraction {
    pub id: i64,
    pub patient_id: i64,
    pub kind: InteractionKind,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewInteraction {
    pub patient_id: i64,
    pub kind: InteractionKind,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewInteraction {
    pub fn now(patient_id: i64, kind: InteractionKind, description: impl Into<String>) -> Self {
        Self {
            patient_id,
            kind,
            description: description.into(),
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
