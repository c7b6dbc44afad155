//! Store interfaces for clinic records.
//!
//! The coordinator crate only talks to these traits; `tujali-storage`
//! provides the SQLite implementation. Stores return
//! [`HealthError::StorageError`](tujali_shared::HealthError) for
//! backend failures and [`HealthError::Conflict`](tujali_shared::HealthError)
//! when a uniqueness constraint rejects a write.

use super::*;
use tujali_shared::HealthResult;

pub trait PatientStore: Send + Sync {
    fn insert_patient(&self, patient: &NewPatient) -> HealthResult<Patient>;
    fn get_patient(&self, id: i64) -> HealthResult<Option<Patient>>;
    fn find_patient_by_phone(&self, phone_number: &str) -> HealthResult<Option<Patient>>;
    /// Newest first
    fn list_patients(&self) -> HealthResult<Vec<Patient>>;
    fn update_patient(&self, id: i64, update: &PatientUpdate) -> HealthResult<Patient>;
}

pub trait ProviderStore: Send + Sync {
    fn insert_user(&self, user: &NewUser) -> HealthResult<User>;
    fn get_user(&self, id: i64) -> HealthResult<Option<User>>;
    fn find_user_by_username(&self, username: &str) -> HealthResult<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> HealthResult<Option<User>>;

    /// Insert the user and its provider profile in one transaction
    fn insert_provider_account(
        &self,
        user: &NewUser,
        provider: &NewProvider,
    ) -> HealthResult<(User, Provider)>;
    fn get_provider(&self, id: i64) -> HealthResult<Option<Provider>>;
    fn find_provider_by_user(&self, user_id: i64) -> HealthResult<Option<Provider>>;
    /// Ordered by id
    fn list_providers(&self) -> HealthResult<Vec<Provider>>;
}

pub trait AppointmentStore: Send + Sync {
    /// Resolve the patient, then insert the appointment and its interaction
    /// in one transaction. A slot held by another patient's open
    /// appointment is a `Conflict` and nothing is written.
    fn insert_booking(&self, booking: &NewBooking) -> HealthResult<Booked>;
    fn get_appointment(&self, id: i64) -> HealthResult<Option<Appointment>>;
    /// Ordered by date then time
    fn list_appointments(&self, filter: &AppointmentFilter) -> HealthResult<Vec<Appointment>>;
    fn set_appointment_status(
        &self,
        id: i64,
        status: AppointmentStatus,
    ) -> HealthResult<Appointment>;
    fn set_appointment_payment_status(
        &self,
        id: i64,
        payment_status: PaymentStatus,
    ) -> HealthResult<Appointment>;
}

pub trait RecordStore: Send + Sync {
    fn insert_prescription(&self, rx: &NewPrescription) -> HealthResult<Prescription>;
    fn get_prescription(&self, id: i64) -> HealthResult<Option<Prescription>>;
    /// Newest first; `None` filters are ignored
    fn list_prescriptions(
        &self,
        provider_id: Option<i64>,
        patient_id: Option<i64>,
    ) -> HealthResult<Vec<Prescription>>;
    fn set_prescription_status(
        &self,
        id: i64,
        status: PrescriptionStatus,
    ) -> HealthResult<Prescription>;

    fn insert_lab_result(&self, lab: &NewLabResult) -> HealthResult<LabResult>;
    fn get_lab_result(&self, id: i64) -> HealthResult<Option<LabResult>>;
    /// Newest test first; `None` filters are ignored
    fn list_lab_results(
        &self,
        provider_id: Option<i64>,
        patient_id: Option<i64>,
    ) -> HealthResult<Vec<LabResult>>;
    /// Overwrites status, results, abnormal flag, notes and result date
    fn update_lab_result(&self, lab: &LabResult) -> HealthResult<LabResult>;
}

pub trait MessageStore: Send + Sync {
    fn insert_message(&self, message: &NewMessage) -> HealthResult<Message>;
    /// Oldest first
    fn list_conversation(&self, provider_id: i64, patient_id: i64) -> HealthResult<Vec<Message>>;
    /// Every message of a provider, newest first
    fn list_provider_messages(&self, provider_id: i64) -> HealthResult<Vec<Message>>;
    /// Marks messages sent by `sender` in the conversation as read, returning how many changed
    fn mark_read(&self, provider_id: i64, patient_id: i64, sender: SenderType) -> HealthResult<usize>;
}

pub trait InteractionStore: Send + Sync {
    fn insert_interaction(&self, interaction: &NewInteraction) -> HealthResult<UserInteraction>;
    /// Oldest first
    fn list_interactions(&self, patient_id: i64) -> HealthResult<Vec<UserInteraction>>;
}

/// Every clinic store interface in one bound
pub trait ClinicStore:
    PatientStore + ProviderStore + AppointmentStore + RecordStore + MessageStore + InteractionStore
{
}

impl<T> ClinicStore for T where
    T: PatientStore + ProviderStore + AppointmentStore + RecordStore + MessageStore + InteractionStore
{
}
