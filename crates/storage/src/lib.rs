//! Tujali Health Storage
//!
//! SQLite-backed implementations of every store interface:
//! - [`Database`]: connection wrapper with transactions
//! - Schema migrations applied on open
//! - Clinic, payment, symptom and walk-in intake stores implemented on [`Database`]

pub mod database;
pub mod migrations;

mod clinic;
mod payments;
mod symptoms;

pub use database::{Database, DatabaseConfig, DatabaseError, DatabaseResult};

use clinic_integrity::ClinicStore;
use payments_integrity::PaymentStore;
use symptoms_integrity::{IntakeStore, SymptomStore};

/// Every store interface the service needs, behind one object
pub trait Store: ClinicStore + PaymentStore + SymptomStore + IntakeStore {}

impl<T> Store for T where T: ClinicStore + PaymentStore + SymptomStore + IntakeStore {}
