//! Tujali Health Test Suite
//!
//! Scenario tests that cross domain boundaries, all against the SQLite store:
//! - Patient journeys that start on USSD and continue on the provider side
//! - Clinic records: prescriptions, lab orders and messaging
//! - Payments and refunds mirrored onto appointments
//! - Symptom surveillance fed by several channels
//! - USSD sessions replayed out of order or through a file-backed database

#[cfg(test)]
pub mod fixtures;

pub mod clinic_records;
pub mod journey;
pub mod payments_flow;
pub mod surveillance;
pub mod ussd_sessions;
