//! Symptoms Coordinator
//!
//! Symptom surveillance over reports from every channel:
//! - Recording reports and tracking them on the patient journey
//! - Keyword categorization with a confidence score
//! - Outbreak signals over a rolling window
//! - Dashboard aggregation
//! - Walk-in intake at the front desk

pub mod categorize;
pub mod dashboard;
pub mod outbreak;
pub mod reports;
pub mod walkin;

pub use categorize::*;
pub use dashboard::*;
pub use outbreak::*;
pub use reports::*;
pub use walkin::*;
