//! Clinic Coordinator
//!
//! Operations over clinic records. Every function takes the store it needs
//! as its first argument so callers decide the backend:
//! - Patient registry and the phone-number lookup used by the USSD channel
//! - Provider registration
//! - Appointment booking, open slots and the nearest-provider search
//! - Prescriptions and lab orders
//! - Provider/patient messaging
//! - Interaction tracking and patient journeys

pub mod appointments;
pub mod geo;
pub mod journey;
pub mod labs;
pub mod messages;
pub mod patients;
pub mod prescriptions;
pub mod providers;

pub use appointments::*;
pub use journey::*;
pub use labs::*;
pub use messages::*;
pub use patients::*;
pub use prescriptions::*;
pub use providers::*;
