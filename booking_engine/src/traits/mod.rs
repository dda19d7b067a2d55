//! # Storage and collaborator contracts
//!
//! The engine is storage-agnostic. A backend implements the traits in this module; the APIs in
//! [`crate::booking_api`] are generic over them.
//!
//! * [`BookingDatabase`] is the highest level of behaviour: every guarded, atomic booking write the engine performs.
//!   Each method is one transaction, and each starts with the conditional write that decides the outcome.
//! * [`BookingManagement`] provides read-only queries for bookings, offers, history, receipts and ratings.
//! * [`ProviderDirectory`] holds providers, their categories and positions, plus their reputation and earnings.
//! * [`PaymentGateway`] is the external payment capture collaborator.
mod booking_database;
mod booking_management;
mod payment_gateway;
mod provider_directory;

pub use booking_database::BookingDatabase;
pub use booking_management::BookingManagement;
pub use payment_gateway::{CaptureConfirmation, CaptureRequest, PaymentGateway, PaymentGatewayError, RecordOnlyGateway};
pub use provider_directory::ProviderDirectory;
