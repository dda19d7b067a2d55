//! Booking Engine
//!
//! The booking engine matches a customer's request for a local service with a nearby provider and carries the job
//! through a guarded lifecycle: dispatch, acceptance, on-site handoff, completion and settlement. It guarantees that
//! exactly one provider is ever bound to a booking, however many of them try to accept it at the same time.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). Backends implement the traits; the rest of the engine never
//!    touches the database directly. The data types used by the storage layer are public in [`mod@db_types`].
//! 2. The lifecycle transition table ([`mod@lifecycle`]).
//! 3. The public API ([`BookingFlowApi`], [`SettlementApi`], [`ProviderApi`]). These are generic over the backend traits.
//! 4. Events ([`mod@events`]). Notification hooks are called after every committed change, and a live status publisher
//!    lets clients follow a booking without polling.
mod booking_api;

pub mod clock;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod lifecycle;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use booking_api::{
    booking_flow_api::BookingFlowApi,
    booking_objects,
    eligibility,
    errors::BookingError,
    provider_api::ProviderApi,
    settlement_api::SettlementApi,
    EngineContext,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    BookingDatabase,
    BookingManagement,
    CaptureConfirmation,
    CaptureRequest,
    PaymentGateway,
    PaymentGatewayError,
    ProviderDirectory,
    RecordOnlyGateway,
};
