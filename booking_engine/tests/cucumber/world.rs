use std::{collections::HashMap, fmt::Debug};

use booking_engine::{
    booking_objects::{AcceptOutcome, HandoffOutcome},
    db_types::{BookingId, ProviderId},
    test_utils::TestSystem,
    BookingError,
};
use cucumber::World;

#[derive(Default, World)]
pub struct BookingWorld {
    pub system: Option<TestSystem>,
    /// The most recent booking made by each customer
    pub bookings: HashMap<String, BookingId>,
    pub providers: HashMap<String, ProviderId>,
    pub accepts: HashMap<String, AcceptOutcome>,
    pub shared_codes: HashMap<String, String>,
    pub last_handoff: Option<HandoffOutcome>,
    pub last_error: Option<BookingError>,
}

impl Debug for BookingWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingWorld")
            .field("db", &self.system.as_ref().map(|s| s.db_url.as_str()))
            .field("bookings", &self.bookings)
            .field("providers", &self.providers)
            .field("accepts", &self.accepts)
            .field("last_handoff", &self.last_handoff)
            .field("last_error", &self.last_error.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl BookingWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Booking engine not initialised")
    }

    pub fn booking(&self, customer: &str) -> BookingId {
        self.bookings.get(customer).cloned().unwrap_or_else(|| panic!("{customer} has not made a booking"))
    }

    pub fn provider(&self, name: &str) -> ProviderId {
        self.providers.get(name).cloned().unwrap_or_else(|| panic!("{name} is not a registered provider"))
    }
}
