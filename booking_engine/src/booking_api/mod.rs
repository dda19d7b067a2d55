//! # Booking engine public API
//!
//! The `booking_api` module exposes the programmatic API for the booking engine. It is split by concern so that
//! clients pick the pieces they need.
//!
//! * [`booking_flow_api`] is the primary API. It drives a booking from request through dispatch, the accept race,
//!   handoff and completion, and serves the booking's history and live status.
//! * [`settlement_api`] turns a completed booking into a receipt, captures payment and takes ratings.
//! * [`provider_api`] manages the provider directory and answers provider-side queries.
//!
//! The other submodules are support types.
//!
//! # API usage
//!
//! Every API is created from a database backend and a shared [`EngineContext`]. The context carries the clock, the
//! dispatch policy and the event fan-out, so every API built from the same context sees the same time and publishes to
//! the same subscribers.
//!
//! ```rust,ignore
//! use booking_engine::{BookingFlowApi, EngineContext, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/bookings.db", 25).await?;
//! let ctx = EngineContext::default();
//! let api = BookingFlowApi::new(db, ctx);
//! let round = api.create_booking(new_booking).await?;
//! ```
use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    clock::{engine_time, Clock, DispatchTimer, SystemClock},
    config::EngineConfig,
    events::EngineEvents,
};

pub mod booking_flow_api;
pub mod booking_objects;
pub mod eligibility;
pub mod errors;
pub mod provider_api;
pub mod settlement_api;

/// Everything the APIs share apart from the database.
#[derive(Clone)]
pub struct EngineContext {
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
    pub events: EngineEvents,
    pub timer: DispatchTimer,
}

impl Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EngineContext({:?}, {:?})", self.config, self.clock)
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Arc::new(SystemClock), EngineEvents::default())
    }
}

impl EngineContext {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, events: EngineEvents) -> Self {
        Self { config, clock, events, timer: DispatchTimer::new() }
    }

    pub fn with_timer(mut self, timer: DispatchTimer) -> Self {
        self.timer = timer;
        self
    }

    /// The current time, truncated to the millisecond.
    pub fn now(&self) -> DateTime<Utc> {
        engine_time(self.clock.now())
    }
}
