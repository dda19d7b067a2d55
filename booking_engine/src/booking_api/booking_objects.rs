use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Actor, Booking, BookingId, BookingStatusType, Offer, ProviderId};

/// The result of an accept attempt. Losing the race is an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcceptOutcome {
    /// This call bound the provider to the booking.
    Won,
    /// Someone else won, or the booking left dispatch for another reason.
    Lost,
    /// The dispatch round ended without a winner.
    Expired,
    /// Unknown booking, or the provider was never offered it.
    Invalid,
}

impl Display for AcceptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcceptOutcome::Won => write!(f, "WON"),
            AcceptOutcome::Lost => write!(f, "LOST"),
            AcceptOutcome::Expired => write!(f, "EXPIRED"),
            AcceptOutcome::Invalid => write!(f, "INVALID"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffOutcome {
    /// The code matched. The booking is now IN_PROGRESS and the code has been used up.
    Ok,
    /// Wrong code. Nothing changed apart from the attempt counter.
    Mismatch,
    /// The booking is not waiting for a handoff.
    NotReady,
    /// Too many wrong codes. The booking must be cancelled.
    Locked,
}

impl Display for HandoffOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandoffOutcome::Ok => write!(f, "OK"),
            HandoffOutcome::Mismatch => write!(f, "MISMATCH"),
            HandoffOutcome::NotReady => write!(f, "NOT_READY"),
            HandoffOutcome::Locked => write!(f, "LOCKED"),
        }
    }
}

/// A guarded status change. It is applied only if the booking is still at `expected_version` and in status `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub booking_id: BookingId,
    pub expected_version: i64,
    pub from: BookingStatusType,
    pub to: BookingStatusType,
    pub actor: Actor,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

impl TransitionRequest {
    pub fn new(booking: &Booking, to: BookingStatusType, actor: Actor, at: DateTime<Utc>) -> Self {
        Self {
            booking_id: booking.id.clone(),
            expected_version: booking.version,
            from: booking.status,
            to,
            actor,
            note: None,
            at,
        }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = version;
        self
    }
}

/// A provider that may be offered a booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub provider_id: ProviderId,
    pub distance_km: f64,
}

/// The outcome of dispatching a booking. `offers` is empty when the booking went straight to NO_MATCH.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRound {
    pub booking: Booking,
    pub offers: Vec<Offer>,
}

impl DispatchRound {
    pub fn is_no_match(&self) -> bool {
        self.booking.status == BookingStatusType::NoMatch
    }
}

/// The outcome of a provider declining an offer. `closed_round` is set if this was the last pending offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclineResult {
    pub offer: Offer,
    pub closed_round: Option<Booking>,
}
