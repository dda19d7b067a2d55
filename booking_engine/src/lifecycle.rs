//! # Booking lifecycle
//!
//! The transition table for [`BookingStatusType`]. Storage backends guard every write with the same table, so an
//! illegal transition is rejected before it ever reaches the database.
//!
//! | From            | To                                          |
//! |-----------------|---------------------------------------------|
//! | REQUESTED       | DISPATCHING, NO_MATCH, CANCELLED            |
//! | DISPATCHING     | ACCEPTED, EXPIRED, CANCELLED                |
//! | ACCEPTED        | EN_ROUTE, IN_PROGRESS (handoff), CANCELLED  |
//! | EN_ROUTE        | IN_PROGRESS (handoff), CANCELLED            |
//! | IN_PROGRESS     | COMPLETED                                   |
//! | COMPLETED       | PAYMENT_PENDING (settlement only)           |
//! | PAYMENT_PENDING | PAID                                        |
//!
//! PAID, CANCELLED, NO_MATCH and EXPIRED are final. COMPLETED is final for the job itself: its only exit is the
//! automatic settlement step.
use crate::{booking_api::errors::BookingError, db_types::BookingStatusType};

use BookingStatusType::*;

const NO_PROVIDER_MESSAGE: &str = "We could not find a provider for your request. Please try again later.";

impl BookingStatusType {
    /// The statuses that may legally follow this one.
    pub fn next_statuses(&self) -> &'static [BookingStatusType] {
        match self {
            Requested => &[Dispatching, NoMatch, Cancelled],
            Dispatching => &[Accepted, Expired, Cancelled],
            Accepted => &[EnRoute, InProgress, Cancelled],
            EnRoute => &[InProgress, Cancelled],
            InProgress => &[Completed],
            Completed => &[PaymentPending],
            PaymentPending => &[Paid],
            Paid | Cancelled | NoMatch | Expired => &[],
        }
    }

    pub fn can_transition_to(&self, to: BookingStatusType) -> bool {
        self.next_statuses().contains(&to)
    }

    /// True for statuses that no transition leaves, plus COMPLETED, which no longer accepts any action from
    /// customers or providers.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Completed | Paid | Cancelled | NoMatch | Expired)
    }

    /// True when a provider must be bound to the booking.
    pub fn requires_provider(&self) -> bool {
        matches!(self, Accepted | EnRoute | InProgress | Completed | PaymentPending | Paid)
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(Cancelled)
    }

    /// True while a provider is bound and may still act on the job, i.e. before it is finished.
    pub fn is_active_job(&self) -> bool {
        matches!(self, Accepted | EnRoute | InProgress)
    }

    /// True once the work has been done and the booking can be rated.
    pub fn is_rateable(&self) -> bool {
        matches!(self, Completed | PaymentPending | Paid)
    }

    /// What to show the customer. NO_MATCH and EXPIRED are different internally but read the same to customers.
    pub fn customer_message(&self) -> &'static str {
        match self {
            Requested => "Your request has been received.",
            Dispatching => "Looking for a provider near you.",
            NoMatch | Expired => NO_PROVIDER_MESSAGE,
            Accepted => "A provider has accepted your request.",
            EnRoute => "Your provider is on the way.",
            InProgress => "Work is in progress.",
            Completed => "The job is complete.",
            PaymentPending => "Awaiting payment.",
            Paid => "Payment received. Thank you!",
            Cancelled => "This booking has been cancelled.",
        }
    }
}

/// Checks `from -> to` against the transition table.
pub fn check_transition(from: BookingStatusType, to: BookingStatusType) -> Result<(), BookingError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(BookingError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn final_statuses_have_no_exits() {
        for status in [Paid, Cancelled, NoMatch, Expired] {
            assert!(status.next_statuses().is_empty(), "{status} should be final");
            assert!(status.is_terminal());
            for to in BookingStatusType::ALL {
                assert!(check_transition(status, to).is_err());
            }
        }
    }

    #[test]
    fn completed_only_settles() {
        assert!(Completed.is_terminal());
        assert_eq!(Completed.next_statuses(), &[PaymentPending]);
        assert!(!Completed.is_cancellable());
    }

    #[test]
    fn cancellation_window() {
        let cancellable: Vec<_> = BookingStatusType::ALL.into_iter().filter(|s| s.is_cancellable()).collect();
        assert_eq!(cancellable, vec![Requested, Dispatching, Accepted, EnRoute]);
    }

    #[test]
    fn happy_path_is_legal() {
        let path = [Requested, Dispatching, Accepted, EnRoute, InProgress, Completed, PaymentPending, Paid];
        for pair in path.windows(2) {
            assert!(check_transition(pair[0], pair[1]).is_ok(), "{} -> {}", pair[0], pair[1]);
        }
        assert!(check_transition(Accepted, InProgress).is_ok());
    }

    #[test]
    fn illegal_transitions_are_reported() {
        match check_transition(Requested, InProgress) {
            Err(BookingError::IllegalTransition { from, to }) => {
                assert_eq!(from, Requested);
                assert_eq!(to, InProgress);
            },
            other => panic!("Expected an illegal transition, got {other:?}"),
        }
        assert!(check_transition(Dispatching, NoMatch).is_err());
        assert!(check_transition(InProgress, Cancelled).is_err());
        assert!(check_transition(Completed, Paid).is_err());
    }

    #[test]
    fn no_provider_messages_match() {
        assert_eq!(NoMatch.customer_message(), Expired.customer_message());
        assert_ne!(NoMatch.customer_message(), Cancelled.customer_message());
    }

    #[test]
    fn provider_binding() {
        let bound: Vec<_> = BookingStatusType::ALL.into_iter().filter(|s| s.requires_provider()).collect();
        assert_eq!(bound, vec![Accepted, EnRoute, InProgress, Completed, PaymentPending, Paid]);
    }
}
