use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Actor, Booking, BookingStatusType, GeoPoint, Offer},
    events::{BookingStatusChangedEvent, EventProducers, OffersCreatedEvent, StatusPublisher, StatusSnapshot},
};

/// Fans committed changes out to the notification hooks and the live status publisher.
#[derive(Clone, Default)]
pub struct EngineEvents {
    producers: EventProducers,
    status: StatusPublisher,
}

impl EngineEvents {
    pub fn new(producers: EventProducers, status: StatusPublisher) -> Self {
        Self { producers, status }
    }

    pub fn status_publisher(&self) -> &StatusPublisher {
        &self.status
    }

    pub async fn booking_changed(&self, booking: &Booking, previous: Option<BookingStatusType>, actor: &Actor) {
        self.status.publish(StatusSnapshot::from_booking(booking));
        for emitter in &self.producers.status_changed_producer {
            debug!("📬️ Notifying status hook subscribers that booking {} is {}", booking.id, booking.status);
            let event = BookingStatusChangedEvent::new(booking.clone(), previous, actor.clone());
            emitter.publish_event(event).await;
        }
    }

    pub async fn offers_created(&self, booking: &Booking, offers: &[Offer]) {
        for emitter in &self.producers.offers_created_producer {
            debug!("📬️ Notifying offer hook subscribers of {} offers for booking {}", offers.len(), booking.id);
            let event = OffersCreatedEvent::new(booking.clone(), offers.to_vec());
            emitter.publish_event(event).await;
        }
    }

    pub fn position_changed(&self, booking: &Booking, position: GeoPoint, at: DateTime<Utc>) {
        self.status.publish(StatusSnapshot::from_booking(booking).with_position(position, at));
    }
}
