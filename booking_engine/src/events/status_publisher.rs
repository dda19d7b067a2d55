//! Live booking status.
//!
//! One `watch` channel per booking that is still changing or still watched. A watch channel only keeps the latest value, so a
//! slow subscriber skips intermediate snapshots but never sees an outdated one, and a new subscriber immediately gets
//! the current state.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use log::*;
use serde::Serialize;
use tokio::sync::watch;

use crate::db_types::{Booking, BookingId, BookingStatusType, GeoPoint, ProviderId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub booking_id: BookingId,
    pub status: BookingStatusType,
    pub version: i64,
    pub provider_id: Option<ProviderId>,
    /// The provider's last reported position. Only present while EN_ROUTE.
    pub position: Option<GeoPoint>,
    pub message: &'static str,
    pub at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn from_booking(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id.clone(),
            status: booking.status,
            version: booking.version,
            provider_id: booking.provider_id.clone(),
            position: None,
            message: booking.status.customer_message(),
            at: booking.status_changed_at,
        }
    }

    pub fn with_position(mut self, position: GeoPoint, at: DateTime<Utc>) -> Self {
        if self.status == BookingStatusType::EnRoute {
            self.position = Some(position);
            self.at = at;
        }
        self
    }

    /// A snapshot replaces the current one if it describes a later version, or the same version with a fresher
    /// position.
    pub fn supersedes(&self, current: &StatusSnapshot) -> bool {
        self.version > current.version ||
            (self.version == current.version && self.position.is_some() && self.at >= current.at && self != current)
    }
}

type Channels = HashMap<BookingId, watch::Sender<StatusSnapshot>>;

#[derive(Debug, Clone, Default)]
pub struct StatusPublisher {
    channels: Arc<Mutex<Channels>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records the latest snapshot for the booking and pushes it to current subscribers.
    ///
    /// The snapshot is kept even when nobody is watching yet, so a subscriber seeded from an older read still starts
    /// from this one. It is dropped once the booking is final and unwatched.
    pub fn publish(&self, snapshot: StatusSnapshot) {
        let mut channels = self.lock();
        let id = snapshot.booking_id.clone();
        let tx = channels.entry(id.clone()).or_insert_with(|| watch::channel(snapshot.clone()).0);
        let changed = tx.send_if_modified(|current| {
            if snapshot.supersedes(current) {
                *current = snapshot;
                true
            } else {
                false
            }
        });
        trace!("📡️ Snapshot for booking {id} published: {changed}. {} watchers", tx.receiver_count());
        Self::prune(&mut channels, &id);
    }

    /// Returns a stream that yields the latest snapshot straight away and then every newer one. The stream is endless
    /// while the publisher is alive; subscribing again restarts it from the current state.
    ///
    /// `seed` only counts if it is newer than what has already been published.
    pub fn subscribe(&self, seed: StatusSnapshot) -> BoxStream<'static, StatusSnapshot> {
        let rx = {
            let mut channels = self.lock();
            let tx = channels.entry(seed.booking_id.clone()).or_insert_with(|| watch::channel(seed.clone()).0);
            tx.send_if_modified(|current| {
                if seed.supersedes(current) {
                    *current = seed;
                    true
                } else {
                    false
                }
            });
            tx.subscribe()
        };
        let watcher = Watch { rx, publisher: self.clone() };
        stream::unfold((watcher, true), |(mut watcher, first)| async move {
            if !first && watcher.rx.changed().await.is_err() {
                return None;
            }
            let snapshot = watcher.rx.borrow_and_update().clone();
            Some((snapshot, (watcher, false)))
        })
        .boxed()
    }

    pub fn watcher_count(&self, booking_id: &BookingId) -> usize {
        self.lock().get(booking_id).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Drops the booking's channel if it is final and nobody listens to it any more. `keep` is the number of receivers
    /// that are about to go away and do not count.
    fn prune_with(channels: &mut Channels, booking_id: &BookingId, keep: usize) {
        let unwatched = channels
            .get(booking_id)
            .map(|tx| tx.receiver_count() <= keep && tx.borrow().status.is_terminal())
            .unwrap_or(false);
        if unwatched {
            channels.remove(booking_id);
            trace!("📡️ Released the status channel for booking {booking_id}");
        }
    }

    fn prune(channels: &mut Channels, booking_id: &BookingId) {
        Self::prune_with(channels, booking_id, 0);
    }
}

/// A subscriber's receiver. Releases the booking's channel when the last subscriber of a final booking goes away.
struct Watch {
    rx: watch::Receiver<StatusSnapshot>,
    publisher: StatusPublisher,
}

impl Drop for Watch {
    fn drop(&mut self) {
        let id = self.rx.borrow().booking_id.clone();
        let mut channels = self.publisher.lock();
        StatusPublisher::prune_with(&mut channels, &id, 1);
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn snapshot(version: i64, status: BookingStatusType) -> StatusSnapshot {
        StatusSnapshot {
            booking_id: BookingId::from("b-1"),
            status,
            version,
            provider_id: None,
            position: None,
            message: status.customer_message(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_see_current_then_newer_snapshots() {
        let publisher = StatusPublisher::new();
        let mut stream = publisher.subscribe(snapshot(2, BookingStatusType::Dispatching));
        let first = stream.next().await.unwrap();
        assert_eq!(first.version, 2);
        publisher.publish(snapshot(3, BookingStatusType::Accepted));
        let next = stream.next().await.unwrap();
        assert_eq!(next.status, BookingStatusType::Accepted);
    }

    #[tokio::test]
    async fn stale_snapshots_are_ignored() {
        let publisher = StatusPublisher::new();
        let mut stream = publisher.subscribe(snapshot(4, BookingStatusType::EnRoute));
        let _ = stream.next().await.unwrap();
        publisher.publish(snapshot(3, BookingStatusType::Accepted));
        publisher.publish(snapshot(5, BookingStatusType::InProgress));
        let next = stream.next().await.unwrap();
        assert_eq!(next.version, 5);
    }

    #[tokio::test]
    async fn positions_update_without_a_version_bump() {
        let publisher = StatusPublisher::new();
        let base = snapshot(4, BookingStatusType::EnRoute);
        let mut stream = publisher.subscribe(base.clone());
        let _ = stream.next().await.unwrap();
        let p = GeoPoint::new(12.0, 77.0).unwrap();
        publisher.publish(base.clone().with_position(p, base.at + Duration::seconds(5)));
        let next = stream.next().await.unwrap();
        assert_eq!(next.position, Some(p));
        assert_eq!(next.version, 4);
    }

    #[tokio::test]
    async fn resubscribing_restarts_from_the_latest_state() {
        let publisher = StatusPublisher::new();
        let stream = publisher.subscribe(snapshot(2, BookingStatusType::Dispatching));
        publisher.publish(snapshot(3, BookingStatusType::Accepted));
        drop(stream);
        let mut again = publisher.subscribe(snapshot(2, BookingStatusType::Dispatching));
        assert_eq!(again.next().await.unwrap().version, 3);
    }

    #[tokio::test]
    async fn late_subscribers_start_from_the_latest_publish() {
        let publisher = StatusPublisher::new();
        // The subscriber read version 2 from storage just before version 3 was published
        publisher.publish(snapshot(3, BookingStatusType::Accepted));
        let mut stream = publisher.subscribe(snapshot(2, BookingStatusType::Dispatching));
        let first = tokio::time::timeout(std::time::Duration::from_millis(300), stream.next()).await.unwrap().unwrap();
        assert_eq!(first.version, 3);
        assert_eq!(first.status, BookingStatusType::Accepted);
    }

    #[tokio::test]
    async fn final_snapshots_are_not_kept_for_nobody() {
        let publisher = StatusPublisher::new();
        publisher.publish(snapshot(3, BookingStatusType::NoMatch));
        assert!(publisher.lock().get(&BookingId::from("b-1")).is_none());
    }

    #[tokio::test]
    async fn last_watcher_leaving_a_final_booking_releases_it() {
        let publisher = StatusPublisher::new();
        let id = BookingId::from("b-1");
        let mut first = publisher.subscribe(snapshot(2, BookingStatusType::Dispatching));
        let second = publisher.subscribe(snapshot(2, BookingStatusType::Dispatching));
        assert_eq!(publisher.watcher_count(&id), 2);
        publisher.publish(snapshot(3, BookingStatusType::Expired));
        assert_eq!(first.next().await.unwrap().status, BookingStatusType::Expired);
        drop(second);
        assert_eq!(publisher.watcher_count(&id), 1);
        drop(first);
        assert!(publisher.lock().get(&id).is_none());
    }

    #[tokio::test]
    async fn unwatched_final_bookings_are_pruned() {
        let publisher = StatusPublisher::new();
        let id = BookingId::from("b-1");
        let stream = publisher.subscribe(snapshot(2, BookingStatusType::Dispatching));
        assert_eq!(publisher.watcher_count(&id), 1);
        drop(stream);
        publisher.publish(snapshot(3, BookingStatusType::Expired));
        assert!(publisher.lock().get(&id).is_none());
    }
}
