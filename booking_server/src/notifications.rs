//! Notification hooks for the server.
//!
//! Push delivery to providers and customers is handled by a separate service. Until that is wired in, offers and
//! customer-facing status messages are written to the log under the `bks::notifications` target.
use booking_engine::events::EventHooks;
use futures::FutureExt;
use log::*;

const TARGET: &str = "bks::notifications";

pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_offers_created(|ev| {
            async move {
                for offer in &ev.offers {
                    info!(
                        target: TARGET,
                        "📬️ Offer for booking {} ({}) sent to provider {} at {:.1} km. Open until {}",
                        ev.booking.id,
                        ev.booking.category,
                        offer.provider_id,
                        offer.distance_km,
                        offer.deadline
                    );
                }
            }
            .boxed()
        })
        .on_status_changed(|ev| {
            async move {
                let previous = ev.previous.map(|s| s.to_string()).unwrap_or_else(|| "NEW".into());
                info!(
                    target: TARGET,
                    "📬️ Customer {}: booking {} {previous} -> {} ({}). \"{}\"",
                    ev.booking.customer_id,
                    ev.booking.id,
                    ev.booking.status,
                    ev.actor,
                    ev.customer_message()
                );
            }
            .boxed()
        });
    hooks
}
