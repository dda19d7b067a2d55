use std::time::Duration;

use booking_engine::{db_types::Booking, BookingFlowApi, EngineContext, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the dispatch deadline sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each pass expires every dispatch round whose deadline has passed, then sleeps until the next deadline. A new round
/// opening wakes the sweeper early, and it never sleeps longer than `max_wait`.
pub fn start_dispatch_sweeper(db: SqliteDatabase, ctx: EngineContext, max_wait: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timer = ctx.timer.clone();
        let api = BookingFlowApi::new(db, ctx);
        info!("🕰️ Dispatch deadline sweeper started");
        loop {
            match api.expire_overdue_dispatches().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No overdue dispatch rounds"),
                Ok(expired) => {
                    info!("🕰️ {} dispatch rounds expired", expired.len());
                    debug!("🕰️ Expired bookings: {}", booking_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error expiring overdue dispatch rounds: {e}");
                },
            }
            let next = match api.next_dispatch_deadline().await {
                Ok(next) => next,
                Err(e) => {
                    warn!("🕰️ Could not look up the next dispatch deadline. {e}");
                    None
                },
            };
            timer.wait_for_next_deadline(next, api.context().now(), max_wait).await;
        }
    })
}

fn booking_list(bookings: &[Booking]) -> String {
    bookings
        .iter()
        .map(|b| format!("[{}] customer: {} category: {}", b.id, b.customer_id, b.category))
        .collect::<Vec<String>>()
        .join(", ")
}
