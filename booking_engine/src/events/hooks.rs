use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{BookingStatusChangedEvent, EventHandler, EventProducer, Handler, OffersCreatedEvent};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub offers_created_producer: Vec<EventProducer<OffersCreatedEvent>>,
    pub status_changed_producer: Vec<EventProducer<BookingStatusChangedEvent>>,
}

pub struct EventHandlers {
    pub on_offers_created: Option<EventHandler<OffersCreatedEvent>>,
    pub on_status_changed: Option<EventHandler<BookingStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_offers_created = hooks.on_offers_created.map(|f| EventHandler::new(buffer_size, f));
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_offers_created, on_status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_offers_created {
            result.offers_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_offers_created {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_offers_created: Option<Handler<OffersCreatedEvent>>,
    pub on_status_changed: Option<Handler<BookingStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_offers_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OffersCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_offers_created = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BookingStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }
}
