//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine, which in turn awaits the
//! database, so workers are free to serve other requests in the meantime. This matters most for
//! `/bookings/{id}/stream`, which stays open for as long as the client is watching.
use actix_web::{get, web, HttpResponse, Responder};
use booking_engine::{
    db_types::{BookingId, BookingStatusType, NewBooking, NewProvider, ProviderId},
    BookingDatabase,
    BookingFlowApi,
    PaymentGateway,
    ProviderApi,
    SettlementApi,
};
use futures::{stream, StreamExt};
use log::*;

use crate::{
    data_objects::{
        AcceptResponse,
        ActiveFlag,
        CancelRequest,
        CompletionRequest,
        CustomerParams,
        HandoffCodeResponse,
        HandoffRequest,
        HandoffResponse,
        OfferInboxParams,
        PaymentRequest,
        PositionUpdate,
        ProviderAction,
        RatingRequest,
        RatingResponse,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Bookings  ----------------------------------------------------
route!(create_booking => Post "/bookings" impl BookingDatabase);
/// Creates a booking and dispatches it straight away.
///
/// The response is the dispatch round: the booking (DISPATCHING, or NO_MATCH when nobody is eligible) and the offers
/// that went out.
pub async fn create_booking<B: BookingDatabase>(
    body: web::Json<NewBooking>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking = body.into_inner();
    debug!("💻️ Received booking request from {} for {}", booking.customer_id, booking.category);
    let round = api.create_booking(booking).await?;
    Ok(HttpResponse::Created().json(round))
}

route!(booking_by_id => Get "/bookings/{id}" impl BookingDatabase);
pub async fn booking_by_id<B: BookingDatabase>(
    path: web::Path<BookingId>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking = api.fetch_booking(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(booking))
}

route!(booking_history => Get "/bookings/{id}/history" impl BookingDatabase);
pub async fn booking_history<B: BookingDatabase>(
    path: web::Path<BookingId>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let history = api.booking_history(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(booking_offers => Get "/bookings/{id}/offers" impl BookingDatabase);
pub async fn booking_offers<B: BookingDatabase>(
    path: web::Path<BookingId>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let offers = api.offers_for_booking(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(offers))
}

route!(accept_booking => Post "/bookings/{id}/accept" impl BookingDatabase);
/// A provider tries to accept an offer. Losing the race is a normal response, so the outcome always comes back with a
/// 200.
pub async fn accept_booking<B: BookingDatabase>(
    path: web::Path<BookingId>,
    body: web::Json<ProviderAction>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    let provider_id = body.into_inner().provider_id;
    let outcome = api.accept(&booking_id, &provider_id).await?;
    debug!("💻️ Accept by {provider_id} for booking {booking_id}: {outcome}");
    Ok(HttpResponse::Ok().json(AcceptResponse { booking_id, outcome }))
}

route!(decline_booking => Post "/bookings/{id}/decline" impl BookingDatabase);
pub async fn decline_booking<B: BookingDatabase>(
    path: web::Path<BookingId>,
    body: web::Json<ProviderAction>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let result = api.decline(&path.into_inner(), &body.into_inner().provider_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(en_route => Post "/bookings/{id}/en_route" impl BookingDatabase);
pub async fn en_route<B: BookingDatabase>(
    path: web::Path<BookingId>,
    body: web::Json<ProviderAction>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking = api.mark_en_route(&path.into_inner(), &body.into_inner().provider_id).await?;
    Ok(HttpResponse::Ok().json(booking))
}

route!(update_position => Post "/bookings/{id}/position" impl BookingDatabase);
pub async fn update_position<B: BookingDatabase>(
    path: web::Path<BookingId>,
    body: web::Json<PositionUpdate>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let PositionUpdate { provider_id, position } = body.into_inner();
    let snapshot = api.update_position(&path.into_inner(), &provider_id, position).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

route!(handoff_code => Get "/bookings/{id}/handoff_code" impl BookingDatabase);
/// The customer reads the code they will show the provider on arrival.
pub async fn handoff_code<B: BookingDatabase>(
    path: web::Path<BookingId>,
    query: web::Query<CustomerParams>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    let code = api.reveal_handoff_code(&booking_id, &query.customer_id).await?;
    Ok(HttpResponse::Ok().json(HandoffCodeResponse { booking_id, code: code.reveal().clone() }))
}

route!(verify_handoff => Post "/bookings/{id}/handoff" impl BookingDatabase);
pub async fn verify_handoff<B: BookingDatabase>(
    path: web::Path<BookingId>,
    body: web::Json<HandoffRequest>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    let outcome = api.verify_handoff(&booking_id, &body.code).await?;
    Ok(HttpResponse::Ok().json(HandoffResponse { booking_id, outcome }))
}

route!(complete_booking => Post "/bookings/{id}/complete" impl BookingDatabase);
pub async fn complete_booking<B: BookingDatabase>(
    path: web::Path<BookingId>,
    body: web::Json<CompletionRequest>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let CompletionRequest { provider_id, final_amount } = body.into_inner();
    let booking = api.mark_completed(&path.into_inner(), &provider_id, final_amount).await?;
    Ok(HttpResponse::Ok().json(booking))
}

route!(cancel_booking => Post "/bookings/{id}/cancel" impl BookingDatabase);
pub async fn cancel_booking<B: BookingDatabase>(
    path: web::Path<BookingId>,
    body: web::Json<CancelRequest>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking = api.cancel(&path.into_inner(), body.into_inner().actor).await?;
    Ok(HttpResponse::Ok().json(booking))
}

route!(booking_stream => Get "/bookings/{id}/stream" impl BookingDatabase);
/// Server-sent events carrying the booking's status snapshots.
///
/// The current snapshot is sent straight away. Slow clients skip intermediate snapshots but never receive an outdated
/// one. The stream ends once the booking is paid, cancelled or has run out of providers.
pub async fn booking_stream<B: BookingDatabase>(
    path: web::Path<BookingId>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    let snapshots = api.subscribe(&booking_id).await?;
    debug!("💻️ New status stream for booking {booking_id}");
    // Stop straight after a final snapshot rather than waiting on a channel that will never change again
    let events = stream::unfold((snapshots, false), |(mut snapshots, finished)| async move {
        if finished {
            return None;
        }
        let snapshot = snapshots.next().await?;
        let finished = closes_stream(snapshot.status);
        Some((snapshot, (snapshots, finished)))
    })
    .map(|snapshot| {
        let data = serde_json::to_string(&snapshot).map_err(|e| ServerError::BackendError(e.to_string()))?;
        Ok::<_, ServerError>(web::Bytes::from(format!("event: status\ndata: {data}\n\n")))
    });
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}

/// COMPLETED is followed by PAYMENT_PENDING, so watchers stay on until the booking is settled.
fn closes_stream(status: BookingStatusType) -> bool {
    status.is_terminal() && status != BookingStatusType::Completed
}

//----------------------------------------------   Settlement  ----------------------------------------------------
route!(capture_payment => Post "/bookings/{id}/payment" impl BookingDatabase, PaymentGateway);
/// Captures payment for a booking awaiting payment. A gateway failure returns a 502 and may be retried.
pub async fn capture_payment<B: BookingDatabase, G: PaymentGateway>(
    path: web::Path<BookingId>,
    body: web::Json<PaymentRequest>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    let method = body.into_inner().method;
    info!("💻️ Payment request for booking {booking_id} by {method}");
    let receipt = api.capture_payment(&booking_id, method).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

route!(booking_receipt => Get "/bookings/{id}/receipt" impl BookingDatabase, PaymentGateway);
pub async fn booking_receipt<B: BookingDatabase, G: PaymentGateway>(
    path: web::Path<BookingId>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    let receipt = api
        .fetch_receipt(&booking_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No receipt has been issued for booking {booking_id}")))?;
    Ok(HttpResponse::Ok().json(receipt))
}

route!(rate_booking => Post "/bookings/{id}/rating" impl BookingDatabase, PaymentGateway);
pub async fn rate_booking<B: BookingDatabase, G: PaymentGateway>(
    path: web::Path<BookingId>,
    body: web::Json<RatingRequest>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let RatingRequest { rating, comment } = body.into_inner();
    let (rating, reputation) = api.submit_rating(&path.into_inner(), rating, comment).await?;
    Ok(HttpResponse::Ok().json(RatingResponse { rating, reputation }))
}

//----------------------------------------------   Providers  ----------------------------------------------------
route!(register_provider => Post "/providers" impl BookingDatabase);
pub async fn register_provider<B: BookingDatabase>(
    body: web::Json<NewProvider>,
    api: web::Data<ProviderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let provider = api.register_provider(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(provider))
}

route!(provider_by_id => Get "/providers/{id}" impl BookingDatabase);
pub async fn provider_by_id<B: BookingDatabase>(
    path: web::Path<ProviderId>,
    api: web::Data<ProviderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let provider = api.fetch_provider(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(provider))
}

route!(provider_active => Post "/providers/{id}/active" impl BookingDatabase);
pub async fn provider_active<B: BookingDatabase>(
    path: web::Path<ProviderId>,
    body: web::Json<ActiveFlag>,
    api: web::Data<ProviderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let provider = api.set_active(&path.into_inner(), body.active).await?;
    Ok(HttpResponse::Ok().json(provider))
}

route!(provider_offers => Get "/providers/{id}/offers" impl BookingDatabase);
/// The provider's offer inbox. Add `?pending_only=true` to see only the offers that can still be accepted.
pub async fn provider_offers<B: BookingDatabase>(
    path: web::Path<ProviderId>,
    query: web::Query<OfferInboxParams>,
    api: web::Data<ProviderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let offers = api.offers_for_provider(&path.into_inner(), query.pending_only).await?;
    Ok(HttpResponse::Ok().json(offers))
}

route!(provider_reputation => Get "/providers/{id}/reputation" impl BookingDatabase);
pub async fn provider_reputation<B: BookingDatabase>(
    path: web::Path<ProviderId>,
    api: web::Data<ProviderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let reputation = api.reputation(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reputation))
}

route!(provider_earnings => Get "/providers/{id}/earnings" impl BookingDatabase);
pub async fn provider_earnings<B: BookingDatabase>(
    path: web::Path<ProviderId>,
    api: web::Data<ProviderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let earnings = api.earnings(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(earnings))
}
