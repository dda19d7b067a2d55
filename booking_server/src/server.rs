use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use booking_engine::{
    clock::SystemClock,
    events::{EngineEvents, EventHandlers, StatusPublisher},
    BookingFlowApi,
    EngineContext,
    ProviderApi,
    RecordOnlyGateway,
    SettlementApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::ServerConfig,
    dispatch_sweeper::start_dispatch_sweeper,
    errors::ServerError,
    notifications::notification_hooks,
    routes::{
        health,
        AcceptBookingRoute,
        BookingByIdRoute,
        BookingHistoryRoute,
        BookingOffersRoute,
        BookingReceiptRoute,
        BookingStreamRoute,
        CancelBookingRoute,
        CapturePaymentRoute,
        CompleteBookingRoute,
        CreateBookingRoute,
        DeclineBookingRoute,
        EnRouteRoute,
        HandoffCodeRoute,
        ProviderActiveRoute,
        ProviderByIdRoute,
        ProviderEarningsRoute,
        ProviderOffersRoute,
        ProviderReputationRoute,
        RateBookingRoute,
        RegisterProviderRoute,
        UpdatePositionRoute,
        VerifyHandoffRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 256;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
        info!("🗃️ Database migrations are up to date");
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let events = EngineEvents::new(producers, StatusPublisher::new());
    let ctx = EngineContext::new(config.engine.clone(), Arc::new(SystemClock), events);
    // Runs for the life of the process
    let _sweeper = start_dispatch_sweeper(db.clone(), ctx.clone(), config.sweep_interval);
    let srv = create_server_instance(config, db, ctx)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Every worker gets its own API objects. They share the database pool and the engine context, so all workers see the
/// same live status channels and wake the same sweeper.
pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    ctx: EngineContext,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bks::access_log"))
            .configure(|cfg| configure_app(cfg, db.clone(), ctx.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the API objects and every route. Shared with the endpoint tests.
pub fn configure_app(cfg: &mut web::ServiceConfig, db: SqliteDatabase, ctx: EngineContext) {
    let flow_api = BookingFlowApi::new(db.clone(), ctx.clone());
    let provider_api = ProviderApi::new(db.clone(), ctx.clone());
    let settlement_api = SettlementApi::new(db, ctx, RecordOnlyGateway);
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into());
    let path_config = web::PathConfig::default()
        .error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into());
    cfg.app_data(web::Data::new(flow_api))
        .app_data(web::Data::new(provider_api))
        .app_data(web::Data::new(settlement_api))
        .app_data(json_config)
        .app_data(path_config)
        .service(health)
        .service(CreateBookingRoute::<SqliteDatabase>::new())
        .service(BookingByIdRoute::<SqliteDatabase>::new())
        .service(BookingHistoryRoute::<SqliteDatabase>::new())
        .service(BookingOffersRoute::<SqliteDatabase>::new())
        .service(AcceptBookingRoute::<SqliteDatabase>::new())
        .service(DeclineBookingRoute::<SqliteDatabase>::new())
        .service(EnRouteRoute::<SqliteDatabase>::new())
        .service(UpdatePositionRoute::<SqliteDatabase>::new())
        .service(HandoffCodeRoute::<SqliteDatabase>::new())
        .service(VerifyHandoffRoute::<SqliteDatabase>::new())
        .service(CompleteBookingRoute::<SqliteDatabase>::new())
        .service(CancelBookingRoute::<SqliteDatabase>::new())
        .service(BookingStreamRoute::<SqliteDatabase>::new())
        .service(CapturePaymentRoute::<SqliteDatabase, RecordOnlyGateway>::new())
        .service(BookingReceiptRoute::<SqliteDatabase, RecordOnlyGateway>::new())
        .service(RateBookingRoute::<SqliteDatabase, RecordOnlyGateway>::new())
        .service(RegisterProviderRoute::<SqliteDatabase>::new())
        .service(ProviderByIdRoute::<SqliteDatabase>::new())
        .service(ProviderActiveRoute::<SqliteDatabase>::new())
        .service(ProviderOffersRoute::<SqliteDatabase>::new())
        .service(ProviderReputationRoute::<SqliteDatabase>::new())
        .service(ProviderEarningsRoute::<SqliteDatabase>::new());
}
