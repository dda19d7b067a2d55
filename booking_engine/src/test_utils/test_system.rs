use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::prepare_env::{drop_database, prepare_test_env, random_db_path};
use crate::{
    clock::ManualClock,
    config::EngineConfig,
    events::EngineEvents,
    BookingFlowApi,
    EngineContext,
    ProviderApi,
    RecordOnlyGateway,
    SettlementApi,
    SqliteDatabase,
};

/// A complete engine on a fresh database with a manual clock.
pub struct TestSystem {
    pub db_url: String,
    pub db: SqliteDatabase,
    pub clock: ManualClock,
    pub ctx: EngineContext,
    pub flow: BookingFlowApi<SqliteDatabase>,
    pub providers: ProviderApi<SqliteDatabase>,
    pub settlement: SettlementApi<SqliteDatabase, RecordOnlyGateway>,
}

impl TestSystem {
    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().unwrap_or_else(Utc::now)
    }

    pub async fn new(config: EngineConfig) -> Self {
        Self::with_events(config, EngineEvents::default()).await
    }

    pub async fn with_events(config: EngineConfig, events: EngineEvents) -> Self {
        let db_url = random_db_path();
        prepare_test_env(&db_url).await;
        let db = SqliteDatabase::new_with_url(&db_url, 25).await.expect("Error creating database");
        let clock = ManualClock::new(Self::start_time());
        let ctx = EngineContext::new(config, Arc::new(clock.clone()), events);
        let flow = BookingFlowApi::new(db.clone(), ctx.clone());
        let providers = ProviderApi::new(db.clone(), ctx.clone());
        let settlement = SettlementApi::new(db.clone(), ctx.clone(), RecordOnlyGateway);
        Self { db_url, db, clock, ctx, flow, providers, settlement }
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(Duration::seconds(seconds));
    }

    pub async fn tear_down(self) {
        self.db.close().await;
        drop_database(&self.db_url).await;
    }
}
