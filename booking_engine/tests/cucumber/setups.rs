use booking_engine::{config::EngineConfig, test_utils::TestSystem};
use cucumber::given;

use crate::cucumber::BookingWorld;

#[given("a fresh booking engine")]
async fn fresh_engine(world: &mut BookingWorld) {
    world.system = Some(TestSystem::new(EngineConfig::default()).await);
}

#[given(expr = "a fresh booking engine that offers each booking to {int} provider(s)")]
async fn fresh_engine_with_fan_out(world: &mut BookingWorld, fan_out: usize) {
    world.system = Some(TestSystem::new(EngineConfig::default().with_fan_out(fan_out)).await);
}

#[given(expr = "a fresh booking engine that locks the handoff after {int} wrong code(s)")]
async fn fresh_engine_with_handoff_limit(world: &mut BookingWorld, attempts: i64) {
    world.system = Some(TestSystem::new(EngineConfig::default().with_handoff_max_attempts(attempts)).await);
}
