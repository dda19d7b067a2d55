mod cucumber;

use ::cucumber::{codegen::LocalBoxFuture, event::ScenarioFinished, gherkin, writer, World};
use futures_util::FutureExt;
use log::*;
use tokio::runtime::Runtime;

use crate::cucumber::BookingWorld;

fn main() {
    dotenvy::from_filename(".env.test").ok();
    env_logger::init();
    let sys = Runtime::new().unwrap();
    sys.block_on(
        BookingWorld::cucumber()
            .with_writer(writer::Libtest::or_basic())
            .after(|_f, _r, scenario, ev, w| post_test_hook(scenario, ev, w))
            .run("tests/features"),
    );
    info!("🚀️ Tests complete");
}

fn post_test_hook<'a>(
    scenario: &'a gherkin::Scenario,
    ev: &'a ScenarioFinished,
    world: Option<&'a mut BookingWorld>,
) -> LocalBoxFuture<'a, ()> {
    let fut = async move {
        trace!("🚀️ After-scenario hook running for \"{}\"", scenario.name);
        let Some(world) = world else {
            warn!("🚀️ World was not specified. Cannot clean up database.");
            return;
        };
        match (ev, world.system.take()) {
            (ScenarioFinished::StepPassed, Some(sys)) => {
                debug!("🚀️ Scenario complete, removing database: {}", sys.db_url);
                sys.tear_down().await;
            },
            (ScenarioFinished::StepFailed(..) | ScenarioFinished::StepSkipped, Some(sys)) => {
                error!("🚀️ Error in scenario, database retained: {}", sys.db_url);
            },
            (_, None) => warn!("🚀️ Scenario \"{}\" never started a booking engine", scenario.name),
            (ev, Some(_)) => trace!("🚀️ Unhandled event: {ev:?}"),
        }
        trace!("🚀️ After-scenario hook complete");
    };
    fut.boxed_local()
}
