//! Behavioural scenarios for partitions wrapped around a test body.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use syncdet::{
    CaseError, Channel, LinkControl, LinkRegistry, PartitionError, PartitionScope, SimulatedLink,
    with_partition,
};
use tokio::runtime::Runtime;

#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[derive(Default)]
struct PartitionWorld {
    links: RefCell<Vec<SimulatedLink>>,
    registry: RefCell<LinkRegistry>,
    seen_during_body: RefCell<Vec<(String, bool)>>,
    outcome: RefCell<Option<Result<(), CaseError>>>,
}

impl PartitionWorld {
    fn register(&self, name: &str, channel: Channel) {
        let link = SimulatedLink::new(name, channel);
        self.registry
            .borrow_mut()
            .register(link.clone())
            .unwrap_or_else(|err| panic!("register {name}: {err}"));
        self.links.borrow_mut().push(link);
    }

    fn run_body(&self, scope: &PartitionScope, fail: bool) {
        let runtime = Runtime::new().unwrap_or_else(|err| panic!("tokio runtime: {err}"));
        let registry = self.registry.borrow();
        let links = &self.links;
        let seen = &self.seen_during_body;
        let outcome = runtime.block_on(with_partition(&registry, scope, || async move {
            for link in links.borrow().iter() {
                seen.borrow_mut()
                    .push((link_name(link), link.is_suspended()));
            }
            if fail {
                Err(CaseError::Failed(String::from("body gave up")))
            } else {
                Ok(())
            }
        }));
        self.outcome.replace(Some(outcome));
    }

    fn suspended_during_body(&self, name: &str) -> Option<bool> {
        self.seen_during_body
            .borrow()
            .iter()
            .find(|(seen, _)| seen == name)
            .map(|(_, suspended)| *suspended)
    }
}

fn link_name(link: &SimulatedLink) -> String {
    link.name().to_owned()
}

#[fixture]
fn partition_world() -> PartitionWorld {
    PartitionWorld::default()
}

#[given("transport links \"{first}\" and \"{second}\" beside the coordination link \"{coordination}\"")]
fn registered_links(
    partition_world: &PartitionWorld,
    first: String,
    second: String,
    coordination: String,
) {
    partition_world.register(&first, Channel::Transport);
    partition_world.register(&second, Channel::Transport);
    partition_world.register(&coordination, Channel::Coordination);
}

#[when("a test body runs inside a global partition")]
fn body_in_global_partition(partition_world: &PartitionWorld) {
    partition_world.run_body(&PartitionScope::All, false);
}

#[when("a test body runs inside a partition of \"{link}\"")]
fn body_in_named_partition(partition_world: &PartitionWorld, link: String) {
    partition_world.run_body(&PartitionScope::Only(vec![link]), false);
}

#[when("a failing test body runs inside a partition of \"{link}\"")]
fn failing_body_in_named_partition(partition_world: &PartitionWorld, link: String) {
    partition_world.run_body(&PartitionScope::Only(vec![link]), true);
}

#[then("the body saw every transport link suspended")]
fn transport_links_were_suspended(partition_world: &PartitionWorld) -> Result<(), StepError> {
    for name in ["wan", "lan"] {
        if partition_world.suspended_during_body(name) != Some(true) {
            return Err(StepError::Assertion(format!(
                "{name} should have been suspended during the body"
            )));
        }
    }
    Ok(())
}

#[then("the coordination link stayed up during the body")]
fn coordination_link_stayed_up(partition_world: &PartitionWorld) -> Result<(), StepError> {
    match partition_world.suspended_during_body("barrier") {
        Some(false) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "barrier link state during body: {other:?}"
        ))),
    }
}

#[then("every link is restored afterwards")]
fn every_link_restored(partition_world: &PartitionWorld) -> Result<(), StepError> {
    let links = partition_world.links.borrow();
    match links.iter().find(|link| link.is_suspended()) {
        Some(link) => Err(StepError::Assertion(format!(
            "{} is still suspended",
            link_name(link)
        ))),
        None => Ok(()),
    }
}

#[then("the partition surfaces the body failure")]
fn body_failure_surfaced(partition_world: &PartitionWorld) -> Result<(), StepError> {
    match partition_world.outcome.borrow().as_ref() {
        Some(Err(CaseError::Failed(message))) if message == "body gave up" => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected the body failure, got {other:?}"
        ))),
    }
}

#[then("the partition is refused for \"{link}\"")]
fn partition_refused(partition_world: &PartitionWorld, link: String) -> Result<(), StepError> {
    let seen_nothing = partition_world.seen_during_body.borrow().is_empty();
    match partition_world.outcome.borrow().as_ref() {
        Some(Err(CaseError::Partition(PartitionError::CoordinationLink { name })))
            if *name == link && seen_nothing =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected {link} to be refused before the body ran, got {other:?}"
        ))),
    }
}

#[scenario(
    path = "tests/features/partition.feature",
    name = "A global partition isolates transport but keeps the barrier"
)]
fn scenario_global_partition(partition_world: PartitionWorld) {
    let _ = partition_world;
}

#[scenario(
    path = "tests/features/partition.feature",
    name = "A failing body still restores its links"
)]
fn scenario_failing_body(partition_world: PartitionWorld) {
    let _ = partition_world;
}

#[scenario(
    path = "tests/features/partition.feature",
    name = "Naming the coordination link is refused"
)]
fn scenario_coordination_refused(partition_world: PartitionWorld) {
    let _ = partition_world;
}
