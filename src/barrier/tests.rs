//! Unit tests for the barrier client against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};

use super::*;

const POLL: Duration = Duration::from_millis(5);

#[fixture]
fn run() -> RunId {
    RunId::new("run-under-test").expect("run id")
}

fn client(
    store: &MemoryBarrier,
    run: &RunId,
    participant: usize,
    actors: usize,
) -> BarrierClient<MemoryBarrier> {
    BarrierClient::new(store.clone(), run.clone(), participant, actors)
        .expect("participant should be in range")
        .with_poll_interval(POLL)
}

#[rstest]
#[tokio::test]
async fn vote_replaces_previous_vote(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 1, 2);
    let sync_id = SyncId::from("point");

    actor.vote(&sync_id, json!(1)).await.expect("vote");
    actor.vote(&sync_id, json!(2)).await.expect("vote");

    let votes = actor.votes(&sync_id).await.expect("votes");
    assert_eq!(votes.len(), 1);
    assert_eq!(votes.get(&1), Some(&json!(2)));
}

#[rstest]
#[tokio::test]
async fn explicit_null_vote_is_distinct_from_no_vote(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 0, 2);
    let sync_id = SyncId::from("nulls");

    actor.vote(&sync_id, Value::Null).await.expect("vote");

    let votes = actor.votes(&sync_id).await.expect("votes");
    assert_eq!(votes.get(&0), Some(&Value::Null));
    assert!(!votes.contains_key(&1));
}

#[rstest]
#[tokio::test]
async fn abstaining_vote_fn_submits_nothing(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 0, 2);
    let sync_id = SyncId::from("abstain");
    let polls = AtomicUsize::new(0);

    let err = actor
        .wait(
            &sync_id,
            |_| {
                polls.fetch_add(1, Ordering::SeqCst);
                false
            },
            || None,
            Some(Duration::from_millis(30)),
        )
        .await
        .expect_err("validator never holds");

    assert!(
        matches!(err, BarrierError::Timeout { last_error: None, .. }),
        "got {err:?}"
    );
    assert!(polls.load(Ordering::SeqCst) >= 2, "wait should keep polling");
    assert!(actor.votes(&sync_id).await.expect("votes").is_empty());
}

#[rstest]
#[tokio::test]
async fn validator_sees_own_vote_on_first_poll(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 1, 3);

    let votes = actor
        .wait(
            &SyncId::from("self"),
            |votes| votes.get(&1) == Some(&json!("ready")),
            || Some(json!("ready")),
            Some(Duration::from_secs(1)),
        )
        .await
        .expect("own vote satisfies validator");
    assert_eq!(votes.len(), 1);
}

#[rstest]
#[tokio::test]
async fn sync_releases_every_actor_once_all_arrived(run: RunId) {
    let store = MemoryBarrier::new();
    let sync_id = SyncId::from("checkpoint");
    let released = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for participant in 0..3 {
        let actor = client(&store, &run, participant, 3);
        let point = sync_id.clone();
        let counter = Arc::clone(&released);
        handles.push(tokio::spawn(async move {
            sleep(Duration::from_millis(10 * u64::try_from(participant).unwrap_or(0))).await;
            actor
                .sync(&point, None, Some(Duration::from_secs(5)))
                .await?;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BarrierError>(())
        }));
    }

    for handle in handles {
        handle.await.expect("task should not panic").expect("sync");
    }
    assert_eq!(released.load(Ordering::SeqCst), 3);
}

#[rstest]
#[tokio::test]
async fn sync_never_returns_before_the_last_participant_votes(run: RunId) {
    let store = MemoryBarrier::new();
    let sync_id = SyncId::from("gate");
    let early = client(&store, &run, 0, 2);
    let late = client(&store, &run, 1, 2);

    let waiter = tokio::spawn({
        let point = sync_id.clone();
        async move { early.sync(&point, None, Some(Duration::from_secs(5))).await }
    });

    sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "sync returned before every actor voted");

    late.sync(&sync_id, None, Some(Duration::from_secs(5)))
        .await
        .expect("late actor sync");
    timeout(Duration::from_secs(1), waiter)
        .await
        .expect("early actor released within a few polls")
        .expect("task should not panic")
        .expect("early actor sync");
}

#[rstest]
#[tokio::test]
async fn sync_over_subset_ignores_absent_actors(run: RunId) {
    let store = MemoryBarrier::new();
    let sync_id = SyncId::from("pair");
    let subset = [0, 2];

    let first = client(&store, &run, 0, 4);
    let second = client(&store, &run, 2, 4);
    let waiter = tokio::spawn({
        let point = sync_id.clone();
        async move {
            first
                .sync(&point, Some(&subset), Some(Duration::from_secs(5)))
                .await
        }
    });
    second
        .sync(&sync_id, Some(&subset), Some(Duration::from_secs(5)))
        .await
        .expect("subset sync");
    waiter
        .await
        .expect("task should not panic")
        .expect("subset sync");

    let votes = second.votes(&sync_id).await.expect("votes");
    assert_eq!(votes.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
}

#[rstest]
#[tokio::test]
async fn bystander_waits_without_voting(run: RunId) {
    let store = MemoryBarrier::new();
    let sync_id = SyncId::from("watch");
    let bystander = client(&store, &run, 3, 4);
    let voter = client(&store, &run, 1, 4);

    voter
        .sync(&sync_id, Some(&[1]), Some(Duration::from_secs(1)))
        .await
        .expect("voter sync");
    bystander
        .sync(&sync_id, Some(&[1]), Some(Duration::from_secs(1)))
        .await
        .expect("late bystander sees existing votes");

    let votes = voter.votes(&sync_id).await.expect("votes");
    assert!(!votes.contains_key(&3));
}

#[rstest]
#[tokio::test]
async fn sync_rejects_participants_outside_the_run(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 0, 2);
    let err = actor
        .sync(&SyncId::from("bad"), Some(&[0, 5]), None)
        .await
        .expect_err("participant 5 does not exist");
    assert_eq!(
        err,
        BarrierError::UnknownParticipant {
            participant: 5,
            actor_count: 2
        }
    );
}

#[rstest]
#[tokio::test]
async fn transient_outage_is_retried_until_service_returns(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 0, 1);
    store.set_reachable(false);

    let restore = tokio::spawn({
        let flaky = store.clone();
        async move {
            sleep(Duration::from_millis(30)).await;
            flaky.set_reachable(true);
        }
    });

    actor
        .sync(&SyncId::from("outage"), None, Some(Duration::from_secs(5)))
        .await
        .expect("sync should recover once the service is back");
    restore.await.expect("restore task");
}

#[rstest]
#[tokio::test]
async fn outage_past_deadline_reports_last_transport_error(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 0, 1);
    store.set_reachable(false);

    let err = actor
        .sync(&SyncId::from("down"), None, Some(Duration::from_millis(25)))
        .await
        .expect_err("service never returns");
    let BarrierError::Timeout {
        ref sync_id,
        last_error: Some(ref message),
        ..
    } = err
    else {
        panic!("expected timeout carrying the transport error, got {err:?}");
    };
    assert_eq!(sync_id.as_str(), "down");
    assert!(message.contains("connection refused"), "message: {message}");
    assert!(err.to_string().contains("last error"), "display: {err}");
}

/// Transport whose fetches hang far longer than any test deadline.
struct StalledTransport;

impl BarrierTransport for StalledTransport {
    fn submit_vote<'a>(
        &'a self,
        _run: &'a RunId,
        _sync_id: &'a SyncId,
        _participant: ParticipantId,
        _value: &'a Value,
    ) -> BarrierFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn fetch_votes<'a>(
        &'a self,
        _run: &'a RunId,
        _sync_id: &'a SyncId,
    ) -> BarrierFuture<'a, Votes> {
        Box::pin(async {
            sleep(Duration::from_secs(30)).await;
            Ok(Votes::new())
        })
    }

    fn teardown<'a>(&'a self, _run: &'a RunId) -> BarrierFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[rstest]
#[tokio::test]
async fn stalled_poll_is_cut_at_the_deadline(run: RunId) {
    let actor = BarrierClient::new(StalledTransport, run, 0, 1)
        .expect("participant in range")
        .with_poll_interval(POLL);

    let err = timeout(
        Duration::from_secs(2),
        actor.sync(&SyncId::from("stalled"), None, Some(Duration::from_millis(50))),
    )
    .await
    .expect("wait should honour its own deadline")
    .expect_err("fetch never answers");
    assert!(
        matches!(err, BarrierError::Timeout { last_error: Some(_), .. }),
        "got {err:?}"
    );
}

#[rstest]
#[tokio::test]
async fn default_timeout_applies_when_wait_passes_none(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 0, 2).with_default_timeout(Some(Duration::from_millis(20)));
    let err = actor
        .sync(&SyncId::from("lonely"), None, None)
        .await
        .expect_err("actor 1 never arrives");
    assert!(matches!(err, BarrierError::Timeout { .. }), "got {err:?}");
}

#[rstest]
#[tokio::test]
async fn teardown_clears_sync_points(run: RunId) {
    let store = MemoryBarrier::new();
    let actor = client(&store, &run, 0, 1);
    let sync_id = SyncId::from("gone");
    actor.vote(&sync_id, json!("x")).await.expect("vote");

    actor.teardown().await.expect("teardown");
    assert!(actor.votes(&sync_id).await.expect("votes").is_empty());
}

#[rstest]
#[case(2, 2)]
#[case(7, 3)]
fn client_rejects_out_of_range_participant(#[case] participant: usize, #[case] actors: usize) {
    let err = BarrierClient::new(MemoryBarrier::new(), run(), participant, actors)
        .expect_err("participant out of range");
    assert!(matches!(err, BarrierError::UnknownParticipant { .. }));
}

#[test]
fn run_id_rejects_blank_values() {
    assert_eq!(RunId::new("  "), Err(BarrierError::InvalidRunId));
    assert_eq!(RunId::new(" r1 ").map(|run| run.to_string()), Ok(String::from("r1")));
}

#[test]
fn numeric_sync_ids_render_as_decimal() {
    assert_eq!(SyncId::from(42_u32).as_str(), "42");
}
