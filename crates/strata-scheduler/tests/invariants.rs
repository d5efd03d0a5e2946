//! Protocol invariants: exactly-once replies, memoization, freshness
//! folding, timestamp monotonicity, and diagnostic neutrality.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{compute_view, noop_view, SleepingDriver, TestWarehouse};
use strata_scheduler::config::SchedulerConfig;
use strata_scheduler::error::Result;
use strata_scheduler::messages::Outcome;
use strata_scheduler::runner::FailingDriver;
use strata_scheduler::schema::SchemaService;

#[tokio::test(start_paused = true)]
async fn concurrent_requests_coalesce_into_one_round() -> Result<()> {
    let wh = TestWarehouse::new();
    let b = compute_view("stage.events", "/warehouse/stage/events", &[]);
    wh.driver
        .route(b.id(), Arc::new(SleepingDriver::new(Duration::from_secs(1))));

    // All three requests land before the in-flight transformation finishes;
    // each requester is answered exactly once, from a single execution.
    let (first, second, third) = tokio::join!(
        wh.manager.materialize(&b),
        wh.manager.materialize(&b),
        wh.manager.materialize(&b),
    );
    let first = first?;
    let second = second?;
    let third = third?;

    assert!(first.is_materialized());
    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(wh.driver.executions(b.id()), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn materialized_views_answer_from_memo_until_invalidated() -> Result<()> {
    let wh = TestWarehouse::new();
    let b = compute_view("stage.events", "/warehouse/stage/events", &[]);

    wh.manager.materialize(&b).await?;
    wh.manager.materialize(&b).await?;
    wh.manager.materialize(&b).await?;
    assert_eq!(wh.driver.executions(b.id()), 1);

    wh.manager.invalidate(&b)?;
    let outcome = wh.manager.materialize(&b).await?;
    assert!(outcome.is_materialized());
    assert_eq!(wh.driver.executions(b.id()), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn freshness_folds_the_maximum_dependency_timestamp() -> Result<()> {
    let wh = TestWarehouse::new();
    let d1 = noop_view("raw.d1", "/warehouse/raw/d1");
    let d2 = noop_view("raw.d2", "/warehouse/raw/d2");
    let d3 = noop_view("raw.d3", "/warehouse/raw/d3");
    let c = compute_view("stage.c", "/warehouse/stage/c", &[&d1, &d2, &d3]);

    for (dep, ts) in [(&d1, 100), (&d2, 300), (&d3, 200)] {
        wh.place_marker(dep).await;
        wh.schema.record_transformation_timestamp(dep.id(), ts).unwrap();
    }
    // Newer than two dependencies but older than the freshest one: the
    // round's freshness is the maximum, so this must retransform.
    wh.schema.record_transformation_timestamp(c.id(), 250).unwrap();
    wh.schema.set_view_version(&c).await?;

    let outcome = wh.manager.materialize(&c).await?;
    assert!(outcome.is_materialized());
    assert_eq!(wh.driver.executions(c.id()), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fresher_than_all_dependencies_skips_the_runner() -> Result<()> {
    let wh = TestWarehouse::new();
    let d1 = noop_view("raw.d1", "/warehouse/raw/d1");
    let d2 = noop_view("raw.d2", "/warehouse/raw/d2");
    let c = compute_view("stage.c", "/warehouse/stage/c", &[&d1, &d2]);

    for (dep, ts) in [(&d1, 100), (&d2, 300)] {
        wh.place_marker(dep).await;
        wh.schema.record_transformation_timestamp(dep.id(), ts).unwrap();
    }
    wh.schema.record_transformation_timestamp(c.id(), 350).unwrap();
    wh.schema.set_view_version(&c).await?;

    let outcome = wh.manager.materialize(&c).await?;
    match outcome {
        Outcome::Materialized { transformed_at, .. } => assert_eq!(transformed_at, 350),
        other => panic!("expected materialized, got {other:?}"),
    }
    assert_eq!(wh.driver.executions(c.id()), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transformation_timestamp_never_decreases() -> Result<()> {
    let wh = TestWarehouse::new();
    let b = compute_view("stage.events", "/warehouse/stage/events", &[]);

    let first = match wh.manager.materialize(&b).await? {
        Outcome::Materialized { transformed_at, .. } => transformed_at,
        other => panic!("expected materialized, got {other:?}"),
    };

    wh.manager.invalidate(&b)?;
    let second = match wh.manager.materialize(&b).await? {
        Outcome::Materialized { transformed_at, .. } => transformed_at,
        other => panic!("expected materialized, got {other:?}"),
    };

    assert!(second >= first);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_memoize_the_failure() -> Result<()> {
    let config = SchedulerConfig {
        max_retries: 1,
        ..SchedulerConfig::default()
    };
    let wh = TestWarehouse::with_config(config);
    let b = compute_view("stage.events", "/warehouse/stage/events", &[]);
    wh.driver
        .route(b.id(), Arc::new(FailingDriver::new("disk on fire")));

    let outcome = wh.manager.materialize(&b).await?;
    assert_eq!(outcome, Outcome::Failed { view: b.id() });
    // max_retries = 1 admits retries 1 and 2 after the initial attempt.
    let attempts = wh.driver.executions(b.id());
    assert_eq!(attempts, 3);

    // Subsequent requests answer immediately without new attempts.
    let again = wh.manager.materialize(&b).await?;
    assert_eq!(again, Outcome::Failed { view: b.id() });
    assert_eq!(wh.driver.executions(b.id()), attempts);

    let report = wh.manager.status(&b).await?;
    assert_eq!(report.state, "failed");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn invalidate_recovers_a_failed_view() -> Result<()> {
    let config = SchedulerConfig {
        max_retries: 0,
        ..SchedulerConfig::default()
    };
    let wh = TestWarehouse::with_config(config);
    let b = compute_view("stage.events", "/warehouse/stage/events", &[]);
    wh.driver
        .route(b.id(), Arc::new(FailingDriver::new("disk on fire")));

    let outcome = wh.manager.materialize(&b).await?;
    assert_eq!(outcome, Outcome::Failed { view: b.id() });

    // Clear the routed failure and reset the coordinator.
    wh.driver
        .route(b.id(), Arc::new(strata_scheduler::runner::SucceedingDriver::new()));
    wh.manager.invalidate(&b)?;

    let outcome = wh.manager.materialize(&b).await?;
    assert!(outcome.is_materialized());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn status_is_diagnostic_only() -> Result<()> {
    let wh = TestWarehouse::new();
    let b = compute_view("stage.events", "/warehouse/stage/events", &[]);

    let before = wh.manager.status(&b).await?;
    assert_eq!(before.state, "initial");
    assert_eq!(wh.driver.executions(b.id()), 0);

    wh.manager.materialize(&b).await?;

    let after = wh.manager.status(&b).await?;
    assert_eq!(after.state, "materialized");
    assert_eq!(after.name, "stage.events");

    // Asking again changes nothing.
    let again = wh.manager.status(&b).await?;
    assert_eq!(again.state, "materialized");
    assert_eq!(wh.driver.executions(b.id()), 1);
    Ok(())
}
