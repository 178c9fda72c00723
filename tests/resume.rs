// tests/resume.rs

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use planrun::engine::{RunOutcome, RunReport, Scheduler, SchedulerOptions, StaticSource};
use planrun::errors::PlanrunError;
use planrun::plan::Plan;
use planrun::state::{ActionRecord, FileSink, Snapshot, StateStore};
use planrun::types::Status;
use planrun_test_utils::builders::PlanBuilder;
use planrun_test_utils::fake_executor::FakeExecutor;
use planrun_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

async fn drive(store: StateStore, plan: &Plan, fake: &FakeExecutor, retry_failed: bool) -> (RunReport, StateStore) {
    let mut options = SchedulerOptions::from_settings(plan.settings());
    options.retry_failed = retry_failed;
    let mut scheduler = Scheduler::new(plan, store, Arc::new(fake.clone()), StaticSource::new(), options);
    let report = with_timeout(scheduler.run()).await.expect("run failed");
    (report, scheduler.into_store())
}

async fn fresh_run(plan: &Plan, path: &Path, fake: &FakeExecutor) -> (RunReport, StateStore) {
    let store = StateStore::fresh(plan, Box::new(FileSink::new(path)));
    drive(store, plan, fake, false).await
}

async fn resume_run(
    plan: &Plan,
    path: &Path,
    fake: &FakeExecutor,
    retry_failed: bool,
) -> Result<(RunReport, StateStore), PlanrunError> {
    let snapshot = Snapshot::read_from(path)?;
    let store = StateStore::load(plan, snapshot, Box::new(FileSink::new(path)))?;
    Ok(drive(store, plan, fake, retry_failed).await)
}

fn write_snapshot(path: &Path, statuses: &[(&str, Status)]) {
    let mut snapshot = Snapshot::empty();
    for (id, status) in statuses {
        let mut record = ActionRecord::pending();
        record.status = *status;
        snapshot.actions.insert(id.to_string(), record);
    }
    fs::write(path, snapshot.to_json().unwrap()).unwrap();
}

#[tokio::test]
async fn resuming_a_finished_run_executes_nothing() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();

    fresh_run(&plan, &path, &FakeExecutor::new()).await;

    let fake = FakeExecutor::new();
    let (report, store) = resume_run(&plan, &path, &fake, false).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(fake.calls(), 0);
    assert!(store.state().all_succeeded());
    Ok(())
}

#[tokio::test]
async fn running_action_is_reset_and_dispatched_again() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();
    write_snapshot(
        &path,
        &[
            ("A", Status::Succeeded),
            ("B", Status::Running),
            ("C", Status::Succeeded),
            ("D", Status::Pending),
        ],
    );

    let fake = FakeExecutor::new();
    let (report, store) = resume_run(&plan, &path, &fake, false).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(fake.executed(), vec!["B", "D"]);
    assert_eq!(report.interrupted, vec!["B".to_string()]);

    let entry = store
        .audit()
        .iter()
        .find(|e| e.action == "B")
        .expect("audit entry for B");
    assert_eq!(entry.from, Status::Running);
    assert_eq!(entry.to, Status::Pending);

    let saved = Snapshot::read_from(&path)?;
    assert!(saved.audit.iter().any(|e| e.action == "B"));
    Ok(())
}

#[tokio::test]
async fn resume_is_idempotent_on_disk() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();

    fresh_run(&plan, &path, &FakeExecutor::new()).await;
    let original = fs::read(&path)?;

    resume_run(&plan, &path, &FakeExecutor::new(), false).await?;
    let first = fs::read(&path)?;
    resume_run(&plan, &path, &FakeExecutor::new(), false).await?;
    let second = fs::read(&path)?;

    assert_eq!(first, second);
    assert_eq!(original, first);
    Ok(())
}

#[tokio::test]
async fn snapshot_with_unknown_action_is_rejected() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();
    write_snapshot(
        &path,
        &[
            ("A", Status::Succeeded),
            ("B", Status::Pending),
            ("C", Status::Pending),
            ("D", Status::Pending),
            ("E", Status::Pending),
        ],
    );

    let fake = FakeExecutor::new();
    match resume_run(&plan, &path, &fake, false).await {
        Err(PlanrunError::StateCorruption(msg)) => assert!(msg.contains("'E'"), "msg: {msg}"),
        other => panic!("expected StateCorruption, got {:?}", other.map(|(r, _)| r)),
    }
    assert_eq!(fake.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn snapshot_missing_an_action_is_rejected() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();
    write_snapshot(
        &path,
        &[("A", Status::Succeeded), ("B", Status::Pending), ("C", Status::Pending)],
    );

    match resume_run(&plan, &path, &FakeExecutor::new(), false).await {
        Err(PlanrunError::StateCorruption(msg)) => assert!(msg.contains("'D'"), "msg: {msg}"),
        other => panic!("expected StateCorruption, got {:?}", other.map(|(r, _)| r)),
    }
    Ok(())
}

#[tokio::test]
async fn unreadable_snapshot_is_rejected() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    fs::write(&path, "{ not json")?;
    let plan = PlanBuilder::diamond().build();

    match resume_run(&plan, &path, &FakeExecutor::new(), false).await {
        Err(PlanrunError::StateCorruption(msg)) => {
            assert!(msg.contains("state.json"), "msg: {msg}")
        }
        other => panic!("expected StateCorruption, got {:?}", other.map(|(r, _)| r)),
    }
    Ok(())
}

#[tokio::test]
async fn reset_with_cascade_lets_the_run_complete() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();

    let (report, _) = fresh_run(&plan, &path, &FakeExecutor::new().failing("B")).await;
    assert_eq!(report.outcome, RunOutcome::Stalled);

    {
        let snapshot = Snapshot::read_from(&path)?;
        let mut store = StateStore::load(&plan, snapshot, Box::new(FileSink::new(&path)))?;
        let reset = store.reset(&plan, "B", true, Some("fixed the disk"))?;
        assert_eq!(reset, vec!["B".to_string(), "D".to_string()]);
    }

    let fake = FakeExecutor::new();
    let (report, store) = resume_run(&plan, &path, &fake, false).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(fake.executed(), vec!["B", "D"]);
    assert!(
        store
            .audit()
            .iter()
            .any(|e| e.note.as_deref() == Some("fixed the disk"))
    );
    Ok(())
}

#[tokio::test]
async fn retry_failed_reruns_failed_and_blocked_actions() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();

    fresh_run(&plan, &path, &FakeExecutor::new().failing("C")).await;

    let fake = FakeExecutor::new();
    let (report, _) = resume_run(&plan, &path, &fake, true).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(fake.executed(), vec!["C", "D"]);
    Ok(())
}

#[tokio::test]
async fn resuming_a_stalled_run_without_changes_stays_stalled() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();

    fresh_run(&plan, &path, &FakeExecutor::new().failing("A")).await;

    let fake = FakeExecutor::new();
    let (report, store) = resume_run(&plan, &path, &fake, false).await?;

    assert_eq!(report.outcome, RunOutcome::Stalled);
    assert_eq!(fake.calls(), 0);
    assert_eq!(store.status_of("A"), Some(Status::Failed));
    assert_eq!(store.status_of("D"), Some(Status::Blocked));
    Ok(())
}

#[tokio::test]
async fn mark_done_plus_resets_lets_the_run_complete() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();

    fresh_run(&plan, &path, &FakeExecutor::new().failing("A")).await;

    {
        let snapshot = Snapshot::read_from(&path)?;
        let mut store = StateStore::load(&plan, snapshot, Box::new(FileSink::new(&path)))?;
        store.mark_succeeded("A", Some("done by hand"))?;
        store.reset(&plan, "B", false, None)?;
        store.reset(&plan, "C", false, None)?;
        store.reset(&plan, "D", false, None)?;
    }

    let fake = FakeExecutor::new();
    let (report, _) = resume_run(&plan, &path, &fake, false).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(fake.count("A"), 0);
    assert_eq!(fake.calls(), 3);
    assert_eq!(fake.executed().last().map(String::as_str), Some("D"));
    Ok(())
}

#[tokio::test]
async fn reset_refuses_actions_that_are_not_obstructed() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("state.json");
    let plan = PlanBuilder::diamond().build();

    fresh_run(&plan, &path, &FakeExecutor::new()).await;

    let snapshot = Snapshot::read_from(&path)?;
    let mut store = StateStore::load(&plan, snapshot, Box::new(FileSink::new(&path)))?;
    match store.reset(&plan, "A", false, None) {
        Err(PlanrunError::InvalidReset { action, status }) => {
            assert_eq!(action, "A");
            assert_eq!(status, Status::Succeeded);
        }
        other => panic!("expected InvalidReset, got {other:?}"),
    }
    Ok(())
}
