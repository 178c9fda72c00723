// tests/variables.rs

use std::error::Error;
use std::sync::Arc;

use planrun::engine::{RunOutcome, Scheduler, SchedulerOptions, StaticSource};
use planrun::exec::ConsoleSource;
use planrun::state::{MemorySink, StateStore};
use planrun::types::Status;
use planrun_test_utils::builders::{ActionBuilder, PlanBuilder};
use planrun_test_utils::console::ScriptedConsole;
use planrun_test_utils::fake_executor::FakeExecutor;
use planrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn set_action_value_reaches_later_actions() -> TestResult {
    init_tracing();
    let plan = PlanBuilder::new()
        .variable("target")
        .with_action(ActionBuilder::set("pick", "target", "staging"))
        .with_action(ActionBuilder::command("deploy", "deploy --to ${target}").after("pick"))
        .build();
    let fake = FakeExecutor::new().assigning("pick", "target", "prod");
    let store = StateStore::fresh(&plan, Box::new(MemorySink::new()));

    let mut scheduler = Scheduler::new(
        &plan,
        store,
        Arc::new(fake.clone()),
        StaticSource::new(),
        SchedulerOptions::default(),
    );
    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    let seen = fake.variables_for("deploy").unwrap();
    assert_eq!(seen.get("target").map(String::as_str), Some("prod"));
    assert!(scheduler.variables().source().asked().is_empty());
    assert_eq!(
        scheduler.variables().get("target").unwrap().provenance.to_string(),
        "action:pick"
    );
    Ok(())
}

#[tokio::test]
async fn unresolvable_variable_fails_only_that_branch() -> TestResult {
    let plan = PlanBuilder::new()
        .variable("host")
        .with_action(ActionBuilder::command("restart", "restart ${host}"))
        .with_action(ActionBuilder::command("verify", "true").after("restart"))
        .command("unrelated", &[])
        .build();
    let fake = FakeExecutor::new();
    let store = StateStore::fresh(&plan, Box::new(MemorySink::new()));

    let mut scheduler = Scheduler::new(
        &plan,
        store,
        Arc::new(fake.clone()),
        StaticSource::new(),
        SchedulerOptions::default(),
    );
    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.outcome, RunOutcome::Stalled);
    let store = scheduler.into_store();
    assert_eq!(store.status_of("restart"), Some(Status::Failed));
    assert_eq!(store.status_of("verify"), Some(Status::Blocked));
    assert_eq!(store.status_of("unrelated"), Some(Status::Succeeded));
    assert_eq!(fake.count("restart"), 0);

    let summary = store.state().record("restart").unwrap().summary.clone().unwrap();
    assert!(summary.contains("'host'"), "summary: {summary}");
    Ok(())
}

#[tokio::test]
async fn unresolvable_variable_is_asked_for_once_per_run() -> TestResult {
    let plan = PlanBuilder::new()
        .variable("host")
        .with_action(ActionBuilder::command("drain", "drain ${host}"))
        .with_action(ActionBuilder::command("flush", "flush ${host}"))
        .build();
    let fake = FakeExecutor::new();
    let store = StateStore::fresh(&plan, Box::new(MemorySink::new()));

    let mut scheduler = Scheduler::new(
        &plan,
        store,
        Arc::new(fake.clone()),
        StaticSource::new(),
        SchedulerOptions::default(),
    );
    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.outcome, RunOutcome::Stalled);
    assert_eq!(scheduler.variables().source().asked(), &["host".to_string()]);
    assert_eq!(fake.calls(), 0);

    let store = scheduler.into_store();
    for id in ["drain", "flush"] {
        assert_eq!(store.status_of(id), Some(Status::Failed));
        let summary = store.state().record(id).unwrap().summary.clone().unwrap();
        assert!(summary.contains("input is disabled"), "summary: {summary}");
    }
    Ok(())
}

#[tokio::test]
async fn declared_value_and_cli_preset_skip_the_source() -> TestResult {
    let plan = PlanBuilder::new()
        .variable_with_value("region", "eu-west-1")
        .variable("user")
        .with_action(ActionBuilder::command("login", "ssh ${user}@bastion.${region}"))
        .build();
    let fake = FakeExecutor::new();
    let store = StateStore::fresh(&plan, Box::new(MemorySink::new()));

    let mut scheduler = Scheduler::new(
        &plan,
        store,
        Arc::new(fake.clone()),
        StaticSource::new().with("user", "from-source"),
        SchedulerOptions::default(),
    );
    scheduler.preset_variable("user", "ops");
    with_timeout(scheduler.run()).await?;

    let seen = fake.variables_for("login").unwrap();
    assert_eq!(seen["user"], "ops");
    assert_eq!(seen["region"], "eu-west-1");
    assert!(scheduler.variables().source().asked().is_empty());
    Ok(())
}

#[tokio::test]
async fn console_answers_are_asked_once_and_shared() -> TestResult {
    let plan = PlanBuilder::new()
        .variable("host")
        .with_action(ActionBuilder::command("stop", "systemctl -H ${host} stop app"))
        .with_action(ActionBuilder::command("start", "systemctl -H ${host} start app").after("stop"))
        .build();

    let console = ScriptedConsole::new(["  db7  "]);
    let fake = FakeExecutor::new();
    let store = StateStore::fresh(&plan, Box::new(MemorySink::new()));

    let mut scheduler = Scheduler::new(
        &plan,
        store,
        Arc::new(fake.clone()),
        ConsoleSource::new(Arc::new(console.clone())),
        SchedulerOptions::default(),
    );
    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(console.questions(), vec!["Provide a value for host "]);
    assert_eq!(fake.variables_for("start").unwrap()["host"], "db7");
    Ok(())
}

#[tokio::test]
async fn persisted_variables_are_reused_on_resume() -> TestResult {
    let plan = PlanBuilder::new()
        .persist_variables()
        .variable("host")
        .with_action(ActionBuilder::command("stop", "stop ${host}"))
        .with_action(ActionBuilder::command("start", "start ${host}").after("stop"))
        .build();

    let sink = MemorySink::new();
    let first = FakeExecutor::new().failing("start");
    let mut scheduler = Scheduler::new(
        &plan,
        StateStore::fresh(&plan, Box::new(sink.clone())),
        Arc::new(first),
        StaticSource::new().with("host", "db1"),
        SchedulerOptions::default(),
    );
    with_timeout(scheduler.run()).await?;

    let snapshot = sink.last().unwrap();
    let stored = &snapshot.variables["host"];
    assert_eq!(stored.value, "db1");
    assert_eq!(stored.provenance, "source:static");

    let second = FakeExecutor::new();
    let store = StateStore::load(&plan, snapshot, Box::new(MemorySink::new()))?;
    let mut options = SchedulerOptions::from_settings(plan.settings());
    options.retry_failed = true;
    let mut scheduler = Scheduler::new(&plan, store, Arc::new(second.clone()), StaticSource::new(), options);
    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(second.variables_for("start").unwrap()["host"], "db1");
    assert!(scheduler.variables().source().asked().is_empty());
    Ok(())
}

#[tokio::test]
async fn variables_stay_out_of_the_snapshot_unless_persisted() -> TestResult {
    let plan = PlanBuilder::new()
        .variable("host")
        .with_action(ActionBuilder::command("ping", "ping ${host}"))
        .build();

    let sink = MemorySink::new();
    let mut scheduler = Scheduler::new(
        &plan,
        StateStore::fresh(&plan, Box::new(sink.clone())),
        Arc::new(FakeExecutor::new()),
        StaticSource::new().with("host", "db1"),
        SchedulerOptions::default(),
    );
    with_timeout(scheduler.run()).await?;

    let snapshot = sink.last().unwrap();
    assert!(snapshot.variables.is_empty());
    assert!(!snapshot.to_json()?.contains("db1"));
    Ok(())
}
