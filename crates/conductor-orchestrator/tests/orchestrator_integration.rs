//! End-to-end orchestration tests.
//!
//! Drives the full goal → plan → dispatch pipeline with the scripted
//! reasoning provider and the builtin agent pool.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use conductor_agents::{AgentFactory, AgentManager};
use conductor_bus::MessageBus;
use conductor_core::{AgentKind, MessageKind, TaskStatus};
use conductor_orchestrator::*;
use conductor_planner::{PlanBuilder, ScriptedProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn agent_pool() -> Arc<AgentManager> {
    let manager = AgentManager::new(Arc::new(MessageBus::new()), AgentFactory::with_builtins());
    for kind in [
        AgentKind::Captain,
        AgentKind::Research,
        AgentKind::File,
        AgentKind::Network,
    ] {
        manager.spawn(kind, "").unwrap();
    }
    Arc::new(manager)
}

fn orchestrator(provider: ScriptedProvider) -> Orchestrator {
    let planner = Arc::new(PlanBuilder::new(Arc::new(provider)));
    Orchestrator::new(planner, agent_pool())
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_security_analysis_completes() {
    let orch = orchestrator(ScriptedProvider::new());
    let started = orch.start_task("security analysis").unwrap();
    assert_eq!(started.status, ExecutionStatus::Queued);
    assert_eq!(started.goal, "security analysis");

    let done = orch.wait_for_terminal(&started.id, WAIT).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed, "{:?}", done.error);
    assert!(done.end_time.is_some());
    assert!(done.end_time.unwrap() >= done.start_time);

    let plan = done.plan.as_ref().unwrap();
    assert_eq!(plan.goal, "security analysis");
    assert_eq!(plan.task_ids(), vec!["analyze", "check-network", "report"]);
    assert!(plan.tasks.iter().all(|t| t.status == TaskStatus::Completed));

    let order: Vec<_> = done.results.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(order, vec!["analyze", "check-network", "report"]);
    assert!(done.results.iter().all(|r| r.status == TaskStatus::Completed));
    assert_eq!(done.results[0].agent_id, "research-1");
    assert_eq!(done.results[1].agent_id, "network-1");
    assert_eq!(done.results[2].agent_id, "captain-1");

    // The captain's report saw the result messages of the earlier subtasks.
    let reports = done.results[2].output["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);

    let log = orch.get_all_messages();
    let commands = log
        .iter()
        .filter(|l| l.message.kind == MessageKind::Command)
        .count();
    let results = log
        .iter()
        .filter(|l| l.message.kind == MessageKind::Result)
        .count();
    assert_eq!(commands, 2);
    assert_eq!(results, 2);
    assert_eq!(orch.search_messages("check-network completed").len(), 1);
    assert!(!orch.get_history("network-1").is_empty());
}

#[tokio::test]
async fn test_captain_reports_cover_only_their_execution() {
    let orch = orchestrator(ScriptedProvider::new());
    for _ in 0..3 {
        let id = orch.start_task("security analysis").unwrap().id;
        let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed, "{:?}", done.error);

        let report = done.results.iter().find(|r| r.task_id == "report").unwrap();
        let reports = report.output["reports"].as_array().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(report.output["messages"], 2);
    }
}

#[tokio::test]
async fn test_file_goal_uses_file_agent() {
    let orch = orchestrator(ScriptedProvider::new());
    let id = orch.start_task("summarize the config files").unwrap().id;
    let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();

    assert_eq!(done.status, ExecutionStatus::Completed, "{:?}", done.error);
    let inspect = done
        .results
        .iter()
        .find(|r| r.task_id == "inspect-files")
        .unwrap();
    assert_eq!(inspect.agent_id, "file-1");
    assert!(inspect.output["entries"].is_array());
}

// ---------------------------------------------------------------------------
// Planning failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cyclic_plan_fails_execution() {
    let cyclic = r#"{"tasks": [
        {"id": "A", "type": "execution", "description": "a", "dependencies": ["B"]},
        {"id": "B", "type": "execution", "description": "b", "dependencies": ["A"]}
    ]}"#;
    let orch = orchestrator(ScriptedProvider::with_responses([cyclic]));
    let id = orch.start_task("circular goal").unwrap().id;
    let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();

    assert_eq!(done.status, ExecutionStatus::Failed);
    assert!(done.results.is_empty());
    let error = done.error.unwrap();
    assert!(error.starts_with("planning failed"), "{error}");
    assert!(error.contains("circular dependency"), "{error}");
}

#[tokio::test]
async fn test_provider_failure_fails_execution() {
    let orch = orchestrator(ScriptedProvider::failing("model unavailable"));
    let id = orch.start_task("anything").unwrap().id;
    let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();

    assert_eq!(done.status, ExecutionStatus::Failed);
    assert!(done.error.unwrap().contains("model unavailable"));
    assert!(done.plan.is_none());
}

#[tokio::test]
async fn test_empty_goal_fails_at_planning() {
    let orch = orchestrator(ScriptedProvider::new());
    let id = orch.start_task("   ").unwrap().id;
    let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Failed);
    assert!(done.error.unwrap().starts_with("planning failed"));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancel_is_not_repeatable() {
    let slow = ScriptedProvider::new().with_delay(Duration::from_secs(30));
    let orch = orchestrator(slow);
    let id = orch.start_task("security analysis").unwrap().id;

    orch.cancel_task(&id).unwrap();
    let cancelled = orch.wait_for_terminal(&id, WAIT).await.unwrap();
    assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
    assert!(cancelled.end_time.is_some());

    let err = orch.cancel_task(&id).unwrap_err();
    assert!(err.to_string().contains("cannot cancel"));
}

#[tokio::test]
async fn test_cancel_completed_task_is_rejected() {
    let orch = orchestrator(ScriptedProvider::new());
    let id = orch.start_task("research history").unwrap().id;
    let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed);

    assert!(orch.cancel_task(&id).is_err());
    assert_eq!(orch.get_task(&id).unwrap().status, ExecutionStatus::Completed);
    assert_eq!(orch.get_task(&id).unwrap().end_time, done.end_time);
}

#[tokio::test]
async fn test_parent_token_cancels_execution() {
    let slow = ScriptedProvider::new().with_delay(Duration::from_secs(30));
    let orch = orchestrator(slow);
    let parent = CancellationToken::new();
    let id = orch.start_task_with_token("scan hosts", &parent).unwrap().id;

    parent.cancel();
    let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Cancelled);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_snapshots_are_isolated() {
    let orch = orchestrator(ScriptedProvider::new());
    let id = orch.start_task("security analysis").unwrap().id;
    orch.wait_for_terminal(&id, WAIT).await.unwrap();

    let mut copy = orch.get_task(&id).unwrap();
    copy.status = ExecutionStatus::Failed;
    copy.results.clear();
    copy.goal.push_str(" (edited)");

    let fresh = orch.get_task(&id).unwrap();
    assert_eq!(fresh.status, ExecutionStatus::Completed);
    assert_eq!(fresh.results.len(), 3);
    assert_eq!(fresh.goal, "security analysis");
}

#[tokio::test]
async fn test_list_filters() {
    let orch = orchestrator(ScriptedProvider::new());
    let mut ids = Vec::new();
    for goal in ["first goal", "second goal", "third goal"] {
        ids.push(orch.start_task(goal).unwrap().id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for id in &ids {
        orch.wait_for_terminal(id, WAIT).await.unwrap();
    }
    let failing = orch.start_task("   ").unwrap().id;
    orch.wait_for_terminal(&failing, WAIT).await.unwrap();

    let all = orch.list_tasks(&TaskFilter::new());
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|w| w[0].start_time >= w[1].start_time));

    let completed = orch.list_tasks(&TaskFilter::new().with_status(ExecutionStatus::Completed));
    assert_eq!(completed.len(), 3);
    let failed = orch.list_tasks(&TaskFilter::new().with_status(ExecutionStatus::Failed));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, failing);

    let page = orch.list_tasks(&TaskFilter::new().offset(1).limit(2));
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, all[1].id);

    assert!(orch
        .list_tasks(&TaskFilter::new().offset(10))
        .is_empty());

    let stats = orch.task_stats();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_unknown_task() {
    let orch = orchestrator(ScriptedProvider::new());
    assert!(orch.get_task(&Uuid::new_v4()).unwrap_err().is_not_found());
}

// ---------------------------------------------------------------------------
// Concurrency and shutdown
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts() {
    let orch = Arc::new(orchestrator(ScriptedProvider::new()));
    let mut handles = Vec::new();
    for i in 0..10 {
        let orch = Arc::clone(&orch);
        handles.push(tokio::spawn(async move {
            orch.start_task(&format!("network check {i}")).unwrap().id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);

    for id in &ids {
        let done = orch.wait_for_terminal(id, WAIT).await.unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed, "{:?}", done.error);
    }
    assert_eq!(orch.task_stats().completed, 10);
    assert!(orch.agent_stats().tasks_executed >= 30);
}

#[tokio::test]
async fn test_shutdown_stops_everything() {
    let slow = ScriptedProvider::new().with_delay(Duration::from_secs(30));
    let orch = orchestrator(slow);
    let id = orch.start_task("security analysis").unwrap().id;

    orch.shutdown().await;
    assert!(orch.tasks().is_closed());
    assert!(orch.list_agents().is_empty());
    assert_eq!(orch.bus().agent_count(), 0);
    assert!(matches!(
        orch.start_task("late"),
        Err(conductor_core::ConductorError::Closed)
    ));

    let done = orch.wait_for_terminal(&id, WAIT).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Cancelled);
}
