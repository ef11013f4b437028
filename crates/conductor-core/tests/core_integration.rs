#![allow(clippy::unwrap_used, clippy::expect_used)]

use conductor_core::*;
use std::time::Duration;

// ---------------------------------------------------------------------------
// 1. Plan JSON roundtrip keeps the dependency graph intact
// ---------------------------------------------------------------------------

#[test]
fn plan_serialization_roundtrip() {
    let mut plan = ExecutionPlan::new(
        "security analysis",
        vec![
            Task::new("recon", "analysis", "Enumerate hosts"),
            Task::new("scan", "execution", "Scan ports")
                .with_dependencies(["recon"])
                .with_priority(TaskPriority::High),
            Task::new("report", "reporting", "Summarise findings")
                .with_dependencies(["recon", "scan"]),
        ],
    );
    plan.strategy = PlanStrategy::Hybrid;
    plan.estimated_duration = Duration::from_secs(90 * 60);
    plan.resources.required_tools = vec!["nmap".into()];

    let json = serde_json::to_string(&plan).unwrap();
    let back: ExecutionPlan = serde_json::from_str(&json).unwrap();

    assert_eq!(back, plan);
    assert_eq!(back.edge_count(), 3);
    assert_eq!(back.estimated_duration, Duration::from_secs(5400));
}

// ---------------------------------------------------------------------------
// 2. Messages and errors
// ---------------------------------------------------------------------------

#[test]
fn message_with_data_survives_roundtrip() {
    let msg = BusMessage::new("file-1", "net-1", "checksum ready")
        .with_kind(MessageKind::Result)
        .with_data(serde_json::json!({"sha256": "abc"}));
    let json = serde_json::to_string(&msg).unwrap();
    let back: BusMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
    assert!(back.validate().is_ok());
}

#[test]
fn json_errors_convert_into_conductor_error() {
    fn parse(raw: &str) -> ConductorResult<Task> {
        Ok(serde_json::from_str(raw)?)
    }
    let err = parse("{not json").unwrap_err();
    assert!(matches!(err, ConductorError::Json(_)));
}
