//! Prompt text sent to the reasoning provider.

use conductor_core::ExecutionPlan;

/// System prompt describing the JSON document the planner expects back.
pub const PLAN_SYSTEM_PROMPT: &str = r#"You are the planning component of a task orchestrator.
Break the user's goal into concrete tasks that worker agents can execute.
Available agent kinds: captain (coordination), file (filesystem inspection),
network (host and port checks), research (analysis and notes).

Respond with a single JSON object and nothing else, using this schema:
{
  "reasoning": "why the plan looks the way it does",
  "strategy": "sequential" | "parallel" | "hybrid",
  "estimated_duration": "total time, e.g. 1h30m, or a number of minutes",
  "resources": {
    "max_concurrent_agents": 2,
    "required_tools": ["file", "network"],
    "estimated_cost": 0.0
  },
  "tasks": [
    {
      "id": "unique-task-id",
      "type": "analysis" | "execution" | "validation" | "reporting",
      "description": "what the task does",
      "priority": "low" | "medium" | "high" | "critical",
      "dependencies": ["ids of tasks that must finish first"],
      "payload": { "agent_kind": "file", "path": "..." },
      "estimated_duration": "10m"
    }
  ]
}

Task ids must be unique. Dependencies may only name tasks in the same plan and
must not form a cycle."#;

/// User prompt asking for a plan for `goal`.
pub fn plan_prompt(goal: &str) -> String {
    format!("Goal: {goal}\n\nProduce the execution plan as JSON.")
}

/// User prompt asking the provider to improve an existing plan.
pub fn optimize_prompt(plan: &ExecutionPlan) -> String {
    let serialized =
        serde_json::to_string_pretty(plan).unwrap_or_else(|_| format!("{plan:?}"));
    format!(
        "Goal: {goal}\n\nImprove the following execution plan. Merge redundant tasks, \
         remove unnecessary dependencies so independent work can run in parallel, \
         and keep every task id unique. Return the complete improved plan as JSON.\n\n{serialized}",
        goal = plan.goal,
    )
}

/// Recover the goal from a prompt built by [`plan_prompt`] or [`optimize_prompt`].
pub fn goal_from_prompt(prompt: &str) -> Option<&str> {
    let line = prompt.lines().next()?;
    line.strip_prefix("Goal: ").map(str::trim)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use conductor_core::Task;

    #[test]
    fn test_plan_prompt_roundtrips_goal() {
        let prompt = plan_prompt("audit the web server");
        assert_eq!(goal_from_prompt(&prompt), Some("audit the web server"));
    }

    #[test]
    fn test_optimize_prompt_embeds_plan() {
        let plan = ExecutionPlan::new("scan hosts", vec![Task::new("recon", "analysis", "look")]);
        let prompt = optimize_prompt(&plan);
        assert_eq!(goal_from_prompt(&prompt), Some("scan hosts"));
        assert!(prompt.contains("\"recon\""));
        assert!(prompt.contains(&plan.id.to_string()));
    }

    #[test]
    fn test_goal_from_unrelated_prompt() {
        assert_eq!(goal_from_prompt("hello"), None);
    }
}
