use crate::dispatch::TaskDispatcher;
use crate::storage::{InMemoryTaskStorage, TaskStorage};
use crate::types::{
    ExecutionLogEntry, ExecutionStats, ExecutionStatus, LogLevel, SubtaskResult, TaskExecution,
    TaskFilter,
};
use chrono::Utc;
use conductor_core::{ConductorError, ConductorResult, TaskStatus};
use conductor_planner::{topological_order, Planner};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Interval between polls in [`TaskManager::wait_for_terminal`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct ManagerInner {
    storage: Arc<dyn TaskStorage>,
    planner: Arc<dyn Planner>,
    dispatcher: Arc<dyn TaskDispatcher>,
    /// Tokens of executions whose worker has not finished yet.
    tokens: RwLock<HashMap<Uuid, CancellationToken>>,
    closed: AtomicBool,
}

/// Runs goal executions asynchronously and answers queries about them.
///
/// Each execution gets its own worker task and cancellation token. Queries
/// and cancellation only take the storage lock briefly and never wait on
/// worker progress.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

impl TaskManager {
    pub fn new(planner: Arc<dyn Planner>, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        Self::with_storage(planner, dispatcher, Arc::new(InMemoryTaskStorage::new()))
    }

    pub fn with_storage(
        planner: Arc<dyn Planner>,
        dispatcher: Arc<dyn TaskDispatcher>,
        storage: Arc<dyn TaskStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                storage,
                planner,
                dispatcher,
                tokens: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Submit a goal. Returns the `queued` snapshot without waiting for the
    /// worker to make progress.
    pub fn start_task(&self, goal: &str) -> ConductorResult<TaskExecution> {
        self.start_with(goal, CancellationToken::new())
    }

    /// Like [`start_task`](Self::start_task), with the execution's token
    /// derived from `parent`: cancelling the parent cancels the execution.
    pub fn start_task_with_token(
        &self,
        goal: &str,
        parent: &CancellationToken,
    ) -> ConductorResult<TaskExecution> {
        if parent.is_cancelled() {
            return Err(ConductorError::Cancelled);
        }
        self.start_with(goal, parent.child_token())
    }

    fn start_with(&self, goal: &str, token: CancellationToken) -> ConductorResult<TaskExecution> {
        if self.is_closed() {
            return Err(ConductorError::Closed);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConductorError::Internal(format!("no async runtime: {e}")))?;

        let execution = TaskExecution::new(goal);
        let id = execution.id;
        self.inner.storage.insert(execution.clone())?;
        self.inner.tokens.write().insert(id, token.clone());
        // A close() racing with this call may have missed the token above.
        if self.is_closed() {
            token.cancel();
        }

        info!(execution_id = %id, goal = %goal, "Execution queued");
        runtime.spawn(supervise(Arc::clone(&self.inner), id, goal.to_string(), token));
        Ok(execution)
    }

    /// Independent copy of an execution.
    pub fn get_task(&self, id: &Uuid) -> ConductorResult<TaskExecution> {
        self.inner
            .storage
            .get(id)
            .ok_or_else(|| ConductorError::TaskNotFound(id.to_string()))
    }

    /// Executions matching `filter`, newest start time first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<TaskExecution> {
        filter.apply(self.inner.storage.list())
    }

    /// Cancel a non-terminal execution.
    ///
    /// The status changes immediately; the worker stops at its next
    /// checkpoint. Terminal executions are left untouched.
    pub fn cancel_task(&self, id: &Uuid) -> ConductorResult<()> {
        if self.is_closed() {
            return Err(ConductorError::Closed);
        }
        let result = self.inner.storage.update(id, &mut |execution| {
            if !execution.status.can_transition_to(ExecutionStatus::Cancelled) {
                return Err(ConductorError::StateConflict(format!(
                    "cannot cancel task in status {}",
                    execution.status
                )));
            }
            execution.status = ExecutionStatus::Cancelled;
            execution.end_time = Some(Utc::now());
            execution.skip_unfinished_tasks();
            execution
                .messages
                .push(ExecutionLogEntry::new(LogLevel::Warn, "execution cancelled by request"));
            Ok(())
        });
        if let Err(e) = result {
            warn!(execution_id = %id, error = %e, "Cancel rejected");
            return Err(e);
        }

        if let Some(token) = self.inner.tokens.read().get(id) {
            token.cancel();
        }
        info!(execution_id = %id, "Execution cancelled");
        Ok(())
    }

    /// Stop accepting work and signal every running worker. Does not wait.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let tokens: Vec<CancellationToken> = self.inner.tokens.read().values().cloned().collect();
        for token in &tokens {
            token.cancel();
        }
        info!(signalled = tokens.len(), "Task manager closed");
    }

    pub fn stats(&self) -> ExecutionStats {
        let mut stats = ExecutionStats::default();
        for execution in self.inner.storage.list() {
            stats.record(execution.status);
        }
        stats
    }

    /// Poll until the execution is terminal, or fail after `timeout`.
    pub async fn wait_for_terminal(
        &self,
        id: &Uuid,
        timeout: Duration,
    ) -> ConductorResult<TaskExecution> {
        let poll = async {
            loop {
                let execution = self.get_task(id)?;
                if execution.status.is_terminal() {
                    return Ok::<_, ConductorError>(execution);
                }
                tokio::time::sleep(WAIT_POLL_INTERVAL).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                let status = self.get_task(id)?.status;
                Err(ConductorError::StateConflict(format!(
                    "timed out after {timeout:?} waiting for task {id} (status {status})"
                )))
            }
        }
    }
}

impl ManagerInner {
    /// Move to `next` if the table allows it, applying `extra` in the same
    /// critical section. Terminal targets stamp `end_time` and skip the plan
    /// tasks that never finished.
    fn advance<F>(
        &self,
        id: &Uuid,
        next: ExecutionStatus,
        entry: ExecutionLogEntry,
        extra: F,
    ) -> ConductorResult<TaskExecution>
    where
        F: FnOnce(&mut TaskExecution),
    {
        let mut extra = Some(extra);
        let mut entry = Some(entry);
        self.storage.update(id, &mut |execution| {
            if !execution.status.can_transition_to(next) {
                return Err(ConductorError::StateConflict(format!(
                    "cannot move task from {} to {next}",
                    execution.status
                )));
            }
            execution.status = next;
            if next.is_terminal() {
                execution.end_time = Some(Utc::now());
            }
            if let Some(apply) = extra.take() {
                apply(execution);
            }
            if next.is_terminal() {
                execution.skip_unfinished_tasks();
            }
            if let Some(entry) = entry.take() {
                execution.messages.push(entry);
            }
            Ok(())
        })
    }

    /// Mutate a non-terminal execution without changing its status.
    fn record<F>(&self, id: &Uuid, apply: F) -> ConductorResult<TaskExecution>
    where
        F: FnOnce(&mut TaskExecution),
    {
        let mut apply = Some(apply);
        self.storage.update(id, &mut |execution| {
            if execution.status.is_terminal() {
                return Err(ConductorError::StateConflict(format!(
                    "task already {}",
                    execution.status
                )));
            }
            if let Some(apply) = apply.take() {
                apply(execution);
            }
            Ok(())
        })
    }

    fn fail(&self, id: &Uuid, message: String) -> ConductorResult<TaskExecution> {
        error!(execution_id = %id, error = %message, "Execution failed");
        let entry = ExecutionLogEntry::new(LogLevel::Error, message.clone());
        self.advance(id, ExecutionStatus::Failed, entry, |execution| {
            execution.error = Some(message);
        })
    }

    fn cancelled_at_checkpoint(&self, id: &Uuid, checkpoint: &str) -> ConductorResult<()> {
        let entry =
            ExecutionLogEntry::new(LogLevel::Warn, format!("cancellation observed {checkpoint}"));
        self.advance(id, ExecutionStatus::Cancelled, entry, |_| {})?;
        info!(execution_id = %id, checkpoint, "Execution cancelled");
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Outer worker: runs the pipeline in its own task so a panic surfaces as a
/// join error and becomes a `failed` transition.
async fn supervise(inner: Arc<ManagerInner>, id: Uuid, goal: String, token: CancellationToken) {
    let pipeline = tokio::spawn(run_pipeline(Arc::clone(&inner), id, goal, token));
    match pipeline.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(execution_id = %id, error = %e, "Worker stopped; execution already terminal");
        }
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                panic_message(join_error.into_panic().as_ref())
            } else {
                "worker aborted".to_string()
            };
            if let Err(e) = inner.fail(&id, format!("internal error: {reason}")) {
                debug!(execution_id = %id, error = %e, "Dropped failure after terminal state");
            }
        }
    }
    inner.tokens.write().remove(&id);
}

async fn run_pipeline(
    inner: Arc<ManagerInner>,
    id: Uuid,
    goal: String,
    token: CancellationToken,
) -> ConductorResult<()> {
    if token.is_cancelled() {
        return inner.cancelled_at_checkpoint(&id, "before planning");
    }
    inner.advance(
        &id,
        ExecutionStatus::Planning,
        ExecutionLogEntry::info("planning started"),
        |_| {},
    )?;
    info!(execution_id = %id, "Planning");

    if token.is_cancelled() {
        return inner.cancelled_at_checkpoint(&id, "before planning");
    }
    let planned = tokio::select! {
        biased;
        _ = token.cancelled() => {
            return inner.cancelled_at_checkpoint(&id, "during planning");
        }
        planned = inner.planner.plan(&goal) => planned,
    };
    let plan = match planned {
        Ok(plan) => plan,
        Err(e) => {
            inner.fail(&id, format!("planning failed: {e}"))?;
            return Ok(());
        }
    };

    let order = match topological_order(&plan) {
        Ok(order) => order,
        Err(e) => {
            inner.fail(&id, format!("planning failed: {e}"))?;
            return Ok(());
        }
    };
    let summary = format!("plan {} ready with {} task(s)", plan.id, plan.tasks.len());
    inner.advance(
        &id,
        ExecutionStatus::Running,
        ExecutionLogEntry::info(summary),
        |execution| execution.plan = Some(plan.clone()),
    )?;
    info!(execution_id = %id, plan_id = %plan.id, tasks = plan.tasks.len(), "Running");

    for task_id in order {
        if token.is_cancelled() {
            return inner.cancelled_at_checkpoint(&id, &format!("before subtask {task_id}"));
        }
        let Some(task) = plan.task(&task_id) else {
            continue;
        };

        inner.record(&id, |execution| {
            execution.set_task_status(&task.id, TaskStatus::Running);
        })?;
        let result = SubtaskResult::from(inner.dispatcher.dispatch(id, task).await);
        let succeeded = result.succeeded();
        let entry = if succeeded {
            ExecutionLogEntry::info(format!("subtask {} completed by {}", task.id, result.agent_id))
        } else {
            ExecutionLogEntry::new(
                LogLevel::Warn,
                format!(
                    "subtask {} failed on {}: {}",
                    task.id,
                    result.agent_id,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            )
        };
        let error = result.error.clone();

        if let Err(e) = inner.record(&id, |execution| {
            execution.set_task_status(&task.id, result.status);
            execution.results.push(result);
            execution.messages.push(entry);
        }) {
            warn!(execution_id = %id, task_id = %task.id, error = %e, "Dropped late subtask result");
            return Err(e);
        }

        if !succeeded {
            let reason = error.unwrap_or_else(|| "unknown error".to_string());
            inner.fail(&id, format!("subtask {} failed: {reason}", task.id))?;
            return Ok(());
        }
    }

    inner.advance(
        &id,
        ExecutionStatus::Completed,
        ExecutionLogEntry::info("all subtasks completed"),
        |_| {},
    )?;
    info!(execution_id = %id, "Execution completed");
    Ok(())
}
