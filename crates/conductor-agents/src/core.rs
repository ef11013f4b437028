use conductor_core::{
    AgentHealth, AgentKind, AgentMetrics, AgentStatus, BusMessage, ConductorError,
    ConductorResult, ExecutionResult, HealthState, Task,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Executions needed before the failure ratio affects health.
const HEALTH_MIN_SAMPLES: u64 = 4;

/// Messages kept per agent; the oldest are dropped first.
pub const INBOX_CAPACITY: usize = 256;

/// Derive health from status and counters.
///
/// Stopped or errored agents are unhealthy. Otherwise, once enough tasks have
/// run, a failure ratio of at least one half is unhealthy and at least one
/// quarter is degraded.
pub fn health_from_metrics(status: AgentStatus, metrics: &AgentMetrics) -> HealthState {
    if matches!(status, AgentStatus::Stopped | AgentStatus::Error) {
        return HealthState::Unhealthy;
    }
    if metrics.tasks_executed < HEALTH_MIN_SAMPLES {
        return HealthState::Healthy;
    }
    let failed = metrics.tasks_failed * 4;
    if failed >= metrics.tasks_executed * 2 {
        HealthState::Unhealthy
    } else if failed >= metrics.tasks_executed {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

/// State shared by every built-in agent: identity, status, counters, inbox.
///
/// Status is derived: stopped wins, otherwise the agent is busy while any
/// task is in flight.
pub struct AgentCore {
    id: String,
    name: String,
    kind: AgentKind,
    stopped: AtomicBool,
    in_flight: AtomicUsize,
    metrics: RwLock<AgentMetrics>,
    inbox: RwLock<VecDeque<BusMessage>>,
}

/// Decrements the in-flight count even if the work future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AgentCore {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AgentKind) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            name: if name.trim().is_empty() { id.clone() } else { name },
            id,
            kind,
            stopped: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            metrics: RwLock::new(AgentMetrics::default()),
            inbox: RwLock::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AgentKind {
        self.kind.clone()
    }

    pub fn status(&self) -> AgentStatus {
        if self.is_stopped() {
            AgentStatus::Stopped
        } else if self.in_flight() > 0 {
            AgentStatus::Busy
        } else {
            AgentStatus::Idle
        }
    }

    /// Tasks currently executing on this agent.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> AgentMetrics {
        self.metrics.read().clone()
    }

    pub fn health(&self) -> AgentHealth {
        AgentHealth::new(health_from_metrics(self.status(), &self.metrics.read()))
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Store a delivered message. Stopped agents reject deliveries.
    pub fn accept(&self, message: BusMessage) -> ConductorResult<()> {
        if self.is_stopped() {
            return Err(ConductorError::StateConflict(format!(
                "agent {} is stopped",
                self.id
            )));
        }
        debug!(agent_id = %self.id, from = %message.from, "Message received");
        {
            let mut inbox = self.inbox.write();
            if inbox.len() >= INBOX_CAPACITY {
                if let Some(dropped) = inbox.pop_front() {
                    debug!(agent_id = %self.id, message_id = %dropped.id, "Inbox full, dropped oldest");
                }
            }
            inbox.push_back(message);
        }
        self.metrics.write().messages_received += 1;
        Ok(())
    }

    /// Copy of the inbox in arrival order.
    pub fn inbox(&self) -> Vec<BusMessage> {
        self.inbox.read().iter().cloned().collect()
    }

    /// Remove and return the messages matching `pred`, in arrival order.
    pub fn drain_inbox<P>(&self, pred: P) -> Vec<BusMessage>
    where
        P: Fn(&BusMessage) -> bool,
    {
        let mut inbox = self.inbox.write();
        let (taken, kept): (VecDeque<_>, VecDeque<_>) = inbox.drain(..).partition(|m| pred(m));
        *inbox = kept;
        taken.into()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Run `work` for `task`, keeping status and counters up to date.
    ///
    /// The agent reports `busy` while this or any other run is in flight.
    /// `Err` from the work becomes a failed [`ExecutionResult`].
    pub async fn run<F>(&self, task: &Task, work: F) -> ExecutionResult
    where
        F: Future<Output = Result<Value, String>> + Send,
    {
        if self.is_stopped() {
            return ExecutionResult::failure(
                &task.id,
                &self.id,
                format!("agent {} is stopped", self.id),
                std::time::Duration::ZERO,
            );
        }

        let started = Instant::now();
        let outcome = {
            let _in_flight = InFlight::enter(&self.in_flight);
            work.await
        };
        let elapsed = started.elapsed();

        {
            let mut metrics = self.metrics.write();
            metrics.tasks_executed += 1;
            metrics.busy_ms += u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            if outcome.is_err() {
                metrics.tasks_failed += 1;
            }
        }
        match outcome {
            Ok(output) => ExecutionResult::success(&task.id, &self.id, output, elapsed),
            Err(error) => {
                warn!(agent_id = %self.id, task_id = %task.id, error = %error, "Task failed");
                ExecutionResult::failure(&task.id, &self.id, error, elapsed)
            }
        }
    }
}
