use crate::types::TaskExecution;
use conductor_core::{ConductorError, ConductorResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// In-place mutation applied to a stored execution. Returning `Err` must
/// leave the execution unchanged.
pub type ExecutionUpdate<'a> = &'a mut dyn FnMut(&mut TaskExecution) -> ConductorResult<()>;

/// Storage seam for task executions.
///
/// `update` must run the mutation atomically with respect to every other
/// call, since the lifecycle state machine relies on check-then-set inside
/// it. Calls are synchronous and must not block on I/O for long; the task
/// manager calls them from async contexts.
pub trait TaskStorage: Send + Sync {
    /// Store a new execution. Fails if the id already exists.
    fn insert(&self, execution: TaskExecution) -> ConductorResult<()>;

    /// Independent copy of an execution.
    fn get(&self, id: &Uuid) -> Option<TaskExecution>;

    /// Apply `apply` to the execution and return the updated copy.
    fn update(&self, id: &Uuid, apply: ExecutionUpdate<'_>) -> ConductorResult<TaskExecution>;

    /// Copies of every stored execution, in no particular order.
    fn list(&self) -> Vec<TaskExecution>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local storage. Retention is unbounded.
pub struct InMemoryTaskStorage {
    executions: RwLock<HashMap<Uuid, TaskExecution>>,
}

impl InMemoryTaskStorage {
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTaskStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStorage for InMemoryTaskStorage {
    fn insert(&self, execution: TaskExecution) -> ConductorResult<()> {
        let mut executions = self.executions.write();
        if executions.contains_key(&execution.id) {
            return Err(ConductorError::StateConflict(format!(
                "execution already exists: {}",
                execution.id
            )));
        }
        executions.insert(execution.id, execution);
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Option<TaskExecution> {
        self.executions.read().get(id).cloned()
    }

    fn update(&self, id: &Uuid, apply: ExecutionUpdate<'_>) -> ConductorResult<TaskExecution> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| ConductorError::TaskNotFound(id.to_string()))?;
        apply(execution)?;
        Ok(execution.clone())
    }

    fn list(&self) -> Vec<TaskExecution> {
        self.executions.read().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.executions.read().len()
    }
}
