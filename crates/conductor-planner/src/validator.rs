use crate::error::PlanError;
use conductor_core::ExecutionPlan;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Check the structural invariants of a plan, failing on the first violation.
///
/// Order of checks: goal present, at least one task, unique task ids, every
/// dependency resolvable within the plan, dependency graph acyclic.
pub fn validate(plan: &ExecutionPlan) -> Result<(), PlanError> {
    if plan.goal.trim().is_empty() {
        return Err(PlanError::EmptyGoal);
    }
    if plan.tasks.is_empty() {
        return Err(PlanError::NoTasks);
    }

    let mut seen = HashSet::with_capacity(plan.tasks.len());
    for task in &plan.tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(PlanError::DuplicateTaskId(task.id.clone()));
        }
    }

    for task in &plan.tasks {
        for dep in &task.dependencies {
            if !seen.contains(dep.as_str()) {
                return Err(PlanError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    match find_cycle(plan) {
        Some(cycle) => Err(PlanError::CircularDependency { cycle }),
        None => Ok(()),
    }
}

/// Adjacency list (task index -> dependency indices). Unknown ids are skipped.
fn dependency_edges(plan: &ExecutionPlan) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = plan
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();
    plan.tasks
        .iter()
        .map(|t| {
            t.dependencies
                .iter()
                .filter_map(|d| index.get(d.as_str()).copied())
                .collect()
        })
        .collect()
}

/// Iterative three-colour DFS. Returns the first cycle found, walking tasks in
/// plan order and edges in listed order, as a path of ids.
pub fn find_cycle(plan: &ExecutionPlan) -> Option<Vec<String>> {
    let edges = dependency_edges(plan);
    let mut marks = vec![Mark::Unvisited; plan.tasks.len()];
    // (node, index of the next edge to follow)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..plan.tasks.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        stack.push((start, 0));

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if frame.1 >= edges[node].len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            let next = edges[node][frame.1];
            frame.1 += 1;

            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::InProgress => {
                    let pos = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[pos..]
                        .iter()
                        .map(|(n, _)| plan.tasks[*n].id.clone())
                        .collect();
                    cycle.push(plan.tasks[next].id.clone());
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Task ids in an order where every task comes after its dependencies.
///
/// Ties are broken by plan order, so an already-ordered plan is returned
/// unchanged. Fails with the validation error for invalid plans.
pub fn topological_order(plan: &ExecutionPlan) -> Result<Vec<String>, PlanError> {
    validate(plan)?;
    let edges = dependency_edges(plan);
    let n = plan.tasks.len();

    let mut remaining: Vec<usize> = edges.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (task, deps) in edges.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(task);
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(next) = ready.pop_first() {
        order.push(plan.tasks[next].id.clone());
        for &dependent in &dependents[next] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }
    Ok(order)
}

/// Group tasks into dependency levels: wave 0 has no dependencies, wave k
/// depends only on tasks in waves below k. Ids keep plan order inside a wave.
pub fn execution_waves(plan: &ExecutionPlan) -> Result<Vec<Vec<String>>, PlanError> {
    let order = topological_order(plan)?;
    let index: HashMap<&str, usize> = plan
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();
    let edges = dependency_edges(plan);

    let mut level = vec![0usize; plan.tasks.len()];
    for id in &order {
        let i = index[id.as_str()];
        level[i] = edges[i].iter().map(|&d| level[d] + 1).max().unwrap_or(0);
    }

    let depth = level.iter().copied().max().map_or(0, |m| m + 1);
    let mut waves = vec![Vec::new(); depth];
    for (i, task) in plan.tasks.iter().enumerate() {
        waves[level[i]].push(task.id.clone());
    }
    Ok(waves)
}
