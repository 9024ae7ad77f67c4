use ahash::{AHashMap, AHashSet};
use tracing::{debug, error};

use crate::config::Config;

use super::{FunctionNode, IrKind, IrNode, IrProgram};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptimizeError {
    #[error("entry function `main` does not exist")]
    MissingEntry,
    #[error("function `{caller}` calls `{callee}`, which does not exist")]
    DanglingCall { caller: String, callee: String },
}

enum Rewrite {
    Keep,
    Replace(IrNode),
    Delete,
}

fn rewrite(children: &[IrNode], i: usize) -> Rewrite {
    let node = &children[i];
    match &node.kind {
        IrKind::ExecuteIf { .. } if node.children.is_empty() => Rewrite::Delete,
        IrKind::ExecuteIf { conditions } => match &node.children[..] {
            [IrNode {
                kind: IrKind::ExecuteIf { conditions: inner },
                children,
                ..
            }] => {
                let mut merged = node.clone();
                merged.kind = IrKind::ExecuteIf {
                    conditions: conditions.iter().chain(inner).cloned().collect(),
                };
                merged.children = children.clone();
                Rewrite::Replace(merged)
            }
            _ => Rewrite::Keep,
        },
        IrKind::CopyScore { target, source } if target == source => Rewrite::Delete,
        kind => match (kind.overwritten_cell(), children.get(i + 1)) {
            (Some(cell), Some(next))
                if next.kind.overwritten_cell() == Some(cell) && !next.kind.reads_cell(cell) =>
            {
                Rewrite::Delete
            }
            _ => Rewrite::Keep,
        },
    }
}

/// One bottom-up sweep. Returns whether anything changed.
fn optimize_children(children: &mut Vec<IrNode>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < children.len() {
        changed |= optimize_children(&mut children[i].children);

        match rewrite(children, i) {
            Rewrite::Keep => i += 1,
            Rewrite::Replace(node) => {
                children[i] = node;
                changed = true;
            }
            Rewrite::Delete => {
                children.remove(i);
                changed = true;
                // the previous sibling may pair with the new neighbour
                i = i.saturating_sub(1);
            }
        }
    }
    changed
}

/// Runs the local rewrites on one function until they stop applying.
pub fn optimize_function(func: &mut FunctionNode) -> bool {
    let mut changed = false;
    while optimize_children(&mut func.children) {
        changed = true;
    }
    changed
}

pub fn optimize_local(program: &mut IrProgram) -> bool {
    let mut changed = false;
    for func in &mut program.functions {
        changed |= optimize_function(func);
    }
    changed
}

fn call_counts(program: &IrProgram) -> AHashMap<String, usize> {
    let mut counts = AHashMap::new();
    for func in program.functions.iter().filter(|f| !f.drop) {
        for callee in func.calls() {
            *counts.entry(callee.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn mark_unreachable(program: &mut IrProgram, config: &Config) {
    let mut reached = AHashSet::new();
    let mut pending = program
        .functions
        .iter()
        .filter(|f| config.is_root(&f.name))
        .map(|f| f.name.clone())
        .collect::<Vec<_>>();

    while let Some(name) = pending.pop() {
        if !reached.insert(name.clone()) {
            continue;
        }
        if let Some(func) = program.get(&name) {
            pending.extend(func.calls().into_iter().map(String::from));
        }
    }

    for func in &mut program.functions {
        if !reached.contains(&func.name) {
            debug!(name = %func.name, "dropping unreachable function");
            func.drop = true;
        }
    }
}

fn remove_calls(children: &mut Vec<IrNode>, name: &str) {
    children.retain(|n| !matches!(&n.kind, IrKind::Call { function } if function == name));
    for child in children {
        remove_calls(&mut child.children, name);
    }
}

/// Replaces every call to `name` with a fresh copy of `body`.
fn replace_calls(children: &mut Vec<IrNode>, name: &str, body: &IrNode, next_index: &mut u32) {
    for child in children.iter_mut() {
        match &child.kind {
            IrKind::Call { function } if function == name => {
                let mut copy = body.clone();
                copy.visit_mut(&mut |n| {
                    n.meta.index = Some(*next_index);
                    *next_index += 1;
                });
                *child = copy;
            }
            _ => replace_calls(&mut child.children, name, body, next_index),
        }
    }
}

enum GlobalStep {
    RemoveEmpty(String),
    Inline(String),
    Splice { callee: String, caller: String },
}

fn next_step(program: &IrProgram, config: &Config) -> Option<GlobalStep> {
    let counts = call_counts(program);
    let live = program
        .functions
        .iter()
        .filter(|f| !f.drop && !config.is_root(&f.name));

    for func in live {
        if func.children.is_empty() {
            return Some(GlobalStep::RemoveEmpty(func.name.clone()));
        }
        if func.calls().contains(&func.name.as_str()) {
            continue;
        }
        if func.children.len() == 1 {
            return Some(GlobalStep::Inline(func.name.clone()));
        }
        if counts.get(&func.name) == Some(&1) {
            let caller = program.functions.iter().filter(|f| !f.drop).find(|f| {
                f.children
                    .iter()
                    .any(|n| matches!(&n.kind, IrKind::Call { function } if *function == func.name))
            });
            if let Some(caller) = caller {
                return Some(GlobalStep::Splice {
                    callee: func.name.clone(),
                    caller: caller.name.clone(),
                });
            }
        }
    }
    None
}

fn apply(program: &mut IrProgram, step: GlobalStep) {
    match step {
        GlobalStep::RemoveEmpty(name) => {
            debug!(name = %name, "removing empty function");
            for func in program.functions.iter_mut().filter(|f| !f.drop) {
                remove_calls(&mut func.children, &name);
            }
            if let Some(func) = program.get_mut(&name) {
                func.drop = true;
            }
        }
        GlobalStep::Inline(name) => {
            let Some(body) = program.get(&name).and_then(|f| f.children.first()).cloned() else {
                return;
            };
            debug!(name = %name, "inlining single instruction function");
            let mut next_index = program.next_index;
            for func in program.functions.iter_mut().filter(|f| !f.drop && f.name != name) {
                replace_calls(&mut func.children, &name, &body, &mut next_index);
            }
            program.next_index = next_index;
            if let Some(func) = program.get_mut(&name) {
                func.drop = true;
            }
        }
        GlobalStep::Splice { callee, caller } => {
            let Some(body) = program.get(&callee).map(|f| f.children.clone()) else {
                return;
            };
            debug!(callee = %callee, caller = %caller, "splicing function into its only caller");
            if let Some(func) = program.get_mut(&caller) {
                let pos = func.children.iter().position(
                    |n| matches!(&n.kind, IrKind::Call { function } if *function == callee),
                );
                if let Some(pos) = pos {
                    func.children.splice(pos..pos + 1, body);
                }
            }
            if let Some(func) = program.get_mut(&callee) {
                func.drop = true;
            }
        }
    }
}

/// Every call in a surviving function must target a surviving function.
pub fn verify(program: &IrProgram) -> Result<(), OptimizeError> {
    let live = program
        .functions
        .iter()
        .filter(|f| !f.drop)
        .map(|f| f.name.as_str())
        .collect::<AHashSet<_>>();

    if !live.contains("main") {
        error!("entry function is missing after optimization");
        return Err(OptimizeError::MissingEntry);
    }
    for func in program.functions.iter().filter(|f| !f.drop) {
        if let Some(callee) = func.calls().into_iter().find(|c| !live.contains(c)) {
            error!(caller = %func.name, callee, "call to a function that does not exist");
            return Err(OptimizeError::DanglingCall {
                caller: func.name.clone(),
                callee: callee.into(),
            });
        }
    }
    Ok(())
}

/// Cross-function pass rooted at `main` and the configured hooks, followed by
/// another local sweep. Dropped functions are removed from `program`.
pub fn optimize_global(program: &mut IrProgram, config: &Config) -> Result<(), OptimizeError> {
    if program.get("main").is_none() {
        error!("entry function is missing");
        return Err(OptimizeError::MissingEntry);
    }

    mark_unreachable(program, config);
    while let Some(step) = next_step(program, config) {
        apply(program, step);
    }

    verify(program)?;
    program.functions.retain(|f| !f.drop);
    optimize_local(program);
    Ok(())
}
