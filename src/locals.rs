/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The Local Discovery Pass: a read-only walk over one function body
//! that collects the ordered set of names needing a local stack slot.

use std::collections::HashSet;

use crate::ast::{Expr, Stmt};
use crate::errors::CompileError;

/// Returns the names assigned to or used as a `for`-loop target anywhere in
/// `body`, in first-appearance order. Parameters are not included; callers
/// union them in separately.
pub fn discover_locals(func_name: &str, body: &[Stmt]) -> Result<Vec<String>, CompileError> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    walk_block(func_name, body, &mut order, &mut seen)?;
    Ok(order)
}

fn record(name: &str, order: &mut Vec<String>, seen: &mut HashSet<String>) {
    if seen.insert(name.to_string()) {
        order.push(name.to_string());
    }
}

fn walk_block(
    func_name: &str,
    body: &[Stmt],
    order: &mut Vec<String>,
    seen: &mut HashSet<String>,
) -> Result<(), CompileError> {
    for stmt in body {
        walk_stmt(func_name, stmt, order, seen)?;
    }
    Ok(())
}

fn walk_stmt(
    func_name: &str,
    stmt: &Stmt,
    order: &mut Vec<String>,
    seen: &mut HashSet<String>,
) -> Result<(), CompileError> {
    match stmt {
        Stmt::Assign { targets, .. } => {
            if targets.len() != 1 {
                return Err(CompileError::UnsupportedSyntax {
                    context: func_name.to_string(),
                    reason: "assignment must have a single target".to_string(),
                });
            }
            if let Expr::Name(name) = &targets[0] {
                record(name, order, seen);
            } else {
                return Err(CompileError::UnsupportedSyntax {
                    context: func_name.to_string(),
                    reason: "assignment target must be a plain name".to_string(),
                });
            }
        }
        Stmt::AugAssign { target, .. } => {
            // The target of `x op= e` must already be an assignable name;
            // augmented assignment alone never introduces a new local, but
            // recording it here keeps discovery independent of statement
            // order within a block (an AugAssign may textually precede the
            // plain Assign that "introduces" the same name).
            if let Expr::Name(name) = target {
                record(name, order, seen);
            }
        }
        Stmt::If { body, orelse, .. } => {
            walk_block(func_name, body, order, seen)?;
            walk_block(func_name, orelse, order, seen)?;
        }
        Stmt::While { body, .. } => {
            walk_block(func_name, body, order, seen)?;
        }
        Stmt::For { target, body, .. } => {
            if let Expr::Name(name) = target {
                record(name, order, seen);
            } else {
                return Err(CompileError::UnsupportedSyntax {
                    context: func_name.to_string(),
                    reason: "for-loop target must be a plain name".to_string(),
                });
            }
            walk_block(func_name, body, order, seen)?;
        }
        Stmt::FunctionDef { .. } => {
            return Err(CompileError::UnsupportedSyntax {
                context: func_name.to_string(),
                reason: "nested function definitions are not supported".to_string(),
            });
        }
        Stmt::Return { .. }
        | Stmt::Expr { .. }
        | Stmt::Break
        | Stmt::Continue
        | Stmt::Pass
        | Stmt::Ellipsis => {}
    }
    Ok(())
}
