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

//! Statement lowering: every statement returns the machine stack to the
//! function's local-frame baseline, except `Expr` statements, which
//! deliberately leak their residual value.

use crate::ast::{CmpOperator, Expr, Operator, Stmt, UnaryOperator};
use crate::errors::CompileError;
use crate::masm::{Instruction, Operand, Register};

use super::expr::{lower_binary_op_core, lower_expr};
use super::{emit_epilogue, FunctionCtx, Program};

pub fn lower_block(ctx: &mut FunctionCtx, body: &[Stmt], program: &mut Program) -> Result<(), CompileError> {
    for stmt in body {
        lower_stmt(ctx, stmt, program)?;
    }
    Ok(())
}

fn lower_stmt(ctx: &mut FunctionCtx, stmt: &Stmt, program: &mut Program) -> Result<(), CompileError> {
    match stmt {
        Stmt::FunctionDef { .. } => Err(CompileError::UnsupportedSyntax {
            context: ctx.name.clone(),
            reason: "nested function definitions are not supported".to_string(),
        }),
        Stmt::Assign { targets, value } => lower_assign(ctx, targets, value, program),
        Stmt::AugAssign { target, op, value } => lower_augassign(ctx, target, *op, value, program),
        Stmt::Return { value } => lower_return(ctx, value, program),
        Stmt::Expr { value } => lower_expr(ctx, value, program),
        Stmt::If { test, body, orelse } => lower_if(ctx, test, body, orelse, program),
        Stmt::While { test, body } => lower_while(ctx, test, body, program),
        Stmt::For { target, iter, body } => lower_for(ctx, target, iter, body, program),
        Stmt::Break => {
            let target = ctx.break_stack.last().cloned().ok_or_else(|| CompileError::UnsupportedSyntax {
                context: ctx.name.clone(),
                reason: "break outside a loop".to_string(),
            })?;
            program.emit(Instruction::Jmp(None, Operand::Symbolic(target)));
            Ok(())
        }
        Stmt::Continue => {
            let target = ctx.loop_stack.last().cloned().ok_or_else(|| CompileError::UnsupportedSyntax {
                context: ctx.name.clone(),
                reason: "continue outside a loop".to_string(),
            })?;
            program.emit(Instruction::Jmp(None, Operand::Symbolic(target)));
            Ok(())
        }
        Stmt::Pass | Stmt::Ellipsis => Ok(()),
    }
}

fn name_operand(ctx: &FunctionCtx, target: &Expr) -> Result<Operand, CompileError> {
    match target {
        Expr::Name(name) => ctx.offset_of(name),
        _ => Err(CompileError::UnsupportedSyntax {
            context: ctx.name.clone(),
            reason: "assignment target must be a plain name".to_string(),
        }),
    }
}

fn lower_assign(
    ctx: &mut FunctionCtx,
    targets: &[Expr],
    value: &Expr,
    program: &mut Program,
) -> Result<(), CompileError> {
    if targets.len() != 1 {
        return Err(CompileError::UnsupportedSyntax {
            context: ctx.name.clone(),
            reason: "assignment must have a single target".to_string(),
        });
    }
    let dest = name_operand(ctx, &targets[0])?;
    lower_expr(ctx, value, program)?;
    program.emit(Instruction::Pop(Operand::Register(Register::Ax)));
    program.emit(Instruction::Mov(dest, Operand::Register(Register::Ax)));
    Ok(())
}

fn lower_augassign(
    ctx: &mut FunctionCtx,
    target: &Expr,
    op: Operator,
    value: &Expr,
    program: &mut Program,
) -> Result<(), CompileError> {
    let dest = name_operand(ctx, target)?;
    lower_expr(ctx, target, program)?;
    lower_expr(ctx, value, program)?;
    lower_binary_op_core(program, op)?;
    program.emit(Instruction::Pop(dest));
    Ok(())
}

/// Lowers `Return`. Inside `main` a returned value must be a literal
/// integer exit code in `-128..=127`, emitted as the DOS program-exit
/// sequence; elsewhere the value (if any) is popped
/// into `ax` before the epilogue.
pub fn lower_return(ctx: &mut FunctionCtx, value: &Option<Expr>, program: &mut Program) -> Result<(), CompileError> {
    if ctx.is_main {
        let code = match value {
            None => 0,
            Some(expr) => literal_exit_code(expr, &ctx.name)?,
        };
        if !(-128..=127).contains(&code) {
            return Err(CompileError::ReturnOutOfRange {
                context: ctx.name.clone(),
                value: code,
            });
        }
        let al = (code as i8) as u8 as i32;
        program.emit(Instruction::Mov(Operand::Register(Register::Ax), Operand::Immediate(0x4C00 | al)));
        program.emit(Instruction::Int(0x21));
    } else {
        if let Some(expr) = value {
            lower_expr(ctx, expr, program)?;
            program.emit(Instruction::Pop(Operand::Register(Register::Ax)));
        }
        emit_epilogue(program);
    }
    Ok(())
}

fn literal_exit_code(expr: &Expr, context: &str) -> Result<i64, CompileError> {
    match expr {
        Expr::Num(n) => Ok(*n),
        Expr::UnaryOp { op: UnaryOperator::USub, operand } => match operand.as_ref() {
            Expr::Num(n) => Ok(-n),
            _ => Err(CompileError::UnsupportedSyntax {
                context: context.to_string(),
                reason: "main must return a literal integer".to_string(),
            }),
        },
        _ => Err(CompileError::UnsupportedSyntax {
            context: context.to_string(),
            reason: "main must return a literal integer".to_string(),
        }),
    }
}

fn lower_test_branch(
    ctx: &mut FunctionCtx,
    test: &Expr,
    on_false: &str,
    program: &mut Program,
) -> Result<(), CompileError> {
    lower_expr(ctx, test, program)?;
    program.emit(Instruction::Pop(Operand::Register(Register::Bx)));
    program.emit(Instruction::Cmp(Operand::Register(Register::Bx), Operand::Immediate(0)));
    program.emit(Instruction::Jz(Operand::Symbolic(on_false.to_string())));
    Ok(())
}

fn lower_if(
    ctx: &mut FunctionCtx,
    test: &Expr,
    body: &[Stmt],
    orelse: &[Stmt],
    program: &mut Program,
) -> Result<(), CompileError> {
    let n = ctx.next_counter();
    let l_else = ctx.counted_label(n, "else");
    let l_end = ctx.counted_label(n, "end");

    lower_test_branch(ctx, test, &l_else, program)?;
    lower_block(ctx, body, program)?;
    if !orelse.is_empty() {
        program.emit(Instruction::Jmp(None, Operand::Symbolic(l_end.clone())));
    }
    program.label(l_else);
    if !orelse.is_empty() {
        lower_block(ctx, orelse, program)?;
        program.label(l_end);
    }
    Ok(())
}

fn lower_while(ctx: &mut FunctionCtx, test: &Expr, body: &[Stmt], program: &mut Program) -> Result<(), CompileError> {
    let n = ctx.next_counter();
    let l_while = ctx.counted_label(n, "while");
    let l_break = ctx.counted_label(n, "break");

    program.label(l_while.clone());
    lower_test_branch(ctx, test, &l_break, program)?;

    ctx.loop_stack.push(l_while.clone());
    ctx.break_stack.push(l_break.clone());
    let result = lower_block(ctx, body, program);
    ctx.loop_stack.pop();
    ctx.break_stack.pop();
    result?;

    program.emit(Instruction::Jmp(None, Operand::Symbolic(l_while)));
    program.label(l_break);
    Ok(())
}

struct RangeArgs {
    start: Expr,
    stop: Expr,
    step: i64,
}

fn parse_range(ctx: &FunctionCtx, iter: &Expr) -> Result<RangeArgs, CompileError> {
    let (func, args, keywords) = match iter {
        Expr::Call { func, args, keywords } => (func, args, keywords),
        _ => {
            return Err(CompileError::UnsupportedSyntax {
                context: ctx.name.clone(),
                reason: "for-loop iterator must be a range() call".to_string(),
            });
        }
    };
    if func != "range" {
        return Err(CompileError::UnsupportedSyntax {
            context: ctx.name.clone(),
            reason: "for-loop iterator must be range()".to_string(),
        });
    }
    if !keywords.is_empty() {
        return Err(CompileError::UnsupportedSyntax {
            context: ctx.name.clone(),
            reason: "range() does not accept keyword arguments".to_string(),
        });
    }
    let (start, stop, step_expr) = match args.as_slice() {
        [stop] => (Expr::Num(0), stop.clone(), None),
        [start, stop] => (start.clone(), stop.clone(), None),
        [start, stop, step] => (start.clone(), stop.clone(), Some(step)),
        _ => {
            return Err(CompileError::RangeError {
                context: ctx.name.clone(),
                reason: "range() takes 1 to 3 arguments".to_string(),
            });
        }
    };
    let step = match step_expr {
        None => 1,
        Some(expr) => literal_range_int(ctx, expr)?,
    };
    if step == 0 {
        return Err(CompileError::RangeError {
            context: ctx.name.clone(),
            reason: "range() step must not be 0".to_string(),
        });
    }
    Ok(RangeArgs { start, stop, step })
}

fn literal_range_int(ctx: &FunctionCtx, expr: &Expr) -> Result<i64, CompileError> {
    match expr {
        Expr::Num(n) => Ok(*n),
        Expr::UnaryOp { op: UnaryOperator::USub, operand } => match operand.as_ref() {
            Expr::Num(n) => Ok(-n),
            _ => Err(CompileError::RangeError {
                context: ctx.name.clone(),
                reason: "range() step must be an integer literal".to_string(),
            }),
        },
        _ => Err(CompileError::RangeError {
            context: ctx.name.clone(),
            reason: "range() step must be an integer literal".to_string(),
        }),
    }
}

/// `for target in range(...)` desugars to `target = start; while target cmp
/// stop: body; target += step`, but with the increment minted as its own
/// label so `continue` lands on it rather than skipping it.
fn lower_for(
    ctx: &mut FunctionCtx,
    target: &Expr,
    iter: &Expr,
    body: &[Stmt],
    program: &mut Program,
) -> Result<(), CompileError> {
    let target_name = match target {
        Expr::Name(name) => name.clone(),
        _ => {
            return Err(CompileError::UnsupportedSyntax {
                context: ctx.name.clone(),
                reason: "for-loop target must be a plain name".to_string(),
            });
        }
    };
    let range = parse_range(ctx, iter)?;
    let cmp_op = if range.step > 0 { CmpOperator::Lt } else { CmpOperator::Gt };

    lower_assign(ctx, &[Expr::Name(target_name.clone())], &range.start, program)?;

    let n = ctx.next_counter();
    let l_start = ctx.counted_label(n, "for_start");
    let l_inc = ctx.counted_label(n, "for_inc");
    let l_break = ctx.counted_label(n, "for_break");

    program.label(l_start.clone());
    let test = Expr::Compare {
        left: Box::new(Expr::Name(target_name.clone())),
        op: cmp_op,
        right: Box::new(range.stop),
    };
    lower_test_branch(ctx, &test, &l_break, program)?;

    ctx.loop_stack.push(l_inc.clone());
    ctx.break_stack.push(l_break.clone());
    let result = lower_block(ctx, body, program);
    ctx.loop_stack.pop();
    ctx.break_stack.pop();
    result?;

    program.label(l_inc);
    lower_augassign(
        ctx,
        &Expr::Name(target_name),
        Operator::Add,
        &literal_step_expr(range.step),
        program,
    )?;
    program.emit(Instruction::Jmp(None, Operand::Symbolic(l_start)));
    program.label(l_break);
    Ok(())
}

fn literal_step_expr(step: i64) -> Expr {
    if step < 0 {
        Expr::UnaryOp {
            op: UnaryOperator::USub,
            operand: Box::new(Expr::Num(-step)),
        }
    } else {
        Expr::Num(step)
    }
}
