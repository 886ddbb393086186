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

//! Built-in calls recognized by name at the call site, plus the generic
//! caller-cleaned calling convention used for everything else.

use crate::ast::{Expr, Keyword};
use crate::errors::CompileError;
use crate::masm::{DataArg, DataDirective, Instruction, Operand, Register};

use super::expr::lower_expr;
use super::{FunctionCtx, Program};

const DEFAULT_END: [u8; 2] = [0x0a, 0x0d];

/// Dispatches a `Call` expression node: recognized built-ins first (which,
/// unlike ordinary expressions, push nothing), then a plain user-function
/// call, which does push its `ax` result.
pub fn lower_call(
    ctx: &mut FunctionCtx,
    func: &str,
    args: &[Expr],
    keywords: &[Keyword],
    program: &mut Program,
) -> Result<(), CompileError> {
    match func {
        "putchar" => lower_putchar(ctx, args, program),
        "print" => lower_print(ctx, args, keywords, program),
        _ => lower_user_call(ctx, func, args, program),
    }
}

fn lower_putchar(ctx: &mut FunctionCtx, args: &[Expr], program: &mut Program) -> Result<(), CompileError> {
    let name = match args {
        [Expr::Name(name)] => name,
        _ => {
            return Err(CompileError::UnsupportedSyntax {
                context: ctx.name.clone(),
                reason: "putchar() takes exactly one variable reference".to_string(),
            });
        }
    };
    let operand = ctx.offset_of(name)?;
    program.emit(Instruction::Mov(Operand::Register(Register::Ax), operand));
    program.emit(Instruction::Mov(Operand::Register(Register::Dl), Operand::Register(Register::Al)));
    program.emit(Instruction::Mov(Operand::Register(Register::Ah), Operand::Immediate(2)));
    program.emit(Instruction::Int(0x21));
    Ok(())
}

fn literal_text(expr: &Expr, ctx: &str) -> Result<String, CompileError> {
    match expr {
        Expr::Str(s) => Ok(s.clone()),
        Expr::Num(n) => Ok(n.to_string()),
        _ => Err(CompileError::UnsupportedSyntax {
            context: ctx.to_string(),
            reason: "print() arguments must be string or integer literals".to_string(),
        }),
    }
}

fn literal_str_keyword(expr: &Expr, ctx: &str) -> Result<String, CompileError> {
    match expr {
        Expr::Str(s) => Ok(s.clone()),
        _ => Err(CompileError::UnsupportedSyntax {
            context: ctx.to_string(),
            reason: "print()'s sep/end keywords must be string literals".to_string(),
        }),
    }
}

fn lower_print(
    ctx: &mut FunctionCtx,
    args: &[Expr],
    keywords: &[Keyword],
    program: &mut Program,
) -> Result<(), CompileError> {
    let mut sep = " ".to_string();
    let mut end: Vec<DataArg> = DEFAULT_END.iter().map(|b| DataArg::Byte(*b)).collect();

    for kw in keywords {
        match kw.arg.as_str() {
            "sep" => sep = literal_str_keyword(&kw.value, &ctx.name)?,
            "end" => end = vec![DataArg::Str(literal_str_keyword(&kw.value, &ctx.name)?)],
            other => {
                return Err(CompileError::UnsupportedSyntax {
                    context: ctx.name.clone(),
                    reason: format!("print() does not support keyword `{other}`"),
                });
            }
        }
    }

    let parts: Vec<String> = args
        .iter()
        .map(|a| literal_text(a, &ctx.name))
        .collect::<Result<_, _>>()?;
    let joined = parts.join(&sep);

    let data_name = format!("data{}", program.data.len());
    let mut directive_args = vec![DataArg::Str(joined)];
    directive_args.extend(end);
    directive_args.push(DataArg::Str("$".to_string()));
    program
        .data
        .push(DataDirective::new(Some(data_name.clone()), directive_args));

    program.emit(Instruction::Mov(Operand::Register(Register::Dx), Operand::offset(data_name)));
    program.emit(Instruction::Mov(Operand::Register(Register::Ah), Operand::Immediate(9)));
    program.emit(Instruction::Int(0x21));
    Ok(())
}

/// Ordinary user-function call: arguments pushed in reverse order,
/// `call`, caller rewinds with `add sp`, caller pushes `ax`.
fn lower_user_call(
    ctx: &mut FunctionCtx,
    func: &str,
    args: &[Expr],
    program: &mut Program,
) -> Result<(), CompileError> {
    for arg in args.iter().rev() {
        lower_expr(ctx, arg, program)?;
    }
    program.emit(Instruction::Call(Operand::Symbolic(func.to_string())));
    if !args.is_empty() {
        program.emit(Instruction::Add(
            Operand::Register(Register::Sp),
            Operand::Immediate(2 * args.len() as i32),
        ));
    }
    program.emit(Instruction::Push(Operand::Register(Register::Ax)));
    Ok(())
}
