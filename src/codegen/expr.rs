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

//! Expression lowering: every node leaves exactly one 16-bit word pushed on
//! the machine stack, except the `print`/`putchar` builtins, which are only
//! ever used as statements and push nothing (see `builtins.rs`).

use crate::ast::{BoolOperator, CmpOperator, Expr, NameConstant, Operator, UnaryOperator};
use crate::errors::CompileError;
use crate::masm::{Instruction, Operand, Register, ShiftKind};

use super::builtins::lower_call;
use super::{FunctionCtx, Program};

pub fn lower_expr(ctx: &mut FunctionCtx, expr: &Expr, program: &mut Program) -> Result<(), CompileError> {
    match expr {
        Expr::Num(n) => push_literal(program, *n, &ctx.name)?,
        Expr::NameConstant(NameConstant::False | NameConstant::None) => push_literal(program, 0, &ctx.name)?,
        Expr::NameConstant(NameConstant::True) => push_literal(program, 1, &ctx.name)?,
        Expr::Str(s) => {
            let ch = single_char(s, &ctx.name)?;
            push_literal(program, ch as i64, &ctx.name)?;
        }
        Expr::Name(name) => {
            let operand = ctx.offset_of(name)?;
            program.emit(Instruction::Push(operand));
        }
        Expr::UnaryOp {
            op: UnaryOperator::USub,
            operand,
        } => {
            push_literal(program, 0, &ctx.name)?;
            lower_expr(ctx, operand, program)?;
            lower_binary_op_core(program, Operator::Sub)?;
        }
        Expr::BinOp { left, op, right } => {
            lower_expr(ctx, left, program)?;
            lower_expr(ctx, right, program)?;
            lower_binary_op_core(program, *op)?;
        }
        Expr::BoolOp { op, values } => {
            if values.is_empty() {
                return Err(CompileError::UnsupportedSyntax {
                    context: ctx.name.clone(),
                    reason: "boolean expression with no operands".to_string(),
                });
            }
            let arith_op = match op {
                BoolOperator::And => Operator::BitAnd,
                BoolOperator::Or => Operator::BitOr,
            };
            lower_expr(ctx, &values[0], program)?;
            for value in &values[1..] {
                lower_expr(ctx, value, program)?;
                lower_binary_op_core(program, arith_op)?;
            }
        }
        Expr::Compare { left, op, right } => {
            lower_expr(ctx, left, program)?;
            lower_expr(ctx, right, program)?;
            lower_compare(ctx, *op, program);
        }
        Expr::Call { func, args, keywords } => {
            lower_call(ctx, func, args, keywords, program)?;
        }
    }
    Ok(())
}

fn push_literal(program: &mut Program, n: i64, context: &str) -> Result<(), CompileError> {
    let operand = Operand::checked_immediate(n as i32, context)?;
    program.emit(Instruction::Mov(Operand::Register(Register::Ax), operand));
    program.emit(Instruction::Push(Operand::Register(Register::Ax)));
    Ok(())
}

fn single_char(s: &str, context: &str) -> Result<char, CompileError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CompileError::UnsupportedSyntax {
            context: context.to_string(),
            reason: "string literal used as a value must be exactly one character".to_string(),
        }),
    }
}

/// The shared core of every arithmetic/bitwise/shift binary operator:
/// consumes the two pushed operands and leaves exactly one word pushed.
/// Reused verbatim by `AugAssign`, which appends its own final `pop` into
/// the target slot instead of leaving the value on the stack.
pub fn lower_binary_op_core(program: &mut Program, op: Operator) -> Result<(), CompileError> {
    use Register::*;
    match op {
        Operator::Add | Operator::Sub | Operator::BitAnd | Operator::BitOr | Operator::BitXor => {
            program.emit(Instruction::Pop(Operand::Register(Dx)));
            program.emit(Instruction::Pop(Operand::Register(Ax)));
            let ax = Operand::Register(Ax);
            let dx = Operand::Register(Dx);
            let ins = match op {
                Operator::Add => Instruction::Add(ax, dx),
                Operator::Sub => Instruction::Sub(ax, dx),
                Operator::BitAnd => Instruction::And(ax, dx),
                Operator::BitOr => Instruction::Or(ax, dx),
                Operator::BitXor => Instruction::Xor(ax, dx),
                _ => unreachable!(),
            };
            program.emit(ins);
            program.emit(Instruction::Push(Operand::Register(Ax)));
        }
        Operator::Mult => {
            program.emit(Instruction::Pop(Operand::Register(Dx)));
            program.emit(Instruction::Pop(Operand::Register(Ax)));
            program.emit(Instruction::Mul(Operand::Register(Dx)));
            program.emit(Instruction::Push(Operand::Register(Ax)));
        }
        Operator::FloorDiv => {
            program.emit(Instruction::Pop(Operand::Register(Bx)));
            program.emit(Instruction::Xor(Operand::Register(Dx), Operand::Register(Dx)));
            program.emit(Instruction::Pop(Operand::Register(Ax)));
            program.emit(Instruction::Div(Operand::Register(Bx)));
            program.emit(Instruction::Push(Operand::Register(Ax)));
        }
        Operator::Mod => {
            program.emit(Instruction::Pop(Operand::Register(Bx)));
            program.emit(Instruction::Xor(Operand::Register(Dx), Operand::Register(Dx)));
            program.emit(Instruction::Pop(Operand::Register(Ax)));
            program.emit(Instruction::Div(Operand::Register(Bx)));
            program.emit(Instruction::Push(Operand::Register(Dx)));
        }
        Operator::LShift | Operator::RShift => {
            program.emit(Instruction::Pop(Operand::Register(Cx)));
            program.emit(Instruction::Pop(Operand::Register(Dx)));
            let kind = if op == Operator::LShift { ShiftKind::Sal } else { ShiftKind::Sar };
            for ins in Instruction::shift(kind, Operand::Register(Dx), Operand::Register(Cl)) {
                program.emit(ins);
            }
            program.emit(Instruction::Push(Operand::Register(Dx)));
        }
    }
    Ok(())
}

fn lower_compare(ctx: &mut FunctionCtx, op: CmpOperator, program: &mut Program) {
    use Register::*;
    let true_label = ctx.fresh_label("true");
    program.emit(Instruction::Mov(Operand::Register(Bx), Operand::Immediate(1)));
    program.emit(Instruction::Pop(Operand::Register(Dx)));
    program.emit(Instruction::Pop(Operand::Register(Ax)));
    program.emit(Instruction::Cmp(Operand::Register(Ax), Operand::Register(Dx)));
    let target = Operand::Symbolic(true_label.clone());
    let jump = match op {
        CmpOperator::Eq => Instruction::Jz(target),
        CmpOperator::NotEq => Instruction::Jnz(target),
        CmpOperator::Lt => Instruction::Jb(target),
        CmpOperator::LtE => Instruction::Jbe(target),
        CmpOperator::Gt => Instruction::Ja(target),
        CmpOperator::GtE => Instruction::Jae(target),
    };
    program.emit(jump);
    program.emit(Instruction::Dec(Operand::Register(Bx)));
    program.label(true_label);
    program.emit(Instruction::Push(Operand::Register(Bx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Item;

    fn ctx() -> FunctionCtx {
        FunctionCtx::new("f".to_string(), vec![], vec![], false)
    }

    fn rendered(program: &Program) -> Vec<String> {
        program
            .codes
            .iter()
            .map(|item| match item {
                Item::Instruction(ins) => ins.to_string(),
                Item::Label(l) => format!("{l}:"),
            })
            .collect()
    }

    #[test]
    fn integer_literal_pushes_one_word() {
        let mut c = ctx();
        let mut p = Program::new();
        lower_expr(&mut c, &Expr::Num(7), &mut p).unwrap();
        assert_eq!(rendered(&p), vec!["mov ax, 7", "push ax"]);
    }

    #[test]
    fn single_char_string_pushes_ordinal() {
        let mut c = ctx();
        let mut p = Program::new();
        lower_expr(&mut c, &Expr::Str("A".to_string()), &mut p).unwrap();
        assert_eq!(rendered(&p), vec!["mov ax, 65", "push ax"]);
    }

    #[test]
    fn multi_char_string_as_value_is_rejected() {
        let mut c = ctx();
        let mut p = Program::new();
        assert!(lower_expr(&mut c, &Expr::Str("no".to_string()), &mut p).is_err());
    }

    #[test]
    fn binop_pops_right_then_left() {
        let mut c = ctx();
        let mut p = Program::new();
        let e = Expr::BinOp {
            left: Box::new(Expr::Num(1)),
            op: Operator::Sub,
            right: Box::new(Expr::Num(2)),
        };
        lower_expr(&mut c, &e, &mut p).unwrap();
        assert_eq!(
            rendered(&p),
            vec![
                "mov ax, 1",
                "push ax",
                "mov ax, 2",
                "push ax",
                "pop dx",
                "pop ax",
                "sub ax, dx",
                "push ax",
            ]
        );
    }

    #[test]
    fn floordiv_clears_dx_and_pushes_quotient() {
        let mut c = ctx();
        let mut p = Program::new();
        lower_binary_op_core(&mut p, Operator::FloorDiv).unwrap();
        assert_eq!(
            rendered(&p),
            vec!["pop bx", "xor dx, dx", "pop ax", "div bx", "push ax"]
        );
    }

    #[test]
    fn modulo_pushes_remainder() {
        let mut p = Program::new();
        lower_binary_op_core(&mut p, Operator::Mod).unwrap();
        assert_eq!(
            rendered(&p),
            vec!["pop bx", "xor dx, dx", "pop ax", "div bx", "push dx"]
        );
    }

    #[test]
    fn shift_uses_cx_then_dx() {
        let mut p = Program::new();
        lower_binary_op_core(&mut p, Operator::LShift).unwrap();
        assert_eq!(rendered(&p), vec!["pop cx", "pop dx", "sal dx, cl", "push dx"]);
    }

    #[test]
    fn compare_mints_a_true_label_and_pushes_bool() {
        let mut c = ctx();
        let mut p = Program::new();
        let e = Expr::Compare {
            left: Box::new(Expr::Num(1)),
            op: CmpOperator::Eq,
            right: Box::new(Expr::Num(1)),
        };
        lower_expr(&mut c, &e, &mut p).unwrap();
        let r = rendered(&p);
        assert!(r.contains(&"mov bx, 1".to_string()));
        assert!(r.iter().any(|l| l.starts_with("jz _f_")));
        assert!(r.contains(&"dec bx".to_string()));
        assert!(r.last().unwrap() == "push bx");
    }

    #[test]
    fn bool_and_is_bitwise_not_short_circuit() {
        let mut c = ctx();
        let mut p = Program::new();
        let e = Expr::BoolOp {
            op: BoolOperator::And,
            values: vec![Expr::Num(2), Expr::Num(3)],
        };
        lower_expr(&mut c, &e, &mut p).unwrap();
        let r = rendered(&p);
        assert!(r.contains(&"and ax, dx".to_string()));
    }
}
