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

//! The Code Generator: the central AST-directed lowering from a
//! `Module` to a `Program` of data directives and a typed instruction/label
//! stream, ready for the Assembly Writer.

mod builtins;
mod expr;
mod stmt;

use std::collections::HashMap;

use crate::ast::{Module, Stmt};
use crate::errors::CompileError;
use crate::locals::discover_locals;
use crate::masm::{DataDirective, Instruction};

/// An item in the program's flat code stream: either an instruction or a
/// label marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Instruction(Instruction),
    Label(String),
}

/// The whole compiled program: rodata directives plus the interleaved
/// instruction/label stream, in emission order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Program {
    pub data: Vec<DataDirective>,
    pub codes: Vec<Item>,
}

impl Program {
    fn new() -> Program {
        Program::default()
    }

    fn emit(&mut self, ins: Instruction) {
        self.codes.push(Item::Instruction(ins));
    }

    fn label(&mut self, name: impl Into<String>) {
        self.codes.push(Item::Label(name.into()));
    }
}

/// Per-function lowering state. Owned exclusively by
/// the code generator while lowering the one function it names; reset at
/// function entry, dropped at function exit.
struct FunctionCtx {
    name: String,
    args: Vec<String>,
    locals: Vec<String>,
    label_counter: u32,
    loop_stack: Vec<String>,
    break_stack: Vec<String>,
    is_main: bool,
}

impl FunctionCtx {
    fn new(name: String, args: Vec<String>, locals: Vec<String>, is_main: bool) -> FunctionCtx {
        FunctionCtx {
            name,
            args,
            locals,
            label_counter: 0,
            loop_stack: Vec::new(),
            break_stack: Vec::new(),
            is_main,
        }
    }

    /// Mints a fresh, function-unique label with an optional descriptive
    /// suffix.
    fn fresh_label(&mut self, slug: &str) -> String {
        let n = self.next_counter();
        self.counted_label(n, slug)
    }

    /// Reserves the next label-hygiene counter value without formatting it,
    /// for constructs (`if`, `while`, `for`) that mint more than one label
    /// off a single shared counter value.
    fn next_counter(&mut self) -> u32 {
        let n = self.label_counter;
        self.label_counter += 1;
        n
    }

    fn counted_label(&self, n: u32, slug: &str) -> String {
        if slug.is_empty() {
            format!("_{}_{}", self.name, n)
        } else {
            format!("_{}_{}_{}", self.name, n, slug)
        }
    }

    /// The stack-frame operand for a name: a parameter at `[bp+2*(i+2)]`, a
    /// local at `[bp-2*(j+1)]`.
    fn offset_of(&self, name: &str) -> Result<crate::masm::Operand, CompileError> {
        if let Some(i) = self.args.iter().position(|a| a == name) {
            return Ok(crate::masm::Operand::bp(2 * (i as i32 + 2)));
        }
        if let Some(j) = self.locals.iter().position(|l| l == name) {
            return Ok(crate::masm::Operand::bp(-2 * (j as i32 + 1)));
        }
        Err(CompileError::UnresolvedName {
            context: self.name.clone(),
            name: name.to_string(),
        })
    }
}

/// Lowers a whole module into a `Program`: discovers each function's locals,
/// lays out its frame, and emits the program prelude that jumps straight to
/// `main`.
pub fn compile_module(module: &Module) -> Result<Program, CompileError> {
    let functions = collect_functions(module)?;
    if !functions.contains_key("main") {
        return Err(CompileError::UnsupportedSyntax {
            context: "module".to_string(),
            reason: "no `main` function defined".to_string(),
        });
    }

    let mut program = Program::new();

    // Function bodies are lowered before the prelude is emitted so every
    // `print` call has already registered its data directive by the time
    // the data segment is closed.
    let mut bodies: Vec<Item> = Vec::new();
    for stmt in &module.body {
        if let Stmt::FunctionDef { name, args, body } = stmt {
            let locals = discover_locals(name, body)?;
            let mut ctx = FunctionCtx::new(name.clone(), args.clone(), locals, name == "main");
            lower_function(&mut ctx, body, &mut program, &mut bodies)?;
        }
    }

    program.codes = bodies;
    Ok(program)
}

fn collect_functions<'a>(module: &'a Module) -> Result<HashMap<&'a str, &'a Stmt>, CompileError> {
    let mut functions = HashMap::new();
    for stmt in &module.body {
        if let Stmt::FunctionDef { name, .. } = stmt {
            if functions.insert(name.as_str(), stmt).is_some() {
                return Err(CompileError::UnsupportedSyntax {
                    context: "module".to_string(),
                    reason: format!("duplicate function definition: {name}"),
                });
            }
        }
    }
    Ok(functions)
}

fn lower_function(
    ctx: &mut FunctionCtx,
    body: &[Stmt],
    program: &mut Program,
    out: &mut Vec<Item>,
) -> Result<(), CompileError> {
    // Lowering writes into `program.codes` (so expression/statement helpers
    // that take `&mut Program` stay uniform across call sites); the
    // function's own stream is then lifted out into `out` so functions
    // don't interleave with one another.
    let start = program.codes.len();

    program.label(ctx.name.clone());
    emit_prologue(ctx, program);

    stmt::lower_block(ctx, body, program)?;

    if !matches!(body.last(), Some(Stmt::Return { .. })) {
        stmt::lower_return(ctx, &None, program)?;
    }

    let lowered: Vec<Item> = program.codes.drain(start..).collect();
    out.extend(lowered);
    Ok(())
}

fn emit_prologue(ctx: &FunctionCtx, program: &mut Program) {
    use crate::masm::{Operand, Register};
    program.emit(Instruction::Push(Operand::Register(Register::Bp)));
    program.emit(Instruction::Mov(
        Operand::Register(Register::Bp),
        Operand::Register(Register::Sp),
    ));
    let frame_size = 2 * ctx.locals.len() as i32;
    if frame_size != 0 {
        program.emit(Instruction::Sub(
            Operand::Register(Register::Sp),
            Operand::Immediate(frame_size),
        ));
    }
}

fn emit_epilogue(program: &mut Program) {
    use crate::masm::{Operand, Register};
    program.emit(Instruction::Mov(
        Operand::Register(Register::Sp),
        Operand::Register(Register::Bp),
    ));
    program.emit(Instruction::Pop(Operand::Register(Register::Bp)));
    program.emit(Instruction::Ret(None));
}
