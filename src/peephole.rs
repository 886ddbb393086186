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

//! The Peephole Optimizer: push/pop collapse followed by single
//! instruction strength reduction, applied to one batch at a time. A batch
//! is never crossed by a label or segment boundary, so both passes are
//! purely local.

use crate::masm::{Instruction, Operand};

#[derive(PartialEq, Eq)]
enum State {
    Default,
    Push,
    Pop,
}

/// Pass 1: collapses adjacent push-runs/pop-runs into `mov`s, pairing the
/// innermost push with the first pop, the next-innermost with the second,
/// and so on.
pub fn collapse_push_pop(codes: Vec<Instruction>) -> Vec<Instruction> {
    let mut out: Vec<Instruction> = Vec::with_capacity(codes.len());
    let mut state = State::Default;
    let mut pushes: usize = 0;
    let mut pops: usize = 0;

    // Replaces the innermost `min(pushes, pops)` pushes/pops at the tail of
    // `out` with their equivalent `mov`s, in reverse-pairing order.
    fn combine(out: &mut Vec<Instruction>, pushes: usize, pops: usize) {
        let mid = out.len() - pops;
        let k = pushes.min(pops);
        let mut moves = Vec::with_capacity(k);
        for i in 0..k {
            let pop_operand = out[mid + i].stack_operand().expect("pop in pop run").clone();
            let push_operand = out[mid - i - 1].stack_operand().expect("push in push run").clone();
            if push_operand != pop_operand {
                moves.push(Instruction::mov_from(pop_operand, push_operand));
            }
        }
        out.splice(mid - k..mid + k, moves);
    }

    for ins in codes {
        let op = ins.mnemonic();
        match state {
            State::Default => {
                if op == "push" {
                    state = State::Push;
                    pushes = 1;
                } else {
                    pushes = 0;
                    pops = 0;
                }
            }
            State::Push => {
                if op == "push" {
                    pushes += 1;
                } else if op == "pop" {
                    state = State::Pop;
                    pops = 1;
                } else {
                    state = State::Default;
                    pushes = 0;
                    pops = 0;
                }
            }
            State::Pop => {
                if op == "pop" {
                    pops += 1;
                } else {
                    combine(&mut out, pushes, pops);
                    if op == "push" {
                        state = State::Push;
                        pushes = 1;
                        pops = 0;
                    } else {
                        state = State::Default;
                        pushes = 0;
                        pops = 0;
                    }
                }
            }
        }
        out.push(ins);
    }

    if state == State::Pop {
        combine(&mut out, pushes, pops);
    }

    out
}

/// Pass 2: folds a handful of single-instruction patterns into a smaller or
/// flag-cheaper equivalent.
pub fn strength_reduce(codes: Vec<Instruction>) -> Vec<Instruction> {
    codes.into_iter().filter_map(reduce_one).collect()
}

fn reduce_one(ins: Instruction) -> Option<Instruction> {
    match &ins {
        Instruction::Mov(dst, Operand::Immediate(0)) => {
            Some(Instruction::Xor(dst.clone(), dst.clone()))
        }
        Instruction::Add(dst, Operand::Immediate(1)) => Some(Instruction::Inc(dst.clone())),
        Instruction::Add(_, Operand::Immediate(0)) => None,
        Instruction::Add(dst, Operand::Immediate(-1)) => Some(Instruction::Dec(dst.clone())),
        Instruction::Sub(dst, Operand::Immediate(1)) => Some(Instruction::Dec(dst.clone())),
        Instruction::Sub(_, Operand::Immediate(0)) => None,
        Instruction::Sub(dst, Operand::Immediate(-1)) => Some(Instruction::Inc(dst.clone())),
        _ => Some(ins),
    }
}

/// Runs both passes over one batch, in order.
pub fn optimize_batch(codes: Vec<Instruction>) -> Vec<Instruction> {
    strength_reduce(collapse_push_pop(codes))
}
