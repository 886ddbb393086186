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

//! Renders a `Program` into the final MASM-dialect text, running each
//! label-to-label batch through the peephole optimizer before it is
//! printed. Instructions are kept as typed values until the last moment so
//! the optimizer sees structure, not text.

use crate::codegen::{Item, Program};
use crate::masm::{DataDirective, Instruction, Operand, Register};
use crate::peephole::optimize_batch;

const TAB: &str = "    ";

struct AssemblyWriter {
    out: String,
    batch: Vec<Instruction>,
}

impl AssemblyWriter {
    fn new() -> AssemblyWriter {
        AssemblyWriter {
            out: String::new(),
            batch: Vec::new(),
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
    }

    /// Flushes the pending batch through the peephole optimizer and prints
    /// it, one instruction per indented line. Called at every label or
    /// segment boundary, matching the batch/flush discipline of the source.
    fn flush(&mut self) {
        let batch = std::mem::take(&mut self.batch);
        for ins in optimize_batch(batch) {
            self.out.push_str(TAB);
            self.out.push_str(&ins.to_string());
            self.out.push('\n');
        }
    }

    fn add_assume(&mut self, cs_segment: &str, ds_segment: &str) {
        self.out.push_str(&format!("assume cs:{cs_segment}, ds:{ds_segment}\n"));
        self.newline();
    }

    fn add_segment_header(&mut self, name: &str) {
        self.out.push_str(&format!("{name} segment\n"));
    }

    fn add_segment_footer(&mut self, name: &str) {
        self.flush();
        self.out.push_str(&format!("{name} ends\n"));
        self.newline();
    }

    fn add_raw_data_line(&mut self, text: &str) {
        self.out.push_str(TAB);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn add_data_directive(&mut self, directive: &DataDirective) {
        self.add_raw_data_line(&directive.to_string());
    }

    fn add_label(&mut self, label: &str) {
        self.flush();
        self.out.push_str(&format!("{label}:\n"));
    }

    fn add_code(&mut self, ins: Instruction) {
        self.batch.push(ins);
    }

    fn add_end(&mut self, entry: &str) {
        self.out.push_str(&format!("end {entry}\n"));
    }
}

/// Renders a whole `Program` into the final assembly text, per the output
/// skeleton: `assume`, a `data` segment (the conventional leading `db ?`
/// placeholder followed by every registered data directive), then a `code`
/// segment starting with the DOS entry trampoline (`start:` loads `ds` and
/// jumps to `main`) followed by every function body in emission order.
pub fn render(program: &Program) -> String {
    let mut w = AssemblyWriter::new();

    w.add_assume("code", "data");

    w.add_segment_header("data");
    w.add_raw_data_line("db ?");
    for directive in &program.data {
        w.add_data_directive(directive);
    }
    w.add_segment_footer("data");

    w.add_segment_header("code");
    w.add_label("start");
    w.add_code(Instruction::Mov(
        Operand::Register(Register::Ax),
        Operand::Symbolic("data".to_string()),
    ));
    w.add_code(Instruction::Mov(
        Operand::Register(Register::Ds),
        Operand::Register(Register::Ax),
    ));
    w.add_code(Instruction::Jmp(None, Operand::Symbolic("main".to_string())));

    for item in &program.codes {
        match item {
            Item::Instruction(ins) => w.add_code(ins.clone()),
            Item::Label(label) => w.add_label(label),
        }
    }
    w.add_segment_footer("code");

    w.add_end("start");

    w.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masm::DataArg;

    #[test]
    fn empty_program_matches_the_output_skeleton() {
        let program = Program::default();
        let text = render(&program);
        assert!(text.starts_with("assume cs:code, ds:data\n\n"));
        assert!(text.contains("data segment\n    db ?\ndata ends\n\n"));
        assert!(text.contains("code segment\nstart:\n    mov ax, data\n    mov ds, ax\n    jmp main\n"));
        assert!(text.contains("code ends\n\nend start\n"));
    }

    #[test]
    fn data_directives_are_indented_under_the_placeholder() {
        let mut program = Program::default();
        program.data.push(DataDirective::new(
            Some("data0".to_string()),
            vec![DataArg::Str("hi".to_string())],
        ));
        let text = render(&program);
        assert!(text.contains("    db ?\n    data0 db 'hi'\ndata ends"));
    }

    #[test]
    fn function_labels_flush_the_pending_batch_through_the_optimizer() {
        // push [bp+4]; push 42; pop ax; pop ax collapses to two movs.
        let mut program = Program::default();
        program.codes.push(Item::Label("main".to_string()));
        program.codes.push(Item::Instruction(Instruction::Push(Operand::bp(4))));
        program.codes.push(Item::Instruction(Instruction::Push(Operand::Immediate(42))));
        program
            .codes
            .push(Item::Instruction(Instruction::Pop(Operand::Register(Register::Ax))));
        program
            .codes
            .push(Item::Instruction(Instruction::Pop(Operand::Register(Register::Ax))));

        let text = render(&program);
        assert!(text.contains("main:\n    mov ax, 42\n    mov ax, ds:[bp+4]\n"));
        assert!(!text.contains("push"));
    }
}
