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

use std::path::Path;

use mpy16c::ast::{CmpOperator, Expr, Module, Operator, Stmt};
use mpy16c::compile;
use mpy16c::compile_module;
use mpy16c::file_reader::{MockFileReader, StdFileReader};

fn main_module(body: Vec<Stmt>) -> Module {
    Module {
        body: vec![Stmt::FunctionDef {
            name: "main".to_string(),
            args: vec![],
            body,
        }],
    }
}

/// Printing a string literal emits one data directive and the DOS print
/// sequence, with an implicit exit code of 0.
#[test]
fn hello_print_emits_one_data_directive_and_the_dos_print_sequence() {
    let module = main_module(vec![Stmt::Expr {
        value: Expr::Call {
            func: "print".to_string(),
            args: vec![Expr::Str("hello".to_string())],
            keywords: vec![],
        },
    }]);

    let asm = compile_module(&module).unwrap();
    assert!(asm.contains("data0 db 'hello', 0ah, 0dh, '$'"));
    assert!(asm.contains("mov dx, offset data0"));
    assert!(asm.contains("mov ah, 9"));
    assert!(asm.contains("int 33")); // 0x21
    assert!(asm.contains("mov ax, 19456")); // 0x4c00, implicit exit 0
}

/// Putchar of a local variable.
#[test]
fn putchar_of_a_local_variable() {
    let module = main_module(vec![
        Stmt::Assign {
            targets: vec![Expr::Name("c".to_string())],
            value: Expr::Num(65),
        },
        Stmt::Expr {
            value: Expr::Call {
                func: "putchar".to_string(),
                args: vec![Expr::Name("c".to_string())],
                keywords: vec![],
            },
        },
    ]);

    let asm = compile_module(&module).unwrap();
    assert!(asm.contains("mov dl, al"));
    assert!(asm.contains("mov ah, 2"));
    // `c` is the function's only local, at [bp-2].
    assert!(asm.contains("ds:[bp-2]"));
}

/// A recursive gcd call, exercising the caller-cleaned calling convention
/// and a user function distinct from `main`.
#[test]
fn gcd_recursion_uses_the_caller_cleaned_calling_convention() {
    let module = Module {
        body: vec![
            Stmt::FunctionDef {
                name: "gcd".to_string(),
                args: vec!["a".to_string(), "b".to_string()],
                body: vec![
                    Stmt::If {
                        test: Expr::Compare {
                            left: Box::new(Expr::Name("b".to_string())),
                            op: CmpOperator::Eq,
                            right: Box::new(Expr::Num(0)),
                        },
                        body: vec![Stmt::Return {
                            value: Some(Expr::Name("a".to_string())),
                        }],
                        orelse: vec![],
                    },
                    Stmt::Return {
                        value: Some(Expr::Call {
                            func: "gcd".to_string(),
                            args: vec![
                                Expr::Name("b".to_string()),
                                Expr::BinOp {
                                    left: Box::new(Expr::Name("a".to_string())),
                                    op: Operator::Mod,
                                    right: Box::new(Expr::Name("b".to_string())),
                                },
                            ],
                            keywords: vec![],
                        }),
                    },
                ],
            },
            Stmt::FunctionDef {
                name: "main".to_string(),
                args: vec![],
                body: vec![Stmt::Expr {
                    value: Expr::Call {
                        func: "gcd".to_string(),
                        args: vec![Expr::Num(42), Expr::Num(70)],
                        keywords: vec![],
                    },
                }],
            },
        ],
    };

    let asm = compile_module(&module).unwrap();
    assert!(asm.contains("gcd:"));
    assert!(asm.contains("call gcd"));
    assert!(asm.contains("add sp, 4")); // two pushed args cleaned up by the caller
    // `a` and `b` are parameters at [bp+4] and [bp+6].
    assert!(asm.contains("[bp+4]"));
    assert!(asm.contains("[bp+6]"));
}

/// Counting down with a negative step, exercising the `for` desugar's `>`
/// comparison and its dedicated increment label.
#[test]
fn for_loop_counts_down_with_a_negative_step() {
    let module = main_module(vec![Stmt::For {
        target: Expr::Name("i".to_string()),
        iter: Expr::Call {
            func: "range".to_string(),
            args: vec![
                Expr::Num(10),
                Expr::Num(0),
                Expr::UnaryOp {
                    op: mpy16c::ast::UnaryOperator::USub,
                    operand: Box::new(Expr::Num(1)),
                },
            ],
            keywords: vec![],
        },
        body: vec![Stmt::Expr {
            value: Expr::Call {
                func: "putchar".to_string(),
                args: vec![Expr::Name("i".to_string())],
                keywords: vec![],
            },
        }],
    }]);

    let asm = compile_module(&module).unwrap();
    assert!(asm.contains("_main_0_for_start:"));
    assert!(asm.contains("_main_0_for_inc:"));
    assert!(asm.contains("_main_0_for_break:"));
    assert!(asm.lines().any(|l| l.trim_start().starts_with("ja ")));
}

/// Compiling the same AST twice produces byte-identical output.
#[test]
fn compiling_the_same_module_twice_is_deterministic() {
    let module = main_module(vec![Stmt::Return { value: Some(Expr::Num(7)) }]);
    let first = compile_module(&module).unwrap();
    let second = compile_module(&module).unwrap();
    assert_eq!(first, second);
}

/// A program without `main` is rejected before any assembly is produced.
#[test]
fn missing_main_function_is_rejected() {
    let module = Module {
        body: vec![Stmt::FunctionDef {
            name: "helper".to_string(),
            args: vec![],
            body: vec![Stmt::Pass],
        }],
    };
    assert!(compile_module(&module).is_err());
}

/// The file-reading driver path: a JSON-serialized AST on disk (via the mock
/// reader) compiles the same as the in-memory module above.
#[test]
fn compile_reads_and_deserializes_a_json_ast_file() {
    let module = main_module(vec![Stmt::Return { value: Some(Expr::Num(3)) }]);
    let json = serde_json::to_string(&module).unwrap();

    let mut reader = MockFileReader::default();
    reader.add_file("prog.json", &json);

    let asm = compile(Path::new("prog.json"), &reader).unwrap();
    assert!(asm.contains("mov ax, 19459")); // 0x4c00 | 3
}

/// A main return value outside -128..=127 is a hard compile error, not a
/// silent truncation.
#[test]
fn main_return_value_out_of_range_is_an_error() {
    let module = main_module(vec![Stmt::Return { value: Some(Expr::Num(200)) }]);
    assert!(compile_module(&module).is_err());
}

/// The production `StdFileReader` path: a JSON AST written to a real file on
/// disk compiles identically to the in-memory module, exercising the same
/// `fs::read_to_string` path `main.rs` uses.
#[test]
fn compile_reads_a_json_ast_from_a_real_file() {
    let module = main_module(vec![
        Stmt::Assign {
            targets: vec![Expr::Name("c".to_string())],
            value: Expr::Num(65),
        },
        Stmt::Expr {
            value: Expr::Call {
                func: "putchar".to_string(),
                args: vec![Expr::Name("c".to_string())],
                keywords: vec![],
            },
        },
    ]);
    let json = serde_json::to_string(&module).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.json");
    std::fs::write(&path, json).unwrap();

    let reader = StdFileReader;
    let asm = compile(&path, &reader).unwrap();
    assert!(asm.contains("mov dl, al"));
}
