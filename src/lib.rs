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

pub mod ast;
pub mod codegen;
pub mod errors;
pub mod file_reader;
pub mod locals;
pub mod masm;
pub mod peephole;
pub mod writer;

use std::path::Path;

use anyhow::{Context, Result};

use file_reader::FileReader;

/// Compiles an already-deserialized JSON AST module into final assembly
/// text: code generation, then rendering.
pub fn compile_module(module: &ast::Module) -> Result<String> {
    let program = codegen::compile_module(module).context("Failed during code generation")?;
    Ok(writer::render(&program))
}

/// Compiles the JSON-serialized AST at `source_path` into final assembly
/// text. The driver is expected to write the result to a `.asm` file
/// alongside the input.
pub fn compile<F: FileReader>(source_path: &Path, reader: &F) -> Result<String> {
    let source = reader
        .read_to_string(source_path)
        .with_context(|| format!("Failed to read input file: {}", source_path.display()))?;
    let module: ast::Module =
        serde_json::from_str(&source).with_context(|| format!("Failed to parse AST JSON: {}", source_path.display()))?;
    compile_module(&module)
}
