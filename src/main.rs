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

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use mpy16c::compile;
use mpy16c::file_reader::StdFileReader;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Path to the JSON-serialized AST to compile.
    input: PathBuf,
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    let reader = StdFileReader;
    let assembly = compile(&opts.input, &reader)?;

    let output_path = opts.input.with_extension("asm");
    fs::write(&output_path, assembly)?;

    println!(
        "Successfully compiled {} to {}",
        opts.input.display(),
        output_path.display()
    );

    Ok(())
}
