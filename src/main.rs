// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Sable - command-line front end for the bytecode compiler
//!
//! Reads a compile request (an AST chunk plus the analysis data produced by
//! the checker) from JSON, compiles it and prints the disassembly.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use sable_compiler::ast::Chunk;
use sable_compiler::compiler::{CompileOptions, TraceWriter};
use sable_compiler::{CompileInput, StaticCheckData, SymbolicData, compile};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sable", version, about = "Sable bytecode compiler")]
struct Cli {
    /// Log compiler decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a JSON compile request and print the disassembly
    Compile {
        /// Path to the compile request
        input: PathBuf,

        /// Print every compilation event to stderr
        #[arg(long)]
        trace: bool,

        /// Compile test statements
        #[arg(long, conflicts_with = "no_tests")]
        run_tests: bool,

        /// Never compile test statements, whatever the request says
        #[arg(long)]
        no_tests: bool,

        /// Also compile test statements of included chunks
        #[arg(long)]
        include_tests_in_chunks: bool,

        /// Module name of the root unit
        #[arg(long)]
        module_name: Option<String>,
    },
}

/// Everything the compiler needs, as produced by the front end.
#[derive(Deserialize)]
struct CompileRequest {
    chunk: Chunk,
    #[serde(default)]
    static_check: StaticCheckData,
    #[serde(default)]
    symbolic: SymbolicData,
    #[serde(default)]
    globals: Vec<String>,
    #[serde(default)]
    options: CompileOptions,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Compile {
            input,
            trace,
            run_tests,
            no_tests,
            include_tests_in_chunks,
            module_name,
        } => {
            let overrides = Overrides {
                trace,
                run_tests,
                no_tests,
                include_tests_in_chunks,
                module_name,
            };
            run_compile(&input, overrides)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "sable_compiler=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line flags layered over the request's options.
struct Overrides {
    trace: bool,
    run_tests: bool,
    no_tests: bool,
    include_tests_in_chunks: bool,
    module_name: Option<String>,
}

impl Overrides {
    fn apply(self, options: &mut CompileOptions) {
        options.run_tests |= self.run_tests;
        options.propagate_tests_to_included_chunks |= self.include_tests_in_chunks;
        if self.no_tests {
            options.run_tests = false;
            options.propagate_tests_to_included_chunks = false;
        }
        if self.module_name.is_some() {
            options.module_name = self.module_name;
        }
    }
}

fn run_compile(path: &Path, overrides: Overrides) -> anyhow::Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let mut request: CompileRequest =
        serde_json::from_str(&text).with_context(|| format!("invalid compile request '{}'", path.display()))?;

    let trace = overrides.trace;
    overrides.apply(&mut request.options);

    let mut input = CompileInput::new(&request.chunk)
        .with_static_check(&request.static_check)
        .with_symbolic(&request.symbolic)
        .with_globals(&request.globals)
        .with_options(&request.options);
    if trace {
        input = input.with_observer(Arc::new(TraceWriter::new(std::io::stderr())));
    }

    let artifact = compile(input)?;
    tracing::info!(units = artifact.units().len(), "compiled {}", path.display());

    println!("{}", artifact.disassemble());
    eprintln!(
        "{} {} ({} units)",
        "Compiled".green().bold(),
        request.chunk.name.cyan(),
        artifact.units().len()
    );
    Ok(())
}
