// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # sable-compiler
//!
//! The bytecode compiler at the center of the Sable embedded scripting runtime.
//!
//! ## Overview
//!
//! Given a parsed chunk plus the side data of the two analysis passes that run
//! before it, this crate produces:
//! - a linear instruction stream for a stack-based virtual machine
//! - a constant pool of values evaluated at compile time
//! - a source map from instruction positions back to source spans
//!
//! Embedded sub-programs (spawned routines, lifetime jobs, test blocks) are
//! compiled into their own [`Bytecode`] units, all collected in one
//! [`Artifact`].
//!
//! ## Quick Start
//!
//! ```rust
//! use sable_compiler::ast::{AstBuilder, BinaryOp};
//! use sable_compiler::{compile, CompileInput};
//!
//! let mut b = AstBuilder::new();
//! let one = b.int(1);
//! let two = b.int(2);
//! let sum = b.binary(BinaryOp::Add, one, two);
//! let ret = b.ret(Some(sum));
//! let chunk = b.chunk("main.sb", vec![ret]);
//!
//! let artifact = compile(CompileInput::new(&chunk)).unwrap();
//! assert_eq!(artifact.root().constants.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod ast;
pub mod compiler;
pub mod error;
pub mod runtime;

use std::sync::Arc;

pub use analysis::{StaticCheckData, SymbolicData, SymbolicType};
pub use compiler::{
    Artifact, Bytecode, CompileObserver, CompileOptions, CompiledFunction, OpCode, TraceWriter,
    UnitId,
};
pub use error::{CompileError, CompileErrorKind, Result};
pub use runtime::value::Value;

/// Everything a single top-level compilation needs.
///
/// Only the chunk is mandatory; the analysis data defaults to "nothing
/// known", which makes the compiler fall back to generic opcodes.
pub struct CompileInput<'a> {
    /// The parsed program unit
    pub chunk: &'a ast::Chunk,
    /// Output of the static-check pass
    pub static_check: &'a StaticCheckData,
    /// Output of the symbolic pass
    pub symbolic: &'a SymbolicData,
    /// Names of the globals the runtime will provide
    pub globals: &'a [String],
    /// Compile options
    pub options: &'a CompileOptions,
    /// Optional observer receiving trace events
    pub observer: Option<Arc<dyn CompileObserver>>,
}

static EMPTY_STATIC_CHECK: std::sync::LazyLock<StaticCheckData> =
    std::sync::LazyLock::new(StaticCheckData::default);
static EMPTY_SYMBOLIC: std::sync::LazyLock<SymbolicData> =
    std::sync::LazyLock::new(SymbolicData::default);
static DEFAULT_OPTIONS: std::sync::LazyLock<CompileOptions> =
    std::sync::LazyLock::new(CompileOptions::default);

impl<'a> CompileInput<'a> {
    /// Creates an input with empty analysis data, no globals and default options.
    pub fn new(chunk: &'a ast::Chunk) -> Self {
        Self {
            chunk,
            static_check: &EMPTY_STATIC_CHECK,
            symbolic: &EMPTY_SYMBOLIC,
            globals: &[],
            options: &DEFAULT_OPTIONS,
            observer: None,
        }
    }

    /// Sets the static-check data.
    pub fn with_static_check(mut self, data: &'a StaticCheckData) -> Self {
        self.static_check = data;
        self
    }

    /// Sets the symbolic data.
    pub fn with_symbolic(mut self, data: &'a SymbolicData) -> Self {
        self.symbolic = data;
        self
    }

    /// Sets the names of the globals provided by the runtime.
    pub fn with_globals(mut self, globals: &'a [String]) -> Self {
        self.globals = globals;
        self
    }

    /// Sets the compile options.
    pub fn with_options(mut self, options: &'a CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches an observer.
    pub fn with_observer(mut self, observer: Arc<dyn CompileObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// Compiles a chunk into an [`Artifact`].
///
/// The first error aborts the whole compilation, including errors raised
/// inside embedded modules.
pub fn compile(input: CompileInput<'_>) -> Result<Artifact> {
    compiler::codegen::compile_program(input)
}
