//! Bytecode compiler for Sable.
//!
//! Transforms the AST into bytecode units that can be executed by the VM.
//!
//! # Module Structure
//!
//! - `bytecode`: opcodes, instruction decoding, units and artifacts
//! - `buffer`: per-function instruction buffer with jump patching
//! - `codegen`: code generation from AST
//!   - `codegen::scope`: symbol tables and loop records
//! - `disasm`: instruction listings
//! - `trace`: compilation observer and text trace

pub mod buffer;
pub mod bytecode;
pub mod codegen;
pub mod disasm;
pub mod trace;

use serde::{Deserialize, Serialize};

pub use bytecode::{
    Artifact, Bytecode, CompiledFunction, Decoder, Instruction, OpCode, SourceMap, SourceSpan,
    UnitId,
};
pub use trace::{CompileObserver, LoopKind, TraceWriter};

/// Options controlling code generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Compile `testsuite` / `testcase` statements
    pub run_tests: bool,

    /// Also compile test statements found in included chunks
    pub propagate_tests_to_included_chunks: bool,

    /// Module name of the root unit, defaults to the chunk name
    pub module_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default_from_empty_json() {
        let options: CompileOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompileOptions::default());
        assert!(!options.run_tests);
    }

    #[test]
    fn test_options_partial_json() {
        let options: CompileOptions = serde_json::from_str(r#"{"run_tests": true}"#).unwrap();
        assert!(options.run_tests);
        assert!(!options.propagate_tests_to_included_chunks);
    }
}
