//! Human-readable instruction listings.

use std::fmt::Write;

use super::bytecode::{Artifact, Bytecode, CompiledFunction, OpCode};
use crate::runtime::value::Value;

/// Whether the first operand of `opcode` indexes the constant pool.
fn references_constant(opcode: OpCode) -> bool {
    matches!(
        opcode,
        OpCode::PushConstant
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetProperty
            | OpCode::GetOptionalProperty
            | OpCode::SetProperty
            | OpCode::GetNamespaceMember
            | OpCode::GetExtensionMethod
            | OpCode::ResolvePattern
            | OpCode::ResolvePatternNamespaceMember
            | OpCode::AddPattern
            | OpCode::AddPatternNamespace
            | OpCode::SpawnRoutine
            | OpCode::CreateLifetimeJob
            | OpCode::CreateTestSuite
            | OpCode::CreateTestCase
    )
}

/// Appends the listing of one function to `out`.
pub fn disassemble_function(function: &CompiledFunction, constants: &[Value], out: &mut String) {
    for (position, instruction) in function.decode() {
        let text = instruction.to_string();
        let _ = write!(out, "{:04}  {:<32}", position, text);
        let constant = instruction
            .operand()
            .filter(|_| references_constant(instruction.opcode))
            .and_then(|index| constants.get(index as usize));
        if let Some(value) = constant {
            let _ = write!(out, "; {}", value);
        }
        if let Some(span) = function.source_map.lookup(position) {
            let _ = write!(out, " @{}", span.span);
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
    }
}

impl Bytecode {
    /// Lists the unit's constants and functions.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "== unit {} {} ({} constants) ==",
            self.id,
            self.module,
            self.constants.len()
        );
        for (index, value) in self.constants.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}", index, value);
        }

        let _ = writeln!(out, "-- main --");
        disassemble_function(&self.main, &self.constants, &mut out);

        for (index, value) in self.constants.iter().enumerate() {
            if let Value::Function(function) = value {
                let _ = writeln!(
                    out,
                    "-- function [{}] params={} locals={}{} --",
                    index,
                    function.param_count,
                    function.local_count,
                    if function.variadic { " variadic" } else { "" }
                );
                disassemble_function(function, &self.constants, &mut out);
            }
        }
        out
    }
}

impl Artifact {
    /// Lists every unit, root first.
    pub fn disassemble(&self) -> String {
        self.units()
            .iter()
            .map(Bytecode::disassemble)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
