// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the compiler

use thiserror::Error;

use crate::ast::{NodeId, Span};

/// Result type for compilation
pub type Result<T> = std::result::Result<T, CompileError>;

/// A user-facing compile error.
///
/// Compilation stops at the first one; there is no aggregation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{module}:{span}: {kind}")]
pub struct CompileError {
    /// Name of the module (unit) being compiled
    pub module: String,
    /// Offending node
    pub node: NodeId,
    /// Source span of the offending node
    pub span: Span,
    /// What went wrong
    pub kind: CompileErrorKind,
}

/// The different kinds of compile errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    /// Name not found in the global or current local table
    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),

    /// A capture list names a global
    #[error("cannot capture global '{0}', only locals can be captured")]
    CapturedGlobal(String),

    /// An operand does not fit in its encoding
    #[error("too many {what}: {count} (max {max})")]
    OperandOverflow {
        /// What overflowed
        what: &'static str,
        /// Actual count
        count: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Operator not applicable to its operands
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// A construct used where it is not allowed
    #[error("{0}")]
    Misuse(String),

    /// The symbolic data lacks information needed for code generation
    #[error("missing symbolic information: {0}")]
    MissingSymbolicData(String),

    /// A literal could not be evaluated at compile time
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    /// Write to a constant global
    #[error("cannot reassign constant '{0}'")]
    ConstantReassignment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError {
            module: "main.sb".to_string(),
            node: NodeId(3),
            span: Span::new(10, 14),
            kind: CompileErrorKind::UnresolvedReference("x".to_string()),
        };
        assert_eq!(err.to_string(), "main.sb:10..14: unresolved reference 'x'");
    }

    #[test]
    fn test_overflow_display() {
        let kind = CompileErrorKind::OperandOverflow {
            what: "arguments",
            count: 300,
            max: 255,
        };
        assert_eq!(kind.to_string(), "too many arguments: 300 (max 255)");
    }
}
