//! Pattern compilation.
//!
//! Value patterns (`%{...}`, `%[...]`, `%int?`, ...) build on the expression
//! compiler: every sub-expression that is not itself a pattern is converted
//! with `ToPattern`. String patterns have their own grammar and are lowered
//! recursively; their leaves are pre-built at compile time.

use std::sync::Arc;

use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::error::{CompileErrorKind, Result};
use crate::runtime::value::{PrebuiltPattern, Value};

/// Returns true for expressions that already evaluate to a pattern.
fn is_pattern(kind: &ExprKind) -> bool {
    matches!(
        kind,
        ExprKind::ObjectPattern(_)
            | ExprKind::RecordPattern(_)
            | ExprKind::ListPattern(_)
            | ExprKind::TuplePattern(_)
            | ExprKind::UnionPattern(_)
            | ExprKind::OptionalPattern(_)
            | ExprKind::PatternIdentifier(_)
            | ExprKind::PatternNamespaceMember { .. }
            | ExprKind::PatternConversion(_)
            | ExprKind::StringPattern(_)
    )
}

/// Operands of `CreateRepeatedPattern`: kind, then exact count.
fn repetition_operands(repetition: Repetition) -> [u16; 2] {
    match repetition {
        Repetition::ZeroOrMore => [0, 0],
        Repetition::AtLeastOne => [1, 0],
        Repetition::Optional => [2, 0],
        Repetition::Exactly(count) => [3, u16::from(count)],
    }
}

impl Compiler<'_, '_> {
    /// Pushes `expr` as a pattern.
    pub(crate) fn compile_pattern_operand(&mut self, expr: &Expr) -> Result<()> {
        if is_pattern(&expr.kind) {
            return self.compile_expression(expr);
        }
        self.compile_expression(expr)?;
        self.emit(expr.span, OpCode::ToPattern, &[]);
        Ok(())
    }

    /// Compiles a value-pattern literal.
    pub(crate) fn compile_pattern(&mut self, expr: &Expr) -> Result<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::PatternIdentifier(name) => {
                let index = self.name_constant(name);
                self.emit(span, OpCode::ResolvePattern, &[index]);
            }
            ExprKind::PatternNamespaceMember { namespace, member } => {
                let namespace = self.name_constant(namespace);
                let member = self.name_constant(member);
                self.emit(span, OpCode::ResolvePatternNamespaceMember, &[namespace, member]);
            }
            ExprKind::PatternConversion(inner) => {
                self.compile_expression(inner)?;
                self.emit(span, OpCode::ToPattern, &[]);
            }
            ExprKind::ObjectPattern(literal) => {
                self.compile_object_pattern(expr, literal, OpCode::CreateObjectPattern)?;
            }
            ExprKind::RecordPattern(literal) => {
                if !literal.spreads.is_empty() {
                    return Err(self.misuse(expr.id, span, "spread is not allowed in a record pattern"));
                }
                self.compile_object_pattern(expr, literal, OpCode::CreateRecordPattern)?;
            }
            ExprKind::ListPattern(literal) => {
                self.compile_sequence_pattern(expr, literal, OpCode::CreateListPattern)?;
            }
            ExprKind::TuplePattern(literal) => {
                self.compile_sequence_pattern(expr, literal, OpCode::CreateTuplePattern)?;
            }
            ExprKind::UnionPattern(cases) => {
                for case in cases {
                    self.compile_pattern_operand(case)?;
                }
                let count = self.count_operand(expr.id, span, "union cases", cases.len(), u16::MAX as usize)?;
                self.emit(span, OpCode::CreateUnionPattern, &[count]);
            }
            ExprKind::OptionalPattern(inner) => {
                self.compile_pattern_operand(inner)?;
                self.emit(span, OpCode::CreateOptionalPattern, &[]);
            }
            ExprKind::StringPattern(pattern) => self.compile_string_pattern(pattern)?,
            _ => unreachable!("node {} is not a pattern", expr.id.0),
        }
        Ok(())
    }

    fn compile_object_pattern(&mut self, expr: &Expr, literal: &ObjectPatternLiteral, create: OpCode) -> Result<()> {
        for property in &literal.properties {
            let key = self.name_constant(&property.key);
            self.emit(property.value.span, OpCode::PushConstant, &[key]);
            self.compile_pattern_operand(&property.value)?;
        }

        let count = self.count_operand(expr.id, expr.span, "pattern properties", literal.properties.len(), u16::MAX as usize)?;
        self.emit(expr.span, create, &[count, u16::from(literal.exact)]);

        for spread in &literal.spreads {
            self.compile_pattern_operand(spread)?;
            self.emit(spread.span, OpCode::SpreadObjectPattern, &[]);
        }
        Ok(())
    }

    /// A list or tuple pattern has fixed elements or one general element.
    fn compile_sequence_pattern(&mut self, expr: &Expr, literal: &SequencePatternLiteral, create: OpCode) -> Result<()> {
        match &literal.general {
            Some(general) => {
                if !literal.elements.is_empty() {
                    return Err(self.misuse(
                        expr.id,
                        expr.span,
                        "a sequence pattern cannot have both elements and a general element",
                    ));
                }
                self.compile_pattern_operand(general)?;
                self.emit(expr.span, create, &[0, 1]);
            }
            None => {
                for element in &literal.elements {
                    self.compile_pattern_operand(element)?;
                }
                let count = self.count_operand(expr.id, expr.span, "pattern elements", literal.elements.len(), u16::MAX as usize)?;
                self.emit(expr.span, create, &[count, 0]);
            }
        }
        Ok(())
    }

    // ========================================================================
    // String Patterns
    // ========================================================================

    pub(crate) fn compile_string_pattern(&mut self, pattern: &StringPattern) -> Result<()> {
        let span = pattern.span;
        match &pattern.kind {
            StringPatternKind::Exact(s) => {
                let prebuilt = PrebuiltPattern::Exact(s.clone());
                self.emit_constant(span, Value::Pattern(Arc::new(prebuilt)));
            }
            StringPatternKind::RuneRange { start, end } => {
                if start > end {
                    return Err(self.error(
                        pattern.id,
                        span,
                        CompileErrorKind::InvalidLiteral(format!("empty rune range {:?}..{:?}", start, end)),
                    ));
                }
                let prebuilt = PrebuiltPattern::RuneRange {
                    start: *start,
                    end: *end,
                };
                self.emit_constant(span, Value::Pattern(Arc::new(prebuilt)));
            }
            StringPatternKind::Regex(source) => {
                let regex = regex::Regex::new(source).map_err(|e| {
                    self.error(pattern.id, span, CompileErrorKind::InvalidLiteral(e.to_string()))
                })?;
                self.emit_constant(span, Value::Pattern(Arc::new(PrebuiltPattern::Regex(regex))));
            }
            StringPatternKind::Named(name) => {
                let index = self.name_constant(name);
                self.emit(span, OpCode::ResolvePattern, &[index]);
            }
            StringPatternKind::Union(cases) => {
                for case in cases {
                    self.compile_string_pattern(case)?;
                }
                let count = self.count_operand(pattern.id, span, "union cases", cases.len(), u16::MAX as usize)?;
                self.emit(span, OpCode::CreateStringUnionPattern, &[count]);
            }
            StringPatternKind::Sequence(elements) => {
                let mut groups = Vec::with_capacity(elements.len());
                for element in elements {
                    self.compile_string_pattern(&element.pattern)?;
                    if let Some(repetition) = element.repetition {
                        self.emit(element.pattern.span, OpCode::CreateRepeatedPattern, &repetition_operands(repetition));
                    }
                    groups.push(element.group.clone());
                }

                let count = self.count_operand(pattern.id, span, "sequence elements", elements.len(), u16::MAX as usize)?;
                let names = self.add_constant(Value::GroupNames(Arc::from(groups)));
                self.emit(span, OpCode::CreateSequencePattern, &[count, names]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetition_operands() {
        assert_eq!(repetition_operands(Repetition::ZeroOrMore), [0, 0]);
        assert_eq!(repetition_operands(Repetition::Optional), [2, 0]);
        assert_eq!(repetition_operands(Repetition::Exactly(4)), [3, 4]);
    }

    #[test]
    fn test_is_pattern() {
        assert!(is_pattern(&ExprKind::PatternIdentifier("int".to_string())));
        assert!(!is_pattern(&ExprKind::Integer(1)));
        assert!(!is_pattern(&ExprKind::Variable("p".to_string())));
    }
}
