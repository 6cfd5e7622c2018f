//! Expression compilation.

use std::sync::Arc;

use super::{Compiler, NumericKind, VariableForm};
use crate::analysis::{FieldType, SymbolicType};
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::compiler::trace::LoopKind;
use crate::error::{CompileErrorKind, Result};
use crate::runtime::value::{IntRange, Quantity, Value};

/// Key under which positional elements of an object literal are collected.
pub const IMPLICIT_PROPERTY_KEY: &str = "";

/// Opcodes building a list or a tuple.
#[derive(Clone, Copy)]
struct SequenceOps {
    create: OpCode,
    append: OpCode,
    spread: OpCode,
}

const LIST_OPS: SequenceOps = SequenceOps {
    create: OpCode::CreateList,
    append: OpCode::AppendList,
    spread: OpCode::SpreadList,
};

const TUPLE_OPS: SequenceOps = SequenceOps {
    create: OpCode::CreateTuple,
    append: OpCode::AppendTuple,
    spread: OpCode::SpreadTuple,
};

/// Kind of a fixed-offset struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Bool,
    Int,
    Float,
    Struct,
}

/// A field access resolved through symbolic data.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldAccess {
    pub struct_size: u16,
    pub offset: u16,
    pub kind: FieldKind,
}

impl FieldAccess {
    pub fn load_opcode(self) -> OpCode {
        match self.kind {
            FieldKind::Bool => OpCode::GetBoolField,
            FieldKind::Int => OpCode::GetIntField,
            FieldKind::Float => OpCode::GetFloatField,
            FieldKind::Struct => OpCode::GetStructFieldPointer,
        }
    }

    /// Store opcode; whole nested structs cannot be stored.
    pub fn store_opcode(self) -> Option<OpCode> {
        match self.kind {
            FieldKind::Bool => Some(OpCode::SetBoolField),
            FieldKind::Int => Some(OpCode::SetIntField),
            FieldKind::Float => Some(OpCode::SetFloatField),
            FieldKind::Struct => None,
        }
    }

    pub fn operands(self) -> [u16; 2] {
        [self.struct_size, self.offset]
    }
}

impl Compiler<'_, '_> {
    // ========================================================================
    // Expression Compilation
    // ========================================================================

    pub(crate) fn compile_expression(&mut self, expr: &Expr) -> Result<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Boolean(true) => {
                self.emit(span, OpCode::PushTrue, &[]);
            }
            ExprKind::Boolean(false) => {
                self.emit(span, OpCode::PushFalse, &[]);
            }
            ExprKind::Nil => {
                self.emit(span, OpCode::PushNil, &[]);
            }
            ExprKind::Integer(_)
            | ExprKind::Float(_)
            | ExprKind::String(_)
            | ExprKind::Rune(_)
            | ExprKind::Quantity(_)
            | ExprKind::Path(_)
            | ExprKind::Url(_)
            | ExprKind::Regex(_) => {
                let value = self.evaluate_literal(expr)?;
                self.emit_constant(span, value);
            }

            ExprKind::Variable(name) => self.load_variable(expr.id, span, name, VariableForm::Plain)?,
            ExprKind::GlobalVariable(name) => self.load_variable(expr.id, span, name, VariableForm::Global)?,
            ExprKind::LocalVariable(name) => self.load_variable(expr.id, span, name, VariableForm::Local)?,

            ExprKind::Binary { op, left, right } => self.compile_binary(expr, *op, left, right)?,
            ExprKind::Unary { op, operand } => {
                self.compile_expression(operand)?;
                let opcode = match op {
                    UnaryOp::Negate => OpCode::Negate,
                    UnaryOp::Not => OpCode::Not,
                };
                self.emit(span, opcode, &[]);
            }

            ExprKind::Member {
                object,
                property,
                optional,
            } => self.compile_member(expr, object, property, *optional)?,
            ExprKind::ComputedMember { object, property } => {
                self.compile_computed_member(expr, object, property)?;
            }
            ExprKind::NamespaceMember { object, member } => {
                self.compile_expression(object)?;
                match self.shared.symbolic.extension_method(expr.id) {
                    Some(method) => {
                        let index = self.name_constant(method);
                        self.emit(span, OpCode::GetExtensionMethod, &[index]);
                    }
                    None => match self.struct_field(expr, object, member)? {
                        Some(field) => {
                            self.emit(span, field.load_opcode(), &field.operands());
                        }
                        None => {
                            let index = self.name_constant(member);
                            self.emit(span, OpCode::GetNamespaceMember, &[index]);
                        }
                    },
                }
            }
            ExprKind::Index { object, index } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                self.emit(span, OpCode::GetIndex, &[]);
            }
            ExprKind::Slice { object, start, end } => {
                self.compile_expression(object)?;
                self.compile_optional(span, start.as_deref())?;
                self.compile_optional(span, end.as_deref())?;
                self.emit(span, OpCode::GetSlice, &[]);
            }

            ExprKind::List(elements) => self.compile_sequence_literal(expr, elements, LIST_OPS)?,
            ExprKind::Tuple(elements) => match self.static_tuple(elements)? {
                Some(value) => self.emit_constant(span, value),
                None => self.compile_sequence_literal(expr, elements, TUPLE_OPS)?,
            },
            ExprKind::Object(literal) => self.compile_object_literal(expr, literal, false)?,
            ExprKind::Record(literal) => match self.static_record(literal)? {
                Some(value) => self.emit_constant(span, value),
                None => self.compile_object_literal(expr, literal, true)?,
            },
            ExprKind::Dictionary(entries) => {
                for entry in entries {
                    self.compile_expression(&entry.key)?;
                    self.compile_expression(&entry.value)?;
                }
                let count = self.count_operand(expr.id, span, "dictionary entries", entries.len(), u16::MAX as usize)?;
                self.emit(span, OpCode::CreateDict, &[count]);
            }

            ExprKind::Call { callee, arguments } => self.compile_call(expr, callee, arguments)?,
            ExprKind::Function(function) => self.compile_function_literal(function)?,
            ExprKind::If {
                test,
                consequent,
                alternate,
            } => {
                // Compile condition
                self.compile_expression(test)?;
                let skip_consequent = self.emit_jump(span, OpCode::JumpIfFalse);

                self.compile_expression(consequent)?;
                let skip_alternate = self.emit_jump(span, OpCode::Jump);

                // The expression always has a value
                self.patch_here(expr.id, span, skip_consequent)?;
                self.compile_optional(span, alternate.as_deref())?;
                self.patch_here(expr.id, span, skip_alternate)?;
            }
            ExprKind::For(for_expr) => self.compile_for_expression(expr, for_expr)?,

            ExprKind::ObjectPattern(_)
            | ExprKind::RecordPattern(_)
            | ExprKind::ListPattern(_)
            | ExprKind::TuplePattern(_)
            | ExprKind::UnionPattern(_)
            | ExprKind::OptionalPattern(_)
            | ExprKind::PatternIdentifier(_)
            | ExprKind::PatternNamespaceMember { .. }
            | ExprKind::PatternConversion(_) => self.compile_pattern(expr)?,
            ExprKind::StringPattern(pattern) => self.compile_string_pattern(pattern)?,

            ExprKind::Spawn(spawn) => self.compile_spawn(expr, spawn)?,
            ExprKind::LifetimeJob(job) => self.compile_lifetime_job(expr, job)?,
            ExprKind::TestSuite(block) => self.compile_test_item(expr.id, span, block, false)?,
            ExprKind::TestCase(block) => self.compile_test_item(expr.id, span, block, true)?,
        }
        Ok(())
    }

    /// Compiles `expr`, or pushes nil when absent.
    pub(crate) fn compile_optional(&mut self, span: Span, expr: Option<&Expr>) -> Result<()> {
        match expr {
            Some(expr) => self.compile_expression(expr),
            None => {
                self.emit(span, OpCode::PushNil, &[]);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// Evaluates a literal at compile time.
    pub(crate) fn evaluate_literal(&self, expr: &Expr) -> Result<Value> {
        let invalid = |message: String| {
            self.error(expr.id, expr.span, CompileErrorKind::InvalidLiteral(message))
        };
        let value = match &expr.kind {
            ExprKind::Integer(n) => Value::Int(*n),
            ExprKind::Float(n) => Value::Float(*n),
            ExprKind::Boolean(b) => Value::Bool(*b),
            ExprKind::Nil => Value::Nil,
            ExprKind::String(s) => Value::string(s),
            ExprKind::Rune(c) => Value::Rune(*c),
            ExprKind::Quantity(parts) => Value::Quantity(Quantity::from_parts(parts).map_err(invalid)?),
            ExprKind::Path(p) => Value::Path(Arc::from(p.as_str())),
            ExprKind::Url(u) => {
                let url = url::Url::parse(u).map_err(|e| invalid(format!("{}: {}", u, e)))?;
                Value::Url(Arc::new(url))
            }
            ExprKind::Regex(r) => {
                let regex = regex::Regex::new(r).map_err(|e| invalid(e.to_string()))?;
                Value::Regex(Arc::new(regex))
            }
            _ => unreachable!("node {} is not a literal", expr.id.0),
        };
        Ok(value)
    }

    fn static_tuple(&self, elements: &[Element]) -> Result<Option<Value>> {
        let all_static = elements
            .iter()
            .all(|e| matches!(e, Element::Single(inner) if inner.kind.is_simple_literal()));
        if !all_static {
            return Ok(None);
        }

        let values = elements
            .iter()
            .map(|e| self.evaluate_literal(e.expr()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Value::Tuple(Arc::from(values))))
    }

    fn static_record(&self, literal: &ObjectLiteral) -> Result<Option<Value>> {
        let all_static = literal.spreads.is_empty()
            && literal.properties.iter().all(|p| {
                matches!(p, ObjectProperty::Keyed { value, .. } if value.kind.is_simple_literal())
            });
        if !all_static {
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(literal.properties.len());
        for property in &literal.properties {
            if let ObjectProperty::Keyed { key, value } = property {
                entries.push((key.clone(), self.evaluate_literal(value)?));
            }
        }
        Ok(Some(Value::Record(Arc::from(entries))))
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_binary(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) -> Result<()> {
        match op {
            BinaryOp::And | BinaryOp::Or | BinaryOp::NilCoalesce => {
                return self.compile_short_circuit(expr, op, left, right);
            }
            BinaryOp::Range | BinaryOp::ExclusiveRange => {
                let inclusive = op == BinaryOp::Range;
                if let (ExprKind::Integer(start), ExprKind::Integer(end)) = (&left.kind, &right.kind) {
                    let range = IntRange {
                        start: *start,
                        end: *end,
                        inclusive,
                    };
                    self.emit_constant(expr.span, Value::IntRange(range));
                    return Ok(());
                }
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit(expr.span, OpCode::CreateRange, &[u16::from(!inclusive)]);
                return Ok(());
            }
            _ => {}
        }

        self.compile_expression(left)?;
        self.compile_expression(right)?;
        let opcode = binary_opcode(op, self.operand_kind(left, right));
        self.emit(expr.span, opcode, &[]);
        Ok(())
    }

    /// Numeric kind shared by both operands, if statically known.
    pub(crate) fn operand_kind(&self, left: &Expr, right: &Expr) -> Option<NumericKind> {
        let kind = self.numeric_kind(left)?;
        (self.numeric_kind(right) == Some(kind)).then_some(kind)
    }

    fn compile_short_circuit(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) -> Result<()> {
        let jump = match op {
            BinaryOp::And => OpCode::JumpIfFalse,
            BinaryOp::Or => OpCode::JumpIfTrue,
            _ => OpCode::JumpIfNotNil,
        };

        self.compile_expression(left)?;
        self.emit(expr.span, OpCode::Dup, &[]);
        let skip_right = self.emit_jump(expr.span, jump);
        self.emit(expr.span, OpCode::Pop, &[]);
        self.compile_expression(right)?;
        self.patch_here(expr.id, expr.span, skip_right)?;
        Ok(())
    }

    // ========================================================================
    // Member Access
    // ========================================================================

    /// Resolves `receiver.name` to a fixed offset when the receiver is a
    /// struct pointer.
    pub(crate) fn struct_field(&self, node: &Expr, receiver: &Expr, name: &str) -> Result<Option<FieldAccess>> {
        let Some(st) = self.symbolic_type(receiver).and_then(SymbolicType::pointee) else {
            return Ok(None);
        };
        let Some(location) = st.field(name) else {
            return Err(self.error(
                node.id,
                node.span,
                CompileErrorKind::MissingSymbolicData(format!(
                    "struct {} has no field '{}'",
                    st.name, name
                )),
            ));
        };

        let struct_size = self.count_operand(node.id, node.span, "bytes in one struct", st.size(), u16::MAX as usize)?;
        let kind = match location.field_type {
            FieldType::Bool => FieldKind::Bool,
            FieldType::Int => FieldKind::Int,
            FieldType::Float => FieldKind::Float,
            FieldType::Struct(_) => FieldKind::Struct,
        };
        Ok(Some(FieldAccess {
            struct_size,
            offset: location.offset as u16,
            kind,
        }))
    }

    fn compile_member(&mut self, expr: &Expr, object: &Expr, property: &str, optional: bool) -> Result<()> {
        if let Some(method) = self.shared.symbolic.extension_method(expr.id) {
            self.compile_expression(object)?;
            let index = self.name_constant(method);
            self.emit(expr.span, OpCode::GetExtensionMethod, &[index]);
            return Ok(());
        }

        // A proven struct pointer is never nil, so `.?` loads the same way
        if let Some(field) = self.struct_field(expr, object, property)? {
            self.compile_expression(object)?;
            self.emit(expr.span, field.load_opcode(), &field.operands());
            return Ok(());
        }

        self.compile_expression(object)?;
        let index = self.name_constant(property);
        let opcode = if optional {
            OpCode::GetOptionalProperty
        } else {
            OpCode::GetProperty
        };
        self.emit(expr.span, opcode, &[index]);
        Ok(())
    }

    fn compile_computed_member(&mut self, expr: &Expr, object: &Expr, property: &Expr) -> Result<()> {
        // A literal key on a struct pointer is as static as a plain member
        if let ExprKind::String(name) = &property.kind {
            if let Some(field) = self.struct_field(expr, object, name)? {
                self.compile_expression(object)?;
                self.emit(expr.span, field.load_opcode(), &field.operands());
                return Ok(());
            }
        }

        self.compile_expression(object)?;
        self.compile_expression(property)?;
        self.emit(expr.span, OpCode::GetComputedProperty, &[]);
        Ok(())
    }

    // ========================================================================
    // Containers
    // ========================================================================

    fn compile_sequence_literal(&mut self, expr: &Expr, elements: &[Element], ops: SequenceOps) -> Result<()> {
        let prefix = elements.iter().take_while(|e| !e.is_spread()).count();
        for element in &elements[..prefix] {
            self.compile_expression(element.expr())?;
        }
        let count = self.count_operand(expr.id, expr.span, "container elements", prefix, u16::MAX as usize)?;
        self.emit(expr.span, ops.create, &[count]);

        let mut pending = 0;
        for element in &elements[prefix..] {
            match element {
                Element::Single(inner) => {
                    self.compile_expression(inner)?;
                    pending += 1;
                }
                Element::Spread(inner) => {
                    self.flush_elements(expr, ops, pending)?;
                    pending = 0;
                    self.compile_expression(inner)?;
                    self.emit(inner.span, ops.spread, &[]);
                }
            }
        }
        self.flush_elements(expr, ops, pending)
    }

    /// Appends the `pending` elements sitting on the stack.
    fn flush_elements(&mut self, expr: &Expr, ops: SequenceOps, pending: usize) -> Result<()> {
        if pending > 0 {
            let count = self.count_operand(expr.id, expr.span, "container elements", pending, u16::MAX as usize)?;
            self.emit(expr.span, ops.append, &[count]);
        }
        Ok(())
    }

    fn compile_object_literal(&mut self, expr: &Expr, literal: &ObjectLiteral, is_record: bool) -> Result<()> {
        if is_record && !literal.spreads.is_empty() {
            return Err(self.misuse(expr.id, expr.span, "spread is not allowed in a record literal"));
        }

        let mut property_count = 0;
        let mut elements = Vec::new();
        for property in &literal.properties {
            match property {
                ObjectProperty::Keyed { key, value } => {
                    let index = self.name_constant(key);
                    self.emit(value.span, OpCode::PushConstant, &[index]);
                    self.compile_expression(value)?;
                    property_count += 1;
                }
                ObjectProperty::Element(element) => elements.push(element),
            }
        }

        // Positional elements become one list under the implicit key
        if !elements.is_empty() {
            let index = self.name_constant(IMPLICIT_PROPERTY_KEY);
            self.emit(expr.span, OpCode::PushConstant, &[index]);
            for element in &elements {
                self.compile_expression(element)?;
            }
            let count = self.count_operand(expr.id, expr.span, "container elements", elements.len(), u16::MAX as usize)?;
            self.emit(expr.span, OpCode::CreateList, &[count]);
            property_count += 1;
        }

        let count = self.count_operand(expr.id, expr.span, "properties", property_count, u16::MAX as usize)?;
        let create = if is_record {
            OpCode::CreateRecord
        } else {
            OpCode::CreateObject
        };
        self.emit(expr.span, create, &[count]);

        for spread in &literal.spreads {
            self.compile_expression(spread)?;
            self.emit(spread.span, OpCode::SpreadObject, &[]);
        }
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn compile_call(&mut self, expr: &Expr, callee: &Expr, arguments: &[Element]) -> Result<()> {
        let last = arguments.len().saturating_sub(1);
        if let Some((_, spread)) = arguments
            .iter()
            .enumerate()
            .find(|(i, arg)| arg.is_spread() && *i != last)
        {
            let spread = spread.expr();
            return Err(self.misuse(spread.id, spread.span, "only the last argument can be spread"));
        }

        self.compile_expression(callee)?;
        for argument in arguments {
            self.compile_expression(argument.expr())?;
        }

        let argc = self.count_operand(expr.id, expr.span, "arguments", arguments.len(), u8::MAX as usize)?;
        let spread = arguments.last().is_some_and(Element::is_spread);
        self.emit(expr.span, OpCode::Call, &[argc, u16::from(spread)]);
        Ok(())
    }

    // ========================================================================
    // For Expressions
    // ========================================================================

    fn compile_for_expression(&mut self, expr: &Expr, for_expr: &ForExpression) -> Result<()> {
        let span = expr.span;
        let key = for_expr.key.as_ref();
        let value = for_expr.value.as_ref();

        let length = self.define_hidden_local(expr.id, span, "length")?;
        self.emit_constant(span, Value::Int(0));
        self.emit(span, OpCode::SetLocal, &[length]);

        self.compile_expression(&for_expr.iterated)?;
        let flags = self.compile_loop_patterns(key, value)?;
        self.emit(span, OpCode::IterInit, &[flags]);
        let iterator = self.define_hidden_local(expr.id, span, "iterator")?;
        self.emit(span, OpCode::SetLocal, &[iterator]);

        let bindings = self.define_loop_bindings(expr.id, key, value)?;
        self.compile_loop(LoopKind::For, expr.id, span, iterator, OpCode::IterNext, &bindings, |c| {
            c.compile_expression(&for_expr.body)?;
            c.emit(span, OpCode::GetLocal, &[length]);
            c.emit_constant(span, Value::Int(1));
            c.emit(span, OpCode::IntAdd, &[]);
            c.emit(span, OpCode::SetLocal, &[length]);
            Ok(())
        })?;

        self.emit(span, OpCode::GetLocal, &[length]);
        self.emit(span, OpCode::CreateListDynamic, &[]);
        Ok(())
    }
}

/// Opcode for a non-short-circuit binary operator.
pub(crate) fn binary_opcode(op: BinaryOp, kind: Option<NumericKind>) -> OpCode {
    use NumericKind::{Float, Int};

    match (op, kind) {
        (BinaryOp::Add, Some(Int)) => OpCode::IntAdd,
        (BinaryOp::Add, Some(Float)) => OpCode::FloatAdd,
        (BinaryOp::Add, None) => OpCode::Add,
        (BinaryOp::Sub, Some(Int)) => OpCode::IntSub,
        (BinaryOp::Sub, Some(Float)) => OpCode::FloatSub,
        (BinaryOp::Sub, None) => OpCode::Sub,
        (BinaryOp::Mul, Some(Int)) => OpCode::IntMul,
        (BinaryOp::Mul, Some(Float)) => OpCode::FloatMul,
        (BinaryOp::Mul, None) => OpCode::Mul,
        (BinaryOp::Div, Some(Int)) => OpCode::IntDiv,
        (BinaryOp::Div, Some(Float)) => OpCode::FloatDiv,
        (BinaryOp::Div, None) => OpCode::Div,
        (BinaryOp::Less, Some(Int)) => OpCode::IntLess,
        (BinaryOp::Less, Some(Float)) => OpCode::FloatLess,
        (BinaryOp::Less, None) => OpCode::Less,
        (BinaryOp::LessEq, Some(Int)) => OpCode::IntLessEq,
        (BinaryOp::LessEq, Some(Float)) => OpCode::FloatLessEq,
        (BinaryOp::LessEq, None) => OpCode::LessEq,
        (BinaryOp::Greater, Some(Int)) => OpCode::IntGreater,
        (BinaryOp::Greater, Some(Float)) => OpCode::FloatGreater,
        (BinaryOp::Greater, None) => OpCode::Greater,
        (BinaryOp::GreaterEq, Some(Int)) => OpCode::IntGreaterEq,
        (BinaryOp::GreaterEq, Some(Float)) => OpCode::FloatGreaterEq,
        (BinaryOp::GreaterEq, None) => OpCode::GreaterEq,
        (BinaryOp::Equal, _) => OpCode::Equal,
        (BinaryOp::NotEqual, _) => OpCode::NotEqual,
        (BinaryOp::Is, _) => OpCode::Is,
        (BinaryOp::IsNot, _) => OpCode::IsNot,
        (BinaryOp::In, _) => OpCode::In,
        (BinaryOp::NotIn, _) => OpCode::NotIn,
        (BinaryOp::Keyof, _) => OpCode::Keyof,
        (BinaryOp::Match, _) => OpCode::Match,
        (BinaryOp::NotMatch, _) => OpCode::NotMatch,
        (BinaryOp::Substrof, _) => OpCode::Substrof,
        (
            BinaryOp::Range | BinaryOp::ExclusiveRange | BinaryOp::And | BinaryOp::Or | BinaryOp::NilCoalesce,
            _,
        ) => unreachable!("{:?} has a dedicated lowering", op),
    }
}
