//! Assignment compilation.

use super::expressions::{FieldAccess, FieldKind, binary_opcode};
use super::{Compiler, NumericKind, VariableForm};
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::error::{CompileErrorKind, Result};
use crate::runtime::value::Value;

impl Compiler<'_, '_> {
    /// Compiles `target op value`.
    pub(crate) fn compile_assignment(&mut self, stmt: &Stmt, target: &Expr, op: AssignOp, value: &Expr) -> Result<()> {
        match &target.kind {
            ExprKind::Variable(name) => self.assign_variable(stmt, target, name, VariableForm::Plain, op, value),
            ExprKind::GlobalVariable(name) => self.assign_variable(stmt, target, name, VariableForm::Global, op, value),
            ExprKind::LocalVariable(name) => self.assign_variable(stmt, target, name, VariableForm::Local, op, value),

            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                if *optional {
                    return Err(self.misuse(target.id, target.span, "cannot assign to an optional member"));
                }
                if let Some(field) = self.struct_field(target, object, property)? {
                    return self.assign_field(stmt, target, object, property, field, op, value);
                }

                self.compile_expression(object)?;
                let index = self.name_constant(property);
                self.compile_assigned_value(stmt, target, op, value, |c| {
                    c.emit(target.span, OpCode::Dup, &[]);
                    c.emit(target.span, OpCode::GetProperty, &[index]);
                })?;
                self.emit(stmt.span, OpCode::SetProperty, &[index]);
                Ok(())
            }
            ExprKind::ComputedMember { object, property } => {
                if let ExprKind::String(name) = &property.kind {
                    if let Some(field) = self.struct_field(target, object, name)? {
                        return self.assign_field(stmt, target, object, name, field, op, value);
                    }
                }

                self.compile_expression(object)?;
                self.compile_expression(property)?;
                self.compile_assigned_value(stmt, target, op, value, |c| {
                    c.emit(target.span, OpCode::Dup2, &[]);
                    c.emit(target.span, OpCode::GetComputedProperty, &[]);
                })?;
                self.emit(stmt.span, OpCode::SetComputedProperty, &[]);
                Ok(())
            }
            ExprKind::Index { object, index } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                self.compile_assigned_value(stmt, target, op, value, |c| {
                    c.emit(target.span, OpCode::Dup2, &[]);
                    c.emit(target.span, OpCode::GetIndex, &[]);
                })?;
                self.emit(stmt.span, OpCode::SetIndex, &[]);
                Ok(())
            }
            ExprKind::Slice { object, start, end } => {
                if op != AssignOp::Assign {
                    return Err(self.error(
                        stmt.id,
                        stmt.span,
                        CompileErrorKind::UnsupportedOperator(format!(
                            "compound assignment ({:?}) to a slice",
                            op
                        )),
                    ));
                }
                self.compile_expression(object)?;
                self.compile_optional(target.span, start.as_deref())?;
                self.compile_optional(target.span, end.as_deref())?;
                self.compile_expression(value)?;
                self.emit(stmt.span, OpCode::SetSlice, &[]);
                Ok(())
            }
            ExprKind::NamespaceMember { .. } => {
                Err(self.misuse(target.id, target.span, "cannot assign to a namespace member"))
            }
            _ => Err(self.misuse(target.id, target.span, "invalid assignment target")),
        }
    }

    /// Pushes the value to store. Compound operators first run `read_back`,
    /// which leaves the current value on top of the receiver.
    fn compile_assigned_value(
        &mut self,
        stmt: &Stmt,
        target: &Expr,
        op: AssignOp,
        value: &Expr,
        read_back: impl FnOnce(&mut Self),
    ) -> Result<()> {
        match op.binary() {
            None => self.compile_expression(value),
            Some(binary) => {
                read_back(self);
                self.compile_expression(value)?;
                let opcode = binary_opcode(binary, self.operand_kind(target, value));
                self.emit(stmt.span, opcode, &[]);
                Ok(())
            }
        }
    }

    fn assign_variable(
        &mut self,
        stmt: &Stmt,
        target: &Expr,
        name: &str,
        form: VariableForm,
        op: AssignOp,
        value: &Expr,
    ) -> Result<()> {
        match op.binary() {
            None => {
                self.compile_expression(value)?;
                let defines_global = self.shared.static_check.defines_global(stmt.id);
                self.store_variable(stmt.id, target.span, name, form, defines_global)
            }
            Some(binary) => {
                // The variable must exist before it can be read back
                self.load_variable(target.id, target.span, name, form)?;
                self.compile_expression(value)?;
                let opcode = binary_opcode(binary, self.operand_kind(target, value));
                self.emit(stmt.span, opcode, &[]);
                self.store_variable(stmt.id, target.span, name, form, false)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assign_field(
        &mut self,
        stmt: &Stmt,
        target: &Expr,
        object: &Expr,
        name: &str,
        field: FieldAccess,
        op: AssignOp,
        value: &Expr,
    ) -> Result<()> {
        let Some(store) = field.store_opcode() else {
            return Err(self.error(
                stmt.id,
                stmt.span,
                CompileErrorKind::UnsupportedOperator(format!(
                    "assignment of a whole struct to field '{}'",
                    name
                )),
            ));
        };

        self.compile_expression(object)?;
        match op.binary() {
            None => self.compile_expression(value)?,
            Some(binary) => {
                self.emit(target.span, OpCode::Dup, &[]);
                self.emit(target.span, field.load_opcode(), &field.operands());
                self.compile_expression(value)?;

                let field_kind = match field.kind {
                    FieldKind::Int => Some(NumericKind::Int),
                    FieldKind::Float => Some(NumericKind::Float),
                    FieldKind::Bool | FieldKind::Struct => None,
                };
                let kind = field_kind.filter(|k| self.numeric_kind(value) == Some(*k));
                self.emit(stmt.span, binary_opcode(binary, kind), &[]);
            }
        }
        self.emit(stmt.span, store, &field.operands());
        Ok(())
    }

    // ========================================================================
    // Multi-Assignment
    // ========================================================================

    /// `assign a b c = value`: element `i` of the value goes to target `i`.
    pub(crate) fn compile_multi_assignment(
        &mut self,
        stmt: &Stmt,
        targets: &[Identifier],
        value: &Expr,
        nillable: bool,
    ) -> Result<()> {
        self.compile_expression(value)?;

        let defines_global = self.shared.static_check.defines_global(stmt.id);
        let get = if nillable {
            OpCode::GetIndexOrNil
        } else {
            OpCode::GetIndex
        };

        for (i, target) in targets.iter().enumerate() {
            if i + 1 < targets.len() {
                self.emit(target.span, OpCode::Dup, &[]);
            }
            self.emit_constant(target.span, Value::Int(i as i64));
            self.emit(target.span, get, &[]);
            self.store_variable(stmt.id, target.span, &target.name, VariableForm::Plain, defines_global)?;
        }

        // Nothing to distribute to: drop the value
        if targets.is_empty() {
            self.emit(stmt.span, OpCode::Pop, &[]);
        }
        Ok(())
    }
}
