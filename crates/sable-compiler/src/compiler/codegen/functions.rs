//! Function literals, declarations and hoisting.

use std::sync::Arc;

use tracing::debug;

use super::Compiler;
use crate::analysis::HoistPoint;
use crate::ast::*;
use crate::compiler::bytecode::{CompiledFunction, OpCode, SourceSpan};
use crate::error::{CompileErrorKind, Result};
use crate::runtime::value::Value;

impl Compiler<'_, '_> {
    // ========================================================================
    // Function Literals
    // ========================================================================

    /// Compiles a function literal, leaving the function (bound to its
    /// captured values, if any) on the stack.
    pub(crate) fn compile_function_literal(&mut self, function: &FunctionLiteral) -> Result<()> {
        let captures: Vec<String> = match self.shared.static_check.captures_of(function.id) {
            Some(names) => names.to_vec(),
            None => function.captures.iter().map(|c| c.name.clone()).collect(),
        };

        // Captured names are looked up in the enclosing function
        let mut captured_slots = Vec::with_capacity(captures.len());
        for name in &captures {
            match self.frame().locals.resolve(name) {
                Some(symbol) => captured_slots.push(symbol.index),
                None if self.globals.contains(name) => {
                    return Err(self.error(
                        function.id,
                        function.span,
                        CompileErrorKind::CapturedGlobal(name.clone()),
                    ));
                }
                None => {
                    return Err(self.error(
                        function.id,
                        function.span,
                        CompileErrorKind::UnresolvedReference(name.clone()),
                    ));
                }
            }
        }
        let capture_count = self.count_operand(
            function.id,
            function.span,
            "captured locals",
            captures.len(),
            u8::MAX as usize,
        )?;

        self.enter_scope();
        if let Err(e) = self.compile_function_body(function, &captures) {
            self.discard_scope();
            return Err(e);
        }
        let (instructions, source_map, local_count) = self.leave_scope(function.id, function.span)?;
        let compiled = CompiledFunction {
            instructions,
            local_count,
            param_count: function.params.len(),
            variadic: function.params.last().is_some_and(|p| p.variadic),
            source_map,
            owner: Some(self.unit),
            span: Some(SourceSpan {
                chunk: self.chunk.name.clone(),
                span: function.span,
            }),
        };
        self.emit_constant(function.span, Value::Function(Arc::new(compiled)));

        // Values are read now, so later writes to the locals are not seen
        if !captured_slots.is_empty() {
            for slot in captured_slots {
                self.emit(function.span, OpCode::GetLocal, &[slot]);
            }
            self.emit(function.span, OpCode::BindCapturedLocals, &[capture_count]);
        }
        Ok(())
    }

    /// Defines parameters and captures in the open scope, then compiles the
    /// body with its implicit return.
    fn compile_function_body(&mut self, function: &FunctionLiteral, captures: &[String]) -> Result<()> {
        for param in &function.params {
            self.define_local(function.id, param.name.span, &param.name.name)?;
        }
        for name in captures {
            self.define_local(function.id, function.span, name)?;
        }

        match &function.body {
            FunctionBody::Expression(body) => {
                self.compile_expression(body)?;
                self.emit(body.span, OpCode::Return, &[1]);
            }
            FunctionBody::Block(block) => {
                self.compile_statements(&block.statements, Some(function.id))?;
                if !always_returns(&block.statements) {
                    let end = Span::new(block.span.end, block.span.end);
                    self.emit(end, OpCode::Return, &[0]);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// `fn name(...) { ... }` binds a constant global.
    pub(crate) fn compile_function_declaration(&mut self, stmt: &Stmt, declaration: &FunctionDeclaration) -> Result<()> {
        let name = &declaration.name.name;
        self.check_global_writable(stmt.id, declaration.name.span, name)?;

        // Defined first so the body can call itself
        self.define_global(stmt.id, declaration.name.span, name, true)?;
        self.compile_function_literal(&declaration.function)?;
        self.store_global(stmt.span, name);
        Ok(())
    }

    /// Emits every function hoisted to `point`, skipping them later.
    pub(crate) fn hoist_functions(&mut self, point: &HoistPoint, statements: &[Stmt]) -> Result<()> {
        debug!(
            module = %self.module,
            position = point.position,
            count = point.functions.len(),
            "hoisting functions"
        );

        let mut declarations = Vec::with_capacity(point.functions.len());
        for id in &point.functions {
            let found = statements.iter().find_map(|stmt| match &stmt.kind {
                StmtKind::FunctionDeclaration(declaration) if stmt.id == *id => Some((stmt, declaration)),
                _ => None,
            });
            match found {
                Some(entry) => declarations.push(entry),
                None => panic!(
                    "hoisted node {} is not a function declaration of its scope",
                    id.0
                ),
            }
        }

        // Every name first: hoisted functions may call each other
        for (stmt, declaration) in &declarations {
            self.define_global(stmt.id, declaration.name.span, &declaration.name.name, true)?;
        }
        for (stmt, declaration) in declarations {
            if !self.hoisted.insert(stmt.id) {
                continue;
            }
            self.compile_function_literal(&declaration.function)?;
            self.store_global(stmt.span, &declaration.name.name);
        }
        Ok(())
    }
}

/// Whether control can never fall off the end of `statements`.
fn always_returns(statements: &[Stmt]) -> bool {
    match statements.last().map(|stmt| &stmt.kind) {
        Some(StmtKind::Return(_)) => true,
        Some(StmtKind::Block(block)) => always_returns(&block.statements),
        Some(StmtKind::If {
            consequent,
            alternate: Some(alternate),
            ..
        }) => always_returns(&consequent.statements) && always_returns(std::slice::from_ref(alternate.as_ref())),
        _ => false,
    }
}
