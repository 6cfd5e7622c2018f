//! Embedded modules: `go` routines, lifetime jobs and tests.
//!
//! Each construct is compiled by a child [`Compiler`] into its own unit with
//! its own globals. The enclosing unit only references it through a
//! `Value::Unit` constant; scheduling is left to the runtime.

use tracing::debug;

use super::{Compiler, UnitBody};
use crate::ast::*;
use crate::compiler::bytecode::{OpCode, UnitId};
use crate::error::Result;
use crate::runtime::value::Value;

impl Compiler<'_, '_> {
    /// Whether test statements compile in the current chunk.
    pub(crate) fn tests_enabled(&self) -> bool {
        let options = self.shared.options;
        options.run_tests && (!self.in_included_chunk || options.propagate_tests_to_included_chunks)
    }

    /// Names of the globals visible at this point.
    fn visible_globals(&self) -> Vec<String> {
        self.globals.names().map(str::to_string).collect()
    }

    /// Compiles `body` into a new unit whose globals are `globals`.
    fn compile_embedded_unit(
        &mut self,
        node: NodeId,
        span: Span,
        label: &str,
        body: UnitBody<'_>,
        globals: &[String],
    ) -> Result<UnitId> {
        let module = format!("{}::{}{}", self.module, label, node.0);
        debug!(parent = %self.module, module = %module, globals = globals.len(), "compiling embedded module");

        let mut child = Compiler::new(
            self.shared,
            &mut *self.arena,
            module,
            self.chunk.clone(),
            globals.iter().map(String::as_str),
        );
        child.in_included_chunk = self.in_included_chunk;
        child.compile_unit(body, node, span)
    }

    // ========================================================================
    // Routines
    // ========================================================================

    pub(crate) fn compile_spawn(&mut self, expr: &Expr, spawn: &SpawnExpression) -> Result<()> {
        let span = expr.span;
        self.compile_optional(span, spawn.meta.as_ref())?;

        // An explicit globals object restricts what the routine sees
        let globals = match &spawn.globals {
            Some(entries) => {
                for (name, value) in entries {
                    let key = self.name_constant(&name.name);
                    self.emit(name.span, OpCode::PushConstant, &[key]);
                    self.compile_expression(value)?;
                }
                let count = self.count_operand(expr.id, span, "properties", entries.len(), u16::MAX as usize)?;
                self.emit(span, OpCode::CreateObject, &[count]);
                entries.iter().map(|(name, _)| name.name.clone()).collect()
            }
            None => {
                self.emit(span, OpCode::PushNil, &[]);
                self.visible_globals()
            }
        };

        let (body, callee) = match &spawn.body {
            SpawnBody::Block(block) => (UnitBody::Statements(&block.statements), None),
            SpawnBody::Call(call) => {
                let ExprKind::Call { callee, .. } = &call.kind else {
                    return Err(self.misuse(call.id, call.span, "a spawned expression must be a call"));
                };
                let name = match &callee.kind {
                    ExprKind::Variable(name) | ExprKind::GlobalVariable(name) => Some(name.clone()),
                    _ => None,
                };
                (UnitBody::Expression(call), name)
            }
        };

        let unit = self.compile_embedded_unit(expr.id, span, "routine", body, &globals)?;
        let unit = self.add_constant(Value::Unit(unit));
        let source = self.add_constant(Value::string(self.chunk.slice(span)));
        let callee = match callee {
            Some(name) => self.name_constant(&name),
            None => self.add_constant(Value::Nil),
        };
        self.emit(span, OpCode::SpawnRoutine, &[unit, source, callee]);
        Ok(())
    }

    pub(crate) fn compile_lifetime_job(&mut self, expr: &Expr, job: &LifetimeJobExpression) -> Result<()> {
        let span = expr.span;
        self.compile_expression(&job.meta)?;
        match &job.subject {
            Some(subject) => self.compile_pattern_operand(subject)?,
            None => {
                self.emit(span, OpCode::PushNil, &[]);
            }
        }

        let globals = self.visible_globals();
        let unit = self.compile_embedded_unit(expr.id, span, "lifetimejob", UnitBody::Statements(&job.body.statements), &globals)?;
        let unit = self.add_constant(Value::Unit(unit));
        self.emit(span, OpCode::CreateLifetimeJob, &[unit]);
        Ok(())
    }

    // ========================================================================
    // Tests
    // ========================================================================

    /// Pushes a test suite or test case value.
    pub(crate) fn compile_test_item(&mut self, node: NodeId, span: Span, block: &TestBlock, is_case: bool) -> Result<()> {
        self.compile_optional(span, block.meta.as_ref())?;

        let (label, create) = if is_case {
            ("testcase", OpCode::CreateTestCase)
        } else {
            ("testsuite", OpCode::CreateTestSuite)
        };
        let globals = self.visible_globals();
        let unit = self.compile_embedded_unit(node, span, label, UnitBody::Statements(&block.body.statements), &globals)?;
        let unit = self.add_constant(Value::Unit(unit));
        self.emit(span, create, &[unit]);
        Ok(())
    }

    /// Test statements run right away, or compile to nothing when disabled.
    pub(crate) fn compile_test_statement(&mut self, stmt: &Stmt, block: &TestBlock, is_case: bool) -> Result<()> {
        if !self.tests_enabled() {
            return Ok(());
        }
        self.compile_test_item(stmt.id, stmt.span, block, is_case)?;
        self.emit(stmt.span, OpCode::RunTest, &[]);
        Ok(())
    }
}
