//! Statement and control-flow compilation.

use tracing::{debug, trace};

use super::{ChunkContext, Compiler, VariableForm};
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::compiler::codegen::scope::LoopRecord;
use crate::compiler::trace::LoopKind;
use crate::error::{CompileErrorKind, Result};

/// One `match`/`switch` case, normalized.
struct Case<'s> {
    values: &'s [Expr],
    group_binding: Option<&'s Identifier>,
    body: &'s Block,
}

/// Returns true once the statement walk reaches a hoisting position.
fn crosses(span: Span, position: u32) -> bool {
    span.start >= position || span.contains(position)
}

impl Compiler<'_, '_> {
    // ========================================================================
    // Statement Lists
    // ========================================================================

    /// Compiles a statement list; `scope` names the hoisting scope it forms.
    pub(crate) fn compile_statements(&mut self, statements: &[Stmt], scope: Option<NodeId>) -> Result<()> {
        let mut hoist_point = scope.and_then(|s| self.shared.static_check.hoist_point(s));

        for stmt in statements {
            if let Some(point) = hoist_point {
                if crosses(stmt.span, point.position) {
                    // Cleared before firing: hoisted bodies must not re-trigger it.
                    hoist_point = None;
                    self.hoist_functions(point, statements)?;
                }
            }

            if self.hoisted.contains(&stmt.id) {
                continue;
            }
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn compile_block(&mut self, block: &Block) -> Result<()> {
        self.compile_statements(&block.statements, None)
    }

    // ========================================================================
    // Statement Compilation
    // ========================================================================

    pub(crate) fn compile_statement(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(stmt.span, OpCode::Pop, &[]);
            }
            StmtKind::LocalDeclarations(declarations) => {
                for declaration in declarations {
                    self.compile_local_declaration(stmt, declaration)?;
                }
            }
            StmtKind::GlobalDeclarations(declarations) => {
                for declaration in declarations {
                    self.compile_global_declaration(stmt, declaration)?;
                }
            }
            StmtKind::Assignment { target, op, value } => {
                self.compile_assignment(stmt, target, *op, value)?;
            }
            StmtKind::MultiAssignment {
                targets,
                value,
                nillable,
            } => {
                self.compile_multi_assignment(stmt, targets, value, *nillable)?;
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.compile_if_statement(stmt, test, consequent, alternate.as_deref())?;
            }
            StmtKind::For(for_stmt) => self.compile_for_statement(stmt, for_stmt)?,
            StmtKind::Walk(walk) => self.compile_walk_statement(stmt, walk)?,
            StmtKind::Break => self.compile_loop_exit(stmt, true)?,
            StmtKind::Continue => self.compile_loop_exit(stmt, false)?,
            StmtKind::Prune => {
                let iterator = match self.frame().innermost_walk() {
                    Some(record) => record.iterator,
                    None => return Err(self.misuse(stmt.id, stmt.span, "prune outside of a walk")),
                };
                self.emit(stmt.span, OpCode::GetLocal, &[iterator]);
                self.emit(stmt.span, OpCode::IterPrune, &[]);
            }
            StmtKind::Return(value) => match value {
                Some(value) => {
                    self.compile_expression(value)?;
                    self.emit(stmt.span, OpCode::Return, &[1]);
                }
                None => {
                    self.emit(stmt.span, OpCode::Return, &[0]);
                }
            },
            StmtKind::Switch(switch) => {
                let cases: Vec<Case<'_>> = switch
                    .cases
                    .iter()
                    .map(|c| Case {
                        values: &c.values,
                        group_binding: None,
                        body: &c.body,
                    })
                    .collect();
                self.compile_case_chain(stmt, &switch.discriminant, &cases, switch.default.as_ref(), false)?;
            }
            StmtKind::Match(match_stmt) => {
                let cases: Vec<Case<'_>> = match_stmt
                    .cases
                    .iter()
                    .map(|c| Case {
                        values: &c.values,
                        group_binding: c.group_binding.as_ref(),
                        body: &c.body,
                    })
                    .collect();
                self.compile_case_chain(stmt, &match_stmt.discriminant, &cases, match_stmt.default.as_ref(), true)?;
            }
            StmtKind::Block(block) => self.compile_block(block)?,
            StmtKind::FunctionDeclaration(declaration) => {
                self.compile_function_declaration(stmt, declaration)?;
            }
            StmtKind::PatternDefinition { name, pattern } => {
                self.compile_pattern_operand(pattern)?;
                let index = self.name_constant(name);
                self.emit(stmt.span, OpCode::AddPattern, &[index]);
            }
            StmtKind::PatternNamespaceDefinition { name, namespace } => {
                self.compile_expression(namespace)?;
                let index = self.name_constant(name);
                self.emit(stmt.span, OpCode::AddPatternNamespace, &[index]);
            }
            StmtKind::StructDefinition { .. } => {
                // Layouts reach the compiler through the symbolic data.
            }
            StmtKind::Include(included) => self.compile_included_chunk(included)?,
            StmtKind::TestSuite(block) => self.compile_test_statement(stmt, block, false)?,
            StmtKind::TestCase(block) => self.compile_test_statement(stmt, block, true)?,
        }
        Ok(())
    }

    fn compile_local_declaration(&mut self, stmt: &Stmt, declaration: &LocalDeclaration) -> Result<()> {
        // Compile the value first: `var x = x` reads the outer `x`
        self.compile_expression(&declaration.value)?;
        if let Some(pattern) = &declaration.type_annotation {
            self.compile_pattern_operand(pattern)?;
            self.emit(pattern.span, OpCode::AssertType, &[]);
        }
        let slot = self.define_local(stmt.id, declaration.name.span, &declaration.name.name)?;
        self.emit(stmt.span, OpCode::SetLocal, &[slot]);
        Ok(())
    }

    fn compile_global_declaration(&mut self, stmt: &Stmt, declaration: &GlobalDeclaration) -> Result<()> {
        let name = &declaration.name.name;
        self.check_global_writable(stmt.id, declaration.name.span, name)?;
        self.compile_expression(&declaration.value)?;
        self.define_global(stmt.id, declaration.name.span, name, declaration.constant)?;
        self.store_global(stmt.span, name);
        Ok(())
    }

    /// Fails if `name` is a constant global.
    pub(crate) fn check_global_writable(&self, node: NodeId, span: Span, name: &str) -> Result<()> {
        if self.globals.resolve(name).is_some_and(|s| s.is_constant) {
            return Err(self.error(
                node,
                span,
                CompileErrorKind::ConstantReassignment(name.to_string()),
            ));
        }
        Ok(())
    }

    fn compile_included_chunk(&mut self, included: &IncludedChunk) -> Result<()> {
        debug!(chunk = %included.chunk.name, module = %self.module, "compiling included chunk");
        let outer_chunk = std::mem::replace(&mut self.chunk, ChunkContext::of(&included.chunk));
        let outer_included = std::mem::replace(&mut self.in_included_chunk, true);

        let result = self.compile_statements(&included.chunk.statements, Some(included.chunk.id));

        self.chunk = outer_chunk;
        self.in_included_chunk = outer_included;
        result
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    fn compile_if_statement(&mut self, stmt: &Stmt, test: &Expr, consequent: &Block, alternate: Option<&Stmt>) -> Result<()> {
        // Compile condition
        self.compile_expression(test)?;
        let skip_consequent = self.emit_jump(stmt.span, OpCode::JumpIfFalse);

        // Compile consequent
        self.compile_block(consequent)?;

        match alternate {
            Some(alternate) => {
                let skip_alternate = self.emit_jump(stmt.span, OpCode::Jump);
                self.patch_here(stmt.id, stmt.span, skip_consequent)?;
                self.compile_statement(alternate)?;
                self.patch_here(stmt.id, stmt.span, skip_alternate)?;
            }
            None => self.patch_here(stmt.id, stmt.span, skip_consequent)?,
        }
        Ok(())
    }

    /// `switch` (equality) and `match` (pattern) share one lowering.
    fn compile_case_chain(
        &mut self,
        stmt: &Stmt,
        discriminant: &Expr,
        cases: &[Case<'_>],
        default: Option<&Block>,
        is_match: bool,
    ) -> Result<()> {
        self.compile_expression(discriminant)?;

        let total_values: usize = cases.iter().map(|c| c.values.len()).sum();
        let mut seen = 0;
        let mut end_jumps = Vec::new();

        for case in cases {
            let group_slot = match case.group_binding.filter(|_| is_match) {
                Some(binding) => Some(self.define_local(stmt.id, binding.span, &binding.name)?),
                None => None,
            };

            for value in case.values {
                seen += 1;
                let last = seen == total_values;
                if !last {
                    self.emit(value.span, OpCode::Dup, &[]);
                }

                self.compile_expression(value)?;
                match (is_match, group_slot) {
                    (false, _) => self.emit(value.span, OpCode::Equal, &[]),
                    (true, Some(slot)) => self.emit(value.span, OpCode::GroupMatch, &[slot]),
                    (true, None) => self.emit(value.span, OpCode::Match, &[]),
                };
                let next_case = self.emit_jump(value.span, OpCode::JumpIfFalse);

                if !last {
                    self.emit(value.span, OpCode::Pop, &[]);
                }
                self.compile_block(case.body)?;
                end_jumps.push(self.emit_jump(case.body.span, OpCode::Jump));
                self.patch_here(stmt.id, value.span, next_case)?;
            }
        }

        // Without any case value the discriminant is still on the stack
        if total_values == 0 {
            self.emit(stmt.span, OpCode::Pop, &[]);
        }
        if let Some(default) = default {
            self.compile_block(default)?;
        }

        for jump in end_jumps {
            self.patch_here(stmt.id, stmt.span, jump)?;
        }
        Ok(())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// Hidden local holding an iterator or counter; `#` keeps it out of reach.
    pub(crate) fn define_hidden_local(&mut self, node: NodeId, span: Span, role: &str) -> Result<u16> {
        let name = format!("#{}{}", role, node.0);
        self.define_local(node, span, &name)
    }

    /// Pushes the type patterns of loop bindings, returning the `IterInit` flags.
    pub(crate) fn compile_loop_patterns(&mut self, key: Option<&LoopBinding>, value: Option<&LoopBinding>) -> Result<u16> {
        let mut flags = 0;
        if let Some(pattern) = key.and_then(|k| k.pattern.as_ref()) {
            self.compile_pattern_operand(pattern)?;
            flags |= 1;
        }
        if let Some(pattern) = value.and_then(|v| v.pattern.as_ref()) {
            self.compile_pattern_operand(pattern)?;
            flags |= 2;
        }
        Ok(flags)
    }

    /// Defines the locals of the loop bindings, paired with the fetching opcode.
    pub(crate) fn define_loop_bindings(
        &mut self,
        node: NodeId,
        key: Option<&LoopBinding>,
        value: Option<&LoopBinding>,
    ) -> Result<Vec<(OpCode, u16)>> {
        let mut bindings = Vec::new();
        if let Some(key) = key {
            bindings.push((OpCode::IterKey, self.define_local(node, key.name.span, &key.name.name)?));
        }
        if let Some(value) = value {
            bindings.push((OpCode::IterValue, self.define_local(node, value.name.span, &value.name.name)?));
        }
        Ok(bindings)
    }

    /// Emits the shared loop shape after the iterator is stored in `iterator`:
    /// re-fetch, advance, exit branch, bindings, body, back-edge.
    pub(crate) fn compile_loop(
        &mut self,
        kind: LoopKind,
        node: NodeId,
        span: Span,
        iterator: u16,
        advance: OpCode,
        bindings: &[(OpCode, u16)],
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let loop_start = self.position();
        self.emit(span, OpCode::GetLocal, &[iterator]);
        self.emit(span, advance, &[]);
        let exit = self.emit_jump(span, OpCode::JumpIfFalse);

        trace!(kind = kind.name(), "enter loop");
        self.frame_mut().loops.push(LoopRecord::new(kind, iterator));
        if let Some(observer) = &self.shared.observer {
            observer.loop_entered(kind);
        }

        for (fetch, slot) in bindings {
            self.emit(span, OpCode::GetLocal, &[iterator]);
            self.emit(span, *fetch, &[]);
            self.emit(span, OpCode::SetLocal, &[*slot]);
        }
        let result = body(self);

        let record = match self.frame_mut().loops.pop() {
            Some(record) => record,
            None => panic!("loop stack underflow"),
        };
        if let Some(observer) = &self.shared.observer {
            observer.loop_left(kind);
        }
        trace!(kind = kind.name(), "leave loop");
        result?;

        let back_edge = self.position();
        self.emit_jump_to(node, span, OpCode::Jump, loop_start)?;
        self.patch_here(node, span, exit)?;

        let end = self.position();
        for site in record.break_sites {
            self.patch_jump(node, span, site, end)?;
        }
        for site in record.continue_sites {
            self.patch_jump(node, span, site, back_edge)?;
        }
        Ok(())
    }

    fn compile_for_statement(&mut self, stmt: &Stmt, for_stmt: &ForStatement) -> Result<()> {
        let key = for_stmt.key.as_ref();
        let value = for_stmt.value.as_ref();

        // Compile iterated value, then the iterator
        self.compile_expression(&for_stmt.iterated)?;
        let mut flags = self.compile_loop_patterns(key, value)?;
        if for_stmt.chunked {
            flags |= 4;
        }
        self.emit(stmt.span, OpCode::IterInit, &[flags]);
        let iterator = self.define_hidden_local(stmt.id, stmt.span, "iterator")?;
        self.emit(stmt.span, OpCode::SetLocal, &[iterator]);

        let bindings = self.define_loop_bindings(stmt.id, key, value)?;
        let advance = if for_stmt.chunked {
            OpCode::IterNextChunk
        } else {
            OpCode::IterNext
        };
        self.compile_loop(LoopKind::For, stmt.id, stmt.span, iterator, advance, &bindings, |c| {
            c.compile_block(&for_stmt.body)
        })
    }

    fn compile_walk_statement(&mut self, stmt: &Stmt, walk: &WalkStatement) -> Result<()> {
        self.compile_expression(&walk.walked)?;
        self.emit(stmt.span, OpCode::WalkInit, &[]);
        let iterator = self.define_hidden_local(stmt.id, stmt.span, "walker")?;
        self.emit(stmt.span, OpCode::SetLocal, &[iterator]);

        let mut bindings = vec![(
            OpCode::IterValue,
            self.define_local(stmt.id, walk.entry.span, &walk.entry.name)?,
        )];
        if let Some(meta) = &walk.meta {
            bindings.push((OpCode::IterKey, self.define_local(stmt.id, meta.span, &meta.name)?));
        }

        self.compile_loop(LoopKind::Walk, stmt.id, stmt.span, iterator, OpCode::IterNext, &bindings, |c| {
            c.compile_block(&walk.body)
        })
    }

    fn compile_loop_exit(&mut self, stmt: &Stmt, is_break: bool) -> Result<()> {
        let keyword = if is_break { "break" } else { "continue" };
        if self.frame().loops.is_empty() {
            return Err(self.misuse(stmt.id, stmt.span, format!("{} outside of a loop", keyword)));
        }

        let jump = self.emit_jump(stmt.span, OpCode::Jump);
        match self.frame_mut().innermost_loop() {
            Some(record) if is_break => record.break_sites.push(jump),
            Some(record) => record.continue_sites.push(jump),
            None => unreachable!("loop stack emptied while emitting {}", keyword),
        }
        Ok(())
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Stores the value on top of the stack into a variable, defining it on
    /// first write.
    pub(crate) fn store_variable(
        &mut self,
        node: NodeId,
        span: Span,
        name: &str,
        form: VariableForm,
        defines_global: bool,
    ) -> Result<()> {
        use super::Binding;

        match self.resolve(name, form) {
            Some(Binding::Global { is_constant: true }) => Err(self.error(
                node,
                span,
                CompileErrorKind::ConstantReassignment(name.to_string()),
            )),
            Some(Binding::Global { .. }) => {
                self.store_global(span, name);
                Ok(())
            }
            Some(Binding::Local(slot)) => {
                self.emit(span, OpCode::SetLocal, &[slot]);
                Ok(())
            }
            None if defines_global || form == VariableForm::Global => {
                self.define_global(node, span, name, false)?;
                self.store_global(span, name);
                Ok(())
            }
            None => {
                let slot = self.define_local(node, span, name)?;
                self.emit(span, OpCode::SetLocal, &[slot]);
                Ok(())
            }
        }
    }
}
