//! Code generation from AST to bytecode.
//!
//! A `Compiler` lowers one unit: the top-level program or an embedded module
//! body. It owns the unit's global table, constant pool and a stack of
//! [`Frame`]s, one per function being compiled. Embedded modules get their
//! own child compiler sharing the analysis data, observer and unit arena.

mod assignment;
mod embedded;
mod expressions;
mod functions;
mod patterns;
mod scope;
mod statements;


pub use scope::{Frame, LoopRecord, Symbol, SymbolTable};

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::CompileInput;
use crate::analysis::{StaticCheckData, SymbolicData, SymbolicType};
use crate::ast::{Chunk, Expr, ExprKind, NodeId, Span, Stmt};
use crate::compiler::CompileOptions;
use crate::compiler::buffer::{PLACEHOLDER, PendingJump};
use crate::compiler::bytecode::{
    Artifact, Bytecode, CompiledFunction, Instruction, OpCode, SourceMap, SourceSpan, UnitArena,
    UnitId,
};
use crate::compiler::trace::CompileObserver;
use crate::error::{CompileError, CompileErrorKind, Result};
use crate::runtime::value::Value;

/// Maximum number of entries in a constant pool.
pub const MAX_CONSTANTS: usize = u16::MAX as usize;

/// Data shared by every compiler of one compilation.
pub(crate) struct Shared<'a> {
    pub static_check: &'a StaticCheckData,
    pub symbolic: &'a SymbolicData,
    pub options: &'a CompileOptions,
    pub observer: Option<Arc<dyn CompileObserver>>,
}

/// Name and text of the chunk being compiled.
#[derive(Debug, Clone)]
pub(crate) struct ChunkContext {
    pub name: Arc<str>,
    pub source: Arc<str>,
}

impl ChunkContext {
    pub fn of(chunk: &Chunk) -> Self {
        Self {
            name: Arc::from(chunk.name.as_str()),
            source: Arc::from(chunk.source.as_str()),
        }
    }

    /// Source text covered by `span`, empty if out of range.
    pub fn slice(&self, span: Span) -> &str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }
}

/// What a unit's main function runs.
pub(crate) enum UnitBody<'s> {
    Statements(&'s [Stmt]),
    Expression(&'s Expr),
}

/// How a variable reference is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VariableForm {
    /// Globals first, then the current locals
    Plain,
    /// Globals only
    Global,
    /// Current locals only
    Local,
}

/// Where a resolved name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    Global { is_constant: bool },
    Local(u16),
}

/// Statically known numeric type of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumericKind {
    Int,
    Float,
}

/// Compiles one unit.
pub(crate) struct Compiler<'a, 'u> {
    shared: &'a Shared<'a>,
    arena: &'u mut UnitArena,
    unit: UnitId,
    module: String,
    chunk: ChunkContext,
    globals: SymbolTable,
    frames: Vec<Frame>,
    constants: Vec<Value>,
    /// Function declarations already compiled at a hoisting point
    hoisted: FxHashSet<NodeId>,
    in_included_chunk: bool,
}

/// Compiles a whole program: the root unit and every embedded unit.
pub(crate) fn compile_program(input: CompileInput<'_>) -> Result<Artifact> {
    let shared = Shared {
        static_check: input.static_check,
        symbolic: input.symbolic,
        options: input.options,
        observer: input.observer,
    };
    let module = input
        .options
        .module_name
        .clone()
        .unwrap_or_else(|| input.chunk.name.clone());

    let mut arena = UnitArena::default();
    let compiler = Compiler::new(
        &shared,
        &mut arena,
        module,
        ChunkContext::of(input.chunk),
        input.globals.iter().map(String::as_str),
    );
    let span = statements_span(&input.chunk.statements);
    compiler.compile_unit(UnitBody::Statements(&input.chunk.statements), input.chunk.id, span)?;
    Ok(arena.into_artifact())
}

fn statements_span(statements: &[Stmt]) -> Span {
    statements
        .iter()
        .map(|s| s.span)
        .reduce(Span::cover)
        .unwrap_or_default()
}

impl<'a, 'u> Compiler<'a, 'u> {
    /// Creates a compiler for a new unit, reserving its id.
    pub fn new<'n>(
        shared: &'a Shared<'a>,
        arena: &'u mut UnitArena,
        module: String,
        chunk: ChunkContext,
        globals: impl IntoIterator<Item = &'n str>,
    ) -> Self {
        let unit = arena.reserve();
        Self {
            shared,
            arena,
            unit,
            module,
            chunk,
            globals: SymbolTable::with_names(globals),
            frames: Vec::new(),
            constants: Vec::new(),
            hoisted: FxHashSet::default(),
            in_included_chunk: false,
        }
    }

    // ========================================================================
    // Unit Compilation
    // ========================================================================

    /// Compiles the unit's main function and registers the unit in the arena.
    pub fn compile_unit(mut self, body: UnitBody<'_>, scope: NodeId, span: Span) -> Result<UnitId> {
        debug!(module = %self.module, unit = %self.unit, "compiling unit");
        if let Some(observer) = &self.shared.observer {
            observer.unit_started(&self.module);
        }

        self.enter_scope();
        let compiled = match body {
            UnitBody::Statements(statements) => self.compile_statements(statements, Some(scope)),
            UnitBody::Expression(expr) => self.compile_expression(expr).map(|()| {
                self.emit(expr.span, OpCode::Return, &[1]);
            }),
        };
        if let Err(e) = compiled {
            self.discard_scope();
            return Err(e);
        }
        self.emit(Span::new(span.end, span.end), OpCode::Suspend, &[]);
        let (instructions, source_map, local_count) = self.leave_scope(scope, span)?;

        let mut unit = Bytecode {
            id: self.unit,
            module: std::mem::take(&mut self.module),
            constants: std::mem::take(&mut self.constants),
            main: CompiledFunction {
                instructions,
                local_count,
                param_count: 0,
                variadic: false,
                source_map,
                owner: None,
                span: None,
            },
        };
        unit.link();

        debug!(
            module = %unit.module,
            unit = %unit.id,
            constants = unit.constants.len(),
            bytes = unit.main.instructions.len(),
            "compiled unit"
        );
        if let Some(observer) = &self.shared.observer {
            observer.unit_finished(&unit.module);
        }

        let id = unit.id;
        self.arena.fill(unit);
        Ok(id)
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    pub(crate) fn enter_scope(&mut self) {
        self.frames.push(Frame::default());
        if let Some(observer) = &self.shared.observer {
            observer.scope_entered(self.frames.len());
        }
    }

    /// Drops the current function scope after a failed compilation.
    pub(crate) fn discard_scope(&mut self) {
        let depth = self.frames.len();
        if let Some(frame) = self.frames.pop() {
            if let Some(observer) = &self.shared.observer {
                observer.scope_left(depth, frame.locals.len());
            }
        }
    }

    /// Closes the current function scope, returning its code and local count.
    pub(crate) fn leave_scope(&mut self, node: NodeId, span: Span) -> Result<(Vec<u8>, SourceMap, usize)> {
        let depth = self.frames.len();
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => panic!("scope stack underflow in module {}", self.module),
        };
        assert!(frame.loops.is_empty(), "loop left open at scope close");

        let local_count = frame.locals.len();
        if let Some(observer) = &self.shared.observer {
            observer.scope_left(depth, local_count);
        }

        let size = frame.buffer.position();
        if size > u16::MAX as usize {
            return Err(self.error(
                node,
                span,
                CompileErrorKind::OperandOverflow {
                    what: "instruction bytes in one function",
                    count: size,
                    max: u16::MAX as usize,
                },
            ));
        }

        let (instructions, source_map) = frame.buffer.finish();
        Ok((instructions, source_map, local_count))
    }

    pub(crate) fn frame(&self) -> &Frame {
        match self.frames.last() {
            Some(frame) => frame,
            None => panic!("no open scope in module {}", self.module),
        }
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => panic!("no open scope in module {}", self.module),
        }
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Position of the next instruction in the current function.
    pub(crate) fn position(&self) -> usize {
        self.frame().buffer.position()
    }

    pub(crate) fn emit(&mut self, span: Span, opcode: OpCode, operands: &[u16]) -> usize {
        let at = SourceSpan {
            chunk: self.chunk.name.clone(),
            span,
        };
        let position = self.frame_mut().buffer.emit(opcode, operands, at);
        if let Some(observer) = &self.shared.observer {
            observer.instruction_emitted(position, &Instruction::new(opcode, operands));
        }
        position
    }

    pub(crate) fn emit_jump(&mut self, span: Span, opcode: OpCode) -> PendingJump {
        let at = SourceSpan {
            chunk: self.chunk.name.clone(),
            span,
        };
        let jump = self.frame_mut().buffer.emit_jump(opcode, at);
        if let Some(observer) = &self.shared.observer {
            observer.instruction_emitted(jump.position(), &Instruction::new(opcode, &[PLACEHOLDER]));
        }
        jump
    }

    /// Checks that `target` fits a jump operand. `PLACEHOLDER` is reserved.
    fn jump_target(&self, node: NodeId, span: Span, target: usize) -> Result<u16> {
        let max = PLACEHOLDER as usize - 1;
        if target > max {
            return Err(self.overflow(node, span, "jump target", target, max));
        }
        Ok(target as u16)
    }

    /// Emits a jump to an already known position (a back-edge).
    pub(crate) fn emit_jump_to(&mut self, node: NodeId, span: Span, opcode: OpCode, target: usize) -> Result<()> {
        let target = self.jump_target(node, span, target)?;
        self.emit(span, opcode, &[target]);
        Ok(())
    }

    pub(crate) fn patch_jump(&mut self, node: NodeId, span: Span, jump: PendingJump, target: usize) -> Result<()> {
        let position = jump.position();
        let target = self.jump_target(node, span, target)?;
        let instruction = self.frame_mut().buffer.patch_jump(jump, target as usize);
        if let Some(observer) = &self.shared.observer {
            observer.instruction_replaced(position, &instruction);
        }
        Ok(())
    }

    /// Patches a jump to the next instruction.
    pub(crate) fn patch_here(&mut self, node: NodeId, span: Span, jump: PendingJump) -> Result<()> {
        let target = self.position();
        self.patch_jump(node, span, jump, target)
    }

    // ========================================================================
    // Constants
    // ========================================================================

    /// Appends a constant. Identical values are never merged.
    pub(crate) fn add_constant(&mut self, value: Value) -> u16 {
        let index = self.constants.len();
        assert!(
            index < MAX_CONSTANTS,
            "constant pool of module {} exceeds {} entries",
            self.module,
            MAX_CONSTANTS
        );
        if let Some(observer) = &self.shared.observer {
            observer.constant_added(index, &value);
        }
        self.constants.push(value);
        index as u16
    }

    /// Adds a name (property, global, pattern) as a string constant.
    pub(crate) fn name_constant(&mut self, name: &str) -> u16 {
        self.add_constant(Value::string(name))
    }

    pub(crate) fn emit_constant(&mut self, span: Span, value: Value) {
        let index = self.add_constant(value);
        self.emit(span, OpCode::PushConstant, &[index]);
    }

    // ========================================================================
    // Symbols
    // ========================================================================

    pub(crate) fn resolve(&self, name: &str, form: VariableForm) -> Option<Binding> {
        let global = || {
            self.globals.resolve(name).map(|s| Binding::Global {
                is_constant: s.is_constant,
            })
        };
        let local = || self.frame().locals.resolve(name).map(|s| Binding::Local(s.index));
        match form {
            VariableForm::Plain => global().or_else(local),
            VariableForm::Global => global(),
            VariableForm::Local => local(),
        }
    }

    /// Pushes the value of a variable.
    pub(crate) fn load_variable(&mut self, node: NodeId, span: Span, name: &str, form: VariableForm) -> Result<()> {
        match self.resolve(name, form) {
            Some(Binding::Global { .. }) => {
                let index = self.name_constant(name);
                self.emit(span, OpCode::GetGlobal, &[index]);
            }
            Some(Binding::Local(slot)) => {
                self.emit(span, OpCode::GetLocal, &[slot]);
            }
            None => {
                return Err(self.error(
                    node,
                    span,
                    CompileErrorKind::UnresolvedReference(name.to_string()),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn define_local(&mut self, node: NodeId, span: Span, name: &str) -> Result<u16> {
        match self.frame_mut().locals.define(name, false) {
            Some(slot) => Ok(slot),
            None => Err(self.overflow(node, span, "local variables", u16::MAX as usize + 1, u16::MAX as usize)),
        }
    }

    pub(crate) fn define_global(&mut self, node: NodeId, span: Span, name: &str, is_constant: bool) -> Result<()> {
        match self.globals.define(name, is_constant) {
            Some(_) => Ok(()),
            None => Err(self.overflow(node, span, "global variables", u16::MAX as usize + 1, u16::MAX as usize)),
        }
    }

    pub(crate) fn store_global(&mut self, span: Span, name: &str) {
        let index = self.name_constant(name);
        self.emit(span, OpCode::SetGlobal, &[index]);
    }

    // ========================================================================
    // Symbolic Data
    // ========================================================================

    pub(crate) fn symbolic_type(&self, expr: &Expr) -> Option<&'a SymbolicType> {
        self.shared.symbolic.type_of(expr.id)
    }

    /// Numeric type of an operand: symbolic data first, then literal shape.
    pub(crate) fn numeric_kind(&self, expr: &Expr) -> Option<NumericKind> {
        match self.symbolic_type(expr) {
            Some(SymbolicType::Int) => Some(NumericKind::Int),
            Some(SymbolicType::Float) => Some(NumericKind::Float),
            Some(_) => None,
            None => match expr.kind {
                ExprKind::Integer(_) => Some(NumericKind::Int),
                ExprKind::Float(_) => Some(NumericKind::Float),
                _ => None,
            },
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub(crate) fn error(&self, node: NodeId, span: Span, kind: CompileErrorKind) -> CompileError {
        CompileError {
            module: self.module.clone(),
            node,
            span,
            kind,
        }
    }

    pub(crate) fn overflow(&self, node: NodeId, span: Span, what: &'static str, count: usize, max: usize) -> CompileError {
        self.error(node, span, CompileErrorKind::OperandOverflow { what, count, max })
    }

    /// Converts a user-driven count to an operand, failing above `max`.
    pub(crate) fn count_operand(&self, node: NodeId, span: Span, what: &'static str, count: usize, max: usize) -> Result<u16> {
        if count > max {
            return Err(self.overflow(node, span, what, count, max));
        }
        Ok(count as u16)
    }

    pub(crate) fn misuse(&self, node: NodeId, span: Span, message: impl Into<String>) -> CompileError {
        self.error(node, span, CompileErrorKind::Misuse(message.into()))
    }
}
