//! Compilation observer and the text trace built on it.

use std::io::Write;

use parking_lot::Mutex;

use super::bytecode::Instruction;
use crate::runtime::value::Value;

/// Kind of loop entered or left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `for` statement or expression
    For,
    /// `walk` statement
    Walk,
}

impl LoopKind {
    /// Keyword of the loop.
    pub fn name(self) -> &'static str {
        match self {
            LoopKind::For => "for",
            LoopKind::Walk => "walk",
        }
    }
}

/// Receives events while a program is compiled.
///
/// Every method has an empty default, so observers only implement what they
/// need. Observers are shared with the compilers of embedded modules.
pub trait CompileObserver: Send + Sync {
    /// A unit started compiling.
    fn unit_started(&self, _module: &str) {}

    /// A unit finished compiling.
    fn unit_finished(&self, _module: &str) {}

    /// A function scope was entered; `depth` counts from 1.
    fn scope_entered(&self, _depth: usize) {}

    /// A function scope was left with `local_count` locals.
    fn scope_left(&self, _depth: usize, _local_count: usize) {}

    /// A loop was entered.
    fn loop_entered(&self, _kind: LoopKind) {}

    /// A loop was left.
    fn loop_left(&self, _kind: LoopKind) {}

    /// A constant was added to the pool at `index`.
    fn constant_added(&self, _index: usize, _value: &Value) {}

    /// An instruction was written at `position`.
    fn instruction_emitted(&self, _position: usize, _instruction: &Instruction) {}

    /// The instruction at `position` was rewritten (jump patching).
    fn instruction_replaced(&self, _position: usize, _instruction: &Instruction) {}
}

/// Writes one line per event to a sink.
pub struct TraceWriter {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl TraceWriter {
    /// Creates a trace writing to `sink`.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    fn line(&self, args: std::fmt::Arguments<'_>) {
        let mut sink = self.sink.lock();
        // Tracing must never fail the compilation.
        if let Err(e) = writeln!(sink, "{}", args) {
            tracing::warn!("failed to write compile trace: {}", e);
        }
    }
}

impl CompileObserver for TraceWriter {
    fn unit_started(&self, module: &str) {
        self.line(format_args!("unit {}", module));
    }

    fn unit_finished(&self, module: &str) {
        self.line(format_args!("end of unit {}", module));
    }

    fn scope_entered(&self, depth: usize) {
        self.line(format_args!("enter scope {}", depth));
    }

    fn scope_left(&self, depth: usize, local_count: usize) {
        self.line(format_args!("leave scope {} ({} locals)", depth, local_count));
    }

    fn loop_entered(&self, kind: LoopKind) {
        self.line(format_args!("enter {} loop", kind.name()));
    }

    fn loop_left(&self, kind: LoopKind) {
        self.line(format_args!("leave {} loop", kind.name()));
    }

    fn constant_added(&self, index: usize, value: &Value) {
        self.line(format_args!("constant {}: {}", index, value));
    }

    fn instruction_emitted(&self, position: usize, instruction: &Instruction) {
        self.line(format_args!("{:04} {}", position, instruction));
    }

    fn instruction_replaced(&self, position: usize, instruction: &Instruction) {
        self.line(format_args!("{:04} {} (patched)", position, instruction));
    }
}
