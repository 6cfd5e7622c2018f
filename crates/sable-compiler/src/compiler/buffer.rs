//! Per-function instruction buffer with jump patching.

use rustc_hash::FxHashSet;

use super::bytecode::{Instruction, OpCode, SourceMap, SourceSpan};

/// Operand written in place of a jump target that is not known yet.
pub const PLACEHOLDER: u16 = 0xFFFF;

/// A jump emitted with a placeholder target.
///
/// Must be resolved with [`InstructionBuffer::patch_jump`] before the buffer
/// is finished.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "a pending jump must be patched"]
pub struct PendingJump {
    position: usize,
}

impl PendingJump {
    /// Position of the jump instruction.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Append-only byte buffer for one function, plus its source map.
#[derive(Debug, Default)]
pub struct InstructionBuffer {
    bytes: Vec<u8>,
    source_map: SourceMap,
    pending: FxHashSet<usize>,
}

impl InstructionBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Position the next instruction will be written at.
    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    /// Appends an instruction and returns its position.
    ///
    /// Panics if the operand count or an operand value does not match the
    /// opcode's width table; user-controlled counts are checked by the
    /// caller beforehand.
    pub fn emit(&mut self, opcode: OpCode, operands: &[u16], span: SourceSpan) -> usize {
        let widths = opcode.operand_widths();
        assert_eq!(
            widths.len(),
            operands.len(),
            "{} takes {} operands",
            opcode,
            widths.len()
        );

        let position = self.bytes.len();
        self.bytes.push(opcode as u8);
        for (operand, width) in operands.iter().zip(widths) {
            self.write_operand(*operand, *width);
        }
        self.source_map.add(position, span);
        position
    }

    fn write_operand(&mut self, operand: u16, width: u8) {
        match width {
            1 => {
                let byte = u8::try_from(operand)
                    .unwrap_or_else(|_| panic!("operand {} does not fit in one byte", operand));
                self.bytes.push(byte);
            }
            2 => self.bytes.extend_from_slice(&operand.to_le_bytes()),
            _ => unreachable!("operand width {}", width),
        }
    }

    /// Appends a jump with a placeholder target.
    pub fn emit_jump(&mut self, opcode: OpCode, span: SourceSpan) -> PendingJump {
        debug_assert!(opcode.is_jump(), "{} is not a jump", opcode);
        let position = self.emit(opcode, &[PLACEHOLDER], span);
        self.pending.insert(position);
        PendingJump { position }
    }

    /// Resolves a pending jump to `target` and returns the rewritten instruction.
    pub fn patch_jump(&mut self, jump: PendingJump, target: usize) -> Instruction {
        assert!(
            self.pending.remove(&jump.position),
            "jump at {} patched twice",
            jump.position
        );
        let target = u16::try_from(target)
            .unwrap_or_else(|_| panic!("jump target {} out of range", target));
        let at = jump.position + 1;
        self.bytes[at..at + 2].copy_from_slice(&target.to_le_bytes());

        let opcode = match OpCode::from_byte(self.bytes[jump.position]) {
            Some(op) => op,
            None => unreachable!("pending jump at {} is not an instruction", jump.position),
        };
        Instruction::new(opcode, &[target])
    }

    /// Number of jumps still holding a placeholder.
    pub fn pending_jumps(&self) -> usize {
        self.pending.len()
    }

    /// Consumes the buffer, returning the bytes and the source map.
    ///
    /// Panics if a jump is still pending.
    pub fn finish(self) -> (Vec<u8>, SourceMap) {
        assert!(
            self.pending.is_empty(),
            "{} jump(s) left unpatched at scope close",
            self.pending.len()
        );
        (self.bytes, self.source_map)
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
