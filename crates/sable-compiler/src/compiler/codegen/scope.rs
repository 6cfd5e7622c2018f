//! Symbol tables and loop records used during compilation.

use rustc_hash::FxHashMap;

use crate::compiler::buffer::{InstructionBuffer, PendingJump};
use crate::compiler::trace::LoopKind;

/// A named slot in a symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// The variable name
    pub name: String,
    /// Slot index, dense within its table
    pub index: u16,
    /// Whether writes are rejected
    pub is_constant: bool,
}

/// Insertion-ordered name to symbol map.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: FxHashMap<String, usize>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the given names, in order.
    pub fn with_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut table = Self::new();
        for name in names {
            table.define(name, false);
        }
        table
    }

    /// Defines `name`, returning its slot.
    ///
    /// Redefining an existing name keeps its slot and updates its constness.
    /// Returns `None` when the table is full.
    pub fn define(&mut self, name: &str, is_constant: bool) -> Option<u16> {
        if let Some(&i) = self.by_name.get(name) {
            let symbol = &mut self.symbols[i];
            symbol.is_constant = is_constant;
            return Some(symbol.index);
        }

        let index = u16::try_from(self.symbols.len()).ok()?;
        self.by_name.insert(name.to_string(), self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_string(),
            index,
            is_constant,
        });
        Some(index)
    }

    /// Looks up a symbol.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&i| &self.symbols[i])
    }

    /// Returns true if `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|s| s.name.as_str())
    }
}

/// A loop being compiled.
#[derive(Debug)]
pub struct LoopRecord {
    /// Loop kind
    pub kind: LoopKind,
    /// Jumps to patch past the loop
    pub break_sites: Vec<PendingJump>,
    /// Jumps to patch to the back-edge
    pub continue_sites: Vec<PendingJump>,
    /// Local slot holding the iterator
    pub iterator: u16,
}

impl LoopRecord {
    /// Creates a record for a loop whose iterator lives in `iterator`.
    pub fn new(kind: LoopKind, iterator: u16) -> Self {
        Self {
            kind,
            break_sites: Vec::new(),
            continue_sites: Vec::new(),
            iterator,
        }
    }
}

/// A function being compiled: its code, its locals and its open loops.
///
/// Loops belong to the frame so `break` inside a nested function never
/// reaches an outer function's loop.
#[derive(Debug, Default)]
pub struct Frame {
    /// Instructions of the function
    pub buffer: InstructionBuffer,
    /// Local variables
    pub locals: SymbolTable,
    /// Loop stack, innermost last
    pub loops: Vec<LoopRecord>,
}

impl Frame {
    /// Innermost open loop.
    pub fn innermost_loop(&mut self) -> Option<&mut LoopRecord> {
        self.loops.last_mut()
    }

    /// Nearest enclosing walk, skipping `for` loops nested inside it.
    pub fn innermost_walk(&self) -> Option<&LoopRecord> {
        self.loops.iter().rev().find(|l| l.kind == LoopKind::Walk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_new() {
        let table = SymbolTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_table_define_dense() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("a", false), Some(0));
        assert_eq!(table.define("b", false), Some(1));
        assert_eq!(table.define("c", true), Some(2));
        assert_eq!(table.len(), 3);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_table_redefine_keeps_slot() {
        let mut table = SymbolTable::new();
        table.define("x", false);
        table.define("y", false);
        assert_eq!(table.define("x", true), Some(0));
        assert_eq!(table.len(), 2);
        assert!(table.resolve("x").is_some_and(|s| s.is_constant));
    }

    #[test]
    fn test_table_resolve() {
        let table = SymbolTable::with_names(["print", "args"]);
        assert_eq!(table.resolve("args").map(|s| s.index), Some(1));
        assert!(table.resolve("missing").is_none());
        assert!(table.contains("print"));
    }

    #[test]
    fn test_innermost_walk_skips_for() {
        let mut frame = Frame::default();
        frame.loops.push(LoopRecord::new(LoopKind::Walk, 0));
        frame.loops.push(LoopRecord::new(LoopKind::For, 1));
        assert_eq!(frame.innermost_walk().map(|l| l.iterator), Some(0));

        frame.loops.remove(0);
        assert!(frame.innermost_walk().is_none());
    }
}
