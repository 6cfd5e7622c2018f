//! Bytecode definitions.
//!
//! An instruction is one opcode byte followed by its operands, each 1 or 2
//! bytes wide (little-endian) as given by [`OpCode::operand_widths`]. Jump
//! operands are absolute byte positions inside the same function.

use std::fmt;
use std::sync::Arc;

use crate::ast::Span;
use crate::runtime::value::Value;

macro_rules! opcodes {
    ($( $(#[doc = $doc:literal])* $name:ident [$($width:literal),*] ),* $(,)?) => {
        /// Operation codes for the VM.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum OpCode {
            $( $(#[doc = $doc])* $name, )*
        }

        impl OpCode {
            const ALL: &'static [OpCode] = &[$(OpCode::$name),*];

            /// Width in bytes of each operand.
            pub const fn operand_widths(self) -> &'static [u8] {
                match self {
                    $(OpCode::$name => &[$($width),*],)*
                }
            }

            /// Mnemonic used in listings and traces.
            pub const fn name(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    // Stack operations
    /// Push constant `index`
    PushConstant [2],
    /// Push nil
    PushNil [],
    /// Push true
    PushTrue [],
    /// Push false
    PushFalse [],
    /// Pop the top value
    Pop [],
    /// Duplicate the top value
    Dup [],
    /// Duplicate the top two values
    Dup2 [],
    /// Swap the top two values
    Swap [],

    // Variables
    /// Push local `slot`
    GetLocal [2],
    /// Pop into local `slot`
    SetLocal [2],
    /// Push the global named by constant `name`
    GetGlobal [2],
    /// Pop into the global named by constant `name`
    SetGlobal [2],

    // Generic arithmetic and comparison
    /// Dynamic +
    Add [],
    /// Dynamic -
    Sub [],
    /// Dynamic *
    Mul [],
    /// Dynamic /
    Div [],
    /// Dynamic <
    Less [],
    /// Dynamic <=
    LessEq [],
    /// Dynamic >
    Greater [],
    /// Dynamic >=
    GreaterEq [],

    // Integer specializations
    /// Integer +
    IntAdd [],
    /// Integer -
    IntSub [],
    /// Integer *
    IntMul [],
    /// Integer /
    IntDiv [],
    /// Integer <
    IntLess [],
    /// Integer <=
    IntLessEq [],
    /// Integer >
    IntGreater [],
    /// Integer >=
    IntGreaterEq [],

    // Float specializations
    /// Float +
    FloatAdd [],
    /// Float -
    FloatSub [],
    /// Float *
    FloatMul [],
    /// Float /
    FloatDiv [],
    /// Float <
    FloatLess [],
    /// Float <=
    FloatLessEq [],
    /// Float >
    FloatGreater [],
    /// Float >=
    FloatGreaterEq [],

    // Other binary operators
    /// ==
    Equal [],
    /// !=
    NotEqual [],
    /// Identity
    Is [],
    /// Negated identity
    IsNot [],
    /// Membership
    In [],
    /// Negated membership
    NotIn [],
    /// Key membership
    Keyof [],
    /// Pattern match
    Match [],
    /// Negated pattern match
    NotMatch [],
    /// Substring test
    Substrof [],
    /// Build a range from two bounds; operand is 1 when exclusive
    CreateRange [1],
    /// Unary minus
    Negate [],
    /// Logical not
    Not [],

    // Control flow
    /// Jump to `target`
    Jump [2],
    /// Pop; jump to `target` if false
    JumpIfFalse [2],
    /// Pop; jump to `target` if true
    JumpIfTrue [2],
    /// Pop; jump to `target` if not nil
    JumpIfNotNil [2],

    // Members
    /// Generic property load
    GetProperty [2],
    /// Nil-safe property load
    GetOptionalProperty [2],
    /// Generic property store
    SetProperty [2],
    /// Property load with the name on the stack
    GetComputedProperty [],
    /// Property store with the name on the stack
    SetComputedProperty [],
    /// Namespace member load
    GetNamespaceMember [2],
    /// Bound extension method `name`
    GetExtensionMethod [2],
    /// Fixed-offset bool load `(struct size, offset)`
    GetBoolField [2, 2],
    /// Fixed-offset int load `(struct size, offset)`
    GetIntField [2, 2],
    /// Fixed-offset float load `(struct size, offset)`
    GetFloatField [2, 2],
    /// Pointer to an inline struct field `(struct size, offset)`
    GetStructFieldPointer [2, 2],
    /// Fixed-offset bool store `(struct size, offset)`
    SetBoolField [2, 2],
    /// Fixed-offset int store `(struct size, offset)`
    SetIntField [2, 2],
    /// Fixed-offset float store `(struct size, offset)`
    SetFloatField [2, 2],

    // Indexing
    /// container[index]
    GetIndex [],
    /// container[index], nil when out of bounds
    GetIndexOrNil [],
    /// container[index] = value
    SetIndex [],
    /// container[start:end]
    GetSlice [],
    /// container[start:end] = value
    SetSlice [],

    // Containers
    /// List of the top `count` values
    CreateList [2],
    /// Append the top `count` values to the list below them
    AppendList [2],
    /// Append every element of an iterable to the list below it
    SpreadList [],
    /// Pop a count, then that many values, into a list
    CreateListDynamic [],
    /// Tuple of the top `count` values
    CreateTuple [2],
    /// Append the top `count` values to the tuple below them
    AppendTuple [2],
    /// Append every element of an iterable to the tuple below it
    SpreadTuple [],
    /// Object from `count` key/value pairs
    CreateObject [2],
    /// Merge an object into the object below it
    SpreadObject [],
    /// Record from `count` key/value pairs
    CreateRecord [2],
    /// Dictionary from `count` key/value pairs
    CreateDict [2],

    // Functions
    /// Call with `argc` arguments; second operand is 1 if the last is spread
    Call [1, 1],
    /// Return; operand is 1 if a value is returned
    Return [1],
    /// Bind the top `count` values as captured locals of the function below them
    BindCapturedLocals [1],
    /// Check a value against a pattern, keeping the value
    AssertType [],

    // Iteration
    /// Create an iterator; operand flags: 1 key pattern, 2 value pattern, 4 chunked
    IterInit [1],
    /// Advance; push whether an element is available
    IterNext [],
    /// Advance by a chunk; push whether one is available
    IterNextChunk [],
    /// Push the current key
    IterKey [],
    /// Push the current value
    IterValue [],
    /// Create a walker over a tree-like value
    WalkInit [],
    /// Skip the children of the current walk entry
    IterPrune [],

    // Patterns
    /// Convert a value into a pattern
    ToPattern [],
    /// Push the named pattern
    ResolvePattern [2],
    /// Push a member of a pattern namespace `(namespace, member)`
    ResolvePatternNamespaceMember [2, 2],
    /// Object pattern from `count` key/pattern pairs; second operand is exactness
    CreateObjectPattern [2, 1],
    /// Record pattern from `count` key/pattern pairs; second operand is exactness
    CreateRecordPattern [2, 1],
    /// List pattern of `count` elements, or one general element when the flag is set
    CreateListPattern [2, 1],
    /// Tuple pattern of `count` elements, or one general element when the flag is set
    CreateTuplePattern [2, 1],
    /// Merge an object pattern into the one below it
    SpreadObjectPattern [],
    /// Union of the top `count` patterns
    CreateUnionPattern [2],
    /// Pattern also matching nil
    CreateOptionalPattern [],
    /// Union of the top `count` string patterns
    CreateStringUnionPattern [2],
    /// Repeated string pattern `(kind, count)`
    CreateRepeatedPattern [1, 1],
    /// Sequence of the top `count` string patterns, group names in constant `names`
    CreateSequencePattern [2, 2],
    /// Define the pattern `name`
    AddPattern [2],
    /// Define the pattern namespace `name`
    AddPatternNamespace [2],
    /// Match with capture groups stored in local `slot`; pushes success
    GroupMatch [2],

    // Embedded modules
    /// Schedule a routine `(unit, source, callee)` with meta and globals from the stack
    SpawnRoutine [2, 2, 2],
    /// Create a lifetime job from `unit` with meta and subject from the stack
    CreateLifetimeJob [2],
    /// Create a test suite from `unit` with meta from the stack
    CreateTestSuite [2],
    /// Create a test case from `unit` with meta from the stack
    CreateTestCase [2],
    /// Run the test item on top of the stack
    RunTest [],

    /// End of a unit's main function
    Suspend [],
}

impl OpCode {
    /// Decodes an opcode byte.
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Encoded size of the instruction in bytes.
    pub fn size(self) -> usize {
        1 + self
            .operand_widths()
            .iter()
            .map(|w| *w as usize)
            .sum::<usize>()
    }

    /// Returns true for instructions whose operand is a jump target.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue | OpCode::JumpIfNotNil
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Operand values, one per entry of the opcode's width table
    pub operands: Vec<u16>,
}

impl Instruction {
    /// Creates an instruction.
    pub fn new(opcode: OpCode, operands: &[u16]) -> Self {
        Self {
            opcode,
            operands: operands.to_vec(),
        }
    }

    /// First operand, if any.
    pub fn operand(&self) -> Option<u16> {
        self.operands.first().copied()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}

/// Iterator decoding a byte stream into `(position, Instruction)` pairs.
///
/// The stream must come from the compiler; a malformed stream panics.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over a function's instruction bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read(&mut self, width: u8) -> u16 {
        let value = match width {
            1 => self.bytes[self.pos] as u16,
            2 => u16::from_le_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]),
            _ => unreachable!("operand width {}", width),
        };
        self.pos += width as usize;
        value
    }
}

impl Iterator for Decoder<'_> {
    type Item = (usize, Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        let byte = *self.bytes.get(start)?;
        let opcode = match OpCode::from_byte(byte) {
            Some(op) => op,
            None => panic!("invalid opcode {:#04x} at {}", byte, start),
        };
        self.pos += 1;
        let operands = opcode.operand_widths().iter().map(|w| self.read(*w)).collect();
        Some((start, Instruction { opcode, operands }))
    }
}

/// Identifies a bytecode unit within an [`Artifact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A span inside a named chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    /// Chunk name
    pub chunk: Arc<str>,
    /// Byte range in the chunk
    pub span: Span,
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chunk, self.span)
    }
}

/// Maps instruction positions to source spans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    entries: Vec<(usize, SourceSpan)>,
}

impl SourceMap {
    /// Records the span of the instruction starting at `position`.
    ///
    /// Positions must be added in increasing order.
    pub fn add(&mut self, position: usize, span: SourceSpan) {
        debug_assert!(self.entries.last().is_none_or(|(last, _)| *last < position));
        self.entries.push((position, span));
    }

    /// Span of the instruction covering `position`.
    pub fn lookup(&self, position: usize) -> Option<&SourceSpan> {
        let idx = self.entries.partition_point(|(pos, _)| *pos <= position);
        idx.checked_sub(1).map(|i| &self.entries[i].1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(position, span)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SourceSpan)> {
        self.entries.iter().map(|(pos, span)| (*pos, span))
    }
}

/// A compiled function.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    /// Encoded instructions
    pub instructions: Vec<u8>,
    /// Number of local slots (parameters and captures included)
    pub local_count: usize,
    /// Number of parameters
    pub param_count: usize,
    /// Whether the last parameter collects the remaining arguments
    pub variadic: bool,
    /// Position to source mapping
    pub source_map: SourceMap,
    /// Unit whose constant pool this function uses, set when the unit is linked
    pub owner: Option<UnitId>,
    /// Span of the function literal, `None` for a unit's main function
    pub span: Option<SourceSpan>,
}

impl CompiledFunction {
    /// Decodes the instructions.
    pub fn decode(&self) -> Decoder<'_> {
        Decoder::new(&self.instructions)
    }
}

/// A compiled unit: a top-level program or an embedded module.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    /// Id of the unit in its artifact
    pub id: UnitId,
    /// Name of the source module
    pub module: String,
    /// The constant pool
    pub constants: Vec<Value>,
    /// Entry point, ending with `Suspend`
    pub main: CompiledFunction,
}

impl Bytecode {
    /// Points the main function and every function constant back at this unit.
    ///
    /// Function literals are built with their owner already set, so this
    /// only touches constants that came from elsewhere. A shared constant is
    /// copied rather than mutated in place.
    pub(crate) fn link(&mut self) {
        self.main.owner = Some(self.id);
        for constant in &mut self.constants {
            if let Value::Function(function) = constant {
                if function.owner != Some(self.id) {
                    Arc::make_mut(function).owner = Some(self.id);
                }
            }
        }
    }

    /// Functions of the unit: main first, then function constants in pool order.
    pub fn functions(&self) -> impl Iterator<Item = &CompiledFunction> {
        std::iter::once(&self.main).chain(self.constants.iter().filter_map(Value::as_function))
    }
}

/// Every unit produced by one top-level compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    units: Vec<Bytecode>,
}

impl Artifact {
    /// The top-level unit.
    pub fn root(&self) -> &Bytecode {
        &self.units[0]
    }

    /// Looks up a unit.
    pub fn unit(&self, id: UnitId) -> Option<&Bytecode> {
        self.units.get(id.0 as usize)
    }

    /// All units, root first.
    pub fn units(&self) -> &[Bytecode] {
        &self.units
    }
}

/// Storage for the units of one compilation, indexed by [`UnitId`].
///
/// A slot is reserved when a compiler starts and filled when it finishes, so
/// a parent's id is always smaller than its children's.
#[derive(Debug, Default)]
pub(crate) struct UnitArena {
    slots: Vec<Option<Bytecode>>,
}

impl UnitArena {
    pub(crate) fn reserve(&mut self) -> UnitId {
        let id = UnitId(self.slots.len() as u32);
        self.slots.push(None);
        id
    }

    pub(crate) fn fill(&mut self, unit: Bytecode) {
        let slot = &mut self.slots[unit.id.0 as usize];
        assert!(slot.is_none(), "unit {} filled twice", unit.id);
        *slot = Some(unit);
    }

    pub(crate) fn into_artifact(self) -> Artifact {
        let units = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                Some(unit) => unit,
                None => panic!("unit #{} reserved but never compiled", i),
            })
            .collect();
        Artifact { units }
    }
}
