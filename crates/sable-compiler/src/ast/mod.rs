//! Abstract Syntax Tree (AST) definitions for Sable.
//!
//! The parser lives outside this crate; these types are the contract between
//! it and the compiler. Every expression and statement carries a [`NodeId`]
//! (the key used by the analysis passes) and a [`Span`] into its chunk's
//! source text.

mod builder;

pub use builder::AstBuilder;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an AST node, unique within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// A byte range into a chunk's source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: u32,
    /// End offset (exclusive)
    pub end: u32,
}

impl Span {
    /// Creates a span.
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns true if `position` lies inside the span.
    pub fn contains(&self, position: u32) -> bool {
        self.start <= position && position < self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A parsed source file: the unit of inclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Node id of the chunk, used as its hoisting scope key
    pub id: NodeId,
    /// Name of the chunk (usually its path)
    pub name: String,
    /// Full source text
    pub source: String,
    /// Top-level statements
    pub statements: Vec<Stmt>,
}

/// A chunk included into another one, sharing its global namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludedChunk {
    /// The included chunk
    pub chunk: Chunk,
}

/// An identifier with its own span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    /// The name
    pub name: String,
    /// Where it appears
    pub span: Span,
}

/// A brace-delimited list of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Span of the whole block
    pub span: Span,
    /// The statements
    pub statements: Vec<Stmt>,
}

// ============================================================================
// Statements
// ============================================================================

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Node id
    pub id: NodeId,
    /// Source span
    pub span: Span,
    /// What kind of statement this is
    pub kind: StmtKind,
}

/// The different kinds of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Expression evaluated for its effect
    Expression(Expr),
    /// `var x = e` / `var x %int = e`
    LocalDeclarations(Vec<LocalDeclaration>),
    /// `globalvar X = e` (or a constant global)
    GlobalDeclarations(Vec<GlobalDeclaration>),
    /// `target op value`
    Assignment {
        /// Assignment target
        target: Expr,
        /// Operator
        op: AssignOp,
        /// Assigned value
        value: Expr,
    },
    /// `assign a b = e` / `assign? a b = e`
    MultiAssignment {
        /// Variables receiving the elements
        targets: Vec<Identifier>,
        /// Right-hand side
        value: Expr,
        /// Missing elements yield nil instead of failing
        nillable: bool,
    },
    /// `if test { } else ...`
    If {
        /// Condition
        test: Expr,
        /// Taken branch
        consequent: Block,
        /// Else branch: a block or another `if`
        alternate: Option<Box<Stmt>>,
    },
    /// `for k, v in e { }`
    For(ForStatement),
    /// `walk e, entry { }`
    Walk(WalkStatement),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `prune`
    Prune,
    /// `return [e]`
    Return(Option<Expr>),
    /// `switch e { v { } ... }`
    Switch(SwitchStatement),
    /// `match e { %p { } ... }`
    Match(MatchStatement),
    /// Nested block
    Block(Block),
    /// `fn name(...) { }`
    FunctionDeclaration(FunctionDeclaration),
    /// `%name = <pattern>`
    PatternDefinition {
        /// Pattern name
        name: String,
        /// Pattern expression
        pattern: Expr,
    },
    /// `%ns. = <object>`
    PatternNamespaceDefinition {
        /// Namespace name
        name: String,
        /// Namespace members
        namespace: Expr,
    },
    /// `struct Name { }`: consumed by the symbolic pass, no code
    StructDefinition {
        /// Struct name
        name: String,
    },
    /// Included chunk
    Include(IncludedChunk),
    /// `testsuite <meta> { }`
    TestSuite(TestBlock),
    /// `testcase <meta> { }`
    TestCase(TestBlock),
}

/// One binding of a `var` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDeclaration {
    /// Declared name
    pub name: Identifier,
    /// Optional type pattern checked before the store
    pub type_annotation: Option<Expr>,
    /// Initial value
    pub value: Expr,
}

/// One binding of a global declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDeclaration {
    /// Declared name
    pub name: Identifier,
    /// Initial value
    pub value: Expr,
    /// Constant globals cannot be reassigned
    pub constant: bool,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    /// =
    Assign,
    /// +=
    Add,
    /// -=
    Sub,
    /// *=
    Mul,
    /// /=
    Div,
}

impl AssignOp {
    /// The binary operator combining old and new values, if compound.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

/// A key or value variable of a loop, with an optional type pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopBinding {
    /// Bound name
    pub name: Identifier,
    /// Pattern the element must match
    pub pattern: Option<Expr>,
}

/// A `for` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    /// Key variable
    pub key: Option<LoopBinding>,
    /// Value (or chunk) variable
    pub value: Option<LoopBinding>,
    /// Iterated expression
    pub iterated: Expr,
    /// Loop body
    pub body: Block,
    /// Iterate by chunks instead of elements
    pub chunked: bool,
}

/// A `walk` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkStatement {
    /// Walked expression
    pub walked: Expr,
    /// Optional meta variable
    pub meta: Option<Identifier>,
    /// Entry variable
    pub entry: Identifier,
    /// Loop body
    pub body: Block,
}

/// A `switch` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatement {
    /// Compared value
    pub discriminant: Expr,
    /// Cases in order
    pub cases: Vec<SwitchCase>,
    /// Body run when no case matches
    pub default: Option<Block>,
}

/// One `switch` case: several values sharing a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// Values compared for equality
    pub values: Vec<Expr>,
    /// Body
    pub body: Block,
}

/// A `match` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatement {
    /// Matched value
    pub discriminant: Expr,
    /// Cases in order
    pub cases: Vec<MatchCase>,
    /// Body run when no case matches
    pub default: Option<Block>,
}

/// One `match` case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCase {
    /// Patterns (or values) to match against
    pub values: Vec<Expr>,
    /// Variable receiving the capture groups
    pub group_binding: Option<Identifier>,
    /// Body
    pub body: Block,
}

/// A named function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name
    pub name: Identifier,
    /// The function itself
    pub function: FunctionLiteral,
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// Node id
    pub id: NodeId,
    /// Source span
    pub span: Span,
    /// What kind of expression this is
    pub kind: ExprKind,
}

/// The different kinds of expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// 42
    Integer(i64),
    /// 4.2
    Float(f64),
    /// true / false
    Boolean(bool),
    /// nil
    Nil,
    /// "text"
    String(String),
    /// 'a'
    Rune(char),
    /// 10s, 1h30min, 2kB
    Quantity(Vec<QuantityPart>),
    /// /a/b
    Path(String),
    /// https://example.com/
    Url(String),
    /// %`[a-z]+`
    Regex(String),

    /// x
    Variable(String),
    /// $$x
    GlobalVariable(String),
    /// $x
    LocalVariable(String),

    /// left op right
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// op operand
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },

    /// a.b / a.?b
    Member {
        /// Receiver
        object: Box<Expr>,
        /// Property name
        property: String,
        /// Nil-safe access
        optional: bool,
    },
    /// a.(e)
    ComputedMember {
        /// Receiver
        object: Box<Expr>,
        /// Property name expression
        property: Box<Expr>,
    },
    /// a::b
    NamespaceMember {
        /// Receiver
        object: Box<Expr>,
        /// Member name
        member: String,
    },
    /// a[i]
    Index {
        /// Indexed value
        object: Box<Expr>,
        /// Index
        index: Box<Expr>,
    },
    /// a[i:j]
    Slice {
        /// Sliced value
        object: Box<Expr>,
        /// Start bound
        start: Option<Box<Expr>>,
        /// End bound
        end: Option<Box<Expr>>,
    },

    /// [a, ...b]
    List(Vec<Element>),
    /// #[a, b]
    Tuple(Vec<Element>),
    /// {a: 1, 2}
    Object(ObjectLiteral),
    /// #{a: 1}
    Record(ObjectLiteral),
    /// :{"k": v}
    Dictionary(Vec<DictionaryEntry>),

    /// f(a, ...b)
    Call {
        /// Called value
        callee: Box<Expr>,
        /// Arguments, only the last may be a spread
        arguments: Vec<Element>,
    },
    /// fn[captures](params) body
    Function(Box<FunctionLiteral>),
    /// (if test a else b)
    If {
        /// Condition
        test: Box<Expr>,
        /// Value when true
        consequent: Box<Expr>,
        /// Value when false, nil if absent
        alternate: Option<Box<Expr>>,
    },
    /// [for k, v in e: body]
    For(Box<ForExpression>),

    /// %{a: %int}
    ObjectPattern(ObjectPatternLiteral),
    /// #%{a: %int}
    RecordPattern(ObjectPatternLiteral),
    /// %[%int, %str] / %[]%int
    ListPattern(SequencePatternLiteral),
    /// #%[%int, %str]
    TuplePattern(SequencePatternLiteral),
    /// %| a | b
    UnionPattern(Vec<Expr>),
    /// %int?
    OptionalPattern(Box<Expr>),
    /// %int
    PatternIdentifier(String),
    /// %ns.member
    PatternNamespaceMember {
        /// Namespace name
        namespace: String,
        /// Member name
        member: String,
    },
    /// %(expr)
    PatternConversion(Box<Expr>),
    /// String pattern grammar
    StringPattern(Box<StringPattern>),

    /// go [globals] do body
    Spawn(Box<SpawnExpression>),
    /// lifetimejob meta [for pattern] { }
    LifetimeJob(Box<LifetimeJobExpression>),
    /// testsuite used as a value
    TestSuite(Box<TestBlock>),
    /// testcase used as a value
    TestCase(Box<TestBlock>),
}

impl ExprKind {
    /// Returns true for literals the compiler can evaluate in isolation.
    pub fn is_simple_literal(&self) -> bool {
        matches!(
            self,
            ExprKind::Integer(_)
                | ExprKind::Float(_)
                | ExprKind::Boolean(_)
                | ExprKind::Nil
                | ExprKind::String(_)
                | ExprKind::Rune(_)
                | ExprKind::Quantity(_)
                | ExprKind::Path(_)
                | ExprKind::Url(_)
        )
    }
}

/// One `value unit` part of a quantity literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityPart {
    /// Magnitude
    pub value: f64,
    /// Unit suffix
    pub unit: String,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// +
    Add,
    /// -
    Sub,
    /// *
    Mul,
    /// /
    Div,
    /// <
    Less,
    /// <=
    LessEq,
    /// >
    Greater,
    /// >=
    GreaterEq,
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// is
    Is,
    /// is-not
    IsNot,
    /// in
    In,
    /// not-in
    NotIn,
    /// keyof
    Keyof,
    /// match
    Match,
    /// not-match
    NotMatch,
    /// substrof
    Substrof,
    /// ..
    Range,
    /// ..<
    ExclusiveRange,
    /// and
    And,
    /// or
    Or,
    /// ??
    NilCoalesce,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// -
    Negate,
    /// !
    Not,
}

/// An element of a list, tuple or argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    /// Plain element
    Single(Expr),
    /// ...iterable
    Spread(Expr),
}

impl Element {
    /// The wrapped expression.
    pub fn expr(&self) -> &Expr {
        match self {
            Element::Single(e) | Element::Spread(e) => e,
        }
    }

    /// Returns true for a spread element.
    pub fn is_spread(&self) -> bool {
        matches!(self, Element::Spread(_))
    }
}

/// Object or record literal contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLiteral {
    /// Properties in source order
    pub properties: Vec<ObjectProperty>,
    /// Spread objects, merged after the properties
    pub spreads: Vec<Expr>,
}

/// A property of an object literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectProperty {
    /// key: value
    Keyed {
        /// Property name
        key: String,
        /// Property value
        value: Expr,
    },
    /// Positional element without a key
    Element(Expr),
}

/// A `key: value` entry of a dictionary literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Key expression
    pub key: Expr,
    /// Value expression
    pub value: Expr,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: Identifier,
    /// `...rest` parameter
    pub variadic: bool,
}

/// A function literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionLiteral {
    /// Node id, key into the capture and hoisting data
    pub id: NodeId,
    /// Source span
    pub span: Span,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Explicit capture list `fn[a, b]`
    pub captures: Vec<Identifier>,
    /// Body
    pub body: FunctionBody,
}

/// Body of a function literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionBody {
    /// `fn(x) => x + 1`
    Expression(Box<Expr>),
    /// `fn(x) { ... }`
    Block(Block),
}

/// A list-producing `for` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForExpression {
    /// Key variable
    pub key: Option<LoopBinding>,
    /// Value variable
    pub value: Option<LoopBinding>,
    /// Iterated expression
    pub iterated: Expr,
    /// Per-iteration element
    pub body: Expr,
}

/// Object or record pattern contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatternLiteral {
    /// Property patterns
    pub properties: Vec<PatternProperty>,
    /// Spread patterns merged afterward
    pub spreads: Vec<Expr>,
    /// Reject values with extra properties
    pub exact: bool,
}

/// A `key: pattern` entry of an object pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternProperty {
    /// Property name
    pub key: String,
    /// Pattern for the property value
    pub value: Expr,
}

/// List or tuple pattern contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencePatternLiteral {
    /// Fixed element patterns
    pub elements: Vec<Expr>,
    /// Pattern matching every element, replaces `elements`
    pub general: Option<Box<Expr>>,
}

/// A string pattern node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringPattern {
    /// Node id
    pub id: NodeId,
    /// Source span
    pub span: Span,
    /// The pattern
    pub kind: StringPatternKind,
}

/// The string pattern algebra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StringPatternKind {
    /// Exact string
    Exact(String),
    /// 'a'..'z'
    RuneRange {
        /// Lower bound
        start: char,
        /// Upper bound (inclusive)
        end: char,
    },
    /// Regular expression
    Regex(String),
    /// Reference to a named pattern
    Named(String),
    /// One of several patterns
    Union(Vec<StringPattern>),
    /// Patterns matched one after the other
    Sequence(Vec<SequenceElement>),
}

/// Element of a sequence string pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceElement {
    /// Element pattern
    pub pattern: StringPattern,
    /// How many times it repeats
    pub repetition: Option<Repetition>,
    /// Capture group name
    pub group: Option<String>,
}

/// Repetition of a sequence element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repetition {
    /// *
    ZeroOrMore,
    /// +
    AtLeastOne,
    /// ?
    Optional,
    /// =N
    Exactly(u8),
}

/// A `go` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnExpression {
    /// Routine metadata
    pub meta: Option<Expr>,
    /// Restricted global set `name: value`
    pub globals: Option<Vec<(Identifier, Expr)>>,
    /// What the routine runs
    pub body: SpawnBody,
}

/// Body of a spawned routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpawnBody {
    /// `do { ... }`
    Block(Block),
    /// `do f(x)`
    Call(Expr),
}

/// A lifetime job expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeJobExpression {
    /// Job metadata
    pub meta: Expr,
    /// Pattern of the values the job attaches to
    pub subject: Option<Expr>,
    /// Job body
    pub body: Block,
}

/// A test suite or test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestBlock {
    /// Test metadata (usually a name)
    pub meta: Option<Expr>,
    /// Test body
    pub body: Block,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_contains() {
        let span = Span::new(4, 8);
        assert!(span.contains(4));
        assert!(span.contains(7));
        assert!(!span.contains(8));
        assert_eq!(span.cover(Span::new(1, 5)), Span::new(1, 8));
    }

    #[test]
    fn test_assign_op_binary() {
        assert_eq!(AssignOp::Assign.binary(), None);
        assert_eq!(AssignOp::Mul.binary(), Some(BinaryOp::Mul));
    }

    #[test]
    fn test_chunk_json() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let stmt = b.expr_stmt(one);
        let chunk = b.chunk("main.sb", vec![stmt]);

        let json = serde_json::to_string(&chunk).unwrap();
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
    }
}
