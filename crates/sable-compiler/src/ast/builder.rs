//! Programmatic AST construction.
//!
//! The builder hands out fresh node ids and synthetic, strictly increasing
//! spans: a node built after its children covers all of them, and a node
//! built after another one starts at or past that node's end. This keeps
//! position-based analysis data (hoisting points) meaningful for trees that
//! never went through a parser.

use super::*;

/// Allocates node ids and spans while building AST nodes.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
    cursor: u32,
}

impl AstBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current source position; the next leaf starts here.
    pub fn position(&self) -> u32 {
        self.cursor
    }

    /// Allocates a node id without a node, for analysis-data keys.
    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn leaf(&mut self) -> (NodeId, Span) {
        let span = Span::new(self.cursor, self.cursor + 1);
        self.cursor += 1;
        (self.fresh_id(), span)
    }

    fn wrap(&mut self, parts: &[Span]) -> (NodeId, Span) {
        let start = parts.iter().map(|s| s.start).min().unwrap_or(self.cursor);
        self.cursor += 1;
        (self.fresh_id(), Span::new(start, self.cursor))
    }

    fn expr(&mut self, parts: &[Span], kind: ExprKind) -> Expr {
        let (id, span) = if parts.is_empty() {
            self.leaf()
        } else {
            self.wrap(parts)
        };
        Expr { id, span, kind }
    }

    fn stmt(&mut self, parts: &[Span], kind: StmtKind) -> Stmt {
        let (id, span) = if parts.is_empty() {
            self.leaf()
        } else {
            self.wrap(parts)
        };
        Stmt { id, span, kind }
    }

    /// Builds an identifier.
    pub fn ident(&mut self, name: &str) -> Identifier {
        let (_, span) = self.leaf();
        Identifier {
            name: name.to_string(),
            span,
        }
    }

    /// Builds a chunk with an empty source text.
    pub fn chunk(&mut self, name: &str, statements: Vec<Stmt>) -> Chunk {
        self.chunk_with_source(name, "", statements)
    }

    /// Builds a chunk carrying its source text.
    pub fn chunk_with_source(&mut self, name: &str, source: &str, statements: Vec<Stmt>) -> Chunk {
        Chunk {
            id: self.fresh_id(),
            name: name.to_string(),
            source: source.to_string(),
            statements,
        }
    }

    /// Builds a block.
    pub fn block(&mut self, statements: Vec<Stmt>) -> Block {
        let spans: Vec<Span> = statements.iter().map(|s| s.span).collect();
        let (_, span) = if spans.is_empty() {
            self.leaf()
        } else {
            self.wrap(&spans)
        };
        Block { span, statements }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// Integer literal.
    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(&[], ExprKind::Integer(value))
    }

    /// Float literal.
    pub fn float(&mut self, value: f64) -> Expr {
        self.expr(&[], ExprKind::Float(value))
    }

    /// Boolean literal.
    pub fn boolean(&mut self, value: bool) -> Expr {
        self.expr(&[], ExprKind::Boolean(value))
    }

    /// nil
    pub fn nil(&mut self) -> Expr {
        self.expr(&[], ExprKind::Nil)
    }

    /// String literal.
    pub fn string(&mut self, value: &str) -> Expr {
        self.expr(&[], ExprKind::String(value.to_string()))
    }

    /// Rune literal.
    pub fn rune(&mut self, value: char) -> Expr {
        self.expr(&[], ExprKind::Rune(value))
    }

    /// Quantity literal from `(value, unit)` parts.
    pub fn quantity(&mut self, parts: &[(f64, &str)]) -> Expr {
        let parts = parts
            .iter()
            .map(|(value, unit)| QuantityPart {
                value: *value,
                unit: unit.to_string(),
            })
            .collect();
        self.expr(&[], ExprKind::Quantity(parts))
    }

    /// Path literal.
    pub fn path(&mut self, value: &str) -> Expr {
        self.expr(&[], ExprKind::Path(value.to_string()))
    }

    /// URL literal.
    pub fn url(&mut self, value: &str) -> Expr {
        self.expr(&[], ExprKind::Url(value.to_string()))
    }

    /// Regex literal.
    pub fn regex(&mut self, value: &str) -> Expr {
        self.expr(&[], ExprKind::Regex(value.to_string()))
    }

    // ========================================================================
    // Variables and operators
    // ========================================================================

    /// Plain variable `x`.
    pub fn var(&mut self, name: &str) -> Expr {
        self.expr(&[], ExprKind::Variable(name.to_string()))
    }

    /// Global-only variable `$$x`.
    pub fn global_var(&mut self, name: &str) -> Expr {
        self.expr(&[], ExprKind::GlobalVariable(name.to_string()))
    }

    /// Local-only variable `$x`.
    pub fn local_var(&mut self, name: &str) -> Expr {
        self.expr(&[], ExprKind::LocalVariable(name.to_string()))
    }

    /// Binary expression.
    pub fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let parts = [left.span, right.span];
        self.expr(
            &parts,
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    /// Unary expression.
    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        let parts = [operand.span];
        self.expr(
            &parts,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        )
    }

    /// `a.b`
    pub fn member(&mut self, object: Expr, property: &str) -> Expr {
        self.member_access(object, property, false)
    }

    /// `a.?b`
    pub fn optional_member(&mut self, object: Expr, property: &str) -> Expr {
        self.member_access(object, property, true)
    }

    fn member_access(&mut self, object: Expr, property: &str, optional: bool) -> Expr {
        let parts = [object.span];
        self.expr(
            &parts,
            ExprKind::Member {
                object: Box::new(object),
                property: property.to_string(),
                optional,
            },
        )
    }

    /// `a.(e)`
    pub fn computed_member(&mut self, object: Expr, property: Expr) -> Expr {
        let parts = [object.span, property.span];
        self.expr(
            &parts,
            ExprKind::ComputedMember {
                object: Box::new(object),
                property: Box::new(property),
            },
        )
    }

    /// `a::b`
    pub fn namespace_member(&mut self, object: Expr, member: &str) -> Expr {
        let parts = [object.span];
        self.expr(
            &parts,
            ExprKind::NamespaceMember {
                object: Box::new(object),
                member: member.to_string(),
            },
        )
    }

    /// `a[i]`
    pub fn index(&mut self, object: Expr, index: Expr) -> Expr {
        let parts = [object.span, index.span];
        self.expr(
            &parts,
            ExprKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
        )
    }

    /// `a[i:j]`
    pub fn slice(&mut self, object: Expr, start: Option<Expr>, end: Option<Expr>) -> Expr {
        let mut parts = vec![object.span];
        parts.extend(start.iter().chain(end.iter()).map(|e| e.span));
        self.expr(
            &parts,
            ExprKind::Slice {
                object: Box::new(object),
                start: start.map(Box::new),
                end: end.map(Box::new),
            },
        )
    }

    // ========================================================================
    // Containers and calls
    // ========================================================================

    /// List literal.
    pub fn list(&mut self, elements: Vec<Element>) -> Expr {
        let parts = element_spans(&elements);
        self.expr(&parts, ExprKind::List(elements))
    }

    /// Tuple literal.
    pub fn tuple(&mut self, elements: Vec<Element>) -> Expr {
        let parts = element_spans(&elements);
        self.expr(&parts, ExprKind::Tuple(elements))
    }

    /// Object literal.
    pub fn object(&mut self, properties: Vec<ObjectProperty>, spreads: Vec<Expr>) -> Expr {
        let parts = object_spans(&properties, &spreads);
        self.expr(&parts, ExprKind::Object(ObjectLiteral { properties, spreads }))
    }

    /// Record literal.
    pub fn record(&mut self, properties: Vec<ObjectProperty>, spreads: Vec<Expr>) -> Expr {
        let parts = object_spans(&properties, &spreads);
        self.expr(&parts, ExprKind::Record(ObjectLiteral { properties, spreads }))
    }

    /// Dictionary literal.
    pub fn dictionary(&mut self, entries: Vec<(Expr, Expr)>) -> Expr {
        let parts: Vec<Span> = entries.iter().map(|(k, v)| k.span.cover(v.span)).collect();
        let entries = entries
            .into_iter()
            .map(|(key, value)| DictionaryEntry { key, value })
            .collect();
        self.expr(&parts, ExprKind::Dictionary(entries))
    }

    /// Call expression.
    pub fn call(&mut self, callee: Expr, arguments: Vec<Element>) -> Expr {
        let mut parts = element_spans(&arguments);
        parts.push(callee.span);
        self.expr(
            &parts,
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
        )
    }

    /// Function literal with parameter names, explicit captures and a body.
    pub fn function(&mut self, params: &[&str], captures: &[&str], body: FunctionBody) -> FunctionLiteral {
        let params = params
            .iter()
            .map(|name| {
                let (name, variadic) = match name.strip_prefix("...") {
                    Some(rest) => (rest, true),
                    None => (*name, false),
                };
                Parameter {
                    name: self.ident(name),
                    variadic,
                }
            })
            .collect();
        let captures = captures.iter().map(|name| self.ident(name)).collect();
        let body_span = match &body {
            FunctionBody::Expression(e) => e.span,
            FunctionBody::Block(b) => b.span,
        };
        let (id, span) = self.wrap(&[body_span]);
        FunctionLiteral {
            id,
            span,
            params,
            captures,
            body,
        }
    }

    /// Function literal as an expression.
    pub fn function_expr(&mut self, function: FunctionLiteral) -> Expr {
        let parts = [function.span];
        self.expr(&parts, ExprKind::Function(Box::new(function)))
    }

    /// `if` expression.
    pub fn if_expr(&mut self, test: Expr, consequent: Expr, alternate: Option<Expr>) -> Expr {
        let mut parts = vec![test.span, consequent.span];
        parts.extend(alternate.iter().map(|e| e.span));
        self.expr(
            &parts,
            ExprKind::If {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: alternate.map(Box::new),
            },
        )
    }

    /// List-producing `for` expression.
    pub fn for_expr(&mut self, key: Option<LoopBinding>, value: Option<LoopBinding>, iterated: Expr, body: Expr) -> Expr {
        let parts = [iterated.span, body.span];
        self.expr(
            &parts,
            ExprKind::For(Box::new(ForExpression {
                key,
                value,
                iterated,
                body,
            })),
        )
    }

    /// Loop variable without a type pattern.
    pub fn binding(&mut self, name: &str) -> LoopBinding {
        LoopBinding {
            name: self.ident(name),
            pattern: None,
        }
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    /// `%name`
    pub fn pattern_ident(&mut self, name: &str) -> Expr {
        self.expr(&[], ExprKind::PatternIdentifier(name.to_string()))
    }

    /// `%ns.member`
    pub fn pattern_namespace_member(&mut self, namespace: &str, member: &str) -> Expr {
        self.expr(
            &[],
            ExprKind::PatternNamespaceMember {
                namespace: namespace.to_string(),
                member: member.to_string(),
            },
        )
    }

    /// Object pattern.
    pub fn object_pattern(&mut self, properties: Vec<(&str, Expr)>, spreads: Vec<Expr>, exact: bool) -> Expr {
        let literal = pattern_object(properties, spreads, exact);
        let parts = pattern_object_spans(&literal);
        self.expr(&parts, ExprKind::ObjectPattern(literal))
    }

    /// Record pattern.
    pub fn record_pattern(&mut self, properties: Vec<(&str, Expr)>, exact: bool) -> Expr {
        let literal = pattern_object(properties, Vec::new(), exact);
        let parts = pattern_object_spans(&literal);
        self.expr(&parts, ExprKind::RecordPattern(literal))
    }

    /// List pattern with fixed elements or one general element.
    pub fn list_pattern(&mut self, elements: Vec<Expr>, general: Option<Expr>) -> Expr {
        let (parts, literal) = sequence_pattern(elements, general);
        self.expr(&parts, ExprKind::ListPattern(literal))
    }

    /// Tuple pattern.
    pub fn tuple_pattern(&mut self, elements: Vec<Expr>, general: Option<Expr>) -> Expr {
        let (parts, literal) = sequence_pattern(elements, general);
        self.expr(&parts, ExprKind::TuplePattern(literal))
    }

    /// Union pattern.
    pub fn union_pattern(&mut self, cases: Vec<Expr>) -> Expr {
        let parts: Vec<Span> = cases.iter().map(|e| e.span).collect();
        self.expr(&parts, ExprKind::UnionPattern(cases))
    }

    /// `%p?`
    pub fn optional_pattern(&mut self, inner: Expr) -> Expr {
        let parts = [inner.span];
        self.expr(&parts, ExprKind::OptionalPattern(Box::new(inner)))
    }

    /// `%(e)`
    pub fn pattern_conversion(&mut self, inner: Expr) -> Expr {
        let parts = [inner.span];
        self.expr(&parts, ExprKind::PatternConversion(Box::new(inner)))
    }

    /// String pattern as an expression.
    pub fn string_pattern_expr(&mut self, pattern: StringPattern) -> Expr {
        let parts = [pattern.span];
        self.expr(&parts, ExprKind::StringPattern(Box::new(pattern)))
    }

    /// String pattern node.
    pub fn string_pattern(&mut self, kind: StringPatternKind) -> StringPattern {
        let (id, span) = self.leaf();
        StringPattern { id, span, kind }
    }

    // ========================================================================
    // Embedded modules
    // ========================================================================

    /// `go` expression.
    pub fn spawn(&mut self, meta: Option<Expr>, globals: Option<Vec<(&str, Expr)>>, body: SpawnBody) -> Expr {
        let globals = globals.map(|globals| {
            globals
                .into_iter()
                .map(|(name, value)| (self.ident(name), value))
                .collect::<Vec<_>>()
        });
        let mut parts: Vec<Span> = meta.iter().map(|e| e.span).collect();
        if let Some(globals) = &globals {
            parts.extend(globals.iter().map(|(_, e)| e.span));
        }
        parts.push(match &body {
            SpawnBody::Block(b) => b.span,
            SpawnBody::Call(e) => e.span,
        });
        self.expr(&parts, ExprKind::Spawn(Box::new(SpawnExpression { meta, globals, body })))
    }

    /// Lifetime job expression.
    pub fn lifetime_job(&mut self, meta: Expr, subject: Option<Expr>, body: Block) -> Expr {
        let parts = [meta.span, body.span];
        self.expr(
            &parts,
            ExprKind::LifetimeJob(Box::new(LifetimeJobExpression { meta, subject, body })),
        )
    }

    /// Test block contents.
    pub fn test_block(&mut self, meta: Option<Expr>, body: Block) -> TestBlock {
        TestBlock { meta, body }
    }

    /// Test suite used as a value.
    pub fn test_suite_expr(&mut self, block: TestBlock) -> Expr {
        let parts = [block.body.span];
        self.expr(&parts, ExprKind::TestSuite(Box::new(block)))
    }

    /// Test case used as a value.
    pub fn test_case_expr(&mut self, block: TestBlock) -> Expr {
        let parts = [block.body.span];
        self.expr(&parts, ExprKind::TestCase(Box::new(block)))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Expression statement.
    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        let parts = [expr.span];
        self.stmt(&parts, StmtKind::Expression(expr))
    }

    /// `var name = value`
    pub fn var_decl(&mut self, name: &str, value: Expr) -> Stmt {
        self.typed_var_decl(name, None, value)
    }

    /// `var name %type = value`
    pub fn typed_var_decl(&mut self, name: &str, type_annotation: Option<Expr>, value: Expr) -> Stmt {
        let name = self.ident(name);
        let parts = [name.span, value.span];
        self.stmt(
            &parts,
            StmtKind::LocalDeclarations(vec![LocalDeclaration {
                name,
                type_annotation,
                value,
            }]),
        )
    }

    /// `globalvar name = value`
    pub fn global_decl(&mut self, name: &str, value: Expr, constant: bool) -> Stmt {
        let name = self.ident(name);
        let parts = [name.span, value.span];
        self.stmt(
            &parts,
            StmtKind::GlobalDeclarations(vec![GlobalDeclaration { name, value, constant }]),
        )
    }

    /// `target = value`
    pub fn assign(&mut self, target: Expr, value: Expr) -> Stmt {
        self.assign_op(target, AssignOp::Assign, value)
    }

    /// `target op= value`
    pub fn assign_op(&mut self, target: Expr, op: AssignOp, value: Expr) -> Stmt {
        let parts = [target.span, value.span];
        self.stmt(&parts, StmtKind::Assignment { target, op, value })
    }

    /// `assign a b = value`
    pub fn multi_assign(&mut self, targets: &[&str], value: Expr, nillable: bool) -> Stmt {
        let targets: Vec<Identifier> = targets.iter().map(|name| self.ident(name)).collect();
        let mut parts: Vec<Span> = targets.iter().map(|t| t.span).collect();
        parts.push(value.span);
        self.stmt(
            &parts,
            StmtKind::MultiAssignment {
                targets,
                value,
                nillable,
            },
        )
    }

    /// `if` statement.
    pub fn if_stmt(&mut self, test: Expr, consequent: Block, alternate: Option<Stmt>) -> Stmt {
        let mut parts = vec![test.span, consequent.span];
        parts.extend(alternate.iter().map(|s| s.span));
        self.stmt(
            &parts,
            StmtKind::If {
                test,
                consequent,
                alternate: alternate.map(Box::new),
            },
        )
    }

    /// Block statement.
    pub fn block_stmt(&mut self, block: Block) -> Stmt {
        let parts = [block.span];
        self.stmt(&parts, StmtKind::Block(block))
    }

    /// `for` statement.
    pub fn for_stmt(&mut self, key: Option<LoopBinding>, value: Option<LoopBinding>, iterated: Expr, body: Block) -> Stmt {
        self.for_loop(key, value, iterated, body, false)
    }

    /// Chunked `for` statement.
    pub fn chunked_for_stmt(&mut self, value: LoopBinding, iterated: Expr, body: Block) -> Stmt {
        self.for_loop(None, Some(value), iterated, body, true)
    }

    fn for_loop(&mut self, key: Option<LoopBinding>, value: Option<LoopBinding>, iterated: Expr, body: Block, chunked: bool) -> Stmt {
        let parts = [iterated.span, body.span];
        self.stmt(
            &parts,
            StmtKind::For(ForStatement {
                key,
                value,
                iterated,
                body,
                chunked,
            }),
        )
    }

    /// `walk` statement.
    pub fn walk_stmt(&mut self, walked: Expr, meta: Option<&str>, entry: &str, body: Block) -> Stmt {
        let meta = meta.map(|name| self.ident(name));
        let entry = self.ident(entry);
        let parts = [walked.span, body.span];
        self.stmt(
            &parts,
            StmtKind::Walk(WalkStatement {
                walked,
                meta,
                entry,
                body,
            }),
        )
    }

    /// `break`
    pub fn break_stmt(&mut self) -> Stmt {
        self.stmt(&[], StmtKind::Break)
    }

    /// `continue`
    pub fn continue_stmt(&mut self) -> Stmt {
        self.stmt(&[], StmtKind::Continue)
    }

    /// `prune`
    pub fn prune_stmt(&mut self) -> Stmt {
        self.stmt(&[], StmtKind::Prune)
    }

    /// `return [value]`
    pub fn ret(&mut self, value: Option<Expr>) -> Stmt {
        let parts: Vec<Span> = value.iter().map(|e| e.span).collect();
        self.stmt(&parts, StmtKind::Return(value))
    }

    /// `switch` statement.
    pub fn switch_stmt(&mut self, discriminant: Expr, cases: Vec<(Vec<Expr>, Block)>, default: Option<Block>) -> Stmt {
        let mut parts = vec![discriminant.span];
        parts.extend(cases.iter().map(|(_, b)| b.span));
        let cases = cases
            .into_iter()
            .map(|(values, body)| SwitchCase { values, body })
            .collect();
        self.stmt(
            &parts,
            StmtKind::Switch(SwitchStatement {
                discriminant,
                cases,
                default,
            }),
        )
    }

    /// `match` statement; each case may bind its capture groups.
    pub fn match_stmt(&mut self, discriminant: Expr, cases: Vec<(Vec<Expr>, Option<&str>, Block)>, default: Option<Block>) -> Stmt {
        let mut parts = vec![discriminant.span];
        parts.extend(cases.iter().map(|(_, _, b)| b.span));
        let cases = cases
            .into_iter()
            .map(|(values, group, body)| MatchCase {
                values,
                group_binding: group.map(|name| self.ident(name)),
                body,
            })
            .collect();
        self.stmt(
            &parts,
            StmtKind::Match(MatchStatement {
                discriminant,
                cases,
                default,
            }),
        )
    }

    /// `fn name(...) ...`
    pub fn fn_decl(&mut self, name: &str, function: FunctionLiteral) -> Stmt {
        let name = self.ident(name);
        let parts = [name.span, function.span];
        self.stmt(&parts, StmtKind::FunctionDeclaration(FunctionDeclaration { name, function }))
    }

    /// `%name = pattern`
    pub fn pattern_def(&mut self, name: &str, pattern: Expr) -> Stmt {
        let parts = [pattern.span];
        self.stmt(
            &parts,
            StmtKind::PatternDefinition {
                name: name.to_string(),
                pattern,
            },
        )
    }

    /// `%ns. = namespace`
    pub fn pattern_namespace_def(&mut self, name: &str, namespace: Expr) -> Stmt {
        let parts = [namespace.span];
        self.stmt(
            &parts,
            StmtKind::PatternNamespaceDefinition {
                name: name.to_string(),
                namespace,
            },
        )
    }

    /// `struct Name {}`
    pub fn struct_def(&mut self, name: &str) -> Stmt {
        self.stmt(
            &[],
            StmtKind::StructDefinition {
                name: name.to_string(),
            },
        )
    }

    /// Inclusion of another chunk.
    pub fn include(&mut self, chunk: Chunk) -> Stmt {
        let parts: Vec<Span> = chunk.statements.iter().map(|s| s.span).collect();
        self.stmt(&parts, StmtKind::Include(IncludedChunk { chunk }))
    }

    /// `testsuite` statement.
    pub fn test_suite(&mut self, block: TestBlock) -> Stmt {
        let parts = [block.body.span];
        self.stmt(&parts, StmtKind::TestSuite(block))
    }

    /// `testcase` statement.
    pub fn test_case(&mut self, block: TestBlock) -> Stmt {
        let parts = [block.body.span];
        self.stmt(&parts, StmtKind::TestCase(block))
    }
}

fn element_spans(elements: &[Element]) -> Vec<Span> {
    elements.iter().map(|e| e.expr().span).collect()
}

fn object_spans(properties: &[ObjectProperty], spreads: &[Expr]) -> Vec<Span> {
    properties
        .iter()
        .map(|p| match p {
            ObjectProperty::Keyed { value, .. } => value.span,
            ObjectProperty::Element(e) => e.span,
        })
        .chain(spreads.iter().map(|e| e.span))
        .collect()
}

fn pattern_object(properties: Vec<(&str, Expr)>, spreads: Vec<Expr>, exact: bool) -> ObjectPatternLiteral {
    ObjectPatternLiteral {
        properties: properties
            .into_iter()
            .map(|(key, value)| PatternProperty {
                key: key.to_string(),
                value,
            })
            .collect(),
        spreads,
        exact,
    }
}

fn pattern_object_spans(literal: &ObjectPatternLiteral) -> Vec<Span> {
    literal
        .properties
        .iter()
        .map(|p| p.value.span)
        .chain(literal.spreads.iter().map(|e| e.span))
        .collect()
}

fn sequence_pattern(elements: Vec<Expr>, general: Option<Expr>) -> (Vec<Span>, SequencePatternLiteral) {
    let parts = elements.iter().chain(general.iter()).map(|e| e.span).collect();
    (
        parts,
        SequencePatternLiteral {
            elements,
            general: general.map(Box::new),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_cover_children() {
        let mut b = AstBuilder::new();
        let left = b.int(1);
        let right = b.int(2);
        let sum = b.binary(BinaryOp::Add, left.clone(), right.clone());
        assert!(sum.span.start <= left.span.start);
        assert!(sum.span.end > right.span.end);
    }

    #[test]
    fn test_statements_are_ordered() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let first = b.expr_stmt(one);
        let two = b.int(2);
        let second = b.expr_stmt(two);
        assert!(second.span.start >= first.span.end);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_variadic_parameter() {
        let mut b = AstBuilder::new();
        let body = b.var("rest");
        let f = b.function(&["a", "...rest"], &[], FunctionBody::Expression(Box::new(body)));
        assert!(!f.params[0].variadic);
        assert!(f.params[1].variadic);
        assert_eq!(f.params[1].name.name, "rest");
    }
}
