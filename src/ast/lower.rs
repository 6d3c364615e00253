//! Parse tree to AST lowering.
//!
//! Flattens each file's concrete tree into typed `Definition` records,
//! normalising record forms, patterns, and block bodies along the way.
//! Structural mismatches are fatal; the lowerer never recovers.

use std::rc::Rc;

use crate::ast::ast::{
    Block, Definition, Expression, Literal, LiteralValue, Pattern, ProcedureDefinition,
    RecordKey, RecordPattern, Statement, SymbolTable, TypeDefinition, TypeExpression,
    ValueDefinition, Visibility,
};
use crate::errors::{LowerError, Result};
use crate::lexer::{unescape, Token, TokenKind};
use crate::parser::{Construct, ParseNode};

/// Strip one enclosing backtick pair from a quoted identifier lexeme.
fn identifier_name(lexeme: &str) -> String {
    lexeme
        .strip_prefix('`')
        .and_then(|inner| inner.strip_suffix('`'))
        .filter(|inner| !inner.is_empty())
        .unwrap_or(lexeme)
        .to_string()
}

/// Parse tree to AST lowerer.
///
/// Files lowered through one `Lowerer` share a root scope; each file
/// gets its own child `SymbolTable`, left empty for the elaborator.
pub struct Lowerer {
    root: Rc<SymbolTable>,
    file_scopes: Vec<Rc<SymbolTable>>,
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lowerer {
    pub fn new() -> Self {
        Self {
            root: SymbolTable::root(),
            file_scopes: Vec::new(),
        }
    }

    /// The per-file scopes allocated so far, in lowering order.
    pub fn file_scopes(&self) -> &[Rc<SymbolTable>] {
        &self.file_scopes
    }

    /// Lower a sequence of parsed files into a flat definition sequence.
    /// Ordering across files is immaterial to the consumer; within a
    /// file, structural duplicates are dropped.
    pub fn lower(&mut self, files: &[ParseNode]) -> Result<Vec<Definition>> {
        let mut definitions = Vec::new();
        for file in files {
            definitions.extend(self.lower_file(file)?);
        }
        Ok(definitions)
    }

    pub fn lower_file(&mut self, file: &ParseNode) -> Result<Vec<Definition>> {
        if !file.is(Construct::File) {
            return Err(self.mismatch("expected a file", file));
        }

        self.file_scopes.push(SymbolTable::child(&self.root));

        let mut definitions: Vec<Definition> = Vec::new();
        for child in file.children() {
            let definition = self.lower_definition(child)?;
            if !definitions.contains(&definition) {
                definitions.push(definition);
            }
        }
        Ok(definitions)
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    fn lower_definition(&self, node: &ParseNode) -> Result<Definition> {
        match node.construct() {
            Some(Construct::ValueDefinition) => {
                Ok(Definition::Value(self.lower_value_definition(node)?))
            }
            Some(Construct::ProcedureDefinition) => {
                Ok(Definition::Procedure(self.lower_procedure_definition(node)?))
            }
            Some(Construct::TypeDefinition) => {
                Ok(Definition::Type(self.lower_type_definition(node)?))
            }
            _ => Err(self.mismatch("expected a definition", node)),
        }
    }

    fn lower_value_definition(&self, node: &ParseNode) -> Result<ValueDefinition> {
        let [modifiers, head, pattern, body] = node.children() else {
            return Err(self.mismatch("malformed value definition", node));
        };

        Ok(ValueDefinition {
            visibility: self.lower_modifiers(modifiers)?,
            type_annotation: self.lower_annotation(head)?,
            pattern: self.lower_pattern(pattern)?,
            value: self.lower_expression_or_block(body)?,
            extents: node.extents(),
        })
    }

    fn lower_procedure_definition(&self, node: &ParseNode) -> Result<ProcedureDefinition> {
        let [modifiers, head, name, parameter, body] = node.children() else {
            return Err(self.mismatch("malformed procedure definition", node));
        };

        let identifier = match name.as_leaf() {
            Some(token) if token.kind == TokenKind::Identifier => identifier_name(&token.lexeme),
            _ => return Err(self.mismatch("expected a procedure name", name)),
        };

        if !parameter.is(Construct::RecordPattern) {
            return Err(self.mismatch("expected a parameter record", parameter));
        }

        Ok(ProcedureDefinition {
            visibility: self.lower_modifiers(modifiers)?,
            return_type: self.lower_annotation(head)?,
            identifier,
            parameter: self.lower_record_pattern(parameter)?,
            body: self.lower_body(body)?,
            extents: node.extents(),
        })
    }

    fn lower_type_definition(&self, node: &ParseNode) -> Result<TypeDefinition> {
        let [modifiers, name, definition] = node.children() else {
            return Err(self.mismatch("malformed type definition", node));
        };

        let identifier = match name.as_leaf() {
            Some(token) if token.kind == TokenKind::Identifier => identifier_name(&token.lexeme),
            _ => return Err(self.mismatch("expected a type name", name)),
        };

        Ok(TypeDefinition {
            visibility: self.lower_modifiers(modifiers)?,
            identifier,
            definition: self.lower_type_expression(definition)?,
            extents: node.extents(),
        })
    }

    fn lower_modifiers(&self, node: &ParseNode) -> Result<Visibility> {
        if !node.is(Construct::Modifiers) {
            return Err(self.mismatch("expected modifiers", node));
        }
        let visibility = match node.children() {
            [] => Visibility::Private,
            [child] => match child.as_leaf().map(|t| t.lexeme.as_str()) {
                Some("public") => Visibility::Public,
                Some("internal") => Visibility::Internal,
                _ => Visibility::Private,
            },
            _ => return Err(self.mismatch("malformed modifiers", node)),
        };
        Ok(visibility)
    }

    /// The definition head: the `let` keyword stands for an inferred
    /// type, an identifier names one.
    fn lower_annotation(&self, node: &ParseNode) -> Result<TypeExpression> {
        match node.as_leaf() {
            Some(token) if token.is_keyword("let") => Ok(TypeExpression::Inferred {
                extents: token.extents,
            }),
            Some(token) if token.kind == TokenKind::Identifier => Ok(TypeExpression::Id {
                name: identifier_name(&token.lexeme),
                extents: token.extents,
            }),
            _ => Err(self.mismatch("expected a type annotation", node)),
        }
    }

    // ========================================================================
    // Blocks and statements
    // ========================================================================

    /// Lower a definition body. A bare expression is lifted into
    /// `Block([Return(expression)])` with identical extents.
    fn lower_body(&self, node: &ParseNode) -> Result<Block> {
        if node.is(Construct::Block) {
            return self.lower_block(node);
        }
        let extents = node.extents();
        let value = self.lower_expression(node)?;
        Ok(Block {
            statements: vec![Statement::Return { value, extents }],
            extents,
        })
    }

    fn lower_block(&self, node: &ParseNode) -> Result<Block> {
        if !node.is(Construct::Block) {
            return Err(self.mismatch("expected a block", node));
        }
        let statements = node
            .children()
            .iter()
            .map(|child| self.lower_statement(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Block {
            statements,
            extents: node.extents(),
        })
    }

    fn lower_statement(&self, node: &ParseNode) -> Result<Statement> {
        if let Some(token) = node.as_leaf() {
            if token.is_keyword("unreachable") {
                return Ok(Statement::Unreachable {
                    extents: token.extents,
                });
            }
            return Ok(Statement::Expression(self.lower_expression(node)?));
        }

        match node.construct() {
            Some(Construct::ReturnStatement) => {
                let [value] = node.children() else {
                    return Err(self.mismatch("malformed return statement", node));
                };
                Ok(Statement::Return {
                    value: self.lower_expression_or_block(value)?,
                    extents: node.extents(),
                })
            }
            Some(Construct::ValueDefinition) => {
                Ok(Statement::Binding(self.lower_value_definition(node)?))
            }
            Some(Construct::ProcedureDefinition) => Err(self.unimplemented(
                "procedure definitions are not supported inside blocks",
                node,
            )),
            Some(Construct::Block) => Ok(Statement::Expression(Expression::Block(
                self.lower_block(node)?,
            ))),
            _ => Ok(Statement::Expression(self.lower_expression(node)?)),
        }
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    fn lower_pattern(&self, node: &ParseNode) -> Result<Pattern> {
        if let Some(token) = node.as_leaf() {
            if token.kind == TokenKind::Identifier {
                return Ok(Pattern::Id {
                    identifier: identifier_name(&token.lexeme),
                    type_tag: None,
                    extents: token.extents,
                });
            }
            if token.kind.is_literal() {
                return Ok(Pattern::Literal {
                    literal: self.lower_literal(token)?,
                    type_tag: None,
                    extents: token.extents,
                });
            }
            return Err(self.mismatch("expected a pattern", node));
        }

        match node.construct() {
            Some(Construct::RecordPattern) => {
                Ok(Pattern::Record(self.lower_record_pattern(node)?))
            }
            Some(Construct::TypeTag) => {
                let [inner, tag] = node.children() else {
                    return Err(self.mismatch("malformed type tag", node));
                };
                let tag = self.lower_type_expression(tag)?;
                Ok(match self.lower_pattern(inner)? {
                    Pattern::Id { identifier, .. } => Pattern::Id {
                        identifier,
                        type_tag: Some(tag),
                        extents: node.extents(),
                    },
                    Pattern::Literal { literal, .. } => Pattern::Literal {
                        literal,
                        type_tag: Some(tag),
                        extents: node.extents(),
                    },
                    Pattern::Record(record) => Pattern::Record(RecordPattern {
                        type_tag: Some(tag),
                        extents: node.extents(),
                        ..record
                    }),
                })
            }
            _ => Err(self.mismatch("expected a pattern", node)),
        }
    }

    fn lower_record_pattern(&self, node: &ParseNode) -> Result<RecordPattern> {
        if !node.is(Construct::RecordPattern) {
            return Err(self.mismatch("expected a record pattern", node));
        }

        let mut items = Vec::with_capacity(node.children().len());
        for child in node.children() {
            if child.is(Construct::RecordPatternItem) {
                let [key, value] = child.children() else {
                    return Err(self.mismatch("malformed record pattern item", child));
                };
                items.push((self.lower_record_key(key)?, self.lower_pattern(value)?));
            } else {
                items.push((RecordKey::Empty, self.lower_pattern(child)?));
            }
        }

        Ok(RecordPattern {
            items,
            type_tag: None,
            extents: node.extents(),
        })
    }

    fn lower_record_key(&self, node: &ParseNode) -> Result<RecordKey> {
        let Some(token) = node.as_leaf() else {
            return Err(self.mismatch("expected a record key", node));
        };
        if token.kind == TokenKind::Identifier {
            return Ok(RecordKey::Access {
                identifier: identifier_name(&token.lexeme),
                extents: token.extents,
            });
        }
        if token.kind.is_literal() {
            return Ok(RecordKey::Literal(self.lower_literal(token)?));
        }
        Err(self.mismatch("expected a record key", node))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Expression position that also admits a block (conditional arms,
    /// value bodies).
    fn lower_expression_or_block(&self, node: &ParseNode) -> Result<Expression> {
        if node.is(Construct::Block) {
            return Ok(Expression::Block(self.lower_block(node)?));
        }
        self.lower_expression(node)
    }

    fn lower_expression(&self, node: &ParseNode) -> Result<Expression> {
        if let Some(token) = node.as_leaf() {
            if token.kind == TokenKind::Identifier {
                return Ok(Expression::Access {
                    identifier: identifier_name(&token.lexeme),
                    extents: token.extents,
                });
            }
            if token.kind.is_literal() {
                return Ok(Expression::Literal(self.lower_literal(token)?));
            }
            return Err(self.mismatch("expected an expression", node));
        }

        match node.construct() {
            Some(Construct::RecordExpression) => {
                let mut items = Vec::with_capacity(node.children().len());
                for child in node.children() {
                    if child.is(Construct::RecordExpressionItem) {
                        let [key, value] = child.children() else {
                            return Err(self.mismatch("malformed record expression item", child));
                        };
                        items.push((self.lower_record_key(key)?, self.lower_expression(value)?));
                    } else {
                        items.push((RecordKey::Empty, self.lower_expression(child)?));
                    }
                }
                Ok(Expression::Record {
                    items,
                    extents: node.extents(),
                })
            }
            Some(Construct::ProcedureCall) => {
                let [procedure, argument] = node.children() else {
                    return Err(self.mismatch("malformed procedure call", node));
                };
                let procedure = match procedure.as_leaf() {
                    Some(token) if token.kind == TokenKind::Identifier => {
                        identifier_name(&token.lexeme)
                    }
                    _ => return Err(self.mismatch("expected a procedure name", procedure)),
                };
                Ok(Expression::Call {
                    procedure,
                    argument: Box::new(self.lower_expression(argument)?),
                    extents: node.extents(),
                })
            }
            Some(Construct::Conditional) => {
                let [condition, consequent, alternative] = node.children() else {
                    return Err(self.mismatch("malformed conditional", node));
                };
                Ok(Expression::Conditional {
                    condition: Box::new(self.lower_expression(condition)?),
                    consequent: Box::new(self.lower_expression_or_block(consequent)?),
                    alternative: Box::new(self.lower_expression_or_block(alternative)?),
                    extents: node.extents(),
                })
            }
            Some(Construct::Map) => {
                let [binding, collection, transformation] = node.children() else {
                    return Err(self.mismatch("malformed map expression", node));
                };
                Ok(Expression::Map {
                    binding: Box::new(self.lower_pattern(binding)?),
                    collection: Box::new(self.lower_expression(collection)?),
                    transformation: self.lower_body(transformation)?,
                    extents: node.extents(),
                })
            }
            Some(Construct::QualifiedIdentifier) => {
                let [base, key] = node.children() else {
                    return Err(self.mismatch("malformed qualified identifier", node));
                };
                Ok(Expression::Qualified {
                    base: Box::new(self.lower_expression(base)?),
                    key: self.lower_record_key(key)?,
                    extents: node.extents(),
                })
            }
            Some(Construct::TypeTag) => {
                let [expression, tag] = node.children() else {
                    return Err(self.mismatch("malformed type tag", node));
                };
                Ok(Expression::Tagged {
                    expression: Box::new(self.lower_expression_or_block(expression)?),
                    tag: self.lower_type_expression(tag)?,
                    extents: node.extents(),
                })
            }
            Some(Construct::Block) => Ok(Expression::Block(self.lower_block(node)?)),
            _ => Err(self.mismatch("expected an expression", node)),
        }
    }

    fn lower_literal(&self, token: &Token) -> Result<Literal> {
        let value = match token.kind {
            TokenKind::Integer => token.lexeme.parse::<i64>().map(LiteralValue::Integer).map_err(
                |_| {
                    LowerError::unimplemented(
                        format!("integer literal `{}` is out of range", token.lexeme),
                        token.extents,
                    )
                },
            )?,
            TokenKind::Decimal => token.lexeme.parse::<f64>().map(LiteralValue::Decimal).map_err(
                |_| {
                    LowerError::mismatch(
                        format!("malformed decimal literal `{}`", token.lexeme),
                        token.extents,
                    )
                },
            )?,
            TokenKind::Character => {
                let body = &token.lexeme[1..token.lexeme.len() - 1];
                let (decoded, _) = unescape(body);
                match decoded.chars().next() {
                    Some(c) => LiteralValue::Character(c),
                    None => {
                        return Err(LowerError::mismatch(
                            "empty character literal",
                            token.extents,
                        )
                        .into())
                    }
                }
            }
            TokenKind::String => {
                let body = &token.lexeme[1..token.lexeme.len() - 1];
                LiteralValue::String(unescape(body).0)
            }
            TokenKind::Boolean => LiteralValue::Boolean(token.lexeme == "true"),
            TokenKind::Poison => LiteralValue::Poison,
            _ => {
                return Err(
                    LowerError::mismatch("expected a literal", token.extents).into(),
                )
            }
        };
        Ok(Literal {
            value,
            extents: token.extents,
        })
    }

    // ========================================================================
    // Type expressions
    // ========================================================================

    fn lower_type_expression(&self, node: &ParseNode) -> Result<TypeExpression> {
        if let Some(token) = node.as_leaf() {
            if token.is_keyword("let") {
                return Ok(TypeExpression::Inferred {
                    extents: token.extents,
                });
            }
            if token.kind == TokenKind::Identifier {
                return Ok(TypeExpression::Id {
                    name: identifier_name(&token.lexeme),
                    extents: token.extents,
                });
            }
            return Err(self.mismatch("expected a type expression", node));
        }

        match node.construct() {
            Some(Construct::PointerType) => {
                let pointee = match node.children() {
                    // A bare `ptr` points at an inferred pointee.
                    [] => TypeExpression::Inferred {
                        extents: node.extents(),
                    },
                    [child] => self.lower_type_expression(child)?,
                    _ => return Err(self.mismatch("malformed pointer type", node)),
                };
                Ok(TypeExpression::Pointer {
                    pointee: Box::new(pointee),
                    extents: node.extents(),
                })
            }
            Some(Construct::TypeRecord) => {
                let mut items = Vec::with_capacity(node.children().len());
                for child in node.children() {
                    if child.is(Construct::TypeRecordItem) {
                        let [key, ty] = child.children() else {
                            return Err(self.mismatch("malformed type record item", child));
                        };
                        items.push((self.lower_record_key(key)?, self.lower_type_expression(ty)?));
                    } else {
                        items.push((RecordKey::Empty, self.lower_type_expression(child)?));
                    }
                }
                Ok(TypeExpression::Record {
                    items,
                    extents: node.extents(),
                })
            }
            _ => Err(self.mismatch("expected a type expression", node)),
        }
    }

    // ========================================================================
    // Error helpers
    // ========================================================================

    fn mismatch(&self, message: &str, node: &ParseNode) -> crate::errors::CompileError {
        LowerError::mismatch(message, node.extents()).into()
    }

    fn unimplemented(&self, message: &str, node: &ParseNode) -> crate::errors::CompileError {
        LowerError::unimplemented(message, node.extents()).into()
    }
}
