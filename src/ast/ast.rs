//! Abstract syntax tree definitions for Opal.
//!
//! The AST is the front end's terminal product: a flat sequence of
//! typed definitions per program, handed to the downstream elaborator.
//! Every node carries the extents of the source it came from.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::lexer::Extents;

/// Visibility of a definition.
///
/// `Internal` is visible across files within the program; `Public` is
/// exported on the external ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    Internal,
    Public,
}

/// A top-level definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Value(ValueDefinition),
    Procedure(ProcedureDefinition),
    Type(TypeDefinition),
}

impl Definition {
    /// The name this definition binds: the bare pattern identifier for
    /// values (or nothing, when the bind is a record or literal
    /// pattern), the declared identifier for procedures and types.
    pub fn defined_identifier(&self) -> Option<&str> {
        match self {
            Definition::Value(value) => match &value.pattern {
                Pattern::Id { identifier, .. } => Some(identifier),
                _ => None,
            },
            Definition::Procedure(procedure) => Some(&procedure.identifier),
            Definition::Type(ty) => Some(&ty.identifier),
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Definition::Value(value) => value.visibility,
            Definition::Procedure(procedure) => procedure.visibility,
            Definition::Type(ty) => ty.visibility,
        }
    }

    pub fn extents(&self) -> Extents {
        match self {
            Definition::Value(value) => value.extents,
            Definition::Procedure(procedure) => procedure.extents,
            Definition::Type(ty) => ty.extents,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueDefinition {
    pub visibility: Visibility,
    pub type_annotation: TypeExpression,
    pub pattern: Pattern,
    pub value: Expression,
    pub extents: Extents,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDefinition {
    pub visibility: Visibility,
    pub return_type: TypeExpression,
    pub identifier: String,
    pub parameter: RecordPattern,
    pub body: Block,
    pub extents: Extents,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub visibility: Visibility,
    pub identifier: String,
    pub definition: TypeExpression,
    pub extents: Extents,
}

/// A type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpression {
    /// The sentinel for a `let` head: the elaborator infers the type.
    Inferred { extents: Extents },
    /// A named type.
    Id { name: String, extents: Extents },
    /// A pointer; a bare `ptr` points at an inferred pointee.
    Pointer {
        pointee: Box<TypeExpression>,
        extents: Extents,
    },
    /// An ordered sequence of optionally keyed item types.
    Record {
        items: Vec<(RecordKey, TypeExpression)>,
        extents: Extents,
    },
}

impl TypeExpression {
    pub fn extents(&self) -> Extents {
        match self {
            TypeExpression::Inferred { extents }
            | TypeExpression::Id { extents, .. }
            | TypeExpression::Pointer { extents, .. }
            | TypeExpression::Record { extents, .. } => *extents,
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A bare identifier reference.
    Access { identifier: String, extents: Extents },
    Literal(Literal),
    /// An ordered sequence of optionally keyed item expressions.
    Record {
        items: Vec<(RecordKey, Expression)>,
        extents: Extents,
    },
    /// A procedure applied to a record argument.
    Call {
        procedure: String,
        argument: Box<Expression>,
        extents: Extents,
    },
    Conditional {
        condition: Box<Expression>,
        consequent: Box<Expression>,
        alternative: Box<Expression>,
        extents: Extents,
    },
    /// `map binding over collection body`.
    Map {
        binding: Box<Pattern>,
        collection: Box<Expression>,
        transformation: Block,
        extents: Extents,
    },
    /// A member selection, left-leaning: `a.b.c` is `(a.b).c`.
    Qualified {
        base: Box<Expression>,
        key: RecordKey,
        extents: Extents,
    },
    /// A block in expression position (conditional arms, value bodies).
    Block(Block),
    /// An expression with a `:` type ascription.
    Tagged {
        expression: Box<Expression>,
        tag: TypeExpression,
        extents: Extents,
    },
}

impl Expression {
    pub fn extents(&self) -> Extents {
        match self {
            Expression::Access { extents, .. }
            | Expression::Record { extents, .. }
            | Expression::Call { extents, .. }
            | Expression::Conditional { extents, .. }
            | Expression::Map { extents, .. }
            | Expression::Qualified { extents, .. }
            | Expression::Tagged { extents, .. } => *extents,
            Expression::Literal(literal) => literal.extents,
            Expression::Block(block) => block.extents,
        }
    }
}

/// A literal value with its source extents.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub extents: Extents,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Integer(i64),
    Decimal(f64),
    Character(char),
    String(String),
    Boolean(bool),
    Poison,
}

/// A pattern: matched against a value, it produces bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Id {
        identifier: String,
        type_tag: Option<TypeExpression>,
        extents: Extents,
    },
    Literal {
        literal: Literal,
        type_tag: Option<TypeExpression>,
        extents: Extents,
    },
    Record(RecordPattern),
}

impl Pattern {
    pub fn extents(&self) -> Extents {
        match self {
            Pattern::Id { extents, .. } | Pattern::Literal { extents, .. } => *extents,
            Pattern::Record(record) => record.extents,
        }
    }

    pub fn type_tag(&self) -> Option<&TypeExpression> {
        match self {
            Pattern::Id { type_tag, .. } | Pattern::Literal { type_tag, .. } => type_tag.as_ref(),
            Pattern::Record(record) => record.type_tag.as_ref(),
        }
    }
}

/// An ordered sequence of optionally keyed item patterns. A procedure's
/// parameter is always one of these, possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPattern {
    pub items: Vec<(RecordKey, Pattern)>,
    pub type_tag: Option<TypeExpression>,
    pub extents: Extents,
}

/// The key of a record item.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKey {
    /// Positional item.
    Empty,
    /// Identifier key.
    Access { identifier: String, extents: Extents },
    /// Literal key.
    Literal(Literal),
}

/// A statement inside a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Binding(ValueDefinition),
    Expression(Expression),
    Return { value: Expression, extents: Extents },
    Unreachable { extents: Extents },
}

impl Statement {
    pub fn extents(&self) -> Extents {
        match self {
            Statement::Binding(binding) => binding.extents,
            Statement::Expression(expression) => expression.extents(),
            Statement::Return { extents, .. } | Statement::Unreachable { extents } => *extents,
        }
    }
}

/// An ordered sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub extents: Extents,
}

/// A lexical scope reserved for the downstream elaborator.
///
/// Lowering allocates one per file under a shared root and leaves it
/// empty; name resolution populates it later.
#[derive(Debug, Default)]
pub struct SymbolTable {
    parent: Option<Rc<SymbolTable>>,
    entries: RefCell<HashMap<String, Extents>>,
}

impl SymbolTable {
    pub fn root() -> Rc<SymbolTable> {
        Rc::new(SymbolTable::default())
    }

    pub fn child(parent: &Rc<SymbolTable>) -> Rc<SymbolTable> {
        Rc::new(SymbolTable {
            parent: Some(Rc::clone(parent)),
            entries: RefCell::new(HashMap::new()),
        })
    }

    pub fn define(&self, name: impl Into<String>, extents: Extents) {
        self.entries.borrow_mut().insert(name.into(), extents);
    }

    /// Look a name up here and in enclosing scopes.
    pub fn lookup(&self, name: &str) -> Option<Extents> {
        if let Some(extents) = self.entries.borrow().get(name) {
            return Some(*extents);
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
