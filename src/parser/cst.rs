//! Concrete parse tree definitions.
//!
//! The parser produces a tree of tagged branches over token leaves. The
//! tree stays close to the surface syntax; the `ast` module flattens it
//! into typed definitions.

use std::fmt;

use crate::lexer::{Extents, Token};

/// Tags identifying the non-leaf parse tree nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    File,
    ValueDefinition,
    ProcedureDefinition,
    TypeDefinition,
    Modifiers,
    Pattern,
    RecordPattern,
    RecordPatternItem,
    TypeTag,
    QualifiedIdentifier,
    ProcedureCall,
    RecordExpression,
    RecordExpressionItem,
    Conditional,
    Map,
    TypeRecord,
    TypeRecordItem,
    PointerType,
    Block,
    ReturnStatement,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Construct::File => "file",
            Construct::ValueDefinition => "value definition",
            Construct::ProcedureDefinition => "procedure definition",
            Construct::TypeDefinition => "type definition",
            Construct::Modifiers => "modifiers",
            Construct::Pattern => "pattern",
            Construct::RecordPattern => "record pattern",
            Construct::RecordPatternItem => "record pattern item",
            Construct::TypeTag => "type tag",
            Construct::QualifiedIdentifier => "qualified identifier",
            Construct::ProcedureCall => "procedure call",
            Construct::RecordExpression => "record expression",
            Construct::RecordExpressionItem => "record expression item",
            Construct::Conditional => "conditional",
            Construct::Map => "map expression",
            Construct::TypeRecord => "type record",
            Construct::TypeRecordItem => "type record item",
            Construct::PointerType => "pointer type",
            Construct::Block => "block",
            Construct::ReturnStatement => "return statement",
        };
        f.write_str(name)
    }
}

/// A node in the concrete parse tree: a single token, or a tagged branch
/// with an ordered sequence of children.
///
/// Branch extents always contain the union of the children's extents;
/// delimiters consumed but not kept (such as a terminating semicolon)
/// widen the branch. Trees are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseNode {
    Leaf(Token),
    Branch {
        construct: Construct,
        children: Vec<ParseNode>,
        extents: Extents,
    },
}

impl ParseNode {
    pub fn branch(construct: Construct, children: Vec<ParseNode>, extents: Extents) -> Self {
        ParseNode::Branch {
            construct,
            children,
            extents,
        }
    }

    pub fn extents(&self) -> Extents {
        match self {
            ParseNode::Leaf(token) => token.extents,
            ParseNode::Branch { extents, .. } => *extents,
        }
    }

    pub fn construct(&self) -> Option<Construct> {
        match self {
            ParseNode::Leaf(_) => None,
            ParseNode::Branch { construct, .. } => Some(*construct),
        }
    }

    pub fn is(&self, construct: Construct) -> bool {
        self.construct() == Some(construct)
    }

    pub fn as_leaf(&self) -> Option<&Token> {
        match self {
            ParseNode::Leaf(token) => Some(token),
            ParseNode::Branch { .. } => None,
        }
    }

    pub fn children(&self) -> &[ParseNode] {
        match self {
            ParseNode::Leaf(_) => &[],
            ParseNode::Branch { children, .. } => children,
        }
    }
}
