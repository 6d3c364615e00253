//! Recursive descent parser for Opal.
//!
//! The parser does not consume a linear token sequence. Its cursor is a
//! byte offset into the source; the "current" tokens are the candidate
//! set starting at that offset, and each grammar rule selects the
//! classification it needs by predicate. Advancing past a token moves
//! the cursor to the token's extent end, which already covers trailing
//! whitespace.
//!
//! The parser fails fast: the first malformed construct aborts the file.

use crate::errors::{ParseError, Result};
use crate::lexer::{Extents, Token, TokenKind, TokenStream};
use crate::parser::cst::{Construct, ParseNode};

/// The parser for a single tokenised file.
pub struct Parser<'a> {
    stream: &'a TokenStream,
    idx: usize,
}

/// True when an expression form carries its own terminator, so the
/// enclosing body or statement needs no further semicolon: blocks, map
/// expressions (whose body is delimited), and conditionals ending in one.
fn terminated(node: &ParseNode) -> bool {
    match node {
        ParseNode::Branch {
            construct: Construct::Block | Construct::Map,
            ..
        } => true,
        ParseNode::Branch {
            construct: Construct::Conditional,
            children,
            ..
        } => children.last().is_some_and(terminated),
        _ => false,
    }
}

/// Widen a branch's extents to cover surrounding delimiters. Leaves are
/// returned untouched; their extents belong to the token.
fn widen(node: ParseNode, covering: Extents) -> ParseNode {
    match node {
        ParseNode::Branch {
            construct,
            children,
            extents,
        } => ParseNode::Branch {
            construct,
            children,
            extents: extents.merge(covering),
        },
        leaf => leaf,
    }
}

impl<'a> Parser<'a> {
    pub fn new(stream: &'a TokenStream) -> Self {
        // Skipped leading garbage or whitespace has no entry; start at
        // the first tokenised offset.
        let idx = stream.first_at_or_after(0).unwrap_or(0);
        Self { stream, idx }
    }

    /// Parse the whole stream into a `File` tree.
    pub fn parse(mut self) -> Result<ParseNode> {
        let start = self.idx;
        let mut definitions = Vec::new();

        while !self.at_end() {
            definitions.push(self.parse_definition()?);
        }

        Ok(self.close_branch(Construct::File, definitions, start))
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    fn parse_definition(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        let modifiers = self.parse_modifiers();

        if let Some(introducer) = self.find_word("type") {
            return self.parse_type_definition(modifiers, introducer, start);
        }
        self.parse_binding(modifiers, start)
    }

    /// An optional leading modifier, captured as the single child of the
    /// `Modifiers` branch. With no modifier present the branch collapses
    /// to a zero-width interval anchored at the next token's start.
    fn parse_modifiers(&mut self) -> ParseNode {
        match self.find(TokenKind::Modifier) {
            Some(modifier) => {
                let start = modifier.extents.start;
                self.advance_past(&modifier);
                self.close_branch(Construct::Modifiers, vec![ParseNode::Leaf(modifier)], start)
            }
            None => ParseNode::branch(Construct::Modifiers, vec![], Extents::empty_at(self.idx)),
        }
    }

    fn parse_type_definition(
        &mut self,
        modifiers: ParseNode,
        introducer: Token,
        start: usize,
    ) -> Result<ParseNode> {
        self.advance_past(&introducer);
        let name = self.expect(TokenKind::Identifier, "a type name")?;
        self.require(TokenKind::EqualSign, "=")?;
        let definition = self.parse_type_expression()?;
        self.require(TokenKind::Semicolon, ";")?;

        Ok(self.close_branch(
            Construct::TypeDefinition,
            vec![modifiers, ParseNode::Leaf(name), definition],
            start,
        ))
    }

    /// A value or procedure definition. The head is either the `let`
    /// keyword or a single identifier serving as the type annotation;
    /// a parenthesis after the bind pattern makes it a procedure.
    fn parse_binding(&mut self, modifiers: ParseNode, start: usize) -> Result<ParseNode> {
        let head = self
            .find_keyword("let")
            .or_else(|| self.find(TokenKind::Identifier))
            .ok_or_else(|| self.unexpected("a definition"))?;
        self.advance_past(&head);

        let pattern = self.parse_pattern()?;

        if self.peek_is(TokenKind::Parenthesis, "(") {
            let parameter = self.parse_record_pattern()?;
            let body = self.parse_body()?;
            Ok(self.close_branch(
                Construct::ProcedureDefinition,
                vec![modifiers, ParseNode::Leaf(head), pattern, parameter, body],
                start,
            ))
        } else {
            let body = self.parse_body()?;
            Ok(self.close_branch(
                Construct::ValueDefinition,
                vec![modifiers, ParseNode::Leaf(head), pattern, body],
                start,
            ))
        }
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    /// An identifier leaf, a literal leaf, or a record pattern, each
    /// optionally followed by a `:` type tag.
    fn parse_pattern(&mut self) -> Result<ParseNode> {
        let start = self.idx;

        let inner = if self.peek_is(TokenKind::Parenthesis, "(") {
            self.parse_record_pattern()?
        } else if let Some(literal) = self.find_literal() {
            self.advance_past(&literal);
            ParseNode::Leaf(literal)
        } else if let Some(identifier) = self.find(TokenKind::Identifier) {
            self.advance_past(&identifier);
            ParseNode::Leaf(identifier)
        } else {
            return Err(self.unexpected("a pattern"));
        };

        self.parse_optional_type_tag(inner, start)
    }

    fn parse_optional_type_tag(&mut self, inner: ParseNode, start: usize) -> Result<ParseNode> {
        let Some(colon) = self.find(TokenKind::Colon) else {
            return Ok(inner);
        };
        self.advance_past(&colon);
        let tag = self.parse_type_expression()?;
        Ok(self.close_branch(Construct::TypeTag, vec![inner, tag], start))
    }

    /// `( item, item, )` where an item is `key = pattern` or a bare
    /// pattern. Terminating commas are legal.
    fn parse_record_pattern(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        self.require(TokenKind::Parenthesis, "(")?;
        let mut items = Vec::new();

        loop {
            if self.peek_is(TokenKind::Parenthesis, ")") {
                break;
            }
            items.push(self.parse_record_pattern_item()?);
            match self.find(TokenKind::Comma) {
                Some(comma) => self.advance_past(&comma),
                None => break,
            }
        }

        self.require(TokenKind::Parenthesis, ")")?;
        Ok(self.close_branch(Construct::RecordPattern, items, start))
    }

    fn parse_record_pattern_item(&mut self) -> Result<ParseNode> {
        let start = self.idx;

        // An identifier or literal head may be a key. Consume it
        // tentatively; without a following `=` it was the pattern itself.
        if let Some(head) = self.find(TokenKind::Identifier).or_else(|| self.find_literal()) {
            self.advance_past(&head);
            if let Some(eq) = self.find(TokenKind::EqualSign) {
                self.advance_past(&eq);
                let value = self.parse_pattern()?;
                return Ok(self.close_branch(
                    Construct::RecordPatternItem,
                    vec![ParseNode::Leaf(head), value],
                    start,
                ));
            }
            self.idx = start;
        }

        self.parse_pattern()
    }

    // ========================================================================
    // Type expressions
    // ========================================================================

    /// A type head (identifier, type record, or a bare `ptr` standing
    /// for pointer-to-inferred) followed by any number of postfix `ptr`
    /// wrappings, associating leftward.
    fn parse_type_expression(&mut self) -> Result<ParseNode> {
        let start = self.idx;

        let mut expression = if let Some(pointer) = self.find_word("ptr") {
            self.advance_past(&pointer);
            self.close_branch(Construct::PointerType, vec![], start)
        } else if self.peek_is(TokenKind::Parenthesis, "(") {
            self.parse_type_record()?
        } else {
            let name = self.expect(TokenKind::Identifier, "a type expression")?;
            ParseNode::Leaf(name)
        };

        while let Some(pointer) = self.find_word("ptr") {
            self.advance_past(&pointer);
            expression = self.close_branch(Construct::PointerType, vec![expression], start);
        }

        Ok(expression)
    }

    /// `( item, item, )` where an item is `key : type` or a bare type
    /// expression.
    fn parse_type_record(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        self.require(TokenKind::Parenthesis, "(")?;
        let mut items = Vec::new();

        loop {
            if self.peek_is(TokenKind::Parenthesis, ")") {
                break;
            }
            items.push(self.parse_type_record_item()?);
            match self.find(TokenKind::Comma) {
                Some(comma) => self.advance_past(&comma),
                None => break,
            }
        }

        self.require(TokenKind::Parenthesis, ")")?;
        Ok(self.close_branch(Construct::TypeRecord, items, start))
    }

    fn parse_type_record_item(&mut self) -> Result<ParseNode> {
        let start = self.idx;

        if let Some(head) = self.find(TokenKind::Identifier).or_else(|| self.find_literal()) {
            self.advance_past(&head);
            if let Some(colon) = self.find(TokenKind::Colon) {
                self.advance_past(&colon);
                let ty = self.parse_type_expression()?;
                return Ok(self.close_branch(
                    Construct::TypeRecordItem,
                    vec![ParseNode::Leaf(head), ty],
                    start,
                ));
            }
            self.idx = start;
        }

        self.parse_type_expression()
    }

    // ========================================================================
    // Bodies, blocks, statements
    // ========================================================================

    /// `= expression ;` or a brace block. The expression form widens the
    /// expression's extents to cover the delimiters.
    fn parse_body(&mut self) -> Result<ParseNode> {
        if let Some(eq) = self.find(TokenKind::EqualSign) {
            let start = eq.extents.start;
            self.advance_past(&eq);
            let value = self.parse_expression()?;
            self.require_terminator(&value)?;
            return Ok(widen(value, Extents::new(start, self.idx)));
        }
        if self.peek_is(TokenKind::CurlyBracket, "{") {
            return self.parse_block();
        }
        Err(self.missing("`=` or a block body"))
    }

    fn parse_block(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        self.require(TokenKind::CurlyBracket, "{")?;
        let mut statements = Vec::new();

        while !self.peek_is(TokenKind::CurlyBracket, "}") {
            if self.at_end() {
                return Err(self.missing("`}`"));
            }
            statements.push(self.parse_statement()?);
        }

        self.require(TokenKind::CurlyBracket, "}")?;
        Ok(self.close_branch(Construct::Block, statements, start))
    }

    fn parse_statement(&mut self) -> Result<ParseNode> {
        if self.peek_is(TokenKind::CurlyBracket, "{") {
            return self.parse_block();
        }

        if let Some(keyword) = self.find_keyword("return") {
            let start = self.idx;
            self.advance_past(&keyword);
            let value = self.parse_expression()?;
            self.require_terminator(&value)?;
            return Ok(self.close_branch(Construct::ReturnStatement, vec![value], start));
        }

        if let Some(keyword) = self.find_keyword("unreachable") {
            // The statement stays a bare leaf; the terminating semicolon
            // extends the enclosing block's extents only.
            self.advance_past(&keyword);
            self.require(TokenKind::Semicolon, ";")?;
            return Ok(ParseNode::Leaf(keyword));
        }

        if self.binding_follows() {
            let start = self.idx;
            let modifiers = self.parse_modifiers();
            return self.parse_binding(modifiers, start);
        }

        let expression = self.parse_expression()?;
        self.require_terminator(&expression)?;
        Ok(expression)
    }

    /// A statement is a binding when it opens with `let` or with an
    /// identifier immediately followed by another identifier (a type
    /// annotation and a bind name).
    fn binding_follows(&self) -> bool {
        if self.find_keyword("let").is_some() {
            return true;
        }
        let Some(head) = self.find(TokenKind::Identifier) else {
            return false;
        };
        self.stream
            .at(head.extents.end)
            .is_some_and(|set| set.iter().any(|t| t.kind == TokenKind::Identifier))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        let expression = self.parse_expression_head()?;
        self.parse_optional_type_tag(expression, start)
    }

    fn parse_expression_head(&mut self) -> Result<ParseNode> {
        if self.find_keyword("if").is_some() {
            return self.parse_conditional();
        }
        if self.find_keyword("map").is_some() {
            return self.parse_map();
        }
        if self.peek_is(TokenKind::Parenthesis, "(") {
            return self.parse_record_expression();
        }

        if let Some(identifier) = self.find(TokenKind::Identifier) {
            let start = self.idx;
            self.advance_past(&identifier);
            if self.peek_is(TokenKind::Parenthesis, "(") {
                let argument = self.parse_record_expression()?;
                return Ok(self.close_branch(
                    Construct::ProcedureCall,
                    vec![ParseNode::Leaf(identifier), argument],
                    start,
                ));
            }
            self.idx = start;
            return self.parse_qualified_identifier();
        }

        if let Some(literal) = self.find_literal() {
            let start = self.idx;
            self.advance_past(&literal);
            if self.find(TokenKind::Dot).is_none() {
                return Ok(ParseNode::Leaf(literal));
            }
            self.idx = start;
            return self.parse_qualified_identifier();
        }

        Err(self.unexpected("an expression"))
    }

    /// A dot-separated chain of identifier or literal keys, folded into
    /// a left-leaning `QualifiedIdentifier` branch. A chain of one is
    /// just the leaf.
    fn parse_qualified_identifier(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        let head = self
            .find(TokenKind::Identifier)
            .or_else(|| self.find_literal())
            .ok_or_else(|| self.unexpected("an identifier"))?;
        self.advance_past(&head);
        let mut expression = ParseNode::Leaf(head);

        while let Some(dot) = self.find(TokenKind::Dot) {
            self.advance_past(&dot);
            let key = self
                .find(TokenKind::Identifier)
                .or_else(|| self.find_literal())
                .ok_or_else(|| self.unexpected("a member name"))?;
            self.advance_past(&key);
            expression = self.close_branch(
                Construct::QualifiedIdentifier,
                vec![expression, ParseNode::Leaf(key)],
                start,
            );
        }

        Ok(expression)
    }

    /// `( item, item, )` where an item is `key = expression` or a bare
    /// expression.
    fn parse_record_expression(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        self.require(TokenKind::Parenthesis, "(")?;
        let mut items = Vec::new();

        loop {
            if self.peek_is(TokenKind::Parenthesis, ")") {
                break;
            }
            items.push(self.parse_record_expression_item()?);
            match self.find(TokenKind::Comma) {
                Some(comma) => self.advance_past(&comma),
                None => break,
            }
        }

        self.require(TokenKind::Parenthesis, ")")?;
        Ok(self.close_branch(Construct::RecordExpression, items, start))
    }

    fn parse_record_expression_item(&mut self) -> Result<ParseNode> {
        let start = self.idx;

        if let Some(head) = self.find(TokenKind::Identifier).or_else(|| self.find_literal()) {
            self.advance_past(&head);
            if let Some(eq) = self.find(TokenKind::EqualSign) {
                self.advance_past(&eq);
                let value = self.parse_expression()?;
                return Ok(self.close_branch(
                    Construct::RecordExpressionItem,
                    vec![ParseNode::Leaf(head), value],
                    start,
                ));
            }
            self.idx = start;
        }

        self.parse_expression()
    }

    /// `if condition consequent else alternative`. The consequent is a
    /// block or an expression; a block alternative terminates the
    /// conditional, an expression alternative leaves the terminating
    /// semicolon to the enclosing body or statement.
    fn parse_conditional(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        self.expect(TokenKind::Keyword, "`if`")?;

        let condition = self.parse_expression()?;
        let consequent = if self.peek_is(TokenKind::CurlyBracket, "{") {
            self.parse_block()?
        } else {
            self.parse_expression()?
        };

        let else_keyword = self
            .find_keyword("else")
            .ok_or_else(|| self.missing("`else`"))?;
        self.advance_past(&else_keyword);

        let alternative = if self.peek_is(TokenKind::CurlyBracket, "{") {
            self.parse_block()?
        } else {
            self.parse_expression()?
        };

        Ok(self.close_branch(
            Construct::Conditional,
            vec![condition, consequent, alternative],
            start,
        ))
    }

    /// `map binding over collection body`.
    fn parse_map(&mut self) -> Result<ParseNode> {
        let start = self.idx;
        self.expect(TokenKind::Keyword, "`map`")?;

        let binding = self.parse_pattern()?;
        let over = self
            .find_keyword("over")
            .ok_or_else(|| self.missing("`over`"))?;
        self.advance_past(&over);
        let collection = self.parse_expression()?;
        let transformation = self.parse_body()?;

        Ok(self.close_branch(
            Construct::Map,
            vec![binding, collection, transformation],
            start,
        ))
    }

    // ========================================================================
    // Cursor helpers
    // ========================================================================

    fn current(&self) -> Option<&std::collections::HashSet<Token>> {
        self.stream.at(self.idx)
    }

    /// Select a current token by predicate. When several candidates
    /// match (an integer and a decimal reading of the same digits, say),
    /// the longest extent wins.
    fn find_where(&self, predicate: impl Fn(&Token) -> bool) -> Option<Token> {
        self.current()?
            .iter()
            .filter(|t| predicate(t))
            .max_by_key(|t| t.extents.end)
            .cloned()
    }

    fn find(&self, kind: TokenKind) -> Option<Token> {
        self.find_where(|t| t.kind == kind)
    }

    fn find_keyword(&self, word: &str) -> Option<Token> {
        self.find_where(|t| t.kind == TokenKind::Keyword && t.lexeme == word)
    }

    /// A contextual word such as `type` or `ptr`: not in the lexer's
    /// keyword category, so it arrives as an identifier, but hand-built
    /// streams may classify it as a keyword.
    fn find_word(&self, word: &str) -> Option<Token> {
        self.find_where(|t| {
            matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword) && t.lexeme == word
        })
    }

    fn find_literal(&self) -> Option<Token> {
        self.find_where(|t| t.kind.is_literal())
    }

    fn peek_is(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.find_where(|t| t.kind == kind && t.lexeme == lexeme)
            .is_some()
    }

    fn advance_past(&mut self, token: &Token) {
        self.idx = token.extents.end;
    }

    fn at_end(&self) -> bool {
        self.stream.first_at_or_after(self.idx).is_none()
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        match self.find(kind) {
            Some(token) => {
                self.advance_past(&token);
                Ok(token)
            }
            None => Err(self.unexpected(what)),
        }
    }

    fn require(&mut self, kind: TokenKind, lexeme: &str) -> Result<Token> {
        match self.find_where(|t| t.kind == kind && t.lexeme == lexeme) {
            Some(token) => {
                self.advance_past(&token);
                Ok(token)
            }
            None => Err(self.missing(&format!("`{}`", lexeme))),
        }
    }

    /// Consume a terminating semicolon, unless the expression carries
    /// its own terminator.
    fn require_terminator(&mut self, node: &ParseNode) -> Result<()> {
        if let Some(semicolon) = self.find(TokenKind::Semicolon) {
            self.advance_past(&semicolon);
            return Ok(());
        }
        if terminated(node) {
            return Ok(());
        }
        Err(self.missing("`;`"))
    }

    fn close_branch(
        &self,
        construct: Construct,
        children: Vec<ParseNode>,
        start: usize,
    ) -> ParseNode {
        ParseNode::branch(construct, children, Extents::new(start, self.idx))
    }

    /// Extents to hang an error on: the widest current candidate, or a
    /// zero-width interval at the cursor.
    fn here(&self) -> Extents {
        self.current()
            .and_then(|set| set.iter().map(|t| t.extents).max_by_key(|e| e.end))
            .unwrap_or_else(|| Extents::empty_at(self.idx))
    }

    fn unexpected(&self, what: &str) -> crate::errors::CompileError {
        ParseError::unexpected(format!("expected {}", what), self.here()).into()
    }

    fn missing(&self, what: &str) -> crate::errors::CompileError {
        ParseError::missing(format!("expected {}", what), self.here()).into()
    }
}
