//! Integration tests for parse tree lowering.

use opal::ast::{
    Definition, Expression, LiteralValue, Lowerer, Pattern, RecordKey, Statement, TypeExpression,
    Visibility,
};
use opal::errors::{CompileError, LowerErrorKind};
use opal::lexer::Extents;
use opal::parser::{Construct, ParseNode};
use opal::{Parser, Scanner, Token, TokenKind};

fn parse(source: &str) -> ParseNode {
    let (stream, _) = Scanner::new(source).scan_all();
    Parser::new(&stream).parse().expect("parse should succeed")
}

fn lower(source: &str) -> Vec<Definition> {
    Lowerer::new()
        .lower(&[parse(source)])
        .expect("lowering should succeed")
}

fn only(source: &str) -> Definition {
    let mut definitions = lower(source);
    assert_eq!(definitions.len(), 1);
    definitions.pop().unwrap()
}

fn value_of(definition: &Definition) -> &Expression {
    match definition {
        Definition::Value(value) => &value.value,
        other => panic!("expected a value definition, got {:?}", other),
    }
}

// ============================================================================
// Definitions
// ============================================================================

#[test]
fn test_public_value_definition() {
    let definition = only("public let x = 39;");
    assert_eq!(definition.visibility(), Visibility::Public);
    assert_eq!(definition.defined_identifier(), Some("x"));

    let Definition::Value(value) = &definition else {
        panic!("expected a value definition");
    };
    assert!(matches!(
        value.type_annotation,
        TypeExpression::Inferred { .. }
    ));
    match &value.value {
        Expression::Literal(literal) => {
            assert_eq!(literal.value, LiteralValue::Integer(39));
        }
        other => panic!("expected an integer literal, got {:?}", other),
    }
}

#[test]
fn test_internal_and_private_visibility() {
    assert_eq!(
        only("internal let x = 1;").visibility(),
        Visibility::Internal
    );
    assert_eq!(only("let x = 1;").visibility(), Visibility::Private);
}

#[test]
fn test_annotated_value_definition() {
    let Definition::Value(value) = only("int x = 5;") else {
        panic!("expected a value definition");
    };
    match &value.type_annotation {
        TypeExpression::Id { name, .. } => assert_eq!(name, "int"),
        other => panic!("expected a named annotation, got {:?}", other),
    }
}

#[test]
fn test_record_bind_reports_no_identifier() {
    let definition = only("let (a, b) = c;");
    assert_eq!(definition.defined_identifier(), None);

    let Definition::Value(value) = &definition else {
        panic!("expected a value definition");
    };
    let Pattern::Record(record) = &value.pattern else {
        panic!("expected a record pattern");
    };
    assert_eq!(record.items.len(), 2);
    assert!(record
        .items
        .iter()
        .all(|(key, _)| matches!(key, RecordKey::Empty)));
}

#[test]
fn test_procedure_definition() {
    let Definition::Procedure(procedure) = only("let add(a: int, b: int) { return a; }") else {
        panic!("expected a procedure definition");
    };
    assert_eq!(procedure.identifier, "add");
    assert!(matches!(
        procedure.return_type,
        TypeExpression::Inferred { .. }
    ));
    assert_eq!(procedure.parameter.items.len(), 2);

    let (key, pattern) = &procedure.parameter.items[0];
    assert!(matches!(key, RecordKey::Empty));
    match pattern {
        Pattern::Id {
            identifier,
            type_tag: Some(TypeExpression::Id { name, .. }),
            ..
        } => {
            assert_eq!(identifier, "a");
            assert_eq!(name, "int");
        }
        other => panic!("expected a typed bind, got {:?}", other),
    }

    assert_eq!(procedure.body.statements.len(), 1);
    assert!(matches!(
        procedure.body.statements[0],
        Statement::Return { .. }
    ));
}

#[test]
fn test_bare_expression_body_lifts_to_return_block() {
    let Definition::Procedure(procedure) = only("let f() = 5;") else {
        panic!("expected a procedure definition");
    };

    let [Statement::Return { value, extents }] = procedure.body.statements.as_slice() else {
        panic!("expected a single return statement");
    };
    assert_eq!(procedure.body.extents, *extents);
    assert_eq!(value.extents(), *extents);
}

#[test]
fn test_empty_parameter_record() {
    let Definition::Procedure(procedure) = only("let f() { unreachable; }") else {
        panic!("expected a procedure definition");
    };
    assert!(procedure.parameter.items.is_empty());
    assert!(matches!(
        procedure.body.statements[0],
        Statement::Unreachable { .. }
    ));
}

// ============================================================================
// Type expressions
// ============================================================================

#[test]
fn test_type_definition_with_pointer() {
    let Definition::Type(ty) = only("type p = int ptr;") else {
        panic!("expected a type definition");
    };
    assert_eq!(ty.identifier, "p");
    match &ty.definition {
        TypeExpression::Pointer { pointee, .. } => match pointee.as_ref() {
            TypeExpression::Id { name, .. } => assert_eq!(name, "int"),
            other => panic!("expected a named pointee, got {:?}", other),
        },
        other => panic!("expected a pointer type, got {:?}", other),
    }
}

#[test]
fn test_bare_pointer_points_at_inferred() {
    let Definition::Type(ty) = only("type p = ptr;") else {
        panic!("expected a type definition");
    };
    match &ty.definition {
        TypeExpression::Pointer { pointee, .. } => {
            assert!(matches!(pointee.as_ref(), TypeExpression::Inferred { .. }));
        }
        other => panic!("expected a pointer type, got {:?}", other),
    }
}

#[test]
fn test_type_record_keys() {
    let Definition::Type(ty) = only("type t = (x: int, float);") else {
        panic!("expected a type definition");
    };
    let TypeExpression::Record { items, .. } = &ty.definition else {
        panic!("expected a record type");
    };
    assert_eq!(items.len(), 2);
    match &items[0].0 {
        RecordKey::Access { identifier, .. } => assert_eq!(identifier, "x"),
        other => panic!("expected an identifier key, got {:?}", other),
    }
    assert!(matches!(items[1].0, RecordKey::Empty));
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_literal_lowering() {
    let cases: &[(&str, LiteralValue)] = &[
        ("let x = 39;", LiteralValue::Integer(39)),
        ("let x = -7;", LiteralValue::Integer(-7)),
        ("let x = -2.5;", LiteralValue::Decimal(-2.5)),
        ("let x = 'q';", LiteralValue::Character('q')),
        ("let x = '\\n';", LiteralValue::Character('\n')),
        (
            "let x = \"a\\tb\";",
            LiteralValue::String("a\tb".to_string()),
        ),
        ("let x = true;", LiteralValue::Boolean(true)),
        ("let x = false;", LiteralValue::Boolean(false)),
        ("let x = poison;", LiteralValue::Poison),
    ];

    for (source, expected) in cases {
        let definition = only(source);
        match value_of(&definition) {
            Expression::Literal(literal) => assert_eq!(&literal.value, expected, "{}", source),
            other => panic!("{}: expected a literal, got {:?}", source, other),
        }
    }
}

#[test]
fn test_unknown_escape_decodes_to_the_escaped_character() {
    let definition = only(r#"let s = "a\zb";"#);
    match value_of(&definition) {
        Expression::Literal(literal) => {
            assert_eq!(literal.value, LiteralValue::String("azb".to_string()));
        }
        other => panic!("expected a string literal, got {:?}", other),
    }
}

#[test]
fn test_backticked_identifier_name_is_unquoted() {
    let definition = only("let `public` = 5;");
    assert_eq!(definition.defined_identifier(), Some("public"));
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_record_expression_keys() {
    let definition = only("let r = (a = 1, 2);");
    let Expression::Record { items, .. } = value_of(&definition) else {
        panic!("expected a record expression");
    };
    assert_eq!(items.len(), 2);
    match &items[0] {
        (RecordKey::Access { identifier, .. }, Expression::Literal(literal)) => {
            assert_eq!(identifier, "a");
            assert_eq!(literal.value, LiteralValue::Integer(1));
        }
        other => panic!("expected a keyed item, got {:?}", other),
    }
    assert!(matches!(items[1].0, RecordKey::Empty));
}

#[test]
fn test_procedure_call_lowering() {
    let definition = only("let y = f(x);");
    let Expression::Call {
        procedure,
        argument,
        ..
    } = value_of(&definition)
    else {
        panic!("expected a call");
    };
    assert_eq!(procedure, "f");
    let Expression::Record { items, .. } = argument.as_ref() else {
        panic!("expected a record argument");
    };
    assert_eq!(items.len(), 1);
    assert!(matches!(
        &items[0].1,
        Expression::Access { identifier, .. } if identifier == "x"
    ));
}

#[test]
fn test_qualified_identifier_lowering() {
    let definition = only(r#"let q = a.b."k";"#);
    let Expression::Qualified { base, key, .. } = value_of(&definition) else {
        panic!("expected a qualified identifier");
    };
    match key {
        RecordKey::Literal(literal) => {
            assert_eq!(literal.value, LiteralValue::String("k".to_string()));
        }
        other => panic!("expected a literal key, got {:?}", other),
    }
    let Expression::Qualified { base, key, .. } = base.as_ref() else {
        panic!("expected a nested qualified identifier");
    };
    assert!(matches!(base.as_ref(), Expression::Access { identifier, .. } if identifier == "a"));
    assert!(matches!(key, RecordKey::Access { identifier, .. } if identifier == "b"));
}

#[test]
fn test_conditional_lowering() {
    let definition = only("let c = if a { return 1; } else b;");
    let Expression::Conditional {
        condition,
        consequent,
        alternative,
        ..
    } = value_of(&definition)
    else {
        panic!("expected a conditional");
    };
    assert!(matches!(condition.as_ref(), Expression::Access { .. }));
    assert!(matches!(consequent.as_ref(), Expression::Block(_)));
    assert!(matches!(alternative.as_ref(), Expression::Access { .. }));
}

#[test]
fn test_map_lowering_lifts_expression_bodies() {
    let definition = only("let m = map x over xs = f(x);");
    let Expression::Map {
        binding,
        collection,
        transformation,
        ..
    } = value_of(&definition)
    else {
        panic!("expected a map expression");
    };
    assert!(matches!(binding.as_ref(), Pattern::Id { identifier, .. } if identifier == "x"));
    assert!(
        matches!(collection.as_ref(), Expression::Access { identifier, .. } if identifier == "xs")
    );
    assert_eq!(transformation.statements.len(), 1);
    assert!(matches!(
        transformation.statements[0],
        Statement::Return { .. }
    ));
}

#[test]
fn test_value_definition_with_block_body() {
    let definition = only("let v { return 5; }");
    assert!(matches!(value_of(&definition), Expression::Block(_)));
}

#[test]
fn test_expression_type_tag_lowering() {
    let definition = only("let x = 5: int;");
    let Expression::Tagged { expression, tag, .. } = value_of(&definition) else {
        panic!("expected a tagged expression");
    };
    assert!(matches!(expression.as_ref(), Expression::Literal(_)));
    assert!(matches!(tag, TypeExpression::Id { name, .. } if name == "int"));
}

// ============================================================================
// Blocks and statements
// ============================================================================

#[test]
fn test_binding_statement_lowering() {
    let Definition::Procedure(procedure) = only("let f() { let y = 5; return y; }") else {
        panic!("expected a procedure definition");
    };
    assert_eq!(procedure.body.statements.len(), 2);
    match &procedure.body.statements[0] {
        Statement::Binding(binding) => {
            assert!(matches!(&binding.pattern, Pattern::Id { identifier, .. } if identifier == "y"));
        }
        other => panic!("expected a binding statement, got {:?}", other),
    }
}

#[test]
fn test_nested_block_statement_lowering() {
    let Definition::Procedure(procedure) = only("let f() { { return 1; } }") else {
        panic!("expected a procedure definition");
    };
    assert!(matches!(
        &procedure.body.statements[0],
        Statement::Expression(Expression::Block(_))
    ));
}

// ============================================================================
// Aggregation and failure semantics
// ============================================================================

#[test]
fn test_structural_duplicates_are_dropped() {
    let definitions = lower("let x = 5;\nlet x = 5;");
    assert_eq!(definitions.len(), 1);

    let definitions = lower("let x = 5;\nlet x = 6;");
    assert_eq!(definitions.len(), 2);
}

#[test]
fn test_lowering_is_deterministic() {
    let file = parse("let x = 5;\npublic let f(a: int) { return a; }\ntype t = int ptr;");
    let first = Lowerer::new().lower(&[file.clone()]).unwrap();
    let second = Lowerer::new().lower(&[file]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_each_file_gets_a_scope() {
    let files = [parse("let x = 5;"), parse("let y = 6;")];
    let mut lowerer = Lowerer::new();
    let definitions = lowerer.lower(&files).unwrap();
    assert_eq!(definitions.len(), 2);
    assert_eq!(lowerer.file_scopes().len(), 2);
    assert!(lowerer.file_scopes().iter().all(|scope| scope.is_empty()));
}

#[test]
fn test_empty_file_contributes_nothing() {
    assert!(lower("").is_empty());
}

#[test]
fn test_malformed_tree_is_a_structural_mismatch() {
    // A file whose child is a bare token is not a definition.
    let stray = ParseNode::Leaf(Token::new(
        TokenKind::Integer,
        "5",
        Extents::new(0, 1),
    ));
    let file = ParseNode::branch(Construct::File, vec![stray], Extents::new(0, 1));

    match Lowerer::new().lower(&[file]) {
        Err(CompileError::Lower(error)) => {
            assert_eq!(error.kind, LowerErrorKind::StructuralMismatch);
        }
        other => panic!("expected a structural mismatch, got {:?}", other),
    }
}

#[test]
fn test_extents_survive_to_the_ast() {
    let source = "let x = 5;";
    let definition = only(source);
    assert_eq!(definition.extents(), Extents::new(0, source.len()));

    let Definition::Value(value) = definition else {
        panic!("expected a value definition");
    };
    assert_eq!(value.pattern.extents(), Extents::new(4, 6));
    assert_eq!(value.value.extents(), Extents::new(8, 9));
}
