use crate::parser::{
    ASTNodeType, ArrowBody, DeclKind, LiteralValue, MAX_NESTING_DEPTH, MemberProperty,
    ObjectProperty, Parser, PropertyKey, Statement, parse_expression, parse_program,
};

fn binary_op(src: &str) -> String {
    match parse_expression(src).unwrap().node_type {
        ASTNodeType::BinaryOp { op, .. } => op,
        other => panic!("expected binary op, got {other:?}"),
    }
}

#[test]
fn test_precedence_multiplication_binds_tighter() {
    let ast = parse_expression("1 + 2 * 3").unwrap();
    let ASTNodeType::BinaryOp { op, right, .. } = ast.node_type else {
        panic!("expected binary op");
    };
    assert_eq!(op, "+");
    assert!(matches!(right.node_type, ASTNodeType::BinaryOp { ref op, .. } if op == "*"));
}

#[test]
fn test_exponent_is_right_associative() {
    let ast = parse_expression("2 ** 3 ** 2").unwrap();
    let ASTNodeType::BinaryOp { left, right, .. } = ast.node_type else {
        panic!("expected binary op");
    };
    assert!(matches!(
        left.node_type,
        ASTNodeType::Literal(LiteralValue::Number(n)) if n == 2.0
    ));
    assert!(matches!(right.node_type, ASTNodeType::BinaryOp { .. }));
}

#[test]
fn test_logical_operators_lowest() {
    assert_eq!(binary_op("a && b || c"), "||");
    assert_eq!(binary_op("a ?? b + c"), "??");
    assert_eq!(binary_op("a < b === c > d"), "===");
}

#[test]
fn test_member_and_optional_chains() {
    let ast = parse_expression("Table1.data?.[0].name").unwrap();
    let ASTNodeType::Member {
        object,
        property,
        optional,
    } = ast.node_type
    else {
        panic!("expected member");
    };
    assert_eq!(property, MemberProperty::Named("name".into()));
    assert!(!optional);
    let ASTNodeType::Member { optional, .. } = object.node_type else {
        panic!("expected computed member");
    };
    assert!(optional);
}

#[test]
fn test_call_with_spread_and_trailing_comma() {
    let ast = parse_expression("Math.max(...xs, 1,)").unwrap();
    let ASTNodeType::Call { args, optional, .. } = ast.node_type else {
        panic!("expected call");
    };
    assert!(!optional);
    assert_eq!(args.len(), 2);
    assert!(matches!(args[0].node_type, ASTNodeType::Spread(_)));
}

#[test]
fn test_object_literal_forms() {
    let ast = parse_expression("{ a, 'b c': 1, [k]: 2, ...rest, if: 3 }").unwrap();
    let ASTNodeType::Object(props) = ast.node_type else {
        panic!("expected object");
    };
    assert_eq!(props.len(), 5);
    match &props[0] {
        ObjectProperty::KeyValue {
            key: PropertyKey::Named(k),
            value,
        } => {
            assert_eq!(k, "a");
            assert_eq!(value.node_type, ASTNodeType::Identifier("a".into()));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        &props[2],
        ObjectProperty::KeyValue {
            key: PropertyKey::Computed(_),
            ..
        }
    ));
    assert!(matches!(&props[3], ObjectProperty::Spread(_)));
}

#[test]
fn test_arrow_functions() {
    let ast = parse_expression("items.map((x, i) => x * i)").unwrap();
    let ASTNodeType::Call { args, .. } = ast.node_type else {
        panic!("expected call");
    };
    let ASTNodeType::Arrow(func) = &args[0].node_type else {
        panic!("expected arrow");
    };
    assert_eq!(func.params, vec!["x".to_string(), "i".to_string()]);
    assert!(matches!(func.body, ArrowBody::Expression(_)));

    let ast = parse_expression("x => { const y = x + 1; return y; }").unwrap();
    let ASTNodeType::Arrow(func) = &ast.node_type else {
        panic!("expected arrow");
    };
    let ArrowBody::Block(body) = &func.body else {
        panic!("expected block body");
    };
    assert_eq!(body.len(), 2);
    assert!(matches!(body[1], Statement::Return(Some(_))));
}

#[test]
fn test_parenthesized_is_not_arrow() {
    let ast = parse_expression("(a + b) * c").unwrap();
    assert!(matches!(ast.node_type, ASTNodeType::BinaryOp { ref op, .. } if op == "*"));
}

#[test]
fn test_conditional_and_unary() {
    let ast = parse_expression("!ok ? -1 : typeof x").unwrap();
    let ASTNodeType::Conditional {
        test, alternate, ..
    } = ast.node_type
    else {
        panic!("expected conditional");
    };
    assert!(matches!(test.node_type, ASTNodeType::UnaryOp { ref op, .. } if op == "!"));
    assert!(matches!(alternate.node_type, ASTNodeType::UnaryOp { ref op, .. } if op == "typeof"));
}

#[test]
fn test_template_literal_spans_are_absolute() {
    let ast = parse_expression("`n=${count}`").unwrap();
    let ASTNodeType::Template {
        quasis,
        expressions,
    } = ast.node_type
    else {
        panic!("expected template");
    };
    assert_eq!(quasis, vec!["n=".to_string(), String::new()]);
    assert_eq!(expressions.len(), 1);
    assert_eq!(expressions[0].span.start, 5);
    assert_eq!(expressions[0].span.end, 10);
}

#[test]
fn test_trailing_semicolon_accepted() {
    assert!(parse_expression("a + 1;").is_ok());
}

#[test]
fn test_syntax_errors() {
    let err = parse_expression(" a + ").unwrap_err();
    assert_eq!(err.message, "Unexpected end of input");
    let err = parse_expression("a b").unwrap_err();
    assert_eq!(err.message, "Unexpected token 'b'");
    assert_eq!(err.position, Some(2));
    assert!(parse_expression("").is_err());
    assert!(parse_expression("a.b = 1").is_err());
    assert!(parse_expression("(1, 2").is_err());
}

fn nested(open: &str, inner: &str, close: &str, depth: usize) -> String {
    [open.repeat(depth), inner.to_string(), close.repeat(depth)].concat()
}

#[test]
fn test_deep_nesting_is_rejected() {
    let sources = [
        nested("(", "1", ")", 10_000),
        nested("[", "1", "]", 10_000),
        nested("!", "1", "", 10_000),
        nested("f(", "1", ")", 10_000),
        format!("a{}", ".b".repeat(10_000)),
        vec!["1"; 10_000].join(" + "),
        vec!["2"; 10_000].join(" ** "),
        nested("x => ", "x", "", 10_000),
    ];
    for source in &sources {
        let err = parse_expression(source).unwrap_err();
        assert_eq!(err.message, "Expression nested too deeply", "{}", &source[..16]);
    }
    let err = parse_program(nested("{", "", "}", 10_000)).unwrap_err();
    assert_eq!(err.message, "Expression nested too deeply");
    let err = parse_program(nested("if (a) ", "b()", "", 10_000)).unwrap_err();
    assert_eq!(err.message, "Expression nested too deeply");
}

#[test]
fn test_nesting_below_the_limit_parses() {
    let ast = parse_expression(nested("(", "1", ")", MAX_NESTING_DEPTH - 1)).unwrap();
    assert_eq!(ast.node_type, ASTNodeType::Literal(LiteralValue::Number(1.0)));
    assert!(parse_expression(nested("(", "1", ")", MAX_NESTING_DEPTH)).is_err());

    let parse_with = |source: &str, depth: usize| {
        Parser::from_source(source, 0)
            .unwrap()
            .with_max_depth(depth)
            .parse_expression_only()
    };
    assert!(parse_with("((1))", 3).is_ok());
    assert!(parse_with("((1))", 2).is_err());
    // Template holes share the enclosing budget.
    assert!(parse_with("`${((1))}`", 4).is_ok());
    assert!(parse_with("`${((1))}`", 3).is_err());
}

#[test]
fn test_program_statements() {
    let program = parse_program(
        "let total = 0; if (a > 1) { total = a } else total += 1\nApi1.run(total)",
    )
    .unwrap();
    assert_eq!(program.body.len(), 3);
    assert!(matches!(
        program.body[0],
        Statement::Declaration {
            kind: DeclKind::Let,
            ..
        }
    ));
    let Statement::If { alternate, .. } = &program.body[1] else {
        panic!("expected if");
    };
    assert!(alternate.is_some());
    assert!(matches!(program.body[2], Statement::Expression(_)));
}

#[test]
fn test_const_requires_initializer() {
    assert!(parse_program("const x;").is_err());
    assert!(parse_program("let x, y = 2;").is_ok());
}
