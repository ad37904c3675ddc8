//! Parser tests - verify parsing and AST structure
//!
//! These tests verify that the parser correctly converts source code into AST structures.
//! They do NOT execute the code - that's tested in the executor tests.

use crate::executor::types::ast::{BinaryOp, Expr, ForLoopKind, MemberAccess, Stmt, UnaryOp, VarKind};
use crate::parser::{self, parse_program};

/// Parse source and return the single top-level statement
fn single(source: &str) -> Stmt {
    let mut program = parse_program(source).expect("Should parse");
    assert_eq!(program.body.len(), 1, "Expected one statement in {:?}", program.body);
    program.body.remove(0)
}

/// Parse source that consists of one expression statement
fn expr(source: &str) -> Expr {
    match single(source) {
        Stmt::Expr { expr, .. } => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

/* ===================== Basic Parsing Tests ===================== */

#[test]
fn test_parse_empty_source() {
    let program = parse_program("   \n  // nothing here\n").expect("Should parse");
    assert!(program.body.is_empty());
}

#[test]
fn test_parse_number() {
    match expr("42.5") {
        Expr::LitNum { v, .. } => assert_eq!(v, 42.5),
        other => panic!("Expected LitNum, got {:?}", other),
    }
}

#[test]
fn test_parse_negative_number_is_unary() {
    match expr("-3") {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
            ..
        } => assert!(matches!(*operand, Expr::LitNum { v, .. } if v == 3.0)),
        other => panic!("Expected Unary Neg, got {:?}", other),
    }
}

#[test]
fn test_parse_string_escapes() {
    match expr(r#""a\n\"b\"""#) {
        Expr::LitStr { v, .. } => assert_eq!(v, "a\n\"b\""),
        other => panic!("Expected LitStr, got {:?}", other),
    }
    match expr("'single'") {
        Expr::LitStr { v, .. } => assert_eq!(v, "single"),
        other => panic!("Expected LitStr, got {:?}", other),
    }
}

#[test]
fn test_parse_literals() {
    assert!(matches!(expr("true"), Expr::LitBool { v: true, .. }));
    assert!(matches!(expr("null"), Expr::LitNull { .. }));
    match expr("[1, 'two', null,]") {
        Expr::LitList { elements, .. } => assert_eq!(elements.len(), 3),
        other => panic!("Expected LitList, got {:?}", other),
    }
}

#[test]
fn test_parse_object_literal_with_shorthand() {
    match expr("({ a: 1, \"b c\": 2, d })") {
        Expr::LitObj { properties, .. } => {
            let keys: Vec<&str> = properties.iter().map(|(k, _, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["a", "b c", "d"]);
            assert!(matches!(&properties[2].2, Expr::Ident { name, .. } if name == "d"));
        }
        other => panic!("Expected LitObj, got {:?}", other),
    }
}

#[test]
fn test_bare_braces_are_a_block() {
    assert!(matches!(single("{ x }"), Stmt::Block { .. }));
    assert!(matches!(
        single("{ a: 1 }"),
        Stmt::Expr {
            expr: Expr::LitObj { .. },
            ..
        }
    ));
}

/* ===================== Operator Tests ===================== */

#[test]
fn test_operator_precedence() {
    // 1 + 2 * 3 => 1 + (2 * 3)
    match expr("1 + 2 * 3") {
        Expr::BinaryOp {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(
            *right,
            Expr::BinaryOp {
                op: BinaryOp::Mul,
                ..
            }
        )),
        other => panic!("Expected Add at the root, got {:?}", other),
    }
}

#[test]
fn test_left_associativity() {
    // 10 - 4 - 3 => (10 - 4) - 3
    match expr("10 - 4 - 3") {
        Expr::BinaryOp {
            op: BinaryOp::Sub,
            left,
            ..
        } => assert!(matches!(
            *left,
            Expr::BinaryOp {
                op: BinaryOp::Sub,
                ..
            }
        )),
        other => panic!("Expected Sub at the root, got {:?}", other),
    }
}

#[test]
fn test_logical_and_nullish_operators() {
    assert!(matches!(
        expr("a ?? b || c"),
        Expr::BinaryOp {
            op: BinaryOp::Nullish,
            ..
        }
    ));
    assert!(matches!(
        expr("a == b && c != d"),
        Expr::BinaryOp {
            op: BinaryOp::And,
            ..
        }
    ));
    assert!(matches!(
        expr("!done"),
        Expr::Unary {
            op: UnaryOp::Not,
            ..
        }
    ));
}

#[test]
fn test_ternary() {
    assert!(matches!(expr("x > 1 ? 'big' : 'small'"), Expr::Ternary { .. }));
}

#[test]
fn test_member_index_and_call_chain() {
    match expr("a.b?.c[0](1, 2)") {
        Expr::Call { callee, args, .. } => {
            assert_eq!(args.len(), 2);
            match *callee {
                Expr::Index { object, .. } => match *object {
                    Expr::Member {
                        property, optional, ..
                    } => {
                        assert_eq!(property, "c");
                        assert!(optional);
                    }
                    other => panic!("Expected Member, got {:?}", other),
                },
                other => panic!("Expected Index, got {:?}", other),
            }
        }
        other => panic!("Expected Call, got {:?}", other),
    }
}

/* ===================== Suspension Tests ===================== */

#[test]
fn test_parse_await_and_yield() {
    assert!(matches!(expr("await sleep(5)"), Expr::Await { .. }));
    match expr("yield 1 + 2") {
        Expr::Yield { inner: Some(inner), .. } => {
            assert!(matches!(*inner, Expr::BinaryOp { .. }))
        }
        other => panic!("Expected Yield with operand, got {:?}", other),
    }
    assert!(matches!(expr("yield"), Expr::Yield { inner: None, .. }));
}

#[test]
fn test_await_binds_tighter_than_binary() {
    match expr("await a + b") {
        Expr::BinaryOp { left, .. } => assert!(matches!(*left, Expr::Await { .. })),
        other => panic!("Expected BinaryOp, got {:?}", other),
    }
}

/* ===================== Statement Tests ===================== */

#[test]
fn test_parse_declarations() {
    match single("const limit = 10") {
        Stmt::Declare {
            var_kind,
            name,
            init: Some(_),
            ..
        } => {
            assert_eq!(var_kind, VarKind::Const);
            assert_eq!(name, "limit");
        }
        other => panic!("Expected Declare, got {:?}", other),
    }
    assert!(matches!(
        single("let x"),
        Stmt::Declare { init: None, .. }
    ));
}

#[test]
fn test_keyword_prefixed_identifiers() {
    // `letter` is an identifier, not `let ter`
    match single("letter = 1") {
        Stmt::Assign { var, .. } => assert_eq!(var, "letter"),
        other => panic!("Expected Assign, got {:?}", other),
    }
    assert!(matches!(expr("returned"), Expr::Ident { name, .. } if name == "returned"));
}

#[test]
fn test_parse_assign_with_path() {
    match single("user.tags[0] = 'x'") {
        Stmt::Assign { var, path, .. } => {
            assert_eq!(var, "user");
            assert_eq!(path.len(), 2);
            assert!(matches!(&path[0], MemberAccess::Prop { property, .. } if property == "tags"));
            assert!(matches!(&path[1], MemberAccess::Index { .. }));
        }
        other => panic!("Expected Assign, got {:?}", other),
    }
}

#[test]
fn test_compound_assignment_desugars() {
    match single("total += 2") {
        Stmt::Assign { var, value, .. } => {
            assert_eq!(var, "total");
            match value {
                Expr::BinaryOp {
                    op: BinaryOp::Add,
                    left,
                    ..
                } => assert!(matches!(*left, Expr::Ident { name, .. } if name == "total")),
                other => panic!("Expected Add, got {:?}", other),
            }
        }
        other => panic!("Expected Assign, got {:?}", other),
    }
}

#[test]
fn test_equality_is_not_assignment() {
    assert!(matches!(
        single("x == 1"),
        Stmt::Expr {
            expr: Expr::BinaryOp {
                op: BinaryOp::Eq,
                ..
            },
            ..
        }
    ));
}

#[test]
fn test_parse_control_flow() {
    let source = r#"
if (a) { b } else if (c) { d } else { e }
while (i < 3) { i = i + 1; continue }
for (let k in obj) { break }
try { throw 'bad' } catch (err) { err }
return
"#;
    let program = parse_program(source).expect("Should parse");
    assert_eq!(program.body.len(), 5);

    match &program.body[0] {
        Stmt::If {
            else_s: Some(else_s),
            ..
        } => assert!(matches!(**else_s, Stmt::If { .. })),
        other => panic!("Expected If with else-if, got {:?}", other),
    }
    assert!(matches!(program.body[1], Stmt::While { .. }));
    assert!(matches!(
        program.body[2],
        Stmt::ForLoop {
            kind: ForLoopKind::In,
            ..
        }
    ));
    match &program.body[3] {
        Stmt::Try { catch_var, .. } => assert_eq!(catch_var, "err"),
        other => panic!("Expected Try, got {:?}", other),
    }
    assert!(matches!(program.body[4], Stmt::Return { value: None, .. }));
}

#[test]
fn test_semicolons_are_optional() {
    let program = parse_program("a = 1; b = 2;; c").expect("Should parse");
    assert_eq!(program.body.len(), 3);
}

/* ===================== Span & Error Tests ===================== */

#[test]
fn test_spans_track_lines() {
    let program = parse_program("x = 1\n  y").expect("Should parse");
    let span = program.body[1].span();
    assert_eq!(span.start_line, 1);
    assert_eq!(span.start_col, 2);
}

#[test]
fn test_mention_syntax_is_a_parse_error() {
    let err = parse_program("<@1234>.name").expect_err("Should fail");
    assert!(err.span().is_some());
    assert!(!err.message().is_empty());
}

#[test]
fn test_parse_into_block() {
    match parser::parse("1; 2").expect("Should parse") {
        Stmt::Block { body, .. } => assert_eq!(body.len(), 2),
        other => panic!("Expected Block, got {:?}", other),
    }
}

#[test]
fn test_program_serde_round_trip() {
    let program = parse_program("let x = await sleep(1)\nyield x").expect("Should parse");
    let json = serde_json::to_string(&program).expect("serialize");
    let back: parser::Program = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.body.len(), 2);
    assert!(json.contains("\"t\":\"Await\""));
}
