use std::rc::Rc;

use lasso::Rodeo;

use crate::source::ScriptSource;

use super::{
    ast::{AssignTarget, ExprType, Program, StmtType},
    error::ParserError,
    operators::BinOp,
    parse_source,
};

fn parse(code: &str) -> (Result<Program, ParserError>, Rodeo) {
    let src = Rc::new(ScriptSource::memory("test", code));
    let mut interner = Rodeo::default();
    let out = parse_source(&src, &mut interner);
    (out, interner)
}

#[test]
fn multiplication_binds_tighter() {
    let (program, _) = parse("x = 1 + 2 * 3 - 4");
    let program = program.unwrap();
    let StmtType::Assign(_, value) = &program.stmts[0].typ else {
        panic!("expected assignment")
    };
    // (1 + (2 * 3)) - 4
    let ExprType::Op(lhs, BinOp::Minus, rhs) = &value.typ else {
        panic!("expected subtraction, got {:?}", value.typ)
    };
    assert_eq!(rhs.typ, ExprType::Int(4));
    let ExprType::Op(one, BinOp::Plus, prod) = &lhs.typ else {
        panic!("expected addition")
    };
    assert_eq!(one.typ, ExprType::Int(1));
    assert!(matches!(prod.typ, ExprType::Op(_, BinOp::Mult, _)));
}

#[test]
fn comparisons_below_logic() {
    let (program, _) = parse("a < 3 && !b");
    let program = program.unwrap();
    let StmtType::Expr(e) = &program.stmts[0].typ else {
        panic!()
    };
    let ExprType::Op(lhs, BinOp::And, rhs) = &e.typ else {
        panic!()
    };
    assert!(matches!(lhs.typ, ExprType::Op(_, BinOp::Lt, _)));
    assert!(matches!(rhs.typ, ExprType::Unary(..)));
}

#[test]
fn assignment_targets() {
    let (program, interner) = parse("p.pos.x += 2; arr[1] = 3; a, b = pair");
    let program = program.unwrap();
    assert_eq!(program.stmts.len(), 3);

    let StmtType::AssignOp(AssignTarget::Path { var, path }, BinOp::Plus, _) =
        &program.stmts[0].typ
    else {
        panic!("{:?}", program.stmts[0].typ)
    };
    assert_eq!(interner.resolve(var), "p");
    assert_eq!(
        path.iter().map(|s| interner.resolve(s)).collect::<Vec<_>>(),
        ["pos", "x"]
    );

    assert!(matches!(
        program.stmts[1].typ,
        StmtType::Assign(AssignTarget::Index { .. }, _)
    ));

    let StmtType::MultiAssign(names, _) = &program.stmts[2].typ else {
        panic!()
    };
    assert_eq!(names.len(), 2);
}

#[test]
fn functions_and_structs() {
    let code = "
        struct Point {
            x: Number;
            y: Number
            fun len(self, scale: Number = 1) -> Number { return self.x * scale }
        }
        inline fun add(a: Number, *rest) {}
    ";
    let (program, _) = parse(code);
    // variadic markers are not part of user syntax
    assert!(program.is_err());

    let code = "
        struct Point {
            x: Number;
            y: Number
            fun len(self, scale: Number = 1) -> Number { return self.x * scale }
        }
        inline fun add(a: Number, b: Number) { return a + b }
    ";
    let (program, _) = parse(code);
    let program = program.unwrap();

    let StmtType::Struct(decl) = &program.stmts[0].typ else {
        panic!()
    };
    assert_eq!(decl.fields.len(), 2);
    assert_eq!(decl.methods.len(), 1);
    let method = &decl.methods[0];
    assert!(method.receiver.is_some());
    assert_eq!(method.params.len(), 1);
    assert!(method.params[0].default.is_some());
    assert!(method.ret.is_some());

    let StmtType::Function(f) = &program.stmts[1].typ else {
        panic!()
    };
    assert!(f.inline);
    assert_eq!(f.params.len(), 2);
}

#[test]
fn else_if_chains_nest() {
    let (program, _) = parse("if (a) { } else if (b) { x = 1 } else { x = 2 }");
    let program = program.unwrap();
    let StmtType::If {
        otherwise: Some(otherwise),
        ..
    } = &program.stmts[0].typ
    else {
        panic!()
    };
    assert_eq!(otherwise.stmts.len(), 1);
    assert!(matches!(
        otherwise.stmts[0].typ,
        StmtType::If {
            otherwise: Some(_),
            ..
        }
    ));
}

#[test]
fn errors_point_at_the_token() {
    let (program, _) = parse("x = (1 + 2");
    let err = program.unwrap_err();
    assert!(matches!(err, ParserError::UnexpectedToken { .. }));

    let (program, _) = parse("1 + 2 = 3");
    assert!(matches!(
        program.unwrap_err(),
        ParserError::InvalidAssignTarget { .. }
    ));

    let (program, _) = parse("x = 99999999999");
    assert!(matches!(
        program.unwrap_err(),
        ParserError::InvalidLiteral { .. }
    ));
}
