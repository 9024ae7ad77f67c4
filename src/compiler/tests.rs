use std::rc::Rc;

use lasso::Rodeo;
use serde_json::json;

use crate::{
    address::CellAddress,
    analyzer::Analyzer,
    backend::position::Position,
    config::Config,
    data::EngineData,
    ir::{constant_cell, ConditionTest, IrKind, IrProgram, ScoreOp},
    parser::parse_source,
    source::ScriptSource,
};

use super::{error::CompilerError, signature::ArgumentError, Compiler};

fn compile(code: &str) -> Result<IrProgram, CompilerError> {
    let src = Rc::new(ScriptSource::memory("test", code));
    let mut interner = Rodeo::default();
    let program = parse_source(&src, &mut interner).unwrap();
    let analysis = Analyzer::new(&src, &interner).analyze(&program);
    assert!(analysis.errors.is_empty(), "{} scope errors", analysis.errors.len());

    let config = Config::default();
    let data = EngineData::default();
    Compiler::new(&src, &mut interner, &config, &data, &analysis.scopes).compile_program(&program)
}

fn kinds(program: &IrProgram, function: &str) -> Vec<IrKind> {
    program
        .get(function)
        .unwrap_or_else(|| panic!("no function `{}`", function))
        .children
        .iter()
        .map(|n| n.kind.clone())
        .collect()
}

fn cell(name: &str) -> CellAddress {
    CellAddress::named(name)
}

#[test]
fn loop_accumulator_gets_a_cell() {
    let program = compile(
        "
        sum = 0
        for (i in range(3)) {
            sum += i
        }
        ",
    )
    .unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [
            IrKind::SetScore {
                cell: cell(".exp0_sum"),
                value: 0
            },
            IrKind::AddScore {
                cell: cell(".exp0_sum"),
                value: 0
            },
            IrKind::AddScore {
                cell: cell(".exp0_sum"),
                value: 1
            },
            IrKind::AddScore {
                cell: cell(".exp0_sum"),
                value: 2
            },
        ]
    );
}

#[test]
fn static_arithmetic_emits_nothing() {
    let program = compile(
        "
        a = 5
        b = a + 3
        c = b * 2 - a
        ",
    )
    .unwrap();
    assert!(kinds(&program, "main").is_empty());
    assert_eq!(
        kinds(&program, "init"),
        [IrKind::Raw("scoreboard objectives add mcscript dummy".into())]
    );
}

#[test]
fn static_results_are_printed_as_text() {
    let program = compile(
        "
        a = 1.5
        b = a * 2
        print(\"b = \", b, \" \", 7 / 2)
        ",
    )
    .unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [IrKind::Tellraw {
            text: json!(["", { "text": "b = 3.000 3" }])
        }]
    );
}

#[test]
fn dynamic_if_stores_the_condition_once() {
    let program = compile(
        "
        fun f(x: Number) {
            if (x > 2) {
                print(\"big\")
            } else {
                print(\"small\")
            }
        }
        ",
    )
    .unwrap();
    let nodes = &program.get("f").unwrap().children;
    assert_eq!(nodes.len(), 3);

    let IrKind::StoreCondition { target, conditions } = &nodes[0].kind else {
        panic!("{:?}", nodes[0].kind)
    };
    assert_eq!(
        conditions[0].test,
        ConditionTest::Range {
            cell: cell(".exp1_x"),
            min: Some(3),
            max: None
        }
    );

    let IrKind::ExecuteIf { conditions: then } = &nodes[1].kind else {
        panic!()
    };
    let IrKind::ExecuteIf { conditions: otherwise } = &nodes[2].kind else {
        panic!()
    };
    assert!(then[0].reads(target) && otherwise[0].reads(target));
    assert!(!then[0].negate);
    assert!(otherwise[0].negate);
    assert!(matches!(nodes[2].children[0].kind, IrKind::Tellraw { .. }));
}

#[test]
fn static_if_compiles_only_the_taken_branch() {
    let program = compile(
        "
        debug = false
        if (debug) {
            print(\"on\")
        } else {
            print(\"off\")
        }
        ",
    )
    .unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [IrKind::Tellraw {
            text: json!(["", { "text": "off" }])
        }]
    );
}

#[test]
fn while_becomes_a_recursive_function() {
    let program = compile(
        "
        i = 0
        while (i < 3) {
            i += 1
        }
        ",
    )
    .unwrap();

    let main = kinds(&program, "main");
    assert_eq!(
        main[0],
        IrKind::SetScore {
            cell: cell(".exp0_i"),
            value: 0
        }
    );
    assert!(matches!(main[1], IrKind::StoreCondition { .. }));
    assert!(matches!(main[2], IrKind::ExecuteIf { .. }));

    let body = &program.get("while_0").unwrap().children;
    assert_eq!(
        body[0].kind,
        IrKind::AddScore {
            cell: cell(".exp0_i"),
            value: 1
        }
    );
    let last = body.last().unwrap();
    assert!(matches!(last.kind, IrKind::ExecuteIf { .. }));
    assert_eq!(
        last.children[0].kind,
        IrKind::Call {
            function: "while_0".into()
        }
    );
}

#[test]
fn never_entered_while_is_empty() {
    let program = compile("while (false) {\n print(\"x\")\n}").unwrap();
    assert!(kinds(&program, "main").is_empty());
    assert!(kinds(&program, "while_0").is_empty());
}

#[test]
fn constants_cannot_be_written() {
    let err = compile("const a = 1\na = 2").unwrap_err();
    assert!(matches!(err, CompilerError::ConstWrite { ref name, .. } if name == "a"));

    let src = "fun f(x: Number) {\n const y = x\n}";
    assert!(matches!(
        compile(src).unwrap_err(),
        CompilerError::NotStatic { .. }
    ));
}

#[test]
fn static_variable_written_under_a_loop_is_rejected() {
    let err = compile(
        "
        x = 1
        inline fun bump() {
            x = 2
        }
        while (true) {
            bump()
        }
        ",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompilerError::StaticWriteInRuntimeScope { ref name, .. } if name == "x"
    ));
}

#[test]
fn inline_functions_fold_static_arguments() {
    let program = compile(
        "
        inline fun double(n: Number) -> Number {
            return n * 2
        }
        x = double(4)
        print(x)
        ",
    )
    .unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [IrKind::Tellraw {
            text: json!(["", { "text": "8" }])
        }]
    );
}

#[test]
fn plain_functions_pass_through_slots() {
    let program = compile(
        "
        fun double(n: Number) -> Number {
            return n * 2
        }
        x = double(4)
        ",
    )
    .unwrap();

    let main = kinds(&program, "main");
    assert_eq!(
        main[0],
        IrKind::SetScore {
            cell: cell(".exp1_n"),
            value: 4
        }
    );
    assert_eq!(
        main[1],
        IrKind::Call {
            function: "double".into()
        }
    );
    assert!(matches!(
        &main[2],
        IrKind::CopyScore { source, .. } if *source == cell(".exp1_return")
    ));

    let body = kinds(&program, "double");
    assert!(matches!(
        &body[1],
        IrKind::ScoreLiteralOperation {
            op: ScoreOp::Mul,
            value: 2,
            ..
        }
    ));
    assert!(matches!(
        &body[2],
        IrKind::CopyScore { target, .. } if *target == cell(".exp1_return")
    ));
    assert!(kinds(&program, "init").contains(&IrKind::SetScore {
        cell: constant_cell(2),
        value: 2
    }));
}

#[test]
fn parameters_render_as_score_components() {
    let program = compile("fun show(x: Number) {\n print(\"x = \", x)\n}").unwrap();
    assert_eq!(
        kinds(&program, "show"),
        [IrKind::Tellraw {
            text: json!([
                "",
                { "text": "x = " },
                { "score": { "name": ".exp1_x", "objective": "mcscript" } }
            ])
        }]
    );
}

#[test]
fn methods_update_their_receiver() {
    let program = compile(
        "
        struct Point {
            x: Number
            y: Number
            fun shift(self, d: Number) {
                self.x += d
            }
        }
        p = Point(1, 2)
        p.shift(3)
        print(p.x, \",\", p.y)
        ",
    )
    .unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [IrKind::Tellraw {
            text: json!(["", { "text": "4,2" }])
        }]
    );
}

#[test]
fn struct_members_are_checked() {
    let err = compile("struct A {\n v: Number\n}\na = A(1)\nb = a.w").unwrap_err();
    assert!(matches!(err, CompilerError::UnknownMember { ref member, .. } if member == "w"));

    let err = compile("struct A {\n v: Number\n}\na = A(true)").unwrap_err();
    assert!(matches!(
        err,
        CompilerError::Argument {
            error: ArgumentError::WrongType { .. },
            ..
        }
    ));
}

#[test]
fn argument_errors_name_the_signature() {
    let err = compile("fun f(a: Number) {\n}\nf(1, 2)").unwrap_err();
    let CompilerError::Argument {
        error, signature, ..
    } = &err
    else {
        panic!("{:?}", err)
    };
    assert_eq!(
        *error,
        ArgumentError::TooManyArguments {
            expected: 1,
            found: 2
        }
    );
    assert_eq!(signature, "fun f(a: Number) -> Null");
    assert!(err.msg().contains("Number, Number"), "{}", err.msg());
}

#[test]
fn misplaced_and_runaway_code() {
    assert!(matches!(
        compile("return 1").unwrap_err(),
        CompilerError::ReturnOutsideFunction { .. }
    ));
    assert!(matches!(
        compile("inline fun f() {\n f()\n}\nf()").unwrap_err(),
        CompilerError::InlineRecursion { .. }
    ));
    assert!(matches!(
        compile("x = 1\nfor (i in x) {\n}").unwrap_err(),
        CompilerError::NotIterable { .. }
    ));
    assert!(matches!(
        compile("a, b = [1, 2, 3]").unwrap_err(),
        CompilerError::DestructureMismatch {
            expected: 2,
            found: 3,
            ..
        }
    ));
}

#[test]
fn plain_recursion_calls_itself() {
    let program = compile("fun f() {\n f()\n}").unwrap();
    assert_eq!(
        kinds(&program, "f"),
        [IrKind::Call {
            function: "f".into()
        }]
    );
}

#[test]
fn user_init_runs_after_setup() {
    let program = compile("fun init() {\n print(\"hi\")\n}").unwrap();
    assert!(program.get("init_1").is_some());
    assert_eq!(
        kinds(&program, "init").last(),
        Some(&IrKind::Call {
            function: "init_1".into()
        })
    );
}

#[test]
fn block_names_are_looked_up() {
    let program = compile("setBlock(blocks.stone, 0, 1, 0)").unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [IrKind::SetBlock {
            position: Position::relative(0, 1, 0),
            block: "minecraft:stone".into()
        }]
    );
    assert!(matches!(
        compile("b = blocks.unobtainium").unwrap_err(),
        CompilerError::UnknownBlock { ref name, .. } if name == "unobtainium"
    ));
}

#[test]
fn range_rejects_a_zero_step() {
    assert!(matches!(
        compile("for (i in range(0, 10, 0)) {\n}").unwrap_err(),
        CompilerError::InvalidArgument { .. }
    ));
    let program = compile("for (i in range(6, 0, -2)) {\n print(i)\n}").unwrap();
    assert_eq!(kinds(&program, "main").len(), 3);
}

#[test]
fn debug_variable_describes_the_binding() {
    let program = compile("a = 1\ns = _debugVariable(\"a\")\nprint(s)").unwrap();
    let main = kinds(&program, "main");
    let [IrKind::Tellraw { text }] = &main[..] else {
        panic!()
    };
    let described = text[1]["text"].as_str().unwrap();
    assert!(
        described.starts_with("static mutable variable a of type Number\ndeclared at 1:1"),
        "{}",
        described
    );
}

#[test]
fn global_storage_never_meets_temporaries() {
    let program = compile(
        r#"
        tmp1 = "keep"
        x = 0
        for (i in range(2)) {
            tmp1 = "loop"
            x += 1
        }
        print(fixed(x))
        print(tmp1)
        "#,
    )
    .unwrap();
    let main = kinds(&program, "main");
    let strings = main
        .iter()
        .filter_map(|k| match k {
            IrKind::StoreStorage { target, .. } => Some(target.path.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>();
    let scaled = main
        .iter()
        .filter_map(|k| match k {
            IrKind::ScoreToStorage { target, .. } => Some(target.path.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(strings, ["0_tmp1", "0_tmp1", "0_tmp1"]);
    assert_eq!(scaled.len(), 1);
    assert!(!strings.contains(&scaled[0]), "{:?}", scaled);
}

#[test]
fn int_of_a_negative_fixed_rounds_down() {
    let program = compile("a = int(0.0 - 1.5)\nprint(a)").unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [IrKind::Tellraw {
            text: json!(["", { "text": "-2" }])
        }]
    );
}

#[test]
fn weather_and_features_test_predicates() {
    let predicate = |name: &str| {
        vec![crate::ir::Condition {
            negate: false,
            test: ConditionTest::Predicate { name: name.into() },
        }]
    };

    let program = compile("if (isRaining()) {\n print(\"wet\")\n}").unwrap();
    let main = kinds(&program, "main");
    assert_eq!(
        main[0],
        IrKind::StoreCondition {
            target: cell(".tmp0"),
            conditions: predicate("weather/raining")
        }
    );
    assert!(matches!(main[1], IrKind::ExecuteIf { .. }), "{:?}", main);

    let program = compile("a = isThundering()\nb = isFeature(\"minecraft:village\")").unwrap();
    assert_eq!(
        kinds(&program, "main"),
        [
            IrKind::StoreCondition {
                target: cell(".tmp0"),
                conditions: predicate("weather/thundering")
            },
            IrKind::StoreCondition {
                target: cell(".tmp1"),
                conditions: predicate("feature/village")
            },
        ]
    );
    assert!(matches!(
        compile("a = isFeature(\"atlantis\")").unwrap_err(),
        CompilerError::UnknownFeature { ref name, .. } if name == "atlantis"
    ));
}
