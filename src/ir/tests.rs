use crate::{address::CellAddress, config::Config};

use super::{
    builder::IrBuilder,
    optimize::{optimize_function, optimize_global, verify, OptimizeError},
    Condition, FunctionNode, IrKind, IrNode, IrProgram,
};

fn cell(name: &str) -> CellAddress {
    CellAddress::named(name)
}
fn set(name: &str, value: i32) -> IrNode {
    IrNode::new(IrKind::SetScore {
        cell: cell(name),
        value,
    })
}
fn add(name: &str, value: i32) -> IrNode {
    IrNode::new(IrKind::AddScore {
        cell: cell(name),
        value,
    })
}
fn call(name: &str) -> IrNode {
    IrNode::new(IrKind::Call {
        function: name.into(),
    })
}
fn exec_if(cond: &str, children: Vec<IrNode>) -> IrNode {
    IrNode::with_children(
        IrKind::ExecuteIf {
            conditions: vec![Condition::is_true(cell(cond))],
        },
        children,
    )
}
fn func(name: &str, children: Vec<IrNode>) -> FunctionNode {
    let mut f = FunctionNode::new(name);
    f.children = children;
    f
}
fn program(functions: Vec<FunctionNode>) -> IrProgram {
    IrProgram {
        functions,
        next_index: 100,
    }
}

#[test]
fn builder_numbers_nodes_in_preorder() {
    let mut builder = IrBuilder::new();
    builder.push_buffer();
    builder.append(set("a", 1));
    builder.append(exec_if("c", vec![add("a", 1), add("a", 2)]));
    let nodes = builder.pop_buffer();
    builder.finish_function("main", nodes, None);

    let program = builder.into_program();
    let main = program.get("main").unwrap();
    let mut indices = vec![];
    main.visit(&mut |n| indices.push(n.meta.index.unwrap()));
    assert_eq!(main.meta.index, Some(0));
    assert_eq!(indices, [1, 2, 3, 4]);
    assert_eq!(program.next_index, 5);
}

#[test]
fn hidden_buffer_redirects_appends() {
    let mut builder = IrBuilder::new();
    builder.push_buffer();
    builder.push_buffer();
    builder.append(add("inner", 1));

    builder.hide_top();
    builder.append(add("outer", 1));
    builder.show_top();

    let inner = builder.pop_buffer();
    let outer = builder.pop_buffer();
    assert_eq!(inner, [add("inner", 1)]);
    assert_eq!(outer, [add("outer", 1)]);
}

#[test]
fn local_rewrites() {
    let mut f = func(
        "main",
        vec![
            set("x", 1),
            set("x", 2),
            IrNode::new(IrKind::CopyScore {
                target: cell("y"),
                source: cell("y"),
            }),
            exec_if("a", vec![]),
            exec_if("a", vec![exec_if("b", vec![add("x", 1)])]),
        ],
    );
    assert!(optimize_function(&mut f));

    assert_eq!(f.children.len(), 2);
    assert_eq!(f.children[0], set("x", 2));
    let IrKind::ExecuteIf { conditions } = &f.children[1].kind else {
        panic!()
    };
    assert_eq!(conditions.len(), 2);
    assert_eq!(f.children[1].children, [add("x", 1)]);
}

#[test]
fn overwrite_that_reads_the_cell_is_kept() {
    let mut f = func(
        "main",
        vec![
            set("x", 1),
            IrNode::new(IrKind::StoreCondition {
                target: cell("x"),
                conditions: vec![Condition::is_true(cell("x"))],
            }),
            set("y", 1),
            add("y", 1),
        ],
    );
    let before = f.clone();
    assert!(!optimize_function(&mut f));
    assert_eq!(f, before);
}

#[test]
fn deletions_do_not_skip_siblings() {
    // every store but the last is dead, and each deletion exposes another
    let mut f = func(
        "main",
        vec![set("x", 1), set("x", 2), set("x", 3), set("x", 4)],
    );
    optimize_function(&mut f);
    assert_eq!(f.children, [set("x", 4)]);
}

#[test]
fn local_pass_is_confluent() {
    let mut f = func(
        "main",
        vec![
            exec_if("a", vec![exec_if("b", vec![exec_if("c", vec![])])]),
            set("x", 1),
            exec_if("a", vec![set("x", 1), set("x", 5)]),
            set("x", 2),
        ],
    );
    optimize_function(&mut f);
    let once = f.clone();
    assert!(!optimize_function(&mut f));
    assert_eq!(f, once);
}

#[test]
fn global_pass_inlines_and_drops() {
    let mut p = program(vec![
        func("main", vec![call("tiny"), call("once"), call("empty"), add("m", 1)]),
        func("tiny", vec![add("t", 1)]),
        func("once", vec![add("o", 1), add("o", 2)]),
        func("empty", vec![]),
        func("orphan", vec![add("z", 1)]),
    ]);
    optimize_global(&mut p, &Config::default()).unwrap();

    assert_eq!(p.functions.len(), 1);
    let main = p.get("main").unwrap();
    assert_eq!(
        main.children
            .iter()
            .map(|n| n.kind.clone())
            .collect::<Vec<_>>(),
        [
            add("t", 1).kind,
            add("o", 1).kind,
            add("o", 2).kind,
            add("m", 1).kind
        ]
    );
    // the inlined copy got a fresh index
    assert_eq!(main.children[0].meta.index, Some(100));
}

#[test]
fn recursive_functions_and_nested_calls_survive() {
    let mut p = program(vec![
        func("main", vec![exec_if("go", vec![call("while_0")])]),
        func(
            "while_0",
            vec![add("i", 1), exec_if("go", vec![call("while_0")])],
        ),
        func("onTick", vec![add("tick", 1), add("tick", 1)]),
    ]);
    optimize_global(&mut p, &Config::default()).unwrap();
    assert!(p.get("while_0").is_some());
    assert!(p.get("onTick").is_some());
}

#[test]
fn missing_entry_and_dangling_calls_are_fatal() {
    let mut p = program(vec![func("helper", vec![])]);
    assert_eq!(
        optimize_global(&mut p, &Config::default()),
        Err(OptimizeError::MissingEntry)
    );

    let p = program(vec![func("main", vec![call("gone")])]);
    assert_eq!(
        verify(&p),
        Err(OptimizeError::DanglingCall {
            caller: "main".into(),
            callee: "gone".into()
        })
    );
}
