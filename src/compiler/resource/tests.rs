use std::rc::Rc;

use crate::{
    address::{CellAddress, Slot, StorageAddress},
    ir::{ConditionTest, IrKind, IrNode, ScoreOp},
    parser::operators::{BinOp, UnaryOp},
};

use super::{
    ops::{binary, fixed_to_number, floor_div, floor_mod, number_to_fixed, unary},
    Emitter, Resource, ResourceError, ResourceType, Value,
};

/// Collects emitted nodes instead of building functions.
#[derive(Default)]
pub(crate) struct MockEmitter {
    pub nodes: Vec<IrNode>,
    pub constants: Vec<i32>,
    temps: usize,
}

impl Emitter for MockEmitter {
    fn emit(&mut self, node: IrNode) {
        self.nodes.push(node)
    }
    fn temp_cell(&mut self) -> CellAddress {
        self.temps += 1;
        CellAddress::temporary(format!(".tmp{}", self.temps - 1))
    }
    fn temp_storage(&mut self) -> StorageAddress {
        self.temps += 1;
        StorageAddress::temporary(format!("tmp{}", self.temps - 1))
    }
    fn register_constant(&mut self, value: i32) {
        if !self.constants.contains(&value) {
            self.constants.push(value)
        }
    }
}

impl MockEmitter {
    fn kinds(&self) -> Vec<IrKind> {
        self.nodes.iter().map(|n| n.kind.clone()).collect()
    }
}

fn num(n: i32) -> Resource {
    Resource::Number(Value::Static(n))
}
fn fixed(n: i32) -> Resource {
    Resource::Fixed(Value::Static(n))
}
fn dyn_num(name: &str) -> Resource {
    Resource::Number(Value::Dynamic(CellAddress::named(name)))
}

#[test]
fn static_operands_never_emit() {
    let mut em = MockEmitter::default();
    assert_eq!(binary(&mut em, num(5), BinOp::Plus, num(3)), Ok(num(8)));
    assert_eq!(binary(&mut em, num(7), BinOp::Lt, num(3)), Ok(Resource::Bool(Value::Static(false))));
    assert_eq!(
        binary(&mut em, fixed(1500), BinOp::Mult, fixed(2000)),
        Ok(fixed(3000))
    );
    assert_eq!(binary(&mut em, num(2), BinOp::Plus, fixed(500)), Ok(fixed(2500)));
    assert_eq!(
        binary(
            &mut em,
            Resource::String(Value::Static("ab".into())),
            BinOp::Plus,
            num(1)
        ),
        Ok(Resource::String(Value::Static("ab1".into())))
    );
    assert_eq!(
        unary(&mut em, UnaryOp::Not, Resource::Bool(Value::Static(true))),
        Ok(Resource::Bool(Value::Static(false)))
    );
    assert!(em.nodes.is_empty());
}

#[test]
fn number_division_rounds_down() {
    assert_eq!(floor_div(7, 2), 3);
    assert_eq!(floor_div(-7, 2), -4);
    assert_eq!(floor_div(7, -2), -4);
    assert_eq!(floor_mod(-7, 3), 2);
    assert_eq!(floor_mod(7, -3), -2);

    let mut em = MockEmitter::default();
    assert_eq!(binary(&mut em, num(-7), BinOp::Div, num(2)), Ok(num(-4)));
    assert_eq!(
        binary(&mut em, num(1), BinOp::Mod, num(0)),
        Err(ResourceError::DivisionByZero)
    );
    assert_eq!(
        binary(&mut em, dyn_num("x"), BinOp::Div, num(0)),
        Err(ResourceError::DivisionByZero)
    );
}

#[test]
fn dynamic_lead_is_copied_before_mutation() {
    let mut em = MockEmitter::default();
    let out = binary(&mut em, dyn_num("x"), BinOp::Plus, num(3)).unwrap();
    let tmp = CellAddress::temporary(".tmp0");
    assert_eq!(out, Resource::Number(Value::Dynamic(tmp.clone())));
    assert_eq!(
        em.kinds(),
        [
            IrKind::CopyScore {
                target: tmp.clone(),
                source: CellAddress::named("x")
            },
            IrKind::AddScore {
                cell: tmp.clone(),
                value: 3
            },
        ]
    );

    // a temporary is reused
    let out = binary(&mut em, out, BinOp::Mult, num(4)).unwrap();
    assert_eq!(out, Resource::Number(Value::Dynamic(tmp.clone())));
    assert_eq!(
        em.nodes[2].kind,
        IrKind::ScoreLiteralOperation {
            target: tmp,
            op: ScoreOp::Mul,
            value: 4
        }
    );
    assert_eq!(em.constants, [4]);
}

#[test]
fn static_lead_with_dynamic_rhs() {
    let mut em = MockEmitter::default();
    // commutative: no load needed
    binary(&mut em, num(2), BinOp::Plus, dyn_num("x")).unwrap();
    assert!(matches!(em.nodes[1].kind, IrKind::AddScore { value: 2, .. }));

    let mut em = MockEmitter::default();
    binary(&mut em, num(10), BinOp::Minus, dyn_num("x")).unwrap();
    let tmp = CellAddress::temporary(".tmp0");
    assert_eq!(
        em.kinds(),
        [
            IrKind::SetScore {
                cell: tmp.clone(),
                value: 10
            },
            IrKind::ScoreOperation {
                target: tmp,
                op: ScoreOp::Sub,
                source: CellAddress::named("x")
            },
        ]
    );
}

#[test]
fn dynamic_fixed_multiplication_rescales() {
    let mut em = MockEmitter::default();
    let a = Resource::Fixed(Value::Dynamic(CellAddress::named("a")));
    let b = Resource::Fixed(Value::Dynamic(CellAddress::named("b")));
    binary(&mut em, a, BinOp::Mult, b).unwrap();
    assert!(matches!(
        em.nodes[2].kind,
        IrKind::ScoreLiteralOperation {
            op: ScoreOp::Div,
            value: 1000,
            ..
        }
    ));
    assert_eq!(em.constants, [1000]);
}

#[test]
fn comparisons_become_conditions() {
    let mut em = MockEmitter::default();
    let out = binary(&mut em, dyn_num("x"), BinOp::Lt, num(5)).unwrap();
    assert_eq!(out.typ(), ResourceType::Bool);
    let IrKind::StoreCondition { conditions, .. } = &em.nodes[0].kind else {
        panic!("{:?}", em.nodes)
    };
    assert_eq!(
        conditions[0].test,
        ConditionTest::Range {
            cell: CellAddress::named("x"),
            min: None,
            max: Some(4)
        }
    );

    // `5 < x` is `x > 5`
    let mut em = MockEmitter::default();
    binary(&mut em, num(5), BinOp::Lt, dyn_num("x")).unwrap();
    let IrKind::StoreCondition { conditions, .. } = &em.nodes[0].kind else {
        panic!("{:?}", em.nodes)
    };
    assert_eq!(
        conditions[0].test,
        ConditionTest::Range {
            cell: CellAddress::named("x"),
            min: Some(6),
            max: None
        }
    );
}

#[test]
fn logic_short_circuits_on_static_sides() {
    let mut em = MockEmitter::default();
    let b = Resource::Bool(Value::Dynamic(CellAddress::named("b")));
    assert_eq!(
        binary(&mut em, Resource::Bool(Value::Static(true)), BinOp::And, b.clone()),
        Ok(b.clone())
    );
    assert_eq!(
        binary(&mut em, b.clone(), BinOp::Or, Resource::Bool(Value::Static(true))),
        Ok(Resource::Bool(Value::Static(true)))
    );
    assert!(em.nodes.is_empty());

    let c = Resource::Bool(Value::Dynamic(CellAddress::named("c")));
    binary(&mut em, b, BinOp::Or, c).unwrap();
    assert_eq!(em.nodes.len(), 2);
}

#[test]
fn invalid_operands_are_rejected() {
    let mut em = MockEmitter::default();
    assert_eq!(
        binary(&mut em, Resource::Null, BinOp::Plus, num(1)),
        Err(ResourceError::InvalidOperands {
            op: "+",
            a: ResourceType::Null,
            b: ResourceType::Number
        })
    );
    assert!(unary(&mut em, UnaryOp::Minus, Resource::Null).is_err());
}

#[test]
fn conversions_between_number_and_fixed() {
    let mut em = MockEmitter::default();
    assert_eq!(number_to_fixed(&mut em, Value::Static(3)), Value::Static(3000));
    assert_eq!(fixed_to_number(&mut em, Value::Static(2500)), Value::Static(2));
    // rounds down like the scoreboard division it folds
    assert_eq!(fixed_to_number(&mut em, Value::Static(-2500)), Value::Static(-3));
    assert_eq!(fixed_to_number(&mut em, Value::Static(-1500)), Value::Static(-2));
    assert_eq!(fixed_to_number(&mut em, Value::Static(-2000)), Value::Static(-2));
    assert!(em.nodes.is_empty());
    assert_eq!(
        Resource::Fixed(Value::Static(-1500)).literal_text().as_deref(),
        Some("-1.500")
    );
}

#[test]
fn materialize_stores_member_wise() {
    let mut em = MockEmitter::default();
    let slot = Slot::new(".exp1_v", "1_v");
    let value = Resource::Array(vec![
        num(1),
        Resource::String(Value::Static(Rc::from("hi"))),
        Resource::Bool(Value::Static(true)),
    ]);
    let stored = value.materialize(&slot, &mut em).unwrap();
    assert_eq!(
        em.kinds(),
        [
            IrKind::SetScore {
                cell: CellAddress::named(".exp1_v.e0"),
                value: 1
            },
            IrKind::StoreStorage {
                target: StorageAddress::named("1_v.e1"),
                value: "\"hi\"".into()
            },
            IrKind::SetScore {
                cell: CellAddress::named(".exp1_v.e2"),
                value: 1
            },
        ]
    );
    assert!(!stored.is_fully_static());

    let mut em = MockEmitter::default();
    let flag = Resource::Bool(Value::Dynamic(CellAddress::temporary(".tmp0")));
    assert_eq!(
        flag.materialize(&slot, &mut em),
        Ok(Resource::Bool(Value::Dynamic(CellAddress::named(".exp1_v"))))
    );
    assert_eq!(
        em.kinds(),
        [IrKind::CopyScore {
            target: CellAddress::named(".exp1_v"),
            source: CellAddress::named(".tmp0")
        }]
    );

    // storing a cell into itself is a no-op
    let mut em = MockEmitter::default();
    stored.materialize(&slot, &mut em).unwrap();
    assert!(em.nodes.is_empty());
}
