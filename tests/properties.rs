use std::rc::Rc;

use mcscript::{
    address::{CellAddress, StorageAddress},
    compile,
    compiler::resource::{
        ops::{binary, fixed_to_number, floor_div, floor_mod, number_to_fixed},
        Emitter, Resource, Value,
    },
    config::Config,
    data::EngineData,
    ir::{Condition, ConditionTest, IrKind, IrNode},
    parser::operators::BinOp,
    source::ScriptSource,
};
use proptest::{prelude::*, sample::select};

#[derive(Default)]
struct Recorder {
    nodes: Vec<IrNode>,
    temps: usize,
}

impl Emitter for Recorder {
    fn emit(&mut self, node: IrNode) {
        self.nodes.push(node)
    }
    fn temp_cell(&mut self) -> CellAddress {
        self.temps += 1;
        CellAddress::temporary(format!(".t{}", self.temps))
    }
    fn temp_storage(&mut self) -> StorageAddress {
        self.temps += 1;
        StorageAddress::temporary(format!("t{}", self.temps))
    }
    fn register_constant(&mut self, _: i32) {}
}

fn holds(condition: &Condition, value: i32) -> bool {
    let ConditionTest::Range { min, max, .. } = &condition.test else {
        panic!("expected a range test, got {:?}", condition.test)
    };
    let inside = min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m);
    inside != condition.negate
}

fn relations() -> impl Strategy<Value = BinOp> {
    select(vec![
        BinOp::Eq,
        BinOp::NotEq,
        BinOp::Lt,
        BinOp::Lte,
        BinOp::Gt,
        BinOp::Gte,
    ])
}

proptest! {
    #[test]
    fn floor_division_recombines(a in -100_000i32..100_000, b in -1000i32..1000) {
        prop_assume!(b != 0);
        let m = floor_mod(a, b);
        prop_assert_eq!(floor_div(a, b) * b + m, a);
        prop_assert!(m == 0 || (m < 0) == (b < 0));
    }

    #[test]
    fn static_fixed_conversion_round_trips(n in -2_000_000i32..2_000_000) {
        let mut em = Recorder::default();
        let fixed = number_to_fixed(&mut em, Value::Static(n));
        prop_assert_eq!(fixed.clone(), Value::Static(n * 1000));
        prop_assert_eq!(fixed_to_number(&mut em, fixed), Value::Static(n));
        prop_assert!(em.nodes.is_empty());
    }

    #[test]
    fn range_tests_agree_with_folding(
        runtime in -1000i32..1000,
        literal in -1000i32..1000,
        op in relations(),
    ) {
        let mut em = Recorder::default();
        let dynamic = Resource::Number(Value::Dynamic(CellAddress::named("x")));
        binary(&mut em, dynamic, op, Resource::Number(Value::Static(literal))).unwrap();
        let [IrNode { kind: IrKind::StoreCondition { conditions, .. }, .. }] = &em.nodes[..] else {
            panic!("{:?}", em.nodes)
        };

        let folded = binary(
            &mut Recorder::default(),
            Resource::Number(Value::Static(runtime)),
            op,
            Resource::Number(Value::Static(literal)),
        )
        .unwrap();
        prop_assert_eq!(
            folded,
            Resource::Bool(Value::Static(conditions.iter().all(|c| holds(c, runtime))))
        );
    }

    #[test]
    fn static_programs_fold_completely(a in -100_000i32..100_000, b in -100_000i32..100_000) {
        let code = format!("x = {}\ny = {}\nz = x * 3 - y\nprint(z)", a, b);
        let src = Rc::new(ScriptSource::memory("prop", code));
        let out = compile(&src, &Config::default(), &EngineData::default(), |_, _, _| {}).unwrap();
        prop_assert_eq!(
            &out.functions["main"],
            &format!(r#"tellraw @a ["",{{"text":"{}"}}]"#, a * 3 - b)
        );
    }
}
