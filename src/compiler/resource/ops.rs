use std::rc::Rc;

use crate::{
    address::CellAddress,
    ir::{Condition, ConditionTest, IrKind, IrNode, Relation, ScoreOp},
    parser::operators::{BinOp, UnaryOp},
};

use super::{Emitter, Resource, ResourceError, ResourceResult, Value, FIXED_SCALE};

fn score_op(op: BinOp) -> Option<ScoreOp> {
    Some(match op {
        BinOp::Plus => ScoreOp::Add,
        BinOp::Minus => ScoreOp::Sub,
        BinOp::Mult => ScoreOp::Mul,
        BinOp::Div => ScoreOp::Div,
        BinOp::Mod => ScoreOp::Mod,
        _ => return None,
    })
}

fn relation(op: BinOp) -> Option<Relation> {
    Some(match op {
        BinOp::Eq => Relation::Equal,
        BinOp::NotEq => Relation::NotEqual,
        BinOp::Lt => Relation::Less,
        BinOp::Lte => Relation::LessOrEqual,
        BinOp::Gt => Relation::Greater,
        BinOp::Gte => Relation::GreaterOrEqual,
        _ => return None,
    })
}

/// Division rounding towards negative infinity, like the engine does.
pub fn floor_div(a: i32, b: i32) -> i32 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q.wrapping_sub(1)
    } else {
        q
    }
}

pub fn floor_mod(a: i32, b: i32) -> i32 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r.wrapping_add(b)
    } else {
        r
    }
}

/// A cell the caller may mutate: temporaries are reused, anything else is
/// copied first.
fn owned(em: &mut impl Emitter, cell: CellAddress) -> CellAddress {
    if cell.temporary {
        return cell;
    }
    let target = em.temp_cell();
    em.emit(IrNode::new(IrKind::CopyScore {
        target: target.clone(),
        source: cell,
    }));
    target
}

fn load(em: &mut impl Emitter, value: i32) -> CellAddress {
    let target = em.temp_cell();
    em.emit(IrNode::new(IrKind::SetScore {
        cell: target.clone(),
        value,
    }));
    target
}

fn literal_op(em: &mut impl Emitter, target: &CellAddress, op: ScoreOp, value: i32) {
    let kind = match op {
        ScoreOp::Add => IrKind::AddScore {
            cell: target.clone(),
            value,
        },
        ScoreOp::Sub => IrKind::AddScore {
            cell: target.clone(),
            value: value.wrapping_neg(),
        },
        op => {
            em.register_constant(value);
            IrKind::ScoreLiteralOperation {
                target: target.clone(),
                op,
                value,
            }
        }
    };
    em.emit(IrNode::new(kind));
}

fn cell_op(em: &mut impl Emitter, target: &CellAddress, op: ScoreOp, source: CellAddress) {
    em.emit(IrNode::new(IrKind::ScoreOperation {
        target: target.clone(),
        op,
        source,
    }));
}

fn number_op(
    em: &mut impl Emitter,
    a: Value<i32>,
    op: ScoreOp,
    b: Value<i32>,
) -> ResourceResult<Value<i32>> {
    Ok(match (a, b) {
        (Value::Static(a), Value::Static(b)) => Value::Static(match op {
            ScoreOp::Add => a.wrapping_add(b),
            ScoreOp::Sub => a.wrapping_sub(b),
            ScoreOp::Mul => a.wrapping_mul(b),
            ScoreOp::Div | ScoreOp::Mod if b == 0 => return Err(ResourceError::DivisionByZero),
            ScoreOp::Div => floor_div(a, b),
            ScoreOp::Mod => floor_mod(a, b),
        }),
        (Value::Dynamic(a), Value::Static(b)) => {
            if b == 0 && matches!(op, ScoreOp::Div | ScoreOp::Mod) {
                return Err(ResourceError::DivisionByZero);
            }
            let target = owned(em, a);
            literal_op(em, &target, op, b);
            Value::Dynamic(target)
        }
        (Value::Static(a), Value::Dynamic(b)) => match op {
            ScoreOp::Add | ScoreOp::Mul => {
                return number_op(em, Value::Dynamic(b), op, Value::Static(a))
            }
            _ => {
                let target = load(em, a);
                cell_op(em, &target, op, b);
                Value::Dynamic(target)
            }
        },
        (Value::Dynamic(a), Value::Dynamic(b)) => {
            let target = owned(em, a);
            cell_op(em, &target, op, b);
            Value::Dynamic(target)
        }
    })
}

fn fixed_op(
    em: &mut impl Emitter,
    a: Value<i32>,
    op: ScoreOp,
    b: Value<i32>,
) -> ResourceResult<Value<i32>> {
    let scale = FIXED_SCALE as i64;
    Ok(match (a, b) {
        (Value::Static(a), Value::Static(b)) => Value::Static(match op {
            ScoreOp::Add => a.wrapping_add(b),
            ScoreOp::Sub => a.wrapping_sub(b),
            ScoreOp::Mul => (a as i64 * b as i64 / scale) as i32,
            ScoreOp::Div | ScoreOp::Mod if b == 0 => return Err(ResourceError::DivisionByZero),
            ScoreOp::Div => (a as i64 * scale / b as i64) as i32,
            ScoreOp::Mod => floor_mod(a, b),
        }),
        (Value::Dynamic(a), Value::Static(b)) => {
            if b == 0 && matches!(op, ScoreOp::Div | ScoreOp::Mod) {
                return Err(ResourceError::DivisionByZero);
            }
            let target = owned(em, a);
            match op {
                ScoreOp::Mul => {
                    literal_op(em, &target, ScoreOp::Mul, b);
                    literal_op(em, &target, ScoreOp::Div, FIXED_SCALE);
                }
                ScoreOp::Div => {
                    literal_op(em, &target, ScoreOp::Mul, FIXED_SCALE);
                    literal_op(em, &target, ScoreOp::Div, b);
                }
                op => literal_op(em, &target, op, b),
            }
            Value::Dynamic(target)
        }
        (Value::Static(a), Value::Dynamic(b)) => match op {
            ScoreOp::Add | ScoreOp::Mul => {
                return fixed_op(em, Value::Dynamic(b), op, Value::Static(a))
            }
            _ => {
                let lead = load(em, a);
                fixed_op(em, Value::Dynamic(lead), op, Value::Dynamic(b))?
            }
        },
        (Value::Dynamic(a), Value::Dynamic(b)) => {
            let target = owned(em, a);
            match op {
                ScoreOp::Mul => {
                    cell_op(em, &target, ScoreOp::Mul, b);
                    literal_op(em, &target, ScoreOp::Div, FIXED_SCALE);
                }
                ScoreOp::Div => {
                    literal_op(em, &target, ScoreOp::Mul, FIXED_SCALE);
                    cell_op(em, &target, ScoreOp::Div, b);
                }
                op => cell_op(em, &target, op, b),
            }
            Value::Dynamic(target)
        }
    })
}

pub fn number_to_fixed(em: &mut impl Emitter, value: Value<i32>) -> Value<i32> {
    match value {
        Value::Static(n) => Value::Static(n.wrapping_mul(FIXED_SCALE)),
        Value::Dynamic(c) => {
            let target = owned(em, c);
            literal_op(em, &target, ScoreOp::Mul, FIXED_SCALE);
            Value::Dynamic(target)
        }
    }
}

pub fn fixed_to_number(em: &mut impl Emitter, value: Value<i32>) -> Value<i32> {
    match value {
        Value::Static(n) => Value::Static(floor_div(n, FIXED_SCALE)),
        Value::Dynamic(c) => {
            let target = owned(em, c);
            literal_op(em, &target, ScoreOp::Div, FIXED_SCALE);
            Value::Dynamic(target)
        }
    }
}

fn bool_cell(em: &mut impl Emitter, value: Value<bool>) -> CellAddress {
    match value {
        Value::Static(b) => load(em, b as i32),
        Value::Dynamic(c) => c,
    }
}

fn store_condition(em: &mut impl Emitter, conditions: Vec<Condition>) -> CellAddress {
    let target = em.temp_cell();
    em.emit(IrNode::new(IrKind::StoreCondition {
        target: target.clone(),
        conditions,
    }));
    target
}

fn static_compare(a: i32, relation: Relation, b: i32) -> bool {
    match relation {
        Relation::Equal => a == b,
        Relation::NotEqual => a != b,
        Relation::Less => a < b,
        Relation::LessOrEqual => a <= b,
        Relation::Greater => a > b,
        Relation::GreaterOrEqual => a >= b,
    }
}

/// The range test `cell <relation> value`.
fn range_condition(cell: CellAddress, relation: Relation, value: i32) -> Condition {
    let (min, max, negate) = match relation {
        Relation::Equal => (Some(value), Some(value), false),
        Relation::NotEqual => (Some(value), Some(value), true),
        Relation::Less => (None, Some(value.saturating_sub(1)), false),
        Relation::LessOrEqual => (None, Some(value), false),
        Relation::Greater => (Some(value.saturating_add(1)), None, false),
        Relation::GreaterOrEqual => (Some(value), None, false),
    };
    Condition {
        negate,
        test: ConditionTest::Range { cell, min, max },
    }
}

fn compare_scores(
    em: &mut impl Emitter,
    a: Value<i32>,
    relation: Relation,
    b: Value<i32>,
) -> Value<bool> {
    match (a, b) {
        (Value::Static(a), Value::Static(b)) => Value::Static(static_compare(a, relation, b)),
        (Value::Dynamic(a), Value::Static(b)) => {
            Value::Dynamic(store_condition(em, vec![range_condition(a, relation, b)]))
        }
        (Value::Static(a), Value::Dynamic(b)) => Value::Dynamic(store_condition(
            em,
            vec![range_condition(b, relation.swapped(), a)],
        )),
        (Value::Dynamic(a), Value::Dynamic(b)) => {
            let (negate, relation) = match relation {
                Relation::NotEqual => (true, Relation::Equal),
                r => (false, r),
            };
            Value::Dynamic(store_condition(
                em,
                vec![Condition {
                    negate,
                    test: ConditionTest::Compare { a, relation, b },
                }],
            ))
        }
    }
}

fn compare(
    em: &mut impl Emitter,
    a: Resource,
    op: BinOp,
    relation: Relation,
    b: Resource,
) -> ResourceResult<Resource> {
    let invalid = |a: &Resource, b: &Resource| ResourceError::InvalidOperands {
        op: op.to_str(),
        a: a.typ(),
        b: b.typ(),
    };
    let equality = matches!(relation, Relation::Equal | Relation::NotEqual);

    Ok(Resource::Bool(match (a, b) {
        (Resource::Number(a), Resource::Number(b)) | (Resource::Fixed(a), Resource::Fixed(b)) => {
            compare_scores(em, a, relation, b)
        }
        (Resource::Number(a), Resource::Fixed(b)) => {
            let a = number_to_fixed(em, a);
            compare_scores(em, a, relation, b)
        }
        (Resource::Fixed(a), Resource::Number(b)) => {
            let b = number_to_fixed(em, b);
            compare_scores(em, a, relation, b)
        }
        (Resource::Bool(a), Resource::Bool(b)) if equality => match (a, b) {
            (Value::Static(a), Value::Static(b)) => Value::Static((a == b) == (relation == Relation::Equal)),
            (a, b) => {
                let a = bool_cell(em, a);
                let b = bool_cell(em, b);
                compare_scores(em, Value::Dynamic(a), relation, Value::Dynamic(b))
            }
        },
        (Resource::String(Value::Static(a)), Resource::String(Value::Static(b))) if equality => {
            Value::Static((a == b) == (relation == Relation::Equal))
        }
        (Resource::Null, Resource::Null) if equality => {
            Value::Static(relation == Relation::Equal)
        }
        (a, b) => return Err(invalid(&a, &b)),
    }))
}

fn logic(em: &mut impl Emitter, a: Resource, op: BinOp, b: Resource) -> ResourceResult<Resource> {
    let (Resource::Bool(a), Resource::Bool(b)) = (&a, &b) else {
        return Err(ResourceError::InvalidOperands {
            op: op.to_str(),
            a: a.typ(),
            b: b.typ(),
        });
    };
    let and = op == BinOp::And;

    Ok(Resource::Bool(match (a.clone(), b.clone()) {
        (Value::Static(a), Value::Static(b)) => Value::Static(if and { a && b } else { a || b }),
        (Value::Static(s), other) | (other, Value::Static(s)) => {
            // `true && x` is `x`, `false || x` is `x`
            if s == and {
                other
            } else {
                Value::Static(s)
            }
        }
        (Value::Dynamic(a), Value::Dynamic(b)) => {
            Value::Dynamic(if and {
                store_condition(em, vec![Condition::is_true(a), Condition::is_true(b)])
            } else {
                // a || b == !(!a && !b)
                let neither = store_condition(
                    em,
                    vec![
                        Condition::is_true(a).negated(),
                        Condition::is_true(b).negated(),
                    ],
                );
                store_condition(em, vec![Condition::is_true(neither).negated()])
            })
        }
    }))
}

/// Applies a binary operator, folding it when both sides are static.
pub fn binary(em: &mut impl Emitter, a: Resource, op: BinOp, b: Resource) -> ResourceResult<Resource> {
    if let Some(relation) = relation(op) {
        return compare(em, a, op, relation, b);
    }
    let Some(sop) = score_op(op) else {
        return logic(em, a, op, b);
    };

    Ok(match (a, b) {
        (Resource::Number(a), Resource::Number(b)) => Resource::Number(number_op(em, a, sop, b)?),
        (Resource::Fixed(a), Resource::Fixed(b)) => Resource::Fixed(fixed_op(em, a, sop, b)?),
        (Resource::Number(a), Resource::Fixed(b)) => {
            let a = number_to_fixed(em, a);
            Resource::Fixed(fixed_op(em, a, sop, b)?)
        }
        (Resource::Fixed(a), Resource::Number(b)) => {
            let b = number_to_fixed(em, b);
            Resource::Fixed(fixed_op(em, a, sop, b)?)
        }
        (a @ Resource::String(Value::Static(_)), b) | (a, b @ Resource::String(Value::Static(_)))
            if op == BinOp::Plus =>
        {
            match (a.literal_text(), b.literal_text()) {
                (Some(x), Some(y)) => Resource::String(Value::Static(Rc::from(x + &y))),
                _ => {
                    return Err(ResourceError::InvalidOperands {
                        op: op.to_str(),
                        a: a.typ(),
                        b: b.typ(),
                    })
                }
            }
        }
        (a, b) => {
            return Err(ResourceError::InvalidOperands {
                op: op.to_str(),
                a: a.typ(),
                b: b.typ(),
            })
        }
    })
}

pub fn unary(em: &mut impl Emitter, op: UnaryOp, value: Resource) -> ResourceResult<Resource> {
    Ok(match (op, value) {
        (UnaryOp::Minus, Resource::Number(Value::Static(n))) => {
            Resource::Number(Value::Static(n.wrapping_neg()))
        }
        (UnaryOp::Minus, Resource::Fixed(Value::Static(n))) => {
            Resource::Fixed(Value::Static(n.wrapping_neg()))
        }
        (UnaryOp::Minus, Resource::Number(Value::Dynamic(c))) => {
            let target = owned(em, c);
            literal_op(em, &target, ScoreOp::Mul, -1);
            Resource::Number(Value::Dynamic(target))
        }
        (UnaryOp::Minus, Resource::Fixed(Value::Dynamic(c))) => {
            let target = owned(em, c);
            literal_op(em, &target, ScoreOp::Mul, -1);
            Resource::Fixed(Value::Dynamic(target))
        }
        (UnaryOp::Not, Resource::Bool(Value::Static(b))) => Resource::Bool(Value::Static(!b)),
        (UnaryOp::Not, Resource::Bool(Value::Dynamic(c))) => {
            Resource::Bool(Value::Dynamic(store_condition(
                em,
                vec![Condition::is_true(c).negated()],
            )))
        }
        (op, value) => {
            return Err(ResourceError::InvalidUnary {
                op: match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Minus => "-",
                },
                typ: value.typ(),
            })
        }
    })
}
