pub mod position;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    config::Config,
    ir::{constant_cell, Condition, ConditionTest, IrKind, IrNode, IrProgram, NumericType, Relation},
};

/// Renders a relation for a score comparison. `!=` has no command form, the
/// caller negates the condition and compares with `=` instead.
pub fn relation_to_str(relation: Relation) -> (&'static str, bool) {
    match relation {
        Relation::Equal => ("=", false),
        Relation::NotEqual => ("=", true),
        Relation::Less => ("<", false),
        Relation::LessOrEqual => ("<=", false),
        Relation::Greater => (">", false),
        Relation::GreaterOrEqual => (">=", false),
    }
}

fn range_to_str(min: Option<i32>, max: Option<i32>) -> String {
    match (min, max) {
        (Some(a), Some(b)) if a == b => a.to_string(),
        (Some(a), Some(b)) => format!("{}..{}", a, b),
        (Some(a), None) => format!("{}..", a),
        (None, Some(b)) => format!("..{}", b),
        (None, None) => format!("{}..", i32::MIN),
    }
}

/// Lowers IR to command text. Holds only the names the commands refer to.
pub struct Backend<'a> {
    config: &'a Config,
}

impl<'a> Backend<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn storage(&self) -> String {
        format!("{}:{}", self.config.namespace, self.config.storage)
    }

    pub fn condition(&self, condition: &Condition) -> String {
        let obj = &self.config.objective;
        let (test, invert) = match &condition.test {
            ConditionTest::Range { cell, min, max } => (
                format!("score {} {} matches {}", cell, obj, range_to_str(*min, *max)),
                false,
            ),
            ConditionTest::Compare { a, relation, b } => {
                let (rel, invert) = relation_to_str(*relation);
                (format!("score {} {} {} {} {}", a, obj, rel, b, obj), invert)
            }
            ConditionTest::Predicate { name } => (
                format!("predicate {}:{}", self.config.namespace, name),
                false,
            ),
        };
        let keyword = if condition.negate != invert {
            "unless"
        } else {
            "if"
        };
        format!("{} {}", keyword, test)
    }

    fn conditions(&self, conditions: &[Condition]) -> String {
        conditions.iter().map(|c| self.condition(c)).join(" ")
    }

    /// One node becomes one command per leaf instruction.
    pub fn lower_node(&self, node: &IrNode, out: &mut Vec<String>) {
        let obj = &self.config.objective;
        let command = match &node.kind {
            IrKind::SetScore { cell, value } => {
                format!("scoreboard players set {} {} {}", cell, obj, value)
            }
            IrKind::AddScore { cell, value } if *value < 0 => format!(
                "scoreboard players remove {} {} {}",
                cell,
                obj,
                value.unsigned_abs()
            ),
            IrKind::AddScore { cell, value } => {
                format!("scoreboard players add {} {} {}", cell, obj, value)
            }
            IrKind::CopyScore { target, source } => format!(
                "scoreboard players operation {} {} = {} {}",
                target, obj, source, obj
            ),
            IrKind::ScoreOperation { target, op, source } => format!(
                "scoreboard players operation {} {} {} {} {}",
                target,
                obj,
                op.to_str(),
                source,
                obj
            ),
            IrKind::ScoreLiteralOperation { target, op, value } => format!(
                "scoreboard players operation {} {} {} {} {}",
                target,
                obj,
                op.to_str(),
                constant_cell(*value),
                obj
            ),
            IrKind::StoreCondition { target, conditions } => format!(
                "execute store success score {} {} {}",
                target,
                obj,
                self.conditions(conditions)
            ),
            IrKind::ExecuteIf { conditions } => {
                let prefix = self.conditions(conditions);
                let mut inner = vec![];
                for child in &node.children {
                    self.lower_node(child, &mut inner);
                }
                out.extend(
                    inner
                        .into_iter()
                        .map(|c| format!("execute {} run {}", prefix, c)),
                );
                return;
            }
            IrKind::Call { function } => {
                format!("function {}:{}", self.config.namespace, function)
            }
            IrKind::StoreStorage { target, value } => format!(
                "data modify storage {} {} set value {}",
                self.storage(),
                target,
                value
            ),
            IrKind::CopyStorage { target, source } => format!(
                "data modify storage {} {} set from storage {} {}",
                self.storage(),
                target,
                self.storage(),
                source
            ),
            IrKind::ScoreToStorage {
                target,
                source,
                scale,
                typ,
            } => format!(
                "execute store result storage {} {} {} {} run scoreboard players get {} {}",
                self.storage(),
                target,
                match typ {
                    NumericType::Int => "int",
                    NumericType::Double => "double",
                },
                scale,
                source,
                obj
            ),
            IrKind::StorageToScore {
                target,
                source,
                scale,
            } => format!(
                "execute store result score {} {} run data get storage {} {} {}",
                target,
                obj,
                self.storage(),
                source,
                scale
            ),
            IrKind::Tellraw { text } => format!("tellraw @a {}", text),
            IrKind::SetBlock { position, block } if block.contains(':') => {
                format!("setblock {} {}", position, block)
            }
            IrKind::SetBlock { position, block } => {
                format!("setblock {} minecraft:{}", position, block)
            }
            IrKind::Raw(command) => command.clone(),
        };
        out.push(command);
    }

    pub fn lower(&self, program: &IrProgram) -> IndexMap<String, String> {
        program
            .functions
            .iter()
            .map(|func| {
                let mut lines = vec![];
                for node in &func.children {
                    self.lower_node(node, &mut lines);
                }
                (func.name.clone(), lines.join("\n"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        address::{CellAddress, StorageAddress},
        backend::position::Position,
        ir::{FunctionNode, ScoreOp},
    };

    use super::*;

    fn lower_one(kind: IrKind) -> Vec<String> {
        let config = Config::default();
        let mut out = vec![];
        Backend::new(&config).lower_node(&IrNode::new(kind), &mut out);
        out
    }

    #[test]
    fn score_commands() {
        let x = CellAddress::named(".exp0_x");
        assert_eq!(
            lower_one(IrKind::AddScore {
                cell: x.clone(),
                value: -3
            }),
            ["scoreboard players remove .exp0_x mcscript 3"]
        );
        assert_eq!(
            lower_one(IrKind::ScoreLiteralOperation {
                target: x.clone(),
                op: ScoreOp::Mul,
                value: -1
            }),
            ["scoreboard players operation .exp0_x mcscript *= .const_m1 mcscript"]
        );
        assert_eq!(
            lower_one(IrKind::ScoreToStorage {
                target: StorageAddress::named("tmp0"),
                source: x,
                scale: 0.001,
                typ: NumericType::Double,
            }),
            ["execute store result storage mcscript:main tmp0 double 0.001 run scoreboard players get .exp0_x mcscript"]
        );
    }

    #[test]
    fn not_equal_becomes_unless() {
        let config = Config::default();
        let backend = Backend::new(&config);
        let cond = Condition {
            negate: false,
            test: ConditionTest::Compare {
                a: CellAddress::named("a"),
                relation: Relation::NotEqual,
                b: CellAddress::named("b"),
            },
        };
        assert_eq!(
            backend.condition(&cond),
            "unless score a mcscript = b mcscript"
        );
        assert_eq!(
            backend.condition(&cond.negated()),
            "if score a mcscript = b mcscript"
        );
        let range = Condition {
            negate: true,
            test: ConditionTest::Range {
                cell: CellAddress::named("c"),
                min: Some(3),
                max: Some(3),
            },
        };
        assert_eq!(backend.condition(&range), "unless score c mcscript matches 3");
        let rain = Condition {
            negate: false,
            test: ConditionTest::Predicate {
                name: "weather/raining".into(),
            },
        };
        assert_eq!(backend.condition(&rain), "if predicate mcscript:weather/raining");
    }

    #[test]
    fn execute_prefixes_every_child() {
        let config = Config::default();
        let mut main = FunctionNode::new("main");
        main.children = vec![
            IrNode::with_children(
                IrKind::ExecuteIf {
                    conditions: vec![Condition::is_true(CellAddress::named(".tmp0"))],
                },
                vec![
                    IrNode::new(IrKind::Call {
                        function: "while_0".into(),
                    }),
                    IrNode::new(IrKind::SetBlock {
                        position: Position::relative(1, 0, -1),
                        block: "stone".into(),
                    }),
                ],
            ),
            IrNode::new(IrKind::Raw("say hi".into())),
        ];
        let program = IrProgram {
            functions: vec![main],
            next_index: 0,
        };
        let out = Backend::new(&config).lower(&program);
        assert_eq!(
            out["main"],
            "execute if score .tmp0 mcscript matches 1.. run function mcscript:while_0\n\
             execute if score .tmp0 mcscript matches 1.. run setblock ~1 ~0 ~-1 minecraft:stone\n\
             say hi"
        );
    }
}
