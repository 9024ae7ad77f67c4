use lasso::Spur;
use serde_json::json;
use tracing::info;

use crate::{
    backend::position::Position,
    ir::{Condition, ConditionTest, IrKind, IrNode, NumericType},
    parser::ast::{ExprNode, ExprType},
    source::CodeSpan,
};

use super::{
    error::CompilerError,
    resource::{ops, Emitter, Resource, ResourceType, Value, FIXED_SCALE},
    signature::{Arity, Parameter, Signature},
    CompileResult, Compiler,
};

/// Upper bound on the elements `range` may unroll into.
const MAX_RANGE_LEN: usize = 10_000;

/// Namespace of the block id constants.
const BLOCKS: &str = "blocks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Range,
    Fixed,
    Int,
    ArrayOf,
    Len,
    SetBlock,
    Run,
    DebugVariable,
    IsRaining,
    IsThundering,
    IsFeature,
}

impl Builtin {
    pub const ALL: [Builtin; 12] = [
        Builtin::Print,
        Builtin::Range,
        Builtin::Fixed,
        Builtin::Int,
        Builtin::ArrayOf,
        Builtin::Len,
        Builtin::SetBlock,
        Builtin::Run,
        Builtin::DebugVariable,
        Builtin::IsRaining,
        Builtin::IsThundering,
        Builtin::IsFeature,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Range => "range",
            Builtin::Fixed => "fixed",
            Builtin::Int => "int",
            Builtin::ArrayOf => "arrayOf",
            Builtin::Len => "len",
            Builtin::SetBlock => "setBlock",
            Builtin::Run => "run",
            Builtin::DebugVariable => "_debugVariable",
            Builtin::IsRaining => "isRaining",
            Builtin::IsThundering => "isThundering",
            Builtin::IsFeature => "isFeature",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn signature(self) -> Signature {
        let num = |n: i32| Resource::Number(Value::Static(n));
        let (params, ret) = match self {
            Builtin::Print => (
                vec![Parameter::new("values", ResourceType::Any).variadic(Arity::ZeroOrMore)],
                ResourceType::Null,
            ),
            Builtin::Range => (
                vec![
                    Parameter::new("start", ResourceType::Number).static_only(),
                    Parameter::new("stop", ResourceType::Any)
                        .static_only()
                        .with_default(Resource::Null),
                    Parameter::new("step", ResourceType::Number)
                        .static_only()
                        .with_default(num(1)),
                ],
                ResourceType::Array,
            ),
            Builtin::Fixed => (
                vec![Parameter::new("value", ResourceType::Any)],
                ResourceType::Fixed,
            ),
            Builtin::Int => (
                vec![Parameter::new("value", ResourceType::Any)],
                ResourceType::Number,
            ),
            Builtin::ArrayOf => (
                vec![Parameter::new("values", ResourceType::Any).variadic(Arity::ZeroOrMore)],
                ResourceType::Array,
            ),
            Builtin::Len => (
                vec![Parameter::new("value", ResourceType::Any)],
                ResourceType::Number,
            ),
            Builtin::SetBlock => (
                vec![
                    Parameter::new("block", ResourceType::String).static_only(),
                    Parameter::new("x", ResourceType::Number)
                        .static_only()
                        .with_default(num(0)),
                    Parameter::new("y", ResourceType::Number)
                        .static_only()
                        .with_default(num(0)),
                    Parameter::new("z", ResourceType::Number)
                        .static_only()
                        .with_default(num(0)),
                ],
                ResourceType::Null,
            ),
            Builtin::Run => (
                vec![Parameter::new("command", ResourceType::String).static_only()],
                ResourceType::Null,
            ),
            Builtin::DebugVariable => (
                vec![Parameter::new("name", ResourceType::String).static_only()],
                ResourceType::String,
            ),
            Builtin::IsRaining | Builtin::IsThundering => (vec![], ResourceType::Bool),
            Builtin::IsFeature => (
                vec![Parameter::new("feature", ResourceType::String).static_only()],
                ResourceType::Bool,
            ),
        };
        Signature {
            name: self.name().into(),
            params,
            ret,
            method: false,
        }
    }
}

fn static_number(value: &Resource) -> Option<i32> {
    match value {
        Resource::Number(Value::Static(n)) => Some(*n),
        _ => None,
    }
}

fn static_string(value: &Resource) -> Option<&str> {
    match value {
        Resource::String(Value::Static(s)) => Some(s),
        _ => None,
    }
}

/// Appends `component` to a text list, merging neighbouring plain texts.
fn push_component(out: &mut Vec<serde_json::Value>, component: serde_json::Value) {
    if let (Some(last), Some(text)) = (
        out.last_mut().and_then(|l| l.get_mut("text")),
        component.get("text").and_then(|t| t.as_str()),
    ) {
        if let Some(prev) = last.as_str() {
            *last = json!(format!("{}{}", prev, text));
            return;
        }
    }
    out.push(component)
}

impl Compiler<'_> {
    pub(super) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Resource>,
        span: CodeSpan,
    ) -> CompileResult<Resource> {
        let signature = builtin.signature();
        let args = self
            .match_call(&signature, args, span)?
            .into_iter()
            .flat_map(|a| a.flatten())
            .collect::<Vec<_>>();

        match builtin {
            Builtin::Print => {
                let mut components = vec![json!("")];
                for value in &args {
                    self.text_components(value, span, &mut components)?;
                }
                self.emit(IrNode::new(IrKind::Tellraw {
                    text: serde_json::Value::Array(components),
                }));
                Ok(Resource::Null)
            }
            Builtin::Range => self.range(&args, span),
            Builtin::Fixed => match args.into_iter().next() {
                Some(Resource::Number(v)) => Ok(Resource::Fixed(ops::number_to_fixed(self, v))),
                Some(fixed @ Resource::Fixed(_)) => Ok(fixed),
                other => Err(self.wrong_type(ResourceType::Number, other, span)),
            },
            Builtin::Int => match args.into_iter().next() {
                Some(Resource::Fixed(v)) => Ok(Resource::Number(ops::fixed_to_number(self, v))),
                Some(number @ Resource::Number(_)) => Ok(number),
                Some(Resource::Bool(Value::Static(b))) => {
                    Ok(Resource::Number(Value::Static(b as i32)))
                }
                Some(Resource::Bool(Value::Dynamic(cell))) => {
                    Ok(Resource::Number(Value::Dynamic(cell)))
                }
                other => Err(self.wrong_type(ResourceType::Fixed, other, span)),
            },
            Builtin::ArrayOf => Ok(Resource::Array(args)),
            Builtin::Len => match args.first() {
                Some(Resource::Array(items)) => Ok(Resource::Number(Value::Static(
                    i32::try_from(items.len()).unwrap_or(i32::MAX),
                ))),
                Some(Resource::String(Value::Static(s))) => Ok(Resource::Number(Value::Static(
                    i32::try_from(s.chars().count()).unwrap_or(i32::MAX),
                ))),
                Some(Resource::String(_)) => Err(CompilerError::NotStatic {
                    what: "The string passed to `len`",
                    area: self.make_area(span),
                }),
                other => Err(self.wrong_type(ResourceType::Array, other.cloned(), span)),
            },
            Builtin::SetBlock => {
                let block = args.first().and_then(static_string).unwrap_or_default();
                if !self.data.has_block(block) {
                    return Err(CompilerError::UnknownBlock {
                        name: block.into(),
                        area: self.make_area(span),
                    });
                }
                let coord = |i: usize| args.get(i).and_then(static_number).unwrap_or(0);
                let position = Position::relative(coord(1), coord(2), coord(3));
                let block = block.to_string();
                self.emit(IrNode::new(IrKind::SetBlock { position, block }));
                Ok(Resource::Null)
            }
            Builtin::Run => {
                let command = args.first().and_then(static_string).unwrap_or_default();
                let command = command.trim_start_matches('/').to_string();
                self.emit(IrNode::new(IrKind::Raw(command)));
                Ok(Resource::Null)
            }
            Builtin::DebugVariable => {
                let name = args.first().and_then(static_string).unwrap_or_default();
                let text = self.debug_variable(name, span)?;
                Ok(Resource::String(Value::Static(text.into())))
            }
            Builtin::IsRaining => Ok(self.predicate("weather/raining".into())),
            Builtin::IsThundering => Ok(self.predicate("weather/thundering".into())),
            Builtin::IsFeature => {
                let feature = args.first().and_then(static_string).unwrap_or_default();
                let feature = feature.strip_prefix("minecraft:").unwrap_or(feature);
                if !self.data.has_feature(feature) {
                    return Err(CompilerError::UnknownFeature {
                        name: feature.into(),
                        area: self.make_area(span),
                    });
                }
                Ok(self.predicate(format!("feature/{}", feature)))
            }
        }
    }

    /// Stores whether the predicate file `name` holds right now. The files
    /// themselves are written by whoever packages the functions.
    fn predicate(&mut self, name: String) -> Resource {
        let target = self.temp_cell();
        self.emit(IrNode::new(IrKind::StoreCondition {
            target: target.clone(),
            conditions: vec![Condition {
                negate: false,
                test: ConditionTest::Predicate { name },
            }],
        }));
        Resource::Bool(Value::Dynamic(target))
    }

    fn wrong_type(&self, expected: ResourceType, found: Option<Resource>, span: CodeSpan) -> CompilerError {
        CompilerError::TypeMismatch {
            expected,
            found: found.map(|f| f.typ()).unwrap_or(ResourceType::Null),
            area: self.make_area(span),
        }
    }

    fn range(&mut self, args: &[Resource], span: CodeSpan) -> CompileResult<Resource> {
        let invalid = |c: &Self, msg: &str| CompilerError::InvalidArgument {
            msg: msg.into(),
            area: c.make_area(span),
        };
        let first = args.first().and_then(static_number).unwrap_or(0);
        let (start, stop) = match args.get(1) {
            Some(Resource::Null) | None => (0, first),
            Some(value) => match static_number(value) {
                Some(stop) => (first, stop),
                None => return Err(self.wrong_type(ResourceType::Number, Some(value.clone()), span)),
            },
        };
        let step = args.get(2).and_then(static_number).unwrap_or(1);
        if step == 0 {
            return Err(invalid(self, "`range` needs a step other than 0"));
        }

        let mut items = vec![];
        let mut i = start as i64;
        while (step > 0 && i < stop as i64) || (step < 0 && i > stop as i64) {
            if items.len() >= MAX_RANGE_LEN {
                return Err(invalid(
                    self,
                    &format!("`range` cannot unroll into more than {} elements", MAX_RANGE_LEN),
                ));
            }
            items.push(Resource::Number(Value::Static(i as i32)));
            i += step as i64;
        }
        Ok(Resource::Array(items))
    }

    /// Text components that show `value` when printed.
    fn text_components(
        &mut self,
        value: &Resource,
        span: CodeSpan,
        out: &mut Vec<serde_json::Value>,
    ) -> CompileResult<()> {
        let objective = self.config.objective.clone();
        let storage = format!("{}:{}", self.config.namespace, self.config.storage);

        match value {
            Resource::Number(Value::Dynamic(cell)) | Resource::Bool(Value::Dynamic(cell)) => {
                out.push(json!({ "score": { "name": &*cell.name, "objective": objective } }))
            }
            Resource::Fixed(Value::Dynamic(cell)) => {
                let target = self.temp_storage();
                self.emit(IrNode::new(IrKind::ScoreToStorage {
                    target: target.clone(),
                    source: cell.clone(),
                    scale: 1.0 / FIXED_SCALE as f64,
                    typ: NumericType::Double,
                }));
                out.push(json!({ "nbt": &*target.path, "storage": storage }))
            }
            Resource::String(Value::Dynamic(path)) => {
                out.push(json!({ "nbt": &*path.path, "storage": storage }))
            }
            Resource::Struct(instance) if !value.is_fully_static() => {
                push_component(out, json!({ "text": format!("{}(", instance.name) }));
                for (i, (name, field)) in instance.fields.iter().enumerate() {
                    let sep = if i == 0 { "" } else { ", " };
                    push_component(out, json!({ "text": format!("{}{}: ", sep, name) }));
                    self.text_components(field, span, out)?;
                }
                push_component(out, json!({ "text": ")" }));
            }
            Resource::Array(items) if !value.is_fully_static() => {
                push_component(out, json!({ "text": "[" }));
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        push_component(out, json!({ "text": ", " }));
                    }
                    self.text_components(item, span, out)?;
                }
                push_component(out, json!({ "text": "]" }));
            }
            value => match value.literal_text() {
                Some(text) => push_component(out, json!({ "text": text })),
                None => {
                    return Err(CompilerError::InvalidArgument {
                        msg: format!("{} cannot be converted to text", value.typ()),
                        area: self.make_area(span),
                    })
                }
            },
        }
        Ok(())
    }

    /// `blocks.<id>` as a string constant, when `blocks` is not shadowed.
    pub(super) fn block_member(
        &self,
        base: &ExprNode,
        member: Spur,
        span: CodeSpan,
    ) -> CompileResult<Option<Resource>> {
        let ExprType::Var(name) = &base.typ else {
            return Ok(None);
        };
        if self.resolve(name) != BLOCKS || self.contexts.find(*name).is_some() {
            return Ok(None);
        }
        let id = self.resolve(&member);
        if !self.data.has_block(id) {
            return Err(CompilerError::UnknownBlock {
                name: id.into(),
                area: self.make_area(span),
            });
        }
        Ok(Some(Resource::String(Value::Static(
            format!("minecraft:{}", id).into(),
        ))))
    }

    /// Describes what is known about a variable at this point.
    fn debug_variable(&self, name: &str, span: CodeSpan) -> CompileResult<String> {
        let found = self
            .interner
            .get(name)
            .and_then(|key| self.contexts.find(key).map(|(frame, v)| (key, frame, v)));
        let Some((key, frame, var)) = found else {
            return Err(CompilerError::NonexistentVariable {
                name: name.into(),
                area: self.make_area(span),
            });
        };

        let storage = if var.slot.is_some() { "runtime" } else { "static" };
        let mutability = if var.constant { "constant" } else { "mutable" };
        let mut lines = vec![format!(
            "{} {} variable {} of type {}",
            storage,
            mutability,
            name,
            var.resource.typ()
        )];
        let (line, col) = self.src.line_col(var.site.start);
        lines.push(format!("declared at {}:{}", line, col));

        let record = var
            .scope
            .and_then(|s| self.scopes.get(s))
            .and_then(|r| r.variable(key));
        if let Some(record) = record {
            for (what, access) in record
                .reads
                .iter()
                .map(|a| ("read", a))
                .chain(record.writes.iter().map(|a| ("write", a)))
            {
                let (line, col) = self.src.line_col(access.site.start);
                lines.push(format!("{} at {}:{}", what, line, col));
            }
        }
        if self.contexts.runtime_between(frame) {
            lines.push("accessed from a non-static context".into());
        }

        let text = lines.join("\n");
        info!(variable = name, "debug info:\n{}", text);
        Ok(text)
    }
}
