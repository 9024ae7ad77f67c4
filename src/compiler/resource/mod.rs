pub mod ops;

use std::{fmt::Display, rc::Rc};

use indexmap::IndexMap;

use crate::{
    address::{CellAddress, Slot, StorageAddress},
    ir::{IrKind, IrNode},
};

use super::{builtins::Builtin, FunctionID, StructID};

/// Fixed-point values are stored multiplied by this.
pub const FIXED_SCALE: i32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value<T, A = CellAddress> {
    Static(T),
    Dynamic(A),
}

impl<T, A> Value<T, A> {
    pub fn is_static(&self) -> bool {
        matches!(self, Value::Static(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRef {
    Builtin(Builtin),
    User(FunctionID),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructInstance {
    pub def: StructID,
    pub name: Rc<str>,
    pub fields: IndexMap<Rc<str>, Resource>,
}

/// A compiled value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Number(Value<i32>),
    Fixed(Value<i32>),
    Bool(Value<bool>),
    String(Value<Rc<str>, StorageAddress>),
    Null,
    StructType(StructID, Rc<str>),
    Struct(StructInstance),
    Array(Vec<Resource>),
    Function(FunctionRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Number,
    Fixed,
    Bool,
    String,
    Null,
    Array,
    Function,
    Type,
    Struct(StructID, Rc<str>),
    Any,
}

impl ResourceType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Number" | "Int" => ResourceType::Number,
            "Fixed" => ResourceType::Fixed,
            "Bool" => ResourceType::Bool,
            "String" => ResourceType::String,
            "Null" => ResourceType::Null,
            "Array" => ResourceType::Array,
            "Function" => ResourceType::Function,
            "Type" => ResourceType::Type,
            "Any" => ResourceType::Any,
            _ => return None,
        })
    }

    pub fn accepts(&self, other: &ResourceType) -> bool {
        match (self, other) {
            (ResourceType::Any, _) => true,
            (ResourceType::Struct(a, _), ResourceType::Struct(b, _)) => a == b,
            (a, b) => a == b,
        }
    }

    /// Kinds that live in a single cell or storage path.
    pub fn is_value_kind(&self) -> bool {
        matches!(
            self,
            ResourceType::Number | ResourceType::Fixed | ResourceType::Bool | ResourceType::String
        )
    }

    /// The dynamic resource of this type living at `slot`.
    pub fn at_slot(&self, slot: &Slot) -> Option<Resource> {
        Some(match self {
            ResourceType::Number => Resource::Number(Value::Dynamic(slot.cell.clone())),
            ResourceType::Fixed => Resource::Fixed(Value::Dynamic(slot.cell.clone())),
            ResourceType::Bool => Resource::Bool(Value::Dynamic(slot.cell.clone())),
            ResourceType::String => Resource::String(Value::Dynamic(slot.storage.clone())),
            ResourceType::Null => Resource::Null,
            _ => return None,
        })
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Number => write!(f, "Number"),
            ResourceType::Fixed => write!(f, "Fixed"),
            ResourceType::Bool => write!(f, "Bool"),
            ResourceType::String => write!(f, "String"),
            ResourceType::Null => write!(f, "Null"),
            ResourceType::Array => write!(f, "Array"),
            ResourceType::Function => write!(f, "Function"),
            ResourceType::Type => write!(f, "Type"),
            ResourceType::Struct(_, name) => write!(f, "{}", name),
            ResourceType::Any => write!(f, "Any"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("operator `{op}` cannot be applied to {a} and {b}")]
    InvalidOperands {
        op: &'static str,
        a: ResourceType,
        b: ResourceType,
    },
    #[error("operator `{op}` cannot be applied to {typ}")]
    InvalidUnary { op: &'static str, typ: ResourceType },
    #[error("division by zero")]
    DivisionByZero,
    #[error("a value of type {0} cannot be stored at runtime")]
    NotMaterializable(ResourceType),
}

pub type ResourceResult<T> = Result<T, ResourceError>;

/// What the resource operations need from whoever collects instructions.
pub trait Emitter {
    fn emit(&mut self, node: IrNode);
    fn temp_cell(&mut self) -> CellAddress;
    fn temp_storage(&mut self) -> StorageAddress;
    /// Registers `value` so the cell named by `ir::constant_cell` holds it at
    /// runtime.
    fn register_constant(&mut self, value: i32);
}

fn fixed_text(value: i32) -> String {
    let abs = value.unsigned_abs();
    let sign = if value < 0 { "-" } else { "" };
    format!(
        "{}{}.{:03}",
        sign,
        abs / FIXED_SCALE as u32,
        abs % FIXED_SCALE as u32
    )
}

impl Resource {
    pub fn typ(&self) -> ResourceType {
        match self {
            Resource::Number(_) => ResourceType::Number,
            Resource::Fixed(_) => ResourceType::Fixed,
            Resource::Bool(_) => ResourceType::Bool,
            Resource::String(_) => ResourceType::String,
            Resource::Null => ResourceType::Null,
            Resource::StructType(..) => ResourceType::Type,
            Resource::Struct(s) => ResourceType::Struct(s.def, s.name.clone()),
            Resource::Array(_) => ResourceType::Array,
            Resource::Function(_) => ResourceType::Function,
        }
    }

    /// Aggregates are compile-time collections and count as static even when
    /// their members are not.
    pub fn is_static(&self) -> bool {
        match self {
            Resource::Number(v) | Resource::Fixed(v) => v.is_static(),
            Resource::Bool(v) => v.is_static(),
            Resource::String(v) => v.is_static(),
            _ => true,
        }
    }

    /// Static all the way down.
    pub fn is_fully_static(&self) -> bool {
        match self {
            Resource::Struct(s) => s.fields.values().all(|f| f.is_fully_static()),
            Resource::Array(items) => items.iter().all(|f| f.is_fully_static()),
            r => r.is_static(),
        }
    }

    /// Whether some address in this value is owned by a variable rather than
    /// by the expression that produced it.
    pub fn borrows_address(&self) -> bool {
        match self {
            Resource::Number(Value::Dynamic(c))
            | Resource::Fixed(Value::Dynamic(c))
            | Resource::Bool(Value::Dynamic(c)) => !c.temporary,
            Resource::String(Value::Dynamic(s)) => !s.temporary,
            Resource::Struct(s) => s.fields.values().any(|f| f.borrows_address()),
            Resource::Array(items) => items.iter().any(|f| f.borrows_address()),
            _ => false,
        }
    }

    /// Literal text of a static resource.
    pub fn literal_text(&self) -> Option<String> {
        Some(match self {
            Resource::Number(Value::Static(v)) => v.to_string(),
            Resource::Fixed(Value::Static(v)) => fixed_text(*v),
            Resource::Bool(Value::Static(v)) => v.to_string(),
            Resource::String(Value::Static(v)) => v.to_string(),
            Resource::Null => "null".into(),
            Resource::StructType(_, name) => name.to_string(),
            Resource::Struct(s) => {
                let mut fields = vec![];
                for (name, field) in &s.fields {
                    fields.push(format!("{}: {}", name, field.literal_text()?));
                }
                format!("{}({})", s.name, fields.join(", "))
            }
            Resource::Array(items) => {
                let mut out = vec![];
                for item in items {
                    out.push(item.literal_text()?);
                }
                format!("[{}]", out.join(", "))
            }
            _ => return None,
        })
    }

    /// The same value with its addresses marked as owned by a variable, so
    /// later expressions copy instead of mutating them.
    pub fn pinned(&self) -> Resource {
        self.map_addresses(&|c| c.pinned(), &|s| s.pinned())
    }

    /// The same value with its addresses marked as temporaries, so the next
    /// operation mutates them in place.
    pub fn in_place(&self) -> Resource {
        self.map_addresses(
            &|c| CellAddress::temporary(c.name.clone()),
            &|s| StorageAddress::temporary(s.path.clone()),
        )
    }

    fn map_addresses(
        &self,
        cell: &dyn Fn(&CellAddress) -> CellAddress,
        storage: &dyn Fn(&StorageAddress) -> StorageAddress,
    ) -> Resource {
        match self {
            Resource::Number(Value::Dynamic(c)) => Resource::Number(Value::Dynamic(cell(c))),
            Resource::Fixed(Value::Dynamic(c)) => Resource::Fixed(Value::Dynamic(cell(c))),
            Resource::Bool(Value::Dynamic(c)) => Resource::Bool(Value::Dynamic(cell(c))),
            Resource::String(Value::Dynamic(s)) => Resource::String(Value::Dynamic(storage(s))),
            Resource::Struct(s) => Resource::Struct(StructInstance {
                def: s.def,
                name: s.name.clone(),
                fields: s
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.map_addresses(cell, storage)))
                    .collect(),
            }),
            Resource::Array(items) => Resource::Array(
                items
                    .iter()
                    .map(|v| v.map_addresses(cell, storage))
                    .collect(),
            ),
            r => r.clone(),
        }
    }

    /// Writes this value into `slot` and returns the resource now living
    /// there. Aggregates are stored member by member.
    pub fn materialize(&self, slot: &Slot, em: &mut impl Emitter) -> ResourceResult<Resource> {
        let at_cell = Value::Dynamic(slot.cell.clone());

        Ok(match self {
            Resource::Number(v) => {
                store_score(em, &slot.cell, v);
                Resource::Number(at_cell)
            }
            Resource::Fixed(v) => {
                store_score(em, &slot.cell, v);
                Resource::Fixed(at_cell)
            }
            Resource::Bool(v) => {
                let v = match v {
                    Value::Static(b) => Value::Static(*b as i32),
                    Value::Dynamic(c) => Value::Dynamic(c.clone()),
                };
                store_score(em, &slot.cell, &v);
                Resource::Bool(Value::Dynamic(slot.cell.clone()))
            }
            Resource::String(Value::Static(s)) => {
                em.emit(IrNode::new(IrKind::StoreStorage {
                    target: slot.storage.clone(),
                    value: string_snbt(s),
                }));
                Resource::String(Value::Dynamic(slot.storage.clone()))
            }
            Resource::String(Value::Dynamic(p)) => {
                if p.path != slot.storage.path {
                    em.emit(IrNode::new(IrKind::CopyStorage {
                        target: slot.storage.clone(),
                        source: p.clone(),
                    }));
                }
                Resource::String(Value::Dynamic(slot.storage.clone()))
            }
            Resource::Null => Resource::Null,
            Resource::Struct(s) => {
                let mut fields = IndexMap::new();
                for (name, field) in &s.fields {
                    fields.insert(name.clone(), field.materialize(&slot.member(name), em)?);
                }
                Resource::Struct(StructInstance {
                    def: s.def,
                    name: s.name.clone(),
                    fields,
                })
            }
            Resource::Array(items) => {
                let mut out = vec![];
                for (i, item) in items.iter().enumerate() {
                    out.push(item.materialize(&slot.element(i), em)?);
                }
                Resource::Array(out)
            }
            r @ (Resource::StructType(..) | Resource::Function(_)) => {
                return Err(ResourceError::NotMaterializable(r.typ()))
            }
        })
    }
}

fn store_score(em: &mut impl Emitter, cell: &CellAddress, value: &Value<i32>) {
    match value {
        Value::Static(n) => em.emit(IrNode::new(IrKind::SetScore {
            cell: cell.clone(),
            value: *n,
        })),
        Value::Dynamic(c) if c.name != cell.name => em.emit(IrNode::new(IrKind::CopyScore {
            target: cell.clone(),
            source: c.clone(),
        })),
        Value::Dynamic(_) => {}
    }
}

/// Structured-data literal for a string.
pub fn string_snbt(s: &str) -> String {
    serde_json::Value::String(s.into()).to_string()
}

#[cfg(test)]
pub(crate) mod tests;
