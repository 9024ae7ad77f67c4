pub mod builder;
pub mod optimize;

use crate::{
    address::{CellAddress, StorageAddress},
    backend::position::Position,
    source::CodeSpan,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ScoreOp {
    pub fn to_str(self) -> &'static str {
        match self {
            ScoreOp::Add => "+=",
            ScoreOp::Sub => "-=",
            ScoreOp::Mul => "*=",
            ScoreOp::Div => "/=",
            ScoreOp::Mod => "%=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Relation {
    /// The relation that holds when the operands are swapped.
    pub fn swapped(self) -> Self {
        match self {
            Relation::Less => Relation::Greater,
            Relation::LessOrEqual => Relation::GreaterOrEqual,
            Relation::Greater => Relation::Less,
            Relation::GreaterOrEqual => Relation::LessOrEqual,
            r => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionTest {
    /// `min..max`, either bound may be open.
    Range {
        cell: CellAddress,
        min: Option<i32>,
        max: Option<i32>,
    },
    Compare {
        a: CellAddress,
        relation: Relation,
        b: CellAddress,
    },
    /// A predicate file of the namespace, e.g. `weather/raining`.
    Predicate { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub negate: bool,
    pub test: ConditionTest,
}

impl Condition {
    pub fn is_true(cell: CellAddress) -> Self {
        Self {
            negate: false,
            test: ConditionTest::Range {
                cell,
                min: Some(1),
                max: None,
            },
        }
    }
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
    pub fn reads(&self, cell: &CellAddress) -> bool {
        match &self.test {
            ConditionTest::Range { cell: c, .. } => c == cell,
            ConditionTest::Compare { a, b, .. } => a == cell || b == cell,
            ConditionTest::Predicate { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    Int,
    Double,
}

/// One instruction. Only `ExecuteIf` carries children.
#[derive(Debug, Clone, PartialEq)]
pub enum IrKind {
    SetScore {
        cell: CellAddress,
        value: i32,
    },
    AddScore {
        cell: CellAddress,
        value: i32,
    },
    CopyScore {
        target: CellAddress,
        source: CellAddress,
    },
    ScoreOperation {
        target: CellAddress,
        op: ScoreOp,
        source: CellAddress,
    },
    /// Operation against the constant cell holding `value`.
    ScoreLiteralOperation {
        target: CellAddress,
        op: ScoreOp,
        value: i32,
    },
    StoreCondition {
        target: CellAddress,
        conditions: Vec<Condition>,
    },
    ExecuteIf {
        conditions: Vec<Condition>,
    },
    Call {
        function: String,
    },
    StoreStorage {
        target: StorageAddress,
        /// Already rendered as structured-data text.
        value: String,
    },
    CopyStorage {
        target: StorageAddress,
        source: StorageAddress,
    },
    ScoreToStorage {
        target: StorageAddress,
        source: CellAddress,
        scale: f64,
        typ: NumericType,
    },
    StorageToScore {
        target: CellAddress,
        source: StorageAddress,
        scale: f64,
    },
    Tellraw {
        text: serde_json::Value,
    },
    SetBlock {
        position: Position,
        block: String,
    },
    Raw(String),
}

impl IrKind {
    /// The cell this instruction replaces entirely, if any.
    pub fn overwritten_cell(&self) -> Option<&CellAddress> {
        match self {
            IrKind::SetScore { cell, .. } => Some(cell),
            IrKind::CopyScore { target, .. }
            | IrKind::StoreCondition { target, .. }
            | IrKind::StorageToScore { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Whether executing this instruction may observe `cell`.
    pub fn reads_cell(&self, cell: &CellAddress) -> bool {
        match self {
            IrKind::SetScore { .. } | IrKind::StoreStorage { .. } | IrKind::CopyStorage { .. } => {
                false
            }
            IrKind::AddScore { cell: c, .. } | IrKind::ScoreLiteralOperation { target: c, .. } => {
                c == cell
            }
            IrKind::CopyScore { source, .. } => source == cell,
            IrKind::ScoreOperation { target, source, .. } => target == cell || source == cell,
            IrKind::StoreCondition { conditions, .. } | IrKind::ExecuteIf { conditions } => {
                conditions.iter().any(|c| c.reads(cell))
            }
            IrKind::ScoreToStorage { source, .. } => source == cell,
            IrKind::StorageToScore { .. } | IrKind::SetBlock { .. } => false,
            // anything else may run arbitrary code
            IrKind::Call { .. } | IrKind::Tellraw { .. } | IrKind::Raw(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeMeta {
    pub location: Option<CodeSpan>,
    /// Emission order within the whole compilation, assigned when the
    /// enclosing function is finished.
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrNode {
    pub kind: IrKind,
    pub children: Vec<IrNode>,
    pub meta: NodeMeta,
}

impl IrNode {
    pub fn new(kind: IrKind) -> Self {
        Self {
            kind,
            children: vec![],
            meta: NodeMeta::default(),
        }
    }
    pub fn with_children(kind: IrKind, children: Vec<IrNode>) -> Self {
        Self {
            kind,
            children,
            meta: NodeMeta::default(),
        }
    }
    pub fn at(mut self, span: CodeSpan) -> Self {
        self.meta.location = Some(span);
        self
    }

    /// Pre-order walk over this node and all descendants.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a IrNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut IrNode)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    pub name: String,
    pub children: Vec<IrNode>,
    pub drop: bool,
    pub meta: NodeMeta,
}

impl FunctionNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: vec![],
            drop: false,
            meta: NodeMeta::default(),
        }
    }

    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a IrNode)) {
        for child in &self.children {
            child.visit(f);
        }
    }

    pub fn calls(&self) -> Vec<&str> {
        let mut out = vec![];
        self.visit(&mut |n| {
            if let IrKind::Call { function } = &n.kind {
                out.push(function.as_str())
            }
        });
        out
    }
}

/// Every function of one compilation, in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrProgram {
    pub functions: Vec<FunctionNode>,
    /// Next free emission index, for nodes created after building.
    pub next_index: u32,
}

impl IrProgram {
    pub fn get(&self, name: &str) -> Option<&FunctionNode> {
        self.functions.iter().find(|f| f.name == name)
    }
    pub fn get_mut(&mut self, name: &str) -> Option<&mut FunctionNode> {
        self.functions.iter_mut().find(|f| f.name == name)
    }
}

/// Name of the cell holding a registered integer constant.
pub fn constant_cell(value: i32) -> CellAddress {
    if value < 0 {
        CellAddress::named(format!(".const_m{}", value.unsigned_abs()))
    } else {
        CellAddress::named(format!(".const_{}", value))
    }
}

#[cfg(test)]
mod tests;
