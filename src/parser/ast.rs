use lasso::Spur;

use crate::source::CodeSpan;

use super::operators::{BinOp, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    pub typ: ExprType,
    pub span: CodeSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprType {
    Int(i32),
    Decimal(f64),
    String(String),
    Bool(bool),
    Null,

    Var(Spur),

    Unary(UnaryOp, Box<ExprNode>),
    Op(Box<ExprNode>, BinOp, Box<ExprNode>),

    Index {
        base: Box<ExprNode>,
        index: Box<ExprNode>,
    },
    Member {
        base: Box<ExprNode>,
        member: Spur,
    },
    Call {
        base: Box<ExprNode>,
        args: Vec<ExprNode>,
    },
    Array(Vec<ExprNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub name: Spur,
    pub span: CodeSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Spur,
    pub typ: TypeNode,
    pub default: Option<ExprNode>,
    pub span: CodeSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Spur,
    pub inline: bool,
    /// Span of the `self` parameter, if this is a method.
    pub receiver: Option<CodeSpan>,
    pub params: Vec<Param>,
    pub ret: Option<TypeNode>,
    pub body: Block,
    pub span: CodeSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Spur,
    pub fields: Vec<(Spur, TypeNode)>,
    pub methods: Vec<FunctionDecl>,
    pub body_span: CodeSpan,
}

/// Left-hand side of an assignment: `var`, `var.a.b` or `var[index]`.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Path { var: Spur, path: Vec<Spur> },
    Index { var: Spur, index: ExprNode },
}

impl AssignTarget {
    pub fn var(&self) -> Spur {
        match self {
            AssignTarget::Path { var, .. } | AssignTarget::Index { var, .. } => *var,
        }
    }
    pub fn is_plain(&self) -> bool {
        matches!(self, AssignTarget::Path { path, .. } if path.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<StmtNode>,
    pub span: CodeSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtNode {
    pub typ: StmtType,
    pub span: CodeSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtType {
    Expr(ExprNode),
    Assign(AssignTarget, ExprNode),
    AssignOp(AssignTarget, BinOp, ExprNode),
    MultiAssign(Vec<(Spur, CodeSpan)>, ExprNode),
    Const(Spur, ExprNode),

    If {
        cond: ExprNode,
        then: Block,
        otherwise: Option<Block>,
    },
    While {
        cond: ExprNode,
        body: Block,
    },
    For {
        var: Spur,
        var_span: CodeSpan,
        iter: ExprNode,
        body: Block,
    },
    Block(Block),

    Function(FunctionDecl),
    Struct(StructDecl),
    Return(Option<ExprNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stmts: Vec<StmtNode>,
    pub span: CodeSpan,
}
