pub mod error;
pub mod scope;

use std::rc::Rc;

use lasso::{Rodeo, Spur};
use tracing::{debug, warn};

use crate::{
    parser::ast::{
        AssignTarget, Block, ExprNode, ExprType, FunctionDecl, Program, StmtNode, StmtType,
    },
    source::{CodeArea, CodeSpan, ScriptSource},
};

use self::{
    error::{ScopeError, ScopeErrorKind},
    scope::{Access, DeclaredVariable, ScopeKey, ScopeKind, ScopeMap, ScopeRecord},
};

/// Names provided by the compiler. Reading them never needs a declaration.
pub const BUILTIN_GLOBALS: &[&str] = &[
    "print",
    "range",
    "fixed",
    "int",
    "arrayOf",
    "len",
    "setBlock",
    "run",
    "_debugVariable",
    "isRaining",
    "isThundering",
    "isFeature",
    "blocks",
];

pub struct Analysis {
    pub scopes: ScopeMap,
    pub errors: Vec<ScopeError>,
}

pub struct Analyzer<'a> {
    src: Rc<ScriptSource>,
    interner: &'a Rodeo,
    map: ScopeMap,
    open: Vec<ScopeKey>,
    errors: Vec<ScopeError>,
}

impl<'a> Analyzer<'a> {
    pub fn new(src: &Rc<ScriptSource>, interner: &'a Rodeo) -> Self {
        Self {
            src: src.clone(),
            interner,
            map: ScopeMap::default(),
            open: vec![],
            errors: vec![],
        }
    }

    fn make_area(&self, span: CodeSpan) -> CodeArea {
        CodeArea {
            span,
            src: self.src.clone(),
        }
    }

    fn current(&self) -> ScopeKey {
        self.open.last().copied().unwrap_or(ScopeKey::GLOBAL)
    }

    fn push(&mut self, key: ScopeKey, kind: ScopeKind) {
        for k in &self.open {
            if let Some(record) = self.map.records.get_mut(k) {
                record.inner.push(key);
            }
        }
        self.map.records.insert(
            key,
            ScopeRecord {
                key,
                kind,
                variables: vec![],
                inner: vec![],
            },
        );
        self.open.push(key);
    }

    fn pop(&mut self) {
        self.open.pop();
    }

    fn in_scope<F: FnOnce(&mut Self)>(&mut self, key: ScopeKey, kind: ScopeKind, f: F) {
        self.push(key, kind);
        f(self);
        self.pop();
    }

    fn lookup(&mut self, name: Spur) -> Option<&mut DeclaredVariable> {
        let key = self
            .open
            .iter()
            .rev()
            .find(|k| self.map.records[*k].variable(name).is_some())
            .copied()?;
        self.map
            .records
            .get_mut(&key)?
            .variables
            .iter_mut()
            .find(|v| v.name == name)
    }

    fn declare(&mut self, name: Spur, site: CodeSpan, constant: bool) {
        let scope = self.current();
        if let Some(record) = self.map.records.get_mut(&scope) {
            record.variables.push(DeclaredVariable {
                name,
                declaration: Access { site, scope },
                writes: vec![],
                reads: vec![],
                constant,
            });
        }
    }

    /// Declares `name` or records a write to the visible declaration.
    fn write(&mut self, name: Spur, site: CodeSpan, constant: bool) {
        let access = Access {
            site,
            scope: self.current(),
        };
        match self.lookup(name) {
            Some(var) => var.writes.push(access),
            None => self.declare(name, site, constant),
        }
    }

    fn write_existing(&mut self, name: Spur, site: CodeSpan) {
        let access = Access {
            site,
            scope: self.current(),
        };
        let interner = self.interner;
        match self.lookup(name) {
            Some(var) => var.writes.push(access),
            None => self.report(
                ScopeErrorKind::UndeclaredWrite(interner.resolve(&name).into()),
                site,
            ),
        }
    }

    fn read(&mut self, name: Spur, site: CodeSpan) {
        let access = Access {
            site,
            scope: self.current(),
        };
        let interner = self.interner;
        match self.lookup(name) {
            Some(var) => var.reads.push(access),
            None => {
                let resolved = interner.resolve(&name);
                if !BUILTIN_GLOBALS.contains(&resolved) {
                    self.report(ScopeErrorKind::UndeclaredRead(resolved.into()), site)
                }
            }
        }
    }

    fn report(&mut self, kind: ScopeErrorKind, site: CodeSpan) {
        let err = ScopeError {
            kind,
            area: self.make_area(site),
        };
        let (line, col) = err.area.line_col();
        warn!(line, col, "{}", err.msg());
        self.errors.push(err);
    }

    fn walk_expr(&mut self, expr: &ExprNode) {
        match &expr.typ {
            ExprType::Int(_)
            | ExprType::Decimal(_)
            | ExprType::String(_)
            | ExprType::Bool(_)
            | ExprType::Null => {}
            ExprType::Var(name) => self.read(*name, expr.span),
            ExprType::Unary(_, v) => self.walk_expr(v),
            ExprType::Op(a, _, b) => {
                self.walk_expr(a);
                self.walk_expr(b);
            }
            ExprType::Index { base, index } => {
                self.walk_expr(base);
                self.walk_expr(index);
            }
            ExprType::Member { base, .. } => self.walk_expr(base),
            ExprType::Call { base, args } => {
                for arg in args {
                    self.walk_expr(arg);
                }
                match &base.typ {
                    ExprType::Member { base: obj, .. } => match &obj.typ {
                        ExprType::Var(name) if !self.is_builtin(*name) => {
                            self.write_existing(*name, obj.span)
                        }
                        _ => self.walk_expr(obj),
                    },
                    _ => self.walk_expr(base),
                }
            }
            ExprType::Array(items) => {
                for item in items {
                    self.walk_expr(item);
                }
            }
        }
    }

    fn is_builtin(&self, name: Spur) -> bool {
        BUILTIN_GLOBALS.contains(&self.interner.resolve(&name))
    }

    fn walk_block(&mut self, block: &Block, kind: ScopeKind) {
        self.in_scope(ScopeKey(block.span), kind, |a| {
            for stmt in &block.stmts {
                a.walk_stmt(stmt);
            }
        })
    }

    fn walk_function(&mut self, decl: &FunctionDecl, kind: ScopeKind) {
        for param in &decl.params {
            if let Some(default) = &param.default {
                self.walk_expr(default);
            }
        }
        self.in_scope(ScopeKey(decl.body.span), kind, |a| {
            if let (Some(site), Some(name)) = (decl.receiver, a.interner.get("self")) {
                a.declare(name, site, false);
            }
            for param in &decl.params {
                a.declare(param.name, param.span, false);
            }
            for stmt in &decl.body.stmts {
                a.walk_stmt(stmt);
            }
        })
    }

    fn walk_stmt(&mut self, stmt: &StmtNode) {
        match &stmt.typ {
            StmtType::Expr(e) => self.walk_expr(e),
            StmtType::Assign(target, value) => {
                self.walk_expr(value);
                match target {
                    AssignTarget::Path { var, .. } if target.is_plain() => {
                        self.write(*var, stmt.span, false)
                    }
                    AssignTarget::Path { var, .. } => self.write_existing(*var, stmt.span),
                    AssignTarget::Index { var, index } => {
                        self.walk_expr(index);
                        self.write_existing(*var, stmt.span)
                    }
                }
            }
            StmtType::AssignOp(target, _, value) => {
                self.walk_expr(value);
                if let AssignTarget::Index { index, .. } = target {
                    self.walk_expr(index);
                }
                self.write_existing(target.var(), stmt.span)
            }
            StmtType::MultiAssign(names, value) => {
                self.walk_expr(value);
                for (name, _) in names {
                    self.write(*name, stmt.span, false);
                }
            }
            StmtType::Const(name, value) => {
                self.walk_expr(value);
                self.write(*name, stmt.span, true);
            }
            StmtType::If {
                cond,
                then,
                otherwise,
            } => {
                self.walk_expr(cond);
                self.walk_block(then, ScopeKind::Conditional);
                if let Some(otherwise) = otherwise {
                    self.walk_block(otherwise, ScopeKind::Conditional);
                }
            }
            StmtType::While { cond, body } => {
                self.walk_expr(cond);
                self.walk_block(body, ScopeKind::Loop);
            }
            StmtType::For {
                var,
                var_span,
                iter,
                body,
            } => {
                self.walk_expr(iter);
                self.in_scope(ScopeKey(body.span), ScopeKind::Loop, |a| {
                    a.declare(*var, *var_span, false);
                    for stmt in &body.stmts {
                        a.walk_stmt(stmt);
                    }
                })
            }
            StmtType::Block(block) => self.walk_block(block, ScopeKind::Block),
            StmtType::Function(decl) => {
                self.write(decl.name, decl.span, false);
                let kind = if decl.inline {
                    ScopeKind::InlineFunction
                } else {
                    ScopeKind::Function
                };
                self.walk_function(decl, kind);
            }
            StmtType::Struct(decl) => {
                self.write(decl.name, stmt.span, false);
                self.in_scope(ScopeKey(decl.body_span), ScopeKind::Struct, |a| {
                    for method in &decl.methods {
                        a.walk_function(method, ScopeKind::InlineFunction);
                    }
                })
            }
            StmtType::Return(value) => {
                if let Some(value) = value {
                    self.walk_expr(value)
                }
            }
        }
    }

    pub fn analyze(mut self, program: &Program) -> Analysis {
        self.in_scope(ScopeKey::GLOBAL, ScopeKind::Global, |a| {
            for stmt in &program.stmts {
                a.walk_stmt(stmt);
            }
        });
        debug!(
            scopes = self.map.records.len(),
            errors = self.errors.len(),
            "scope analysis finished"
        );
        Analysis {
            scopes: self.map,
            errors: self.errors,
        }
    }
}
