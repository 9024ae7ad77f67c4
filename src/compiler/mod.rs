pub mod builtins;
pub mod context;
pub mod error;
pub mod resource;
pub mod signature;

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use lasso::{Rodeo, Spur};
use tracing::{debug, trace};

use crate::{
    address::{CellAddress, Slot, StorageAddress},
    analyzer::scope::{ScopeKey, ScopeMap},
    config::Config,
    data::EngineData,
    ir::{builder::IrBuilder, constant_cell, Condition, ConditionTest, IrKind, IrNode, IrProgram},
    make_ids,
    parser::ast::{
        AssignTarget, Block, ExprNode, ExprType, FunctionDecl, Program, StmtNode, StmtType,
        StructDecl, TypeNode,
    },
    source::{CodeArea, CodeSpan, ScriptSource},
    util::{slabmap::SlabMap, unique_register::UniqueRegister},
};

use self::{
    builtins::Builtin,
    context::{ContextKind, ContextStack, Frame, Variable},
    error::CompilerError,
    resource::{
        ops, Emitter, FunctionRef, Resource, ResourceResult, ResourceType, StructInstance, Value,
        FIXED_SCALE,
    },
    signature::{match_args, Argument, Parameter, Signature},
};

make_ids! {
    StructID: u32;
    FunctionID: u32;
}

pub type CompileResult<T> = Result<T, CompilerError>;

const MAX_INLINE_DEPTH: usize = 32;
const RETURN_SLOT: &str = "return";

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: Rc<str>,
    pub fields: Vec<(Rc<str>, ResourceType)>,
    pub methods: AHashMap<Rc<str>, FunctionID>,
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    Plain {
        ir_name: String,
        param_slots: Vec<Slot>,
        return_slot: Slot,
    },
    Inline,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub signature: Signature,
    pub decl: Rc<FunctionDecl>,
    pub kind: FunctionKind,
}

enum Cond {
    Static(bool),
    Dynamic(Condition),
}

/// One step from a variable into its value.
enum Selector {
    Field(Spur),
    Element(i32),
}

/// The object a method is called on, and the variable it came from.
struct Receiver {
    value: Resource,
    var: Option<Spur>,
    slot: Option<Slot>,
}

pub struct Compiler<'a> {
    src: Rc<ScriptSource>,
    interner: &'a mut Rodeo,
    config: &'a Config,
    data: &'a EngineData,
    scopes: &'a ScopeMap,
    contexts: ContextStack,
    ir: IrBuilder,
    structs: SlabMap<StructID, StructDef>,
    functions: SlabMap<FunctionID, FunctionDef>,
    constants: UniqueRegister<i32>,
    function_names: AHashSet<String>,
    temp_counter: usize,
    label_counter: usize,
    inline_depth: usize,
    user_init: Option<String>,
    location: CodeSpan,
}

impl Emitter for Compiler<'_> {
    fn emit(&mut self, node: IrNode) {
        let node = match node.meta.location {
            Some(_) => node,
            None => node.at(self.location),
        };
        self.ir.append(node)
    }
    fn temp_cell(&mut self) -> CellAddress {
        self.temp_counter += 1;
        CellAddress::temporary(format!(".tmp{}", self.temp_counter - 1))
    }
    fn temp_storage(&mut self) -> StorageAddress {
        self.temp_counter += 1;
        StorageAddress::temporary(format!("tmp{}", self.temp_counter - 1))
    }
    fn register_constant(&mut self, value: i32) {
        self.constants.insert(value);
    }
}

impl<'a> Compiler<'a> {
    pub fn new(
        src: &Rc<ScriptSource>,
        interner: &'a mut Rodeo,
        config: &'a Config,
        data: &'a EngineData,
        scopes: &'a ScopeMap,
    ) -> Self {
        Self {
            src: src.clone(),
            interner,
            config,
            data,
            scopes,
            contexts: ContextStack::new(),
            ir: IrBuilder::new(),
            structs: SlabMap::new(),
            functions: SlabMap::new(),
            constants: UniqueRegister::new(),
            function_names: ["main", "init"].into_iter().map(String::from).collect(),
            temp_counter: 0,
            label_counter: 0,
            inline_depth: 0,
            user_init: None,
            location: CodeSpan::ZEROSPAN,
        }
    }

    pub fn resolve(&self, s: &Spur) -> &str {
        self.interner.resolve(s)
    }

    pub fn make_area(&self, span: CodeSpan) -> CodeArea {
        CodeArea {
            span,
            src: self.src.clone(),
        }
    }

    fn lift<T>(&self, result: ResourceResult<T>, span: CodeSpan) -> CompileResult<T> {
        result.map_err(|error| CompilerError::Resource {
            error,
            area: self.make_area(span),
        })
    }

    fn nonexistent(&self, name: Spur, span: CodeSpan) -> CompilerError {
        CompilerError::NonexistentVariable {
            name: self.resolve(&name).into(),
            area: self.make_area(span),
        }
    }

    fn internal(&self, msg: &str, span: CodeSpan) -> CompilerError {
        CompilerError::Internal {
            msg: msg.into(),
            area: self.make_area(span),
        }
    }

    fn temp_slot(&mut self) -> Slot {
        Slot {
            cell: self.temp_cell(),
            storage: self.temp_storage(),
        }
    }

    /// A function name that no other generated function uses.
    fn unique_name(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 1;
        while self.function_names.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.function_names.insert(name.clone());
        name
    }

    fn in_buffer(
        &mut self,
        f: impl FnOnce(&mut Self) -> CompileResult<()>,
    ) -> CompileResult<Vec<IrNode>> {
        self.ir.push_buffer();
        let result = f(self);
        let nodes = self.ir.pop_buffer();
        result.map(|_| nodes)
    }

    /// Runs `f` with appends going to the buffer below the innermost one.
    fn in_previous<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        self.ir.hide_top();
        let result = f(self);
        self.ir.show_top();
        result
    }

    fn in_function(
        &mut self,
        name: String,
        span: CodeSpan,
        f: impl FnOnce(&mut Self) -> CompileResult<()>,
    ) -> CompileResult<()> {
        let nodes = self.in_buffer(f)?;
        debug!(name = %name, nodes = nodes.len(), "compiled function");
        self.ir.finish_function(name, nodes, Some(span));
        Ok(())
    }

    fn in_frame<T>(
        &mut self,
        kind: ContextKind,
        scope: Option<ScopeKey>,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        self.contexts.push(kind, scope);
        self.contexts.current_mut().buffer_depth = self.ir.depth();
        let result = f(self);
        self.contexts.pop();
        result
    }

    /// Copies a value that still refers to a variable's cells into fresh
    /// temporaries.
    fn detach(&mut self, value: Resource, span: CodeSpan) -> CompileResult<Resource> {
        if !value.borrows_address() {
            return Ok(value);
        }
        let slot = self.temp_slot();
        let stored = value.materialize(&slot, self);
        self.lift(stored, span)
    }

    fn resolve_type(&self, node: &TypeNode) -> CompileResult<ResourceType> {
        let name = self.resolve(&node.name);
        if let Some(typ) = ResourceType::from_name(name) {
            return Ok(typ);
        }
        match self.contexts.find(node.name).map(|(_, v)| &v.resource) {
            Some(Resource::StructType(id, name)) => Ok(ResourceType::Struct(*id, name.clone())),
            _ => Err(CompilerError::UnknownType {
                name: name.into(),
                area: self.make_area(node.span),
            }),
        }
    }

    fn bind_new(&mut self, name: Spur, var: Variable, span: CodeSpan) -> CompileResult<()> {
        self.contexts
            .bind(name, var)
            .map_err(|_| CompilerError::AlreadyDeclared {
                name: self.resolve(&name).into(),
                area: self.make_area(span),
            })
    }

    fn declare(
        &mut self,
        name: Spur,
        value: Resource,
        span: CodeSpan,
        constant: bool,
    ) -> CompileResult<()> {
        let frame = self.contexts.current();
        let scope = frame.scope;
        let runtime = !constant
            && scope.is_some_and(|s| self.scopes.requires_runtime_storage(s, name));

        let (resource, slot) = if runtime {
            let slot = frame.slot_for(self.resolve(&name));
            let stored = value.materialize(&slot, self);
            (self.lift(stored, span)?, Some(slot))
        } else {
            (self.detach(value, span)?, None)
        };
        trace!(name = self.resolve(&name), runtime, "declared variable");

        self.bind_new(
            name,
            Variable {
                resource: resource.pinned(),
                scope,
                site: span,
                slot,
                constant,
            },
            span,
        )
    }

    fn selectors(&mut self, target: &AssignTarget) -> CompileResult<(Spur, Vec<Selector>)> {
        Ok(match target {
            AssignTarget::Path { var, path } => {
                (*var, path.iter().map(|m| Selector::Field(*m)).collect())
            }
            AssignTarget::Index { var, index } => {
                let i = self.static_int(index, "An array index")?;
                (*var, vec![Selector::Element(i)])
            }
        })
    }

    fn static_int(&mut self, expr: &ExprNode, what: &'static str) -> CompileResult<i32> {
        match self.compile_expr(expr)? {
            Resource::Number(Value::Static(n)) => Ok(n),
            Resource::Number(_) => Err(CompilerError::NotStatic {
                what,
                area: self.make_area(expr.span),
            }),
            other => Err(CompilerError::TypeMismatch {
                expected: ResourceType::Number,
                found: other.typ(),
                area: self.make_area(expr.span),
            }),
        }
    }

    fn select(&self, base: Resource, selector: &Selector, span: CodeSpan) -> CompileResult<Resource> {
        match (base, selector) {
            (Resource::Struct(mut instance), Selector::Field(field)) => {
                let member = self.resolve(field);
                instance
                    .fields
                    .swap_remove(member)
                    .ok_or_else(|| CompilerError::UnknownMember {
                        typ: ResourceType::Struct(instance.def, instance.name.clone()),
                        member: member.into(),
                        area: self.make_area(span),
                    })
            }
            (Resource::Array(mut items), Selector::Element(i)) => {
                let len = items.len();
                match usize::try_from(*i).ok().filter(|i| *i < len) {
                    Some(i) => Ok(items.swap_remove(i)),
                    None => Err(CompilerError::IndexOutOfBounds {
                        index: *i,
                        len,
                        area: self.make_area(span),
                    }),
                }
            }
            (base, Selector::Field(field)) => Err(CompilerError::UnknownMember {
                typ: base.typ(),
                member: self.resolve(field).into(),
                area: self.make_area(span),
            }),
            (base, Selector::Element(_)) => Err(CompilerError::TypeMismatch {
                expected: ResourceType::Array,
                found: base.typ(),
                area: self.make_area(span),
            }),
        }
    }

    /// Rebuilds `current` with the part named by `path` replaced by `value`.
    /// With a slot the new part is written to its runtime home.
    fn replace(
        &mut self,
        current: Resource,
        path: &[Selector],
        value: Resource,
        slot: Option<Slot>,
        span: CodeSpan,
    ) -> CompileResult<Resource> {
        let Some((selector, rest)) = path.split_first() else {
            return match slot {
                Some(slot) => {
                    if !current.typ().accepts(&value.typ()) {
                        return Err(CompilerError::TypeMismatch {
                            expected: current.typ(),
                            found: value.typ(),
                            area: self.make_area(span),
                        });
                    }
                    let stored = value.materialize(&slot, self);
                    self.lift(stored, span)
                }
                None => self.detach(value, span),
            };
        };

        let typ = current.typ();
        match (current, selector) {
            (Resource::Struct(mut instance), Selector::Field(field)) => {
                let member: Rc<str> = self.resolve(field).into();
                let Some(old) = instance.fields.get(&member).cloned() else {
                    return Err(CompilerError::UnknownMember {
                        typ,
                        member: member.to_string(),
                        area: self.make_area(span),
                    });
                };
                let slot = slot.map(|s| s.member(&member));
                let new = self.replace(old, rest, value, slot, span)?;
                instance.fields.insert(member, new);
                Ok(Resource::Struct(instance))
            }
            (Resource::Array(mut items), Selector::Element(i)) => {
                let len = items.len();
                let Some(index) = usize::try_from(*i).ok().filter(|i| *i < len) else {
                    return Err(CompilerError::IndexOutOfBounds {
                        index: *i,
                        len,
                        area: self.make_area(span),
                    });
                };
                let slot = slot.map(|s| s.element(index));
                items[index] = self.replace(items[index].clone(), rest, value, slot, span)?;
                Ok(Resource::Array(items))
            }
            (current, selector) => {
                self.select(current, selector, span)?;
                Err(self.internal("selector matched on read but not on write", span))
            }
        }
    }

    /// Assigns to `name` or a part of it. Unknown plain names are declared.
    fn assign(
        &mut self,
        name: Spur,
        path: &[Selector],
        value: Resource,
        span: CodeSpan,
    ) -> CompileResult<()> {
        let found = self.contexts.find(name).map(|(f, v)| (f, v.clone()));
        let Some((frame, var)) = found else {
            if path.is_empty() {
                return self.declare(name, value, span, false);
            }
            return Err(self.nonexistent(name, span));
        };

        if var.constant {
            return Err(CompilerError::ConstWrite {
                name: self.resolve(&name).into(),
                area: self.make_area(span),
            });
        }
        if var.slot.is_none() && self.contexts.runtime_between(frame) {
            return Err(CompilerError::StaticWriteInRuntimeScope {
                name: self.resolve(&name).into(),
                area: self.make_area(span),
            });
        }

        let updated = self.replace(var.resource, path, value, var.slot, span)?;
        self.contexts
            .rebind(name, updated.pinned())
            .map_err(|_| self.internal("variable disappeared during assignment", span))
    }

    /// The current value at a place, ready to be updated in place when it
    /// lives in the variable's own slot.
    fn read_place(&self, name: Spur, path: &[Selector], span: CodeSpan) -> CompileResult<Resource> {
        let Some((_, var)) = self.contexts.find(name) else {
            return Err(self.nonexistent(name, span));
        };
        let owned = var.slot.is_some();
        let mut value = var.resource.clone();
        for selector in path {
            value = self.select(value, selector, span)?;
        }
        Ok(if owned { value.in_place() } else { value })
    }

    fn read_var(&self, name: Spur, span: CodeSpan) -> CompileResult<Resource> {
        if let Some((_, var)) = self.contexts.find(name) {
            return Ok(var.resource.clone());
        }
        match Builtin::from_name(self.resolve(&name)) {
            Some(builtin) => Ok(Resource::Function(FunctionRef::Builtin(builtin))),
            None => Err(self.nonexistent(name, span)),
        }
    }

    pub fn compile_expr(&mut self, expr: &ExprNode) -> CompileResult<Resource> {
        let span = expr.span;
        Ok(match &expr.typ {
            ExprType::Int(n) => Resource::Number(Value::Static(*n)),
            ExprType::Decimal(d) => {
                Resource::Fixed(Value::Static((d * FIXED_SCALE as f64).round() as i32))
            }
            ExprType::String(s) => Resource::String(Value::Static(s.as_str().into())),
            ExprType::Bool(b) => Resource::Bool(Value::Static(*b)),
            ExprType::Null => Resource::Null,
            ExprType::Var(name) => self.read_var(*name, span)?,
            ExprType::Unary(op, value) => {
                let value = self.compile_expr(value)?;
                let result = ops::unary(self, *op, value);
                self.lift(result, span)?
            }
            ExprType::Op(a, op, b) => {
                let a = self.compile_expr(a)?;
                let b = self.compile_expr(b)?;
                let result = ops::binary(self, a, *op, b);
                self.lift(result, span)?
            }
            ExprType::Index { base, index } => {
                let base = self.compile_expr(base)?;
                let i = self.static_int(index, "An array index")?;
                self.select(base, &Selector::Element(i), span)?
            }
            ExprType::Member { base, member } => {
                if let Some(block) = self.block_member(base, *member, span)? {
                    return Ok(block);
                }
                let base = self.compile_expr(base)?;
                self.select(base, &Selector::Field(*member), span)?
            }
            ExprType::Call { base, args } => self.compile_call(base, args, span)?,
            ExprType::Array(items) => Resource::Array(
                items
                    .iter()
                    .map(|item| self.compile_expr(item))
                    .collect::<CompileResult<_>>()?,
            ),
        })
    }

    fn compile_args(&mut self, args: &[ExprNode]) -> CompileResult<Vec<Resource>> {
        args.iter().map(|a| self.compile_expr(a)).collect()
    }

    fn compile_call(
        &mut self,
        base: &ExprNode,
        args: &[ExprNode],
        span: CodeSpan,
    ) -> CompileResult<Resource> {
        if let ExprType::Member {
            base: object,
            member,
        } = &base.typ
        {
            let receiver = self.compile_expr(object)?;
            let method = match &receiver {
                Resource::Struct(instance) => self
                    .structs
                    .get(instance.def)
                    .and_then(|d| d.methods.get(self.resolve(member)))
                    .copied(),
                _ => None,
            };
            if let Some(id) = method {
                let var = match &object.typ {
                    ExprType::Var(name) => Some(*name),
                    _ => None,
                };
                let slot = var
                    .and_then(|v| self.contexts.find(v))
                    .and_then(|(_, v)| v.slot.clone());
                let args = self.compile_args(args)?;
                let receiver = Receiver {
                    value: receiver,
                    var,
                    slot,
                };
                return self.call_user(id, Some(receiver), args, span);
            }
            let callee = self.select(receiver, &Selector::Field(*member), base.span)?;
            let args = self.compile_args(args)?;
            return self.call_value(callee, args, span);
        }

        let callee = self.compile_expr(base)?;
        let args = self.compile_args(args)?;
        self.call_value(callee, args, span)
    }

    fn call_value(
        &mut self,
        callee: Resource,
        args: Vec<Resource>,
        span: CodeSpan,
    ) -> CompileResult<Resource> {
        match callee {
            Resource::Function(FunctionRef::Builtin(builtin)) => {
                self.call_builtin(builtin, args, span)
            }
            Resource::Function(FunctionRef::User(id)) => self.call_user(id, None, args, span),
            Resource::StructType(id, _) => self.construct(id, args, span),
            other => Err(CompilerError::NotCallable {
                typ: other.typ(),
                area: self.make_area(span),
            }),
        }
    }

    fn match_call(
        &self,
        signature: &Signature,
        args: Vec<Resource>,
        span: CodeSpan,
    ) -> CompileResult<Vec<Argument>> {
        let found = args.iter().map(|a| a.typ()).join(", ");
        match_args(signature, args).map_err(|error| CompilerError::Argument {
            error,
            signature: signature.to_string(),
            found,
            area: self.make_area(span),
        })
    }

    fn call_user(
        &mut self,
        id: FunctionID,
        receiver: Option<Receiver>,
        args: Vec<Resource>,
        span: CodeSpan,
    ) -> CompileResult<Resource> {
        let Some(def) = self.functions.get(id).cloned() else {
            return Err(self.internal("call to an unregistered function", span));
        };
        let matched = self.match_call(&def.signature, args, span)?;

        match &def.kind {
            FunctionKind::Plain {
                ir_name,
                param_slots,
                return_slot,
            } => {
                for (arg, slot) in matched.into_iter().zip(param_slots) {
                    for value in arg.flatten() {
                        let stored = value.materialize(slot, self);
                        self.lift(stored, span)?;
                    }
                }
                self.emit(IrNode::new(IrKind::Call {
                    function: ir_name.clone(),
                }));
                match def.signature.ret.at_slot(return_slot) {
                    Some(result) => self.detach(result, span),
                    None => Ok(Resource::Null),
                }
            }
            FunctionKind::Inline => self.call_inline(&def, receiver, matched, span),
        }
    }

    fn call_inline(
        &mut self,
        def: &FunctionDef,
        receiver: Option<Receiver>,
        args: Vec<Argument>,
        span: CodeSpan,
    ) -> CompileResult<Resource> {
        if self.inline_depth >= MAX_INLINE_DEPTH {
            return Err(CompilerError::InlineRecursion {
                name: def.signature.name.clone(),
                area: self.make_area(span),
            });
        }
        let decl = def.decl.clone();
        let scope = ScopeKey(decl.body.span);
        let self_name = self.interner.get_or_intern_static("self");

        self.inline_depth += 1;
        let result = self.in_frame(ContextKind::InlineFunction, Some(scope), |c| {
            c.contexts.current_mut().return_type = Some(def.signature.ret.clone());

            if let (Some(receiver), Some(site)) = (&receiver, decl.receiver) {
                let var = Variable {
                    resource: receiver.value.clone(),
                    scope: Some(scope),
                    site,
                    slot: receiver.slot.clone(),
                    constant: false,
                };
                c.bind_new(self_name, var, site)?;
            }

            for (param, arg) in decl.params.iter().zip(args) {
                let Some(value) = arg.single().cloned() else {
                    return Err(c.internal("inline parameters take one argument", param.span));
                };
                let runtime =
                    !value.is_static() || c.scopes.requires_runtime_storage(scope, param.name);
                let (resource, slot) = if runtime {
                    let slot = c.contexts.current().slot_for(c.resolve(&param.name));
                    let stored = value.materialize(&slot, c);
                    (c.lift(stored, param.span)?, Some(slot))
                } else {
                    (value, None)
                };
                let var = Variable {
                    resource: resource.pinned(),
                    scope: Some(scope),
                    site: param.span,
                    slot,
                    constant: false,
                };
                c.bind_new(param.name, var, param.span)?;
            }

            c.compile_stmts(&decl.body.stmts)?;

            let frame = c.contexts.current();
            let returned = frame.returned.clone().unwrap_or(Resource::Null);
            let this = frame.vars.get(&self_name).map(|v| v.resource.clone());
            Ok((returned, this))
        });
        self.inline_depth -= 1;
        let (returned, this) = result?;

        if let (Some(receiver), Some(this)) = (receiver, this) {
            if let Some(var) = receiver.var.filter(|_| this != receiver.value) {
                self.assign(var, &[], this, span)?;
            }
        }
        Ok(returned)
    }

    fn construct(
        &mut self,
        id: StructID,
        args: Vec<Resource>,
        span: CodeSpan,
    ) -> CompileResult<Resource> {
        let Some(def) = self.structs.get(id).cloned() else {
            return Err(self.internal("construction of an unregistered struct", span));
        };
        let signature = Signature {
            name: def.name.to_string(),
            params: def
                .fields
                .iter()
                .map(|(name, typ)| Parameter::new(name.to_string(), typ.clone()))
                .collect(),
            ret: ResourceType::Struct(id, def.name.clone()),
            method: false,
        };
        let matched = self.match_call(&signature, args, span)?;
        let fields = def
            .fields
            .iter()
            .zip(matched)
            .map(|((name, _), arg)| {
                let value = arg.flatten().into_iter().next().unwrap_or(Resource::Null);
                (name.clone(), value)
            })
            .collect();
        Ok(Resource::Struct(StructInstance {
            def: id,
            name: def.name,
            fields,
        }))
    }

    fn condition(&mut self, expr: &ExprNode) -> CompileResult<Cond> {
        Ok(match self.compile_expr(expr)? {
            Resource::Bool(Value::Static(b)) => Cond::Static(b),
            Resource::Number(Value::Static(n)) => Cond::Static(n != 0),
            Resource::Bool(Value::Dynamic(cell)) => Cond::Dynamic(Condition::is_true(cell)),
            Resource::Number(Value::Dynamic(cell)) => Cond::Dynamic(Condition {
                negate: true,
                test: ConditionTest::Range {
                    cell,
                    min: Some(0),
                    max: Some(0),
                },
            }),
            other => {
                return Err(CompilerError::TypeMismatch {
                    expected: ResourceType::Bool,
                    found: other.typ(),
                    area: self.make_area(expr.span),
                })
            }
        })
    }

    /// Stores a condition in a fresh temporary so neither branch can change
    /// what the other one tests.
    fn stable_condition(&mut self, condition: Condition) -> Condition {
        if let ConditionTest::Range { cell, .. } = &condition.test {
            if cell.temporary && condition == Condition::is_true(cell.clone()) {
                return condition;
            }
        }
        let target = self.temp_cell();
        self.emit(IrNode::new(IrKind::StoreCondition {
            target: target.clone(),
            conditions: vec![condition],
        }));
        Condition::is_true(target)
    }

    fn compile_block(&mut self, block: &Block, kind: ContextKind) -> CompileResult<()> {
        self.in_frame(kind, Some(ScopeKey(block.span)), |c| {
            c.compile_stmts(&block.stmts)
        })
    }

    fn compile_if(
        &mut self,
        cond: &ExprNode,
        then: &Block,
        otherwise: Option<&Block>,
    ) -> CompileResult<()> {
        let condition = match self.condition(cond)? {
            Cond::Static(true) => return self.compile_block(then, ContextKind::Block),
            Cond::Static(false) => {
                return match otherwise {
                    Some(block) => self.compile_block(block, ContextKind::Block),
                    None => Ok(()),
                }
            }
            Cond::Dynamic(condition) => self.stable_condition(condition),
        };

        let nodes = self.in_buffer(|c| c.compile_block(then, ContextKind::Conditional))?;
        self.emit(IrNode::with_children(
            IrKind::ExecuteIf {
                conditions: vec![condition.clone()],
            },
            nodes,
        ));
        if let Some(otherwise) = otherwise {
            let nodes =
                self.in_buffer(|c| c.compile_block(otherwise, ContextKind::Conditional))?;
            self.emit(IrNode::with_children(
                IrKind::ExecuteIf {
                    conditions: vec![condition.negated()],
                },
                nodes,
            ));
        }
        Ok(())
    }

    /// Calls `function` when `cond` holds. Returns false if it never does.
    fn loop_check(&mut self, cond: &ExprNode, function: &str) -> CompileResult<bool> {
        let call = IrNode::new(IrKind::Call {
            function: function.into(),
        })
        .at(self.location);
        match self.condition(cond)? {
            Cond::Static(false) => Ok(false),
            Cond::Static(true) => {
                self.emit(call);
                Ok(true)
            }
            Cond::Dynamic(condition) => {
                self.emit(IrNode::with_children(
                    IrKind::ExecuteIf {
                        conditions: vec![condition],
                    },
                    vec![call],
                ));
                Ok(true)
            }
        }
    }

    fn compile_while(&mut self, cond: &ExprNode, body: &Block, span: CodeSpan) -> CompileResult<()> {
        let name = self.unique_name(&format!("while_{}", self.label_counter));
        self.label_counter += 1;

        self.in_function(name.clone(), span, |c| {
            if !c.in_previous(|c| c.loop_check(cond, &name))? {
                return Ok(());
            }
            c.compile_block(body, ContextKind::Loop)?;
            c.loop_check(cond, &name).map(|_| ())
        })
    }

    fn compile_for(
        &mut self,
        var: Spur,
        var_span: CodeSpan,
        iter: &ExprNode,
        body: &Block,
    ) -> CompileResult<()> {
        let items = match self.compile_expr(iter)? {
            Resource::Array(items) => items,
            other => {
                return Err(CompilerError::NotIterable {
                    typ: other.typ(),
                    area: self.make_area(iter.span),
                })
            }
        };
        for item in items {
            self.in_frame(ContextKind::Loop, Some(ScopeKey(body.span)), |c| {
                c.declare(var, item, var_span, false)?;
                c.compile_stmts(&body.stmts)
            })?;
        }
        Ok(())
    }

    fn compile_return(&mut self, value: Option<&ExprNode>, span: CodeSpan) -> CompileResult<()> {
        let value = match value {
            Some(expr) => self.compile_expr(expr)?,
            None => Resource::Null,
        };
        let Some(id) = self.contexts.enclosing_function() else {
            return Err(CompilerError::ReturnOutsideFunction {
                area: self.make_area(span),
            });
        };
        let runtime = self.contexts.runtime_between(id);
        let Some(frame) = self.contexts.get(id) else {
            return Err(self.internal("function frame disappeared", span));
        };
        if let Some(expected) = frame.return_type.as_ref() {
            if !expected.accepts(&value.typ()) {
                return Err(CompilerError::TypeMismatch {
                    expected: expected.clone(),
                    found: value.typ(),
                    area: self.make_area(span),
                });
            }
        }

        let kind = frame.kind;
        let previous = frame.returned.clone();
        let depth = frame.buffer_depth;
        let slot = match &frame.return_slot {
            Some(slot) => slot.clone(),
            None => frame.slot_for(RETURN_SLOT),
        };

        let stored = match kind {
            ContextKind::Function if value == Resource::Null => value,
            ContextKind::Function => {
                let stored = value.materialize(&slot, self);
                self.lift(stored, span)?
            }
            _ if runtime || previous.as_ref().is_some_and(|r| !r.is_fully_static()) => {
                // an earlier unconditional return still has to reach the slot
                if let Some(previous) = previous.filter(|r| runtime && r.is_fully_static()) {
                    let nodes = self.in_buffer(|c| {
                        let stored = previous.materialize(&slot, c);
                        c.lift(stored, span).map(|_| ())
                    })?;
                    self.ir.append_at(depth, nodes);
                }
                let stored = value.materialize(&slot, self);
                self.lift(stored, span)?
            }
            _ => value,
        };
        if let Some(frame) = self.contexts.get_mut(id) {
            frame.returned = Some(stored);
        }
        Ok(())
    }

    fn signature(&mut self, decl: &FunctionDecl, method: bool) -> CompileResult<Signature> {
        let inline = decl.inline || method;
        let mut params = vec![];
        for param in &decl.params {
            let typ = self.resolve_type(&param.typ)?;
            if !inline && !typ.is_value_kind() {
                return Err(CompilerError::UnsupportedRuntimeType {
                    typ,
                    area: self.make_area(param.span),
                });
            }
            let mut p = Parameter::new(self.resolve(&param.name), typ);
            if let Some(default) = &param.default {
                let value = self.compile_expr(default)?;
                p = p.with_default(value);
            }
            params.push(p);
        }
        let ret = match &decl.ret {
            Some(node) => {
                let typ = self.resolve_type(node)?;
                if !inline && !typ.is_value_kind() && typ != ResourceType::Null {
                    return Err(CompilerError::UnsupportedRuntimeType {
                        typ,
                        area: self.make_area(node.span),
                    });
                }
                typ
            }
            None if inline => ResourceType::Any,
            None => ResourceType::Null,
        };
        Ok(Signature {
            name: self.resolve(&decl.name).into(),
            params,
            ret,
            method,
        })
    }

    fn declare_function(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        let signature = self.signature(decl, false)?;
        let shared = Rc::new(decl.clone());

        if decl.inline {
            let id = self.functions.insert(FunctionDef {
                signature,
                decl: shared,
                kind: FunctionKind::Inline,
            });
            return self.declare(decl.name, Resource::Function(FunctionRef::User(id)), decl.span, false);
        }

        let name = self.resolve(&decl.name).to_string();
        let ir_name = self.unique_name(&name);
        if name == "init" {
            self.user_init = Some(ir_name.clone());
        }

        let frame_id = self.contexts.next_id();
        let param_slots = signature
            .params
            .iter()
            .map(|p| Frame::slot_template(frame_id, &p.name))
            .collect_vec();
        let return_slot = Frame::slot_template(frame_id, RETURN_SLOT);
        let id = self.functions.insert(FunctionDef {
            signature: signature.clone(),
            decl: shared,
            kind: FunctionKind::Plain {
                ir_name: ir_name.clone(),
                param_slots: param_slots.clone(),
                return_slot: return_slot.clone(),
            },
        });
        self.declare(decl.name, Resource::Function(FunctionRef::User(id)), decl.span, false)?;

        let scope = ScopeKey(decl.body.span);
        self.in_function(ir_name, decl.span, |c| {
            c.in_frame(ContextKind::Function, Some(scope), |c| {
                let frame = c.contexts.current_mut();
                frame.return_slot = Some(return_slot);
                frame.return_type = Some(signature.ret.clone());

                for ((param, slot), formal) in decl.params.iter().zip(param_slots).zip(&signature.params) {
                    let Some(resource) = formal.typ.at_slot(&slot) else {
                        return Err(c.internal("parameter type has no runtime form", param.span));
                    };
                    let var = Variable {
                        resource,
                        scope: Some(scope),
                        site: param.span,
                        slot: Some(slot),
                        constant: false,
                    };
                    c.bind_new(param.name, var, param.span)?;
                }
                c.compile_stmts(&decl.body.stmts)
            })
        })
    }

    fn declare_struct(&mut self, decl: &StructDecl, span: CodeSpan) -> CompileResult<()> {
        let name: Rc<str> = self.resolve(&decl.name).into();
        let mut fields = vec![];
        for (field, typ) in &decl.fields {
            let typ = self.resolve_type(typ)?;
            fields.push((Rc::from(self.resolve(field)), typ));
        }
        let id = self.structs.insert(StructDef {
            name: name.clone(),
            fields,
            methods: AHashMap::new(),
        });
        self.declare(decl.name, Resource::StructType(id, name), span, false)?;

        for method in &decl.methods {
            let signature = self.signature(method, true)?;
            let fid = self.functions.insert(FunctionDef {
                signature,
                decl: Rc::new(method.clone()),
                kind: FunctionKind::Inline,
            });
            let key: Rc<str> = self.resolve(&method.name).into();
            self.structs[id].methods.insert(key, fid);
        }
        Ok(())
    }

    pub fn compile_stmts(&mut self, stmts: &[StmtNode]) -> CompileResult<()> {
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn compile_stmt(&mut self, stmt: &StmtNode) -> CompileResult<()> {
        let outer = std::mem::replace(&mut self.location, stmt.span);
        let result = self.compile_stmt_inner(stmt);
        self.location = outer;
        result
    }

    fn compile_stmt_inner(&mut self, stmt: &StmtNode) -> CompileResult<()> {
        let span = stmt.span;
        match &stmt.typ {
            StmtType::Expr(expr) => {
                self.compile_expr(expr)?;
            }
            StmtType::Assign(target, value) => {
                let value = self.compile_expr(value)?;
                let (var, path) = self.selectors(target)?;
                self.assign(var, &path, value, span)?;
            }
            StmtType::AssignOp(target, op, value) => {
                let (var, path) = self.selectors(target)?;
                let current = self.read_place(var, &path, span)?;
                let value = self.compile_expr(value)?;
                let result = ops::binary(self, current, *op, value);
                let result = self.lift(result, span)?;
                self.assign(var, &path, result, span)?;
            }
            StmtType::MultiAssign(names, value) => {
                let items = match self.compile_expr(value)? {
                    Resource::Array(items) if items.len() == names.len() => items,
                    Resource::Array(items) => {
                        return Err(CompilerError::DestructureMismatch {
                            expected: names.len(),
                            found: items.len(),
                            area: self.make_area(value.span),
                        })
                    }
                    other => {
                        return Err(CompilerError::TypeMismatch {
                            expected: ResourceType::Array,
                            found: other.typ(),
                            area: self.make_area(value.span),
                        })
                    }
                };
                for ((name, _), item) in names.iter().zip(items) {
                    self.assign(*name, &[], item, span)?;
                }
            }
            StmtType::Const(name, value) => {
                let value = self.compile_expr(value)?;
                if !value.is_fully_static() {
                    return Err(CompilerError::NotStatic {
                        what: "A constant",
                        area: self.make_area(span),
                    });
                }
                self.declare(*name, value, span, true)?;
            }
            StmtType::If {
                cond,
                then,
                otherwise,
            } => self.compile_if(cond, then, otherwise.as_ref())?,
            StmtType::While { cond, body } => self.compile_while(cond, body, span)?,
            StmtType::For {
                var,
                var_span,
                iter,
                body,
            } => self.compile_for(*var, *var_span, iter, body)?,
            StmtType::Block(block) => self.compile_block(block, ContextKind::Block)?,
            StmtType::Function(decl) => self.declare_function(decl)?,
            StmtType::Struct(decl) => self.declare_struct(decl, span)?,
            StmtType::Return(value) => self.compile_return(value.as_ref(), span)?,
        }
        Ok(())
    }

    /// Compiles the whole program into `main`, plus the generated `init`
    /// that sets up the objective and the constant cells.
    pub fn compile_program(mut self, program: &Program) -> CompileResult<IrProgram> {
        self.in_function("main".into(), program.span, |c| {
            c.compile_stmts(&program.stmts)
        })?;

        let mut init = vec![IrNode::new(IrKind::Raw(format!(
            "scoreboard objectives add {} dummy",
            self.config.objective
        )))];
        for value in self.constants.iter() {
            init.push(IrNode::new(IrKind::SetScore {
                cell: constant_cell(*value),
                value: *value,
            }));
        }
        if let Some(function) = self.user_init.take() {
            init.push(IrNode::new(IrKind::Call { function }));
        }
        self.ir.finish_function("init", init, None);

        debug!(
            constants = self.constants.len(),
            temporaries = self.temp_counter,
            "compilation finished"
        );
        Ok(self.ir.into_program())
    }
}

#[cfg(test)]
mod tests;
