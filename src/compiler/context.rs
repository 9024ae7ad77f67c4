use ahash::AHashMap;
use lasso::Spur;

use crate::{
    address::Slot,
    analyzer::scope::{ScopeKey, ScopeKind},
    make_ids,
    source::CodeSpan,
    util::slabmap::SlabMap,
};

use super::resource::{Resource, ResourceType};

make_ids! {
    FrameID: u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Global,
    Function,
    InlineFunction,
    Block,
    Conditional,
    Loop,
}

impl ContextKind {
    /// Code under a non-static frame may run any number of times, so static
    /// values bound outside it cannot change inside it.
    pub fn is_static(self) -> bool {
        self.scope_kind().is_static()
    }

    pub fn scope_kind(self) -> ScopeKind {
        match self {
            ContextKind::Global => ScopeKind::Global,
            ContextKind::Function => ScopeKind::Function,
            ContextKind::InlineFunction => ScopeKind::InlineFunction,
            ContextKind::Block => ScopeKind::Block,
            ContextKind::Conditional => ScopeKind::Conditional,
            ContextKind::Loop => ScopeKind::Loop,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub resource: Resource,
    /// Analyzer scope the variable was declared in.
    pub scope: Option<ScopeKey>,
    pub site: CodeSpan,
    /// Runtime home, for variables that are written under runtime control.
    pub slot: Option<Slot>,
    pub constant: bool,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u32,
    pub kind: ContextKind,
    pub parent: Option<FrameID>,
    pub scope: Option<ScopeKey>,
    pub vars: AHashMap<Spur, Variable>,
    pub return_slot: Option<Slot>,
    pub return_type: Option<ResourceType>,
    pub returned: Option<Resource>,
    /// Open instruction buffers when the frame was pushed.
    pub buffer_depth: usize,
}

impl Frame {
    /// Runtime home of `name` declared in the frame numbered `id`. Distinct
    /// frames never share a slot, even for equal names. Both paths start
    /// with the frame id, so they never meet a temporary or constant.
    pub fn slot_template(id: u32, name: &str) -> Slot {
        Slot::new(format!(".exp{}_{}", id, name), format!("{}_{}", id, name))
    }

    pub fn slot_for(&self, name: &str) -> Slot {
        Self::slot_template(self.id, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    AlreadyBound,
    NotBound,
}

/// Frames currently open during compilation. Parents follow the dynamic
/// chain, so an inlined body sees the caller's bindings.
#[derive(Debug)]
pub struct ContextStack {
    frames: SlabMap<FrameID, Frame>,
    current: FrameID,
    next_id: u32,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStack {
    pub fn new() -> Self {
        let mut frames = SlabMap::new();
        let current = frames.insert(Frame {
            id: 0,
            kind: ContextKind::Global,
            parent: None,
            scope: Some(ScopeKey::GLOBAL),
            vars: AHashMap::new(),
            return_slot: None,
            return_type: None,
            returned: None,
            buffer_depth: 0,
        });
        Self {
            frames,
            current,
            next_id: 1,
        }
    }

    /// A number no other frame or function has used.
    pub fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id - 1
    }

    pub fn push(&mut self, kind: ContextKind, scope: Option<ScopeKey>) -> FrameID {
        let id = self.next_id();
        let frame = self.frames.insert(Frame {
            id,
            kind,
            parent: Some(self.current),
            scope,
            vars: AHashMap::new(),
            return_slot: None,
            return_type: None,
            returned: None,
            buffer_depth: 0,
        });
        self.current = frame;
        frame
    }

    /// Closes the current frame. The global frame is never closed.
    pub fn pop(&mut self) -> Option<Frame> {
        let parent = self.frames[self.current].parent?;
        let frame = self.frames.remove(self.current);
        self.current = parent;
        frame
    }

    pub fn current_id(&self) -> FrameID {
        self.current
    }
    pub fn current(&self) -> &Frame {
        &self.frames[self.current]
    }
    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current]
    }
    pub fn get(&self, id: FrameID) -> Option<&Frame> {
        self.frames.get(id)
    }
    pub fn get_mut(&mut self, id: FrameID) -> Option<&mut Frame> {
        self.frames.get_mut(id)
    }

    fn ancestors(&self) -> impl Iterator<Item = (FrameID, &Frame)> {
        self.frames.chain(self.current, |f| f.parent)
    }

    /// The innermost binding of `name` and the frame holding it.
    pub fn find(&self, name: Spur) -> Option<(FrameID, &Variable)> {
        self.ancestors()
            .find_map(|(id, f)| f.vars.get(&name).map(|v| (id, v)))
    }

    pub fn bind(&mut self, name: Spur, var: Variable) -> Result<(), ContextError> {
        let frame = self.current_mut();
        if frame.vars.contains_key(&name) {
            return Err(ContextError::AlreadyBound);
        }
        frame.vars.insert(name, var);
        Ok(())
    }

    /// Replaces the resource of the innermost binding of `name`.
    pub fn rebind(&mut self, name: Spur, resource: Resource) -> Result<(), ContextError> {
        let (id, _) = self.find(name).ok_or(ContextError::NotBound)?;
        let var = self.frames[id]
            .vars
            .get_mut(&name)
            .ok_or(ContextError::NotBound)?;
        var.resource = resource;
        Ok(())
    }

    /// The first non-static frame met walking up from the current frame,
    /// stopping before `boundary`.
    pub fn first_non_static_ancestor(&self, boundary: FrameID) -> Option<&Frame> {
        self.ancestors()
            .take_while(|(id, _)| *id != boundary)
            .map(|(_, f)| f)
            .find(|f| !f.kind.is_static())
    }

    /// The innermost function frame, inline or not.
    pub fn enclosing_function(&self) -> Option<FrameID> {
        self.ancestors()
            .find(|(_, f)| {
                matches!(
                    f.kind,
                    ContextKind::Function | ContextKind::InlineFunction
                )
            })
            .map(|(id, _)| id)
    }

    /// Whether some frame between the current one and `outer` (exclusive)
    /// is not static.
    pub fn runtime_between(&self, outer: FrameID) -> bool {
        self.first_non_static_ancestor(outer).is_some()
    }
}
