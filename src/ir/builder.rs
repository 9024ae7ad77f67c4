use tracing::trace;

use crate::source::CodeSpan;

use super::{FunctionNode, IrNode, IrProgram};

/// Collects emitted instructions. Nodes are appended to the innermost open
/// buffer; a finished buffer becomes a function or the children of a block.
#[derive(Debug, Default)]
pub struct IrBuilder {
    functions: Vec<FunctionNode>,
    buffers: Vec<Vec<IrNode>>,
    next_index: u32,
    hidden: Vec<Vec<IrNode>>,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, node: IrNode) {
        match self.buffers.last_mut() {
            Some(top) => top.push(node),
            None => self.buffers.push(vec![node]),
        }
    }

    pub fn append_all(&mut self, nodes: impl IntoIterator<Item = IrNode>) {
        for node in nodes {
            self.append(node)
        }
    }

    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    pub fn push_buffer(&mut self) {
        self.buffers.push(vec![]);
    }

    pub fn pop_buffer(&mut self) -> Vec<IrNode> {
        self.buffers.pop().unwrap_or_default()
    }

    /// Hides the innermost buffer so appends land in the one below it, until
    /// `show_top` puts it back.
    pub fn hide_top(&mut self) {
        let top = self.pop_buffer();
        self.hidden.push(top);
    }

    pub fn show_top(&mut self) {
        if let Some(top) = self.hidden.pop() {
            self.buffers.push(top);
        }
    }

    /// Appends to the buffer that was innermost while `depth` buffers were
    /// open.
    pub fn append_at(&mut self, depth: usize, nodes: Vec<IrNode>) {
        match depth.checked_sub(1).and_then(|i| self.buffers.get_mut(i)) {
            Some(buffer) => buffer.extend(nodes),
            None => self.append_all(nodes),
        }
    }

    /// Stores `children` as the function `name`, numbering every node in
    /// pre-order.
    pub fn finish_function(
        &mut self,
        name: impl Into<String>,
        mut children: Vec<IrNode>,
        location: Option<CodeSpan>,
    ) {
        let mut func = FunctionNode::new(name);
        func.meta.location = location;
        func.meta.index = Some(self.next_index);
        self.next_index += 1;

        for child in &mut children {
            child.visit_mut(&mut |n| {
                n.meta.index = Some(self.next_index);
                self.next_index += 1;
            });
        }
        func.children = children;

        trace!(name = %func.name, nodes = func.children.len(), "function finished");
        self.functions.push(func);
    }

    pub fn into_program(self) -> IrProgram {
        IrProgram {
            functions: self.functions,
            next_index: self.next_index,
        }
    }
}
