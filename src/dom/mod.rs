//! Arena-backed element tree standing in for the host document.
//!
//! The host application owns and mutates this tree; the engine only observes
//! it through the mutation log and repairs the attributes it is responsible
//! for. Nodes are never freed: a detached node stays addressable (the grid
//! library keeps references across destroy/rebuild cycles) and simply stops
//! counting as attached.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Handle to one node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Child list changed on the target.
    ChildList,
    /// Named attribute written or removed on the target.
    Attribute(String),
    /// `data` property assigned or a change notification dispatched.
    Data,
    /// Synthetic resize notification on the target (or the viewport when
    /// the target is the document root).
    Resize,
}

/// Who caused a mutation. The observer only schedules work for host-origin
/// records; the engine's own writes are flagged so batch processing cannot
/// feed back into itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOrigin {
    Host,
    Engine,
}

#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
    pub origin: MutationOrigin,
}

#[derive(Debug, Default)]
struct Node {
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
    data: Option<Value>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hidden: bool,
    size: (u32, u32),
}

pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    ids: HashMap<String, NodeId>,
    mutations: Vec<MutationRecord>,
    origin: MutationOrigin,
    reflows: u64,
}

impl Document {
    pub fn new() -> Self {
        let body = Node {
            tag: "body".to_string(),
            size: (1200, 800),
            ..Node::default()
        };
        Self {
            nodes: vec![body],
            root: NodeId(0),
            ids: HashMap::new(),
            mutations: Vec::new(),
            origin: MutationOrigin::Host,
            reflows: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Switch the origin tag recorded on subsequent mutations. The engine
    /// brackets its own structural work with `Engine`/`Host`.
    pub fn set_origin(&mut self, origin: MutationOrigin) {
        self.origin = origin;
    }

    pub fn origin(&self) -> MutationOrigin {
        self.origin
    }

    fn record(&mut self, target: NodeId, kind: MutationKind) {
        self.mutations.push(MutationRecord {
            target,
            kind,
            origin: self.origin,
        });
    }

    /// Drain the accumulated mutation log.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }

    // ---- construction / structure ------------------------------------

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: tag.into(),
            ..Node::default()
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|c| *c != child);
            self.record(old, MutationKind::ChildList);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.record(parent, MutationKind::ChildList);
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
            self.record(parent, MutationKind::ChildList);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// True when `ancestor` is on the parent chain of `node` (or is the
    /// node itself).
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.nodes[candidate.0].parent;
        }
        false
    }

    /// Pre-order walk of the subtree rooted at `node`, excluding the node
    /// itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    // ---- attributes / identity ---------------------------------------

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name == "id" {
            let old = self.nodes[node.0].attrs.get("id").cloned();
            if let Some(old) = old {
                if self.ids.get(&old) == Some(&node) {
                    self.ids.remove(&old);
                }
            }
            self.ids.insert(value.clone(), node);
        }
        self.nodes[node.0].attrs.insert(name.to_string(), value);
        self.record(node, MutationKind::Attribute(name.to_string()));
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(old) = self.nodes[node.0].attrs.remove(name) {
            if name == "id" && self.ids.get(&old) == Some(&node) {
                self.ids.remove(&old);
            }
            self.record(node, MutationKind::Attribute(name.to_string()));
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].attrs.get(name).map(String::as_str)
    }

    /// Attached element carrying `id="..."`. Detached nodes are invisible
    /// here, matching host lookup semantics.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let node = *self.ids.get(id)?;
        if self.attached(node) && self.attr(node, "id") == Some(id) {
            Some(node)
        } else {
            None
        }
    }

    // ---- classes ------------------------------------------------------

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            self.nodes[node.0].classes.push(class.to_string());
            self.record(node, MutationKind::Attribute("class".to_string()));
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let before = self.nodes[node.0].classes.len();
        self.nodes[node.0].classes.retain(|c| c != class);
        if self.nodes[node.0].classes.len() != before {
            self.record(node, MutationKind::Attribute("class".to_string()));
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes[node.0].classes.iter().any(|c| c == class)
    }

    /// Attached nodes carrying `class`, in document order.
    pub fn nodes_with_class(&self, class: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.has_class(node, class) {
                out.push(node);
            }
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        out
    }

    /// Nearest ancestor-or-self carrying `class`.
    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.has_class(candidate, class) {
                return Some(candidate);
            }
            current = self.nodes[candidate.0].parent;
        }
        None
    }

    /// True when the node sits inside (or is) a subtree flagged by any of
    /// the marker classes.
    pub fn within_marked_subtree(&self, node: NodeId, markers: &[String]) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if markers.iter().any(|m| self.has_class(candidate, m)) {
                return true;
            }
            current = self.nodes[candidate.0].parent;
        }
        false
    }

    /// True when the subtree rooted at `node` contains (or is) a node
    /// flagged by any of the marker classes.
    pub fn subtree_contains_marker(&self, node: NodeId, markers: &[String]) -> bool {
        if markers.iter().any(|m| self.has_class(node, m)) {
            return true;
        }
        self.descendants(node)
            .into_iter()
            .any(|d| markers.iter().any(|m| self.has_class(d, m)))
    }

    // ---- text / data --------------------------------------------------

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        self.nodes[node.0].text = Some(text.into());
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].text.as_deref()
    }

    pub fn set_data(&mut self, node: NodeId, value: Value) {
        self.nodes[node.0].data = Some(value);
        self.record(node, MutationKind::Data);
    }

    pub fn data(&self, node: NodeId) -> Option<&Value> {
        self.nodes[node.0].data.as_ref()
    }

    /// Dispatch a change notification without altering node state.
    pub fn dispatch_change(&mut self, node: NodeId) {
        self.record(node, MutationKind::Data);
    }

    // ---- visibility / layout -----------------------------------------

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        if self.nodes[node.0].hidden != hidden {
            self.nodes[node.0].hidden = hidden;
            self.record(node, MutationKind::Attribute("style".to_string()));
        }
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.nodes[node.0].hidden
    }

    pub fn set_rendered_size(&mut self, node: NodeId, width: u32, height: u32) {
        self.nodes[node.0].size = (width, height);
    }

    pub fn rendered_size(&self, node: NodeId) -> (u32, u32) {
        self.nodes[node.0].size
    }

    /// Attached to the render tree, not display-suppressed anywhere on the
    /// ancestor chain, and laid out with non-zero width.
    pub fn is_visible(&self, node: NodeId) -> bool {
        if !self.attached(node) || self.nodes[node.0].size.0 == 0 {
            return false;
        }
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.nodes[candidate.0].hidden {
                return false;
            }
            current = self.nodes[candidate.0].parent;
        }
        true
    }

    pub fn dispatch_resize(&mut self, node: NodeId) {
        self.record(node, MutationKind::Resize);
    }

    pub fn resize_viewport(&mut self, width: u32, height: u32) {
        self.nodes[self.root.0].size = (width, height);
        self.record(self.root, MutationKind::Resize);
    }

    /// Toggle a layout-affecting property off and on to force the host to
    /// re-lay out the subtree.
    pub fn force_reflow(&mut self, node: NodeId) {
        self.reflows = self.reflows.saturating_add(1);
        self.record(node, MutationKind::Attribute("style".to_string()));
        self.record(node, MutationKind::Attribute("style".to_string()));
    }

    pub fn reflow_count(&self) -> u64 {
        self.reflows
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
