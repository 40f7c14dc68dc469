// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use memstat_shm::ContextCounters;

/// Dense index of a node within one process's allocator tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Convert from a usize offset into an id.
    /// # Panics
    /// Panics if the offset cannot fit in the underlying integer type. This
    /// is expected to be ultra-rare (more than u32::MAX allocator contexts
    /// in one process?!).
    pub fn from_offset(offset: usize) -> Self {
        NodeId(u32::try_from(offset).expect("allocator tree exceeds u32 indexes"))
    }

    pub fn to_raw_id(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The boundary to the host's allocator state: a tree of named contexts with
/// parent / first-child / next-sibling links, and usage counters queryable
/// per node on demand.
///
/// Siblings of one parent form a singly linked list. The tree must be
/// acyclic, every non-root node has exactly one parent, and link order must
/// be deterministic within one process for the duration of one walk.
/// Counters reflect only the queried node, never its descendants.
pub trait AllocatorTree {
    fn root(&self) -> Option<NodeId>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn first_child(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn name(&self, node: NodeId) -> &str;
    fn counters(&self, node: NodeId) -> ContextCounters;
}

struct Node {
    name: String,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    last_child: Option<NodeId>,
    counters: ContextCounters,
}

/// Vector-backed [`AllocatorTree`]: every link is an index into one arena of
/// nodes, so walking allocates nothing and a cycle cannot be constructed
/// (children are always freshly pushed nodes).
#[derive(Default)]
pub struct ContextTree {
    nodes: Vec<Node>,
}

impl ContextTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Pushes a fresh node with no child / sibling links and returns its id.
    fn push_node(&mut self, name: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId::from_offset(self.nodes.len());
        self.nodes.push(Node {
            name,
            parent,
            first_child: None,
            next_sibling: None,
            last_child: None,
            counters: ContextCounters::default(),
        });
        id
    }

    /// Creates the root node.
    /// # Panics
    /// Panics if the tree already has a root.
    pub fn add_root(&mut self, name: impl Into<String>) -> NodeId {
        assert!(self.nodes.is_empty(), "tree already has a root");
        self.push_node(name.into(), None)
    }

    /// Appends a child at the tail of `parent`'s sibling list, so siblings
    /// keep creation order and one process's walk is deterministic.
    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.push_node(name.into(), Some(parent));
        match self.nodes[parent.index()].last_child {
            Some(prev) => self.nodes[prev.index()].next_sibling = Some(id),
            None => self.nodes[parent.index()].first_child = Some(id),
        }
        self.nodes[parent.index()].last_child = Some(id);
        id
    }

    pub fn set_counters(&mut self, node: NodeId, counters: ContextCounters) {
        self.nodes[node.index()].counters = counters;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl AllocatorTree for ContextTree {
    fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].first_child
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].next_sibling
    }

    fn name(&self, node: NodeId) -> &str {
        &self.nodes[node.index()].name
    }

    fn counters(&self, node: NodeId) -> ContextCounters {
        self.nodes[node.index()].counters
    }
}
