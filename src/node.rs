//! Node storage for the trie.
//!
//! Nodes live in an index-addressed arena. A branch points down at two
//! children; every node points back at its parent. The parent link is the
//! only upward edge, and it is what lets the cursor walk the tree in order
//! without a stack.

use crate::analyzer::Query;
use crate::KeyAnalyzer;

/// Index of a node slot in a [`NodeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Discriminator tested by a branch.
///
/// Encodes a raw bit index `b` and a test kind in one ordered integer:
/// - `2b`: value test, the one side holds keys with bit `b` set;
/// - `2b + 1`: end test, the one side holds keys longer than `b` bits.
///
/// Both tests at the same bit can appear on one path (value test above),
/// which is how keys such as `"a"` and `"a\0"` stay distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Disc(usize);

impl Disc {
    #[inline]
    pub(crate) fn value(bit: usize) -> Self {
        Self(bit << 1)
    }

    #[inline]
    pub(crate) fn end(bit: usize) -> Self {
        Self((bit << 1) | 1)
    }

    #[inline]
    pub(crate) fn bit(self) -> usize {
        self.0 >> 1
    }

    #[inline]
    pub(crate) fn is_end(self) -> bool {
        self.0 & 1 == 1
    }

    /// Child slot (`0` or `1`) a key with bit length `len` takes at this test.
    #[inline]
    pub(crate) fn side<A: KeyAnalyzer + ?Sized>(self, analyzer: &A, key: &A::Key, len: usize) -> usize {
        let bit = self.bit();
        let one = if self.is_end() {
            len > bit
        } else {
            analyzer.is_bit_set(key, bit, len)
        };
        usize::from(one)
    }

    /// [`side`](Self::side) for a key prepared for a walk.
    #[inline]
    pub(crate) fn route<A: KeyAnalyzer + ?Sized>(self, analyzer: &A, query: &Query<'_, A::Key>) -> usize {
        let bit = self.bit();
        let one = if self.is_end() {
            query.len > bit
        } else {
            query.is_bit_set(analyzer, bit)
        };
        usize::from(one)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Branch {
    pub(crate) disc: Disc,
    pub(crate) children: [NodeId; 2],
    pub(crate) parent: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub(crate) struct Leaf<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) parent: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub(crate) enum Node<K, V> {
    Branch(Branch),
    Leaf(Leaf<K, V>),
}

impl<K, V> Node<K, V> {
    #[inline]
    pub(crate) fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Branch(branch) => branch.parent,
            Node::Leaf(leaf) => leaf.parent,
        }
    }

    #[inline]
    fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Branch(branch) => branch.parent = parent,
            Node::Leaf(leaf) => leaf.parent = parent,
        }
    }
}

/// Slot arena with a free list of vacated slots.
#[derive(Clone)]
pub(crate) struct NodeArena<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
}

impl<K, V> NodeArena<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            // A trie with n leaves has n - 1 branches.
            slots: Vec::with_capacity(capacity.saturating_mul(2)),
            free: Vec::new(),
        }
    }

    pub(crate) fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(node);
            return id;
        }
        let index = u32::try_from(self.slots.len()).expect("node arena exceeds u32::MAX slots");
        self.slots.push(Some(node));
        NodeId(index)
    }

    /// Vacate a slot and hand back its node.
    pub(crate) fn free(&mut self, id: NodeId) -> Node<K, V> {
        let node = self.slots[id.index()]
            .take()
            .expect("freeing a vacant node slot");
        self.free.push(id);
        node
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        // Trailing vacant slots can go; interior ones keep their ids stable.
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let live = self.slots.len();
        self.free.retain(|id| id.index() < live);
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
    }

    /// Number of occupied slots.
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node<K, V> {
        self.slots[id.index()]
            .as_ref()
            .expect("dangling node id")
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.slots[id.index()]
            .as_mut()
            .expect("dangling node id")
    }

    #[inline]
    pub(crate) fn leaf(&self, id: NodeId) -> &Leaf<K, V> {
        match self.node(id) {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => panic!("node {id:?} is a branch, expected a leaf"),
        }
    }

    #[inline]
    pub(crate) fn leaf_mut(&mut self, id: NodeId) -> &mut Leaf<K, V> {
        match self.node_mut(id) {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => panic!("node {id:?} is a branch, expected a leaf"),
        }
    }

    #[inline]
    pub(crate) fn branch_mut(&mut self, id: NodeId) -> &mut Branch {
        match self.node_mut(id) {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => panic!("node {id:?} is a leaf, expected a branch"),
        }
    }

    #[inline]
    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent()
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.node_mut(id).set_parent(parent);
    }

    /// Point whichever child slot of `branch` holds `old` at `new` instead.
    pub(crate) fn replace_child(&mut self, branch: NodeId, old: NodeId, new: NodeId) {
        let branch = self.branch_mut(branch);
        let slot = usize::from(branch.children[1] == old);
        debug_assert_eq!(branch.children[slot], old, "node is not a child of its parent");
        branch.children[slot] = new;
    }

    /// Extreme leaf of the subtree at `id`: leftmost for side `0`,
    /// rightmost for side `1`.
    pub(crate) fn extreme(&self, mut id: NodeId, side: usize) -> NodeId {
        while let Node::Branch(branch) = self.node(id) {
            id = branch.children[side];
        }
        id
    }

    /// In-order neighbour of leaf `id` on `side` (`1` = successor,
    /// `0` = predecessor), following parent links only.
    pub(crate) fn step(&self, mut id: NodeId, side: usize) -> Option<NodeId> {
        while let Some(parent) = self.parent(id) {
            let Node::Branch(branch) = self.node(parent) else {
                unreachable!("parent {parent:?} is a leaf");
            };
            if branch.children[1 - side] == id {
                return Some(self.extreme(branch.children[side], 1 - side));
            }
            id = parent;
        }
        None
    }
}
