//! The PATRICIA trie itself: lookup, insertion, deletion, ordered
//! neighbours and the bitwise-nearest query.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tracing::trace;

use crate::analyzer::Query;
use crate::node::{Branch, Disc, Leaf, Node, NodeArena, NodeId};
use crate::{BitIndex, CharAnalyzer, KeyAnalyzer, TrieConfig, TrieError};

/// Ordered map stored in a PATRICIA trie.
///
/// Keys are viewed as bit strings through the analyzer `A`. Every operation
/// costs time proportional to the key's bit length, not to the number of
/// stored entries.
///
/// Branch nodes only record which discriminator they test; runs of bits on
/// which no two stored keys disagree are never materialized. Leaves carry the
/// key and value, and every node links back to its parent, which drives the
/// stackless in-order walk used by iterators, cursors and views.
pub struct PatriciaTrie<K, V, A = CharAnalyzer> {
    pub(crate) analyzer: A,
    pub(crate) config: TrieConfig,
    pub(crate) nodes: NodeArena<K, V>,
    pub(crate) root: Option<NodeId>,
    pub(crate) count: usize,
    /// Bumped on every structural change; cursors compare against it.
    pub(crate) mod_count: u64,
    /// Distinguishes this trie from every other one, clones included.
    pub(crate) id: u64,
}

static NEXT_TRIE_ID: AtomicU64 = AtomicU64::new(0);

fn fresh_id() -> u64 {
    NEXT_TRIE_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

impl<K, V, A: KeyAnalyzer + Default> PatriciaTrie<K, V, A> {
    pub fn new() -> Self {
        Self::with_analyzer(A::default())
    }

    pub fn with_config(config: TrieConfig) -> Self {
        Self::with_analyzer_and_config(A::default(), config)
    }
}

impl<K, V, A: KeyAnalyzer> PatriciaTrie<K, V, A> {
    pub fn with_analyzer(analyzer: A) -> Self {
        Self::with_analyzer_and_config(analyzer, TrieConfig::default())
    }

    pub fn with_analyzer_and_config(analyzer: A, config: TrieConfig) -> Self {
        Self {
            nodes: NodeArena::with_capacity(config.initial_capacity),
            analyzer,
            config,
            root: None,
            count: 0,
            mod_count: 0,
            id: fresh_id(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Structural modification counter. Value overwrites leave it unchanged.
    #[inline]
    pub fn mod_count(&self) -> u64 {
        self.mod_count
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.count = 0;
        self.mod_count += 1;
        trace!("cleared trie");
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    pub(crate) fn first_leaf(&self) -> Option<NodeId> {
        self.root.map(|root| self.nodes.extreme(root, 0))
    }

    pub(crate) fn last_leaf(&self) -> Option<NodeId> {
        self.root.map(|root| self.nodes.extreme(root, 1))
    }
}

impl<K, V, A> PatriciaTrie<K, V, A>
where
    A: KeyAnalyzer,
    K: Borrow<A::Key>,
{
    #[inline]
    fn leaf_key(&self, id: NodeId) -> &A::Key {
        self.nodes.leaf(id).key.borrow()
    }

    #[inline]
    pub(crate) fn entry(&self, id: NodeId) -> (&K, &V) {
        let leaf = self.nodes.leaf(id);
        (&leaf.key, &leaf.value)
    }

    fn check_key(&self, key: &A::Key) -> Result<(), TrieError> {
        self.analyzer.validate(key)?;
        if let Some(max) = self.config.max_key_bits {
            let bits = self.analyzer.bit_length(key);
            if bits > max {
                return Err(TrieError::InvalidKey(format!(
                    "key is {bits} bits long, limit is {max}"
                )));
            }
        }
        Ok(())
    }

    /// Leaf reached by following `key`'s own sides from the root.
    ///
    /// This is the only leaf that can hold `key`, and it is also the stored
    /// key nearest to `key` under the XOR metric.
    pub(crate) fn descend(&self, query: &Query<'_, A::Key>) -> Option<NodeId> {
        let mut id = self.root?;
        let mut last: Option<Disc> = None;
        while let Node::Branch(branch) = self.nodes.node(id) {
            debug_assert!(
                last.map_or(true, |last| last < branch.disc),
                "discriminators must increase along a path"
            );
            last = Some(branch.disc);
            id = branch.children[branch.disc.route(&self.analyzer, query)];
        }
        Some(id)
    }

    /// First node on `key`'s path whose subtree lies entirely past `disc`:
    /// a branch testing a later discriminator, or a leaf.
    fn divergence(&self, root: NodeId, query: &Query<'_, A::Key>, disc: Disc) -> NodeId {
        let mut id = root;
        while let Node::Branch(branch) = self.nodes.node(id) {
            if branch.disc >= disc {
                assert!(
                    branch.disc != disc,
                    "analyzer contract violated: keys diverge at an already-split discriminator"
                );
                break;
            }
            id = branch.children[branch.disc.route(&self.analyzer, query)];
        }
        id
    }

    /// Discriminator separating `key` from `other`, or `None` when equal.
    fn disc_between(&self, query: &Query<'_, A::Key>, other: &A::Key) -> Option<Disc> {
        let disc = match self.analyzer.bit_index(query.key, other) {
            BitIndex::Equal => return None,
            BitIndex::Differs(bit) => Disc::value(bit),
            BitIndex::KeyIsPrefix(bit) => {
                let other_len = self.analyzer.bit_length(other);
                if self.analyzer.is_bit_set(other, bit, other_len) {
                    Disc::value(bit)
                } else {
                    Disc::end(bit)
                }
            }
            BitIndex::OtherIsPrefix(bit) => {
                if query.is_bit_set(&self.analyzer, bit) {
                    Disc::value(bit)
                } else {
                    Disc::end(bit)
                }
            }
        };
        Some(disc)
    }

    pub(crate) fn find_leaf(&self, key: &A::Key) -> Option<NodeId> {
        let id = self.descend(&Query::new(&self.analyzer, key))?;
        (self.analyzer.compare(self.leaf_key(id), key) == Ordering::Equal).then_some(id)
    }

    pub fn get(&self, key: &A::Key) -> Option<&V> {
        self.find_leaf(key).map(|id| &self.nodes.leaf(id).value)
    }

    pub fn get_key_value(&self, key: &A::Key) -> Option<(&K, &V)> {
        self.find_leaf(key).map(|id| self.entry(id))
    }

    pub fn get_mut(&mut self, key: &A::Key) -> Option<&mut V> {
        let id = self.find_leaf(key)?;
        Some(&mut self.nodes.leaf_mut(id).value)
    }

    pub fn contains_key(&self, key: &A::Key) -> bool {
        self.find_leaf(key).is_some()
    }

    /// Insert a key-value pair, returning the previous value for the key.
    ///
    /// # Panics
    ///
    /// Panics if the analyzer or the configured key limit rejects the key.
    /// Use [`try_insert`](Self::try_insert) to handle that case.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.try_insert(key, value) {
            Ok(previous) => previous,
            Err(err) => panic!("{err}"),
        }
    }

    /// Insert a key-value pair, returning the previous value for the key.
    ///
    /// A rejected key leaves the trie untouched.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, TrieError> {
        self.check_key(key.borrow())?;

        let Some(root) = self.root else {
            let id = self.nodes.alloc(Node::Leaf(Leaf {
                key,
                value,
                parent: None,
            }));
            self.root = Some(id);
            self.count = 1;
            self.mod_count += 1;
            trace!("inserted first entry");
            return Ok(None);
        };

        let (disc, side, at) = {
            let query = Query::new(&self.analyzer, key.borrow());
            let found = self.descend(&query).expect("non-empty trie has a leaf");
            let found_key = self.leaf_key(found);
            let Some(disc) = self.disc_between(&query, found_key) else {
                let slot = &mut self.nodes.leaf_mut(found).value;
                return Ok(Some(std::mem::replace(slot, value)));
            };

            let side = disc.route(&self.analyzer, &query);
            let found_len = self.analyzer.bit_length(found_key);
            assert_ne!(
                side,
                disc.side(&self.analyzer, found_key, found_len),
                "analyzer contract violated: bit_index disagrees with is_bit_set"
            );
            (disc, side, self.divergence(root, &query, disc))
        };

        // Splice a branch testing `disc` above `at`, the new leaf on `side`.
        let parent = self.nodes.parent(at);
        let leaf = self.nodes.alloc(Node::Leaf(Leaf {
            key,
            value,
            parent: None,
        }));
        let mut children = [at, at];
        children[side] = leaf;
        let branch = self.nodes.alloc(Node::Branch(Branch {
            disc,
            children,
            parent,
        }));
        self.nodes.set_parent(leaf, Some(branch));
        self.nodes.set_parent(at, Some(branch));
        match parent {
            Some(parent) => self.nodes.replace_child(parent, at, branch),
            None => self.root = Some(branch),
        }

        self.count += 1;
        self.mod_count += 1;
        trace!(
            bit = disc.bit(),
            end_test = disc.is_end(),
            side,
            "spliced branch"
        );
        Ok(None)
    }

    pub fn remove(&mut self, key: &A::Key) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    pub fn remove_entry(&mut self, key: &A::Key) -> Option<(K, V)> {
        let id = self.find_leaf(key)?;
        Some(self.remove_leaf(id))
    }

    /// Unlink leaf `id`; its sibling takes the place of their parent branch.
    pub(crate) fn remove_leaf(&mut self, id: NodeId) -> (K, V) {
        let Node::Leaf(leaf) = self.nodes.free(id) else {
            unreachable!("remove_leaf called on a branch");
        };

        match leaf.parent {
            None => self.root = None,
            Some(parent) => {
                let Node::Branch(branch) = self.nodes.free(parent) else {
                    unreachable!("parent of a leaf is a leaf");
                };
                let sibling = branch.children[usize::from(branch.children[0] == id)];
                self.nodes.set_parent(sibling, branch.parent);
                match branch.parent {
                    Some(grandparent) => self.nodes.replace_child(grandparent, parent, sibling),
                    None => self.root = Some(sibling),
                }
                trace!(
                    bit = branch.disc.bit(),
                    end_test = branch.disc.is_end(),
                    "collapsed branch"
                );
            }
        }

        self.count -= 1;
        self.mod_count += 1;
        if self.count == 0 {
            self.nodes.clear();
        }
        (leaf.key, leaf.value)
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.first_leaf().map(|id| self.entry(id))
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.last_leaf().map(|id| self.entry(id))
    }

    pub fn first_key(&self) -> Option<&K> {
        self.first_key_value().map(|(k, _)| k)
    }

    pub fn last_key(&self) -> Option<&K> {
        self.last_key_value().map(|(k, _)| k)
    }

    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let id = self.first_leaf()?;
        Some(self.remove_leaf(id))
    }

    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let id = self.last_leaf()?;
        Some(self.remove_leaf(id))
    }

    /// Leaf nearest to `key` in direction `side` (`1` = upward, `0` =
    /// downward), `key` itself included when `inclusive`.
    pub(crate) fn bound_leaf(&self, key: &A::Key, inclusive: bool, side: usize) -> Option<NodeId> {
        let root = self.root?;
        let query = Query::new(&self.analyzer, key);
        let found = self.descend(&query)?;
        let Some(disc) = self.disc_between(&query, self.leaf_key(found)) else {
            return if inclusive {
                Some(found)
            } else {
                self.nodes.step(found, side)
            };
        };

        // `key` sorts on the same side of every key under `at`.
        let at = self.divergence(root, &query, disc);
        if disc.route(&self.analyzer, &query) == side {
            self.nodes.step(self.nodes.extreme(at, side), side)
        } else {
            Some(self.nodes.extreme(at, 1 - side))
        }
    }

    /// Smallest entry with a key `>= key`.
    pub fn ceiling(&self, key: &A::Key) -> Option<(&K, &V)> {
        self.bound_leaf(key, true, 1).map(|id| self.entry(id))
    }

    /// Smallest entry with a key `> key`.
    pub fn higher(&self, key: &A::Key) -> Option<(&K, &V)> {
        self.bound_leaf(key, false, 1).map(|id| self.entry(id))
    }

    /// Largest entry with a key `<= key`.
    pub fn floor(&self, key: &A::Key) -> Option<(&K, &V)> {
        self.bound_leaf(key, true, 0).map(|id| self.entry(id))
    }

    /// Largest entry with a key `< key`.
    pub fn lower(&self, key: &A::Key) -> Option<(&K, &V)> {
        self.bound_leaf(key, false, 0).map(|id| self.entry(id))
    }

    /// Key following `key` in order. `key` need not be stored.
    pub fn next_key(&self, key: &A::Key) -> Option<&K> {
        self.higher(key).map(|(k, _)| k)
    }

    /// Key preceding `key` in order. `key` need not be stored.
    pub fn previous_key(&self, key: &A::Key) -> Option<&K> {
        self.lower(key).map(|(k, _)| k)
    }

    /// Stored entry whose key is closest to `key` under the XOR metric.
    ///
    /// Distance is compared most significant discriminator first, so the
    /// winner is the key sharing the longest run of leading bits with `key`,
    /// then the closest below that, and so on. Distinct keys never tie. An
    /// exact match is its own nearest key.
    pub fn select(&self, key: &A::Key) -> Option<(&K, &V)> {
        self.descend(&Query::new(&self.analyzer, key))
            .map(|id| self.entry(id))
    }

    pub fn select_key(&self, key: &A::Key) -> Option<&K> {
        self.select(key).map(|(k, _)| k)
    }

    pub fn select_value(&self, key: &A::Key) -> Option<&V> {
        self.select(key).map(|(_, v)| v)
    }

    /// Root of the subtree holding exactly the keys that start with
    /// `prefix`, if any do.
    pub(crate) fn prefix_root(&self, prefix: &A::Key) -> Option<NodeId> {
        let query = Query::new(&self.analyzer, prefix);
        let limit = Disc::value(query.len);
        let mut id = self.root?;
        while let Node::Branch(branch) = self.nodes.node(id) {
            if branch.disc >= limit {
                break;
            }
            id = branch.children[branch.disc.route(&self.analyzer, &query)];
        }
        let leftmost = self.nodes.extreme(id, 0);
        self.analyzer
            .is_prefix(self.leaf_key(leftmost), prefix)
            .then_some(id)
    }
}

impl<K, V, A: KeyAnalyzer + Default> Default for PatriciaTrie<K, V, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone, A: Clone> Clone for PatriciaTrie<K, V, A> {
    fn clone(&self) -> Self {
        Self {
            analyzer: self.analyzer.clone(),
            config: self.config.clone(),
            nodes: self.nodes.clone(),
            root: self.root,
            count: self.count,
            mod_count: self.mod_count,
            id: fresh_id(),
        }
    }
}

impl<K, V, A> fmt::Debug for PatriciaTrie<K, V, A>
where
    A: KeyAnalyzer,
    K: Borrow<A::Key> + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, A> FromIterator<(K, V)> for PatriciaTrie<K, V, A>
where
    A: KeyAnalyzer + Default,
    K: Borrow<A::Key>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut trie = Self::new();
        trie.extend(iter);
        trie
    }
}

impl<K, V, A> Extend<(K, V)> for PatriciaTrie<K, V, A>
where
    A: KeyAnalyzer,
    K: Borrow<A::Key>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
