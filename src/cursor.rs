//! Ordered traversal.
//!
//! Both the borrowing iterators and the detached [`Cursor`] walk leaves in
//! ascending key order by following parent links up to the first branch
//! entered through its zero child, then dropping to the leftmost leaf of
//! that branch's one child. No stack, no recursion.

use std::borrow::Borrow;
use std::iter::FusedIterator;

use tracing::debug;

use crate::node::NodeId;
use crate::{KeyAnalyzer, PatriciaTrie, TrieError};

/// Double-ended iterator over a contiguous run of leaves, `front` through
/// `back` inclusive.
pub struct Iter<'a, K, V, A> {
    trie: &'a PatriciaTrie<K, V, A>,
    front: Option<NodeId>,
    back: Option<NodeId>,
}

impl<'a, K, V, A> Iter<'a, K, V, A> {
    /// Both ends must be `None`, or both `Some` with `front` not after `back`.
    pub(crate) fn between(
        trie: &'a PatriciaTrie<K, V, A>,
        front: Option<NodeId>,
        back: Option<NodeId>,
    ) -> Self {
        debug_assert_eq!(front.is_some(), back.is_some());
        Self { trie, front, back }
    }

    fn take(&mut self, side: usize) -> Option<(&'a K, &'a V)> {
        let trie = self.trie;
        let id = if side == 1 { self.front? } else { self.back? };
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else if side == 1 {
            self.front = trie.nodes.step(id, 1);
        } else {
            self.back = trie.nodes.step(id, 0);
        }
        let leaf = trie.nodes.leaf(id);
        Some((&leaf.key, &leaf.value))
    }
}

impl<'a, K, V, A> Iterator for Iter<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.take(1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.front.is_none() {
            (0, Some(0))
        } else {
            (1, Some(self.trie.count))
        }
    }
}

impl<K, V, A> DoubleEndedIterator for Iter<'_, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.take(0)
    }
}

impl<K, V, A> FusedIterator for Iter<'_, K, V, A> {}

impl<K, V, A> Clone for Iter<'_, K, V, A> {
    fn clone(&self) -> Self {
        Self {
            trie: self.trie,
            front: self.front,
            back: self.back,
        }
    }
}

pub struct Keys<'a, K, V, A> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K, V, A> Iterator for Keys<'a, K, V, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A> DoubleEndedIterator for Keys<'_, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V, A> FusedIterator for Keys<'_, K, V, A> {}

pub struct Values<'a, K, V, A> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K, V, A> Iterator for Values<'a, K, V, A> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A> DoubleEndedIterator for Values<'_, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V, A> FusedIterator for Values<'_, K, V, A> {}

impl<'a, K, V, A> Iter<'a, K, V, A> {
    pub(crate) fn keys(self) -> Keys<'a, K, V, A> {
        Keys { inner: self }
    }

    pub(crate) fn values(self) -> Values<'a, K, V, A> {
        Values { inner: self }
    }
}

/// Ascending cursor that holds no borrow of its trie.
///
/// The cursor remembers the trie's modification count. Any structural change
/// made other than through [`Cursor::remove`] makes the next call fail with
/// [`TrieError::ConcurrentModification`] instead of walking stale links.
/// Handing it any other trie, a clone included, fails with
/// [`TrieError::ForeignCursor`].
#[derive(Debug, Clone)]
pub struct Cursor {
    next: Option<NodeId>,
    /// First leaf past the end of the window, `None` for the trie's end.
    fence: Option<NodeId>,
    current: Option<NodeId>,
    trie: u64,
    expected: u64,
}

impl Cursor {
    pub(crate) fn new<K, V, A>(
        trie: &PatriciaTrie<K, V, A>,
        next: Option<NodeId>,
        fence: Option<NodeId>,
    ) -> Self {
        Self {
            next,
            fence,
            current: None,
            trie: trie.id,
            expected: trie.mod_count,
        }
    }

    fn check<K, V, A>(&self, trie: &PatriciaTrie<K, V, A>) -> Result<(), TrieError> {
        if trie.id != self.trie {
            debug!(owner = self.trie, given = trie.id, "cursor used with a foreign trie");
            return Err(TrieError::ForeignCursor);
        }
        if trie.mod_count == self.expected {
            return Ok(());
        }
        debug!(
            expected = self.expected,
            actual = trie.mod_count,
            "cursor invalidated by concurrent modification"
        );
        Err(TrieError::ConcurrentModification {
            expected: self.expected,
            actual: trie.mod_count,
        })
    }

    /// Advance and return the next entry, or `Ok(None)` at the end.
    #[allow(clippy::should_implement_trait)]
    pub fn next<'a, K, V, A>(
        &mut self,
        trie: &'a PatriciaTrie<K, V, A>,
    ) -> Result<Option<(&'a K, &'a V)>, TrieError> {
        self.check(trie)?;
        let Some(id) = self.next.filter(|&id| Some(id) != self.fence) else {
            self.next = None;
            self.current = None;
            return Ok(None);
        };
        self.next = trie.nodes.step(id, 1);
        self.current = Some(id);
        let leaf = trie.nodes.leaf(id);
        Ok(Some((&leaf.key, &leaf.value)))
    }

    /// Whether the trie has changed since this cursor last synchronized,
    /// or is not the trie that created it.
    pub fn is_stale<K, V, A>(&self, trie: &PatriciaTrie<K, V, A>) -> bool {
        trie.id != self.trie || trie.mod_count != self.expected
    }

    /// Remove the entry most recently returned by [`next`](Self::next).
    ///
    /// The cursor stays valid and continues with the following entry.
    pub fn remove<K, V, A>(&mut self, trie: &mut PatriciaTrie<K, V, A>) -> Result<(K, V), TrieError>
    where
        A: KeyAnalyzer,
        K: Borrow<A::Key>,
    {
        self.check(trie)?;
        let id = self.current.take().ok_or(TrieError::CursorNotPositioned)?;
        let entry = trie.remove_leaf(id);
        self.expected = trie.mod_count;
        Ok(entry)
    }
}

impl<K, V, A: KeyAnalyzer> PatriciaTrie<K, V, A> {
    /// Entries in ascending key order. Use `.rev()` for descending order.
    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter::between(self, self.first_leaf(), self.last_leaf())
    }

    pub fn keys(&self) -> Keys<'_, K, V, A> {
        self.iter().keys()
    }

    pub fn values(&self) -> Values<'_, K, V, A> {
        self.iter().values()
    }

    /// Detached cursor over the whole trie.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self, self.first_leaf(), None)
    }
}

impl<'a, K, V, A: KeyAnalyzer> IntoIterator for &'a PatriciaTrie<K, V, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
