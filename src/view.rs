//! Range and prefix windows over a live trie.
//!
//! A view stores only its bounds. Every read resolves them against the trie
//! as it is at that moment, so views never copy entries.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::ops::{Bound, RangeBounds};

use tracing::trace;

use crate::cursor::{Iter, Keys, Values};
use crate::node::NodeId;
use crate::{Cursor, KeyAnalyzer, PatriciaTrie, TrieError};

/// Bounds of a view: an optional prefix intersected with a key range.
pub(crate) struct Window<'a, Q: ?Sized> {
    prefix: Option<&'a Q>,
    lo: Bound<&'a Q>,
    hi: Bound<&'a Q>,
}

impl<Q: ?Sized> Clone for Window<'_, Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q: ?Sized> Copy for Window<'_, Q> {}

impl<'a, Q: ?Sized> Window<'a, Q> {
    fn bounded(lo: Bound<&'a Q>, hi: Bound<&'a Q>) -> Self {
        Window {
            prefix: None,
            lo,
            hi,
        }
    }

    fn prefix(prefix: &'a Q) -> Self {
        Window {
            prefix: Some(prefix),
            lo: Bound::Unbounded,
            hi: Bound::Unbounded,
        }
    }

    fn range<A: KeyAnalyzer<Key = Q>>(
        analyzer: &A,
        lo: Bound<&'a Q>,
        hi: Bound<&'a Q>,
    ) -> Result<Self, TrieError> {
        check_order(analyzer, lo, hi)?;
        Ok(Self::bounded(lo, hi))
    }

    /// Intersect with `lo..hi`. The result may be empty but is never wider.
    fn narrow<A: KeyAnalyzer<Key = Q>>(
        self,
        analyzer: &A,
        lo: Bound<&'a Q>,
        hi: Bound<&'a Q>,
    ) -> Self {
        Window {
            prefix: self.prefix,
            lo: tighter(analyzer, self.lo, lo, Ordering::Greater),
            hi: tighter(analyzer, self.hi, hi, Ordering::Less),
        }
    }

    fn contains<A: KeyAnalyzer<Key = Q>>(&self, analyzer: &A, key: &Q) -> bool {
        if let Some(prefix) = self.prefix {
            if !analyzer.is_prefix(key, prefix) {
                return false;
            }
        }
        let above = match self.lo {
            Bound::Unbounded => true,
            Bound::Included(lo) => analyzer.compare(key, lo) != Ordering::Less,
            Bound::Excluded(lo) => analyzer.compare(key, lo) == Ordering::Greater,
        };
        let below = match self.hi {
            Bound::Unbounded => true,
            Bound::Included(hi) => analyzer.compare(key, hi) != Ordering::Greater,
            Bound::Excluded(hi) => analyzer.compare(key, hi) == Ordering::Less,
        };
        above && below
    }

    /// First and last leaves inside the window, or `None` if it is empty.
    fn ends<K, V, A>(&self, trie: &PatriciaTrie<K, V, A>) -> Option<(NodeId, NodeId)>
    where
        A: KeyAnalyzer<Key = Q>,
        K: Borrow<Q>,
    {
        let order = |a: NodeId, b: NodeId| {
            let (x, _) = trie.entry(a);
            let (y, _) = trie.entry(b);
            trie.analyzer.compare(x.borrow(), y.borrow())
        };
        let (mut front, mut back) = match self.prefix {
            Some(prefix) => {
                let top = trie.prefix_root(prefix)?;
                (trie.nodes.extreme(top, 0), trie.nodes.extreme(top, 1))
            }
            None => (trie.first_leaf()?, trie.last_leaf()?),
        };
        let lo = match self.lo {
            Bound::Unbounded => None,
            Bound::Included(key) => Some(trie.bound_leaf(key, true, 1)?),
            Bound::Excluded(key) => Some(trie.bound_leaf(key, false, 1)?),
        };
        if let Some(lo) = lo {
            if order(lo, front) == Ordering::Greater {
                front = lo;
            }
        }
        let hi = match self.hi {
            Bound::Unbounded => None,
            Bound::Included(key) => Some(trie.bound_leaf(key, true, 0)?),
            Bound::Excluded(key) => Some(trie.bound_leaf(key, false, 0)?),
        };
        if let Some(hi) = hi {
            if order(hi, back) == Ordering::Less {
                back = hi;
            }
        }
        // No stored key satisfies every bound: the two ends cross.
        (order(front, back) != Ordering::Greater).then_some((front, back))
    }
}

fn check_order<A: KeyAnalyzer + ?Sized>(
    analyzer: &A,
    lo: Bound<&A::Key>,
    hi: Bound<&A::Key>,
) -> Result<(), TrieError> {
    if let (Bound::Included(l) | Bound::Excluded(l), Bound::Included(h) | Bound::Excluded(h)) =
        (lo, hi)
    {
        if analyzer.compare(l, h) == Ordering::Greater {
            return Err(TrieError::InvalidRange);
        }
    }
    Ok(())
}

/// The stricter of two bounds on the same side. `wins` is the ordering the
/// stricter key has against the other: `Greater` for lower bounds, `Less` for
/// upper ones. On equal keys the exclusive bound is stricter.
fn tighter<'a, A: KeyAnalyzer + ?Sized>(
    analyzer: &A,
    a: Bound<&'a A::Key>,
    b: Bound<&'a A::Key>,
    wins: Ordering,
) -> Bound<&'a A::Key> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match analyzer.compare(x, y) {
                Ordering::Equal if matches!(a, Bound::Included(_)) => b,
                Ordering::Equal => a,
                ord if ord == wins => a,
                _ => b,
            }
        }
    }
}

/// Read-only window over a trie.
pub struct View<'a, K, V, A: KeyAnalyzer> {
    trie: &'a PatriciaTrie<K, V, A>,
    window: Window<'a, A::Key>,
}

impl<K, V, A: KeyAnalyzer> Clone for View<'_, K, V, A> {
    fn clone(&self) -> Self {
        Self {
            trie: self.trie,
            window: self.window,
        }
    }
}

impl<'a, K, V, A> View<'a, K, V, A>
where
    A: KeyAnalyzer,
    K: Borrow<A::Key>,
{
    /// Whether `key` falls inside the window, stored or not.
    pub fn covers(&self, key: &A::Key) -> bool {
        self.window.contains(&self.trie.analyzer, key)
    }

    pub fn get(&self, key: &A::Key) -> Option<&'a V> {
        if !self.covers(key) {
            return None;
        }
        self.trie.get(key)
    }

    pub fn contains_key(&self, key: &A::Key) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> Iter<'a, K, V, A> {
        let (front, back) = self.window.ends(self.trie).unzip();
        Iter::between(self.trie, front, back)
    }

    pub fn keys(&self) -> Keys<'a, K, V, A> {
        self.iter().keys()
    }

    pub fn values(&self) -> Values<'a, K, V, A> {
        self.iter().values()
    }

    /// Number of entries in the window. Walks the window.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.window.ends(self.trie).is_none()
    }

    pub fn first_key_value(&self) -> Option<(&'a K, &'a V)> {
        let (front, _) = self.window.ends(self.trie)?;
        Some(self.trie.entry(front))
    }

    pub fn last_key_value(&self) -> Option<(&'a K, &'a V)> {
        let (_, back) = self.window.ends(self.trie)?;
        Some(self.trie.entry(back))
    }

    /// Detached, fail-fast cursor over the window.
    pub fn cursor(&self) -> Cursor {
        match self.window.ends(self.trie) {
            Some((front, back)) => {
                Cursor::new(self.trie, Some(front), self.trie.nodes.step(back, 1))
            }
            None => Cursor::new(self.trie, None, None),
        }
    }

    fn narrowed(&self, lo: Bound<&'a A::Key>, hi: Bound<&'a A::Key>) -> View<'a, K, V, A> {
        View {
            trie: self.trie,
            window: self.window.narrow(&self.trie.analyzer, lo, hi),
        }
    }

    /// The part of this view below `key`, or up to and including it when
    /// `inclusive`.
    pub fn head_view(&self, key: &'a A::Key, inclusive: bool) -> View<'a, K, V, A> {
        self.narrowed(Bound::Unbounded, inclusive_bound(key, inclusive))
    }

    /// The part of this view from `key` upward.
    pub fn tail_view(&self, key: &'a A::Key, inclusive: bool) -> View<'a, K, V, A> {
        self.narrowed(inclusive_bound(key, inclusive), Bound::Unbounded)
    }

    /// The part of this view between `lo` and `hi`. Bounds reaching past the
    /// view are clipped to it.
    ///
    /// Fails with [`TrieError::InvalidRange`] when `lo` sorts after `hi`.
    pub fn sub_view(
        &self,
        lo: &'a A::Key,
        lo_inclusive: bool,
        hi: &'a A::Key,
        hi_inclusive: bool,
    ) -> Result<View<'a, K, V, A>, TrieError> {
        let (lo, hi) = (
            inclusive_bound(lo, lo_inclusive),
            inclusive_bound(hi, hi_inclusive),
        );
        check_order(&self.trie.analyzer, lo, hi)?;
        Ok(self.narrowed(lo, hi))
    }
}

impl<'a, K, V, A> IntoIterator for &View<'a, K, V, A>
where
    A: KeyAnalyzer,
    K: Borrow<A::Key>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Window over a trie that also accepts writes inside its bounds.
pub struct ViewMut<'a, K, V, A: KeyAnalyzer> {
    trie: &'a mut PatriciaTrie<K, V, A>,
    window: Window<'a, A::Key>,
}

impl<K, V, A> ViewMut<'_, K, V, A>
where
    A: KeyAnalyzer,
    K: Borrow<A::Key>,
{
    /// Read-only view of the same window.
    pub fn as_view(&self) -> View<'_, K, V, A> {
        View {
            trie: self.trie,
            window: self.window,
        }
    }

    fn narrowed<'b>(
        &'b mut self,
        lo: Bound<&'b A::Key>,
        hi: Bound<&'b A::Key>,
    ) -> ViewMut<'b, K, V, A> {
        let window = self.window.narrow(&self.trie.analyzer, lo, hi);
        ViewMut {
            trie: &mut *self.trie,
            window,
        }
    }

    /// Writable part of this view below `key`. Borrows this view until dropped.
    pub fn head_view_mut<'b>(
        &'b mut self,
        key: &'b A::Key,
        inclusive: bool,
    ) -> ViewMut<'b, K, V, A> {
        self.narrowed(Bound::Unbounded, inclusive_bound(key, inclusive))
    }

    pub fn tail_view_mut<'b>(
        &'b mut self,
        key: &'b A::Key,
        inclusive: bool,
    ) -> ViewMut<'b, K, V, A> {
        self.narrowed(inclusive_bound(key, inclusive), Bound::Unbounded)
    }

    pub fn sub_view_mut<'b>(
        &'b mut self,
        lo: &'b A::Key,
        lo_inclusive: bool,
        hi: &'b A::Key,
        hi_inclusive: bool,
    ) -> Result<ViewMut<'b, K, V, A>, TrieError> {
        let (lo, hi) = (
            inclusive_bound(lo, lo_inclusive),
            inclusive_bound(hi, hi_inclusive),
        );
        check_order(&self.trie.analyzer, lo, hi)?;
        Ok(self.narrowed(lo, hi))
    }

    pub fn covers(&self, key: &A::Key) -> bool {
        self.window.contains(&self.trie.analyzer, key)
    }

    pub fn get(&self, key: &A::Key) -> Option<&V> {
        if !self.covers(key) {
            return None;
        }
        self.trie.get(key)
    }

    pub fn get_mut(&mut self, key: &A::Key) -> Option<&mut V> {
        if !self.covers(key) {
            return None;
        }
        self.trie.get_mut(key)
    }

    pub fn contains_key(&self, key: &A::Key) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> Iter<'_, K, V, A> {
        let (front, back) = self.window.ends(self.trie).unzip();
        Iter::between(self.trie, front, back)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.window.ends(self.trie).is_none()
    }

    /// Insert inside the window. Keys outside it are rejected with
    /// [`TrieError::KeyOutOfRange`] and the trie is left untouched.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, TrieError> {
        if !self.covers(key.borrow()) {
            return Err(TrieError::KeyOutOfRange);
        }
        self.trie.try_insert(key, value)
    }

    /// Remove a key inside the window. Keys outside it are left alone.
    pub fn remove(&mut self, key: &A::Key) -> Option<V> {
        if !self.covers(key) {
            return None;
        }
        self.trie.remove(key)
    }

    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let (front, _) = self.window.ends(self.trie)?;
        Some(self.trie.remove_leaf(front))
    }

    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let (_, back) = self.window.ends(self.trie)?;
        Some(self.trie.remove_leaf(back))
    }

    /// Remove every entry inside the window. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let Some((front, back)) = self.window.ends(self.trie) else {
            return 0;
        };
        // Leaf ids survive the removal of other leaves, so the successor can
        // be taken before each unlink.
        let mut removed = 0;
        let mut next = Some(front);
        while let Some(id) = next {
            next = if id == back {
                None
            } else {
                self.trie.nodes.step(id, 1)
            };
            self.trie.remove_leaf(id);
            removed += 1;
        }
        trace!(removed, "cleared view");
        removed
    }
}

impl<K, V, A> PatriciaTrie<K, V, A>
where
    A: KeyAnalyzer,
    K: Borrow<A::Key>,
{
    fn view<'a>(&'a self, window: Window<'a, A::Key>) -> View<'a, K, V, A> {
        View { trie: self, window }
    }

    fn view_mut<'a>(&'a mut self, window: Window<'a, A::Key>) -> ViewMut<'a, K, V, A> {
        ViewMut { trie: self, window }
    }

    /// Keys strictly below `key`, or up to and including it when `inclusive`.
    pub fn head_view<'a>(&'a self, key: &'a A::Key, inclusive: bool) -> View<'a, K, V, A> {
        self.view(Window::bounded(Bound::Unbounded, inclusive_bound(key, inclusive)))
    }

    /// Keys from `key` upward; `key` itself only when `inclusive`.
    pub fn tail_view<'a>(&'a self, key: &'a A::Key, inclusive: bool) -> View<'a, K, V, A> {
        self.view(Window::bounded(inclusive_bound(key, inclusive), Bound::Unbounded))
    }

    /// Keys between `lo` and `hi`, each end independently inclusive.
    ///
    /// Fails with [`TrieError::InvalidRange`] when `lo` sorts after `hi`.
    pub fn sub_view<'a>(
        &'a self,
        lo: &'a A::Key,
        lo_inclusive: bool,
        hi: &'a A::Key,
        hi_inclusive: bool,
    ) -> Result<View<'a, K, V, A>, TrieError> {
        let window = Window::range(
            &self.analyzer,
            inclusive_bound(lo, lo_inclusive),
            inclusive_bound(hi, hi_inclusive),
        )?;
        Ok(self.view(window))
    }

    /// Keys that start with `prefix`. The empty prefix covers every key.
    pub fn prefix_view<'a>(&'a self, prefix: &'a A::Key) -> View<'a, K, V, A> {
        self.view(Window::prefix(prefix))
    }

    pub fn head_view_mut<'a>(&'a mut self, key: &'a A::Key, inclusive: bool) -> ViewMut<'a, K, V, A> {
        self.view_mut(Window::bounded(Bound::Unbounded, inclusive_bound(key, inclusive)))
    }

    pub fn tail_view_mut<'a>(&'a mut self, key: &'a A::Key, inclusive: bool) -> ViewMut<'a, K, V, A> {
        self.view_mut(Window::bounded(inclusive_bound(key, inclusive), Bound::Unbounded))
    }

    pub fn sub_view_mut<'a>(
        &'a mut self,
        lo: &'a A::Key,
        lo_inclusive: bool,
        hi: &'a A::Key,
        hi_inclusive: bool,
    ) -> Result<ViewMut<'a, K, V, A>, TrieError> {
        let window = Window::range(
            &self.analyzer,
            inclusive_bound(lo, lo_inclusive),
            inclusive_bound(hi, hi_inclusive),
        )?;
        Ok(self.view_mut(window))
    }

    pub fn prefix_view_mut<'a>(&'a mut self, prefix: &'a A::Key) -> ViewMut<'a, K, V, A> {
        self.view_mut(Window::prefix(prefix))
    }

    /// Entries whose keys fall in `range`, e.g.
    /// `(Bound::Included("a"), Bound::Excluded("c"))`.
    pub fn range<R>(&self, range: R) -> Result<Iter<'_, K, V, A>, TrieError>
    where
        R: RangeBounds<A::Key>,
    {
        let window = Window::range(&self.analyzer, range.start_bound(), range.end_bound())?;
        let (front, back) = window.ends(self).unzip();
        Ok(Iter::between(self, front, back))
    }
}

fn inclusive_bound<Q: ?Sized>(key: &Q, inclusive: bool) -> Bound<&Q> {
    if inclusive {
        Bound::Included(key)
    } else {
        Bound::Excluded(key)
    }
}
