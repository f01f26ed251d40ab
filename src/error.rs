use thiserror::Error;

/// Errors reported by fallible trie operations.
///
/// A missing key is never an error; lookups return `None` for that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// The key analyzer (or the trie configuration) rejected the key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A key was written through a view that does not cover it.
    #[error("Key is outside the view's bounds")]
    KeyOutOfRange,

    /// A range was requested whose lower bound sorts after its upper bound.
    #[error("Lower bound sorts after upper bound")]
    InvalidRange,

    /// The trie changed structurally after a cursor was positioned.
    #[error("Trie modified during iteration (expected mod count {expected}, found {actual})")]
    ConcurrentModification {
        /// Modification count captured by the cursor.
        expected: u64,
        /// Modification count of the trie at the time of the check.
        actual: u64,
    },

    /// `Cursor::remove` was called before `next` returned an entry, or twice
    /// for the same entry.
    #[error("Cursor has no current entry")]
    CursorNotPositioned,

    /// A cursor was used with a trie other than the one that created it.
    #[error("Cursor belongs to a different trie")]
    ForeignCursor,
}
