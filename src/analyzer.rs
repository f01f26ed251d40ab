//! Bit-level access to keys.
//!
//! The trie never looks at a key's concrete representation. Everything it
//! needs (length, single bits, the first differing bit of two keys) goes
//! through a [`KeyAnalyzer`].

use std::cmp::Ordering;

use crate::TrieError;

/// Outcome of comparing two keys bit by bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitIndex {
    /// Same length and same bits.
    Equal,
    /// First bit, below both lengths, on which the keys disagree.
    Differs(usize),
    /// The first key ends at this bit index and the second continues.
    KeyIsPrefix(usize),
    /// The second key ends at this bit index and the first continues.
    OtherIsPrefix(usize),
}

/// Capability set the trie uses to treat keys as bit strings.
///
/// Bit `0` is the most significant bit of the key's first unit. Bits at or
/// beyond a key's length read as unset.
pub trait KeyAnalyzer {
    /// Borrowed key type the analyzer understands.
    type Key: ?Sized;

    /// Number of bits in `key`.
    fn bit_length(&self, key: &Self::Key) -> usize;

    /// Whether bit `bit` of `key` is set. `len` is `bit_length(key)`, passed
    /// in so callers probing many bits compute it once.
    fn is_bit_set(&self, key: &Self::Key, bit: usize, len: usize) -> bool;

    /// Locate the first difference between `key` and `other`.
    fn bit_index(&self, key: &Self::Key, other: &Self::Key) -> BitIndex;

    /// Order consistent with ascending bit order, shorter prefix first.
    fn compare(&self, key: &Self::Key, other: &Self::Key) -> Ordering {
        match self.bit_index(key, other) {
            BitIndex::Equal => Ordering::Equal,
            BitIndex::Differs(bit) => {
                if self.is_bit_set(key, bit, self.bit_length(key)) {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            BitIndex::KeyIsPrefix(_) => Ordering::Less,
            BitIndex::OtherIsPrefix(_) => Ordering::Greater,
        }
    }

    /// Whether `key` starts with `prefix`. The empty key prefixes everything.
    fn is_prefix(&self, key: &Self::Key, prefix: &Self::Key) -> bool {
        matches!(
            self.bit_index(key, prefix),
            BitIndex::Equal | BitIndex::OtherIsPrefix(_)
        )
    }

    /// Reject keys this analyzer cannot interpret.
    fn validate(&self, _key: &Self::Key) -> Result<(), TrieError> {
        Ok(())
    }

    /// Decode `key` once before a walk that tests many of its bits.
    ///
    /// Analyzers whose `is_bit_set` is not constant time return the key's
    /// units here, and the trie tests bits against them instead. The default
    /// keeps probing through `is_bit_set`.
    fn units(&self, _key: &Self::Key) -> Option<Units> {
        None
    }
}

/// A key decoded into fixed-width units, most significant bit first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Units {
    units: Vec<u32>,
    width: usize,
}

impl Units {
    /// # Panics
    ///
    /// Panics unless `width` is between 1 and 32.
    pub fn new(units: Vec<u32>, width: usize) -> Self {
        assert!((1..=32).contains(&width), "unit width must be 1..=32 bits");
        Self { units, width }
    }

    pub fn bit_length(&self) -> usize {
        self.units.len() * self.width
    }

    /// Bit `bit` of the decoded key; bits past the end read unset.
    #[inline]
    pub fn is_bit_set(&self, bit: usize) -> bool {
        self.units
            .get(bit / self.width)
            .is_some_and(|&unit| unit_bit(unit, bit % self.width, self.width))
    }
}

/// A key prepared for the bit tests of one walk.
pub(crate) struct Query<'k, Q: ?Sized> {
    pub(crate) key: &'k Q,
    pub(crate) len: usize,
    units: Option<Units>,
}

impl<'k, Q: ?Sized> Query<'k, Q> {
    pub(crate) fn new<A: KeyAnalyzer<Key = Q> + ?Sized>(analyzer: &A, key: &'k Q) -> Self {
        Self {
            key,
            len: analyzer.bit_length(key),
            units: analyzer.units(key),
        }
    }

    #[inline]
    pub(crate) fn is_bit_set<A: KeyAnalyzer<Key = Q> + ?Sized>(&self, analyzer: &A, bit: usize) -> bool {
        if bit >= self.len {
            return false;
        }
        match &self.units {
            Some(units) => units.is_bit_set(bit),
            None => analyzer.is_bit_set(self.key, bit, self.len),
        }
    }
}

/// Compare two sequences of `width`-bit units.
fn first_difference<I, J>(key: I, other: J, width: usize) -> BitIndex
where
    I: IntoIterator<Item = u32>,
    J: IntoIterator<Item = u32>,
{
    debug_assert!((1..=32).contains(&width));
    let mut key = key.into_iter();
    let mut other = other.into_iter();
    let mut unit = 0usize;
    loop {
        match (key.next(), other.next()) {
            (Some(k), Some(o)) => {
                let diff = k ^ o;
                if diff != 0 {
                    let within = diff.leading_zeros() as usize - (32 - width);
                    return BitIndex::Differs(unit * width + within);
                }
            }
            (None, Some(_)) => return BitIndex::KeyIsPrefix(unit * width),
            (Some(_), None) => return BitIndex::OtherIsPrefix(unit * width),
            (None, None) => return BitIndex::Equal,
        }
        unit += 1;
    }
}

/// Bit `bit_in_unit` (0 = MSB) of a `width`-bit unit.
#[inline]
fn unit_bit(unit: u32, bit_in_unit: usize, width: usize) -> bool {
    (unit >> (width - 1 - bit_in_unit)) & 1 != 0
}

/// Analyzer for `str` keys: each `char` is a 32-bit group holding its
/// Unicode scalar value, most significant bit first.
///
/// The resulting order is the same as `str`'s `Ord`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharAnalyzer;

impl CharAnalyzer {
    /// Width of one character in bits.
    pub const BITS_PER_CHAR: usize = 32;
}

impl KeyAnalyzer for CharAnalyzer {
    type Key = str;

    fn bit_length(&self, key: &str) -> usize {
        key.chars().count() * Self::BITS_PER_CHAR
    }

    /// Decodes up to the tested character. Walks go through
    /// [`units`](KeyAnalyzer::units) instead.
    fn is_bit_set(&self, key: &str, bit: usize, len: usize) -> bool {
        if bit >= len {
            return false;
        }
        key.chars()
            .nth(bit / Self::BITS_PER_CHAR)
            .is_some_and(|c| unit_bit(u32::from(c), bit % Self::BITS_PER_CHAR, Self::BITS_PER_CHAR))
    }

    fn bit_index(&self, key: &str, other: &str) -> BitIndex {
        first_difference(
            key.chars().map(u32::from),
            other.chars().map(u32::from),
            Self::BITS_PER_CHAR,
        )
    }

    fn compare(&self, key: &str, other: &str) -> Ordering {
        key.cmp(other)
    }

    fn is_prefix(&self, key: &str, prefix: &str) -> bool {
        key.starts_with(prefix)
    }

    fn units(&self, key: &str) -> Option<Units> {
        Some(Units::new(key.chars().map(u32::from).collect(), Self::BITS_PER_CHAR))
    }
}

/// Analyzer for byte-string keys, 8 bits per byte, most significant first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteAnalyzer;

impl KeyAnalyzer for ByteAnalyzer {
    type Key = [u8];

    fn bit_length(&self, key: &[u8]) -> usize {
        key.len() * 8
    }

    fn is_bit_set(&self, key: &[u8], bit: usize, len: usize) -> bool {
        if bit >= len {
            return false;
        }
        key.get(bit / 8)
            .is_some_and(|&byte| unit_bit(u32::from(byte), bit % 8, 8))
    }

    fn bit_index(&self, key: &[u8], other: &[u8]) -> BitIndex {
        first_difference(
            key.iter().map(|&b| u32::from(b)),
            other.iter().map(|&b| u32::from(b)),
            8,
        )
    }

    fn compare(&self, key: &[u8], other: &[u8]) -> Ordering {
        key.cmp(other)
    }

    fn is_prefix(&self, key: &[u8], prefix: &[u8]) -> bool {
        key.starts_with(prefix)
    }
}
