/// Configuration for a [`PatriciaTrie`](crate::PatriciaTrie).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieConfig {
    /// Initial capacity hint for the node arena, in entries.
    pub initial_capacity: usize,
    /// Longest key accepted, in bits as reported by the analyzer.
    /// Longer keys are rejected with [`TrieError::InvalidKey`](crate::TrieError::InvalidKey).
    pub max_key_bits: Option<usize>,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            max_key_bits: None,
        }
    }
}

impl TrieConfig {
    /// Same as the default configuration with a key length limit.
    pub fn with_max_key_bits(max_key_bits: usize) -> Self {
        Self {
            max_key_bits: Some(max_key_bits),
            ..Self::default()
        }
    }
}
