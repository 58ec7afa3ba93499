use fxhash::FxHashMap;

use crate::resident::ResidentTable;

/// Token → integer index used by the index-encoded batch variant.
///
/// Indices start at 1; 0 is reserved for padding and unknown tokens.
#[derive(Debug, Clone, Default)]
pub struct VocabularyIndex {
    index: FxHashMap<String, u32>,
}

impl VocabularyIndex {
    /// Assign indices in iteration order. Repeated tokens keep their first
    /// index.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = FxHashMap::default();
        let mut next = 1u32;
        for token in tokens {
            index.entry(token.into()).or_insert_with(|| {
                let assigned = next;
                next += 1;
                assigned
            });
        }
        Self { index }
    }

    /// Index every token of `table` in sorted order so the assignment is
    /// stable across runs.
    pub fn from_table(table: &ResidentTable) -> Self {
        let mut tokens: Vec<&str> = table.tokens().collect();
        tokens.sort_unstable();
        Self::from_tokens(tokens)
    }

    /// Index of `token`, or 0 when it is unknown.
    pub fn index_of(&self, token: &str) -> u32 {
        self.index.get(token).copied().unwrap_or(0)
    }

    pub fn get(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_start_at_one() {
        let vocab = VocabularyIndex::from_tokens(["senat", "vote", "senat", "bill"]);
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.index_of("senat"), 1);
        assert_eq!(vocab.index_of("vote"), 2);
        assert_eq!(vocab.index_of("bill"), 3);
        assert_eq!(vocab.index_of("absent"), 0);
    }

    #[test]
    fn table_order_is_sorted() {
        let table = ResidentTable::from_entries(
            1,
            [("zeta", vec![0.0]), ("alpha", vec![0.0]), ("mid", vec![0.0])],
        )
        .unwrap();
        let vocab = VocabularyIndex::from_table(&table);
        assert_eq!(vocab.get("alpha"), Some(1));
        assert_eq!(vocab.get("mid"), Some(2));
        assert_eq!(vocab.get("zeta"), Some(3));
    }
}
