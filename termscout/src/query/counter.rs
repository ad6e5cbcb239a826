use std::collections::HashMap;

use crate::errors::{ScanError, ScanResult};

/// Counts non-overlapping literal occurrences of `term` in `text`.
///
/// Matching is case-sensitive, byte-exact and scans left to right, so
/// `count_occurrences("aaa", "aa")` is 1. An empty term is rejected.
pub fn count_occurrences(text: &str, term: &str) -> ScanResult<u64> {
    if term.is_empty() {
        return Err(ScanError::invalid_term(term));
    }
    Ok(count_literal(text, term))
}

fn count_literal(text: &str, term: &str) -> u64 {
    text.matches(term).count() as u64
}

/// The text of one file while queries are evaluated against it.
///
/// Query batches tend to repeat the same terms (every query in a matrix shares
/// its fixed axes), so term counts are memoized for the lifetime of the
/// document. The memo borrows term text from the compiled queries.
#[derive(Debug)]
pub struct Document<'t, 'q> {
    text: &'t str,
    memo: HashMap<&'q str, u64>,
    hits: u64,
    misses: u64,
}

impl<'t, 'q> Document<'t, 'q> {
    pub fn new(text: &'t str) -> Self {
        Self {
            text,
            memo: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn text(&self) -> &'t str {
        self.text
    }

    /// Occurrence count of a term already validated as non-empty by the parser
    pub(crate) fn count(&mut self, term: &'q str) -> u64 {
        debug_assert!(!term.is_empty());
        if let Some(&count) = self.memo.get(term) {
            self.hits += 1;
            return count;
        }
        self.misses += 1;
        let count = count_literal(self.text, term);
        self.memo.insert(term, count);
        count
    }

    /// Memo hits and misses so far
    pub fn memo_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
