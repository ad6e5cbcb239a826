/// The term-scoring query language.
///
/// A query combines literal terms with `AND`, `OR`, a binary `NOT` and
/// parentheses, and evaluates to an occurrence score rather than a boolean:
///
/// | expression  | score                                              |
/// |-------------|----------------------------------------------------|
/// | `term`      | non-overlapping literal occurrences of `term`      |
/// | `A AND B`   | `min(A, B)` when every operand is non-zero, else 0 |
/// | `A OR B`    | `max(A, B)`                                        |
/// | `A NOT B`   | `max(A - B, 0)`; exactly two operands              |
/// | `(A)`       | the score of `A`, used as an operand               |
///
/// `NOT` binds tightest, then `AND`, then `OR`. Queries are parsed once into an
/// [`Expr`] tree and cached by their exact text, since the same batch is
/// evaluated against every file of a corpus.
///
/// ```rust,ignore
/// let score = termscout::evaluate("cat cat cat dog dog", "cat AND dog")?;
/// assert_eq!(score, 2);
/// ```
pub mod counter;
pub mod lexer;
pub mod matrix;
pub mod parser;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub use counter::{count_occurrences, Document};
pub use matrix::expand_matrix;
pub use parser::parse;

use crate::errors::ScanResult;

// Entries beyond this are dropped wholesale; a scan batch is far smaller
const QUERY_CACHE_LIMIT: usize = 4096;

static QUERY_CACHE: Lazy<DashMap<String, Arc<Expr>>> = Lazy::new(DashMap::new);

/// A parsed query expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Literal text counted verbatim
    Term(String),
    /// Parenthesized sub-expression
    Group(Box<Expr>),
    /// Saturating difference of two scores
    Not(Box<Expr>, Box<Expr>),
    /// Conjunction scored by its weakest operand
    And(Vec<Expr>),
    /// Alternatives scored by the strongest one
    Or(Vec<Expr>),
}

impl Expr {
    /// Scores this expression against a document
    pub fn score<'q>(&'q self, doc: &mut Document<'_, 'q>) -> u64 {
        match self {
            Expr::Term(text) => doc.count(text),
            Expr::Group(inner) => inner.score(doc),
            Expr::Not(left, right) => left.score(doc).saturating_sub(right.score(doc)),
            Expr::And(terms) => {
                let mut weakest = u64::MAX;
                for term in terms {
                    let score = term.score(doc);
                    if score == 0 {
                        return 0;
                    }
                    weakest = weakest.min(score);
                }
                weakest
            }
            Expr::Or(alternatives) => alternatives
                .iter()
                .map(|alt| alt.score(doc))
                .max()
                .unwrap_or(0),
        }
    }

    /// All literal terms in evaluation order
    pub fn terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Term(text) => out.push(text),
            Expr::Group(inner) => inner.collect_terms(out),
            Expr::Not(left, right) => {
                left.collect_terms(out);
                right.collect_terms(out);
            }
            Expr::And(items) | Expr::Or(items) => {
                items.iter().for_each(|item| item.collect_terms(out));
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }

        match self {
            Expr::Term(text) => f.write_str(text),
            Expr::Group(inner) => write!(f, "({})", inner),
            Expr::Not(left, right) => write!(f, "{} NOT {}", left, right),
            Expr::And(items) => join(f, items, " AND "),
            Expr::Or(items) => join(f, items, " OR "),
        }
    }
}

/// Parses a query, reusing a previously compiled tree for the same text.
///
/// The cache is process-wide and holds at most a few thousand queries; when
/// it fills up it is cleared, so ad-hoc callers cannot grow it without bound.
pub fn compile(query: &str) -> ScanResult<Arc<Expr>> {
    if let Some(entry) = QUERY_CACHE.get(query) {
        return Ok(Arc::clone(entry.value()));
    }
    let expr = Arc::new(parse(query)?);
    if QUERY_CACHE.len() >= QUERY_CACHE_LIMIT {
        debug!("Query cache full, clearing {} entries", QUERY_CACHE.len());
        QUERY_CACHE.clear();
    }
    QUERY_CACHE.insert(query.to_string(), Arc::clone(&expr));
    Ok(expr)
}

/// Evaluates one query against one document's text
pub fn evaluate(text: &str, query: &str) -> ScanResult<u64> {
    let expr = compile(query)?;
    let mut doc = Document::new(text);
    Ok(expr.score(&mut doc))
}

/// A query string together with its parsed tree
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    text: Arc<str>,
    expr: Arc<Expr>,
}

impl CompiledQuery {
    pub fn new(text: &str) -> ScanResult<Self> {
        Ok(Self {
            expr: compile(text)?,
            text: Arc::from(text),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// A query that failed to compile and is left out of the run
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RejectedQuery {
    pub query: String,
    pub reason: String,
}

/// The fixed, ordered batch of queries applied to every file
#[derive(Debug, Clone, Default)]
pub struct QuerySet {
    queries: Vec<CompiledQuery>,
    rejected: Vec<RejectedQuery>,
}

impl QuerySet {
    /// Compiles a batch of queries.
    ///
    /// Duplicates collapse to their first occurrence. Queries that fail to parse
    /// are logged and recorded as rejected, unless `strict` is set, in which
    /// case the first failure is returned.
    pub fn compile<I, S>(queries: I, strict: bool) -> ScanResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = QuerySet::default();
        for query in queries {
            let query = query.as_ref();
            if set.queries.iter().any(|q| q.text() == query)
                || set.rejected.iter().any(|r| r.query == query)
            {
                debug!("Skipping duplicate query: {}", query);
                continue;
            }
            match CompiledQuery::new(query) {
                Ok(compiled) => set.queries.push(compiled),
                Err(e) if strict => return Err(e),
                Err(e) => {
                    warn!("Skipping query: {}", e);
                    set.rejected.push(RejectedQuery {
                        query: query.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!(
            "Compiled {} queries ({} rejected)",
            set.queries.len(),
            set.rejected.len()
        );
        Ok(set)
    }

    pub fn queries(&self) -> &[CompiledQuery] {
        &self.queries
    }

    pub fn rejected(&self) -> &[RejectedQuery] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledQuery> {
        self.queries.iter()
    }
}
