use std::fmt;

/// A lexical token of the query language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Term(&'a str),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Term(text) => write!(f, "'{}'", text),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Not => f.write_str("NOT"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

/// Splits a query into tokens.
///
/// Parentheses always delimit. `AND`, `OR` and `NOT` are operators only when
/// they stand alone between ASCII spaces (or a parenthesis or the query edge),
/// so `NOTCH1`, `ORF1` and `A\tAND\tB` stay literal text. Consecutive
/// non-operator words form one term whose text is the trimmed original slice
/// of the query, internal whitespace included.
pub fn tokenize(query: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut segment_start = 0;

    for (idx, ch) in query.char_indices() {
        let paren = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => continue,
        };
        push_segment(&query[segment_start..idx], &mut tokens);
        tokens.push(paren);
        segment_start = idx + ch.len_utf8();
    }
    push_segment(&query[segment_start..], &mut tokens);

    tokens
}

fn operator(word: &str) -> Option<Token<'static>> {
    match word {
        "AND" => Some(Token::And),
        "OR" => Some(Token::Or),
        "NOT" => Some(Token::Not),
        _ => None,
    }
}

fn push_segment<'a>(segment: &'a str, tokens: &mut Vec<Token<'a>>) {
    let mut term: Option<(usize, usize)> = None;

    for word in segment.split(' ').filter(|w| !w.is_empty()) {
        let start = word.as_ptr() as usize - segment.as_ptr() as usize;
        let end = start + word.len();
        match operator(word) {
            Some(op) => {
                if let Some((s, e)) = term.take() {
                    push_term(&segment[s..e], tokens);
                }
                tokens.push(op);
            }
            None => {
                term = Some(term.map_or((start, end), |(s, _)| (s, end)));
            }
        }
    }

    if let Some((s, e)) = term {
        push_term(&segment[s..e], tokens);
    }
}

// whitespace-only runs (a lone tab between operators) are not terms
fn push_term<'a>(text: &'a str, tokens: &mut Vec<Token<'a>>) {
    let text = text.trim();
    if !text.is_empty() {
        tokens.push(Token::Term(text));
    }
}
