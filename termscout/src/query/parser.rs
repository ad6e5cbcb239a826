use super::lexer::{tokenize, Token};
use super::Expr;
use crate::errors::{ScanError, ScanResult};

/// Parses a query string into an expression tree.
///
/// ```text
/// query    := or_expr EOF
/// or_expr  := and_expr ( OR and_expr )*
/// and_expr := not_expr ( AND not_expr )*
/// not_expr := operand ( NOT operand )?
/// operand  := "(" or_expr ")" | TERM
/// ```
pub fn parse(source: &str) -> ScanResult<Expr> {
    if source.trim().is_empty() {
        return Err(ScanError::invalid_term(source));
    }
    check_balance(source)?;

    let mut parser = Parser {
        source,
        tokens: tokenize(source),
        pos: 0,
    };
    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(parser.error(format!(
            "expected an operator before {}",
            token
        ))),
    }
}

fn check_balance(source: &str) -> ScanResult<()> {
    let mut depth = 0usize;
    for ch in source.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ScanError::malformed(source, "unbalanced parentheses: unmatched ')'")
                })?
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(ScanError::malformed(
            source,
            "unbalanced parentheses: unclosed '('",
        ));
    }
    Ok(())
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn previous(&self) -> Option<Token<'a>> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i).copied())
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: Token<'_>) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: impl Into<String>) -> ScanError {
        ScanError::malformed(self.source, reason)
    }

    fn or_expr(&mut self) -> ScanResult<Expr> {
        let mut alternatives = vec![self.and_expr()?];
        while self.eat(Token::Or) {
            alternatives.push(self.and_expr()?);
        }
        Ok(collapse(alternatives, Expr::Or))
    }

    fn and_expr(&mut self) -> ScanResult<Expr> {
        let mut terms = vec![self.not_expr()?];
        while self.eat(Token::And) {
            terms.push(self.not_expr()?);
        }
        Ok(collapse(terms, Expr::And))
    }

    fn not_expr(&mut self) -> ScanResult<Expr> {
        let left = self.operand()?;
        if !self.eat(Token::Not) {
            return Ok(left);
        }
        let right = self.operand()?;
        if self.peek() == Some(Token::Not) {
            return Err(self.error("NOT takes exactly two operands; group chained NOTs with parentheses"));
        }
        Ok(Expr::Not(Box::new(left), Box::new(right)))
    }

    fn operand(&mut self) -> ScanResult<Expr> {
        let previous = self.previous();
        match self.next() {
            Some(Token::Term(text)) => Ok(Expr::Term(text.to_string())),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                if !self.eat(Token::RParen) {
                    let reason = match self.peek() {
                        Some(token) => format!("expected an operator or ')' before {}", token),
                        None => "unbalanced parentheses".to_string(),
                    };
                    return Err(self.error(reason));
                }
                Ok(Expr::Group(Box::new(inner)))
            }
            Some(Token::RParen) if previous == Some(Token::LParen) => {
                Err(self.error("empty parenthesized group"))
            }
            Some(token) => Err(self.error(match previous {
                Some(op @ (Token::And | Token::Or | Token::Not)) => {
                    format!("operator {} is missing its right operand", op)
                }
                _ => format!("operator {} is missing its left operand", token),
            })),
            None => Err(self.error(match previous {
                Some(op) => format!("operator {} is missing its right operand", op),
                None => "missing operand".to_string(),
            })),
        }
    }
}

fn collapse(mut items: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        combine(items)
    }
}
