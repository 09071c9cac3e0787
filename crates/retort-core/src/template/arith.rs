//! Restricted arithmetic evaluator for `(+EXPR)` directives.
//!
//! A sandboxed replacement for a general expression evaluator: only digits,
//! `+ - * /`, parentheses, and decimal points are accepted. Anything else,
//! any unparsable expression, and any division by zero is an error; the
//! caller leaves the directive text untouched in that case.

use crate::error::{RetortError, RetortResult};

/// Evaluate a restricted arithmetic expression and format the result.
///
/// A whole-number float collapses to an integer string (`14.0` -> `"14"`).
/// The localized multiplication/division glyphs `×` and `÷` are normalized
/// to ASCII before evaluation.
pub fn evaluate(expr: &str) -> RetortResult<String> {
    let normalized = expr.replace('×', "*").replace('÷', "/");

    for c in normalized.chars() {
        if !c.is_ascii_digit() && !"+-*/(). \t".contains(c) {
            return Err(RetortError::parse(format!(
                "unsafe character '{}' in arithmetic expression",
                c
            )));
        }
    }

    let chars: Vec<char> = normalized.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err(RetortError::parse("empty arithmetic expression"));
    }

    let mut parser = Parser { chars, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.chars.len() {
        return Err(RetortError::parse("trailing input in arithmetic expression"));
    }
    if !value.is_finite() {
        return Err(RetortError::parse("non-finite arithmetic result"));
    }

    if value.fract() == 0.0 && value.abs() < 1e15 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(format!("{}", value))
    }
}

/// Recursive-descent parser over the safe character set.
struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// expr := term (('+' | '-') term)*
    fn expr(&mut self) -> RetortResult<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.bump();
                    value += self.term()?;
                }
                '-' => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// term := factor (('*' | '/') factor)*
    fn term(&mut self) -> RetortResult<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.bump();
                    value *= self.factor()?;
                }
                '/' => {
                    self.bump();
                    let rhs = self.factor()?;
                    if rhs == 0.0 {
                        return Err(RetortError::parse("division by zero"));
                    }
                    value /= rhs;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// factor := ('+' | '-')* (number | '(' expr ')')
    fn factor(&mut self) -> RetortResult<f64> {
        match self.peek() {
            Some('+') => {
                self.bump();
                self.factor()
            }
            Some('-') => {
                self.bump();
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.bump();
                let value = self.expr()?;
                if self.bump() != Some(')') {
                    return Err(RetortError::parse("unbalanced parentheses"));
                }
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            _ => Err(RetortError::parse("expected number or parenthesized group")),
        }
    }

    fn number(&mut self) -> RetortResult<f64> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| RetortError::parse(format!("bad number literal '{}'", literal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate("2+3*4").unwrap(), "14");
        assert_eq!(evaluate("(2+3)*4").unwrap(), "20");
    }

    #[test]
    fn test_whole_float_collapses() {
        assert_eq!(evaluate("10/4*2").unwrap(), "5");
        assert_eq!(evaluate("1.5+2.5").unwrap(), "4");
    }

    #[test]
    fn test_fractional_result() {
        assert_eq!(evaluate("7/2").unwrap(), "3.5");
    }

    #[test]
    fn test_localized_glyphs() {
        assert_eq!(evaluate("3×4÷2").unwrap(), "6");
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(evaluate("-3+10").unwrap(), "7");
        assert_eq!(evaluate("2*-3").unwrap(), "-6");
    }

    #[test]
    fn test_division_by_zero() {
        assert!(evaluate("1/0").is_err());
        assert!(evaluate("1/(2-2)").is_err());
    }

    #[test]
    fn test_rejects_unsafe_characters() {
        assert!(evaluate("__import__").is_err());
        assert!(evaluate("1+a").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1+").is_err());
        assert!(evaluate("(1+2").is_err());
        assert!(evaluate("1..2").is_err());
    }
}
