use crate::Decimal;
use crate::money::round2;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected '{found}' at position {position}")]
    Unexpected { found: char, position: usize },
    #[error("expected a number at position {0}")]
    ExpectedNumber(usize),
    #[error("malformed number '{0}'")]
    InvalidNumber(String),
    #[error("division by zero is not allowed")]
    DivisionByZero,
    #[error("result is out of range")]
    Overflow,
}

pub fn evaluate(text: &str) -> Result<Decimal, ExprError> {
    if text.trim().is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let value = parser.expr()?;
    if let Some(found) = parser.peek() {
        return Err(ExprError::Unexpected {
            found,
            position: parser.pos,
        });
    }

    Ok(round2(value))
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&mut self) -> Option<char> {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
        self.chars.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<Decimal, ExprError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            let result = match op {
                '+' => value.checked_add(rhs),
                _ => value.checked_sub(rhs),
            };
            value = result.ok_or(ExprError::Overflow)?;
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Decimal, ExprError> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            let result = match op {
                '*' => value.checked_mul(rhs),
                _ if rhs.is_zero() => return Err(ExprError::DivisionByZero),
                _ => value.checked_div(rhs),
            };
            value = result.ok_or(ExprError::Overflow)?;
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<Decimal, ExprError> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(found) => Err(ExprError::Unexpected {
                found,
                position: self.pos,
            }),
            None => Err(ExprError::ExpectedNumber(self.pos)),
        }
    }

    fn number(&mut self) -> Result<Decimal, ExprError> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == '.')
        {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<Decimal>()
            .map_err(|_| ExprError::InvalidNumber(literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> String {
        match evaluate(text) {
            Ok(value) => value.to_string(),
            Err(error) => format!("error: {error}"),
        }
    }

    #[test]
    fn literals_and_precedence() {
        assert_eq!(eval("42"), "42.00");
        assert_eq!(eval(" 100.5 "), "100.50");
        assert_eq!(eval("12.50+3*2"), "18.50");
        assert_eq!(eval("10 - 4 - 3"), "3.00");
        assert_eq!(eval("-5+10"), "5.00");
        assert_eq!(eval("2*-3"), "-6.00");
        assert_eq!(eval(".5*3"), "1.50");
    }

    #[test]
    fn division_rounds_half_up() {
        assert_eq!(eval("10/3"), "3.33");
        assert_eq!(eval("0.01/2"), "0.01");
        assert_eq!(eval("-0.01/2"), "-0.01");
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(evaluate(""), Err(ExprError::Empty));
        assert_eq!(evaluate("   "), Err(ExprError::Empty));
        assert_eq!(evaluate("2+"), Err(ExprError::ExpectedNumber(2)));
        assert_eq!(
            evaluate("1.2.3"),
            Err(ExprError::InvalidNumber("1.2.3".to_string()))
        );
        assert_eq!(
            evaluate("abs(1)"),
            Err(ExprError::Unexpected {
                found: 'a',
                position: 0
            })
        );
        assert_eq!(
            evaluate("3 4"),
            Err(ExprError::Unexpected {
                found: '4',
                position: 2
            })
        );
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(evaluate("1/0"), Err(ExprError::DivisionByZero));
        assert!(evaluate("5/(1)").is_err());
        assert_eq!(eval("1/0.00"), "error: division by zero is not allowed");
    }
}
