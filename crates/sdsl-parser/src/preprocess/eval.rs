//! Directive expression evaluator for `#if` / `#elif`.
//!
//! Expressions are tokenized with the SDSL lexer and evaluated over `i64`
//! using the same binary precedence table as the main parser. Macro names
//! evaluate to the value of their body; unknown names evaluate to 0.
//! Operands that are never evaluated (the dead side of `&&`, `||` and `?:`)
//! do not report division by zero.

use crate::parser::binary_op_info;
use indexmap::IndexMap;
use sdsl_ast::foundation::BinaryOp;
use sdsl_lexer::{tokenize, Token};

/// Evaluate a directive expression against the macro environment.
pub(super) fn evaluate(text: &str, macros: &IndexMap<String, String>) -> Result<i64, String> {
    let mut expanding = Vec::new();
    evaluate_in(text, macros, &mut expanding)
}

fn evaluate_in(
    text: &str,
    macros: &IndexMap<String, String>,
    expanding: &mut Vec<String>,
) -> Result<i64, String> {
    let (tokens, errors) = tokenize(text);
    if let Some(range) = errors.first() {
        return Err(format!(
            "invalid character '{}' in directive expression",
            &text[range.clone()]
        ));
    }
    if tokens.is_empty() {
        return Err("missing directive expression".to_string());
    }

    let tokens: Vec<Token> = tokens.into_iter().map(|(token, _)| token).collect();
    let mut evaluator = Evaluator {
        tokens: &tokens,
        pos: 0,
        macros,
        expanding,
    };
    let value = evaluator.expression(true)?;
    if let Some(token) = evaluator.peek() {
        return Err(format!("unexpected '{}' in directive expression", token));
    }
    Ok(value)
}

struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    macros: &'a IndexMap<String, String>,
    expanding: &'a mut Vec<String>,
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), String> {
        if self.eat(&token) {
            Ok(())
        } else {
            match self.peek() {
                Some(found) => Err(format!("expected '{}', found '{}'", token, found)),
                None => Err(format!("expected '{}' at end of directive", token)),
            }
        }
    }

    /// `cond ? a : b`, right associative.
    fn expression(&mut self, live: bool) -> Result<i64, String> {
        let condition = self.binary(0, live)?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.expression(live && condition != 0)?;
        self.expect(Token::Colon)?;
        let otherwise = self.expression(live && condition == 0)?;
        Ok(if condition != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min_prec: u8, live: bool) -> Result<i64, String> {
        let mut left = self.unary(live)?;

        while let Some((prec, op)) = self.peek().and_then(binary_op_info) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;

            let right_live = match op {
                BinaryOp::LogicalAnd => live && left != 0,
                BinaryOp::LogicalOr => live && left == 0,
                _ => live,
            };
            let right = self.binary(prec + 1, right_live)?;
            left = apply(op, left, right, right_live)?;
        }

        Ok(left)
    }

    fn unary(&mut self, live: bool) -> Result<i64, String> {
        let token = self.peek().cloned();
        match token {
            Some(Token::Bang) => {
                self.pos += 1;
                Ok((self.unary(live)? == 0) as i64)
            }
            Some(Token::Tilde) => {
                self.pos += 1;
                Ok(!self.unary(live)?)
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(self.unary(live)?.wrapping_neg())
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary(live)
            }
            _ => self.primary(live),
        }
    }

    fn primary(&mut self, live: bool) -> Result<i64, String> {
        let token = self.peek().cloned();
        self.pos += 1;
        match token {
            Some(Token::Int((value, _))) => Ok(value as i64),
            Some(Token::True) => Ok(1),
            Some(Token::False) => Ok(0),
            Some(Token::LParen) => {
                let value = self.expression(live)?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) if &*name == "defined" => self.defined(),
            Some(Token::Ident(name)) => self.macro_value(&name),
            Some(Token::Float(_)) => {
                Err("floating-point value in directive expression".to_string())
            }
            Some(other) => Err(format!("unexpected '{}' in directive expression", other)),
            None => Err("unexpected end of directive expression".to_string()),
        }
    }

    /// `defined(NAME)` or `defined NAME`.
    fn defined(&mut self) -> Result<i64, String> {
        let parenthesized = self.eat(&Token::LParen);
        let name = match self.peek().cloned() {
            Some(Token::Ident(name)) => name,
            _ => return Err("expected macro name after 'defined'".to_string()),
        };
        self.pos += 1;
        if parenthesized {
            self.expect(Token::RParen)?;
        }
        Ok(self.macros.contains_key(&*name) as i64)
    }

    fn macro_value(&mut self, name: &str) -> Result<i64, String> {
        let Some(body) = self.macros.get(name) else {
            return Ok(0);
        };
        if self.expanding.iter().any(|open| open == name) {
            return Ok(0);
        }
        if body.trim().is_empty() {
            return Err(format!("macro '{}' expands to nothing in directive", name));
        }

        self.expanding.push(name.to_string());
        let value = evaluate_in(body, self.macros, self.expanding);
        self.expanding.pop();
        value
    }
}

fn apply(op: BinaryOp, left: i64, right: i64, live: bool) -> Result<i64, String> {
    Ok(match op {
        BinaryOp::Add => left.wrapping_add(right),
        BinaryOp::Sub => left.wrapping_sub(right),
        BinaryOp::Mul => left.wrapping_mul(right),
        BinaryOp::Div | BinaryOp::Mod if right == 0 => {
            if live {
                return Err("division by zero in directive expression".to_string());
            }
            0
        }
        BinaryOp::Div => left.wrapping_div(right),
        BinaryOp::Mod => left.wrapping_rem(right),
        BinaryOp::Shl => left.wrapping_shl(right as u32),
        BinaryOp::Shr => left.wrapping_shr(right as u32),
        BinaryOp::BitAnd => left & right,
        BinaryOp::BitOr => left | right,
        BinaryOp::BitXor => left ^ right,
        BinaryOp::Lt => (left < right) as i64,
        BinaryOp::Le => (left <= right) as i64,
        BinaryOp::Gt => (left > right) as i64,
        BinaryOp::Ge => (left >= right) as i64,
        BinaryOp::Eq => (left == right) as i64,
        BinaryOp::Ne => (left != right) as i64,
        BinaryOp::LogicalAnd => (left != 0 && right != 0) as i64,
        BinaryOp::LogicalOr => (left != 0 || right != 0) as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_precedence() {
        let macros = IndexMap::new();
        assert_eq!(evaluate("1 + 2 * 3", &macros), Ok(7));
        assert_eq!(evaluate("(1 + 2) * 3", &macros), Ok(9));
        assert_eq!(evaluate("1 << 2 | 1", &macros), Ok(5));
        assert_eq!(evaluate("2 > 1 && 3 == 3", &macros), Ok(1));
        assert_eq!(evaluate("!0 ? 10 : 20", &macros), Ok(10));
        assert_eq!(evaluate("-3 + ~0", &macros), Ok(-4));
    }

    #[test]
    fn test_macros_and_defined() {
        let macros = env(&[("A", "2"), ("B", "A * 3"), ("LOOP", "LOOP + 1")]);
        assert_eq!(evaluate("B", &macros), Ok(6));
        assert_eq!(evaluate("UNKNOWN", &macros), Ok(0));
        assert_eq!(evaluate("defined(A) && defined B", &macros), Ok(1));
        assert_eq!(evaluate("defined(C)", &macros), Ok(0));
        assert_eq!(evaluate("LOOP", &macros), Ok(1));
    }

    #[test]
    fn test_division_by_zero() {
        let macros = IndexMap::new();
        assert!(evaluate("1 / 0", &macros).is_err());
        assert_eq!(evaluate("0 && 1 / 0", &macros), Ok(0));
        assert_eq!(evaluate("1 ? 5 : 1 % 0", &macros), Ok(5));
    }

    #[test]
    fn test_malformed_expressions() {
        let macros = IndexMap::new();
        assert!(evaluate("", &macros).is_err());
        assert!(evaluate("1 +", &macros).is_err());
        assert!(evaluate("(1", &macros).is_err());
        assert!(evaluate("1 2", &macros).is_err());
        assert!(evaluate("1.5", &macros).is_err());
        assert!(evaluate("defined", &macros).is_err());
    }
}
