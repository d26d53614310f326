//! Operator enums.
//!
//! Binary operators are declared in bucket order: every arithmetic operator
//! comes first, then bitwise, comparison, equality and logical operators.
//! [`BinaryOp::bucket`] derives the bucket from the discriminant alone, so a
//! new operator is classified by where it is declared rather than by a new
//! match arm.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operator.
///
/// # Layout
///
/// Uses `#[repr(u8)]` so discriminants are stable; the bucket boundaries in
/// [`BinaryOp::bucket`] depend on declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Bitwise
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    // Comparison
    Lt,
    Le,
    Gt,
    Ge,
    // Equality
    Eq,
    Ne,
    // Logical
    LogicalAnd,
    LogicalOr,
}

/// Ordinal bucket of a binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorBucket {
    Arithmetic,
    Bitwise,
    Comparison,
    Equality,
    Logical,
}

const FIRST_BITWISE: u8 = BinaryOp::Shl as u8;
const FIRST_COMPARISON: u8 = BinaryOp::Lt as u8;
const FIRST_EQUALITY: u8 = BinaryOp::Eq as u8;
const FIRST_LOGICAL: u8 = BinaryOp::LogicalAnd as u8;

/// Operator spellings, indexed by discriminant.
const BINARY_OP_STRINGS: &[&str] = &[
    "+", "-", "*", "/", "%", // arithmetic
    "<<", ">>", "&", "|", "^", // bitwise
    "<", "<=", ">", ">=", // comparison
    "==", "!=", // equality
    "&&", "||", // logical
];

impl BinaryOp {
    /// All binary operators in declaration order.
    pub const ALL: [BinaryOp; 18] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
        BinaryOp::Lt,
        BinaryOp::Le,
        BinaryOp::Gt,
        BinaryOp::Ge,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::LogicalAnd,
        BinaryOp::LogicalOr,
    ];

    /// Bucket this operator belongs to, derived from its ordinal.
    pub fn bucket(self) -> OperatorBucket {
        let ordinal = self as u8;
        if ordinal >= FIRST_LOGICAL {
            OperatorBucket::Logical
        } else if ordinal >= FIRST_EQUALITY {
            OperatorBucket::Equality
        } else if ordinal >= FIRST_COMPARISON {
            OperatorBucket::Comparison
        } else if ordinal >= FIRST_BITWISE {
            OperatorBucket::Bitwise
        } else {
            OperatorBucket::Arithmetic
        }
    }

    /// Whether `a op b` and `b op a` have the same meaning.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
        )
    }

    /// Source spelling of the operator.
    pub fn as_str(self) -> &'static str {
        BINARY_OP_STRINGS[self as usize]
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `++x`
    PreIncrement,
    /// `--x`
    PreDecrement,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreIncrement => "++",
            UnaryOp::PreDecrement => "--",
        })
    }
}

/// Assignment operator (`=` or a compound form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

impl AssignOp {
    /// Binary operator applied by a compound assignment, if any.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Compound(op) => Some(op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_follow_declaration_order() {
        assert_eq!(BinaryOp::Add.bucket(), OperatorBucket::Arithmetic);
        assert_eq!(BinaryOp::Mod.bucket(), OperatorBucket::Arithmetic);
        assert_eq!(BinaryOp::Shl.bucket(), OperatorBucket::Bitwise);
        assert_eq!(BinaryOp::BitXor.bucket(), OperatorBucket::Bitwise);
        assert_eq!(BinaryOp::Ge.bucket(), OperatorBucket::Comparison);
        assert_eq!(BinaryOp::Ne.bucket(), OperatorBucket::Equality);
        assert_eq!(BinaryOp::LogicalOr.bucket(), OperatorBucket::Logical);
    }

    #[test]
    fn test_spellings_match_discriminants() {
        assert_eq!(BINARY_OP_STRINGS.len(), BinaryOp::ALL.len());
        assert_eq!(BinaryOp::Shr.to_string(), ">>");
        assert_eq!(BinaryOp::LogicalAnd.to_string(), "&&");
        for (index, op) in BinaryOp::ALL.iter().enumerate() {
            assert_eq!(*op as usize, index);
        }
    }
}
