//! Table-driven binary operator typing.
//!
//! Legality is decided in two steps:
//!
//! 1. the operand *shapes* (scalar, vector, matrix) select a row of
//!    [`operator_table`] listing the operators allowed for that pairing
//! 2. the operator's [`OperatorBucket`] decides the element rules and the
//!    result type
//!
//! A new operator is therefore typed by adding it to the rows it is legal in
//! and by where it sits in [`BinaryOp`]'s declaration order; no per-operator
//! branch exists below.

use super::types::{ScalarKind, SymbolType};
use indexmap::IndexMap;
use sdsl_ast::foundation::{BinaryOp, OperatorBucket};
use std::sync::OnceLock;

/// Shape class of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    Scalar,
    Vector,
    Matrix,
}

impl ShapeClass {
    pub fn of(ty: &SymbolType) -> Option<ShapeClass> {
        match ty {
            SymbolType::Scalar(_) => Some(ShapeClass::Scalar),
            SymbolType::Vector { .. } => Some(ShapeClass::Vector),
            SymbolType::Matrix { .. } => Some(ShapeClass::Matrix),
            _ => None,
        }
    }
}

use BinaryOp::*;

const COMPONENT_WISE: &[BinaryOp] = &[
    Add, Sub, Mul, Div, Mod, Shl, Shr, BitAnd, BitOr, BitXor, Lt, Le, Gt, Ge, Eq, Ne,
];
const SCALAR_SCALAR: &[BinaryOp] = &BinaryOp::ALL;
const MATRIX_SCALAR: &[BinaryOp] = &[Add, Sub, Mul, Div];
const MATRIX_VECTOR: &[BinaryOp] = &[Mul];
const MATRIX_MATRIX: &[BinaryOp] = &[Add, Sub, Mul, Div, Eq, Ne];

/// Allowed operators per (left shape, right shape).
const OPERATOR_ROWS: &[(ShapeClass, ShapeClass, &[BinaryOp])] = &[
    (ShapeClass::Scalar, ShapeClass::Scalar, SCALAR_SCALAR),
    (ShapeClass::Scalar, ShapeClass::Vector, COMPONENT_WISE),
    (ShapeClass::Vector, ShapeClass::Scalar, COMPONENT_WISE),
    (ShapeClass::Vector, ShapeClass::Vector, COMPONENT_WISE),
    (ShapeClass::Matrix, ShapeClass::Scalar, MATRIX_SCALAR),
    (ShapeClass::Scalar, ShapeClass::Matrix, MATRIX_SCALAR),
    (ShapeClass::Matrix, ShapeClass::Vector, MATRIX_VECTOR),
    (ShapeClass::Vector, ShapeClass::Matrix, MATRIX_VECTOR),
    (ShapeClass::Matrix, ShapeClass::Matrix, MATRIX_MATRIX),
];

/// Process-wide operator table, built once on first use.
pub fn operator_table() -> &'static IndexMap<(ShapeClass, ShapeClass), &'static [BinaryOp]> {
    static TABLE: OnceLock<IndexMap<(ShapeClass, ShapeClass), &'static [BinaryOp]>> =
        OnceLock::new();
    TABLE.get_or_init(|| {
        OPERATOR_ROWS
            .iter()
            .map(|(left, right, ops)| ((*left, *right), *ops))
            .collect()
    })
}

/// Whether `left op right` is a legal operation.
pub fn check_binary_operation(left: &SymbolType, right: &SymbolType, op: BinaryOp) -> bool {
    binary_operation_resulting_type(left, right, op).is_some()
}

/// Result type of `left op right`, or `None` when the operation is illegal.
///
/// Comparisons and equalities yield `bool`. Arithmetic and bitwise
/// operations yield the more general operand: vectors and matrices dominate
/// scalars and floating element kinds dominate integral ones. `*` between
/// matrices and vectors follows linear algebra shapes.
pub fn binary_operation_resulting_type(
    left: &SymbolType,
    right: &SymbolType,
    op: BinaryOp,
) -> Option<SymbolType> {
    if left.is_unknown() || right.is_unknown() {
        return Some(SymbolType::Unknown);
    }

    let shapes = (ShapeClass::of(left)?, ShapeClass::of(right)?);
    let allowed = operator_table().get(&shapes)?;
    if !allowed.contains(&op) {
        return None;
    }

    let kind = operand_kind(left, right, op)?;
    match op.bucket() {
        OperatorBucket::Comparison | OperatorBucket::Equality => {
            result_shape(left, right, op)?;
            Some(SymbolType::BOOL)
        }
        OperatorBucket::Logical => Some(SymbolType::BOOL),
        OperatorBucket::Arithmetic | OperatorBucket::Bitwise => {
            Some(result_shape(left, right, op)?.with_base(kind))
        }
    }
}

/// Element kind both operands are promoted to before `op` applies.
pub fn operand_kind(left: &SymbolType, right: &SymbolType, op: BinaryOp) -> Option<ScalarKind> {
    let (l, r) = (left.scalar_kind()?, right.scalar_kind()?);
    match op.bucket() {
        OperatorBucket::Arithmetic | OperatorBucket::Comparison => {
            let kind = l.common(r)?;
            kind.is_numeric().then_some(kind)
        }
        OperatorBucket::Bitwise => {
            let kind = l.common(r)?;
            kind.is_integral().then_some(kind)
        }
        OperatorBucket::Equality => l.common(r),
        OperatorBucket::Logical => {
            (l == ScalarKind::Bool && r == ScalarKind::Bool).then_some(ScalarKind::Bool)
        }
    }
}

/// Shape of the result, ignoring the element kind.
fn result_shape(left: &SymbolType, right: &SymbolType, op: BinaryOp) -> Option<SymbolType> {
    use SymbolType::{Matrix, Scalar, Vector};

    match (left, right) {
        (Scalar(_), Scalar(_)) => Some(left.clone()),
        (Scalar(_), Vector { .. } | Matrix { .. }) => Some(right.clone()),
        (Vector { .. } | Matrix { .. }, Scalar(_)) => Some(left.clone()),
        (Vector { size: a, .. }, Vector { size: b, .. }) => (a == b).then(|| left.clone()),
        (Matrix { base, rows, cols }, Vector { size, .. }) => {
            (size == cols).then(|| SymbolType::vector(*base, *rows))
        }
        (Vector { size, .. }, Matrix { base, rows, cols }) => {
            (size == rows).then(|| SymbolType::vector(*base, *cols))
        }
        (
            Matrix {
                base,
                rows: r1,
                cols: c1,
            },
            Matrix {
                rows: r2, cols: c2, ..
            },
        ) => {
            if op == Mul {
                (c1 == r2).then_some(Matrix {
                    base: *base,
                    rows: *r1,
                    cols: *c2,
                })
            } else {
                (r1 == r2 && c1 == c2).then(|| left.clone())
            }
        }
        _ => None,
    }
}
