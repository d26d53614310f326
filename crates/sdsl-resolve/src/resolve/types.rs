//! Resolved types.
//!
//! [`SymbolType`] is the checker's view of a type. Types compare
//! structurally; two `float3` spelled in different mixins are the same type.
//! [`SymbolType::Unknown`] is the sentinel substituted after an error so that
//! follow-up operations stay silent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element kind of scalars, vectors and matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::UInt => "uint",
            ScalarKind::Long => "long",
            ScalarKind::ULong => "ulong",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    /// Scalar kind for a source spelling. `half` is treated as `float`.
    pub fn from_name(name: &str) -> Option<ScalarKind> {
        Some(match name {
            "bool" => ScalarKind::Bool,
            "int" => ScalarKind::Int,
            "uint" => ScalarKind::UInt,
            "long" => ScalarKind::Long,
            "ulong" => ScalarKind::ULong,
            "float" | "half" => ScalarKind::Float,
            "double" => ScalarKind::Double,
            _ => return None,
        })
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            ScalarKind::Int | ScalarKind::UInt | ScalarKind::Long | ScalarKind::ULong
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ScalarKind::Float | ScalarKind::Double)
    }

    pub fn is_numeric(self) -> bool {
        self != ScalarKind::Bool
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::Int | ScalarKind::Long | ScalarKind::Float | ScalarKind::Double
        )
    }

    /// Storage width in bits (`bool` reports 32, its in-memory size).
    pub fn bit_width(self) -> u32 {
        match self {
            ScalarKind::Long | ScalarKind::ULong | ScalarKind::Double => 64,
            _ => 32,
        }
    }

    /// Whether a value of `self` converts implicitly to `target`.
    ///
    /// `int` widens to `float`, `long`, `uint` and `double`; `float` and
    /// `double` convert into each other.
    pub fn promotes_to(self, target: ScalarKind) -> bool {
        self == target
            || matches!(
                (self, target),
                (ScalarKind::Int, ScalarKind::Float)
                    | (ScalarKind::Int, ScalarKind::Long)
                    | (ScalarKind::Int, ScalarKind::UInt)
                    | (ScalarKind::Int, ScalarKind::Double)
                    | (ScalarKind::Float, ScalarKind::Double)
                    | (ScalarKind::Double, ScalarKind::Float)
            )
    }

    /// Common kind two operands promote to, if any.
    ///
    /// Floating dominates integral; between `float` and `double` the wider
    /// kind wins.
    pub fn common(self, other: ScalarKind) -> Option<ScalarKind> {
        if self == other {
            return Some(self);
        }
        if self.is_floating() && other.is_floating() {
            return Some(ScalarKind::Double);
        }
        if other.promotes_to(self) {
            Some(self)
        } else if self.promotes_to(other) {
            Some(other)
        } else {
            None
        }
    }
}

/// Resolved type of a symbol or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    Void,
    Scalar(ScalarKind),
    Vector {
        base: ScalarKind,
        size: u32,
    },
    /// `floatRxC`: `rows` rows of `cols` columns.
    Matrix {
        base: ScalarKind,
        rows: u32,
        cols: u32,
    },
    Struct {
        name: String,
        fields: Vec<(String, SymbolType)>,
    },
    /// `length` is `None` for unsized arrays.
    Array {
        element: Box<SymbolType>,
        length: Option<u32>,
    },
    Function {
        ret: Box<SymbolType>,
        params: Vec<SymbolType>,
    },
    /// A shader used as a value qualifier (`Mixin.f()`, `base.f()`,
    /// composition slots).
    Mixin {
        name: String,
    },
    /// Error sentinel
    Unknown,
}

impl SymbolType {
    pub const BOOL: SymbolType = SymbolType::Scalar(ScalarKind::Bool);
    pub const INT: SymbolType = SymbolType::Scalar(ScalarKind::Int);
    pub const UINT: SymbolType = SymbolType::Scalar(ScalarKind::UInt);
    pub const FLOAT: SymbolType = SymbolType::Scalar(ScalarKind::Float);

    /// Vector of `size` elements; a size of 1 collapses to the scalar.
    pub fn vector(base: ScalarKind, size: u32) -> SymbolType {
        if size == 1 {
            SymbolType::Scalar(base)
        } else {
            SymbolType::Vector { base, size }
        }
    }

    /// Built-in type for a source spelling: `float`, `int3`, `float4x4`,
    /// `void`, `matrix` (float4x4), `vector` (float4).
    pub fn builtin(name: &str) -> Option<SymbolType> {
        match name {
            "void" => return Some(SymbolType::Void),
            "matrix" => {
                return Some(SymbolType::Matrix {
                    base: ScalarKind::Float,
                    rows: 4,
                    cols: 4,
                })
            }
            "vector" => return Some(SymbolType::vector(ScalarKind::Float, 4)),
            _ => {}
        }

        if let Some(kind) = ScalarKind::from_name(name) {
            return Some(SymbolType::Scalar(kind));
        }

        let split = name.find(|c: char| c.is_ascii_digit())?;
        let base = ScalarKind::from_name(&name[..split])?;
        let dims = &name[split..];
        let digit = |s: &str| -> Option<u32> {
            let n: u32 = s.parse().ok()?;
            (1..=4).contains(&n).then_some(n)
        };

        match dims.split_once('x') {
            None => {
                let size = digit(dims)?;
                (size >= 2).then_some(SymbolType::Vector { base, size })
            }
            Some((rows, cols)) => Some(SymbolType::Matrix {
                base,
                rows: digit(rows)?,
                cols: digit(cols)?,
            }),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SymbolType::Unknown)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, SymbolType::Void)
    }

    /// Element kind of a scalar, vector or matrix.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            SymbolType::Scalar(kind) => Some(*kind),
            SymbolType::Vector { base, .. } | SymbolType::Matrix { base, .. } => Some(*base),
            _ => None,
        }
    }

    /// Number of scalar components (scalar 1, vector size, matrix rows*cols).
    pub fn component_count(&self) -> Option<u32> {
        match self {
            SymbolType::Scalar(_) => Some(1),
            SymbolType::Vector { size, .. } => Some(*size),
            SymbolType::Matrix { rows, cols, .. } => Some(rows * cols),
            _ => None,
        }
    }

    /// Same shape with a different element kind.
    pub fn with_base(&self, kind: ScalarKind) -> SymbolType {
        match self {
            SymbolType::Scalar(_) => SymbolType::Scalar(kind),
            SymbolType::Vector { size, .. } => SymbolType::Vector { base: kind, size: *size },
            SymbolType::Matrix { rows, cols, .. } => SymbolType::Matrix {
                base: kind,
                rows: *rows,
                cols: *cols,
            },
            other => other.clone(),
        }
    }

    /// Whether a value of `self` converts implicitly to `target`.
    ///
    /// Shapes must match exactly, except that a scalar broadcasts into a
    /// vector; element kinds follow [`ScalarKind::promotes_to`]. `Unknown`
    /// converts to and from everything.
    pub fn converts_to(&self, target: &SymbolType) -> bool {
        if self.is_unknown() || target.is_unknown() || self == target {
            return true;
        }
        match (self, target) {
            (SymbolType::Scalar(from), SymbolType::Scalar(to))
            | (SymbolType::Scalar(from), SymbolType::Vector { base: to, .. }) => {
                from.promotes_to(*to)
            }
            (
                SymbolType::Vector { base: from, size: a },
                SymbolType::Vector { base: to, size: b },
            ) => a == b && from.promotes_to(*to),
            (
                SymbolType::Matrix {
                    base: from,
                    rows: r1,
                    cols: c1,
                },
                SymbolType::Matrix {
                    base: to,
                    rows: r2,
                    cols: c2,
                },
            ) => r1 == r2 && c1 == c2 && from.promotes_to(*to),
            (
                SymbolType::Array {
                    element: a,
                    length: la,
                },
                SymbolType::Array {
                    element: b,
                    length: lb,
                },
            ) => a == b && (la == lb || lb.is_none()),
            _ => false,
        }
    }

    /// Field type of a struct.
    pub fn field(&self, name: &str) -> Option<(usize, &SymbolType)> {
        match self {
            SymbolType::Struct { fields, .. } => fields
                .iter()
                .enumerate()
                .find(|(_, (field, _))| field == name)
                .map(|(index, (_, ty))| (index, ty)),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolType::Void => write!(f, "void"),
            SymbolType::Scalar(kind) => write!(f, "{}", kind.name()),
            SymbolType::Vector { base, size } => write!(f, "{}{}", base.name(), size),
            SymbolType::Matrix { base, rows, cols } => {
                write!(f, "{}{}x{}", base.name(), rows, cols)
            }
            SymbolType::Struct { name, .. } => write!(f, "{}", name),
            SymbolType::Array {
                element,
                length: Some(length),
            } => write!(f, "{}[{}]", element, length),
            SymbolType::Array {
                element,
                length: None,
            } => write!(f, "{}[]", element),
            SymbolType::Function { ret, params } => {
                write!(f, "{}(", ret)?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
            SymbolType::Mixin { name } => write!(f, "mixin {}", name),
            SymbolType::Unknown => write!(f, "<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        assert_eq!(SymbolType::builtin("float"), Some(SymbolType::FLOAT));
        assert_eq!(SymbolType::builtin("half"), Some(SymbolType::FLOAT));
        assert_eq!(
            SymbolType::builtin("int3"),
            Some(SymbolType::Vector {
                base: ScalarKind::Int,
                size: 3
            })
        );
        assert_eq!(
            SymbolType::builtin("float4x3"),
            Some(SymbolType::Matrix {
                base: ScalarKind::Float,
                rows: 4,
                cols: 3
            })
        );
        assert_eq!(SymbolType::builtin("void"), Some(SymbolType::Void));
        assert_eq!(SymbolType::builtin("float5"), None);
        assert_eq!(SymbolType::builtin("float1"), None);
        assert_eq!(SymbolType::builtin("Light"), None);
    }

    #[test]
    fn test_display_round_trips_builtins() {
        for name in ["bool", "uint2", "double4", "float3x3", "long", "void"] {
            let ty = SymbolType::builtin(name).unwrap();
            assert_eq!(ty.to_string(), name);
        }
    }

    #[test]
    fn test_promotions() {
        assert!(ScalarKind::Int.promotes_to(ScalarKind::Float));
        assert!(ScalarKind::Int.promotes_to(ScalarKind::Long));
        assert!(ScalarKind::Int.promotes_to(ScalarKind::Double));
        assert!(ScalarKind::Float.promotes_to(ScalarKind::Double));
        assert!(ScalarKind::Double.promotes_to(ScalarKind::Float));
        assert!(!ScalarKind::Float.promotes_to(ScalarKind::Int));
        assert!(!ScalarKind::Bool.promotes_to(ScalarKind::Int));

        assert_eq!(ScalarKind::Int.common(ScalarKind::Float), Some(ScalarKind::Float));
        assert_eq!(ScalarKind::Float.common(ScalarKind::Double), Some(ScalarKind::Double));
        assert_eq!(ScalarKind::UInt.common(ScalarKind::Int), Some(ScalarKind::UInt));
        assert_eq!(ScalarKind::Long.common(ScalarKind::UInt), None);
    }

    #[test]
    fn test_conversions() {
        let float3 = SymbolType::builtin("float3").unwrap();
        let int3 = SymbolType::builtin("int3").unwrap();
        assert!(SymbolType::FLOAT.converts_to(&float3));
        assert!(int3.converts_to(&float3));
        assert!(!float3.converts_to(&int3));
        assert!(!float3.converts_to(&SymbolType::builtin("float4").unwrap()));
        assert!(SymbolType::Unknown.converts_to(&float3));
        assert!(float3.converts_to(&SymbolType::Unknown));
    }

    #[test]
    fn test_struct_fields() {
        let light = SymbolType::Struct {
            name: "Light".into(),
            fields: vec![
                ("Direction".into(), SymbolType::builtin("float3").unwrap()),
                ("Intensity".into(), SymbolType::FLOAT),
            ],
        };
        assert_eq!(light.field("Intensity"), Some((1, &SymbolType::FLOAT)));
        assert_eq!(light.field("Color"), None);
        assert_eq!(light.to_string(), "Light");
    }
}
