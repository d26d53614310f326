//! Built-in intrinsic functions.
//!
//! Every intrinsic is an ordinary function symbol carrying its
//! `GLSL.std.450` extended instruction number. Overloads cover `float`
//! through `float4`; `dot`, `mul` and `transpose` are lowered to core
//! instructions by name, so their number is never emitted.

use sdsl_resolve::{ScalarKind, Symbol, SymbolKind, SymbolProvider, SymbolType};

/// How an intrinsic's overloads are shaped over the float widths.
#[derive(Debug, Clone, Copy)]
enum Shape {
    /// `T f(T)`
    Unary,
    /// `T f(T, T)`
    Binary,
    /// `T f(T, T, T)`
    Ternary,
    /// `float f(T)`
    Reduce,
    /// `float f(T, T)`
    Reduce2,
    /// `T f(T, T, float)`
    Refract,
    /// `float f(T, T)` over vectors only
    Dot,
    /// `float3 f(float3, float3)`
    Cross,
}

const CORE: u32 = 0;

const FUNCTIONS: &[(&str, u32, Shape)] = &[
    ("round", 1, Shape::Unary),
    ("trunc", 3, Shape::Unary),
    ("abs", 4, Shape::Unary),
    ("sign", 6, Shape::Unary),
    ("floor", 8, Shape::Unary),
    ("ceil", 9, Shape::Unary),
    ("frac", 10, Shape::Unary),
    ("radians", 11, Shape::Unary),
    ("degrees", 12, Shape::Unary),
    ("sin", 13, Shape::Unary),
    ("cos", 14, Shape::Unary),
    ("tan", 15, Shape::Unary),
    ("asin", 16, Shape::Unary),
    ("acos", 17, Shape::Unary),
    ("atan", 18, Shape::Unary),
    ("atan2", 25, Shape::Binary),
    ("pow", 26, Shape::Binary),
    ("exp", 27, Shape::Unary),
    ("log", 28, Shape::Unary),
    ("exp2", 29, Shape::Unary),
    ("log2", 30, Shape::Unary),
    ("sqrt", 31, Shape::Unary),
    ("rsqrt", 32, Shape::Unary),
    ("min", 37, Shape::Binary),
    ("max", 40, Shape::Binary),
    ("clamp", 43, Shape::Ternary),
    ("lerp", 46, Shape::Ternary),
    ("step", 48, Shape::Binary),
    ("smoothstep", 49, Shape::Ternary),
    ("mad", 50, Shape::Ternary),
    ("length", 66, Shape::Reduce),
    ("distance", 67, Shape::Reduce2),
    ("cross", 68, Shape::Cross),
    ("normalize", 69, Shape::Unary),
    ("reflect", 71, Shape::Binary),
    ("refract", 72, Shape::Refract),
    ("dot", CORE, Shape::Dot),
];

const DETERMINANT: u32 = 33;

/// The intrinsic library, ready to hand to a compile request.
#[derive(Debug, Clone)]
pub struct Intrinsics {
    symbols: Vec<Symbol>,
}

impl Intrinsics {
    pub fn new() -> Self {
        let mut symbols = Vec::new();

        for &(name, number, shape) in FUNCTIONS {
            for size in 1..=4 {
                if let Some((ret, params)) = overload(shape, size) {
                    symbols.push(function(name, number, ret, params));
                }
            }
        }

        for n in 2..=4 {
            let matrix = float_matrix(n, n);
            let vector = SymbolType::vector(ScalarKind::Float, n);
            symbols.push(function(
                "mul",
                CORE,
                matrix.clone(),
                vec![matrix.clone(), matrix.clone()],
            ));
            symbols.push(function(
                "mul",
                CORE,
                vector.clone(),
                vec![matrix.clone(), vector.clone()],
            ));
            symbols.push(function(
                "mul",
                CORE,
                vector.clone(),
                vec![vector, matrix.clone()],
            ));
            symbols.push(function(
                "transpose",
                CORE,
                matrix.clone(),
                vec![matrix.clone()],
            ));
            symbols.push(function(
                "determinant",
                DETERMINANT,
                SymbolType::FLOAT,
                vec![matrix],
            ));
        }

        Self { symbols }
    }

    /// Every overload registered under `name`.
    pub fn overloads<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols.iter().filter(move |symbol| symbol.name == name)
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolProvider for Intrinsics {
    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn types(&self) -> &[(String, SymbolType)] {
        &[]
    }
}

fn overload(shape: Shape, size: u32) -> Option<(SymbolType, Vec<SymbolType>)> {
    let t = SymbolType::vector(ScalarKind::Float, size);
    let float = SymbolType::FLOAT;
    Some(match shape {
        Shape::Unary => (t.clone(), vec![t]),
        Shape::Binary => (t.clone(), vec![t.clone(), t]),
        Shape::Ternary => (t.clone(), vec![t.clone(), t.clone(), t]),
        Shape::Reduce => (float, vec![t]),
        Shape::Reduce2 => (float, vec![t.clone(), t]),
        Shape::Refract => (t.clone(), vec![t.clone(), t, float]),
        Shape::Dot if size > 1 => (float, vec![t.clone(), t]),
        Shape::Dot => return None,
        Shape::Cross if size == 3 => (t.clone(), vec![t.clone(), t]),
        Shape::Cross => return None,
    })
}

fn float_matrix(rows: u32, cols: u32) -> SymbolType {
    SymbolType::Matrix {
        base: ScalarKind::Float,
        rows,
        cols,
    }
}

fn function(name: &str, number: u32, ret: SymbolType, params: Vec<SymbolType>) -> Symbol {
    Symbol::new(
        name,
        SymbolKind::Function,
        SymbolType::Function {
            ret: Box::new(ret),
            params,
        },
    )
    .with_intrinsic(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unary_overloads_cover_every_width() {
        let intrinsics = Intrinsics::new();
        let params: Vec<_> = intrinsics
            .overloads("normalize")
            .map(|symbol| symbol.signature().unwrap().1.to_vec())
            .collect();
        assert_eq!(params.len(), 4);
        assert_eq!(params[0], vec![SymbolType::FLOAT]);
        assert_eq!(
            params[2],
            vec![SymbolType::Vector {
                base: ScalarKind::Float,
                size: 3
            }]
        );
    }

    #[test]
    fn test_vector_only_overloads() {
        let intrinsics = Intrinsics::new();
        assert_eq!(intrinsics.overloads("cross").count(), 1);
        assert_eq!(intrinsics.overloads("dot").count(), 3);
    }

    #[test]
    fn test_extended_instruction_numbers() {
        let intrinsics = Intrinsics::new();
        let number = |name| intrinsics.overloads(name).next().unwrap().intrinsic;
        assert_eq!(number("abs"), Some(4));
        assert_eq!(number("lerp"), Some(46));
        assert_eq!(number("normalize"), Some(69));
        assert_eq!(number("determinant"), Some(33));
    }

    #[test]
    fn test_reductions_return_float() {
        let intrinsics = Intrinsics::new();
        for name in ["length", "dot", "distance"] {
            for symbol in intrinsics.overloads(name) {
                let (ret, _) = symbol.signature().unwrap();
                assert_eq!(*ret, SymbolType::FLOAT, "{}", name);
            }
        }
    }

    #[test]
    fn test_provides_no_types() {
        assert!(Intrinsics::new().types().is_empty());
    }
}
