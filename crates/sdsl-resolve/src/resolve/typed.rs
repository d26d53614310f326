//! Typed program produced by the checker.
//!
//! Every expression carries its resolved [`SymbolType`]. Implicit promotions
//! are explicit [`TypedExprKind::Convert`] nodes, compound assignments are
//! expanded, and names are resolved to locals (by slot), globals (by owning
//! mixin) or callees. The lowering pass consumes this tree without
//! consulting the symbol table again.

use super::types::SymbolType;
use sdsl_ast::{BinaryOp, Span, UnaryOp};

/// Checked module: one entry per mixin plus the effects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub mixins: Vec<TypedMixin>,
    pub effects: Vec<TypedEffect>,
}

impl Program {
    pub fn mixin(&self, name: &str) -> Option<&TypedMixin> {
        self.mixins.iter().find(|mixin| mixin.name == name)
    }

    pub fn effect(&self, name: &str) -> Option<&TypedEffect> {
        self.effects.iter().find(|effect| effect.name == name)
    }
}

/// A shader, or the implicit mixin holding module-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedMixin {
    pub name: String,
    /// Direct bases, in declaration order
    pub bases: Vec<String>,
    pub compositions: Vec<Composition>,
    /// Struct types declared inside this mixin (or at module level)
    pub structs: Vec<SymbolType>,
    pub globals: Vec<TypedGlobal>,
    pub functions: Vec<TypedFunction>,
    /// True for the mixin synthesized from module-level declarations
    pub implicit: bool,
    pub span: Span,
}

impl TypedMixin {
    pub fn function(&self, name: &str) -> Option<&TypedFunction> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&TypedGlobal> {
        self.globals.iter().find(|global| global.name == name)
    }
}

/// `compose Mixin slot;`
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub name: String,
    pub mixin: String,
    pub is_array: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalKind {
    /// `static` module-private variable
    Variable,
    Stream,
    Constant,
    /// Member of the default uniform block
    Uniform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedGlobal {
    pub name: String,
    pub ty: SymbolType,
    pub kind: GlobalKind,
    pub semantic: Option<String>,
    /// Constant expression; checked before lowering
    pub initializer: Option<TypedExpr>,
    pub span: Span,
}

/// Local variable or parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub name: String,
    pub ty: SymbolType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedFunction {
    pub name: String,
    pub return_type: SymbolType,
    /// Parameters occupy the first `param_count` slots of `locals`.
    pub param_count: usize,
    pub locals: Vec<LocalVar>,
    pub semantic: Option<String>,
    /// `None` for abstract methods and forward declarations
    pub body: Option<Vec<TypedStmt>>,
    pub is_override: bool,
    pub span: Span,
}

impl TypedFunction {
    pub fn params(&self) -> &[LocalVar] {
        &self.locals[..self.param_count]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedEffect {
    pub name: String,
    pub items: Vec<EffectItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectItem {
    Mixin(String),
    Compose { slot: String, mixin: String },
    Child(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedStmt {
    Block(Vec<TypedStmt>),
    /// Local declaration with optional initializer
    Local {
        slot: u32,
        init: Option<TypedExpr>,
    },
    Expr(TypedExpr),
    Assign {
        target: TypedExpr,
        value: TypedExpr,
    },
    Return(Option<TypedExpr>),
    If {
        condition: TypedExpr,
        then: Box<TypedStmt>,
        otherwise: Option<Box<TypedStmt>>,
    },
    For {
        init: Option<Box<TypedStmt>>,
        condition: Option<TypedExpr>,
        step: Option<Box<TypedStmt>>,
        body: Box<TypedStmt>,
    },
    While {
        condition: TypedExpr,
        body: Box<TypedStmt>,
    },
    DoWhile {
        body: Box<TypedStmt>,
        condition: TypedExpr,
    },
    Break,
    Continue,
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: SymbolType,
    pub span: Span,
}

/// Literal constant after typing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

/// Callee of a resolved call.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// Function of a mixin; `index` points into that mixin's `functions`.
    /// A `base.f()` call is bound statically, any other call goes to the
    /// most derived override in the composed module.
    Function {
        mixin: String,
        name: String,
        index: usize,
        base: bool,
    },
    /// Built-in with an extended instruction number
    Intrinsic { name: String, number: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    Constant(Constant),
    Local(u32),
    /// Global or stream variable owned by `mixin`
    Global {
        mixin: String,
        name: String,
        stream: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<TypedExpr>,
    },
    /// `++x`, `--x`, `x++`, `x--`
    Step {
        target: Box<TypedExpr>,
        increment: bool,
        prefix: bool,
    },
    /// Operands already converted to the operator's element kind
    Binary {
        op: BinaryOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Ternary {
        condition: Box<TypedExpr>,
        then: Box<TypedExpr>,
        otherwise: Box<TypedExpr>,
    },
    Call {
        callee: Callee,
        args: Vec<TypedExpr>,
    },
    /// Constructor of `ty` from the flattened components of `args`
    Construct(Vec<TypedExpr>),
    /// Implicit or explicit conversion to `ty`
    Convert(Box<TypedExpr>),
    Swizzle {
        value: Box<TypedExpr>,
        components: Vec<u32>,
    },
    Field {
        value: Box<TypedExpr>,
        index: u32,
    },
    Index {
        value: Box<TypedExpr>,
        index: Box<TypedExpr>,
    },
    /// Reference to a mixin used as a qualifier
    MixinRef(String),
    /// Placeholder left where an error was reported
    Error,
}

impl TypedExpr {
    pub fn new(kind: TypedExprKind, ty: SymbolType, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn error(span: Span) -> Self {
        Self::new(TypedExprKind::Error, SymbolType::Unknown, span)
    }

    /// Whether this expression denotes a storage location.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            TypedExprKind::Local(_) | TypedExprKind::Global { .. } | TypedExprKind::Error => true,
            TypedExprKind::Swizzle { value, components } => {
                value.is_lvalue() && {
                    let mut seen = [false; 4];
                    components
                        .iter()
                        .all(|&c| !std::mem::replace(&mut seen[c as usize], true))
                }
            }
            TypedExprKind::Field { value, .. } | TypedExprKind::Index { value, .. } => {
                value.is_lvalue()
            }
            _ => false,
        }
    }

    /// Whether this expression can initialize a global at module scope.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            TypedExprKind::Constant(_) => true,
            TypedExprKind::Construct(args) => args.iter().all(TypedExpr::is_constant),
            TypedExprKind::Convert(inner) => {
                matches!(inner.kind, TypedExprKind::Constant(_))
            }
            TypedExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => matches!(operand.kind, TypedExprKind::Constant(_)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(slot: u32) -> TypedExpr {
        TypedExpr::new(
            TypedExprKind::Local(slot),
            SymbolType::builtin("float4").unwrap(),
            Span::zero(0),
        )
    }

    #[test]
    fn test_swizzle_lvalues_need_distinct_components() {
        let swizzle = |components: Vec<u32>| {
            TypedExpr::new(
                TypedExprKind::Swizzle {
                    value: Box::new(local(0)),
                    components,
                },
                SymbolType::builtin("float2").unwrap(),
                Span::zero(0),
            )
        };
        assert!(swizzle(vec![0, 1]).is_lvalue());
        assert!(!swizzle(vec![0, 0]).is_lvalue());
    }

    #[test]
    fn test_constant_expressions() {
        let one = TypedExpr::new(
            TypedExprKind::Constant(Constant::Float(1.0)),
            SymbolType::FLOAT,
            Span::zero(0),
        );
        let construct = TypedExpr::new(
            TypedExprKind::Construct(vec![one.clone(), one.clone()]),
            SymbolType::builtin("float2").unwrap(),
            Span::zero(0),
        );
        assert!(construct.is_constant());
        assert!(!local(0).is_constant());
    }
}
