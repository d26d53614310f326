//! Declaration nodes: namespaces, shaders, effects, structs, variables and
//! functions.

use super::expr::Expr;
use super::stmt::Block;
use crate::foundation::Span;
use serde::{Deserialize, Serialize};

/// Parsed source module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub declarations: Vec<Declaration>,
    pub span: Span,
}

/// Top-level (or namespace-level) declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    Namespace {
        name: String,
        declarations: Vec<Declaration>,
        span: Span,
    },
    Shader(ShaderDecl),
    Effect(EffectDecl),
    Struct(StructDecl),
    Variable(VariableDecl),
    Function(FunctionDecl),
    /// Region that failed to parse
    Error(Span),
}

/// `shader Name : Base1, Base2 { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderDecl {
    pub name: String,
    pub bases: Vec<(String, Span)>,
    pub members: Vec<ShaderMember>,
    pub span: Span,
}

/// Member of a shader body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShaderMember {
    Variable(VariableDecl),
    Method(FunctionDecl),
    Struct(StructDecl),
    Compose(ComposeDecl),
    Error(Span),
}

/// `compose Mixin name;` or `compose Mixin name[];`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeDecl {
    pub mixin: String,
    pub name: String,
    pub is_array: bool,
    pub span: Span,
}

/// Storage and inheritance modifiers on variables and methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub stage: bool,
    pub stream: bool,
    pub static_: bool,
    pub const_: bool,
    pub override_: bool,
    pub abstract_: bool,
    pub clone_: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        *self == Modifiers::default()
    }
}

/// Type reference as written in source (`float4`, `Light`, `float3x3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName {
    pub name: String,
    pub span: Span,
}

/// Variable, stream, field or local declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub modifiers: Modifiers,
    pub ty: TypeName,
    pub name: String,
    /// `[N]` after the name
    pub array_size: Option<Expr>,
    /// `: SEMANTIC`
    pub semantic: Option<String>,
    pub initializer: Option<Expr>,
    pub span: Span,
}

/// Function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub ty: TypeName,
    pub name: String,
    pub span: Span,
}

/// Function or method; `body` is `None` for abstract declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub modifiers: Modifiers,
    pub return_type: TypeName,
    pub name: String,
    pub params: Vec<Param>,
    pub semantic: Option<String>,
    pub body: Option<Block>,
    pub span: Span,
}

/// `struct Name { fields }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<VariableDecl>,
    pub span: Span,
}

/// `effect Name { statements }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDecl {
    pub name: String,
    pub statements: Vec<EffectStatement>,
    pub span: Span,
}

/// Statement inside an effect body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectStatement {
    /// `mixin Name;`
    Mixin { name: String, span: Span },
    /// `mixin compose slot = Name;`
    Compose {
        slot: String,
        mixin: String,
        span: Span,
    },
    /// `mixin clone;`
    Clone(Span),
    /// `mixin child Effect;`
    Child { effect: String, span: Span },
    Error(Span),
}

impl Declaration {
    pub fn span(&self) -> Span {
        match self {
            Declaration::Namespace { span, .. } => *span,
            Declaration::Shader(decl) => decl.span,
            Declaration::Effect(decl) => decl.span,
            Declaration::Struct(decl) => decl.span,
            Declaration::Variable(decl) => decl.span,
            Declaration::Function(decl) => decl.span,
            Declaration::Error(span) => *span,
        }
    }

    /// Declared name, if the declaration has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Namespace { name, .. } => Some(name),
            Declaration::Shader(decl) => Some(&decl.name),
            Declaration::Effect(decl) => Some(&decl.name),
            Declaration::Struct(decl) => Some(&decl.name),
            Declaration::Variable(decl) => Some(&decl.name),
            Declaration::Function(decl) => Some(&decl.name),
            Declaration::Error(_) => None,
        }
    }
}

impl Module {
    /// Iterate declarations with namespaces flattened, depth-first.
    pub fn flattened(&self) -> Vec<&Declaration> {
        fn collect<'a>(decls: &'a [Declaration], out: &mut Vec<&'a Declaration>) {
            for decl in decls {
                match decl {
                    Declaration::Namespace { declarations, .. } => collect(declarations, out),
                    other => out.push(other),
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.declarations, &mut out);
        out
    }

    /// Whether any declaration, member or statement failed to parse.
    pub fn has_errors(&self) -> bool {
        self.flattened().iter().any(|decl| match decl {
            Declaration::Error(_) => true,
            Declaration::Shader(shader) => shader
                .members
                .iter()
                .any(|member| matches!(member, ShaderMember::Error(_))),
            Declaration::Effect(effect) => effect
                .statements
                .iter()
                .any(|stmt| matches!(stmt, EffectStatement::Error(_))),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str) -> Declaration {
        Declaration::Variable(VariableDecl {
            modifiers: Modifiers::default(),
            ty: TypeName {
                name: "float".into(),
                span: Span::zero(0),
            },
            name: name.into(),
            array_size: None,
            semantic: None,
            initializer: None,
            span: Span::zero(0),
        })
    }

    #[test]
    fn test_flattened_descends_into_namespaces() {
        let module = Module {
            declarations: vec![
                variable("a"),
                Declaration::Namespace {
                    name: "Lighting".into(),
                    declarations: vec![variable("b")],
                    span: Span::zero(0),
                },
            ],
            span: Span::zero(0),
        };

        let names: Vec<_> = module.flattened().iter().filter_map(|d| d.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!module.has_errors());
    }

    #[test]
    fn test_modifiers_default_is_empty() {
        assert!(Modifiers::default().is_empty());
        let stream = Modifiers {
            stream: true,
            ..Modifiers::default()
        };
        assert!(!stream.is_empty());
    }
}
