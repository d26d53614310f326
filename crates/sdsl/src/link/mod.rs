//! Cross-mixin linking.
//!
//! Every mixin is lowered on its own. A function or global it uses from
//! another mixin is declared locally and decorated with an `Import`
//! linkage name; the owner decorates its definition with the same name as
//! `Export`. [`link`] then resolves imports against exports while
//! materializing the [`MixinGraph`](sdsl_spirv::MixinGraph), merging
//! duplicate types and constants along the way.
//!
//! A [`LinkPlan`] carries the decisions that need the whole composition:
//! which override a call dispatches to and the layout of the default
//! uniform block.

mod linker;
mod usage;

pub use linker::link;
pub use usage::{stream_usage, StreamUsage};

use sdsl_ast::Span;
use sdsl_resolve::typed::{GlobalKind, Program, TypedFunction, TypedMixin};
use sdsl_resolve::SymbolType;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Name of the default uniform block and of the mixin defining it.
pub const UNIFORM_BLOCK: &str = "Globals";

/// Linkage name of function `index` of `mixin`.
pub fn function_symbol(mixin: &str, name: &str, index: usize) -> String {
    format!("{}.{}#{}", mixin, name, index)
}

/// Linkage name of a global. A stream is shared by every mixin that
/// declares it, so its name carries no owner.
pub fn global_symbol(mixin: &str, name: &str, stream: bool) -> String {
    if stream {
        format!("streams.{}", name)
    } else {
        format!("{}.{}", mixin, name)
    }
}

/// One member of the default uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformMember {
    pub mixin: String,
    pub name: String,
    pub ty: SymbolType,
    pub span: Span,
}

impl UniformMember {
    /// Member name inside the block, `Mixin.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.mixin, self.name)
    }
}

/// Composition-wide facts every mixin is lowered against.
#[derive(Debug, Clone, Default)]
pub struct LinkPlan {
    /// `(mixin, function index)` → most derived implementation
    overrides: HashMap<(String, usize), (String, usize)>,
    uniforms: Vec<UniformMember>,
}

impl LinkPlan {
    /// Plan for the `selected` mixins, bases before dependents.
    pub fn new(program: &Program, selected: &[&TypedMixin]) -> Self {
        let mut overrides = HashMap::new();
        for mixin in selected {
            let ancestors = ancestors(program, mixin);
            for (index, function) in mixin.functions.iter().enumerate() {
                if !function.is_override || function.body.is_none() {
                    continue;
                }
                for ancestor in &ancestors {
                    for (base_index, base) in ancestor.functions.iter().enumerate() {
                        if same_signature(base, function) {
                            trace!(
                                function = %function.name,
                                from = %ancestor.name,
                                to = %mixin.name,
                                "override"
                            );
                            overrides.insert(
                                (ancestor.name.clone(), base_index),
                                (mixin.name.clone(), index),
                            );
                        }
                    }
                }
            }
        }

        let uniforms = selected
            .iter()
            .flat_map(|mixin| {
                mixin
                    .globals
                    .iter()
                    .filter(|global| global.kind == GlobalKind::Uniform)
                    .map(|global| UniformMember {
                        mixin: mixin.name.clone(),
                        name: global.name.clone(),
                        ty: global.ty.clone(),
                        span: global.span,
                    })
            })
            .collect();

        Self {
            overrides,
            uniforms,
        }
    }

    /// Function a virtual call to `(mixin, index)` lands on.
    pub fn implementation<'a>(&'a self, mixin: &'a str, index: usize) -> (&'a str, usize) {
        match self.overrides.get(&(mixin.to_string(), index)) {
            Some((owner, index)) => (owner.as_str(), *index),
            None => (mixin, index),
        }
    }

    pub fn uniforms(&self) -> &[UniformMember] {
        &self.uniforms
    }

    /// Index of a global in the default uniform block.
    pub fn uniform_index(&self, mixin: &str, name: &str) -> Option<u32> {
        self.uniforms
            .iter()
            .position(|member| member.mixin == mixin && member.name == name)
            .map(|index| index as u32)
    }

    /// Block type shared by every mixin reading a uniform.
    pub fn uniform_block_type(&self) -> SymbolType {
        SymbolType::Struct {
            name: UNIFORM_BLOCK.to_string(),
            fields: self
                .uniforms
                .iter()
                .map(|member| (member.qualified_name(), member.ty.clone()))
                .collect(),
        }
    }
}

/// Every ancestor of `mixin` known to `program`, nearest first.
fn ancestors<'p>(program: &'p Program, mixin: &TypedMixin) -> Vec<&'p TypedMixin> {
    let mut found = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&str> = mixin.bases.iter().map(String::as_str).collect();
    while let Some(name) = pending.pop() {
        let Some(base) = program.mixin(name) else {
            continue;
        };
        if !seen.insert(&base.name) {
            continue;
        }
        pending.extend(base.bases.iter().map(String::as_str));
        found.push(base);
    }
    found
}

fn same_signature(a: &TypedFunction, b: &TypedFunction) -> bool {
    a.name == b.name
        && a.return_type == b.return_type
        && a.param_count == b.param_count
        && a.params()
            .iter()
            .zip(b.params())
            .all(|(x, y)| x.ty == y.ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsl_resolve::typed::{LocalVar, TypedGlobal};

    fn function(name: &str, is_override: bool, params: &[SymbolType]) -> TypedFunction {
        TypedFunction {
            name: name.to_string(),
            return_type: SymbolType::FLOAT,
            param_count: params.len(),
            locals: params
                .iter()
                .enumerate()
                .map(|(index, ty)| LocalVar {
                    name: format!("p{}", index),
                    ty: ty.clone(),
                })
                .collect(),
            semantic: None,
            body: Some(Vec::new()),
            is_override,
            span: Span::zero(0),
        }
    }

    fn mixin(name: &str, bases: &[&str], functions: Vec<TypedFunction>) -> TypedMixin {
        TypedMixin {
            name: name.to_string(),
            bases: bases.iter().map(|base| base.to_string()).collect(),
            compositions: Vec::new(),
            structs: Vec::new(),
            globals: Vec::new(),
            functions,
            implicit: false,
            span: Span::zero(0),
        }
    }

    fn program() -> Program {
        let mut base = mixin(
            "Base",
            &[],
            vec![
                function("Shade", false, &[]),
                function("Scale", false, &[SymbolType::FLOAT]),
            ],
        );
        base.globals.push(TypedGlobal {
            name: "Gain".to_string(),
            ty: SymbolType::FLOAT,
            kind: GlobalKind::Uniform,
            semantic: None,
            initializer: None,
            span: Span::zero(0),
        });
        Program {
            mixins: vec![
                base,
                mixin(
                    "Lit",
                    &["Base"],
                    vec![
                        function("Shade", true, &[]),
                        function("Scale", true, &[SymbolType::INT]),
                    ],
                ),
                mixin("Shadowed", &["Lit"], vec![function("Shade", true, &[])]),
            ],
            effects: Vec::new(),
        }
    }

    #[test]
    fn test_most_derived_override_wins() {
        let program = program();
        let selected: Vec<&TypedMixin> = program.mixins.iter().collect();
        let plan = LinkPlan::new(&program, &selected);

        assert_eq!(plan.implementation("Base", 0), ("Shadowed", 0));
        assert_eq!(plan.implementation("Lit", 0), ("Shadowed", 0));
        assert_eq!(plan.implementation("Shadowed", 0), ("Shadowed", 0));
        // Different parameter types: not an override.
        assert_eq!(plan.implementation("Base", 1), ("Base", 1));
    }

    #[test]
    fn test_unselected_overrides_are_ignored() {
        let program = program();
        let selected: Vec<&TypedMixin> = program.mixins.iter().take(2).collect();
        let plan = LinkPlan::new(&program, &selected);
        assert_eq!(plan.implementation("Base", 0), ("Lit", 0));
    }

    #[test]
    fn test_uniform_block_members() {
        let program = program();
        let selected: Vec<&TypedMixin> = program.mixins.iter().collect();
        let plan = LinkPlan::new(&program, &selected);
        assert_eq!(plan.uniform_index("Base", "Gain"), Some(0));
        assert_eq!(plan.uniform_index("Lit", "Gain"), None);
        let SymbolType::Struct { name, fields } = plan.uniform_block_type() else {
            panic!("expected a struct");
        };
        assert_eq!(name, UNIFORM_BLOCK);
        assert_eq!(fields[0].0, "Base.Gain");
    }

    #[test]
    fn test_symbol_names() {
        assert_eq!(function_symbol("Base", "Shade", 2), "Base.Shade#2");
        assert_eq!(global_symbol("Base", "Color", true), "streams.Color");
        assert_eq!(global_symbol("Base", "Gain", false), "Base.Gain");
    }
}
