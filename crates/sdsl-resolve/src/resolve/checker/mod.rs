//! Type checker.
//!
//! Turns a parsed module into a typed [`Program`] while collecting
//! diagnostics. Checking never stops early: an erroneous expression is
//! replaced by a node of type [`SymbolType::Unknown`], and any operation on
//! `Unknown` is accepted silently so one mistake yields one diagnostic.
//!
//! # Passes
//!
//! 1. **Names** - shaders and effects are registered so declaration order
//!    does not matter for inheritance or effect references
//! 2. **Structs** - struct types are resolved in declaration order
//! 3. **Interfaces** - globals, streams, compositions and function
//!    signatures of every mixin; module-level declarations form an implicit
//!    mixin named after the module
//! 4. **Bodies** - global initializers and function bodies, with inherited
//!    symbols in an outer frame and the shader's own symbols above it
//! 5. **Effects** - effect statements are resolved against the declared
//!    shaders and effects
//!
//! # Scoping
//!
//! ```text
//! locals → shader members → inherited members (nearest base first) → module root → imported
//! ```

mod body;
mod expr;

use super::symbols::{Symbol, SymbolKind, SymbolProvider, SymbolTable};
use super::typed::{
    Composition, EffectItem, GlobalKind, Program, TypedEffect, TypedGlobal, TypedMixin,
};
use super::types::SymbolType;
use crate::error::{CompileError, ErrorKind};
use body::Body;
use indexmap::IndexMap;
use sdsl_ast::{
    Declaration, EffectDecl, EffectStatement, Expr, ExprKind, FunctionDecl, IntSuffix, Literal,
    Module, ShaderDecl, ShaderMember, Span, StructDecl, TypeName, VariableDecl,
};
use tracing::{debug, trace};

/// Result of [`check_module`]: the typed program and every diagnostic.
#[derive(Debug, Clone)]
pub struct Checked {
    pub program: Program,
    pub errors: Vec<CompileError>,
}

impl Checked {
    pub fn has_errors(&self) -> bool {
        crate::error::has_errors(&self.errors)
    }
}

/// Check a parsed module.
///
/// `module_name` names the implicit mixin holding module-level globals and
/// functions. When a shader already uses that name the implicit mixin is
/// called `<module_name>Globals`. `providers` are imported in order; the
/// first provider to define a name keeps it.
pub fn check_module(
    module: &Module,
    module_name: &str,
    providers: &[&dyn SymbolProvider],
) -> Checked {
    let mut table = SymbolTable::new();
    for provider in providers {
        let imported = table.import(*provider);
        trace!(imported, "imported provider symbols");
    }

    let mut checker = Checker {
        mixins: IndexMap::new(),
        errors: Vec::new(),
    };
    let declarations = module.flattened();
    let program = checker.run(&mut table, &declarations, module_name);

    debug!(
        module = module_name,
        mixins = program.mixins.len(),
        effects = program.effects.len(),
        errors = checker.errors.len(),
        "checked module"
    );

    Checked {
        program,
        errors: checker.errors,
    }
}

/// Exported interface of a mixin, known before any body is checked.
#[derive(Debug, Clone)]
pub(crate) struct MixinInfo {
    pub name: String,
    pub bases: Vec<String>,
    pub globals: IndexMap<String, Symbol>,
    pub functions: Vec<Symbol>,
    /// Stream variables this mixin declares itself
    pub streams: Vec<String>,
    /// Composition slot → composed mixin
    pub compositions: IndexMap<String, String>,
}

impl MixinInfo {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bases: Vec::new(),
            globals: IndexMap::new(),
            functions: Vec::new(),
            streams: Vec::new(),
            compositions: IndexMap::new(),
        }
    }
}

/// Ancestors of `name`, nearest first, each listed once.
///
/// The second value is true when `name` appears among its own ancestors.
pub(crate) fn ancestors(
    mixins: &IndexMap<String, MixinInfo>,
    name: &str,
) -> (Vec<String>, bool) {
    fn visit(
        mixins: &IndexMap<String, MixinInfo>,
        root: &str,
        current: &str,
        out: &mut Vec<String>,
        cyclic: &mut bool,
    ) {
        let Some(info) = mixins.get(current) else {
            return;
        };
        for base in &info.bases {
            if base == root {
                *cyclic = true;
            } else if !out.contains(base) {
                out.push(base.clone());
                visit(mixins, root, base, out, cyclic);
            }
        }
    }

    let mut out = Vec::new();
    let mut cyclic = false;
    visit(mixins, name, name, &mut out, &mut cyclic);
    (out, cyclic)
}

/// Members of one mixin collected by the interface pass.
struct MixinPlan<'a> {
    name: String,
    implicit: bool,
    span: Span,
    bases: Vec<String>,
    compositions: Vec<Composition>,
    structs: Vec<SymbolType>,
    globals: Vec<(&'a VariableDecl, Symbol, GlobalKind)>,
    functions: Vec<(&'a FunctionDecl, Symbol)>,
}

impl MixinPlan<'_> {
    fn new(name: &str, implicit: bool, span: Span) -> Self {
        Self {
            name: name.to_string(),
            implicit,
            span,
            bases: Vec::new(),
            compositions: Vec::new(),
            structs: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.structs.is_empty() && self.globals.is_empty() && self.functions.is_empty()
    }
}

struct Checker {
    mixins: IndexMap<String, MixinInfo>,
    errors: Vec<CompileError>,
}

impl Checker {
    fn error(&mut self, kind: ErrorKind, span: Span, message: String) {
        self.errors.push(CompileError::new(kind, span, message));
    }

    fn run(
        &mut self,
        table: &mut SymbolTable,
        declarations: &[&Declaration],
        module_name: &str,
    ) -> Program {
        let shaders = self.register_shaders(table, declarations);

        let implicit_name = if shaders.iter().any(|shader| shader.name == module_name) {
            format!("{}Globals", module_name)
        } else {
            module_name.to_string()
        };
        let module_span = declarations
            .first()
            .map(|decl| decl.span())
            .unwrap_or_else(|| Span::zero(0));

        let mut implicit = MixinPlan::new(&implicit_name, true, module_span);
        let mut plans: Vec<MixinPlan> = shaders
            .iter()
            .map(|shader| MixinPlan::new(&shader.name, false, shader.span))
            .collect();

        // Structs, in declaration order across the module.
        for decl in declarations {
            match decl {
                Declaration::Struct(decl) => {
                    let ty = self.resolve_struct(table, decl, &implicit_name);
                    implicit.structs.push(ty);
                }
                Declaration::Shader(shader) => {
                    let Some(plan) = plans.iter_mut().find(|plan| plan.span == shader.span) else {
                        continue;
                    };
                    for member in &shader.members {
                        if let ShaderMember::Struct(decl) = member {
                            let ty = self.resolve_struct(table, decl, &shader.name);
                            plan.structs.push(ty);
                        }
                    }
                }
                _ => {}
            }
        }

        self.build_implicit_interface(table, declarations, &mut implicit);
        for (shader, plan) in shaders.iter().copied().zip(plans.iter_mut()) {
            self.build_shader_interface(table, shader, plan);
        }
        for plan in &plans {
            let (_, cyclic) = ancestors(&self.mixins, &plan.name);
            if cyclic {
                self.error(
                    ErrorKind::UnresolvedMixin,
                    plan.span,
                    format!("shader '{}' inherits from itself", plan.name),
                );
            }
        }

        let effects: Vec<&EffectDecl> = declarations
            .iter()
            .filter_map(|decl| match decl {
                Declaration::Effect(effect) => Some(effect),
                _ => None,
            })
            .collect();

        let mut program = Program::default();
        if !implicit.is_empty() {
            program.mixins.push(self.check_mixin(table, &implicit));
        }
        for plan in &plans {
            program.mixins.push(self.check_mixin(table, plan));
        }
        program.effects = self.check_effects(&effects);
        program
    }

    /// Register shader names as mixin types; duplicates are dropped.
    fn register_shaders<'a>(
        &mut self,
        table: &mut SymbolTable,
        declarations: &[&'a Declaration],
    ) -> Vec<&'a ShaderDecl> {
        let mut shaders = Vec::new();
        for &decl in declarations {
            let Declaration::Shader(shader) = decl else {
                continue;
            };
            let symbol = Symbol::new(
                shader.name.clone(),
                SymbolKind::Type,
                SymbolType::Mixin {
                    name: shader.name.clone(),
                },
            )
            .at(shader.span);

            if let Err(existing) = table.declare_root(symbol) {
                let first = existing.span;
                self.errors.push(
                    CompileError::new(
                        ErrorKind::DuplicateName,
                        shader.span,
                        format!("duplicate definition of '{}'", shader.name),
                    )
                    .with_label(first, "first defined here".to_string()),
                );
                continue;
            }
            self.mixins
                .insert(shader.name.clone(), MixinInfo::new(&shader.name));
            shaders.push(shader);
        }
        shaders
    }

    /// Resolve a type name, reporting unknown names.
    fn resolve_type(&mut self, table: &SymbolTable, name: &TypeName) -> SymbolType {
        match lookup_type(table, &name.name) {
            Some(SymbolType::Mixin { name: mixin }) => {
                self.error(
                    ErrorKind::UnknownType,
                    name.span,
                    format!("'{}' is a mixin, not a type", mixin),
                );
                SymbolType::Unknown
            }
            Some(ty) => ty,
            None => {
                self.error(
                    ErrorKind::UnknownType,
                    name.span,
                    format!("unknown type '{}'", name.name),
                );
                SymbolType::Unknown
            }
        }
    }

    /// Declared type of a variable, including its array dimension.
    fn variable_type(&mut self, table: &SymbolTable, var: &VariableDecl) -> SymbolType {
        let element = self.resolve_type(table, &var.ty);
        let Some(size) = &var.array_size else {
            return element;
        };
        match array_length(size) {
            Some(length) => SymbolType::Array {
                element: Box::new(element),
                length: Some(length),
            },
            None => {
                self.error(
                    ErrorKind::TypeMismatch,
                    size.span,
                    format!(
                        "array size of '{}' must be a positive integer literal",
                        var.name
                    ),
                );
                SymbolType::Unknown
            }
        }
    }

    fn resolve_struct(
        &mut self,
        table: &mut SymbolTable,
        decl: &StructDecl,
        owner: &str,
    ) -> SymbolType {
        let mut fields: Vec<(String, SymbolType)> = Vec::new();
        for field in &decl.fields {
            let ty = self.variable_type(table, field);
            if fields.iter().any(|(name, _)| name == &field.name) {
                self.error(
                    ErrorKind::DuplicateName,
                    field.span,
                    format!("duplicate field '{}' in struct '{}'", field.name, decl.name),
                );
                continue;
            }
            fields.push((field.name.clone(), ty));
        }

        let ty = SymbolType::Struct {
            name: decl.name.clone(),
            fields,
        };
        let symbol = Symbol::new(decl.name.clone(), SymbolKind::Type, ty.clone())
            .in_mixin(owner)
            .at(decl.span);
        if let Err(existing) = table.declare_root(symbol) {
            let first = existing.span;
            self.errors.push(
                CompileError::new(
                    ErrorKind::DuplicateName,
                    decl.span,
                    format!("duplicate definition of type '{}'", decl.name),
                )
                .with_label(first, "first defined here".to_string()),
            );
        }
        ty
    }

    fn function_symbol(
        &mut self,
        table: &SymbolTable,
        decl: &FunctionDecl,
        mixin: &str,
        index: usize,
    ) -> Symbol {
        let ret = self.resolve_type(table, &decl.return_type);
        let params = decl
            .params
            .iter()
            .map(|param| self.resolve_type(table, &param.ty))
            .collect();
        Symbol::new(
            decl.name.clone(),
            SymbolKind::Function,
            SymbolType::Function {
                ret: Box::new(ret),
                params,
            },
        )
        .in_mixin(mixin)
        .with_slot(index as u32)
        .at(decl.span)
    }

    fn global_kind(var: &VariableDecl) -> GlobalKind {
        if var.modifiers.stream {
            GlobalKind::Stream
        } else if var.modifiers.const_ {
            GlobalKind::Constant
        } else if var.modifiers.static_ {
            GlobalKind::Variable
        } else {
            GlobalKind::Uniform
        }
    }

    fn add_global<'a>(
        &mut self,
        table: &mut SymbolTable,
        var: &'a VariableDecl,
        plan: &mut MixinPlan<'a>,
        info: &mut MixinInfo,
    ) {
        let ty = self.variable_type(table, var);
        let kind = Self::global_kind(var);
        let symbol = Symbol::new(var.name.clone(), SymbolKind::Variable, ty)
            .in_mixin(&plan.name)
            .at(var.span);

        if kind == GlobalKind::Stream {
            info.streams.push(var.name.clone());
            if let Err(existing) = table.declare_stream(symbol.clone()) {
                // The same stream declared by several mixins is one stream.
                if existing.ty != symbol.ty {
                    let (first, first_ty) = (existing.span, existing.ty.clone());
                    self.errors.push(
                        CompileError::new(
                            ErrorKind::DuplicateName,
                            var.span,
                            format!(
                                "stream '{}' redeclared as '{}', previously '{}'",
                                var.name, symbol.ty, first_ty
                            ),
                        )
                        .with_label(first, "first declared here".to_string()),
                    );
                    return;
                }
            }
        } else if let Some(existing) = info.globals.get(&var.name) {
            let first = existing.span;
            self.errors.push(
                CompileError::new(
                    ErrorKind::DuplicateName,
                    var.span,
                    format!("duplicate definition of '{}'", var.name),
                )
                .with_label(first, "first defined here".to_string()),
            );
            return;
        } else {
            info.globals.insert(var.name.clone(), symbol.clone());
        }
        plan.globals.push((var, symbol, kind));
    }

    fn add_function<'a>(
        &mut self,
        table: &SymbolTable,
        decl: &'a FunctionDecl,
        plan: &mut MixinPlan<'a>,
        info: &mut MixinInfo,
    ) -> Option<Symbol> {
        let symbol = self.function_symbol(table, decl, &plan.name, plan.functions.len());
        let params = |s: &Symbol| s.signature().map(|(_, params)| params.to_vec());
        if let Some(existing) = info
            .functions
            .iter()
            .find(|existing| existing.name == symbol.name && params(existing) == params(&symbol))
        {
            let first = existing.span;
            self.errors.push(
                CompileError::new(
                    ErrorKind::DuplicateName,
                    decl.span,
                    format!("duplicate definition of function '{}'", decl.name),
                )
                .with_label(first, "first defined here".to_string()),
            );
            return None;
        }
        info.functions.push(symbol.clone());
        plan.functions.push((decl, symbol.clone()));
        Some(symbol)
    }

    fn build_implicit_interface<'a>(
        &mut self,
        table: &mut SymbolTable,
        declarations: &[&'a Declaration],
        plan: &mut MixinPlan<'a>,
    ) {
        let mut info = MixinInfo::new(&plan.name);
        for &decl in declarations {
            match decl {
                Declaration::Variable(var) => {
                    self.add_global(table, var, plan, &mut info);
                    if let Some((_, symbol, _)) = plan.globals.last().filter(|(decl, _, kind)| {
                        std::ptr::eq(*decl, var) && *kind != GlobalKind::Stream
                    }) {
                        let _ = table.declare_root(symbol.clone());
                    }
                }
                Declaration::Function(function) => {
                    if let Some(symbol) = self.add_function(table, function, plan, &mut info) {
                        let _ = table.declare_root(symbol);
                    }
                }
                _ => {}
            }
        }
        self.mixins.insert(plan.name.clone(), info);
    }

    fn build_shader_interface<'a>(
        &mut self,
        table: &mut SymbolTable,
        shader: &'a ShaderDecl,
        plan: &mut MixinPlan<'a>,
    ) {
        let mut info = MixinInfo::new(&shader.name);

        for (base, span) in &shader.bases {
            if self.mixins.contains_key(base) {
                info.bases.push(base.clone());
            } else {
                self.error(
                    ErrorKind::UnresolvedMixin,
                    *span,
                    format!(
                        "shader '{}' inherits from unknown mixin '{}'",
                        shader.name, base
                    ),
                );
            }
        }

        for member in &shader.members {
            match member {
                ShaderMember::Variable(var) => self.add_global(table, var, plan, &mut info),
                ShaderMember::Method(method) => {
                    self.add_function(table, method, plan, &mut info);
                }
                ShaderMember::Compose(compose) => {
                    if !self.mixins.contains_key(&compose.mixin) {
                        self.error(
                            ErrorKind::UnresolvedMixin,
                            compose.span,
                            format!(
                                "shader '{}' composes unknown mixin '{}'",
                                shader.name, compose.mixin
                            ),
                        );
                        continue;
                    }
                    if info.compositions.contains_key(&compose.name)
                        || info.globals.contains_key(&compose.name)
                    {
                        self.error(
                            ErrorKind::DuplicateName,
                            compose.span,
                            format!("duplicate definition of '{}'", compose.name),
                        );
                        continue;
                    }
                    info.compositions
                        .insert(compose.name.clone(), compose.mixin.clone());
                    plan.compositions.push(Composition {
                        name: compose.name.clone(),
                        mixin: compose.mixin.clone(),
                        is_array: compose.is_array,
                    });
                }
                ShaderMember::Struct(_) | ShaderMember::Error(_) => {}
            }
        }

        plan.bases = info.bases.clone();
        self.mixins.insert(shader.name.clone(), info);
    }

    /// Check initializers and bodies of one mixin.
    fn check_mixin(&mut self, table: &mut SymbolTable, plan: &MixinPlan) -> TypedMixin {
        let (ancestors, _) = ancestors(&self.mixins, &plan.name);

        let mut inherited = table.scope();
        if !plan.implicit {
            for ancestor in &ancestors {
                let Some(info) = self.mixins.get(ancestor) else {
                    continue;
                };
                declare_members(&mut inherited, info);
            }
        }

        let mut own = inherited.scope();
        if let Some(info) = self.mixins.get(&plan.name).filter(|_| !plan.implicit) {
            declare_members(&mut own, info);
        }

        let mut body = Body::new(&self.mixins, &mut self.errors, &plan.name, &ancestors);

        let globals = plan
            .globals
            .iter()
            .map(|(decl, symbol, kind)| TypedGlobal {
                name: decl.name.clone(),
                ty: symbol.ty.clone(),
                kind: *kind,
                semantic: decl.semantic.clone(),
                initializer: decl
                    .initializer
                    .as_ref()
                    .map(|init| body.global_initializer(&own, &decl.name, init, &symbol.ty)),
                span: decl.span,
            })
            .collect();

        let functions = plan
            .functions
            .iter()
            .map(|(decl, symbol)| body.check_function(&mut own, decl, symbol))
            .collect();

        trace!(mixin = %plan.name, "checked mixin bodies");

        TypedMixin {
            name: plan.name.clone(),
            bases: plan.bases.clone(),
            compositions: plan.compositions.clone(),
            structs: plan.structs.clone(),
            globals,
            functions,
            implicit: plan.implicit,
            span: plan.span,
        }
    }

    fn check_effects(&mut self, effects: &[&EffectDecl]) -> Vec<TypedEffect> {
        let mut names: IndexMap<&str, Span> = IndexMap::new();
        let mut unique = Vec::new();
        for effect in effects {
            if let Some(first) = names.get(effect.name.as_str()) {
                let first = *first;
                self.errors.push(
                    CompileError::new(
                        ErrorKind::DuplicateName,
                        effect.span,
                        format!("duplicate definition of effect '{}'", effect.name),
                    )
                    .with_label(first, "first defined here".to_string()),
                );
                continue;
            }
            if self.mixins.contains_key(&effect.name) {
                self.error(
                    ErrorKind::DuplicateName,
                    effect.span,
                    format!("effect '{}' has the same name as a shader", effect.name),
                );
            }
            names.insert(&effect.name, effect.span);
            unique.push(*effect);
        }

        let mut typed = Vec::new();
        for effect in unique {
            let mut items = Vec::new();
            for statement in &effect.statements {
                match statement {
                    EffectStatement::Mixin { name, span } => {
                        if self.require_shader(&effect.name, name, *span) {
                            items.push(EffectItem::Mixin(name.clone()));
                        }
                    }
                    EffectStatement::Compose { slot, mixin, span } => {
                        if self.require_shader(&effect.name, mixin, *span) {
                            items.push(EffectItem::Compose {
                                slot: slot.clone(),
                                mixin: mixin.clone(),
                            });
                        }
                    }
                    EffectStatement::Clone(span) => self.error(
                        ErrorKind::UnresolvedMixin,
                        *span,
                        format!(
                            "effect '{}': 'mixin clone' is not supported, each mixin is composed once",
                            effect.name
                        ),
                    ),
                    EffectStatement::Child { effect: child, span } => {
                        if names.contains_key(child.as_str()) {
                            items.push(EffectItem::Child(child.clone()));
                        } else {
                            self.error(
                                ErrorKind::UnresolvedMixin,
                                *span,
                                format!(
                                    "effect '{}' includes unknown effect '{}'",
                                    effect.name, child
                                ),
                            );
                        }
                    }
                    EffectStatement::Error(_) => {}
                }
            }
            typed.push(TypedEffect {
                name: effect.name.clone(),
                items,
                span: effect.span,
            });
        }
        typed
    }

    fn require_shader(&mut self, effect: &str, shader: &str, span: Span) -> bool {
        let known = self.mixins.contains_key(shader);
        if !known {
            self.error(
                ErrorKind::UnresolvedMixin,
                span,
                format!("effect '{}' mixes unknown shader '{}'", effect, shader),
            );
        }
        known
    }
}

/// Declare a mixin's globals, functions and compositions in the current
/// frame. Names already present in the frame keep their first meaning.
fn declare_members(table: &mut SymbolTable, info: &MixinInfo) {
    for global in info.globals.values() {
        let _ = table.declare(global.clone());
    }
    for function in &info.functions {
        let _ = table.declare(function.clone());
    }
    for (slot, mixin) in &info.compositions {
        let _ = table.declare(
            Symbol::new(
                slot.clone(),
                SymbolKind::Composition,
                SymbolType::Mixin {
                    name: mixin.clone(),
                },
            )
            .in_mixin(&info.name),
        );
    }
}

/// Built-in, struct or imported type named `name`.
pub(crate) fn lookup_type(table: &SymbolTable, name: &str) -> Option<SymbolType> {
    SymbolType::builtin(name)
        .or_else(|| table.try_find(name, SymbolKind::Type).map(|s| s.ty.clone()))
}

/// Length of a fixed array dimension (`[4]`).
fn array_length(size: &Expr) -> Option<u32> {
    match &size.kind {
        ExprKind::Literal(Literal::Int {
            value,
            suffix: IntSuffix::None | IntSuffix::Unsigned,
        }) if *value > 0 => u32::try_from(*value).ok(),
        _ => None,
    }
}
