//! Lowering: typed mixin → word buffer.
//!
//! Each mixin lowers on its own, with ids starting at 1, so that frozen
//! mixins can later be stitched together by a `MixinGraph`.
//!
//! # Sections
//!
//! Types, constants, globals and names are written to a declaration
//! buffer, imported function declarations to a second one and function
//! code to a third. All three share one id bound and are concatenated and
//! sorted into canonical section order at the end, so an expression may
//! introduce a type at any point.
//!
//! # Cross-mixin references
//!
//! Every function with a body and every module-private global or stream
//! is exported under its [`link`](crate::link) name. A call or a global
//! owned by another mixin is declared locally with an `Import` linkage
//! and resolved when the module is linked. Calls dispatch through the
//! [`LinkPlan`]: `base.f()` is static, any other call lands on the most
//! derived override among the composed mixins.

mod expr;
mod interface;
mod stmt;
mod types;
mod uniforms;

pub use interface::lower_entry;
pub use uniforms::lower_uniform_block;

use crate::link::{function_symbol, global_symbol, LinkPlan, UNIFORM_BLOCK};
use sdsl_ast::Span;
use sdsl_resolve::typed::{GlobalKind, TypedFunction, TypedGlobal, TypedMixin};
use sdsl_resolve::{CompileError, ErrorKind, SymbolType};
use sdsl_spirv::spirv::{Capability, FunctionControl, LinkageType, StorageClass};
use sdsl_spirv::{Id, WordBuffer};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// Output of [`lower_mixin`] and the synthesized mixins.
#[derive(Debug, Clone)]
pub struct Lowered {
    /// Instructions in canonical section order
    pub buffer: WordBuffer,
    pub errors: Vec<CompileError>,
}

/// Lower one checked mixin against the composition-wide `plan`.
#[instrument(skip_all, fields(mixin = %mixin.name))]
pub fn lower_mixin(mixin: &TypedMixin, plan: &LinkPlan) -> Lowered {
    let mut lowerer = Lowerer::new(mixin, plan);

    for ty in &mixin.structs {
        lowerer.span = mixin.span;
        lowerer.type_id(ty);
    }
    for global in &mixin.globals {
        lowerer.global_variable(global);
    }

    let mut functions = Vec::with_capacity(mixin.functions.len());
    for _ in &mixin.functions {
        functions.push(lowerer.code().reserve_id());
    }
    lowerer.functions = functions;
    for (index, function) in mixin.functions.iter().enumerate() {
        if function.body.is_some() {
            lowerer.function(index, function);
        }
    }

    lowerer.finish()
}

/// Empty mixin standing in for compiler-generated code.
pub(crate) fn synthetic(name: &str) -> TypedMixin {
    TypedMixin {
        name: name.to_string(),
        bases: Vec::new(),
        compositions: Vec::new(),
        structs: Vec::new(),
        globals: Vec::new(),
        functions: Vec::new(),
        implicit: false,
        span: Span::zero(0),
    }
}

/// Pointer to a hoisted local, keyed by slot.
type Locals = Vec<Option<Id>>;

#[derive(Debug, Clone, Copy)]
struct LoopTargets {
    merge: Id,
    continue_target: Id,
}

/// Per-function lowering state.
#[derive(Debug, Default)]
struct FunctionState {
    locals: Locals,
    loops: Vec<LoopTargets>,
    /// Current block already ends in a terminator
    terminated: bool,
}

pub(crate) struct Lowerer<'m> {
    mixin: &'m TypedMixin,
    plan: &'m LinkPlan,
    decls: WordBuffer,
    imports: WordBuffer,
    code: WordBuffer,

    types: HashMap<SymbolType, Id>,
    pointers: HashMap<(u32, Id), Id>,
    function_types: HashMap<(Id, Vec<Id>), Id>,
    constants: HashMap<(Id, u64), Id>,
    composites: HashMap<(Id, Vec<Id>), Id>,
    capabilities: HashSet<u32>,
    glsl: Option<Id>,

    /// `(owning mixin, name, stream)` → pointer; streams have no owner
    globals: HashMap<(String, String, bool), Id>,
    /// Imported function declarations by linkage name
    imported: HashMap<String, Id>,
    uniform_block: Option<Id>,
    /// Reserved id per function index
    functions: Vec<Id>,
    function: FunctionState,

    errors: Vec<CompileError>,
    /// Location blamed by diagnostics raised while lowering
    span: Span,
}

impl<'m> Lowerer<'m> {
    fn new(mixin: &'m TypedMixin, plan: &'m LinkPlan) -> Self {
        Self {
            mixin,
            plan,
            decls: WordBuffer::new(),
            imports: WordBuffer::new(),
            code: WordBuffer::new(),
            types: HashMap::new(),
            pointers: HashMap::new(),
            function_types: HashMap::new(),
            constants: HashMap::new(),
            composites: HashMap::new(),
            capabilities: HashSet::new(),
            glsl: None,
            globals: HashMap::new(),
            imported: HashMap::new(),
            uniform_block: None,
            functions: Vec::new(),
            function: FunctionState::default(),
            errors: Vec::new(),
            span: mixin.span,
        }
    }

    fn bound(&self) -> u32 {
        self.decls
            .bound()
            .max(self.imports.bound())
            .max(self.code.bound())
    }

    /// Declaration section, with the bound caught up to the other buffers.
    fn decl(&mut self) -> &mut WordBuffer {
        let bound = self.bound();
        self.decls.extend_bound(bound);
        &mut self.decls
    }

    /// Imported function declarations.
    fn imports(&mut self) -> &mut WordBuffer {
        let bound = self.bound();
        self.imports.extend_bound(bound);
        &mut self.imports
    }

    /// Function code.
    fn code(&mut self) -> &mut WordBuffer {
        let bound = self.bound();
        self.code.extend_bound(bound);
        &mut self.code
    }

    fn error(&mut self, kind: ErrorKind, message: String) {
        self.errors.push(CompileError::new(kind, self.span, message));
    }

    /// Report a construct the binary layer cannot express.
    fn unsupported<T>(&mut self, what: impl Into<String>) -> Option<T> {
        let what = what.into();
        self.error(
            ErrorKind::TypeMismatch,
            format!("{} cannot be lowered to SPIR-V", what),
        );
        None
    }

    /// Report a tree shape the checker should have rejected.
    fn internal<T>(&mut self, message: impl Into<String>) -> Option<T> {
        self.error(ErrorKind::Internal, message.into());
        None
    }

    fn require(&mut self, capability: Capability) {
        if self.capabilities.insert(capability as u32) {
            self.decl().capability(capability);
        }
    }

    fn glsl(&mut self) -> Id {
        if let Some(id) = self.glsl {
            return id;
        }
        let id = self.decl().ext_inst_import("GLSL.std.450");
        self.glsl = Some(id);
        id
    }

    fn link_symbol(&mut self, target: Id, symbol: &str, kind: LinkageType) {
        self.require(Capability::Linkage);
        self.decl().decorate_linkage(target, symbol, kind);
    }

    fn global_variable(&mut self, global: &TypedGlobal) {
        if global.kind == GlobalKind::Uniform {
            return;
        }
        self.span = global.span;
        let Some(ty) = self.type_id(&global.ty) else {
            return;
        };
        let initializer = match &global.initializer {
            Some(init) => match self.constant_expr(init) {
                Some(id) => Some(id),
                None => return,
            },
            None => None,
        };

        let pointer = self.pointer_type(StorageClass::Private, ty);
        let variable = self
            .decl()
            .variable(pointer, StorageClass::Private, initializer);
        let stream = global.kind == GlobalKind::Stream;
        let name = if stream {
            format!("streams.{}", global.name)
        } else {
            global.name.clone()
        };
        self.decl().name(variable, &name);
        let symbol = global_symbol(&self.mixin.name, &global.name, stream);
        self.link_symbol(variable, &symbol, LinkageType::Export);

        let owner = if stream { "" } else { self.mixin.name.as_str() };
        self.globals
            .insert((owner.to_string(), global.name.clone(), stream), variable);
    }

    /// Pointer to a private global or stream, importing foreign ones.
    fn global(&mut self, mixin: &str, name: &str, stream: bool, ty: &SymbolType) -> Option<Id> {
        let owner = if stream { "" } else { mixin };
        let key = (owner.to_string(), name.to_string(), stream);
        if let Some(&id) = self.globals.get(&key) {
            return Some(id);
        }
        if mixin == self.mixin.name && !stream {
            return self.internal(format!("global '{}' was never declared", name));
        }

        let value = self.type_id(ty)?;
        let pointer = self.pointer_type(StorageClass::Private, value);
        let variable = self.decl().variable(pointer, StorageClass::Private, None);
        let symbol = global_symbol(mixin, name, stream);
        trace!(symbol = %symbol, "imported global");
        self.link_symbol(variable, &symbol, LinkageType::Import);
        self.globals.insert(key, variable);
        Some(variable)
    }

    /// Declaration of a function defined elsewhere.
    fn import_function(&mut self, symbol: String, ret: &SymbolType, params: &[SymbolType]) -> Option<Id> {
        if let Some(&id) = self.imported.get(&symbol) {
            return Some(id);
        }
        let ret = self.type_id(ret)?;
        let mut param_types = Vec::with_capacity(params.len());
        for param in params {
            param_types.push(self.type_id(param)?);
        }
        let fn_ty = self.function_type(ret, &param_types);

        let function = self.imports().function(ret, FunctionControl::NONE, fn_ty);
        for &ty in &param_types {
            self.imports().function_parameter(ty);
        }
        self.imports().function_end();
        trace!(symbol = %symbol, "imported function");
        self.link_symbol(function, &symbol, LinkageType::Import);
        self.imported.insert(symbol, function);
        Some(function)
    }

    /// The default uniform block, declared on first use.
    fn uniform_block(&mut self) -> Option<Id> {
        if let Some(id) = self.uniform_block {
            return Some(id);
        }
        let block = self.plan.uniform_block_type();
        let ty = self.type_id(&block)?;
        let pointer = self.pointer_type(StorageClass::Uniform, ty);
        let variable = self.decl().variable(pointer, StorageClass::Uniform, None);
        self.link_symbol(variable, UNIFORM_BLOCK, LinkageType::Import);
        self.uniform_block = Some(variable);
        Some(variable)
    }

    fn function(&mut self, index: usize, function: &TypedFunction) {
        self.span = function.span;
        let id = self.functions[index];
        let Some(body) = &function.body else {
            return;
        };

        let Some(ret) = self.type_id(&function.return_type) else {
            return;
        };
        let mut params = Vec::with_capacity(function.param_count);
        for param in function.params() {
            let Some(ty) = self.type_id(&param.ty) else {
                return;
            };
            params.push(ty);
        }
        let fn_ty = self.function_type(ret, &params);

        self.code()
            .function_with_id(id, ret, FunctionControl::NONE, fn_ty);
        self.decl().name(id, &function.name);
        let symbol = function_symbol(&self.mixin.name, &function.name, index);
        self.link_symbol(id, &symbol, LinkageType::Export);
        let mut param_ids = Vec::with_capacity(params.len());
        for (param, &ty) in function.params().iter().zip(&params) {
            let param_id = self.code().function_parameter(ty);
            self.decl().name(param_id, &param.name);
            param_ids.push(param_id);
        }

        self.function = FunctionState::default();
        self.code().label();

        // Every local lives in the entry block.
        for local in &function.locals {
            let pointer = match self.type_id(&local.ty) {
                Some(ty) => {
                    let pointer_ty = self.pointer_type(StorageClass::Function, ty);
                    let variable = self
                        .code()
                        .variable(pointer_ty, StorageClass::Function, None);
                    self.decl().name(variable, &local.name);
                    Some(variable)
                }
                None => None,
            };
            self.function.locals.push(pointer);
        }
        for (slot, param_id) in param_ids.iter().enumerate() {
            if let Some(Some(variable)) = self.function.locals.get(slot).copied() {
                self.code().store(variable, *param_id);
            }
        }

        for stmt in body {
            self.statement(stmt);
        }
        if !self.function.terminated {
            if function.return_type.is_void() {
                self.code().ret();
            } else {
                self.code().unreachable();
            }
        }
        self.code().function_end();
    }

    fn finish(mut self) -> Lowered {
        let bound = self.bound();
        self.decls.extend_bound(bound);
        let imports = std::mem::take(&mut self.imports);
        let code = std::mem::take(&mut self.code);
        self.decls.append(&imports);
        self.decls.append(&code);
        let buffer = self.decls.sorted();
        debug!(
            instructions = buffer.len(),
            bound = buffer.bound(),
            imports = self.imported.len(),
            errors = self.errors.len(),
            "lowered mixin"
        );
        Lowered {
            buffer,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsl_spirv::spirv::Op;

    fn mixin(functions: Vec<TypedFunction>) -> TypedMixin {
        TypedMixin {
            globals: vec![TypedGlobal {
                name: "Gain".to_string(),
                ty: SymbolType::FLOAT,
                kind: GlobalKind::Stream,
                semantic: None,
                initializer: None,
                span: Span::zero(0),
            }],
            functions,
            ..synthetic("Shading")
        }
    }

    fn main_function(body: Option<Vec<sdsl_resolve::typed::TypedStmt>>) -> TypedFunction {
        TypedFunction {
            name: "PSMain".to_string(),
            return_type: SymbolType::Void,
            param_count: 0,
            locals: Vec::new(),
            semantic: None,
            body,
            is_override: false,
            span: Span::zero(0),
        }
    }

    fn lower(function: TypedFunction) -> Lowered {
        lower_mixin(&mixin(vec![function]), &LinkPlan::default())
    }

    fn ops(buffer: &WordBuffer) -> Vec<Op> {
        buffer
            .instructions()
            .filter_map(|instruction| instruction.opcode())
            .collect()
    }

    #[test]
    fn test_empty_void_function_returns() {
        let lowered = lower(main_function(Some(Vec::new())));
        assert!(lowered.errors.is_empty());
        let ops = ops(&lowered.buffer);
        let tail = &ops[ops.len() - 4..];
        assert_eq!(tail, &[Op::Function, Op::Label, Op::Return, Op::FunctionEnd]);
        lowered.buffer.validate_layout().unwrap();
    }

    #[test]
    fn test_definitions_are_exported() {
        let lowered = lower(main_function(Some(Vec::new())));
        let exports: Vec<String> = lowered
            .buffer
            .instructions()
            .filter_map(|instruction| instruction.linkage())
            .filter(|(_, _, kind)| *kind == LinkageType::Export)
            .map(|(_, name, _)| name)
            .collect();
        assert_eq!(exports, vec!["streams.Gain", "Shading.PSMain#0"]);
        assert_eq!(
            ops(&lowered.buffer).iter().filter(|&&op| op == Op::Capability).count(),
            1
        );
    }

    #[test]
    fn test_functions_without_body_are_not_emitted() {
        let lowered = lower(main_function(None));
        assert!(lowered.errors.is_empty());
        assert!(!ops(&lowered.buffer).contains(&Op::Function));
    }
}
