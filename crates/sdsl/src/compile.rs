//! Compile API: source text in, SPIR-V module or diagnostics out.
//!
//! # Pipeline
//!
//! ```text
//! Preprocess → Parse → Check → Select mixins → Lower each → Graph → Link → Words
//! ```
//!
//! Lowering produces, in graph order, the prelude, the default uniform
//! block when any global is a uniform, every selected mixin, and the
//! entry wrapper when an entry point is requested.
//!
//! Parse errors stop the pipeline before checking; checking errors stop it
//! before lowering; lowering errors stop it before linking. Any
//! error-severity diagnostic means no module.

use crate::compose::select_mixins;
use crate::hash::fnv1a64_words;
use crate::link::{link, LinkPlan};
use crate::lower::{lower_entry, lower_mixin, lower_uniform_block, Lowered};
use indexmap::IndexMap;
use sdsl_ast::SourceMap;
use sdsl_resolve::error::has_errors;
use sdsl_resolve::{check_module, CompileError, DiagnosticFormatter, SymbolProvider};
use sdsl_spirv::spirv::{AddressingModel, Capability, ExecutionModel, MemoryModel};
use sdsl_spirv::{disassemble_module, EncodingError, Mixin, MixinGraph, Word, WordBuffer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Shader stage of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
    Geometry,
    Hull,
    Domain,
    Compute,
}

impl Stage {
    pub fn execution_model(self) -> ExecutionModel {
        match self {
            Stage::Vertex => ExecutionModel::Vertex,
            Stage::Fragment => ExecutionModel::Fragment,
            Stage::Geometry => ExecutionModel::Geometry,
            Stage::Hull => ExecutionModel::TessellationControl,
            Stage::Domain => ExecutionModel::TessellationEvaluation,
            Stage::Compute => ExecutionModel::GLCompute,
        }
    }

    /// Capability the stage needs beyond `Shader`.
    fn capability(self) -> Option<Capability> {
        match self {
            Stage::Geometry => Some(Capability::Geometry),
            Stage::Hull | Stage::Domain => Some(Capability::Tessellation),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
            Stage::Geometry => "geometry",
            Stage::Hull => "hull",
            Stage::Domain => "domain",
            Stage::Compute => "compute",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    /// Full names or the usual two-letter abbreviations, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "vertex" | "vs" => Stage::Vertex,
            "fragment" | "pixel" | "ps" | "fs" => Stage::Fragment,
            "geometry" | "gs" => Stage::Geometry,
            "hull" | "hs" => Stage::Hull,
            "domain" | "ds" => Stage::Domain,
            "compute" | "cs" => Stage::Compute,
            _ => return Err(format!("unknown shader stage '{}'", s)),
        })
    }
}

/// Function to declare as the module's entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub stage: Stage,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, stage: Stage) -> Self {
        Self {
            name: name.into(),
            stage,
        }
    }
}

/// Everything a compilation needs. Built with chained setters:
///
/// ```
/// use sdsl::{CompileRequest, EntryPoint, Stage};
///
/// let request = CompileRequest::new("Demo", "shader Demo { void main() {} }")
///     .entry_point(EntryPoint::new("main", Stage::Fragment))
///     .define("QUALITY", "2");
/// assert_eq!(request.module_name(), "Demo");
/// ```
pub struct CompileRequest<'a> {
    module_name: String,
    source: String,
    file_name: String,
    effect: Option<String>,
    entry_point: Option<EntryPoint>,
    macros: IndexMap<String, String>,
    providers: Vec<&'a dyn SymbolProvider>,
}

impl<'a> CompileRequest<'a> {
    pub fn new(module_name: impl Into<String>, source: impl Into<String>) -> Self {
        let module_name = module_name.into();
        Self {
            file_name: format!("{}.sdsl", module_name),
            module_name,
            source: source.into(),
            effect: None,
            entry_point: None,
            macros: IndexMap::new(),
            providers: Vec::new(),
        }
    }

    /// Name used for the source in diagnostics.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn effect(mut self, name: impl Into<String>) -> Self {
        self.effect = Some(name.into());
        self
    }

    pub fn entry_point(mut self, entry: EntryPoint) -> Self {
        self.entry_point = Some(entry);
        self
    }

    /// `#define name value` ahead of the source.
    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.macros.insert(name.into(), value.into());
        self
    }

    pub fn provider(mut self, provider: &'a dyn SymbolProvider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }
}

/// A successfully compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// Header followed by every instruction in canonical order
    pub words: Vec<Word>,
    /// FNV-1a 64 of the little-endian bytes of `words`
    pub hash: u64,
    /// Mixins that went into the module, in graph order
    pub mixins: Vec<String>,
}

impl CompiledModule {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    pub fn disassemble(&self) -> Result<String, EncodingError> {
        disassemble_module(&self.words)
    }
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    /// `None` whenever `diagnostics` holds an error
    pub module: Option<CompiledModule>,
    pub diagnostics: Vec<CompileError>,
    /// Preprocessed sources, for rendering diagnostics
    pub sources: SourceMap,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }

    pub fn format_diagnostics(&self) -> String {
        format_diagnostics(&self.diagnostics, &self.sources)
    }
}

/// One `file:line:col: severity: message` line per diagnostic.
pub fn format_diagnostics(errors: &[CompileError], sources: &SourceMap) -> String {
    let formatter = DiagnosticFormatter::new(sources);
    errors
        .iter()
        .map(|error| formatter.format_short(error))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Name of the mixin holding the module-wide capability and memory model.
pub const PRELUDE: &str = "$prelude";
/// Name of the mixin defining the default uniform block.
pub const GLOBALS: &str = "$globals";
/// Name of the mixin wrapping the entry point.
pub const ENTRY: &str = "$entry";

#[instrument(skip_all, fields(module = %request.module_name))]
pub fn compile(request: &CompileRequest<'_>) -> CompileResult {
    let mut sources = SourceMap::new();
    let file_id = sources.file_count() as u16;
    let parsed = sdsl_parser::parse(&request.source, file_id, &request.macros);
    sources.add_file(request.file_name.clone(), parsed.text);

    let mut result = CompileResult {
        module: None,
        diagnostics: parsed.errors.into_iter().map(CompileError::from).collect(),
        sources,
    };
    if result.has_errors() {
        debug!(errors = result.diagnostics.len(), "parse failed");
        return result;
    }

    let checked = check_module(&parsed.module, &request.module_name, &request.providers);
    result.diagnostics.extend(checked.errors);
    if result.has_errors() {
        debug!(errors = result.diagnostics.len(), "check failed");
        return result;
    }
    let program = checked.program;

    let selected = match select_mixins(&program, request.effect.as_deref()) {
        Ok(selected) => selected,
        Err(error) => {
            result.diagnostics.push(error);
            return result;
        }
    };

    let plan = LinkPlan::new(&program, &selected);
    let mut mixins = vec![Arc::new(prelude(request.entry_point.as_ref()))];
    let mut add = |name: &str, lowered: Lowered| {
        result.diagnostics.extend(lowered.errors);
        mixins.push(Arc::new(Mixin::new(name, lowered.buffer)));
    };
    if !plan.uniforms().is_empty() {
        add(GLOBALS, lower_uniform_block(&plan));
    }
    for mixin in &selected {
        add(&mixin.name, lower_mixin(mixin, &plan));
    }
    if let Some(entry) = &request.entry_point {
        add(ENTRY, lower_entry(entry, &selected, &plan));
    }
    if result.has_errors() {
        debug!(errors = result.diagnostics.len(), "lowering failed");
        return result;
    }

    let graph = MixinGraph::new(mixins);
    let linked = match link(&graph) {
        Ok(linked) => linked,
        Err(errors) => {
            result.diagnostics.extend(errors);
            debug!(errors = result.diagnostics.len(), "linking failed");
            return result;
        }
    };
    let words = linked.to_words();
    let module = CompiledModule {
        hash: fnv1a64_words(&words),
        mixins: graph
            .mixins()
            .iter()
            .map(|mixin| mixin.name().to_string())
            .collect(),
        words,
    };
    debug!(
        words = module.words.len(),
        hash = %format!("{:016x}", module.hash),
        "compiled"
    );
    result.module = Some(module);
    result
}

/// Module-wide declarations every program starts with.
fn prelude(entry: Option<&EntryPoint>) -> Mixin {
    let mut buffer = WordBuffer::new();
    buffer.capability(Capability::Shader);
    if let Some(capability) = entry.and_then(|entry| entry.stage.capability()) {
        buffer.capability(capability);
    }
    buffer.memory_model(AddressingModel::Logical, MemoryModel::GLSL450);
    Mixin::new(PRELUDE, buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parsing() {
        assert_eq!("fragment".parse::<Stage>(), Ok(Stage::Fragment));
        assert_eq!("PS".parse::<Stage>(), Ok(Stage::Fragment));
        assert_eq!("cs".parse::<Stage>(), Ok(Stage::Compute));
        assert!("tessellation".parse::<Stage>().is_err());
        for stage in [
            Stage::Vertex,
            Stage::Fragment,
            Stage::Geometry,
            Stage::Hull,
            Stage::Domain,
            Stage::Compute,
        ] {
            assert_eq!(stage.to_string().parse::<Stage>(), Ok(stage));
        }
    }

    #[test]
    fn test_prelude_capabilities() {
        let entry = EntryPoint::new("main", Stage::Geometry);
        let geometry = prelude(Some(&entry));
        assert_eq!(geometry.len(), 3);
        assert_eq!(prelude(None).len(), 2);
    }

    #[test]
    fn test_request_defaults() {
        let request = CompileRequest::new("Demo", "");
        assert_eq!(request.file_name, "Demo.sdsl");
        assert!(request.effect.is_none());
        assert!(request.macros.is_empty());
    }
}
