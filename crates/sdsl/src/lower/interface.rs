//! Stage inputs and outputs of the entry point.
//!
//! The entry function of an SDSL shader takes no parameters: it reads
//! and writes streams. The synthesized entry mixin declares an `Input`
//! variable for every stream with a semantic the entry reads and an
//! `Output` variable for every one it writes, and wraps the entry:
//! inputs are copied into their streams, the entry runs, and streams are
//! copied to the outputs.
//!
//! `SV_` semantics with a SPIR-V counterpart become built-ins; any other
//! semantic gets a location. Locations are handed out in stream
//! declaration order across the composition, so the outputs of one stage
//! and the inputs of the next agree when both are built from the same
//! mixins.

use super::{synthetic, Lowered, Lowerer};
use crate::compile::{EntryPoint, Stage, ENTRY};
use crate::compose::entry_owner;
use crate::link::{function_symbol, stream_usage, LinkPlan};
use indexmap::IndexMap;
use sdsl_resolve::typed::{GlobalKind, TypedMixin};
use sdsl_resolve::{ErrorKind, ScalarKind, SymbolType};
use sdsl_spirv::spirv::{
    BuiltIn, Decoration, ExecutionMode, ExecutionModel, FunctionControl, StorageClass,
};
use sdsl_spirv::Id;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

impl Direction {
    fn storage(self) -> StorageClass {
        match self {
            Direction::Input => StorageClass::Input,
            Direction::Output => StorageClass::Output,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Direction::Input => "in",
            Direction::Output => "out",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Location(u32),
    BuiltIn(BuiltIn),
}

/// A stream with a semantic, as declared across the composition.
#[derive(Debug, Clone)]
struct StageStream {
    ty: SymbolType,
    semantic: String,
    /// First location, for semantics that are not system values
    location: Option<u32>,
}

/// One interface variable of the wrapper.
struct Port {
    stream: String,
    ty: SymbolType,
    variable: Id,
}

/// Lower the mixin declaring `entry` and its stage interface.
#[instrument(skip_all, fields(entry = %entry.name, stage = %entry.stage))]
pub fn lower_entry(entry: &EntryPoint, mixins: &[&TypedMixin], plan: &LinkPlan) -> Lowered {
    let wrapper_mixin = synthetic(ENTRY);
    let mut lowerer = Lowerer::new(&wrapper_mixin, plan);

    let Some(owner) = entry_owner(mixins, &entry.name).map(|index| mixins[index]) else {
        lowerer.error(
            ErrorKind::UnresolvedEntryPoint,
            format!(
                "entry point '{}' is not defined by any mixin in the module",
                entry.name
            ),
        );
        return lowerer.finish();
    };
    let Some(index) = owner
        .functions
        .iter()
        .rposition(|function| function.name == entry.name && function.body.is_some())
    else {
        return lowerer.finish();
    };
    let function = &owner.functions[index];
    if !function.return_type.is_void() || function.param_count != 0 {
        lowerer.span = function.span;
        lowerer.error(
            ErrorKind::UnresolvedEntryPoint,
            format!(
                "entry point '{}' must be a void function without parameters",
                entry.name
            ),
        );
        return lowerer.finish();
    }

    let (target_mixin, target_index) = plan.implementation(&owner.name, index);
    let usage = stream_usage(mixins, plan, target_mixin, target_index);
    let streams = stage_streams(mixins);

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut depth_replacing = false;
    for (name, stream) in &streams {
        for (direction, used) in [
            (Direction::Input, usage.reads.contains(name)),
            (Direction::Output, usage.writes.contains(name)),
        ] {
            if !used {
                continue;
            }
            let binding = match classify(entry.stage, direction, stream) {
                Ok(Some(binding)) => binding,
                Ok(None) => continue,
                Err(message) => {
                    lowerer.error(ErrorKind::TypeMismatch, message);
                    continue;
                }
            };
            if binding == Binding::BuiltIn(BuiltIn::FragDepth) {
                depth_replacing = true;
            }
            if let Some(port) = lowerer.port(entry.stage, direction, name, stream, binding) {
                match direction {
                    Direction::Input => inputs.push(port),
                    Direction::Output => outputs.push(port),
                }
            }
        }
    }
    if !lowerer.errors.is_empty() {
        return lowerer.finish();
    }
    debug!(
        inputs = inputs.len(),
        outputs = outputs.len(),
        target = %target_mixin,
        "stage interface"
    );

    let target = function_symbol(target_mixin, &entry.name, target_index);
    if let Some(wrapper) = lowerer.wrapper(&entry.name, target, &inputs, &outputs) {
        let model = entry.stage.execution_model();
        lowerer
            .decl()
            .entry_point(model, wrapper, &entry.name, &[]);
        match model {
            ExecutionModel::Fragment => {
                lowerer
                    .decl()
                    .execution_mode(wrapper, ExecutionMode::OriginUpperLeft, &[]);
                if depth_replacing {
                    lowerer
                        .decl()
                        .execution_mode(wrapper, ExecutionMode::DepthReplacing, &[]);
                }
            }
            ExecutionModel::GLCompute => {
                lowerer
                    .decl()
                    .execution_mode(wrapper, ExecutionMode::LocalSize, &[1, 1, 1]);
            }
            _ => {}
        }
    }
    lowerer.finish()
}

/// Streams with a semantic, first declaration wins, with locations.
fn stage_streams(mixins: &[&TypedMixin]) -> IndexMap<String, StageStream> {
    let mut streams: IndexMap<String, StageStream> = IndexMap::new();
    let mut next_location = 0;
    let declared = mixins
        .iter()
        .flat_map(|mixin| &mixin.globals)
        .filter(|global| global.kind == GlobalKind::Stream);
    for global in declared {
        let Some(semantic) = &global.semantic else {
            continue;
        };
        if streams.contains_key(&global.name) {
            continue;
        }
        let location = if is_system_value(semantic) {
            None
        } else {
            let location = next_location;
            next_location += location_count(&global.ty);
            Some(location)
        };
        streams.insert(
            global.name.clone(),
            StageStream {
                ty: global.ty.clone(),
                semantic: semantic.clone(),
                location,
            },
        );
    }
    streams
}

fn is_system_value(semantic: &str) -> bool {
    semantic
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("SV_"))
}

/// Locations a value of `ty` occupies.
fn location_count(ty: &SymbolType) -> u32 {
    match ty {
        SymbolType::Vector {
            base: ScalarKind::Double | ScalarKind::Long | ScalarKind::ULong,
            size: 3 | 4,
        } => 2,
        SymbolType::Matrix { base, rows, cols } => {
            rows * location_count(&SymbolType::vector(*base, *cols))
        }
        SymbolType::Array {
            element,
            length: Some(length),
        } => length * location_count(element),
        SymbolType::Struct { fields, .. } => {
            fields.iter().map(|(_, field)| location_count(field)).sum()
        }
        _ => 1,
    }
}

/// How a stream used in `direction` appears in the stage interface;
/// `None` keeps it private to the module.
fn classify(
    stage: Stage,
    direction: Direction,
    stream: &StageStream,
) -> Result<Option<Binding>, String> {
    let unsupported = match (stage, direction) {
        (Stage::Geometry | Stage::Hull | Stage::Domain, Direction::Input) => true,
        (Stage::Hull, Direction::Output) => true,
        _ => false,
    };
    if unsupported {
        return Err(format!(
            "{} stream with semantic '{}' in a {} shader: per-vertex arrays are not supported",
            match direction {
                Direction::Input => "input",
                Direction::Output => "output",
            },
            stream.semantic,
            stage
        ));
    }

    let semantic = stream.semantic.to_ascii_uppercase();
    if let Some(location) = stream.location {
        return Ok(match (stage, direction) {
            (Stage::Compute, _) | (Stage::Fragment, Direction::Output) => None,
            _ => Some(Binding::Location(location)),
        });
    }

    let builtin = match (semantic.as_str(), stage, direction) {
        ("SV_POSITION", Stage::Vertex | Stage::Geometry | Stage::Domain, Direction::Output) => {
            Some(BuiltIn::Position)
        }
        ("SV_POSITION", Stage::Fragment, Direction::Input) => Some(BuiltIn::FragCoord),
        ("SV_DEPTH", Stage::Fragment, Direction::Output) => Some(BuiltIn::FragDepth),
        ("SV_VERTEXID", Stage::Vertex, Direction::Input) => Some(BuiltIn::VertexIndex),
        ("SV_INSTANCEID", Stage::Vertex, Direction::Input) => Some(BuiltIn::InstanceIndex),
        ("SV_ISFRONTFACE", Stage::Fragment, Direction::Input) => Some(BuiltIn::FrontFacing),
        ("SV_DISPATCHTHREADID", Stage::Compute, Direction::Input) => {
            Some(BuiltIn::GlobalInvocationId)
        }
        ("SV_GROUPTHREADID", Stage::Compute, Direction::Input) => {
            Some(BuiltIn::LocalInvocationId)
        }
        ("SV_GROUPID", Stage::Compute, Direction::Input) => Some(BuiltIn::WorkgroupId),
        ("SV_GROUPINDEX", Stage::Compute, Direction::Input) => {
            Some(BuiltIn::LocalInvocationIndex)
        }
        _ => None,
    };
    if let Some(builtin) = builtin {
        return Ok(Some(Binding::BuiltIn(builtin)));
    }

    if let (Stage::Fragment, Direction::Output) = (stage, direction) {
        if let Some(target) = semantic.strip_prefix("SV_TARGET") {
            let location = if target.is_empty() {
                0
            } else {
                target
                    .parse()
                    .map_err(|_| format!("invalid render target '{}'", stream.semantic))?
            };
            return Ok(Some(Binding::Location(location)));
        }
    }
    Ok(None)
}

impl Lowerer<'_> {
    /// Declare the interface variable of one stream.
    fn port(
        &mut self,
        stage: Stage,
        direction: Direction,
        name: &str,
        stream: &StageStream,
        binding: Binding,
    ) -> Option<Port> {
        let kind = stream.ty.scalar_kind();
        if let (Binding::Location(_), Some(ScalarKind::Bool)) = (binding, kind) {
            self.error(
                ErrorKind::TypeMismatch,
                format!(
                    "stream '{}' of type '{}' cannot be a stage {}",
                    name,
                    stream.ty,
                    match direction {
                        Direction::Input => "input",
                        Direction::Output => "output",
                    }
                ),
            );
            return None;
        }

        let ty = self.type_id(&stream.ty)?;
        let storage = direction.storage();
        let pointer = self.pointer_type(storage, ty);
        let variable = self.decl().variable(pointer, storage, None);
        self.decl()
            .name(variable, &format!("{}.{}", direction.prefix(), name));
        match binding {
            Binding::Location(location) => {
                self.decl()
                    .decorate(variable, Decoration::Location, &[location]);
                let flat = stage == Stage::Fragment
                    && direction == Direction::Input
                    && kind.is_some_and(|kind| kind != ScalarKind::Float);
                if flat {
                    self.decl().decorate(variable, Decoration::Flat, &[]);
                }
            }
            Binding::BuiltIn(builtin) => {
                self.decl()
                    .decorate(variable, Decoration::BuiltIn, &[builtin as u32]);
            }
        }
        Some(Port {
            stream: name.to_string(),
            ty: stream.ty.clone(),
            variable,
        })
    }

    /// `void <entry>_wrapper()`: inputs to streams, call, streams to
    /// outputs.
    fn wrapper(
        &mut self,
        entry: &str,
        target: String,
        inputs: &[Port],
        outputs: &[Port],
    ) -> Option<Id> {
        let void = self.type_id(&SymbolType::Void)?;
        let callee = self.import_function(target, &SymbolType::Void, &[])?;
        let fn_ty = self.function_type(void, &[]);
        let mut streams = Vec::with_capacity(inputs.len() + outputs.len());
        for port in inputs.iter().chain(outputs) {
            streams.push(self.global(ENTRY, &port.stream, true, &port.ty)?);
        }
        let mut value_types = Vec::with_capacity(streams.len());
        for port in inputs.iter().chain(outputs) {
            value_types.push(self.type_id(&port.ty)?);
        }

        let wrapper = self.code().function(void, FunctionControl::NONE, fn_ty);
        self.decl().name(wrapper, &format!("{}_wrapper", entry));
        self.code().label();
        for (index, port) in inputs.iter().enumerate() {
            let value = self.code().load(value_types[index], port.variable);
            self.code().store(streams[index], value);
        }
        self.code().function_call(void, callee, &[]);
        for (index, port) in outputs.iter().enumerate() {
            let index = inputs.len() + index;
            let value = self.code().load(value_types[index], streams[index]);
            self.code().store(port.variable, value);
        }
        self.code().ret();
        self.code().function_end();
        Some(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(semantic: &str, location: Option<u32>) -> StageStream {
        StageStream {
            ty: SymbolType::vector(ScalarKind::Float, 4),
            semantic: semantic.to_string(),
            location,
        }
    }

    #[test]
    fn test_system_values_map_to_builtins() {
        let position = stream("SV_Position", None);
        assert_eq!(
            classify(Stage::Vertex, Direction::Output, &position),
            Ok(Some(Binding::BuiltIn(BuiltIn::Position)))
        );
        assert_eq!(
            classify(Stage::Fragment, Direction::Input, &position),
            Ok(Some(Binding::BuiltIn(BuiltIn::FragCoord)))
        );
        assert_eq!(classify(Stage::Vertex, Direction::Input, &position), Ok(None));
        assert_eq!(
            classify(Stage::Compute, Direction::Input, &stream("sv_dispatchthreadid", None)),
            Ok(Some(Binding::BuiltIn(BuiltIn::GlobalInvocationId)))
        );
        assert_eq!(
            classify(Stage::Fragment, Direction::Output, &stream("SV_Target2", None)),
            Ok(Some(Binding::Location(2)))
        );
        assert_eq!(
            classify(Stage::Fragment, Direction::Output, &stream("SV_Target", None)),
            Ok(Some(Binding::Location(0)))
        );
        assert_eq!(
            classify(Stage::Fragment, Direction::Output, &stream("SV_Coverage", None)),
            Ok(None)
        );
    }

    #[test]
    fn test_user_semantics_take_locations() {
        let texcoord = stream("TEXCOORD0", Some(3));
        assert_eq!(
            classify(Stage::Vertex, Direction::Output, &texcoord),
            Ok(Some(Binding::Location(3)))
        );
        assert_eq!(
            classify(Stage::Fragment, Direction::Input, &texcoord),
            Ok(Some(Binding::Location(3)))
        );
        assert_eq!(classify(Stage::Fragment, Direction::Output, &texcoord), Ok(None));
        assert_eq!(classify(Stage::Compute, Direction::Input, &texcoord), Ok(None));
        assert!(classify(Stage::Geometry, Direction::Input, &texcoord).is_err());
        assert!(classify(Stage::Hull, Direction::Output, &texcoord).is_err());
    }

    #[test]
    fn test_location_count() {
        let float4x4 = SymbolType::Matrix {
            base: ScalarKind::Float,
            rows: 4,
            cols: 4,
        };
        assert_eq!(location_count(&SymbolType::FLOAT), 1);
        assert_eq!(location_count(&float4x4), 4);
        assert_eq!(location_count(&SymbolType::vector(ScalarKind::Double, 4)), 2);
        assert!(is_system_value("sv_Target0"));
        assert!(!is_system_value("SV"));
    }
}
