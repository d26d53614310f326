//! End-to-end compilation: source text to SPIR-V module.

use sdsl::hash::fnv1a64;
use sdsl::{compile, CompileRequest, CompileResult, EntryPoint, Stage};
use sdsl_resolve::ErrorKind;
use sdsl_spirv::spirv::{self, BuiltIn, Decoration, Op, StorageClass};
use sdsl_spirv::{Disassembler, Id, WordBuffer};
use std::collections::HashMap;

const SHADING: &str = r#"
shader Shading
{
    stream float4 Color : SV_Target0;
    static float Gain = GAIN;

    void PSMain()
    {
        streams.Color = float4(1, 0, 0, 1) * Gain;
    }
}

shader Tinted : Shading
{
    float4 Tint;

    override void PSMain()
    {
        streams.Color = streams.Color * Tint;
    }
}

effect Plain
{
    mixin Shading;
};

effect Full
{
    mixin child Plain;
    mixin Tinted;
};
"#;

fn request() -> CompileRequest<'static> {
    CompileRequest::new("Demo", SHADING)
        .define("GAIN", "0.5")
        .entry_point(EntryPoint::new("PSMain", Stage::Fragment))
}

fn compile_ok(request: CompileRequest<'_>) -> CompileResult {
    let result = compile(&request);
    assert!(!result.has_errors(), "{}", result.format_diagnostics());
    result
}

fn kinds(result: &CompileResult) -> Vec<ErrorKind> {
    result.diagnostics.iter().map(|error| error.kind).collect()
}

fn linked(result: CompileResult) -> WordBuffer {
    let module = result.module.unwrap();
    WordBuffer::from_words(&module.words).unwrap()
}

fn count(buffer: &WordBuffer, op: Op) -> usize {
    buffer
        .instructions()
        .filter(|i| i.opcode() == Some(op))
        .count()
}

fn names(buffer: &WordBuffer) -> HashMap<Id, String> {
    buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::Name))
        .map(|i| {
            (
                i.operand("target").unwrap().as_id().unwrap(),
                i.operand("name").unwrap().as_str().unwrap(),
            )
        })
        .collect()
}

fn id_named(buffer: &WordBuffer, name: &str) -> Id {
    let ids: Vec<Id> = names(buffer)
        .into_iter()
        .filter(|(_, candidate)| candidate == name)
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids.len(), 1, "expected one '{}'", name);
    ids[0]
}

/// `(decoration, values)` on `target`.
fn decorations(buffer: &WordBuffer, target: Id) -> Vec<(u32, Vec<u32>)> {
    buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::Decorate) && i.words()[1] == target)
        .map(|i| (i.words()[2], i.words()[3..].to_vec()))
        .collect()
}

fn storage_class(buffer: &WordBuffer, variable: Id) -> u32 {
    buffer
        .instructions()
        .find(|i| i.opcode() == Some(Op::Variable) && i.result_id() == Some(variable))
        .unwrap()
        .operand("storage class")
        .unwrap()
        .as_enum()
        .unwrap()
}

/// Callee of every `OpFunctionCall`.
fn callees(buffer: &WordBuffer) -> Vec<Id> {
    buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::FunctionCall))
        .map(|i| i.operand("function").unwrap().as_id().unwrap())
        .collect()
}

#[test]
fn test_module_is_valid_spirv_layout() {
    let result = compile_ok(request());
    let module = result.module.unwrap();

    assert_eq!(module.words[0], spirv::MAGIC_NUMBER);
    let buffer = WordBuffer::from_words(&module.words).unwrap();
    buffer.validate_layout().unwrap();

    let text = module.disassemble().unwrap();
    assert!(text.starts_with("; SPIR-V\n"), "{}", text);
    assert!(text.contains("OpCapability Shader\n"), "{}", text);
    assert!(text.contains("OpMemoryModel Logical GLSL450\n"), "{}", text);
    assert!(text.contains("OpEntryPoint Fragment"), "{}", text);
    assert!(text.contains("\"PSMain\""), "{}", text);
    assert!(text.contains("OriginUpperLeft"), "{}", text);
}

#[test]
fn test_mixins_without_effect() {
    let module = compile_ok(request()).module.unwrap();
    assert_eq!(
        module.mixins,
        vec!["$prelude", "$globals", "Shading", "Tinted", "$entry"]
    );
}

#[test]
fn test_effect_selects_mixins() {
    let plain = compile_ok(request().effect("Plain")).module.unwrap();
    assert_eq!(plain.mixins, vec!["$prelude", "Shading", "$entry"]);

    let full = compile_ok(request().effect("Full")).module.unwrap();
    assert_eq!(
        full.mixins,
        vec!["$prelude", "$globals", "Shading", "Tinted", "$entry"]
    );
    assert_ne!(plain.hash, full.hash);
}

#[test]
fn test_entry_point_wraps_the_override() {
    let buffer = linked(compile_ok(request()));

    let entries: Vec<_> = buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::EntryPoint))
        .collect();
    assert_eq!(entries.len(), 1);
    let target = entries[0].operand("entry point").unwrap().as_id().unwrap();
    assert_eq!(target, id_named(&buffer, "PSMain_wrapper"));
    assert_eq!(
        entries[0].operand("name").unwrap().as_str().unwrap(),
        "PSMain"
    );

    // The override is lowered after its base, so it has the higher id.
    let names = names(&buffer);
    let overriding = buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::Function))
        .filter_map(|i| i.result_id())
        .filter(|id| names.get(id).map(String::as_str) == Some("PSMain"))
        .max()
        .unwrap();
    assert_eq!(callees(&buffer), vec![overriding]);
}

#[test]
fn test_base_calls_and_streams_link_across_mixins() {
    let result = compile_ok(CompileRequest::new(
        "Linked",
        r#"
        shader A
        {
            stream float4 Color;
            void Shade() { streams.Color = float4(1, 1, 1, 1); }
            float Get() { return 0.5; }
        }

        shader B : A
        {
            void PSMain()
            {
                base.Shade();
                float g = base.Get();
                streams.Color = streams.Color * g;
            }
        }
        "#,
    ));
    let buffer = linked(result);
    buffer.validate_layout().unwrap();

    assert_eq!(count(&buffer, Op::Undef), 0);
    assert_eq!(count(&buffer, Op::TypeVoid), 1);
    assert_eq!(count(&buffer, Op::TypeFloat), 1);
    assert_eq!(count(&buffer, Op::TypeFunction), 2);

    let names = names(&buffer);
    let streams: Vec<&String> = names.values().filter(|name| *name == "streams.Color").collect();
    assert_eq!(streams.len(), 1);
    let private = buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::Variable))
        .filter(|i| {
            i.operand("storage class").unwrap().as_enum().unwrap()
                == StorageClass::Private as u32
        })
        .count();
    assert_eq!(private, 1);

    let callees = callees(&buffer);
    assert_eq!(callees, vec![id_named(&buffer, "Shade"), id_named(&buffer, "Get")]);
    assert!(buffer.instructions().all(|i| i.linkage().is_none()));
    let text = Disassembler::new().disassemble(buffer.instructions());
    assert!(!text.contains("Linkage"), "{}", text);
}

#[test]
fn test_virtual_calls_dispatch_to_the_override() {
    let source = r#"
        shader Base
        {
            float Scale() { return 1.0; }
            float Apply(float x) { return x * Scale(); }
        }

        shader Doubled : Base
        {
            override float Scale() { return 2.0; }
        }

        effect BaseOnly
        {
            mixin Base;
        };
    "#;

    let buffer = linked(compile_ok(CompileRequest::new("Dispatch", source)));
    let names = names(&buffer);
    let scales: Vec<Id> = buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::Function))
        .filter_map(|i| i.result_id())
        .filter(|id| names.get(id).map(String::as_str) == Some("Scale"))
        .collect();
    assert_eq!(scales.len(), 2);
    assert_eq!(callees(&buffer), vec![scales[1]]);

    let base_only = linked(compile_ok(
        CompileRequest::new("Dispatch", source).effect("BaseOnly"),
    ));
    assert_eq!(callees(&base_only), vec![id_named(&base_only, "Scale")]);
}

#[test]
fn test_undefined_abstract_function_fails_to_link() {
    let result = compile(&CompileRequest::new(
        "Abstract",
        r#"
        shader A
        {
            abstract float Get();
            float Use() { return Get(); }
        }
        "#,
    ));
    assert!(result.module.is_none());
    assert_eq!(kinds(&result), vec![ErrorKind::UndefinedName]);
    assert!(result.diagnostics[0].message.contains("'A.Get'"));
}

#[test]
fn test_vertex_stage_interface() {
    let result = compile_ok(
        CompileRequest::new(
            "Vertex",
            r#"
            shader VS
            {
                stream float3 Position : POSITION;
                stream float4 ShadingPosition : SV_Position;
                stream float2 TexCoord : TEXCOORD0;
                stream int VertexId : SV_VertexID;
                stream float3 Scratch;

                void VSMain()
                {
                    streams.Scratch = streams.Position;
                    streams.ShadingPosition = float4(streams.Position, 1.0);
                    float id = streams.VertexId;
                    streams.TexCoord = streams.Position.xy * id;
                }
            }
            "#,
        )
        .entry_point(EntryPoint::new("VSMain", Stage::Vertex)),
    );
    let buffer = linked(result);
    buffer.validate_layout().unwrap();

    let location = |value: u32| (Decoration::Location as u32, vec![value]);
    let builtin = |value: BuiltIn| (Decoration::BuiltIn as u32, vec![value as u32]);

    let position = id_named(&buffer, "in.Position");
    assert_eq!(decorations(&buffer, position), vec![location(0)]);
    assert_eq!(storage_class(&buffer, position), StorageClass::Input as u32);

    let vertex_id = id_named(&buffer, "in.VertexId");
    assert_eq!(
        decorations(&buffer, vertex_id),
        vec![builtin(BuiltIn::VertexIndex)]
    );

    let shading_position = id_named(&buffer, "out.ShadingPosition");
    assert_eq!(
        decorations(&buffer, shading_position),
        vec![builtin(BuiltIn::Position)]
    );
    assert_eq!(
        storage_class(&buffer, shading_position),
        StorageClass::Output as u32
    );
    assert_eq!(
        decorations(&buffer, id_named(&buffer, "out.TexCoord")),
        vec![location(1)]
    );

    let names = names(&buffer);
    assert!(!names.values().any(|name| name == "in.Scratch" || name == "out.Scratch"));

    let entry = buffer
        .instructions()
        .find(|i| i.opcode() == Some(Op::EntryPoint))
        .unwrap();
    let interface: Vec<Id> = entry
        .operands()
        .unwrap()
        .into_iter()
        .filter(|operand| operand.name() == "interface")
        .map(|operand| operand.as_id().unwrap())
        .collect();
    for variable in [position, vertex_id, shading_position] {
        assert!(interface.contains(&variable));
    }
}

#[test]
fn test_fragment_stage_interface() {
    let result = compile_ok(
        CompileRequest::new(
            "Fragment",
            r#"
            shader PS
            {
                stream int Material : MATERIAL;
                stream float4 Color : SV_Target1;
                stream float Depth : SV_Depth;

                void PSMain()
                {
                    float material = streams.Material;
                    streams.Color = float4(1, 0, 0, 1) * material;
                    streams.Depth = 0.5;
                }
            }
            "#,
        )
        .entry_point(EntryPoint::new("PSMain", Stage::Fragment)),
    );
    let buffer = linked(result);

    let material = id_named(&buffer, "in.Material");
    let mut material_decorations = decorations(&buffer, material);
    material_decorations.sort();
    let mut expected = vec![
        (Decoration::Location as u32, vec![0]),
        (Decoration::Flat as u32, vec![]),
    ];
    expected.sort();
    assert_eq!(material_decorations, expected);
    assert_eq!(
        decorations(&buffer, id_named(&buffer, "out.Color")),
        vec![(Decoration::Location as u32, vec![1])]
    );
    assert_eq!(
        decorations(&buffer, id_named(&buffer, "out.Depth")),
        vec![(Decoration::BuiltIn as u32, vec![BuiltIn::FragDepth as u32])]
    );

    let text = Disassembler::new().disassemble(buffer.instructions());
    assert!(text.contains("DepthReplacing"), "{}", text);
}

#[test]
fn test_uniforms_live_in_the_default_block() {
    let buffer = linked(compile_ok(request()));

    let uniforms: Vec<Id> = buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::Variable))
        .filter_map(|i| i.result_id())
        .filter(|&id| storage_class(&buffer, id) == StorageClass::Uniform as u32)
        .collect();
    assert_eq!(uniforms.len(), 1);
    let block = uniforms[0];
    assert_eq!(names(&buffer).get(&block).map(String::as_str), Some("Globals"));
    let mut block_decorations = decorations(&buffer, block);
    block_decorations.sort();
    let mut expected = vec![
        (Decoration::DescriptorSet as u32, vec![0]),
        (Decoration::Binding as u32, vec![0]),
    ];
    expected.sort();
    assert_eq!(block_decorations, expected);
    assert_eq!(count(&buffer, Op::TypeStruct), 1);
    assert!(count(&buffer, Op::AccessChain) >= 1);
}

#[test]
fn test_assigning_a_uniform_is_rejected() {
    let result = compile(&CompileRequest::new(
        "Uniform",
        "shader S { float4 Tint; void F() { Tint = float4(0, 0, 0, 0); } }",
    ));
    assert!(result.module.is_none());
    assert_eq!(kinds(&result), vec![ErrorKind::TypeMismatch]);
    assert!(result.diagnostics[0].message.contains("'static'"));
}

#[test]
fn test_hash_is_stable_and_covers_the_bytes() {
    let first = compile_ok(request()).module.unwrap();
    let second = compile_ok(request()).module.unwrap();
    assert_eq!(first.hash, second.hash);
    assert_eq!(first.hash, fnv1a64(&first.to_bytes()));
    assert_eq!(first.to_bytes().len(), first.words.len() * 4);

    let brighter = compile_ok(
        CompileRequest::new("Demo", SHADING)
            .define("GAIN", "2.0")
            .entry_point(EntryPoint::new("PSMain", Stage::Fragment)),
    )
    .module
    .unwrap();
    assert_ne!(first.hash, brighter.hash);
}

#[test]
fn test_compute_entry_point_gets_a_local_size() {
    let result = compile_ok(
        CompileRequest::new("Kernel", "shader K { void CSMain() { } }")
            .entry_point(EntryPoint::new("CSMain", Stage::Compute)),
    );
    let text = result.module.unwrap().disassemble().unwrap();
    assert!(text.contains("OpEntryPoint GLCompute"), "{}", text);
    assert!(text.contains("LocalSize 1 1 1"), "{}", text);
}

#[test]
fn test_parse_errors_stop_compilation() {
    let result = compile(&CompileRequest::new("Broken", "shader { void }").file_name("broken.sdsl"));
    assert!(result.has_errors());
    assert!(result.module.is_none());
    assert!(kinds(&result).iter().all(|kind| *kind == ErrorKind::Syntax));

    let text = result.format_diagnostics();
    assert!(text.starts_with("broken.sdsl:1:"), "{}", text);
    assert!(text.contains(": error: "), "{}", text);
}

#[test]
fn test_check_errors_stop_compilation() {
    let result = compile(&CompileRequest::new(
        "Bad",
        "shader S { void F() { float x = Missing; } }",
    ));
    assert!(result.module.is_none());
    assert!(kinds(&result).contains(&ErrorKind::UndefinedName));
}

#[test]
fn test_missing_entry_point() {
    let result = compile(
        &CompileRequest::new("Demo", SHADING)
            .define("GAIN", "1.0")
            .entry_point(EntryPoint::new("VSMain", Stage::Vertex)),
    );
    assert!(result.module.is_none());
    assert_eq!(kinds(&result), vec![ErrorKind::UnresolvedEntryPoint]);
    assert!(result.diagnostics[0].message.contains("VSMain"));
}

#[test]
fn test_entry_point_with_parameters_is_rejected() {
    let result = compile(
        &CompileRequest::new("Demo", "shader S { void Main(float x) { } }")
            .entry_point(EntryPoint::new("Main", Stage::Vertex)),
    );
    assert!(result.module.is_none());
    assert_eq!(kinds(&result), vec![ErrorKind::UnresolvedEntryPoint]);
}

#[test]
fn test_unknown_effect() {
    let result = compile(&request().effect("Nope"));
    assert!(result.module.is_none());
    assert_eq!(kinds(&result), vec![ErrorKind::UnresolvedMixin]);
}
