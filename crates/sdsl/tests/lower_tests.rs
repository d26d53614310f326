//! Lowering of checked mixins into word buffers.

use indexmap::IndexMap;
use sdsl::link::LinkPlan;
use sdsl::lower::{lower_mixin, Lowered};
use sdsl_resolve::typed::{Program, TypedMixin};
use sdsl_resolve::{check_module, ErrorKind};
use sdsl_spirv::spirv::{LinkageType, Op};
use sdsl_spirv::{Disassembler, InstructionGroup};

fn checked(source: &str) -> Program {
    let parsed = sdsl_parser::parse(source, 0, &IndexMap::new());
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    let checked = check_module(&parsed.module, "Test", &[]);
    assert!(checked.errors.is_empty(), "check errors: {:?}", checked.errors);
    checked.program
}

/// Lower `mixin` as part of a module composing every mixin of `source`.
fn lower(source: &str, mixin: &str) -> Lowered {
    let program = checked(source);
    let selected: Vec<&TypedMixin> = program.mixins.iter().collect();
    let plan = LinkPlan::new(&program, &selected);
    let mixin = program
        .mixin(mixin)
        .unwrap_or_else(|| panic!("missing mixin {}", mixin));
    lower_mixin(mixin, &plan)
}

fn lower_ok(source: &str, mixin: &str) -> Lowered {
    let lowered = lower(source, mixin);
    assert!(lowered.errors.is_empty(), "lowering errors: {:?}", lowered.errors);
    lowered.buffer.validate_layout().unwrap();
    lowered
}

fn ops(lowered: &Lowered) -> Vec<Op> {
    lowered
        .buffer
        .instructions()
        .filter_map(|instruction| instruction.opcode())
        .collect()
}

fn count(lowered: &Lowered, op: Op) -> usize {
    ops(lowered).into_iter().filter(|&o| o == op).count()
}

fn text(lowered: &Lowered) -> String {
    Disassembler::new().disassemble(lowered.buffer.instructions())
}

fn linkage(lowered: &Lowered, kind: LinkageType) -> Vec<String> {
    lowered
        .buffer
        .instructions()
        .filter_map(|instruction| instruction.linkage())
        .filter(|(_, _, candidate)| *candidate == kind)
        .map(|(_, name, _)| name)
        .collect()
}

#[test]
fn test_globals_and_streams_become_private_variables() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            stream float4 Color;
            static float Gain = 2.0;
            void Apply() { streams.Color = streams.Color * Gain; }
        }
        "#,
        "S",
    );

    let text = text(&lowered);
    assert!(text.contains("\"streams.Color\""), "{}", text);
    assert!(text.contains("\"Gain\""), "{}", text);
    assert!(text.contains("OpConstant"), "{}", text);
    assert!(text.contains(" 2\n") || text.contains(" 2.0\n"), "{}", text);
    assert!(ops(&lowered).contains(&Op::VectorTimesScalar));

    let initialized = lowered
        .buffer
        .instructions()
        .filter(|i| i.opcode() == Some(Op::Variable))
        .filter(|i| i.operand("initializer").is_ok())
        .count();
    assert_eq!(initialized, 1);
    assert_eq!(
        linkage(&lowered, LinkageType::Export),
        vec!["streams.Color", "S.Gain", "S.Apply#0"]
    );
}

#[test]
fn test_locals_are_hoisted_into_the_entry_block() {
    let source = r#"
        shader S
        {
            int Sum(int n)
            {
                int total = 0;
                for (int i = 0; i < n; i++)
                {
                    if (i == 3) { continue; }
                    total += i;
                }
                return total;
            }
        }
        "#;
    let locals = checked(source).mixin("S").unwrap().functions[0].locals.len();
    let lowered = lower(source, "S");
    assert!(lowered.errors.is_empty(), "{:?}", lowered.errors);
    lowered.buffer.validate_layout().unwrap();

    let ops = ops(&lowered);
    let label = ops.iter().position(|&op| op == Op::Label).unwrap();
    for offset in 1..=locals {
        assert_eq!(ops[label + offset], Op::Variable);
    }
    assert_ne!(ops[label + locals + 1], Op::Variable);

    for op in [
        Op::LoopMerge,
        Op::SelectionMerge,
        Op::BranchConditional,
        Op::SLessThan,
        Op::IEqual,
        Op::IAdd,
        Op::ReturnValue,
    ] {
        assert!(ops.contains(&op), "missing {:?}", op);
    }
}

#[test]
fn test_every_block_is_terminated() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            float Pick(float x)
            {
                if (x > 1.0) { return 1.0; } else { return x; }
            }

            void Spin(int n)
            {
                int i = 0;
                while (i < n) { if (i == 2) { break; } i++; }
                do { i--; } while (i > 0);
            }
        }
        "#,
        "S",
    );

    let terminators = [
        Op::Branch,
        Op::BranchConditional,
        Op::Return,
        Op::ReturnValue,
        Op::Kill,
        Op::Unreachable,
    ];
    let ops = ops(&lowered);
    let mut open = false;
    for op in ops {
        match op {
            Op::Label => {
                assert!(!open, "label inside an open block");
                open = true;
            }
            op if terminators.contains(&op) => {
                assert!(open, "{:?} outside a block", op);
                open = false;
            }
            Op::FunctionEnd => assert!(!open, "function ends inside a block"),
            _ => {}
        }
    }
}

#[test]
fn test_matrix_products_swap_operands() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            float4 Transform(float4x4 m, float4 v) { return m * v; }
            float4 Project(float4 v, float4x4 m) { return v * m; }
            float4x4 Combine(float4x4 a, float4x4 b) { return a * b; }
        }
        "#,
        "S",
    );

    assert_eq!(count(&lowered, Op::VectorTimesMatrix), 1);
    assert_eq!(count(&lowered, Op::MatrixTimesVector), 1);
    assert_eq!(count(&lowered, Op::MatrixTimesMatrix), 1);
    assert_eq!(count(&lowered, Op::TypeMatrix), 1);
}

#[test]
fn test_vector_comparisons_reduce_to_bool() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            bool Same(float3 a, float3 b) { return a == b; }
            bool Differ(float3 a, float3 b) { return a != b; }
        }
        "#,
        "S",
    );

    assert_eq!(count(&lowered, Op::FOrdEqual), 1);
    assert_eq!(count(&lowered, Op::All), 1);
    assert_eq!(count(&lowered, Op::FOrdNotEqual), 1);
    assert_eq!(count(&lowered, Op::Any), 1);
}

#[test]
fn test_swizzle_assignment_merges_lanes() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            float4 Flip(float4 c) { c.xyz = c.zyx; return c; }
        }
        "#,
        "S",
    );
    assert!(count(&lowered, Op::VectorShuffle) >= 2);
}

#[test]
fn test_conversions() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            float FromInt(int i) { return i; }
            int ToInt(float f) { return int(f); }
            double Widen(float f) { return f; }
        }
        "#,
        "S",
    );

    let ops = ops(&lowered);
    assert!(ops.contains(&Op::ConvertSToF));
    assert!(ops.contains(&Op::ConvertFToS));
    assert!(ops.contains(&Op::FConvert));
    assert!(text(&lowered).contains("OpCapability Float64"));
}

#[test]
fn test_discard_kills() {
    let lowered = lower_ok("shader S { void Clip() { discard; } }", "S");
    let ops = ops(&lowered);
    assert!(ops.contains(&Op::Kill));
    assert!(!ops.contains(&Op::Return));
}

#[test]
fn test_struct_members_are_named() {
    let lowered = lower_ok(
        r#"
        struct Light { float3 Direction; float Power; };
        float GetPower(Light light) { return light.Power; }
        "#,
        "Test",
    );

    let text = text(&lowered);
    assert!(text.contains("OpName"), "{}", text);
    assert!(text.contains("\"Light\""), "{}", text);
    assert!(text.contains("\"Direction\""), "{}", text);
    assert!(ops(&lowered).contains(&Op::CompositeExtract));
}

#[test]
fn test_foreign_symbols_are_imported() {
    let lowered = lower_ok(
        r#"
        shader Base
        {
            stream float4 Color;
            float4 Shade(float3 n) { return float4(n, 1.0); }
        }

        shader Lit : Base
        {
            override float4 Shade(float3 n)
            {
                float4 c = base.Shade(n);
                streams.Color = c;
                return c;
            }
        }
        "#,
        "Lit",
    );

    assert_eq!(
        linkage(&lowered, LinkageType::Import),
        vec!["Base.Shade#0", "streams.Color"]
    );
    assert_eq!(linkage(&lowered, LinkageType::Export), vec!["Lit.Shade#0"]);
    assert!(!ops(&lowered).contains(&Op::Undef));
    assert_eq!(count(&lowered, Op::FunctionCall), 1);
    assert_eq!(count(&lowered, Op::Function), 2);
    assert!(lowered
        .buffer
        .groups()
        .contains(&InstructionGroup::FunctionDeclaration));
}

#[test]
fn test_virtual_call_imports_the_override() {
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
        "#;
    let lowered = lower_ok(source, "Base");
    assert_eq!(linkage(&lowered, LinkageType::Import), vec!["Doubled.Scale#0"]);

    let lowered = lower_ok(source, "Doubled");
    assert!(linkage(&lowered, LinkageType::Import).is_empty());
}

#[test]
fn test_uniform_reads_go_through_the_block() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            float4 Tint;
            float4 Apply(float4 c) { return c * Tint; }
        }
        "#,
        "S",
    );
    assert_eq!(linkage(&lowered, LinkageType::Import), vec!["Globals"]);
    assert_eq!(count(&lowered, Op::AccessChain), 1);
    let text = text(&lowered);
    assert!(text.contains("\"S.Tint\""), "{}", text);
}

#[test]
fn test_uniforms_are_read_only() {
    let lowered = lower("shader S { float Gain; void Reset() { Gain = 1.0; } }", "S");
    assert_eq!(lowered.errors.len(), 1);
    assert_eq!(lowered.errors[0].kind, ErrorKind::TypeMismatch);
    assert!(lowered.errors[0].message.contains("uniform"));
}

#[test]
fn test_integer_matrices_are_rejected() {
    let lowered = lower("shader S { int2x2 Keep(int2x2 m) { return m; } }", "S");
    assert!(!lowered.errors.is_empty());
    assert!(lowered
        .errors
        .iter()
        .all(|error| error.kind == ErrorKind::TypeMismatch));
}

#[test]
fn test_sections_are_in_canonical_order() {
    let lowered = lower_ok(
        r#"
        shader S
        {
            static float Scale = 3.0;
            float Twice(float x) { return x * Scale * 2.0; }
        }
        "#,
        "S",
    );

    let groups = lowered.buffer.groups();
    let mut sorted = groups.clone();
    sorted.sort();
    assert_eq!(groups, sorted);
    assert!(groups.contains(&InstructionGroup::FunctionDefinition));
}
