//! Integration tests for preprocessing + parsing.

use indexmap::IndexMap;
use sdsl_ast::{
    BinaryOp, Declaration, EffectStatement, ExprKind, IntSuffix, Literal, ShaderMember, Stmt,
    UnaryOp,
};
use sdsl_parser::{parse, parse_expr, ParseErrorKind};

fn parse_ok(source: &str) -> sdsl_parser::Parsed {
    let parsed = parse(source, 0, &IndexMap::new());
    assert!(parsed.errors.is_empty(), "unexpected errors: {:?}", parsed.errors);
    parsed
}

fn int(value: u64) -> ExprKind {
    ExprKind::Literal(Literal::Int {
        value,
        suffix: IntSuffix::None,
    })
}

#[test]
fn test_conditional_branch_is_removed_before_parsing() {
    let source = "#define A 1\n\
                  #if A\n\
                  float4 x = float4(1,1,1,1);\n\
                  #else\n\
                  float4 x = float4(0,0,0,0);\n\
                  #endif\n";
    let parsed = parse_ok(source);

    assert_eq!(parsed.module.declarations.len(), 1);
    let Declaration::Variable(var) = &parsed.module.declarations[0] else {
        panic!("expected variable, got {:?}", parsed.module.declarations[0]);
    };
    assert_eq!(var.name, "x");
    assert_eq!(var.ty.name, "float4");
    assert_eq!(var.span.start_line, 3);

    let Some(ExprKind::Call {
        qualifier,
        name,
        args,
    }) = var.initializer.as_ref().map(|e| &e.kind)
    else {
        panic!("expected constructor call");
    };
    assert_eq!(qualifier, &None);
    assert_eq!(name, "float4");
    let values: Vec<_> = args.iter().map(|a| a.kind.clone()).collect();
    assert_eq!(values, vec![int(1), int(1), int(1), int(1)]);
}

#[test]
fn test_parse_is_idempotent() {
    let source = r#"
        shader Lighting : ShaderBase, Transform
        {
            stream float4 Color : COLOR;
            compose ComputeColor diffuse;
            float Intensity = 2.0f;

            override float4 Shade(float3 normal)
            {
                float4 result = base.Shade(normal) * Intensity;
                for (int i = 0; i < 4; i++) { result.x += diffuse.Compute(); }
                return result;
            }
        };
    "#;
    let first = parse_ok(source);
    let second = parse_ok(source);
    assert_eq!(first.module, second.module);
}

#[test]
fn test_shader_members() {
    let source = r#"
        shader Lighting : ShaderBase
        {
            struct Light { float3 Direction; float4 Color; };
            stage stream float4 Position : SV_Position;
            compose ComputeColor lights[];
            abstract float4 Compute();
            float4 Shade() { return streams.Position; }
        }
    "#;
    let parsed = parse_ok(source);
    let Declaration::Shader(shader) = &parsed.module.declarations[0] else {
        panic!("expected shader");
    };
    assert_eq!(shader.name, "Lighting");
    assert_eq!(shader.bases.len(), 1);
    assert_eq!(shader.bases[0].0, "ShaderBase");
    assert_eq!(shader.members.len(), 5);

    assert!(matches!(&shader.members[0], ShaderMember::Struct(s) if s.fields.len() == 2));
    match &shader.members[1] {
        ShaderMember::Variable(var) => {
            assert!(var.modifiers.stage && var.modifiers.stream);
            assert_eq!(var.semantic.as_deref(), Some("SV_Position"));
        }
        other => panic!("expected stream variable, got {:?}", other),
    }
    assert!(matches!(&shader.members[2], ShaderMember::Compose(c) if c.is_array && c.mixin == "ComputeColor"));
    assert!(matches!(&shader.members[3], ShaderMember::Method(m) if m.body.is_none() && m.modifiers.abstract_));
    match &shader.members[4] {
        ShaderMember::Method(method) => {
            let body = method.body.as_ref().unwrap();
            let Stmt::Return { value: Some(value), .. } = &body.statements[0] else {
                panic!("expected return");
            };
            assert!(matches!(&value.kind, ExprKind::Member { member, .. } if member == "Position"));
        }
        other => panic!("expected method, got {:?}", other),
    }
}

#[test]
fn test_effect_statements() {
    let source = r#"
        effect Forward
        {
            mixin ShaderBase;
            mixin compose lights = DirectionalLight;
            mixin clone;
            mixin child Shadow;
        };
    "#;
    let parsed = parse_ok(source);
    let Declaration::Effect(effect) = &parsed.module.declarations[0] else {
        panic!("expected effect");
    };
    assert_eq!(effect.statements.len(), 4);
    assert!(matches!(&effect.statements[0], EffectStatement::Mixin { name, .. } if name == "ShaderBase"));
    assert!(matches!(
        &effect.statements[1],
        EffectStatement::Compose { slot, mixin, .. } if slot == "lights" && mixin == "DirectionalLight"
    ));
    assert!(matches!(&effect.statements[2], EffectStatement::Clone(_)));
    assert!(matches!(&effect.statements[3], EffectStatement::Child { effect, .. } if effect == "Shadow"));
}

#[test]
fn test_namespaces_nest() {
    let parsed = parse_ok("namespace Stride.Rendering { shader A { } shader B : A { } }");
    let Declaration::Namespace { name, declarations, .. } = &parsed.module.declarations[0] else {
        panic!("expected namespace");
    };
    assert_eq!(name, "Stride.Rendering");
    assert_eq!(declarations.len(), 2);
    assert_eq!(parsed.module.flattened().len(), 2);
}

#[test]
fn test_operator_precedence() {
    let expr = parse_expr("a + b * c == d && !e", 0).unwrap();
    let ExprKind::Binary { op, left, right } = &expr.kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::LogicalAnd);
    assert!(matches!(&right.kind, ExprKind::Unary { op: UnaryOp::Not, .. }));

    let ExprKind::Binary { op, left: sum, .. } = &left.kind else {
        panic!("expected equality");
    };
    assert_eq!(*op, BinaryOp::Eq);
    let ExprKind::Binary { op, right: product, .. } = &sum.kind else {
        panic!("expected sum");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(&product.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_left_associativity_and_ternary() {
    let expr = parse_expr("a - b - c", 0).unwrap();
    let ExprKind::Binary { left, .. } = &expr.kind else {
        panic!("expected binary");
    };
    assert!(matches!(&left.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));

    let expr = parse_expr("x > 0 ? 1 : y > 0 ? 2 : 3", 0).unwrap();
    let ExprKind::Ternary { otherwise, .. } = &expr.kind else {
        panic!("expected ternary");
    };
    assert!(matches!(&otherwise.kind, ExprKind::Ternary { .. }));
}

#[test]
fn test_postfix_chain() {
    let expr = parse_expr("lights[2].Color.xyz", 0).unwrap();
    let ExprKind::Member { object, member } = &expr.kind else {
        panic!("expected member");
    };
    assert_eq!(member, "xyz");
    let ExprKind::Member { object, .. } = &object.kind else {
        panic!("expected member");
    };
    assert!(matches!(&object.kind, ExprKind::Index { .. }));

    let expr = parse_expr("Mixin.Compute(1, 2)", 0).unwrap();
    assert!(matches!(
        &expr.kind,
        ExprKind::Call { qualifier: Some(q), name, args } if q == "Mixin" && name == "Compute" && args.len() == 2
    ));
}

#[test]
fn test_statements() {
    let source = r#"
        void main()
        {
            int i = 0;
            while (i < 10) { i += 2; if (i == 4) continue; else break; }
            do { i--; } while (i > 0);
            if (i < 0) discard;
            i <<= 1;
            ;
        }
    "#;
    let parsed = parse_ok(source);
    let Declaration::Function(function) = &parsed.module.declarations[0] else {
        panic!("expected function");
    };
    let statements = &function.body.as_ref().unwrap().statements;
    assert_eq!(statements.len(), 6);
    assert!(matches!(statements[0], Stmt::Declare(_)));
    assert!(matches!(statements[1], Stmt::While { .. }));
    assert!(matches!(statements[2], Stmt::DoWhile { .. }));
    assert!(matches!(statements[3], Stmt::If { .. }));
    assert!(matches!(
        &statements[4],
        Stmt::Assign { op: sdsl_ast::AssignOp::Compound(BinaryOp::Shl), .. }
    ));
}

#[test]
fn test_recovery_reports_multiple_errors() {
    let source = r#"
        shader Broken
        {
            float a = ;
            float b = 1 2;
            float4 Good() { return float4(1, 2, 3, 4); }
            void Bad() { int x = 1 +; x = 2; }
        }
        float ok = 1;
    "#;
    let parsed = parse(source, 0, &IndexMap::new());
    assert!(parsed.errors.len() >= 3, "errors: {:?}", parsed.errors);

    let Declaration::Shader(shader) = &parsed.module.declarations[0] else {
        panic!("expected shader to survive recovery");
    };
    // `float a = ;` keeps the declaration with an error initializer.
    match &shader.members[0] {
        ShaderMember::Variable(var) => {
            assert!(var.initializer.as_ref().unwrap().contains_error());
        }
        other => panic!("expected variable, got {:?}", other),
    }
    assert!(shader.members.iter().any(|m| matches!(m, ShaderMember::Error(_))));
    assert!(shader
        .members
        .iter()
        .any(|m| matches!(m, ShaderMember::Method(f) if f.name == "Good")));

    // The declaration after the shader still parses.
    assert!(parsed
        .module
        .declarations
        .iter()
        .any(|d| d.name() == Some("ok")));
}

#[test]
fn test_statement_recovery_keeps_following_statements() {
    let source = "void f() { int x = 1 +; x = 2; }";
    let parsed = parse(source, 0, &IndexMap::new());
    let Declaration::Function(function) = &parsed.module.declarations[0] else {
        panic!("expected function");
    };
    let statements = &function.body.as_ref().unwrap().statements;
    assert_eq!(statements.len(), 2);
    assert!(matches!(&statements[1], Stmt::Assign { .. }));
    assert_eq!(parsed.errors.len(), 1);
}

#[test]
fn test_invalid_character_is_reported() {
    let parsed = parse("float x = 1 @ 2;", 0, &IndexMap::new());
    assert!(parsed
        .errors
        .iter()
        .any(|e| e.kind == ParseErrorKind::InvalidCharacter));
}

#[test]
fn test_preprocessor_errors_surface_with_parse_errors() {
    let parsed = parse("#if 1\nfloat x = ;\n", 0, &IndexMap::new());
    let kinds: Vec<_> = parsed.errors.iter().map(|e| e.kind.clone()).collect();
    assert!(kinds.contains(&ParseErrorKind::Preprocessor));
    assert!(kinds.contains(&ParseErrorKind::UnexpectedToken));
}

#[test]
fn test_error_lines_match_original_source() {
    let source = "#define X 1\n#if X\n\nfloat y = ;\n#endif\n";
    let parsed = parse(source, 0, &IndexMap::new());
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].span.start_line, 4);
}
