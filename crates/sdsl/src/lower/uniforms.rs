//! The default uniform block.
//!
//! Globals that are neither `static`, `const` nor streams are parameters
//! set by the host. They become members of one `Globals` block, laid out
//! with std140 rules, at descriptor set 0, binding 0. A source row of a
//! matrix is a SPIR-V column and takes one 16-byte slot.

use super::{synthetic, Lowered, Lowerer};
use crate::compile::GLOBALS;
use crate::link::{LinkPlan, UNIFORM_BLOCK};
use sdsl_resolve::{ErrorKind, ScalarKind, SymbolType};
use sdsl_spirv::spirv::{Decoration, LinkageType, StorageClass};
use sdsl_spirv::Id;
use std::collections::HashSet;
use tracing::instrument;

/// Lower the mixin defining the default uniform block of `plan`.
#[instrument(skip_all, fields(members = plan.uniforms().len()))]
pub fn lower_uniform_block(plan: &LinkPlan) -> Lowered {
    let mixin = synthetic(GLOBALS);
    let mut lowerer = Lowerer::new(&mixin, plan);

    for member in plan.uniforms() {
        if contains_bool(&member.ty) {
            lowerer.span = member.span;
            lowerer.error(
                ErrorKind::TypeMismatch,
                format!(
                    "uniform '{}' of type '{}' has no buffer layout; declare it 'static'",
                    member.name, member.ty
                ),
            );
        }
    }
    if !lowerer.errors.is_empty() {
        return lowerer.finish();
    }

    let block = plan.uniform_block_type();
    let Some(ty) = lowerer.type_id(&block) else {
        return lowerer.finish();
    };
    lowerer.decl().decorate(ty, Decoration::Block, &[]);
    lowerer.decorate_layout(&block, &mut HashSet::new());

    let pointer = lowerer.pointer_type(StorageClass::Uniform, ty);
    let variable = lowerer
        .decl()
        .variable(pointer, StorageClass::Uniform, None);
    lowerer.decl().name(variable, UNIFORM_BLOCK);
    lowerer
        .decl()
        .decorate(variable, Decoration::DescriptorSet, &[0]);
    lowerer.decl().decorate(variable, Decoration::Binding, &[0]);
    lowerer.link_symbol(variable, UNIFORM_BLOCK, LinkageType::Export);
    lowerer.finish()
}

impl Lowerer<'_> {
    /// Offsets, strides and matrix layout of `ty` and every type inside
    /// it. Each type id is decorated once.
    fn decorate_layout(&mut self, ty: &SymbolType, done: &mut HashSet<Id>) -> Option<()> {
        match ty {
            SymbolType::Struct { fields, .. } => {
                let id = self.type_id(ty)?;
                if !done.insert(id) {
                    return Some(());
                }
                let mut offset = 0;
                for (index, (_, field)) in fields.iter().enumerate() {
                    let (size, align) = layout(field)?;
                    offset = round_up(offset, align);
                    let member = index as u32;
                    self.decl()
                        .member_decorate(id, member, Decoration::Offset, &[offset]);
                    if let Some(stride) = matrix_stride(field) {
                        self.decl()
                            .member_decorate(id, member, Decoration::ColMajor, &[]);
                        self.decl()
                            .member_decorate(id, member, Decoration::MatrixStride, &[stride]);
                    }
                    self.decorate_layout(field, done)?;
                    offset += size;
                }
            }
            SymbolType::Array { element, .. } => {
                let id = self.type_id(ty)?;
                let (size, align) = layout(element)?;
                if done.insert(id) {
                    let stride = round_up(size, round_up(align, 16));
                    self.decl().decorate(id, Decoration::ArrayStride, &[stride]);
                }
                self.decorate_layout(element, done)?;
            }
            _ => {}
        }
        Some(())
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    if align == 0 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

fn scalar_size(kind: ScalarKind) -> u32 {
    match kind {
        ScalarKind::Long | ScalarKind::ULong | ScalarKind::Double => 8,
        _ => 4,
    }
}

/// std140 `(size, alignment)` in bytes.
fn layout(ty: &SymbolType) -> Option<(u32, u32)> {
    match ty {
        SymbolType::Scalar(kind) => {
            let size = scalar_size(*kind);
            Some((size, size))
        }
        SymbolType::Vector { base, size } => {
            let scalar = scalar_size(*base);
            let align = if *size == 2 { 2 * scalar } else { 4 * scalar };
            Some((size * scalar, align))
        }
        SymbolType::Matrix { rows, .. } => {
            let stride = matrix_stride(ty)?;
            Some((rows * stride, stride))
        }
        SymbolType::Array {
            element,
            length: Some(length),
        } => {
            let (size, align) = layout(element)?;
            let align = round_up(align, 16);
            Some((round_up(size, align) * length, align))
        }
        SymbolType::Struct { fields, .. } => {
            let mut offset = 0;
            let mut align = 16;
            for (_, field) in fields {
                let (field_size, field_align) = layout(field)?;
                offset = round_up(offset, field_align) + field_size;
                align = align.max(round_up(field_align, 16));
            }
            Some((round_up(offset, align), align))
        }
        _ => None,
    }
}

/// Distance between matrix columns, for a matrix or an array of them.
fn matrix_stride(ty: &SymbolType) -> Option<u32> {
    match ty {
        SymbolType::Matrix { base, cols, .. } => {
            let (_, align) = layout(&SymbolType::vector(*base, *cols))?;
            Some(round_up(align, 16))
        }
        SymbolType::Array { element, .. } => matrix_stride(element),
        _ => None,
    }
}

fn contains_bool(ty: &SymbolType) -> bool {
    match ty {
        SymbolType::Scalar(kind) | SymbolType::Vector { base: kind, .. } => {
            *kind == ScalarKind::Bool
        }
        SymbolType::Array { element, .. } => contains_bool(element),
        SymbolType::Struct { fields, .. } => fields.iter().any(|(_, field)| contains_bool(field)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsl_ast::Span;
    use sdsl_resolve::typed::{GlobalKind, Program, TypedGlobal, TypedMixin};
    use sdsl_spirv::spirv::Op;

    fn plan(globals: &[(&str, SymbolType)]) -> LinkPlan {
        let mixin = TypedMixin {
            globals: globals
                .iter()
                .map(|(name, ty)| TypedGlobal {
                    name: name.to_string(),
                    ty: ty.clone(),
                    kind: GlobalKind::Uniform,
                    semantic: None,
                    initializer: None,
                    span: Span::zero(0),
                })
                .collect(),
            ..synthetic("Material")
        };
        let program = Program {
            mixins: vec![mixin],
            effects: Vec::new(),
        };
        let selected: Vec<&TypedMixin> = program.mixins.iter().collect();
        LinkPlan::new(&program, &selected)
    }

    /// `(member, decoration, values)` of every member decoration.
    fn member_decorations(lowered: &Lowered) -> Vec<(u32, u32, Vec<u32>)> {
        lowered
            .buffer
            .instructions()
            .filter(|i| i.opcode() == Some(Op::MemberDecorate))
            .map(|i| {
                let words = i.words();
                (words[2], words[3], words[4..].to_vec())
            })
            .collect()
    }

    #[test]
    fn test_std140_offsets() {
        let float4x4 = SymbolType::Matrix {
            base: ScalarKind::Float,
            rows: 4,
            cols: 4,
        };
        let plan = plan(&[
            ("Gain", SymbolType::FLOAT),
            ("Tint", SymbolType::vector(ScalarKind::Float, 3)),
            ("Bias", SymbolType::vector(ScalarKind::Float, 2)),
            ("World", float4x4),
        ]);
        let lowered = lower_uniform_block(&plan);
        assert!(lowered.errors.is_empty(), "{:?}", lowered.errors);
        lowered.buffer.validate_layout().unwrap();

        let offset = Decoration::Offset as u32;
        let offsets: Vec<(u32, u32)> = member_decorations(&lowered)
            .into_iter()
            .filter(|(_, decoration, _)| *decoration == offset)
            .map(|(member, _, values)| (member, values[0]))
            .collect();
        assert_eq!(offsets, vec![(0, 0), (1, 16), (2, 32), (3, 48)]);

        let stride = Decoration::MatrixStride as u32;
        assert!(member_decorations(&lowered).contains(&(3, stride, vec![16])));
    }

    #[test]
    fn test_block_is_bound_and_exported() {
        let lowered = lower_uniform_block(&plan(&[("Gain", SymbolType::FLOAT)]));
        let decorations: Vec<(u32, Vec<u32>)> = lowered
            .buffer
            .instructions()
            .filter(|i| i.opcode() == Some(Op::Decorate) && i.linkage().is_none())
            .map(|i| (i.words()[2], i.words()[3..].to_vec()))
            .collect();
        assert!(decorations.contains(&(Decoration::Block as u32, vec![])));
        assert!(decorations.contains(&(Decoration::DescriptorSet as u32, vec![0])));
        assert!(decorations.contains(&(Decoration::Binding as u32, vec![0])));

        let exports: Vec<String> = lowered
            .buffer
            .instructions()
            .filter_map(|i| i.linkage())
            .map(|(_, name, _)| name)
            .collect();
        assert_eq!(exports, vec![UNIFORM_BLOCK]);
    }

    #[test]
    fn test_array_stride_rounds_to_sixteen() {
        let weights = SymbolType::Array {
            element: Box::new(SymbolType::FLOAT),
            length: Some(4),
        };
        assert_eq!(layout(&weights), Some((64, 16)));
        let lowered = lower_uniform_block(&plan(&[("Weights", weights)]));
        let strides: Vec<u32> = lowered
            .buffer
            .instructions()
            .filter(|i| {
                i.opcode() == Some(Op::Decorate) && i.words()[2] == Decoration::ArrayStride as u32
            })
            .map(|i| i.words()[3])
            .collect();
        assert_eq!(strides, vec![16]);
    }

    #[test]
    fn test_bool_uniform_is_rejected() {
        let lowered = lower_uniform_block(&plan(&[("Enabled", SymbolType::BOOL)]));
        assert_eq!(lowered.errors.len(), 1);
        assert!(lowered.errors[0].message.contains("'static'"));
        assert!(!lowered
            .buffer
            .instructions()
            .any(|i| i.opcode() == Some(Op::TypeStruct)));
    }
}
