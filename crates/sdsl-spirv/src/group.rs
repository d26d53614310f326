//! Canonical module sections.
//!
//! A module lists capabilities first and function bodies last. Each
//! instruction falls into exactly one [`InstructionGroup`], and sorting a
//! stream by group (stably) yields a valid section layout.

use crate::instruction::Instruction;
use spirv::Op;
use tracing::warn;

/// Module section, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstructionGroup {
    Capability,
    Extension,
    ExtInstImport,
    MemoryModel,
    EntryPoint,
    ExecutionMode,
    /// Names and source information
    Debug,
    /// Decorations
    Annotation,
    /// Types, constants and module-level variables
    Declaration,
    /// Functions without a body
    FunctionDeclaration,
    /// Functions with at least one block
    FunctionDefinition,
    /// Opcodes outside the instruction table sort last.
    Unrecognized,
}

impl InstructionGroup {
    /// Section of an instruction that appears outside any function.
    pub fn of(op: Op) -> InstructionGroup {
        use InstructionGroup::*;
        match op {
            Op::Capability => Capability,
            Op::Extension => Extension,
            Op::ExtInstImport => ExtInstImport,
            Op::MemoryModel => MemoryModel,
            Op::EntryPoint => EntryPoint,
            Op::ExecutionMode => ExecutionMode,
            Op::Nop
            | Op::Source
            | Op::SourceExtension
            | Op::String
            | Op::Name
            | Op::MemberName
            | Op::ModuleProcessed => Debug,
            Op::Decorate | Op::MemberDecorate => Annotation,
            Op::TypeVoid
            | Op::TypeBool
            | Op::TypeInt
            | Op::TypeFloat
            | Op::TypeVector
            | Op::TypeMatrix
            | Op::TypeArray
            | Op::TypeRuntimeArray
            | Op::TypeStruct
            | Op::TypePointer
            | Op::TypeFunction
            | Op::ConstantTrue
            | Op::ConstantFalse
            | Op::Constant
            | Op::ConstantComposite
            | Op::ConstantNull
            | Op::Variable
            | Op::Undef => Declaration,
            _ => Unrecognized,
        }
    }
}

/// Group of every instruction, in stream order.
///
/// Everything from an `OpFunction` up to its `OpFunctionEnd` shares one
/// group: a definition if any `OpLabel` appears in between, a declaration
/// otherwise.
pub fn classify<'a>(
    instructions: impl IntoIterator<Item = Instruction<'a>>,
) -> Vec<InstructionGroup> {
    let instructions: Vec<Instruction<'a>> = instructions.into_iter().collect();
    let mut groups = Vec::with_capacity(instructions.len());

    let mut index = 0;
    while index < instructions.len() {
        let instruction = &instructions[index];
        let op = instruction.info().map(|info| info.op);

        if op == Some(Op::Function) {
            let end = instructions[index..]
                .iter()
                .position(|i| i.opcode() == Some(Op::FunctionEnd))
                .map_or(instructions.len(), |offset| index + offset + 1);
            let has_body = instructions[index..end]
                .iter()
                .any(|i| i.opcode() == Some(Op::Label));
            let group = if has_body {
                InstructionGroup::FunctionDefinition
            } else {
                InstructionGroup::FunctionDeclaration
            };
            groups.extend(std::iter::repeat(group).take(end - index));
            index = end;
            continue;
        }

        let group = op.map_or(InstructionGroup::Unrecognized, InstructionGroup::of);
        if group == InstructionGroup::Unrecognized {
            warn!(
                opcode = instruction.opcode_number(),
                index, "unrecognized instruction sorts last"
            );
        }
        groups.push(group);
        index += 1;
    }
    groups
}

/// Indices of `groups` ordered by group, stable within a group.
pub fn sorted_order(groups: &[InstructionGroup]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&index| groups[index]);
    order
}
