//! Static instruction table.
//!
//! Every opcode the pipeline emits or understands is described once, as an
//! ordered list of operands with a kind and a quantifier. The encoder
//! validates arguments against it, the decoder splits words with it and the
//! disassembler renders from it. Opcodes outside the table are
//! "unrecognized": they round-trip untouched but cannot be renumbered.
//!
//! The table is built on first use and never mutated afterwards.

use indexmap::IndexMap;
use spirv::Op;
use std::sync::OnceLock;

/// Kind of a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    IdResultType,
    IdResult,
    IdRef,
    LiteralInteger,
    /// Nul-terminated UTF-8, padded to a word boundary
    LiteralString,
    /// Width follows the result type; always the trailing operand
    LiteralContextDependentNumber,
    LiteralExtInstInteger,
    // Value enums
    Capability,
    AddressingModel,
    MemoryModel,
    ExecutionModel,
    ExecutionMode,
    StorageClass,
    Decoration,
    BuiltIn,
    SourceLanguage,
    // Bit masks
    FunctionControl,
    SelectionControl,
    LoopControl,
    MemoryAccess,
}

impl OperandKind {
    /// Whether words of this kind are ids that renumbering must offset.
    pub fn is_id(self) -> bool {
        matches!(
            self,
            OperandKind::IdResultType | OperandKind::IdResult | OperandKind::IdRef
        )
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            OperandKind::LiteralInteger
                | OperandKind::LiteralString
                | OperandKind::LiteralContextDependentNumber
                | OperandKind::LiteralExtInstInteger
        )
    }

    pub fn is_mask(self) -> bool {
        matches!(
            self,
            OperandKind::FunctionControl
                | OperandKind::SelectionControl
                | OperandKind::LoopControl
                | OperandKind::MemoryAccess
        )
    }

    pub fn is_enum(self) -> bool {
        !self.is_id() && !self.is_literal() && !self.is_mask()
    }

    /// Symbolic name of an enum value, e.g. `Private` for storage class 6.
    pub fn enum_name(self, value: u32) -> Option<String> {
        fn name<T: std::fmt::Debug>(value: Option<T>) -> Option<String> {
            value.map(|v| format!("{:?}", v))
        }

        match self {
            OperandKind::Capability => name(spirv::Capability::from_u32(value)),
            OperandKind::AddressingModel => name(spirv::AddressingModel::from_u32(value)),
            OperandKind::MemoryModel => name(spirv::MemoryModel::from_u32(value)),
            OperandKind::ExecutionModel => name(spirv::ExecutionModel::from_u32(value)),
            OperandKind::ExecutionMode => name(spirv::ExecutionMode::from_u32(value)),
            OperandKind::StorageClass => name(spirv::StorageClass::from_u32(value)),
            OperandKind::Decoration => name(spirv::Decoration::from_u32(value)),
            OperandKind::BuiltIn => name(spirv::BuiltIn::from_u32(value)),
            OperandKind::SourceLanguage => name(spirv::SourceLanguage::from_u32(value)),
            _ => None,
        }
    }
}

/// How many times an operand may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    One,
    Optional,
    /// Zero or more; only ever the last operand
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandInfo {
    pub kind: OperandKind,
    pub name: &'static str,
    pub quantifier: Quantifier,
}

/// Layout of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub op: Op,
    pub operands: &'static [OperandInfo],
}

impl OpInfo {
    const fn new(op: Op, operands: &'static [OperandInfo]) -> Self {
        Self { op, operands }
    }

    pub fn has_result_type(&self) -> bool {
        self.operands
            .first()
            .is_some_and(|operand| operand.kind == OperandKind::IdResultType)
    }

    pub fn has_result(&self) -> bool {
        self.operands
            .iter()
            .take(2)
            .any(|operand| operand.kind == OperandKind::IdResult)
    }

    /// Word index of the result id within the instruction, if any.
    pub fn result_word(&self) -> Option<usize> {
        if !self.has_result() {
            return None;
        }
        Some(if self.has_result_type() { 2 } else { 1 })
    }

    /// Word index of the result type within the instruction, if any.
    pub fn result_type_word(&self) -> Option<usize> {
        self.has_result_type().then_some(1)
    }

    /// Operand described by `name`.
    pub fn operand(&self, name: &str) -> Option<&'static OperandInfo> {
        self.operands.iter().find(|operand| operand.name == name)
    }

    /// Smallest and largest (if bounded) instruction length in words,
    /// counting strings as one word.
    pub fn word_range(&self) -> (usize, Option<usize>) {
        let mut min = 1;
        let mut max = Some(1usize);
        for operand in self.operands {
            match operand.quantifier {
                Quantifier::One => {
                    min += 1;
                    max = max.map(|m| m + 1);
                }
                Quantifier::Optional => max = max.map(|m| m + 1),
                Quantifier::Many => max = None,
            }
            if matches!(
                operand.kind,
                OperandKind::LiteralString | OperandKind::LiteralContextDependentNumber
            ) {
                max = None;
            }
        }
        (min, max)
    }
}

const fn one(kind: OperandKind, name: &'static str) -> OperandInfo {
    OperandInfo {
        kind,
        name,
        quantifier: Quantifier::One,
    }
}

const fn opt(kind: OperandKind, name: &'static str) -> OperandInfo {
    OperandInfo {
        kind,
        name,
        quantifier: Quantifier::Optional,
    }
}

const fn many(kind: OperandKind, name: &'static str) -> OperandInfo {
    OperandInfo {
        kind,
        name,
        quantifier: Quantifier::Many,
    }
}

use OperandKind::*;

const RESULT: OperandInfo = one(IdResult, "result");
const RESULT_TYPE: OperandInfo = one(IdResultType, "result type");

/// `%r = Op %type`
const TYPED: &[OperandInfo] = &[RESULT_TYPE, RESULT];
const UNARY: &[OperandInfo] = &[RESULT_TYPE, RESULT, one(IdRef, "operand")];
const BINARY: &[OperandInfo] = &[
    RESULT_TYPE,
    RESULT,
    one(IdRef, "operand 1"),
    one(IdRef, "operand 2"),
];
const CONVERSION: &[OperandInfo] = &[RESULT_TYPE, RESULT, one(IdRef, "value")];

static OPS: &[OpInfo] = &[
    OpInfo::new(Op::Nop, &[]),
    OpInfo::new(Op::Undef, TYPED),
    // Debug
    OpInfo::new(
        Op::Source,
        &[
            one(SourceLanguage, "source language"),
            one(LiteralInteger, "version"),
            opt(IdRef, "file"),
            opt(LiteralString, "source"),
        ],
    ),
    OpInfo::new(Op::SourceExtension, &[one(LiteralString, "extension")]),
    OpInfo::new(Op::Name, &[one(IdRef, "target"), one(LiteralString, "name")]),
    OpInfo::new(
        Op::MemberName,
        &[
            one(IdRef, "type"),
            one(LiteralInteger, "member"),
            one(LiteralString, "name"),
        ],
    ),
    OpInfo::new(Op::String, &[RESULT, one(LiteralString, "string")]),
    OpInfo::new(Op::ModuleProcessed, &[one(LiteralString, "process")]),
    // Module setup
    OpInfo::new(Op::Extension, &[one(LiteralString, "name")]),
    OpInfo::new(Op::ExtInstImport, &[RESULT, one(LiteralString, "name")]),
    OpInfo::new(
        Op::ExtInst,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "set"),
            one(LiteralExtInstInteger, "instruction"),
            many(IdRef, "operands"),
        ],
    ),
    OpInfo::new(
        Op::MemoryModel,
        &[
            one(AddressingModel, "addressing model"),
            one(MemoryModel, "memory model"),
        ],
    ),
    OpInfo::new(
        Op::EntryPoint,
        &[
            one(ExecutionModel, "execution model"),
            one(IdRef, "entry point"),
            one(LiteralString, "name"),
            many(IdRef, "interface"),
        ],
    ),
    OpInfo::new(
        Op::ExecutionMode,
        &[
            one(IdRef, "entry point"),
            one(ExecutionMode, "mode"),
            many(LiteralInteger, "mode operands"),
        ],
    ),
    OpInfo::new(Op::Capability, &[one(Capability, "capability")]),
    // Types
    OpInfo::new(Op::TypeVoid, &[RESULT]),
    OpInfo::new(Op::TypeBool, &[RESULT]),
    OpInfo::new(
        Op::TypeInt,
        &[
            RESULT,
            one(LiteralInteger, "width"),
            one(LiteralInteger, "signedness"),
        ],
    ),
    OpInfo::new(Op::TypeFloat, &[RESULT, one(LiteralInteger, "width")]),
    OpInfo::new(
        Op::TypeVector,
        &[
            RESULT,
            one(IdRef, "component type"),
            one(LiteralInteger, "component count"),
        ],
    ),
    OpInfo::new(
        Op::TypeMatrix,
        &[
            RESULT,
            one(IdRef, "column type"),
            one(LiteralInteger, "column count"),
        ],
    ),
    OpInfo::new(
        Op::TypeArray,
        &[RESULT, one(IdRef, "element type"), one(IdRef, "length")],
    ),
    OpInfo::new(Op::TypeRuntimeArray, &[RESULT, one(IdRef, "element type")]),
    OpInfo::new(Op::TypeStruct, &[RESULT, many(IdRef, "member types")]),
    OpInfo::new(
        Op::TypePointer,
        &[RESULT, one(StorageClass, "storage class"), one(IdRef, "type")],
    ),
    OpInfo::new(
        Op::TypeFunction,
        &[
            RESULT,
            one(IdRef, "return type"),
            many(IdRef, "parameter types"),
        ],
    ),
    // Constants
    OpInfo::new(Op::ConstantTrue, TYPED),
    OpInfo::new(Op::ConstantFalse, TYPED),
    OpInfo::new(
        Op::Constant,
        &[
            RESULT_TYPE,
            RESULT,
            one(LiteralContextDependentNumber, "value"),
        ],
    ),
    OpInfo::new(
        Op::ConstantComposite,
        &[RESULT_TYPE, RESULT, many(IdRef, "constituents")],
    ),
    OpInfo::new(Op::ConstantNull, TYPED),
    // Functions
    OpInfo::new(
        Op::Function,
        &[
            RESULT_TYPE,
            RESULT,
            one(FunctionControl, "function control"),
            one(IdRef, "function type"),
        ],
    ),
    OpInfo::new(Op::FunctionParameter, TYPED),
    OpInfo::new(Op::FunctionEnd, &[]),
    OpInfo::new(
        Op::FunctionCall,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "function"),
            many(IdRef, "arguments"),
        ],
    ),
    // Memory
    OpInfo::new(
        Op::Variable,
        &[
            RESULT_TYPE,
            RESULT,
            one(StorageClass, "storage class"),
            opt(IdRef, "initializer"),
        ],
    ),
    OpInfo::new(
        Op::Load,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "pointer"),
            opt(MemoryAccess, "memory access"),
        ],
    ),
    OpInfo::new(
        Op::Store,
        &[
            one(IdRef, "pointer"),
            one(IdRef, "object"),
            opt(MemoryAccess, "memory access"),
        ],
    ),
    OpInfo::new(
        Op::AccessChain,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "base"),
            many(IdRef, "indexes"),
        ],
    ),
    // Annotations
    OpInfo::new(
        Op::Decorate,
        &[
            one(IdRef, "target"),
            one(Decoration, "decoration"),
            many(LiteralInteger, "values"),
        ],
    ),
    OpInfo::new(
        Op::MemberDecorate,
        &[
            one(IdRef, "structure type"),
            one(LiteralInteger, "member"),
            one(Decoration, "decoration"),
            many(LiteralInteger, "values"),
        ],
    ),
    // Composites
    OpInfo::new(
        Op::VectorShuffle,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "vector 1"),
            one(IdRef, "vector 2"),
            many(LiteralInteger, "components"),
        ],
    ),
    OpInfo::new(
        Op::CompositeConstruct,
        &[RESULT_TYPE, RESULT, many(IdRef, "constituents")],
    ),
    OpInfo::new(
        Op::CompositeExtract,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "composite"),
            many(LiteralInteger, "indexes"),
        ],
    ),
    OpInfo::new(
        Op::CompositeInsert,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "object"),
            one(IdRef, "composite"),
            many(LiteralInteger, "indexes"),
        ],
    ),
    OpInfo::new(Op::Transpose, &[RESULT_TYPE, RESULT, one(IdRef, "matrix")]),
    // Conversions
    OpInfo::new(Op::ConvertFToU, CONVERSION),
    OpInfo::new(Op::ConvertFToS, CONVERSION),
    OpInfo::new(Op::ConvertSToF, CONVERSION),
    OpInfo::new(Op::ConvertUToF, CONVERSION),
    OpInfo::new(Op::UConvert, CONVERSION),
    OpInfo::new(Op::SConvert, CONVERSION),
    OpInfo::new(Op::FConvert, CONVERSION),
    OpInfo::new(Op::Bitcast, CONVERSION),
    // Arithmetic
    OpInfo::new(Op::SNegate, UNARY),
    OpInfo::new(Op::FNegate, UNARY),
    OpInfo::new(Op::IAdd, BINARY),
    OpInfo::new(Op::FAdd, BINARY),
    OpInfo::new(Op::ISub, BINARY),
    OpInfo::new(Op::FSub, BINARY),
    OpInfo::new(Op::IMul, BINARY),
    OpInfo::new(Op::FMul, BINARY),
    OpInfo::new(Op::UDiv, BINARY),
    OpInfo::new(Op::SDiv, BINARY),
    OpInfo::new(Op::FDiv, BINARY),
    OpInfo::new(Op::UMod, BINARY),
    OpInfo::new(Op::SRem, BINARY),
    OpInfo::new(Op::SMod, BINARY),
    OpInfo::new(Op::FRem, BINARY),
    OpInfo::new(Op::FMod, BINARY),
    OpInfo::new(
        Op::VectorTimesScalar,
        &[RESULT_TYPE, RESULT, one(IdRef, "vector"), one(IdRef, "scalar")],
    ),
    OpInfo::new(
        Op::MatrixTimesScalar,
        &[RESULT_TYPE, RESULT, one(IdRef, "matrix"), one(IdRef, "scalar")],
    ),
    OpInfo::new(
        Op::VectorTimesMatrix,
        &[RESULT_TYPE, RESULT, one(IdRef, "vector"), one(IdRef, "matrix")],
    ),
    OpInfo::new(
        Op::MatrixTimesVector,
        &[RESULT_TYPE, RESULT, one(IdRef, "matrix"), one(IdRef, "vector")],
    ),
    OpInfo::new(
        Op::MatrixTimesMatrix,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "left matrix"),
            one(IdRef, "right matrix"),
        ],
    ),
    OpInfo::new(
        Op::Dot,
        &[RESULT_TYPE, RESULT, one(IdRef, "vector 1"), one(IdRef, "vector 2")],
    ),
    // Relational and logical
    OpInfo::new(Op::Any, &[RESULT_TYPE, RESULT, one(IdRef, "vector")]),
    OpInfo::new(Op::All, &[RESULT_TYPE, RESULT, one(IdRef, "vector")]),
    OpInfo::new(Op::LogicalEqual, BINARY),
    OpInfo::new(Op::LogicalNotEqual, BINARY),
    OpInfo::new(Op::LogicalOr, BINARY),
    OpInfo::new(Op::LogicalAnd, BINARY),
    OpInfo::new(Op::LogicalNot, UNARY),
    OpInfo::new(
        Op::Select,
        &[
            RESULT_TYPE,
            RESULT,
            one(IdRef, "condition"),
            one(IdRef, "object 1"),
            one(IdRef, "object 2"),
        ],
    ),
    OpInfo::new(Op::IEqual, BINARY),
    OpInfo::new(Op::INotEqual, BINARY),
    OpInfo::new(Op::UGreaterThan, BINARY),
    OpInfo::new(Op::SGreaterThan, BINARY),
    OpInfo::new(Op::UGreaterThanEqual, BINARY),
    OpInfo::new(Op::SGreaterThanEqual, BINARY),
    OpInfo::new(Op::ULessThan, BINARY),
    OpInfo::new(Op::SLessThan, BINARY),
    OpInfo::new(Op::ULessThanEqual, BINARY),
    OpInfo::new(Op::SLessThanEqual, BINARY),
    OpInfo::new(Op::FOrdEqual, BINARY),
    OpInfo::new(Op::FOrdNotEqual, BINARY),
    OpInfo::new(Op::FOrdLessThan, BINARY),
    OpInfo::new(Op::FOrdGreaterThan, BINARY),
    OpInfo::new(Op::FOrdLessThanEqual, BINARY),
    OpInfo::new(Op::FOrdGreaterThanEqual, BINARY),
    // Bit operations
    OpInfo::new(
        Op::ShiftRightLogical,
        &[RESULT_TYPE, RESULT, one(IdRef, "base"), one(IdRef, "shift")],
    ),
    OpInfo::new(
        Op::ShiftRightArithmetic,
        &[RESULT_TYPE, RESULT, one(IdRef, "base"), one(IdRef, "shift")],
    ),
    OpInfo::new(
        Op::ShiftLeftLogical,
        &[RESULT_TYPE, RESULT, one(IdRef, "base"), one(IdRef, "shift")],
    ),
    OpInfo::new(Op::BitwiseOr, BINARY),
    OpInfo::new(Op::BitwiseXor, BINARY),
    OpInfo::new(Op::BitwiseAnd, BINARY),
    OpInfo::new(Op::Not, UNARY),
    // Control flow
    OpInfo::new(
        Op::LoopMerge,
        &[
            one(IdRef, "merge block"),
            one(IdRef, "continue target"),
            one(LoopControl, "loop control"),
        ],
    ),
    OpInfo::new(
        Op::SelectionMerge,
        &[
            one(IdRef, "merge block"),
            one(SelectionControl, "selection control"),
        ],
    ),
    OpInfo::new(Op::Label, &[RESULT]),
    OpInfo::new(Op::Branch, &[one(IdRef, "target label")]),
    OpInfo::new(
        Op::BranchConditional,
        &[
            one(IdRef, "condition"),
            one(IdRef, "true label"),
            one(IdRef, "false label"),
            many(LiteralInteger, "branch weights"),
        ],
    ),
    OpInfo::new(Op::Kill, &[]),
    OpInfo::new(Op::Return, &[]),
    OpInfo::new(Op::ReturnValue, &[one(IdRef, "value")]),
    OpInfo::new(Op::Unreachable, &[]),
];

fn table() -> &'static IndexMap<u32, &'static OpInfo> {
    static TABLE: OnceLock<IndexMap<u32, &'static OpInfo>> = OnceLock::new();
    TABLE.get_or_init(|| OPS.iter().map(|info| (info.op as u32, info)).collect())
}

/// Layout of `op`, or `None` when the opcode is not in the table.
pub fn op_info(op: Op) -> Option<&'static OpInfo> {
    opcode_info(op as u32)
}

/// Layout for a raw opcode number.
pub fn opcode_info(opcode: u32) -> Option<&'static OpInfo> {
    table().get(&opcode).copied()
}

/// Every opcode in the table, in table order.
pub fn known_ops() -> impl Iterator<Item = Op> {
    table().values().map(|info| info.op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_no_duplicates() {
        assert_eq!(table().len(), OPS.len());
    }

    #[test]
    fn test_many_is_always_last() {
        for info in OPS {
            let many = info
                .operands
                .iter()
                .position(|operand| operand.quantifier == Quantifier::Many);
            if let Some(position) = many {
                assert_eq!(position, info.operands.len() - 1, "Op{:?}", info.op);
            }
        }
    }

    #[test]
    fn test_result_positions() {
        let float = op_info(Op::TypeFloat).unwrap();
        assert_eq!(float.result_word(), Some(1));
        assert_eq!(float.result_type_word(), None);

        let constant = op_info(Op::Constant).unwrap();
        assert_eq!(constant.result_word(), Some(2));
        assert_eq!(constant.result_type_word(), Some(1));

        assert_eq!(op_info(Op::Store).unwrap().result_word(), None);
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(
            OperandKind::StorageClass.enum_name(6).as_deref(),
            Some("Private")
        );
        assert_eq!(OperandKind::Capability.enum_name(1).as_deref(), Some("Shader"));
        assert!(OperandKind::FunctionControl.is_mask());
        assert!(OperandKind::StorageClass.is_enum());
    }
}
