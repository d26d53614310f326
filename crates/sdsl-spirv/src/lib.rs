// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! SPIR-V binary layer for SDSL.
//!
//! Shaders are compiled one mixin at a time into a [`WordBuffer`], each with
//! its own id space starting at 1. A [`MixinGraph`] stitches frozen mixins
//! into one program without copying: ids are renumbered on the fly by the
//! cumulative bound of the preceding mixins, and [`MixinGraph::sorted`]
//! yields every instruction in canonical section order.
//!
//! Encoding, decoding and disassembly all read the same static
//! instruction table ([`info`]), so they cannot disagree about a layout.

pub mod buffer;
pub mod disasm;
pub mod error;
pub mod graph;
pub mod group;
pub mod info;
pub mod instruction;
pub mod mixin;

pub use buffer::{Arg, Header, WordBuffer};
pub use disasm::{disassemble_module, Disassembler};
pub use error::{EncodingError, Result};
pub use graph::{GraphInstruction, MixinGraph};
pub use group::InstructionGroup;
pub use info::{op_info, OpInfo, OperandInfo, OperandKind, Quantifier};
pub use instruction::{Instruction, Operand};
pub use mixin::Mixin;

/// Re-export of the `spirv` crate for opcode and enum values.
pub use spirv;

/// One 32-bit SPIR-V word.
pub type Word = u32;

/// Result or reference id.
pub type Id = Word;
