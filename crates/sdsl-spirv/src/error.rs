//! Errors raised by encoding and decoding.
//!
//! User shader content never produces these: the lowering pass only emits
//! layouts from the instruction table. They surface when a caller misuses
//! the encoder or feeds malformed words to a decoder.

use crate::info::OperandKind;
use crate::Id;
use spirv::Op;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EncodingError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// An operand was read or written as a different kind than the table
    /// declares.
    #[error("operand '{name}' of Op{op:?} is {actual:?}, not {expected}")]
    WrongOperandKind {
        op: Op,
        name: &'static str,
        actual: OperandKind,
        expected: &'static str,
    },

    /// The opcode defines no operand with this name.
    #[error("Op{op:?} has no operand named '{name}'")]
    UnknownOperand { op: Op, name: String },

    /// Arguments supplied to the encoder do not match the layout.
    #[error("Op{op:?}: {message}")]
    ArgumentMismatch { op: Op, message: String },

    /// An id operand is not below the buffer bound.
    #[error("id %{id} is out of bounds (bound {bound})")]
    IdOutOfBounds { id: Id, bound: u32 },

    /// An instruction would not fit its 16-bit word count.
    #[error("Op{op:?} needs {words} words, more than an instruction can hold")]
    TooLong { op: Op, words: usize },

    /// Opcode missing from the instruction table.
    #[error("unrecognized opcode {opcode} at word {position}")]
    UnrecognizedOpcode { opcode: u32, position: usize },

    /// An instruction claims more words than remain.
    #[error("truncated instruction at word {position}: needs {needed} words, {available} left")]
    Truncated {
        position: usize,
        needed: usize,
        available: usize,
    },

    /// Operand words do not match the instruction layout.
    #[error("malformed Op{op:?} at word {position}: {message}")]
    Malformed {
        op: Op,
        position: usize,
        message: String,
    },

    #[error("invalid module header: {0}")]
    BadHeader(String),

    /// Byte input whose length is not a multiple of four.
    #[error("byte length {0} is not a multiple of 4")]
    ByteLength(usize),

    /// An instruction precedes one from an earlier section.
    #[error("Op{op:?} at instruction {index} is out of section order")]
    OutOfOrder { op: Op, index: usize },
}
