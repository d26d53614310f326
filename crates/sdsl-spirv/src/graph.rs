//! Mixin graph: many mixins viewed as one module.
//!
//! Mixins keep their own id spaces. The graph assigns each one an offset
//! equal to the sum of the bounds before it and shifts every id by that
//! offset on the way out, so the combined stream never reuses an id and
//! stays below the sum of all bounds. No words are copied until
//! [`MixinGraph::to_buffer`].

use crate::buffer::WordBuffer;
use crate::group::InstructionGroup;
use crate::instruction::Instruction;
use crate::mixin::Mixin;
use crate::{Id, Word};
use spirv::Op;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Ordered set of shared mixins.
#[derive(Debug, Clone)]
pub struct MixinGraph {
    mixins: Vec<Arc<Mixin>>,
    offsets: OnceLock<Vec<Word>>,
}

impl MixinGraph {
    pub fn new(mixins: Vec<Arc<Mixin>>) -> Self {
        Self {
            mixins,
            offsets: OnceLock::new(),
        }
    }

    pub fn mixins(&self) -> &[Arc<Mixin>] {
        &self.mixins
    }

    /// Position and mixin named `name`.
    pub fn find_mixin(&self, name: &str) -> Option<(usize, &Arc<Mixin>)> {
        self.mixins
            .iter()
            .enumerate()
            .find(|(_, mixin)| mixin.name() == name)
    }

    /// Id offset per mixin, computed on first use.
    pub fn offsets(&self) -> &[Word] {
        self.offsets.get_or_init(|| {
            let mut next = 0;
            self.mixins
                .iter()
                .map(|mixin| {
                    let offset = next;
                    next += mixin.bound();
                    offset
                })
                .collect()
        })
    }

    /// Sum of the mixin bounds; at least 1.
    pub fn bound(&self) -> Word {
        self.mixins
            .iter()
            .map(|mixin| mixin.bound())
            .sum::<Word>()
            .max(1)
    }

    /// Total instruction count.
    pub fn len(&self) -> usize {
        self.mixins.iter().map(|mixin| mixin.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn at(&self, mixin_index: usize, index: usize) -> Option<GraphInstruction<'_>> {
        let mixin = self.mixins.get(mixin_index)?;
        Some(GraphInstruction {
            mixin_index,
            mixin: mixin.as_ref(),
            offset: self.offsets()[mixin_index],
            instruction: mixin.instruction(index)?,
            group: mixin.group(index).unwrap_or(InstructionGroup::Unrecognized),
        })
    }

    /// Every instruction, mixin by mixin.
    pub fn instructions(&self) -> impl Iterator<Item = GraphInstruction<'_>> + '_ {
        (0..self.mixins.len()).flat_map(move |mixin_index| {
            (0..self.mixins[mixin_index].len()).filter_map(move |index| self.at(mixin_index, index))
        })
    }

    /// Instructions whose opcode is any of `ops`.
    ///
    /// # Panics
    /// Panics unless one to four opcodes are given.
    pub fn filtered<const N: usize>(
        &self,
        ops: [Op; N],
    ) -> impl Iterator<Item = GraphInstruction<'_>> + '_ {
        assert!(
            (1..=4).contains(&N),
            "filtered takes between 1 and 4 opcodes, got {}",
            N
        );
        self.instructions()
            .filter(move |instruction| instruction.opcode().is_some_and(|op| ops.contains(&op)))
    }

    /// Instructions in canonical section order. Within a section,
    /// instructions keep graph order.
    pub fn sorted(&self) -> impl Iterator<Item = GraphInstruction<'_>> + '_ {
        let mut order: Vec<(InstructionGroup, usize, usize)> = Vec::with_capacity(self.len());
        for (mixin_index, mixin) in self.mixins.iter().enumerate() {
            for (index, group) in mixin.groups().iter().enumerate() {
                order.push((*group, mixin_index, index));
            }
        }
        order.sort_by_key(|(group, _, _)| *group);
        order
            .into_iter()
            .filter_map(move |(_, mixin_index, index)| self.at(mixin_index, index))
    }

    /// Materialize the sorted, renumbered stream as one buffer.
    pub fn to_buffer(&self) -> WordBuffer {
        let mut words = Vec::new();
        let mut count = 0;
        for instruction in self.sorted() {
            words.extend(instruction.words());
            count += 1;
        }
        debug!(
            mixins = self.mixins.len(),
            instructions = count,
            bound = self.bound(),
            "materialized mixin graph"
        );
        WordBuffer::from_parts(words, self.bound(), count)
    }
}

/// One instruction seen through the graph: ids are shifted by the owning
/// mixin's offset.
#[derive(Debug, Clone, Copy)]
pub struct GraphInstruction<'g> {
    mixin_index: usize,
    mixin: &'g Mixin,
    offset: Word,
    instruction: Instruction<'g>,
    group: InstructionGroup,
}

impl<'g> GraphInstruction<'g> {
    pub fn mixin(&self) -> &'g Mixin {
        self.mixin
    }

    pub fn mixin_index(&self) -> usize {
        self.mixin_index
    }

    pub fn offset(&self) -> Word {
        self.offset
    }

    pub fn group(&self) -> InstructionGroup {
        self.group
    }

    /// Instruction as stored in the mixin, with local ids.
    pub fn local(&self) -> Instruction<'g> {
        self.instruction
    }

    pub fn opcode(&self) -> Option<Op> {
        self.instruction.opcode()
    }

    pub fn result_id(&self) -> Option<Id> {
        self.instruction.result_id().map(|id| id + self.offset)
    }

    pub fn result_type(&self) -> Option<Id> {
        self.instruction.result_type().map(|id| id + self.offset)
    }

    /// Renumbered words.
    pub fn words(&self) -> Vec<Word> {
        self.instruction.renumbered(self.offset)
    }
}

impl fmt::Display for GraphInstruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self.words();
        match Instruction::new(&words) {
            Ok(instruction) => write!(f, "{}", instruction),
            Err(_) => write!(f, "{}", self.instruction),
        }
    }
}
