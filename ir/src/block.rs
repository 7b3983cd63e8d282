//! Basic block storage.
//!
//! A block's predecessor/successor bookkeeping mirrors Cranelift's `flowgraph::CFGNode`, except
//! that here predecessors/successors are maintained eagerly on every mutation (this pass performs
//! a handful of CFG edits per loop, not thousands, so there's no need for Cranelift's lazy
//! recompute-on-demand `ControlFlowGraph`).

use smallvec::SmallVec;

use crate::entities::{Block, Inst, LoopId};

#[derive(Clone, Debug, Default)]
pub struct BlockData {
    /// Non-phi instructions, in program order. The last entry, if any, is the block's
    /// terminator.
    pub(crate) instructions: Vec<Inst>,
    /// Phi instructions, in no particular order relative to `instructions` (phis are always
    /// logically "first" in the block, executing simultaneously).
    pub(crate) phis: Vec<Inst>,
    pub(crate) predecessors: SmallVec<[Block; 4]>,
    pub(crate) successors: SmallVec<[Block; 2]>,
    pub(crate) loop_id: Option<LoopId>,
}

impl BlockData {
    pub fn instructions(&self) -> &[Inst] {
        &self.instructions
    }

    pub fn phis(&self) -> &[Inst] {
        &self.phis
    }

    pub fn predecessors(&self) -> &[Block] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[Block] {
        &self.successors
    }

    pub fn loop_id(&self) -> Option<LoopId> {
        self.loop_id
    }

    pub fn first_instruction(&self) -> Option<Inst> {
        self.instructions.first().copied()
    }

    pub fn last_instruction(&self) -> Option<Inst> {
        self.instructions.last().copied()
    }

    /// A "single goto" block: its only instruction is a `Goto` and it has no phis.
    pub fn is_single_goto(&self, is_goto: impl Fn(Inst) -> bool) -> bool {
        self.phis.is_empty() && self.instructions.len() == 1 && is_goto(self.instructions[0])
    }
}
