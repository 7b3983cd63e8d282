//! Natural-loop records.
//!
//! Loop *discovery* (computing natural loops and nesting from a raw CFG) is out of scope here —
//! callers construct [`LoopData`] directly (or via [`crate::Graph::create_loop`]) the way a host
//! compiler's loop-finder would have already done before handing the graph to this crate's
//! consumers.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::entities::{Block, Inst, LoopId};

#[derive(Clone, Debug)]
pub struct LoopData {
    pub(crate) header: Block,
    pub(crate) preheader: Block,
    pub(crate) back_edges: SmallVec<[Block; 2]>,
    pub(crate) members: FxHashSet<Block>,
    pub(crate) suspend_check: Option<Inst>,
    pub(crate) bottom_tested: bool,
    pub(crate) exit_block: Option<Block>,
    /// The loop immediately enclosing this one, if any. Used by `add_to_all`.
    pub(crate) parent: Option<LoopId>,
}

impl LoopData {
    pub fn header(&self) -> Block {
        self.header
    }

    pub fn preheader(&self) -> Block {
        self.preheader
    }

    pub fn back_edges(&self) -> &[Block] {
        &self.back_edges
    }

    pub fn number_of_back_edges(&self) -> usize {
        self.back_edges.len()
    }

    pub fn is_back_edge(&self, block: Block) -> bool {
        self.back_edges.contains(&block)
    }

    pub fn contains(&self, block: Block) -> bool {
        self.members.contains(&block)
    }

    pub fn suspend_check(&self) -> Option<Inst> {
        self.suspend_check
    }

    pub fn exit_block(&self) -> Option<Block> {
        self.exit_block
    }

    pub fn is_bottom_tested(&self) -> bool {
        self.bottom_tested
    }

    pub fn parent(&self) -> Option<LoopId> {
        self.parent
    }
}
