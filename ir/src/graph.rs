//! The top-level IR container.
//!
//! `Graph` owns three arenas (blocks, instructions, loops), matching Cranelift's `Function`
//! owning a `DataFlowGraph` + `Layout`, collapsed into a single owner here since this IR has no
//! separate "layout" concept worth splitting out (block/instruction order lives directly on
//! [`crate::BlockData`]).

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::block::BlockData;
use crate::dominance::DominatorTree;
use crate::entities::{Block, Inst, LoopId};
use crate::error::Error;
use crate::inst::{Environment, InstData, InstKind, Use, UseKind};
use crate::loop_data::LoopData;

#[derive(Default)]
pub struct Graph {
    blocks: PrimaryMap<Block, BlockData>,
    insts: PrimaryMap<Inst, InstData>,
    loops: PrimaryMap<LoopId, LoopData>,
    domtree: DominatorTree,
    entry: Option<Block>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------- blocks

    pub fn create_block(&mut self) -> Block {
        self.domtree.invalidate();
        self.blocks.push(BlockData::default())
    }

    pub fn set_entry(&mut self, block: Block) {
        self.entry = Some(block);
        self.domtree.invalidate();
    }

    pub fn entry(&self) -> Option<Block> {
        self.entry
    }

    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    pub fn predecessors(&self, block: Block) -> &[Block] {
        self.blocks[block].predecessors()
    }

    pub fn successors(&self, block: Block) -> &[Block] {
        self.blocks[block].successors()
    }

    pub fn phis(&self, block: Block) -> &[Inst] {
        self.blocks[block].phis()
    }

    pub fn instructions(&self, block: Block) -> &[Inst] {
        self.blocks[block].instructions()
    }

    pub fn first_instruction(&self, block: Block) -> Option<Inst> {
        self.blocks[block].first_instruction()
    }

    pub fn last_instruction(&self, block: Block) -> Option<Inst> {
        self.blocks[block].last_instruction()
    }

    pub fn is_single_goto_block(&self, block: Block) -> bool {
        self.blocks[block].is_single_goto(|i| self.kind(i).is_goto())
    }

    pub fn block_loop(&self, block: Block) -> Option<LoopId> {
        self.blocks[block].loop_id
    }

    pub fn set_block_loop(&mut self, block: Block, loop_id: Option<LoopId>) {
        self.blocks[block].loop_id = loop_id;
    }

    /// Append `inst` to `block`'s (non-phi) instruction list, making it the new last
    /// instruction unless more are appended afterward.
    pub fn add_instruction(&mut self, block: Block, inst: Inst) {
        self.domtree.invalidate();
        self.blocks[block].instructions.push(inst);
        self.insts[inst].block = Some(block);
    }

    /// Append `inst` to `block`'s phi list.
    pub fn add_phi(&mut self, block: Block, inst: Inst) {
        self.domtree.invalidate();
        self.blocks[block].phis.push(inst);
        self.insts[inst].block = Some(block);
    }

    pub fn remove_instruction(&mut self, block: Block, inst: Inst) -> Result<(), Error> {
        self.domtree.invalidate();
        let list = &mut self.blocks[block].instructions;
        let pos = list
            .iter()
            .position(|&i| i == inst)
            .ok_or(Error::InstructionNotInBlock(inst, block))?;
        list.remove(pos);
        self.insts[inst].block = None;
        Ok(())
    }

    pub fn remove_phi(&mut self, block: Block, inst: Inst) -> Result<(), Error> {
        self.domtree.invalidate();
        let list = &mut self.blocks[block].phis;
        let pos = list
            .iter()
            .position(|&i| i == inst)
            .ok_or(Error::InstructionNotInBlock(inst, block))?;
        list.remove(pos);
        self.insts[inst].block = None;
        Ok(())
    }

    /// Move `inst` (currently anywhere, or freshly allocated) so that it becomes the first
    /// (non-phi) instruction of `block`. Used to relocate a loop's suspend check onto its new
    /// header.
    pub fn move_to_block_front(&mut self, inst: Inst, block: Block) {
        self.domtree.invalidate();
        if let Some(old_block) = self.insts[inst].block {
            let list = &mut self.blocks[old_block].instructions;
            if let Some(pos) = list.iter().position(|&i| i == inst) {
                list.remove(pos);
            }
        }
        self.blocks[block].instructions.insert(0, inst);
        self.insts[inst].block = Some(block);
    }

    pub fn add_successor(&mut self, from: Block, to: Block) {
        self.domtree.invalidate();
        self.blocks[from].successors.push(to);
        self.blocks[to].predecessors.push(from);
    }

    pub fn replace_successor(&mut self, from: Block, old: Block, new: Block) -> Result<(), Error> {
        self.domtree.invalidate();
        let succs = &mut self.blocks[from].successors;
        let pos = succs
            .iter()
            .position(|&b| b == old)
            .ok_or(Error::NotASuccessor(old, from))?;
        succs[pos] = new;

        if let Some(pos) = self.blocks[old].predecessors.iter().position(|&b| b == from) {
            self.blocks[old].predecessors.remove(pos);
        }
        self.blocks[new].predecessors.push(from);
        Ok(())
    }

    /// Splice a new single-`Goto` block between `pred` and `succ`, preventing the `pred -> succ`
    /// edge from being critical. Returns the new block.
    pub fn insert_between(&mut self, pred: Block, succ: Block) -> Block {
        let new_block = self.create_block();
        let goto = self.alloc_inst(InstKind::Goto, []);
        self.add_instruction(new_block, goto);
        self.replace_successor(pred, succ, new_block)
            .expect("pred must have succ as a successor");
        self.add_successor(new_block, succ);
        new_block
    }

    // ----------------------------------------------------------- instructions

    pub fn alloc_inst(&mut self, kind: InstKind, inputs: impl IntoIterator<Item = Inst>) -> Inst {
        let inputs: SmallVec<[Inst; 4]> = inputs.into_iter().collect();
        let inst = self.insts.push(InstData {
            kind,
            inputs: SmallVec::new(),
            environment: None,
            block: None,
            uses: Vec::new(),
        });
        for (index, input) in inputs.into_iter().enumerate() {
            self.push_input(inst, input);
            debug_assert_eq!(self.insts[inst].inputs.len() - 1, index);
        }
        inst
    }

    fn push_input(&mut self, user: Inst, value: Inst) {
        let index = self.insts[user].inputs.len();
        self.insts[user].inputs.push(value);
        self.insts[value].uses.push(Use {
            user,
            index,
            kind: UseKind::Operand,
        });
    }

    /// Allocate a structural clone of `inst`: same kind/inputs/environment shape, fresh (empty)
    /// def-use chain, not yet attached to any block. The clone's inputs initially point at the
    /// *same* values `inst`'s did; [`Self::set_input`] is used afterward to retarget them during
    /// SSA repair. Used by [`crate::Cloner`]; not part of the public instruction-cloning surface
    /// because callers should go through `Cloner` so `clone_of`/`all_okay` stay consistent.
    pub(crate) fn alloc_clone(&mut self, inst: Inst) -> Inst {
        let shape = self.insts[inst].clone_shape();
        let inputs = shape.inputs.clone();
        let environment = shape.environment.clone();
        let clone = self.insts.push(InstData {
            kind: shape.kind,
            inputs: SmallVec::new(),
            environment: None,
            block: None,
            uses: Vec::new(),
        });
        for input in inputs {
            self.push_input(clone, input);
        }
        if let Some(env) = environment {
            self.set_environment(clone, env);
        }
        clone
    }

    pub fn kind(&self, inst: Inst) -> &InstKind {
        &self.insts[inst].kind
    }

    pub fn inputs(&self, inst: Inst) -> &[Inst] {
        &self.insts[inst].inputs
    }

    pub fn block_of(&self, inst: Inst) -> Option<Block> {
        self.insts[inst].block
    }

    pub fn is_control_flow(&self, inst: Inst) -> bool {
        self.insts[inst].is_control_flow()
    }

    pub fn can_throw(&self, inst: Inst) -> bool {
        self.insts[inst].can_throw()
    }

    pub fn environment(&self, inst: Inst) -> Option<&Environment> {
        self.insts[inst].environment()
    }

    pub fn set_environment(&mut self, holder: Inst, env: Environment) {
        let slots = env.slots().to_vec();
        self.insts[holder].environment = Some(Environment::new(vec![None; slots.len()]));
        for (index, slot) in slots.into_iter().enumerate() {
            if let Some(value) = slot {
                self.set_env_slot(holder, index, value);
            }
        }
    }

    /// Replace the `index`-th input of `user` with `new_value`, updating both the old and new
    /// target's def-use chains.
    pub fn set_input(&mut self, user: Inst, index: usize, new_value: Inst) {
        let old_value = self.insts[user].inputs[index];
        self.remove_use(old_value, user, index, UseKind::Operand);
        self.insts[user].inputs[index] = new_value;
        self.insts[new_value].uses.push(Use {
            user,
            index,
            kind: UseKind::Operand,
        });
    }

    /// Replace the `index`-th environment slot of `holder` with `new_value`.
    pub fn set_env_slot(&mut self, holder: Inst, index: usize, new_value: Inst) {
        let old_value = self.insts[holder]
            .environment
            .as_ref()
            .and_then(|env| env.slot(index));
        if let Some(old_value) = old_value {
            self.remove_use(old_value, holder, index, UseKind::Environment);
        }
        let env = self.insts[holder]
            .environment
            .get_or_insert_with(|| Environment::new(Vec::new()));
        if env.slots().len() <= index {
            env.slots.resize(index + 1, None);
        }
        env.slots[index] = Some(new_value);
        self.insts[new_value].uses.push(Use {
            user: holder,
            index,
            kind: UseKind::Environment,
        });
    }

    fn remove_use(&mut self, of: Inst, user: Inst, index: usize, kind: UseKind) {
        let uses = &mut self.insts[of].uses;
        if let Some(pos) = uses
            .iter()
            .position(|u| u.user == user && u.index == index && u.kind == kind)
        {
            uses.remove(pos);
        }
    }

    /// Every `(user, index)` that references `def` as an ordinary operand.
    pub fn value_uses(&self, def: Inst) -> impl Iterator<Item = (Inst, usize)> + '_ {
        self.insts[def]
            .uses
            .iter()
            .filter(|u| u.kind == UseKind::Operand)
            .map(|u| (u.user, u.index))
    }

    /// Every `(env_holder, index)` whose environment references `def` at slot `index`.
    pub fn environment_uses(&self, def: Inst) -> impl Iterator<Item = (Inst, usize)> + '_ {
        self.insts[def]
            .uses
            .iter()
            .filter(|u| u.kind == UseKind::Environment)
            .map(|u| (u.user, u.index))
    }

    pub fn has_any_uses(&self, def: Inst) -> bool {
        !self.insts[def].uses.is_empty()
    }

    // ------------------------------------------------------------------ loops

    #[allow(clippy::too_many_arguments)]
    pub fn create_loop(
        &mut self,
        header: Block,
        preheader: Block,
        back_edges: impl IntoIterator<Item = Block>,
        members: impl IntoIterator<Item = Block>,
        parent: Option<LoopId>,
    ) -> LoopId {
        let back_edges: SmallVec<[Block; 2]> = back_edges.into_iter().collect();
        let members: FxHashSet<Block> = members.into_iter().collect();
        self.loops.push(LoopData {
            header,
            preheader,
            back_edges,
            members,
            suspend_check: None,
            bottom_tested: false,
            exit_block: None,
            parent,
        })
    }

    pub fn set_loop_suspend_check(&mut self, loop_id: LoopId, inst: Option<Inst>) {
        self.loops[loop_id].suspend_check = inst;
    }

    pub fn set_loop_exit_block(&mut self, loop_id: LoopId, exit: Option<Block>) {
        self.loops[loop_id].exit_block = exit;
    }

    pub fn loop_data(&self, loop_id: LoopId) -> &LoopData {
        &self.loops[loop_id]
    }

    pub fn loop_header(&self, loop_id: LoopId) -> Block {
        self.loops[loop_id].header()
    }

    pub fn loop_preheader(&self, loop_id: LoopId) -> Block {
        self.loops[loop_id].preheader()
    }

    pub fn loop_exit_block(&self, loop_id: LoopId) -> Option<Block> {
        self.loops[loop_id].exit_block()
    }

    pub fn loop_back_edges(&self, loop_id: LoopId) -> &[Block] {
        self.loops[loop_id].back_edges()
    }

    pub fn loop_number_of_back_edges(&self, loop_id: LoopId) -> usize {
        self.loops[loop_id].number_of_back_edges()
    }

    pub fn loop_is_back_edge(&self, loop_id: LoopId, block: Block) -> bool {
        self.loops[loop_id].is_back_edge(block)
    }

    pub fn loop_contains(&self, loop_id: LoopId, block: Block) -> bool {
        self.loops[loop_id].contains(block)
    }

    pub fn loop_suspend_check(&self, loop_id: LoopId) -> Option<Inst> {
        self.loops[loop_id].suspend_check()
    }

    pub fn loop_parent(&self, loop_id: LoopId) -> Option<LoopId> {
        self.loops[loop_id].parent()
    }

    pub fn set_loop_header(&mut self, loop_id: LoopId, header: Block) {
        self.loops[loop_id].header = header;
    }

    pub fn set_loop_bottom_tested(&mut self, loop_id: LoopId, bottom_tested: bool) {
        self.loops[loop_id].bottom_tested = bottom_tested;
    }

    pub fn loop_is_bottom_tested(&self, loop_id: LoopId) -> bool {
        self.loops[loop_id].is_bottom_tested()
    }

    /// Remove `block` from loop `loop_id`'s membership. Does not touch ancestor loops or the
    /// block's own `loop_id` pointer — callers reassign that explicitly (a rotated loop's former
    /// header is reassigned to the preheader's loop, not simply detached).
    pub fn loop_remove_block(&mut self, loop_id: LoopId, block: Block) {
        self.loops[loop_id].members.remove(&block);
    }

    /// Add `block` to loop `loop_id` and to every loop enclosing it (walking `parent`), and set
    /// `block`'s own loop-membership pointer to `loop_id` (the innermost of the chain).
    pub fn loop_add_to_all(&mut self, loop_id: LoopId, block: Block) {
        let mut cur = Some(loop_id);
        while let Some(l) = cur {
            self.loops[l].members.insert(block);
            cur = self.loops[l].parent;
        }
        self.set_block_loop(block, Some(loop_id));
    }

    /// Add `block` to the loop chain rooted at `maybe_loop`, if any; otherwise leave `block`
    /// with no loop membership. Mirrors the collaborator's `if (loop != nullptr)
    /// loop->AddToAll(block)` guard used for blocks spliced in outside any loop.
    pub fn add_block_to_loop_chain(&mut self, maybe_loop: Option<LoopId>, block: Block) {
        if let Some(loop_id) = maybe_loop {
            self.loop_add_to_all(loop_id, block);
        }
    }

    pub fn loop_replace_back_edge(&mut self, loop_id: LoopId, old: Block, new: Block) {
        let back_edges = &mut self.loops[loop_id].back_edges;
        if let Some(pos) = back_edges.iter().position(|&b| b == old) {
            back_edges[pos] = new;
        }
    }

    /// All loops with no sub-loop (i.e. no loop names them as `parent`).
    pub fn innermost_loops(&self) -> Vec<LoopId> {
        let mut has_child = FxHashSet::default();
        for (_, data) in self.loops.iter() {
            if let Some(parent) = data.parent() {
                has_child.insert(parent);
            }
        }
        self.loops
            .keys()
            .filter(|l| !has_child.contains(l))
            .collect()
    }

    // ------------------------------------------------------------ dominance

    pub fn rebuild_domination(&mut self) {
        let entry = self.entry.expect("Graph::set_entry must be called before rebuild_domination");
        self.domtree.compute(entry, &self.blocks);
    }

    pub fn dominates(&self, a: Block, b: Block) -> bool {
        self.domtree.dominates(a, b)
    }

    pub fn domination_is_valid(&self) -> bool {
        self.domtree.is_valid()
    }
}
