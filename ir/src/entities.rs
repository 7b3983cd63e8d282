//! Entity references into a [`crate::Graph`].
//!
//! Blocks, instructions, and loops are never referenced by Rust pointer or reference; instead
//! they're referenced by a small `Copy` index type wrapping a `u32`, the same way Cranelift
//! represents `Block`/`Value`/`Inst`. This keeps the IR free of lifetime parameters and makes
//! every entity cheap to memoize in the SSA-repair fixup maps (`FxHashMap<Inst, Inst>` and
//! friends).

use cranelift_entity::entity_impl;

/// A basic block in a [`crate::Graph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// An instruction in a [`crate::Graph`].
///
/// An `Inst` also doubles as the SSA *value* produced by that instruction: this IR has no
/// separate `Value` entity, since every instruction here has at most one result (itself),
/// matching how the source compiler this pass is modeled on treats `HInstruction` as its own
/// value reference.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A natural loop in a [`crate::Graph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct LoopId(u32);
entity_impl!(LoopId, "loop");
