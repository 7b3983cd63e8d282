//! A small arena-allocated control-flow-graph + SSA intermediate representation.
//!
//! This crate plays the role of the "external collaborators" `bottom-loop-pass` consumes: the
//! graph/block/instruction/loop data structures, a dominator tree, an instruction cloner, and a
//! statistics counter. None of it is specific to loop rotation — it's the same kind of minimal
//! compiler-IR surface Cranelift's `ir`/`flowgraph`/`dominator_tree` modules provide to
//! Cranelift's own passes.

mod block;
mod cloner;
mod dominance;
mod entities;
mod error;
mod graph;
mod inst;
mod loop_data;
mod stats;

pub use block::BlockData;
pub use cloner::Cloner;
pub use dominance::DominatorTree;
pub use entities::{Block, Inst, LoopId};
pub use error::Error;
pub use graph::Graph;
pub use inst::{Environment, InstData, InstKind, Use, UseKind};
pub use loop_data::LoopData;
pub use stats::{Stat, StatCounter};
