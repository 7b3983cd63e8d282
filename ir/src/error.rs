//! Error type for host-API misuse of this crate's mutating graph API.
//!
//! `bottom-loop-pass` itself has no recoverable error class: every one of its own call sites into
//! this crate is only ever reached under preconditions it has already established, so it never
//! actually observes one of these. The type exists because `cfg-ssa-ir` is a general-purpose
//! library surface, and Cranelift crates that expose a fallible public API define one the same
//! way (e.g. `cranelift-codegen`'s `CodegenError`).

use crate::entities::{Block, Inst};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("instruction {0:?} is not present in block {1:?}")]
    InstructionNotInBlock(Inst, Block),
    #[error("block {0:?} is not a successor of block {1:?}")]
    NotASuccessor(Block, Block),
}
