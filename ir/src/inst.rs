//! Instructions: kinds, inputs, environments, and def-use chains.

use smallvec::SmallVec;

use crate::entities::{Block, Inst};

/// The kind of an instruction.
///
/// Real host compilers distinguish dozens of instruction kinds with a class hierarchy; this
/// pass only cares about a handful of them, so (matching how Cranelift's own `InstructionData`
/// is a tagged union over opcodes rather than a class hierarchy) everything else collapses into
/// [`InstKind::Other`], which carries the narrow set of capability bits the pass actually
/// queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstKind {
    /// A two-way conditional branch. Takes one input (the condition); its two successors live
    /// on the containing [`crate::BlockData`], in the order (true-successor, false-successor).
    If,
    /// An unconditional jump to the block's sole successor.
    Goto,
    /// A phi node: exactly one input per predecessor of the containing block. This pass only
    /// ever deals with two-predecessor phis.
    Phi,
    /// A safepoint marker. Never has operands.
    SuspendCheck,
    /// Loads (and, in a real VM, may resolve/initialize) a class. Idempotent, so the rewriter
    /// reuses the original instruction rather than cloning it (see `ir::Cloner`).
    LoadClass,
    /// Every other instruction kind. Carries just enough information for the clonability and
    /// control-flow checks the pass performs; real opcodes/operand types/side effects are out of
    /// scope for this IR.
    Other {
        /// Purely descriptive; does not affect pass behavior.
        name: &'static str,
        /// Whether this instruction is itself a control-flow instruction (has multiple
        /// successors / terminates a block with something other than a fallthrough). `If` and
        /// `Goto` are control flow too, but are modeled as their own variants since the pass
        /// treats them specially.
        is_control_flow: bool,
        /// Whether evaluating this instruction can throw/trap/deoptimize.
        can_throw: bool,
        /// Whether the instruction cloner is able to duplicate this instruction. Instructions
        /// with externally-visible side effects that can't be safely duplicated (e.g. a call
        /// with observable effects model as non-clonable) report `false` here.
        clonable: bool,
    },
}

impl InstKind {
    /// Construct a plain, clonable, non-throwing, non-control-flow instruction. The common case
    /// for arithmetic/load-like instructions in tests.
    pub fn pure(name: &'static str) -> Self {
        InstKind::Other {
            name,
            is_control_flow: false,
            can_throw: false,
            clonable: true,
        }
    }

    /// Construct an instruction the cloner refuses to duplicate (e.g. a call with observable
    /// side effects).
    pub fn unclonable(name: &'static str) -> Self {
        InstKind::Other {
            name,
            is_control_flow: false,
            can_throw: false,
            clonable: false,
        }
    }

    pub fn is_control_flow(&self) -> bool {
        match self {
            InstKind::If | InstKind::Goto => true,
            InstKind::Phi | InstKind::SuspendCheck | InstKind::LoadClass => false,
            InstKind::Other { is_control_flow, .. } => *is_control_flow,
        }
    }

    pub fn can_throw(&self) -> bool {
        match self {
            InstKind::If | InstKind::Goto | InstKind::Phi | InstKind::SuspendCheck => false,
            InstKind::LoadClass => true,
            InstKind::Other { can_throw, .. } => *can_throw,
        }
    }

    /// Whether the cloner is able to duplicate this instruction. `If`/`Goto`/`Phi` are always
    /// clonable in the structural sense the rewriter needs (they're cloned as part of cloning
    /// the header's body); `LoadClass` is handled separately by the rewriter (it is never
    /// actually cloned — see `ir::Cloner`) so its clonability is moot, but reports `true` since
    /// refusing it would be surprising.
    pub fn clonable(&self) -> bool {
        match self {
            InstKind::If | InstKind::Goto | InstKind::Phi | InstKind::SuspendCheck | InstKind::LoadClass => {
                true
            }
            InstKind::Other { clonable, .. } => *clonable,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi)
    }

    pub fn is_if(&self) -> bool {
        matches!(self, InstKind::If)
    }

    pub fn is_goto(&self) -> bool {
        matches!(self, InstKind::Goto)
    }

    pub fn is_suspend_check(&self) -> bool {
        matches!(self, InstKind::SuspendCheck)
    }

    pub fn is_load_class(&self) -> bool {
        matches!(self, InstKind::LoadClass)
    }
}

/// Which part of an instruction a [`Use`] refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UseKind {
    /// An ordinary operand: `user`'s `index`-th input.
    Operand,
    /// A deopt-metadata slot: `user`'s environment's `index`-th slot.
    Environment,
}

/// One entry in a value's def-use chain: `user` references the value at `index`, either as a
/// regular operand or as an environment slot (see [`UseKind`]).
#[derive(Copy, Clone, Debug)]
pub struct Use {
    pub user: Inst,
    pub index: usize,
    pub kind: UseKind,
}

/// Deopt metadata attached to an instruction. References SSA values by slot index and must be
/// repaired identically to ordinary value uses.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    pub(crate) slots: Vec<Option<Inst>>,
}

impl Environment {
    pub fn new(slots: Vec<Option<Inst>>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<Inst>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<Inst> {
        self.slots[index]
    }
}

/// An instruction in the graph.
#[derive(Clone, Debug)]
pub struct InstData {
    pub(crate) kind: InstKind,
    pub(crate) inputs: SmallVec<[Inst; 4]>,
    pub(crate) environment: Option<Environment>,
    pub(crate) block: Option<Block>,
    /// Def-use chain for the value this instruction defines.
    pub(crate) uses: Vec<Use>,
}

impl InstData {
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[Inst] {
        &self.inputs
    }

    pub fn block(&self) -> Option<Block> {
        self.block
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn is_control_flow(&self) -> bool {
        self.kind.is_control_flow()
    }

    pub fn can_throw(&self) -> bool {
        self.kind.can_throw()
    }

    /// Produce an unattached copy of this instruction's shape (kind + inputs + environment
    /// shape), with an empty def-use chain and no containing block. Used by [`crate::Cloner`].
    pub(crate) fn clone_shape(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            inputs: self.inputs.clone(),
            environment: self
                .environment
                .as_ref()
                .map(|env| Environment::new(env.slots.clone())),
            block: None,
            uses: Vec::new(),
        }
    }
}
