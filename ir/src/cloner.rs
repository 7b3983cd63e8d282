//! Instruction cloning.
//!
//! `visit` produces (or, in read-only "probe" mode, merely validates the existence of) a clone,
//! `clone_of` looks one up, `add_clone_manually` registers an identity (or otherwise
//! pre-determined) mapping without cloning, and `all_okay` reports whether every instruction
//! visited so far was clonable.

use rustc_hash::FxHashMap;

use crate::entities::Inst;
use crate::graph::Graph;

/// Clones instructions on behalf of the rewriter, or (in probe mode) merely checks clonability on
/// behalf of the header analyzer.
pub struct Cloner {
    clone_of: FxHashMap<Inst, Inst>,
    all_okay: bool,
    probe_only: bool,
}

impl Cloner {
    /// A cloner that actually materializes clones in `graph`.
    pub fn new() -> Self {
        Self {
            clone_of: FxHashMap::default(),
            all_okay: true,
            probe_only: false,
        }
    }

    /// A read-only cloner: `visit` never allocates a clone, it only determines whether the
    /// instruction *could* be cloned (updating `all_okay` accordingly). Used by the header
    /// analyzer, which needs to know if every header instruction is clonable without actually
    /// cloning any of them.
    pub fn probe() -> Self {
        Self {
            clone_of: FxHashMap::default(),
            all_okay: true,
            probe_only: true,
        }
    }

    /// Visit `inst`. In mutating mode, allocates a clone (with the same kind/inputs/environment
    /// shape, an empty def-use chain, and no containing block) in `graph` and returns it. In
    /// probe mode, returns `None` unconditionally but still updates `all_okay`.
    pub fn visit(&mut self, graph: &mut Graph, inst: Inst) -> Option<Inst> {
        if !graph.kind(inst).clonable() {
            self.all_okay = false;
            return None;
        }
        if self.probe_only {
            return None;
        }
        let clone = graph.alloc_clone(inst);
        self.clone_of.insert(inst, clone);
        Some(clone)
    }

    pub fn clone_of(&self, inst: Inst) -> Option<Inst> {
        self.clone_of.get(&inst).copied()
    }

    /// Register a mapping without cloning. Used for `LoadClass`, whose single instance is reused
    /// by reference rather than duplicated.
    pub fn add_clone_manually(&mut self, original: Inst, clone: Inst) {
        self.clone_of.insert(original, clone);
    }

    /// `false` if any instruction visited so far was not clonable.
    pub fn all_okay(&self) -> bool {
        self.all_okay
    }
}

impl Default for Cloner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::InstKind;

    #[test]
    fn probe_mode_never_allocates() {
        let mut graph = Graph::new();
        let inst = graph.alloc_inst(InstKind::pure("add"), []);
        let before = graph.inputs(inst).len();

        let mut prober = Cloner::probe();
        let result = prober.visit(&mut graph, inst);

        assert!(result.is_none());
        assert!(prober.all_okay());
        assert_eq!(graph.inputs(inst).len(), before);
    }

    #[test]
    fn probe_mode_flags_unclonable_instructions() {
        let mut graph = Graph::new();
        let inst = graph.alloc_inst(InstKind::unclonable("call"), []);

        let mut prober = Cloner::probe();
        prober.visit(&mut graph, inst);

        assert!(!prober.all_okay());
    }

    #[test]
    fn mutating_mode_allocates_and_remembers_the_clone() {
        let mut graph = Graph::new();
        let a = graph.alloc_inst(InstKind::pure("a"), []);
        let inst = graph.alloc_inst(InstKind::pure("add"), [a]);

        let mut cloner = Cloner::new();
        let clone = cloner.visit(&mut graph, inst).expect("pure instructions are clonable");

        assert_ne!(clone, inst);
        assert_eq!(cloner.clone_of(inst), Some(clone));
        assert_eq!(graph.inputs(clone), graph.inputs(inst));
        assert!(graph.block_of(clone).is_none());
    }

    #[test]
    fn add_clone_manually_registers_an_identity_mapping() {
        let mut graph = Graph::new();
        let load_class = graph.alloc_inst(crate::inst::InstKind::LoadClass, []);

        let mut cloner = Cloner::new();
        cloner.add_clone_manually(load_class, load_class);

        assert_eq!(cloner.clone_of(load_class), Some(load_class));
    }
}
