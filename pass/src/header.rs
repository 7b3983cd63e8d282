//! The header analyzer: checks that a candidate loop header is safe to duplicate onto the back
//! edge — every instruction clonable, and no mutual cycle between header phis.

use cfg_ssa_ir::{Block, Cloner, Graph};
use rustc_hash::FxHashSet;

/// Walk `header`'s instructions and phis, rejecting the loop if the header can't be cloned onto
/// the back edge or if its phis form a cycle this pass can't repair.
pub(crate) fn check_header(graph: &mut Graph, header: Block) -> bool {
    let mut prober = Cloner::probe();
    for inst in graph.instructions(header).to_vec() {
        let kind = graph.kind(inst).clone();
        if kind.is_suspend_check() || kind.is_if() {
            // SuspendCheck is relocated before cloning begins; the terminal `If` is always
            // cloned structurally and doesn't need a clonability probe.
            continue;
        }

        if kind.is_control_flow() && !kind.can_throw() {
            log::debug!("form-bottom-loop: header has unclonable control flow {inst:?}");
            return false;
        }

        prober.visit(graph, inst);
        if !prober.all_okay() {
            log::debug!("form-bottom-loop: header instruction {inst:?} is not clonable");
            return false;
        }
    }

    // Cycled phis like `phi_1 = Phi(x, phi_2); phi_2 = Phi(y, phi_1);` can't be repaired by this
    // pass: a single-direction chain (only a forward or only a backward reference) can be
    // materialized safely, but a true cycle (both) would need a speculative placeholder this
    // pass does not implement.
    let mut seen = FxHashSet::default();
    let mut looks_forward = false;
    let mut looks_backward = false;
    for &phi in graph.phis(header) {
        if graph.inputs(phi).len() == 2 {
            let in1 = graph.inputs(phi)[1];
            if graph.kind(in1).is_phi() && graph.block_of(in1) == Some(header) {
                if !seen.contains(&in1) {
                    looks_forward = true;
                } else {
                    looks_backward = true;
                }
            }
        }

        if looks_forward && looks_backward {
            log::debug!("form-bottom-loop: rejecting due to cycled header phis");
            return false;
        }

        seen.insert(phi);
    }

    true
}
