//! The gate: decides whether a candidate loop should be rewritten into bottom-tested form.

use cfg_ssa_ir::{Block, Graph, LoopId};

use crate::header;
use crate::options::Options;

/// What the gate decided about a candidate loop.
pub(crate) enum Decision {
    /// Rewrite the loop. `first_block` is the block the new bottom-tested header should fall
    /// into (the loop's old first-iteration body block); `first_successor_is_exit` records
    /// which of the header `If`'s two successors was the exit, so the rewriter can rebuild the
    /// cloned terminator's successors in the same order.
    Accept {
        first_block: Block,
        first_successor_is_exit: bool,
    },
    /// The loop is already bottom-tested; `loop_is_bottom_tested` has been set and nothing else
    /// needs to change.
    AlreadyBottomTested,
    /// Not transformable, for a reason already logged at debug level.
    Reject,
}

pub(crate) fn evaluate(
    graph: &mut Graph,
    loop_id: LoopId,
    transforms_so_far: u64,
    options: &Options,
) -> Decision {
    let header = graph.loop_header(loop_id);

    let Some(exit_block) = graph.loop_exit_block(loop_id) else {
        log::debug!("form-bottom-loop: loop {loop_id:?} has no single exit block");
        return Decision::Reject;
    };

    let exit_preds = graph.predecessors(exit_block);
    debug_assert_eq!(exit_preds.len(), 1, "exit block must have a single predecessor");
    let loop_to_exit = exit_preds[0];

    let back_edges = graph.loop_back_edges(loop_id);
    debug_assert!(!back_edges.is_empty(), "a natural loop always has a back edge");
    let first_back_edge = back_edges[0];

    let Some(last_insn) = graph.last_instruction(header) else {
        log::debug!("form-bottom-loop: loop {loop_id:?} header has no terminator");
        return Decision::Reject;
    };

    if !graph.kind(last_insn).is_if() {
        // Already top-tested with something other than `If` at the very top, or not laid out
        // the way this pass expects; check whether it happens to already be bottom-tested.
        let is_bottom_tested = graph
            .last_instruction(loop_to_exit)
            .is_some_and(|i| graph.kind(i).is_if())
            && graph.loop_number_of_back_edges(loop_id) == 1
            && graph.predecessors(first_back_edge).contains(&loop_to_exit)
            && graph.is_single_goto_block(first_back_edge);

        if is_bottom_tested {
            graph.set_loop_bottom_tested(loop_id, true);
            return Decision::AlreadyBottomTested;
        }
        log::debug!("form-bottom-loop: loop {loop_id:?} header doesn't end in `If`");
        return Decision::Reject;
    }

    if graph.loop_number_of_back_edges(loop_id) != 1 {
        log::debug!("form-bottom-loop: loop {loop_id:?} has more than one back edge");
        return Decision::Reject;
    }

    if loop_to_exit != header {
        log::debug!("form-bottom-loop: loop {loop_id:?}'s header doesn't exit the loop");
        return Decision::Reject;
    }

    let is_bottom_tested = graph.predecessors(first_back_edge).contains(&loop_to_exit)
        && graph.is_single_goto_block(first_back_edge);
    if is_bottom_tested {
        graph.set_loop_bottom_tested(loop_id, true);
        return Decision::AlreadyBottomTested;
    }

    if !header::check_header(graph, header) {
        return Decision::Reject;
    }

    if transforms_so_far >= options.max_transforms() {
        log::debug!("form-bottom-loop: debug transform cap reached, skipping loop {loop_id:?}");
        return Decision::Reject;
    }

    let successors = graph.successors(header);
    debug_assert_eq!(successors.len(), 2, "`If` always has two successors");
    let first_successor_is_exit = successors[0] == exit_block;
    let first_block = if first_successor_is_exit {
        successors[1]
    } else {
        successors[0]
    };

    Decision::Accept {
        first_block,
        first_successor_is_exit,
    }
}
