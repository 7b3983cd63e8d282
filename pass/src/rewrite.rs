//! The CFG rewriter: pure block-topology surgery that turns a top-tested loop shape into a
//! bottom-tested one. SSA repair (cloning the header body onto the back edge and fixing up every
//! use) is handled separately, in [`crate::repair`].

use cfg_ssa_ir::{Block, Graph, LoopId};

/// The blocks this rewrite step touches, handed to [`crate::repair`] once topology surgery is
/// done.
pub(crate) struct RewrittenLoop {
    pub(crate) former_header: Block,
    pub(crate) new_header: Block,
    pub(crate) back_edge: Block,
    pub(crate) exit: Block,
}

pub(crate) fn rewrite(
    graph: &mut Graph,
    loop_id: LoopId,
    first_block: Block,
    first_successor_is_exit: bool,
) -> RewrittenLoop {
    let header = graph.loop_header(loop_id);
    let exit = graph
        .loop_exit_block(loop_id)
        .expect("gate already confirmed a unique exit block");
    let preheader = graph.loop_preheader(loop_id);
    let back_edge = graph.loop_back_edges(loop_id)[0];
    let body = first_block;
    let parent = graph.loop_parent(loop_id);

    // Step 1: relocate the suspend check onto the new header.
    if let Some(suspend_check) = graph.loop_suspend_check(loop_id) {
        graph.move_to_block_front(suspend_check, body);
    }

    // Step 2: redirect the back edge's terminal. It currently ends in a lone `Goto` to `header`;
    // give it the same two successors the header's `If` had, in the same order.
    if first_successor_is_exit {
        graph
            .replace_successor(back_edge, header, exit)
            .expect("back edge must target the header");
        graph.add_successor(back_edge, body);
    } else {
        graph
            .replace_successor(back_edge, header, body)
            .expect("back edge must target the header");
        graph.add_successor(back_edge, exit);
    }

    // Step 3: splice anti-critical-edge blocks.
    let split_exit = graph.insert_between(back_edge, exit);
    graph.add_block_to_loop_chain(parent, split_exit);

    let around = graph.insert_between(header, exit);
    graph.add_block_to_loop_chain(parent, around);

    let top = graph.insert_between(back_edge, body);
    graph.add_block_to_loop_chain(Some(loop_id), top);
    graph.loop_replace_back_edge(loop_id, back_edge, top);

    // Step 4: conditional pre-header fixup, evaluated against the post-splice shapes above.
    if graph.successors(header).len() > 1 && graph.predecessors(body).len() > 1 {
        let fixup = graph.insert_between(header, body);
        graph.add_block_to_loop_chain(parent, fixup);
    }

    // Step 5: loop-info update.
    graph.loop_remove_block(loop_id, header);
    graph.set_block_loop(header, graph.block_loop(preheader));
    graph.set_loop_header(loop_id, body);
    graph.set_loop_bottom_tested(loop_id, true);

    // `header` (the old header, now just a dispatcher in front of the loop) must still dominate
    // `exit`: repair is about to materialize phis in the exit block that read values defined in
    // `header`, which is only sound if every path to `exit` passes through it. The dominator tree
    // is stale from the block-topology edits above, so this is checked against a throwaway
    // rebuild; the real tree is rebuilt once, for real, after repair runs too (see
    // `crate::driver::run`).
    #[cfg(debug_assertions)]
    {
        graph.rebuild_domination();
        debug_assert!(
            graph.dominates(header, exit),
            "the old loop header must still dominate the loop's exit block after rewriting"
        );
    }

    RewrittenLoop {
        former_header: header,
        new_header: body,
        back_edge,
        exit,
    }
}
