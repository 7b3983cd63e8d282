//! The pass entry point: iterate every innermost loop and dispatch gate → rewrite → repair.

use cfg_ssa_ir::{Graph, Stat, StatCounter};

use crate::gate::{self, Decision};
use crate::options::Options;
use crate::repair;
use crate::rewrite;

/// Rewrite every eligible top-tested innermost loop in `graph` into a bottom-tested loop.
///
/// Returns the number of loops actually transformed. Rebuilds `graph`'s dominator tree once, at
/// the end, iff at least one loop changed — no part of the pass consults dominance between a
/// loop's CFG rewrite and this final rebuild.
pub fn run(graph: &mut Graph, stats: &StatCounter, options: &Options) -> usize {
    let mut transformed = 0u64;

    for loop_id in graph.innermost_loops() {
        log::trace!("form-bottom-loop: visiting loop {loop_id:?}");
        match gate::evaluate(graph, loop_id, transformed, options) {
            Decision::Reject => continue,
            Decision::AlreadyBottomTested => {
                log::debug!("form-bottom-loop: loop {loop_id:?} already bottom-tested");
                continue;
            }
            Decision::Accept {
                first_block,
                first_successor_is_exit,
            } => {
                let rewritten = rewrite::rewrite(graph, loop_id, first_block, first_successor_is_exit);
                repair::repair(graph, loop_id, &rewritten);
                stats.record(Stat::FormBottomLoop);
                transformed += 1;
                log::debug!("form-bottom-loop: transformed loop {loop_id:?}");
            }
        }
    }

    if transformed > 0 {
        graph.rebuild_domination();
    }

    transformed as usize
}
