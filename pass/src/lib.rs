//! Rewrites top-tested (while) loops into bottom-tested (do-while) loops over a CFG+SSA graph.
//!
//! The pass is a pipeline of five pieces, each its own module: [`driver`] drives the whole
//! thing, [`gate`] decides per-loop transformability, [`header`] analyzes the candidate header,
//! [`rewrite`] performs the CFG surgery, and [`repair`] restores SSA form afterward.

mod driver;
mod gate;
mod header;
mod options;
mod repair;
mod rewrite;

pub use driver::run;
pub use options::Options;

#[cfg(test)]
mod tests {
    use cfg_ssa_ir::{Graph, InstKind, Stat, StatCounter};

    use super::*;

    /// `H: i=phi(0, i_next); if i<10 goto F else E. F: i_next = i + 1; goto H.`
    fn classic_counted_loop() -> (Graph, cfg_ssa_ir::LoopId) {
        let mut graph = Graph::new();
        let preheader = graph.create_block();
        let header = graph.create_block();
        let body = graph.create_block();
        let exit = graph.create_block();

        graph.set_entry(preheader);
        graph.add_successor(preheader, header);

        let zero = graph.alloc_inst(InstKind::pure("const_0"), []);
        graph.add_instruction(preheader, zero);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(preheader, entry_goto);

        // `i` is a placeholder now and patched to `phi(zero, i_next)` once `i_next` exists.
        let i_next_placeholder = graph.alloc_inst(InstKind::pure("placeholder"), []);
        let i = graph.alloc_inst(InstKind::Phi, [zero, i_next_placeholder]);
        graph.add_phi(header, i);
        let cond = graph.alloc_inst(InstKind::pure("less_than_10"), [i]);
        graph.add_instruction(header, cond);
        let branch = graph.alloc_inst(InstKind::If, [cond]);
        graph.add_instruction(header, branch);

        graph.add_successor(header, body);
        graph.add_successor(header, exit);

        let i_next = graph.alloc_inst(InstKind::pure("add_1"), [i]);
        graph.add_instruction(body, i_next);
        graph.set_input(i, 1, i_next);
        let back_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(body, back_goto);
        graph.add_successor(body, header);

        let loop_id = graph.create_loop(header, preheader, [body], [header, body], None);
        graph.set_loop_exit_block(loop_id, Some(exit));
        graph.set_block_loop(header, Some(loop_id));
        graph.set_block_loop(body, Some(loop_id));

        (graph, loop_id)
    }

    #[test]
    fn classic_counted_loop_is_transformed() {
        let (mut graph, _loop_id) = classic_counted_loop();
        let stats = StatCounter::new();
        let options = Options::unlimited();

        let changed = run(&mut graph, &stats, &options);

        assert_eq!(changed, 1);
        assert_eq!(stats.get(Stat::FormBottomLoop), 1);
    }

    #[test]
    fn already_bottom_tested_loop_is_left_alone() {
        // `H: goto tail. tail: if c goto be else goto E. be: goto H.` — `be` is the single-`Goto`
        // back edge a prior critical-edge elimination would have spliced in; that's what the
        // gate's "already bottom tested" check actually looks for.
        let mut graph = Graph::new();
        let preheader = graph.create_block();
        let header = graph.create_block();
        let tail = graph.create_block();
        let be = graph.create_block();
        let exit = graph.create_block();

        graph.set_entry(preheader);
        graph.add_successor(preheader, header);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(preheader, entry_goto);

        let header_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(header, header_goto);
        graph.add_successor(header, tail);

        let cond = graph.alloc_inst(InstKind::pure("cond"), []);
        graph.add_instruction(tail, cond);
        let branch = graph.alloc_inst(InstKind::If, [cond]);
        graph.add_instruction(tail, branch);
        graph.add_successor(tail, be);
        graph.add_successor(tail, exit);

        let be_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(be, be_goto);
        graph.add_successor(be, header);

        let loop_id = graph.create_loop(header, preheader, [be], [header, tail, be], None);
        graph.set_loop_exit_block(loop_id, Some(exit));
        graph.set_block_loop(header, Some(loop_id));
        graph.set_block_loop(tail, Some(loop_id));
        graph.set_block_loop(be, Some(loop_id));

        let stats = StatCounter::new();
        let options = Options::unlimited();
        let changed = run(&mut graph, &stats, &options);

        assert_eq!(changed, 0);
        assert_eq!(stats.get(Stat::FormBottomLoop), 0);
        assert!(graph.loop_is_bottom_tested(loop_id));
    }

    #[test]
    fn multiple_back_edges_are_rejected() {
        // Two distinct blocks, `body` and `side`, both jump back to the header.
        let mut graph = Graph::new();
        let preheader = graph.create_block();
        let header = graph.create_block();
        let body = graph.create_block();
        let side = graph.create_block();
        let exit = graph.create_block();

        graph.set_entry(preheader);
        graph.add_successor(preheader, header);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(preheader, entry_goto);

        let cond = graph.alloc_inst(InstKind::pure("cond"), []);
        graph.add_instruction(header, cond);
        let branch = graph.alloc_inst(InstKind::If, [cond]);
        graph.add_instruction(header, branch);
        graph.add_successor(header, body);
        graph.add_successor(header, exit);

        let body_cond = graph.alloc_inst(InstKind::pure("body_cond"), []);
        graph.add_instruction(body, body_cond);
        let body_branch = graph.alloc_inst(InstKind::If, [body_cond]);
        graph.add_instruction(body, body_branch);
        graph.add_successor(body, header);
        graph.add_successor(body, side);

        let side_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(side, side_goto);
        graph.add_successor(side, header);

        let loop_id = graph.create_loop(
            header,
            preheader,
            [body, side],
            [header, body, side],
            None,
        );
        graph.set_loop_exit_block(loop_id, Some(exit));
        graph.set_block_loop(header, Some(loop_id));
        graph.set_block_loop(body, Some(loop_id));
        graph.set_block_loop(side, Some(loop_id));

        let stats = StatCounter::new();
        let changed = run(&mut graph, &stats, &Options::unlimited());

        assert_eq!(changed, 0);
        assert_eq!(stats.get(Stat::FormBottomLoop), 0);
        assert!(!graph.loop_is_bottom_tested(loop_id));
    }

    #[test]
    fn a_second_exit_block_causes_rejection() {
        // The loop's `exit_block` slot is only ever populated when there's a single exit; a
        // second exit (e.g. a break in the body) leaves it unset, so the gate rejects outright.
        let mut graph = Graph::new();
        let preheader = graph.create_block();
        let header = graph.create_block();
        let body = graph.create_block();
        let exit = graph.create_block();

        graph.set_entry(preheader);
        graph.add_successor(preheader, header);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(preheader, entry_goto);

        let cond = graph.alloc_inst(InstKind::pure("cond"), []);
        graph.add_instruction(header, cond);
        let branch = graph.alloc_inst(InstKind::If, [cond]);
        graph.add_instruction(header, branch);
        graph.add_successor(header, body);
        graph.add_successor(header, exit);

        let break_cond = graph.alloc_inst(InstKind::pure("break_cond"), []);
        graph.add_instruction(body, break_cond);
        let break_branch = graph.alloc_inst(InstKind::If, [break_cond]);
        graph.add_instruction(body, break_branch);
        graph.add_successor(body, header);
        graph.add_successor(body, exit);

        let loop_id = graph.create_loop(header, preheader, [body], [header, body], None);
        // Two distinct blocks (`header`, `body`) jump to `exit`, so no single exit is recorded.
        graph.set_loop_exit_block(loop_id, None);
        graph.set_block_loop(header, Some(loop_id));
        graph.set_block_loop(body, Some(loop_id));

        let stats = StatCounter::new();
        let changed = run(&mut graph, &stats, &Options::unlimited());

        assert_eq!(changed, 0);
        assert_eq!(stats.get(Stat::FormBottomLoop), 0);
    }

    #[test]
    fn unclonable_header_instruction_is_rejected() {
        let mut graph = Graph::new();
        let preheader = graph.create_block();
        let header = graph.create_block();
        let body = graph.create_block();
        let exit = graph.create_block();

        graph.set_entry(preheader);
        graph.add_successor(preheader, header);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(preheader, entry_goto);

        let side_effecting = graph.alloc_inst(InstKind::unclonable("observable_call"), []);
        graph.add_instruction(header, side_effecting);
        let cond = graph.alloc_inst(InstKind::pure("cond"), []);
        graph.add_instruction(header, cond);
        let branch = graph.alloc_inst(InstKind::If, [cond]);
        graph.add_instruction(header, branch);
        graph.add_successor(header, body);
        graph.add_successor(header, exit);

        // A non-trivial body so the gate's already-bottom-tested shortcut doesn't fire before
        // the header analyzer gets a chance to reject `side_effecting`.
        let body_marker = graph.alloc_inst(InstKind::pure("body_marker"), []);
        graph.add_instruction(body, body_marker);
        let body_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(body, body_goto);
        graph.add_successor(body, header);

        let loop_id = graph.create_loop(header, preheader, [body], [header, body], None);
        graph.set_loop_exit_block(loop_id, Some(exit));
        graph.set_block_loop(header, Some(loop_id));
        graph.set_block_loop(body, Some(loop_id));

        let stats = StatCounter::new();
        let changed = run(&mut graph, &stats, &Options::unlimited());

        assert_eq!(changed, 0);
        assert_eq!(stats.get(Stat::FormBottomLoop), 0);
    }

    #[test]
    fn header_phi_cycle_is_rejected() {
        // `H: a=phi(x, b); b=phi(y, a); if cond goto F else E.`
        let mut graph = Graph::new();
        let preheader = graph.create_block();
        let header = graph.create_block();
        let body = graph.create_block();
        let exit = graph.create_block();

        graph.set_entry(preheader);
        graph.add_successor(preheader, header);
        let x = graph.alloc_inst(InstKind::pure("x"), []);
        graph.add_instruction(preheader, x);
        let y = graph.alloc_inst(InstKind::pure("y"), []);
        graph.add_instruction(preheader, y);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(preheader, entry_goto);

        let a_placeholder = graph.alloc_inst(InstKind::pure("placeholder"), []);
        let a = graph.alloc_inst(InstKind::Phi, [x, a_placeholder]);
        let b = graph.alloc_inst(InstKind::Phi, [y, a]);
        graph.set_input(a, 1, b);
        graph.add_phi(header, a);
        graph.add_phi(header, b);

        let cond = graph.alloc_inst(InstKind::pure("cond"), [a]);
        graph.add_instruction(header, cond);
        let branch = graph.alloc_inst(InstKind::If, [cond]);
        graph.add_instruction(header, branch);
        graph.add_successor(header, body);
        graph.add_successor(header, exit);

        let body_marker = graph.alloc_inst(InstKind::pure("body_marker"), []);
        graph.add_instruction(body, body_marker);
        let body_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(body, body_goto);
        graph.add_successor(body, header);

        let loop_id = graph.create_loop(header, preheader, [body], [header, body], None);
        graph.set_loop_exit_block(loop_id, Some(exit));
        graph.set_block_loop(header, Some(loop_id));
        graph.set_block_loop(body, Some(loop_id));

        let stats = StatCounter::new();
        let changed = run(&mut graph, &stats, &Options::unlimited());

        assert_eq!(changed, 0);
        assert_eq!(stats.get(Stat::FormBottomLoop), 0);
    }

    #[test]
    fn load_class_in_header_is_shared_not_cloned() {
        // `H: cls = LoadClass(C); if cls_flag goto F else E.`
        let mut graph = Graph::new();
        let preheader = graph.create_block();
        let header = graph.create_block();
        let body = graph.create_block();
        let exit = graph.create_block();

        graph.set_entry(preheader);
        graph.add_successor(preheader, header);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(preheader, entry_goto);

        let cls = graph.alloc_inst(InstKind::LoadClass, []);
        graph.add_instruction(header, cls);
        let cls_flag = graph.alloc_inst(InstKind::pure("cls_flag"), [cls]);
        graph.add_instruction(header, cls_flag);
        let branch = graph.alloc_inst(InstKind::If, [cls_flag]);
        graph.add_instruction(header, branch);
        graph.add_successor(header, body);
        graph.add_successor(header, exit);

        // A non-trivial body so it isn't mistaken for an already-spliced back-edge block.
        let body_marker = graph.alloc_inst(InstKind::pure("body_marker"), []);
        graph.add_instruction(body, body_marker);
        let body_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(body, body_goto);
        graph.add_successor(body, header);

        let loop_id = graph.create_loop(header, preheader, [body], [header, body], None);
        graph.set_loop_exit_block(loop_id, Some(exit));
        graph.set_block_loop(header, Some(loop_id));
        graph.set_block_loop(body, Some(loop_id));

        let stats = StatCounter::new();
        let changed = run(&mut graph, &stats, &Options::unlimited());

        assert_eq!(changed, 1);
        assert_eq!(stats.get(Stat::FormBottomLoop), 1);
        // The back edge's cloned `If` uses `cls_flag`'s clone, which in turn still reads `cls`
        // directly (no phi stands in for a `LoadClass`-derived value).
        assert!(graph.block_of(cls).is_some(), "the original LoadClass stays put, it's never removed");
    }

    #[test]
    fn debug_transform_cap_limits_to_one_loop() {
        fn independent_loop(graph: &mut Graph) -> (cfg_ssa_ir::Block, cfg_ssa_ir::LoopId) {
            let preheader = graph.create_block();
            let header = graph.create_block();
            let body = graph.create_block();
            let exit = graph.create_block();

            graph.add_successor(preheader, header);
            let entry_goto = graph.alloc_inst(InstKind::Goto, []);
            graph.add_instruction(preheader, entry_goto);

            let zero = graph.alloc_inst(InstKind::pure("const_0"), []);
            graph.add_instruction(preheader, zero);

            let i_next_placeholder = graph.alloc_inst(InstKind::pure("placeholder"), []);
            let i = graph.alloc_inst(InstKind::Phi, [zero, i_next_placeholder]);
            graph.add_phi(header, i);
            let cond = graph.alloc_inst(InstKind::pure("less_than_10"), [i]);
            graph.add_instruction(header, cond);
            let branch = graph.alloc_inst(InstKind::If, [cond]);
            graph.add_instruction(header, branch);
            graph.add_successor(header, body);
            graph.add_successor(header, exit);

            let i_next = graph.alloc_inst(InstKind::pure("add_1"), [i]);
            graph.add_instruction(body, i_next);
            graph.set_input(i, 1, i_next);
            let back_goto = graph.alloc_inst(InstKind::Goto, []);
            graph.add_instruction(body, back_goto);
            graph.add_successor(body, header);

            let loop_id = graph.create_loop(header, preheader, [body], [header, body], None);
            graph.set_loop_exit_block(loop_id, Some(exit));
            graph.set_block_loop(header, Some(loop_id));
            graph.set_block_loop(body, Some(loop_id));
            (preheader, loop_id)
        }

        let mut graph = Graph::new();
        let entry = graph.create_block();
        graph.set_entry(entry);

        let (first_preheader, _first) = independent_loop(&mut graph);
        graph.add_successor(entry, first_preheader);
        let entry_goto = graph.alloc_inst(InstKind::Goto, []);
        graph.add_instruction(entry, entry_goto);

        let (second_preheader, _second) = independent_loop(&mut graph);
        graph.add_successor(entry, second_preheader);

        let stats = StatCounter::new();
        let options = Options::with_max_transforms(1);
        let changed = run(&mut graph, &stats, &options);

        assert_eq!(changed, 1);
        assert_eq!(stats.get(Stat::FormBottomLoop), 1);
    }
}
