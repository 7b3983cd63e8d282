//! SSA repair: after the CFG rewrite clones the header body onto the back edge, every definition
//! and use that used to live solely in the header needs to be reconciled with its new clone.
//! Every fixup phi is memoized *before* its second input is resolved, so a phi may legally
//! reference itself transitively through the memo without the recursion looping forever.

use cfg_ssa_ir::{Block, Cloner, Graph, Inst, InstKind, LoopId};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::rewrite::RewrittenLoop;

/// Per-loop repair state: the clone registry plus the four fixup-phi memo tables and the `φ`
/// memo, all keyed by the *original* header value. Scoped to one `rewrite_loop` call.
struct LoopRewriteState {
    cloner: Cloner,
    clone_set: FxHashSet<Inst>,
    header_fixup_inside: FxHashMap<Inst, Inst>,
    header_fixup_outside: FxHashMap<Inst, Inst>,
    interlace_fixup_inside: FxHashMap<Inst, Inst>,
    interlace_fixup_outside: FxHashMap<Inst, Inst>,
    phi_fixup: FxHashMap<Inst, Inst>,
}

impl LoopRewriteState {
    fn new() -> Self {
        Self {
            cloner: Cloner::new(),
            clone_set: FxHashSet::default(),
            header_fixup_inside: FxHashMap::default(),
            header_fixup_outside: FxHashMap::default(),
            interlace_fixup_inside: FxHashMap::default(),
            interlace_fixup_outside: FxHashMap::default(),
            phi_fixup: FxHashMap::default(),
        }
    }
}

#[derive(Copy, Clone)]
struct Ctx {
    loop_id: LoopId,
    header: Block,
    new_header: Block,
    back_edge: Block,
    exit: Block,
}

pub(crate) fn repair(graph: &mut Graph, loop_id: LoopId, rewritten: &RewrittenLoop) {
    let ctx = Ctx {
        loop_id,
        header: rewritten.former_header,
        new_header: rewritten.new_header,
        back_edge: rewritten.back_edge,
        exit: rewritten.exit,
    };
    let mut state = LoopRewriteState::new();

    let header_phis = graph.phis(ctx.header).to_vec();
    let header_insts = graph.instructions(ctx.header).to_vec();

    let old_goto = graph
        .last_instruction(ctx.back_edge)
        .expect("back edge must have a terminator before cloning");
    debug_assert!(graph.kind(old_goto).is_goto());
    graph
        .remove_instruction(ctx.back_edge, old_goto)
        .expect("back edge's old `Goto` must still be registered");

    for &x in &header_insts {
        clone_value(graph, &mut state, ctx, x);
        fixup_non_phi_uses(graph, &mut state, ctx, x);
    }

    debug_assert!(
        graph
            .last_instruction(ctx.back_edge)
            .is_some_and(|i| graph.kind(i).is_if()),
        "cloned header body must end in `If`"
    );

    for &p in &header_phis {
        fixup_phi_uses(graph, &mut state, ctx, p);
    }

    retire_header_phis(graph, ctx.header, &header_phis);
}

/// Ensure `x` (a value defined in the former header) has a clone in the back edge, cloning it
/// (and, transitively, whichever of its own inputs still point at un-cloned header values) if
/// this is the first time it's needed. Memoized in `state.cloner` *before* the recursive
/// retargeting below, so a value that (transitively, through a phi) depends on its own clone
/// sees the in-progress clone rather than recursing forever.
fn clone_value(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, x: Inst) -> Inst {
    if let Some(clone) = state.cloner.clone_of(x) {
        return clone;
    }
    if graph.kind(x).is_load_class() {
        // Idempotent and already dominates the back edge; reuse by reference instead of
        // duplicating it.
        state.cloner.add_clone_manually(x, x);
        return x;
    }

    let clone = state
        .cloner
        .visit(graph, x)
        .expect("header analyzer already confirmed every header instruction is clonable");
    state.clone_set.insert(clone);
    retarget_clone_inputs(graph, state, ctx, x, clone);
    // Appended only after its own inputs are resolved, so earlier-needed clones always precede
    // their dependents in the back edge's instruction order.
    graph.add_instruction(ctx.back_edge, clone);
    clone
}

/// Point `clone`'s inputs (and environment slots) at the values they should reference on the
/// back-edge path: a header phi's input becomes its `φ` fixup, another header value's input
/// becomes that value's own clone, and anything else is left untouched.
fn retarget_clone_inputs(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, original: Inst, clone: Inst) {
    let inputs = graph.inputs(original).to_vec();
    for (index, input) in inputs.into_iter().enumerate() {
        let replacement = resolve_for_clone(graph, state, ctx, input);
        if replacement != input {
            graph.set_input(clone, index, replacement);
        }
    }

    let slots = graph
        .environment(original)
        .map(|env| env.slots().to_vec())
        .unwrap_or_default();
    for (index, slot) in slots.into_iter().enumerate() {
        if let Some(value) = slot {
            let replacement = resolve_for_clone(graph, state, ctx, value);
            if replacement != value {
                graph.set_env_slot(clone, index, replacement);
            }
        }
    }
}

fn resolve_for_clone(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, value: Inst) -> Inst {
    if graph.block_of(value) != Some(ctx.header) {
        return value;
    }
    if graph.kind(value).is_phi() {
        phi_fixup(graph, state, ctx, value)
    } else {
        clone_value(graph, state, ctx, value)
    }
}

/// `φ(p)`: the value `p`'s second input should flow through on the back edge. Recursion
/// terminates because the header analyzer rejects true header-phi cycles before repair ever
/// runs.
fn phi_fixup(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, p: Inst) -> Inst {
    if let Some(&v) = state.phi_fixup.get(&p) {
        return v;
    }
    let p1 = graph.inputs(p)[1];
    let result = if graph.block_of(p1) != Some(ctx.header) {
        p1
    } else if graph.kind(p1).is_phi() {
        interlace_fixup_inside(graph, state, ctx, p1)
    } else {
        header_fixup_inside(graph, state, ctx, p1)
    };
    state.phi_fixup.insert(p, result);
    result
}

/// `Phi(x, x')` in the new header, for uses of a non-phi header value `x` reached from inside
/// the loop body.
fn header_fixup_inside(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, x: Inst) -> Inst {
    if let Some(&phi) = state.header_fixup_inside.get(&x) {
        return phi;
    }
    let phi = graph.alloc_inst(InstKind::Phi, [x, x]);
    graph.add_phi(ctx.new_header, phi);
    state.header_fixup_inside.insert(x, phi);
    let clone = clone_value(graph, state, ctx, x);
    graph.set_input(phi, 1, clone);
    phi
}

/// `Phi(x, x')` in the exit block, for uses of `x` reached from outside the loop.
fn header_fixup_outside(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, x: Inst) -> Inst {
    if let Some(&phi) = state.header_fixup_outside.get(&x) {
        return phi;
    }
    let phi = graph.alloc_inst(InstKind::Phi, [x, x]);
    graph.add_phi(ctx.exit, phi);
    state.header_fixup_outside.insert(x, phi);
    let clone = clone_value(graph, state, ctx, x);
    graph.set_input(phi, 1, clone);
    phi
}

/// `Phi(p₀, φ(p))` in the new header, for uses of header phi `p` reached from inside the loop
/// body.
fn interlace_fixup_inside(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, p: Inst) -> Inst {
    if let Some(&phi) = state.interlace_fixup_inside.get(&p) {
        return phi;
    }
    let p0 = graph.inputs(p)[0];
    let phi = graph.alloc_inst(InstKind::Phi, [p0, p0]);
    graph.add_phi(ctx.new_header, phi);
    state.interlace_fixup_inside.insert(p, phi);
    let fixup = phi_fixup(graph, state, ctx, p);
    graph.set_input(phi, 1, fixup);
    phi
}

/// `Phi(p₀, φ(p))` in the exit block, for uses of header phi `p` reached from outside the loop.
fn interlace_fixup_outside(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, p: Inst) -> Inst {
    if let Some(&phi) = state.interlace_fixup_outside.get(&p) {
        return phi;
    }
    let p0 = graph.inputs(p)[0];
    let phi = graph.alloc_inst(InstKind::Phi, [p0, p0]);
    graph.add_phi(ctx.exit, phi);
    state.interlace_fixup_outside.insert(p, phi);
    let fixup = phi_fixup(graph, state, ctx, p);
    graph.set_input(phi, 1, fixup);
    phi
}

/// Retarget every pre-existing value/environment use of non-phi header value `x` (its clone never
/// appears among them; its inputs are wired up by [`retarget_clone_inputs`], not here).
fn fixup_non_phi_uses(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, x: Inst) {
    let value_uses: Vec<(Inst, usize)> = graph.value_uses(x).collect();
    for (user, index) in value_uses {
        if let Some(replacement) = classify_non_phi_user(graph, state, ctx, x, user) {
            graph.set_input(user, index, replacement);
        }
    }

    let env_uses: Vec<(Inst, usize)> = graph.environment_uses(x).collect();
    for (holder, index) in env_uses {
        if let Some(replacement) = classify_non_phi_user(graph, state, ctx, x, holder) {
            graph.set_env_slot(holder, index, replacement);
        }
    }
}

fn classify_non_phi_user(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, x: Inst, user: Inst) -> Option<Inst> {
    if graph.block_of(user) == Some(ctx.header) {
        if graph.kind(user).is_phi() {
            header_fixup_inside(graph, state, ctx, x);
        }
        return None;
    }
    debug_assert!(
        !state.clone_set.contains(&user),
        "a clone cannot be a pre-existing user of a header value"
    );
    if graph.block_of(user).is_some_and(|b| graph.loop_contains(ctx.loop_id, b)) {
        Some(header_fixup_inside(graph, state, ctx, x))
    } else {
        Some(header_fixup_outside(graph, state, ctx, x))
    }
}

/// Retarget every pre-existing value/environment use of header phi `p`.
fn fixup_phi_uses(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, p: Inst) {
    let p0 = graph.inputs(p)[0];

    let value_uses: Vec<(Inst, usize)> = graph.value_uses(p).collect();
    for (user, index) in value_uses {
        if let Some(replacement) = classify_phi_user(graph, state, ctx, p, p0, user) {
            graph.set_input(user, index, replacement);
        }
    }

    let env_uses: Vec<(Inst, usize)> = graph.environment_uses(p).collect();
    for (holder, index) in env_uses {
        if let Some(replacement) = classify_phi_user(graph, state, ctx, p, p0, holder) {
            graph.set_env_slot(holder, index, replacement);
        }
    }
}

fn classify_phi_user(graph: &mut Graph, state: &mut LoopRewriteState, ctx: Ctx, p: Inst, p0: Inst, user: Inst) -> Option<Inst> {
    if graph.block_of(user) == Some(ctx.header) {
        return if graph.kind(user).is_phi() { None } else { Some(p0) };
    }
    if state.clone_set.contains(&user) {
        return Some(phi_fixup(graph, state, ctx, p));
    }
    if graph.block_of(user).is_some_and(|b| graph.loop_contains(ctx.loop_id, b)) {
        Some(interlace_fixup_inside(graph, state, ctx, p))
    } else {
        Some(interlace_fixup_outside(graph, state, ctx, p))
    }
}

/// Alias each retiring phi's second input to its first (breaking residual cross-references
/// between header phis without disturbing shape), then remove them from the former header.
fn retire_header_phis(graph: &mut Graph, header: Block, header_phis: &[Inst]) {
    for &phi in header_phis {
        let p0 = graph.inputs(phi)[0];
        graph.set_input(phi, 1, p0);
    }
    for &phi in header_phis {
        graph
            .remove_phi(header, phi)
            .expect("header phi must still be registered on the former header");
    }
}
