//! A dominator tree, computed with the same reverse-postorder / iterative-intersection algorithm
//! Cranelift's `dominator_tree.rs` uses (Cooper, Harvey & Kennedy, "A Simple, Fast Dominance
//! Algorithm").
//!
//! Dominator information is stale between a CFG rewrite and the next rebuild; no consumer in this
//! workspace consults dominators mid-rewrite. It is rebuilt once at the end of a `run()` that
//! changed anything, and is otherwise only useful to callers/tests checking postconditions like
//! "the former header still dominates the exit".

use cranelift_entity::{PrimaryMap, SecondaryMap};

use crate::block::BlockData;
use crate::entities::Block;

const UNVISITED: u32 = 0;

#[derive(Clone, Copy, Default)]
struct DomNode {
    /// Position in reverse postorder, starting at 1. Zero means unreachable.
    rpo_number: u32,
    idom: Option<Block>,
}

#[derive(Default)]
pub struct DominatorTree {
    nodes: SecondaryMap<Block, DomNode>,
    valid: bool,
}

impl DominatorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn is_reachable(&self, block: Block) -> bool {
        self.nodes[block].rpo_number != UNVISITED
    }

    /// Returns the immediate dominator of `block`, or `None` for the entry block or an
    /// unreachable block.
    pub fn idom(&self, block: Block) -> Option<Block> {
        self.nodes[block].idom
    }

    /// Does `a` dominate `b`? Every block dominates itself.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        debug_assert!(self.valid, "dominator tree is stale; call Graph::rebuild_domination first");
        if !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom(cur) {
                Some(next) => cur = next,
                None => return cur == a,
            }
        }
    }

    /// Recompute the dominator tree for the CFG rooted at `entry`.
    pub fn compute(&mut self, entry: Block, blocks: &PrimaryMap<Block, BlockData>) {
        self.nodes.clear();
        self.nodes.resize(blocks.len());

        let postorder = Self::postorder(entry, blocks);
        // Assign reverse-postorder numbers, 1-based so 0 can mean "unvisited".
        for (i, &block) in postorder.iter().rev().enumerate() {
            self.nodes[block].rpo_number = (i + 1) as u32;
        }
        self.nodes[entry].idom = None;

        let mut changed = true;
        while changed {
            changed = false;
            // Process in reverse postorder, skipping the entry block.
            for &block in postorder.iter().rev() {
                if block == entry {
                    continue;
                }
                let mut new_idom: Option<Block> = None;
                for &pred in blocks[block].predecessors() {
                    if self.nodes[pred].rpo_number == UNVISITED {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(cur) => self.intersect(cur, pred),
                    });
                }
                if self.nodes[block].idom != new_idom {
                    self.nodes[block].idom = new_idom;
                    changed = true;
                }
            }
        }

        self.valid = true;
    }

    fn intersect(&self, mut a: Block, mut b: Block) -> Block {
        loop {
            match self.nodes[a].rpo_number.cmp(&self.nodes[b].rpo_number) {
                core::cmp::Ordering::Greater => {
                    b = self.nodes[b].idom.expect("reachable block must have idom by now");
                }
                core::cmp::Ordering::Less => {
                    a = self.nodes[a].idom.expect("reachable block must have idom by now");
                }
                core::cmp::Ordering::Equal => return a,
            }
        }
    }

    fn postorder(entry: Block, blocks: &PrimaryMap<Block, BlockData>) -> Vec<Block> {
        let mut visited = SecondaryMap::<Block, bool>::with_default(false);
        let mut order = Vec::new();
        // Explicit stack with a "children pushed" marker to avoid recursion.
        let mut stack: Vec<(Block, usize)> = vec![(entry, 0)];
        visited[entry] = true;
        while let Some((block, next_succ)) = stack.pop() {
            let succs = blocks[block].successors();
            if next_succ < succs.len() {
                let succ = succs[next_succ];
                stack.push((block, next_succ + 1));
                if !visited[succ] {
                    visited[succ] = true;
                    stack.push((succ, 0));
                }
            } else {
                order.push(block);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Graph;

    #[test]
    fn linear_chain_dominance() {
        let mut graph = Graph::new();
        let a = graph.create_block();
        let b = graph.create_block();
        let c = graph.create_block();
        graph.set_entry(a);
        graph.add_successor(a, b);
        graph.add_successor(b, c);

        graph.rebuild_domination();

        assert!(graph.dominates(a, c));
        assert!(graph.dominates(b, c));
        assert!(!graph.dominates(c, a));
        assert!(graph.dominates(a, a));
    }

    #[test]
    fn unreachable_block_is_dominated_by_nothing() {
        let mut graph = Graph::new();
        let a = graph.create_block();
        let unreachable = graph.create_block();
        graph.set_entry(a);

        graph.rebuild_domination();

        assert!(!graph.dominates(a, unreachable));
    }

    #[test]
    fn loop_back_edge_does_not_change_header_dominance() {
        let mut graph = Graph::new();
        let entry = graph.create_block();
        let header = graph.create_block();
        let body = graph.create_block();
        let exit = graph.create_block();
        graph.set_entry(entry);
        graph.add_successor(entry, header);
        graph.add_successor(header, body);
        graph.add_successor(header, exit);
        graph.add_successor(body, header);

        graph.rebuild_domination();

        assert!(graph.dominates(header, body));
        assert!(graph.dominates(header, exit));
        assert!(!graph.dominates(body, header));
    }

    #[test]
    fn mutation_invalidates_the_tree() {
        let mut graph = Graph::new();
        let a = graph.create_block();
        graph.set_entry(a);
        graph.rebuild_domination();
        assert!(graph.domination_is_valid());

        graph.create_block();
        assert!(!graph.domination_is_valid());
    }
}
