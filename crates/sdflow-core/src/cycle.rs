//! Cycle detection over node graphs
//!
//! The compiler assumes an acyclic graph and would recurse forever on a loop,
//! so every compile must be preceded by [`find_cycle`].

use crate::graph::{Graph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Search `nodes` (and `output`) for a cycle
///
/// Returns the nodes of one cycle in edge order, starting from the first node
/// found to be revisited, or an empty list if everything is acyclic. Every
/// supplied node is used as a search root, so disconnected components are
/// covered in a single pass. The traversal keeps its own stack and never
/// recurses, and runs in O(V + E).
pub fn find_cycle(graph: &Graph, output: NodeId, nodes: &[NodeId]) -> Vec<NodeId> {
    let n = graph.capacity();
    let mut color = vec![Color::White; n];
    let mut parent: Vec<Option<NodeId>> = vec![None; n];

    for &root in std::iter::once(&output).chain(nodes) {
        if !graph.contains(root) || color[root.index()] != Color::White {
            continue;
        }
        color[root.index()] = Color::Gray;
        // (node, index of the next edge to follow)
        let mut stack = vec![(root, 0usize)];

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            let edge = graph.node(node).and_then(|n| n.edges().nth(*next));
            *next += 1;

            let Some(target) = edge else {
                color[node.index()] = Color::Black;
                stack.pop();
                continue;
            };
            if !graph.contains(target) {
                continue;
            }
            match color[target.index()] {
                Color::White => {
                    parent[target.index()] = Some(node);
                    color[target.index()] = Color::Gray;
                    stack.push((target, 0));
                }
                Color::Gray => {
                    parent[target.index()] = Some(node);
                    return unwind(&parent, target);
                }
                Color::Black => {}
            }
        }
    }
    Vec::new()
}

/// Follow parent links from `start` back around to itself
fn unwind(parent: &[Option<NodeId>], start: NodeId) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut cur = parent[start.index()];
    while let Some(node) = cur {
        if node == start {
            break;
        }
        chain.push(node);
        cur = parent[node.index()];
    }
    chain.push(start);
    chain.reverse();
    chain
}

impl Graph {
    /// Search the whole graph for a cycle, starting from `output`
    pub fn find_cycle(&self, output: NodeId) -> Vec<NodeId> {
        let nodes: Vec<NodeId> = self.ids().collect();
        find_cycle(self, output, &nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BinaryOp, UnaryOp};

    #[test]
    fn three_node_cycle_is_reported() {
        let mut g = Graph::new();
        let seed = g.constant(1.0);
        let a = g.unary(UnaryOp::Abs, seed).unwrap();
        let b = g.unary(UnaryOp::Sin, a).unwrap();
        let c = g.unary(UnaryOp::Cos, b).unwrap();
        g.set_input(a, c).unwrap();
        let out = g.output(c).unwrap();

        let cycle = g.find_cycle(out);
        assert_eq!(cycle.len(), 3);
        for n in [a, b, c] {
            assert!(cycle.contains(&n));
        }
        assert!(!cycle.contains(&out));
    }

    #[test]
    fn witness_is_in_edge_order() {
        let mut g = Graph::new();
        let seed = g.constant(1.0);
        let a = g.unary(UnaryOp::Abs, seed).unwrap();
        let b = g.unary(UnaryOp::Sin, a).unwrap();
        let c = g.unary(UnaryOp::Cos, b).unwrap();
        g.set_input(a, c).unwrap();

        let cycle = find_cycle(&g, c, &[]);
        // Each node's input is the following node, wrapping around
        for (i, &n) in cycle.iter().enumerate() {
            let next = cycle[(i + 1) % cycle.len()];
            assert!(g.node(n).unwrap().edges().any(|e| e == next));
        }
    }

    #[test]
    fn acyclic_chain_is_clean() {
        let mut g = Graph::new();
        let a = g.constant(1.0);
        let b = g.unary(UnaryOp::Abs, a).unwrap();
        let c = g.binary(BinaryOp::Add, b, b).unwrap();
        let out = g.output(c).unwrap();
        assert!(g.find_cycle(out).is_empty());
    }

    #[test]
    fn only_the_cyclic_component_is_flagged() {
        let mut g = Graph::new();
        // Acyclic component holding the output
        let k = g.constant(2.0);
        let m = g.binary(BinaryOp::Mul, k, k).unwrap();
        let out = g.output(m).unwrap();

        // Disconnected loop
        let seed = g.constant(1.0);
        let x = g.unary(UnaryOp::Floor, seed).unwrap();
        let y = g.unary(UnaryOp::Ceil, x).unwrap();
        g.set_input(x, y).unwrap();

        let cycle = g.find_cycle(out);
        let mut sorted = cycle.clone();
        sorted.sort();
        assert_eq!(sorted, vec![x, y]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut g = Graph::new();
        let a = g.constant(1.0);
        let add = g.binary(BinaryOp::Add, a, a).unwrap();
        g.set_rhs(add, add).unwrap();
        assert_eq!(g.find_cycle(add), vec![add]);
    }

    #[test]
    fn long_chains_do_not_exhaust_the_stack() {
        let mut g = Graph::new();
        let mut prev = g.constant(0.0);
        for _ in 0..50_000 {
            prev = g.unary(UnaryOp::Negate, prev).unwrap();
        }
        let out = g.output(prev).unwrap();
        assert!(g.find_cycle(out).is_empty());
    }

    #[test]
    fn cycles_through_composite_bodies_are_found() {
        let mut g = Graph::new();
        let comp = g.composite_unary();
        let param = g.placeholder(comp, 0).unwrap();
        let abs = g.unary(UnaryOp::Abs, param).unwrap();
        let body = g.output(abs).unwrap();
        g.set_body(comp, body).unwrap();
        // Body reaches back to the composite
        g.set_input(abs, comp).unwrap();
        let out = g.output(comp).unwrap();
        let cycle = g.find_cycle(out);
        assert!(cycle.contains(&comp));
        assert!(cycle.contains(&body));
    }
}
