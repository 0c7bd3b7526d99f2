//! Type forest closure: ancestor and descendant lookup.
//!
//! Each [`TypeNode`] names at most one parent, so the nodes form a forest.
//! [`closure`] walks it breadth-first in either direction, the same lookup a
//! document store's graph-lookup aggregation performs server-side.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::store::TypeNode;

/// Direction of a closure walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the roots (parent, grandparent, ...).
    Ancestors,
    /// Towards the leaves (children, grandchildren, ...).
    Descendants,
}

/// Transitive closure from `start` in `direction`, in breadth-first order.
///
/// `start` itself and the empty root marker are never part of the result.
/// Cycles in malformed input are tolerated.
pub fn closure(nodes: &[TypeNode], start: &str, direction: Direction) -> Vec<String> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        let Some(parent) = node.parent.as_deref().filter(|p| !p.is_empty()) else {
            continue;
        };
        match direction {
            Direction::Ancestors => edges.entry(&node.typename).or_default().push(parent),
            Direction::Descendants => edges.entry(parent).or_default().push(&node.typename),
        }
    }

    let mut found = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        if let Some(next) = edges.get(current) {
            for &typename in next {
                if visited.insert(typename) {
                    found.push(typename.to_string());
                    queue.push_back(typename);
                }
            }
        }
    }
    found
}
