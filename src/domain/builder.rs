//! Tree builder for rebuilding the node hierarchy from flat records.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::arena::HierarchyTree;
use crate::domain::entities::{Node, NodeId};
use crate::domain::error::DomainError;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, DomainError>;

/// Constructs the hierarchy from node records in any order.
///
/// Rejects every shape that is not a single rooted tree: self-parenting,
/// unknown parents, cycles, duplicate ids and zero or several roots.
#[derive(Default)]
pub struct TreeBuilder {
    relationship_cache: HashMap<NodeId, Vec<NodeId>>,
    visited: HashSet<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, nodes: Vec<Node>) -> TreeResult<HierarchyTree> {
        self.relationship_cache.clear();
        self.visited.clear();

        let mut records: HashMap<NodeId, Node> = HashMap::with_capacity(nodes.len());
        // Input order decides child order
        let order: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        for node in nodes {
            if node.mother == Some(node.id) {
                return Err(DomainError::InvalidHierarchy(format!(
                    "node {} is its own parent",
                    node.id
                )));
            }
            if let Some(previous) = records.insert(node.id, node) {
                return Err(DomainError::InvalidHierarchy(format!(
                    "duplicate node id {}",
                    previous.id
                )));
            }
        }
        if records.is_empty() {
            return Ok(HierarchyTree::new());
        }

        let mut roots = Vec::new();
        for node in order.iter().filter_map(|id| records.get(id)) {
            match node.mother {
                Some(mother) if !records.contains_key(&mother) => {
                    return Err(DomainError::InvalidHierarchy(format!(
                        "node {} references unknown parent {}",
                        node.id, mother
                    )));
                }
                Some(mother) => self
                    .relationship_cache
                    .entry(mother)
                    .or_default()
                    .push(node.id),
                None => roots.push(node.id),
            }
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] => {
                return Err(DomainError::InvalidHierarchy(
                    "cycle detected: no root node".to_string(),
                ))
            }
            _ => {
                return Err(DomainError::InvalidHierarchy(format!(
                    "{} root nodes found, expected exactly one",
                    roots.len()
                )))
            }
        };

        let tree = self.build_tree(root, &mut records)?;

        // Anything not reached from the root hangs in a cycle
        if let Some(stray) = records.keys().next() {
            return Err(DomainError::InvalidHierarchy(format!(
                "cycle detected at node {}",
                stray
            )));
        }
        debug!("build: rebuilt hierarchy with {} nodes", tree.len());
        Ok(tree)
    }

    fn build_tree(
        &mut self,
        root: NodeId,
        records: &mut HashMap<NodeId, Node>,
    ) -> TreeResult<HierarchyTree> {
        let mut tree = HierarchyTree::new();
        // Breadth-first so that parents are always inserted before children
        let mut queue = std::collections::VecDeque::from([root]);

        while let Some(current) = queue.pop_front() {
            if !self.visited.insert(current) {
                return Err(DomainError::InvalidHierarchy(format!(
                    "cycle detected at node {}",
                    current
                )));
            }
            let node = records
                .remove(&current)
                .ok_or_else(|| DomainError::NodeNotFound(current))?;
            if !tree.insert_node(node) {
                return Err(DomainError::InvalidHierarchy(format!(
                    "cannot attach node {}",
                    current
                )));
            }
            if let Some(children) = self.relationship_cache.get(&current) {
                queue.extend(children.iter().copied());
            }
        }

        Ok(tree)
    }
}
