use std::collections::HashMap;

use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::{Node, NodeId};

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Node record
    pub data: Node,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in insertion order
    pub children: Vec<Index>,
}

/// Arena-based hierarchy of nodes.
///
/// Uses a generational arena for memory-safe node references. Node ids are
/// mapped to arena indices so callers never hold an `Index` directly.
/// The structure is acyclic by construction: nodes are only ever inserted
/// under an existing parent.
#[derive(Debug, Clone)]
pub struct HierarchyTree {
    arena: Arena<TreeNode>,
    index: HashMap<NodeId, Index>,
    root: Option<Index>,
}

impl Default for HierarchyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            index: HashMap::new(),
            root: None,
        }
    }

    /// Insert a node below `data.mother`, or as root when it has none.
    ///
    /// Returns false when the parent is unknown or a second root is attempted;
    /// the tree is left untouched in that case.
    #[instrument(level = "trace", skip(self, data), fields(node = %data.id))]
    pub fn insert_node(&mut self, data: Node) -> bool {
        if self.index.contains_key(&data.id) {
            return false;
        }
        let parent = match data.mother {
            Some(mother) => match self.index.get(&mother) {
                Some(&idx) => Some(idx),
                None => return false,
            },
            None if self.root.is_some() => return false,
            None => None,
        };

        let id = data.id;
        let node_idx = self.arena.insert(TreeNode {
            data,
            parent,
            children: Vec::new(),
        });
        self.index.insert(id, node_idx);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.tree_node(id).map(|n| &n.data)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let idx = *self.index.get(&id)?;
        self.arena.get_mut(idx).map(|n| &mut n.data)
    }

    fn tree_node(&self, id: NodeId) -> Option<&TreeNode> {
        self.index.get(&id).and_then(|&idx| self.arena.get(idx))
    }

    fn id_at(&self, idx: Index) -> Option<NodeId> {
        self.arena.get(idx).map(|n| n.data.id)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root.and_then(|idx| self.id_at(idx))
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.root() == Some(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree_node(id)
            .and_then(|n| n.parent)
            .and_then(|idx| self.id_at(idx))
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree_node(id)
            .map(|n| {
                n.children
                    .iter()
                    .filter_map(|&idx| self.id_at(idx))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All nodes reachable through child links, excluding `id` itself.
    #[instrument(level = "trace", skip(self))]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.subtree(id).into_iter().skip(1).collect()
    }

    /// `id` followed by its descendants in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        match self.index.get(&id) {
            Some(&start) => self.iter_from(start).map(|(_, n)| n.data.id).collect(),
            None => Vec::new(),
        }
    }

    /// Parents of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    /// Detach and drop `id` with its whole subtree.
    ///
    /// Returns the removed nodes in post-order (leaves first).
    #[instrument(level = "trace", skip(self))]
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<Node> {
        let Some(&start) = self.index.get(&id) else {
            return Vec::new();
        };
        let order: Vec<Index> = self.iter_postorder_from(start).map(|(idx, _)| idx).collect();

        if let Some(parent_idx) = self.arena.get(start).and_then(|n| n.parent) {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.retain(|&c| c != start);
            }
        }
        if self.root == Some(start) {
            self.root = None;
        }

        let mut removed = Vec::with_capacity(order.len());
        for idx in order {
            if let Some(node) = self.arena.remove(idx) {
                self.index.remove(&node.data.id);
                removed.push(node.data);
            }
        }
        removed
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter(&self) -> TreeIterator {
        TreeIterator::new(self, self.root)
    }

    fn iter_from(&self, start: Index) -> TreeIterator {
        TreeIterator::new(self, Some(start))
    }

    fn iter_postorder_from(&self, start: Index) -> PostOrderIterator {
        PostOrderIterator::new(self, Some(start))
    }

    /// Render the hierarchy below `id` for terminal display.
    pub fn to_termtree(&self, id: NodeId, label: &dyn Fn(&Node) -> String) -> Tree<String> {
        fn build(
            tree: &HierarchyTree,
            idx: Index,
            label: &dyn Fn(&Node) -> String,
        ) -> Option<Tree<String>> {
            let node = tree.arena.get(idx)?;
            let leaves: Vec<_> = node
                .children
                .iter()
                .filter_map(|&child| build(tree, child, label))
                .collect();
            Some(Tree::new(label(&node.data)).with_leaves(leaves))
        }

        self.index
            .get(&id)
            .and_then(|&idx| build(self, idx, label))
            .unwrap_or_else(|| Tree::new("Empty tree".to_string()))
    }
}

pub struct TreeIterator<'a> {
    tree: &'a HierarchyTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a HierarchyTree, start: Option<Index>) -> Self {
        Self {
            tree,
            stack: start.into_iter().collect(),
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a HierarchyTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a HierarchyTree, start: Option<Index>) -> Self {
        Self {
            tree,
            stack: start.into_iter().map(|idx| (idx, false)).collect(),
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
