//! Layout tree arena and focus search
//!
//! GET_TREE returns one recursive [`Node`]. [`Tree`] flattens it into an
//! arena where every entry keeps its record plus two ordered lists of child
//! indices (tiling, then floating). The arena is built fresh for each query
//! and thrown away after use.

use std::collections::VecDeque;

use crate::types::Node;

/// Index of a node inside a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena entry: a node record with its children detached into index lists
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// The record; its `nodes` and `floating_nodes` are always empty here
    pub node: Node,
    pub tiling: Vec<NodeId>,
    pub floating: Vec<NodeId>,
}

/// Arena-backed layout tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// A tree with no root
    pub fn empty() -> Self {
        Self::default()
    }

    /// Flatten a decoded root node into the arena
    ///
    /// Entries are laid out in breadth-first order, tiling children before
    /// floating children, so the root is always `NodeId(0)`.
    pub fn from_root(root: Node) -> Self {
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back((None, false, root));

        while let Some((parent, floating, mut node)) = queue.pop_front() {
            let id = NodeId(nodes.len());
            if let Some(NodeId(parent)) = parent {
                let entry = &mut nodes[parent];
                if floating {
                    entry.floating.push(id);
                } else {
                    entry.tiling.push(id);
                }
            }

            let tiling = std::mem::take(&mut node.nodes);
            let floating_children = std::mem::take(&mut node.floating_nodes);
            queue.extend(tiling.into_iter().map(|child| (Some(id), false, child)));
            queue.extend(floating_children.into_iter().map(|child| (Some(id), true, child)));

            nodes.push(TreeNode {
                node,
                tiling: Vec::new(),
                floating: Vec::new(),
            });
        }

        Self { nodes }
    }

    /// Build from an optional root; `None` gives an empty tree
    pub fn from_optional(root: Option<Node>) -> Self {
        root.map(Self::from_root).unwrap_or_default()
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, entry)| (NodeId(index), entry))
    }

    /// Find the focused node
    ///
    /// Breadth-first from the root, visiting a node's tiling children before
    /// its floating children. The first node with `focused == true` in that
    /// order wins, which keeps the answer deterministic even if several nodes
    /// carry a stale focus flag. Dangling indices are skipped.
    pub fn focused_id(&self) -> Option<NodeId> {
        let mut queue: VecDeque<NodeId> = self.root().into_iter().collect();

        while let Some(id) = queue.pop_front() {
            let Some(entry) = self.get(id) else {
                continue;
            };

            if entry.node.focused {
                return Some(id);
            }

            queue.extend(entry.tiling.iter().copied());
            queue.extend(entry.floating.iter().copied());
        }

        None
    }

    /// The focused node's record, see [`Tree::focused_id`]
    pub fn focused_node(&self) -> Option<&Node> {
        self.focused_id()
            .and_then(|id| self.get(id))
            .map(|entry| &entry.node)
    }
}

impl From<Node> for Tree {
    fn from(root: Node) -> Self {
        Self::from_root(root)
    }
}

/// Locate the focused node under `root`, if any
pub fn focused_node(root: Option<Node>) -> Option<Node> {
    let tree = Tree::from_optional(root);
    let id = tree.focused_id()?;
    tree.nodes.into_iter().nth(id.0).map(|entry| entry.node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, focused: bool, nodes: Vec<Node>, floating_nodes: Vec<Node>) -> Node {
        Node {
            id,
            focused,
            nodes,
            floating_nodes,
            ..Default::default()
        }
    }

    fn leaf(id: i64, focused: bool) -> Node {
        node(id, focused, vec![], vec![])
    }

    #[test]
    fn test_absent_root_has_no_focus() {
        assert!(Tree::empty().focused_node().is_none());
        assert!(focused_node(None).is_none());
    }

    #[test]
    fn test_no_focused_node() {
        let tree = Tree::from_root(node(1, false, vec![leaf(2, false), leaf(3, false)], vec![]));
        assert!(tree.focused_id().is_none());
    }

    #[test]
    fn test_focused_root() {
        let tree = Tree::from_root(node(1, true, vec![leaf(2, true)], vec![]));
        assert_eq!(tree.focused_node().map(|n| n.id), Some(1));
    }

    #[test]
    fn test_unique_focus_found_regardless_of_sibling_position() {
        for position in 0..4 {
            let children = (0..4)
                .map(|i| node(10 + i, false, vec![leaf(100 + i, i == position)], vec![]))
                .collect();
            let tree = Tree::from_root(node(1, false, children, vec![]));
            assert_eq!(
                tree.focused_node().map(|n| n.id),
                Some(100 + position),
                "focused leaf under child {}",
                position
            );
        }
    }

    #[test]
    fn test_floating_focus_found_beside_unfocused_tiling_subtree() {
        // workspace
        //   tiling: con 2 -> con 4 -> con 5 (none focused)
        //   floating: con 3 (focused)
        let tiling = node(2, false, vec![node(4, false, vec![leaf(5, false)], vec![])], vec![]);
        let workspace = node(1, false, vec![tiling], vec![leaf(3, true)]);

        let tree = Tree::from_root(workspace);
        assert_eq!(tree.focused_node().map(|n| n.id), Some(3));
    }

    #[test]
    fn test_shallower_stale_focus_wins_over_deeper() {
        let workspace = node(
            1,
            false,
            vec![node(2, false, vec![leaf(4, true)], vec![])],
            vec![leaf(3, true)],
        );

        let tree = Tree::from_root(workspace);
        assert_eq!(tree.focused_node().map(|n| n.id), Some(3));
    }

    #[test]
    fn test_tiling_visited_before_floating_at_same_depth() {
        let workspace = node(1, false, vec![leaf(2, true)], vec![leaf(3, true)]);
        let tree = Tree::from_root(workspace);
        assert_eq!(tree.focused_node().map(|n| n.id), Some(2));
    }

    #[test]
    fn test_arena_layout() {
        let workspace = node(1, false, vec![leaf(2, false), leaf(3, false)], vec![leaf(4, false)]);
        let tree = Tree::from_root(workspace);

        assert_eq!(tree.len(), 4);
        let root = tree.get(tree.root().unwrap()).unwrap();
        assert_eq!(root.tiling.len(), 2);
        assert_eq!(root.floating.len(), 1);
        assert!(root.node.nodes.is_empty());
        assert!(root.node.floating_nodes.is_empty());

        let floating = tree.get(root.floating[0]).unwrap();
        assert_eq!(floating.node.id, 4);
    }

    #[test]
    fn test_decoded_nulls_are_tolerated() {
        let root: Node = serde_json::from_str(
            r#"{"id": 1, "nodes": [null, {"id": 2, "focused": true}], "floating_nodes": [null]}"#,
        )
        .unwrap();

        assert_eq!(focused_node(Some(root)).map(|n| n.id), Some(2));
    }
}
