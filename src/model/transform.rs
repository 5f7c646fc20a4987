use glam::{Mat4, Quat, Vec3};

/// Handle into a [`TransformTree`]. Handles are never invalidated; nodes are
/// only removed at session teardown, which drops the whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a node draws, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeShape {
    Empty,
    Mesh(String),
    Capsule { height: f32, radius: f32 },
}

#[derive(Debug, Clone)]
pub struct TransformNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub position: Vec3,
    pub rotation: Quat,
    pub shape: NodeShape,
    pub visible: bool,
    /// Whether aim/ground rays may hit this node.
    pub pickable: bool,
}

/// Parent-linked transform hierarchy stored in a flat arena.
#[derive(Debug, Default)]
pub struct TransformTree {
    nodes: Vec<TransformNode>,
}

impl TransformTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, parent: Option<NodeId>, position: Vec3) -> NodeId {
        self.add_shaped(name, parent, position, NodeShape::Empty)
    }

    pub fn add_shaped(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        position: Vec3,
        shape: NodeShape,
    ) -> NodeId {
        self.nodes.push(TransformNode {
            name: name.to_string(),
            parent,
            position,
            rotation: Quat::IDENTITY,
            shape,
            visible: true,
            pickable: true,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> &TransformNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut TransformNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(id))
            .map(|(i, _)| NodeId(i))
    }

    /// `id` and every node below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            out.extend(self.children(current));
            i += 1;
        }
        out
    }

    pub fn local_matrix(&self, id: NodeId) -> Mat4 {
        let node = self.get(id);
        Mat4::from_rotation_translation(node.rotation, node.position)
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let local = self.local_matrix(id);
        match self.get(id).parent {
            Some(parent) => self.world_matrix(parent) * local,
            None => local,
        }
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    /// Visible only if the node and all its ancestors are visible.
    pub fn is_visible_in_tree(&self, id: NodeId) -> bool {
        let node = self.get(id);
        node.visible && node.parent.map_or(true, |p| self.is_visible_in_tree(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn world_position_composes_parents() {
        let mut tree = TransformTree::new();
        let root = tree.add("root", None, Vec3::new(1.0, 0.0, 0.0));
        let yaw = tree.add("yaw", Some(root), Vec3::ZERO);
        let head = tree.add("head", Some(yaw), Vec3::new(0.0, 1.6, 0.0));
        let hand = tree.add("hand", Some(head), Vec3::new(0.0, 0.0, -1.0));

        tree.get_mut(yaw).rotation = Quat::from_rotation_y(FRAC_PI_2);
        let p = tree.world_position(hand);
        // -Z rotated a quarter turn about +Y points along -X
        assert!((p - Vec3::new(0.0, 1.6, 0.0)).length() < 1e-5, "{p:?}");
    }

    #[test]
    fn visibility_inherits_from_ancestors() {
        let mut tree = TransformTree::new();
        let root = tree.add("root", None, Vec3::ZERO);
        let child = tree.add("child", Some(root), Vec3::ZERO);
        tree.get_mut(root).visible = false;
        assert!(tree.get(child).visible);
        assert!(!tree.is_visible_in_tree(child));
    }

    #[test]
    fn descendants_include_self_and_grandchildren() {
        let mut tree = TransformTree::new();
        let root = tree.add("root", None, Vec3::ZERO);
        let a = tree.add("a", Some(root), Vec3::ZERO);
        let b = tree.add("b", Some(a), Vec3::ZERO);
        let other = tree.add("other", None, Vec3::ZERO);
        let all = tree.descendants(root);
        assert_eq!(all, vec![root, a, b]);
        assert!(!all.contains(&other));
    }
}
