use std::collections::HashMap;

use super::{TileMesh, Transform};

/// Handle to a node attached to a [`SceneRoot`].
///
/// Ids are never reused within one root, so a stale handle can not alias a
/// newer node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(u64);

/// Paint order key.
///
/// Ordering rules:
/// 1) `z`: ascending (back-to-front)
/// 2) `order`: ascending (attach order for equal z)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PaintKey {
    pub z: i32,
    pub order: u64,
}

/// A mesh attached to the scene root.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub mesh: TileMesh,
    pub transform: Transform,
    pub z: i32,
}

/// Root scene node: the single owner of every attached mesh.
///
/// Layers attach and detach nodes; renderers only read them. Nodes hold no
/// reference back to the root.
#[derive(Debug, Default)]
pub struct SceneRoot {
    nodes: HashMap<NodeId, MeshNode>,
    next_id: u64,

    sorted: Vec<NodeId>,
    sorted_dirty: bool,
}

impl SceneRoot {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a mesh at z = 0 and returns its handle.
    pub fn add(&mut self, mesh: TileMesh, transform: Transform) -> NodeId {
        self.add_with_z(mesh, transform, 0)
    }

    pub fn add_with_z(&mut self, mesh: TileMesh, transform: Transform, z: i32) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, MeshNode { mesh, transform, z });
        self.sorted_dirty = true;
        id
    }

    /// Detaches a node, handing ownership back to the caller.
    pub fn remove(&mut self, id: NodeId) -> Option<MeshNode> {
        let node = self.nodes.remove(&id);
        if node.is_some() {
            self.sorted_dirty = true;
        }
        node
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&MeshNode> {
        self.nodes.get(&id)
    }

    /// Mutable access for material updates. Changing `z` through this handle
    /// requires [`SceneRoot::set_z`] to keep paint order current.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut MeshNode> {
        self.nodes.get_mut(&id)
    }

    pub fn set_z(&mut self, id: NodeId, z: i32) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.z = z;
            self.sorted_dirty = true;
        }
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Detaches every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.sorted.clear();
        self.sorted_dirty = false;
    }

    /// Iterates nodes in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &MeshNode)> {
        self.nodes.iter().map(|(&id, node)| (id, node))
    }

    /// Iterates nodes back-to-front. The ordering buffer is reused across
    /// frames and only rebuilt after attach/detach.
    pub fn iter_in_paint_order(&mut self) -> impl Iterator<Item = (NodeId, &MeshNode)> {
        if self.sorted_dirty {
            self.rebuild_sorted();
        }
        let nodes = &self.nodes;
        self.sorted.iter().filter_map(move |id| nodes.get(id).map(|n| (*id, n)))
    }

    fn rebuild_sorted(&mut self) {
        self.sorted.clear();
        self.sorted.extend(self.nodes.keys().copied());

        let nodes = &self.nodes;
        self.sorted
            .sort_by_key(|id| PaintKey { z: nodes[id].z, order: id.0 });

        self.sorted_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Geometry;

    fn mesh() -> TileMesh {
        TileMesh::new(Geometry::Empty)
    }

    #[test]
    fn add_and_remove() {
        let mut root = SceneRoot::new();
        let a = root.add(mesh(), Transform::identity());
        let b = root.add(mesh(), Transform::identity());
        assert_eq!(root.len(), 2);

        assert!(root.remove(a).is_some());
        assert!(root.remove(a).is_none());
        assert!(!root.contains(a));
        assert!(root.contains(b));
    }

    #[test]
    fn ids_are_not_reused() {
        let mut root = SceneRoot::new();
        let a = root.add(mesh(), Transform::identity());
        root.remove(a);
        let b = root.add(mesh(), Transform::identity());
        assert_ne!(a, b);
    }

    #[test]
    fn paint_order_is_z_then_attach_order() {
        let mut root = SceneRoot::new();
        let a = root.add_with_z(mesh(), Transform::identity(), 1);
        let b = root.add_with_z(mesh(), Transform::identity(), 0);
        let c = root.add_with_z(mesh(), Transform::identity(), 1);

        let order: Vec<_> = root.iter_in_paint_order().map(|(id, _)| id).collect();
        assert_eq!(order, vec![b, a, c]);

        root.set_z(b, 2);
        let order: Vec<_> = root.iter_in_paint_order().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, c, b]);
    }

    #[test]
    fn removed_nodes_leave_paint_order() {
        let mut root = SceneRoot::new();
        let a = root.add(mesh(), Transform::identity());
        let b = root.add(mesh(), Transform::identity());
        root.remove(a);
        let order: Vec<_> = root.iter_in_paint_order().map(|(id, _)| id).collect();
        assert_eq!(order, vec![b]);
    }
}
