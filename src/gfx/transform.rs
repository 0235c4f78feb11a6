//! # Transform Hierarchy
//!
//! Position, scale and rotation with a derived local matrix, stored in a
//! [`Transforms`] arena so that parent links are plain generational ids.
//!
//! ## Composition
//!
//! The local matrix is always `translate(position) · rotate(rotation) · scale(scale)`.
//! Rotation is an Euler triple in radians applied pitch (x) first, then yaw (y),
//! then roll (z), i.e. `Rz · Ry · Rx`.
//!
//! The global matrix of a transform is its parent's global matrix times its
//! local matrix, or just the local matrix for a root. Globals are cached per
//! node and invalidated top-down whenever a node is mutated through
//! [`Transforms::get_mut`] or re-parented.
//!
//! ## Parent links
//!
//! A parent link never owns the parent. Removing a parent leaves its children
//! in place; their stale link no longer resolves and they behave as roots.
//! Parent cycles are a caller error and are not detected.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};

use cgmath::{InnerSpace, Matrix4, One, Quaternion, Rad, Rotation3, Vector3, Zero};
use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Handle to a [`Transform`] stored in a [`Transforms`] arena.
    pub struct TransformId;
}

/// Spatial placement of a mesh, model, camera or light
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vector3<f32>,
    scale: Vector3<f32>,
    rotation: Vector3<f32>,
    parent: Option<TransformId>,

    local: Matrix4<f32>,
    forward: Vector3<f32>,
    up: Vector3<f32>,
    left: Vector3<f32>,

    global: Cell<Option<Matrix4<f32>>>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vector3::zero(), Vector3::new(1.0, 1.0, 1.0), Vector3::zero())
    }
}

impl Transform {
    /// Creates a root transform
    ///
    /// # Arguments
    /// * `position` - Translation
    /// * `scale` - Per-axis scale
    /// * `rotation` - Euler angles in radians (pitch, yaw, roll)
    pub fn new(position: Vector3<f32>, scale: Vector3<f32>, rotation: Vector3<f32>) -> Self {
        let mut transform = Self {
            position,
            scale,
            rotation,
            parent: None,
            local: Matrix4::one(),
            forward: Vector3::unit_z(),
            up: Vector3::unit_y(),
            left: Vector3::unit_x(),
            global: Cell::new(None),
        };
        transform.recompute();
        transform
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self::new(position, Vector3::new(1.0, 1.0, 1.0), Vector3::zero())
    }

    /// Sets the parent before the transform is inserted into an arena.
    pub fn with_parent(mut self, parent: TransformId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    /// Euler rotation exactly as last set.
    pub fn rotation(&self) -> Vector3<f32> {
        self.rotation
    }

    pub fn parent(&self) -> Option<TransformId> {
        self.parent
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.recompute();
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.recompute();
    }

    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.rotation = rotation;
        self.recompute();
    }

    pub fn translate(&mut self, delta: Vector3<f32>) {
        self.position += delta;
        self.recompute();
    }

    /// Local matrix, excluding any parent.
    pub fn matrix(&self) -> Matrix4<f32> {
        self.local
    }

    /// Local +Z axis, unit length
    pub fn forward(&self) -> Vector3<f32> {
        self.forward
    }

    /// Local +Y axis, unit length
    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    /// Local +X axis, unit length
    pub fn left(&self) -> Vector3<f32> {
        self.left
    }

    fn orientation(&self) -> Quaternion<f32> {
        Quaternion::from_angle_z(Rad(self.rotation.z))
            * Quaternion::from_angle_y(Rad(self.rotation.y))
            * Quaternion::from_angle_x(Rad(self.rotation.x))
    }

    fn recompute(&mut self) {
        self.local = Matrix4::from_translation(self.position)
            * Matrix4::from(self.orientation())
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z);

        // Columns of R·S are orthogonal for any scale, so normalising them
        // recovers the rotation basis even when scale is non-uniform.
        self.left = unit_or_zero(self.local.x.truncate());
        self.up = unit_or_zero(self.local.y.truncate());
        self.forward = unit_or_zero(self.local.z.truncate());
    }
}

fn unit_or_zero(v: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > f32::EPSILON {
        v.normalize()
    } else {
        Vector3::zero()
    }
}

/// Arena owning every transform in a scene
#[derive(Debug, Default)]
pub struct Transforms {
    nodes: SlotMap<TransformId, Transform>,
    children: SecondaryMap<TransformId, Vec<TransformId>>,
}

impl Transforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a transform, registering it with its parent if one is set.
    pub fn insert(&mut self, transform: Transform) -> TransformId {
        let parent = transform.parent;
        transform.global.set(None);
        let id = self.nodes.insert(transform);
        self.children.insert(id, Vec::new());
        if let Some(parent) = parent {
            self.attach(id, parent);
        }
        id
    }

    /// Removes a transform. Its children stay alive and become roots.
    pub fn remove(&mut self, id: TransformId) -> Option<Transform> {
        let transform = self.nodes.remove(id)?;
        if let Some(parent) = transform.parent {
            self.detach(id, parent);
        }
        if let Some(children) = self.children.remove(id) {
            for child in children {
                self.invalidate(child);
            }
        }
        Some(transform)
    }

    pub fn get(&self, id: TransformId) -> Option<&Transform> {
        self.nodes.get(id)
    }

    /// Mutable access; cached globals of the node and its descendants are
    /// invalidated when the guard drops.
    pub fn get_mut(&mut self, id: TransformId) -> Option<TransformMut<'_>> {
        if self.nodes.contains_key(id) {
            Some(TransformMut { arena: self, id })
        } else {
            None
        }
    }

    pub fn contains(&self, id: TransformId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Re-parents a transform. The caller must not create a cycle.
    pub fn set_parent(&mut self, id: TransformId, parent: Option<TransformId>) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let previous = std::mem::replace(&mut node.parent, parent);
        if let Some(previous) = previous {
            self.detach(id, previous);
        }
        if let Some(parent) = parent {
            self.attach(id, parent);
        }
        self.invalidate(id);
    }

    /// World matrix of `id`, or identity if it is not in the arena.
    pub fn global_matrix(&self, id: TransformId) -> Matrix4<f32> {
        let Some(node) = self.nodes.get(id) else {
            return Matrix4::one();
        };
        if let Some(cached) = node.global.get() {
            return cached;
        }

        let global = match node.parent.filter(|parent| self.nodes.contains_key(*parent)) {
            Some(parent) => self.global_matrix(parent) * node.local,
            None => node.local,
        };
        node.global.set(Some(global));
        global
    }

    /// World-space position of `id`.
    pub fn global_position(&self, id: TransformId) -> Vector3<f32> {
        self.global_matrix(id).w.truncate()
    }

    fn attach(&mut self, child: TransformId, parent: TransformId) {
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.push(child);
        }
    }

    fn detach(&mut self, child: TransformId, parent: TransformId) {
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.retain(|sibling| *sibling != child);
        }
    }

    fn invalidate(&self, id: TransformId) {
        if let Some(node) = self.nodes.get(id) {
            node.global.set(None);
        }
        if let Some(children) = self.children.get(id) {
            for child in children {
                self.invalidate(*child);
            }
        }
    }
}

/// Mutable borrow of one transform inside a [`Transforms`] arena
pub struct TransformMut<'a> {
    arena: &'a mut Transforms,
    id: TransformId,
}

impl Deref for TransformMut<'_> {
    type Target = Transform;

    fn deref(&self) -> &Transform {
        &self.arena.nodes[self.id]
    }
}

impl DerefMut for TransformMut<'_> {
    fn deref_mut(&mut self) -> &mut Transform {
        &mut self.arena.nodes[self.id]
    }
}

impl Drop for TransformMut<'_> {
    fn drop(&mut self) {
        self.arena.invalidate(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    fn random_transform(rng: &mut impl Rng) -> Transform {
        Transform::new(
            Vector3::new(
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
            ),
            Vector3::new(
                rng.random_range(0.1..3.0),
                rng.random_range(0.1..3.0),
                rng.random_range(0.1..3.0),
            ),
            Vector3::new(
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..3.0),
            ),
        )
    }

    #[test]
    fn test_global_matrix_composes_chain() {
        let mut rng = rand::rng();
        for _ in 0..20 {
            let mut arena = Transforms::new();
            let depth = rng.random_range(1..8);

            let root = arena.insert(random_transform(&mut rng));
            let mut expected = arena.global_matrix(root);
            let mut tip = root;
            for _ in 0..depth {
                let child = arena.insert(random_transform(&mut rng).with_parent(tip));
                expected = expected * arena.get(child).unwrap().matrix();
                tip = child;
            }

            assert_eq!(arena.global_matrix(tip), expected);
        }
    }

    #[test]
    fn test_root_global_is_local() {
        let mut arena = Transforms::new();
        let id = arena.insert(Transform::from_position(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(arena.global_matrix(id), arena.get(id).unwrap().matrix());
        assert_eq!(arena.global_position(id), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_rotation_is_stored_exactly() {
        let mut rng = rand::rng();
        let mut transform = Transform::default();
        for _ in 0..100 {
            let r = Vector3::new(
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            );
            transform.set_rotation(r);
            transform.set_scale(Vector3::new(2.0, 0.5, 3.0));
            assert_eq!(transform.rotation().x.to_bits(), r.x.to_bits());
            assert_eq!(transform.rotation().y.to_bits(), r.y.to_bits());
            assert_eq!(transform.rotation().z.to_bits(), r.z.to_bits());
        }
    }

    #[test]
    fn test_mutating_parent_invalidates_descendants() {
        let mut arena = Transforms::new();
        let root = arena.insert(Transform::default());
        let middle = arena.insert(Transform::from_position(Vector3::unit_x()).with_parent(root));
        let leaf = arena.insert(Transform::from_position(Vector3::unit_y()).with_parent(middle));

        assert!(close(arena.global_position(leaf), Vector3::new(1.0, 1.0, 0.0)));

        arena
            .get_mut(root)
            .unwrap()
            .translate(Vector3::new(0.0, 0.0, 5.0));
        assert!(close(arena.global_position(leaf), Vector3::new(1.0, 1.0, 5.0)));

        arena.get_mut(root).unwrap().set_scale(Vector3::new(2.0, 2.0, 2.0));
        assert!(close(arena.global_position(leaf), Vector3::new(2.0, 2.0, 5.0)));
    }

    #[test]
    fn test_removed_parent_leaves_child_as_root() {
        let mut arena = Transforms::new();
        let parent = arena.insert(Transform::from_position(Vector3::new(10.0, 0.0, 0.0)));
        let child = arena.insert(Transform::from_position(Vector3::unit_y()).with_parent(parent));
        assert!(close(arena.global_position(child), Vector3::new(10.0, 1.0, 0.0)));

        arena.remove(parent);
        // Slot reuse must not resurrect the old link
        arena.insert(Transform::from_position(Vector3::new(-50.0, 0.0, 0.0)));

        assert!(arena.contains(child));
        assert!(close(arena.global_position(child), Vector3::unit_y()));
    }

    #[test]
    fn test_set_parent_moves_between_hierarchies() {
        let mut arena = Transforms::new();
        let a = arena.insert(Transform::from_position(Vector3::new(1.0, 0.0, 0.0)));
        let b = arena.insert(Transform::from_position(Vector3::new(0.0, 0.0, 7.0)));
        let child = arena.insert(Transform::default().with_parent(a));
        assert!(close(arena.global_position(child), Vector3::new(1.0, 0.0, 0.0)));

        arena.set_parent(child, Some(b));
        assert!(close(arena.global_position(child), Vector3::new(0.0, 0.0, 7.0)));

        arena.get_mut(a).unwrap().translate(Vector3::new(100.0, 0.0, 0.0));
        assert!(close(arena.global_position(child), Vector3::new(0.0, 0.0, 7.0)));

        arena.set_parent(child, None);
        assert!(close(arena.global_position(child), Vector3::zero()));
    }

    #[test]
    fn test_direction_vectors() {
        let mut transform = Transform::default();
        assert!(close(transform.forward(), Vector3::unit_z()));
        assert!(close(transform.up(), Vector3::unit_y()));
        assert!(close(transform.left(), Vector3::unit_x()));

        transform.set_rotation(Vector3::new(0.0, FRAC_PI_2, 0.0));
        assert!(close(transform.forward(), Vector3::unit_x()));
        assert!(close(transform.up(), Vector3::unit_y()));
    }

    #[test]
    fn test_directions_are_unit_under_non_uniform_scale() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let mut transform = random_transform(&mut rng);
            transform.set_scale(Vector3::new(5.0, 0.2, 1.3));
            for axis in [transform.forward(), transform.up(), transform.left()] {
                assert!((axis.magnitude() - 1.0).abs() < 1e-4);
            }
            assert!(transform.forward().dot(transform.up()).abs() < 1e-4);
            assert!(transform.forward().dot(transform.left()).abs() < 1e-4);
        }
    }

    #[test]
    fn test_pitch_applies_before_yaw() {
        // Pitching down then yawing keeps the camera's forward tilted below the horizon
        let transform = Transform::new(
            Vector3::zero(),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.5, FRAC_PI_2, 0.0),
        );
        let forward = transform.forward();
        assert!(forward.y < 0.0);
        assert!(forward.z.abs() < 1e-5);
    }
}
