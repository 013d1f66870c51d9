//! Scene-graph data model
//!
//! Decoders produce [`SceneNode`] trees; the registry stores one canonical
//! tree per asset name and hands out deep clones of it. Geometry, materials
//! and animation clips are immutable once decoded and are shared between
//! clones through `Arc`; everything an instance may mutate (names,
//! transforms, hierarchy, skins, LOD levels) is owned by each tree.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use crate::animation::AnimationClip;
use crate::lod::LodNode;

/// Topology of a primitive's index list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Alpha blending behaviour of a material
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

/// Interleaved vertex layout produced by every decoder
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Tangent vector (xyz + w handedness)
    pub tangent: [f32; 4],
    /// Vertex color (RGBA)
    pub color: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
            tangent: [1.0, 0.0, 0.0, 1.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl Vertex {
    /// Create a vertex with default tangent and color
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            ..Default::default()
        }
    }
}

/// Metallic-roughness surface description
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    /// Base color factor (RGBA)
    pub base_color_factor: [f32; 4],
    /// URI of the base color image, relative to the model file
    pub base_color_texture: Option<String>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    /// Emissive factor (RGB)
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    /// Alpha cutoff for masked blending
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

/// Immutable geometry shared by every instance of a model
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitive_type: PrimitiveType,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Build a mesh from already-decoded vertices
    pub fn new(
        name: Option<String>,
        primitive_type: PrimitiveType,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    ) -> Self {
        Self {
            name,
            primitive_type,
            vertices,
            indices,
        }
    }

    /// Build a triangle mesh from bare positions, generating smooth normals
    pub fn from_positions(name: Option<String>, positions: &[[f32; 3]], indices: Vec<u32>) -> Self {
        let normals = smooth_normals(positions, &indices);
        let vertices = positions
            .iter()
            .zip(normals)
            .map(|(&position, normal)| Vertex::new(position, normal, [0.0, 0.0]))
            .collect();
        Self::new(name, PrimitiveType::Triangles, vertices, indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Vertex data as raw bytes, ready for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes, ready for upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Generate smooth normals by averaging the face normals around each vertex.
///
/// Out-of-range indices are skipped; vertices touching no valid face get +Z.
pub fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for chunk in indices.chunks_exact(3) {
        let (i0, i1, i2) = (chunk[0] as usize, chunk[1] as usize, chunk[2] as usize);
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            log::warn!("Invalid vertex index while generating normals");
            continue;
        }

        let v0 = Vec3::from(positions[i0]);
        let v1 = Vec3::from(positions[i1]);
        let v2 = Vec3::from(positions[i2]);
        let normal = (v1 - v0).cross(v2 - v0);

        if normal.length_squared() > 1e-12 {
            let normal = normal.normalize();
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }
    }

    normals
        .into_iter()
        .map(|n| {
            if n.length_squared() > 1e-12 {
                n.normalize().to_array()
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}

/// A mesh together with the material it is drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPrimitive {
    pub mesh: Arc<Mesh>,
    pub material: Option<Arc<Material>>,
}

/// Skeleton binding of a skinned mesh.
///
/// Joints are referenced by node name so that a cloned tree binds to its
/// own joints rather than to the canonical tree's. Names are resolved
/// against the nearest enclosing subtree of the skinned node, see
/// [`SceneNode::skin_joints`].
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub joints: Vec<String>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// Meshes attached to a node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshBinding {
    pub primitives: Vec<MeshPrimitive>,
    pub skin: Option<Skin>,
}

/// What a node carries besides its transform and children
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeKind {
    #[default]
    Group,
    Mesh(MeshBinding),
    Lod(LodNode),
}

/// Local TRS transform of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Set the same scale factor on all three axes
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vec3::splat(scale);
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// One node of an owned scene tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneNode {
    /// Node name, used for LOD grouping and named lookups
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
    /// Animation clips carried by this node (set on decoded roots)
    pub animations: Vec<Arc<AnimationClip>>,
}

impl SceneNode {
    /// Create an empty group node
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a node carrying meshes
    pub fn mesh(name: impl Into<String>, binding: MeshBinding) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Mesh(binding),
            ..Default::default()
        }
    }

    /// Add a child, builder style
    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Set the transform, builder style
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// The LOD payload of this node, if it is a LOD node
    pub fn as_lod(&self) -> Option<&LodNode> {
        match &self.kind {
            NodeKind::Lod(lod) => Some(lod),
            _ => None,
        }
    }

    pub fn is_lod(&self) -> bool {
        self.as_lod().is_some()
    }

    /// Mesh binding of this node, if any
    pub fn mesh_binding(&self) -> Option<&MeshBinding> {
        match &self.kind {
            NodeKind::Mesh(binding) => Some(binding),
            _ => None,
        }
    }

    /// Nodes directly below this one: children, then LOD levels
    pub fn descendants_direct(&self) -> impl Iterator<Item = &SceneNode> {
        let levels = self
            .as_lod()
            .map(|lod| lod.levels())
            .unwrap_or_default()
            .iter()
            .map(|level| &level.node);
        self.children.iter().chain(levels)
    }

    /// Depth-first search for a node by exact name, this node included
    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.descendants_direct().find_map(|node| node.find(name))
    }

    /// Mutable variant of [`SceneNode::find`]
    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if self.name == name {
            return Some(self);
        }
        for child in &mut self.children {
            if let Some(found) = child.find_mut(name) {
                return Some(found);
            }
        }
        match &mut self.kind {
            NodeKind::Lod(lod) => lod
                .levels_mut()
                .iter_mut()
                .find_map(|level| level.node.find_mut(name)),
            _ => None,
        }
    }

    /// Chain from `target` up to `self`, both included, matched by identity
    fn lineage<'a>(&'a self, target: &SceneNode) -> Option<Vec<&'a SceneNode>> {
        if std::ptr::eq(self, target) {
            return Some(vec![self]);
        }
        self.descendants_direct().find_map(|node| {
            let mut chain = node.lineage(target)?;
            chain.push(self);
            Some(chain)
        })
    }

    /// Resolve the skin joints of `skinned`, a node inside this tree.
    ///
    /// Each joint name is looked up in the skinned node's own subtree first,
    /// then in each enclosing subtree up to `self`. Two LOD levels that both
    /// carry a `Hips` joint therefore bind to their own skeletons. Joints that
    /// cannot be found, or a `skinned` node outside this tree, yield `None`.
    pub fn skin_joints<'a>(&'a self, skinned: &SceneNode) -> Vec<Option<&'a SceneNode>> {
        let Some(skin) = skinned.mesh_binding().and_then(|b| b.skin.as_ref()) else {
            return Vec::new();
        };
        let scopes = self.lineage(skinned).unwrap_or_default();
        skin.joints
            .iter()
            .map(|joint| scopes.iter().find_map(|&scope| scope.find(joint)))
            .collect()
    }

    /// Visit every node depth-first, parents before children
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a SceneNode)) {
        f(self);
        for node in self.descendants_direct() {
            node.visit(f);
        }
    }

    /// Total number of nodes in this tree
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }

    /// Deep structural copy for use as an independent instance.
    ///
    /// Shared geometry stays shared; the copy can be renamed, moved and
    /// re-parented without affecting `self`.
    pub fn instantiate(&self) -> SceneNode {
        self.clone()
    }
}
