//! Autodesk FBX decoding, binary encoding only
//!
//! Objects are linked by the `Connections` section: `OO` links an object to
//! its parent object, `OP` links it to a named property of the parent.
//! Models connected to nothing but the scene root become the top-level
//! children of the decoded root.

pub mod binary;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use self::binary::{object_name, FbxDocument, FbxNode, Property};
use super::DecodedAsset;
use crate::animation::{AnimationClip, Interpolation, Track, TrackProperty};
use crate::error::DecodeError;
use crate::fetch::ResourceFetcher;
use crate::manifest::file_stem;
use crate::scene::{
    AlphaMode, Material, Mesh, MeshBinding, MeshPrimitive, PrimitiveType, SceneNode, Skin,
    Transform, Vertex,
};

/// FBX time units per second
const TICKS_PER_SECOND: f64 = 46_186_158_000.0;

/// Seconds from `from` to `to`; FBX times are arbitrary file values, so
/// the difference is taken in `f64` where it cannot overflow
fn seconds_between(from: i64, to: i64) -> f32 {
    ((to as f64 - from as f64) / TICKS_PER_SECOND) as f32
}

/// Fetch and decode a binary FBX resource
pub async fn decode<F: ResourceFetcher + ?Sized>(
    fetcher: &F,
    path: &str,
) -> Result<DecodedAsset, DecodeError> {
    let bytes = fetcher
        .fetch(path)
        .await
        .map_err(|e| DecodeError::fetch(path, e))?;
    let document = binary::parse(&bytes).map_err(|e| fbx_error(path, e))?;
    log::debug!(
        "Parsed {path}: FBX {} with {} top-level records",
        document.version,
        document.nodes.len()
    );

    let mut builder = SceneBuilder::new(&document, path);
    let root = builder.build_scene(file_stem(path))?;
    let animations = builder
        .read_animations()
        .into_iter()
        .map(Arc::new)
        .collect();

    Ok(DecodedAsset::new(root, animations))
}

fn fbx_error(path: &str, reason: impl ToString) -> DecodeError {
    DecodeError::Fbx {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

struct Connection<'a> {
    child: i64,
    parent: i64,
    property: Option<&'a str>,
}

/// The `Objects` section indexed by id, plus its connections
struct Objects<'a> {
    nodes: HashMap<i64, &'a FbxNode>,
    order: Vec<i64>,
    connections: Vec<Connection<'a>>,
}

impl<'a> Objects<'a> {
    fn new(document: &'a FbxDocument) -> Self {
        let mut nodes = HashMap::new();
        let mut order = Vec::new();
        if let Some(objects) = document.node("Objects") {
            for node in &objects.children {
                if let Some(id) = node.property(0).and_then(Property::as_i64) {
                    nodes.insert(id, node);
                    order.push(id);
                }
            }
        }

        let connections = document
            .node("Connections")
            .map(|section| {
                section
                    .children_named("C")
                    .filter_map(|c| {
                        let kind = c.property(0)?.as_str()?;
                        let child = c.property(1)?.as_i64()?;
                        let parent = c.property(2)?.as_i64()?;
                        let property = match kind {
                            "OP" => c.property(3).and_then(Property::as_str),
                            _ => None,
                        };
                        Some(Connection {
                            child,
                            parent,
                            property,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            nodes,
            order,
            connections,
        }
    }

    fn get(&self, id: i64) -> Option<&'a FbxNode> {
        self.nodes.get(&id).copied()
    }

    fn class(&self, id: i64) -> Option<&'a str> {
        self.get(id).map(|node| node.name.as_str())
    }

    fn subclass(&self, id: i64) -> Option<&'a str> {
        self.get(id)?.property(2)?.as_str()
    }

    /// Object ids of `class`, in file order
    fn of_class<'s>(&'s self, class: &'s str) -> impl Iterator<Item = i64> + 's {
        self.order
            .iter()
            .copied()
            .filter(move |&id| self.class(id) == Some(class))
    }

    fn parents<'s>(&'s self, child: i64) -> impl Iterator<Item = &'s Connection<'a>> + 's {
        self.connections.iter().filter(move |c| c.child == child)
    }

    fn children<'s>(&'s self, parent: i64) -> impl Iterator<Item = &'s Connection<'a>> + 's {
        self.connections.iter().filter(move |c| c.parent == parent)
    }

    /// Ids of `class` objects connected below `parent`, in connection order
    fn children_of_class<'s>(
        &'s self,
        parent: i64,
        class: &'s str,
    ) -> impl Iterator<Item = i64> + 's {
        self.children(parent)
            .map(|c| c.child)
            .filter(move |&id| self.class(id) == Some(class))
    }

    fn name(&self, id: i64) -> String {
        let class = self.class(id).unwrap_or("Object");
        match self
            .get(id)
            .and_then(|node| node.property(1))
            .and_then(Property::as_str)
            .map(object_name)
        {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}_{id}", class.to_ascii_lowercase()),
        }
    }
}

/// The `P` entry called `name` in a node's `Properties70`
fn p70<'a>(node: &'a FbxNode, name: &str) -> Option<&'a FbxNode> {
    node.child("Properties70")?
        .children_named("P")
        .find(|p| p.property(0).and_then(Property::as_str) == Some(name))
}

fn p70_f64(node: &FbxNode, name: &str) -> Option<f64> {
    p70(node, name)?.property(4)?.as_f64()
}

fn p70_i64(node: &FbxNode, name: &str) -> Option<i64> {
    p70(node, name)?.property(4)?.as_i64()
}

fn p70_vec3(node: &FbxNode, name: &str) -> Option<Vec3> {
    let p = p70(node, name)?;
    Some(Vec3::new(
        p.property(4)?.as_f64()? as f32,
        p.property(5)?.as_f64()? as f32,
        p.property(6)?.as_f64()? as f32,
    ))
}

/// Euler XYZ angles in degrees, X applied first
fn euler_xyz(degrees: Vec3) -> Quat {
    let radians = degrees * (std::f32::consts::PI / 180.0);
    Quat::from_rotation_z(radians.z)
        * Quat::from_rotation_y(radians.y)
        * Quat::from_rotation_x(radians.x)
}

fn pre_rotation(model: &FbxNode) -> Quat {
    p70_vec3(model, "PreRotation").map_or(Quat::IDENTITY, euler_xyz)
}

fn model_transform(model: &FbxNode) -> Transform {
    let rotation = p70_vec3(model, "Lcl Rotation").unwrap_or(Vec3::ZERO);
    Transform {
        translation: p70_vec3(model, "Lcl Translation").unwrap_or(Vec3::ZERO),
        rotation: pre_rotation(model) * euler_xyz(rotation),
        scale: p70_vec3(model, "Lcl Scaling").unwrap_or(Vec3::ONE),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mapping {
    PolygonVertex,
    ControlPoint,
    Polygon,
    AllSame,
}

impl Mapping {
    fn read(layer: &FbxNode) -> Self {
        match layer
            .child_value("MappingInformationType")
            .and_then(Property::as_str)
        {
            Some("ByPolygonVertex") => Self::PolygonVertex,
            Some("ByPolygon") => Self::Polygon,
            Some("AllSame") => Self::AllSame,
            _ => Self::ControlPoint,
        }
    }

    fn slot(&self, polygon_vertex: usize, control_point: usize, polygon: usize) -> usize {
        match self {
            Self::PolygonVertex => polygon_vertex,
            Self::ControlPoint => control_point,
            Self::Polygon => polygon,
            Self::AllSame => 0,
        }
    }
}

/// A per-vertex attribute layer such as normals or UVs
struct LayerElement {
    mapping: Mapping,
    values: Vec<f64>,
    indices: Option<Vec<i32>>,
    components: usize,
}

impl LayerElement {
    fn read(
        geometry: &FbxNode,
        layer: &str,
        values: &str,
        index: &str,
        components: usize,
    ) -> Option<Self> {
        let layer = geometry.child(layer)?;
        let values = layer.child_value(values)?.to_f64_vec()?;
        let indexed = matches!(
            layer
                .child_value("ReferenceInformationType")
                .and_then(Property::as_str),
            Some("IndexToDirect" | "Index")
        );
        let indices = if indexed {
            layer
                .child_value(index)
                .and_then(Property::as_i32_array)
                .map(<[i32]>::to_vec)
        } else {
            None
        };

        Some(Self {
            mapping: Mapping::read(layer),
            values,
            indices,
            components,
        })
    }

    fn get(&self, polygon_vertex: usize, control_point: usize, polygon: usize) -> Option<&[f64]> {
        let mut slot = self.mapping.slot(polygon_vertex, control_point, polygon);
        if let Some(indices) = &self.indices {
            slot = usize::try_from(*indices.get(slot)?).ok()?;
        }
        self.values
            .get(slot * self.components..(slot + 1) * self.components)
    }
}

/// Per-polygon material slots from `LayerElementMaterial`
fn material_slot(geometry: &FbxNode, polygon: usize) -> usize {
    let Some(layer) = geometry.child("LayerElementMaterial") else {
        return 0;
    };
    let Some(slots) = layer
        .child_value("Materials")
        .and_then(Property::as_i32_array)
    else {
        return 0;
    };
    let slot = match Mapping::read(layer) {
        Mapping::Polygon => slots.get(polygon),
        _ => slots.first(),
    };
    slot.and_then(|&s| usize::try_from(s).ok()).unwrap_or(0)
}

/// Keyframes of one animated axis
struct Curve {
    times: Vec<i64>,
    values: Vec<f32>,
}

impl Curve {
    fn read(node: &FbxNode) -> Option<Self> {
        let times = node.child_value("KeyTime")?.as_i64_array()?.to_vec();
        let values = node.child_value("KeyValueFloat")?.to_f32_vec()?;
        (!times.is_empty() && values.len() >= times.len()).then_some(Self { times, values })
    }

    /// Linearly interpolated value at `time`, clamped to the key range
    fn sample(&self, time: i64) -> f32 {
        match self.times.binary_search(&time) {
            Ok(i) => self.values[i],
            Err(0) => self.values[0],
            Err(i) if i >= self.times.len() => self.values[self.times.len() - 1],
            Err(i) => {
                let (t0, t1) = (self.times[i - 1], self.times[i]);
                let alpha = (time as f64 - t0 as f64) / (t1 as f64 - t0 as f64);
                let (v0, v1) = (self.values[i - 1], self.values[i]);
                v0 + (v1 - v0) * alpha as f32
            }
        }
    }
}

struct SceneBuilder<'a> {
    objects: Objects<'a>,
    path: &'a str,
    meshes: HashMap<i64, Vec<(usize, Arc<Mesh>)>>,
    materials: HashMap<i64, Arc<Material>>,
}

impl<'a> SceneBuilder<'a> {
    fn new(document: &'a FbxDocument, path: &'a str) -> Self {
        Self {
            objects: Objects::new(document),
            path,
            meshes: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    fn build_scene(&mut self, name: &str) -> Result<SceneNode, DecodeError> {
        let top_level: Vec<i64> = self
            .objects
            .of_class("Model")
            .filter(|&id| {
                !self
                    .objects
                    .parents(id)
                    .any(|c| self.objects.class(c.parent) == Some("Model"))
            })
            .collect();

        let mut root = SceneNode::group(name);
        let mut visited = HashSet::new();
        for id in top_level {
            visited.insert(id);
            root.add_child(self.build_model(id, &mut visited)?);
        }
        Ok(root)
    }

    fn build_model(&mut self, id: i64, visited: &mut HashSet<i64>) -> Result<SceneNode, DecodeError> {
        let name = self.objects.name(id);
        let transform = self
            .objects
            .get(id)
            .map(model_transform)
            .unwrap_or_default();

        let geometry = self.objects.children_of_class(id, "Geometry").next();
        let mut node = match geometry {
            Some(geometry) => {
                let binding = self.mesh_binding(id, geometry)?;
                SceneNode::mesh(name, binding)
            }
            None => SceneNode::group(name),
        };
        node.transform = transform;

        let children: Vec<i64> = self.objects.children_of_class(id, "Model").collect();
        for child in children {
            if visited.insert(child) {
                node.add_child(self.build_model(child, visited)?);
            }
        }
        Ok(node)
    }

    fn mesh_binding(&mut self, model: i64, geometry: i64) -> Result<MeshBinding, DecodeError> {
        if !self.meshes.contains_key(&geometry) {
            let meshes = match self.objects.get(geometry) {
                Some(node) => self.read_geometry(geometry, node)?,
                None => Vec::new(),
            };
            self.meshes.insert(geometry, meshes);
        }

        let materials: Vec<i64> = self.objects.children_of_class(model, "Material").collect();
        let materials: Vec<Arc<Material>> = materials
            .into_iter()
            .map(|id| self.material(id))
            .collect();

        let primitives = self
            .meshes
            .get(&geometry)
            .map(|meshes| {
                meshes
                    .iter()
                    .map(|(slot, mesh)| MeshPrimitive {
                        mesh: mesh.clone(),
                        material: materials.get(*slot).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(MeshBinding {
            primitives,
            skin: self.read_skin(geometry),
        })
    }

    /// Triangle meshes of a geometry object, one per material slot
    fn read_geometry(&self, id: i64, geometry: &FbxNode) -> Result<Vec<(usize, Arc<Mesh>)>, DecodeError> {
        let name = self.objects.name(id);
        let Some(control_points) = geometry.child_value("Vertices").and_then(Property::to_f64_vec)
        else {
            log::debug!("Geometry {name} in {} has no vertices", self.path);
            return Ok(Vec::new());
        };
        let polygon_indices = geometry
            .child_value("PolygonVertexIndex")
            .and_then(Property::as_i32_array)
            .ok_or_else(|| fbx_error(self.path, format!("geometry {name} has no polygons")))?;

        let control_points: Vec<[f32; 3]> = control_points
            .chunks_exact(3)
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        let normals = LayerElement::read(geometry, "LayerElementNormal", "Normals", "NormalsIndex", 3);
        let uvs = LayerElement::read(geometry, "LayerElementUV", "UV", "UVIndex", 2);

        let mut vertices = Vec::with_capacity(polygon_indices.len());
        let mut slots: BTreeMap<usize, Vec<u32>> = BTreeMap::new();
        let mut polygon = Vec::new();
        let mut polygon_index = 0;

        // One vertex per polygon corner; a negative index closes a polygon
        for (polygon_vertex, &raw) in polygon_indices.iter().enumerate() {
            let closes = raw < 0;
            let control_point = (if closes { !raw } else { raw }) as usize;
            let position = *control_points.get(control_point).ok_or_else(|| {
                fbx_error(
                    self.path,
                    format!("geometry {name} references missing control point {control_point}"),
                )
            })?;

            let defaults = Vertex::default();
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(polygon_vertex, control_point, polygon_index))
                .map_or(defaults.normal, |n| [n[0] as f32, n[1] as f32, n[2] as f32]);
            let uv = uvs
                .as_ref()
                .and_then(|uv| uv.get(polygon_vertex, control_point, polygon_index))
                .map_or(defaults.uv, |uv| [uv[0] as f32, uv[1] as f32]);

            polygon.push(vertices.len() as u32);
            vertices.push(Vertex {
                position,
                normal,
                uv,
                ..defaults
            });

            if closes {
                let indices = slots
                    .entry(material_slot(geometry, polygon_index))
                    .or_default();
                for i in 1..polygon.len().saturating_sub(1) {
                    indices.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
                }
                polygon.clear();
                polygon_index += 1;
            }
        }

        if normals.is_none() {
            let positions: Vec<[f32; 3]> = vertices.iter().map(|v| v.position).collect();
            let all: Vec<u32> = slots.values().flatten().copied().collect();
            for (vertex, normal) in vertices
                .iter_mut()
                .zip(crate::scene::smooth_normals(&positions, &all))
            {
                vertex.normal = normal;
            }
        }

        log::debug!(
            "Geometry {name}: {} polygons, {} material slots",
            polygon_index,
            slots.len()
        );

        let count = slots.len();
        let mut meshes = Vec::with_capacity(count);
        for (i, (slot, indices)) in slots.into_iter().enumerate() {
            let vertices = if i + 1 == count {
                std::mem::take(&mut vertices)
            } else {
                vertices.clone()
            };
            meshes.push((
                slot,
                Arc::new(Mesh::new(
                    Some(name.clone()),
                    PrimitiveType::Triangles,
                    vertices,
                    indices,
                )),
            ));
        }
        Ok(meshes)
    }

    fn material(&mut self, id: i64) -> Arc<Material> {
        if let Some(material) = self.materials.get(&id) {
            return material.clone();
        }

        let material = Arc::new(match self.objects.get(id) {
            Some(node) => self.read_material(id, node),
            None => Material::default(),
        });
        self.materials.insert(id, material.clone());
        material
    }

    fn read_material(&self, id: i64, node: &FbxNode) -> Material {
        let diffuse = p70_vec3(node, "DiffuseColor")
            .or_else(|| p70_vec3(node, "Diffuse"))
            .unwrap_or(Vec3::ONE);
        let opacity = p70_f64(node, "Opacity").unwrap_or(1.0) as f32;
        let texture = self
            .objects
            .children(id)
            .filter(|c| c.property == Some("DiffuseColor"))
            .find_map(|c| {
                let texture = self
                    .objects
                    .get(c.child)
                    .filter(|texture| texture.name == "Texture")?;
                texture
                    .child_value("RelativeFilename")
                    .or_else(|| texture.child_value("FileName"))
                    .and_then(Property::as_str)
                    .map(str::to_string)
            });

        Material {
            name: Some(self.objects.name(id)),
            base_color_factor: [diffuse.x, diffuse.y, diffuse.z, opacity],
            base_color_texture: texture,
            emissive_factor: p70_vec3(node, "EmissiveColor")
                .unwrap_or(Vec3::ZERO)
                .to_array(),
            alpha_mode: if opacity < 1.0 {
                AlphaMode::Blend
            } else {
                AlphaMode::Opaque
            },
            ..Material::default()
        }
    }

    /// Skin deformer of a geometry: one joint per cluster
    fn read_skin(&self, geometry: i64) -> Option<Skin> {
        let skin = self
            .objects
            .children_of_class(geometry, "Deformer")
            .find(|&id| self.objects.subclass(id) == Some("Skin"))?;

        let mut joints = Vec::new();
        let mut inverse_bind_matrices = Vec::new();
        for cluster in self.objects.children_of_class(skin, "Deformer") {
            let Some(bone) = self.objects.children_of_class(cluster, "Model").next() else {
                continue;
            };
            let bind = self
                .objects
                .get(cluster)
                .and_then(|node| node.child_value("TransformLink"))
                .and_then(Property::to_f32_vec)
                .filter(|m| m.len() == 16)
                .map_or(Mat4::IDENTITY, |m| Mat4::from_cols_slice(&m).inverse());
            joints.push(self.objects.name(bone));
            inverse_bind_matrices.push(bind);
        }
        Some(Skin {
            joints,
            inverse_bind_matrices,
        })
    }

    fn read_animations(&self) -> Vec<AnimationClip> {
        self.objects
            .of_class("AnimationStack")
            .map(|stack| self.read_stack(stack))
            .collect()
    }

    fn read_stack(&self, stack: i64) -> AnimationClip {
        let node = self.objects.get(stack);
        let time = |local: &str, reference: &str| {
            node.and_then(|n| p70_i64(n, local).or_else(|| p70_i64(n, reference)))
        };
        let start = time("LocalStart", "ReferenceStart").unwrap_or(0);
        let stop = time("LocalStop", "ReferenceStop").unwrap_or(start);

        let mut tracks = Vec::new();
        for layer in self.objects.children_of_class(stack, "AnimationLayer") {
            for curve_node in self.objects.children_of_class(layer, "AnimationCurveNode") {
                if let Some(track) = self.read_curve_node(curve_node, start) {
                    tracks.push(track);
                }
            }
        }

        let name = self.objects.name(stack);
        log::debug!("Animation {name}: {} tracks", tracks.len());
        let mut clip = AnimationClip::from_tracks(name, tracks);
        if stop > start {
            clip.duration = seconds_between(start, stop);
        }
        clip
    }

    /// Track for the model property a curve node drives
    fn read_curve_node(&self, curve_node: i64, start: i64) -> Option<Track> {
        let (model, property) = self.objects.parents(curve_node).find_map(|c| {
            let property = match c.property? {
                "Lcl Translation" => TrackProperty::Translation,
                "Lcl Rotation" => TrackProperty::Rotation,
                "Lcl Scaling" => TrackProperty::Scale,
                _ => return None,
            };
            (self.objects.class(c.parent) == Some("Model")).then_some((c.parent, property))
        })?;
        let model_node = self.objects.get(model)?;

        let fallback = match property {
            TrackProperty::Translation => p70_vec3(model_node, "Lcl Translation"),
            TrackProperty::Rotation => p70_vec3(model_node, "Lcl Rotation"),
            _ => p70_vec3(model_node, "Lcl Scaling"),
        }
        .unwrap_or(if property == TrackProperty::Scale {
            Vec3::ONE
        } else {
            Vec3::ZERO
        });

        let curve_node_object = self.objects.get(curve_node);
        let mut defaults = [0.0f32; 3];
        let mut curves: [Option<Curve>; 3] = [None, None, None];
        for (axis, channel) in ["d|X", "d|Y", "d|Z"].into_iter().enumerate() {
            defaults[axis] = curve_node_object
                .and_then(|n| p70_f64(n, channel))
                .map_or(fallback[axis], |v| v as f32);
            curves[axis] = self
                .objects
                .children(curve_node)
                .filter(|c| c.property == Some(channel))
                .filter(|c| self.objects.class(c.child) == Some("AnimationCurve"))
                .find_map(|c| Curve::read(self.objects.get(c.child)?));
        }

        let mut times: Vec<i64> = curves
            .iter()
            .flatten()
            .flat_map(|curve| curve.times.iter().copied())
            .collect();
        if times.is_empty() {
            return None;
        }
        times.sort_unstable();
        times.dedup();

        let pre = pre_rotation(model_node);
        let mut values = Vec::with_capacity(times.len() * property.components());
        for &time in &times {
            let mut sample = [0.0f32; 3];
            for axis in 0..3 {
                sample[axis] = curves[axis]
                    .as_ref()
                    .map_or(defaults[axis], |curve| curve.sample(time));
            }
            match property {
                TrackProperty::Rotation => {
                    values.extend_from_slice(&(pre * euler_xyz(Vec3::from(sample))).to_array())
                }
                _ => values.extend_from_slice(&sample),
            }
        }

        Some(Track {
            target: self.objects.name(model),
            property,
            interpolation: Interpolation::Linear,
            times: times
                .into_iter()
                .map(|t| seconds_between(start, t))
                .collect(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::binary::writer::encode;
    use super::*;
    use crate::fetch::MockFetcher;
    use futures::executor::block_on;

    const SECOND: i64 = 46_186_158_000;

    fn s(value: &str) -> Property {
        Property::String(value.to_string())
    }

    fn p(name: &str, values: Vec<Property>) -> FbxNode {
        let mut properties = vec![s(name), s(""), s(""), s("A")];
        properties.extend(values);
        FbxNode::new("P", properties)
    }

    fn p_vec3(name: &str, v: [f64; 3]) -> FbxNode {
        p(name, v.iter().map(|&x| Property::F64(x)).collect())
    }

    fn object(class: &str, id: i64, name: &str, subclass: &str, children: Vec<FbxNode>) -> FbxNode {
        FbxNode::new(
            class,
            vec![
                Property::I64(id),
                s(&format!("{name}\u{0}\u{1}{class}")),
                s(subclass),
            ],
        )
        .with_children(children)
    }

    fn properties(entries: Vec<FbxNode>) -> FbxNode {
        FbxNode::new("Properties70", vec![]).with_children(entries)
    }

    fn oo(child: i64, parent: i64) -> FbxNode {
        FbxNode::new("C", vec![s("OO"), Property::I64(child), Property::I64(parent)])
    }

    fn op(child: i64, parent: i64, property: &str) -> FbxNode {
        FbxNode::new(
            "C",
            vec![s("OP"), Property::I64(child), Property::I64(parent), s(property)],
        )
    }

    fn value(name: &str, property: Property) -> FbxNode {
        FbxNode::new(name, vec![property])
    }

    /// A rig with a quad mesh under a root null, two materials, a skin
    /// and a one second animation of the root's X translation
    fn scene() -> Vec<FbxNode> {
        let objects = vec![
            object(
                "Model",
                10,
                "Rig",
                "Null",
                vec![properties(vec![
                    p_vec3("Lcl Translation", [1.0, 2.0, 3.0]),
                    p_vec3("Lcl Rotation", [0.0, 0.0, 90.0]),
                ])],
            ),
            object(
                "Model",
                11,
                "Body",
                "Mesh",
                vec![properties(vec![p_vec3("Lcl Scaling", [2.0, 2.0, 2.0])])],
            ),
            object(
                "Geometry",
                20,
                "BodyShape",
                "Mesh",
                vec![
                    value(
                        "Vertices",
                        Property::F64Array(vec![
                            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
                            1.0,
                        ]),
                    ),
                    // A quad and a triangle
                    value("PolygonVertexIndex", Property::I32Array(vec![0, 1, 2, -4, 0, 1, -5])),
                    FbxNode::new("LayerElementMaterial", vec![Property::I32(0)]).with_children(
                        vec![
                            value("MappingInformationType", s("ByPolygon")),
                            value("ReferenceInformationType", s("IndexToDirect")),
                            value("Materials", Property::I32Array(vec![0, 1])),
                        ],
                    ),
                ],
            ),
            object(
                "Material",
                30,
                "Skin",
                "",
                vec![properties(vec![p_vec3("DiffuseColor", [0.8, 0.5, 0.25])])],
            ),
            object(
                "Material",
                31,
                "Glass",
                "",
                vec![properties(vec![
                    p_vec3("DiffuseColor", [0.0, 0.0, 1.0]),
                    p("Opacity", vec![Property::F64(0.5)]),
                ])],
            ),
            object(
                "Texture",
                32,
                "SkinTexture",
                "",
                vec![value("RelativeFilename", s("textures/skin.png"))],
            ),
            object("Deformer", 40, "BodySkin", "Skin", vec![]),
            object(
                "Deformer",
                41,
                "RigCluster",
                "Cluster",
                vec![value(
                    "TransformLink",
                    Property::F64Array(vec![
                        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 2.0, 3.0,
                        1.0,
                    ]),
                )],
            ),
            object(
                "AnimationStack",
                50,
                "Wave",
                "",
                vec![properties(vec![
                    p("LocalStart", vec![Property::I64(0)]),
                    p("LocalStop", vec![Property::I64(2 * SECOND)]),
                ])],
            ),
            object("AnimationLayer", 51, "BaseLayer", "", vec![]),
            object(
                "AnimationCurveNode",
                52,
                "T",
                "",
                vec![properties(vec![
                    p("d|X", vec![Property::F64(1.0)]),
                    p("d|Y", vec![Property::F64(2.0)]),
                    p("d|Z", vec![Property::F64(3.0)]),
                ])],
            ),
            object(
                "AnimationCurve",
                53,
                "",
                "",
                vec![
                    value("KeyTime", Property::I64Array(vec![0, SECOND])),
                    value("KeyValueFloat", Property::F32Array(vec![1.0, 5.0])),
                ],
            ),
        ];

        let connections = vec![
            oo(10, 0),
            oo(11, 10),
            oo(20, 11),
            oo(30, 11),
            oo(31, 11),
            op(32, 30, "DiffuseColor"),
            oo(40, 20),
            oo(41, 40),
            oo(10, 41),
            oo(51, 50),
            oo(52, 51),
            op(52, 10, "Lcl Translation"),
            op(53, 52, "d|X"),
        ];

        vec![
            FbxNode::new("Objects", vec![]).with_children(objects),
            FbxNode::new("Connections", vec![]).with_children(connections),
        ]
    }

    fn decode_scene(version: u32, compress: bool) -> DecodedAsset {
        let fetcher =
            MockFetcher::new().with_resource("chars/rig.fbx", encode(version, &scene(), compress));
        block_on(decode(&fetcher, "chars/rig.fbx")).unwrap()
    }

    #[test]
    fn test_model_hierarchy_and_transforms() {
        let asset = decode_scene(7400, false);
        assert_eq!(asset.root.name, "rig");
        assert_eq!(asset.root.children.len(), 1);

        let rig = &asset.root.children[0];
        assert_eq!(rig.name, "Rig");
        assert_eq!(rig.transform.translation, Vec3::new(1.0, 2.0, 3.0));
        let rotated = rig.transform.rotation * Vec3::X;
        assert!((rotated - Vec3::Y).length() < 1e-5);

        assert_eq!(rig.children.len(), 1);
        assert_eq!(rig.children[0].name, "Body");
        assert_eq!(rig.children[0].transform.scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_geometry_split_by_material() {
        let asset = decode_scene(7500, true);
        let body = asset.root.find("Body").unwrap().mesh_binding().unwrap();
        assert_eq!(body.primitives.len(), 2);

        let quad = &body.primitives[0];
        assert_eq!(quad.mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(quad.mesh.vertex_count(), 7);
        let skin = quad.material.as_ref().unwrap();
        assert_eq!(skin.name.as_deref(), Some("Skin"));
        assert_eq!(skin.base_color_factor, [0.8, 0.5, 0.25, 1.0]);
        assert_eq!(skin.base_color_texture.as_deref(), Some("textures/skin.png"));

        let triangle = &body.primitives[1];
        assert_eq!(triangle.mesh.indices, vec![4, 5, 6]);
        let glass = triangle.material.as_ref().unwrap();
        assert_eq!(glass.alpha_mode, AlphaMode::Blend);
        assert_eq!(glass.base_color_factor[3], 0.5);

        // Flat quad in the XY plane gets +Z normals
        for index in &quad.mesh.indices {
            let normal = Vec3::from(quad.mesh.vertices[*index as usize].normal);
            assert!((normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_skin_joints_by_name() {
        let asset = decode_scene(7400, false);
        let skin = asset
            .root
            .find("Body")
            .unwrap()
            .mesh_binding()
            .unwrap()
            .skin
            .clone()
            .unwrap();
        assert_eq!(skin.joints, vec!["Rig".to_string()]);
        let origin = skin.inverse_bind_matrices[0].transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!(origin.length() < 1e-5);
    }

    #[test]
    fn test_animation_stack_becomes_clip() {
        let asset = decode_scene(7400, false);
        assert_eq!(asset.animations.len(), 1);
        assert!(Arc::ptr_eq(&asset.animations[0], &asset.root.animations[0]));

        let clip = &asset.animations[0];
        assert_eq!(clip.name, "Wave");
        assert!((clip.duration - 2.0).abs() < 1e-6);
        assert_eq!(clip.tracks.len(), 1);

        let track = &clip.tracks[0];
        assert_eq!(track.target, "Rig");
        assert_eq!(track.property, TrackProperty::Translation);
        assert_eq!(track.times, vec![0.0, 1.0]);
        // Unanimated axes hold the curve node defaults
        assert_eq!(track.values, vec![1.0, 2.0, 3.0, 5.0, 2.0, 3.0]);
    }

    #[test]
    fn test_ascii_fbx_is_rejected() {
        let fetcher = MockFetcher::new().with_resource(
            "chars/rig.fbx",
            "; FBX 7.4.0 project file\nFBXHeaderExtension:  {\n}\n",
        );
        let err = block_on(decode(&fetcher, "chars/rig.fbx")).unwrap_err();
        assert!(matches!(err, DecodeError::Fbx { ref reason, .. } if reason.contains("ASCII")));
    }

    #[test]
    fn test_out_of_range_polygon_index() {
        let objects = vec![
            object("Model", 1, "Broken", "Mesh", vec![]),
            object(
                "Geometry",
                2,
                "BrokenShape",
                "Mesh",
                vec![
                    value("Vertices", Property::F64Array(vec![0.0; 9])),
                    value("PolygonVertexIndex", Property::I32Array(vec![0, 1, -10])),
                ],
            ),
        ];
        let nodes = vec![
            FbxNode::new("Objects", vec![]).with_children(objects),
            FbxNode::new("Connections", vec![]).with_children(vec![oo(1, 0), oo(2, 1)]),
        ];
        let fetcher = MockFetcher::new().with_resource("broken.fbx", encode(7400, &nodes, false));
        let err = block_on(decode(&fetcher, "broken.fbx")).unwrap_err();
        assert!(matches!(err, DecodeError::Fbx { .. }));
    }

    #[test]
    fn test_curve_sampling() {
        let curve = Curve {
            times: vec![0, 10, 20],
            values: vec![0.0, 1.0, 3.0],
        };
        assert_eq!(curve.sample(-5), 0.0);
        assert_eq!(curve.sample(5), 0.5);
        assert_eq!(curve.sample(10), 1.0);
        assert_eq!(curve.sample(15), 2.0);
        assert_eq!(curve.sample(30), 3.0);
    }

    #[test]
    fn test_curve_sampling_across_full_time_range() {
        let curve = Curve {
            times: vec![i64::MIN, i64::MAX],
            values: vec![0.0, 2.0],
        };
        assert!((curve.sample(0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_extreme_animation_times_do_not_overflow() {
        let objects = vec![
            object("Model", 10, "Rig", "Null", vec![]),
            object(
                "AnimationStack",
                50,
                "Forever",
                "",
                vec![properties(vec![
                    p("LocalStart", vec![Property::I64(-2)]),
                    p("LocalStop", vec![Property::I64(i64::MAX)]),
                ])],
            ),
            object("AnimationLayer", 51, "BaseLayer", "", vec![]),
            object("AnimationCurveNode", 52, "T", "", vec![]),
            object(
                "AnimationCurve",
                53,
                "",
                "",
                vec![
                    value("KeyTime", Property::I64Array(vec![i64::MIN, 0, i64::MAX])),
                    value("KeyValueFloat", Property::F32Array(vec![0.0, 1.0, 2.0])),
                ],
            ),
        ];
        let connections = vec![
            oo(10, 0),
            oo(51, 50),
            oo(52, 51),
            op(52, 10, "Lcl Translation"),
            op(53, 52, "d|X"),
        ];
        let nodes = vec![
            FbxNode::new("Objects", vec![]).with_children(objects),
            FbxNode::new("Connections", vec![]).with_children(connections),
        ];
        let fetcher = MockFetcher::new().with_resource("forever.fbx", encode(7400, &nodes, false));
        let asset = block_on(decode(&fetcher, "forever.fbx")).unwrap();

        let clip = &asset.animations[0];
        assert!(clip.duration.is_finite() && clip.duration > 0.0);
        let track = &clip.tracks[0];
        assert_eq!(track.times.len(), 3);
        assert!(track.times.iter().all(|t| t.is_finite()));
        assert!(track.times[0] < 0.0 && track.times[2] > 0.0);
    }

    #[test]
    fn test_unnamed_objects_get_class_names() {
        let nodes = vec![
            FbxNode::new("Objects", vec![])
                .with_children(vec![object("Model", 7, "", "Null", vec![])]),
            FbxNode::new("Connections", vec![]).with_children(vec![oo(7, 0)]),
        ];
        let fetcher = MockFetcher::new().with_resource("empty.fbx", encode(7400, &nodes, false));
        let asset = block_on(decode(&fetcher, "empty.fbx")).unwrap();
        assert_eq!(asset.root.children[0].name, "model_7");
        assert!(asset.animations.is_empty());
    }
}
