//! glTF/GLB decoding
//!
//! The default scene becomes a group root whose children are the scene's
//! top-level nodes. Buffers come from the GLB binary chunk, base64 data
//! URIs, or files next to the model fetched through the same fetcher.

use std::sync::Arc;

use ::gltf::animation::util::ReadOutputs;
use ::gltf::Gltf;
use base64::Engine;
use glam::{Mat4, Quat, Vec3};

use super::DecodedAsset;
use crate::animation::{AnimationClip, Interpolation, Track, TrackProperty};
use crate::error::DecodeError;
use crate::fetch::ResourceFetcher;
use crate::manifest::base_directory;
use crate::scene::{
    AlphaMode, Material, Mesh, MeshBinding, MeshPrimitive, PrimitiveType, SceneNode, Skin,
    Transform, Vertex,
};

/// Fetch and decode a glTF or GLB resource
pub async fn decode<F: ResourceFetcher + ?Sized>(
    fetcher: &F,
    path: &str,
) -> Result<DecodedAsset, DecodeError> {
    let bytes = fetcher
        .fetch(path)
        .await
        .map_err(|e| DecodeError::fetch(path, e))?;
    let Gltf { document, blob } = Gltf::from_slice(&bytes).map_err(|source| DecodeError::Gltf {
        path: path.to_string(),
        source,
    })?;

    let buffers = load_buffers(fetcher, path, &document, blob).await?;

    log::debug!(
        "Parsed {path}: {} nodes, {} meshes, {} materials, {} animations",
        document.nodes().len(),
        document.meshes().len(),
        document.materials().len(),
        document.animations().len()
    );

    let materials: Vec<Arc<Material>> = document
        .materials()
        .map(|material| Arc::new(read_material(&material)))
        .collect();
    let default_material = Arc::new(Material::default());

    let meshes = document
        .meshes()
        .map(|mesh| read_mesh(path, &mesh, &buffers, &materials, &default_material))
        .collect::<Result<Vec<_>, _>>()?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    let mut root = SceneNode::group(
        scene
            .as_ref()
            .and_then(|s| s.name())
            .unwrap_or("Scene")
            .to_string(),
    );
    if let Some(scene) = &scene {
        for node in scene.nodes() {
            root.add_child(build_node(&node, &meshes, &buffers));
        }
    }

    let animations = document
        .animations()
        .map(|animation| read_animation(path, &animation, &buffers).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodedAsset::new(root, animations))
}

async fn load_buffers<F: ResourceFetcher + ?Sized>(
    fetcher: &F,
    path: &str,
    document: &::gltf::Document,
    mut blob: Option<Vec<u8>>,
) -> Result<Vec<Vec<u8>>, DecodeError> {
    let directory = base_directory(path);
    let mut buffers = Vec::with_capacity(document.buffers().len());

    for buffer in document.buffers() {
        let data = match buffer.source() {
            ::gltf::buffer::Source::Bin => blob
                .take()
                .ok_or_else(|| DecodeError::invalid(path, "GLB binary chunk is missing"))?,
            ::gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                decode_data_uri(path, uri)?
            }
            ::gltf::buffer::Source::Uri(uri) => {
                let buffer_path = format!("{directory}{uri}");
                fetcher
                    .fetch(&buffer_path)
                    .await
                    .map_err(|e| DecodeError::fetch(&buffer_path, e))?
            }
        };

        if data.len() < buffer.length() {
            return Err(DecodeError::invalid(
                path,
                format!(
                    "buffer {} holds {} bytes, {} declared",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                ),
            ));
        }
        buffers.push(data);
    }

    Ok(buffers)
}

fn decode_data_uri(path: &str, uri: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = uri
        .split_once(";base64,")
        .map(|(_, payload)| payload)
        .ok_or_else(|| DecodeError::invalid(path, "only base64 data URIs are supported"))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| DecodeError::invalid(path, format!("bad base64 buffer: {e}")))
}

fn node_name(node: &::gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

fn build_node(
    node: &::gltf::Node,
    meshes: &[Vec<MeshPrimitive>],
    buffers: &[Vec<u8>],
) -> SceneNode {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Transform {
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
    };

    let mut scene_node = match node.mesh() {
        Some(mesh) => SceneNode::mesh(
            node_name(node),
            MeshBinding {
                primitives: meshes[mesh.index()].clone(),
                skin: node.skin().map(|skin| read_skin(&skin, buffers)),
            },
        ),
        None => SceneNode::group(node_name(node)),
    };
    scene_node.transform = transform;

    for child in node.children() {
        scene_node.add_child(build_node(&child, meshes, buffers));
    }
    scene_node
}

fn read_skin(skin: &::gltf::Skin, buffers: &[Vec<u8>]) -> Skin {
    let joints: Vec<String> = skin.joints().map(|joint| node_name(&joint)).collect();
    let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let inverse_bind_matrices = match reader.read_inverse_bind_matrices() {
        Some(matrices) => matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect(),
        None => vec![Mat4::IDENTITY; joints.len()],
    };
    Skin {
        joints,
        inverse_bind_matrices,
    }
}

fn read_material(material: &::gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let alpha_mode = match material.alpha_mode() {
        ::gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        ::gltf::material::AlphaMode::Mask => AlphaMode::Mask,
        ::gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    };
    let base_color_texture = pbr.base_color_texture().map(|info| {
        let image = info.texture().source();
        match image.source() {
            ::gltf::image::Source::Uri { uri, .. } => uri.to_string(),
            ::gltf::image::Source::View { .. } => format!("#image{}", image.index()),
        }
    });

    Material {
        name: material.name().map(str::to_string),
        base_color_factor: pbr.base_color_factor(),
        base_color_texture,
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        emissive_factor: material.emissive_factor(),
        alpha_mode,
        alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
        double_sided: material.double_sided(),
    }
}

fn read_mesh(
    path: &str,
    mesh: &::gltf::Mesh,
    buffers: &[Vec<u8>],
    materials: &[Arc<Material>],
    default_material: &Arc<Material>,
) -> Result<Vec<MeshPrimitive>, DecodeError> {
    let name = mesh.name().map(str::to_string);
    mesh.primitives()
        .map(|primitive| {
            let material = match primitive.material().index() {
                Some(index) => materials.get(index).cloned(),
                None => Some(default_material.clone()),
            };
            let mesh = read_primitive(path, name.clone(), &primitive, buffers)?;
            Ok(MeshPrimitive {
                mesh: Arc::new(mesh),
                material,
            })
        })
        .collect()
}

fn read_primitive(
    path: &str,
    name: Option<String>,
    primitive: &::gltf::Primitive,
    buffers: &[Vec<u8>],
) -> Result<Mesh, DecodeError> {
    let primitive_type = match primitive.mode() {
        ::gltf::mesh::Mode::Points => PrimitiveType::Points,
        ::gltf::mesh::Mode::Lines => PrimitiveType::Lines,
        ::gltf::mesh::Mode::LineLoop => {
            log::warn!("Line loop primitive mode is not supported, converting to line strip");
            PrimitiveType::LineStrip
        }
        ::gltf::mesh::Mode::LineStrip => PrimitiveType::LineStrip,
        ::gltf::mesh::Mode::Triangles => PrimitiveType::Triangles,
        ::gltf::mesh::Mode::TriangleStrip => PrimitiveType::TriangleStrip,
        ::gltf::mesh::Mode::TriangleFan => PrimitiveType::TriangleFan,
    };

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| DecodeError::invalid(path, "mesh primitive is missing positions"))?
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(normals) => normals.collect(),
        None => {
            log::debug!("Generating normals for {path}");
            crate::scene::smooth_normals(&positions, &indices)
        }
    };
    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|uvs| uvs.into_f32().collect())
        .unwrap_or_default();
    let tangents: Vec<[f32; 4]> = reader
        .read_tangents()
        .map(|t| t.collect())
        .unwrap_or_default();
    let colors: Vec<[f32; 4]> = reader
        .read_colors(0)
        .map(|c| c.into_rgba_f32().collect())
        .unwrap_or_default();

    let defaults = Vertex::default();
    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| Vertex {
            position,
            normal: normals.get(i).copied().unwrap_or(defaults.normal),
            uv: tex_coords.get(i).copied().unwrap_or(defaults.uv),
            tangent: tangents.get(i).copied().unwrap_or(defaults.tangent),
            color: colors.get(i).copied().unwrap_or(defaults.color),
        })
        .collect();

    Ok(Mesh::new(name, primitive_type, vertices, indices))
}

fn read_animation(
    path: &str,
    animation: &::gltf::Animation,
    buffers: &[Vec<u8>],
) -> Result<AnimationClip, DecodeError> {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));

    let mut tracks = Vec::new();
    for channel in animation.channels() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let times: Vec<f32> = reader
            .read_inputs()
            .ok_or_else(|| DecodeError::invalid(path, format!("animation `{name}` has no inputs")))?
            .collect();
        let (property, values): (TrackProperty, Vec<f32>) = match reader.read_outputs() {
            Some(ReadOutputs::Translations(values)) => {
                (TrackProperty::Translation, values.flatten().collect())
            }
            Some(ReadOutputs::Rotations(values)) => {
                (TrackProperty::Rotation, values.into_f32().flatten().collect())
            }
            Some(ReadOutputs::Scales(values)) => (TrackProperty::Scale, values.flatten().collect()),
            Some(ReadOutputs::MorphTargetWeights(values)) => {
                (TrackProperty::MorphWeights, values.into_f32().collect())
            }
            None => {
                return Err(DecodeError::invalid(
                    path,
                    format!("animation `{name}` has no outputs"),
                ))
            }
        };
        let interpolation = match channel.sampler().interpolation() {
            ::gltf::animation::Interpolation::Linear => Interpolation::Linear,
            ::gltf::animation::Interpolation::Step => Interpolation::Step,
            ::gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        };

        tracks.push(Track {
            target: node_name(&channel.target().node()),
            property,
            interpolation,
            times,
            values,
        });
    }

    Ok(AnimationClip::from_tracks(name, tracks))
}
