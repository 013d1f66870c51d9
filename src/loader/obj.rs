//! Wavefront OBJ decoding
//!
//! Every OBJ object becomes a mesh child of a group root named after the
//! file stem. Materials come from the `.mtl` file next to the model and are
//! matched to faces by their `usemtl` names, whether or not the OBJ declares
//! a `mtllib`.

use std::io::Cursor;
use std::sync::Arc;

use super::DecodedAsset;
use crate::error::DecodeError;
use crate::fetch::ResourceFetcher;
use crate::manifest::{file_stem, with_extension};
use crate::scene::{
    AlphaMode, Material, Mesh, MeshBinding, MeshPrimitive, PrimitiveType, SceneNode, Vertex,
};

/// Fetch and decode an OBJ resource
pub async fn decode<F: ResourceFetcher + ?Sized>(
    fetcher: &F,
    path: &str,
    companion_materials: bool,
) -> Result<DecodedAsset, DecodeError> {
    let companion = if companion_materials {
        load_companion(fetcher, path).await
    } else {
        None
    };

    let mut bytes = fetcher
        .fetch(path)
        .await
        .map_err(|e| DecodeError::fetch(path, e))?;

    // tobj only consults the material loader on a `mtllib` statement
    if companion.is_some() && !declares_material_library(&bytes) {
        let mut source = format!("mtllib {}.mtl\n", file_stem(path)).into_bytes();
        source.append(&mut bytes);
        bytes = source;
    }

    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, materials) =
        tobj::load_obj_buf(&mut Cursor::new(bytes), &options, |_mtllib| {
            let materials = companion.clone().ok_or(tobj::LoadError::OpenFileFailed)?;
            let names = materials
                .iter()
                .enumerate()
                .map(|(index, material)| (material.name.clone(), index))
                .collect();
            Ok((materials, names))
        })
        .map_err(|source| DecodeError::Obj {
            path: path.to_string(),
            source,
        })?;

    let materials: Vec<Arc<Material>> = match materials {
        Ok(materials) => materials.iter().map(convert_material).map(Arc::new).collect(),
        Err(e) => {
            log::debug!("No materials applied to {path}: {e}");
            Vec::new()
        }
    };

    let mut root = SceneNode::group(file_stem(path));
    for model in models {
        let name = model.name;
        let material = model
            .mesh
            .material_id
            .and_then(|id| materials.get(id).cloned());
        let mesh = convert_mesh(&name, &model.mesh);
        root.add_child(SceneNode::mesh(
            name,
            MeshBinding {
                primitives: vec![MeshPrimitive {
                    mesh: Arc::new(mesh),
                    material,
                }],
                skin: None,
            },
        ));
    }

    log::debug!(
        "Decoded {path}: {} objects, {} materials",
        root.children.len(),
        materials.len()
    );
    Ok(DecodedAsset::new(root, Vec::new()))
}

fn declares_material_library(source: &[u8]) -> bool {
    source.split(|&b| b == b'\n').any(|line| {
        let start = line
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(line.len());
        line[start..].starts_with(b"mtllib")
    })
}

/// Materials from the `.mtl` next to `path`; any failure means no materials
async fn load_companion<F: ResourceFetcher + ?Sized>(
    fetcher: &F,
    path: &str,
) -> Option<Vec<tobj::Material>> {
    let mtl_path = with_extension(path, "mtl");
    let bytes = match fetcher.fetch(&mtl_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("No material library for {path}: {e}");
            return None;
        }
    };
    match tobj::load_mtl_buf(&mut Cursor::new(bytes)) {
        Ok((materials, _)) => Some(materials),
        Err(e) => {
            log::debug!("Ignoring unreadable material library {mtl_path}: {e}");
            None
        }
    }
}

fn convert_material(material: &tobj::Material) -> Material {
    let [r, g, b] = material.diffuse.unwrap_or([1.0, 1.0, 1.0]);
    let alpha = material.dissolve.unwrap_or(1.0);
    Material {
        name: Some(material.name.clone()),
        base_color_factor: [r, g, b, alpha],
        base_color_texture: material.diffuse_texture.clone(),
        alpha_mode: if alpha < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..Material::default()
    }
}

fn convert_mesh(name: &str, mesh: &tobj::Mesh) -> Mesh {
    let positions: Vec<[f32; 3]> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let normals: Vec<[f32; 3]> = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect()
    } else {
        crate::scene::smooth_normals(&positions, &mesh.indices)
    };
    let uvs: Vec<[f32; 2]> = mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect();
    let colors: Vec<[f32; 4]> = mesh
        .vertex_color
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2], 1.0])
        .collect();

    let defaults = Vertex::default();
    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| Vertex {
            position,
            normal: normals.get(i).copied().unwrap_or(defaults.normal),
            uv: uvs.get(i).copied().unwrap_or(defaults.uv),
            tangent: defaults.tangent,
            color: colors.get(i).copied().unwrap_or(defaults.color),
        })
        .collect();

    Mesh::new(
        Some(name.to_string()),
        PrimitiveType::Triangles,
        vertices,
        mesh.indices.clone(),
    )
}
