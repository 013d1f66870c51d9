//! Integration tests for the format decoders

mod common;

use archetype_scene::{
    AlphaMode, AssetError, AssetOptions, DecodeError, Diagnostic, FailurePolicy, FileFetcher,
    MockFetcher, ModelFormat, ModelLoader, ModelRegistry, RegistryConfig, TrackProperty,
};
use futures::executor::block_on;
use glam::Vec3;

use common::{fixtures, init_logging};

#[test]
fn test_gltf_fixture() {
    init_logging();
    let loader = ModelLoader::new(FileFetcher::with_root(fixtures()));
    let asset = block_on(loader.decode_path("models/pine.gltf")).unwrap();

    assert_eq!(asset.root.name, "Pine");
    assert_eq!(asset.root.children.len(), 3);
    assert_eq!(
        asset.root.find("Pine_LOD1").unwrap().transform.translation,
        Vec3::new(0.0, 0.5, 0.0)
    );

    let binding = asset.root.find("Pine_LOD0").unwrap().mesh_binding().unwrap();
    let primitive = &binding.primitives[0];
    assert_eq!(primitive.mesh.vertex_count(), 3);
    let material = primitive.material.as_ref().unwrap();
    assert_eq!(material.name.as_deref(), Some("Bark"));
    assert_eq!(material.metallic_factor, 0.0);

    // All three LOD nodes draw the same mesh
    let lod2 = asset.root.find("Pine_LOD2").unwrap().mesh_binding().unwrap();
    assert!(std::sync::Arc::ptr_eq(&primitive.mesh, &lod2.primitives[0].mesh));

    assert_eq!(asset.animations.len(), 1);
    let sway = &asset.animations[0];
    assert_eq!(sway.name, "Sway");
    assert_eq!(sway.duration, 1.5);
    assert_eq!(sway.tracks[0].target, "Pine_LOD0");
    assert_eq!(sway.tracks[0].property, TrackProperty::Rotation);
    assert_eq!(sway.tracks[0].values.len(), 8);
}

#[test]
fn test_obj_fixture_with_materials() {
    init_logging();
    let loader = ModelLoader::new(FileFetcher::with_root(fixtures()));
    let asset = block_on(loader.decode(ModelFormat::Obj, "models/crate.obj")).unwrap();

    assert_eq!(asset.root.name, "crate");
    assert!(asset.animations.is_empty());

    let lid = asset.root.find("Lid").unwrap().mesh_binding().unwrap();
    let wood = lid.primitives[0].material.as_ref().unwrap();
    assert_eq!(wood.base_color_texture.as_deref(), Some("wood.png"));
    assert_eq!(lid.primitives[0].mesh.vertices[0].normal, [0.0, 1.0, 0.0]);

    let base = asset.root.find("Base").unwrap().mesh_binding().unwrap();
    let metal = base.primitives[0].material.as_ref().unwrap();
    assert_eq!(metal.name.as_deref(), Some("Metal"));
    assert_eq!(metal.alpha_mode, AlphaMode::Blend);
}

#[test]
fn test_obj_without_material_library_still_loads() {
    init_logging();
    let obj = std::fs::read(fixtures().join("models/crate.obj")).unwrap();
    let registry = ModelRegistry::new(MockFetcher::new().with_resource("props/crate.obj", obj));

    let model = block_on(registry.load_model(
        "props/",
        "crate",
        &AssetOptions::default().with_extension("obj"),
    ))
    .unwrap();

    assert_eq!(model.children.len(), 2);
    for child in &model.children {
        assert!(child.mesh_binding().unwrap().primitives[0].material.is_none());
    }
    assert!(registry.diagnostics().is_empty());
}

#[test]
fn test_fbx_fixture() {
    init_logging();
    let registry = ModelRegistry::new(FileFetcher::with_root(fixtures()));
    block_on(registry.load_model(
        "models/",
        "soldier",
        &AssetOptions::default().with_extension("fbx"),
    ))
    .unwrap();

    let soldier = registry.create_model("soldier").unwrap();
    let names: Vec<&str> = soldier.children[0]
        .children
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["Hips", "Body"]);

    let body = soldier.find("Body").unwrap().mesh_binding().unwrap();
    assert_eq!(body.primitives[0].mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    let uniform = body.primitives[0].material.as_ref().unwrap();
    assert_eq!(uniform.name.as_deref(), Some("Uniform"));

    let walk = registry.animations().clip("soldier", "Walk").unwrap();
    assert_eq!(walk.duration, 1.0);
    assert_eq!(walk.tracks[0].target, "Hips");
    assert_eq!(walk.tracks[0].times, vec![0.0, 0.5, 1.0]);
    assert_eq!(
        walk.tracks[0].values,
        vec![0.0, 1.0, 0.0, 0.0, 1.2, 0.0, 0.0, 1.0, 0.0]
    );
}

#[test]
fn test_fbx_failure_propagates_by_default() {
    init_logging();
    let registry =
        ModelRegistry::new(MockFetcher::new().with_resource("chars/ghost.fbx", "not an fbx"));
    let err = block_on(registry.load_model(
        "chars/",
        "ghost",
        &AssetOptions::default().with_extension("fbx"),
    ))
    .unwrap_err();

    assert!(matches!(err, AssetError::Decode(DecodeError::Fbx { .. })));
    assert!(!registry.contains("ghost"));
}

#[test]
fn test_fbx_failure_reported_under_report_policy() {
    init_logging();
    let config = RegistryConfig::default().with_fbx_failures(FailurePolicy::Report);
    let registry = ModelRegistry::with_config(
        MockFetcher::new().with_resource("chars/ghost.fbx", "not an fbx"),
        config,
    );
    let model = block_on(registry.load_model(
        "chars/",
        "ghost",
        &AssetOptions::default().with_extension("fbx"),
    ))
    .unwrap();

    assert_eq!(model.name, "ghost");
    assert!(model.children.is_empty());
    assert!(registry.create_model("ghost").is_some());
    assert!(!registry.animations().contains("ghost"));

    let diagnostics = registry.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(
        &diagnostics[0],
        Diagnostic::DecodeTolerated { asset, .. } if asset == "ghost"
    ));
}

#[test]
fn test_report_policy_does_not_cover_gltf() {
    let config = RegistryConfig::default().with_fbx_failures(FailurePolicy::Report);
    let registry = ModelRegistry::with_config(MockFetcher::new(), config);
    let err = block_on(registry.load_model("trees/", "pine", &AssetOptions::default()))
        .unwrap_err();

    assert!(matches!(err, AssetError::Decode(DecodeError::Fetch { .. })));
    assert!(registry.diagnostics().is_empty());
}

#[test]
fn test_load_without_storage_skips_registry() {
    init_logging();
    let registry = ModelRegistry::new(FileFetcher::with_root(fixtures()));
    let soldier = block_on(registry.load_model_without_storage("models/soldier.fbx")).unwrap();

    assert_eq!(soldier.animations.len(), 1);
    assert!(registry.is_empty());
    assert!(!registry.animations().contains("soldier"));
    assert!(!registry.animations().contains("models/soldier.fbx"));
}
