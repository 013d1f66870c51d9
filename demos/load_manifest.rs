//! Load a manifest from disk and stamp out a few instances of each model.
//!
//! Usage: cargo run --example load_manifest -- [root] [manifest]
//! Defaults to the test fixtures.

use anyhow::Context;
use archetype_scene::{FileFetcher, ModelRegistry};
use futures::executor::block_on;
use glam::Vec3;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let root = args
        .next()
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures").to_string());
    let manifest = args.next().unwrap_or_else(|| "models/models.json".to_string());

    let registry = ModelRegistry::new(FileFetcher::with_root(&root));
    block_on(registry.load_all_from_file(&manifest))
        .with_context(|| format!("loading {manifest} under {root}"))?;

    for name in registry.names() {
        let mut instances = Vec::new();
        for i in 0..3 {
            let mut instance = registry
                .create_model(&name)
                .with_context(|| format!("{name} vanished from the registry"))?;
            instance.transform.translation = Vec3::new(i as f32 * 4.0, 0.0, 0.0);
            instances.push(instance);
        }

        let clips = registry
            .animations()
            .animations(&name)
            .map_or(0, |clips| clips.len());
        println!(
            "{name}: {} nodes, lod: {}, clips: {clips}, {} instances",
            instances[0].node_count(),
            instances[0].is_lod(),
            instances.len()
        );
    }

    for diagnostic in registry.diagnostics() {
        println!("warning: {diagnostic}");
    }

    let metrics = registry.metrics();
    println!(
        "loaded {} models, {} instances, hit rate {:.0}%",
        metrics.loads_completed(),
        metrics.instances_created(),
        metrics.instance_hit_rate()
    );
    Ok(())
}
