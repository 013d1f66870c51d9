//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::PathBuf;

/// Three LOD children of a tree, no geometry
pub const PINE: &str = r#"{
    "asset": { "version": "2.0" },
    "scenes": [{ "nodes": [0, 1, 2] }],
    "nodes": [
        { "name": "Pine_LOD2" },
        { "name": "Pine_LOD0" },
        { "name": "Pine_LOD1" }
    ]
}"#;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}
