//! Level of Detail (LOD) assembly
//!
//! Artists author LOD models as one file whose root holds a child per
//! detail level, each carrying a `LOD<n>` token in its name
//! (`Tree_LOD0`, `Tree_LOD1`, ...). [`assemble_lod`] regroups those children
//! into a single [`LodNode`] that pairs every level with the distance at
//! which it becomes active.

use serde::Deserialize;

use crate::error::LodIntegrityWarning;
use crate::scene::{NodeKind, SceneNode};

/// One detail level: the node to show and the distance it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct LodLevel {
    pub node: SceneNode,
    pub distance: f32,
}

/// Represents a node with multiple levels of detail
///
/// Levels are kept in ascending distance order. The active level for a
/// viewing distance is the last level whose distance does not exceed it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LodNode {
    levels: Vec<LodLevel>,
}

impl LodNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a level, keeping levels sorted by distance.
    ///
    /// A level with the same distance as an existing one goes after it.
    pub fn add_level(&mut self, node: SceneNode, distance: f32) {
        let at = self
            .levels
            .iter()
            .position(|level| distance < level.distance)
            .unwrap_or(self.levels.len());
        self.levels.insert(at, LodLevel { node, distance });
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    pub fn levels_mut(&mut self) -> &mut [LodLevel] {
        &mut self.levels
    }

    /// Get the number of LOD levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Get the LOD index for a given viewing distance
    pub fn level_index(&self, distance: f32) -> Option<usize> {
        if self.levels.is_empty() {
            return None;
        }
        let index = self
            .levels
            .iter()
            .rposition(|level| distance >= level.distance)
            .unwrap_or(0);
        Some(index)
    }

    /// The node shown at a given viewing distance
    pub fn active_level(&self, distance: f32) -> Option<&SceneNode> {
        self.level_index(distance).map(|i| &self.levels[i].node)
    }
}

/// How one LOD level is selected from the root's children.
///
/// In a manifest this is either a bare distance, matched to the child with
/// the `LOD<index>` token, or an object naming the child explicitly:
///
/// ```json
/// { "lod": [5, { "distance": 20, "node": "Tree_far" }] }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LodLevelSpec {
    Distance(f32),
    Named { distance: f32, node: String },
}

impl LodLevelSpec {
    pub fn distance(&self) -> f32 {
        match self {
            Self::Distance(distance) | Self::Named { distance, .. } => *distance,
        }
    }
}

impl From<f32> for LodLevelSpec {
    fn from(distance: f32) -> Self {
        Self::Distance(distance)
    }
}

/// Result of LOD assembly
#[derive(Debug, Clone)]
pub struct LodAssembly {
    /// Node of kind [`NodeKind::Lod`]
    pub node: SceneNode,
    /// Integrity problems found on the way; none of them abort assembly
    pub warnings: Vec<LodIntegrityWarning>,
}

/// Parse the level index out of a node name.
///
/// The last `LOD` token followed by at least one digit wins and the whole
/// digit run is read, so `Rock_LOD10` is level 10, never level 1.
pub fn lod_index(name: &str) -> Option<usize> {
    name.match_indices("LOD")
        .filter_map(|(at, token)| {
            let rest = &name[at + token.len()..];
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            rest[..digits].parse().ok()
        })
        .last()
}

/// Regroup `root`'s immediate children into a LOD node.
///
/// The returned node keeps the root's name, transform and animations.
/// Children not claimed by any level are dropped.
pub fn assemble_lod(root: SceneNode, levels: &[LodLevelSpec]) -> LodAssembly {
    let mut warnings = Vec::new();
    if root.children.len() != levels.len() {
        warnings.push(LodIntegrityWarning::ChildCountMismatch {
            children: root.children.len(),
            levels: levels.len(),
        });
    }

    // Level index -> child position, first child per index wins.
    let mut indexed: Vec<(usize, usize)> = Vec::new();
    for (position, child) in root.children.iter().enumerate() {
        let Some(index) = lod_index(&child.name) else {
            continue;
        };
        match indexed.iter().find(|(i, _)| *i == index) {
            Some(&(_, kept)) => warnings.push(LodIntegrityWarning::DuplicateLevel {
                index,
                kept: root.children[kept].name.clone(),
                ignored: child.name.clone(),
            }),
            None => indexed.push((index, position)),
        }
    }

    let mut picks: Vec<(usize, f32)> = Vec::with_capacity(levels.len());
    for (index, spec) in levels.iter().enumerate() {
        let position = match spec {
            LodLevelSpec::Distance(_) => {
                let found = indexed.iter().find(|(i, _)| *i == index).map(|(_, p)| *p);
                if found.is_none() {
                    warnings.push(LodIntegrityWarning::MissingLevel { index });
                }
                found
            }
            LodLevelSpec::Named { node, .. } => {
                let found = root.children.iter().position(|child| &child.name == node);
                if found.is_none() {
                    warnings.push(LodIntegrityWarning::MissingNamedChild {
                        index,
                        node: node.clone(),
                    });
                }
                found
            }
        };
        if let Some(position) = position {
            picks.push((position, spec.distance()));
        }
    }

    let SceneNode {
        name,
        transform,
        children,
        animations,
        ..
    } = root;

    let mut slots: Vec<Option<SceneNode>> = children.into_iter().map(Some).collect();
    let mut lod = LodNode::new();
    for (k, &(position, distance)) in picks.iter().enumerate() {
        // A child backing several levels is copied for all but its last use.
        let reused_later = picks[k + 1..].iter().any(|(p, _)| *p == position);
        let node = if reused_later {
            slots[position].clone()
        } else {
            slots[position].take()
        };
        if let Some(node) = node {
            lod.add_level(node, distance);
        }
    }

    LodAssembly {
        node: SceneNode {
            name,
            transform,
            kind: NodeKind::Lod(lod),
            children: Vec::new(),
            animations,
        },
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Transform;
    use glam::Vec3;

    fn root_with(children: &[&str]) -> SceneNode {
        children
            .iter()
            .fold(SceneNode::group("Tree"), |root, name| {
                root.with_child(SceneNode::group(*name))
            })
    }

    fn distances(levels: &[f32]) -> Vec<LodLevelSpec> {
        levels.iter().copied().map(LodLevelSpec::from).collect()
    }

    fn level_names(node: &SceneNode) -> Vec<(&str, f32)> {
        node.as_lod()
            .unwrap()
            .levels()
            .iter()
            .map(|level| (level.node.name.as_str(), level.distance))
            .collect()
    }

    #[test]
    fn test_lod_index_parsing() {
        assert_eq!(lod_index("A_LOD0"), Some(0));
        assert_eq!(lod_index("Tree_LOD2_mesh"), Some(2));
        assert_eq!(lod_index("Rock_LOD10"), Some(10));
        assert_eq!(lod_index("LOD_group_LOD3"), Some(3));
        assert_eq!(lod_index("Tree_lod1"), None);
        assert_eq!(lod_index("Tree"), None);
    }

    #[test]
    fn test_pairs_levels_regardless_of_child_order() {
        let root = root_with(&["C_LOD2", "A_LOD0", "B_LOD1"]);
        let assembly = assemble_lod(root, &distances(&[5.0, 20.0, 50.0]));

        assert!(assembly.warnings.is_empty());
        assert_eq!(
            level_names(&assembly.node),
            vec![("A_LOD0", 5.0), ("B_LOD1", 20.0), ("C_LOD2", 50.0)]
        );
    }

    #[test]
    fn test_missing_level_is_skipped() {
        let root = root_with(&["A_LOD0", "Stump"]);
        let assembly = assemble_lod(root, &distances(&[5.0, 20.0]));

        assert_eq!(level_names(&assembly.node), vec![("A_LOD0", 5.0)]);
        assert_eq!(
            assembly.warnings,
            vec![LodIntegrityWarning::MissingLevel { index: 1 }]
        );
    }

    #[test]
    fn test_child_count_mismatch_is_reported() {
        let root = root_with(&["A_LOD0", "B_LOD1", "C_LOD2"]);
        let assembly = assemble_lod(root, &distances(&[5.0, 20.0]));

        assert_eq!(assembly.node.as_lod().unwrap().level_count(), 2);
        assert_eq!(
            assembly.warnings,
            vec![LodIntegrityWarning::ChildCountMismatch {
                children: 3,
                levels: 2
            }]
        );
    }

    #[test]
    fn test_level_one_does_not_match_level_ten() {
        let names: Vec<String> = (0..11).map(|i| format!("Rock_LOD{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut root = root_with(&names);
        root.children.reverse();

        let levels: Vec<f32> = (0..11).map(|i| i as f32 * 10.0).collect();
        let assembly = assemble_lod(root, &distances(&levels));

        assert!(assembly.warnings.is_empty());
        let lod = assembly.node.as_lod().unwrap();
        assert_eq!(lod.levels()[1].node.name, "Rock_LOD1");
        assert_eq!(lod.levels()[10].node.name, "Rock_LOD10");
    }

    #[test]
    fn test_duplicate_index_keeps_first() {
        let root = root_with(&["A_LOD0", "B_LOD0"]);
        let assembly = assemble_lod(root, &distances(&[5.0, 20.0]));

        assert_eq!(level_names(&assembly.node), vec![("A_LOD0", 5.0)]);
        assert!(assembly.warnings.contains(&LodIntegrityWarning::DuplicateLevel {
            index: 0,
            kept: "A_LOD0".to_string(),
            ignored: "B_LOD0".to_string(),
        }));
        assert!(assembly
            .warnings
            .contains(&LodIntegrityWarning::MissingLevel { index: 1 }));
    }

    #[test]
    fn test_explicit_mapping() {
        let root = root_with(&["Tree_high", "Tree_far"]);
        let levels = vec![
            LodLevelSpec::Named {
                distance: 5.0,
                node: "Tree_high".to_string(),
            },
            LodLevelSpec::Named {
                distance: 40.0,
                node: "Tree_far".to_string(),
            },
        ];
        let assembly = assemble_lod(root, &levels);

        assert!(assembly.warnings.is_empty());
        assert_eq!(
            level_names(&assembly.node),
            vec![("Tree_high", 5.0), ("Tree_far", 40.0)]
        );
    }

    #[test]
    fn test_explicit_mapping_missing_child() {
        let root = root_with(&["Tree_high"]);
        let levels = vec![LodLevelSpec::Named {
            distance: 5.0,
            node: "Tree_low".to_string(),
        }];
        let assembly = assemble_lod(root, &levels);

        assert_eq!(assembly.node.as_lod().unwrap().level_count(), 0);
        assert_eq!(
            assembly.warnings,
            vec![LodIntegrityWarning::MissingNamedChild {
                index: 0,
                node: "Tree_low".to_string()
            }]
        );
    }

    #[test]
    fn test_same_child_backs_two_levels() {
        let root = root_with(&["Tree_LOD0"]);
        let levels = vec![
            LodLevelSpec::Distance(0.0),
            LodLevelSpec::Named {
                distance: 30.0,
                node: "Tree_LOD0".to_string(),
            },
        ];
        let assembly = assemble_lod(root, &levels);
        assert_eq!(
            level_names(&assembly.node),
            vec![("Tree_LOD0", 0.0), ("Tree_LOD0", 30.0)]
        );
    }

    #[test]
    fn test_keeps_root_name_and_transform() {
        let mut root = root_with(&["A_LOD0"]);
        root.transform = Transform::from_translation(Vec3::Y);
        root.transform.set_uniform_scale(2.0);

        let assembly = assemble_lod(root, &distances(&[1.0]));
        assert_eq!(assembly.node.name, "Tree");
        assert_eq!(assembly.node.transform.scale, Vec3::splat(2.0));
        assert!(assembly.node.children.is_empty());
        assert!(assembly.node.find("A_LOD0").is_some());
    }

    #[test]
    fn test_level_selection_by_distance() {
        let mut lod = LodNode::new();
        lod.add_level(SceneNode::group("far"), 50.0);
        lod.add_level(SceneNode::group("near"), 0.0);
        lod.add_level(SceneNode::group("mid"), 20.0);

        assert_eq!(lod.active_level(0.0).unwrap().name, "near");
        assert_eq!(lod.active_level(19.9).unwrap().name, "near");
        assert_eq!(lod.active_level(20.0).unwrap().name, "mid");
        assert_eq!(lod.active_level(1000.0).unwrap().name, "far");
        assert_eq!(lod.level_index(-1.0), Some(0));
        assert_eq!(LodNode::new().level_index(10.0), None);
    }

    #[test]
    fn test_level_spec_deserialize() {
        let levels: Vec<LodLevelSpec> =
            serde_json::from_str(r#"[5, 20.5, {"distance": 40, "node": "Tree_far"}]"#).unwrap();
        assert_eq!(levels[0], LodLevelSpec::Distance(5.0));
        assert_eq!(levels[1].distance(), 20.5);
        assert_eq!(
            levels[2],
            LodLevelSpec::Named {
                distance: 40.0,
                node: "Tree_far".to_string()
            }
        );
    }
}
