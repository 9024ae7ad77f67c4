use std::path::Path;

use indexmap::IndexSet;
use serde::Deserialize;

use crate::config::{read_json, ConfigError};

const DEFAULT_BLOCKS: &[&str] = &[
    "air",
    "stone",
    "granite",
    "dirt",
    "grass_block",
    "cobblestone",
    "oak_planks",
    "bedrock",
    "water",
    "lava",
    "sand",
    "gravel",
    "oak_log",
    "glass",
    "gold_block",
    "iron_block",
    "diamond_block",
    "redstone_block",
    "obsidian",
    "white_wool",
    "red_wool",
    "glowstone",
];

const DEFAULT_FEATURES: &[&str] = &[
    "buried_treasure",
    "desert_pyramid",
    "end_city",
    "fortress",
    "igloo",
    "jungle_pyramid",
    "mansion",
    "mineshaft",
    "monument",
    "ocean_ruin",
    "pillager_outpost",
    "shipwreck",
    "stronghold",
    "swamp_hut",
    "village",
];

/// Target engine constants. Built once by the caller and shared read-only by
/// every compilation.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineData {
    blocks: IndexSet<String>,
    /// Structures `isFeature` can test for.
    #[serde(default = "default_features")]
    features: IndexSet<String>,
}

fn default_features() -> IndexSet<String> {
    DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
}

impl Default for EngineData {
    fn default() -> Self {
        Self {
            blocks: DEFAULT_BLOCKS.iter().map(|b| b.to_string()).collect(),
            features: default_features(),
        }
    }
}

impl EngineData {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    pub fn has_block(&self, id: &str) -> bool {
        self.blocks.contains(id.strip_prefix("minecraft:").unwrap_or(id))
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.features
            .contains(name.strip_prefix("minecraft:").unwrap_or(name))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_lookup_ignores_the_namespace() {
        let data = EngineData::default();
        assert!(data.has_block("stone"));
        assert!(data.has_block("minecraft:stone"));
        assert!(!data.has_block("unobtainium"));

        let data: EngineData = serde_json::from_str(r#"{ "blocks": ["unobtainium"] }"#).unwrap();
        assert!(data.has_block("unobtainium"));
        assert!(!data.has_block("stone"));
        assert!(data.has_feature("village"));
    }
}
