use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClubNameMapping {
    pub from: String,
    pub to: String,
}

/// Translates club names as printed on the results site into the names the
/// reference API uses. Unknown names pass through unchanged, which makes the game
/// unmatchable later on rather than failing here.
#[derive(Debug, Clone, Default)]
pub struct ClubNameMapper {
    mappings: Option<Vec<ClubNameMapping>>,
}

impl ClubNameMapper {
    pub fn new(mappings: Option<Vec<ClubNameMapping>>) -> Self {
        Self { mappings }
    }

    pub fn map(&self, name: &str) -> String {
        let Some(mappings) = &self.mappings else {
            warn!("No club names map configured");
            return name.to_string();
        };

        match mappings.iter().find(|mapping| mapping.from == name) {
            Some(mapping) => mapping.to.clone(),
            None => {
                warn!("No mapping found for club {}", name);
                name.to_string()
            }
        }
    }
}
