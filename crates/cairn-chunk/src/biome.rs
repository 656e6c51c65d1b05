use serde::{Deserialize, Serialize};

/// Climate label stored per column; drives surface and subsoil choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Ocean,
    Desert,
    Tundra,
    Swamp,
    Mountains,
    #[default]
    Forest,
}
