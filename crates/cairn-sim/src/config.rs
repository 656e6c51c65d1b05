use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimConfig {
    #[serde(default = "default_flow_delay")]
    pub flow_delay_ms: u64,
    #[serde(default = "default_fall_delay")]
    pub fall_delay_ms: u64,
    #[serde(default = "default_farmland_decay")]
    pub farmland_decay_ms: u64,
    /// Horizontal reach of the farmland water check; vertical reach is one block.
    #[serde(default = "default_farmland_radius")]
    pub farmland_water_radius: i32,
    /// Upper bound on executed entries per `process_updates` call.
    #[serde(default = "default_max_updates")]
    pub max_updates_per_tick: usize,
}

fn default_flow_delay() -> u64 {
    250
}
fn default_fall_delay() -> u64 {
    50
}
fn default_farmland_decay() -> u64 {
    30_000
}
fn default_farmland_radius() -> i32 {
    4
}
fn default_max_updates() -> usize {
    1024
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            flow_delay_ms: default_flow_delay(),
            fall_delay_ms: default_fall_delay(),
            farmland_decay_ms: default_farmland_decay(),
            farmland_water_radius: default_farmland_radius(),
            max_updates_per_tick: default_max_updates(),
        }
    }
}
