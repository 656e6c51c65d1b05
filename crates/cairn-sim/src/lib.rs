//! Time-ordered block simulation: falling blocks, liquid flow, farmland decay.
#![forbid(unsafe_code)]

mod config;
mod queue;
mod rules;

pub use config::SimConfig;
pub use queue::{BlockUpdateManager, ScheduledUpdate};
pub use rules::BlockWorld;
