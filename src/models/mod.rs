// Core data models for Pipeboard
// These structs represent the pipeline snapshot and its write payloads

pub mod pipeline;
pub mod stage;
pub mod deal;

pub use pipeline::*;
pub use stage::*;
pub use deal::*;
