pub mod pipeline;
pub mod stage;
pub mod deal;

pub use pipeline::*;
pub use stage::*;
pub use deal::*;
