pub mod cache;
pub mod engine;
pub mod features;
pub mod metrics;

pub use cache::*;
pub use engine::*;
pub use features::*;
pub use metrics::*;
