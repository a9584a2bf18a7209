pub mod analyzer;
pub mod path_cache;
pub mod policy;
pub mod reconstruct;

pub use analyzer::{AnalyzerError, PathAnalyzer};
pub use policy::{PolicyEngine, PolicyPath};
pub use reconstruct::reconstruct_paths;
