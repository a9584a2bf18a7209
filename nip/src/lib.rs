pub mod collector;
pub mod error;
pub mod geo;
pub mod local;
pub mod proxy;
pub mod source;
pub mod topology;

pub use collector::PathCollector;
pub use error::NipError;
pub use geo::Geolocator;
pub use local::LocalNipSource;
pub use proxy::NipProxy;
pub use source::{MetadataRequest, NipSource};
pub use topology::TopologyNipSource;
