//! Off-thread chunk mesh generation: worker pool, shared mesh registry, build ordering and
//! main-loop integration.
#![forbid(unsafe_code)]

mod builder;
mod integrate;
mod order;
mod pipeline;
mod registry;

pub use builder::{BlockGeometryBuilder, BuildError, GeometryBuilder};
pub use integrate::{MeshEvent, MeshIntegrator};
pub use order::{Candidate, FifoOrder, MeshGenerationOrder, NearestFocusFirst};
pub use pipeline::{MeshPipeline, PipelineConfig, PipelineStats};
pub use registry::MeshState;
