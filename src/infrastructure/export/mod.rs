//! Export engine and artifact storage implementations

pub mod engine;
pub mod storage;

pub use engine::{EngineError, ExportEngine};
pub use storage::InMemoryArtifactStore;
