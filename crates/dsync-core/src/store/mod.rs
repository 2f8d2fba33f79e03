//! Pipeline registry and its persistence

mod persist;
mod pipeline_store;

pub use persist::{JsonPipelineFile, PIPELINE_FILE_VERSION, PipelineFile, PipelineRepository};
pub use pipeline_store::PipelineStore;
