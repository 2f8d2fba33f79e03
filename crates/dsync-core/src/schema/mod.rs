//! Schema types shared by the engine, the persistence file and the CLI
//!
//! JSON field names are camelCase. Unknown pipeline fields are preserved so a
//! newer writer does not lose data when an older build rewrites the file.

mod file_entry;
mod pipeline;

pub use file_entry::{FileEntry, Side};
pub use pipeline::{
    Direction, NewPipeline, Pipeline, PipelineError, PipelineId, PluginConfig, normalize_extension,
};
