pub mod context;
pub mod progress;
