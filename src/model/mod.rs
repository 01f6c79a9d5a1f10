pub mod task;
pub mod tree;
pub mod project;
pub mod config;

pub use task::*;
pub use tree::*;
pub use project::*;
pub use config::*;
