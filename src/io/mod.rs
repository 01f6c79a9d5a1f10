pub mod api;
pub mod config_io;
pub mod lock;
pub mod project_io;
pub mod state;
