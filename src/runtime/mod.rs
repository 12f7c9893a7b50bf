//! Application lifecycle: component wiring, HTTP server, graceful shutdown

pub mod server;
pub mod shutdown;
pub mod startup;

pub use server::run_server;
pub use startup::{StartupContext, prepare_server_startup};
