//! System utilities: logging setup and process-level concerns

pub mod logging;

pub use logging::init_logging;
