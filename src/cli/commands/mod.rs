mod analyze;
mod config_gen;

pub use analyze::{analyze, render_table};
pub use config_gen::config_generate;
