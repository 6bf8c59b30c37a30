mod check_config;
mod run;

pub use check_config::{check_config, CheckConfigArgs};
pub use run::{run, RunArgs};
