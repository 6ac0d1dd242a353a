mod run;
mod setup;
mod simulate;

pub use run::cmd_run;
pub use setup::{cmd_config, cmd_init_model};
pub use simulate::cmd_simulate;
