mod app;
mod args;
mod effects;
mod logging;
mod persistence;

pub use app::run;
pub use args::Cli;
