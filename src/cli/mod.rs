//! CLI module - argument parsing and the two pipeline commands

mod args;
pub mod flights;
pub mod urchins;

pub use args::{Cli, Commands, FlightsArgs, UrchinsArgs, URCHINS_URL};
pub use flights::run_flights;
pub use urchins::run_urchins;
