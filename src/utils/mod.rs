//! Console helpers shared by the commands

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
