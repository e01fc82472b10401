//! Report module - tables, terminal plots and JSON export

pub mod export;
pub mod plots;
pub mod tables;

pub use export::*;
pub use plots::{error_bar_plot, roc_plot, scatter_with_fits, ErrorBar, GroupSeries};
pub use tables::*;
