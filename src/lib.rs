//! Fitflow: reproducible model fitting pipelines
//!
//! Two pipelines built from the same fit-once / apply-many pieces:
//! a flight delay classifier (recipe + logistic regression + ROC) and an
//! urchin growth regression fitted by least squares and by Gibbs sampling.

pub mod cli;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{ErrorCategory, FitflowError, Result};
