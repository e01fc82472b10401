//! Pipeline module - loading, cleaning, splitting and feature derivation

pub mod columns;
pub mod formula;
pub mod ingest;
pub mod loader;
pub mod recipe;
pub mod split;

pub use formula::{Formula, FormulaDesign, PreparedDesign, INTERCEPT};
pub use ingest::*;
pub use loader::*;
pub use recipe::{
    DateFeature, Holiday, PreparedRecipe, PreparedStep, Recipe, Roles, Selector, Step,
    UnseenLevelHandling,
};
pub use split::*;
