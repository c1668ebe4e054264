//! Feature importance visualization
//!
//! Renders ranked importances as side-by-side horizontal bar charts in the
//! terminal.

mod importance;

pub use importance::{
    rank_importances, wait_for_dismiss, ImportanceChart, ImportancePanel, RankedFeature,
    LIGHT_GREEN, SKY_BLUE,
};
