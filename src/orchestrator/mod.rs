//! Orchestration
//!
//! Consumes the market-data subscription and the risk alert stream and
//! drives the analysis, risk and execution collaborators.

mod pipeline;
mod system;

pub use pipeline::{
    calculate_social_score, determine_order_side, social_metrics_to_text, Pipeline,
    PipelineOutcome, PipelineSettings, NEGATIVE_SENTIMENT_CUTOFF, REDUCE_FRACTION,
};
pub use system::{QuantSystem, SystemSettings};
