// src/services/mod.rs

pub mod analyze;

pub use analyze::{AnalyzeInput, AnalyzeOutcome, AnalyzeService};
