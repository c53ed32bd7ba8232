// Valuation engine: VORP, scarcity, strategy weights and candidate scoring.

pub mod scarcity;
pub mod scoring;
pub mod strategy;
pub mod vor;
