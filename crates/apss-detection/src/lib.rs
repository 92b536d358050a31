//! Stateless rule-matching detection engine used by the Aggregator's event
//! processor.

pub mod engine;
pub mod rule;
pub mod rules;

pub use engine::DetectionEngine;
pub use rule::Rule;
